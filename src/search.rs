//! ## Search engine
//!
//! Branch-and-bound search shared by k-nearest-neighbor and range queries.
//! A priority queue of candidate subtrees (`PR`), ordered by a
//! triangle-inequality lower bound (`dmin`), is expanded smallest-first
//! until the smallest remaining `dmin` exceeds the current search radius.
//! A bounded accumulator (`NnResults`) holds the best results seen so far
//! and, for k-NN queries, tightens the effective search radius as it fills.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use tracing::debug;

use crate::distance::{self, Distance};
use crate::entry::Entry;
use crate::error::MTreeError;
use crate::node::Node;

/// Which kind of query is driving [`run`]: k-NN tightens its own radius as
/// results accumulate, range search keeps a fixed radius throughout.
pub(crate) enum Mode {
    Knn,
    Range(f64),
}

/// A pending subtree awaiting expansion, ordered by `dmin` (smallest
/// first) when held in a [`BinaryHeap`].
struct PrEntry<'a, O> {
    subtree: &'a Node<O>,
    dmin: f64,
    d_query: f64,
}

impl<O> PartialEq for PrEntry<'_, O> {
    fn eq(&self, other: &Self) -> bool {
        self.dmin == other.dmin
    }
}

impl<O> Eq for PrEntry<'_, O> {}

impl<O> PartialOrd for PrEntry<'_, O> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<O> Ord for PrEntry<'_, O> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the smallest dmin pops first.
        OrderedFloat(other.dmin).cmp(&OrderedFloat(self.dmin))
    }
}

/// The bounded, distance-ordered result accumulator.
struct NnResults<'a, O> {
    capacity: usize,
    results: Vec<(Option<&'a O>, f64)>,
    tracked_bound: f64,
}

impl<'a, O> NnResults<'a, O> {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        NnResults {
            capacity,
            results: vec![(None, f64::INFINITY); capacity],
            tracked_bound: f64::INFINITY,
        }
    }

    /// The current pruning threshold: the distance of the farthest kept
    /// result, tightened further by any [`Self::tighten_radius`] calls.
    fn search_radius(&self) -> f64 {
        let last = self.results.last().map(|&(_, d)| d).unwrap_or(f64::INFINITY);
        last.min(self.tracked_bound)
    }

    /// Inserts `obj` at distance `dmax`, keeping the accumulator sorted in
    /// ascending distance order and trimmed to `capacity`.
    fn offer_result(&mut self, obj: &'a O, dmax: f64) {
        let pos = self.results.partition_point(|&(_, d)| d <= dmax);
        self.results.insert(pos, (Some(obj), dmax));
        self.results.truncate(self.capacity);
    }

    /// Tightens the tracked upper bound without adding a result.
    fn tighten_radius(&mut self, dmax: f64) {
        if dmax < self.tracked_bound {
            self.tracked_bound = dmax;
        }
    }

    fn into_sorted_objects(self) -> Vec<&'a O> {
        self.results.into_iter().filter_map(|(obj, _)| obj).collect()
    }
}

/// Runs a branch-and-bound query over `root`, returning up to `capacity`
/// objects. For k-NN, `capacity` is `min(k, len)` and `mode` is
/// [`Mode::Knn`]; for range search, `capacity` is the tree's size and
/// `mode` is `Mode::Range(r)`.
pub(crate) fn run<'a, O>(
    root: &'a Node<O>,
    query_obj: &O,
    distance: &dyn Distance<O>,
    capacity: usize,
    mode: Mode,
) -> Result<Vec<&'a O>, MTreeError> {
    let mut nn = NnResults::new(capacity);
    let mut pr: BinaryHeap<PrEntry<'a, O>> = BinaryHeap::new();
    pr.push(PrEntry {
        subtree: root,
        dmin: 0.0,
        d_query: 0.0,
    });

    let fixed_radius = match mode {
        Mode::Range(r) => Some(r),
        Mode::Knn => None,
    };

    while let Some(pe) = pr.peek() {
        let current_radius = fixed_radius.unwrap_or_else(|| nn.search_radius());
        if pe.dmin > current_radius {
            break;
        }
        let pe = pr.pop().expect("just peeked");
        search_node(
            pe.subtree,
            query_obj,
            distance,
            current_radius,
            pe.d_query,
            fixed_radius.is_none(),
            &mut pr,
            &mut nn,
        )?;
    }

    debug!(
        returned = nn.results.iter().filter(|(o, _)| o.is_some()).count(),
        "query finished"
    );
    Ok(nn.into_sorted_objects())
}

#[allow(clippy::too_many_arguments)]
fn search_node<'a, O>(
    node: &'a Node<O>,
    query_obj: &O,
    distance: &dyn Distance<O>,
    search_radius: f64,
    d_parent_query: f64,
    tighten: bool,
    pr: &mut BinaryHeap<PrEntry<'a, O>>,
    nn: &mut NnResults<'a, O>,
) -> Result<(), MTreeError> {
    if node.is_leaf() {
        for e in node.entries() {
            let Entry::Leaf {
                obj,
                distance_to_parent,
            } = e
            else {
                unreachable!("leaf node holds only leaf entries");
            };
            if let Some(dtp) = distance_to_parent {
                if (d_parent_query - dtp).abs() > search_radius {
                    continue;
                }
            }
            let d = distance::check(distance.distance(obj, query_obj))?;
            if d <= search_radius {
                nn.offer_result(obj, d);
            }
        }
    } else {
        for e in node.entries() {
            let Entry::Routing {
                obj,
                distance_to_parent,
                radius,
                subtree,
            } = e
            else {
                unreachable!("internal node holds only routing entries");
            };
            if let Some(dtp) = distance_to_parent {
                if (d_parent_query - dtp).abs() > search_radius + radius {
                    continue;
                }
            }
            let d_eq = distance::check(distance.distance(obj, query_obj))?;
            let entry_dmin = (d_eq - radius).max(0.0);
            if entry_dmin <= search_radius {
                pr.push(PrEntry {
                    subtree,
                    dmin: entry_dmin,
                    d_query: d_eq,
                });
            }
            if tighten {
                let entry_dmax = d_eq + radius;
                if entry_dmax < search_radius {
                    nn.tighten_radius(entry_dmax);
                }
            }
        }
    }
    Ok(())
}
