//! ## Nodes
//!
//! A [`Node`] holds up to `max_node_size` entries. Leaf nodes hold indexed
//! objects directly; internal nodes hold routing entries that anchor child
//! subtrees. Overflow during insertion is handled by [`Node::add`], which
//! returns a [`SplitOutcome`] to its caller instead of rewriting a parent
//! back-pointer, so splits cascade upward as ordinary return values.

use tracing::debug;

use crate::distance::{self, Distance};
use crate::entry::Entry;
use crate::error::MTreeError;
use crate::policy::{PartitionPolicy, PromotionPolicy};

/// Bundles everything a node needs to mutate itself without every method
/// growing a long parameter list.
pub(crate) struct Params<'a, O> {
    pub distance: &'a dyn Distance<O>,
    pub max_node_size: usize,
    pub promote: &'a dyn PromotionPolicy<O>,
    pub partition: &'a dyn PartitionPolicy<O>,
}

/// The result of splitting an overflowing node, returned up the recursion
/// instead of being threaded through a mutable back-pointer.
pub(crate) struct SplitOutcome<O> {
    /// The routing object that now represents the (rebuilt, in-place) node
    /// that overflowed.
    pub new_obj: O,
    /// The covering radius of that rebuilt node.
    pub new_radius: f64,
    /// A freshly built sibling entry, holding the other half of the split.
    pub sibling: Entry<O>,
}

/// A node in the tree: a flat vector of entries, tagged leaf or internal.
#[derive(Debug, Clone)]
pub struct Node<O> {
    pub(crate) entries: Vec<Entry<O>>,
    pub(crate) is_leaf: bool,
}

impl<O: Clone> Node<O> {
    /// Creates a new, empty leaf node.
    pub(crate) fn leaf() -> Self {
        Node {
            entries: Vec::new(),
            is_leaf: true,
        }
    }

    /// Creates an internal node holding `entries` directly, used when
    /// growing a new root after a cascading split reaches the top.
    pub(crate) fn new_internal(entries: Vec<Entry<O>>) -> Self {
        Node {
            entries,
            is_leaf: false,
        }
    }

    /// Number of entries directly held by this node.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this node holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether this is a leaf node.
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    /// Entries held directly by this node.
    pub fn entries(&self) -> &[Entry<O>] {
        &self.entries
    }

    /// Covering radius `obj` would need to cover every entry currently held
    /// by this node: `max(d(obj, e.obj) + e.radius)`, `0.0` if empty.
    pub fn covering_radius_for(&self, obj: &O, distance: &dyn Distance<O>) -> f64 {
        self.entries
            .iter()
            .map(|e| distance.distance(obj, e.obj()) + e.radius())
            .fold(0.0, f64::max)
    }

    /// Inserts `obj` into this subtree, descending via minimum-enlargement
    /// choice at internal nodes. Returns `Some(outcome)` if this node
    /// overflowed and had to split.
    pub(crate) fn add(
        &mut self,
        obj: O,
        self_routing_obj: Option<&O>,
        params: &Params<'_, O>,
    ) -> Result<Option<SplitOutcome<O>>, MTreeError> {
        if self.is_leaf {
            self.add_leaf(obj, self_routing_obj, params)
        } else {
            self.add_internal(obj, self_routing_obj, params)
        }
    }

    fn add_leaf(
        &mut self,
        obj: O,
        self_routing_obj: Option<&O>,
        params: &Params<'_, O>,
    ) -> Result<Option<SplitOutcome<O>>, MTreeError> {
        let distance_to_parent = match self_routing_obj {
            Some(p) => Some(distance::check(params.distance.distance(&obj, p))?),
            None => None,
        };
        let new_entry = Entry::Leaf {
            obj,
            distance_to_parent,
        };
        if self.entries.len() < params.max_node_size {
            self.entries.push(new_entry);
            debug!(size = self.entries.len(), "inserted leaf entry");
            return Ok(None);
        }
        // A DistanceFault during promotion/partitioning must leave this
        // node exactly as it was before this entry; restore the snapshot
        // taken before `split` on any error rather than leaving `entries`
        // emptied or half-rebuilt.
        let backup = self.entries.clone();
        let mut all = std::mem::take(&mut self.entries);
        all.push(new_entry);
        match self.split(all, self_routing_obj, params) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(err) => {
                self.entries = backup;
                Err(err)
            }
        }
    }

    fn add_internal(
        &mut self,
        obj: O,
        self_routing_obj: Option<&O>,
        params: &Params<'_, O>,
    ) -> Result<Option<SplitOutcome<O>>, MTreeError> {
        // A DistanceFault anywhere below this point (descent, recompution
        // of distance_to_parent, or a cascaded split) must leave this node
        // exactly as it was before the call; restore this snapshot on any
        // error instead of propagating with a partially rewritten entry.
        let backup = self.entries.clone();
        match self.add_internal_uncommitted(obj, self_routing_obj, params) {
            Ok(result) => Ok(result),
            Err(err) => {
                self.entries = backup;
                Err(err)
            }
        }
    }

    fn add_internal_uncommitted(
        &mut self,
        obj: O,
        self_routing_obj: Option<&O>,
        params: &Params<'_, O>,
    ) -> Result<Option<SplitOutcome<O>>, MTreeError> {
        let dists = self
            .entries
            .iter()
            .map(|e| distance::check(params.distance.distance(&obj, e.obj())))
            .collect::<Result<Vec<f64>, MTreeError>>()?;

        let mut best_confirmed: Option<(usize, f64)> = None;
        for (i, &d) in dists.iter().enumerate() {
            if d <= self.entries[i].radius() {
                match best_confirmed {
                    Some((_, best_d)) if best_d <= d => {}
                    _ => best_confirmed = Some((i, d)),
                }
            }
        }

        let chosen = if let Some((i, _)) = best_confirmed {
            i
        } else {
            let mut best_i = 0;
            let mut best_enlargement = f64::INFINITY;
            for (i, &d) in dists.iter().enumerate() {
                let enlargement = d - self.entries[i].radius();
                if enlargement < best_enlargement {
                    best_enlargement = enlargement;
                    best_i = i;
                }
            }
            if let Entry::Routing { radius, .. } = &mut self.entries[best_i] {
                *radius = dists[best_i];
            }
            best_i
        };

        let split_outcome = match &mut self.entries[chosen] {
            Entry::Routing { obj: r_obj, subtree, .. } => subtree.add(obj, Some(&*r_obj), params)?,
            Entry::Leaf { .. } => unreachable!("internal node holds only routing entries"),
        };

        let Some(outcome) = split_outcome else {
            return Ok(None);
        };

        let new_dtp = match self_routing_obj {
            Some(p) => Some(distance::check(params.distance.distance(&outcome.new_obj, p))?),
            None => None,
        };
        if let Entry::Routing {
            obj,
            distance_to_parent,
            radius,
            ..
        } = &mut self.entries[chosen]
        {
            *obj = outcome.new_obj;
            *radius = outcome.new_radius;
            *distance_to_parent = new_dtp;
        }

        let mut sibling = outcome.sibling;
        let sibling_dtp = match self_routing_obj {
            Some(p) => Some(distance::check(params.distance.distance(sibling.obj(), p))?),
            None => None,
        };
        sibling.set_distance_to_parent(sibling_dtp);
        self.entries.push(sibling);

        if self.entries.len() > params.max_node_size {
            let all = std::mem::take(&mut self.entries);
            Ok(Some(self.split(all, self_routing_obj, params)?))
        } else {
            debug!(size = self.entries.len(), "absorbed cascaded split");
            Ok(None)
        }
    }

    /// Splits the combined entry set `all` (already including the
    /// overflowing entry) into two halves via promotion and partitioning.
    /// Rebuilds `self` in place with the first half and returns a
    /// [`SplitOutcome`] describing the second half.
    fn split(
        &mut self,
        all: Vec<Entry<O>>,
        self_routing_obj: Option<&O>,
        params: &Params<'_, O>,
    ) -> Result<SplitOutcome<O>, MTreeError> {
        let (r1, r2) = params.promote.promote(&all, self_routing_obj, params.distance)?;
        let (e1, e2) = params.partition.partition(all, &r1, &r2, params.distance)?;
        debug_assert!(!e1.is_empty(), "partition produced an empty side");
        debug_assert!(!e2.is_empty(), "partition produced an empty side");

        let radius1 = self.set_entries_and_parent_entry(e1, &r1, params.distance)?;

        let mut sibling_node = Node {
            entries: Vec::new(),
            is_leaf: self.is_leaf,
        };
        let radius2 = sibling_node.set_entries_and_parent_entry(e2, &r2, params.distance)?;

        tracing::info!(radius1, radius2, "split node");

        Ok(SplitOutcome {
            new_obj: r1,
            new_radius: radius1,
            sibling: Entry::Routing {
                obj: r2,
                distance_to_parent: None,
                radius: radius2,
                subtree: Box::new(sibling_node),
            },
        })
    }

    /// Replaces this node's entry set wholesale, refreshing every entry's
    /// `distance_to_parent` against `new_routing_obj` and returning the
    /// resulting covering radius.
    fn set_entries_and_parent_entry(
        &mut self,
        mut new_entries: Vec<Entry<O>>,
        new_routing_obj: &O,
        distance: &dyn Distance<O>,
    ) -> Result<f64, MTreeError> {
        let mut radius = 0.0_f64;
        for e in new_entries.iter_mut() {
            let d = distance::check(distance.distance(e.obj(), new_routing_obj))?;
            e.set_distance_to_parent(Some(d));
            let bound = d + e.radius();
            if bound > radius {
                radius = bound;
            }
        }
        self.entries = new_entries;
        Ok(radius)
    }

    /// Appends `(depth, radius_or_none, obj)` triples in pre-order for
    /// every entry reachable from this node.
    pub(crate) fn preorder<'a>(&'a self, depth: usize, out: &mut Vec<(usize, Option<f64>, &'a O)>) {
        for e in &self.entries {
            match e {
                Entry::Leaf { obj, .. } => out.push((depth, None, obj)),
                Entry::Routing {
                    obj,
                    radius,
                    subtree,
                    ..
                } => {
                    out.push((depth, Some(*radius), obj));
                    subtree.preorder(depth + 1, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{GeneralizedHyperplane, MinMaxDistConfirmed};

    fn d(a: &f64, b: &f64) -> f64 {
        (a - b).abs()
    }

    #[test]
    fn test_leaf_add_without_split() {
        let mut node: Node<f64> = Node::leaf();
        let distance: fn(&f64, &f64) -> f64 = d;
        let promote = MinMaxDistConfirmed;
        let partition = GeneralizedHyperplane;
        let p = Params {
            distance: &distance,
            max_node_size: 4,
            promote: &promote,
            partition: &partition,
        };
        for v in [1.0, 2.0, 3.0] {
            let outcome = node.add(v, None, &p).unwrap();
            assert!(outcome.is_none());
        }
        assert_eq!(node.len(), 3);
    }

    #[test]
    fn test_leaf_add_triggers_split() {
        let mut node: Node<f64> = Node::leaf();
        let distance: fn(&f64, &f64) -> f64 = d;
        let promote = MinMaxDistConfirmed;
        let partition = GeneralizedHyperplane;
        let p = Params {
            distance: &distance,
            max_node_size: 2,
            promote: &promote,
            partition: &partition,
        };
        assert!(node.add(1.0, None, &p).unwrap().is_none());
        assert!(node.add(2.0, None, &p).unwrap().is_none());
        let outcome = node.add(3.0, None, &p).unwrap();
        assert!(outcome.is_some());
        let outcome = outcome.unwrap();
        assert_eq!(node.len() + 1, 3);
        assert!(matches!(outcome.sibling, Entry::Routing { .. }));
    }

    #[test]
    fn test_covering_radius_empty_node() {
        let node: Node<f64> = Node::leaf();
        let distance: fn(&f64, &f64) -> f64 = d;
        assert_eq!(node.covering_radius_for(&0.0, &distance), 0.0);
    }

    #[test]
    fn test_leaf_split_distance_fault_leaves_node_unchanged() {
        fn poisoned(a: &f64, b: &f64) -> f64 {
            if *a == 99.0 || *b == 99.0 {
                f64::NAN
            } else {
                (a - b).abs()
            }
        }
        let mut node: Node<f64> = Node::leaf();
        let distance: fn(&f64, &f64) -> f64 = d;
        let promote = MinMaxDistConfirmed;
        let partition = GeneralizedHyperplane;
        let p = Params {
            distance: &distance,
            max_node_size: 2,
            promote: &promote,
            partition: &partition,
        };
        node.add(1.0, None, &p).unwrap();
        node.add(2.0, None, &p).unwrap();

        let faulty_distance: fn(&f64, &f64) -> f64 = poisoned;
        let faulty_p = Params {
            distance: &faulty_distance,
            max_node_size: 2,
            promote: &promote,
            partition: &partition,
        };
        let err = node.add(99.0, None, &faulty_p).unwrap_err();
        assert!(matches!(err, MTreeError::DistanceFault { .. }));

        assert_eq!(node.len(), 2);
        let values: Vec<f64> = node.entries().iter().map(|e| *e.obj()).collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }
}
