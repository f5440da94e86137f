//! ## Promotion and partition policies
//!
//! Splitting a full node requires choosing two new routing objects
//! ([`PromotionPolicy`]) and distributing the overflowing entries between
//! them ([`PartitionPolicy`]). Both are pluggable: the tree stores them as
//! trait objects, so a caller can supply an alternative strategy without
//! touching the rest of the index.

use crate::distance::{self, Distance};
use crate::entry::Entry;
use crate::error::MTreeError;

/// Chooses two routing objects from the combined entry set of a node that
/// is about to split.
pub trait PromotionPolicy<O> {
    /// Returns `(o1, o2)`, the two objects that will anchor the two halves
    /// of the split. `current_routing_obj` is the object that currently
    /// routes to the splitting node (`None` at the root).
    ///
    /// # Errors
    ///
    /// Returns [`MTreeError::DistanceFault`] if a distance computed while
    /// choosing the pair is negative, `NaN`, or infinite.
    fn promote(
        &self,
        candidates: &[Entry<O>],
        current_routing_obj: Option<&O>,
        distance: &dyn Distance<O>,
    ) -> Result<(O, O), MTreeError>;
}

/// Distributes the overflowing entries of a node between its two newly
/// promoted routing objects.
pub trait PartitionPolicy<O> {
    /// Splits `candidates` into two non-empty groups, one assigned to `r1`
    /// and the other to `r2`.
    ///
    /// # Errors
    ///
    /// Returns [`MTreeError::DistanceFault`] if a distance computed while
    /// assigning a side is negative, `NaN`, or infinite.
    fn partition(
        &self,
        candidates: Vec<Entry<O>>,
        r1: &O,
        r2: &O,
        distance: &dyn Distance<O>,
    ) -> Result<(Vec<Entry<O>>, Vec<Entry<O>>), MTreeError>;
}

/// The default promotion strategy (`M_LB_DIST_confirmed`).
///
/// When the node being split already has a routing object and every
/// candidate carries a cached `distance_to_parent`, that routing object is
/// reused as one of the two promoted objects and the entry farthest from it
/// is picked as the other, saving a full O(n²) distance scan. Otherwise
/// falls back to [`MinMaxDistNonConfirmed`]-style exhaustive search.
pub struct MinMaxDistConfirmed;

impl<O: Clone> PromotionPolicy<O> for MinMaxDistConfirmed {
    fn promote(
        &self,
        candidates: &[Entry<O>],
        current_routing_obj: Option<&O>,
        distance: &dyn Distance<O>,
    ) -> Result<(O, O), MTreeError> {
        if let Some(current) = current_routing_obj {
            if candidates.iter().all(|e| e.distance_to_parent().is_some()) {
                // distance_to_parent values were already validated by
                // distance::check when cached, so this comparison is safe.
                let farthest = candidates
                    .iter()
                    .max_by(|a, b| {
                        a.distance_to_parent()
                            .unwrap()
                            .partial_cmp(&b.distance_to_parent().unwrap())
                            .expect("distance values are never NaN")
                    })
                    .expect("candidates is non-empty");
                return Ok((current.clone(), farthest.obj().clone()));
            }
        }
        exhaustive_farthest_pair(candidates, distance)
    }
}

/// An exhaustive promotion strategy (`M_LB_DIST_non_confirmed`): picks the
/// pair of candidate objects maximizing their mutual distance, at the cost
/// of O(n²) distance calls.
pub struct MinMaxDistNonConfirmed;

impl<O: Clone> PromotionPolicy<O> for MinMaxDistNonConfirmed {
    fn promote(
        &self,
        candidates: &[Entry<O>],
        _current_routing_obj: Option<&O>,
        distance: &dyn Distance<O>,
    ) -> Result<(O, O), MTreeError> {
        exhaustive_farthest_pair(candidates, distance)
    }
}

fn exhaustive_farthest_pair<O: Clone>(
    candidates: &[Entry<O>],
    distance: &dyn Distance<O>,
) -> Result<(O, O), MTreeError> {
    debug_assert!(candidates.len() >= 2, "cannot promote from fewer than two candidates");
    let mut best = (0usize, 1usize, f64::NEG_INFINITY);
    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            let d = distance::check(distance.distance(candidates[i].obj(), candidates[j].obj()))?;
            if d > best.2 {
                best = (i, j, d);
            }
        }
    }
    Ok((candidates[best.0].obj().clone(), candidates[best.1].obj().clone()))
}

/// The default partition strategy: the generalized hyperplane test. Each
/// entry is assigned to whichever routing object it is nearer to.
pub struct GeneralizedHyperplane;

impl<O> PartitionPolicy<O> for GeneralizedHyperplane {
    fn partition(
        &self,
        candidates: Vec<Entry<O>>,
        r1: &O,
        r2: &O,
        distance: &dyn Distance<O>,
    ) -> Result<(Vec<Entry<O>>, Vec<Entry<O>>), MTreeError> {
        let mut nearer_to_r1: Vec<bool> = Vec::with_capacity(candidates.len());
        for e in &candidates {
            let d1 = distance::check(distance.distance(e.obj(), r1))?;
            let d2 = distance::check(distance.distance(e.obj(), r2))?;
            nearer_to_r1.push(d1 <= d2);
        }

        if nearer_to_r1.iter().all(|&b| b) || nearer_to_r1.iter().all(|&b| !b) {
            // Every object equidistant (or identical): fall back to a
            // deterministic halving rather than leaving one side empty.
            let mut candidates = candidates;
            let half = candidates.len() / 2;
            let rest = candidates.split_off(half);
            return Ok((candidates, rest));
        }

        let mut side1 = Vec::new();
        let mut side2 = Vec::new();
        for (e, nearer) in candidates.into_iter().zip(nearer_to_r1) {
            if nearer {
                side1.push(e);
            } else {
                side2.push(e);
            }
        }
        Ok((side1, side2))
    }
}
