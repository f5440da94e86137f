//! ## Tree façade
//!
//! [`MTree`] owns the root node and exposes the public insert/search API.

use tracing::info;

use crate::distance::Distance;
use crate::entry::Entry;
use crate::error::MTreeError;
use crate::node::{Node, Params};
use crate::policy::{GeneralizedHyperplane, MinMaxDistConfirmed, PartitionPolicy, PromotionPolicy};
use crate::search::{self, Mode};

/// An in-memory M-tree over objects of type `O`, indexed by a
/// caller-supplied metric `D`.
///
/// `D` must behave as a true metric (non-negative, symmetric, zero only
/// for identical objects, and satisfy the triangle inequality); search
/// pruning is unsound otherwise. See [`Distance`].
pub struct MTree<O, D> {
    root: Node<O>,
    size: usize,
    max_node_size: usize,
    distance: D,
    promote: Box<dyn PromotionPolicy<O>>,
    partition: Box<dyn PartitionPolicy<O>>,
}

impl<O: Clone, D: Distance<O>> MTree<O, D> {
    /// Creates an empty tree using the default promotion
    /// ([`MinMaxDistConfirmed`]) and partition ([`GeneralizedHyperplane`])
    /// policies.
    ///
    /// # Errors
    ///
    /// Returns [`MTreeError::InvalidCapacity`] if `max_node_size < 2`.
    pub fn new(distance: D, max_node_size: usize) -> Result<Self, MTreeError> {
        Self::with_policies(
            distance,
            max_node_size,
            Box::new(MinMaxDistConfirmed),
            Box::new(GeneralizedHyperplane),
        )
    }

    /// Creates an empty tree with explicit promotion and partition
    /// policies.
    ///
    /// # Errors
    ///
    /// Returns [`MTreeError::InvalidCapacity`] if `max_node_size < 2`.
    pub fn with_policies(
        distance: D,
        max_node_size: usize,
        promote: Box<dyn PromotionPolicy<O>>,
        partition: Box<dyn PartitionPolicy<O>>,
    ) -> Result<Self, MTreeError> {
        if max_node_size < 2 {
            return Err(MTreeError::InvalidCapacity {
                capacity: max_node_size,
            });
        }
        info!(max_node_size, "created M-tree");
        Ok(MTree {
            root: Node::leaf(),
            size: 0,
            max_node_size,
            distance,
            promote,
            partition,
        })
    }

    /// Number of objects currently indexed.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the tree holds no objects.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn params(&self) -> Params<'_, O> {
        Params {
            distance: &self.distance,
            max_node_size: self.max_node_size,
            promote: self.promote.as_ref(),
            partition: self.partition.as_ref(),
        }
    }

    /// Inserts `obj` into the tree.
    ///
    /// # Errors
    ///
    /// Returns [`MTreeError::DistanceFault`] if the distance function
    /// returns a negative, `NaN`, or infinite value while descending or
    /// splitting.
    pub fn insert(&mut self, obj: O) -> Result<(), MTreeError> {
        let params = self.params();
        if let Some(outcome) = self.root.add(obj, None, &params)? {
            let old_root = std::mem::replace(&mut self.root, Node::leaf());
            let new_root_entry = Entry::Routing {
                obj: outcome.new_obj,
                distance_to_parent: None,
                radius: outcome.new_radius,
                subtree: Box::new(old_root),
            };
            self.root = Node::new_internal(vec![new_root_entry, outcome.sibling]);
            info!("grew a new root after split");
        }
        self.size += 1;
        Ok(())
    }

    /// Inserts every object of `objs` in order. Defined as repeated
    /// [`Self::insert`]; this crate does not implement a bulk-loading
    /// algorithm.
    pub fn bulk_insert<I: IntoIterator<Item = O>>(&mut self, objs: I) -> Result<(), MTreeError> {
        for obj in objs {
            self.insert(obj)?;
        }
        Ok(())
    }

    /// Returns up to `k` objects nearest to `query`, ordered by ascending
    /// distance. Returns an empty vector if `k == 0` or the tree is empty.
    ///
    /// # Errors
    ///
    /// Returns [`MTreeError::DistanceFault`] if the distance function
    /// returns a negative, `NaN`, or infinite value while searching.
    pub fn knn(&self, query: &O, k: usize) -> Result<Vec<&O>, MTreeError> {
        let capacity = k.min(self.size);
        if capacity == 0 {
            return Ok(Vec::new());
        }
        search::run(&self.root, query, &self.distance, capacity, Mode::Knn)
    }

    /// Returns every indexed object within distance `r` of `query`, ordered
    /// by ascending distance.
    ///
    /// # Errors
    ///
    /// Returns [`MTreeError::InvalidRadius`] if `r` is negative.
    pub fn range(&self, query: &O, r: f64) -> Result<Vec<&O>, MTreeError> {
        if r < 0.0 {
            return Err(MTreeError::InvalidRadius { radius: r });
        }
        if self.size == 0 {
            return Ok(Vec::new());
        }
        search::run(&self.root, query, &self.distance, self.size, Mode::Range(r))
    }

    /// Debug traversal of the tree in pre-order, yielding `(depth,
    /// radius_or_none, obj)` triples. `radius_or_none` is `Some` for
    /// routing entries and `None` for leaf entries.
    pub fn preorder(&self) -> Vec<(usize, Option<f64>, &O)> {
        let mut out = Vec::new();
        self.root.preorder(0, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manhattan_1d(a: &f64, b: &f64) -> f64 {
        (a - b).abs()
    }

    fn new_tree(max_node_size: usize) -> MTree<f64, fn(&f64, &f64) -> f64> {
        MTree::new(manhattan_1d, max_node_size).unwrap()
    }

    #[test]
    fn test_rejects_small_capacity() {
        let err = MTree::new(manhattan_1d as fn(&f64, &f64) -> f64, 1).unwrap_err();
        assert!(matches!(err, MTreeError::InvalidCapacity { capacity: 1 }));
    }

    #[test]
    fn test_empty_tree_knn_is_empty() {
        let tree = new_tree(4);
        assert!(tree.knn(&42.0, 3).unwrap().is_empty());
    }

    #[test]
    fn test_insert_and_range_scenario() {
        let mut tree = new_tree(4);
        for v in [0.0, 10.0, 20.0, 30.0, 40.0] {
            tree.insert(v).unwrap();
        }
        let mut found: Vec<f64> = tree.range(&15.0, 6.0).unwrap().into_iter().copied().collect();
        found.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(found, vec![10.0, 20.0]);
    }

    #[test]
    fn test_range_rejects_negative_radius() {
        let tree = new_tree(4);
        assert!(matches!(
            tree.range(&0.0, -1.0),
            Err(MTreeError::InvalidRadius { radius }) if radius == -1.0
        ));
    }

    #[test]
    fn test_knn_scenario() {
        let mut tree = new_tree(4);
        for v in 1..=9 {
            tree.insert(v as f64).unwrap();
        }
        let mut found: Vec<f64> = tree.knn(&5.0, 3).unwrap().into_iter().copied().collect();
        found.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(found, vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_duplicate_objects() {
        let mut tree = new_tree(4);
        for _ in 0..6 {
            tree.insert(0.0).unwrap();
        }
        assert_eq!(tree.len(), 6);
        assert_eq!(tree.knn(&0.0, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_insertion_order_independence() {
        let mut forward = new_tree(4);
        let mut backward = new_tree(4);
        for v in 1..=8 {
            forward.insert(v as f64).unwrap();
        }
        for v in (1..=8).rev() {
            backward.insert(v as f64).unwrap();
        }
        let mut a: Vec<f64> = forward.knn(&4.0, 5).unwrap().into_iter().copied().collect();
        let mut b: Vec<f64> = backward.knn(&4.0, 5).unwrap().into_iter().copied().collect();
        a.sort_by(|x, y| x.partial_cmp(y).unwrap());
        b.sort_by(|x, y| x.partial_cmp(y).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn test_preorder_depths_agree_with_size() {
        let mut tree = new_tree(2);
        for v in 1..=20 {
            tree.insert(v as f64).unwrap();
        }
        let leaves = tree.preorder().into_iter().filter(|(_, r, _)| r.is_none()).count();
        assert_eq!(leaves, tree.len());
    }
}
