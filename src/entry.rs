//! ## Entries
//!
//! An [`Entry`] is the unit stored in a [`crate::node::Node`]: either a leaf
//! entry holding an indexed object, or a routing entry anchoring a subtree.

use crate::node::Node;

/// A single slot inside a node.
///
/// Leaf entries hold an indexed object; routing entries additionally hold a
/// covering radius and the subtree they anchor. `distance_to_parent` caches
/// the distance from this entry's object to the routing object of the
/// parent node, and is `None` exactly when the entry lives in the root.
#[derive(Debug, Clone)]
pub enum Entry<O> {
    /// A leaf entry: a plain indexed object.
    Leaf {
        /// The indexed object.
        obj: O,
        /// Cached distance to the parent node's routing object.
        distance_to_parent: Option<f64>,
    },
    /// A routing entry: anchors a subtree.
    Routing {
        /// The routing object for `subtree`.
        obj: O,
        /// Cached distance to the parent node's routing object.
        distance_to_parent: Option<f64>,
        /// Covering radius: an upper bound on `d(obj, x)` for any `x`
        /// reachable in `subtree`.
        radius: f64,
        /// The subtree this entry routes to.
        subtree: Box<Node<O>>,
    },
}

impl<O> Entry<O> {
    /// Returns a reference to the entry's object (the indexed object for a
    /// leaf entry, the routing object for a routing entry).
    pub fn obj(&self) -> &O {
        match self {
            Entry::Leaf { obj, .. } => obj,
            Entry::Routing { obj, .. } => obj,
        }
    }

    /// Returns the cached distance to the parent's routing object, or
    /// `None` if this entry lives in the root node.
    pub fn distance_to_parent(&self) -> Option<f64> {
        match self {
            Entry::Leaf {
                distance_to_parent, ..
            } => *distance_to_parent,
            Entry::Routing {
                distance_to_parent, ..
            } => *distance_to_parent,
        }
    }

    pub(crate) fn set_distance_to_parent(&mut self, value: Option<f64>) {
        match self {
            Entry::Leaf {
                distance_to_parent, ..
            } => *distance_to_parent = value,
            Entry::Routing {
                distance_to_parent, ..
            } => *distance_to_parent = value,
        }
    }

    /// The covering radius of a routing entry, or `0.0` for a leaf entry.
    pub fn radius(&self) -> f64 {
        match self {
            Entry::Leaf { .. } => 0.0,
            Entry::Routing { radius, .. } => *radius,
        }
    }

    pub(crate) fn is_routing(&self) -> bool {
        matches!(self, Entry::Routing { .. })
    }
}
