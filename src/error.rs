//! ## Custom Errors
//!
//! This module defines the errors surfaced by the public API.

use std::error::Error;
use std::fmt;

/// Errors returned by [`crate::MTree`](crate::tree::MTree) operations.
#[derive(Debug)]
pub enum MTreeError {
    /// Occurs when `max_node_size` is smaller than 2.
    InvalidCapacity {
        /// The capacity value that was provided.
        capacity: usize,
    },
    /// Occurs when a negative radius is passed to a range query.
    InvalidRadius {
        /// The radius value that was provided.
        radius: f64,
    },
    /// Occurs when the distance function returns a negative, `NaN`, or
    /// infinite value.
    DistanceFault {
        /// The offending value returned by the distance function.
        value: f64,
    },
}

impl fmt::Display for MTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MTreeError::InvalidCapacity { capacity } => {
                write!(
                    f,
                    "invalid capacity: {capacity}. max_node_size must be at least 2"
                )
            }
            MTreeError::InvalidRadius { radius } => {
                write!(f, "invalid radius: {radius}. radius must be non-negative")
            }
            MTreeError::DistanceFault { value } => {
                write!(
                    f,
                    "distance function returned {value}, which is not a finite non-negative number"
                )
            }
        }
    }
}

impl Error for MTreeError {}
