#![allow(dead_code)]

use criterion::Criterion;
use mtreers::MTree;
use tracing::{debug, info};

pub const BENCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
pub const BENCH_NUM_INSERT: i32 = 500;
pub const BENCH_NODE_CAPACITY: usize = 16;
pub const BENCH_KNN_SIZE: usize = 5;
pub const BENCH_RANGE_RADIUS: f64 = 25.0;

/// Configures Criterion using the shared benchmark timeout.
pub fn configure_criterion() -> Criterion {
    Criterion::default().measurement_time(BENCH_TIMEOUT)
}

pub fn manhattan_1d(a: &f64, b: &f64) -> f64 {
    (a - b).abs()
}

pub fn generate_values() -> Vec<f64> {
    info!("Generating 1D data with {} points", BENCH_NUM_INSERT);
    let data: Vec<f64> = (0..BENCH_NUM_INSERT)
        .map(|i| {
            let v = (i as f64 * 37.0) % 1000.0;
            debug!("Generated value: {}", v);
            v
        })
        .collect();
    info!("Finished generating 1D data ({} points)", data.len());
    data
}

pub fn new_populated_tree(values: &[f64]) -> MTree<f64, fn(&f64, &f64) -> f64> {
    let mut tree = MTree::new(manhattan_1d as fn(&f64, &f64) -> f64, BENCH_NODE_CAPACITY).unwrap();
    for &v in values {
        tree.insert(v).unwrap();
    }
    tree
}
