//! Random selection order.

use rand::seq::SliceRandom;

use crate::load_balancer::{backend::BackendId, SelectionOrder};

/// Uniform random permutation of the candidates.
#[derive(Debug, Default, Clone, Copy)]
pub struct Shuffled;

impl SelectionOrder for Shuffled {
    fn order(&self, candidates: &[BackendId]) -> Vec<BackendId> {
        let mut ordered = candidates.to_vec();
        ordered.shuffle(&mut rand::thread_rng());
        ordered
    }
}
