//! Configured (fixed) selection order.

use crate::load_balancer::{backend::BackendId, SelectionOrder};

/// Candidates in the order they were configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct Configured;

impl SelectionOrder for Configured {
    fn order(&self, candidates: &[BackendId]) -> Vec<BackendId> {
        candidates.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_order_is_stable() {
        let candidates: Vec<BackendId> = vec!["p1".into(), "p2".into(), "p3".into()];
        for _ in 0..10 {
            assert_eq!(Configured.order(&candidates), candidates);
        }
    }
}
