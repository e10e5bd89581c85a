//! Edge-set similarity between subgraphs

use crate::cluster::Subgraph;

/// Jaccard index `|A ∩ B| / |A ∪ B|`; two empty sets score 0
pub fn jaccard(a: &Subgraph, b: &Subgraph) -> f64 {
    let union = a.union_len(b);
    if union == 0 {
        return 0.0;
    }
    a.intersection_len(b) as f64 / union as f64
}

/// Merge similarity: Jaccard, except that subsumption (either edge set
/// contained in the other) always scores 1.0
pub fn similarity(a: &Subgraph, b: &Subgraph) -> f64 {
    if a.is_subset_of(b) || b.is_subset_of(a) {
        return 1.0;
    }
    jaccard(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_of_overlapping_sets() {
        let a = Subgraph::new(0, [10, 11]);
        let b = Subgraph::new(1, [11, 12]);
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
        assert!((similarity(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn subset_forces_full_similarity() {
        let small = Subgraph::new(0, [1, 2]);
        let large = Subgraph::new(1, [1, 2, 3, 4, 5, 6, 7, 8]);

        assert!((jaccard(&small, &large) - 0.25).abs() < 1e-12);
        assert_eq!(similarity(&small, &large), 1.0);
        assert_eq!(similarity(&large, &small), 1.0);
    }

    #[test]
    fn disjoint_sets_score_zero() {
        let a = Subgraph::new(0, [1, 2]);
        let b = Subgraph::new(1, [3, 4]);
        assert_eq!(similarity(&a, &b), 0.0);
    }

    #[test]
    fn similarity_is_symmetric() {
        let a = Subgraph::new(0, [1, 2, 3, 4]);
        let b = Subgraph::new(1, [3, 4, 5]);
        assert_eq!(similarity(&a, &b), similarity(&b, &a));
    }
}
