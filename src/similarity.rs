//! Positional divergence between two landmark sets.

use std::collections::HashMap;

use crate::landmark::Landmark;

/// Mean Euclidean distance over landmarks present (by id) in both sets.
///
/// 0.0 when every matched pair is identical, growing with aggregate
/// divergence. Ids present in only one set are ignored; no overlap scores
/// 0.0 rather than erroring.
pub fn score(a: &[Landmark], b: &[Landmark]) -> f32 {
    let by_id: HashMap<u32, &Landmark> = b.iter().map(|lm| (lm.id, lm)).collect();

    let mut sum = 0.0f32;
    let mut matched = 0usize;
    for lm in a {
        if let Some(other) = by_id.get(&lm.id) {
            let dx = lm.x - other.x;
            let dy = lm.y - other.y;
            let dz = lm.z - other.z;
            sum += (dx * dx + dy * dy + dz * dz).sqrt();
            matched += 1;
        }
    }

    if matched == 0 {
        0.0
    } else {
        sum / matched as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_sets_score_zero() {
        let a = vec![
            Landmark::new(0, 0.1, 0.2, 0.3),
            Landmark::new(1, 0.4, 0.5, 0.6),
        ];
        assert_eq!(score(&a, &a), 0.0);
    }

    #[test]
    fn test_known_distance() {
        let a = vec![Landmark::new(0, 0.0, 0.0, 0.0)];
        let b = vec![Landmark::new(0, 3.0, 4.0, 0.0)];
        assert!((score(&a, &b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_grows_with_divergence() {
        let a = vec![Landmark::new(0, 0.0, 0.0, 0.0)];
        let near = vec![Landmark::new(0, 0.1, 0.0, 0.0)];
        let far = vec![Landmark::new(0, 0.5, 0.0, 0.0)];
        assert!(score(&a, &far) > score(&a, &near));
    }

    #[test]
    fn test_unmatched_ids_ignored() {
        let a = vec![
            Landmark::new(0, 0.0, 0.0, 0.0),
            Landmark::new(9, 100.0, 100.0, 100.0),
        ];
        let b = vec![
            Landmark::new(0, 1.0, 0.0, 0.0),
            Landmark::new(7, -100.0, -100.0, -100.0),
        ];
        // only id 0 is compared
        assert!((score(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_overlap_scores_zero() {
        let a = vec![Landmark::new(0, 0.0, 0.0, 0.0)];
        let b = vec![Landmark::new(1, 9.0, 9.0, 9.0)];
        assert_eq!(score(&a, &b), 0.0);
    }
}
