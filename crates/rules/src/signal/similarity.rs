//! Cosine similarity between pattern vectors.

/// Cosine similarity in `[-1, 1]`.
///
/// Returns 0.0 when the lengths differ, either vector has zero magnitude,
/// or the inputs are not finite. Never returns NaN.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut mag_a = 0.0;
    let mut mag_b = 0.0;
    for (&ai, &bi) in a.iter().zip(b) {
        dot += ai * bi;
        mag_a += ai * ai;
        mag_b += bi * bi;
    }

    let denom = mag_a.sqrt() * mag_b.sqrt();
    if !denom.is_finite() || denom < f64::EPSILON {
        return 0.0;
    }

    let sim = dot / denom;
    if sim.is_finite() {
        sim.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_are_one() {
        let v = [0.3, 0.0, 1.2, 4.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn symmetric_and_bounded() {
        let a = [1.0, 2.0, -3.0];
        let b = [-0.5, 4.0, 2.0];
        let ab = cosine_similarity(&a, &b);
        assert_eq!(ab, cosine_similarity(&b, &a));
        assert!((-1.0..=1.0).contains(&ab));
        assert!((cosine_similarity(&a, &[-1.0, -2.0, 3.0]) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn orthogonal_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn degenerate_inputs_are_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[f64::NAN, 1.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[f64::INFINITY, 1.0], &[1.0, 1.0]), 0.0);
    }
}
