//! Mapping from signal strength to confidence.
//!
//! Branch confidences are fixed per strategy and asserted by callers, so they
//! live as named constants next to each strategy. The helpers here cover the
//! strategies whose confidence grows with how far a threshold was exceeded.

/// Hard ceiling for any scaled confidence.
pub const MAX_CONFIDENCE: f64 = 1.0;

/// `base + span * min(1, strength)`, clamped to `[0, MAX_CONFIDENCE]`.
///
/// `strength` is a non-negative, already normalized excess over a threshold;
/// negative or NaN strength contributes nothing.
pub fn scaled(base: f64, span: f64, strength: f64) -> f64 {
    let strength = if strength.is_nan() { 0.0 } else { strength.clamp(0.0, 1.0) };
    (base + span * strength).clamp(0.0, MAX_CONFIDENCE)
}

/// `|value| / reference`, 0 when the reference is not positive.
pub fn normalized(value: f64, reference: f64) -> f64 {
    if reference > 0.0 && reference.is_finite() {
        value.abs() / reference
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_is_capped() {
        assert_eq!(scaled(0.65, 0.30, 5.0), 0.95);
        assert_eq!(scaled(0.9, 0.5, 1.0), MAX_CONFIDENCE);
    }

    #[test]
    fn any_positive_strength_exceeds_base() {
        assert!(scaled(0.65, 0.30, 1e-6) > 0.65);
        assert_eq!(scaled(0.65, 0.30, -1.0), 0.65);
        assert_eq!(scaled(0.65, 0.30, f64::NAN), 0.65);
    }

    #[test]
    fn normalized_guards_reference() {
        assert_eq!(normalized(-3.0, 2.0), 1.5);
        assert_eq!(normalized(3.0, 0.0), 0.0);
    }
}
