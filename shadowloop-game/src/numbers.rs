//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(0.0)
}

/// Convert a count to f64, saturating absurdly large values.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(f64::MAX)
}

/// Narrow a count to u32, saturating at `u32::MAX`.
#[must_use]
pub fn usize_to_u32(value: usize) -> u32 {
    cast::<usize, u32>(value).unwrap_or(u32::MAX)
}

/// Narrow a count to u16, saturating at `u16::MAX`.
#[must_use]
pub fn usize_to_u16(value: usize) -> u16 {
    cast::<usize, u16>(value).unwrap_or(u16::MAX)
}

/// Share of `part` in `whole` as a percentage, 0.0 when `whole` is zero.
#[must_use]
pub fn ratio_pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    usize_to_f64(part) / usize_to_f64(whole) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowing_saturates() {
        assert_eq!(usize_to_u16(70_000), u16::MAX);
        assert_eq!(usize_to_u32(12), 12);
    }

    #[test]
    fn ratio_handles_empty_denominator() {
        assert!((ratio_pct(3, 0) - 0.0).abs() < f64::EPSILON);
        assert!((ratio_pct(1, 4) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn widening_is_exact_for_small_values() {
        assert!((u64_to_f64(42) - 42.0).abs() < f64::EPSILON);
        assert!((usize_to_f64(7) - 7.0).abs() < f64::EPSILON);
    }
}
