//! Alignment and size arithmetic.

/// Returns `true` if `x` is a nonzero power of two.
#[inline]
pub const fn is_power_of_two(x: usize) -> bool {
    x != 0 && x & (x - 1) == 0
}

/// Round `value` up to the next multiple of `align`.
///
/// `align` must be a nonzero power of two. Returns `None` on overflow.
#[inline]
pub const fn align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(is_power_of_two(align));
    let mask = align - 1;
    match value.checked_add(mask) {
        Some(v) => Some(v & !mask),
        None => None,
    }
}

/// `n` kibibytes in bytes.
#[inline]
pub const fn kib(n: usize) -> usize {
    n << 10
}

/// `n` mebibytes in bytes.
#[inline]
pub const fn mib(n: usize) -> usize {
    n << 20
}

/// `n` gibibytes in bytes.
#[inline]
pub const fn gib(n: usize) -> usize {
    n << 30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_of_two_detection() {
        assert!(!is_power_of_two(0));
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(4096));
        assert!(!is_power_of_two(12));
    }

    #[test]
    fn align_up_rounds_to_multiple() {
        assert_eq!(align_up(0, 8), Some(0));
        assert_eq!(align_up(1, 8), Some(8));
        assert_eq!(align_up(88, 4), Some(88));
        assert_eq!(align_up(89, 4), Some(92));
    }

    #[test]
    fn align_up_overflow_is_none() {
        assert_eq!(align_up(usize::MAX, 2), None);
    }

    #[test]
    fn units() {
        assert_eq!(kib(1), 1024);
        assert_eq!(mib(64), 64 * 1024 * 1024);
        assert_eq!(gib(1), 1 << 30);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn aligned_value_is_smallest_multiple_not_below(
                value in 0usize..1 << 40,
                shift in 0u32..16,
            ) {
                let align = 1usize << shift;
                let aligned = align_up(value, align).unwrap();
                prop_assert_eq!(aligned % align, 0);
                prop_assert!(aligned >= value);
                prop_assert!(aligned - value < align);
            }
        }
    }
}
