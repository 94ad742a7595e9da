//! Remainder-biased contiguous splitting.
//!
//! `n` items are divided into `k` contiguous runs. Every run gets `n / k`
//! items and the first `n % k` runs get one more.

use std::ops::Range;

/// Number of items each of `k` destinations receives.
pub fn split_counts(n: usize, k: usize) -> Vec<usize> {
    if k == 0 {
        return Vec::new();
    }

    let base = n / k;
    let remainder = n % k;

    (0..k)
        .map(|i| {
            // Destinations with index < remainder get one extra item
            let extra = if i < remainder { 1 } else { 0 };
            base + extra
        })
        .collect()
}

/// Index ranges into the sorted item list, one per destination.
pub fn split_ranges(n: usize, k: usize) -> Vec<Range<usize>> {
    let mut start = 0;
    split_counts(n, k)
        .into_iter()
        .map(|count| {
            let range = start..start + count;
            start = range.end;
            range
        })
        .collect()
}
