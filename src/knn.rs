//! Bounded "k smallest by key" selection.
//!
//! Keys compare with `f64::total_cmp`; equal keys fall back to the item's own
//! ordering, so for point indices the lower index wins a tie.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ndarray::ArrayView1;

struct Candidate<T> {
    key: f64,
    item: T,
}

impl<T: Ord> Ord for Candidate<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .total_cmp(&other.key)
            .then_with(|| self.item.cmp(&other.item))
    }
}

impl<T: Ord> PartialOrd for Candidate<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord> PartialEq for Candidate<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Ord> Eq for Candidate<T> {}

/// Returns the `k` items with the smallest keys, nearest first.
///
/// Fewer than `k` items are returned when the iterator runs dry; callers that
/// need exactly `k` check the length.
pub fn k_smallest_by<T, I, F>(items: I, k: usize, mut key: F) -> Vec<T>
where
    T: Ord,
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> f64,
{
    if k == 0 {
        return Vec::new();
    }

    // Max-heap holding the best k seen so far; the root is the worst of them.
    let mut heap: BinaryHeap<Candidate<T>> = BinaryHeap::with_capacity(k + 1);
    for item in items {
        let candidate = Candidate {
            key: key(&item),
            item,
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().is_some_and(|worst| candidate < *worst) {
            heap.pop();
            heap.push(candidate);
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|candidate| candidate.item)
        .collect()
}

/// Indices of the `k` smallest entries of a distance row, skipping `origin`.
pub fn nearest_in_row(row: ArrayView1<'_, f64>, origin: usize, k: usize) -> Vec<usize> {
    k_smallest_by(
        (0..row.len()).filter(|&j| j != origin),
        k,
        |&j| row[j],
    )
}
