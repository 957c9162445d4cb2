//! Splitting transfer work into batches sized for the transfer pool.

/// Batch size for `size` items spread over `core` workers.
///
/// Returns `1` when there are fewer items than workers or no workers at all,
/// otherwise `size / core`.
#[must_use]
pub const fn parallel_batch_size(size: usize, core: usize) -> usize {
    if core == 0 || size < core {
        1
    } else {
        size / core
    }
}

/// Split `items` into consecutive batches of `size`, preserving order.
///
/// The last batch holds the remainder. A `size` of zero is treated as one.
#[must_use]
pub fn batch<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut current = Vec::with_capacity(size);
    for item in items {
        current.push(item);
        if current.len() == size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_follows_worker_count() {
        assert_eq!(parallel_batch_size(100, 40), 2);
        assert_eq!(parallel_batch_size(1_000, 40), 25);
        assert_eq!(parallel_batch_size(10, 40), 1);
        assert_eq!(parallel_batch_size(40, 40), 1);
        assert_eq!(parallel_batch_size(500, 0), 1);
        assert_eq!(parallel_batch_size(0, 8), 1);
    }

    #[test]
    fn batch_preserves_order_and_remainder() {
        let batches = batch((1..=7).collect(), 3);
        assert_eq!(batches, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
    }

    #[test]
    fn batch_handles_empty_and_zero_size() {
        assert!(batch(Vec::<u8>::new(), 4).is_empty());
        assert_eq!(batch(vec!['a', 'b'], 0), vec![vec!['a'], vec!['b']]);
    }
}
