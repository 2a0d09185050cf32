//! Fixed-size batching of work items.

use crate::error::ConfigError;
use std::slice::Chunks;

/// An immutable, ordered group of work items submitted as one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    index: usize,
    items: Vec<T>,
}

impl<T> Batch<T> {
    pub fn new(index: usize, items: Vec<T>) -> Self {
        Self { index, items }
    }

    /// Zero-based position of this batch within its run
    pub fn index(&self) -> usize {
        self.index
    }

    /// One-based number used in log lines
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// Lazy iterator over the batches of a slice
///
/// Cloning it restarts the sequence from the clone's position, so the same
/// input always yields the same batches.
#[derive(Debug, Clone)]
pub struct Batches<'a, T> {
    chunks: Chunks<'a, T>,
    next_index: usize,
}

impl<T: Clone> Iterator for Batches<'_, T> {
    type Item = Batch<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.chunks.next()?;
        let batch = Batch::new(self.next_index, chunk.to_vec());
        self.next_index += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl<T: Clone> ExactSizeIterator for Batches<'_, T> {}

/// Splits `items` into batches of `size`, the last one holding the remainder
pub fn split<T: Clone>(items: &[T], size: usize) -> Result<Batches<'_, T>, ConfigError> {
    if size == 0 {
        return Err(ConfigError::invalid("chunk_size", "must be at least 1"));
    }

    Ok(Batches {
        chunks: items.chunks(size),
        next_index: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes_and_order() {
        let items: Vec<u64> = (1..=125).collect();
        let batches: Vec<_> = split(&items, 50).unwrap().collect();

        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![50, 50, 25]);
        assert_eq!(batches[2].index(), 2);
        assert_eq!(batches[2].number(), 3);

        let rejoined: Vec<u64> = batches.into_iter().flat_map(Batch::into_items).collect();
        assert_eq!(rejoined, items);
    }

    #[test]
    fn test_split_counts_match_ceiling() {
        for n in 0..40usize {
            for s in 1..9usize {
                let items: Vec<usize> = (0..n).collect();
                let batches: Vec<_> = split(&items, s).unwrap().collect();
                assert_eq!(batches.len(), n.div_ceil(s), "n={} s={}", n, s);

                for (i, batch) in batches.iter().enumerate() {
                    if i + 1 < batches.len() {
                        assert_eq!(batch.len(), s);
                    } else {
                        let expected = if n % s == 0 { s } else { n % s };
                        assert_eq!(batch.len(), expected);
                    }
                }

                let rejoined: Vec<usize> =
                    batches.iter().flat_map(|b| b.items().to_vec()).collect();
                assert_eq!(rejoined, items);
            }
        }
    }

    #[test]
    fn test_split_is_restartable() {
        let items = vec!["a", "b", "c", "d", "e"];
        let batches = split(&items, 2).unwrap();
        assert_eq!(batches.len(), 3);

        let first: Vec<_> = batches.clone().collect();
        let second: Vec<_> = batches.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_split_rejects_zero_size() {
        let items = vec![1, 2, 3];
        match split(&items, 0) {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "chunk_size"),
            other => panic!("expected InvalidValue, got {:?}", other.map(|b| b.count())),
        }
    }

    #[test]
    fn test_split_empty_input() {
        let items: Vec<u32> = Vec::new();
        assert_eq!(split(&items, 3).unwrap().count(), 0);
    }
}
