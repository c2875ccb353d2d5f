//! Indexable dataset adapter and mini-batch production.

use ndarray::Array2;
use rand::prelude::*;

use crate::tokenizer::Encoding;

/// Encoded examples plus labels, addressable by index.
pub struct EncodedDataset {
    encodings: Vec<Encoding>,
    labels: Vec<usize>,
}

/// One example as returned by [`EncodedDataset::item`].
#[derive(Debug, Clone)]
pub struct Item<'a> {
    /// Fixed-width token IDs.
    pub input_ids: &'a [u32],
    /// Attention mask over the IDs.
    pub attention_mask: &'a [u8],
    /// Class index.
    pub label: usize,
}

impl EncodedDataset {
    /// Pair encodings with labels.
    ///
    /// Panics if the two sequences differ in length; the pairing is
    /// positional and a mismatch is a programming error.
    #[must_use]
    pub fn new(encodings: Vec<Encoding>, labels: Vec<usize>) -> Self {
        assert_eq!(
            encodings.len(),
            labels.len(),
            "encodings and labels must pair up ({} vs {})",
            encodings.len(),
            labels.len()
        );
        Self { encodings, labels }
    }

    /// Number of examples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the dataset is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Fetch example `index`.
    ///
    /// Panics on out-of-range access; indexing past the end is a bug in the
    /// caller, not a recoverable condition.
    #[must_use]
    pub fn item(&self, index: usize) -> Item<'_> {
        assert!(
            index < self.len(),
            "dataset index {index} out of range (len {})",
            self.len()
        );
        Item {
            input_ids: &self.encodings[index].input_ids,
            attention_mask: &self.encodings[index].attention_mask,
            label: self.labels[index],
        }
    }
}

/// A fixed-size group of examples processed in one optimizer step.
///
/// Rows share the dataset's fixed encoding width, so the stacked matrices
/// are rectangular by construction.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Token IDs, `[batch, max_len]`.
    pub input_ids: Array2<u32>,
    /// Attention mask, `[batch, max_len]`.
    pub attention_mask: Array2<u8>,
    /// Class index per row.
    pub labels: Vec<usize>,
}

impl Batch {
    /// Number of examples in the batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.labels.len()
    }

    /// Encoding width.
    #[must_use]
    pub fn seq_len(&self) -> usize {
        self.input_ids.ncols()
    }
}

/// Produces batches of at most `batch_size` examples from a dataset.
///
/// With shuffling on, each call to [`epoch_batches`](Self::epoch_batches)
/// reorders the dataset with a seed derived from `base_seed + epoch`:
/// different order every epoch, identical order across runs. With shuffling
/// off the pass is a single deterministic in-order sweep (the validation
/// contract).
pub struct BatchLoader<'a> {
    dataset: &'a EncodedDataset,
    batch_size: usize,
    shuffle: bool,
    base_seed: u64,
}

impl<'a> BatchLoader<'a> {
    /// Create a loader.
    ///
    /// Panics if `batch_size` is zero.
    #[must_use]
    pub fn new(dataset: &'a EncodedDataset, batch_size: usize, shuffle: bool, seed: u64) -> Self {
        assert!(batch_size > 0, "batch_size must be > 0");
        Self {
            dataset,
            batch_size,
            shuffle,
            base_seed: seed,
        }
    }

    /// Number of batches per pass.
    #[must_use]
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// One full pass over the dataset as a lazy batch sequence.
    pub fn epoch_batches(&self, epoch: usize) -> impl Iterator<Item = Batch> + '_ {
        let mut indices: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.base_seed.wrapping_add(epoch as u64));
            indices.shuffle(&mut rng);
        }

        let batch_size = self.batch_size;
        (0..self.num_batches()).map(move |b| {
            let start = b * batch_size;
            let end = (start + batch_size).min(indices.len());
            self.collate(&indices[start..end])
        })
    }

    /// Stack the given examples into one batch.
    fn collate(&self, indices: &[usize]) -> Batch {
        let rows = indices.len();
        let width = if rows > 0 {
            self.dataset.item(indices[0]).input_ids.len()
        } else {
            0
        };

        let mut input_ids = Array2::zeros((rows, width));
        let mut attention_mask = Array2::zeros((rows, width));
        let mut labels = Vec::with_capacity(rows);

        for (row, &idx) in indices.iter().enumerate() {
            let item = self.dataset.item(idx);
            for (col, &id) in item.input_ids.iter().enumerate() {
                input_ids[[row, col]] = id;
            }
            for (col, &m) in item.attention_mask.iter().enumerate() {
                attention_mask[[row, col]] = m;
            }
            labels.push(item.label);
        }

        Batch {
            input_ids,
            attention_mask,
            labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_dataset(n: usize, width: usize) -> EncodedDataset {
        let encodings: Vec<Encoding> = (0..n)
            .map(|i| Encoding {
                input_ids: (0..width).map(|j| (i * width + j) as u32).collect(),
                attention_mask: vec![1; width],
            })
            .collect();
        let labels: Vec<usize> = (0..n).map(|i| i % 2).collect();
        EncodedDataset::new(encodings, labels)
    }

    #[test]
    fn len_matches_label_count() {
        let ds = make_dataset(7, 4);
        assert_eq!(ds.len(), 7);
        assert!(!ds.is_empty());
    }

    #[test]
    fn item_carries_ids_mask_and_label() {
        let ds = make_dataset(3, 4);
        let item = ds.item(1);
        assert_eq!(item.input_ids, &[4, 5, 6, 7]);
        assert_eq!(item.attention_mask, &[1, 1, 1, 1]);
        assert_eq!(item.label, 1);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn item_out_of_range_panics() {
        let ds = make_dataset(3, 4);
        let _ = ds.item(3);
    }

    #[test]
    #[should_panic(expected = "must pair up")]
    fn mismatched_lengths_panic() {
        let encodings = vec![Encoding {
            input_ids: vec![1, 2],
            attention_mask: vec![1, 1],
        }];
        let _ = EncodedDataset::new(encodings, vec![0, 1]);
    }

    #[test]
    fn batches_cover_all_examples() {
        let ds = make_dataset(10, 4);
        let loader = BatchLoader::new(&ds, 3, false, 42);
        assert_eq!(loader.num_batches(), 4);

        let batches: Vec<Batch> = loader.epoch_batches(0).collect();
        assert_eq!(batches.len(), 4);
        let total: usize = batches.iter().map(Batch::batch_size).sum();
        assert_eq!(total, 10);
        // Last batch holds the remainder.
        assert_eq!(batches[3].batch_size(), 1);
    }

    #[test]
    fn unshuffled_pass_preserves_order() {
        let ds = make_dataset(4, 2);
        let loader = BatchLoader::new(&ds, 2, false, 42);
        let batches: Vec<Batch> = loader.epoch_batches(0).collect();
        assert_eq!(batches[0].input_ids[[0, 0]], 0);
        assert_eq!(batches[0].input_ids[[1, 0]], 2);
        assert_eq!(batches[1].input_ids[[0, 0]], 4);
    }

    #[test]
    fn shuffled_order_differs_per_epoch_but_not_per_run() {
        let ds = make_dataset(32, 2);
        let loader = BatchLoader::new(&ds, 32, true, 42);

        let first = |epoch: usize| -> Vec<u32> {
            let batch = loader
                .epoch_batches(epoch)
                .next()
                .expect("one batch expected");
            batch.input_ids.column(0).to_vec()
        };

        assert_ne!(first(0), first(1), "epochs should reshuffle");
        assert_eq!(first(0), first(0), "same epoch should reproduce");
    }

    #[test]
    fn batch_shapes_are_rectangular() {
        let ds = make_dataset(5, 6);
        let loader = BatchLoader::new(&ds, 2, false, 42);
        for batch in loader.epoch_batches(0) {
            assert_eq!(batch.input_ids.ncols(), 6);
            assert_eq!(batch.attention_mask.dim(), batch.input_ids.dim());
            assert_eq!(batch.labels.len(), batch.input_ids.nrows());
        }
    }
}
