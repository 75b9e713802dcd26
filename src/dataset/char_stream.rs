use super::*;

/// How a [`CharStream`] picks its windows
///
/// # Variants
///
/// - `Random` - Every window starts at a random position of the corpus
/// - `Sequential` - Batch lane `b` walks its own contiguous slice of the corpus, so
///   consecutive batches continue each other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOrder {
    Random,
    Sequential,
}

/// Next-character prediction batches over a text corpus.
///
/// The vocabulary is the sorted set of distinct characters in the corpus.
/// Each batch holds `batch_size` windows of `seq_len` characters; the labels
/// of a window are the same characters shifted one position forward.
///
/// # Fields
///
/// - `corpus` - The corpus as vocabulary indices
/// - `vocab` - Character of every vocabulary index
/// - `index` - Vocabulary index of every character
/// - `batch_size` - Windows per batch
/// - `seq_len` - Characters per window
/// - `order` - Window selection order
/// - `rng` - Random source for [`BatchOrder::Random`]
/// - `cursors` - Per-lane offsets for [`BatchOrder::Sequential`]
///
/// # Example
/// ```rust
/// use deeprnn::dataset::{BatchOrder, BatchSource, CharStream};
///
/// let mut stream = CharStream::new("abcabcabcabc", 3, 2, 4, BatchOrder::Sequential, 0).unwrap();
/// let batch = stream.get_batch().unwrap();
///
/// assert_eq!(stream.decode(&batch.data[0]), "abca");
/// assert_eq!(stream.decode(&batch.labels[0]), "bcab");
/// ```
#[derive(Debug, Clone)]
pub struct CharStream {
    corpus: Vec<usize>,
    vocab: Vec<char>,
    index: AHashMap<char, usize>,
    batch_size: usize,
    seq_len: usize,
    order: BatchOrder,
    rng: StdRng,
    cursors: Vec<usize>,
}

impl CharStream {
    /// Builds a stream over `text`
    ///
    /// # Parameters
    ///
    /// - `text` - The corpus
    /// - `max_vocab` - Largest allowed vocabulary, normally the network's output size
    /// - `batch_size` - Windows per batch
    /// - `seq_len` - Characters per window
    /// - `order` - Window selection order
    /// - `seed` - Seed for [`BatchOrder::Random`]
    ///
    /// # Returns
    ///
    /// - `Ok(CharStream)` - The stream
    /// - `Err(ModelError::ConfigurationError)` - If a size is zero, the vocabulary is too large,
    ///   or the corpus is too short for one window per lane
    pub fn new(
        text: &str,
        max_vocab: usize,
        batch_size: usize,
        seq_len: usize,
        order: BatchOrder,
        seed: u64,
    ) -> Result<Self, ModelError> {
        if batch_size == 0 || seq_len == 0 {
            return Err(ModelError::ConfigurationError(format!(
                "batch_size and seq_len must be greater than 0, got {} and {}",
                batch_size, seq_len
            )));
        }

        let mut vocab: Vec<char> = text.chars().collect();
        vocab.sort_unstable();
        vocab.dedup();
        if vocab.len() > max_vocab {
            return Err(ModelError::ConfigurationError(format!(
                "corpus has {} distinct characters, more than the {} output classes",
                vocab.len(),
                max_vocab
            )));
        }

        let index: AHashMap<char, usize> = vocab.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        let corpus: Vec<usize> = text.chars().filter_map(|c| index.get(&c).copied()).collect();

        let needed = match order {
            BatchOrder::Random => seq_len + 1,
            BatchOrder::Sequential => batch_size * seq_len + 1,
        };
        if corpus.len() < needed {
            return Err(ModelError::ConfigurationError(format!(
                "corpus has {} characters, need at least {} for {} windows of {}",
                corpus.len(),
                needed,
                batch_size,
                seq_len
            )));
        }

        Ok(CharStream {
            corpus,
            vocab,
            index,
            batch_size,
            seq_len,
            order,
            rng: StdRng::seed_from_u64(seed),
            cursors: vec![0; batch_size],
        })
    }

    /// Reads the corpus from a UTF-8 text file
    ///
    /// # Parameters
    ///
    /// * `path` - Path of the text file
    ///
    /// # Returns
    ///
    /// - `Ok(String)` - The file contents
    /// - `Err(IoError::StdIoError)` - If the file cannot be read
    pub fn read_corpus<P: AsRef<Path>>(path: P) -> Result<String, IoError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Number of distinct characters
    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// Number of characters in the corpus
    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    /// Whether the corpus is empty; never true for a constructed stream
    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }

    /// Characters per window
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// Maps a string to vocabulary indices
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<usize>)` - One index per character
    /// - `Err(ModelError::InputValidationError)` - If a character is not in the vocabulary
    pub fn encode(&self, text: &str) -> Result<Vec<usize>, ModelError> {
        text.chars()
            .map(|c| {
                self.index.get(&c).copied().ok_or_else(|| {
                    ModelError::InputValidationError(format!("character {:?} is not in the vocabulary", c))
                })
            })
            .collect()
    }

    /// Maps vocabulary indices back to a string; unknown indices are skipped
    pub fn decode(&self, indices: &[usize]) -> String {
        indices.iter().filter_map(|&i| self.vocab.get(i)).collect()
    }

    /// Moves every sequential lane back to its start
    pub fn reset(&mut self) {
        self.cursors.iter_mut().for_each(|c| *c = 0);
    }

    fn window(&self, start: usize) -> (Vec<usize>, Vec<usize>) {
        let data = self.corpus[start..start + self.seq_len].to_vec();
        let labels = self.corpus[start + 1..start + self.seq_len + 1].to_vec();
        (data, labels)
    }
}

impl BatchSource for CharStream {
    fn get_batch(&mut self) -> Result<Batch, ModelError> {
        let mut data = Vec::with_capacity(self.batch_size);
        let mut labels = Vec::with_capacity(self.batch_size);

        match self.order {
            BatchOrder::Random => {
                let last_start = self.corpus.len() - self.seq_len - 1;
                for _ in 0..self.batch_size {
                    let start = self.rng.random_range(0..=last_start);
                    let (d, l) = self.window(start);
                    data.push(d);
                    labels.push(l);
                }
            }
            BatchOrder::Sequential => {
                let lane_len = (self.corpus.len() - 1) / self.batch_size;
                for b in 0..self.batch_size {
                    if self.cursors[b] + self.seq_len > lane_len {
                        self.cursors[b] = 0;
                    }
                    let (d, l) = self.window(b * lane_len + self.cursors[b]);
                    self.cursors[b] += self.seq_len;
                    data.push(d);
                    labels.push(l);
                }
            }
        }

        Ok(Batch { data, labels })
    }
}
