//! Fixed-length encoding adapter over the BPE tokenizer.
//!
//! The tokenizer itself comes from aprender; this module only fixes the
//! output width: every document becomes exactly `max_len` token IDs plus an
//! attention mask, truncating silently past the limit and padding short
//! sequences with the pad token. Truncation is data loss by policy, not an
//! error: overlong newsgroup posts lose their tail.

use std::path::{Path, PathBuf};

use aprender::text::bpe::{load_from_json, BpeTokenizer};

use crate::{Error, Result};

/// GPT-2 BPE end-of-text ID, reused as the pad token.
const GPT2_PAD_ID: u32 = 50256;

/// Fixed-length numeric representation of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    /// Token IDs, exactly `max_len` of them.
    pub input_ids: Vec<u32>,
    /// 1 over real tokens, 0 over padding; same length as `input_ids`.
    pub attention_mask: Vec<u8>,
}

impl Encoding {
    /// Fixed width of the encoding.
    #[must_use]
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    /// Whether the encoding has zero width.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Number of non-padding tokens.
    #[must_use]
    pub fn real_len(&self) -> usize {
        self.attention_mask.iter().filter(|&&m| m == 1).count()
    }
}

/// BPE tokenizer plus the fixed-width padding/truncation policy.
pub struct TextEncoder {
    inner: BpeTokenizer,
    pad_id: u32,
    max_len: usize,
    source_path: Option<PathBuf>,
}

impl TextEncoder {
    /// Encoder over the bundled GPT-2 base vocabulary.
    #[must_use]
    pub fn gpt2(max_len: usize) -> Self {
        assert!(max_len > 0, "max_len must be > 0");
        Self {
            inner: BpeTokenizer::gpt2_base(),
            pad_id: GPT2_PAD_ID,
            max_len,
            source_path: None,
        }
    }

    /// Load the tokenizer from a HuggingFace `tokenizer.json` file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>, max_len: usize) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("Failed to read {}: {e}", path.display())))?;
        let mut encoder = Self::from_json(&json, max_len)?;
        encoder.source_path = Some(path.to_path_buf());
        Ok(encoder)
    }

    /// Load the tokenizer from a `tokenizer.json` string.
    ///
    /// # Errors
    /// Returns an error if the JSON cannot be parsed.
    pub fn from_json(json: &str, max_len: usize) -> Result<Self> {
        assert!(max_len > 0, "max_len must be > 0");
        let inner = load_from_json(json)
            .map_err(|e| Error::Tokenizer(format!("Failed to parse tokenizer JSON: {e}")))?;

        let pad_id = inner
            .token_to_id("<pad>")
            .or_else(|| inner.token_to_id("<|endoftext|>"))
            .or_else(|| inner.token_to_id("[PAD]"))
            .unwrap_or(0);

        Ok(Self {
            inner,
            pad_id,
            max_len,
            source_path: None,
        })
    }

    /// Vocabulary size of the underlying tokenizer.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.inner.vocab_size()
    }

    /// Padding token ID.
    #[must_use]
    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    /// Configured fixed width.
    #[must_use]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// The `tokenizer.json` this encoder was loaded from, if file-backed.
    #[must_use]
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Encode one document to exactly `max_len` IDs plus attention mask.
    #[must_use]
    pub fn encode_fixed(&self, text: &str) -> Encoding {
        let mut input_ids = self.inner.encode(text);
        input_ids.truncate(self.max_len);

        let real = input_ids.len();
        let mut attention_mask = vec![1u8; real];
        input_ids.resize(self.max_len, self.pad_id);
        attention_mask.resize(self.max_len, 0);

        Encoding {
            input_ids,
            attention_mask,
        }
    }

    /// Encode a slice of documents, one fixed-width row each.
    #[must_use]
    pub fn encode_all(&self, texts: &[impl AsRef<str>]) -> Vec<Encoding> {
        texts
            .iter()
            .map(|t| self.encode_fixed(t.as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn short_input_is_padded_to_max_len() {
        let encoder = TextEncoder::gpt2(16);
        let enc = encoder.encode_fixed("hello world");
        assert_eq!(enc.len(), 16);
        assert_eq!(enc.attention_mask.len(), 16);
        assert!(enc.real_len() < 16);
        assert_eq!(enc.input_ids[15], encoder.pad_id());
        assert_eq!(enc.attention_mask[15], 0);
    }

    #[test]
    fn long_input_is_silently_truncated() {
        let encoder = TextEncoder::gpt2(8);
        let long_text = "baseball ".repeat(100);
        let enc = encoder.encode_fixed(&long_text);
        assert_eq!(enc.len(), 8);
        assert_eq!(enc.real_len(), 8);
        assert!(enc.attention_mask.iter().all(|&m| m == 1));
    }

    #[test]
    fn empty_input_is_all_padding() {
        let encoder = TextEncoder::gpt2(8);
        let enc = encoder.encode_fixed("");
        assert_eq!(enc.len(), 8);
        assert_eq!(enc.real_len(), 0);
        assert!(enc.input_ids.iter().all(|&id| id == encoder.pad_id()));
    }

    #[test]
    fn encode_all_one_row_per_document() {
        let encoder = TextEncoder::gpt2(16);
        let texts = vec!["first post".to_string(), "second post".to_string()];
        let encodings = encoder.encode_all(&texts);
        assert_eq!(encodings.len(), 2);
        assert!(encodings.iter().all(|e| e.len() == 16));
    }

    #[test]
    fn mask_is_one_exactly_over_real_tokens() {
        let encoder = TextEncoder::gpt2(32);
        let enc = encoder.encode_fixed("the orbiter reached apogee");
        let real = enc.real_len();
        assert!(enc.attention_mask[..real].iter().all(|&m| m == 1));
        assert!(enc.attention_mask[real..].iter().all(|&m| m == 0));
    }

    #[test]
    fn from_json_invalid_is_an_error() {
        assert!(TextEncoder::from_json("not json", 16).is_err());
    }

    proptest! {
        #[test]
        fn any_input_yields_exactly_max_len(text in ".{0,200}") {
            let encoder = TextEncoder::gpt2(24);
            let enc = encoder.encode_fixed(&text);
            prop_assert_eq!(enc.input_ids.len(), 24);
            prop_assert_eq!(enc.attention_mask.len(), 24);
        }
    }
}
