//! Binary newsgroup classifier fine-tuning pipeline.
//!
//! Fine-tunes a pretrained bidirectional text encoder on a two-class subset
//! of the 20 Newsgroups corpus (`rec.sport.baseball` vs `sci.space`),
//! evaluates it on a held-out split after every epoch, saves the resulting
//! model + tokenizer artifact, and renders the recorded loss curves.
//!
//! The pipeline is a single forward flow with no branching architecture:
//!
//! ```text
//! corpus (JSONL) -> filter two categories -> binary labels
//!   -> deterministic 80/20 split
//!   -> fixed-length BPE encodings (512 tokens + attention mask)
//!   -> EncodedDataset -> BatchLoader (batch size 8, shuffled per epoch)
//!   -> Trainer (3 epochs of forward/loss/backward/step, eval inline)
//!   -> save_pretrained + loss chart
//! ```
//!
//! Each stage is an explicit value threaded into the next; there is no
//! module-level mutable state. The base encoder is frozen; the trainable
//! parameters live in the classification head.

pub mod autograd;
pub mod corpus;
pub mod dataset;
pub mod device;
pub mod eval;
pub mod metrics;
pub mod model;
pub mod optim;
pub mod persist;
pub mod pipeline;
pub mod report;
pub mod tokenizer;
pub mod train;

pub use autograd::Tensor;
pub use corpus::{Example, Record};
pub use device::ComputeDevice;
pub use eval::EvalReport;
pub use model::{Encoder, EncoderConfig};
pub use pipeline::ClassifierPipeline;
pub use tokenizer::{Encoding, TextEncoder};
pub use train::{TrainConfig, TrainResult, Trainer};

use thiserror::Error as ThisError;

/// Crate-wide error type.
///
/// Any `Err` aborts the run; there is no retry or partial-failure recovery.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
