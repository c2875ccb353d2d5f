//! The newsgroup fine-tuning experiment, top to bottom.
//!
//! One linear run with no CLI surface: load and filter the corpus, split,
//! encode, fine-tune for three epochs with inline validation, save the
//! artifact, chart the recorded losses. Input locations are the constants
//! below; any failure aborts the whole run.

use std::path::Path;
use std::process::ExitCode;

use afinar::dataset::{BatchLoader, EncodedDataset};
use afinar::{
    corpus, persist, report, ClassifierPipeline, ComputeDevice, Encoder, Result, TextEncoder,
    TrainConfig, Trainer,
};

/// JSONL snapshot of the `SetFit/20_newsgroups` train split.
const DATASET_SNAPSHOT: &str = "data/20_newsgroups.train.jsonl";
/// Directory holding the pretrained encoder (`config.json`,
/// `model.safetensors`, optionally `tokenizer.json`).
const PRETRAINED_DIR: &str = "models/base-encoder";
/// Output directory for the fine-tuned artifact.
const OUTPUT_DIR: &str = "newsgroup_classifier";
/// The two categories kept for binary classification; the first maps to
/// label 0, the second to label 1.
const CATEGORIES: [&str; 2] = ["rec.sport.baseball", "sci.space"];
/// Fixed encoding width.
const MAX_SEQ_LEN: usize = 512;
/// Fraction of examples held out for validation.
const VAL_RATIO: f32 = 0.2;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let device = ComputeDevice::auto_detect();
    println!("Using device: {device}");

    // ── Data acquisition ──────────────────────────────────────────────
    let records = corpus::load_records(Path::new(DATASET_SNAPSHOT))?;
    let examples = corpus::filter_and_label(&records, &CATEGORIES);
    let stats = corpus::corpus_stats(&examples, CATEGORIES.len());
    println!(
        "Loaded {} examples: {} x {}, {} x {} (avg {} chars)",
        stats.total,
        stats.class_counts[0],
        CATEGORIES[0],
        stats.class_counts[1],
        CATEGORIES[1],
        stats.avg_text_len,
    );

    // ── Split ─────────────────────────────────────────────────────────
    let config = TrainConfig::default();
    let (train_examples, val_examples) = corpus::split_examples(&examples, VAL_RATIO, config.seed);
    println!(
        "Train: {}, Validation: {}",
        train_examples.len(),
        val_examples.len()
    );

    // ── Tokenization ──────────────────────────────────────────────────
    let tokenizer_path = Path::new(PRETRAINED_DIR).join("tokenizer.json");
    let text_encoder = if tokenizer_path.exists() {
        TextEncoder::from_file(&tokenizer_path, MAX_SEQ_LEN)?
    } else {
        TextEncoder::gpt2(MAX_SEQ_LEN)
    };

    let train_texts: Vec<&str> = train_examples.iter().map(|e| e.text.as_str()).collect();
    let val_texts: Vec<&str> = val_examples.iter().map(|e| e.text.as_str()).collect();
    let train_dataset = EncodedDataset::new(
        text_encoder.encode_all(&train_texts),
        train_examples.iter().map(|e| e.label).collect(),
    );
    let val_dataset = EncodedDataset::new(
        text_encoder.encode_all(&val_texts),
        val_examples.iter().map(|e| e.label).collect(),
    );

    // ── Model, optimizer, training ────────────────────────────────────
    let encoder = Encoder::from_pretrained(PRETRAINED_DIR)?;
    let pipeline = ClassifierPipeline::new(encoder, CATEGORIES.len(), config.learning_rate);

    let train_loader = BatchLoader::new(&train_dataset, config.batch_size, true, config.seed);
    let val_loader = BatchLoader::new(&val_dataset, config.batch_size, false, config.seed);

    let mut trainer = Trainer::new(pipeline, train_loader, val_loader, &CATEGORIES, config.epochs);
    let result = trainer.fit();

    // ── Persistence ───────────────────────────────────────────────────
    let pipeline = trainer.into_pipeline();
    persist::save_pretrained(&pipeline, &text_encoder, OUTPUT_DIR)?;
    println!("Saved model and tokenizer to {OUTPUT_DIR}/");

    // ── Reporting ─────────────────────────────────────────────────────
    report::print_loss_chart(&result.train_losses(), &result.val_losses());

    Ok(())
}
