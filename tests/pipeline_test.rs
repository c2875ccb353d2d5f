//! End-to-end pipeline tests on a tiny encoder.

use afinar::corpus::{self, Example, Record};
use afinar::dataset::{BatchLoader, EncodedDataset};
use afinar::eval::evaluate;
use afinar::model::{Encoder, EncoderConfig};
use afinar::{persist, ClassifierPipeline, TextEncoder, Trainer};

const CATEGORIES: [&str; 2] = ["rec.sport.baseball", "sci.space"];

/// Twenty records, ten per category.
fn make_records() -> Vec<Record> {
    (0..20)
        .map(|i| {
            let (text, label_text) = if i % 2 == 0 {
                (format!("the shortstop turned two in inning {i}"), CATEGORIES[0])
            } else {
                (format!("telemetry from orbit pass {i} looked nominal"), CATEGORIES[1])
            };
            Record {
                text,
                label_text: label_text.to_string(),
            }
        })
        .collect()
}

/// Tiny encoder config sized to the GPT-2 vocabulary so real token IDs
/// resolve to embeddings.
fn tiny_config(vocab_size: usize) -> EncoderConfig {
    EncoderConfig {
        vocab_size,
        ..EncoderConfig::tiny()
    }
}

fn encode_split(
    text_encoder: &TextEncoder,
    examples: &[Example],
) -> EncodedDataset {
    let texts: Vec<&str> = examples.iter().map(|e| e.text.as_str()).collect();
    EncodedDataset::new(
        text_encoder.encode_all(&texts),
        examples.iter().map(|e| e.label).collect(),
    )
}

#[test]
fn twenty_examples_split_into_sixteen_and_four() {
    let examples = corpus::filter_and_label(&make_records(), &CATEGORIES);
    assert_eq!(examples.len(), 20);

    let (train, val) = corpus::split_examples(&examples, 0.2, 42);
    assert_eq!(train.len(), 16);
    assert_eq!(val.len(), 4);
}

#[test]
fn full_run_trains_evaluates_and_saves() {
    let examples = corpus::filter_and_label(&make_records(), &CATEGORIES);
    let (train_examples, val_examples) = corpus::split_examples(&examples, 0.2, 42);

    let text_encoder = TextEncoder::gpt2(16);
    let train_dataset = encode_split(&text_encoder, &train_examples);
    let val_dataset = encode_split(&text_encoder, &val_examples);

    let encoder = Encoder::new(&tiny_config(text_encoder.vocab_size()));
    let pipeline = ClassifierPipeline::new(encoder, 2, 1e-3);

    let train_loader = BatchLoader::new(&train_dataset, 8, true, 42);
    let val_loader = BatchLoader::new(&val_dataset, 8, false, 42);

    let mut trainer = Trainer::new(pipeline, train_loader, val_loader, &CATEGORIES, 2);
    let result = trainer.fit();

    assert_eq!(result.epoch_metrics.len(), 2);
    for m in &result.epoch_metrics {
        assert!(m.train_loss.is_finite() && m.train_loss > 0.0);
        assert!(m.val_loss.is_finite());
        assert!((0.0..=1.0).contains(&m.val_accuracy));
    }

    // Persist and reload; predictions must survive the round trip.
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("newsgroup_classifier");
    let pipeline = trainer.into_pipeline();
    persist::save_pretrained(&pipeline, &text_encoder, &out).expect("save");

    let restored = persist::load_pretrained(&out, 1e-3).expect("load");
    let item = val_dataset.item(0);
    let (_, before) = pipeline.forward_only(item.input_ids, item.attention_mask, item.label);
    let (_, after) = restored.forward_only(item.input_ids, item.attention_mask, item.label);
    assert_eq!(before, after);
}

#[test]
fn zero_epoch_run_leaves_parameters_at_initialization() {
    let examples = corpus::filter_and_label(&make_records(), &CATEGORIES);
    let (train_examples, val_examples) = corpus::split_examples(&examples, 0.2, 42);

    let text_encoder = TextEncoder::gpt2(16);
    let train_dataset = encode_split(&text_encoder, &train_examples);
    let val_dataset = encode_split(&text_encoder, &val_examples);

    let encoder = Encoder::new(&tiny_config(text_encoder.vocab_size()));
    let pipeline = ClassifierPipeline::new(encoder, 2, 1e-3);
    let weight_before = pipeline.head.weight.data().to_vec();

    let mut trainer = Trainer::new(
        pipeline,
        BatchLoader::new(&train_dataset, 8, true, 42),
        BatchLoader::new(&val_dataset, 8, false, 42),
        &CATEGORIES,
        0,
    );
    let result = trainer.fit();

    assert!(result.epoch_metrics.is_empty());
    assert_eq!(
        trainer.pipeline().head.weight.data().to_vec(),
        weight_before
    );
}

#[test]
fn evaluation_is_idempotent_on_an_unchanged_model() {
    let examples = corpus::filter_and_label(&make_records(), &CATEGORIES);
    let (_, val_examples) = corpus::split_examples(&examples, 0.2, 42);

    let text_encoder = TextEncoder::gpt2(16);
    let val_dataset = encode_split(&text_encoder, &val_examples);
    let val_loader = BatchLoader::new(&val_dataset, 8, false, 42);

    let encoder = Encoder::new(&tiny_config(text_encoder.vocab_size()));
    let pipeline = ClassifierPipeline::new(encoder, 2, 1e-3);

    let first = evaluate(&pipeline, &val_loader, &CATEGORIES);
    let second = evaluate(&pipeline, &val_loader, &CATEGORIES);

    assert_eq!(first.accuracy, second.accuracy);
    assert_eq!(first.avg_loss, second.avg_loss);
    assert_eq!(first.precision, second.precision);
    assert_eq!(first.recall, second.recall);
    assert_eq!(first.f1, second.f1);
    assert_eq!(first.confusion_matrix, second.confusion_matrix);
}

#[test]
fn split_membership_is_identical_across_runs() {
    let examples = corpus::filter_and_label(&make_records(), &CATEGORIES);

    let (train_a, val_a) = corpus::split_examples(&examples, 0.2, 42);
    let (train_b, val_b) = corpus::split_examples(&examples, 0.2, 42);

    let texts = |xs: &[Example]| xs.iter().map(|e| e.text.clone()).collect::<Vec<_>>();
    assert_eq!(texts(&train_a), texts(&train_b));
    assert_eq!(texts(&val_a), texts(&val_b));
}
