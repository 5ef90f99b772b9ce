//! Batch Scorer
//!
//! Scores a finite set of flows through the same transform and ensemble
//! as the live loop, and summarizes verdicts per model.

use std::io::BufRead;
use std::path::Path;
use serde::Serialize;

use crate::logic::artifacts::ArtifactStore;
use crate::logic::error::BatchError;
use crate::logic::features::{transform, FeatureVector};
use crate::logic::model::{self, DetectionResult, Verdict};

/// Verdicts for one flow of the batch
#[derive(Debug, Clone, Serialize)]
pub struct FlowVerdicts {
    pub index: usize,
    pub combined_score: f64,
    pub results: Vec<DetectionResult>,
}

/// Per-model totals over the batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub model: String,
    pub benign: usize,
    pub malicious: usize,
    pub failed: usize,
    /// Mean probability over the flows the model scored
    pub mean_probability: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total_flows: usize,
    pub models: Vec<ModelSummary>,
    pub predictions: Vec<FlowVerdicts>,
}

/// Score every flow. Stops at the first flow that cannot be transformed.
pub fn score_batch(flows: &[FeatureVector], store: &ArtifactStore) -> Result<BatchReport, BatchError> {
    let mut predictions = Vec::with_capacity(flows.len());

    for (index, flow) in flows.iter().enumerate() {
        let input = transform(flow, store)
            .map_err(|source| BatchError::Transform { index, source })?;
        let results = model::score(&input, store.models());
        predictions.push(FlowVerdicts {
            index,
            combined_score: input.combined_score(),
            results,
        });
    }

    let models = summarize(store, &predictions);
    log::info!("Scored {} flows with {} models", flows.len(), models.len());

    Ok(BatchReport {
        total_flows: flows.len(),
        models,
        predictions,
    })
}

fn summarize(store: &ArtifactStore, predictions: &[FlowVerdicts]) -> Vec<ModelSummary> {
    store
        .models()
        .iter()
        .enumerate()
        .map(|(slot, entry)| {
            let mut summary = ModelSummary {
                model: entry.name().to_string(),
                benign: 0,
                malicious: 0,
                failed: 0,
                mean_probability: None,
            };
            let mut sum = 0.0;

            for flow in predictions {
                let result = &flow.results[slot];
                match result.verdict {
                    Verdict::Benign => summary.benign += 1,
                    Verdict::Malicious => summary.malicious += 1,
                    Verdict::Error => summary.failed += 1,
                }
                sum += result.probability.unwrap_or(0.0);
            }

            let scored = summary.benign + summary.malicious;
            if scored > 0 {
                summary.mean_probability = Some(sum / scored as f64);
            }
            summary
        })
        .collect()
}

/// Read flows from a JSON Lines file, one flat object per line.
/// Blank lines are skipped; line numbers in errors are 1-based.
pub fn read_flows_jsonl(path: &Path) -> Result<Vec<FeatureVector>, BatchError> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);

    let mut flows = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let flow = serde_json::from_str(&line)
            .map_err(|source| BatchError::Parse { line: i + 1, source })?;
        flows.push(flow);
    }

    Ok(flows)
}
