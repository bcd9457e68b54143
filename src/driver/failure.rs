use std::collections::{BTreeMap, BTreeSet};

use log::info;

/// Reason shown for samples whose job could not be submitted
pub const SUBMISSION_FAILURE_MESSAGE: &str = "Job submission failure";

/// Failure reasons collected over a run
#[derive(Debug, Default)]
pub struct FailureAggregator {
    /// Reasons per sample, in the order they were recorded
    by_sample: BTreeMap<String, Vec<String>>,
    /// Samples whose submission failed, per pipeline
    by_conductor: BTreeMap<String, BTreeSet<String>>,
}

impl FailureAggregator {
    pub fn record(&mut self, sample: &str, reason: impl Into<String>) {
        self.by_sample
            .entry(sample.to_string())
            .or_default()
            .push(reason.into());
    }

    pub fn record_all(&mut self, sample: &str, reasons: impl IntoIterator<Item = String>) {
        for reason in reasons {
            self.record(sample, reason);
        }
    }

    pub fn record_submission_failure(&mut self, conductor: &str, sample: &str) {
        self.by_conductor
            .entry(conductor.to_string())
            .or_default()
            .insert(sample.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.by_sample.is_empty() && self.by_conductor.values().all(BTreeSet::is_empty)
    }

    /// Invert both sources into reason -> samples
    pub fn summarize(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut by_reason: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (sample, reasons) in &self.by_sample {
            for reason in reasons {
                by_reason
                    .entry(reason.clone())
                    .or_default()
                    .insert(sample.clone());
            }
        }
        for samples in self.by_conductor.values().filter(|s| !s.is_empty()) {
            by_reason
                .entry(SUBMISSION_FAILURE_MESSAGE.to_string())
                .or_default()
                .extend(samples.iter().cloned());
        }
        by_reason
    }

    pub fn log_summary(&self) {
        if self.is_empty() {
            return;
        }
        let by_reason = self.summarize();
        if let Some(samples) = by_reason.get(SUBMISSION_FAILURE_MESSAGE) {
            info!(
                "{} samples with at least one failed job submission: {}",
                samples.len(),
                join(samples)
            );
        }
        info!(
            "{} unique reasons for submission failure: {}",
            by_reason.len(),
            by_reason.keys().cloned().collect::<Vec<_>>().join(", ")
        );
        info!("Summary of failures:");
        for (reason, samples) in &by_reason {
            info!("{}: {}", reason, join(samples));
        }
    }
}

fn join(samples: &BTreeSet<String>) -> String {
    samples.iter().cloned().collect::<Vec<_>>().join(", ")
}
