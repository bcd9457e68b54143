use std::path::PathBuf;

/// Lumping thresholds; an absent threshold never triggers
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Thresholds {
    pub max_cmds: Option<usize>,
    /// Cumulative input size in GB
    pub max_size: Option<f64>,
}

/// One unit of work waiting to be submitted
#[derive(Debug, Clone)]
pub struct PendingCommand {
    /// Sample name, or the project name for collation
    pub name: String,
    pub command: String,
    pub output_folder: PathBuf,
}

/// Commands accumulated by a conductor between flushes
///
/// Count and size only ever grow until the batch is taken, which empties it.
#[derive(Debug, Default)]
pub struct PendingBatch {
    items: Vec<PendingCommand>,
    size_gb: f64,
}

impl PendingBatch {
    pub fn push(&mut self, item: PendingCommand, size_gb: f64) {
        self.items.push(item);
        self.size_gb += size_gb.max(0.0);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn size_gb(&self) -> f64 {
        self.size_gb
    }

    /// Reached on either dimension
    pub fn is_full(&self, thresholds: &Thresholds) -> bool {
        let by_count = thresholds.max_cmds.map_or(false, |max| self.len() >= max);
        let by_size = thresholds.max_size.map_or(false, |max| self.size_gb >= max);
        !self.is_empty() && (by_count || by_size)
    }

    /// Hand over the accumulated commands and reset to empty
    pub fn take(&mut self) -> Vec<PendingCommand> {
        self.size_gb = 0.0;
        std::mem::take(&mut self.items)
    }
}
