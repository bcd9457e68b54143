/// Running "[i of N]" status lines for driver loops
#[derive(Debug)]
pub struct ProgressCounter {
    count: usize,
    total: usize,
}

impl ProgressCounter {
    pub fn new(total: usize) -> Self {
        ProgressCounter { count: 0, total }
    }

    /// Count one more unit and describe it
    pub fn show(&mut self, name: &str, kind: &str, pipeline_name: Option<&str>) -> String {
        self.count += 1;
        let mut text = format!("## [{} of {}] {}: {}", self.count, self.total, kind, name);
        if let Some(pipeline) = pipeline_name {
            text.push_str(&format!("; pipeline: {pipeline}"));
        }
        text
    }

    /// Start counting again; the total stays
    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_resets() {
        let mut counter = ProgressCounter::new(3);
        assert_eq!(counter.show("s1", "sample", Some("rnaseq")), "## [1 of 3] sample: s1; pipeline: rnaseq");
        assert_eq!(counter.show("s2", "sample", None), "## [2 of 3] sample: s2");
        counter.reset();
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.total(), 3);
        assert_eq!(counter.show("demo", "project", None), "## [1 of 3] project: demo");
    }
}
