use crate::error::{LoopError, LoopResult};
use crate::project::sample::Sample;

/// Attribute-based sample selection
#[derive(Debug, Clone, Default)]
pub struct Selector {
    pub attribute: Option<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Selector {
    /// Samples kept by this selector, in project order
    ///
    /// With an include list a sample must carry the attribute with a listed value. With an
    /// exclude list samples lacking the attribute are kept.
    pub fn select<'a>(&self, samples: &'a [Sample]) -> LoopResult<Vec<&'a Sample>> {
        let attribute = match &self.attribute {
            Some(attribute) if !(self.include.is_empty() && self.exclude.is_empty()) => attribute,
            _ => return Ok(samples.iter().collect()),
        };

        if !self.include.is_empty() && !self.exclude.is_empty() {
            return Err(LoopError::Misconfiguration(
                "Specify only sample inclusion or exclusion, not both".to_string(),
            ));
        }
        if !samples.is_empty() && samples.iter().all(|s| s.attr(attribute).is_none()) {
            return Err(LoopError::Misconfiguration(format!(
                "The project samples do not have the attribute '{attribute}'"
            )));
        }

        let kept = samples
            .iter()
            .filter(|s| match s.attr(attribute) {
                Some(value) if !self.include.is_empty() => self.include.contains(&value),
                None if !self.include.is_empty() => false,
                Some(value) => !self.exclude.contains(&value),
                None => true,
            })
            .collect();
        Ok(kept)
    }
}
