use std::collections::BTreeMap;

use crate::error::{LoopError, LoopResult, EXAMPLE_COMPUTE_SPEC_FMT};

/// Parse a CLI itemized compute specification like `mem=32000,cores=4`
///
/// Every token must hold exactly one `=`. All offending tokens are reported together and
/// nothing is returned unless the whole specification parses.
pub fn parse_itemized(spec: &str) -> LoopResult<BTreeMap<String, String>> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Ok(BTreeMap::new());
    }

    let mut bad = Vec::new();
    let mut data = BTreeMap::new();
    for token in spec.split(',') {
        let parts: Vec<&str> = token.split('=').collect();
        match parts.as_slice() {
            [key, value] => {
                data.insert(key.trim().to_string(), value.trim().to_string());
            }
            _ => bad.push(token.to_string()),
        }
    }

    if !bad.is_empty() {
        return Err(LoopError::ComputeSpec {
            bad,
            example: EXAMPLE_COMPUTE_SPEC_FMT.to_string(),
        });
    }
    Ok(data)
}
