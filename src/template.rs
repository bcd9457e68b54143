use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::error::{LoopError, LoopResult};

/// Render a tinytemplate source with a serialisable context
///
/// Output is not HTML-escaped: everything rendered here ends up in shell scripts.
pub fn render<C: Serialize>(name: &str, source: &str, context: &C) -> LoopResult<String> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template(name, source)
        .map_err(|err| LoopError::Template(format!("{name}: {err}")))?;
    tt.render(name, context)
        .map_err(|err| LoopError::Template(format!("{name}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_without_escaping() {
        let out = render("cmd", "run {sample.name} > {out}", &json!({"sample": {"name": "a&b"}, "out": "x.log"})).unwrap();
        assert_eq!(out, "run a&b > x.log");
    }

    #[test]
    fn missing_value_is_a_template_error() {
        let err = render("cmd", "{nope}", &json!({})).unwrap_err();
        assert!(matches!(err, LoopError::Template(_)));
    }
}
