//! Script templates for phase-file actions.
//!
//! Resolves `{{args.NAME}}` placeholders against positional arguments bound
//! to the action's declared parameter names.

/// Convert a JSON argument to its template text.
pub fn value_to_string(val: &serde_json::Value) -> String {
    match val {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Render a template for one argument set.
pub fn render(
    template: &str,
    params: &[String],
    args: &[serde_json::Value],
) -> Result<String, String> {
    let mut result = template.to_string();
    let mut start = 0;

    while let Some(open) = result[start..].find("{{") {
        let open = start + open;
        let close = result[open..]
            .find("}}")
            .ok_or_else(|| format!("unclosed template at position {}", open))?;
        let close = open + close + 2;
        let key = result[open + 2..close - 2].trim();

        let name = key
            .strip_prefix("args.")
            .ok_or_else(|| format!("unknown template variable: {}", key))?;
        let idx = params
            .iter()
            .position(|p| p == name)
            .ok_or_else(|| format!("unknown argument: {}", name))?;
        let value = args
            .get(idx)
            .map(value_to_string)
            .ok_or_else(|| format!("missing value for argument: {}", name))?;

        result.replace_range(open..close, &value);
        start = open + value.len();
    }

    Ok(result)
}

/// Names referenced by `{{args.NAME}}` placeholders, in order of appearance.
pub fn referenced_args(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            break;
        };
        if let Some(name) = after[..close].trim().strip_prefix("args.") {
            names.push(name.to_string());
        }
        rest = &after[close + 2..];
    }
    names
}
