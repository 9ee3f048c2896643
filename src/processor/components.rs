//! Detection of architectural components named in commit messages.

use std::sync::OnceLock;

use regex::Regex;

fn component_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        match Regex::new(
            r"(?i)(?:add|new|create|implement)\s+(\w+(?:Service|Controller|Component|Manager|Handler))",
        ) {
            Ok(re) => re,
            Err(_) => unreachable!("static regex pattern is valid"),
        }
    })
}

/// Component names introduced by a commit message, in order of appearance.
///
/// A component is a word ending in `Service`, `Controller`, `Component`,
/// `Manager` or `Handler` that directly follows one of the verbs `add`,
/// `new`, `create` or `implement`.
#[must_use]
pub fn extract_components(message: &str) -> Vec<String> {
    component_regex()
        .captures_iter(message)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}
