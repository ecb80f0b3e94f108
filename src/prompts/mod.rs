//! Generation prompt templates.
//!
//! Each flow has a markdown template embedded at compile time. A
//! `templates:` entry in `prompts.yaml` replaces the embedded one for that
//! flow. Templates use `{{name}}` placeholders filled by [`render`].

use crate::config::Prompts;

/// Default templates embedded at compile time.
pub mod defaults {
    pub const CLASSIFY: &str = include_str!("../defaults/prompts/classify.md");
    pub const PARSE: &str = include_str!("../defaults/prompts/parse.md");
    pub const ADVICE: &str = include_str!("../defaults/prompts/advice.md");
    pub const TRIAGE: &str = include_str!("../defaults/prompts/triage.md");
}

/// Flow names, as used in `prompts.yaml` and in generation requests.
pub const FLOWS: [&str; 4] = ["classify", "parse", "advice", "triage"];

fn embedded(flow: &str) -> Option<&'static str> {
    match flow {
        "classify" => Some(defaults::CLASSIFY),
        "parse" => Some(defaults::PARSE),
        "advice" => Some(defaults::ADVICE),
        "triage" => Some(defaults::TRIAGE),
        _ => None,
    }
}

/// Template for a flow: the configured override if present, otherwise the
/// embedded default. Unknown flows with no override yield an empty template.
pub fn template<'a>(flow: &str, prompts: &'a Prompts) -> &'a str {
    prompts
        .get_template(flow)
        .or_else(|| embedded(flow))
        .unwrap_or("")
}

/// Substitute `{{key}}` placeholders. Placeholders with no matching key are
/// left as written.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = after[..end].trim();
        match vars.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}
