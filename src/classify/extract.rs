// src/classify/extract.rs
// Adapter between loose model text and the typed verdict. All string-level
// tolerance (code fences, prose around the JSON, missing fields) lives here
// so the pipeline itself only ever handles `ClassificationVerdict`.

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::classify::{ClassificationVerdict, Locale, Topic, UNKNOWN};

/// Raw shape the model is asked for. Everything optional; defaulting is ours.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    topic: Option<String>,
    company: Option<serde_json::Value>,
    sector: Option<String>,
    locale: Option<String>,
    region: Option<String>,
    details: Option<String>,
    rationale: Option<String>,
}

/// Strip markdown code fences some models wrap JSON in.
fn strip_code_fences(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Locate the first top-level `{...}` span by brace matching. Returns the
/// span including both braces, or None when the text has no balanced object.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => in_string = false,
                _ => escaped = false,
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn string_or(field: Option<String>, default: &str) -> String {
    match field {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => default.to_string(),
    }
}

/// The contract comma-joins multiple company names; tolerate the model
/// returning an actual JSON array instead.
fn company_field(v: Option<serde_json::Value>) -> String {
    match v {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(serde_json::Value::Array(items)) => {
            let names: Vec<String> = items
                .into_iter()
                .filter_map(|x| x.as_str().map(|s| s.trim().to_string()))
                .filter(|s| !s.is_empty())
                .collect();
            if names.is_empty() {
                UNKNOWN.to_string()
            } else {
                names.join(", ")
            }
        }
        _ => UNKNOWN.to_string(),
    }
}

/// Locate the JSON object span of a model reply, fences stripped. Shared by
/// every model-facing parser in the crate.
pub fn extract_verdict_span(response: &str) -> Result<&str> {
    let cleaned = strip_code_fences(response);
    first_json_object(cleaned)
        .ok_or_else(|| anyhow!("no JSON object in model reply: {:.120}", cleaned))
}

/// Parse a free-text model reply into a verdict.
///
/// Failure modes per the contract: no JSON-like span, or a span that is not
/// valid JSON, both yield `Err`; callers drop the item and continue, no
/// retry. Missing fields are defaulted (topic none, everything else unknown),
/// and region is forced to "unknown" whenever the locale is unknown.
pub fn extract_verdict(response: &str) -> Result<ClassificationVerdict> {
    let span = extract_verdict_span(response)?;
    let raw: RawVerdict =
        serde_json::from_str(span).map_err(|e| anyhow!("model reply not valid JSON: {e}"))?;

    let locale = raw
        .locale
        .as_deref()
        .map(Locale::from_label)
        .unwrap_or(Locale::Unknown);
    let region = match locale {
        Locale::Unknown => UNKNOWN.to_string(),
        _ => string_or(raw.region, UNKNOWN),
    };

    Ok(ClassificationVerdict {
        topic: raw
            .topic
            .as_deref()
            .map(Topic::from_label)
            .unwrap_or(Topic::None),
        company: company_field(raw.company),
        sector: string_or(raw.sector, UNKNOWN),
        locale,
        region,
        details: string_or(raw.details, ""),
        rationale: string_or(raw.rationale, ""),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_object() {
        let v = extract_verdict(
            r#"{"topic":"relocation","company":"Empresa X","sector":"kitchens","locale":"domestic","region":"Valencia","details":"moves HQ to Valencia"}"#,
        )
        .unwrap();
        assert_eq!(v.topic, Topic::Relocation);
        assert_eq!(v.company, "Empresa X");
        assert_eq!(v.region, "Valencia");
    }

    #[test]
    fn parses_object_wrapped_in_prose_and_fences() {
        let reply = "Sure, here is the result:\n```json\n{\"topic\": \"mass_hiring\", \"company\": \"Empresa Y\"}\n```\nLet me know if you need more.";
        let v = extract_verdict(reply).unwrap();
        assert_eq!(v.topic, Topic::MassHiring);
        assert_eq!(v.company, "Empresa Y");
        // missing fields defaulted
        assert_eq!(v.sector, UNKNOWN);
        assert_eq!(v.locale, Locale::Unknown);
    }

    #[test]
    fn company_array_is_comma_joined() {
        let v =
            extract_verdict(r#"{"topic":"new_company","company":["Alpha SL","Beta SA"]}"#).unwrap();
        assert_eq!(v.company, "Alpha SL, Beta SA");
    }

    #[test]
    fn unknown_locale_forces_region_unknown() {
        let v = extract_verdict(
            r#"{"topic":"new_company","company":"Z","locale":"unknown","region":"Madrid"}"#,
        )
        .unwrap();
        assert_eq!(v.locale, Locale::Unknown);
        assert_eq!(v.region, UNKNOWN);
    }

    #[test]
    fn missing_topic_defaults_to_none() {
        let v = extract_verdict(r#"{"company":"Q"}"#).unwrap();
        assert!(v.topic.is_none());
    }

    #[test]
    fn garbage_and_unbalanced_braces_fail() {
        assert!(extract_verdict("no json here at all").is_err());
        assert!(extract_verdict("{\"topic\": \"none\"").is_err());
        assert!(extract_verdict("{not json}").is_err());
    }

    #[test]
    fn braces_inside_strings_do_not_break_matching() {
        let v = extract_verdict(r#"{"topic":"none","details":"uses {curly} braces"}"#).unwrap();
        assert_eq!(v.details, "uses {curly} braces");
    }
}
