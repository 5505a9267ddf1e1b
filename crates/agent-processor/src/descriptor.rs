//! Model Descriptor Resolver (`spec.md` §4.3). A total coercion function —
//! no runtime reflection beyond a discriminated-value decode, in the
//! default-fill-on-malformed-input style the teacher uses for its own
//! config structs.

use serde_json::Value;

use crate::model::{ModelDescriptor, ProviderTag};

const DEFAULT_NAME: &str = "gpt-4.1-mini";

fn default_descriptor() -> ModelDescriptor {
    ModelDescriptor {
        provider: ProviderTag::Openai,
        name: DEFAULT_NAME.to_string(),
        title: DEFAULT_NAME.to_string(),
        context_window: None,
    }
}

/// Infer a provider tag from a bare model name, per `spec.md` §4.3 rule 2/3.
pub fn infer_provider(name: &str) -> ProviderTag {
    let lower = name.to_ascii_lowercase();
    if lower.starts_with("claude") {
        ProviderTag::Anthropic
    } else if lower.starts_with("gemini") {
        ProviderTag::Google
    } else if lower.starts_with("gpt-") || lower.contains("openai") {
        ProviderTag::Openai
    } else {
        ProviderTag::Proxy
    }
}

/// Parse an explicit `provider` string. Unrecognized tags fall back to
/// `Proxy` — the spec's rule 1 says only "use them", leaving the case of an
/// unrecognized tag string unaddressed; `Proxy` is the safest default since
/// it names no specific upstream API shape. Recorded as a decision in
/// `DESIGN.md`.
fn parse_provider_tag(s: &str) -> ProviderTag {
    match s.to_ascii_lowercase().as_str() {
        "anthropic" => ProviderTag::Anthropic,
        "openai" => ProviderTag::Openai,
        "google" => ProviderTag::Google,
        "proxy" => ProviderTag::Proxy,
        _ => ProviderTag::Proxy,
    }
}

/// Coerce an arbitrary persisted `model` value into a canonical descriptor.
/// Total: every input, however malformed, produces a descriptor (`spec.md`
/// P5).
pub fn resolve(value: &Value) -> ModelDescriptor {
    match value {
        Value::Object(map) => {
            let provider = map.get("provider").and_then(Value::as_str);
            let name = map.get("name").and_then(Value::as_str);
            match (provider, name) {
                (Some(p), Some(n)) => {
                    let title = map
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or(n)
                        .to_string();
                    let context_window = map
                        .get("contextWindow")
                        .and_then(Value::as_u64)
                        .map(|v| v as u32);
                    ModelDescriptor {
                        provider: parse_provider_tag(p),
                        name: n.to_string(),
                        title,
                        context_window,
                    }
                }
                (None, Some(n)) => ModelDescriptor {
                    provider: infer_provider(n),
                    name: n.to_string(),
                    title: n.to_string(),
                    context_window: None,
                },
                _ => default_descriptor(),
            }
        }
        Value::String(s) => ModelDescriptor {
            provider: infer_provider(s),
            name: s.clone(),
            title: s.clone(),
            context_window: None,
        },
        _ => default_descriptor(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_object_uses_provider_and_name() {
        let d = resolve(&json!({"provider": "anthropic", "name": "claude-3-opus", "contextWindow": 200000}));
        assert_eq!(d.provider, ProviderTag::Anthropic);
        assert_eq!(d.name, "claude-3-opus");
        assert_eq!(d.title, "claude-3-opus");
        assert_eq!(d.context_window, Some(200_000));
    }

    #[test]
    fn object_with_title_keeps_it() {
        let d = resolve(&json!({"provider": "openai", "name": "gpt-4.1", "title": "GPT-4.1"}));
        assert_eq!(d.title, "GPT-4.1");
    }

    #[test]
    fn name_only_object_infers_provider() {
        let d = resolve(&json!({"name": "gemini-1.5-pro"}));
        assert_eq!(d.provider, ProviderTag::Google);
        assert_eq!(d.title, "gemini-1.5-pro");
    }

    #[test]
    fn bare_string_infers_provider_claude() {
        let d = resolve(&json!("claude-3-sonnet"));
        assert_eq!(d.provider, ProviderTag::Anthropic);
        assert_eq!(d.name, "claude-3-sonnet");
        assert_eq!(d.title, "claude-3-sonnet");
    }

    #[test]
    fn bare_string_infers_provider_gpt_prefix() {
        let d = resolve(&json!("gpt-4o-mini"));
        assert_eq!(d.provider, ProviderTag::Openai);
    }

    #[test]
    fn bare_string_infers_provider_openai_substring() {
        let d = resolve(&json!("my-openai-proxy-model"));
        assert_eq!(d.provider, ProviderTag::Openai);
    }

    #[test]
    fn bare_string_unknown_prefix_is_proxy() {
        let d = resolve(&json!("llama-3-70b"));
        assert_eq!(d.provider, ProviderTag::Proxy);
    }

    #[test]
    fn malformed_number_falls_back_to_default() {
        let d = resolve(&json!(42));
        assert_eq!(d.provider, ProviderTag::Openai);
        assert_eq!(d.name, DEFAULT_NAME);
        assert_eq!(d.title, DEFAULT_NAME);
    }

    #[test]
    fn null_falls_back_to_default() {
        let d = resolve(&Value::Null);
        assert_eq!(d.name, DEFAULT_NAME);
    }

    #[test]
    fn empty_object_falls_back_to_default() {
        let d = resolve(&json!({}));
        assert_eq!(d.name, DEFAULT_NAME);
    }
}
