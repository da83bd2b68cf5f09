//! Provider registry: maps provider names to endpoint defaults.
//!
//! Every supported provider is a static entry here. The client picks the wire
//! protocol, base URL and default model from the entry at construction time.

/// Request/response shape spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireProtocol {
    /// OpenAI-compatible `POST /chat/completions`.
    ChatCompletions,
    /// Google-style `POST /v1beta/models/{model}:generateContent`.
    GenerateContent,
}

/// How to attach auth credentials to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `?key=<key>` query parameter.
    QueryKey,
    /// No authentication required (local servers).
    None,
}

/// Configuration for a single provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider identifier.
    pub name: &'static str,
    /// Base URL for the API.
    pub base_url: &'static str,
    /// Model used when the config leaves `llm.model` empty.
    pub default_model: &'static str,
    pub protocol: WireProtocol,
    pub auth_style: AuthStyle,
    /// Environment variable names to try for the API key (in order).
    pub env_keys: &'static [&'static str],
}

// ─── Provider Definitions ────────────────────────────────────────────────────

static PROVIDERS: &[ProviderConfig] = &[
    ProviderConfig {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        default_model: "gpt-4",
        protocol: WireProtocol::ChatCompletions,
        auth_style: AuthStyle::Bearer,
        env_keys: &["OPENAI_API_KEY"],
    },
    ProviderConfig {
        name: "groq",
        base_url: "https://api.groq.com/openai/v1",
        default_model: "llama-3.1-70b-versatile",
        protocol: WireProtocol::ChatCompletions,
        auth_style: AuthStyle::Bearer,
        env_keys: &["GROQ_API_KEY"],
    },
    ProviderConfig {
        name: "openrouter",
        base_url: "https://openrouter.ai/api/v1",
        default_model: "openai/gpt-4o-mini",
        protocol: WireProtocol::ChatCompletions,
        auth_style: AuthStyle::Bearer,
        env_keys: &["OPENROUTER_API_KEY"],
    },
    ProviderConfig {
        name: "ollama",
        base_url: "http://localhost:11434/v1",
        default_model: "llama3.2",
        protocol: WireProtocol::ChatCompletions,
        auth_style: AuthStyle::None,
        env_keys: &[],
    },
    ProviderConfig {
        name: "gemini",
        base_url: "https://generativelanguage.googleapis.com",
        default_model: "gemini-1.5-flash",
        protocol: WireProtocol::GenerateContent,
        auth_style: AuthStyle::QueryKey,
        env_keys: &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
    },
];

/// Look up a provider by name (case-insensitive).
pub fn get_provider_config(name: &str) -> Option<&'static ProviderConfig> {
    let name = name.trim();
    PROVIDERS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// All registered provider names.
pub fn all_provider_names() -> Vec<&'static str> {
    PROVIDERS.iter().map(|p| p.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_providers() {
        let openai = get_provider_config("openai").unwrap();
        assert_eq!(openai.protocol, WireProtocol::ChatCompletions);
        assert_eq!(openai.default_model, "gpt-4");

        let gemini = get_provider_config("Gemini").unwrap();
        assert_eq!(gemini.protocol, WireProtocol::GenerateContent);
        assert_eq!(gemini.auth_style, AuthStyle::QueryKey);
    }

    #[test]
    fn test_unknown_provider() {
        assert!(get_provider_config("acme-llm").is_none());
    }

    #[test]
    fn test_names_are_unique() {
        let mut names = all_provider_names();
        let before = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), before);
    }
}
