//! Nudge configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{NudgeError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NudgeConfig {
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub reminder: ReminderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

fn default_prompt() -> String {
    "Write one short, warm reminder in {language} from {sender_name} to {target_name} \
     about reading the book \"{book_title}\". Reply with the reminder only, no options, \
     no lists, no quotes. Do not repeat any of these earlier reminders:\n{recent_messages}"
        .into()
}

impl Default for NudgeConfig {
    fn default() -> Self {
        Self {
            webhook: WebhookConfig::default(),
            llm: LlmConfig::default(),
            reminder: ReminderConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
            prompt: default_prompt(),
        }
    }
}

impl NudgeConfig {
    /// Load config from the default path (~/.nudge/config.toml).
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            NudgeError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&content)?;
        tracing::debug!("📋 Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| NudgeError::Config(format!("Failed to parse config: {e}")))
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Nudge home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".nudge")
    }

    /// Check that every setting needed to run is present.
    ///
    /// Time windows and provider names are checked by the components that own
    /// them, at construction.
    pub fn validate(&self) -> Result<()> {
        let main_url = self.webhook.main_url.trim();
        if main_url.is_empty() || is_placeholder(main_url) {
            return Err(NudgeError::Config("Missing webhook.main_url".into()));
        }
        if self.llm.provider.trim().is_empty() {
            return Err(NudgeError::Config("Missing llm.provider".into()));
        }
        for (field, value) in [
            ("target_name", &self.reminder.target_name),
            ("sender_name", &self.reminder.sender_name),
            ("book_title", &self.reminder.book_title),
        ] {
            if value.trim().is_empty() {
                return Err(NudgeError::Config(format!("Missing reminder.{field}")));
            }
        }
        if self.reminder.time_range.start.trim().is_empty() {
            return Err(NudgeError::Config("Missing reminder.time_range.start".into()));
        }
        if self.reminder.randomize_time && self.reminder.time_range.end.trim().is_empty() {
            return Err(NudgeError::Config(
                "Missing reminder.time_range.end (required when randomize_time is true)".into(),
            ));
        }
        if self.cache.cache_size == 0 {
            return Err(NudgeError::Config("cache.cache_size must be at least 1".into()));
        }
        Ok(())
    }

    /// Fill the prompt template. `recent` is shown to the model as context.
    pub fn render_prompt(&self, recent: &[String]) -> String {
        let recent_messages = if recent.is_empty() {
            "(none yet)".to_string()
        } else {
            recent
                .iter()
                .map(|m| format!("- {m}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        self.prompt
            .replace("{sender_name}", &self.reminder.sender_name)
            .replace("{target_name}", &self.reminder.target_name)
            .replace("{book_title}", &self.reminder.book_title)
            .replace("{language}", &self.reminder.language)
            .replace("{recent_messages}", &recent_messages)
    }

    /// Cache directory with `~` expanded.
    pub fn cache_dir(&self) -> PathBuf {
        expand_path(&self.cache.cache_dir)
    }

    /// Debug webhook URL, if one is really configured.
    pub fn debug_url(&self) -> Option<&str> {
        self.webhook
            .debug_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty() && !is_placeholder(u))
    }
}

fn is_placeholder(url: &str) -> bool {
    url.starts_with("YOUR_") && url.ends_with("_HERE")
}

/// Expand a leading `~` in a configured path.
pub fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

/// Outbound webhook configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub main_url: String,
    #[serde(default)]
    pub debug_url: Option<String>,
    #[serde(default = "default_debug_level")]
    pub debug_level: String,
}

fn default_debug_level() -> String { "error".into() }

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            main_url: String::new(),
            debug_url: None,
            debug_level: default_debug_level(),
        }
    }
}

/// Text-generation service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    /// Empty means the provider's default model.
    #[serde(default)]
    pub model: String,
    /// Empty means the provider's default endpoint.
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_provider() -> String { "openai".into() }
fn default_max_tokens() -> u32 { 500 }
fn default_temperature() -> f32 { 0.9 }
fn default_max_retries() -> u32 { 3 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: String::new(),
            model: String::new(),
            base_url: String::new(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
        }
    }
}

/// Who gets reminded about what, and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default)]
    pub target_name: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub book_title: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "bool_true")]
    pub randomize_time: bool,
    #[serde(default)]
    pub time_range: TimeRangeConfig,
}

fn bool_true() -> bool { true }
fn default_language() -> String { "Polish".into() }

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            target_name: String::new(),
            sender_name: String::new(),
            book_title: String::new(),
            language: default_language(),
            randomize_time: true,
            time_range: TimeRangeConfig::default(),
        }
    }
}

/// Daily send window, "HH:MM" local time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRangeConfig {
    #[serde(default = "default_range_start")]
    pub start: String,
    #[serde(default = "default_range_end")]
    pub end: String,
}

fn default_range_start() -> String { "14:00".into() }
fn default_range_end() -> String { "17:00".into() }

impl Default for TimeRangeConfig {
    fn default() -> Self {
        Self {
            start: default_range_start(),
            end: default_range_end(),
        }
    }
}

/// Message backlog configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    /// How many earlier messages are shown to the generator.
    #[serde(default = "default_context_messages")]
    pub context_messages: usize,
}

fn default_cache_dir() -> String { "~/.nudge/cache".into() }
fn default_cache_size() -> usize { 10 }
fn default_context_messages() -> usize { 5 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            cache_size: default_cache_size(),
            context_messages: default_context_messages(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// When set, logs are also written to a daily rolling file here.
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String { "info".into() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> NudgeConfig {
        NudgeConfig::from_toml(
            r#"
            [webhook]
            main_url = "https://discord.com/api/webhooks/1/abc"

            [reminder]
            target_name = "Ola"
            sender_name = "Tomek"
            book_title = "Solaris"
        "#,
        )
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = NudgeConfig::default();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.max_retries, 3);
        assert!((config.llm.temperature - 0.9).abs() < 0.01);
        assert_eq!(config.cache.cache_size, 10);
        assert_eq!(config.reminder.time_range.start, "14:00");
        assert_eq!(config.reminder.time_range.end, "17:00");
        assert!(config.reminder.randomize_time);
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config = NudgeConfig::from_toml("").unwrap();
        assert_eq!(config.webhook.debug_level, "error");
        assert_eq!(config.logging.level, "info");
        assert!(config.prompt.contains("{book_title}"));
    }

    #[test]
    fn test_config_from_toml() {
        let config = NudgeConfig::from_toml(
            r#"
            prompt = "Hi {target_name}"

            [llm]
            provider = "gemini"
            model = "gemini-1.5-pro"
            max_retries = 5

            [reminder]
            randomize_time = false
            time_range = { start = "09:30" }
        "#,
        )
        .unwrap();
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.llm.max_retries, 5);
        assert!(!config.reminder.randomize_time);
        assert_eq!(config.reminder.time_range.start, "09:30");
        assert_eq!(config.reminder.time_range.end, "17:00");
        assert_eq!(config.prompt, "Hi {target_name}");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = NudgeConfig::from_toml("[llm\nprovider=").unwrap_err();
        assert!(matches!(err, NudgeError::Config(_)));
    }

    #[test]
    fn test_validate() {
        assert!(valid_config().validate().is_ok());

        let mut config = valid_config();
        config.webhook.main_url = "YOUR_MAIN_WEBHOOK_URL_HERE".into();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.reminder.book_title.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("reminder.book_title"));

        let mut config = valid_config();
        config.reminder.time_range.end.clear();
        assert!(config.validate().is_err());
        config.reminder.randomize_time = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_render_prompt() {
        let mut config = valid_config();
        config.prompt = "{sender_name}->{target_name}: {book_title} ({language})\n{recent_messages}".into();
        let rendered = config.render_prompt(&[]);
        assert_eq!(rendered, "Tomek->Ola: Solaris (Polish)\n(none yet)");

        let rendered = config.render_prompt(&["Read!".into(), "Go read!".into()]);
        assert!(rendered.ends_with("- Read!\n- Go read!"));
    }

    #[test]
    fn test_debug_url_filters_placeholders() {
        let mut config = valid_config();
        assert_eq!(config.debug_url(), None);
        config.webhook.debug_url = Some("YOUR_DEBUG_WEBHOOK_URL_HERE".into());
        assert_eq!(config.debug_url(), None);
        config.webhook.debug_url = Some(" https://example.com/hook ".into());
        assert_eq!(config.debug_url(), Some("https://example.com/hook"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cache]\ncache_size = 4\n").unwrap();
        let config = NudgeConfig::load_from(&path).unwrap();
        assert_eq!(config.cache.cache_size, 4);

        let missing = NudgeConfig::load_from(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(NudgeError::Config(_))));
    }

    #[test]
    fn test_home_dir() {
        let home = NudgeConfig::home_dir();
        assert!(home.to_string_lossy().contains(".nudge"));
    }
}
