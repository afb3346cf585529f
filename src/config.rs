use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const APP_DIR: &str = "attendance-assistant";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Follow-up suggestion lists, chosen by the type of the last answered query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SuggestionConfig {
    pub department_attendance: Vec<String>,
    pub class_attendance: Vec<String>,
    pub student_info: Vec<String>,
    pub default: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            department_attendance: strings(&[
                "Show latecomers today",
                "Show classes with low attendance",
                "Generate detailed report",
                "Show yesterday's comparison",
            ]),
            class_attendance: strings(&[
                "Show this class's weekly trend",
                "Show latecomers in this class",
                "Compare with other classes",
                "Show absent students details",
            ]),
            student_info: strings(&[
                "Show class average",
                "Show similar performing students",
                "Generate student report",
                "Show monthly trend",
            ]),
            default: strings(&[
                "Show today's summary",
                "Show department overview",
                "Help",
                "Show reports menu",
            ]),
        }
    }
}

impl SuggestionConfig {
    pub fn for_query_type(&self, kind: &str) -> &[String] {
        match kind {
            "department_attendance" => &self.department_attendance,
            "class_attendance" => &self.class_attendance,
            "student_info" => &self.student_info,
            _ => &self.default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub endpoint: String,
    pub query_path: String,
    pub export_dir: PathBuf,
    pub toast_duration_ms: u64,
    pub max_query_chars: usize,
    pub welcome_message: String,
    pub starter_suggestions: Vec<String>,
    pub suggestions: SuggestionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5000".to_string(),
            query_path: "/chatbot-query".to_string(),
            export_dir: dirs::download_dir()
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| PathBuf::from(".")),
            toast_duration_ms: 3000,
            max_query_chars: 500,
            welcome_message: "Hello! I'm your AI assistant for attendance management. I can help you with:\n\n\
                • View attendance summaries and reports\n\
                • Find specific student information\n\
                • Check latecomer records\n\
                • Analyze attendance trends\n\
                • Generate custom reports\n\n\
                Try asking me something like \"Show today's attendance summary\" or click on the suggestions below!"
                .to_string(),
            starter_suggestions: strings(&[
                "Show today's attendance summary",
                "Show all latecomers today",
                "Show students with attendance below 75%",
                "Show CS 2A attendance today",
                "Generate department report",
                "Show perfect attendance classes",
            ]),
            suggestions: SuggestionConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_ms)
    }

    pub fn from_toml(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw, path)
    }

    /// Loads `path` (or the default location). A missing file yields defaults
    /// silently; any other failure yields defaults plus a warning.
    pub fn load_or_default(path: Option<&Path>) -> (Self, Option<String>) {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return (Self::default(), None);
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return (Self::default(), None);
        }

        match Self::load(&path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded configuration");
                (config, None)
            }
            Err(err) => {
                tracing::warn!("{err}; falling back to defaults");
                (Self::default(), Some(err.to_string()))
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.query_path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "query_path must start with '/': {}",
                self.query_path
            )));
        }
        if self.starter_suggestions.is_empty() {
            return Err(ConfigError::Validation(
                "starter_suggestions must not be empty".to_string(),
            ));
        }
        Url::parse(&self.endpoint).map_err(|err| {
            ConfigError::Validation(format!("endpoint {} is not a URL: {err}", self.endpoint))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().expect("defaults should validate");
        assert_eq!(config.starter_suggestions.len(), 6);
        assert_eq!(config.toast_duration(), Duration::from_millis(3000));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = AppConfig::from_toml(
            "endpoint = \"http://attendance.local:8080\"\n[suggestions]\ndefault = [\"Help\"]\n",
            Path::new("config.toml"),
        )
        .expect("partial config should load");
        assert_eq!(config.endpoint, "http://attendance.local:8080");
        assert_eq!(config.query_path, "/chatbot-query");
        assert_eq!(config.suggestions.default, vec!["Help".to_string()]);
        assert_eq!(
            config.suggestions.student_info,
            SuggestionConfig::default().student_info
        );
    }

    #[test]
    fn validation_rejects_relative_query_path() {
        let err = AppConfig::from_toml("query_path = \"chatbot-query\"", Path::new("c.toml"))
            .expect_err("relative path should fail");
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn validation_rejects_empty_starters_and_bad_endpoint() {
        assert!(AppConfig::from_toml("starter_suggestions = []", Path::new("c.toml")).is_err());
        assert!(AppConfig::from_toml("endpoint = \"nope\"", Path::new("c.toml")).is_err());
    }

    #[test]
    fn malformed_file_falls_back_with_warning() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("config.toml");
        fs::write(&path, "endpoint = [").expect("fixture should write");
        let (config, warning) = AppConfig::load_or_default(Some(&path));
        assert_eq!(config, AppConfig::default());
        assert!(warning.expect("warning should be reported").contains("failed to parse"));
    }

    #[test]
    fn missing_file_is_silent() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let (config, warning) = AppConfig::load_or_default(Some(&dir.path().join("absent.toml")));
        assert_eq!(config, AppConfig::default());
        assert!(warning.is_none());
    }

    #[test]
    fn suggestion_dispatch_falls_back_to_default() {
        let suggestions = SuggestionConfig::default();
        assert_eq!(
            suggestions.for_query_type("student_info"),
            suggestions.student_info.as_slice()
        );
        assert_eq!(
            suggestions.for_query_type("comparison"),
            suggestions.default.as_slice()
        );
    }
}
