use serde::Deserialize;

/// Root application configuration. Loaded from an optional `quiz-funnel.toml`
/// file and environment variables with the prefix `QUIZ_FUNNEL__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub quiz: QuizConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizConfig {
    /// Quiz name sent with every tracking beacon and statistics query.
    #[serde(default = "default_quiz_name")]
    pub name: String,
    /// Path to a JSON step catalog. The built-in catalog is used when unset.
    #[serde(default)]
    pub catalog_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_track_path")]
    pub track_path: String,
    #[serde(default = "default_stats_path")]
    pub stats_path: String,
    #[serde(default = "default_reset_path")]
    pub reset_path: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// JSON file standing in for the browser's local storage.
    #[serde(default = "default_store_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

// Default functions
fn default_quiz_name() -> String {
    "crianca_interior".to_string()
}
fn default_base_url() -> String {
    "http://localhost:54321".to_string()
}
fn default_track_path() -> String {
    "/functions/v1/track-quiz-event".to_string()
}
fn default_stats_path() -> String {
    "/functions/v1/get-quiz-analytics".to_string()
}
fn default_reset_path() -> String {
    "/functions/v1/reset-quiz-analytics".to_string()
}
fn default_timeout_ms() -> u64 {
    5000
}
fn default_queue_capacity() -> usize {
    1024
}
fn default_user_agent() -> String {
    concat!("quiz-funnel/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_store_path() -> String {
    ".quiz-funnel/local_storage.json".to_string()
}
fn default_refresh_interval_ms() -> u64 {
    5000
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            name: default_quiz_name(),
            catalog_path: None,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            track_path: default_track_path(),
            stats_path: default_stats_path(),
            reset_path: default_reset_path(),
            timeout_ms: default_timeout_ms(),
            queue_capacity: default_queue_capacity(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            quiz: QuizConfig::default(),
            tracking: TrackingConfig::default(),
            store: StoreConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl TrackingConfig {
    pub fn track_url(&self) -> String {
        join_url(&self.base_url, &self.track_path)
    }

    pub fn stats_url(&self) -> String {
        join_url(&self.base_url, &self.stats_path)
    }

    pub fn reset_url(&self) -> String {
        join_url(&self.base_url, &self.reset_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

impl AppConfig {
    /// Load configuration from an optional config file and environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("quiz-funnel").required(false))
            .add_source(
                config::Environment::with_prefix("QUIZ_FUNNEL")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.quiz.name, "crianca_interior");
        assert!(config.quiz.catalog_path.is_none());
        assert_eq!(config.dashboard.refresh_interval_ms, 5000);
        assert!(config.tracking.user_agent.starts_with("quiz-funnel/"));
    }

    #[test]
    fn test_endpoint_urls_join_cleanly() {
        let tracking = TrackingConfig {
            base_url: "https://example.supabase.co/".into(),
            ..TrackingConfig::default()
        };
        assert_eq!(
            tracking.track_url(),
            "https://example.supabase.co/functions/v1/track-quiz-event"
        );
        assert_eq!(
            tracking.stats_url(),
            "https://example.supabase.co/functions/v1/get-quiz-analytics"
        );
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"quiz": {"name": "demo"}, "dashboard": {}}"#).unwrap();
        assert_eq!(config.quiz.name, "demo");
        assert_eq!(config.tracking.timeout_ms, 5000);
        assert_eq!(config.store.path, ".quiz-funnel/local_storage.json");
    }
}
