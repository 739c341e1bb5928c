//! Configuration management
//!
//! This module handles loading and parsing configuration for the DD-bot backend.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Outgoing email configuration
    #[serde(default)]
    pub email: EmailConfig,
    /// Chat recommender configuration
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed to call the API from a browser
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:8000".to_string(),
    ]
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/ddbot.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    600
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of an access token issued by `/auth/token`
    #[serde(default = "default_session_ttl_minutes")]
    pub session_ttl_minutes: i64,
    /// Lifetime of an email verification link
    #[serde(default = "default_verification_ttl_minutes")]
    pub verification_ttl_minutes: i64,
    /// Whether parents and librarians must verify their email before login
    #[serde(default = "default_true")]
    pub require_email_verification: bool,
    /// Administrator account created at startup when missing
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_minutes: default_session_ttl_minutes(),
            verification_ttl_minutes: default_verification_ttl_minutes(),
            require_email_verification: true,
            bootstrap_admin: None,
        }
    }
}

fn default_session_ttl_minutes() -> i64 {
    30
}

fn default_verification_ttl_minutes() -> i64 {
    15
}

fn default_true() -> bool {
    true
}

/// Credentials of the administrator created on first start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// SMTP configuration for verification emails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// When false, verification links are only written to the log
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default = "default_from")]
    pub from: String,
    /// Front-end page that receives `?token=...`
    #[serde(default = "default_verify_url")]
    pub verify_url: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from: default_from(),
            verify_url: default_verify_url(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from() -> String {
    "DD-bot <noreply@ddbot.local>".to_string()
}

fn default_verify_url() -> String {
    "http://localhost:5173/verify-email".to_string()
}

/// Chat recommender configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Maximum number of cards in one reply
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Idle time after which a conversation is forgotten
    #[serde(default = "default_session_idle_minutes")]
    pub session_idle_minutes: u64,
    /// Number of turns remembered per conversation
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    /// Longest accepted message, in characters
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
    /// Eligible catalog entries gathered per media kind before ranking;
    /// also the page size used while reading them
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: i64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            session_idle_minutes: default_session_idle_minutes(),
            history_turns: default_history_turns(),
            max_message_len: default_max_message_len(),
            candidate_limit: default_candidate_limit(),
        }
    }
}

fn default_max_items() -> usize {
    5
}

fn default_session_idle_minutes() -> u64 {
    30
}

fn default_history_turns() -> usize {
    20
}

fn default_max_message_len() -> usize {
    500
}

fn default_candidate_limit() -> i64 {
    200
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - DDBOT_SERVER_HOST
    /// - DDBOT_SERVER_PORT
    /// - DDBOT_SERVER_CORS_ORIGINS (comma separated)
    /// - DDBOT_DATABASE_DRIVER
    /// - DDBOT_DATABASE_URL
    /// - DDBOT_CACHE_TTL_SECONDS
    /// - DDBOT_AUTH_SESSION_TTL_MINUTES
    /// - DDBOT_AUTH_REQUIRE_EMAIL_VERIFICATION
    /// - DDBOT_EMAIL_ENABLED, DDBOT_EMAIL_SMTP_HOST, DDBOT_EMAIL_SMTP_PORT,
    ///   DDBOT_EMAIL_SMTP_USERNAME, DDBOT_EMAIL_SMTP_PASSWORD, DDBOT_EMAIL_FROM,
    ///   DDBOT_EMAIL_VERIFY_URL
    /// - DDBOT_CHAT_MAX_ITEMS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("DDBOT_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("DDBOT_SERVER_PORT") {
            self.server.port = port;
        }
        if let Ok(origins) = std::env::var("DDBOT_SERVER_CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Database configuration
        if let Ok(driver) = std::env::var("DDBOT_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("DDBOT_DATABASE_URL") {
            self.database.url = url;
        }

        // Cache configuration
        if let Some(ttl) = env_parse::<u64>("DDBOT_CACHE_TTL_SECONDS") {
            self.cache.ttl_seconds = ttl;
        }

        // Auth configuration
        if let Some(ttl) = env_parse::<i64>("DDBOT_AUTH_SESSION_TTL_MINUTES") {
            self.auth.session_ttl_minutes = ttl;
        }
        if let Some(required) = env_parse::<bool>("DDBOT_AUTH_REQUIRE_EMAIL_VERIFICATION") {
            self.auth.require_email_verification = required;
        }

        // Email configuration
        if let Some(enabled) = env_parse::<bool>("DDBOT_EMAIL_ENABLED") {
            self.email.enabled = enabled;
        }
        if let Ok(host) = std::env::var("DDBOT_EMAIL_SMTP_HOST") {
            self.email.smtp_host = host;
        }
        if let Some(port) = env_parse::<u16>("DDBOT_EMAIL_SMTP_PORT") {
            self.email.smtp_port = port;
        }
        if let Ok(username) = std::env::var("DDBOT_EMAIL_SMTP_USERNAME") {
            self.email.smtp_username = username;
        }
        if let Ok(password) = std::env::var("DDBOT_EMAIL_SMTP_PASSWORD") {
            self.email.smtp_password = password;
        }
        if let Ok(from) = std::env::var("DDBOT_EMAIL_FROM") {
            self.email.from = from;
        }
        if let Ok(url) = std::env::var("DDBOT_EMAIL_VERIFY_URL") {
            self.email.verify_url = url;
        }

        // Chat configuration
        if let Some(max_items) = env_parse::<usize>("DDBOT_CHAT_MAX_ITEMS") {
            self.chat.max_items = max_items;
        }
    }
}

/// Read and parse an environment variable, ignoring unparseable values
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn valid_config_strategy() -> impl Strategy<Value = Config> {
        (
            "[a-z]{1,10}(\\.[a-z]{1,5}){0,2}",
            1u16..=65535,
            prop_oneof![Just(DatabaseDriver::Sqlite), Just(DatabaseDriver::Mysql)],
            1i64..=1440,
            1usize..=20,
        )
            .prop_map(|(host, port, driver, ttl, max_items)| {
                let mut config = Config::default();
                config.server.host = host;
                config.server.port = port;
                config.database.driver = driver;
                config.auth.session_ttl_minutes = ttl;
                config.chat.max_items = max_items;
                config
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn config_yaml_roundtrip(config in valid_config_strategy()) {
            let yaml = serde_yaml::to_string(&config).unwrap();
            let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

            prop_assert_eq!(parsed.server.host, config.server.host);
            prop_assert_eq!(parsed.server.port, config.server.port);
            prop_assert_eq!(parsed.database.driver, config.database.driver);
            prop_assert_eq!(parsed.auth.session_ttl_minutes, config.auth.session_ttl_minutes);
            prop_assert_eq!(parsed.chat.max_items, config.chat.max_items);
        }

        #[test]
        fn partial_server_section_keeps_other_defaults(port in 1u16..=65535) {
            let yaml = format!("server:\n  port: {}\n", port);
            let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

            prop_assert_eq!(parsed.server.port, port);
            prop_assert_eq!(parsed.database.url, "data/ddbot.db");
            prop_assert_eq!(parsed.chat.max_items, 5);
        }
    }
}
