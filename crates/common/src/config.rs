//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Outgoing email configuration.
    #[serde(default)]
    pub email: EmailConfig,
    /// Upload storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Request processing configuration.
    #[serde(default)]
    pub processing: ProcessingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of the site, used in email links.
    #[serde(default = "default_site_url")]
    pub url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            url: default_site_url(),
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Transport security for the SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Implicit TLS (usually port 465).
    Tls,
    /// STARTTLS upgrade (usually port 587).
    #[default]
    Starttls,
    /// Plain connection, for local relays only.
    None,
}

/// Outgoing email configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Whether email notifications are sent at all.
    #[serde(default)]
    pub enabled: bool,
    /// SMTP host.
    #[serde(default = "default_smtp_host")]
    pub host: String,
    /// SMTP port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// SMTP transport security.
    #[serde(default)]
    pub security: SmtpSecurity,
    /// SMTP username.
    #[serde(default)]
    pub username: Option<String>,
    /// SMTP password.
    #[serde(default)]
    pub password: Option<String>,
    /// Sender address.
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Sender display name.
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Staff addresses alerted about new requests.
    #[serde(default)]
    pub staff_recipients: Vec<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_smtp_host(),
            port: default_smtp_port(),
            security: SmtpSecurity::default(),
            username: None,
            password: None,
            from_address: default_from_address(),
            from_name: default_from_name(),
            staff_recipients: Vec::new(),
        }
    }
}

/// Upload storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory uploaded files are written to.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// URL prefix stored files are served under.
    #[serde(default = "default_upload_url")]
    pub base_url: String,
    /// Maximum accepted size of a single file in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Accepted file extensions, without the leading dot.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            base_url: default_upload_url(),
            max_file_size: default_max_file_size(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

/// Request processing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    /// Working days to produce a transcript.
    #[serde(default = "default_transcript_days")]
    pub transcript_days: u32,
    /// Working days to produce a certificate or graduation letter.
    #[serde(default = "default_certificate_days")]
    pub certificate_days: u32,
    /// Working days to process enrollment and general requests.
    #[serde(default = "default_request_days")]
    pub request_days: u32,
    /// IANA timezone used for references, day boundaries and display dates.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Page size of the staff request listing.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            transcript_days: default_transcript_days(),
            certificate_days: default_certificate_days(),
            request_days: default_request_days(),
            timezone: default_timezone(),
            page_size: default_page_size(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    4100
}

fn default_site_url() -> String {
    "http://localhost:4100".to_string()
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

const fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "noreply@localhost".to_string()
}

fn default_from_name() -> String {
    "ระบบขอเอกสารออนไลน์".to_string()
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_upload_url() -> String {
    "/uploads".to_string()
}

const fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    ["pdf", "jpg", "jpeg", "png"]
        .into_iter()
        .map(String::from)
        .collect()
}

const fn default_transcript_days() -> u32 {
    2
}

const fn default_certificate_days() -> u32 {
    3
}

const fn default_request_days() -> u32 {
    5
}

fn default_timezone() -> String {
    "Asia/Bangkok".to_string()
}

const fn default_page_size() -> u64 {
    20
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `DOCREQ_ENV`)
    /// 4. Environment variables with `DOCREQ__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("DOCREQ_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("DOCREQ")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("email.staff_recipients")
                    .with_list_parse_key("storage.allowed_extensions")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("DOCREQ")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = parse(
            r#"
            [database]
            url = "postgres://localhost/docreq"
            "#,
        );

        assert_eq!(config.server.port, 4100);
        assert!(!config.email.enabled);
        assert_eq!(config.email.port, 587);
        assert_eq!(config.email.security, SmtpSecurity::Starttls);
        assert_eq!(config.storage.max_file_size, 5 * 1024 * 1024);
        assert_eq!(config.storage.allowed_extensions, vec!["pdf", "jpg", "jpeg", "png"]);
        assert_eq!(config.processing.transcript_days, 2);
        assert_eq!(config.processing.certificate_days, 3);
        assert_eq!(config.processing.request_days, 5);
        assert_eq!(config.processing.page_size, 20);
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let config = parse(
            r#"
            [database]
            url = "postgres://localhost/docreq"
            max_connections = 4

            [email]
            enabled = true
            security = "tls"
            port = 465
            staff_recipients = ["registrar@example.ac.th"]

            [processing]
            transcript_days = 1
            "#,
        );

        assert_eq!(config.database.max_connections, 4);
        assert!(config.email.enabled);
        assert_eq!(config.email.security, SmtpSecurity::Tls);
        assert_eq!(config.email.port, 465);
        assert_eq!(config.email.staff_recipients.len(), 1);
        assert_eq!(config.processing.transcript_days, 1);
        assert_eq!(config.processing.timezone, "Asia/Bangkok");
    }
}
