//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `GERINMAH_BASE_URL` - Public URL of the site (OAuth redirects, cookie security)
//! - `SESSION_SECRET` - Session signing secret (min 64 chars, high entropy; e.g. `openssl rand -hex 32`)
//!
//! ## Optional
//! - `GERINMAH_HOST` - Bind address (default: 127.0.0.1)
//! - `GERINMAH_PORT` - Listen port (default: 5000)
//! - `ADMIN_USERNAME` / `ADMIN_PASSWORD` - Built-in admin login (both or neither)
//! - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET` - Google sign-in (both or neither)
//! - `SENDGRID_API_KEY` - Transactional email; email is disabled when unset
//! - `EMAIL_FROM` - Sender address (default: noreply@gerinmah.mn)
//! - `ADMIN_NOTIFICATION_EMAIL` - Receives a copy of every new order
//! - `GERINMAH_PERMANENT_UPLOAD_DIR` - Durable upload store (default: data/uploads)
//! - `GERINMAH_PUBLIC_UPLOAD_DIR` - Served upload directory (default: public/uploads)
//! - `GERINMAH_BACKUP_DIR` - Table snapshot directory (default: data/backups)
//! - `GERINMAH_BACKUP_INTERVAL_SECS` - Backup pass interval (default: 21600)
//! - `GERINMAH_RESTORE_CHECK_INTERVAL_SECS` - Restore check interval (default: 86400)
//! - `GERINMAH_IMAGE_SYNC_INTERVAL_SECS` - Upload reconciliation interval (default: 600)
//! - `GERINMAH_LOG_JSON` - Emit JSON logs when set to `1`/`true`
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 64;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_BACKUP_INTERVAL_SECS: u64 = 6 * 60 * 60;
const DEFAULT_RESTORE_CHECK_INTERVAL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_IMAGE_SYNC_INTERVAL_SECS: u64 = 10 * 60;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, without trailing slash
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Built-in admin login, if configured
    pub admin: Option<AdminCredentials>,
    /// Google OAuth client, if configured
    pub google: Option<GoogleOAuthConfig>,
    /// Transactional email settings
    pub email: EmailConfig,
    /// Upload and backup directories
    pub storage: StorageConfig,
    /// Background job intervals
    pub jobs: JobIntervals,
    /// Emit JSON formatted logs
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Credentials for the built-in admin account.
#[derive(Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: SecretString,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Google OAuth client configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl std::fmt::Debug for GoogleOAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleOAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Outgoing email configuration.
#[derive(Clone)]
pub struct EmailConfig {
    /// `SendGrid` API key. `None` disables sending.
    pub sendgrid_api_key: Option<SecretString>,
    /// Sender address
    pub from: String,
    /// Address that receives new-order notifications
    pub admin_notification: Option<String>,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field(
                "sendgrid_api_key",
                &self.sendgrid_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("from", &self.from)
            .field("admin_notification", &self.admin_notification)
            .finish()
    }
}

/// Filesystem locations for uploads and snapshots.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Durable upload store, survives redeploys
    pub permanent_upload_dir: PathBuf,
    /// Directory served under `/uploads`
    pub public_upload_dir: PathBuf,
    /// Directory holding one JSON snapshot per critical table
    pub backup_dir: PathBuf,
}

/// Intervals for the background jobs.
#[derive(Debug, Clone, Copy)]
pub struct JobIntervals {
    pub backup: Duration,
    pub restore_check: Duration,
    pub image_sync: Duration,
}

impl Default for JobIntervals {
    fn default() -> Self {
        Self {
            backup: Duration::from_secs(DEFAULT_BACKUP_INTERVAL_SECS),
            restore_check: Duration::from_secs(DEFAULT_RESTORE_CHECK_INTERVAL_SECS),
            image_sync: Duration::from_secs(DEFAULT_IMAGE_SYNC_INTERVAL_SECS),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = SecretString::from(get_required_env("DATABASE_URL")?);
        let host = get_env_or_default("GERINMAH_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("GERINMAH_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("GERINMAH_PORT", "5000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("GERINMAH_PORT".to_string(), e.to_string()))?;
        let base_url = parse_base_url(&get_required_env("GERINMAH_BASE_URL")?)?;
        let session_secret = get_validated_secret("SESSION_SECRET")?;
        validate_session_secret(&session_secret, "SESSION_SECRET")?;

        let admin = AdminCredentials::from_env()?;
        let google = GoogleOAuthConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let storage = StorageConfig::from_env();
        let jobs = JobIntervals::from_env()?;

        let log_json = get_optional_env("GERINMAH_LOG_JSON")
            .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            admin,
            google,
            email,
            storage,
            jobs,
            log_json,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Redirect URI registered with Google.
    #[must_use]
    pub fn google_redirect_uri(&self) -> String {
        format!("{}/api/auth/google/callback", self.base_url)
    }
}

impl AdminCredentials {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some((username, password)) = get_optional_pair("ADMIN_USERNAME", "ADMIN_PASSWORD")?
        else {
            return Ok(None);
        };
        Ok(Some(Self {
            username,
            password: SecretString::from(password),
        }))
    }
}

impl GoogleOAuthConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some((client_id, client_secret)) =
            get_optional_pair("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET")?
        else {
            return Ok(None);
        };
        validate_secret_strength(&client_secret, "GOOGLE_CLIENT_SECRET")?;
        Ok(Some(Self {
            client_id,
            client_secret: SecretString::from(client_secret),
        }))
    }
}

impl EmailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let sendgrid_api_key = match get_optional_env("SENDGRID_API_KEY") {
            Some(key) => {
                validate_secret_strength(&key, "SENDGRID_API_KEY")?;
                Some(SecretString::from(key))
            }
            None => None,
        };
        Ok(Self {
            sendgrid_api_key,
            from: get_env_or_default("EMAIL_FROM", "noreply@gerinmah.mn"),
            admin_notification: get_optional_env("ADMIN_NOTIFICATION_EMAIL"),
        })
    }
}

impl StorageConfig {
    /// Directories from `GERINMAH_*_DIR`, relative to the working directory
    /// by default. Shared with the CLI so both resolve the same paths.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            permanent_upload_dir: get_env_or_default("GERINMAH_PERMANENT_UPLOAD_DIR", "data/uploads")
                .into(),
            public_upload_dir: get_env_or_default("GERINMAH_PUBLIC_UPLOAD_DIR", "public/uploads")
                .into(),
            backup_dir: get_env_or_default("GERINMAH_BACKUP_DIR", "data/backups").into(),
        }
    }
}

impl JobIntervals {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            backup: get_interval("GERINMAH_BACKUP_INTERVAL_SECS", DEFAULT_BACKUP_INTERVAL_SECS)?,
            restore_check: get_interval(
                "GERINMAH_RESTORE_CHECK_INTERVAL_SECS",
                DEFAULT_RESTORE_CHECK_INTERVAL_SECS,
            )?,
            image_sync: get_interval(
                "GERINMAH_IMAGE_SYNC_INTERVAL_SECS",
                DEFAULT_IMAGE_SYNC_INTERVAL_SECS,
            )?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Get two variables that must be set together.
fn get_optional_pair(first: &str, second: &str) -> Result<Option<(String, String)>, ConfigError> {
    match (get_optional_env(first), get_optional_env(second)) {
        (Some(a), Some(b)) => Ok(Some((a, b))),
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::MissingEnvVar(second.to_string())),
        (None, Some(_)) => Err(ConfigError::MissingEnvVar(first.to_string())),
    }
}

/// Parse a positive number of seconds.
fn get_interval(key: &str, default_secs: u64) -> Result<Duration, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(Duration::from_secs(default_secs));
    };
    let secs = raw
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// Validate the base URL and strip any trailing slash.
fn parse_base_url(raw: &str) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar("GERINMAH_BASE_URL".to_string(), e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "GERINMAH_BASE_URL".to_string(),
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

/// Configuration for unit tests: no optional integrations, every directory
/// under `root`.
#[cfg(test)]
impl StorefrontConfig {
    pub(crate) fn for_tests(root: &std::path::Path) -> Self {
        Self {
            database_url: SecretString::from("postgres://127.0.0.1:1/unused"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 5000,
            base_url: "http://localhost:5000".to_string(),
            session_secret: SecretString::from("x".repeat(64)),
            admin: None,
            google: None,
            email: EmailConfig {
                sendgrid_api_key: None,
                from: "noreply@gerinmah.mn".to_string(),
                admin_notification: None,
            },
            storage: StorageConfig {
                permanent_upload_dir: root.join("data/uploads"),
                public_upload_dir: root.join("public/uploads"),
                backup_dir: root.join("data/backups"),
            },
            jobs: JobIntervals::default(),
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config(base_url: &str) -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/gerinmah"),
            host: "127.0.0.1".parse().unwrap(),
            port: 5000,
            base_url: base_url.to_string(),
            session_secret: SecretString::from("x".repeat(64)),
            admin: Some(AdminCredentials {
                username: "admin".to_string(),
                password: SecretString::from("hunter22-hunter22"),
            }),
            google: Some(GoogleOAuthConfig {
                client_id: "client.apps.googleusercontent.com".to_string(),
                client_secret: SecretString::from("GOCSPX-super-private-value"),
            }),
            email: EmailConfig {
                sendgrid_api_key: Some(SecretString::from("SG.sendgrid-private-value")),
                from: "noreply@gerinmah.mn".to_string(),
                admin_notification: None,
            },
            storage: StorageConfig {
                permanent_upload_dir: "data/uploads".into(),
                public_upload_dir: "public/uploads".into(),
                backup_dir: "data/backups".into(),
            },
            jobs: JobIntervals::default(),
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-session-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "SESSION_SECRET").is_err());
    }

    #[test]
    fn test_parse_base_url_strips_trailing_slash() {
        assert_eq!(
            parse_base_url("https://gerinmah.mn/").unwrap(),
            "https://gerinmah.mn"
        );
        assert!(parse_base_url("ftp://gerinmah.mn").is_err());
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_socket_addr_and_cookie_security() {
        let config = test_config("http://localhost:5000");
        let addr = config.socket_addr();
        assert_eq!(addr.port(), 5000);
        assert!(!config.secure_cookies());
        assert!(test_config("https://gerinmah.mn").secure_cookies());
    }

    #[test]
    fn test_google_redirect_uri() {
        let config = test_config("https://gerinmah.mn");
        assert_eq!(
            config.google_redirect_uri(),
            "https://gerinmah.mn/api/auth/google/callback"
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug_output = format!("{:?}", test_config("https://gerinmah.mn"));

        assert!(debug_output.contains("client.apps.googleusercontent.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("GOCSPX-super-private-value"));
        assert!(!debug_output.contains("hunter22-hunter22"));
        assert!(!debug_output.contains("SG.sendgrid-private-value"));
    }

    #[test]
    fn test_default_job_intervals() {
        let jobs = JobIntervals::default();
        assert_eq!(jobs.backup, Duration::from_secs(21_600));
        assert_eq!(jobs.restore_check, Duration::from_secs(86_400));
        assert_eq!(jobs.image_sync, Duration::from_secs(600));
    }
}
