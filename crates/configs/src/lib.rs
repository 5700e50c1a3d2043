use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub remote: Option<RemoteStorageConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Upper bound for a whole request body (a batch upload carries several files).
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            worker_threads: Some(4),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::for_url("")
    }
}

/// Which backend receives newly stored images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveBackend {
    Local,
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Filesystem root holding locally stored images.
    #[serde(default = "default_upload_root")]
    pub root: PathBuf,
    /// URL prefix under which the local root is served, e.g. `/static/uploads`.
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: BTreeSet<String>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Defaults to `remote` when remote credentials exist, `local` otherwise.
    #[serde(default)]
    pub active_backend: Option<ActiveBackend>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            root: default_upload_root(),
            url_prefix: default_url_prefix(),
            allowed_extensions: default_allowed_extensions(),
            max_upload_bytes: default_max_upload_bytes(),
            active_backend: None,
        }
    }
}

/// Credentials and namespace for the Cloudinary-compatible object store.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct RemoteStorageConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_remote_folder")]
    pub folder: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_delivery_base_url")]
    pub delivery_base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 600 }
fn default_max_lifetime() -> u64 { 3600 }
fn default_acquire_timeout() -> u64 { 30 }
fn default_max_request_bytes() -> usize { 64 * 1024 * 1024 }
fn default_upload_root() -> PathBuf { PathBuf::from("static/uploads") }
fn default_url_prefix() -> String { "/static/uploads".to_string() }
fn default_max_upload_bytes() -> usize { 16 * 1024 * 1024 }
fn default_allowed_extensions() -> BTreeSet<String> {
    ["png", "jpg", "jpeg", "gif"].iter().map(|s| s.to_string()).collect()
}
fn default_remote_folder() -> String { "salon_uploads".to_string() }
fn default_api_base_url() -> String { "https://api.cloudinary.com/v1_1".to_string() }
fn default_delivery_base_url() -> String { "https://res.cloudinary.com".to_string() }
fn default_request_timeout() -> u64 { 30 }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `config.toml` if present (falling back to defaults), then fill from env and validate.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(_) => AppConfig::default(),
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize_from_env();
        self.server.normalize()?;
        self.database.normalize_from_env();
        self.database.validate()?;
        self.uploads.normalize_from_env();
        self.uploads.normalize()?;
        if self.remote.is_none() {
            self.remote = RemoteStorageConfig::from_env();
        }
        if let Some(remote) = &self.remote {
            remote.validate()?;
        }
        if self.uploads.active_backend == Some(ActiveBackend::Remote) && self.remote.is_none() {
            return Err(anyhow!("uploads.active_backend = \"remote\" requires a [remote] section or CLOUDINARY_* variables"));
        }
        Ok(())
    }

    /// The backend new images go to once defaults are applied.
    pub fn active_backend(&self) -> ActiveBackend {
        match self.uploads.active_backend {
            Some(b) => b,
            None if self.remote.is_some() => ActiveBackend::Remote,
            None => ActiveBackend::Local,
        }
    }
}

impl ServerConfig {
    fn normalize_from_env(&mut self) {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            if !host.trim().is_empty() { self.host = host; }
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.port = port;
        }
    }

    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        if let Some(w) = self.worker_threads {
            if w == 0 { self.worker_threads = Some(4); }
        } else {
            self.worker_threads = Some(4);
        }
        if self.max_request_bytes == 0 {
            self.max_request_bytes = default_max_request_bytes();
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn normalize_from_env(&mut self) {
        // TOML wins; DATABASE_URL only fills a missing url
        if self.url.trim().is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                self.url = url;
            }
        }
        if self.max_connections == 0 && self.min_connections == 0 {
            self.max_connections = default_max_connections();
            self.min_connections = default_min_connections();
        }
        if self.connect_timeout_secs == 0 { self.connect_timeout_secs = default_connect_timeout(); }
        if self.acquire_timeout_secs == 0 { self.acquire_timeout_secs = default_acquire_timeout(); }
        if self.idle_timeout_secs == 0 { self.idle_timeout_secs = default_idle_timeout(); }
        if self.max_lifetime_secs == 0 { self.max_lifetime_secs = default_max_lifetime(); }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("database.url is empty; set it in config.toml or DATABASE_URL"));
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("postgresql://") || lower.starts_with("postgres://") || lower.starts_with("sqlite:")) {
            return Err(anyhow!("database.url must start with postgres://, postgresql:// or sqlite:"));
        }
        if self.min_connections == 0 {
            return Err(anyhow!("database.min_connections must be >= 1"));
        }
        if self.max_connections < self.min_connections {
            return Err(anyhow!("database.max_connections must be >= min_connections"));
        }
        if self.connect_timeout_secs == 0 || self.acquire_timeout_secs == 0 {
            return Err(anyhow!("database timeouts must be positive seconds"));
        }
        Ok(())
    }

    /// Heroku-style `postgres://` urls are accepted as-is; only whitespace is trimmed.
    pub fn for_url(url: &str) -> Self {
        Self {
            url: url.trim().to_string(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            max_lifetime_secs: default_max_lifetime(),
            acquire_timeout_secs: default_acquire_timeout(),
            sqlx_logging: false,
        }
    }
}

impl UploadConfig {
    fn normalize_from_env(&mut self) {
        if let Ok(root) = std::env::var("UPLOAD_FOLDER") {
            if !root.trim().is_empty() { self.root = PathBuf::from(root); }
        }
    }

    fn normalize(&mut self) -> Result<()> {
        self.allowed_extensions = self
            .allowed_extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        if self.allowed_extensions.is_empty() {
            return Err(anyhow!("uploads.allowed_extensions must not be empty"));
        }
        if self.max_upload_bytes == 0 {
            return Err(anyhow!("uploads.max_upload_bytes must be positive"));
        }
        let trimmed = self.url_prefix.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(anyhow!("uploads.url_prefix must not be empty"));
        }
        self.url_prefix = if trimmed.starts_with('/') { trimmed.to_string() } else { format!("/{trimmed}") };
        Ok(())
    }
}

impl RemoteStorageConfig {
    /// Build from `CLOUDINARY_*` variables; `None` unless cloud name, key and secret are all set.
    pub fn from_env() -> Option<Self> {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());
        let cloud_name = var("CLOUDINARY_CLOUD_NAME")?;
        let api_key = var("CLOUDINARY_API_KEY")?;
        let api_secret = var("CLOUDINARY_API_SECRET")?;
        Some(Self {
            cloud_name,
            api_key,
            api_secret,
            folder: var("CLOUDINARY_FOLDER").unwrap_or_else(default_remote_folder),
            api_base_url: default_api_base_url(),
            delivery_base_url: default_delivery_base_url(),
            request_timeout_secs: default_request_timeout(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.cloud_name.trim().is_empty() || self.api_key.trim().is_empty() || self.api_secret.trim().is_empty() {
            return Err(anyhow!("remote storage needs cloud_name, api_key and api_secret"));
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(anyhow!("remote.api_base_url must start with http(s)"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("remote.request_timeout_secs must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_upload_policy() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.uploads.max_upload_bytes, 16 * 1024 * 1024);
        assert!(cfg.uploads.allowed_extensions.contains("jpeg"));
        assert_eq!(cfg.uploads.allowed_extensions.len(), 4);
        assert_eq!(cfg.active_backend(), ActiveBackend::Local);
    }

    #[test]
    fn parses_toml_with_remote_section() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
host = "0.0.0.0"
port = 9000

[database]
url = "sqlite://salon.db?mode=rwc"
min_connections = 1

[uploads]
url_prefix = "media/"
allowed_extensions = [".PNG", "jpg"]

[remote]
cloud_name = "demo"
api_key = "k"
api_secret = "s"
"#,
        )?;
        let mut cfg = load_from_file(path.to_str().unwrap())?;
        cfg.normalize_and_validate()?;
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.uploads.url_prefix, "/media");
        assert!(cfg.uploads.allowed_extensions.contains("png"));
        assert_eq!(cfg.remote.as_ref().unwrap().folder, "salon_uploads");
        assert_eq!(cfg.active_backend(), ActiveBackend::Remote);
        Ok(())
    }

    #[test]
    fn env_only_config_gets_pool_timeouts() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        std::env::set_var("CONFIG_PATH", tmp.path().join("absent.toml"));
        std::env::set_var("DATABASE_URL", "sqlite://salon.db?mode=rwc");
        let cfg = AppConfig::load_and_validate()?;
        assert_eq!(cfg.database.url, "sqlite://salon.db?mode=rwc");
        assert_eq!(cfg.database.idle_timeout_secs, 600);
        assert_eq!(cfg.database.max_lifetime_secs, 3600);
        assert_eq!(cfg.database.min_connections, 2);
        Ok(())
    }

    #[test]
    fn zero_pool_timeouts_are_normalized() {
        let mut db = DatabaseConfig::for_url("sqlite::memory:");
        db.idle_timeout_secs = 0;
        db.max_lifetime_secs = 0;
        db.normalize_from_env();
        assert_eq!(db.idle_timeout_secs, 600);
        assert_eq!(db.max_lifetime_secs, 3600);
        assert_eq!(DatabaseConfig::default().idle_timeout_secs, 600);
    }

    #[test]
    fn rejects_unknown_database_scheme() {
        let db = DatabaseConfig::for_url("mysql://x");
        assert!(db.validate().is_err());
        let db = DatabaseConfig::for_url("sqlite::memory:");
        assert!(db.validate().is_ok());
    }

    #[test]
    fn rejects_incomplete_remote_credentials() {
        let remote = RemoteStorageConfig { cloud_name: "demo".into(), ..Default::default() };
        assert!(remote.validate().is_err());
    }
}
