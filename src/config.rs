//! Configuration loading and parsing.
//!
//! Defines the server config schema and resolves defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_DATABASE_PATH: &str = "flacvault.sqlite";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_SESSION_TTL_HOURS: u64 = 72;
const DEFAULT_MAX_AUDIO_MB: u64 = 500;
const DEFAULT_MAX_IMAGE_MB: u64 = 10;
const DEFAULT_MAX_LYRICS_KB: u64 = 1024;

/// Top-level server configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    /// Bind address (host:port).
    pub bind: Option<String>,
    /// Path to the catalog SQLite file.
    pub database_path: Option<String>,
    /// Binary storage settings.
    pub storage: Option<StorageConfig>,
    /// Auth settings (bootstrap admin, session TTL).
    pub auth: Option<AuthConfig>,
    /// Per-file upload caps.
    pub uploads: Option<UploadsConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadsConfig {
    /// Audio upload cap in megabytes (default: 500).
    pub max_audio_mb: Option<u64>,
    /// Cover image cap in megabytes (default: 10).
    pub max_image_mb: Option<u64>,
    /// Lyrics content cap in kilobytes (default: 1024).
    pub max_lyrics_kb: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    /// "local" (default) or "webdav".
    pub mode: Option<String>,
    /// Upload directory for local mode.
    pub upload_dir: Option<String>,
    /// WebDAV settings, required in webdav mode.
    pub webdav: Option<WebDavConfig>,
}

#[derive(Debug, Deserialize)]
pub struct WebDavConfig {
    /// WebDAV endpoint base URL.
    pub url: String,
    /// Collection path under the endpoint.
    pub base_path: Option<String>,
    /// Public base URL stored in locators.
    pub public_url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// Admin account created at startup when missing.
    pub admin_username: String,
    pub admin_password: String,
    /// Session lifetime in hours (default: 72).
    pub session_ttl_hours: Option<u64>,
}

impl ServerConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<ServerConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

/// Parse an optional bind address from config.
pub fn bind_from_config(cfg: &ServerConfig) -> Result<Option<SocketAddr>> {
    let Some(bind) = cfg.bind.as_deref() else {
        return Ok(None);
    };
    let addr = bind.parse().with_context(|| format!("parse bind {bind}"))?;
    Ok(Some(addr))
}

/// Extract the catalog database path from config.
pub fn database_path_from_config(cfg: &ServerConfig) -> PathBuf {
    cfg.database_path
        .as_deref()
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH))
}

/// Resolved storage settings.
#[derive(Debug, Clone)]
pub enum StorageConfigResolved {
    Local {
        upload_dir: PathBuf,
    },
    WebDav {
        url: String,
        base_path: String,
        public_url: String,
        username: String,
        password: String,
    },
}

/// Resolve the storage backend settings from config.
pub fn storage_from_config(cfg: &ServerConfig) -> Result<StorageConfigResolved> {
    let storage = cfg.storage.as_ref();
    let mode = storage
        .and_then(|s| s.mode.as_deref())
        .unwrap_or("local")
        .to_lowercase();
    match mode.as_str() {
        "local" => {
            let upload_dir = storage
                .and_then(|s| s.upload_dir.as_deref())
                .map(str::trim)
                .filter(|dir| !dir.is_empty())
                .unwrap_or(DEFAULT_UPLOAD_DIR);
            Ok(StorageConfigResolved::Local { upload_dir: PathBuf::from(upload_dir) })
        }
        "webdav" => {
            let webdav = storage
                .and_then(|s| s.webdav.as_ref())
                .ok_or_else(|| anyhow::anyhow!("[storage.webdav] is required in webdav mode"))?;
            Ok(StorageConfigResolved::WebDav {
                url: webdav.url.clone(),
                base_path: webdav.base_path.clone().unwrap_or_default(),
                public_url: webdav.public_url.clone(),
                username: webdav.username.clone(),
                password: webdav.password.clone(),
            })
        }
        other => Err(anyhow::anyhow!("unknown storage mode {other:?}")),
    }
}

/// Resolved per-file upload caps, in bytes.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub audio_bytes: usize,
    pub image_bytes: usize,
    pub lyrics_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        UploadLimits {
            audio_bytes: (DEFAULT_MAX_AUDIO_MB * 1024 * 1024) as usize,
            image_bytes: (DEFAULT_MAX_IMAGE_MB * 1024 * 1024) as usize,
            lyrics_bytes: (DEFAULT_MAX_LYRICS_KB * 1024) as usize,
        }
    }
}

pub fn upload_limits_from_config(cfg: &ServerConfig) -> UploadLimits {
    let uploads = cfg.uploads.as_ref();
    let audio_mb = uploads.and_then(|u| u.max_audio_mb).unwrap_or(DEFAULT_MAX_AUDIO_MB);
    let image_mb = uploads.and_then(|u| u.max_image_mb).unwrap_or(DEFAULT_MAX_IMAGE_MB);
    let lyrics_kb = uploads.and_then(|u| u.max_lyrics_kb).unwrap_or(DEFAULT_MAX_LYRICS_KB);
    UploadLimits {
        audio_bytes: (audio_mb * 1024 * 1024) as usize,
        image_bytes: (image_mb * 1024 * 1024) as usize,
        lyrics_bytes: (lyrics_kb * 1024) as usize,
    }
}

/// Resolved auth settings.
#[derive(Debug, Clone)]
pub struct AuthConfigResolved {
    pub admin_username: String,
    pub admin_password: String,
    pub session_ttl: Duration,
}

/// Extract auth settings; the bootstrap admin account is mandatory.
pub fn auth_from_config(cfg: &ServerConfig) -> Result<AuthConfigResolved> {
    let auth = cfg
        .auth
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("[auth] with admin credentials is required in config"))?;
    let hours = auth.session_ttl_hours.unwrap_or(DEFAULT_SESSION_TTL_HOURS);
    Ok(AuthConfigResolved {
        admin_username: auth.admin_username.clone(),
        admin_password: auth.admin_password.clone(),
        session_ttl: Duration::from_secs(hours * 3600),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let raw = r#"
            bind = "127.0.0.1:9000"
            database_path = "data/catalog.sqlite"

            [storage]
            mode = "webdav"

            [storage.webdav]
            url = "https://dav.example.com/remote.php/dav"
            base_path = "music"
            public_url = "https://cdn.example.com/music"
            username = "u"
            password = "p"

            [auth]
            admin_username = "admin"
            admin_password = "hunter2"
            session_ttl_hours = 12

            [uploads]
            max_audio_mb = 100
            max_lyrics_kb = 64
        "#;
        let cfg: ServerConfig = toml::from_str(raw).expect("parse");

        let bind = bind_from_config(&cfg).expect("bind").expect("present");
        assert_eq!(bind.port(), 9000);
        assert_eq!(database_path_from_config(&cfg), PathBuf::from("data/catalog.sqlite"));

        match storage_from_config(&cfg).expect("storage") {
            StorageConfigResolved::WebDav { base_path, public_url, .. } => {
                assert_eq!(base_path, "music");
                assert_eq!(public_url, "https://cdn.example.com/music");
            }
            other => panic!("expected webdav, got {other:?}"),
        }

        let auth = auth_from_config(&cfg).expect("auth");
        assert_eq!(auth.admin_username, "admin");
        assert_eq!(auth.session_ttl, Duration::from_secs(12 * 3600));

        let limits = upload_limits_from_config(&cfg);
        assert_eq!(limits.audio_bytes, 100 * 1024 * 1024);
        assert_eq!(limits.image_bytes, 10 * 1024 * 1024);
        assert_eq!(limits.lyrics_bytes, 64 * 1024);
    }

    #[test]
    fn defaults_apply_when_sections_missing() {
        let cfg = ServerConfig::default();
        assert!(bind_from_config(&cfg).expect("bind").is_none());
        assert_eq!(database_path_from_config(&cfg), PathBuf::from(DEFAULT_DATABASE_PATH));
        match storage_from_config(&cfg).expect("storage") {
            StorageConfigResolved::Local { upload_dir } => {
                assert_eq!(upload_dir, PathBuf::from(DEFAULT_UPLOAD_DIR));
            }
            other => panic!("expected local, got {other:?}"),
        }
        assert!(auth_from_config(&cfg).is_err());

        let limits = upload_limits_from_config(&cfg);
        assert_eq!(limits.audio_bytes, 500 * 1024 * 1024);
        assert_eq!(limits.lyrics_bytes, 1024 * 1024);
    }

    #[test]
    fn webdav_mode_requires_webdav_table() {
        let cfg = ServerConfig {
            storage: Some(StorageConfig {
                mode: Some("webdav".to_string()),
                upload_dir: None,
                webdav: None,
            }),
            ..ServerConfig::default()
        };
        assert!(storage_from_config(&cfg).is_err());
    }

    #[test]
    fn invalid_bind_is_an_error() {
        let cfg = ServerConfig { bind: Some("not-an-addr".to_string()), ..ServerConfig::default() };
        assert!(bind_from_config(&cfg).is_err());
    }
}
