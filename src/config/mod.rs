use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::config::palette::{is_hex_color, FALLBACK_COLOR};

pub mod palette;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Tagnotes";
const APP_NAME: &str = "tagnotes";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths)?;
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    /// Per-account JSON documents for the `local` backend.
    pub local_dir: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
    pub session_file: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("TAGNOTES_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("TAGNOTES_DATA").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let database_path = data_root.join("tagnotes.db");
        let local_dir = data_root.join("local");

        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_root.join("state"));
        let log_dir = state_dir.join("logs");
        let session_file = state_dir.join("session.json");

        Ok(Self {
            config_dir,
            config_file,
            data_dir: data_root,
            database_path,
            local_dir,
            log_dir,
            state_dir,
            session_file,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.local_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: Backend,
    pub language: Language,
    pub session: SessionOptions,
    pub tags: TagOptions,
    pub storage: StorageOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            language: Language::En,
            session: SessionOptions::default(),
            tags: TagOptions::default(),
            storage: StorageOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.storage
            .resolve(paths)
            .context("resolving storage paths")?;
        self.tags.sanitize();
        if self.session.store_timeout_ms == 0 {
            tracing::warn!("store_timeout_ms of 0 would fail every call, using default");
            self.session.store_timeout_ms = SessionOptions::default().store_timeout_ms;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Relational tables in the application database, scoped per account.
    Sqlite,
    /// One JSON key-value document per account.
    Local,
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Sqlite
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Language {
    En,
    Vi,
}

impl Default for Language {
    fn default() -> Self {
        Language::En
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Upper bound for any single data store call.
    pub store_timeout_ms: u64,
    /// Keep the account signed in between runs.
    pub remember_session: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            store_timeout_ms: 10_000,
            remember_session: true,
        }
    }
}

impl SessionOptions {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefaultTag {
    pub name: String,
    pub color: String,
}

impl DefaultTag {
    fn new(name: &str, color: &str) -> Self {
        Self {
            name: name.to_string(),
            color: color.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TagOptions {
    /// Seeded into an account the first time it loads with no tags.
    pub defaults: Vec<DefaultTag>,
    /// Color for notes whose tag no longer exists.
    pub fallback_color: String,
}

impl Default for TagOptions {
    fn default() -> Self {
        Self {
            defaults: vec![
                DefaultTag::new("Work", "#3b82f6"),
                DefaultTag::new("Study", "#10b981"),
                DefaultTag::new("Personal", "#ef4444"),
                DefaultTag::new("Family", "#f97316"),
            ],
            fallback_color: FALLBACK_COLOR.to_string(),
        }
    }
}

impl TagOptions {
    fn sanitize(&mut self) {
        if !is_hex_color(&self.fallback_color) {
            tracing::warn!(color = %self.fallback_color, "invalid fallback color, using default");
            self.fallback_color = FALLBACK_COLOR.to_string();
        }
        let mut seen = Vec::<String>::new();
        self.defaults.retain(|tag| {
            let name = tag.name.trim().to_lowercase();
            if name.is_empty() || !is_hex_color(&tag.color) || seen.contains(&name) {
                tracing::warn!(name = %tag.name, color = %tag.color, "skipping invalid default tag");
                return false;
            }
            seen.push(name);
            true
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub database_path: PathBuf,
    pub wal_autocheckpoint: u32,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            wal_autocheckpoint: 1000,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            self.database_path = paths.database_path.clone();
        }
        Ok(())
    }
}
