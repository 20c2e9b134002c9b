//! Layered configuration for paddock.
//!
//! Values are resolved from, lowest to highest precedence:
//!
//! 1. Built-in defaults.
//! 2. A config file (TOML, YAML or JSON, picked by extension). Either given
//!    explicitly or `paddock.toml` in the user's config directory.
//! 3. Environment variables prefixed `PADDOCK_`, with `__` separating nested
//!    keys (`PADDOCK_API__TOKEN`, `PADDOCK_TTL__VOLATILE_SECS`).
//!
//! Command line overrides are applied on top by the binary.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use paddock_source::TtlPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "PADDOCK_";
pub const DEFAULT_BASE_URL: &str = "https://members-ng.iracing.com";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the consolidated tables.
    pub output_dir: PathBuf,
    /// Directory holding the response cache.
    pub cache_dir: PathBuf,
    pub api: ApiConfig,
    pub ttl: TtlConfig,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./data"),
            cache_dir: project_dirs()
                .map(|dirs| dirs.cache_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from("./.cache")),
            api: ApiConfig::default(),
            ttl: TtlConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer token sent with every request, if set.
    pub token: Option<String>,
    pub timeout_secs: u64,
}
impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}
impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How long cached responses stay fresh, per mutation class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    pub volatile_secs: u64,
    pub immutable_secs: u64,
}
impl Default for TtlConfig {
    fn default() -> Self {
        let policy = TtlPolicy::default();
        Self {
            volatile_secs: policy.volatile.as_secs(),
            immutable_secs: policy.immutable.as_secs(),
        }
    }
}
impl TtlConfig {
    pub fn policy(&self) -> TtlPolicy {
        TtlPolicy {
            volatile: Duration::from_secs(self.volatile_secs),
            immutable: Duration::from_secs(self.immutable_secs),
        }
    }
}

impl Config {
    /// Loads configuration from every layer.
    ///
    /// An explicit `file` must exist; the default config file is optional.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(file)?.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Defaults plus the config file layer, without the environment.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let file = match file {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => path.to_path_buf(),
            None => match Self::default_file() {
                Some(path) if path.is_file() => path,
                _ => return Ok(figment),
            },
        };
        tracing::debug!(path = %file.display(), "loading config file");
        let extension = file.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
        Ok(match extension.to_ascii_lowercase().as_str() {
            "toml" => figment.merge(Toml::file(&file)),
            "yaml" | "yml" => figment.merge(Yaml::file(&file)),
            "json" => figment.merge(Json::file(&file)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(file)),
        })
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// `paddock.toml` in the platform config directory.
    pub fn default_file() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("paddock.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("api.timeout_secs must be greater than zero".into()));
        }
        if !(self.api.base_url.starts_with("https://") || self.api.base_url.starts_with("http://")) {
            exn::bail!(ErrorKind::Invalid(format!(
                "api.base_url must be an http(s) URL, got {:?}",
                self.api.base_url
            )));
        }
        if self.ttl.immutable_secs < self.ttl.volatile_secs {
            exn::bail!(ErrorKind::Invalid(
                "ttl.immutable_secs must not be shorter than ttl.volatile_secs".into()
            ));
        }
        if self.output_dir.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("output_dir must not be empty".into()));
        }
        Ok(())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "paddock")
}
