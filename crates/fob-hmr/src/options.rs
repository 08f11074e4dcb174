//! Dev options: what to serve, and where HMR lives.
//!
//! Options are loaded once per session with figment and read on every event.
//! Priority: environment variables > config file > defaults.

use crate::error::ConfigError;
use figment::{
    providers::{Env, Format as _, Json, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "fob.dev.json";

/// Environment variable prefix, nested keys split on `__`.
pub const ENV_PREFIX: &str = "FOB_DEV_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevOptions {
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Where bundles are written. Defaults to `<cache_dir>/dist`.
    #[serde(default)]
    pub dist_dir: Option<PathBuf>,

    /// Serve the build output. `None` disables the asset server.
    #[serde(default)]
    pub serve: Option<ServeOptions>,

    /// Hot module replacement. `None` or `false` disables it.
    #[serde(default)]
    pub hot: Option<HmrOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServeOptions {
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Public URL prefix. Defaults to `/` at resolution time, since the
    /// target's own public URL is usually meant for production.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl ServeOptions {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            host: default_host(),
            public_url: None,
        }
    }

    pub fn public_url(&self) -> &str {
        self.public_url.as_deref().unwrap_or("/")
    }
}

/// `hot: true` or `hot: { "port": 5678 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HmrOptions {
    Enabled(bool),
    Config(HmrConfig),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HmrConfig {
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub host: Option<String>,
}

impl HmrOptions {
    pub fn port(port: u16) -> Self {
        HmrOptions::Config(HmrConfig {
            port: Some(port),
            host: None,
        })
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, HmrOptions::Enabled(false))
    }

    /// Port explicitly requested for HMR, if any.
    pub fn requested_port(&self) -> Option<u16> {
        match self {
            HmrOptions::Config(config) => config.port,
            HmrOptions::Enabled(_) => None,
        }
    }

    fn requested_host(&self) -> Option<&str> {
        match self {
            HmrOptions::Config(config) => config.host.as_deref(),
            HmrOptions::Enabled(_) => None,
        }
    }
}

impl Default for DevOptions {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            cache_dir: default_cache_dir(),
            dist_dir: None,
            serve: None,
            hot: None,
        }
    }
}

impl DevOptions {
    /// Load options from defaults, the config file and `FOB_DEV_*` variables.
    ///
    /// Without an explicit path, `fob.dev.json` is read when it exists.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        let config_file = config_path.map(Path::to_path_buf).or_else(|| {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            default_path.exists().then(|| default_path.to_path_buf())
        });

        if let Some(path) = config_file {
            figment = figment.merge(Json::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let options: Self = figment
            .extract()
            .map_err(|e| ConfigError::Extract(Box::new(e)))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(serve) = &self.serve {
            if serve.port == 0 {
                return Err(invalid_port("serve.port"));
            }
            let public_url = serve.public_url();
            if !public_url.starts_with('/') && !public_url.contains("://") {
                return Err(ConfigError::InvalidValue {
                    field: "serve.public_url".to_string(),
                    value: public_url.to_string(),
                    hint: "Use an absolute path like '/' or a full URL".to_string(),
                });
            }
        }

        if let Some(hot) = &self.hot {
            if hot.requested_port() == Some(0) {
                return Err(invalid_port("hot.port"));
            }
        }

        Ok(())
    }

    pub fn hmr_enabled(&self) -> bool {
        self.hot.as_ref().is_some_and(HmrOptions::is_enabled)
    }

    /// Port under which the update channel for this session is registered:
    /// the HMR port when given, otherwise the serve port.
    pub fn hmr_port(&self) -> Option<u16> {
        let hot = self.hot.as_ref().filter(|h| h.is_enabled())?;
        hot.requested_port()
            .or_else(|| self.serve.as_ref().map(|s| s.port))
    }

    /// Whether the update channel shares the dev server's port and handle.
    pub fn is_hmr_colocated(&self) -> bool {
        match (&self.serve, &self.hot) {
            (Some(serve), Some(hot)) if hot.is_enabled() => hot
                .requested_port()
                .is_none_or(|port| port == serve.port),
            _ => false,
        }
    }

    /// Port for an update channel running on its own listener, if any.
    pub fn independent_hmr_port(&self) -> Option<u16> {
        let port = self
            .hot
            .as_ref()
            .filter(|h| h.is_enabled())?
            .requested_port()?;
        match &self.serve {
            Some(serve) if serve.port == port => None,
            _ => Some(port),
        }
    }

    pub fn hmr_host(&self) -> String {
        self.hot
            .as_ref()
            .and_then(HmrOptions::requested_host)
            .map(str::to_string)
            .or_else(|| self.serve.as_ref().map(|s| s.host.clone()))
            .unwrap_or_else(default_host)
    }

    /// Output directory the dev server reads bundles from.
    pub fn dist_dir(&self) -> PathBuf {
        self.dist_dir
            .clone()
            .unwrap_or_else(|| self.cache_dir.join("dist"))
    }
}

fn invalid_port(field: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: "0".to_string(),
        hint: "Use a port between 1 and 65535".to_string(),
    }
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".fob-cache")
}

fn default_host() -> String {
    "127.0.0.1".into()
}
