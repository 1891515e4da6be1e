use std::time::Duration;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable selecting the preset used for fresh configs
pub const ENV_VAR: &str = "UPTIME_ENV";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read config {path}: {source}")]
    ReadFailed {
        path: path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write config {path}: {source}")]
    WriteFailed {
        path: path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("Neither XDG_CONFIG_HOME nor a home directory is available")]
    ConfigPathUnavailable,
}

/// Deployment preset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Staging,
    Production,
}

impl Environment {
    /// Read the preset from `UPTIME_ENV`; anything unknown is staging
    pub fn from_env() -> Self {
        env::var(ENV_VAR).map(|raw| Self::parse(&raw)).unwrap_or_default()
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "production" => Environment::Production,
            _ => Environment::Staging,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub env_name: String,
    pub worker: WorkerSettings,
    pub storage: StorageSettings,
    pub prober: ProberSettings,
    pub alerts: AlertSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub check_interval_seconds: u64,
    pub rotation_interval_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: path::PathBuf,
    pub logs_dir: path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProberSettings {
    pub user_agent: String,
    pub use_system_proxy: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertTransportKind {
    #[default]
    Log,
    Webhook,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    pub transport: AlertTransportKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_token: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// "compact" or "json"
    pub format: String,
    pub level: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self { check_interval_seconds: 60, rotation_interval_seconds: 24 * 60 * 60 }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { data_dir: ".data".into(), logs_dir: ".logs".into() }
    }
}

impl Default for ProberSettings {
    fn default() -> Self {
        Self {
            user_agent: concat!("uptime-worker/", env!("CARGO_PKG_VERSION")).to_string(),
            use_system_proxy: false,
        }
    }
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            transport: AlertTransportKind::Log,
            webhook_url: None,
            webhook_token: None,
            timeout_seconds: 10,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { format: "compact".into(), level: "info".into() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::for_environment(Environment::Staging)
    }
}

impl WorkerSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds.max(1))
    }

    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(self.rotation_interval_seconds.max(1))
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uptime-worker/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("uptime-worker/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State ({}):", self.env_name)?;
        write_title_1(f, "Worker")?;
        write_1(f, "Check Interval (s)", &self.worker.check_interval_seconds)?;
        write_1(f, "Rotation Interval (s)", &self.worker.rotation_interval_seconds)?;
        write_title_1(f, "Storage")?;
        write_1(f, "Data Directory", &self.storage.data_dir.display())?;
        write_1(f, "Logs Directory", &self.storage.logs_dir.display())?;
        write_title_1(f, "Prober")?;
        write_1(f, "User Agent", &self.prober.user_agent)?;
        write_1(f, "System Proxy", &self.prober.use_system_proxy)?;
        write_title_1(f, "Alerts")?;
        write_1(f, "Transport", &format!("{:?}", self.alerts.transport).to_lowercase())?;
        write_1(f, "Webhook URL", &self.alerts.webhook_url.as_deref().unwrap_or("-"))?;
        let token = if self.alerts.webhook_token.is_some() { "<set>" } else { "-" };
        write_1(f, "Webhook Token", &token)?;
        write_title_1(f, "Logging")?;
        write_1(f, "Format", &self.logging.format)?;
        write_1(f, "Level", &self.logging.level)?;

        Ok(())
    }
}

impl Config {
    /// Defaults for a deployment preset
    pub fn for_environment(environment: Environment) -> Self {
        let logging = match environment {
            Environment::Staging => LoggingSettings::default(),
            Environment::Production => {
                LoggingSettings { format: "json".into(), ..LoggingSettings::default() }
            }
        };

        Self {
            env_name: environment.name().to_string(),
            worker: WorkerSettings::default(),
            storage: StorageSettings::default(),
            prober: ProberSettings::default(),
            alerts: AlertSettings::default(),
            logging,
        }
    }

    /// Generate Config structure from file
    ///
    /// Creates a default config (preset picked from `UPTIME_ENV`) in
    /// ~/.config/uptime-worker/config.toml or the specified path, with the
    /// extension forced to .toml, if one does not exist
    ///
    /// ```ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::for_environment(Environment::from_env());
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }
}
