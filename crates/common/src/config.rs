use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub general: General,
    pub web: Option<Web>,
    pub snapshots: Snapshots,
    pub generator: Generator,
    pub multipliers: Multipliers,
}

#[derive(Debug, Clone, Deserialize)]
pub struct General {
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Web {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSourceKind {
    Fs,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Snapshots {
    pub source: SnapshotSourceKind,
    pub dir: PathBuf,
    pub base_url: Option<String>,
    pub fetch_timeout_secs: u64,
}

impl Snapshots {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Generator {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub balances_file: String,
    pub voting_power_file: String,
    pub timeout_secs: u64,
}

impl Generator {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Fallback multipliers used when no power-derived ratio exists for a position.
#[derive(Debug, Clone, Deserialize)]
pub struct Multipliers {
    pub default_simple: f64,
    pub concentrated_active: f64,
    pub concentrated_inactive: f64,
    /// Simple-position multiplier per exchange name (matched case-insensitively).
    #[serde(default)]
    pub exchanges: BTreeMap<String, f64>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(web) = &self.web {
            anyhow::ensure!(web.port > 0, "web.port must be > 0");
        }
        anyhow::ensure!(
            self.generator.timeout_secs > 0,
            "generator.timeout_secs must be > 0"
        );
        anyhow::ensure!(
            !self.generator.program.trim().is_empty(),
            "generator.program must not be empty"
        );
        anyhow::ensure!(
            self.snapshots.fetch_timeout_secs > 0,
            "snapshots.fetch_timeout_secs must be > 0"
        );
        if self.snapshots.source == SnapshotSourceKind::Http {
            anyhow::ensure!(
                self.snapshots.base_url.is_some(),
                "snapshots.base_url is required when snapshots.source = \"http\""
            );
        }
        let m = &self.multipliers;
        let all = [m.default_simple, m.concentrated_active, m.concentrated_inactive]
            .into_iter()
            .chain(m.exchanges.values().copied());
        for value in all {
            anyhow::ensure!(
                value.is_finite() && value >= 0.0,
                "multipliers must be finite and >= 0 (got {value})"
            );
        }
        Ok(())
    }

    pub fn default_config_path() -> PathBuf {
        let candidate = Path::new("config/default.toml");
        if candidate.exists() {
            return candidate.to_path_buf();
        }
        // Running from inside a crate directory during development.
        let candidate = Path::new("../../config/default.toml");
        if candidate.exists() {
            return candidate.to_path_buf();
        }
        PathBuf::from("config/default.toml")
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}
