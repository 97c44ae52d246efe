use std::path::PathBuf;
use std::rc::Rc;

use clap::ValueEnum;
use tracing::debug;

use crate::decay::StabilityRule;
use crate::error::{Error, Result};
use crate::storage::{JsonFileStorage, MemoryStorage, SqliteStorage, Storage};

pub const HOME_ENV: &str = "LEARNPATH_HOME";
pub const BACKEND_ENV: &str = "LEARNPATH_BACKEND";
pub const STABILITY_RULE_ENV: &str = "LEARNPATH_STABILITY_RULE";
pub const LOG_ENV: &str = "LEARNPATH_LOG";

const DEFAULT_DB_NAME: &str = "learnpath.db";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Backend {
    #[default]
    Json,
    Sqlite,
    /// Nothing survives the process
    Memory,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Json => "json",
            Backend::Sqlite => "sqlite",
            Backend::Memory => "memory",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Backend::Json),
            "sqlite" => Some(Backend::Sqlite),
            "memory" => Some(Backend::Memory),
            _ => None,
        }
    }
}

/// Values given on the command line; these win over the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub state_dir: Option<PathBuf>,
    pub backend: Option<Backend>,
    pub target_retention: Option<f64>,
    pub review_threshold: Option<f64>,
    pub stability_rule: Option<StabilityRule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub state_dir: PathBuf,
    pub backend: Backend,
    pub target_retention: f64,
    pub review_threshold: f64,
    pub stability_rule: StabilityRule,
    pub log_filter: String,
}

impl Config {
    /// Flags first, then the process environment, then defaults.
    pub fn resolve(overrides: Overrides) -> Result<Self> {
        Self::from_sources(overrides, |key| std::env::var(key).ok())
    }

    fn from_sources(overrides: Overrides, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let state_dir = overrides
            .state_dir
            .or_else(|| env(HOME_ENV).map(PathBuf::from))
            .unwrap_or_else(default_state_dir);

        let backend = match (overrides.backend, env(BACKEND_ENV)) {
            (Some(backend), _) => backend,
            (None, Some(name)) => Backend::from_str(&name)
                .ok_or_else(|| Error::Config(format!("unknown backend '{}'", name)))?,
            (None, None) => Backend::default(),
        };

        let stability_rule = match (overrides.stability_rule, env(STABILITY_RULE_ENV)) {
            (Some(rule), _) => rule,
            (None, Some(name)) => StabilityRule::from_str(&name).ok_or_else(|| {
                Error::Config(format!("unknown stability rule '{}'", name))
            })?,
            (None, None) => StabilityRule::default(),
        };

        let target_retention = overrides.target_retention.unwrap_or(0.85);
        let review_threshold = overrides.review_threshold.unwrap_or(0.7);
        for value in [target_retention, review_threshold] {
            if !(value > 0.0 && value < 1.0) {
                return Err(Error::InvalidTarget(value));
            }
        }

        let config = Self {
            state_dir,
            backend,
            target_retention,
            review_threshold,
            stability_rule,
            log_filter: env(LOG_ENV).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        };
        debug!(?config, "resolved configuration");
        Ok(config)
    }

    pub fn open_storage(&self) -> Result<Rc<dyn Storage>> {
        let storage: Rc<dyn Storage> = match self.backend {
            Backend::Memory => Rc::new(MemoryStorage::new()),
            Backend::Json => Rc::new(JsonFileStorage::open(&self.state_dir)?),
            Backend::Sqlite => {
                std::fs::create_dir_all(&self.state_dir)?;
                Rc::new(SqliteStorage::open(self.state_dir.join(DEFAULT_DB_NAME))?)
            }
        };
        Ok(storage)
    }
}

fn default_state_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("learnpath")
}
