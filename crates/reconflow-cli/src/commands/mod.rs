//! Subcommand implementations.

pub mod config;
pub mod jobs;
pub mod scan;
pub mod settings;
pub mod targets;

use anyhow::Context as _;
use reconflow_core::{AppConfig, JobId, TargetId};
use reconflow_db::Database;
use reconflow_engine::ReconOrchestrator;
use std::path::{Path, PathBuf};

/// Everything a subcommand needs: configuration, the store and the engine.
pub struct Context {
    config_path: Option<PathBuf>,
    db: Database,
    engine: ReconOrchestrator,
}

impl Context {
    pub async fn open(config_path: Option<&Path>, database: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = load_config(config_path)?;
        if let Some(path) = database {
            config.database.path = path;
        }

        let db = Database::new(&config.database.path)
            .await
            .with_context(|| format!("opening job store at {}", config.database.path.display()))?;
        let engine = ReconOrchestrator::from_config(&config, db.clone())?;

        Ok(Self {
            config_path: config_path.map(Path::to_path_buf),
            db,
            engine,
        })
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn engine(&self) -> &ReconOrchestrator {
        &self.engine
    }

    pub async fn close(self) {
        self.db.close().await;
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::load_with_env().context("loading config")?,
    };
    Ok(config)
}

pub fn parse_job_id(raw: &str) -> anyhow::Result<JobId> {
    JobId::new(raw).with_context(|| format!("invalid job id '{raw}'"))
}

pub fn parse_target_id(raw: &str) -> anyhow::Result<TargetId> {
    TargetId::new(raw).with_context(|| format!("invalid target id '{raw}'"))
}

pub fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
