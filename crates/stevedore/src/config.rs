//! Node configuration file for the CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use stevedore_deploy::effects::StaticDeletedEntities;
use stevedore_deploy::{ApplicationId, DeploymentConfig, DownloadManager, Layouts};
use stevedore_fetch::LocalStoreFetcher;

#[derive(Debug, Clone, Deserialize)]
pub struct Paths {
    /// Root of the package store.
    pub store:   PathBuf,
    /// Root of the node's run layout.
    pub run:     PathBuf,
    pub cache:   PathBuf,
    #[serde(default = "default_node_id")]
    pub node_id: String,
}

fn default_node_id() -> String { "node".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    pub paths:                Paths,
    #[serde(default)]
    pub deployment:           DeploymentConfig,
    /// Applications treated as deleted when their packages go missing.
    #[serde(default)]
    pub deleted_applications: Vec<ApplicationId>,
}

impl CliConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse config")?;
        config.deployment.validate().context("Invalid [deployment] section")?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&contents).with_context(|| format!("In {}", path.display()))
    }

    pub fn layouts(&self) -> Layouts { Layouts::new(&self.paths.run, &self.paths.cache, &self.paths.node_id) }

    pub fn manager(&self) -> Result<DownloadManager> {
        let fetcher = LocalStoreFetcher::new(&self.paths.store, &self.paths.cache);
        let deleted = StaticDeletedEntities::new(self.deleted_applications.iter().cloned());
        DownloadManager::builder(self.deployment.clone(), self.layouts(), Arc::new(fetcher))
            .deleted_entities(Arc::new(deleted))
            .build()
            .context("Failed to start download manager")
    }
}
