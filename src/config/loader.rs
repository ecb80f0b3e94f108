//! Configuration loader with tier-based merging.

use super::merge::deep_merge_all;
use super::types::{Config, Prompts, ProviderKind};
use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Compiled-in defaults
    Defaults = 0,
    /// Project-level config (`./taskzen/`)
    Project = 1,
    /// User-level config (`~/.taskzen/`)
    User = 2,
    /// Environment variables
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConfigTier::Defaults => "defaults",
            ConfigTier::Project => "project",
            ConfigTier::User => "user",
            ConfigTier::Environment => "environment",
        };
        f.write_str(name)
    }
}

/// Directories searched for configuration files.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover directories from `TASKZEN_PROJECT_DIR` / `TASKZEN_USER_DIR`,
    /// falling back to `./taskzen` and `~/.taskzen`.
    pub fn discover() -> Self {
        let project_dir = std::env::var("TASKZEN_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("taskzen")));
        let user_dir = std::env::var("TASKZEN_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".taskzen")));
        Self {
            project_dir,
            user_dir,
        }
    }

    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }

    /// Existing config files named `file_name`, lowest tier first.
    fn tier_files(&self, file_name: &str) -> Vec<(ConfigTier, PathBuf)> {
        [
            (ConfigTier::Project, self.project_dir.as_ref()),
            (ConfigTier::User, self.user_dir.as_ref()),
        ]
        .into_iter()
        .filter_map(|(tier, dir)| dir.map(|d| (tier, d.join(file_name))))
        .filter(|(_, path)| path.exists())
        .collect()
    }
}

/// Read a YAML file into a JSON value, logging and skipping unreadable files.
fn read_yaml_value(tier: ConfigTier, path: &Path) -> Option<Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(tier = %tier, path = %path.display(), error = %e, "Skipping unreadable config file");
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(tier = %tier, path = %path.display(), error = %e, "Skipping invalid YAML");
            None
        }
    }
}

/// Loads and merges configuration tiers.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Load configuration from all tiers.
    pub fn load() -> Result<Self> {
        Self::load_with_paths(ConfigPaths::discover())
    }

    /// Load configuration with explicit tier directories.
    ///
    /// `TASKZEN_CONFIG_PATH`, when set, names a single file that replaces the
    /// file tiers. Environment overrides apply in both cases.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        if let Ok(explicit) = std::env::var("TASKZEN_CONFIG_PATH") {
            let path = PathBuf::from(explicit);
            let mut config = Config::load(&path)?;
            Self::apply_env_overrides(&mut config);
            return Ok(Self {
                paths,
                config,
                config_path: Some(path),
            });
        }

        let mut tiers: Vec<Value> = vec![serde_json::to_value(Config::default())?];
        let mut config_path = None;
        for (tier, path) in paths.tier_files("config.yaml") {
            if let Some(value) = read_yaml_value(tier, &path) {
                tiers.push(value);
                config_path = Some(path);
            }
        }

        let mut config: Config = serde_json::from_value(deep_merge_all(tiers))?;
        Self::apply_env_overrides(&mut config);

        Ok(Self {
            paths,
            config,
            config_path,
        })
    }

    fn apply_env_overrides(config: &mut Config) {
        if let Ok(provider) = std::env::var("TASKZEN_PROVIDER") {
            match ProviderKind::from_str(&provider) {
                Some(kind) => config.generation.provider = kind,
                None => warn!(value = %provider, "Ignoring unknown TASKZEN_PROVIDER"),
            }
        }
        if let Ok(base_url) = std::env::var("TASKZEN_BASE_URL") {
            config.generation.base_url = base_url;
        }
        if let Ok(model) = std::env::var("TASKZEN_MODEL") {
            config.generation.model = model;
        }
    }

    /// Load `prompts.yaml` from the project and user tiers, merged.
    pub fn load_prompts(&self) -> Prompts {
        let mut tiers: Vec<Value> = Vec::new();
        if let Ok(defaults) = serde_json::to_value(Prompts::default()) {
            tiers.push(defaults);
        }
        for (tier, path) in self.paths.tier_files("prompts.yaml") {
            if let Some(value) = read_yaml_value(tier, &path) {
                tiers.push(value);
            }
        }
        serde_json::from_value(deep_merge_all(tiers)).unwrap_or_else(|e| {
            warn!(error = %e, "Invalid prompts configuration; using defaults");
            Prompts::default()
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Highest-tier config file that contributed, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths_in(temp: &TempDir) -> (PathBuf, PathBuf, ConfigPaths) {
        let project = temp.path().join("taskzen");
        let user = temp.path().join("user");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::create_dir_all(&user).unwrap();
        let paths = ConfigPaths::with_dirs(Some(project.clone()), Some(user.clone()));
        (project, user, paths)
    }

    #[test]
    fn defaults_when_no_files() {
        let temp = TempDir::new().unwrap();
        let (_, _, paths) = paths_in(&temp);
        let loader = ConfigLoader::load_with_paths(paths).unwrap();
        assert_eq!(loader.config().generation.timeout_secs, 60);
        assert!(loader.config_path().is_none());
    }

    #[test]
    fn user_tier_overrides_project_tier_field_by_field() {
        let temp = TempDir::new().unwrap();
        let (project, user, paths) = paths_in(&temp);
        std::fs::write(
            project.join("config.yaml"),
            "generation:\n  timeout_secs: 30\n  temperature: 0.5\nstore:\n  seed_sample_data: true\n",
        )
        .unwrap();
        std::fs::write(user.join("config.yaml"), "generation:\n  timeout_secs: 10\n").unwrap();

        let loader = ConfigLoader::load_with_paths(paths).unwrap();
        let config = loader.config();
        assert_eq!(config.generation.timeout_secs, 10);
        assert_eq!(config.generation.temperature, 0.5);
        assert!(config.store.seed_sample_data);
        assert_eq!(loader.config_path(), Some(user.join("config.yaml").as_path()));
    }

    #[test]
    fn invalid_yaml_tier_is_skipped() {
        let temp = TempDir::new().unwrap();
        let (project, _, paths) = paths_in(&temp);
        std::fs::write(project.join("config.yaml"), "generation: [unclosed").unwrap();
        let loader = ConfigLoader::load_with_paths(paths).unwrap();
        assert_eq!(loader.config().generation.model, "gpt-4o-mini");
    }

    #[test]
    fn prompts_merge_across_tiers() {
        let temp = TempDir::new().unwrap();
        let (project, user, paths) = paths_in(&temp);
        std::fs::write(
            project.join("prompts.yaml"),
            "instructions: project\ntemplates:\n  advice: project advice\n  parse: project parse\n",
        )
        .unwrap();
        std::fs::write(user.join("prompts.yaml"), "templates:\n  advice: user advice\n").unwrap();

        let loader = ConfigLoader::load_with_paths(paths).unwrap();
        let prompts = loader.load_prompts();
        assert_eq!(prompts.instructions.as_deref(), Some("project"));
        assert_eq!(prompts.get_template("advice"), Some("user advice"));
        assert_eq!(prompts.get_template("parse"), Some("project parse"));
    }
}
