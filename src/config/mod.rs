use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::themes::ThemeRegistry;
use crate::engine::EngineConfig;

pub mod themes;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "TimelineTui";
const APP_NAME: &str = "timeline";

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
            default_cfg.post_load();
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load();
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
    /// Where `<name>.json` timelines live.
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("TIMELINE_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("TIMELINE_DATA").ok().map(PathBuf::from);

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

        let data_dir = override_data.unwrap_or_else(|| project_dirs.data_dir().join("timelines"));
        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| project_dirs.data_dir().join("state"));
        let log_dir = state_dir.join("logs");

        Ok(Self {
            config_dir,
            config_file,
            data_dir,
            log_dir,
            state_dir,
        })
    }

    /// Lays every directory out under `root`; used by tests and portable setups.
    pub fn rooted_at(root: &Path) -> Self {
        let config_dir = root.join("config");
        let state_dir = root.join("state");
        Self {
            config_file: config_dir.join("config.toml"),
            config_dir,
            data_dir: root.join("timelines"),
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.data_dir = data_dir;
        self
    }

    pub fn with_config_file(mut self, config_file: PathBuf) -> Self {
        if let Some(parent) = config_file.parent() {
            self.config_dir = parent.to_path_buf();
        }
        self.config_file = config_file;
        self
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.data_dir, &self.log_dir, &self.state_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub theme: ThemeName,
    pub data: DataOptions,
    /// Partial tables fill in from [`EngineConfig::terminal`].
    #[serde(deserialize_with = "deserialize_engine")]
    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            theme: ThemeName::Dark,
            data: DataOptions::default(),
            engine: EngineConfig::terminal(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self) {
        if !ThemeRegistry::default().contains(&self.theme) {
            tracing::warn!(?self.theme, "unknown theme in config, falling back to Dark");
            self.theme = ThemeName::Dark;
        }
        if self.data.default_timeline.trim().is_empty() {
            tracing::warn!("empty default timeline in config, using mathematics");
            self.data.default_timeline = DataOptions::default().default_timeline;
        }
        for field in self.engine.sanitize() {
            tracing::warn!(field, "invalid engine setting in config, using default");
        }
    }
}

fn deserialize_engine<'de, D>(deserializer: D) -> Result<EngineConfig, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = toml::Table::deserialize(deserializer)?;
    let mut merged = match toml::Value::try_from(EngineConfig::terminal()).map_err(D::Error::custom)? {
        toml::Value::Table(table) => table,
        _ => toml::Table::new(),
    };
    merge_tables(&mut merged, overrides);
    EngineConfig::deserialize(toml::Value::Table(merged)).map_err(D::Error::custom)
}

fn merge_tables(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        if let toml::Value::Table(nested) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, nested);
                continue;
            }
            base.insert(key, toml::Value::Table(nested));
        } else {
            base.insert(key, value);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataOptions {
    /// Timeline opened when none is named, and the fallback for missing ones.
    pub default_timeline: String,
}

impl Default for DataOptions {
    fn default() -> Self {
        Self {
            default_timeline: "mathematics".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, std::hash::Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeName {
    Dark,
    Light,
    HighContrast,
    Solarized,
}

impl Default for ThemeName {
    fn default() -> Self {
        ThemeName::Dark
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Easing, LayoutMetrics, UntaggedPolicy};
    use anyhow::Result;
    use tempfile::TempDir;

    type TestResult<T = ()> = Result<T>;

    #[test]
    fn missing_config_is_written_with_defaults() -> TestResult {
        let dir = TempDir::new()?;
        let loader = ConfigLoader::with_paths(ConfigPaths::rooted_at(dir.path()));
        let cfg = loader.load_or_init()?;
        assert_eq!(cfg, AppConfig::default());
        assert!(loader.paths().config_file.exists());
        assert!(loader.paths().log_dir.is_dir());
        assert_eq!(loader.load()?, cfg);
        Ok(())
    }

    #[test]
    fn partial_config_keeps_other_defaults() -> TestResult {
        let dir = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(dir.path());
        fs::create_dir_all(&paths.config_dir)?;
        fs::write(
            &paths.config_file,
            r#"
theme = "solarized"

[engine]
untagged = "hide"

[engine.animation]
easing = "linear"
"#,
        )?;
        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.theme, ThemeName::Solarized);
        assert_eq!(cfg.engine.untagged, UntaggedPolicy::Hide);
        assert_eq!(cfg.engine.animation.easing, Easing::Linear);
        assert_eq!(cfg.engine.animation.duration_ms, 400);
        assert_eq!(cfg.engine.layout, LayoutMetrics::terminal());
        assert_eq!(cfg.engine.container_width, 120.0);
        assert_eq!(cfg.data.default_timeline, "mathematics");
        Ok(())
    }

    #[test]
    fn invalid_engine_values_are_repaired() -> TestResult {
        let dir = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(dir.path());
        fs::create_dir_all(&paths.config_dir)?;
        fs::write(
            &paths.config_file,
            "[engine]\nmin_zoom = -1.0\nzoom_factor = 0.5\n\n[data]\ndefault_timeline = \"  \"\n",
        )?;
        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.engine.min_zoom, 0.01);
        assert_eq!(cfg.engine.zoom_factor, 1.5);
        assert_eq!(cfg.data.default_timeline, "mathematics");
        Ok(())
    }

    #[test]
    fn malformed_toml_reports_context() -> TestResult {
        let dir = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(dir.path());
        fs::create_dir_all(&paths.config_dir)?;
        fs::write(&paths.config_file, "theme = [")?;
        let err = ConfigLoader::with_paths(paths).load().unwrap_err();
        assert!(format!("{err:#}").contains("parsing config toml"));
        Ok(())
    }
}
