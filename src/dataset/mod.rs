use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::config::{ConfigPaths, DataOptions};
use crate::engine::TimelineItem;

const BUNDLED_NAME: &str = "mathematics";
const BUNDLED_TIMELINE: &str = include_str!("../../data/mathematics.json");

/// A decoded timeline file.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub name: String,
    pub title: String,
    pub records: Vec<TimelineItem>,
    /// Array entries that did not decode as records.
    pub skipped: usize,
}

impl Dataset {
    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            title: display_title(name),
            ..Self::default()
        }
    }
}

pub struct DatasetLoader {
    data_dir: PathBuf,
    default_timeline: String,
}

impl DatasetLoader {
    pub fn new(data_dir: impl Into<PathBuf>, default_timeline: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            default_timeline: default_timeline.into(),
        }
    }

    pub fn from_config(paths: &ConfigPaths, options: &DataOptions) -> Self {
        Self::new(&paths.data_dir, &options.default_timeline)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn default_timeline(&self) -> &str {
        &self.default_timeline
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            bail!("invalid timeline name {name:?}");
        }
        Ok(self.data_dir.join(format!("{name}.json")))
    }

    pub fn load(&self, name: &str) -> Result<Dataset> {
        let path = self.path_for(name)?;
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading timeline data {}", path.display()))?;
        let values: Vec<serde_json::Value> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing timeline data {}", path.display()))?;

        let mut dataset = Dataset::empty(name);
        dataset.records.reserve(values.len());
        for (index, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<TimelineItem>(value) {
                Ok(record) => dataset.records.push(record),
                Err(err) => {
                    tracing::warn!(?err, index, timeline = name, "skipping malformed timeline record");
                    dataset.skipped += 1;
                }
            }
        }
        tracing::debug!(
            timeline = name,
            records = dataset.records.len(),
            skipped = dataset.skipped,
            "loaded timeline"
        );
        Ok(dataset)
    }

    /// Loads `name` (or the default timeline), falling back to the default
    /// and finally to an empty timeline.
    pub fn load_with_fallback(&self, name: Option<&str>) -> Dataset {
        let requested = name.unwrap_or(&self.default_timeline);
        match self.load(requested) {
            Ok(dataset) => return dataset,
            Err(err) => tracing::warn!(?err, timeline = requested, "failed to load timeline"),
        }
        if requested != self.default_timeline {
            match self.load(&self.default_timeline) {
                Ok(dataset) => return dataset,
                Err(err) => tracing::warn!(
                    ?err,
                    timeline = %self.default_timeline,
                    "failed to load default timeline"
                ),
            }
        }
        Dataset::empty(requested)
    }

    /// Timeline names found in the data directory, sorted.
    pub fn list_available(&self) -> Result<Vec<String>> {
        if !self.data_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.data_dir)
            .with_context(|| format!("listing timelines in {}", self.data_dir.display()))?;
        let mut names = Vec::new();
        for entry in entries {
            let path = entry.context("reading data directory entry")?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Writes the bundled mathematics timeline if the data directory has
    /// none. Returns whether a file was written.
    pub fn seed_bundled(&self) -> Result<bool> {
        let path = self.path_for(BUNDLED_NAME)?;
        if path.exists() {
            return Ok(false);
        }
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("creating {}", self.data_dir.display()))?;
        fs::write(&path, BUNDLED_TIMELINE)
            .with_context(|| format!("writing bundled timeline {}", path.display()))?;
        tracing::info!(path = %path.display(), "seeded bundled timeline");
        Ok(true)
    }
}

/// `"mathematics"` -> `"Mathematics Timeline"`.
pub fn display_title(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("{}{} Timeline", first.to_uppercase(), chars.as_str()),
        None => "Timeline".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    type TestResult<T = ()> = Result<T>;

    fn loader(dir: &TempDir) -> DatasetLoader {
        DatasetLoader::new(dir.path(), "mathematics")
    }

    #[test]
    fn decodes_records_individually() -> TestResult {
        let dir = TempDir::new()?;
        fs::write(
            dir.path().join("physics.json"),
            r#"[
                {"id": 1, "title": "Principia", "type": "event", "start": "1687"},
                {"id": 2, "title": "Broken", "start": 1905},
                {"title": "Relativity", "type": "period", "start": "1905", "end": "1915", "tags": null}
            ]"#,
        )?;
        let dataset = loader(&dir).load("physics")?;
        assert_eq!(dataset.title, "Physics Timeline");
        assert_eq!(dataset.records.len(), 2);
        assert_eq!(dataset.skipped, 1);
        Ok(())
    }

    #[test]
    fn falls_back_to_default_then_empty() -> TestResult {
        let dir = TempDir::new()?;
        let loader = loader(&dir);
        let empty = loader.load_with_fallback(Some("missing"));
        assert!(empty.records.is_empty());
        assert_eq!(empty.name, "missing");

        assert!(loader.seed_bundled()?);
        assert!(!loader.seed_bundled()?);
        let fallback = loader.load_with_fallback(Some("missing"));
        assert_eq!(fallback.name, "mathematics");
        assert!(!fallback.records.is_empty());
        assert_eq!(fallback.skipped, 0);
        Ok(())
    }

    #[test]
    fn lists_json_files_sorted() -> TestResult {
        let dir = TempDir::new()?;
        for file in ["zoology.json", "art.json", "notes.txt"] {
            fs::write(dir.path().join(file), "[]")?;
        }
        assert_eq!(loader(&dir).list_available()?, vec!["art", "zoology"]);
        Ok(())
    }

    #[test]
    fn rejects_path_like_names() -> TestResult {
        let dir = TempDir::new()?;
        let err = loader(&dir).load("../etc/passwd").unwrap_err();
        assert!(err.to_string().contains("invalid timeline name"));
        Ok(())
    }

    #[test]
    fn titles_capitalize_first_letter() {
        assert_eq!(display_title("mathematics"), "Mathematics Timeline");
        assert_eq!(display_title(""), "Timeline");
    }
}
