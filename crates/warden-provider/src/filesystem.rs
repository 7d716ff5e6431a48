//! Rule sets read from local files.
//!
//! `src` is either a single file or a directory whose `.yaml`, `.yml` and
//! `.json` files are each a rule set. Every file is its own source
//! `file_system:<path>`; a file that vanishes or becomes empty is reported
//! as deleted.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use warden_core::config::duration;
use warden_core::{Error, Result};
use warden_rules::{RuleSet, RuleSetProcessor};

use crate::RuleSetProvider;
use crate::change::ChangeTracker;
use crate::tasks::{WatchTasks, Watcher};

/// Source scheme of rule sets from this provider.
pub const SOURCE_SCHEME: &str = "file_system";

const EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Provider settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSystemProviderConfig {
    /// File or directory holding rule sets.
    #[serde(default)]
    pub src: PathBuf,
    /// Poll period. Absent or zero reads once.
    #[serde(default, deserialize_with = "duration::deserialize_option")]
    pub watch_interval: Option<Duration>,
}

/// Watches a file or directory.
#[derive(Debug)]
pub struct FileSystemProvider {
    interval: Option<Duration>,
    processor: Arc<dyn RuleSetProcessor>,
    pending: Mutex<Option<DirectoryWatcher>>,
    tasks: WatchTasks,
}

impl FileSystemProvider {
    /// Validate `config`. `src` must exist at load time.
    pub fn new(
        config: &FileSystemProviderConfig,
        processor: Arc<dyn RuleSetProcessor>,
    ) -> Result<Self> {
        if config.src.as_os_str().is_empty() {
            return Err(Error::configuration("'src' is a required field"));
        }
        if !config.src.exists() {
            return Err(Error::configuration(format!(
                "'src' {} does not exist",
                config.src.display()
            )));
        }

        Ok(Self {
            interval: config.watch_interval,
            processor,
            pending: Mutex::new(Some(DirectoryWatcher {
                src: config.src.clone(),
                tracker: ChangeTracker::new(),
            })),
            tasks: WatchTasks::new(),
        })
    }
}

#[async_trait]
impl RuleSetProvider for FileSystemProvider {
    fn name(&self) -> &'static str {
        SOURCE_SCHEME
    }

    fn start(&self) -> Result<()> {
        let watcher = self
            .pending
            .lock()
            .map_err(|_| Error::internal("file system provider state poisoned"))?
            .take()
            .ok_or_else(|| Error::internal("file system provider already started"))?;

        tracing::info!(
            src = %watcher.src.display(),
            interval = ?self.interval,
            "Starting file system rule set provider"
        );
        self.tasks
            .spawn(watcher, self.interval, Arc::clone(&self.processor))
    }

    async fn stop(&self) {
        tracing::info!("Stopping file system rule set provider");
        self.tasks.stop().await;
    }
}

#[derive(Debug)]
struct DirectoryWatcher {
    src: PathBuf,
    tracker: ChangeTracker,
}

impl DirectoryWatcher {
    async fn files(&self) -> std::io::Result<Vec<PathBuf>> {
        let metadata = match tokio::fs::metadata(&self.src).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        if metadata.is_file() {
            return Ok(vec![self.src.clone()]);
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && has_rule_set_extension(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn has_rule_set_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn source_for(path: &Path) -> String {
    format!("{SOURCE_SCHEME}:{}", path.display())
}

#[async_trait]
impl Watcher for DirectoryWatcher {
    fn name(&self) -> &str {
        SOURCE_SCHEME
    }

    async fn tick(&mut self, processor: &dyn RuleSetProcessor) {
        let files = match self.files().await {
            Ok(files) => files,
            Err(err) => {
                tracing::warn!(src = %self.src.display(), error = %err, "Failed to fetch rule set");
                return;
            }
        };

        let mut present = HashSet::with_capacity(files.len());
        for path in files {
            let source = source_for(&path);
            present.insert(source.clone());

            let rule_set = match tokio::fs::read(&path).await {
                Ok(raw) => RuleSet::decode(&source, &raw),
                Err(err) => Err(Error::internal_with_source(
                    format!("failed to read {}", path.display()),
                    err,
                )),
            };
            match rule_set {
                Ok(rule_set) => {
                    self.tracker.apply(processor, rule_set).await;
                }
                Err(err) => {
                    tracing::warn!(source = %source, error = %err, "Failed to fetch rule set");
                }
            }
        }

        let vanished: Vec<String> = self
            .tracker
            .sources()
            .filter(|source| !present.contains(*source))
            .map(str::to_string)
            .collect();
        for source in vanished {
            self.tracker.apply(processor, RuleSet::empty(source)).await;
        }
    }
}
