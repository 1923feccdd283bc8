use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver},
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

/// Watches a document, or a directory of documents, and reports each changed
/// path once it has been quiet for the debounce window.
pub struct DocumentWatcher {
    target: PathBuf,
    single_file: bool,
    extensions: Vec<String>,
    debounce: Duration,
    watcher: Option<RecommendedWatcher>,
    changes_rx: Option<Receiver<notify::Result<notify::Event>>>,
    pending: HashMap<PathBuf, Instant>,
}

impl DocumentWatcher {
    pub fn new(target: impl AsRef<Path>, extensions: &[String], debounce: Duration) -> Self {
        let target = target.as_ref().to_path_buf();
        Self {
            single_file: !target.is_dir(),
            target,
            extensions: extensions.to_vec(),
            debounce,
            watcher: None,
            changes_rx: None,
            pending: HashMap::new(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn enable(&mut self) -> Result<()> {
        if self.watcher.is_some() {
            return Ok(());
        }
        if !self.target.exists() {
            return Err(anyhow!("Watch target {} does not exist", self.target.display()));
        }

        // Editors often save by rename, which drops a watch placed on the
        // file itself, so single files are watched through their parent.
        let (watch_root, mode) = if self.single_file {
            let parent = self
                .target
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            (parent.to_path_buf(), RecursiveMode::NonRecursive)
        } else {
            (self.target.clone(), RecursiveMode::Recursive)
        };

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher
            .watch(&watch_root, mode)
            .with_context(|| format!("Failed to watch {}", watch_root.display()))?;

        debug!(
            path = %self.target.display(),
            root = %watch_root.display(),
            "Watching for changes"
        );
        self.changes_rx = Some(rx);
        self.watcher = Some(watcher);
        Ok(())
    }

    pub fn disable(&mut self) {
        self.watcher = None;
        self.changes_rx = None;
        self.pending.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn poll(&mut self) -> Vec<PathBuf> {
        self.poll_at(Instant::now())
    }

    fn poll_at(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut events = Vec::new();
        if let Some(rx) = self.changes_rx.as_ref() {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }

        for event in events {
            match event {
                Ok(evt) => {
                    if matches!(evt.kind, EventKind::Access(_)) {
                        continue;
                    }
                    for path in evt.paths {
                        if self.is_relevant(&path) {
                            self.pending.insert(path, now);
                        }
                    }
                }
                Err(err) => warn!(error = %err, "Document watcher error"),
            }
        }

        let mut ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, seen)| now.saturating_duration_since(**seen) >= self.debounce)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            self.pending.remove(path);
        }
        ready.sort();
        ready
    }

    pub fn is_relevant(&self, path: &Path) -> bool {
        if self.single_file {
            return path.file_name().is_some() && path.file_name() == self.target.file_name();
        }
        path.extension()
            .map(|ext| {
                self.extensions
                    .iter()
                    .any(|wanted| ext.eq_ignore_ascii_case(wanted.as_str()))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};
    use notify::Event;
    use std::sync::mpsc::Sender;

    fn exts() -> Vec<String> {
        vec!["json".to_string(), "jsonc".to_string()]
    }

    fn attach_channel(watcher: &mut DocumentWatcher) -> Sender<notify::Result<Event>> {
        let (tx, rx) = mpsc::channel();
        watcher.changes_rx = Some(rx);
        tx
    }

    #[test]
    fn directory_target_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = DocumentWatcher::new(dir.path(), &exts(), Duration::ZERO);
        assert!(watcher.is_relevant(Path::new("skins/dark/theme.JSONC")));
        assert!(watcher.is_relevant(Path::new("settings.json")));
        assert!(!watcher.is_relevant(Path::new("theme.toml")));
        assert!(!watcher.is_relevant(Path::new("README")));
    }

    #[test]
    fn file_target_matches_only_that_file() {
        let watcher = DocumentWatcher::new("conf/player.cfg", &exts(), Duration::ZERO);
        assert!(watcher.is_relevant(Path::new("/abs/conf/player.cfg")));
        assert!(!watcher.is_relevant(Path::new("/abs/conf/other.json")));
    }

    #[test]
    fn enable_fails_for_missing_target() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = DocumentWatcher::new(dir.path().join("gone.json"), &exts(), Duration::ZERO);
        assert!(watcher.enable().is_err());
        assert!(!watcher.is_enabled());
    }

    #[test]
    fn poll_debounces_bursts() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = DocumentWatcher::new(dir.path(), &exts(), Duration::from_millis(100));
        let tx = attach_channel(&mut watcher);
        let path = dir.path().join("theme.json");
        let start = Instant::now();

        tx.send(Ok(Event::new(EventKind::Create(CreateKind::File)).add_path(path.clone())))
            .unwrap();
        assert!(watcher.poll_at(start).is_empty());

        tx.send(Ok(Event::new(EventKind::Modify(ModifyKind::Any)).add_path(path.clone())))
            .unwrap();
        assert!(watcher.poll_at(start + Duration::from_millis(60)).is_empty());

        assert_eq!(watcher.poll_at(start + Duration::from_millis(200)), vec![path]);
        assert!(watcher.poll_at(start + Duration::from_millis(400)).is_empty());
    }

    #[test]
    fn poll_ignores_access_and_irrelevant_events() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = DocumentWatcher::new(dir.path(), &exts(), Duration::ZERO);
        let tx = attach_channel(&mut watcher);

        tx.send(Ok(Event::new(EventKind::Access(AccessKind::Any))
            .add_path(dir.path().join("a.json"))))
            .unwrap();
        tx.send(Ok(Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(dir.path().join("notes.txt"))))
            .unwrap();
        tx.send(Err(notify::Error::generic("boom"))).unwrap();

        assert!(watcher.poll().is_empty());
    }

    #[test]
    fn disable_drops_pending_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = DocumentWatcher::new(dir.path(), &exts(), Duration::from_secs(60));
        let tx = attach_channel(&mut watcher);
        tx.send(Ok(Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(dir.path().join("a.json"))))
            .unwrap();
        assert!(watcher.poll().is_empty());
        watcher.disable();
        assert!(watcher.pending.is_empty());
        assert!(watcher.poll().is_empty());
    }
}
