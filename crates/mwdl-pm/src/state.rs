//! Process-wide run state shared by every target task.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::target::Category;

#[derive(Debug)]
pub struct RunState {
    target_dir: PathBuf,
    temp_dir: PathBuf,
    default_ref: String,
    failed: AtomicBool,
}

impl RunState {
    pub fn new(
        target_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
        default_ref: impl Into<String>,
    ) -> Self {
        Self {
            target_dir: target_dir.into(),
            temp_dir: temp_dir.into(),
            default_ref: default_ref.into(),
            failed: AtomicBool::new(false),
        }
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Shared scratch directory for downloads and extraction
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn default_ref(&self) -> &str {
        &self.default_ref
    }

    /// Final location of an installed target
    pub fn install_path(&self, category: Category, name: &str) -> PathBuf {
        self.target_dir.join(category.plural()).join(name)
    }

    /// Record that at least one target failed or degraded
    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::Relaxed);
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_install_path() {
        let state = RunState::new("/srv/wiki", "/tmp/work", "REL1_40");
        assert_eq!(
            state.install_path(Category::Extension, "Cite"),
            PathBuf::from("/srv/wiki/extensions/Cite")
        );
        assert_eq!(
            state.install_path(Category::Skin, "Vector"),
            PathBuf::from("/srv/wiki/skins/Vector")
        );
    }

    #[test]
    fn test_failure_flag_starts_clear() {
        let state = RunState::new("/a", "/b", "master");
        assert!(!state.has_failed());
        state.mark_failed();
        assert!(state.has_failed());
    }

    #[test]
    fn test_failure_flag_set_from_many_threads() {
        let state = Arc::new(RunState::new("/a", "/b", "master"));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        state.mark_failed();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(state.has_failed());
    }
}
