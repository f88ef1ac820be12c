use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Process-wide set of output paths with an in-flight transcode. The
/// cancellation scan drains it under the same lock that register/deregister
/// take, so a registration races with the scan into exactly one of the two.
#[derive(Clone)]
pub struct TaskRegistry {
    paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        TaskRegistry {
            paths: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Registers an output path for cleanup tracking. The returned guard
    /// deregisters it when dropped, on every exit path of the caller.
    pub fn register(&self, path: &Path) -> RegistryGuard {
        {
            let mut paths = self.paths.lock().unwrap();
            paths.insert(PathBuf::from(path));
        }
        RegistryGuard {
            registry: self.clone(),
            path: PathBuf::from(path),
        }
    }

    /// Removes and returns every registered path. Used once, by the
    /// cancellation cleanup scan.
    pub fn drain(&self) -> Vec<PathBuf> {
        let mut paths = self.paths.lock().unwrap();
        paths.drain().collect()
    }

    pub fn contains(&self, path: &Path) -> bool {
        let paths = self.paths.lock().unwrap();
        paths.contains(path)
    }

    pub fn len(&self) -> usize {
        let paths = self.paths.lock().unwrap();
        paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn deregister(&self, path: &Path) {
        let mut paths = self.paths.lock().unwrap();
        paths.remove(path);
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        TaskRegistry::new()
    }
}

pub struct RegistryGuard {
    registry: TaskRegistry,
    path: PathBuf,
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.deregister(&self.path);
    }
}
