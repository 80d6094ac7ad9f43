use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Semaphore;

use super::BlobStore;
use crate::errors::AppError;

/// In-memory blob store with failure injection for tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Bytes>>,
    failing: Mutex<HashSet<String>>,
    fail_removes: Mutex<bool>,
    upload_gate: Mutex<Option<Arc<Semaphore>>>,
    panic_uploads: Mutex<bool>,
}

impl MemoryBlobStore {
    /// Uploads and moves touching a path containing `needle` fail.
    pub fn fail_paths_containing(&self, needle: &str) {
        self.failing.lock().unwrap().insert(needle.to_string());
    }

    pub fn fail_removes(&self) {
        *self.fail_removes.lock().unwrap() = true;
    }

    /// Uploads park until a permit is added to the returned gate.
    pub fn hold_uploads(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.upload_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn panic_on_upload(&self) {
        *self.panic_uploads.lock().unwrap() = true;
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.objects.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(path)
    }

    fn should_fail(&self, path: &str) -> bool {
        self.failing
            .lock()
            .unwrap()
            .iter()
            .any(|needle| path.contains(needle.as_str()))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, bytes: Bytes, _content_type: &str) -> Result<(), AppError> {
        let gate = self.upload_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| AppError::Storage(e.to_string()))?;
        }
        let crash = *self.panic_uploads.lock().unwrap();
        if crash {
            panic!("upload task crashed on {path}");
        }
        if self.should_fail(path) {
            return Err(AppError::Storage(format!("injected upload failure: {path}")));
        }
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(path) {
            return Err(AppError::Storage(format!("object already exists: {path}")));
        }
        objects.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn move_object(&self, from: &str, to: &str) -> Result<(), AppError> {
        if self.should_fail(from) || self.should_fail(to) {
            return Err(AppError::Storage(format!("injected move failure: {from}")));
        }
        let mut objects = self.objects.lock().unwrap();
        let bytes = objects
            .remove(from)
            .ok_or_else(|| AppError::Storage(format!("no such object: {from}")))?;
        objects.insert(to.to_string(), bytes);
        Ok(())
    }

    async fn remove(&self, paths: &[String]) -> Result<(), AppError> {
        if *self.fail_removes.lock().unwrap() {
            return Err(AppError::Storage("injected remove failure".into()));
        }
        let mut objects = self.objects.lock().unwrap();
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Bytes, AppError> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::Storage(format!("no such object: {path}")))
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://resumes/{path}")
    }

    fn path_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix("memory://resumes/").map(str::to_string)
    }
}
