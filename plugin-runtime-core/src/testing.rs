//! Module doubles shared by the crate's tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;

use crate::api::ApiModule;
use crate::error::{PluginResult, PluginRuntimeError};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Failure {
    None,
    Error,
    Panic,
}

/// Module answering `GET /` with its own name
pub struct TestModule {
    name: String,
    version: String,
    dependencies: Vec<String>,
    failure: Failure,
    initializations: AtomicUsize,
    cleanups: AtomicUsize,
    cleanup_log: Option<Arc<Mutex<Vec<String>>>>,
}

impl TestModule {
    fn build(name: &str, failure: Failure) -> Self {
        Self {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            dependencies: Vec::new(),
            failure,
            initializations: AtomicUsize::new(0),
            cleanups: AtomicUsize::new(0),
            cleanup_log: None,
        }
    }

    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self::build(name, Failure::None))
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self::build(name, Failure::Error))
    }

    pub fn panicking(name: &str) -> Arc<Self> {
        Arc::new(Self::build(name, Failure::Panic))
    }

    pub fn with_version(self: Arc<Self>, version: &str) -> Arc<Self> {
        self.rebuild(|m| m.version = version.to_string())
    }

    pub fn with_dependencies<const N: usize>(self: Arc<Self>, deps: [&str; N]) -> Arc<Self> {
        self.rebuild(|m| m.dependencies = deps.iter().map(ToString::to_string).collect())
    }

    pub fn with_cleanup_log(self: Arc<Self>, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        self.rebuild(|m| m.cleanup_log = Some(log))
    }

    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }

    fn rebuild(self: Arc<Self>, f: impl FnOnce(&mut Self)) -> Arc<Self> {
        let mut module = Self::build(&self.name, self.failure);
        module.version = self.version.clone();
        module.dependencies = self.dependencies.clone();
        module.cleanup_log = self.cleanup_log.clone();
        f(&mut module);
        Arc::new(module)
    }
}

#[async_trait]
impl ApiModule for TestModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn router(&self) -> Option<Router> {
        let name = self.name.clone();
        Some(Router::new().route("/", get(move || async move { name })))
    }

    async fn initialize(&self) -> PluginResult<()> {
        self.initializations.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Failure::None => Ok(()),
            Failure::Error => Err(PluginRuntimeError::lifecycle(&self.name, "database unavailable")),
            Failure::Panic => panic!("module {} exploded", self.name),
        }
    }

    async fn cleanup(&self) -> PluginResult<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.cleanup_log {
            log.lock().push(self.name.clone());
        }
        Ok(())
    }
}
