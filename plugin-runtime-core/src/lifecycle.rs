//! Module lifecycle state and hooks

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::error::PluginResult;

/// Lifecycle state tracked by the registry for each module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// Registered, not yet initialized
    Registered,
    /// Initialized and eligible for mounting
    Initialized,
    /// Disabled; initialization was not attempted
    Disabled,
    /// Not initialized because a dependency is not initialized
    Skipped(String),
    /// Initialization failed
    Failed(String),
}

impl ModuleState {
    pub fn is_initialized(&self) -> bool {
        matches!(self, Self::Initialized)
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered => write!(f, "registered"),
            Self::Initialized => write!(f, "initialized"),
            Self::Disabled => write!(f, "disabled"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Async lifecycle callback
pub type Hook = Arc<dyn Fn() -> BoxFuture<'static, PluginResult<()>> + Send + Sync>;

/// Optional callbacks run around initialization, route setup and cleanup
///
/// ```text
/// initialize: before_initialize -> before_route_setup -> configure_routes
///             -> after_route_setup -> after_initialize
/// cleanup:    before_cleanup -> perform_cleanup -> after_cleanup
/// ```
#[derive(Clone, Default)]
pub struct ModuleHooks {
    before_initialize: Option<Hook>,
    after_initialize: Option<Hook>,
    before_route_setup: Option<Hook>,
    after_route_setup: Option<Hook>,
    before_cleanup: Option<Hook>,
    after_cleanup: Option<Hook>,
}

fn hook<F, Fut>(f: F) -> Option<Hook>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PluginResult<()>> + Send + 'static,
{
    let hook: Hook = Arc::new(move || f().boxed());
    Some(hook)
}

impl ModuleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before_initialize<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PluginResult<()>> + Send + 'static,
    {
        self.before_initialize = hook(f);
        self
    }

    pub fn after_initialize<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PluginResult<()>> + Send + 'static,
    {
        self.after_initialize = hook(f);
        self
    }

    pub fn before_route_setup<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PluginResult<()>> + Send + 'static,
    {
        self.before_route_setup = hook(f);
        self
    }

    pub fn after_route_setup<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PluginResult<()>> + Send + 'static,
    {
        self.after_route_setup = hook(f);
        self
    }

    pub fn before_cleanup<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PluginResult<()>> + Send + 'static,
    {
        self.before_cleanup = hook(f);
        self
    }

    pub fn after_cleanup<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PluginResult<()>> + Send + 'static,
    {
        self.after_cleanup = hook(f);
        self
    }

    async fn run(hook: Option<&Hook>) -> PluginResult<()> {
        match hook {
            Some(hook) => hook().await,
            None => Ok(()),
        }
    }

    pub(crate) async fn run_before_initialize(&self) -> PluginResult<()> {
        Self::run(self.before_initialize.as_ref()).await
    }

    pub(crate) async fn run_after_initialize(&self) -> PluginResult<()> {
        Self::run(self.after_initialize.as_ref()).await
    }

    pub(crate) async fn run_before_route_setup(&self) -> PluginResult<()> {
        Self::run(self.before_route_setup.as_ref()).await
    }

    pub(crate) async fn run_after_route_setup(&self) -> PluginResult<()> {
        Self::run(self.after_route_setup.as_ref()).await
    }

    pub(crate) async fn run_before_cleanup(&self) -> PluginResult<()> {
        Self::run(self.before_cleanup.as_ref()).await
    }

    pub(crate) async fn run_after_cleanup(&self) -> PluginResult<()> {
        Self::run(self.after_cleanup.as_ref()).await
    }
}

impl fmt::Debug for ModuleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleHooks")
            .field("before_initialize", &self.before_initialize.is_some())
            .field("after_initialize", &self.after_initialize.is_some())
            .field("before_route_setup", &self.before_route_setup.is_some())
            .field("after_route_setup", &self.after_route_setup.is_some())
            .field("before_cleanup", &self.before_cleanup.is_some())
            .field("after_cleanup", &self.after_cleanup.is_some())
            .finish()
    }
}
