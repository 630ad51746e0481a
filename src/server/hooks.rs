//! Lifecycle hooks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use log::{error, info};

use crate::server::application::AppHandle;
use crate::server::error::Error;

/// Type alias for the future a hook returns.
pub type HookFuture = Pin<Box<dyn Future<Output = Result<(), Error>> + Send>>;

/// Type alias for a lifecycle hook.
pub type HookFn = Arc<dyn Fn(AppHandle) -> HookFuture + Send + Sync>;

/// Box an async function into a [`HookFn`].
pub fn hook_fn<F, Fut>(hook: F) -> HookFn
where
    F: Fn(AppHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    Arc::new(move |app: AppHandle| -> HookFuture { Box::pin(hook(app)) })
}

/// Ordered startup and shutdown callbacks.
#[derive(Default, Clone)]
pub struct Hooks {
    startup: Vec<HookFn>,
    shutdown: Vec<HookFn>,
}

impl Hooks {
    pub fn on_startup(&mut self, hook: HookFn) {
        self.startup.push(hook);
    }

    pub fn on_shutdown(&mut self, hook: HookFn) {
        self.shutdown.push(hook);
    }

    pub fn startup_len(&self) -> usize {
        self.startup.len()
    }

    pub fn shutdown_len(&self) -> usize {
        self.shutdown.len()
    }

    /// Run startup hooks one after another, stopping at the first failure.
    pub async fn run_startup(&self, app: &AppHandle) -> Result<(), Error> {
        for (index, hook) in self.startup.iter().enumerate() {
            if let Err(e) = hook(app.clone()).await {
                error!("Startup hook #{index} failed: {e}");
                return Err(Error::Hook {
                    phase: "startup",
                    index,
                    source: Box::new(e),
                });
            }
        }
        info!("Ran {} startup hook(s)", self.startup.len());
        Ok(())
    }

    /// Run every shutdown hook in order, even when earlier ones fail.
    ///
    /// Returns the failures, in hook order.
    pub async fn run_shutdown(&self, app: &AppHandle) -> Vec<Error> {
        let mut failures = Vec::new();
        for (index, hook) in self.shutdown.iter().enumerate() {
            if let Err(e) = hook(app.clone()).await {
                error!("Shutdown hook #{index} failed: {e}");
                failures.push(Error::Hook {
                    phase: "shutdown",
                    index,
                    source: Box::new(e),
                });
            }
        }
        failures
    }
}
