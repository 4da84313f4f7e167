//! Shared tokio runtime for request tasks.
//!
//! Hosts embedding the engine usually already run inside tokio and hand their
//! own [`Handle`] to the dispatcher. When no runtime is available, a global
//! multi-threaded runtime is created lazily on first use.
//!
//! ```no_run
//! use tether_core::runtime;
//!
//! // Inside or outside an async context:
//! let handle = runtime::handle().expect("runtime");
//! handle.spawn(async { /* ... */ });
//! ```

use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime};

use crate::error::RuntimeError;
use crate::logging::targets;

static GLOBAL_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Configuration for the global runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of worker threads. Defaults to tokio's choice (one per core).
    pub worker_threads: Option<usize>,
    /// Name prefix for runtime threads.
    pub thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: "tether-net".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Set the number of worker threads.
    pub fn with_worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = Some(count);
        self
    }

    /// Set the thread name prefix.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    fn build(&self) -> Result<Runtime, RuntimeError> {
        let mut builder = Builder::new_multi_thread();
        builder.thread_name(&self.thread_name).enable_all();
        if let Some(workers) = self.worker_threads {
            builder.worker_threads(workers);
        }
        Ok(builder.build()?)
    }
}

/// Initialize the global runtime with a custom configuration.
///
/// Returns [`RuntimeError::AlreadyInitialized`] if the global runtime exists.
pub fn init(config: RuntimeConfig) -> Result<&'static Runtime, RuntimeError> {
    let runtime = config.build()?;
    GLOBAL_RUNTIME
        .set(runtime)
        .map_err(|_| RuntimeError::AlreadyInitialized)?;
    GLOBAL_RUNTIME.get().ok_or(RuntimeError::AlreadyInitialized)
}

/// Get the global runtime, creating it with default settings if needed.
///
/// Must not be called for the first time from inside an async context.
pub fn global() -> Result<&'static Runtime, RuntimeError> {
    if let Some(runtime) = GLOBAL_RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = RuntimeConfig::default().build()?;
    tracing::debug!(target: targets::RUNTIME, "created global async runtime");
    // A concurrent initializer may have won the race; keep whichever landed.
    let _ = GLOBAL_RUNTIME.set(runtime);
    GLOBAL_RUNTIME.get().ok_or(RuntimeError::AlreadyInitialized)
}

/// Get a handle to the ambient tokio runtime, or to the global one.
pub fn handle() -> Result<Handle, RuntimeError> {
    match Handle::try_current() {
        Ok(handle) => Ok(handle),
        Err(_) => Ok(global()?.handle().clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_prefers_ambient_runtime() {
        let handle = handle().expect("ambient runtime");
        let value = handle.spawn(async { 21 * 2 }).await.expect("task");
        assert_eq!(value, 42);
    }

    #[test]
    fn test_global_runtime_runs_tasks() {
        let runtime = global().expect("global runtime");
        let value = runtime.block_on(async { "ok" });
        assert_eq!(value, "ok");
        assert!(init(RuntimeConfig::default()).is_err());
    }
}
