//! Error types for the core crate.

/// Errors raised while setting up the async runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The runtime could not be built.
    #[error("failed to create async runtime: {0}")]
    CreationFailed(#[from] std::io::Error),
    /// The global runtime has already been initialized.
    #[error("global async runtime is already initialized")]
    AlreadyInitialized,
}
