//! Logging conventions.
//!
//! All crates in the workspace log through `tracing` with an explicit
//! `target:`. Installing a subscriber is left to the host application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("tether_net=debug")
//!     .init();
//! ```

/// Target names for log filtering.
pub mod targets {
    /// Signal/slot delivery.
    pub const SIGNAL: &str = "tether_core::signal";
    /// Global runtime management.
    pub const RUNTIME: &str = "tether_core::runtime";
    /// Request building, body encoding and transport.
    pub const HTTP: &str = "tether_net::http";
    /// Active request bookkeeping.
    pub const REGISTRY: &str = "tether_net::registry";
    /// Request dispatch and completion.
    pub const DISPATCH: &str = "tether_net::dispatch";
}
