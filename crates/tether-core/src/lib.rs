//! Core systems shared by the tether crates.
//!
//! - **Signal/Slot System**: type-safe fan-out of events to observers
//! - **Runtime**: the tokio runtime request tasks are spawned on
//! - **Logging**: `tracing` target names used across the workspace
//!
//! # Signal/Slot Example
//!
//! ```
//! use tether_core::Signal;
//!
//! let progress = Signal::<(u32, u64)>::new();
//! progress.connect(|(id, bytes)| println!("request {id}: {bytes} bytes"));
//! progress.emit((1, 512));
//! ```

mod error;
pub mod logging;
pub mod runtime;
pub mod signal;

pub use error::RuntimeError;
pub use runtime::RuntimeConfig;
pub use signal::{ConnectionGuard, ConnectionId, Signal};
