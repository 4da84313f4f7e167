//! Request-lifecycle engine for tether.
//!
//! Callers describe requests as plain data ([`http::RequestDescriptor`]) and
//! hand them to a [`http::Dispatcher`], which validates them, runs them on
//! tokio over a shared `reqwest` client, and reports progress and completion
//! through a [`tether_core::Signal`] of [`http::NetworkEvent`]s. Any request
//! can be aborted by id, and [`http::Dispatcher::shutdown`] cancels all of
//! them.
//!
//! - **Headers**: validated all-or-nothing, default user agent applied
//! - **Bodies**: empty, string (optionally gzipped), file, multipart
//! - **Progress**: upload and download byte counts, throttled to 10/s
//! - **Cookies**: an in-memory [`CookieJar`] shared with the transport
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use tether_net::http::Dispatcher;
//!
//! # fn main() -> tether_net::Result<()> {
//! let dispatcher = Dispatcher::builder().build()?;
//! dispatcher.events().connect(|event| println!("{event:?}"));
//!
//! dispatcher.dispatch_json(json!({
//!     "method": "GET",
//!     "url": "https://example.test/status",
//!     "requestId": 1,
//!     "headers": [],
//!     "responseType": "text"
//! }));
//! # Ok(())
//! # }
//! ```

pub mod cookies;
mod error;
pub mod files;
pub mod http;

pub use cookies::CookieJar;
pub use error::{NetworkError, Result};
pub use files::{FileResolver, LocalFileResolver, ResolvedFile};
