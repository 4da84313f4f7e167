//! The request-lifecycle engine.
//!
//! A [`RequestDescriptor`] flows through the [`HeaderSet`] builder and the
//! [`BodyResolver`] (with the [`MultipartAssembler`] for multipart bodies),
//! gets a per-request configuration from the [`ClientConfigurator`], is
//! recorded in the [`RequestRegistry`] and runs as a task owned by the
//! [`Dispatcher`]. Progress and completion arrive as [`NetworkEvent`]s.
//!
//! # Example
//!
//! ```no_run
//! use tether_net::http::{BodyVariant, Dispatcher, NetworkEvent, RequestDescriptor, RequestId};
//!
//! # fn main() -> tether_net::Result<()> {
//! let dispatcher = Dispatcher::builder().build()?;
//! dispatcher.events().connect(|event| match event {
//!     NetworkEvent::DataReceived { id, data } => println!("{id}: {data}"),
//!     NetworkEvent::RequestError { id, message, .. } => eprintln!("{id} failed: {message}"),
//!     _ => {}
//! });
//!
//! let id = RequestId::new(1).expect("non-zero");
//! dispatcher.dispatch(
//!     RequestDescriptor::new(id, "POST", "https://example.test/api")
//!         .header("content-type", "application/json")
//!         .body(BodyVariant::string(r#"{"a":1}"#)),
//! );
//! # Ok(())
//! # }
//! ```

mod body;
mod client;
mod dispatcher;
mod events;
mod headers;
mod multipart;
mod progress;
mod registry;
mod request;
mod response;
mod transport;

pub use body::{BodyResolver, Payload, gzip, requires_body};
pub use client::{
    ClientConfigurator, EffectiveConfig, HttpClient, HttpClientBuilder, RequestInterceptor,
    TransportConfig,
};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use events::NetworkEvent;
pub use headers::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HeaderSet, USER_AGENT};
pub use multipart::{DEFAULT_MULTIPART_TYPE, MultipartAssembler, MultipartBody};
pub use progress::{
    PROGRESS_INTERVAL, ProgressCallback, ProgressStream, ProgressThrottle, TransferProgress,
    should_emit,
};
pub use registry::RequestRegistry;
pub use request::{
    BodyVariant, Part, PartContent, RawHeader, RequestDescriptor, RequestId, ResponseType,
};
pub use response::{ProgressiveDecoder, TEXT_CHUNK_SIZE, encode_body, translate_headers};
pub use transport::{CallTag, Transport};
