//! Request dispatch, completion and cancellation.
//!
//! [`Dispatcher::dispatch`] validates a descriptor, registers it and runs it
//! as a tokio task. Everything the caller learns afterwards arrives through
//! the [`NetworkEvent`] signal: optional progress and body events, then
//! exactly one terminal event.
//!
//! # Example
//!
//! ```no_run
//! use tether_net::http::{Dispatcher, NetworkEvent, RequestDescriptor, RequestId};
//!
//! # fn main() -> tether_net::Result<()> {
//! let dispatcher = Dispatcher::builder().build()?;
//! dispatcher.events().connect(|event| {
//!     if let NetworkEvent::RequestComplete { id } = event {
//!         println!("request {id} done");
//!     }
//! });
//!
//! let id = RequestId::new(7).expect("non-zero");
//! dispatcher.dispatch(RequestDescriptor::new(id, "GET", "https://example.test/"));
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde_json::Value;
use tether_core::Signal;
use tether_core::logging::targets;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use super::body::{BodyResolver, Payload};
use super::client::{ClientConfigurator, EffectiveConfig, HttpClient};
use super::events::NetworkEvent;
use super::headers::{CONTENT_LENGTH, CONTENT_TYPE, HeaderSet};
use super::progress::{ProgressCallback, ProgressStream, TransferProgress};
use super::registry::RequestRegistry;
use super::request::{RequestDescriptor, RequestId, ResponseType};
use super::response::{ProgressiveDecoder, TEXT_CHUNK_SIZE, encode_body, translate_headers};
use super::transport::{CallTag, Transport};
use crate::error::{NetworkError, Result};
use crate::files::{FileResolver, LocalFileResolver};

/// Builder for a [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    client: Option<HttpClient>,
    files: Option<Arc<dyn FileResolver>>,
    runtime: Option<Handle>,
}

impl DispatcherBuilder {
    /// Create a builder with default collaborators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured transport client.
    pub fn client(mut self, client: HttpClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Resolve file references through `files`.
    pub fn file_resolver(mut self, files: Arc<dyn FileResolver>) -> Self {
        self.files = Some(files);
        self
    }

    /// Spawn request tasks on `runtime`.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build the dispatcher.
    pub fn build(self) -> Result<Dispatcher> {
        let client = match self.client {
            Some(client) => client,
            None => HttpClient::with_defaults()?,
        };
        let files = self
            .files
            .unwrap_or_else(|| Arc::new(LocalFileResolver::new()));
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => tether_core::runtime::handle()?,
        };

        Ok(Dispatcher {
            inner: Arc::new(DispatcherInner {
                bodies: BodyResolver::new(files, client.config().user_agent.clone()),
                configurator: ClientConfigurator::new(client.config()),
                client,
                transport: Transport::new(),
                registry: RequestRegistry::new(),
                events: Arc::new(Signal::new()),
                runtime,
            }),
        })
    }
}

struct DispatcherInner {
    client: HttpClient,
    bodies: BodyResolver,
    configurator: ClientConfigurator,
    transport: Transport,
    registry: RequestRegistry,
    events: Arc<Signal<NetworkEvent>>,
    runtime: Handle,
}

/// Everything the request task needs after submission.
struct Submission {
    id: RequestId,
    request: reqwest::Request,
    response_type: ResponseType,
    incremental_updates: bool,
    effective: EffectiveConfig,
}

enum Outcome {
    Finished(Result<()>),
    Cancelled,
}

/// Orchestrates request building, registration, execution and cancellation.
///
/// Cheaply cloneable; clones share the registry, the transport and the event
/// signal.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    /// Create a builder.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// The event signal.
    pub fn events(&self) -> &Arc<Signal<NetworkEvent>> {
        &self.inner.events
    }

    /// The active request registry.
    pub fn registry(&self) -> &RequestRegistry {
        &self.inner.registry
    }

    /// The transport client.
    pub fn client(&self) -> &HttpClient {
        &self.inner.client
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.registry.is_shutting_down()
    }

    /// Remove every stored cookie. Returns `true` if any were removed.
    pub fn clear_cookies(&self) -> bool {
        self.inner.client.cookies().clear()
    }

    /// Parse a descriptor from JSON and dispatch it.
    ///
    /// A descriptor that cannot be read is reported as a `RequestError` when
    /// it carries a usable `requestId`, and only logged otherwise.
    pub fn dispatch_json(&self, value: Value) {
        let raw_id = value
            .get("requestId")
            .and_then(Value::as_i64)
            .and_then(RequestId::new);
        match RequestDescriptor::from_json(value) {
            Ok(descriptor) => self.dispatch(descriptor),
            Err(err) => match raw_id {
                Some(id) => self.fail(id, err),
                None => {
                    tracing::warn!(target: targets::DISPATCH, error = %err, "dropping descriptor without request id");
                }
            },
        }
    }

    /// Build, register and start one request.
    ///
    /// Never fails directly: every outcome, including validation failures,
    /// is reported through [`events`](Self::events).
    pub fn dispatch(&self, descriptor: RequestDescriptor) {
        let id = descriptor.id;
        if self.is_shutting_down() {
            return self.fail(id, NetworkError::ShuttingDown);
        }

        let submission = match self.prepare(descriptor) {
            Ok(submission) => submission,
            Err(err) => return self.fail(id, err),
        };

        let inner = &self.inner;
        let Some((tag, cancel_rx)) = inner.transport.tag(id) else {
            return self.fail(id, NetworkError::AlreadyInFlight(id));
        };
        if !inner.registry.add(id) {
            inner.transport.untag(tag);
            return self.fail(id, NetworkError::AlreadyInFlight(id));
        }
        // A shutdown that began after the first check may have missed this id.
        if inner.registry.is_shutting_down() {
            inner.registry.remove(id);
            inner.transport.untag(tag);
            return self.fail(id, NetworkError::ShuttingDown);
        }

        tracing::debug!(
            target: targets::DISPATCH,
            %id,
            method = %submission.request.method(),
            url = %submission.request.url(),
            "submitting request"
        );

        let task_inner = inner.clone();
        inner.runtime.spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel_rx => Outcome::Cancelled,
                result = execute(&task_inner, submission) => Outcome::Finished(result),
            };
            task_inner.complete(tag, outcome);
        });
    }

    /// Cancel one request. Aborting an unknown or finished id does nothing.
    ///
    /// The id is released before this returns, so it may be dispatched
    /// again right away.
    pub fn abort(&self, id: RequestId) {
        let inner = &self.inner;
        let was_active = inner.registry.cancel(id, |id| inner.detach(id));
        tracing::debug!(target: targets::DISPATCH, %id, was_active, "abort requested");
    }

    /// Stop accepting requests and cancel every active one.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        inner.registry.begin_shutdown();
        let cancelled = inner.registry.cancel_all(|id| inner.detach(id));
        tracing::debug!(target: targets::DISPATCH, count = cancelled.len(), "shutdown");
    }

    fn prepare(&self, descriptor: RequestDescriptor) -> Result<Submission> {
        let inner = &self.inner;
        let method = reqwest::Method::from_bytes(descriptor.method.as_bytes())
            .map_err(|_| NetworkError::InvalidMethod(descriptor.method.clone()))?;
        let url = url::Url::parse(&descriptor.url)?;

        let config = inner.client.config();
        let mut headers = HeaderSet::build(
            descriptor.headers.as_deref(),
            config.user_agent.as_deref(),
            descriptor.body.is_string(),
        )
        .ok_or(NetworkError::InvalidHeaders)?;
        let payload = inner
            .bodies
            .resolve(&descriptor.method, &descriptor.body, &headers)?;

        let length = payload.length();
        let body = match payload {
            Payload::Absent => None,
            Payload::Bytes(data) => Some(reqwest::Body::from(data)),
            Payload::Stream { stream, .. } => Some(reqwest::Body::wrap_stream(stream)),
            Payload::Multipart(multipart) => {
                headers.set(CONTENT_TYPE, multipart.content_type());
                let on_upload = upload_progress(&inner.events, descriptor.id);
                let stream = ProgressStream::new(multipart.into_stream(), length, on_upload);
                Some(reqwest::Body::wrap_stream(stream))
            }
        };

        // The length on the wire is always the computed one.
        headers.remove_all(CONTENT_LENGTH);
        if body.is_some()
            && let Some(length) = length
        {
            headers.set(CONTENT_LENGTH, length.to_string());
        }
        let mut builder = inner.client.request(method, url).headers(headers.to_header_map());
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let mut request = builder.build()?;

        let effective = inner.configurator.configure(
            descriptor.timeout(),
            descriptor.incremental_updates,
            &descriptor.response_type,
            download_progress(&inner.events, descriptor.id),
        );
        inner.client.intercept(&mut request);

        Ok(Submission {
            id: descriptor.id,
            request,
            response_type: descriptor.response_type,
            incremental_updates: descriptor.incremental_updates,
            effective,
        })
    }

    fn fail(&self, id: RequestId, err: NetworkError) {
        tracing::warn!(target: targets::DISPATCH, %id, error = %err, "request rejected");
        self.inner.events.emit(NetworkEvent::RequestError {
            id,
            message: err.to_string(),
            is_timeout: err.is_timeout(),
        });
    }
}

impl DispatcherInner {
    /// Release the call for `id` now and cancel it off the calling thread;
    /// a live call may block while it unwinds.
    fn detach(&self, id: RequestId) {
        if let Some(sender) = self.transport.detach(id) {
            self.runtime.spawn_blocking(move || deliver_cancel(id, sender));
        }
    }

    /// Release the request and emit its terminal event.
    fn complete(&self, tag: CallTag, outcome: Outcome) {
        let id = tag.id;
        // A detached call was already released by abort or shutdown.
        if self.transport.untag(tag) {
            self.registry.remove(id);
        }

        let event = match outcome {
            Outcome::Finished(Ok(())) => {
                tracing::debug!(target: targets::DISPATCH, %id, "request complete");
                NetworkEvent::RequestComplete { id }
            }
            Outcome::Finished(Err(err)) => {
                tracing::error!(target: targets::DISPATCH, %id, error = %err, "request failed");
                NetworkEvent::RequestError {
                    id,
                    message: err.to_string(),
                    is_timeout: err.is_timeout(),
                }
            }
            Outcome::Cancelled => {
                tracing::debug!(target: targets::DISPATCH, %id, "request cancelled");
                NetworkEvent::RequestCancelled { id }
            }
        };
        self.events.emit(event);
    }
}

fn deliver_cancel(id: RequestId, sender: oneshot::Sender<()>) {
    let delivered = sender.send(()).is_ok();
    tracing::trace!(target: targets::DISPATCH, %id, delivered, "cancel delivered");
}

/// Await `future`, failing with [`NetworkError::Timeout`] once `limit` passes.
async fn within<F: Future>(limit: Option<Duration>, future: F) -> Result<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| NetworkError::Timeout),
        None => Ok(future.await),
    }
}

fn upload_progress(events: &Arc<Signal<NetworkEvent>>, id: RequestId) -> ProgressCallback {
    let events = events.clone();
    Arc::new(move |progress: TransferProgress| {
        tracing::trace!(target: targets::HTTP, %id, bytes = progress.bytes_transferred, "upload progress");
        events.emit(NetworkEvent::DataSend {
            id,
            bytes_written: progress.bytes_transferred,
            total_bytes: progress.total_bytes,
        });
    })
}

fn download_progress(events: &Arc<Signal<NetworkEvent>>, id: RequestId) -> ProgressCallback {
    let events = events.clone();
    Arc::new(move |progress: TransferProgress| {
        tracing::trace!(target: targets::HTTP, %id, bytes = progress.bytes_transferred, "download progress");
        events.emit(NetworkEvent::DataReceivedProgress {
            id,
            bytes_written: progress.bytes_transferred,
            total_bytes: progress.total_bytes,
        });
    })
}

/// Run one submitted request up to, but not including, its terminal event.
async fn execute(inner: &DispatcherInner, submission: Submission) -> Result<()> {
    let Submission {
        id,
        request,
        response_type,
        incremental_updates,
        effective,
    } = submission;

    // The read timeout bounds each wait for data, not the whole exchange.
    let limit = effective.read_timeout();
    let response = within(limit, inner.client.execute(request)).await??;
    let total = response.content_length();
    inner.events.emit(NetworkEvent::ResponseReceived {
        id,
        status: response.status().as_u16(),
        headers: translate_headers(response.headers()),
        url: response.url().to_string(),
    });

    if incremental_updates && response_type.is_text() {
        let mut decoder = ProgressiveDecoder::new();
        let mut bytes_read = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = within(limit, stream.next()).await? {
            let chunk = chunk?;
            for piece in chunk.chunks(TEXT_CHUNK_SIZE) {
                bytes_read += piece.len() as u64;
                let data = decoder.decode(piece);
                if !data.is_empty() {
                    inner.events.emit(NetworkEvent::IncrementalDataReceived {
                        id,
                        data,
                        bytes_read,
                        total_bytes: total,
                    });
                }
            }
        }
        let tail = decoder.finish();
        if !tail.is_empty() {
            inner.events.emit(NetworkEvent::IncrementalDataReceived {
                id,
                data: tail,
                bytes_read,
                total_bytes: total,
            });
        }
        return Ok(());
    }

    let mut stream: BoxStream<'static, reqwest::Result<Bytes>> = match effective.download_progress {
        Some(on_progress) => ProgressStream::new(response.bytes_stream(), total, on_progress).boxed(),
        None => response.bytes_stream().boxed(),
    };
    let mut body = BytesMut::with_capacity(total.unwrap_or(0).min(1 << 20) as usize);
    while let Some(chunk) = within(limit, stream.next()).await? {
        body.extend_from_slice(&chunk?);
    }
    let body = body.freeze();
    inner.events.emit(NetworkEvent::DataReceived {
        id,
        data: encode_body(&body, &response_type),
    });
    Ok(())
}
