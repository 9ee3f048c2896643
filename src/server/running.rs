//! A live server process and its output handling.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{oneshot, watch};

use crate::config::ServerDefinition;
use crate::rpc::{Correlator, LineDispatch, RpcError};
use crate::server::{LineKind, OutputStream, ReadinessDetector, ServerState};

/// One running server: process handle, lifecycle state and request channel.
#[derive(Debug)]
pub struct RunningServer {
    instance: u64,
    definition: Arc<ServerDefinition>,
    pid: Option<u32>,
    state: watch::Sender<ServerState>,
    marker_seen: watch::Sender<bool>,
    exited: watch::Sender<bool>,
    detector: ReadinessDetector,
    correlator: Correlator,
    terminate: Mutex<Option<oneshot::Sender<()>>>,
}

impl RunningServer {
    pub(crate) fn new(
        instance: u64,
        definition: Arc<ServerDefinition>,
        pid: Option<u32>,
        correlator: Correlator,
        terminate: oneshot::Sender<()>,
    ) -> Self {
        let detector = ReadinessDetector::with_markers(definition.ready_markers.iter().cloned());
        let (state, _) = watch::channel(ServerState::Starting);
        let (marker_seen, _) = watch::channel(false);
        let (exited, _) = watch::channel(false);
        Self {
            instance,
            definition,
            pid,
            state,
            marker_seen,
            exited,
            detector,
            correlator,
            terminate: Mutex::new(Some(terminate)),
        }
    }

    /// Server name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Number distinguishing this instance from earlier runs under the same name.
    #[must_use]
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Definition the server was started from.
    #[must_use]
    pub fn definition(&self) -> &ServerDefinition {
        &self.definition
    }

    /// Process ID at spawn time.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Whether requests may be sent.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Whether a readiness marker has ever been printed.
    ///
    /// Unlike [`Self::is_ready`] this stays true after the process exits.
    #[must_use]
    pub fn marker_seen(&self) -> bool {
        *self.marker_seen.borrow()
    }

    /// Subscribe to the one-way readiness signal.
    #[must_use]
    pub fn subscribe_marker(&self) -> watch::Receiver<bool> {
        self.marker_seen.subscribe()
    }

    /// Subscribe to lifecycle changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// The request correlator for this server.
    #[must_use]
    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Move to `next` if the state machine allows it.
    pub fn transition(&self, next: ServerState) -> bool {
        self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                tracing::debug!(server = %self.name(), from = ?*current, to = ?next, "State transition");
                *current = next;
                true
            } else {
                false
            }
        })
    }

    /// Send a request; the server must be ready.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::NotReady`] without writing anything when the server
    /// is not ready, otherwise whatever the correlator reports.
    pub async fn call(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, RpcError> {
        if !self.is_ready() {
            return Err(RpcError::NotReady {
                server: self.name().to_string(),
            });
        }
        self.correlator.call(method, params, timeout).await
    }

    /// Mark stopped and ask the exit watcher to terminate the process.
    pub(crate) fn request_terminate(&self) {
        self.transition(ServerState::Stopped);
        let sender = self
            .terminate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }

    /// Record that the process is gone.
    pub(crate) fn mark_exited(&self) {
        self.transition(ServerState::Stopped);
        self.exited.send_replace(true);
    }

    /// Whether the process has been reaped.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }

    /// Wait until the process has been reaped.
    pub async fn wait_exited(&self) {
        let mut exited = self.exited.subscribe();
        // The sender lives as long as `self`, so this only ends on `true`.
        let _ = exited.wait_for(|gone| *gone).await;
    }

    /// Record a readiness marker.
    fn signal_ready(&self) {
        self.marker_seen.send_if_modified(|seen| !std::mem::replace(seen, true));
        if self.transition(ServerState::Ready) {
            tracing::info!(server = %self.name(), "Server is ready");
        }
    }

    /// Check a raw chunk of output for a marker, before it is split into lines.
    pub(crate) fn handle_chunk(&self, text: &str) {
        if self.detector.is_ready_marker(text) {
            self.signal_ready();
        }
    }

    /// Handle one line of output from either stream.
    pub(crate) fn handle_line(&self, stream: OutputStream, line: &str) {
        match self.detector.classify(stream, line) {
            LineKind::Blank => return,
            LineKind::Ready => self.signal_ready(),
            LineKind::Diagnostic => {
                tracing::warn!(server = %self.name(), "{line}");
            }
            LineKind::Output => {}
        }

        if stream == OutputStream::Stdout {
            match self.correlator.dispatch_line(line) {
                LineDispatch::Matched => {}
                LineDispatch::Unmatched => {
                    tracing::debug!(server = %self.name(), "Response without pending request");
                }
                LineDispatch::NotProtocol => {
                    tracing::debug!(server = %self.name(), "{line}");
                }
            }
        }
    }
}

/// Feed the output of `reader` into the server until the stream ends.
///
/// Each chunk is checked for readiness markers as it arrives; complete lines
/// are then decoded lossily and dispatched. When stdout ends, pending
/// requests are failed.
pub(crate) async fn pump_output<R>(server: Arc<RunningServer>, stream: OutputStream, mut reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; 8 * 1024];
    let mut buffer: Vec<u8> = Vec::new();
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let data = &chunk[..n];
                server.handle_chunk(&String::from_utf8_lossy(data));
                buffer.extend_from_slice(data);
                while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    server.handle_line(stream, &decode_line(&line));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::warn!(server = %server.name(), ?stream, error = %e, "Failed to read output");
                break;
            }
        }
    }

    if !buffer.is_empty() {
        server.handle_line(stream, &decode_line(&buffer));
    }
    if stream == OutputStream::Stdout {
        server.correlator().close();
    }
    tracing::debug!(server = %server.name(), ?stream, "Output stream closed");
}

/// Decode one line, replacing invalid UTF-8 and dropping the line terminator.
fn decode_line(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
