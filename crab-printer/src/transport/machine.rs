//! Connection state machine shared by every channel

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::options::TransportOptions;
use super::state::{TransportEvent, TransportState, TransportStatus};
use super::{Channel, ChannelLink, LinkHandler};
use crate::error::{TransportError, TransportErrorKind, TransportResult};

const EVENT_CAPACITY: usize = 64;

/// A printer connection over one channel
///
/// Owned by a single caller. Internally shared only with its own reconnect
/// task and the channel's reader task.
///
/// # Example
///
/// ```ignore
/// let transport = Transport::new(NetworkChannel::new(descriptor)?, TransportOptions::default());
/// let mut events = transport.subscribe();
/// transport.connect().await?;
/// transport.send(&builder.build()).await?;
/// transport.destroy().await;
/// ```
pub struct Transport<C: Channel> {
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    options: TransportOptions,
    label: String,
    channel: tokio::sync::Mutex<C>,
    shared: Mutex<Shared>,
    events: broadcast::Sender<TransportEvent>,
}

struct Shared {
    state: TransportState,
    retries: u32,
    connected_at: Option<Instant>,
    /// Bumped on every open and every teardown; stale link reports are dropped
    generation: u64,
    /// Cancels whatever connect sequence currently runs
    session: CancellationToken,
    reconnect: Option<ReconnectTask>,
}

struct ReconnectTask {
    deadline: Instant,
    handle: JoinHandle<()>,
}

impl<C: Channel> Transport<C> {
    pub fn new(channel: C, options: TransportOptions) -> Self {
        let label = channel.describe();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                options,
                label,
                channel: tokio::sync::Mutex::new(channel),
                shared: Mutex::new(Shared {
                    state: TransportState::Disconnected,
                    retries: 0,
                    connected_at: None,
                    generation: 0,
                    session: CancellationToken::new(),
                    reconnect: None,
                }),
                events,
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn options(&self) -> &TransportOptions {
        &self.inner.options
    }

    pub fn state(&self) -> TransportState {
        self.inner.shared.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn status(&self) -> TransportStatus {
        let shared = self.inner.shared.lock();
        let now = Instant::now();
        TransportStatus {
            state: shared.state,
            retries: shared.retries,
            connected_for: shared
                .connected_at
                .map(|at| now.saturating_duration_since(at)),
            reconnect_remaining: shared
                .reconnect
                .as_ref()
                .map(|task| task.deadline.saturating_duration_since(now)),
        }
    }

    /// Receive state changes, errors and incoming data
    ///
    /// Slow receivers lose the oldest events (`RecvError::Lagged`).
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.inner.events.subscribe()
    }

    /// Connect, retrying transient failures with exponential backoff
    ///
    /// No-op when already connected. Stops any running auto-reconnect first.
    #[instrument(skip(self), fields(channel = %self.inner.label))]
    pub async fn connect(&self) -> TransportResult<()> {
        let token = {
            let mut shared = self.inner.shared.lock();
            if shared.state.is_connected() {
                debug!("Already connected");
                return Ok(());
            }
            shared.session.cancel();
            if let Some(task) = shared.reconnect.take() {
                task.handle.abort();
            }
            shared.retries = 0;
            shared.session = CancellationToken::new();
            shared.session.clone()
        };
        self.inner.attempt_connection(&token).await
    }

    /// Close the connection and stop every pending attempt
    ///
    /// Idempotent. Nothing started before this call can reconnect afterwards.
    #[instrument(skip(self), fields(channel = %self.inner.label))]
    pub async fn disconnect(&self) -> TransportResult<()> {
        self.inner.shutdown(false, None).await;
        Ok(())
    }

    /// Write bytes to the printer
    ///
    /// Fails fast with `NotConnected` outside the `Connected` state. A failed
    /// write is reported as `SendFailure` and treated as a lost connection.
    #[instrument(skip(self, data), fields(channel = %self.inner.label, bytes = data.len()))]
    pub async fn send(&self, data: &[u8]) -> TransportResult<()> {
        let state = self.state();
        if !state.is_connected() {
            return Err(TransportError::not_connected(format!(
                "{} is {}",
                self.inner.label, state
            )));
        }

        let result = {
            let mut channel = self.inner.channel.lock().await;
            channel.write(data).await
        };

        match result {
            Ok(()) => {
                debug!("Data sent");
                Ok(())
            }
            Err(e) => {
                let err = TransportError::send_failure(format!(
                    "write to {} failed: {}",
                    self.inner.label, e.message
                ))
                .with_cause(e);
                error!(error = %err, "Send failed");
                self.inner.emit(TransportEvent::Error(err.clone()));
                self.inner.connection_lost(None);
                Err(err)
            }
        }
    }

    /// Tear the transport down and release the channel
    pub async fn destroy(self) {
        self.inner.shutdown(true, None).await;
        debug!(channel = %self.inner.label, "Transport destroyed");
    }

    /// The device was unplugged (USB hot-plug)
    ///
    /// Releases the handle and settles in `Disconnected`. Does not
    /// auto-reconnect; call `connect()` once the device is back.
    #[instrument(skip(self), fields(channel = %self.inner.label))]
    pub async fn device_disconnected(&self) {
        warn!("Device removed");
        let reason = TransportError::connection_lost(format!("{}: device removed", self.inner.label));
        self.inner.shutdown(true, Some(reason)).await;
    }
}

impl<C: Channel> Drop for Transport<C> {
    fn drop(&mut self) {
        let mut shared = self.inner.shared.lock();
        shared.session.cancel();
        if let Some(task) = shared.reconnect.take() {
            task.handle.abort();
        }
    }
}

impl<C: Channel> Inner<C> {
    fn emit(&self, event: TransportEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn set_state(&self, shared: &mut Shared, to: TransportState) {
        let from = shared.state;
        if from == to {
            return;
        }
        shared.state = to;
        debug!(channel = %self.label, %from, %to, "State changed");
        self.emit(TransportEvent::StateChanged { from, to });
    }

    /// Apply a state change unless the session has been cancelled
    fn transition(&self, token: &CancellationToken, to: TransportState) -> bool {
        let mut shared = self.shared.lock();
        if token.is_cancelled() {
            return false;
        }
        self.set_state(&mut shared, to);
        true
    }

    /// Enter `Error` and publish the failure
    fn fail(&self, token: &CancellationToken, err: TransportError) {
        let mut shared = self.shared.lock();
        if token.is_cancelled() {
            return;
        }
        shared.reconnect = None;
        shared.connected_at = None;
        self.set_state(&mut shared, TransportState::Error);
        self.emit(TransportEvent::Error(err));
    }

    fn commit_connected(&self, token: &CancellationToken) -> bool {
        let mut shared = self.shared.lock();
        if token.is_cancelled() {
            return false;
        }
        shared.retries = 0;
        shared.connected_at = Some(Instant::now());
        shared.reconnect = None;
        self.set_state(&mut shared, TransportState::Connected);
        self.emit(TransportEvent::Connected);
        true
    }

    fn cancelled(&self) -> TransportError {
        TransportError::cancelled(format!("{}: connect cancelled", self.label))
    }

    async fn attempt_connection(self: &Arc<Self>, token: &CancellationToken) -> TransportResult<()> {
        loop {
            if !self.transition(token, TransportState::Connecting) {
                return Err(self.cancelled());
            }

            let err = match self
                .open_channel(token, self.options.connection_timeout())
                .await
            {
                Ok(()) => {
                    info!(channel = %self.label, "Printer connected");
                    return Ok(());
                }
                Err(err) => err,
            };

            if err.kind == TransportErrorKind::Cancelled {
                return Err(err);
            }
            if !err.recoverable {
                error!(channel = %self.label, error = %err, "Connect failed, not retrying");
                self.fail(token, err.clone());
                return Err(err);
            }

            let retries = {
                let mut shared = self.shared.lock();
                shared.retries += 1;
                shared.retries
            };

            if retries > self.options.max_retries {
                let kind = match err.kind {
                    TransportErrorKind::ConnectionTimeout => TransportErrorKind::ConnectionTimeout,
                    _ => TransportErrorKind::ConnectionLost,
                };
                let final_err = TransportError::new(
                    kind,
                    format!("{}: gave up after {} attempts", self.label, retries),
                    true,
                )
                .with_cause(err);
                error!(channel = %self.label, error = %final_err, "Connect failed");
                self.fail(token, final_err.clone());
                return Err(final_err);
            }

            let delay = self.options.retry_delay(retries);
            warn!(
                channel = %self.label,
                attempt = retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Connect attempt failed, retrying"
            );
            if !sleep_or_cancel(delay, token).await {
                return Err(self.cancelled());
            }
        }
    }

    /// One open attempt, bounded by `timeout`
    async fn open_channel(
        self: &Arc<Self>,
        token: &CancellationToken,
        timeout: Duration,
    ) -> TransportResult<()> {
        let mut channel = tokio::select! {
            _ = token.cancelled() => return Err(self.cancelled()),
            guard = self.channel.lock() => guard,
        };

        let link = {
            let mut shared = self.shared.lock();
            shared.generation += 1;
            let weak = Arc::downgrade(self);
            let handler: Weak<dyn LinkHandler> = weak;
            ChannelLink::new(handler, shared.generation)
        };

        let opened = tokio::select! {
            _ = token.cancelled() => None,
            result = tokio::time::timeout(timeout, channel.open(link)) => Some(result),
        };

        match opened {
            None => {
                let _ = channel.close().await;
                Err(self.cancelled())
            }
            Some(Err(_elapsed)) => {
                let _ = channel.close().await;
                Err(TransportError::timeout(format!(
                    "{}: no connection within {} ms",
                    self.label,
                    timeout.as_millis()
                )))
            }
            Some(Ok(Err(e))) => Err(e),
            Some(Ok(Ok(()))) => {
                if !self.commit_connected(token) {
                    let _ = channel.close().await;
                    return Err(self.cancelled());
                }
                Ok(())
            }
        }
    }

    /// The link dropped: go `Disconnected` and maybe start reconnecting
    ///
    /// `generation` is set when the report comes from a channel link; it must
    /// match the current connection.
    fn connection_lost(self: &Arc<Self>, generation: Option<u64>) {
        let mut shared = self.shared.lock();
        if let Some(generation) = generation
            && (generation != shared.generation || !shared.state.is_connected())
        {
            return;
        }
        if shared.state == TransportState::Disconnected {
            return;
        }
        shared.generation += 1;
        shared.connected_at = None;
        self.set_state(&mut shared, TransportState::Disconnected);
        self.emit(TransportEvent::Disconnected);
        warn!(channel = %self.label, "Connection lost");

        if self.options.auto_reconnect {
            self.start_reconnect(&mut shared);
        }
    }

    /// Spawn the reconnect loop unless one is already running
    fn start_reconnect(self: &Arc<Self>, shared: &mut Shared) {
        if shared
            .reconnect
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
        {
            debug!(channel = %self.label, "Reconnect already running");
            return;
        }

        shared.session.cancel();
        let token = CancellationToken::new();
        shared.session = token.clone();
        let deadline = Instant::now() + self.options.reconnect_timeout();
        self.set_state(shared, TransportState::Reconnecting);
        info!(
            channel = %self.label,
            timeout_ms = self.options.reconnect_timeout_ms,
            "Starting auto-reconnect"
        );

        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move { inner.reconnect_loop(token, deadline).await });
        shared.reconnect = Some(ReconnectTask { deadline, handle });
    }

    async fn reconnect_loop(self: Arc<Self>, token: CancellationToken, deadline: Instant) {
        let mut attempt: u32 = 0;
        loop {
            if self.reconnect_expired(&token, deadline, attempt) {
                return;
            }

            // Never sleep past the deadline
            let remaining = deadline.saturating_duration_since(Instant::now());
            let delay = self.options.reconnect_delay(attempt).min(remaining);
            if !sleep_or_cancel(delay, &token).await {
                return;
            }
            if self.reconnect_expired(&token, deadline, attempt) {
                return;
            }
            attempt += 1;

            let remaining = deadline.saturating_duration_since(Instant::now());
            let timeout = self.options.connection_timeout().min(remaining);
            match self.open_channel(&token, timeout).await {
                Ok(()) => {
                    info!(channel = %self.label, attempts = attempt, "Printer reconnected");
                    return;
                }
                Err(err) if err.kind == TransportErrorKind::Cancelled => return,
                Err(err) if !err.recoverable => {
                    error!(channel = %self.label, error = %err, "Reconnect failed, not retrying");
                    self.fail(&token, err);
                    return;
                }
                Err(err) => {
                    debug!(channel = %self.label, attempt, error = %err, "Reconnect attempt failed");
                }
            }
        }
    }

    /// Enter `Error` with `ReconnectTimeout` once the deadline has passed
    fn reconnect_expired(&self, token: &CancellationToken, deadline: Instant, attempts: u32) -> bool {
        if Instant::now() < deadline {
            return false;
        }
        let err = TransportError::reconnect_timeout(format!(
            "{}: not reconnected within {} ms",
            self.label, self.options.reconnect_timeout_ms
        ));
        error!(channel = %self.label, attempts, "Reconnect deadline reached");
        self.fail(token, err);
        true
    }

    /// Cancel everything, close the channel and settle in `Disconnected`
    ///
    /// `force` also closes the channel when the transport already looks idle.
    async fn shutdown(&self, force: bool, reason: Option<TransportError>) {
        let was_active = {
            let mut shared = self.shared.lock();
            let idle = matches!(
                shared.state,
                TransportState::Disconnected | TransportState::Error
            ) && shared.reconnect.is_none();
            if idle && !force {
                return;
            }
            shared.session.cancel();
            shared.generation += 1;
            if let Some(task) = shared.reconnect.take() {
                task.handle.abort();
            }
            !idle
        };

        let closed = self.channel.lock().await.close().await;
        if let Err(e) = closed {
            warn!(channel = %self.label, error = %e, "Channel close failed");
        }

        let mut shared = self.shared.lock();
        shared.retries = 0;
        shared.connected_at = None;
        if let Some(reason) = reason {
            self.emit(TransportEvent::Error(reason));
        }
        if was_active {
            self.set_state(&mut shared, TransportState::Disconnected);
            self.emit(TransportEvent::Disconnected);
            info!(channel = %self.label, "Printer disconnected");
        }
    }
}

impl<C: Channel> LinkHandler for Inner<C> {
    fn on_data(&self, generation: u64, data: Vec<u8>) {
        if self.shared.lock().generation != generation {
            return;
        }
        debug!(channel = %self.label, bytes = data.len(), "Data received");
        self.emit(TransportEvent::Data(data));
    }

    fn on_closed(self: Arc<Self>, generation: u64, reason: Option<TransportError>) {
        {
            let shared = self.shared.lock();
            if shared.generation != generation || !shared.state.is_connected() {
                return;
            }
        }
        if let Some(err) = reason {
            warn!(channel = %self.label, error = %err, "Channel closed with error");
            self.emit(TransportEvent::Error(err));
        }
        self.connection_lost(Some(generation));
    }
}

/// Sleep unless cancelled first; `false` means cancelled
async fn sleep_or_cancel(delay: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
