//! Duplex connection to the monitored node.
//!
//! The transport owns two tasks. The read loop accepts the node's
//! connection (again after every reset), decodes records, mirrors state
//! reports, fans log lines out to observers and hands each remaining event
//! to the dispatcher queue. The write loop frames and writes the
//! acknowledgements the dispatcher produces.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use faultline_events::{Event, Framing, NodeState, Response, WireCodec, framing::MAX_FRAME_SIZE};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::endpoint::{BoxedReader, BoxedWriter, Endpoint};
use crate::error::{Error, Result};
use crate::observe::{ConsumerId, LogConsumers, NodeSnapshot, NodeStateMirror};
use crate::pool::{Pool, PoolStats, Pooled};
use crate::reset::ResetSignal;

/// Configuration for the transport.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Endpoint the monitored node connects to.
    pub endpoint: Endpoint,
    /// Framing used on the connection.
    pub framing: Framing,
    /// Maximum frame size.
    pub max_frame_size: usize,
    /// Capacity of the acknowledgement queue.
    pub response_queue_capacity: usize,
}

impl TransportConfig {
    /// Configuration with default framing and limits.
    #[must_use]
    pub const fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            framing: Framing::Lines,
            max_frame_size: MAX_FRAME_SIZE,
            response_queue_capacity: 1024,
        }
    }
}

/// An event handed to the dispatcher, paired with its acknowledgement.
///
/// Both halves return to their pools when dropped. `response` starts out as
/// the default acknowledgement for `event`.
#[derive(Debug)]
pub struct Envelope {
    /// The decoded event.
    pub event: Pooled<Event>,
    /// The acknowledgement to send back.
    pub response: Pooled<Response>,
    /// Lets an action force a reconnect.
    pub reset: ResetSignal,
}

enum WriterUpdate {
    Detach,
    Attach {
        generation: u64,
        sink: FramedWrite<BoxedWriter, WireCodec>,
    },
}

/// Handles of the running transport tasks.
pub struct TransportHandle {
    /// Read loop. Resolves to an error only if the connection could not be
    /// (re-)established.
    pub read: JoinHandle<Result<()>>,
    /// Write loop.
    pub write: JoinHandle<()>,
}

impl TransportHandle {
    /// Wait for both loops to exit.
    ///
    /// # Errors
    ///
    /// Returns the read loop's error, or an error if a task panicked.
    pub async fn join(self) -> Result<()> {
        let read = self.read.await?;
        self.write.await?;
        read
    }
}

/// Duplex, self-reconnecting connection to the monitored node.
pub struct Transport {
    config: TransportConfig,
    consumers: LogConsumers,
    event_pool: Pool<Event>,
    event_tx: mpsc::Sender<Envelope>,
    generation: AtomicU64,
    node_state: NodeStateMirror,
    reset: ResetSignal,
    response_pool: Pool<Response>,
    response_rx: Mutex<Option<mpsc::Receiver<Pooled<Response>>>>,
    response_tx: mpsc::Sender<Pooled<Response>>,
    sequence: AtomicU64,
}

impl Transport {
    /// Create a transport delivering events into `event_tx`.
    #[must_use]
    pub fn new(config: TransportConfig, event_tx: mpsc::Sender<Envelope>) -> Self {
        let (response_tx, response_rx) = mpsc::channel(config.response_queue_capacity.max(1));

        Self {
            config,
            consumers: LogConsumers::new(),
            event_pool: Pool::new(),
            event_tx,
            generation: AtomicU64::new(0),
            node_state: NodeStateMirror::new(),
            reset: ResetSignal::new(),
            response_pool: Pool::new(),
            response_rx: Mutex::new(Some(response_rx)),
            response_tx,
            sequence: AtomicU64::new(0),
        }
    }

    /// Spawn the read and write loops and return immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport was already started.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) -> Result<TransportHandle> {
        let response_rx = self.response_rx.lock().take().ok_or(Error::AlreadyStarted)?;
        let (writer_tx, writer_rx) = mpsc::channel(1);

        let transport = Arc::clone(self);
        let read_cancel = cancel.clone();
        let read = tokio::spawn(async move { transport.read_loop(read_cancel, writer_tx).await });

        let write = tokio::spawn(Self::write_loop(cancel, writer_rx, response_rx));

        Ok(TransportHandle { read, write })
    }

    /// Force the read loop to drop its connection and accept a new one.
    pub fn request_reset(&self) {
        self.reset.request();
    }

    /// Whether a reconnect is pending.
    #[must_use]
    pub fn reset_requested(&self) -> bool {
        self.reset.is_requested()
    }

    /// The shared reset flag.
    #[must_use]
    pub fn reset_signal(&self) -> ResetSignal {
        self.reset.clone()
    }

    /// Register a callback for every log line the node reports.
    pub fn register_log_consumer<F>(&self, consumer: F) -> ConsumerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.consumers.register(consumer)
    }

    /// Remove a log callback.
    pub fn unregister_log_consumer(&self, id: ConsumerId) -> bool {
        self.consumers.unregister(id)
    }

    /// Most recently reported node role.
    #[must_use]
    pub fn node_state(&self) -> NodeState {
        self.node_state.get()
    }

    /// Latest term, leader and commit index alongside the role.
    #[must_use]
    pub fn node_snapshot(&self) -> NodeSnapshot {
        self.node_state.snapshot()
    }

    /// Mirror of the node state, for observers that outlive a borrow.
    #[must_use]
    pub fn node_state_mirror(&self) -> NodeStateMirror {
        self.node_state.clone()
    }

    /// Queue feeding the write loop.
    #[must_use]
    pub fn response_sender(&self) -> mpsc::Sender<Pooled<Response>> {
        self.response_tx.clone()
    }

    /// Number of connections accepted so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Counters of the event pool.
    #[must_use]
    pub fn event_pool_stats(&self) -> PoolStats {
        self.event_pool.stats()
    }

    /// Counters of the response pool.
    #[must_use]
    pub fn response_pool_stats(&self) -> PoolStats {
        self.response_pool.stats()
    }

    fn codec(&self) -> WireCodec {
        WireCodec::with_max_frame_size(self.config.framing, self.config.max_frame_size)
    }

    #[instrument(skip_all, fields(endpoint = %self.config.endpoint))]
    async fn read_loop(
        self: Arc<Self>,
        cancel: CancellationToken,
        writer_tx: mpsc::Sender<WriterUpdate>,
    ) -> Result<()> {
        let mut reader: Option<FramedRead<BoxedReader, WireCodec>> = None;
        let mut generation = 0;

        let result = loop {
            if self.reset.is_requested() {
                info!("resetting connection to monitored node");
                drop(reader.take());
                if !Self::update_writer(&writer_tx, &cancel, WriterUpdate::Detach).await {
                    break Ok(());
                }

                let (read_half, write_half) = tokio::select! {
                    () = cancel.cancelled() => break Ok(()),
                    accepted = self.config.endpoint.accept_one() => match accepted {
                        Ok(halves) => halves,
                        Err(e) => break Err(e),
                    },
                };

                generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
                let attach = WriterUpdate::Attach {
                    generation,
                    sink: FramedWrite::new(write_half, self.codec()),
                };
                if !Self::update_writer(&writer_tx, &cancel, attach).await {
                    break Ok(());
                }
                reader = Some(FramedRead::new(read_half, self.codec()));
                self.reset.clear();
                info!(generation, "monitored node connected");
            }

            let Some(framed) = reader.as_mut() else {
                self.reset.request();
                continue;
            };

            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break Ok(()),
                () = self.reset.notified() => continue,
                next = framed.next() => next,
            };
            if self.reset.is_requested() {
                debug!("reset pending, discarding record from previous connection");
                continue;
            }

            match next {
                Some(Ok(payload)) => {
                    if !self.handle_payload(&payload, generation, &cancel).await {
                        break Ok(());
                    }
                }
                Some(Err(e)) => {
                    error!("failed to read from monitored node: {}", e);
                    if cancel.is_cancelled() {
                        break Ok(());
                    }
                    self.reset.request();
                }
                None => {
                    warn!("monitored node closed the connection");
                    if cancel.is_cancelled() {
                        break Ok(());
                    }
                    self.reset.request();
                }
            }
        };

        if let Err(e) = self.config.endpoint.remove_stale().await {
            warn!("failed to clean up endpoint: {}", e);
        }
        debug!("read loop exited");

        result
    }

    async fn update_writer(
        writer_tx: &mpsc::Sender<WriterUpdate>,
        cancel: &CancellationToken,
        update: WriterUpdate,
    ) -> bool {
        tokio::select! {
            () = cancel.cancelled() => false,
            sent = writer_tx.send(update) => sent.is_ok(),
        }
    }

    /// Decode and route one record. Returns false if the loop should stop.
    async fn handle_payload(
        &self,
        payload: &Bytes,
        generation: u64,
        cancel: &CancellationToken,
    ) -> bool {
        let mut event = self.event_pool.get();
        match Event::decode(payload) {
            Ok(decoded) => *event = decoded,
            Err(e) => {
                warn!("dropping malformed record: {}", e);
                return !cancel.is_cancelled();
            }
        }

        if event.is_state_log() {
            match event.node_state {
                Some(state) => self.node_state.set(state),
                None => debug!("state log without a node state"),
            }
            return true;
        }

        self.node_state.observe(&event);
        event.sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        event.generation = generation;
        debug!(sequence = event.sequence, kind = %event.kind, "received event");

        self.consumers.broadcast(&event.log_message);

        let mut response = self.response_pool.get();
        response.acknowledge(&event);
        let envelope = Envelope {
            event,
            response,
            reset: self.reset.clone(),
        };

        tokio::select! {
            () = cancel.cancelled() => false,
            sent = self.event_tx.send(envelope) => {
                if sent.is_err() {
                    warn!("dispatcher queue closed");
                }
                sent.is_ok()
            }
        }
    }

    #[instrument(skip_all)]
    async fn write_loop(
        cancel: CancellationToken,
        mut writer_rx: mpsc::Receiver<WriterUpdate>,
        mut response_rx: mpsc::Receiver<Pooled<Response>>,
    ) {
        let mut sink: Option<(u64, FramedWrite<BoxedWriter, WireCodec>)> = None;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                update = writer_rx.recv() => match update {
                    Some(WriterUpdate::Attach { generation, sink: new_sink }) => {
                        sink = Some((generation, new_sink));
                    }
                    Some(WriterUpdate::Detach) => {
                        if let Some((_, mut old)) = sink.take() {
                            if let Err(e) = SinkExt::<Bytes>::close(&mut old).await {
                                debug!("failed to close previous connection: {}", e);
                            }
                        }
                    }
                    None => break,
                },
                response = response_rx.recv() => match response {
                    Some(response) => Self::write_response(&mut sink, response).await,
                    None => break,
                },
            }
        }

        debug!("write loop exited");
    }

    async fn write_response(
        sink: &mut Option<(u64, FramedWrite<BoxedWriter, WireCodec>)>,
        response: Pooled<Response>,
    ) {
        let Some((generation, framed)) = sink.as_mut() else {
            debug!(sequence = response.sequence, "no connection, dropping acknowledgement");
            return;
        };
        if response.generation != *generation {
            debug!(
                sequence = response.sequence,
                "dropping acknowledgement addressed to a previous connection"
            );
            return;
        }

        let bytes = match response.encode() {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                error!("failed to encode acknowledgement: {}", e);
                return;
            }
        };

        let sequence = response.sequence;
        response.release();

        match framed.send(bytes).await {
            Ok(()) => debug!(sequence, "sent acknowledgement"),
            Err(e) => error!("failed to write acknowledgement: {}", e),
        }
    }
}
