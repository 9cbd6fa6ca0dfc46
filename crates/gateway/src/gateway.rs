//! Connection supervisor
//!
//! Owns one venue connection at a time: dialing, the reader loop, serialized
//! writes, correlated requests, subscriptions and shutdown. Reconnection is
//! left to the caller; after a connection is lost `connect()` dials a fresh
//! one.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use streamgate_metadata::{VenueConfig, DEFAULT_REQUEST_TIMEOUT_MS};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::classifier::Classifier;
use crate::dispatch::{Dispatcher, MarketCache};
use crate::error::GatewayError;
use crate::events::EventSink;
use crate::instrument::{AssetClass, Instrument, InstrumentRegistry};
use crate::metrics::GatewayMetrics;
use crate::model::{CanonicalEvent, ErrorEvent, MarketInfo};
use crate::normalizer::Normalizer;
use crate::orderbook::{BookKey, OrderbookState, OrderbookSynchronizer};
use crate::pending::PendingRequests;
use crate::ratelimit::Unlimited;
use crate::signer::{Credentials, Signer};
use crate::subscription::{ChannelCommand, Subscription, SubscriptionManager, SubscriptionResult};
use crate::traits::{Frame, FrameReader, FrameWriter, RateLimiter, Transport};
use crate::venue::{TopicKind, VenueProfile};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Overrides the profile's endpoint
    pub endpoint: Option<String>,
    pub instruments: Vec<Instrument>,
    pub asset_class: AssetClass,
    pub request_timeout: Duration,
}

impl GatewayConfig {
    pub fn new(instruments: Vec<Instrument>, asset_class: AssetClass) -> Self {
        Self {
            endpoint: None,
            instruments,
            asset_class,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }

    pub fn from_venue(config: &VenueConfig) -> Self {
        let asset_class = AssetClass::from(config.asset_class);
        Self {
            endpoint: config.endpoint.clone(),
            instruments: config
                .instruments
                .iter()
                .map(|pair| Instrument::parse(pair, asset_class))
                .collect(),
            asset_class,
            request_timeout: config.request_timeout(),
        }
    }
}

/// One dialed connection
struct Connection {
    id: u64,
    writer: tokio::sync::Mutex<Box<dyn FrameWriter>>,
    /// Taken by the reader loop when it starts
    reader: Mutex<Option<Box<dyn FrameReader>>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    live: AtomicBool,
    shutdown: watch::Sender<bool>,
    pending: PendingRequests,
}

impl Connection {
    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

pub struct Gateway {
    profile: Arc<VenueProfile>,
    config: GatewayConfig,
    transport: Arc<dyn Transport>,
    events: EventSink,
    signer: Option<Signer>,
    rate_limiter: Arc<dyn RateLimiter>,
    classifier: Classifier,
    normalizer: Normalizer,
    books: Arc<OrderbookSynchronizer>,
    subscriptions: Arc<SubscriptionManager>,
    markets: MarketCache,
    connection: RwLock<Option<Arc<Connection>>>,
    connect_lock: tokio::sync::Mutex<()>,
    connections: AtomicU64,
    metrics: GatewayMetrics,
}

impl Gateway {
    pub fn new(
        profile: VenueProfile,
        config: GatewayConfig,
        transport: Arc<dyn Transport>,
        events: EventSink,
    ) -> Self {
        let profile = Arc::new(profile);
        let registry = Arc::new(InstrumentRegistry::new(&config.instruments));
        let metrics = GatewayMetrics::new(profile.name.clone());
        metrics.set_disconnected();

        Self {
            classifier: Classifier::new(Arc::clone(&profile)),
            normalizer: Normalizer::new(Arc::clone(&profile), registry, config.asset_class),
            profile,
            config,
            transport,
            events,
            signer: None,
            rate_limiter: Arc::new(Unlimited),
            books: Arc::new(OrderbookSynchronizer::new()),
            subscriptions: Arc::new(SubscriptionManager::new()),
            markets: MarketCache::default(),
            connection: RwLock::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
            connections: AtomicU64::new(0),
            metrics,
        }
    }

    /// Enable authenticated requests. Incomplete credentials are ignored.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        if credentials.is_complete() {
            self.signer = Some(Signer::new(credentials));
        } else {
            warn!(exchange = %self.profile.name, "Incomplete credentials, authenticated requests disabled");
        }
        self
    }

    pub fn with_signer(mut self, signer: Signer) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn profile(&self) -> &VenueProfile {
        &self.profile
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout
    }

    pub fn endpoint(&self) -> &str {
        self.config
            .endpoint
            .as_deref()
            .unwrap_or(&self.profile.endpoint)
    }

    /// Signer for authenticated requests, checked before any I/O
    pub fn signer(&self) -> Result<&Signer, GatewayError> {
        self.signer.as_ref().ok_or_else(|| {
            GatewayError::NotAuthenticated(format!("no credentials configured for {}", self.profile.name))
        })
    }

    fn current(&self) -> Option<Arc<Connection>> {
        self.connection.read().clone()
    }

    fn live_connection(&self) -> Result<Arc<Connection>, GatewayError> {
        self.current()
            .filter(|conn| conn.is_live())
            .ok_or(GatewayError::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.live_connection().is_ok()
    }

    /// Dial the venue. No-op while a live connection exists.
    pub async fn connect(&self) -> Result<(), GatewayError> {
        let _guard = self.connect_lock.lock().await;

        if let Some(previous) = self.current() {
            if previous.is_live() {
                debug!(exchange = %self.profile.name, "Already connected");
                return Ok(());
            }
            self.release(&previous).await;
        }

        let url = self.endpoint().to_string();
        info!(exchange = %self.profile.name, url = %url, "Connecting");
        let (writer, reader) = self.transport.dial(&url).await.map_err(|e| match e {
            GatewayError::Connect(_) => e,
            other => GatewayError::Connect(other.to_string()),
        })?;

        let id = self.connections.fetch_add(1, Ordering::Relaxed) + 1;
        let (shutdown, _) = watch::channel(false);
        let conn = Arc::new(Connection {
            id,
            writer: tokio::sync::Mutex::new(writer),
            reader: Mutex::new(Some(reader)),
            reader_task: Mutex::new(None),
            live: AtomicBool::new(true),
            shutdown,
            pending: PendingRequests::new(),
        });
        *self.connection.write() = Some(conn);

        self.metrics.set_connected();
        info!(exchange = %self.profile.name, connection = id, "Connected");
        Ok(())
    }

    /// Start the reader loop for the current connection
    pub fn run(&self) -> Result<(), GatewayError> {
        let conn = self.live_connection()?;
        let reader = conn.reader.lock().take().ok_or(GatewayError::AlreadyRunning)?;
        let shutdown = conn.shutdown.subscribe();

        let task = ReaderLoop {
            exchange: self.profile.name.clone(),
            dispatcher: Dispatcher::new(
                self.profile.name.clone(),
                self.classifier.clone(),
                self.normalizer.clone(),
                conn.pending.clone(),
                Arc::clone(&self.books),
                Arc::clone(&self.markets),
                self.events.clone(),
                self.metrics.clone(),
            ),
            conn: Arc::clone(&conn),
            events: self.events.clone(),
            books: Arc::clone(&self.books),
            subscriptions: Arc::clone(&self.subscriptions),
            metrics: self.metrics.clone(),
        };
        let handle = tokio::spawn(task.run(reader, shutdown));
        *conn.reader_task.lock() = Some(handle);
        Ok(())
    }

    /// Stop the reader loop and release the connection. Outstanding
    /// requests fail with `ConnectionClosed`. Idempotent.
    pub async fn shutdown(&self) -> Result<(), GatewayError> {
        let _guard = self.connect_lock.lock().await;
        let taken = self.connection.write().take();
        let Some(conn) = taken else {
            return Ok(());
        };

        conn.live.store(false, Ordering::SeqCst);
        let failed = conn.pending.fail_all("shutdown");
        self.release(&conn).await;

        self.subscriptions.clear();
        self.books.clear_exchange(&self.profile.name);
        self.metrics.set_disconnected();
        self.metrics.set_pending_requests(0);
        self.metrics.set_subscriptions_active(0);
        info!(
            exchange = %self.profile.name,
            connection = conn.id,
            failed_requests = failed,
            "Shut down"
        );
        Ok(())
    }

    async fn release(&self, conn: &Connection) {
        conn.shutdown.send_replace(true);
        if let Err(e) = conn.writer.lock().await.close().await {
            debug!(exchange = %self.profile.name, error = %e, "Error closing transport");
        }
        let handle = conn.reader_task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(exchange = %self.profile.name, error = %e, "Reader loop ended abnormally");
            }
        }
    }

    async fn write_to(&self, conn: &Connection, frame: Frame) -> Result<(), GatewayError> {
        self.rate_limiter.acquire().await;
        trace!(exchange = %self.profile.name, bytes = frame.len(), "Writing frame");
        let mut writer = conn.writer.lock().await;
        writer.write_frame(frame).await
    }

    /// Write one raw frame through the serialized writer
    pub async fn write(&self, frame: Frame) -> Result<(), GatewayError> {
        let conn = self.live_connection()?;
        self.write_to(&conn, frame).await
    }

    /// Send a correlated command and wait for its reply.
    ///
    /// `build` receives the fresh request id and returns the complete
    /// (signed) command. On timeout the pending entry is removed and a late
    /// reply is ignored.
    pub async fn send_and_wait<C, F>(&self, timeout: Duration, build: F) -> Result<Frame, GatewayError>
    where
        C: Serialize,
        F: FnOnce(u64) -> Result<C, GatewayError>,
    {
        let conn = self.live_connection()?;
        let waiter = conn.pending.register_next()?;
        if !conn.is_live() {
            return Err(GatewayError::ConnectionClosed("connection lost".to_string()));
        }

        let id = waiter.id();
        let frame = {
            let command = build(id)?;
            serde_json::to_vec(&command)?
        };
        self.metrics.set_pending_requests(conn.pending.len());
        self.write_to(&conn, frame).await?;
        debug!(exchange = %self.profile.name, id, "Awaiting reply");

        let result = waiter.wait(timeout).await;
        if let Err(GatewayError::RequestTimeout { .. }) = &result {
            self.metrics.inc_request_timeout();
            warn!(exchange = %self.profile.name, id, ?timeout, "Request timed out");
        }
        self.metrics.set_pending_requests(conn.pending.len());
        result
    }

    /// Subscribe one channel. `Ok(false)` if it was already active.
    pub async fn subscribe(&self, sub: Subscription) -> Result<bool, GatewayError> {
        let conn = self.live_connection()?;
        let frame = serde_json::to_vec(&ChannelCommand {
            event: self.profile.subscribe_event,
            channel: &sub.channel,
        })?;
        if !self.subscriptions.reserve(&sub) {
            debug!(exchange = %self.profile.name, channel = %sub.channel, "Already subscribed");
            return Ok(false);
        }

        if let Err(e) = self.write_to(&conn, frame).await {
            self.subscriptions.release(&sub);
            return Err(GatewayError::Subscription {
                channel: sub.channel,
                reason: e.to_string(),
            });
        }
        self.metrics.set_subscriptions_active(self.subscriptions.len());
        debug!(exchange = %self.profile.name, channel = %sub.channel, "Subscribed");
        Ok(true)
    }

    pub async fn subscribe_all(&self, subs: Vec<Subscription>) -> SubscriptionResult {
        let mut result = SubscriptionResult::default();
        for sub in subs {
            let channel = sub.channel.clone();
            match self.subscribe(sub).await {
                Ok(true) => result.successful += 1,
                Ok(false) => result.skipped += 1,
                Err(e) => {
                    warn!(exchange = %self.profile.name, channel = %channel, error = %e, "Subscription failed");
                    result.failed += 1;
                    result.failed_channels.push(channel);
                }
            }
        }
        result
    }

    /// Subscribe the venue's default channel set for the configured instruments
    pub async fn subscribe_defaults(&self) -> Result<SubscriptionResult, GatewayError> {
        self.live_connection()?;
        let subs = SubscriptionManager::default_subscriptions(
            &self.profile,
            &self.config.instruments,
            self.config.asset_class,
        );
        info!(exchange = %self.profile.name, count = subs.len(), "Subscribing default channels");
        let result = self.subscribe_all(subs).await;
        info!(
            exchange = %self.profile.name,
            successful = result.successful,
            skipped = result.skipped,
            failed = result.failed,
            "Default subscriptions complete"
        );
        Ok(result)
    }

    /// Drop a subscription and, for depth channels, its order book
    pub async fn unsubscribe(&self, sub: &Subscription) -> Result<(), GatewayError> {
        if self.subscriptions.release(sub).is_none() {
            debug!(exchange = %self.profile.name, channel = %sub.channel, "Not subscribed");
            return Ok(());
        }
        self.metrics.set_subscriptions_active(self.subscriptions.len());

        if let Some(event) = self.profile.unsubscribe_event {
            let conn = self.live_connection()?;
            let frame = serde_json::to_vec(&ChannelCommand {
                event,
                channel: &sub.channel,
            })?;
            self.write_to(&conn, frame)
                .await
                .map_err(|e| GatewayError::Subscription {
                    channel: sub.channel.clone(),
                    reason: e.to_string(),
                })?;
        }

        if self.profile.route(&sub.channel) == Some(TopicKind::Depth) {
            if let Some(instrument) = &sub.instrument {
                self.books
                    .remove(&BookKey::new(self.profile.name.clone(), instrument.clone()));
            }
        }
        Ok(())
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.active()
    }

    /// Latest market listing
    pub fn markets(&self) -> Vec<MarketInfo> {
        self.markets.read().clone()
    }

    pub fn orderbook(&self, instrument: &Instrument) -> Option<Arc<OrderbookState>> {
        self.books
            .get(&BookKey::new(self.profile.name.clone(), instrument.clone()))
    }

    pub fn books(&self) -> &Arc<OrderbookSynchronizer> {
        &self.books
    }

    pub fn pending_requests(&self) -> usize {
        self.current().map(|conn| conn.pending.len()).unwrap_or(0)
    }
}

/// Reader loop bound to one connection
struct ReaderLoop {
    exchange: String,
    dispatcher: Dispatcher,
    conn: Arc<Connection>,
    events: EventSink,
    books: Arc<OrderbookSynchronizer>,
    subscriptions: Arc<SubscriptionManager>,
    metrics: GatewayMetrics,
}

impl ReaderLoop {
    async fn run(self, mut reader: Box<dyn FrameReader>, mut shutdown: watch::Receiver<bool>) {
        info!(exchange = %self.exchange, connection = self.conn.id, "Reader loop started");
        if *shutdown.borrow_and_update() {
            return;
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!(exchange = %self.exchange, connection = self.conn.id, "Reader loop stopping");
                    break;
                }
                result = reader.read_frame() => match result {
                    Ok(Some(frame)) => {
                        trace!(exchange = %self.exchange, bytes = frame.len(), "Frame received");
                        self.dispatcher.dispatch(&frame).await;
                    }
                    Ok(None) => {
                        self.fail("connection closed by peer".to_string()).await;
                        break;
                    }
                    Err(e) => {
                        self.fail(e.to_string()).await;
                        break;
                    }
                }
            }
        }
    }

    /// Tear down after a read failure. Reports exactly once per connection
    /// and never after a deliberate shutdown.
    async fn fail(&self, reason: String) {
        if !self.conn.live.swap(false, Ordering::SeqCst) {
            return;
        }

        let failed = self.conn.pending.fail_all(&reason);
        self.subscriptions.clear();
        self.books.clear_exchange(&self.exchange);
        self.metrics.set_disconnected();
        self.metrics.set_pending_requests(0);
        self.metrics.set_subscriptions_active(0);
        error!(
            exchange = %self.exchange,
            connection = self.conn.id,
            error = %reason,
            failed_requests = failed,
            "Connection lost"
        );

        let event = CanonicalEvent::Error(ErrorEvent {
            exchange: self.exchange.clone(),
            message: GatewayError::ConnectionClosed(reason).to_string(),
            terminal: true,
        });
        if self.events.emit_terminal(event).await {
            self.metrics.inc_event("error");
        } else {
            self.metrics.inc_event_dropped("error");
        }
    }
}
