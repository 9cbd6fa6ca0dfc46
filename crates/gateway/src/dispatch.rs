//! Per-frame dispatch for the reader loop
//!
//! Replies go to the pending-request table, stream events go through the
//! normalizer to the orderbook synchronizer or the event stream. Nothing
//! that goes wrong with a single frame stops the loop.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{trace, warn};

use crate::classifier::{Classification, Classifier};
use crate::error::GatewayError;
use crate::events::EventSink;
use crate::metrics::GatewayMetrics;
use crate::model::{CanonicalEvent, ErrorEvent, MarketInfo};
use crate::normalizer::{Normalized, Normalizer};
use crate::orderbook::{BookKey, OrderbookSynchronizer};
use crate::pending::PendingRequests;

/// Latest market listing received on the market-wide channel
pub type MarketCache = Arc<RwLock<Vec<MarketInfo>>>;

#[derive(Clone)]
pub struct Dispatcher {
    exchange: String,
    classifier: Classifier,
    normalizer: Normalizer,
    pending: PendingRequests,
    books: Arc<OrderbookSynchronizer>,
    markets: MarketCache,
    events: EventSink,
    metrics: GatewayMetrics,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        exchange: impl Into<String>,
        classifier: Classifier,
        normalizer: Normalizer,
        pending: PendingRequests,
        books: Arc<OrderbookSynchronizer>,
        markets: MarketCache,
        events: EventSink,
        metrics: GatewayMetrics,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            classifier,
            normalizer,
            pending,
            books,
            markets,
            events,
            metrics,
        }
    }

    pub async fn dispatch(&self, frame: &[u8]) {
        let classification = self.classifier.classify(frame);
        self.metrics.inc_frame(classification.kind());

        match classification {
            Classification::CorrelatedReply { id, payload } => {
                trace!(exchange = %self.exchange, id, "Correlated reply");
                self.pending.resolve(id, payload);
                self.metrics.set_pending_requests(self.pending.len());
            }
            Classification::ProtocolError { code, message } => {
                let err = self.classifier.protocol_error(code, message);
                warn!(exchange = %self.exchange, code, error = %err, "Venue error");
                self.emit_error(&err).await;
            }
            Classification::StreamEvent { topic, payload } => {
                if let Err(e) = self.handle_event(&topic, &payload).await {
                    warn!(exchange = %self.exchange, topic = %topic, error = %e, "Failed to handle stream event");
                    self.emit_error(&e).await;
                }
            }
            Classification::Unparseable(reason) => {
                warn!(
                    exchange = %self.exchange,
                    error = %reason,
                    frame = %String::from_utf8_lossy(frame),
                    "Dropping unparseable frame"
                );
            }
        }
    }

    async fn handle_event(&self, topic: &str, payload: &[u8]) -> Result<(), GatewayError> {
        let Some(normalized) = self.normalizer.normalize(topic, payload)? else {
            trace!(exchange = %self.exchange, topic, "Nothing to emit");
            return Ok(());
        };

        match normalized {
            Normalized::Markets(markets) => {
                trace!(exchange = %self.exchange, count = markets.len(), "Market listing");
                *self.markets.write() = markets;
            }
            Normalized::Ticker(ticker) => self.emit(CanonicalEvent::Ticker(ticker)).await,
            Normalized::Trade(trade) => self.emit(CanonicalEvent::Trade(trade)).await,
            Normalized::Depth(snapshot) => {
                let key = BookKey::new(self.exchange.clone(), snapshot.instrument);
                let update = self.books.load_snapshot(
                    key,
                    &snapshot.bids,
                    &snapshot.asks,
                    snapshot.timestamp,
                )?;
                self.emit(CanonicalEvent::OrderbookUpdate(update)).await;
            }
        }
        Ok(())
    }

    async fn emit(&self, event: CanonicalEvent) {
        let kind = event.kind();
        if self.events.emit(event).await {
            self.metrics.inc_event(kind);
        } else {
            self.metrics.inc_event_dropped(kind);
        }
    }

    async fn emit_error(&self, err: &GatewayError) {
        self.emit(CanonicalEvent::Error(ErrorEvent {
            exchange: self.exchange.clone(),
            message: err.to_string(),
            terminal: false,
        }))
        .await;
    }
}
