//! Prometheus metrics for the gateway
//!
//! Per-venue counters and gauges for frame traffic, canonical events,
//! request correlation and connection status.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter_vec, register_int_gauge_vec, Encoder, IntCounterVec, IntGaugeVec,
    TextEncoder,
};

const LABEL_EXCHANGE: &str = "exchange";
const LABEL_KIND: &str = "kind";
const LABEL_EVENT_TYPE: &str = "event_type";

/// Inbound frames by classification kind
static FRAMES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "streamgate_frames_total",
        "Inbound frames by classification kind",
        &[LABEL_EXCHANGE, LABEL_KIND]
    )
    .expect("Failed to register frames_total metric")
});

/// Canonical events handed to the event stream
static EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "streamgate_events_total",
        "Canonical events emitted",
        &[LABEL_EXCHANGE, LABEL_EVENT_TYPE]
    )
    .expect("Failed to register events_total metric")
});

/// Canonical events dropped because the consumer fell behind
static EVENTS_DROPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "streamgate_events_dropped_total",
        "Canonical events dropped on a full event buffer",
        &[LABEL_EXCHANGE, LABEL_EVENT_TYPE]
    )
    .expect("Failed to register events_dropped_total metric")
});

static REQUEST_TIMEOUTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "streamgate_request_timeouts_total",
        "Correlated requests that timed out",
        &[LABEL_EXCHANGE]
    )
    .expect("Failed to register request_timeouts_total metric")
});

/// Connection status (1 = connected, 0 = disconnected)
static CONNECTED: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "streamgate_connected",
        "Connection status per exchange (1=connected, 0=disconnected)",
        &[LABEL_EXCHANGE]
    )
    .expect("Failed to register connected metric")
});

static PENDING_REQUESTS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "streamgate_pending_requests",
        "Correlated requests awaiting a reply",
        &[LABEL_EXCHANGE]
    )
    .expect("Failed to register pending_requests metric")
});

static SUBSCRIPTIONS_ACTIVE: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "streamgate_subscriptions_active",
        "Active channel subscriptions",
        &[LABEL_EXCHANGE]
    )
    .expect("Failed to register subscriptions_active metric")
});

/// Handle for recording metrics for one venue
#[derive(Debug, Clone)]
pub struct GatewayMetrics {
    exchange: String,
}

impl GatewayMetrics {
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
        }
    }

    /// Record an inbound frame of the given classification kind
    pub fn inc_frame(&self, kind: &str) {
        FRAMES_TOTAL
            .with_label_values(&[&self.exchange, kind])
            .inc();
    }

    pub fn inc_event(&self, event_type: &str) {
        EVENTS_TOTAL
            .with_label_values(&[&self.exchange, event_type])
            .inc();
    }

    pub fn inc_event_dropped(&self, event_type: &str) {
        EVENTS_DROPPED_TOTAL
            .with_label_values(&[&self.exchange, event_type])
            .inc();
    }

    pub fn inc_request_timeout(&self) {
        REQUEST_TIMEOUTS_TOTAL
            .with_label_values(&[&self.exchange])
            .inc();
    }

    pub fn set_connected(&self) {
        CONNECTED.with_label_values(&[&self.exchange]).set(1);
    }

    pub fn set_disconnected(&self) {
        CONNECTED.with_label_values(&[&self.exchange]).set(0);
    }

    pub fn set_pending_requests(&self, count: usize) {
        PENDING_REQUESTS
            .with_label_values(&[&self.exchange])
            .set(count as i64);
    }

    pub fn set_subscriptions_active(&self, count: usize) {
        SUBSCRIPTIONS_ACTIVE
            .with_label_values(&[&self.exchange])
            .set(count as i64);
    }

    /// Current connection status gauge value
    pub fn is_connected(&self) -> bool {
        CONNECTED.with_label_values(&[&self.exchange]).get() == 1
    }
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to encode metrics as UTF-8: {}", e))
    })
}
