//! End-to-end gateway tests over the in-memory transport
//!
//! The `MemoryPeer` plays the venue: it reads the gateway's commands and
//! pushes replies and market data back.

use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use streamgate_lib::zb::{self, ZbApi};
use streamgate_lib::{
    event_channel, AssetClass, CanonicalEvent, Credentials, EventStream, Gateway, GatewayConfig,
    GatewayError, Instrument, MemoryPeer, MemoryTransport, OverflowPolicy, Signer, Subscription,
    TradeSide,
};

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    gateway: Arc<Gateway>,
    peer: MemoryPeer,
    events: EventStream,
}

fn btc() -> Instrument {
    Instrument::parse("BTC/USDT", AssetClass::Spot)
}

fn harness(credentials: Option<Credentials>) -> Harness {
    let (transport, peer) = MemoryTransport::new();
    let (sink, events) = event_channel(64, OverflowPolicy::Drop);
    let config = GatewayConfig::new(
        vec![btc(), Instrument::parse("ETH/USDT", AssetClass::Spot)],
        AssetClass::Spot,
    );
    let mut gateway = Gateway::new(zb::profile(), config, Arc::new(transport), sink);
    if let Some(credentials) = credentials {
        gateway = gateway.with_credentials(credentials);
    }
    Harness {
        gateway: Arc::new(gateway),
        peer,
        events,
    }
}

async fn connected(credentials: Option<Credentials>) -> Harness {
    let h = harness(credentials);
    h.gateway.connect().await.unwrap();
    h.gateway.run().unwrap();
    h
}

async fn next_event(events: &mut EventStream) -> CanonicalEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

async fn no_event(events: &mut EventStream) {
    if let Ok(event) = tokio::time::timeout(Duration::from_millis(100), events.recv()).await {
        panic!("Unexpected event: {:?}", event);
    }
}

async fn outbound_json(peer: &MemoryPeer) -> Value {
    let frame = peer.next_outbound(WAIT).await.expect("no outbound frame");
    serde_json::from_slice(&frame).unwrap()
}

fn request_account_info(gateway: &Arc<Gateway>, timeout: Duration) -> tokio::task::JoinHandle<Result<Vec<u8>, GatewayError>> {
    let gateway = Arc::clone(gateway);
    tokio::spawn(async move {
        gateway
            .send_and_wait(timeout, |no| {
                Ok(json!({"event": "addChannel", "channel": "getaccountinfo", "no": no}))
            })
            .await
    })
}

#[tokio::test]
async fn test_read_failure_emits_one_error_and_fails_pending() {
    let mut h = connected(None).await;
    h.gateway.subscribe_defaults().await.unwrap();
    h.peer.push(br#"{"asks":[[101,1]],"bids":[[100,1]],"channel":"btcusdt_depth"}"#.to_vec());
    assert!(matches!(
        next_event(&mut h.events).await,
        CanonicalEvent::OrderbookUpdate(_)
    ));

    let first = request_account_info(&h.gateway, Duration::from_secs(30));
    let second = request_account_info(&h.gateway, Duration::from_secs(30));
    // 7 subscribe commands, then the two requests
    h.peer.drain_outbound().await;
    tokio::time::timeout(WAIT, async {
        while h.gateway.pending_requests() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    h.peer.fail_read("connection reset by peer");

    match next_event(&mut h.events).await {
        CanonicalEvent::Error(err) => {
            assert!(err.terminal);
            assert!(err.message.contains("connection reset by peer"));
        }
        other => panic!("Expected Error, got {:?}", other),
    }
    no_event(&mut h.events).await;

    for handle in [first, second] {
        let result = tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
        assert!(matches!(result, Err(GatewayError::ConnectionClosed(_))));
    }

    assert!(!h.gateway.is_connected());
    assert!(h.gateway.subscriptions().is_empty());
    assert!(h.gateway.orderbook(&btc()).is_none());
    assert!(matches!(
        h.gateway.write(b"{}".to_vec()).await,
        Err(GatewayError::NotConnected)
    ));
}

#[tokio::test]
async fn test_peer_close_is_terminal() {
    let mut h = connected(None).await;
    h.peer.close();

    match next_event(&mut h.events).await {
        CanonicalEvent::Error(err) => assert!(err.terminal),
        other => panic!("Expected Error, got {:?}", other),
    }
    no_event(&mut h.events).await;
}

#[tokio::test]
async fn test_reconnect_after_failure() {
    let mut h = connected(None).await;
    h.peer.fail_read("eof");
    next_event(&mut h.events).await;

    h.gateway.connect().await.unwrap();
    h.gateway.run().unwrap();
    assert_eq!(h.peer.dial_count(), 2);
    assert!(h.gateway.is_connected());

    let result = h.gateway.subscribe_defaults().await.unwrap();
    assert_eq!(result.successful, 7);
}

#[tokio::test]
async fn test_timeout_then_late_reply_is_noop() {
    let mut h = connected(None).await;

    let timed_out = request_account_info(&h.gateway, Duration::from_millis(50));
    let request = outbound_json(&h.peer).await;
    let no = request["no"].as_u64().unwrap();

    let result = timed_out.await.unwrap();
    assert!(matches!(result, Err(GatewayError::RequestTimeout { id, .. }) if id == no));
    assert_eq!(h.gateway.pending_requests(), 0);

    h.peer.push(format!(r#"{{"code":1000,"channel":"getaccountinfo","no":"{}"}}"#, no).into_bytes());
    no_event(&mut h.events).await;
    assert!(h.gateway.is_connected());

    // The connection still correlates new requests
    let answered = request_account_info(&h.gateway, Duration::from_secs(5));
    let request = outbound_json(&h.peer).await;
    let next_no = request["no"].as_u64().unwrap();
    assert!(next_no > no);
    h.peer.push(format!(r#"{{"code":1000,"channel":"getaccountinfo","no":{}}}"#, next_no).into_bytes());
    assert!(answered.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_replies_correlate_out_of_order() {
    let h = connected(None).await;

    let handles: Vec<_> = (0..3)
        .map(|_| request_account_info(&h.gateway, Duration::from_secs(5)))
        .collect();
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(outbound_json(&h.peer).await["no"].as_u64().unwrap());
    }

    for id in ids.iter().rev() {
        h.peer.push(format!(r#"{{"code":1000,"no":"{}","message":"reply-{}"}}"#, id, id).into_bytes());
    }

    let mut replies = Vec::new();
    for handle in handles {
        let reply: Value = serde_json::from_slice(&handle.await.unwrap().unwrap()).unwrap();
        replies.push(reply["message"].as_str().unwrap().to_string());
    }
    let mut expected: Vec<String> = ids.iter().map(|id| format!("reply-{}", id)).collect();
    replies.sort();
    expected.sort();
    assert_eq!(replies, expected);
}

#[tokio::test]
async fn test_default_subscriptions_are_sent_once() {
    let h = connected(None).await;

    let result = h.gateway.subscribe_defaults().await.unwrap();
    assert_eq!(result.successful, 7);
    assert!(result.all_succeeded());

    let frames = h.peer.drain_outbound().await;
    let channels: Vec<String> = frames
        .iter()
        .map(|f| {
            let v: Value = serde_json::from_slice(f).unwrap();
            assert_eq!(v["event"], "addChannel");
            v["channel"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(channels[0], "markets");
    assert!(channels.contains(&"ethusdt_trades".to_string()));

    let again = h.gateway.subscribe_defaults().await.unwrap();
    assert_eq!(again.successful, 0);
    assert_eq!(again.skipped, 7);
    assert!(h.peer.drain_outbound().await.is_empty());
}

#[tokio::test]
async fn test_subscription_write_failure() {
    let h = connected(None).await;
    h.peer.fail_writes(Some("broken pipe"));

    let sub = Subscription::market("markets");
    match h.gateway.subscribe(sub.clone()).await {
        Err(GatewayError::Subscription { channel, reason }) => {
            assert_eq!(channel, "markets");
            assert!(reason.contains("broken pipe"));
        }
        other => panic!("Expected Subscription error, got {:?}", other),
    }

    h.peer.fail_writes(None);
    assert!(h.gateway.subscribe(sub).await.unwrap());
}

#[tokio::test]
async fn test_market_data_flow() {
    let mut h = connected(None).await;

    h.peer.push(br#"{"date":"1540447046542","ticker":{"vol":"1023.5","last":"6463.4","sell":"6464.0","buy":"6463.0","high":"6500","low":"6400"},"channel":"btcusdt_ticker"}"#.to_vec());
    match next_event(&mut h.events).await {
        CanonicalEvent::Ticker(ticker) => {
            assert_eq!(ticker.instrument, btc());
            assert_eq!(ticker.last, dec!(6463.4));
        }
        other => panic!("Expected Ticker, got {:?}", other),
    }

    h.peer.push(br#"{"data":[{"date":1540447040,"amount":"0.1","price":"6460","type":"buy","tid":1},{"date":1540447041,"amount":"0.2","price":"6461","type":"buy","tid":2},{"date":1540447042,"amount":"0.3","price":"6459","type":"sell","tid":3}],"channel":"btcusdt_trades"}"#.to_vec());
    match next_event(&mut h.events).await {
        CanonicalEvent::Trade(trade) => {
            assert_eq!(trade.price, dec!(6459));
            assert_eq!(trade.side, TradeSide::Sell);
        }
        other => panic!("Expected Trade, got {:?}", other),
    }
    no_event(&mut h.events).await;

    h.peer.push(br#"{"channel":"markets","data":"{"btc_usdt":{"amountScale":4,"priceScale":2}}"}"#.to_vec());
    h.peer.push(br#"{"asks":[[6470.5,0.2],[6469.0,1.1]],"bids":[[6463.0,0.5],[6462.1,2]],"channel":"btcusdt_depth","timestamp":1540447046}"#.to_vec());
    assert!(matches!(
        next_event(&mut h.events).await,
        CanonicalEvent::OrderbookUpdate(update) if update.instrument == btc()
    ));
    assert_eq!(h.gateway.markets().len(), 1);

    let book = h.gateway.orderbook(&btc()).unwrap();
    assert_eq!(book.best_bid().unwrap().price, dec!(6463.0));
    assert_eq!(book.best_ask().unwrap().price, dec!(6469.0));

    // Reader survives malformed and unknown frames
    h.peer.push(b"garbage".to_vec());
    h.peer.push(br#"{"channel":"btcusdt_kline"}"#.to_vec());
    assert!(matches!(
        next_event(&mut h.events).await,
        CanonicalEvent::Error(err) if !err.terminal
    ));
    assert!(h.gateway.is_connected());
}

#[tokio::test]
async fn test_unsubscribe_drops_book() {
    let mut h = connected(None).await;
    let depth = Subscription::for_instrument("btcusdt_depth", btc());
    assert!(h.gateway.subscribe(depth.clone()).await.unwrap());

    h.peer.push(br#"{"asks":[[101,1]],"bids":[[100,1]],"channel":"btcusdt_depth"}"#.to_vec());
    next_event(&mut h.events).await;
    assert!(h.gateway.orderbook(&btc()).is_some());

    h.gateway.unsubscribe(&depth).await.unwrap();
    assert!(h.gateway.orderbook(&btc()).is_none());
    assert!(h.gateway.subscriptions().is_empty());
}

#[tokio::test]
async fn test_shutdown_fails_pending_without_error_event() {
    let mut h = connected(None).await;
    let pending = request_account_info(&h.gateway, Duration::from_secs(30));
    outbound_json(&h.peer).await;

    h.gateway.shutdown().await.unwrap();
    let result = tokio::time::timeout(WAIT, pending).await.unwrap().unwrap();
    assert!(matches!(result, Err(GatewayError::ConnectionClosed(_))));
    no_event(&mut h.events).await;
    assert_eq!(h.peer.close_count(), 1);
}

#[tokio::test]
async fn test_authenticated_request_is_signed() {
    let credentials = Credentials::new("test-key", "test-secret");
    let h = connected(Some(credentials.clone())).await;
    let api = ZbApi::new(Arc::clone(&h.gateway));

    let request = tokio::spawn(async move { api.get_account_info().await });
    let mut command = outbound_json(&h.peer).await;
    assert_eq!(command["accesskey"], "test-key");
    assert_eq!(command["channel"], "getaccountinfo");
    assert_eq!(command["event"], "addChannel");

    let sign = command
        .as_object_mut()
        .unwrap()
        .remove("sign")
        .unwrap();
    let unsigned = serde_json::to_vec(&command).unwrap();
    assert_eq!(
        sign.as_str().unwrap(),
        Signer::new(credentials).sign_bytes(&unsigned).unwrap()
    );

    let no = command["no"].as_u64().unwrap();
    h.peer.push(
        format!(
            r#"{{"success":true,"code":1000,"channel":"getaccountinfo","message":"ok","no":"{}","data":{{"coins":[{{"enName":"BTC","freez":"0.1","available":"1.5","key":"btc"}}],"base":{{"username":"tester","auth_google_enabled":true}}}}}}"#,
            no
        )
        .into_bytes(),
    );

    let info = request.await.unwrap().unwrap();
    assert_eq!(info.coins[0].currency, "BTC");
    assert_eq!(info.coins[0].available, dec!(1.5));
    assert_eq!(info.base.unwrap().username, "tester");
}

#[tokio::test]
async fn test_venue_error_reply() {
    let h = connected(Some(Credentials::new("test-key", "test-secret"))).await;
    let api = ZbApi::new(Arc::clone(&h.gateway));

    let request = tokio::spawn(async move {
        api.cancel_order(&Instrument::parse("LTC/BTC", AssetClass::Spot), 201711133673)
            .await
    });
    let command = outbound_json(&h.peer).await;
    assert_eq!(command["channel"], "ltcbtc_cancelorder");
    assert_eq!(command["id"], 201711133673i64);

    h.peer.push(
        format!(
            r#"{{"success":false,"code":3001,"channel":"ltcbtc_cancelorder","message":"not found","no":"{}"}}"#,
            command["no"].as_u64().unwrap()
        )
        .into_bytes(),
    );
    match request.await.unwrap() {
        Err(GatewayError::Protocol { code, description, .. }) => {
            assert_eq!(code, 3001);
            assert_eq!(description, "Order not found");
        }
        other => panic!("Expected Protocol error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_order_reply_with_wrapped_data() {
    let h = connected(Some(Credentials::new("test-key", "test-secret"))).await;
    let api = ZbApi::new(Arc::clone(&h.gateway));

    let request = tokio::spawn(async move {
        api.submit_order(&btc(), dec!(0.5), dec!(6400), TradeSide::Buy)
            .await
    });
    let command = outbound_json(&h.peer).await;
    assert_eq!(command["channel"], "btcusdt_order");
    assert_eq!(command["tradeType"], 1);
    assert_eq!(command["amount"], "0.5");

    h.peer.push(
        format!(
            r#"{{"code":1000,"channel":"btcusdt_order","message":"ok","no":"{}","data":"{{"entrustId":201711133673}}"}}"#,
            command["no"].as_u64().unwrap()
        )
        .into_bytes(),
    );
    let order = request.await.unwrap().unwrap();
    assert_eq!(order.entrust_id, "201711133673");
}

#[tokio::test]
async fn test_not_authenticated_before_any_io() {
    let h = connected(None).await;
    let api = ZbApi::new(Arc::clone(&h.gateway));

    assert!(matches!(
        api.get_sub_user_list().await,
        Err(GatewayError::NotAuthenticated(_))
    ));
    assert!(h.peer.drain_outbound().await.is_empty());
    assert_eq!(h.gateway.pending_requests(), 0);
}

#[tokio::test]
async fn test_requests_require_connection() {
    let h = harness(None);
    assert!(matches!(
        h.gateway.subscribe_defaults().await,
        Err(GatewayError::NotConnected)
    ));
    assert!(matches!(
        request_account_info(&h.gateway, Duration::from_secs(1)).await.unwrap(),
        Err(GatewayError::NotConnected)
    ));
}
