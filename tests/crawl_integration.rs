//! Crawl adapter tests against stub native libraries implementing the C ABI
//! in-process via `CrawlerLib::from_fns`.

use crypto_crawler::ffi::{MessageCallback, RawMessage};
use crypto_crawler::{CrawlerError, CrawlerLib, MarketType, Message, MessageType};
use std::ffi::CString;
use std::os::raw::{c_char, c_uint};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

fn collector() -> (Arc<Mutex<Vec<Message>>>, impl FnMut(Message) + Send + 'static) {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let handler_sink = Arc::clone(&sink);
    (sink, move |msg| handler_sink.lock().unwrap().push(msg))
}

unsafe extern "C" fn noop_crawl(
    _exchange: *const c_char,
    _market_type: c_uint,
    _symbols: *const *const c_char,
    _num_symbols: c_uint,
    _on_msg: MessageCallback,
    _duration: u64,
) {
}

unsafe extern "C" fn noop_snapshot(
    _exchange: *const c_char,
    _market_type: c_uint,
    _symbols: *const *const c_char,
    _num_symbols: c_uint,
    _on_msg: MessageCallback,
    _interval: u64,
    _duration: u64,
) {
}

/// Replays the caller's own exchange and first-symbol pointers back through
/// the callback, so any truncation or premature release of the argument
/// buffers shows up as corrupted text on the handler side.
unsafe extern "C" fn echo_trade(
    exchange: *const c_char,
    market_type: c_uint,
    symbols: *const *const c_char,
    _num_symbols: c_uint,
    on_msg: MessageCallback,
    duration: u64,
) {
    ECHO_TRADE_DURATION.store(duration, Ordering::SeqCst);
    let json = CString::new(r#"{"price":100}"#).unwrap();
    let raw = RawMessage {
        exchange,
        market_type,
        msg_type: MessageType::Trade.code(),
        symbol: unsafe { *symbols },
        received_at: 1_625_097_600_000,
        json: json.as_ptr(),
    };
    if let Some(cb) = on_msg {
        unsafe { cb(&raw) };
    }
}

static ECHO_TRADE_DURATION: AtomicU64 = AtomicU64::new(u64::MAX);

#[test]
fn crawl_trade_end_to_end_with_stub_library() {
    let lib = CrawlerLib::from_fns(echo_trade, noop_crawl, noop_snapshot, noop_crawl, noop_snapshot);
    let (sink, on_msg) = collector();
    lib.crawl_trade("binance", MarketType::Spot, &["BTCUSDT", "ETHUSDT"], on_msg, 1)
        .unwrap();

    let got = sink.lock().unwrap();
    assert_eq!(got.len(), 1);
    let msg = &got[0];
    assert_eq!(msg.exchange, "binance");
    assert_eq!(msg.market_type, MarketType::Spot);
    assert_eq!(msg.msg_type, MessageType::Trade);
    assert_eq!(msg.symbol.as_deref(), Some("BTCUSDT"));
    assert_eq!(msg.received_at, 1_625_097_600_000);
    assert_eq!(msg.json, r#"{"price":100}"#);
    assert_eq!(ECHO_TRADE_DURATION.load(Ordering::SeqCst), 1);
}

static FOREVER_DURATION: AtomicU64 = AtomicU64::new(u64::MAX);

unsafe extern "C" fn record_duration_l2_event(
    _exchange: *const c_char,
    _market_type: c_uint,
    _symbols: *const *const c_char,
    _num_symbols: c_uint,
    _on_msg: MessageCallback,
    duration: u64,
) {
    // Stands in for the external stop condition of a run-forever crawl.
    FOREVER_DURATION.store(duration, Ordering::SeqCst);
}

#[test]
fn zero_duration_is_forwarded_and_termination_is_left_to_the_library() {
    let lib = CrawlerLib::from_fns(
        noop_crawl,
        record_duration_l2_event,
        noop_snapshot,
        noop_crawl,
        noop_snapshot,
    );
    let (sink, on_msg) = collector();
    lib.crawl_l2_event("kraken", MarketType::Spot, &["XBT/USD"], on_msg, 0)
        .unwrap();
    assert_eq!(FOREVER_DURATION.load(Ordering::SeqCst), 0);
    assert!(sink.lock().unwrap().is_empty());
}

static SNAPSHOT_INTERVAL: AtomicU64 = AtomicU64::new(u64::MAX);
static SNAPSHOT_DURATION: AtomicU64 = AtomicU64::new(u64::MAX);

unsafe extern "C" fn record_interval_l2_snapshot(
    _exchange: *const c_char,
    _market_type: c_uint,
    _symbols: *const *const c_char,
    _num_symbols: c_uint,
    _on_msg: MessageCallback,
    interval: u64,
    duration: u64,
) {
    SNAPSHOT_INTERVAL.store(interval, Ordering::SeqCst);
    SNAPSHOT_DURATION.store(duration, Ordering::SeqCst);
}

#[test]
fn snapshot_interval_is_forwarded_unmodified() {
    let lib = CrawlerLib::from_fns(
        noop_crawl,
        noop_crawl,
        record_interval_l2_snapshot,
        noop_crawl,
        noop_snapshot,
    );
    let (_, on_msg) = collector();
    lib.crawl_l2_snapshot("binance", MarketType::LinearSwap, &["BTCUSDT"], on_msg, 5, 10)
        .unwrap();
    assert_eq!(SNAPSHOT_INTERVAL.load(Ordering::SeqCst), 5);
    assert_eq!(SNAPSHOT_DURATION.load(Ordering::SeqCst), 10);
}

unsafe extern "C" fn bad_then_good_l3_event(
    exchange: *const c_char,
    _market_type: c_uint,
    symbols: *const *const c_char,
    _num_symbols: c_uint,
    on_msg: MessageCallback,
    _duration: u64,
) {
    let json = CString::new("{}").unwrap();
    let cb = on_msg.expect("callback");
    let bad = RawMessage {
        exchange,
        market_type: 999,
        msg_type: MessageType::L3Event.code(),
        symbol: unsafe { *symbols },
        received_at: 1,
        json: json.as_ptr(),
    };
    unsafe { cb(&bad) };
    let good = RawMessage {
        exchange,
        market_type: MarketType::InverseSwap.code(),
        msg_type: MessageType::L3Event.code(),
        symbol: unsafe { *symbols },
        received_at: 2,
        json: json.as_ptr(),
    };
    unsafe { cb(&good) };
}

#[test]
fn undecodable_message_is_skipped_and_reported_after_the_call() {
    let lib = CrawlerLib::from_fns(
        noop_crawl,
        noop_crawl,
        noop_snapshot,
        bad_then_good_l3_event,
        noop_snapshot,
    );
    let (sink, on_msg) = collector();
    let err = lib
        .crawl_l3_event("bitmex", MarketType::InverseSwap, &["XBTUSD"], on_msg, 1)
        .unwrap_err();
    assert!(matches!(
        err,
        CrawlerError::UnknownEnumValue { kind: "market type", code: 999 }
    ));
    // The bad record never reached the handler; the following one did.
    let got = sink.lock().unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].received_at, 2);
}

static BAD_JSON: [u8; 3] = [0xFF, 0xFE, 0x00];

unsafe extern "C" fn invalid_utf8_trade(
    exchange: *const c_char,
    market_type: c_uint,
    symbols: *const *const c_char,
    _num_symbols: c_uint,
    on_msg: MessageCallback,
    _duration: u64,
) {
    let raw = RawMessage {
        exchange,
        market_type,
        msg_type: MessageType::Trade.code(),
        symbol: unsafe { *symbols },
        received_at: 3,
        json: BAD_JSON.as_ptr() as *const c_char,
    };
    if let Some(cb) = on_msg {
        unsafe { cb(&raw) };
    }
}

#[test]
fn invalid_utf8_payload_surfaces_as_malformed() {
    let lib = CrawlerLib::from_fns(
        invalid_utf8_trade,
        noop_crawl,
        noop_snapshot,
        noop_crawl,
        noop_snapshot,
    );
    let (sink, on_msg) = collector();
    let err = lib
        .crawl_trade("binance", MarketType::Spot, &["BTCUSDT"], on_msg, 1)
        .unwrap_err();
    assert!(matches!(err, CrawlerError::MalformedPayload { field: "json", .. }));
    assert!(sink.lock().unwrap().is_empty());
}

struct SendPtr(*const RawMessage);
unsafe impl Send for SendPtr {}

/// Invokes the callback from a thread the caller never sees, as the native
/// library's internal event loop does.
unsafe extern "C" fn foreign_thread_trade(
    exchange: *const c_char,
    market_type: c_uint,
    symbols: *const *const c_char,
    _num_symbols: c_uint,
    on_msg: MessageCallback,
    _duration: u64,
) {
    let json = CString::new(r#"{"seq":1}"#).unwrap();
    let raw = RawMessage {
        exchange,
        market_type,
        msg_type: MessageType::Trade.code(),
        symbol: unsafe { *symbols },
        received_at: 4,
        json: json.as_ptr(),
    };
    let cb = on_msg.expect("callback");
    let ptr = SendPtr(&raw);
    std::thread::spawn(move || {
        // Capture the whole `SendPtr` (which is `Send`), not just its inner
        // raw-pointer field, under edition-2024 precise closure captures.
        let ptr = ptr;
        let SendPtr(p) = ptr;
        unsafe { cb(p) };
    })
    .join()
    .unwrap();
}

#[test]
fn callback_from_a_foreign_thread_reaches_the_handler() {
    let lib = CrawlerLib::from_fns(
        foreign_thread_trade,
        noop_crawl,
        noop_snapshot,
        noop_crawl,
        noop_snapshot,
    );
    let (sink, on_msg) = collector();
    lib.crawl_trade("okx", MarketType::LinearSwap, &["BTC-USDT-SWAP"], on_msg, 1)
        .unwrap();
    let got = sink.lock().unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].exchange, "okx");
    assert_eq!(got[0].symbol.as_deref(), Some("BTC-USDT-SWAP"));
}

unsafe extern "C" fn three_messages_trade(
    exchange: *const c_char,
    market_type: c_uint,
    symbols: *const *const c_char,
    _num_symbols: c_uint,
    on_msg: MessageCallback,
    _duration: u64,
) {
    let cb = on_msg.expect("callback");
    for received_at in 1..=3u64 {
        let json = CString::new(format!(r#"{{"n":{received_at}}}"#)).unwrap();
        let raw = RawMessage {
            exchange,
            market_type,
            msg_type: MessageType::Trade.code(),
            symbol: unsafe { *symbols },
            received_at,
            json: json.as_ptr(),
        };
        unsafe { cb(&raw) };
    }
}

#[test]
fn messages_are_delivered_in_native_order() {
    let lib = CrawlerLib::from_fns(
        three_messages_trade,
        noop_crawl,
        noop_snapshot,
        noop_crawl,
        noop_snapshot,
    );
    let (sink, on_msg) = collector();
    lib.crawl_trade("binance", MarketType::Spot, &["BTCUSDT"], on_msg, 1)
        .unwrap();
    let got = sink.lock().unwrap();
    assert_eq!(got.len(), 3);
    assert_eq!(
        got.iter().map(|m| m.received_at).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

static NATIVE_CALLED: AtomicBool = AtomicBool::new(false);

unsafe extern "C" fn flagging_crawl(
    _exchange: *const c_char,
    _market_type: c_uint,
    _symbols: *const *const c_char,
    _num_symbols: c_uint,
    _on_msg: MessageCallback,
    _duration: u64,
) {
    NATIVE_CALLED.store(true, Ordering::SeqCst);
}

unsafe extern "C" fn flagging_snapshot(
    _exchange: *const c_char,
    _market_type: c_uint,
    _symbols: *const *const c_char,
    _num_symbols: c_uint,
    _on_msg: MessageCallback,
    _interval: u64,
    _duration: u64,
) {
    NATIVE_CALLED.store(true, Ordering::SeqCst);
}

#[test]
fn invalid_arguments_fail_before_any_native_call() {
    let lib = CrawlerLib::from_fns(
        flagging_crawl,
        flagging_crawl,
        flagging_snapshot,
        flagging_crawl,
        flagging_snapshot,
    );

    let empty: [&str; 0] = [];
    let err = lib
        .crawl_trade("binance", MarketType::Spot, &empty, |_| {}, 0)
        .unwrap_err();
    assert!(matches!(err, CrawlerError::InvalidArgument(_)));

    let err = lib
        .crawl_l2_event("", MarketType::Spot, &["BTCUSDT"], |_| {}, 0)
        .unwrap_err();
    assert!(matches!(err, CrawlerError::InvalidArgument(_)));

    let err = lib
        .crawl_l2_snapshot("binance", MarketType::Spot, &["BTCUSDT"], |_| {}, 0, 0)
        .unwrap_err();
    assert!(matches!(err, CrawlerError::InvalidArgument(_)));

    assert!(!NATIVE_CALLED.load(Ordering::SeqCst));
}

#[test]
fn handler_panic_resurfaces_on_the_calling_thread() {
    let lib = CrawlerLib::from_fns(echo_trade, noop_crawl, noop_snapshot, noop_crawl, noop_snapshot);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        lib.crawl_trade(
            "binance",
            MarketType::Spot,
            &["BTCUSDT", "ETHUSDT"],
            |_| panic!("handler exploded"),
            1,
        )
    }));
    assert!(result.is_err());
}
