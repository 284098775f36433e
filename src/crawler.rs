//! Blocking crawl adapters over the native library.
//!
//! Each operation validates its arguments, encodes them into owned C
//! buffers, installs the caller's handler behind the callback trampoline
//! and invokes the native entry point. The call blocks the invoking thread
//! until the native crawl loop terminates (requested duration elapsed, or a
//! stop condition the native library defines); offload it to a thread if
//! non-blocking behavior is needed.
//!
//! The native callback carries no user-data pointer, so a single trampoline
//! and a single active-call slot serve the whole process: crawl calls are
//! serialized, and a handler must not start another crawl call (it would
//! deadlock on the call lock).
//!
//! Messages are forwarded to the handler synchronously, in native order, on
//! whatever thread the native library calls back from. A record that fails
//! to decode is skipped and logged; the first such error is returned once
//! the crawl call finishes. The binding has no way to abort the native loop
//! mid-call, so decode failures never cut a crawl short.

use crate::error::{CrawlerError, Result};
use crate::ffi;
use crate::message::{MarketType, Message, MessageType};
use crate::native::CrawlerLib;
use once_cell::sync::Lazy;
use std::any::Any;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_uint};
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Serializes crawl calls process-wide.
static CALL_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Handler state for the crawl call currently inside the native library.
static ACTIVE: Lazy<Mutex<Option<ActiveCall>>> = Lazy::new(|| Mutex::new(None));

struct ActiveCall {
    handler: Box<dyn FnMut(Message) + Send>,
    first_error: Option<CrawlerError>,
    panic: Option<Box<dyn Any + Send>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Owned, encoded argument buffers for one native call.
///
/// The native side receives pointers, not copies, so everything here must
/// outlive the call; constructing this struct before the call and dropping
/// it after the call returns makes premature release impossible.
#[derive(Debug)]
struct CallArgs {
    exchange: CString,
    _symbols: Vec<CString>,
    symbol_ptrs: Vec<*const c_char>,
}

impl CallArgs {
    fn new<S: AsRef<str>>(exchange: &str, symbols: &[S]) -> Result<Self> {
        if exchange.is_empty() {
            return Err(CrawlerError::InvalidArgument(
                "exchange name must not be empty".to_string(),
            ));
        }
        if symbols.is_empty() {
            return Err(CrawlerError::InvalidArgument(
                "symbol list must not be empty".to_string(),
            ));
        }
        let exchange = CString::new(exchange).map_err(|_| {
            CrawlerError::InvalidArgument("exchange name contains a NUL byte".to_string())
        })?;
        let mut encoded = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let symbol = symbol.as_ref();
            if symbol.is_empty() {
                return Err(CrawlerError::InvalidArgument(
                    "symbols must not be empty".to_string(),
                ));
            }
            encoded.push(CString::new(symbol).map_err(|_| {
                CrawlerError::InvalidArgument(format!("symbol {symbol:?} contains a NUL byte"))
            })?);
        }
        let symbol_ptrs: Vec<*const c_char> = encoded.iter().map(|s| s.as_ptr()).collect();
        Ok(Self { exchange, _symbols: encoded, symbol_ptrs })
    }

    fn num_symbols(&self) -> c_uint {
        self.symbol_ptrs.len() as c_uint
    }
}

/// # Safety
/// `ptr` must be null or point to a nul-terminated string valid for the
/// duration of the call.
unsafe fn required_text(ptr: *const c_char, field: &'static str) -> Result<String> {
    if ptr.is_null() {
        return Err(CrawlerError::MalformedPayload {
            field,
            reason: "null pointer".to_string(),
        });
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(str::to_owned)
        .map_err(|e| CrawlerError::MalformedPayload { field, reason: e.to_string() })
}

/// Decode a native message record into an owned [`Message`].
///
/// Copies every field out of native memory; no reference into the record
/// survives the call. The `json` payload is decoded as UTF-8 and otherwise
/// passed through untouched.
///
/// # Safety
/// The record's pointer fields must be null or point to nul-terminated
/// strings valid for the duration of the call.
unsafe fn decode_message(raw: &ffi::RawMessage) -> Result<Message> {
    let exchange = unsafe { required_text(raw.exchange, "exchange") }?;
    let market_type = MarketType::from_code(raw.market_type)?;
    let msg_type = MessageType::from_code(raw.msg_type)?;
    let symbol = if raw.symbol.is_null() {
        None
    } else {
        Some(unsafe { required_text(raw.symbol, "symbol") }?).filter(|s| !s.is_empty())
    };
    let json = unsafe { required_text(raw.json, "json") }?;
    Ok(Message {
        exchange,
        market_type,
        msg_type,
        symbol,
        received_at: raw.received_at,
        json,
    })
}

/// Callback registered with the native library. Runs on a native-managed
/// thread; decodes and forwards, nothing else.
unsafe extern "C" fn trampoline(raw: *const ffi::RawMessage) {
    if raw.is_null() {
        return;
    }
    let decoded = unsafe { decode_message(&*raw) };
    let mut slot = lock(&ACTIVE);
    let Some(call) = slot.as_mut() else {
        return;
    };
    if call.panic.is_some() {
        return;
    }
    match decoded {
        Ok(msg) => {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| (call.handler)(msg))) {
                call.panic = Some(payload);
            }
        }
        Err(err) => {
            warn!(error = %err, "skipping undecodable native message");
            if call.first_error.is_none() {
                call.first_error = Some(err);
            }
        }
    }
}

fn install_handler<F>(on_msg: F) -> MutexGuard<'static, ()>
where
    F: FnMut(Message) + Send + 'static,
{
    let serial = lock(&CALL_LOCK);
    *lock(&ACTIVE) = Some(ActiveCall {
        handler: Box::new(on_msg),
        first_error: None,
        panic: None,
    });
    serial
}

fn finish_call(serial: MutexGuard<'static, ()>) -> Result<()> {
    let finished = lock(&ACTIVE).take();
    drop(serial);
    let Some(finished) = finished else {
        return Ok(());
    };
    drop(finished.handler);
    if let Some(payload) = finished.panic {
        resume_unwind(payload);
    }
    match finished.first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

impl CrawlerLib {
    fn run<S, F>(
        &self,
        op: ffi::CrawlFn,
        name: &'static str,
        exchange: &str,
        market_type: MarketType,
        symbols: &[S],
        on_msg: F,
        duration: u64,
    ) -> Result<()>
    where
        S: AsRef<str>,
        F: FnMut(Message) + Send + 'static,
    {
        let args = CallArgs::new(exchange, symbols)?;
        debug!(op = name, exchange, %market_type, num_symbols = args.num_symbols(), duration, "starting crawl call");
        let serial = install_handler(on_msg);
        unsafe {
            op(
                args.exchange.as_ptr(),
                market_type.code(),
                args.symbol_ptrs.as_ptr(),
                args.num_symbols(),
                Some(trampoline),
                duration,
            );
        }
        let result = finish_call(serial);
        drop(args);
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn run_snapshot<S, F>(
        &self,
        op: ffi::CrawlSnapshotFn,
        name: &'static str,
        exchange: &str,
        market_type: MarketType,
        symbols: &[S],
        on_msg: F,
        interval: u64,
        duration: u64,
    ) -> Result<()>
    where
        S: AsRef<str>,
        F: FnMut(Message) + Send + 'static,
    {
        if interval == 0 {
            return Err(CrawlerError::InvalidArgument(
                "snapshot interval must be positive".to_string(),
            ));
        }
        let args = CallArgs::new(exchange, symbols)?;
        debug!(op = name, exchange, %market_type, num_symbols = args.num_symbols(), interval, duration, "starting crawl call");
        let serial = install_handler(on_msg);
        unsafe {
            op(
                args.exchange.as_ptr(),
                market_type.code(),
                args.symbol_ptrs.as_ptr(),
                args.num_symbols(),
                Some(trampoline),
                interval,
                duration,
            );
        }
        let result = finish_call(serial);
        drop(args);
        result
    }

    /// Crawl tick-by-tick trades. Blocks for `duration` seconds (0 = until
    /// the native library stops on its own).
    pub fn crawl_trade<S, F>(
        &self,
        exchange: &str,
        market_type: MarketType,
        symbols: &[S],
        on_msg: F,
        duration: u64,
    ) -> Result<()>
    where
        S: AsRef<str>,
        F: FnMut(Message) + Send + 'static,
    {
        self.run(self.crawl_trade, "crawl_trade", exchange, market_type, symbols, on_msg, duration)
    }

    /// Crawl level-2 order book incremental updates.
    pub fn crawl_l2_event<S, F>(
        &self,
        exchange: &str,
        market_type: MarketType,
        symbols: &[S],
        on_msg: F,
        duration: u64,
    ) -> Result<()>
    where
        S: AsRef<str>,
        F: FnMut(Message) + Send + 'static,
    {
        self.run(
            self.crawl_l2_event,
            "crawl_l2_event",
            exchange,
            market_type,
            symbols,
            on_msg,
            duration,
        )
    }

    /// Crawl level-2 order book snapshots, polled every `interval` seconds.
    pub fn crawl_l2_snapshot<S, F>(
        &self,
        exchange: &str,
        market_type: MarketType,
        symbols: &[S],
        on_msg: F,
        interval: u64,
        duration: u64,
    ) -> Result<()>
    where
        S: AsRef<str>,
        F: FnMut(Message) + Send + 'static,
    {
        self.run_snapshot(
            self.crawl_l2_snapshot,
            "crawl_l2_snapshot",
            exchange,
            market_type,
            symbols,
            on_msg,
            interval,
            duration,
        )
    }

    /// Crawl level-3 order book incremental updates.
    pub fn crawl_l3_event<S, F>(
        &self,
        exchange: &str,
        market_type: MarketType,
        symbols: &[S],
        on_msg: F,
        duration: u64,
    ) -> Result<()>
    where
        S: AsRef<str>,
        F: FnMut(Message) + Send + 'static,
    {
        self.run(
            self.crawl_l3_event,
            "crawl_l3_event",
            exchange,
            market_type,
            symbols,
            on_msg,
            duration,
        )
    }

    /// Crawl level-3 order book snapshots, polled every `interval` seconds.
    pub fn crawl_l3_snapshot<S, F>(
        &self,
        exchange: &str,
        market_type: MarketType,
        symbols: &[S],
        on_msg: F,
        interval: u64,
        duration: u64,
    ) -> Result<()>
    where
        S: AsRef<str>,
        F: FnMut(Message) + Send + 'static,
    {
        self.run_snapshot(
            self.crawl_l3_snapshot,
            "crawl_l3_snapshot",
            exchange,
            market_type,
            symbols,
            on_msg,
            interval,
            duration,
        )
    }
}
