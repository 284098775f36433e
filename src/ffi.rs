//! # Raw ABI of the native crawler library
//!
//! Rust declarations for the message record, callback type and crawl entry
//! points exported by the `crypto_crawler_ffi` dynamic library.
//!
//! ## Notes
//! - All exported functions use the C calling convention.
//! - Text fields are nul-terminated UTF-8 `char*`. The library owns every
//!   pointer it passes to the callback; they are valid only for the duration
//!   of that callback invocation and must be copied out before returning.
//! - `MarketType`/`MessageType` are C enums. Their integer codes follow the
//!   declaration order of the native header (0-based) and are mirrored by
//!   the discriminants in [`crate::message`]; they are never assigned here
//!   independently.
//! - `duration` and `interval` are in seconds. `duration == 0` means run
//!   until the library decides to stop.

use std::os::raw::{c_char, c_uint};

/// Message record delivered to the crawl callback, field-for-field as laid
/// out by the native header.
#[repr(C)]
pub struct RawMessage {
    pub exchange: *const c_char,
    pub market_type: c_uint,
    pub msg_type: c_uint,
    pub symbol: *const c_char,
    /// Milliseconds since the Unix epoch, stamped by the native crawler.
    pub received_at: u64,
    pub json: *const c_char,
}

/// Callback invoked by the native library once per received message.
/// `Option` allows passing a NULL function pointer.
pub type MessageCallback = Option<unsafe extern "C" fn(msg: *const RawMessage)>;

/// Signature of `crawl_trade`, `crawl_l2_event` and `crawl_l3_event`.
pub type CrawlFn = unsafe extern "C" fn(
    exchange: *const c_char,
    market_type: c_uint,
    symbols: *const *const c_char,
    num_symbols: c_uint,
    on_msg: MessageCallback,
    duration: u64,
);

/// Signature of `crawl_l2_snapshot` and `crawl_l3_snapshot`, which take a
/// polling interval before the duration.
pub type CrawlSnapshotFn = unsafe extern "C" fn(
    exchange: *const c_char,
    market_type: c_uint,
    symbols: *const *const c_char,
    num_symbols: c_uint,
    on_msg: MessageCallback,
    interval: u64,
    duration: u64,
);
