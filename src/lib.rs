//! Binding layer over the native crypto market-data crawler library.
//!
//! This crate marshals blocking crawl requests (exchange, market type,
//! symbols, handler, duration) into calls against the dynamically loaded
//! `crypto_crawler_ffi` library and decodes each native message record into
//! a [`Message`] delivered to the caller's handler. All crawling logic --
//! connections, protocol parsing, reconnection -- lives in the native
//! library; this layer only translates types across the boundary.
//!
//! - `ffi`: raw ABI declarations mirroring the native header
//! - `message`: `MarketType`/`MessageType` mappings and the decoded message
//! - `native`: `libloading`-based loader for the crawl entry points
//! - `crawler`: the five blocking crawl adapters on [`CrawlerLib`]
//! - `record`: capture file schema used by the recorder and player binaries
//!
//! Crawl calls block the invoking thread until the native loop terminates
//! and are serialized process-wide; see the `crawler` module docs.

pub mod error;
pub mod ffi;
pub mod message;
pub mod native;
pub mod record;

mod crawler;

pub use error::{CrawlerError, Result};
pub use message::{MarketType, Message, MessageType};
pub use native::CrawlerLib;
