//! Dynamic loader for the native crawler library.
//!
//! Binds the five crawl entry points with `libloading` at runtime. The
//! `Library` handle is kept alive next to the resolved function pointers so
//! the symbols stay valid for the lifetime of the wrapper.

use crate::error::Result;
use crate::ffi::{CrawlFn, CrawlSnapshotFn};
use libloading::{Library, Symbol};
use std::path::Path;

/// Base name of the native library; resolved to the platform file name
/// (`libcrypto_crawler_ffi.so`, `.dylib`, `.dll`) by [`CrawlerLib::load_default`].
pub const NATIVE_LIB_NAME: &str = "crypto_crawler_ffi";

/// Thin wrapper holding function pointers resolved from the native crawler
/// library.
pub struct CrawlerLib {
    _lib: Option<Library>,
    pub crawl_trade: CrawlFn,
    pub crawl_l2_event: CrawlFn,
    pub crawl_l2_snapshot: CrawlSnapshotFn,
    pub crawl_l3_event: CrawlFn,
    pub crawl_l3_snapshot: CrawlSnapshotFn,
}

impl CrawlerLib {
    /// Load the native library from `path` and resolve the crawl symbols.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        unsafe {
            let lib = Library::new(path.as_ref().as_os_str())?;
            let crawl_trade: Symbol<CrawlFn> = lib.get(b"crawl_trade\0")?;
            let crawl_l2_event: Symbol<CrawlFn> = lib.get(b"crawl_l2_event\0")?;
            let crawl_l2_snapshot: Symbol<CrawlSnapshotFn> = lib.get(b"crawl_l2_snapshot\0")?;
            let crawl_l3_event: Symbol<CrawlFn> = lib.get(b"crawl_l3_event\0")?;
            let crawl_l3_snapshot: Symbol<CrawlSnapshotFn> = lib.get(b"crawl_l3_snapshot\0")?;

            Ok(Self {
                crawl_trade: *crawl_trade,
                crawl_l2_event: *crawl_l2_event,
                crawl_l2_snapshot: *crawl_l2_snapshot,
                crawl_l3_event: *crawl_l3_event,
                crawl_l3_snapshot: *crawl_l3_snapshot,
                _lib: Some(lib),
            })
        }
    }

    /// Load the native library by its platform-conventional file name from
    /// the default library search path.
    pub fn load_default() -> Result<Self> {
        Self::load(libloading::library_filename(NATIVE_LIB_NAME))
    }

    /// Build a wrapper from already-resolved function pointers.
    ///
    /// Intended for stub libraries and replay harnesses that implement the
    /// crawl ABI in-process instead of behind `dlopen`.
    pub fn from_fns(
        crawl_trade: CrawlFn,
        crawl_l2_event: CrawlFn,
        crawl_l2_snapshot: CrawlSnapshotFn,
        crawl_l3_event: CrawlFn,
        crawl_l3_snapshot: CrawlSnapshotFn,
    ) -> Self {
        Self {
            _lib: None,
            crawl_trade,
            crawl_l2_event,
            crawl_l2_snapshot,
            crawl_l3_event,
            crawl_l3_snapshot,
        }
    }
}
