use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use crossbeam_channel::{Receiver, bounded};
use crypto_crawler::record::{
    CAPTURE_VERSION, CaptureFrame, FileHeader, MessageRecord, write_frame,
};
use crypto_crawler::{CrawlerLib, MarketType, Message};
use dotenvy::dotenv;
use std::fs::{self, OpenOptions};
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CrawlOp {
    Trade,
    L2Event,
    L2Snapshot,
    L3Event,
    L3Snapshot,
}

impl CrawlOp {
    fn as_str(self) -> &'static str {
        match self {
            CrawlOp::Trade => "trade",
            CrawlOp::L2Event => "l2_event",
            CrawlOp::L2Snapshot => "l2_snapshot",
            CrawlOp::L3Event => "l3_event",
            CrawlOp::L3Snapshot => "l3_snapshot",
        }
    }
}

impl std::fmt::Display for CrawlOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // clap's value names, kebab-cased by the ValueEnum derive.
        f.write_str(match self {
            CrawlOp::Trade => "trade",
            CrawlOp::L2Event => "l2-event",
            CrawlOp::L2Snapshot => "l2-snapshot",
            CrawlOp::L3Event => "l3-event",
            CrawlOp::L3Snapshot => "l3-snapshot",
        })
    }
}

#[derive(Debug, Parser)]
#[command(version, about = "Record crypto market data via the native crawler library")]
struct Args {
    /// Path to the native crawler library; platform default name when omitted
    #[arg(long, env = "CRAWLER_LIB")]
    lib: Option<PathBuf>,

    /// Crawl operation
    #[arg(long, value_enum, default_value_t = CrawlOp::Trade)]
    op: CrawlOp,

    /// Exchange name (e.g., binance)
    #[arg(long, env = "EXCHANGE")]
    exchange: String,

    /// Market type (e.g., spot, linear_swap)
    #[arg(long, env = "MARKET_TYPE", default_value = "spot")]
    market_type: MarketType,

    /// Instrument symbols, comma separated
    #[arg(long, env = "SYMBOLS", value_delimiter = ',', required = true)]
    symbols: Vec<String>,

    /// Snapshot polling interval in seconds (snapshot operations only)
    #[arg(long, default_value_t = 60)]
    interval: u64,

    /// Run duration in seconds; 0 runs until externally stopped
    #[arg(long, default_value_t = 0)]
    duration: u64,

    /// Output file path (.bin); defaults to captures/EXCHANGE_OP_YYYY_MM_DD.bin
    #[arg(long, env = "OUT_FILE")]
    out: Option<PathBuf>,
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn writer_thread(out: PathBuf, rx: Receiver<CaptureFrame>) -> Result<()> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).ok();
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&out)
        .with_context(|| format!("open {}", out.display()))?;
    let mut w = BufWriter::with_capacity(1 << 20, file); // 1 MiB buffer
    for frame in rx.iter() {
        write_frame(&mut w, &frame)?;
        // Keep the file current whenever the feed goes quiet, so an
        // interrupt loses at most the frames still in the channel.
        if rx.is_empty() {
            std::io::Write::flush(&mut w)?;
        }
    }
    std::io::Write::flush(&mut w)?;
    Ok(())
}

fn default_out_path(exchange: &str, op: CrawlOp) -> PathBuf {
    let date = time::OffsetDateTime::now_utc().date();
    let fname = format!(
        "{}_{}_{}_{:02}_{:02}.bin",
        exchange.to_uppercase(),
        op.as_str(),
        date.year(),
        date.month() as u8,
        date.day()
    );
    let mut p = PathBuf::from("captures");
    p.push(fname);
    p
}

fn main() -> Result<()> {
    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let lib = match &args.lib {
        Some(path) => CrawlerLib::load(path),
        None => CrawlerLib::load_default(),
    }
    .context("load native crawler library")?;

    let out_path = args
        .out
        .clone()
        .unwrap_or_else(|| default_out_path(&args.exchange, args.op));
    info!(out = %out_path.display(), op = args.op.as_str(), exchange = %args.exchange, "recording");

    let (tx, rx) = bounded::<CaptureFrame>(8192);
    let writer_out = out_path.clone();
    let writer = std::thread::spawn(move || writer_thread(writer_out, rx));

    tx.send(CaptureFrame::Header(FileHeader {
        version: CAPTURE_VERSION,
        created_unix_ms: now_unix_ms(),
        exchange: args.exchange.clone(),
        market_type: args.market_type,
        operation: args.op.as_str().to_string(),
        symbols: args.symbols.clone(),
    }))
    .ok();

    // The crawl call blocks below; the native library enforces the duration.
    // On Ctrl+C the writer has already flushed everything it drained.
    ctrlc::set_handler(|| {
        info!("interrupt received, stopping");
        std::process::exit(130);
    })
    .ok();

    let msg_tx = tx.clone();
    let mut seq = 0u64;
    let on_msg = move |msg: Message| {
        let record = MessageRecord { seq, recv_unix_ms: now_unix_ms(), msg };
        seq += 1;
        if msg_tx.send(CaptureFrame::Message(record)).is_err() {
            warn!("capture writer is gone, dropping message");
        }
    };

    let crawl_result = match args.op {
        CrawlOp::Trade => lib.crawl_trade(
            &args.exchange,
            args.market_type,
            &args.symbols,
            on_msg,
            args.duration,
        ),
        CrawlOp::L2Event => lib.crawl_l2_event(
            &args.exchange,
            args.market_type,
            &args.symbols,
            on_msg,
            args.duration,
        ),
        CrawlOp::L2Snapshot => lib.crawl_l2_snapshot(
            &args.exchange,
            args.market_type,
            &args.symbols,
            on_msg,
            args.interval,
            args.duration,
        ),
        CrawlOp::L3Event => lib.crawl_l3_event(
            &args.exchange,
            args.market_type,
            &args.symbols,
            on_msg,
            args.duration,
        ),
        CrawlOp::L3Snapshot => lib.crawl_l3_snapshot(
            &args.exchange,
            args.market_type,
            &args.symbols,
            on_msg,
            args.interval,
            args.duration,
        ),
    };

    drop(tx);
    match writer.join() {
        Ok(r) => r.context("capture writer")?,
        Err(_) => bail!("capture writer panicked"),
    }
    crawl_result.context("crawl call failed")?;
    info!(out = %out_path.display(), "capture complete");
    Ok(())
}
