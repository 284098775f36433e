use anyhow::{Context, Result};
use clap::Parser;
use crypto_crawler::record::{CaptureFrame, read_frame};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(about = "Play back a recorded capture file")]
struct Args {
    /// Input capture file to read (.bin)
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Print each message as a JSON line
    #[arg(long, default_value_t = false)]
    print: bool,

    /// Only print messages for this symbol
    #[arg(long)]
    symbol: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut r = BufReader::new(
        File::open(&args.input).with_context(|| format!("open {}", args.input.display()))?,
    );

    let mut frames = 0usize;
    let mut counts: BTreeMap<&'static str, u64> = BTreeMap::new();
    while let Some(frame) = read_frame(&mut r).with_context(|| format!("frame {frames}"))? {
        frames += 1;
        match frame {
            CaptureFrame::Header(h) => {
                eprintln!(
                    "Header: v{} {} {} op={} symbols={:?} created={}ms",
                    h.version, h.exchange, h.market_type, h.operation, h.symbols, h.created_unix_ms
                );
            }
            CaptureFrame::Message(rec) => {
                *counts.entry(rec.msg.msg_type.as_str()).or_insert(0) += 1;
                let wanted = match &args.symbol {
                    Some(s) => rec.msg.symbol.as_deref() == Some(s.as_str()),
                    None => true,
                };
                if args.print && wanted {
                    println!("{}", rec.msg);
                }
            }
        }
    }

    eprintln!("Read {frames} frames.");
    for (msg_type, count) in &counts {
        eprintln!("  {msg_type}: {count}");
    }
    Ok(())
}
