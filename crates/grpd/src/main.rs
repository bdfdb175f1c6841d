//! grpd - per-window keyboard layout group daemon
//!
//! Reads focus events from stdin, remembers the layout group per window
//! title and writes `lock <group>` commands to stdout. Logs go to stderr.

mod event;
mod keyboard;
mod store;
mod tracker;

use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use grpcache::GroupCache;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{error, info, warn};

use crate::event::Event;
use crate::keyboard::{Keyboard, LineKeyboard};
use crate::store::{FileStore, MemoryStore, PropertyStore};
use crate::tracker::{FocusTracker, PER_WINDOW_CACHE_SIZE};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Property store file; state is kept in memory only when omitted
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Cache capacity per window (number of titles)
    #[arg(short, long, default_value_t = PER_WINDOW_CACHE_SIZE)]
    capacity: u32,

    /// Fixed hash seed for new caches (decimal or 0x hex)
    #[arg(long, value_parser = parse_seed)]
    seed: Option<u64>,

    /// Display session the stored caches belong to [default: $DISPLAY]
    ///
    /// Window ids are recycled when the display server restarts; pass an id
    /// that changes with the server (e.g. its start time) to drop stale caches.
    #[arg(long)]
    session: Option<String>,

    /// Layout group in effect at startup
    #[arg(short, long, default_value_t = 0)]
    group: u8,

    /// Validate every cache in the store file and exit
    #[arg(long, requires = "store")]
    check: bool,
}

fn parse_seed(s: &str) -> Result<u64, String> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|e| format!("invalid seed '{}': {}", s, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; stdout carries lock commands
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.check {
        let path = args.store.as_ref().context("--check needs --store")?;
        let ok = check_store(&FileStore::open(path, None)?);
        std::process::exit(if ok { 0 } else { 1 });
    }

    info!("Starting grpd v{}", env!("CARGO_PKG_VERSION"));
    info!("Cache capacity: {}", args.capacity);

    let keyboard = LineKeyboard::new(std::io::stdout(), args.group);
    let input = BufReader::new(tokio::io::stdin());
    let mut signals = ShutdownSignals::install()?;
    match &args.store {
        Some(path) => {
            let session = session_id(args.session.clone());
            let store = FileStore::open(path, Some(&session))?;
            info!(
                "Property store: {:?} (session {})",
                store.path(),
                store.session().unwrap_or_default()
            );
            let mut tracker = FocusTracker::new(store, keyboard, args.capacity, args.seed)?;
            run(&mut tracker, input, signals.recv()).await
        }
        None => {
            info!("Property store: in-memory");
            let store = MemoryStore::new();
            let mut tracker = FocusTracker::new(store, keyboard, args.capacity, args.seed)?;
            run(&mut tracker, input, signals.recv()).await
        }
    }
}

/// Explicit `--session`, else `$DISPLAY`
fn session_id(explicit: Option<String>) -> String {
    explicit
        .or_else(|| std::env::var("DISPLAY").ok())
        .unwrap_or_else(|| "default".to_string())
}

/// SIGINT and SIGTERM listeners, registered once for the whole run
///
/// A signal that lands while an event is being handled stays pending until
/// the next `recv`.
struct ShutdownSignals {
    sigint: Signal,
    sigterm: Signal,
}

impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?,
            sigterm: signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?,
        })
    }

    /// Wait for either signal; returns its name
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
        }
    }
}

/// Feed `input` to the tracker until EOF or `shutdown` resolves, then persist
///
/// Store access is synchronous file I/O; it runs under `block_in_place`, so
/// this needs the multi-threaded runtime.
async fn run<S, K, R, F>(tracker: &mut FocusTracker<S, K>, input: R, shutdown: F) -> Result<()>
where
    S: PropertyStore,
    K: Keyboard,
    R: AsyncBufRead + Unpin,
    F: Future<Output = &'static str>,
{
    let mut lines = input.lines();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("Failed to read event stream")? {
                Some(line) => tokio::task::block_in_place(|| handle_line(tracker, &line)),
                None => {
                    info!("Event stream closed");
                    break;
                }
            },
            name = &mut shutdown => {
                info!("Caught {}, cleaning up and exiting...", name);
                break;
            }
        }
    }

    tokio::task::block_in_place(|| tracker.shutdown())
}

fn handle_line<S: PropertyStore, K: Keyboard>(tracker: &mut FocusTracker<S, K>, line: &str) {
    match Event::parse(line) {
        Ok(Some(event)) => {
            if let Err(e) = tracker.handle(event) {
                error!("Error handling event: {:#}", e);
            }
        }
        Ok(None) => {}
        Err(e) => warn!("Parse error: {:#}", e),
    }
}

/// Decode every stored cache, reporting each; true when all are valid
fn check_store(store: &FileStore) -> bool {
    let entries = store.entries();
    let mut valid = 0;

    for (window, blob) in &entries {
        match GroupCache::decode(blob) {
            Ok(cache) => {
                valid += 1;
                println!(
                    "{:#x}: {}/{} entries, seed {:#x}",
                    window,
                    cache.len(),
                    cache.capacity(),
                    cache.seed()
                );
            }
            Err(e) => println!("{:#x}: INVALID ({})", window, e),
        }
    }

    println!(
        "{}: {} of {} window caches valid",
        store.path().display(),
        valid,
        entries.len()
    );
    valid == entries.len()
}
