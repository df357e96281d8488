//! Core B entry point: subscribe, validate, archive.
//!
//! The message-queue transport is external; this binary consumes
//! length-prefixed compressed frames on standard input (4-byte big-endian
//! frame length, then the gzip- or zlib-compressed XML body) and turns them
//! into Parquet chunks plus sidecars in the working directory. SIGINT and
//! SIGTERM finish the in-flight payload, flush the partial chunk and exit.

use anyhow::Context;
use oeuf::kv6::ingest::{self, PayloadSource};
use oeuf::metrics::PrometheusMetrics;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

struct StdinFrameSource {
    stdin: io::StdinLock<'static>,
}

impl StdinFrameSource {
    // read_exact would swallow the interruption a termination signal causes;
    // this variant surfaces it so the receive loop can observe the flag.
    fn read_full(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdin.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) => return Err(err),
            }
        }
        Ok(filled)
    }
}

impl PayloadSource for StdinFrameSource {
    fn recv(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut len = [0u8; 4];
        match self.read_full(&mut len)? {
            0 => return Ok(None),
            4 => {}
            _ => return Err(io::ErrorKind::UnexpectedEof.into()),
        }
        let mut frame = vec![0u8; u32::from_be_bytes(len) as usize];
        if self.read_full(&mut frame)? != frame.len() {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        ingest::decompress(&frame).map(Some)
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let metrics_addr = std::env::var("METRICS_ADDR")
        .ok()
        .filter(|v| !v.is_empty())
        .context("METRICS_ADDR must be set")?;
    let metrics_addr: SocketAddr = metrics_addr
        .parse()
        .context("METRICS_ADDR must be a socket address")?;

    let production = std::env::var("NDOV_PRODUCTION").is_ok_and(|v| v == "true");
    log::info!(
        "subscription endpoint {} topic {}; metrics on {metrics_addr}",
        ingest::subscription_endpoint(production),
        ingest::SUBSCRIPTION_TOPIC
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown))?;

    let metrics = PrometheusMetrics::new()?;
    let out_dir = std::env::current_dir()?;
    log::info!("writing chunks to {}", out_dir.display());

    let mut source = StdinFrameSource {
        stdin: io::stdin().lock(),
    };
    ingest::run(&mut source, &out_dir, &metrics, shutdown.as_ref());

    log::info!("bye");
    Ok(())
}
