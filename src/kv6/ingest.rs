//! The long-running KV6 ingest: payload in, chunked Parquet out.
//!
//! The transport is abstracted behind [`PayloadSource`]; whatever is on the
//! other side (the NDOV ZeroMQ feed in production) hands over decompressed
//! XML payloads one at a time. Payloads are parsed, valid records buffered,
//! and the buffer flushed as a columnar chunk when it reaches
//! [`MAX_CHUNK`](super::parquet::MAX_CHUNK) rows or, at an envelope
//! boundary, when five minutes have passed since the last flush. Payloads
//! with problems are dumped alongside the data for post-mortems.

use crate::kv6::model::Kv6Record;
use crate::kv6::parquet::{self, MAX_CHUNK};
use crate::kv6::parser;
use crate::metrics::{self, MetricsSink};
use crate::sidecar::ChunkMeta;
use chrono::Utc;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Production and best-effort NDOV subscription endpoints, selected by the
/// `NDOV_PRODUCTION` environment variable.
pub const PRODUCTION_ENDPOINT: &str = "tcp://pubsub.ndovloket.nl:7658";
pub const BEST_EFFORT_ENDPOINT: &str = "tcp://pubsub.besteffort.ndovloket.nl:7658";
pub const SUBSCRIPTION_TOPIC: &str = "/CXX/KV6posinfo";

pub fn subscription_endpoint(production: bool) -> &'static str {
    if production {
        PRODUCTION_ENDPOINT
    } else {
        BEST_EFFORT_ENDPOINT
    }
}

/// A source of decompressed XML payloads. The message-queue transport lives
/// behind this seam; `recv` is the pipeline's only blocking operation and
/// its cancellation point.
pub trait PayloadSource {
    /// Blocks for the next payload. `Ok(None)` means the source is closed.
    fn recv(&mut self) -> io::Result<Option<Vec<u8>>>;
}

/// Inflates a subscriber frame. Frames arrive gzip- or zlib-compressed; the
/// two-byte header tells them apart.
pub fn decompress(raw: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    if raw.starts_with(&[0x1f, 0x8b]) {
        flate2::read::GzDecoder::new(raw).read_to_end(&mut out)?;
    } else {
        flate2::read::ZlibDecoder::new(raw).read_to_end(&mut out)?;
    }
    Ok(out)
}

/// Interval after which a flush happens at the next envelope boundary.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Buffers validated records and writes them out in chunks of at most
/// [`MAX_CHUNK`] rows.
pub struct ChunkSpool {
    out_dir: PathBuf,
    flush_interval: Duration,
    buf: Vec<Kv6Record>,
    last_flush: Instant,
}

impl ChunkSpool {
    pub fn new(out_dir: PathBuf) -> ChunkSpool {
        ChunkSpool::with_flush_interval(out_dir, FLUSH_INTERVAL)
    }

    pub fn with_flush_interval(out_dir: PathBuf, flush_interval: Duration) -> ChunkSpool {
        ChunkSpool {
            out_dir,
            flush_interval,
            buf: Vec::new(),
            last_flush: Instant::now(),
        }
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Buffers one envelope's records. Full chunks flush immediately; the
    /// final partial chunk flushes only when the flush interval has expired,
    /// so chunk boundaries at quiet times still track wall-clock time.
    pub fn push_envelope(&mut self, records: &[Kv6Record], metrics: &dyn MetricsSink) {
        let mut rest = records;
        while !rest.is_empty() {
            let space = MAX_CHUNK - self.buf.len();
            let take = space.min(rest.len());
            self.buf.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            let time_expired = self.last_flush.elapsed() >= self.flush_interval;
            if self.buf.len() >= MAX_CHUNK || (rest.is_empty() && time_expired) {
                let _ = self.flush(metrics);
            }
        }
    }

    /// Writes out whatever is buffered. Failures are logged and the buffer
    /// dropped; the pipeline keeps running.
    pub fn flush(&mut self, metrics: &dyn MetricsSink) -> Option<(PathBuf, ChunkMeta)> {
        if self.buf.is_empty() {
            return None;
        }
        // File names have second resolution; a burst of flushes within one
        // second must not overwrite the previous chunk.
        let mut at = Utc::now();
        let mut path = self.out_dir.join(parquet::chunk_file_name(at));
        while path.exists() {
            at += chrono::Duration::seconds(1);
            path = self.out_dir.join(parquet::chunk_file_name(at));
        }
        let result = parquet::write_chunk(&self.buf, &path);
        self.buf.clear();
        self.last_flush = Instant::now();
        match result {
            Ok(meta) => {
                log::info!("wrote {} rows to {}", meta.rows_written, path.display());
                metrics.counter_add(metrics::RECORDS_WRITTEN, &[], meta.rows_written as u64);
                Some((path, meta))
            }
            Err(err) => {
                log::error!("writing chunk {} failed: {err}", path.display());
                None
            }
        }
    }
}

/// Writes a dated post-mortem artifact for a payload that produced errors or
/// warnings: the lists, then the payload itself.
pub fn dump_failed_payload(
    dir: &Path,
    payload: &[u8],
    errors: &[String],
    warnings: &[String],
) -> io::Result<PathBuf> {
    let name = format!(
        "oeuf-error-{}.txt",
        Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false)
    );
    let path = dir.join(name);
    let mut contents = String::new();
    contents.push_str("======= ERROR MESSAGES ========\n");
    for error in errors {
        contents.push_str(error);
        contents.push('\n');
    }
    contents.push_str("======= WARNING MESSAGES ======\n");
    for warning in warnings {
        contents.push_str(warning);
        contents.push('\n');
    }
    contents.push_str("======= RECEIVED MESSAGE ======\n");
    fs::write(&path, [contents.as_bytes(), payload, b"\n"].concat())?;
    Ok(path)
}

/// Parses one payload, reports metrics, buffers its records and dumps the
/// artifacts for anything that went wrong.
pub fn handle_payload(
    payload: &[u8],
    spool: &mut ChunkSpool,
    dump_dir: &Path,
    metrics: &dyn MetricsSink,
) {
    let started = Instant::now();
    let parsed = match std::str::from_utf8(payload) {
        Ok(text) => parser::parse_vv_tm_push(text),
        Err(_) => parser::ParsedPayload {
            info: None,
            errors: vec!["payload is not valid UTF-8".to_string()],
            warnings: Vec::new(),
        },
    };
    let took_millis = started.elapsed().as_secs_f64() * 1000.0;

    let status = match &parsed.info {
        Some(_) if parsed.warnings.is_empty() => "ok",
        Some(_) => "warning",
        None => "error",
    };
    metrics.counter_inc(metrics::MESSAGES_TOTAL, &[("status", status)]);
    metrics.histogram_observe(metrics::PARSE_MILLIS, took_millis);
    metrics.histogram_observe(metrics::PAYLOAD_SIZE, payload.len() as f64);
    metrics.histogram_observe(
        metrics::RECORDS_AMOUNT,
        parsed.info.as_ref().map_or(0, |i| i.records.len()) as f64,
    );

    if let Some(info) = &parsed.info {
        spool.push_envelope(&info.records, metrics);
    }

    if !parsed.errors.is_empty() || !parsed.warnings.is_empty() {
        match dump_failed_payload(dump_dir, payload, &parsed.errors, &parsed.warnings) {
            Ok(path) => log::warn!(
                "payload parsed with {} errors, {} warnings; details in {}",
                parsed.errors.len(),
                parsed.warnings.len(),
                path.display()
            ),
            Err(err) => log::error!("could not write error dump: {err}"),
        }
    }
}

/// The receive loop: blocks on the source until shutdown is requested or
/// the source closes, then flushes the final partial chunk.
pub fn run(
    source: &mut dyn PayloadSource,
    out_dir: &Path,
    metrics: &dyn MetricsSink,
    shutdown: &AtomicBool,
) {
    let mut spool = ChunkSpool::new(out_dir.to_path_buf());
    while !shutdown.load(Ordering::Relaxed) {
        match source.recv() {
            Ok(Some(payload)) => handle_payload(&payload, &mut spool, out_dir, metrics),
            Ok(None) => break,
            Err(err) => {
                if !shutdown.load(Ordering::Relaxed) {
                    log::error!("recv: {err}");
                }
            }
        }
    }
    log::info!("terminating, {} records buffered", spool.buffered());
    let _ = spool.flush(metrics);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv6::model::{Kv6Record, Kv6RecordType};
    use crate::metrics::NullMetrics;
    use crate::time::{Date, Timestamp};
    use std::io::Write;
    use std::sync::Mutex;

    fn delay(journey_number: u32) -> Kv6Record {
        let mut record = Kv6Record::new(Kv6RecordType::Delay);
        record.data_owner_code = "CXX".into();
        record.line_planning_number = "M300".into();
        record.operating_day = Date { year: 2024, month: 6, day: 1 };
        record.journey_number = journey_number;
        record.timestamp = Timestamp::parse("2024-06-01T12:00:00Z").unwrap();
        record.source = "SERVER".into();
        record.punctuality = 0;
        record.presence = Kv6RecordType::Delay.required_fields();
        record
    }

    #[test]
    fn decompress_sniffs_gzip_and_zlib() {
        let text = b"<VV_TM_PUSH/>";

        let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        gz.write_all(text).unwrap();
        assert_eq!(decompress(&gz.finish().unwrap()).unwrap(), text);

        let mut zlib = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        zlib.write_all(text).unwrap();
        assert_eq!(decompress(&zlib.finish().unwrap()).unwrap(), text);

        assert!(decompress(b"not compressed at all").is_err());
    }

    #[test]
    fn endpoint_selection() {
        assert_eq!(subscription_endpoint(true), PRODUCTION_ENDPOINT);
        assert_eq!(subscription_endpoint(false), BEST_EFFORT_ENDPOINT);
    }

    #[test]
    fn spool_cuts_chunks_at_max_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut spool = ChunkSpool::new(dir.path().to_path_buf());

        let records: Vec<Kv6Record> = (0..25_000).map(|i| delay(i % 1_000_000)).collect();
        spool.push_envelope(&records, &NullMetrics);

        // Two full chunks written, 5000 rows still buffered.
        assert_eq!(spool.buffered(), 5_000);
        let mut rows = Vec::new();
        for entry in fs::read_dir(dir.path()).unwrap() {
            let path = entry.unwrap().path();
            if path.extension().is_some_and(|e| e == "parquet") {
                rows.push(ChunkMeta::read_for(&path).unwrap().rows_written);
            }
        }
        rows.sort();
        assert_eq!(rows, vec![10_000, 10_000]);
    }

    #[test]
    fn expired_interval_flushes_partial_chunk_at_envelope_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let mut spool = ChunkSpool::with_flush_interval(dir.path().to_path_buf(), Duration::ZERO);
        spool.push_envelope(&[delay(1), delay(2)], &NullMetrics);
        assert_eq!(spool.buffered(), 0);
        let written = fs::read_dir(dir.path()).unwrap().count();
        // Data file plus sidecar.
        assert_eq!(written, 2);
    }

    #[test]
    fn flush_on_empty_buffer_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut spool = ChunkSpool::new(dir.path().to_path_buf());
        assert!(spool.flush(&NullMetrics).is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    struct StatusRecorder(Mutex<Vec<String>>);

    impl MetricsSink for StatusRecorder {
        fn counter_add(&self, name: &str, labels: &[(&str, &str)], _value: u64) {
            if name == crate::metrics::MESSAGES_TOTAL {
                let status = labels.iter().find(|(k, _)| *k == "status").unwrap().1;
                self.0.lock().unwrap().push(status.to_string());
            }
        }
        fn histogram_observe(&self, _name: &str, _value: f64) {}
    }

    #[test]
    fn broken_payload_is_dumped_with_error_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut spool = ChunkSpool::new(dir.path().to_path_buf());
        let recorder = StatusRecorder(Mutex::new(Vec::new()));

        handle_payload(b"<oops", &mut spool, dir.path(), &recorder);

        assert_eq!(*recorder.0.lock().unwrap(), vec!["error".to_string()]);
        let dumps: Vec<PathBuf> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("oeuf-error-"))
            })
            .collect();
        assert_eq!(dumps.len(), 1);
        let contents = fs::read_to_string(&dumps[0]).unwrap();
        assert!(contents.contains("ERROR MESSAGES"));
        assert!(contents.contains("<oops"));
    }

    struct ScriptedSource {
        payloads: Vec<Vec<u8>>,
    }

    impl PayloadSource for ScriptedSource {
        fn recv(&mut self) -> io::Result<Option<Vec<u8>>> {
            if self.payloads.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.payloads.remove(0)))
            }
        }
    }

    #[test]
    fn run_flushes_remaining_records_on_source_close() {
        let dir = tempfile::tempdir().unwrap();
        let payload = br#"<VV_TM_PUSH xmlns="http://bison.connekt.nl/tmi8/kv6/msg">
  <SubscriberID>openov</SubscriberID>
  <Version>1</Version>
  <DossierName>KV6posinfo</DossierName>
  <Timestamp>2024-06-01T12:00:00Z</Timestamp>
  <KV6posinfo><DELAY>
    <dataownercode>CXX</dataownercode>
    <lineplanningnumber>M300</lineplanningnumber>
    <operatingday>2024-06-01</operatingday>
    <journeynumber>2045</journeynumber>
    <reinforcementnumber>0</reinforcementnumber>
    <timestamp>2024-06-01T12:00:00Z</timestamp>
    <source>SERVER</source>
    <punctuality>-120</punctuality>
  </DELAY></KV6posinfo>
</VV_TM_PUSH>"#;
        let mut source = ScriptedSource {
            payloads: vec![payload.to_vec()],
        };
        let shutdown = AtomicBool::new(false);
        run(&mut source, dir.path(), &NullMetrics, &shutdown);

        let metas: Vec<ChunkMeta> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|e| e == "parquet"))
            .map(|p| ChunkMeta::read_for(&p).unwrap())
            .collect();
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].rows_written, 1);
        assert_eq!(metas[0].min_timestamp, 1717243200);
    }
}
