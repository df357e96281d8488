//! Augmentation entry point.
//!
//! Reads KV1 from standard input, builds the indexed and linked timetable
//! model, then joins `oeuf-input.parquet` against it and writes
//! `oeuf-augmented.parquet`.

use anyhow::{bail, Context};
use oeuf::kv1::{self, Kv1Index};
use oeuf::{augment, kv1::link_records};
use std::io::Read;
use std::path::Path;
use std::time::Instant;

fn parse_kv1() -> anyhow::Result<kv1::Kv1Records> {
    log::info!("reading KV1 from standard input");
    let mut input = Vec::new();
    std::io::stdin()
        .lock()
        .read_to_end(&mut input)
        .context("reading KV1 from stdin")?;
    log::info!("read {} bytes", input.len());

    let started = Instant::now();
    let (tokens, lex_errors) = kv1::lexer::lex(&input);
    let elapsed = started.elapsed().as_secs_f64();
    if !lex_errors.is_empty() {
        for error in &lex_errors {
            log::error!("lexer: {error}");
        }
        bail!("lexer reported {} errors", lex_errors.len());
    }
    log::info!(
        "got {} tokens in {elapsed:.3}s ({:.1} MB/s)",
        tokens.len(),
        input.len() as f64 / 1e6 / elapsed
    );

    let outcome = kv1::parser::parse(&tokens);
    for warning in &outcome.warnings {
        log::warn!("parser: {warning}");
    }
    if !outcome.errors.is_empty() {
        for error in &outcome.errors {
            log::error!("parser: {error}");
        }
        bail!("parser reported {} errors", outcome.errors.len());
    }

    log::info!("parsed {} records", outcome.records.total());
    for (name, count) in outcome.records.census() {
        log::info!("  {name}: {count}");
    }
    Ok(outcome.records)
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let mut records = parse_kv1()?;

    log::info!("indexing");
    let index = Kv1Index::build(&records);
    log::info!("indexed {} records", index.total());
    for (name, count) in index.census() {
        log::info!("  {name}: {count}");
    }
    // Only notice assignments are not indexed; any further shortfall means
    // duplicate keys in the input, which the index resolves last-write-wins.
    if index.duplicate_keys > 0 {
        log::warn!("{} duplicate keys (last write wins)", index.duplicate_keys);
    }
    debug_assert_eq!(
        index.total() + records.notice_assignments.len() + index.duplicate_keys,
        records.total()
    );

    log::info!("linking records");
    link_records(&mut records, &index);
    log::info!("done linking");

    augment::augment_file(
        Path::new("oeuf-input.parquet"),
        Path::new("oeuf-augmented.parquet"),
        &records,
        &index,
    )
    .context("augmenting oeuf-input.parquet")?;
    log::info!("wrote oeuf-augmented.parquet");
    Ok(())
}
