use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use lex_connector::matrix::{
    parse_line, ConnectionEngine, MatrixStore, ParsePolicy, TextTable,
};
use lex_connector::{ConnError, ConnectionCost, Cost};

use super::config_ops::load_config;
use super::die;

pub fn compile(input_txt: &str, output_file: &str, dense: bool, config: Option<&str>) {
    let config = load_config(config);
    let text = die!(
        fs::read_to_string(input_txt),
        "Error reading {input_txt}: {}"
    );
    let table = if dense {
        die!(TextTable::from_dense_text(&text), "Error parsing {input_txt}: {}")
    } else {
        die!(
            TextTable::from_text(&text, config.oracle.parse_policy()),
            "Error parsing {input_txt}: {}"
        )
    };
    eprintln!(
        "Parsed {} records ({}x{})",
        table.records(),
        table.num_right(),
        table.num_left()
    );

    let store = die!(MatrixStore::from_source(&table), "Error encoding matrix: {}");
    die!(
        store.save(Path::new(output_file)),
        "Error writing {output_file}: {}"
    );
    let dense_bytes = table.num_right() as usize * table.num_left() as usize * 4;
    eprintln!(
        "Wrote {output_file} ({} bytes, {:.1}% of dense i32)",
        store.as_bytes().len(),
        percent(store.as_bytes().len(), dense_bytes)
    );
}

/// Summary printed by `info`.
#[derive(Debug, Serialize)]
pub struct MatrixInfo {
    pub num_right: u16,
    pub num_left: u16,
    pub file_bytes: usize,
    pub unit_bytes: usize,
    pub dense_bytes: usize,
}

pub fn matrix_info(store: &MatrixStore) -> MatrixInfo {
    MatrixInfo {
        num_right: store.num_right(),
        num_left: store.num_left(),
        file_bytes: store.as_bytes().len(),
        unit_bytes: store.unit_area_len(),
        dense_bytes: store.num_right() as usize * store.num_left() as usize * 4,
    }
}

pub fn info(file: &str, json: bool) {
    let store = die!(MatrixStore::open(Path::new(file)), "Error opening {file}: {}");
    let info = matrix_info(&store);
    if json {
        println!(
            "{}",
            die!(serde_json::to_string_pretty(&info), "Error serializing: {}")
        );
        return;
    }
    println!("Format:      LXCC");
    println!("Right IDs:   {}", info.num_right);
    println!("Left IDs:    {}", info.num_left);
    println!("File size:   {} bytes", info.file_bytes);
    println!("Unit data:   {} bytes", info.unit_bytes);
    println!(
        "Dense i32:   {} bytes ({:.1}% compressed size)",
        info.dense_bytes,
        percent(info.file_bytes, info.dense_bytes)
    );
}

pub fn lookup(file: &str, right_id: u16, left_id: u16, config: Option<&str>) {
    let config = load_config(config);
    let engine = die!(
        ConnectionEngine::open(Path::new(file), &config),
        "Error opening {file}: {}"
    );
    let cost = die!(engine.try_cost(right_id, left_id), "Error: {}");
    println!("{cost}");
}

/// Outcome of comparing an engine with its source text.
#[derive(Debug, Default, Serialize)]
pub struct VerifyReport {
    /// Records compared.
    pub checked: usize,
    /// Records skipped by sampling.
    pub skipped: usize,
    /// `(right_id, left_id, expected, actual)` for each disagreement.
    pub mismatches: Vec<(u16, u16, Cost, Cost)>,
}

/// Compare `engine` against the records of `text` (header line first).
///
/// The first `prefix` records are checked exhaustively; after that only
/// every `sample`-th record is checked. Records are also checked against
/// the reference table parsed from the same text.
pub fn verify_against_text(
    engine: &ConnectionEngine,
    text: &str,
    policy: ParsePolicy,
    prefix: usize,
    sample: usize,
) -> Result<VerifyReport, ConnError> {
    let oracle = TextTable::from_text(text, policy)?;
    let sample = sample.max(1);
    let mut report = VerifyReport::default();

    let records = text.lines().skip(1).filter(|l| !l.trim().is_empty());
    for (i, line) in records.enumerate() {
        if i >= prefix && (i - prefix) % sample != 0 {
            report.skipped += 1;
            continue;
        }
        let (rid, lid, cost) = match parse_line(line) {
            Ok(record) => record,
            Err(e) if policy == ParsePolicy::SkipMalformed => {
                warn!(%e, "skipping malformed record");
                continue;
            }
            Err(e) => return Err(e),
        };
        report.checked += 1;
        // a later duplicate overrides this record in both implementations
        let expected = oracle.cost(rid, lid);
        if expected != cost {
            continue;
        }
        let actual = engine.cost(rid, lid);
        if actual != expected {
            report.mismatches.push((rid, lid, expected, actual));
        }
    }

    let stats = engine.cache_stats();
    info!(
        checked = report.checked,
        skipped = report.skipped,
        mismatches = report.mismatches.len(),
        decodes = stats.decodes,
        "verification finished"
    );
    Ok(report)
}

pub fn verify(
    conn_file: &str,
    input_txt: &str,
    prefix: usize,
    sample: usize,
    config: Option<&str>,
) {
    let config = load_config(config);
    let text = die!(
        fs::read_to_string(input_txt),
        "Error reading {input_txt}: {}"
    );
    let engine = die!(
        ConnectionEngine::open(Path::new(conn_file), &config),
        "Error opening {conn_file}: {}"
    );
    let report = die!(
        verify_against_text(
            &engine,
            &text,
            config.oracle.parse_policy(),
            prefix,
            sample
        ),
        "Error verifying: {}"
    );

    for (rid, lid, expected, actual) in report.mismatches.iter().take(20) {
        eprintln!("MISMATCH ({rid}, {lid}): expected {expected}, got {actual}");
    }
    println!(
        "checked {} records, skipped {}, {} mismatches",
        report.checked,
        report.skipped,
        report.mismatches.len()
    );
    if !report.mismatches.is_empty() {
        std::process::exit(1);
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
