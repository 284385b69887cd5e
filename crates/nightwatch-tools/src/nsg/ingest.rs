//! Flow-log ingestion: recent blobs to flat [`FlowRecord`]s.

use std::io::Read;

use flate2::read::GzDecoder;
use serde::Deserialize;
use tracing::{debug, info};

use nightwatch_core::error::{NightwatchError, Result};
use nightwatch_core::time_range::parse_datetime;
use nightwatch_core::types::{FlowRecord, TimeRange};

use crate::nsg::storage::BlobStore;

/// Blobs read by the preview path when the caller gives no limit.
pub const DEFAULT_PREVIEW_FILES: usize = 5;

// Nested shape of an NSG flow-log file:
// records[].properties.flows[].flows[].flowTuples[]
#[derive(Debug, Deserialize)]
struct FlowLogFile {
    #[serde(default)]
    records: Vec<FlowLogRecord>,
}

#[derive(Debug, Deserialize)]
struct FlowLogRecord {
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    properties: RecordProperties,
}

#[derive(Debug, Default, Deserialize)]
struct RecordProperties {
    #[serde(default)]
    flows: Vec<RuleFlows>,
}

#[derive(Debug, Deserialize)]
struct RuleFlows {
    #[serde(default)]
    flows: Vec<TupleGroup>,
}

#[derive(Debug, Deserialize)]
struct TupleGroup {
    #[serde(rename = "flowTuples", default)]
    flow_tuples: Vec<String>,
}

/// Read the `max_files` most recently modified blobs and flatten their flow
/// tuples.
///
/// When `window` is given, records whose time lies outside it (inclusive
/// bounds) are skipped whole; records without a time are kept. Any storage,
/// decompression or parse failure aborts the call.
pub async fn ingest_flows(
    store: &dyn BlobStore,
    max_files: usize,
    window: Option<&TimeRange>,
) -> Result<Vec<FlowRecord>> {
    let mut blobs = store.list_blobs().await.map_err(as_ingestion)?;
    info!(blobs = blobs.len(), "Listed flow-log blobs");

    blobs.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    blobs.truncate(max_files);

    let mut flows = Vec::new();
    for blob in &blobs {
        let bytes = store.download_blob(&blob.name).await.map_err(as_ingestion)?;
        let content = decode_blob(&blob.name, &bytes)?;
        let parsed = parse_flow_log(&content, window).map_err(|e| match e {
            NightwatchError::Ingestion(msg) => NightwatchError::Ingestion(format!("{}: {}", blob.name, msg)),
            other => other,
        })?;
        debug!(blob = %blob.name, records = parsed.len(), "Parsed flow-log blob");
        flows.extend(parsed);
    }

    info!(blobs = blobs.len(), records = flows.len(), "Flow-log ingestion complete");
    Ok(flows)
}

fn as_ingestion(err: NightwatchError) -> NightwatchError {
    match err {
        NightwatchError::Ingestion(_) => err,
        other => NightwatchError::Ingestion(other.to_string()),
    }
}

/// Gunzip blobs named `*.gz`; decode everything else as UTF-8 text.
pub fn decode_blob(name: &str, bytes: &[u8]) -> Result<String> {
    if name.ends_with(".gz") {
        let mut content = String::new();
        GzDecoder::new(bytes)
            .read_to_string(&mut content)
            .map_err(|e| NightwatchError::Ingestion(format!("{}: gzip decode failed: {}", name, e)))?;
        Ok(content)
    } else {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| NightwatchError::Ingestion(format!("{}: not UTF-8: {}", name, e)))
    }
}

/// Parse one flow-log document.
///
/// Tuples with fewer than eight fields are dropped.
pub fn parse_flow_log(content: &str, window: Option<&TimeRange>) -> Result<Vec<FlowRecord>> {
    let file: FlowLogFile = serde_json::from_str(content)
        .map_err(|e| NightwatchError::Ingestion(format!("invalid flow-log JSON: {}", e)))?;

    let mut flows = Vec::new();
    for record in file.records {
        let timestamp = match record.time.as_deref() {
            Some(raw) => Some(parse_datetime(raw).ok_or_else(|| {
                NightwatchError::Ingestion(format!("invalid record time '{}'", raw))
            })?),
            None => None,
        };

        if let (Some(window), Some(ts)) = (window, timestamp) {
            if !window.contains_inclusive(ts) {
                continue;
            }
        }

        for rule in &record.properties.flows {
            for group in &rule.flows {
                for tuple in &group.flow_tuples {
                    if let Some(flow) = FlowRecord::from_tuple(tuple, timestamp)? {
                        flows.push(flow);
                    }
                }
            }
        }
    }
    Ok(flows)
}
