//! Sidecar protocol: messages exchanged with the host over stdin/stdout
//!
//! Every frame is a 4-byte little-endian length followed by that many bytes of
//! JSON.

use crate::engine::{
    DismissDiffRequest, GenerationId, MatchRecord, OpenRequest, PatternQuery, PreviewRequest,
    QueryField, Range, Snapshot,
};
use crate::rewrite::FileResult;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Largest frame accepted from the host
pub const MAX_FRAME_LEN: usize = 100 * 1024 * 1024;

/// Messages sent by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostMessage {
    /// Submit a pattern query right away
    Search { query: PatternQuery },
    /// Submit a rule document
    Yaml { yaml: String },
    /// Edit one panel field; submitted once edits go quiet
    EditField { field: QueryField, value: String },
    #[serde(rename_all = "camelCase")]
    SetIncludeFile { include_file: String },
    RefreshAllSearch,
    ClearSearchResults,
    DismissMatch { key: String, record: MatchRecord },
    #[serde(rename_all = "camelCase")]
    DismissFile { key: String, file_path: String },
    /// Fresh records for one file of the given generation
    #[serde(rename_all = "camelCase")]
    RefreshSearchResult {
        generation: GenerationId,
        file_path: String,
        matches: Vec<MatchRecord>,
    },
    ReplaceAll,
    #[serde(rename_all = "camelCase")]
    Open { file_path: String, range: Range },
    GetSnapshot,
    Shutdown,
}

/// Outcome of writing one file during replace all
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceOutcome {
    pub file_path: String,
    pub applied: usize,
    pub skipped: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReplaceOutcome {
    pub fn from_result(result: &FileResult) -> Self {
        let (file_path, outcome) = result;
        match outcome {
            Ok(o) => Self {
                file_path: file_path.clone(),
                applied: o.applied,
                skipped: o.skipped,
                error: None,
            },
            Err(e) => Self {
                file_path: file_path.clone(),
                applied: 0,
                skipped: 0,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Messages sent to the host
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostNotification<'a> {
    /// Engine state changed; ask for a snapshot to see it
    Changed { version: u64 },
    Snapshot(Snapshot<'a>),
    DismissDiff(DismissDiffRequest),
    OpenFile(OpenRequest),
    PreviewDiff(PreviewRequest),
    ReplaceApplied { files: Vec<ReplaceOutcome> },
    Error { message: String },
}

/// Write a message to a stream with length prefix
pub fn write_message<W: Write>(writer: &mut W, msg: &impl Serialize) -> std::io::Result<()> {
    let json = serde_json::to_vec(msg).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, e)
    })?;

    let len = json.len() as u32;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&json)?;
    writer.flush()?;

    Ok(())
}

/// Read one raw frame body
pub fn read_frame<R: Read>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;

    // Sanity check: don't allocate more than 100MB
    if len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Message too large",
        ));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read a message from a stream with length prefix
pub fn read_message<R: Read, T: for<'de> Deserialize<'de>>(reader: &mut R) -> std::io::Result<T> {
    let buf = read_frame(reader)?;
    serde_json::from_slice(&buf).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, e)
    })
}
