//! Line format of `checkpoint.log`: `<blake3 hex> <json>\n`.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{CheckpointError, CheckpointResult};
use crate::assessment::Assessment;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum LogEntry {
    Started { at: DateTime<Utc> },
    Commit { at: DateTime<Utc>, assessment: Assessment },
    Published { at: DateTime<Utc>, fact_id: u32 },
    Reset { at: DateTime<Utc>, fact_id: u32 },
}

impl LogEntry {
    pub(crate) fn at(&self) -> DateTime<Utc> {
        match self {
            LogEntry::Started { at }
            | LogEntry::Commit { at, .. }
            | LogEntry::Published { at, .. }
            | LogEntry::Reset { at, .. } => *at,
        }
    }
}

pub(crate) fn encode(entry: &LogEntry) -> serde_json::Result<String> {
    let json = serde_json::to_string(entry)?;
    let digest = blake3::hash(json.as_bytes());
    Ok(format!("{} {}\n", digest.to_hex(), json))
}

pub(crate) fn decode(line: &str) -> Result<LogEntry, String> {
    let (digest, json) = line
        .split_once(' ')
        .ok_or_else(|| "missing checksum".to_string())?;
    if blake3::hash(json.as_bytes()).to_hex().as_str() != digest {
        return Err("checksum mismatch".to_string());
    }
    serde_json::from_str(json).map_err(|e| format!("invalid entry: {e}"))
}

/// Verified prefix of a log file.
#[derive(Debug, Default)]
pub(crate) struct Replay {
    pub entries: Vec<LogEntry>,
    /// Byte length of the verified prefix.
    pub valid_len: u64,
    /// Whether an unterminated or unverifiable last line was dropped.
    pub torn: bool,
}

/// Splits `bytes` into verified entries.
///
/// Only the last line may be damaged (a write interrupted by a crash); damage
/// anywhere else is reported as [`CheckpointError::Corrupt`].
pub(crate) fn parse(bytes: &[u8], path: &Path) -> CheckpointResult<Replay> {
    let mut replay = Replay::default();
    let mut offset = 0usize;
    let mut line_no = 0usize;

    while offset < bytes.len() {
        line_no += 1;
        let rest = &bytes[offset..];
        let (line, consumed, terminated) = match rest.iter().position(|&b| b == b'\n') {
            Some(end) => (&rest[..end], end + 1, true),
            None => (rest, rest.len(), false),
        };
        let is_last = offset + consumed >= bytes.len();

        let decoded = std::str::from_utf8(line)
            .map_err(|e| e.to_string())
            .and_then(decode);

        match decoded {
            Ok(entry) if terminated => {
                replay.entries.push(entry);
                offset += consumed;
            }
            Err(reason) if !is_last => {
                return Err(CheckpointError::Corrupt {
                    path: path.to_path_buf(),
                    line: line_no,
                    reason,
                });
            }
            _ => {
                replay.torn = true;
                break;
            }
        }
    }

    replay.valid_len = offset as u64;
    Ok(replay)
}
