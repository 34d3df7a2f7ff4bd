//! Sync watermark.

use crate::error::{ProtocolError, ProtocolResult};
use chrono::{DateTime, NaiveDateTime};
use std::cmp::Ordering;
use std::fmt;

const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Marker of the last point in time the local store was reconciled with
/// the remote store.
///
/// The text handed out by the remote side is kept verbatim so it can be
/// sent back unchanged; ordering uses the parsed instant.
#[derive(Debug, Clone)]
pub struct Watermark {
    text: String,
    at: NaiveDateTime,
}

impl Watermark {
    /// Text of the watermark used before the first successful sync.
    pub const EPOCH: &'static str = "1970-01-01 00:00:00";

    /// The watermark of a store that has never synced.
    pub fn epoch() -> Self {
        Self {
            text: Self::EPOCH.to_string(),
            at: NaiveDateTime::default(),
        }
    }

    /// Parses a watermark.
    ///
    /// Accepts `YYYY-MM-DD HH:MM:SS[.fff]`, the same with a `T` separator,
    /// and RFC 3339 timestamps (normalized to UTC for ordering).
    pub fn parse(text: &str) -> ProtocolResult<Self> {
        let trimmed = text.trim();
        let at = FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .or_else(|| {
                DateTime::parse_from_rfc3339(trimmed)
                    .ok()
                    .map(|dt| dt.naive_utc())
            })
            .ok_or_else(|| ProtocolError::InvalidWatermark {
                text: text.to_string(),
            })?;

        Ok(Self {
            text: trimmed.to_string(),
            at,
        })
    }

    /// Returns the watermark text as received.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns the parsed instant.
    pub fn instant(&self) -> NaiveDateTime {
        self.at
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::epoch()
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq for Watermark {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at
    }
}

impl Eq for Watermark {}

impl PartialOrd for Watermark {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Watermark {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at)
    }
}
