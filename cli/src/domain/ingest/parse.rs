//! Combined-format line parser
//!
//! Turns one raw access-log line into a [`RawRecord`] or a [`MalformedLine`].
//! A bad line is never fatal; the pipeline warns, counts it, and moves on.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use thiserror::Error;

use crate::core::constants::MALFORMED_PREVIEW_LEN;
use crate::utils::time::{format_apache_timestamp, parse_apache_timestamp};

/// Combined log format: client identity user [timestamp] "method path
/// protocol" status bytes "referer" "user-agent".
///
/// The timezone offset is matched and discarded; all timestamps are treated
/// as one uniform zone. A byte count of `-` means no payload.
static LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?P<ip_address>[a-z\d.:]+)\s\S+\s\S+\s\[(?P<timestamp>\d{2}/\w{3}/\d{4}:\d{2}:\d{2}:\d{2})\s[+-]\d{4}\]\s"(?P<method>GET|DELETE|HEAD|OPTIONS|POST|PROPFIND|PUT)\s(?P<path>\S+)\sHTTP/[0-9.]+"\s(?P<status_code>\d+)\s(?P<nbytes>\d+|-)\s"(?P<referer>.*?)"\s"(?P<user_agent>.*?)""#,
    )
    .expect("Invalid regex")
});

/// One parsed access-log line
///
/// Ephemeral: produced per line, consumed by the classifier, never persisted
/// as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub timestamp: NaiveDateTime,
    pub ip_address: String,
    pub path: String,
    pub status_code: u16,
    pub byte_count: i64,
    pub referer: String,
    pub user_agent: String,
}

impl RawRecord {
    /// An error is any status outside `[200, 400)`
    pub fn is_error(&self) -> bool {
        self.status_code < 200 || self.status_code >= 400
    }

    /// Re-serialize in the combined format
    ///
    /// The parser does not keep the method, identity, or offset, so those
    /// render as fixed placeholders; timestamp, status, and byte count
    /// round-trip exactly through [`parse_line`].
    pub fn to_log_line(&self) -> String {
        format!(
            r#"{} - - [{} +0000] "GET {} HTTP/1.1" {} {} "{}" "{}""#,
            self.ip_address,
            format_apache_timestamp(&self.timestamp),
            self.path,
            self.status_code,
            self.byte_count,
            self.referer,
            self.user_agent,
        )
    }
}

/// Unparseable log line (recoverable)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unparseable log line: {preview}")]
pub struct MalformedLine {
    /// Truncated copy of the offending line for the warning log
    pub preview: String,
}

impl MalformedLine {
    fn new(line: &str) -> Self {
        Self {
            preview: line.chars().take(MALFORMED_PREVIEW_LEN).collect(),
        }
    }
}

/// Parse one combined-format line
pub fn parse_line(line: &str) -> Result<RawRecord, MalformedLine> {
    let caps = LINE_REGEX
        .captures(line)
        .ok_or_else(|| MalformedLine::new(line))?;

    let timestamp =
        parse_apache_timestamp(&caps["timestamp"]).ok_or_else(|| MalformedLine::new(line))?;
    let status_code: u16 = caps["status_code"]
        .parse()
        .map_err(|_| MalformedLine::new(line))?;
    let byte_count: i64 = match &caps["nbytes"] {
        "-" => 0,
        digits => digits.parse().map_err(|_| MalformedLine::new(line))?,
    };

    Ok(RawRecord {
        timestamp,
        ip_address: caps["ip_address"].to_string(),
        path: caps["path"].to_string(),
        status_code,
        byte_count,
        referer: caps["referer"].to_string(),
        user_agent: caps["user_agent"].to_string(),
    })
}
