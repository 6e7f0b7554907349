//! sv-schemas
//!
//! Types shared by every crate in the workspace: the normalized object record,
//! the run mode and the store side. No logic beyond parsing and display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ObjectInfo
// ---------------------------------------------------------------------------

/// One object's observed state in one store at listing time.
///
/// `size` and `last_modified` are `None` when the object does not exist in
/// that store. A zero-byte object is `Some(0)` and is never confused with an
/// absent one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub name: String,
    pub size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectInfo {
    pub fn present(
        name: impl Into<String>,
        size: u64,
        last_modified: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            name: name.into(),
            size: Some(size),
            last_modified,
        }
    }

    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            last_modified: None,
        }
    }

    pub fn exists(&self) -> bool {
        self.size.is_some()
    }

    /// `true` only for an object that exists and holds zero bytes.
    pub fn is_zero_size(&self) -> bool {
        self.size == Some(0)
    }
}

// ---------------------------------------------------------------------------
// RunMode
// ---------------------------------------------------------------------------

/// Validation mode of one run.
///
/// - `Daily`: point-in-time presence + size check; discrepancies are fatal.
/// - `Weekly`: rolling inventory summary; never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Daily,
    Weekly,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Daily => "daily",
            RunMode::Weekly => "weekly",
        }
    }

    /// Default lookback window in days.
    pub fn default_lookback_days(&self) -> u32 {
        match self {
            RunMode::Daily => 2,
            RunMode::Weekly => 7,
        }
    }

    /// Case-insensitive parse. Returns `None` for anything else so callers can
    /// reject unsupported modes before doing any work.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(RunMode::Daily),
            "weekly" => Some(RunMode::Weekly),
            _ => None,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StoreSide
// ---------------------------------------------------------------------------

/// Which side of the copy an observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreSide {
    /// Blob container the files originate from (authoritative).
    Source,
    /// Key-object bucket that should hold a copy of each file.
    Target,
}

impl StoreSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreSide::Source => "source",
            StoreSide::Target => "target",
        }
    }
}

impl fmt::Display for StoreSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_is_present_not_absent() {
        let z = ObjectInfo::present("a.txt", 0, None);
        assert!(z.exists());
        assert!(z.is_zero_size());

        let a = ObjectInfo::absent("a.txt");
        assert!(!a.exists());
        assert!(!a.is_zero_size());
    }

    #[test]
    fn run_mode_parse_is_case_insensitive_and_closed() {
        assert_eq!(RunMode::parse("DAILY"), Some(RunMode::Daily));
        assert_eq!(RunMode::parse(" weekly "), Some(RunMode::Weekly));
        assert_eq!(RunMode::parse("hourly"), None);
        assert_eq!(RunMode::parse(""), None);
    }

    #[test]
    fn run_mode_serializes_lowercase() {
        let v = serde_json::to_value(RunMode::Weekly).unwrap();
        assert_eq!(v, serde_json::json!("weekly"));
    }
}
