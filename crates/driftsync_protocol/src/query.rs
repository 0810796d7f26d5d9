//! Watermarked pull queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Predicate for a watermarked select: rows changed after `after`, capped at
/// `limit`.
///
/// Posts are filtered on their authored `timestamp` and returned newest
/// first; likes and comments are filtered on the server-maintained
/// `updated_at`, which also advances on edits and soft deletes. The limit
/// is a throughput governor, not a correctness bound: the watermark
/// advances every cycle, so repeated cycles drain any backlog.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WatermarkQuery {
    /// Exclusive lower bound.
    pub after: DateTime<Utc>,
    /// Maximum number of rows returned.
    pub limit: u32,
}

impl WatermarkQuery {
    /// Creates a watermark query.
    #[must_use]
    pub const fn new(after: DateTime<Utc>, limit: u32) -> Self {
        Self { after, limit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn serializes_with_rfc3339_bound() {
        let query = WatermarkQuery::new(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(), 20);
        let json = serde_json::to_value(query).unwrap();
        assert_eq!(json["after"], "2024-01-02T03:04:05Z");
        assert_eq!(json["limit"], 20);
    }
}
