//! Pagination cursor.
//!
//! A cursor is the `(sort_value, tie_id)` pair of the last item on a page.
//! Traversal resumes relative to that row, never an offset, which is what
//! keeps pages stable while the collection grows. Over the wire it travels
//! as URL-safe base64 JSON so callers treat it as an opaque token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Keyset pagination cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Cursor {
    /// Primary sort value of the last seen row (`updated_at`)
    pub sort_value: DateTime<Utc>,
    /// Tie-break ID of the last seen row
    pub tie_id: String,
}

impl Cursor {
    /// Create a cursor from the last item of a page.
    pub fn new(sort_value: DateTime<Utc>, tie_id: impl Into<String>) -> Self {
        Self {
            sort_value,
            tie_id: tie_id.into(),
        }
    }

    /// Under `(sort desc, tie desc)` ordering, does a row with these keys
    /// come strictly after this cursor? This is the boundary predicate every
    /// page query encodes.
    pub fn matches(&self, sort_value: DateTime<Utc>, tie_id: &str) -> bool {
        sort_value < self.sort_value
            || (sort_value == self.sort_value && tie_id < self.tie_id.as_str())
    }

    /// Encode to an opaque URL-safe token.
    pub fn encode(&self) -> String {
        // Serializing a two-field struct cannot fail
        let raw = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(raw)
    }

    /// Decode a token produced by [`Cursor::encode`]. Returns `None` for
    /// anything malformed or tampered with.
    pub fn decode(token: &str) -> Option<Self> {
        let raw = URL_SAFE_NO_PAD.decode(token).ok()?;
        serde_json::from_slice(&raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let cursor = Cursor::new(ts(1_700_000_000), "vid_42");
        let token = cursor.encode();
        assert_eq!(Cursor::decode(&token), Some(cursor));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(Cursor::decode("not-base64!!"), None);
        assert_eq!(Cursor::decode(&URL_SAFE_NO_PAD.encode(b"{\"nope\":1}")), None);
    }

    #[test]
    fn test_boundary_predicate() {
        let cursor = Cursor::new(ts(5), "b");

        // Strictly older sort value
        assert!(cursor.matches(ts(4), "z"));
        // Same sort value, smaller tie id
        assert!(cursor.matches(ts(5), "a"));
        // The cursor row itself is excluded
        assert!(!cursor.matches(ts(5), "b"));
        // Newer rows are excluded
        assert!(!cursor.matches(ts(5), "c"));
        assert!(!cursor.matches(ts(6), "a"));
    }
}
