//! Cache key layout and field codecs.
//!
//! One hash per post. The aggregate lives in a reserved field, every other
//! field is a user id whose presence means "liked".

pub use crate::domain::engagement::AGGREGATE_FIELD;

use super::engagement::Lookup;

/// Value stored in a user's field while the like is active.
pub const FLAG_LIKED: &str = "1";

/// Hash key holding every engagement field of one post.
pub fn likes_key(post_id: &str) -> String {
    format!("post:{post_id}:likes")
}

/// Parse a stored aggregate. Negative or non-numeric values are malformed.
pub fn parse_count(raw: Option<String>) -> Lookup<u64> {
    let Some(raw) = raw else {
        return Lookup::Missing;
    };
    match raw.trim().parse::<i64>() {
        Ok(value) if value >= 0 => Lookup::Found(value as u64),
        _ => Lookup::Malformed(raw),
    }
}

/// Parse a stored per-user flag using the boolean spellings other writers emit.
pub fn parse_flag(raw: Option<String>) -> Lookup<bool> {
    let Some(raw) = raw else {
        return Lookup::Missing;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Lookup::Found(true),
        "0" | "f" | "false" => Lookup::Found(false),
        _ => Lookup::Malformed(raw),
    }
}
