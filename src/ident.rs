//! Branch-scoped sequential registration numbers (`RYIT/WB-<code>/<seq>`).
//!
//! The next number is derived from the most recently created record in the
//! branch, so two registrations racing on one branch can read the same
//! predecessor. The unique index on `user_id` turns the loser into a
//! duplicate-identifier rejection instead of a silent collision.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, Result};

pub const ID_PREFIX: &str = "RYIT/WB-";

static TRAILING_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)$").unwrap());

/// Sequence number following `last_user_id`, zero-padded to three digits.
///
/// No predecessor, or one without a trailing number, starts at `001`.
/// A predecessor whose number cannot be incremented is rejected.
pub fn next_sequence(last_user_id: Option<&str>) -> Result<String> {
    let Some(caps) = last_user_id.and_then(|id| TRAILING_DIGITS.captures(id)) else {
        return Ok("001".to_string());
    };
    let next = caps[1]
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_add(1))
        .ok_or_else(|| {
            AppError::validation(format!("Registration sequence `{}` is exhausted", &caps[1]))
        })?;
    Ok(format!("{:03}", next))
}

pub fn compose(branch_code: &str, sequence: &str) -> String {
    format!("{}{}/{}", ID_PREFIX, branch_code, sequence)
}

/// Full identifier for the record that follows `last_user_id` in a branch.
pub fn next_user_id(branch_code: &str, last_user_id: Option<&str>) -> Result<String> {
    Ok(compose(branch_code, &next_sequence(last_user_id)?))
}
