use std::sync::LazyLock;

use regex::Regex;

use crate::{
    error::AppError::{self, Validation},
    fact::Choice,
};

pub const MAX_CONTENT_CHARS: usize = 1000;
pub const MAX_VOTER_ID_CHARS: usize = 100;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Trims the content and collapses whitespace runs to a single space.
pub fn normalize_content(input: &str) -> Result<String, AppError> {
    let content = WHITESPACE.replace_all(input.trim(), " ").into_owned();

    if content.is_empty() {
        return Err(Validation("content must not be empty".to_string()));
    }

    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(Validation(format!(
            "content must be at most {MAX_CONTENT_CHARS} characters"
        )));
    }

    Ok(content)
}

/// Voter ids are opaque: they are checked, never rewritten, so `"alice"` and
/// `" alice "` could only collide if both were accepted.
pub fn validate_voter_id(voter_id: &str) -> Result<&str, AppError> {
    if voter_id.trim().is_empty() {
        return Err(Validation("voterId must not be empty".to_string()));
    }

    if voter_id.trim() != voter_id {
        return Err(Validation(
            "voterId must not start or end with whitespace".to_string(),
        ));
    }

    if voter_id.chars().count() > MAX_VOTER_ID_CHARS {
        return Err(Validation(format!(
            "voterId must be at most {MAX_VOTER_ID_CHARS} characters"
        )));
    }

    Ok(voter_id)
}

pub fn parse_choice(choice: Option<&str>) -> Result<Choice, AppError> {
    choice
        .ok_or_else(|| Validation("choice is required".to_string()))?
        .parse()
}
