//! Best-effort recovery of structured results from model output
//!
//! Models are asked for JSON but routinely wrap it in prose, markdown fences
//! or block quotes, or leave trailing commas behind. [`decode_structured`]
//! runs an ordered chain of pure strategies and returns the first success:
//!
//! 1. [`decode_strict`] - the whole payload is JSON
//! 2. [`decode_fenced`] - the first fenced code block, after stripping
//!    block-quote markers and trailing commas
//! 3. [`decode_balanced`] - the first balanced `{...}` / `[...]` region,
//!    found with a string-aware bracket scan

use crate::types::{AppError, Result};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("valid fence regex")
});

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("valid trailing comma regex"));

/// Why a single strategy could not produce a value
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON for the expected shape: {0}")]
    Invalid(String),
    #[error("no fenced code block found")]
    NoFence,
    #[error("no balanced bracketed region found")]
    NoRegion,
}

/// A single recovery strategy
pub type Strategy<T> = fn(&str) -> std::result::Result<T, DecodeError>;

/// The strategies in the order [`decode_structured`] tries them
pub fn strategies<T: DeserializeOwned>() -> [(&'static str, Strategy<T>); 3] {
    [
        ("strict", decode_strict::<T>),
        ("fenced", decode_fenced::<T>),
        ("balanced", decode_balanced::<T>),
    ]
}

/// Decode `text` into `T`, trying each strategy in turn.
///
/// Fails with [`AppError::MalformedResponse`] when none of them succeeds.
pub fn decode_structured<T: DeserializeOwned>(text: &str) -> Result<T> {
    for (name, strategy) in strategies::<T>() {
        match strategy(text) {
            Ok(value) => {
                tracing::debug!(strategy = name, "Decoded structured model output");
                return Ok(value);
            }
            Err(err) => tracing::trace!(strategy = name, "Decode strategy failed: {}", err),
        }
    }

    Err(AppError::MalformedResponse(
        "no valid structured result found".to_string(),
    ))
}

pub fn decode_strict<T: DeserializeOwned>(text: &str) -> std::result::Result<T, DecodeError> {
    serde_json::from_str(text.trim()).map_err(|e| DecodeError::Invalid(e.to_string()))
}

pub fn decode_fenced<T: DeserializeOwned>(text: &str) -> std::result::Result<T, DecodeError> {
    let unquoted = strip_block_quotes(text);
    let block = FENCE
        .captures(&unquoted)
        .and_then(|caps| caps.get(1))
        .ok_or(DecodeError::NoFence)?;
    let cleaned = strip_trailing_commas(block.as_str());
    serde_json::from_str(cleaned.trim()).map_err(|e| DecodeError::Invalid(e.to_string()))
}

pub fn decode_balanced<T: DeserializeOwned>(text: &str) -> std::result::Result<T, DecodeError> {
    let region = first_balanced_region(text).ok_or(DecodeError::NoRegion)?;
    serde_json::from_str(region).map_err(|e| DecodeError::Invalid(e.to_string()))
}

/// Drop leading `>` markers that chat UIs and some models add to quoted blocks
fn strip_block_quotes(text: &str) -> String {
    text.lines()
        .map(|line| {
            let trimmed = line.trim_start();
            match trimmed.strip_prefix('>') {
                Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
                None => line,
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_trailing_commas(text: &str) -> String {
    TRAILING_COMMA.replace_all(text, "$1").into_owned()
}

/// Locate the first `{...}` or `[...]` region whose brackets balance.
///
/// Brackets inside JSON string literals (including escaped quotes) are
/// ignored. Returns `None` if the first opening bracket is never closed.
pub fn first_balanced_region(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(ch) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}
