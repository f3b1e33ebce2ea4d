//! SEARCH/REPLACE patching for modify actions.
//!
//! A modify body is a list of blocks:
//!
//! ```text
//! <<<<<<< SEARCH
//! find text
//! =======
//! replace text
//! >>>>>>> REPLACE
//! ```
//!
//! Each block replaces the first occurrence of its find text. Blocks apply
//! in order to an in-memory copy; the result is only produced when every
//! block applied.

use crate::action::Modification;
use regex::{Captures, Regex};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};

const SEARCH_MARKER: &str = "<<<<<<< SEARCH";
const DIVIDER: &str = "=======";
const REPLACE_MARKER: &str = ">>>>>>> REPLACE";

/// Longest find text quoted in an error.
const PREVIEW_LEN: usize = 60;

static ENTITY_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn entity_regex() -> Option<&'static Regex> {
    ENTITY_REGEX
        .get_or_init(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]+);").ok())
        .as_ref()
}

/// Why a modify action could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    /// The body held no complete SEARCH/REPLACE block.
    #[error("no SEARCH/REPLACE blocks")]
    NoBlocks,

    /// A block's find text is not in the file, even after entity decoding.
    #[error("block {index}: search text not found: {preview:?}")]
    NotFound { index: usize, preview: String },
}

enum BlockState {
    Outside,
    Find(Vec<String>),
    Replace(Vec<String>, Vec<String>),
}

/// Parse a modify action body into find/replace pairs.
///
/// Malformed or unterminated blocks are logged and skipped.
pub fn parse_blocks(body: &str) -> Vec<Modification> {
    let mut blocks = Vec::new();
    let mut state = BlockState::Outside;

    for line in body.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let marker = line.trim_end();

        state = match state {
            BlockState::Outside => {
                if marker == SEARCH_MARKER {
                    BlockState::Find(Vec::new())
                } else {
                    if !marker.is_empty() {
                        debug!(line = marker, "Ignoring text outside SEARCH/REPLACE blocks");
                    }
                    BlockState::Outside
                }
            }
            BlockState::Find(mut find) => {
                if marker == DIVIDER {
                    BlockState::Replace(find, Vec::new())
                } else if marker == SEARCH_MARKER {
                    warn!("SEARCH block without divider, discarding it");
                    BlockState::Find(Vec::new())
                } else {
                    find.push(line.to_string());
                    BlockState::Find(find)
                }
            }
            BlockState::Replace(find, mut replace) => {
                if marker.starts_with(REPLACE_MARKER) {
                    let find = find.join("\n");
                    if find.is_empty() {
                        warn!("SEARCH block with empty search text, skipping it");
                    } else {
                        blocks.push(Modification::new(find, replace.join("\n")));
                    }
                    BlockState::Outside
                } else if marker == SEARCH_MARKER {
                    warn!("SEARCH block without REPLACE marker, discarding it");
                    BlockState::Find(Vec::new())
                } else {
                    replace.push(line.to_string());
                    BlockState::Replace(find, replace)
                }
            }
        };
    }

    if !matches!(state, BlockState::Outside) {
        warn!("Unterminated SEARCH/REPLACE block at end of body, skipping it");
    }

    blocks
}

/// Apply every modification in order.
///
/// Returns the patched content, or the first failure. On failure the caller
/// must leave the file untouched.
pub fn apply(content: &str, modifications: &[Modification]) -> Result<String, PatchError> {
    if modifications.is_empty() {
        return Err(PatchError::NoBlocks);
    }

    let mut current = content.to_string();
    for (index, modification) in modifications.iter().enumerate() {
        current = apply_one(&current, modification).ok_or_else(|| PatchError::NotFound {
            index,
            preview: preview(&modification.find),
        })?;
    }
    Ok(current)
}

fn apply_one(content: &str, modification: &Modification) -> Option<String> {
    if let Some(patched) = replace_first(content, &modification.find, &modification.replace) {
        return Some(patched);
    }

    let find = decode_html_entities(&modification.find);
    if find == modification.find {
        return None;
    }
    debug!("Search text not found verbatim, retrying with HTML entities decoded");
    let replace = decode_html_entities(&modification.replace);
    replace_first(content, &find, &replace)
}

fn replace_first(content: &str, find: &str, replace: &str) -> Option<String> {
    let start = content.find(find)?;
    let occurrences = content.matches(find).count();
    if occurrences > 1 {
        warn!(
            occurrences,
            find = %preview(find),
            "Search text occurs more than once, replacing only the first occurrence"
        );
    }

    let mut patched = String::with_capacity(content.len() + replace.len());
    patched.push_str(&content[..start]);
    patched.push_str(replace);
    patched.push_str(&content[start + find.len()..]);
    Some(patched)
}

/// Decode the HTML entities models tend to emit in code.
///
/// Unknown named entities are left as they are.
pub fn decode_html_entities(text: &str) -> String {
    let Some(re) = entity_regex() else {
        return text.to_string();
    };
    re.replace_all(text, |caps: &Captures<'_>| {
        let entity = &caps[1];
        decode_entity(entity).map_or_else(|| caps[0].to_string(), String::from)
    })
    .into_owned()
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(dec) = entity.strip_prefix('#') {
        return dec.parse().ok().and_then(char::from_u32);
    }
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        // Meant as a plain space in source code
        "nbsp" => Some(' '),
        _ => None,
    }
}

fn preview(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() > PREVIEW_LEN {
        let cut: String = first_line.chars().take(PREVIEW_LEN).collect();
        format!("{cut}...")
    } else {
        first_line.to_string()
    }
}
