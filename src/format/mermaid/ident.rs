// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MermaidIdentError {
    Empty,
    ContainsWhitespace,
    InvalidChar { ch: char },
    ReservedKeyword,
}

impl fmt::Display for MermaidIdentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("must not be empty"),
            Self::ContainsWhitespace => f.write_str("must not contain whitespace"),
            Self::InvalidChar { ch } => write!(f, "contains invalid character: '{ch}'"),
            Self::ReservedKeyword => f.write_str("is a reserved Mermaid keyword"),
        }
    }
}

impl std::error::Error for MermaidIdentError {}

const RESERVED: &[&str] = &["end", "subgraph", "style", "class", "classDef", "linkStyle", "click"];

pub(crate) fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// ER entity names additionally allow `-`.
pub(crate) fn is_entity_char(ch: char) -> bool {
    is_ident_char(ch) || ch == '-'
}

fn validate_with(ident: &str, allowed: fn(char) -> bool) -> Result<(), MermaidIdentError> {
    if ident.is_empty() {
        return Err(MermaidIdentError::Empty);
    }
    if ident.chars().any(char::is_whitespace) {
        return Err(MermaidIdentError::ContainsWhitespace);
    }
    if let Some(ch) = ident.chars().find(|c| !allowed(*c)) {
        return Err(MermaidIdentError::InvalidChar { ch });
    }
    if RESERVED.contains(&ident) {
        return Err(MermaidIdentError::ReservedKeyword);
    }
    Ok(())
}

pub fn validate_mermaid_ident(ident: &str) -> Result<(), MermaidIdentError> {
    validate_with(ident, is_ident_char)
}

pub fn validate_entity_name(name: &str) -> Result<(), MermaidIdentError> {
    validate_with(name, is_entity_char)
}

/// Length in bytes of the identifier at the start of `text` (0 when there is none).
pub(crate) fn ident_len(text: &str, allowed: fn(char) -> bool) -> usize {
    text.char_indices().find(|(_, ch)| !allowed(*ch)).map(|(idx, _)| idx).unwrap_or(text.len())
}

/// Strips surrounding double quotes and decodes `#quot;`.
pub(crate) fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed);
    inner.replace("#quot;", "\"")
}

/// Wraps `label` in double quotes, encoding embedded quotes the way Mermaid expects.
pub(crate) fn quote(label: &str) -> String {
    let mut out = String::with_capacity(label.len() + 2);
    out.push('"');
    out.push_str(&label.replace('"', "#quot;"));
    out.push('"');
    out
}

/// Byte index of `needle` in `haystack`, ignoring matches inside double-quoted strings.
pub(crate) fn find_unquoted(haystack: &str, needle: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (idx, ch) in haystack.char_indices() {
        if ch == '"' {
            in_quotes = !in_quotes;
            continue;
        }
        if !in_quotes && haystack[idx..].starts_with(needle) {
            return Some(idx);
        }
    }
    None
}

fn word_regex() -> Option<&'static Regex> {
    static WORD: OnceLock<Option<Regex>> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"[\w-]+").ok()).as_ref()
}

/// Replaces whole-word occurrences of `from` with `to`, leaving double-quoted text untouched.
/// Words are runs of word characters and `-`, so `CUSTOMER` never matches inside `CUSTOMER_ORDER`.
pub(crate) fn replace_word_outside_quotes(line: &str, from: &str, to: &str) -> String {
    let Some(re) = word_regex() else {
        return line.to_owned();
    };

    let mut out = String::with_capacity(line.len());
    for (idx, segment) in line.split('"').enumerate() {
        if idx > 0 {
            out.push('"');
        }
        if idx % 2 == 1 {
            out.push_str(segment);
            continue;
        }
        let replaced = re.replace_all(segment, |caps: &regex::Captures<'_>| {
            let word = &caps[0];
            if word == from { to.to_owned() } else { word.to_owned() }
        });
        out.push_str(&replaced);
    }
    out
}
