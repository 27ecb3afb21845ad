// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Identifier the editor shell uses to address a stored diagram.
///
/// Only enforces that the id is non-empty and free of whitespace, because ids are embedded in
/// render request ids handed to the external renderer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiagramId(String);

impl DiagramId {
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        validate_id(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DiagramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DiagramId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for DiagramId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for DiagramId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl TryFrom<String> for DiagramId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    Empty,
    ContainsWhitespace,
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("id must not be empty"),
            Self::ContainsWhitespace => f.write_str("id must not contain whitespace"),
        }
    }
}

impl std::error::Error for IdError {}

fn validate_id(value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty);
    }
    if value.chars().any(char::is_whitespace) {
        return Err(IdError::ContainsWhitespace);
    }
    Ok(())
}

/// Per-session serial counters used when new identifiers have to be synthesized.
///
/// Counters only ever move forward; a candidate that is already taken in the current source is
/// skipped, so the generated id is always fresh for the document it is inserted into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdAllocator {
    next_node: u32,
    next_subgraph: u32,
    next_entity: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_node_id(&mut self, taken: impl Fn(&str) -> bool) -> String {
        next_free("N", &mut self.next_node, taken)
    }

    pub fn next_subgraph_id(&mut self, taken: impl Fn(&str) -> bool) -> String {
        next_free("subGraph", &mut self.next_subgraph, taken)
    }

    pub fn next_entity_name(&mut self, taken: impl Fn(&str) -> bool) -> String {
        next_free("ENTITY", &mut self.next_entity, taken)
    }
}

fn next_free(prefix: &str, counter: &mut u32, taken: impl Fn(&str) -> bool) -> String {
    let mut buffer = itoa::Buffer::new();
    loop {
        *counter = counter.saturating_add(1);
        let mut candidate = String::with_capacity(prefix.len() + 4);
        candidate.push_str(prefix);
        candidate.push_str(buffer.format(*counter));
        if !taken(&candidate) {
            return candidate;
        }
    }
}

/// Returns `base` suffixed with the first `_<n>` (n >= 1) that is not taken.
pub fn suffixed_id(base: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut buffer = itoa::Buffer::new();
    let mut n = 1u32;
    loop {
        let candidate = format!("{base}_{}", buffer.format(n));
        if !taken(&candidate) {
            return candidate;
        }
        n = n.saturating_add(1);
    }
}

/// Returns `prefix` followed by the first positive number that is not taken (`p1`, `p2`, ...).
pub fn numbered_id(prefix: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut buffer = itoa::Buffer::new();
    let mut n = 1u32;
    loop {
        let candidate = format!("{prefix}{}", buffer.format(n));
        if !taken(&candidate) {
            return candidate;
        }
        n = n.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{numbered_id, suffixed_id, DiagramId, IdAllocator, IdError};

    #[test]
    fn id_rejects_empty() {
        assert_eq!(DiagramId::new(""), Err(IdError::Empty));
    }

    #[test]
    fn id_rejects_whitespace() {
        assert_eq!(DiagramId::new("a b"), Err(IdError::ContainsWhitespace));
        assert_eq!("d:1".parse::<DiagramId>().map(DiagramId::into_string), Ok("d:1".to_owned()));
    }

    #[test]
    fn allocators_are_independent_per_instance() {
        let mut first = IdAllocator::new();
        let mut second = IdAllocator::new();
        assert_eq!(first.next_node_id(|_| false), "N1");
        assert_eq!(first.next_node_id(|id| id == "N2"), "N3");
        assert_eq!(second.next_node_id(|_| false), "N1");
        assert_eq!(second.next_subgraph_id(|_| false), "subGraph1");
        assert_eq!(second.next_entity_name(|_| false), "ENTITY1");
    }

    #[test]
    fn numbering_skips_taken_candidates() {
        assert_eq!(numbered_id("p", |id| id == "p1" || id == "p2"), "p3");
        assert_eq!(suffixed_id("A", |id| id == "A_1"), "A_2");
    }
}
