// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Line-oriented text model.
//!
//! `DiagramSource` is the only authoritative representation of a diagram. Every structured view is
//! derived from it by a full reparse, and every mutation goes through the primitives below so line
//! bookkeeping stays in one place.

use std::fmt;
use std::ops::Range;

use memchr::memchr_iter;

/// Predicates describing how a diagram kind opens and closes nested blocks.
///
/// Both predicates receive the trimmed line.
#[derive(Debug, Clone, Copy)]
pub struct BlockRules {
    pub opens: fn(&str) -> bool,
    pub closes: fn(&str) -> bool,
}

/// Inclusive line span of a block: `start` is the opener, `end` the matching terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockSpan {
    pub start: usize,
    pub end: usize,
}

impl BlockSpan {
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index <= self.end
    }

    /// Lines strictly between the opener and the terminator.
    pub fn inner(&self) -> Range<usize> {
        self.start + 1..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    LineOutOfRange { index: usize, len: usize },
    UnexpectedBlockEnd { line_no: usize },
    UnterminatedBlock { line_no: usize },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LineOutOfRange { index, len } => {
                write!(f, "line index {index} is out of range (source has {len} lines)")
            }
            Self::UnexpectedBlockEnd { line_no } => {
                write!(f, "block terminator on line {line_no} has no matching opener")
            }
            Self::UnterminatedBlock { line_no } => {
                write!(f, "block opened on line {line_no} is never terminated")
            }
        }
    }
}

impl std::error::Error for SourceError {}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiagramSource {
    lines: Vec<String>,
    trailing_newline: bool,
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

impl DiagramSource {
    pub fn from_text(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut start = 0usize;
        for idx in memchr_iter(b'\n', text.as_bytes()) {
            lines.push(strip_cr(&text[start..idx]).to_owned());
            start = idx + 1;
        }
        let trailing_newline = !text.is_empty() && start == text.len();
        if start < text.len() {
            lines.push(strip_cr(&text[start..]).to_owned());
        }
        Self { lines, trailing_newline }
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { lines: lines.into_iter().map(Into::into).collect(), trailing_newline: false }
    }

    pub fn to_text(&self) -> String {
        let mut out = self.lines.join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            out.push('\n');
        }
        out
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn check_index(&self, index: usize, allow_end: bool) -> Result<(), SourceError> {
        let len = self.lines.len();
        let ok = if allow_end { index <= len } else { index < len };
        if ok {
            Ok(())
        } else {
            Err(SourceError::LineOutOfRange { index, len })
        }
    }

    pub fn replace_line(&mut self, index: usize, text: impl Into<String>) -> Result<(), SourceError> {
        self.check_index(index, false)?;
        self.lines[index] = text.into();
        Ok(())
    }

    /// Inserts `texts` so the first of them ends up at `index`. Returns the number of lines added.
    pub fn insert_lines<I, S>(&mut self, index: usize, texts: I) -> Result<usize, SourceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.check_index(index, true)?;
        let new_lines = texts.into_iter().map(Into::into).collect::<Vec<String>>();
        let added = new_lines.len();
        self.lines.splice(index..index, new_lines);
        Ok(added)
    }

    pub fn push_line(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    pub fn delete_lines(&mut self, index: usize, count: usize) -> Result<Vec<String>, SourceError> {
        let end = index.saturating_add(count);
        if end > self.lines.len() {
            return Err(SourceError::LineOutOfRange { index: end, len: self.lines.len() });
        }
        Ok(self.lines.drain(index..end).collect())
    }

    /// Deletes every listed line; indices refer to the current (pre-deletion) numbering.
    pub fn delete_line_set(&mut self, indices: impl IntoIterator<Item = usize>) {
        let mut sorted = indices.into_iter().filter(|&i| i < self.lines.len()).collect::<Vec<_>>();
        sorted.sort_unstable();
        sorted.dedup();
        for index in sorted.into_iter().rev() {
            self.lines.remove(index);
        }
    }

    pub fn find_first_matching(&self, pred: impl FnMut(&str) -> bool) -> Option<usize> {
        self.find_first_matching_from(0, pred)
    }

    pub fn find_first_matching_from(
        &self,
        from: usize,
        mut pred: impl FnMut(&str) -> bool,
    ) -> Option<usize> {
        self.lines.iter().enumerate().skip(from).find(|(_, line)| pred(line)).map(|(idx, _)| idx)
    }

    /// Finds the block opened on line `start` using a depth counter.
    pub fn block_at(&self, start: usize, rules: BlockRules) -> Option<BlockSpan> {
        let opener = self.lines.get(start)?;
        if !(rules.opens)(opener.trim()) {
            return None;
        }
        let mut depth = 0usize;
        for (idx, line) in self.lines.iter().enumerate().skip(start) {
            let trimmed = line.trim();
            if (rules.opens)(trimmed) {
                depth += 1;
            } else if (rules.closes)(trimmed) {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(BlockSpan { start, end: idx });
                }
            }
        }
        None
    }

    /// Finds the first line matching `start` and returns its block span.
    pub fn find_block(
        &self,
        mut start: impl FnMut(&str) -> bool,
        rules: BlockRules,
    ) -> Option<BlockSpan> {
        let start_idx = self.find_first_matching(|line| start(line.trim()))?;
        self.block_at(start_idx, rules)
    }

    /// Every block in document order (outer blocks before the blocks they contain).
    pub fn blocks(&self, rules: BlockRules) -> Vec<BlockSpan> {
        let mut open = Vec::<usize>::new();
        let mut spans = Vec::new();
        for (idx, line) in self.lines.iter().enumerate() {
            let trimmed = line.trim();
            if (rules.opens)(trimmed) {
                open.push(idx);
            } else if (rules.closes)(trimmed) {
                if let Some(start) = open.pop() {
                    spans.push(BlockSpan { start, end: idx });
                }
            }
        }
        spans.sort_by_key(|span| span.start);
        spans
    }

    /// Verifies that every opener has exactly one terminator at the same depth.
    pub fn check_balance(&self, rules: BlockRules) -> Result<(), SourceError> {
        let mut open = Vec::<usize>::new();
        for (idx, line) in self.lines.iter().enumerate() {
            let trimmed = line.trim();
            if (rules.opens)(trimmed) {
                open.push(idx);
            } else if (rules.closes)(trimmed) && open.pop().is_none() {
                return Err(SourceError::UnexpectedBlockEnd { line_no: idx + 1 });
            }
        }
        match open.last() {
            Some(&idx) => Err(SourceError::UnterminatedBlock { line_no: idx + 1 }),
            None => Ok(()),
        }
    }
}

/// Leading whitespace of `line`.
pub fn indent_of(line: &str) -> &str {
    let trimmed_len = line.trim_start().len();
    &line[..line.len() - trimmed_len]
}

#[cfg(test)]
mod tests {
    use super::{BlockRules, BlockSpan, DiagramSource, SourceError};

    fn rules() -> BlockRules {
        BlockRules { opens: |line| line.starts_with("subgraph"), closes: |line| line == "end" }
    }

    #[test]
    fn text_roundtrip_preserves_trailing_newline() {
        let text = "flowchart TD\n    A --> B\n";
        let source = DiagramSource::from_text(text);
        assert_eq!(source.len(), 2);
        assert_eq!(source.to_text(), text);

        let no_newline = DiagramSource::from_text("flowchart TD\r\nA");
        assert_eq!(no_newline.lines(), ["flowchart TD", "A"]);
        assert_eq!(no_newline.to_text(), "flowchart TD\nA");
    }

    #[test]
    fn structural_writes_shift_lines() {
        let mut source = DiagramSource::from_lines(["a", "b", "c"]);
        source.insert_lines(1, ["x", "y"]).expect("insert");
        assert_eq!(source.lines(), ["a", "x", "y", "b", "c"]);
        let removed = source.delete_lines(1, 2).expect("delete");
        assert_eq!(removed, vec!["x".to_owned(), "y".to_owned()]);
        source.replace_line(2, "C").expect("replace");
        assert_eq!(source.lines(), ["a", "b", "C"]);
        assert_eq!(
            source.replace_line(3, "nope"),
            Err(SourceError::LineOutOfRange { index: 3, len: 3 })
        );
        source.delete_line_set([0, 2, 2]);
        assert_eq!(source.lines(), ["b"]);
    }

    #[test]
    fn find_block_tracks_nesting_depth() {
        let source = DiagramSource::from_lines([
            "flowchart TD",
            "subgraph outer",
            "  subgraph inner",
            "    A",
            "  end",
            "  B",
            "end",
        ]);
        let outer = source.find_block(|line| line == "subgraph outer", rules()).expect("outer");
        assert_eq!(outer, BlockSpan { start: 1, end: 6 });
        let inner = source.block_at(2, rules()).expect("inner");
        assert_eq!(inner, BlockSpan { start: 2, end: 4 });
        assert_eq!(source.blocks(rules()), vec![outer, inner]);
        assert!(source.check_balance(rules()).is_ok());
    }

    #[test]
    fn balance_check_reports_half_open_blocks() {
        let open = DiagramSource::from_lines(["flowchart TD", "subgraph s", "A"]);
        assert_eq!(open.check_balance(rules()), Err(SourceError::UnterminatedBlock { line_no: 2 }));
        let stray = DiagramSource::from_lines(["flowchart TD", "A", "end"]);
        assert_eq!(stray.check_balance(rules()), Err(SourceError::UnexpectedBlockEnd { line_no: 3 }));
        assert!(open.block_at(1, rules()).is_none());
    }
}
