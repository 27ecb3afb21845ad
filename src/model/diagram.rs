// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ids::DiagramId;
use super::source::{BlockRules, DiagramSource};
use crate::format::mermaid::{er, flowchart, sequence};

/// The type of diagram, chosen once per source by sniffing its declaration keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiagramKind {
    Flowchart,
    Sequence,
    Er,
}

const KEYWORDS: &[(&str, DiagramKind)] = &[
    ("flowchart", DiagramKind::Flowchart),
    ("flowchart-elk", DiagramKind::Flowchart),
    ("graph", DiagramKind::Flowchart),
    ("sequenceDiagram", DiagramKind::Sequence),
    ("erDiagram", DiagramKind::Er),
];

fn is_preamble_line(trimmed: &str) -> bool {
    trimmed.is_empty() || trimmed.starts_with("%%")
}

/// Index of the diagram declaration line, skipping blank lines, comments, directives and a
/// leading `---` front-matter block.
pub fn declaration_line(source: &DiagramSource) -> Option<(usize, DiagramKind)> {
    let mut in_front_matter = false;
    let mut seen_content = false;
    for (idx, line) in source.lines().iter().enumerate() {
        let trimmed = line.trim();
        if trimmed == "---" && (!seen_content || in_front_matter) {
            in_front_matter = !in_front_matter;
            seen_content = true;
            continue;
        }
        if in_front_matter || is_preamble_line(trimmed) {
            continue;
        }
        let keyword = trimmed.split_whitespace().next().unwrap_or_default();
        return KEYWORDS
            .iter()
            .find(|(candidate, _)| *candidate == keyword)
            .map(|(_, kind)| (idx, *kind));
    }
    None
}

impl DiagramKind {
    pub fn sniff(source: &DiagramSource) -> Option<Self> {
        declaration_line(source).map(|(_, kind)| kind)
    }

    pub fn sniff_text(text: &str) -> Option<Self> {
        Self::sniff(&DiagramSource::from_text(text))
    }

    pub fn default_declaration(self) -> &'static str {
        match self {
            Self::Flowchart => "flowchart TD",
            Self::Sequence => "sequenceDiagram",
            Self::Er => "erDiagram",
        }
    }

    /// A minimal, renderable starting document.
    pub fn template(self) -> &'static str {
        match self {
            Self::Flowchart => "flowchart TD\n    A[\"Start\"] --> B[\"End\"]\n",
            Self::Sequence => {
                "sequenceDiagram\n    participant p1 as Alice\n    participant p2 as Bob\n    p1->>p2: Hello\n"
            }
            Self::Er => {
                "erDiagram\n    CUSTOMER {\n        string id PK\n    }\n    ORDER {\n        string id PK\n    }\n    CUSTOMER ||--o{ ORDER : places\n"
            }
        }
    }

    pub fn block_rules(self) -> BlockRules {
        match self {
            Self::Flowchart => flowchart::BLOCK_RULES,
            Self::Sequence => sequence::BLOCK_RULES,
            Self::Er => er::BLOCK_RULES,
        }
    }
}

impl fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Flowchart => "flowchart",
            Self::Sequence => "sequence",
            Self::Er => "er",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDiagramKind;

impl fmt::Display for UnknownDiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected 'flowchart', 'graph', 'sequenceDiagram' or 'erDiagram' declaration")
    }
}

impl std::error::Error for UnknownDiagramKind {}

/// A single diagram document plus its revision counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagram {
    diagram_id: DiagramId,
    name: String,
    kind: DiagramKind,
    source: DiagramSource,
    rev: u64,
}

impl Diagram {
    pub fn new(
        diagram_id: DiagramId,
        name: impl Into<String>,
        kind: DiagramKind,
        source: DiagramSource,
    ) -> Self {
        Self { diagram_id, name: name.into(), kind, source, rev: 0 }
    }

    pub fn from_text(
        diagram_id: DiagramId,
        name: impl Into<String>,
        text: &str,
    ) -> Result<Self, UnknownDiagramKind> {
        let source = DiagramSource::from_text(text);
        let kind = DiagramKind::sniff(&source).ok_or(UnknownDiagramKind)?;
        Ok(Self::new(diagram_id, name, kind, source))
    }

    pub fn diagram_id(&self) -> &DiagramId {
        &self.diagram_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn kind(&self) -> DiagramKind {
        self.kind
    }

    pub fn source(&self) -> &DiagramSource {
        &self.source
    }

    /// Replaces the source wholesale, re-sniffing the kind when the new text declares one.
    pub fn replace_source(&mut self, source: DiagramSource) -> DiagramSource {
        if let Some(kind) = DiagramKind::sniff(&source) {
            self.kind = kind;
        }
        std::mem::replace(&mut self.source, source)
    }

    pub fn rev(&self) -> u64 {
        self.rev
    }

    pub fn set_rev(&mut self, rev: u64) {
        self.rev = rev;
    }

    pub fn bump_rev(&mut self) {
        self.rev = self.rev.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{declaration_line, Diagram, DiagramKind};
    use crate::model::{DiagramId, DiagramSource};

    #[test]
    fn sniffs_kind_from_first_meaningful_line() {
        assert_eq!(DiagramKind::sniff_text("\n%% note\ngraph LR\nA"), Some(DiagramKind::Flowchart));
        assert_eq!(DiagramKind::sniff_text("sequenceDiagram\n"), Some(DiagramKind::Sequence));
        assert_eq!(DiagramKind::sniff_text("erDiagram"), Some(DiagramKind::Er));
        assert_eq!(DiagramKind::sniff_text("pie\n"), None);
        assert_eq!(DiagramKind::sniff_text(""), None);
    }

    #[test]
    fn skips_front_matter_before_declaration() {
        let source = DiagramSource::from_text("---\ntitle: Demo\n---\nflowchart LR\nA");
        assert_eq!(declaration_line(&source), Some((3, DiagramKind::Flowchart)));
    }

    #[test]
    fn templates_sniff_as_their_own_kind() {
        for kind in [DiagramKind::Flowchart, DiagramKind::Sequence, DiagramKind::Er] {
            let source = DiagramSource::from_text(kind.template());
            assert_eq!(DiagramKind::sniff(&source), Some(kind));
            assert!(source.check_balance(kind.block_rules()).is_ok());
        }
    }

    #[test]
    fn replacing_source_keeps_rev_and_follows_declaration() {
        let id = DiagramId::new("d1").expect("diagram id");
        let mut diagram = Diagram::from_text(id, "Example", "flowchart TD\nA").expect("diagram");
        diagram.bump_rev();
        diagram.replace_source(DiagramSource::from_text("erDiagram\nA"));
        assert_eq!(diagram.kind(), DiagramKind::Er);
        assert_eq!(diagram.rev(), 1);
        diagram.replace_source(DiagramSource::default());
        assert_eq!(diagram.kind(), DiagramKind::Er);
    }
}
