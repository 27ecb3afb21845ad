// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Mermaid line recognizers for the supported diagram kinds.

pub mod er;
pub mod flowchart;
pub mod ident;
pub mod sequence;
pub mod style;

pub use er::{parse_er_source, ErView};
pub use flowchart::{parse_flowchart_source, FlowchartView};
pub use ident::{validate_entity_name, validate_mermaid_ident, MermaidIdentError};
pub use sequence::{parse_sequence_source, SequenceView};

use crate::model::{DiagramKind, DiagramSource};

/// Structured view of a source, one variant per diagram kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceView {
    Flowchart(FlowchartView),
    Er(ErView),
    Sequence(SequenceView),
}

impl SourceView {
    pub fn kind(&self) -> DiagramKind {
        match self {
            Self::Flowchart(_) => DiagramKind::Flowchart,
            Self::Er(_) => DiagramKind::Er,
            Self::Sequence(_) => DiagramKind::Sequence,
        }
    }
}

pub fn parse_source(kind: DiagramKind, source: &DiagramSource) -> SourceView {
    match kind {
        DiagramKind::Flowchart => SourceView::Flowchart(parse_flowchart_source(source)),
        DiagramKind::Er => SourceView::Er(parse_er_source(source)),
        DiagramKind::Sequence => SourceView::Sequence(parse_sequence_source(source)),
    }
}
