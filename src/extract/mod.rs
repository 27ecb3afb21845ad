// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Rendered-output object extraction.
//!
//! Walks the SVG produced by the external renderer, classifies elements by their role
//! markers and correlates them with records parsed from the current source. ER and sequence
//! renderers do not emit stable ids, so their elements are paired with source records in
//! document order and tagged with a synthetic `data-id` attribute.

mod annotate;
mod er;
mod flowchart;
mod sequence;

use std::fmt;

use roxmltree::{Document, Node, ParsingOptions};

pub use annotate::SvgAnnotator;

use crate::model::{DiagramKind, DiagramObjects, DiagramSource};

/// The attribute injected on ER and sequence elements.
pub const DATA_ID_ATTR: &str = "data-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    InvalidSvg { message: String },
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSvg { message } => write!(f, "rendered output is not valid SVG: {message}"),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Result of one extraction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub objects: DiagramObjects,
    /// Markup to display; carries `data-id` attributes for ER and sequence diagrams.
    pub svg: String,
}

/// Renderers emit HTML-flavoured labels that are not well-formed XML.
fn sanitize_markup(svg: &str) -> String {
    svg.replace("<br>", "<br/>").replace("&nbsp;", "&#160;")
}

fn parse_svg(text: &str) -> Result<Document<'_>, ExtractError> {
    let options = ParsingOptions { allow_dtd: true, ..ParsingOptions::default() };
    Document::parse_with_options(text, options)
        .map_err(|err| ExtractError::InvalidSvg { message: err.to_string() })
}

pub(crate) fn has_class(node: Node<'_, '_>, class: &str) -> bool {
    node.attribute("class").is_some_and(|value| value.split_whitespace().any(|c| c == class))
}

/// Whitespace-normalized text of every descendant text node.
pub(crate) fn text_content(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Elements carrying a renderer-assigned `id`, in document order.
pub(crate) fn identified_elements<'a, 'input>(
    doc: &'a Document<'input>,
) -> impl Iterator<Item = (Node<'a, 'input>, &'a str)> {
    doc.descendants()
        .filter(|n| n.is_element())
        .filter_map(|n| n.attribute("id").map(|id| (n, id)))
}

/// Extracts the object list for `kind` from rendered `svg`, using `source` to resolve labels and
/// endpoints the renderer abbreviates.
pub fn extract(
    kind: DiagramKind,
    svg: &str,
    source: &DiagramSource,
) -> Result<Extraction, ExtractError> {
    let text = sanitize_markup(svg);
    let doc = parse_svg(&text)?;
    let mut annotator = SvgAnnotator::new();
    let objects = match kind {
        DiagramKind::Flowchart => flowchart::extract_flowchart(&doc, source),
        DiagramKind::Er => er::extract_er(&doc, source, &mut annotator),
        DiagramKind::Sequence => sequence::extract_sequence(&doc, source, &mut annotator),
    };
    let svg = annotator.apply(&text);
    tracing::debug!(
        kind = %kind,
        objects = objects.len(),
        annotated = svg.len() != text.len(),
        "extracted rendered objects"
    );
    Ok(Extraction { objects, svg })
}

#[cfg(test)]
mod tests {
    use super::{extract, sanitize_markup, ExtractError};
    use crate::model::{DiagramKind, DiagramSource};

    #[test]
    fn sanitizes_html_line_breaks() {
        assert_eq!(sanitize_markup("a<br>b&nbsp;c"), "a<br/>b&#160;c");
    }

    #[test]
    fn malformed_markup_is_an_error() {
        let source = DiagramSource::from_text("flowchart TD\nA\n");
        let err = extract(DiagramKind::Flowchart, "<svg><g></svg>", &source).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidSvg { .. }));
    }
}
