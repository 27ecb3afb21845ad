// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use roxmltree::Node;

use super::DATA_ID_ATTR;

/// Collects `data-id` insertions against the parsed markup and splices them in one pass.
#[derive(Debug, Default)]
pub struct SvgAnnotator {
    inserts: Vec<(usize, String)>,
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;").replace('"', "&quot;")
}

impl SvgAnnotator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inserts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty()
    }

    /// Schedules ` data-id="..."` right after the element's tag name. Elements that already
    /// carry the attribute are left alone.
    pub fn tag(&mut self, node: Node<'_, '_>, data_id: &str) {
        if !node.is_element() || node.has_attribute(DATA_ID_ATTR) {
            return;
        }
        let start = node.range().start;
        let Some(after_lt) = node.document().input_text().get(start + 1..) else {
            return;
        };
        let name_len = after_lt
            .find(|ch: char| ch.is_whitespace() || ch == '/' || ch == '>')
            .unwrap_or(after_lt.len());
        let offset = start + 1 + name_len;
        if self.inserts.iter().any(|(existing, _)| *existing == offset) {
            return;
        }
        self.inserts.push((offset, format!(" {DATA_ID_ATTR}=\"{}\"", escape_attr(data_id))));
    }

    /// Applies every insertion, last offset first so earlier offsets stay valid.
    pub fn apply(mut self, text: &str) -> String {
        self.inserts.sort_by(|a, b| b.0.cmp(&a.0));
        let mut out = text.to_owned();
        for (offset, insert) in self.inserts {
            if out.is_char_boundary(offset) {
                out.insert_str(offset, &insert);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use roxmltree::Document;

    use super::SvgAnnotator;

    #[test]
    fn inserts_after_tag_names_and_skips_tagged_elements() {
        let text = r#"<svg><g class="a"/><rect data-id="x"/><g>t</g></svg>"#;
        let doc = Document::parse(text).expect("parse");
        let mut annotator = SvgAnnotator::new();
        for node in doc.descendants().filter(|n| n.is_element()) {
            if node.tag_name().name() != "svg" {
                annotator.tag(node, "id\"1");
            }
        }
        assert_eq!(annotator.len(), 2);
        let out = annotator.apply(text);
        assert_eq!(
            out,
            r#"<svg><g data-id="id&quot;1" class="a"/><rect data-id="x"/><g data-id="id&quot;1">t</g></svg>"#
        );
        assert!(Document::parse(&out).is_ok());
    }
}
