// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Line recognizers for the Mermaid `flowchart` subset the editor produces, plus the derived
//! [`FlowchartView`] rebuilt from a [`DiagramSource`] after every change.
//!
//! Recognizers never fail: a line that does not match is opaque and is carried through
//! mutations verbatim.

use std::collections::BTreeMap;
use std::ops::Range;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::ident::{find_unquoted, ident_len, is_ident_char, quote, unquote};
use super::style::{
    match_class_application, match_class_def, match_link_style_directive, match_style_directive,
    ClassApplication, ClassDef, LinkStyleDirective, StyleDirective,
};
use crate::model::diagram::declaration_line;
use crate::model::{BlockRules, BlockSpan, DiagramKind, DiagramSource};

pub const BLOCK_RULES: BlockRules = BlockRules { opens: is_subgraph_open, closes: is_block_end };

fn is_subgraph_open(trimmed: &str) -> bool {
    trimmed == "subgraph" || trimmed.starts_with("subgraph ")
}

pub fn is_block_end(trimmed: &str) -> bool {
    trimmed == "end" || trimmed == "end;"
}

const STATEMENT_KEYWORDS: &[&str] = &[
    "flowchart",
    "graph",
    "subgraph",
    "end",
    "direction",
    "style",
    "linkStyle",
    "class",
    "classDef",
    "click",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NodeShape {
    Rect,
    Round,
    Stadium,
    Subroutine,
    Cylinder,
    Circle,
    DoubleCircle,
    Rhombus,
    Hexagon,
    Asymmetric,
    Parallelogram,
    ParallelogramAlt,
    Trapezoid,
    TrapezoidAlt,
}

impl NodeShape {
    /// Longer and more specific delimiters first, so `(((x)))` is never read as `((...))`.
    pub const MATCH_ORDER: [Self; 14] = [
        Self::DoubleCircle,
        Self::Circle,
        Self::Stadium,
        Self::Round,
        Self::Subroutine,
        Self::Cylinder,
        Self::Parallelogram,
        Self::Trapezoid,
        Self::ParallelogramAlt,
        Self::TrapezoidAlt,
        Self::Rect,
        Self::Hexagon,
        Self::Rhombus,
        Self::Asymmetric,
    ];

    pub fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            Self::Rect => ("[", "]"),
            Self::Round => ("(", ")"),
            Self::Stadium => ("([", "])"),
            Self::Subroutine => ("[[", "]]"),
            Self::Cylinder => ("[(", ")]"),
            Self::Circle => ("((", "))"),
            Self::DoubleCircle => ("(((", ")))"),
            Self::Rhombus => ("{", "}"),
            Self::Hexagon => ("{{", "}}"),
            Self::Asymmetric => (">", "]"),
            Self::Parallelogram => ("[/", "/]"),
            Self::ParallelogramAlt => ("[\\", "\\]"),
            Self::Trapezoid => ("[/", "\\]"),
            Self::TrapezoidAlt => ("[\\", "/]"),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Rect => "rect",
            Self::Round => "round",
            Self::Stadium => "stadium",
            Self::Subroutine => "subroutine",
            Self::Cylinder => "cylinder",
            Self::Circle => "circle",
            Self::DoubleCircle => "double_circle",
            Self::Rhombus => "rhombus",
            Self::Hexagon => "hexagon",
            Self::Asymmetric => "asymmetric",
            Self::Parallelogram => "parallelogram",
            Self::ParallelogramAlt => "parallelogram_alt",
            Self::Trapezoid => "trapezoid",
            Self::TrapezoidAlt => "trapezoid_alt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeForm {
    Classic(NodeShape),
    /// `id@{ shape: ..., label: "..." }`; entries keep their raw values in source order.
    Advanced { entries: Vec<(String, String)> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDefinition {
    pub form: ShapeForm,
    pub raw_label: Option<String>,
    pub label: Option<String>,
}

impl NodeDefinition {
    pub fn classic(shape: NodeShape, label: &str) -> Self {
        Self {
            form: ShapeForm::Classic(shape),
            raw_label: Some(quote(label)),
            label: Some(label.to_owned()),
        }
    }

    /// 2 = shape plus label, 1 = shape only, used to pick the richest known definition.
    pub fn richness(&self) -> u8 {
        if self.label.is_some() {
            2
        } else {
            1
        }
    }

    pub fn shape_name(&self) -> Option<String> {
        match &self.form {
            ShapeForm::Classic(shape) => Some(shape.name().to_owned()),
            ShapeForm::Advanced { entries } => entries
                .iter()
                .find(|(key, _)| key == "shape")
                .map(|(_, value)| unquote(value)),
        }
    }

    /// Same delimiters (or advanced entries) around a new quoted label.
    pub fn with_label(&self, label: &str) -> Self {
        match &self.form {
            ShapeForm::Classic(shape) => Self::classic(*shape, label),
            ShapeForm::Advanced { entries } => {
                let mut entries = entries.clone();
                match entries.iter_mut().find(|(key, _)| key == "label") {
                    Some(entry) => entry.1 = quote(label),
                    None => entries.push(("label".to_owned(), quote(label))),
                }
                Self {
                    form: ShapeForm::Advanced { entries },
                    raw_label: Some(quote(label)),
                    label: Some(label.to_owned()),
                }
            }
        }
    }

    pub fn render(&self, id: &str) -> String {
        match &self.form {
            ShapeForm::Classic(shape) => {
                let (open, close) = shape.delimiters();
                let raw = self.raw_label.clone().unwrap_or_else(|| quote(id));
                format!("{id}{open}{raw}{close}")
            }
            ShapeForm::Advanced { entries } => {
                let body = entries
                    .iter()
                    .map(|(key, value)| format!("{key}: {value}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{id}@{{ {body} }}")
            }
        }
    }
}

/// One node token inside a line. Spans are byte ranges into that line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeToken {
    pub id: SmolStr,
    pub id_span: Range<usize>,
    pub span: Range<usize>,
    pub definition: Option<NodeDefinition>,
    pub class_suffix: Option<SmolStr>,
}

impl NodeToken {
    pub fn text<'a>(&self, line: &'a str) -> &'a str {
        &line[self.span.clone()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArrowKind {
    Arrow,
    Open,
    Dotted,
    Thick,
    Bidirectional,
    CircleEnd,
    CircleBoth,
    CrossEnd,
    CrossBoth,
}

impl ArrowKind {
    /// Longest tokens first so `<-->` and `o--o` win over their prefixes.
    const SCAN_ORDER: [Self; 9] = [
        Self::Bidirectional,
        Self::CircleBoth,
        Self::CrossBoth,
        Self::Dotted,
        Self::Arrow,
        Self::Open,
        Self::Thick,
        Self::CircleEnd,
        Self::CrossEnd,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Self::Arrow => "-->",
            Self::Open => "---",
            Self::Dotted => "-.->",
            Self::Thick => "==>",
            Self::Bidirectional => "<-->",
            Self::CircleEnd => "--o",
            Self::CircleBoth => "o--o",
            Self::CrossEnd => "--x",
            Self::CrossBoth => "x--x",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::SCAN_ORDER.into_iter().find(|kind| kind.token() == token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMatch {
    pub source: NodeToken,
    pub target: NodeToken,
    pub arrow: ArrowKind,
    pub text: Option<String>,
    /// Everything between the two node tokens (arrow, text and surrounding whitespace).
    pub connector: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgraphHeader {
    pub id: SmolStr,
    pub id_span: Range<usize>,
    pub label: Option<String>,
}

fn skip_ws(line: &str, pos: usize) -> usize {
    let rest = &line[pos..];
    pos + (rest.len() - rest.trim_start().len())
}

fn is_statement_end(rest: &str) -> bool {
    let rest = rest.trim();
    rest.is_empty() || rest == ";"
}

/// Index of `close` in `after_open`, honoring a quoted label and rejecting labels that contain
/// the closing delimiter's last character.
fn find_shape_close(after_open: &str, close: &str) -> Option<usize> {
    let lead = after_open.len() - after_open.trim_start().len();
    if after_open[lead..].starts_with('"') {
        let quote_end = after_open[lead + 1..].find('"')? + lead + 1;
        let after_quote = skip_ws(after_open, quote_end + 1);
        return after_open[after_quote..].starts_with(close).then_some(after_quote);
    }
    let idx = after_open.find(close)?;
    let last = close.chars().last()?;
    (!after_open[..idx].contains(last)).then_some(idx)
}

fn match_shape(text: &str) -> Option<(NodeShape, &str, usize)> {
    for shape in NodeShape::MATCH_ORDER {
        let (open, close) = shape.delimiters();
        let Some(after_open) = text.strip_prefix(open) else {
            continue;
        };
        if let Some(end) = find_shape_close(after_open, close) {
            return Some((shape, &after_open[..end], open.len() + end + close.len()));
        }
    }
    None
}

fn split_unquoted(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0usize;
    for (idx, ch) in text.char_indices() {
        if ch == '"' {
            in_quotes = !in_quotes;
        } else if ch == separator && !in_quotes {
            parts.push(&text[start..idx]);
            start = idx + ch.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

fn parse_advanced(body: &str) -> NodeDefinition {
    let mut entries = Vec::new();
    for part in split_unquoted(body, ',') {
        let Some((key, value)) = part.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if !key.is_empty() {
            entries.push((key.to_owned(), value.trim().to_owned()));
        }
    }
    let raw_label = entries.iter().find(|(key, _)| key == "label").map(|(_, value)| value.clone());
    let label = raw_label.as_deref().map(unquote);
    NodeDefinition { form: ShapeForm::Advanced { entries }, raw_label, label }
}

/// Scans one node token (`id`, `id<delims>`, `id@{...}`, optional `:::class`) at `start`.
pub fn scan_node_token(line: &str, start: usize) -> Option<NodeToken> {
    let id_len = ident_len(&line[start..], is_ident_char);
    if id_len == 0 {
        return None;
    }
    let id_end = start + id_len;
    let mut pos = id_end;

    let definition = if line[pos..].starts_with("@{") {
        let body_start = pos + 2;
        let close = find_unquoted(&line[body_start..], "}")? + body_start;
        pos = close + 1;
        Some(parse_advanced(&line[body_start..close]))
    } else if let Some((shape, raw, consumed)) = match_shape(&line[pos..]) {
        pos += consumed;
        Some(NodeDefinition {
            form: ShapeForm::Classic(shape),
            raw_label: Some(raw.to_owned()),
            label: Some(unquote(raw)),
        })
    } else {
        None
    };

    let mut class_suffix = None;
    if let Some(rest) = line[pos..].strip_prefix(":::") {
        let len = ident_len(rest, |ch| is_ident_char(ch) || ch == '-');
        if len > 0 {
            class_suffix = Some(SmolStr::new(&rest[..len]));
            pos += 3 + len;
        }
    }

    Some(NodeToken {
        id: SmolStr::new(&line[start..id_end]),
        id_span: start..id_end,
        span: start..pos,
        definition,
        class_suffix,
    })
}

/// A line consisting of exactly one node token: a definition (`A["Start"]`) or a bare reference.
pub fn match_node_definition(line: &str) -> Option<NodeToken> {
    let start = skip_ws(line, 0);
    let token = scan_node_token(line, start)?;
    if !is_statement_end(&line[token.span.end..]) {
        return None;
    }
    if token.definition.is_none() && STATEMENT_KEYWORDS.contains(&token.id.as_str()) {
        return None;
    }
    Some(token)
}

fn scan_connector(line: &str, pos: usize) -> Option<(ArrowKind, Option<String>, usize)> {
    let rest = &line[pos..];

    // `-- text -->` / `-- "text" -->`
    if let Some(after) = rest.strip_prefix("--") {
        if after.starts_with(|ch: char| ch.is_whitespace() || ch == '"') {
            if let Some(close) = find_unquoted(after, "-->") {
                let text = unquote(&after[..close]);
                if !text.is_empty() {
                    return Some((ArrowKind::Arrow, Some(text), pos + 2 + close + 3));
                }
            }
        }
    }

    let kind = ArrowKind::SCAN_ORDER.into_iter().find(|kind| rest.starts_with(kind.token()))?;
    let end = pos + kind.token().len();
    let after_ws = skip_ws(line, end);
    if let Some(piped) = line[after_ws..].strip_prefix('|') {
        let close = piped.find('|')?;
        let text = unquote(&piped[..close]);
        // Inline text only exists for the default arrow.
        return Some((ArrowKind::Arrow, Some(text), after_ws + 1 + close + 1));
    }
    Some((kind, None, end))
}

/// A line holding exactly one connector between two node tokens.
pub fn match_link(line: &str) -> Option<LinkMatch> {
    let start = skip_ws(line, 0);
    let source = scan_node_token(line, start)?;
    if STATEMENT_KEYWORDS.contains(&source.id.as_str()) && source.definition.is_none() {
        return None;
    }
    let connector_start = source.span.end;
    let pos = skip_ws(line, connector_start);
    let (arrow, text, after) = scan_connector(line, pos)?;
    let target_start = skip_ws(line, after);
    let target = scan_node_token(line, target_start)?;
    if !is_statement_end(&line[target.span.end..]) {
        return None;
    }
    Some(LinkMatch { source, target, arrow, text, connector: connector_start..target_start })
}

pub fn match_subgraph_open(line: &str) -> Option<SubgraphHeader> {
    let start = skip_ws(line, 0);
    let rest = line[start..].strip_prefix("subgraph")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let id_start = skip_ws(line, start + "subgraph".len());
    let body = line[id_start..].trim_end();
    if body.starts_with('"') {
        let label = unquote(body);
        return Some(SubgraphHeader {
            id: SmolStr::new(&label),
            id_span: id_start..id_start + body.len(),
            label: Some(label),
        });
    }
    let id_len = ident_len(body, is_ident_char);
    if id_len == 0 {
        return None;
    }
    let after = body[id_len..].trim();
    let label = if let Some(inner) = after.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Some(unquote(inner))
    } else if after.is_empty() {
        None
    } else {
        Some(unquote(after))
    };
    Some(SubgraphHeader {
        id: SmolStr::new(&body[..id_len]),
        id_span: id_start..id_start + id_len,
        label,
    })
}

pub fn format_subgraph_open(indent: &str, id: &str, label: Option<&str>) -> String {
    match label {
        Some(label) => format!("{indent}subgraph {id} [{}]", quote(label)),
        None => format!("{indent}subgraph {id}"),
    }
}

pub fn format_link(
    indent: &str,
    source: &str,
    arrow: ArrowKind,
    text: Option<&str>,
    target: &str,
) -> String {
    format!("{indent}{source} {} {target}", format_connector(arrow, text))
}

/// `-->|text|` when there is text (inline text forces the default arrow), the bare token otherwise.
pub fn format_connector(arrow: ArrowKind, text: Option<&str>) -> String {
    match text {
        Some(text) if text.contains(['|', '"']) => format!("-->|{}|", quote(text)),
        Some(text) => format!("-->|{text}|"),
        None => arrow.token().to_owned(),
    }
}

fn keyword_target_spans(line: &str, keyword: &str) -> Option<Vec<(Range<usize>, SmolStr)>> {
    let start = skip_ws(line, 0);
    let rest = line[start..].strip_prefix(keyword)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let mut pos = skip_ws(line, start + keyword.len());
    let mut spans = Vec::new();
    loop {
        let len = ident_len(&line[pos..], is_ident_char);
        if len == 0 {
            break;
        }
        spans.push((pos..pos + len, SmolStr::new(&line[pos..pos + len])));
        pos += len;
        // only `class` takes a comma separated id list
        if keyword != "class" || !line[pos..].starts_with(',') {
            break;
        }
        pos += 1;
    }
    Some(spans)
}

/// Byte spans of every node/subgraph identifier referenced by `line`.
pub fn id_references(line: &str) -> Vec<(Range<usize>, SmolStr)> {
    if let Some(header) = match_subgraph_open(line) {
        return vec![(header.id_span, header.id)];
    }
    for keyword in ["style", "class", "click"] {
        if let Some(spans) = keyword_target_spans(line, keyword) {
            return spans;
        }
    }
    if let Some(link) = match_link(line) {
        return vec![(link.source.id_span, link.source.id), (link.target.id_span, link.target.id)];
    }
    if let Some(token) = match_node_definition(line) {
        return vec![(token.id_span, token.id)];
    }
    Vec::new()
}

/// Rewrites identifier references in `line` through `map`; label text is never touched.
pub fn rewrite_ids(line: &str, map: &BTreeMap<SmolStr, SmolStr>) -> String {
    let mut out = line.to_owned();
    let mut refs = id_references(line);
    refs.sort_by_key(|(span, _)| std::cmp::Reverse(span.start));
    for (span, id) in refs {
        if let Some(new_id) = map.get(&id) {
            out.replace_range(span, new_id);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMention {
    pub line_index: usize,
    pub span: Range<usize>,
    pub standalone: bool,
    pub defines: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowNodeRecord {
    pub id: SmolStr,
    /// Richest definition seen; ties go to the first one in document order.
    pub definition: Option<NodeDefinition>,
    pub definition_line: Option<usize>,
    pub mentions: Vec<NodeMention>,
    pub subgraph: Option<SmolStr>,
}

impl FlowNodeRecord {
    pub fn label(&self) -> &str {
        self.definition.as_ref().and_then(|def| def.label.as_deref()).unwrap_or(&self.id)
    }

    pub fn standalone_line(&self) -> Option<usize> {
        self.mentions
            .iter()
            .find(|m| m.standalone && m.defines)
            .or_else(|| self.mentions.iter().find(|m| m.standalone))
            .map(|m| m.line_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowLinkRecord {
    /// 0-based position among all links in document order.
    pub index: usize,
    pub line_index: usize,
    pub link: LinkMatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgraphRecord {
    pub id: SmolStr,
    pub label: Option<String>,
    pub span: BlockSpan,
    pub parent: Option<SmolStr>,
    /// Node ids mentioned on lines directly inside this block.
    pub members: Vec<SmolStr>,
}

impl SubgraphRecord {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlowchartView {
    pub declaration_line: Option<usize>,
    pub nodes: Vec<FlowNodeRecord>,
    pub links: Vec<FlowLinkRecord>,
    pub subgraphs: Vec<SubgraphRecord>,
    pub styles: Vec<(usize, StyleDirective)>,
    pub link_styles: Vec<(usize, LinkStyleDirective)>,
    pub classes: Vec<(usize, ClassApplication)>,
    pub class_defs: Vec<(usize, ClassDef)>,
}

impl FlowchartView {
    pub fn node(&self, id: &str) -> Option<&FlowNodeRecord> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn link(&self, index: usize) -> Option<&FlowLinkRecord> {
        self.links.get(index)
    }

    pub fn subgraph(&self, id: &str) -> Option<&SubgraphRecord> {
        self.subgraphs.iter().find(|subgraph| subgraph.id == id)
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.node(id).is_some() || self.subgraph(id).is_some()
    }

    pub fn links_touching<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a FlowLinkRecord> {
        self.links.iter().filter(move |record| {
            record.link.source.id == id || record.link.target.id == id
        })
    }

    pub fn style_for(&self, id: &str) -> Option<&(usize, StyleDirective)> {
        self.styles.iter().find(|(_, style)| style.target == id)
    }

    /// Subgraph ids from the innermost container of `node_id` outwards.
    pub fn ancestors_of(&self, node_id: &str) -> Vec<SmolStr> {
        let mut chain = Vec::new();
        let mut current = self.node(node_id).and_then(|node| node.subgraph.clone());
        while let Some(id) = current {
            current = self.subgraph(&id).and_then(|subgraph| subgraph.parent.clone());
            chain.push(id);
        }
        chain
    }
}

/// Parses every recognizable flowchart statement in `source`.
pub fn parse_flowchart_source(source: &DiagramSource) -> FlowchartView {
    let mut view = FlowchartView {
        declaration_line: declaration_line(source)
            .filter(|(_, kind)| *kind == DiagramKind::Flowchart)
            .map(|(idx, _)| idx),
        ..FlowchartView::default()
    };
    let body_start = view.declaration_line.map(|idx| idx + 1).unwrap_or(0);
    let mut open = Vec::<usize>::new();

    for (idx, line) in source.lines().iter().enumerate().skip(body_start) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("%%") {
            continue;
        }
        if let Some(header) = match_subgraph_open(line) {
            let parent = open.last().map(|&i| view.subgraphs[i].id.clone());
            open.push(view.subgraphs.len());
            view.subgraphs.push(SubgraphRecord {
                id: header.id,
                label: header.label,
                span: BlockSpan { start: idx, end: idx },
                parent,
                members: Vec::new(),
            });
            continue;
        }
        if is_block_end(trimmed) {
            if let Some(i) = open.pop() {
                view.subgraphs[i].span.end = idx;
            }
            continue;
        }
        if let Some(style) = match_style_directive(line) {
            view.styles.push((idx, style));
            continue;
        }
        if let Some(link_style) = match_link_style_directive(line) {
            view.link_styles.push((idx, link_style));
            continue;
        }
        if let Some(class) = match_class_application(line) {
            view.classes.push((idx, class));
            continue;
        }
        if let Some(class_def) = match_class_def(line) {
            view.class_defs.push((idx, class_def));
            continue;
        }
        let container = open.last().copied();
        if let Some(link) = match_link(line) {
            record_mention(&mut view, &link.source, idx, false, container);
            record_mention(&mut view, &link.target, idx, false, container);
            let index = view.links.len();
            view.links.push(FlowLinkRecord { index, line_index: idx, link });
            continue;
        }
        if let Some(token) = match_node_definition(line) {
            record_mention(&mut view, &token, idx, true, container);
        }
    }

    // Unterminated blocks (hand-written input) extend to the end of the source.
    for i in open {
        view.subgraphs[i].span.end = source.len().saturating_sub(1);
    }

    let subgraph_ids = view.subgraphs.iter().map(|s| s.id.clone()).collect::<Vec<_>>();
    view.nodes.retain(|node| !subgraph_ids.contains(&node.id));
    for subgraph in &mut view.subgraphs {
        subgraph.members.retain(|member| !subgraph_ids.contains(member));
    }
    view
}

fn record_mention(
    view: &mut FlowchartView,
    token: &NodeToken,
    line_index: usize,
    standalone: bool,
    container: Option<usize>,
) {
    let position = match view.nodes.iter().position(|node| node.id == token.id) {
        Some(position) => position,
        None => {
            view.nodes.push(FlowNodeRecord {
                id: token.id.clone(),
                definition: None,
                definition_line: None,
                mentions: Vec::new(),
                subgraph: None,
            });
            view.nodes.len() - 1
        }
    };

    let container_id = container.map(|i| {
        let subgraph = &mut view.subgraphs[i];
        if !subgraph.members.contains(&token.id) {
            subgraph.members.push(token.id.clone());
        }
        subgraph.id.clone()
    });

    let node = &mut view.nodes[position];
    node.mentions.push(NodeMention {
        line_index,
        span: token.span.clone(),
        standalone,
        defines: token.definition.is_some(),
    });
    if let Some(def) = &token.definition {
        let current = node.definition.as_ref().map(NodeDefinition::richness).unwrap_or(0);
        if def.richness() > current {
            node.definition = Some(def.clone());
            node.definition_line = Some(line_index);
        }
    }
    if node.subgraph.is_none() {
        node.subgraph = container_id;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rstest::rstest;
    use smol_str::SmolStr;

    use super::{
        id_references, match_link, match_node_definition, match_subgraph_open,
        parse_flowchart_source, rewrite_ids, ArrowKind, NodeDefinition, NodeShape, ShapeForm,
    };
    use crate::model::DiagramSource;

    #[rstest]
    #[case("A[Start]", NodeShape::Rect, "Start")]
    #[case("A(Start)", NodeShape::Round, "Start")]
    #[case("A([Start])", NodeShape::Stadium, "Start")]
    #[case("A[[Start]]", NodeShape::Subroutine, "Start")]
    #[case("A[(Start)]", NodeShape::Cylinder, "Start")]
    #[case("A((Start))", NodeShape::Circle, "Start")]
    #[case("A(((Start)))", NodeShape::DoubleCircle, "Start")]
    #[case("A{Start}", NodeShape::Rhombus, "Start")]
    #[case("A{{Start}}", NodeShape::Hexagon, "Start")]
    #[case("A>Start]", NodeShape::Asymmetric, "Start")]
    #[case("A[/Start/]", NodeShape::Parallelogram, "Start")]
    #[case("A[\\Start\\]", NodeShape::ParallelogramAlt, "Start")]
    #[case("A[/Start\\]", NodeShape::Trapezoid, "Start")]
    #[case("A[\\Start/]", NodeShape::TrapezoidAlt, "Start")]
    #[case("A[\"Quoted (x)\"]", NodeShape::Rect, "Quoted (x)")]
    fn recognizes_every_classic_shape(
        #[case] line: &str,
        #[case] shape: NodeShape,
        #[case] label: &str,
    ) {
        let token = match_node_definition(line).expect("node definition");
        assert_eq!(token.id, "A");
        let def = token.definition.expect("definition");
        assert_eq!(def.form, ShapeForm::Classic(shape));
        assert_eq!(def.label.as_deref(), Some(label));
    }

    #[test]
    fn recognizes_advanced_form_before_classic_shapes() {
        let token =
            match_node_definition("  db@{ shape: cyl, label: \"Orders [db]\" }").expect("node");
        assert_eq!(token.id, "db");
        let def = token.definition.expect("definition");
        assert_eq!(def.label.as_deref(), Some("Orders [db]"));
        assert_eq!(def.shape_name().as_deref(), Some("cyl"));
        assert_eq!(def.with_label("New").render("db"), "db@{ shape: cyl, label: \"New\" }");
    }

    #[test]
    fn bare_ids_and_keywords() {
        let token = match_node_definition("    B").expect("bare node");
        assert_eq!(token.id, "B");
        assert!(token.definition.is_none());
        assert!(match_node_definition("end").is_none());
        assert!(match_node_definition("direction LR").is_none());
        assert!(match_node_definition("A --> B").is_none());
    }

    #[rstest]
    #[case("A --> B", ArrowKind::Arrow, None)]
    #[case("A --- B", ArrowKind::Open, None)]
    #[case("A -.-> B", ArrowKind::Dotted, None)]
    #[case("A ==> B", ArrowKind::Thick, None)]
    #[case("A <--> B", ArrowKind::Bidirectional, None)]
    #[case("A --o B", ArrowKind::CircleEnd, None)]
    #[case("A o--o B", ArrowKind::CircleBoth, None)]
    #[case("A --x B", ArrowKind::CrossEnd, None)]
    #[case("A x--x B", ArrowKind::CrossBoth, None)]
    #[case("A-->B", ArrowKind::Arrow, None)]
    #[case("A -->|yes| B", ArrowKind::Arrow, Some("yes"))]
    #[case("A -.->|maybe| B", ArrowKind::Arrow, Some("maybe"))]
    #[case("A -- \"no way\" --> B", ArrowKind::Arrow, Some("no way"))]
    #[case("A -- plain --> B", ArrowKind::Arrow, Some("plain"))]
    fn recognizes_connectors(
        #[case] line: &str,
        #[case] arrow: ArrowKind,
        #[case] text: Option<&str>,
    ) {
        let link = match_link(line).expect("link");
        assert_eq!(link.source.id, "A");
        assert_eq!(link.target.id, "B");
        assert_eq!(link.arrow, arrow);
        assert_eq!(link.text.as_deref(), text);
    }

    #[test]
    fn links_carry_inline_definitions_and_reject_chains() {
        let link = match_link("  A[Start] --> B((End))").expect("link");
        assert_eq!(link.source.definition.as_ref().and_then(|d| d.label.as_deref()), Some("Start"));
        assert_eq!(
            link.target.definition.as_ref().map(|d| d.form.clone()),
            Some(ShapeForm::Classic(NodeShape::Circle))
        );
        assert!(match_link("A --> B --> C").is_none());
        assert!(match_link("A & B --> C").is_none());
        assert!(match_link("style A fill:#f00").is_none());
    }

    #[test]
    fn trapezoid_label_does_not_swallow_following_tokens() {
        let link = match_link("A[/in\\] --> B[/out/]").expect("link");
        assert_eq!(
            link.source.definition.map(|d| d.form),
            Some(ShapeForm::Classic(NodeShape::Trapezoid))
        );
        assert_eq!(
            link.target.definition.map(|d| d.form),
            Some(ShapeForm::Classic(NodeShape::Parallelogram))
        );
    }

    #[test]
    fn parses_subgraph_headers() {
        let header = match_subgraph_open("  subgraph one [\"First\"]").expect("header");
        assert_eq!(header.id, "one");
        assert_eq!(header.label.as_deref(), Some("First"));
        let bare = match_subgraph_open("subgraph two").expect("header");
        assert_eq!(bare.label, None);
        assert!(match_subgraph_open("subgraphs").is_none());
    }

    #[test]
    fn view_collects_nodes_links_and_membership() {
        let source = DiagramSource::from_text(
            "flowchart TD\n    A[Start] --> B\n    subgraph s1 [Group]\n        B\n        C((Round))\n    end\n    B -->|go| C\n    style A fill:#f00\n    linkStyle 1 stroke:red\n",
        );
        let view = parse_flowchart_source(&source);
        assert_eq!(view.declaration_line, Some(0));
        let ids = view.nodes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(view.node("A").map(|n| n.label()), Some("Start"));
        assert_eq!(view.node("B").map(|n| n.label()), Some("B"));
        assert_eq!(view.node("B").and_then(|n| n.subgraph.as_deref()), Some("s1"));
        assert_eq!(view.node("A").and_then(|n| n.subgraph.as_deref()), None);
        assert_eq!(view.links.len(), 2);
        assert_eq!(view.links[1].line_index, 6);
        assert_eq!(view.links[1].link.text.as_deref(), Some("go"));
        let subgraph = view.subgraph("s1").expect("subgraph");
        assert_eq!((subgraph.span.start, subgraph.span.end), (2, 5));
        assert_eq!(subgraph.members, vec!["B", "C"]);
        assert_eq!(view.styles.len(), 1);
        assert_eq!(view.link_styles.len(), 1);
    }

    #[test]
    fn richest_definition_tie_goes_to_first_in_document_order() {
        let source = DiagramSource::from_text("flowchart TD\nA --> B\nA[First]\nA(Second)\n");
        let view = parse_flowchart_source(&source);
        let node = view.node("A").expect("node");
        assert_eq!(node.label(), "First");
        assert_eq!(node.definition_line, Some(2));
    }

    #[test]
    fn rewrites_only_identifier_positions() {
        let map: BTreeMap<SmolStr, SmolStr> = [("A".into(), "A_1".into())].into_iter().collect();
        assert_eq!(rewrite_ids("  A[\"A thing\"] --> B", &map), "  A_1[\"A thing\"] --> B");
        assert_eq!(rewrite_ids("class B,A hot", &map), "class B,A_1 hot");
        assert_eq!(rewrite_ids("style AB fill:#fff", &map), "style AB fill:#fff");
        assert_eq!(id_references("click A call cb()").len(), 1);
    }

    #[test]
    fn classic_definitions_render_with_quoted_labels() {
        let def = NodeDefinition::classic(NodeShape::Hexagon, "Say \"hi\"");
        assert_eq!(def.render("H"), "H{{\"Say #quot;hi#quot;\"}}");
    }
}
