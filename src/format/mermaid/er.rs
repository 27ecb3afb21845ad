// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Line recognizers for Mermaid `erDiagram` sources and the derived [`ErView`].

use std::fmt;
use std::ops::Range;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use smol_str::SmolStr;

use super::ident::{ident_len, is_entity_char, quote, unquote};
use crate::model::diagram::declaration_line;
use crate::model::{BlockRules, BlockSpan, DiagramKind, DiagramSource};

pub const BLOCK_RULES: BlockRules = BlockRules { opens: is_entity_block_open, closes: is_entity_block_close };

fn is_entity_block_open(trimmed: &str) -> bool {
    trimmed.ends_with('{') && !trimmed.starts_with("%%")
}

fn is_entity_block_close(trimmed: &str) -> bool {
    trimmed == "}"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum AttributeKey {
    #[serde(rename = "PK")]
    Pk,
    #[serde(rename = "FK")]
    Fk,
    #[serde(rename = "UK")]
    Uk,
}

impl AttributeKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pk => "PK",
            Self::Fk => "FK",
            Self::Uk => "UK",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "PK" => Some(Self::Pk),
            "FK" => Some(Self::Fk),
            "UK" => Some(Self::Uk),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub attr_type: String,
    pub name: String,
    pub keys: SmallVec<[AttributeKey; 3]>,
    pub comment: Option<String>,
}

impl Attribute {
    pub fn new(attr_type: &str, name: &str) -> Self {
        Self { attr_type: attr_type.to_owned(), name: name.to_owned(), keys: SmallVec::new(), comment: None }
    }

    pub fn render(&self) -> String {
        let mut out = format!("{} {}", self.attr_type, self.name);
        if !self.keys.is_empty() {
            out.push(' ');
            out.push_str(&self.keys.iter().map(|key| key.as_str()).collect::<Vec<_>>().join(","));
        }
        if let Some(comment) = &self.comment {
            out.push(' ');
            out.push_str(&quote(comment));
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    ZeroOrOne,
    ExactlyOne,
    ZeroOrMore,
    OneOrMore,
}

impl Cardinality {
    pub const ALL: [Self; 4] = [Self::ZeroOrOne, Self::ExactlyOne, Self::ZeroOrMore, Self::OneOrMore];

    pub fn label(self) -> &'static str {
        match self {
            Self::ZeroOrOne => "Zero or one",
            Self::ExactlyOne => "Exactly one",
            Self::ZeroOrMore => "Zero or more",
            Self::OneOrMore => "One or more",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|card| card.label().eq_ignore_ascii_case(label.trim()))
    }

    /// Token as written on the left-hand entity's side.
    pub fn left_token(self) -> &'static str {
        match self {
            Self::ZeroOrOne => "|o",
            Self::ExactlyOne => "||",
            Self::ZeroOrMore => "}o",
            Self::OneOrMore => "}|",
        }
    }

    /// Token as written on the right-hand entity's side.
    pub fn right_token(self) -> &'static str {
        match self {
            Self::ZeroOrOne => "o|",
            Self::ExactlyOne => "||",
            Self::ZeroOrMore => "o{",
            Self::OneOrMore => "|{",
        }
    }

    pub fn from_left_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|card| card.left_token() == token)
    }

    pub fn from_right_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|card| card.right_token() == token)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Identification {
    /// `--`
    Identifying,
    /// `..`
    NonIdentifying,
}

impl Identification {
    pub fn token(self) -> &'static str {
        match self {
            Self::Identifying => "--",
            Self::NonIdentifying => "..",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "--" => Some(Self::Identifying),
            ".." => Some(Self::NonIdentifying),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub entity1: SmolStr,
    pub cardinality1: Cardinality,
    pub identification: Identification,
    pub cardinality2: Cardinality,
    pub entity2: SmolStr,
    pub label: String,
}

impl Relationship {
    pub fn render(&self, indent: &str) -> String {
        let label = if self.label.is_empty() || self.label.contains(char::is_whitespace) {
            quote(&self.label)
        } else {
            self.label.clone()
        };
        format!(
            "{indent}{} {}{}{} {} : {label}",
            self.entity1,
            self.cardinality1.left_token(),
            self.identification.token(),
            self.cardinality2.right_token(),
            self.entity2,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityForm {
    /// `NAME` on its own line.
    Bare,
    /// `NAME {` opening a multi-line attribute block.
    BlockOpen,
    /// `NAME{type name}` or `NAME {}` on one line.
    Inline(Vec<Attribute>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityHeader {
    pub name: SmolStr,
    pub name_span: Range<usize>,
    pub alias: Option<String>,
    pub form: EntityForm,
}

fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = None::<usize>;
    let mut in_quotes = false;
    for (idx, ch) in text.char_indices() {
        if ch == '"' {
            if start.is_none() {
                start = Some(idx);
            }
            in_quotes = !in_quotes;
        } else if ch.is_whitespace() && !in_quotes {
            if let Some(s) = start.take() {
                tokens.push(&text[s..idx]);
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(s) = start {
        tokens.push(&text[s..]);
    }
    tokens
}

fn is_word(token: &str) -> bool {
    token.starts_with(|ch: char| ch.is_alphabetic() || ch == '_')
}

/// Parses consecutive `type name [keys] ["comment"]` specs from a token stream.
fn parse_attribute_tokens(tokens: &[&str]) -> Option<Vec<Attribute>> {
    let mut attributes = Vec::new();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let attr_type = tokens[idx];
        let name = tokens.get(idx + 1)?;
        if !is_word(attr_type) || !is_word(name) {
            return None;
        }
        let mut attribute = Attribute::new(attr_type, name);
        idx += 2;
        while let Some(token) = tokens.get(idx) {
            let keys = token
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(|part| AttributeKey::parse(part.trim()))
                .collect::<Option<Vec<_>>>();
            match keys {
                Some(keys) if !keys.is_empty() => {
                    attribute.keys.extend(keys);
                    idx += 1;
                }
                _ => break,
            }
        }
        if let Some(token) = tokens.get(idx) {
            if token.starts_with('"') {
                attribute.comment = Some(unquote(token));
                idx += 1;
            }
        }
        attributes.push(attribute);
    }
    Some(attributes)
}

/// One attribute inside an entity block.
pub fn match_attribute_line(line: &str) -> Option<Attribute> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with("%%") || trimmed.contains(['{', '}']) {
        return None;
    }
    let mut attributes = parse_attribute_tokens(&tokenize(trimmed))?;
    if attributes.len() != 1 {
        return None;
    }
    attributes.pop()
}

pub fn match_entity_header(line: &str) -> Option<EntityHeader> {
    let start = line.len() - line.trim_start().len();
    let trimmed = line.trim();
    if trimmed.starts_with("%%") {
        return None;
    }
    let name_len = ident_len(trimmed, is_entity_char);
    if name_len == 0 || !is_word(trimmed) {
        return None;
    }
    let name = &trimmed[..name_len];
    let mut rest = trimmed[name_len..].trim_start();

    let mut alias = None;
    if let Some(after) = rest.strip_prefix('[') {
        let close = after.find(']')?;
        alias = Some(unquote(&after[..close]));
        rest = after[close + 1..].trim_start();
    }

    let form = if rest.is_empty() {
        EntityForm::Bare
    } else if rest == "{" {
        EntityForm::BlockOpen
    } else {
        let body = rest.strip_prefix('{')?.strip_suffix('}')?;
        EntityForm::Inline(parse_attribute_tokens(&tokenize(body.trim()))?)
    };
    Some(EntityHeader {
        name: SmolStr::new(name),
        name_span: start..start + name_len,
        alias,
        form,
    })
}

pub fn match_relationship_line(line: &str) -> Option<Relationship> {
    let trimmed = line.trim();
    let (left, label) = trimmed.split_once(':')?;
    let tokens = left.split_whitespace().collect::<Vec<_>>();
    let [entity1, op, entity2] = tokens.as_slice() else {
        return None;
    };
    let valid_name = |name: &str| ident_len(name, is_entity_char) == name.len() && is_word(name);
    if !valid_name(entity1) || !valid_name(entity2) || op.len() != 6 || !op.is_ascii() {
        return None;
    }
    Some(Relationship {
        entity1: SmolStr::new(entity1),
        cardinality1: Cardinality::from_left_token(&op[..2])?,
        identification: Identification::from_token(&op[2..4])?,
        cardinality2: Cardinality::from_right_token(&op[4..])?,
        entity2: SmolStr::new(entity2),
        label: unquote(label),
    })
}

pub fn format_entity_block(indent: &str, name: &str, attributes: &[Attribute]) -> Vec<String> {
    let mut lines = Vec::with_capacity(attributes.len() + 2);
    lines.push(format!("{indent}{name} {{"));
    for attribute in attributes {
        lines.push(format!("{indent}    {}", attribute.render()));
    }
    lines.push(format!("{indent}}}"));
    lines
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub name: SmolStr,
    pub alias: Option<String>,
    /// Header line through closing brace; single-line forms have `start == end`.
    pub span: Option<BlockSpan>,
    pub inline: bool,
    /// Attributes with the line they live on.
    pub attributes: Vec<(usize, Attribute)>,
}

impl EntityRecord {
    fn implicit(name: SmolStr) -> Self {
        Self { name, alias: None, span: None, inline: false, attributes: Vec::new() }
    }

    pub fn label(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipRecord {
    pub index: usize,
    pub line_index: usize,
    pub relationship: Relationship,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErView {
    pub declaration_line: Option<usize>,
    /// Every entity in order of first appearance, including those only named by relationships.
    pub entities: Vec<EntityRecord>,
    pub relationships: Vec<RelationshipRecord>,
}

impl ErView {
    pub fn entity(&self, name: &str) -> Option<&EntityRecord> {
        self.entities.iter().find(|entity| entity.name == name)
    }

    fn entity_mut_or_insert(&mut self, name: &SmolStr) -> &mut EntityRecord {
        let position = match self.entities.iter().position(|entity| &entity.name == name) {
            Some(position) => position,
            None => {
                self.entities.push(EntityRecord::implicit(name.clone()));
                self.entities.len() - 1
            }
        };
        &mut self.entities[position]
    }
}

pub fn parse_er_source(source: &DiagramSource) -> ErView {
    let mut view = ErView {
        declaration_line: declaration_line(source)
            .filter(|(_, kind)| *kind == DiagramKind::Er)
            .map(|(idx, _)| idx),
        ..ErView::default()
    };
    let body_start = view.declaration_line.map(|idx| idx + 1).unwrap_or(0);
    let mut open_entity: Option<SmolStr> = None;

    for (idx, line) in source.lines().iter().enumerate().skip(body_start) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("%%") {
            continue;
        }
        if let Some(name) = &open_entity {
            if is_entity_block_close(trimmed) {
                let entity = view.entity_mut_or_insert(name);
                if let Some(span) = entity.span.as_mut() {
                    span.end = idx;
                }
                open_entity = None;
            } else if let Some(attribute) = match_attribute_line(line) {
                view.entity_mut_or_insert(name).attributes.push((idx, attribute));
            }
            continue;
        }
        if let Some(relationship) = match_relationship_line(line) {
            view.entity_mut_or_insert(&relationship.entity1);
            view.entity_mut_or_insert(&relationship.entity2);
            let index = view.relationships.len();
            view.relationships.push(RelationshipRecord { index, line_index: idx, relationship });
            continue;
        }
        if let Some(header) = match_entity_header(line) {
            let entity = view.entity_mut_or_insert(&header.name);
            if header.alias.is_some() {
                entity.alias = header.alias;
            }
            if entity.span.is_none() {
                entity.span = Some(BlockSpan { start: idx, end: idx });
            }
            match header.form {
                EntityForm::Bare => {}
                EntityForm::BlockOpen => open_entity = Some(header.name),
                EntityForm::Inline(attributes) => {
                    entity.inline = true;
                    entity.attributes.extend(attributes.into_iter().map(|attr| (idx, attr)));
                }
            }
        }
    }
    view
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{
        match_attribute_line, match_entity_header, match_relationship_line, parse_er_source,
        AttributeKey, Cardinality, EntityForm, Identification,
    };
    use crate::model::DiagramSource;

    #[test]
    fn attribute_lines_with_keys_and_comment() {
        let attr = match_attribute_line("    string id PK, FK \"the key\"").expect("attribute");
        assert_eq!(attr.attr_type, "string");
        assert_eq!(attr.name, "id");
        assert_eq!(attr.keys.as_slice(), &[AttributeKey::Pk, AttributeKey::Fk]);
        assert_eq!(attr.comment.as_deref(), Some("the key"));
        assert_eq!(attr.render(), "string id PK,FK \"the key\"");
        assert!(match_attribute_line("}").is_none());
        assert!(match_attribute_line("lonely").is_none());
    }

    #[test]
    fn entity_header_forms() {
        let block = match_entity_header("  CUSTOMER {").expect("block");
        assert_eq!(block.name, "CUSTOMER");
        assert_eq!(block.form, EntityForm::BlockOpen);

        let inline = match_entity_header("CUSTOMER{string name}").expect("inline");
        match inline.form {
            EntityForm::Inline(attrs) => assert_eq!(attrs[0].name, "name"),
            other => panic!("unexpected form {other:?}"),
        }

        let aliased = match_entity_header("p[\"Person\"] {").expect("alias");
        assert_eq!(aliased.alias.as_deref(), Some("Person"));
        assert_eq!(match_entity_header("EMPTY {}").map(|h| h.form), Some(EntityForm::Inline(vec![])));
    }

    #[rstest]
    #[case("A ||--o{ B : places", Cardinality::ExactlyOne, Identification::Identifying, Cardinality::ZeroOrMore)]
    #[case("A |o..o| B : \"may have\"", Cardinality::ZeroOrOne, Identification::NonIdentifying, Cardinality::ZeroOrOne)]
    #[case("A }|--|{ B : links", Cardinality::OneOrMore, Identification::Identifying, Cardinality::OneOrMore)]
    #[case("A }o..|| B : x", Cardinality::ZeroOrMore, Identification::NonIdentifying, Cardinality::ExactlyOne)]
    fn relationship_tokens(
        #[case] line: &str,
        #[case] left: Cardinality,
        #[case] ident: Identification,
        #[case] right: Cardinality,
    ) {
        let rel = match_relationship_line(line).expect("relationship");
        assert_eq!(rel.entity1, "A");
        assert_eq!(rel.entity2, "B");
        assert_eq!(rel.cardinality1, left);
        assert_eq!(rel.identification, ident);
        assert_eq!(rel.cardinality2, right);
        assert_eq!(match_relationship_line(&rel.render("")), Some(rel));
    }

    #[test]
    fn cardinality_labels_round_trip() {
        for card in Cardinality::ALL {
            assert_eq!(Cardinality::from_label(card.label()), Some(card));
        }
        assert_eq!(Cardinality::from_label("Zero or one").map(|c| c.left_token()), Some("|o"));
    }

    #[test]
    fn view_tracks_blocks_inline_entities_and_implicit_ones() {
        let source = DiagramSource::from_text(
            "erDiagram\n    CUSTOMER {\n        string id PK\n        string name\n    }\n    ITEM{int qty}\n    CUSTOMER ||--o{ ORDER : places\n",
        );
        let view = parse_er_source(&source);
        let names = view.entities.iter().map(|e| e.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["CUSTOMER", "ITEM", "ORDER"]);
        let customer = view.entity("CUSTOMER").expect("customer");
        assert_eq!(customer.span.map(|s| (s.start, s.end)), Some((1, 4)));
        assert_eq!(customer.attributes.len(), 2);
        assert!(view.entity("ITEM").is_some_and(|e| e.inline));
        assert!(view.entity("ORDER").is_some_and(|e| e.span.is_none()));
        assert_eq!(view.relationships[0].line_index, 6);
    }
}
