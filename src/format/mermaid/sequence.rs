// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Line recognizers for Mermaid `sequenceDiagram` sources and the derived [`SequenceView`].

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use smol_str::SmolStr;

use super::ident::unquote;
use crate::model::diagram::declaration_line;
use crate::model::{BlockRules, BlockSpan, DiagramKind, DiagramSource};

pub const BLOCK_RULES: BlockRules = BlockRules { opens: is_block_open, closes: is_block_end };

const BLOCK_KEYWORDS: &[&str] = &["loop", "alt", "opt", "par", "critical", "break", "rect", "box"];

fn first_word(trimmed: &str) -> &str {
    trimmed.split_whitespace().next().unwrap_or_default()
}

fn is_block_open(trimmed: &str) -> bool {
    BLOCK_KEYWORDS.contains(&first_word(trimmed))
}

pub fn is_block_end(trimmed: &str) -> bool {
    trimmed == "end"
}

pub fn is_autonumber(trimmed: &str) -> bool {
    first_word(trimmed) == "autonumber"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantType {
    Participant,
    Actor,
    Boundary,
    Control,
    Entity,
    Database,
    Collections,
    Queue,
}

impl ParticipantType {
    const ALL: [Self; 8] = [
        Self::Participant,
        Self::Actor,
        Self::Boundary,
        Self::Control,
        Self::Entity,
        Self::Database,
        Self::Collections,
        Self::Queue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Participant => "participant",
            Self::Actor => "actor",
            Self::Boundary => "boundary",
            Self::Control => "control",
            Self::Entity => "entity",
            Self::Database => "database",
            Self::Collections => "collections",
            Self::Queue => "queue",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.as_str() == value)
    }

    /// Types that have their own declaration keyword.
    pub fn is_primitive(self) -> bool {
        matches!(self, Self::Participant | Self::Actor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantDecl {
    pub alias: SmolStr,
    pub label: Option<String>,
    pub participant_type: ParticipantType,
}

impl ParticipantDecl {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.alias)
    }
}

fn parse_type_body(body: &str) -> Option<ParticipantType> {
    body.split(',').find_map(|entry| {
        let (key, value) = entry.split_once(':')?;
        (unquote(key) == "type").then(|| ParticipantType::parse(&unquote(value)))?
    })
}

pub fn match_participant(line: &str) -> Option<ParticipantDecl> {
    let trimmed = line.trim();
    let (keyword_type, rest) = if let Some(rest) = trimmed.strip_prefix("participant") {
        (ParticipantType::Participant, rest)
    } else {
        (ParticipantType::Actor, trimmed.strip_prefix("actor")?)
    };
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let alias_end = rest
        .find(|ch: char| ch.is_whitespace())
        .into_iter()
        .chain(rest.find("@{"))
        .min()
        .unwrap_or(rest.len());
    if alias_end == 0 {
        return None;
    }
    let alias = &rest[..alias_end];
    let mut rest = &rest[alias_end..];

    let mut participant_type = keyword_type;
    if let Some(after) = rest.strip_prefix("@{") {
        let close = after.find('}')?;
        participant_type = parse_type_body(&after[..close]).unwrap_or(keyword_type);
        rest = &after[close + 1..];
    }

    let rest = rest.trim();
    let label = if rest.is_empty() {
        None
    } else {
        let label = rest.strip_prefix("as")?;
        if !label.starts_with(char::is_whitespace) {
            return None;
        }
        Some(unquote(label))
    };
    Some(ParticipantDecl { alias: SmolStr::new(alias), label, participant_type })
}

/// Chooses the short keyword form for primitive types and the `@{ "type": ... }` form otherwise.
pub fn format_participant(
    indent: &str,
    alias: &str,
    label: Option<&str>,
    participant_type: ParticipantType,
) -> String {
    let mut out = if participant_type.is_primitive() {
        format!("{indent}{} {alias}", participant_type.as_str())
    } else {
        format!("{indent}participant {alias}@{{ \"type\": \"{}\" }}", participant_type.as_str())
    };
    if let Some(label) = label.filter(|label| *label != alias) {
        out.push_str(" as ");
        out.push_str(label);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageArrow {
    Solid,
    Dotted,
    SolidArrow,
    DottedArrow,
    SolidCross,
    DottedCross,
    SolidOpen,
    DottedOpen,
}

impl MessageArrow {
    const ALL: [Self; 8] = [
        Self::Solid,
        Self::Dotted,
        Self::SolidArrow,
        Self::DottedArrow,
        Self::SolidCross,
        Self::DottedCross,
        Self::SolidOpen,
        Self::DottedOpen,
    ];

    const TOKENS: [&'static str; 8] = ["->", "-->", "->>", "-->>", "-x", "--x", "-)", "--)"];

    pub fn token(self) -> &'static str {
        match self {
            Self::Solid => "->",
            Self::Dotted => "-->",
            Self::SolidArrow => "->>",
            Self::DottedArrow => "-->>",
            Self::SolidCross => "-x",
            Self::DottedCross => "--x",
            Self::SolidOpen => "-)",
            Self::DottedOpen => "--)",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|arrow| arrow.token() == token)
    }
}

impl fmt::Display for MessageArrow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub from: SmolStr,
    pub to: SmolStr,
    pub arrow: MessageArrow,
    /// `+` or `-` activation marker in front of the target.
    pub activation: Option<char>,
    pub text: String,
}

impl Message {
    pub fn render(&self, indent: &str) -> String {
        let activation = self.activation.map(String::from).unwrap_or_default();
        format!("{indent}{}{}{activation}{}: {}", self.from, self.arrow.token(), self.to, self.text)
    }
}

/// Earliest match wins; on ties the longest needle wins.
fn split_once_any<'a>(
    haystack: &'a str,
    needles: &[&'static str],
) -> Option<(&'a str, &'static str, &'a str)> {
    let mut best: Option<(usize, &'static str)> = None;
    for &needle in needles {
        if let Some(idx) = haystack.find(needle) {
            let take = match best {
                None => true,
                Some((best_idx, best_needle)) => {
                    idx < best_idx || (idx == best_idx && needle.len() > best_needle.len())
                }
            };
            if take {
                best = Some((idx, needle));
            }
        }
    }
    let (idx, needle) = best?;
    Some((&haystack[..idx], needle, &haystack[idx + needle.len()..]))
}

fn is_participant_token(token: &str) -> bool {
    !token.is_empty() && !token.contains(char::is_whitespace)
}

pub fn match_message(line: &str) -> Option<Message> {
    let trimmed = line.trim();
    let (left, text) = trimmed.split_once(':')?;
    let (from, token, to) = split_once_any(left, &MessageArrow::TOKENS)?;
    let from = from.trim();
    let mut to = to.trim();
    let activation = to.chars().next().filter(|ch| matches!(ch, '+' | '-'));
    if let Some(marker) = activation {
        to = to[marker.len_utf8()..].trim_start();
    }
    if !is_participant_token(from) || !is_participant_token(to) {
        return None;
    }
    Some(Message {
        from: SmolStr::new(from),
        to: SmolStr::new(to),
        arrow: MessageArrow::from_token(token)?,
        activation,
        text: text.trim().to_owned(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotePlacement {
    LeftOf,
    RightOf,
    Over,
}

impl NotePlacement {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LeftOf => "left of",
            Self::RightOf => "right of",
            Self::Over => "over",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub placement: NotePlacement,
    pub participants: SmallVec<[SmolStr; 2]>,
    pub text: String,
}

impl Note {
    pub fn render(&self, indent: &str) -> String {
        format!(
            "{indent}Note {} {}: {}",
            self.placement.as_str(),
            self.participants.join(","),
            self.text
        )
    }
}

pub fn match_note(line: &str) -> Option<Note> {
    let trimmed = line.trim();
    let rest = trimmed.strip_prefix("Note").or_else(|| trimmed.strip_prefix("note"))?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let (placement, rest) = [NotePlacement::LeftOf, NotePlacement::RightOf, NotePlacement::Over]
        .into_iter()
        .find_map(|placement| rest.strip_prefix(placement.as_str()).map(|rest| (placement, rest)))?;
    let (targets, text) = rest.split_once(':')?;
    let participants = targets
        .split(',')
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .map(SmolStr::new)
        .collect::<SmallVec<[SmolStr; 2]>>();
    if participants.is_empty() {
        return None;
    }
    Some(Note { placement, participants, text: text.trim().to_owned() })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    Loop,
    Alt,
    Opt,
    Par,
    Critical,
    Break,
    Rect,
}

impl FragmentKind {
    const ALL: [Self; 7] =
        [Self::Loop, Self::Alt, Self::Opt, Self::Par, Self::Critical, Self::Break, Self::Rect];

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Loop => "loop",
            Self::Alt => "alt",
            Self::Opt => "opt",
            Self::Par => "par",
            Self::Critical => "critical",
            Self::Break => "break",
            Self::Rect => "rect",
        }
    }

    /// Keyword that starts an additional section inside the block, if the kind has one.
    pub fn separator(self) -> Option<&'static str> {
        match self {
            Self::Alt => Some("else"),
            Self::Par => Some("and"),
            Self::Critical => Some("option"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentHeader {
    pub kind: FragmentKind,
    pub label: String,
}

pub fn match_fragment_open(line: &str) -> Option<FragmentHeader> {
    let trimmed = line.trim();
    let keyword = first_word(trimmed);
    let kind = FragmentKind::ALL.into_iter().find(|kind| kind.keyword() == keyword)?;
    Some(FragmentHeader { kind, label: trimmed[keyword.len()..].trim().to_owned() })
}

/// `else ...`, `and ...` or `option ...` inside a fragment.
pub fn match_fragment_separator(line: &str) -> Option<(&'static str, String)> {
    let trimmed = line.trim();
    let keyword = first_word(trimmed);
    ["else", "and", "option"]
        .into_iter()
        .find(|candidate| *candidate == keyword)
        .map(|keyword| (keyword, trimmed[keyword.len()..].trim().to_owned()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxHeader {
    pub color: Option<String>,
    pub label: Option<String>,
}

const NAMED_COLORS: &[&str] = &[
    "transparent", "aqua", "black", "blue", "gray", "green", "grey", "lime", "navy", "olive",
    "orange", "purple", "red", "silver", "teal", "white", "yellow",
];

fn is_color_token(token: &str) -> bool {
    token.starts_with('#')
        || token.starts_with("rgb(")
        || token.starts_with("rgba(")
        || token.starts_with("hsl(")
        || NAMED_COLORS.contains(&token.to_ascii_lowercase().as_str())
}

pub fn match_box_open(line: &str) -> Option<BoxHeader> {
    let trimmed = line.trim();
    let rest = trimmed.strip_prefix("box")?;
    if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
        return None;
    }
    let rest = rest.trim();
    let (color, label) = if rest.starts_with("rgb") || rest.starts_with("hsl") {
        match rest.find(')') {
            Some(close) => (Some(&rest[..=close]), rest[close + 1..].trim()),
            None => (None, rest),
        }
    } else {
        let (head, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        if is_color_token(head) {
            (Some(head), tail.trim())
        } else {
            (None, rest)
        }
    };
    Some(BoxHeader {
        color: color.map(str::to_owned),
        label: (!label.is_empty()).then(|| unquote(label)),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRecord {
    pub alias: SmolStr,
    pub label: Option<String>,
    pub participant_type: ParticipantType,
    /// Declaration line, `None` for participants introduced only by a message.
    pub line_index: Option<usize>,
    pub in_box: Option<usize>,
}

impl ParticipantRecord {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.alias)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub index: usize,
    pub line_index: usize,
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRecord {
    pub index: usize,
    pub line_index: usize,
    pub note: Note,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentRecord {
    pub index: usize,
    pub kind: FragmentKind,
    pub label: String,
    pub span: BlockSpan,
    /// Separator lines (`else`, `and`, `option`) with their labels.
    pub sections: Vec<(usize, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxRecord {
    pub index: usize,
    pub color: Option<String>,
    pub label: Option<String>,
    pub span: BlockSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SequenceView {
    pub declaration_line: Option<usize>,
    pub autonumber_line: Option<usize>,
    pub participants: Vec<ParticipantRecord>,
    pub messages: Vec<MessageRecord>,
    pub notes: Vec<NoteRecord>,
    pub fragments: Vec<FragmentRecord>,
    pub boxes: Vec<BoxRecord>,
}

impl SequenceView {
    pub fn participant(&self, alias: &str) -> Option<&ParticipantRecord> {
        self.participants.iter().find(|participant| participant.alias == alias)
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.participant(alias).is_some()
    }

    fn ensure_participant(&mut self, alias: &SmolStr) {
        if !self.has_alias(alias) {
            self.participants.push(ParticipantRecord {
                alias: alias.clone(),
                label: None,
                participant_type: ParticipantType::Participant,
                line_index: None,
                in_box: None,
            });
        }
    }
}

enum OpenBlock {
    Fragment(usize),
    Box(usize),
}

pub fn parse_sequence_source(source: &DiagramSource) -> SequenceView {
    let mut view = SequenceView {
        declaration_line: declaration_line(source)
            .filter(|(_, kind)| *kind == DiagramKind::Sequence)
            .map(|(idx, _)| idx),
        ..SequenceView::default()
    };
    let body_start = view.declaration_line.map(|idx| idx + 1).unwrap_or(0);
    let mut open = Vec::<OpenBlock>::new();

    for (idx, line) in source.lines().iter().enumerate().skip(body_start) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("%%") {
            continue;
        }
        if is_autonumber(trimmed) {
            view.autonumber_line.get_or_insert(idx);
            continue;
        }
        if let Some(decl) = match_participant(line) {
            let in_box = open.iter().rev().find_map(|block| match block {
                OpenBlock::Box(i) => Some(*i),
                OpenBlock::Fragment(_) => None,
            });
            match view.participants.iter_mut().find(|p| p.alias == decl.alias) {
                Some(existing) if existing.line_index.is_none() => {
                    existing.label = decl.label;
                    existing.participant_type = decl.participant_type;
                    existing.line_index = Some(idx);
                    existing.in_box = in_box;
                }
                Some(_) => {}
                None => view.participants.push(ParticipantRecord {
                    alias: decl.alias,
                    label: decl.label,
                    participant_type: decl.participant_type,
                    line_index: Some(idx),
                    in_box,
                }),
            }
            continue;
        }
        if let Some(header) = match_box_open(line) {
            let index = view.boxes.len();
            view.boxes.push(BoxRecord {
                index,
                color: header.color,
                label: header.label,
                span: BlockSpan { start: idx, end: idx },
            });
            open.push(OpenBlock::Box(index));
            continue;
        }
        if let Some(header) = match_fragment_open(line) {
            let index = view.fragments.len();
            view.fragments.push(FragmentRecord {
                index,
                kind: header.kind,
                label: header.label,
                span: BlockSpan { start: idx, end: idx },
                sections: Vec::new(),
            });
            open.push(OpenBlock::Fragment(index));
            continue;
        }
        if is_block_end(trimmed) {
            match open.pop() {
                Some(OpenBlock::Fragment(i)) => view.fragments[i].span.end = idx,
                Some(OpenBlock::Box(i)) => view.boxes[i].span.end = idx,
                None => {}
            }
            continue;
        }
        if let Some((_, label)) = match_fragment_separator(line) {
            if let Some(OpenBlock::Fragment(i)) = open.last() {
                view.fragments[*i].sections.push((idx, label));
            }
            continue;
        }
        if let Some(note) = match_note(line) {
            let index = view.notes.len();
            view.notes.push(NoteRecord { index, line_index: idx, note });
            continue;
        }
        if let Some(message) = match_message(line) {
            view.ensure_participant(&message.from);
            view.ensure_participant(&message.to);
            let index = view.messages.len();
            view.messages.push(MessageRecord { index, line_index: idx, message });
        }
    }
    view
}
