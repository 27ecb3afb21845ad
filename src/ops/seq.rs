// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeSet;

use smallvec::SmallVec;
use smol_str::SmolStr;

use super::{body_indent, ensure_declaration, line_at, ApplyError, MessagePatch, SeqOp};
use crate::format::mermaid::ident::{quote, validate_mermaid_ident};
use crate::format::mermaid::sequence::{
    format_participant, parse_sequence_source, FragmentKind, Message, MessageArrow, Note,
    NotePlacement, ParticipantType, SequenceView,
};
use crate::model::{indent_of, numbered_id, DiagramKind, DiagramSource};
use crate::reconcile::PendingSelection;

pub(super) fn apply_seq_op(
    source: &mut DiagramSource,
    op: &SeqOp,
) -> Result<Option<PendingSelection>, ApplyError> {
    match op {
        SeqOp::AddParticipant { alias, label, participant_type } => {
            add_participant(source, alias.as_deref(), label, *participant_type)
        }
        SeqOp::UpdateParticipant { alias, label, participant_type } => {
            update_participant(source, alias, label.as_deref(), *participant_type)
        }
        SeqOp::DeleteParticipant { alias } => delete_participant(source, alias),
        SeqOp::AddMessage { from, to, arrow, text } => add_message(source, from, to, *arrow, text),
        SeqOp::UpdateMessage { index, patch } => update_message(source, *index, patch),
        SeqOp::DeleteMessage { index } => {
            let view = parse_sequence_source(source);
            let record =
                view.messages.get(*index).ok_or(ApplyError::MessageNotFound { index: *index })?;
            source.delete_lines(record.line_index, 1)?;
            Ok(None)
        }
        SeqOp::AddNote { placement, participants, text } => {
            add_note(source, *placement, participants, text)
        }
        SeqOp::AddFragment { kind, label } => add_fragment(source, *kind, label),
        SeqOp::AddBox { label, color, participants } => {
            add_box(source, label, color.as_deref(), participants)
        }
        SeqOp::ToggleAutonumber => {
            let view = parse_sequence_source(source);
            match view.autonumber_line {
                Some(idx) => {
                    source.delete_lines(idx, 1)?;
                }
                None => {
                    let declaration =
                        ensure_declaration(source, DiagramKind::Sequence, view.declaration_line)?;
                    let indent = body_indent(source, Some(declaration));
                    source.insert_lines(declaration + 1, [format!("{indent}autonumber")])?;
                }
            }
            Ok(None)
        }
    }
}

/// Where a new top-level declaration goes: after the last declared participant (or its box),
/// else after `autonumber`, else right after the diagram declaration.
fn declaration_slot(view: &SequenceView) -> usize {
    let after_declared = view
        .participants
        .iter()
        .filter_map(|participant| {
            let line = participant.line_index?;
            let boxed = participant.in_box.and_then(|index| view.boxes.get(index));
            Some(boxed.map_or(line, |record| record.span.end) + 1)
        })
        .max();
    after_declared
        .or_else(|| view.autonumber_line.or(view.declaration_line).map(|idx| idx + 1))
        .unwrap_or(0)
}

fn require_participant(view: &SequenceView, alias: &str) -> Result<(), ApplyError> {
    if view.has_alias(alias) {
        Ok(())
    } else {
        Err(ApplyError::ParticipantNotFound { alias: alias.to_owned() })
    }
}

fn non_empty(label: &str) -> Option<&str> {
    let label = label.trim();
    (!label.is_empty()).then_some(label)
}

fn add_participant(
    source: &mut DiagramSource,
    alias: Option<&str>,
    label: &str,
    participant_type: ParticipantType,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_sequence_source(source);
    let alias = match alias {
        Some(alias) => {
            validate_mermaid_ident(alias)
                .map_err(|reason| ApplyError::InvalidIdent { id: alias.to_owned(), reason })?;
            if view.has_alias(alias) {
                return Err(ApplyError::AlreadyExists { id: alias.to_owned() });
            }
            alias.to_owned()
        }
        None => numbered_id("p", |candidate| view.has_alias(candidate)),
    };

    let declaration = ensure_declaration(source, DiagramKind::Sequence, view.declaration_line)?;
    let view = parse_sequence_source(source);
    let indent = body_indent(source, Some(declaration));
    let text = format_participant(&indent, &alias, non_empty(label), participant_type);
    source.insert_lines(declaration_slot(&view), [text])?;
    Ok(Some(PendingSelection::Participant { alias }))
}

fn update_participant(
    source: &mut DiagramSource,
    alias: &str,
    label: Option<&str>,
    participant_type: Option<ParticipantType>,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_sequence_source(source);
    let record = view
        .participant(alias)
        .ok_or_else(|| ApplyError::ParticipantNotFound { alias: alias.to_owned() })?;
    let label = match label {
        Some(label) => non_empty(label).map(str::to_owned),
        None => record.label.clone(),
    };
    let participant_type = participant_type.unwrap_or(record.participant_type);

    match record.line_index {
        Some(idx) => {
            let indent = indent_of(line_at(source, idx)?).to_owned();
            let text = format_participant(&indent, alias, label.as_deref(), participant_type);
            source.replace_line(idx, text)?;
        }
        None => {
            // Introduced by a message only; declare it so the change has a line to live on.
            let indent = body_indent(source, view.declaration_line);
            let text = format_participant(&indent, alias, label.as_deref(), participant_type);
            source.insert_lines(declaration_slot(&view), [text])?;
        }
    }
    Ok(Some(PendingSelection::Participant { alias: alias.to_owned() }))
}

fn delete_participant(
    source: &mut DiagramSource,
    alias: &str,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_sequence_source(source);
    let record = view
        .participant(alias)
        .ok_or_else(|| ApplyError::ParticipantNotFound { alias: alias.to_owned() })?;

    let mut remove = BTreeSet::new();
    remove.extend(record.line_index);
    for message in &view.messages {
        if message.message.from == alias || message.message.to == alias {
            remove.insert(message.line_index);
        }
    }
    for entry in &view.notes {
        if !entry.note.participants.iter().any(|p| p == alias) {
            continue;
        }
        let others = entry
            .note
            .participants
            .iter()
            .filter(|p| *p != alias)
            .cloned()
            .collect::<SmallVec<[SmolStr; 2]>>();
        if others.is_empty() {
            remove.insert(entry.line_index);
        } else {
            let indent = indent_of(line_at(source, entry.line_index)?).to_owned();
            let note = Note { participants: others, ..entry.note.clone() };
            source.replace_line(entry.line_index, note.render(&indent))?;
        }
    }

    source.delete_line_set(remove);
    Ok(None)
}

fn add_message(
    source: &mut DiagramSource,
    from: &str,
    to: &str,
    arrow: MessageArrow,
    text: &str,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_sequence_source(source);
    require_participant(&view, from)?;
    require_participant(&view, to)?;

    let message = Message {
        from: SmolStr::new(from),
        to: SmolStr::new(to),
        arrow,
        activation: None,
        text: text.trim().to_owned(),
    };
    let indent = body_indent(source, view.declaration_line);
    source.push_line(message.render(&indent));
    Ok(Some(PendingSelection::Message { index: view.messages.len() }))
}

fn update_message(
    source: &mut DiagramSource,
    index: usize,
    patch: &MessagePatch,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_sequence_source(source);
    let record = view.messages.get(index).ok_or(ApplyError::MessageNotFound { index })?;

    let mut message = record.message.clone();
    if let Some(from) = &patch.from {
        require_participant(&view, from)?;
        message.from = SmolStr::new(from);
    }
    if let Some(to) = &patch.to {
        require_participant(&view, to)?;
        message.to = SmolStr::new(to);
    }
    if let Some(arrow) = patch.arrow {
        message.arrow = arrow;
    }
    if let Some(text) = &patch.text {
        message.text = text.trim().to_owned();
    }

    let indent = indent_of(line_at(source, record.line_index)?).to_owned();
    source.replace_line(record.line_index, message.render(&indent))?;
    Ok(Some(PendingSelection::Message { index }))
}

fn add_note(
    source: &mut DiagramSource,
    placement: NotePlacement,
    participants: &[String],
    text: &str,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_sequence_source(source);
    if participants.is_empty() {
        return Err(ApplyError::ParticipantNotFound { alias: String::new() });
    }
    // `left of` / `right of` take exactly one participant, `over` spans at most two.
    let limit = if placement == NotePlacement::Over { 2 } else { 1 };
    let targets =
        participants.iter().take(limit).map(SmolStr::new).collect::<SmallVec<[SmolStr; 2]>>();
    for alias in &targets {
        require_participant(&view, alias)?;
    }

    let note = Note { placement, participants: targets, text: text.trim().to_owned() };
    let indent = body_indent(source, view.declaration_line);
    source.push_line(note.render(&indent));
    Ok(Some(PendingSelection::Note { index: view.notes.len() }))
}

fn add_fragment(
    source: &mut DiagramSource,
    kind: FragmentKind,
    label: &str,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_sequence_source(source);
    let indent = body_indent(source, view.declaration_line);
    let header = match non_empty(label) {
        Some(label) => format!("{indent}{} {label}", kind.keyword()),
        None => format!("{indent}{}", kind.keyword()),
    };

    source.push_line(header);
    if let Some(separator) = kind.separator() {
        source.push_line(format!("{indent}{separator}"));
    }
    source.push_line(format!("{indent}end"));
    Ok(Some(PendingSelection::Fragment { index: view.fragments.len() }))
}

fn add_box(
    source: &mut DiagramSource,
    label: &str,
    color: Option<&str>,
    participants: &[String],
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_sequence_source(source);
    let mut members = Vec::with_capacity(participants.len());
    for alias in participants {
        let record = view
            .participant(alias)
            .ok_or_else(|| ApplyError::ParticipantNotFound { alias: alias.clone() })?;
        // Boxes do not nest and a participant sits in at most one.
        if record.in_box.is_some() {
            return Err(ApplyError::ParticipantAlreadyBoxed { alias: alias.clone() });
        }
        members.push(record);
    }

    let indent = body_indent(source, view.declaration_line);
    let mut header = format!("{indent}box");
    if let Some(color) = color.map(str::trim).filter(|color| !color.is_empty()) {
        header.push(' ');
        header.push_str(color);
    }
    if let Some(label) = non_empty(label) {
        header.push(' ');
        if label.contains(char::is_whitespace) && color.is_none() {
            header.push_str(&quote(label));
        } else {
            header.push_str(label);
        }
    }

    let mut block = vec![header];
    let mut moved = BTreeSet::new();
    for record in &members {
        let text = match record.line_index {
            Some(idx) => {
                moved.insert(idx);
                line_at(source, idx)?.trim().to_owned()
            }
            None => format_participant(
                "",
                &record.alias,
                record.label.as_deref(),
                record.participant_type,
            ),
        };
        block.push(format!("{indent}    {text}"));
    }
    block.push(format!("{indent}end"));

    let at = moved.first().copied().unwrap_or_else(|| declaration_slot(&view));
    source.delete_line_set(moved);
    source.insert_lines(at, block)?;
    Ok(None)
}
