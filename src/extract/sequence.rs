// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeSet;

use roxmltree::{Document, Node};

use super::{has_class, identified_elements, SvgAnnotator};
use crate::format::mermaid::sequence::{parse_sequence_source, FragmentKind};
use crate::model::{
    DiagramObjects, DiagramSource, FragmentObject, MessageObject, NoteObject, OtherObject,
    ParticipantObject,
};

fn elements_with_class<'a, 'input: 'a>(
    doc: &'a Document<'input>,
    class: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    doc.descendants().filter(move |n| n.is_element() && has_class(*n, class))
}

fn tag_all(
    annotator: &mut SvgAnnotator,
    claimed: &mut BTreeSet<usize>,
    node: Node<'_, '_>,
    data_id: &str,
) {
    annotator.tag(node, data_id);
    claimed.insert(node.range().start);
}

pub(super) fn extract_sequence(
    doc: &Document<'_>,
    source: &DiagramSource,
    annotator: &mut SvgAnnotator,
) -> DiagramObjects {
    let view = parse_sequence_source(source);
    let mut objects = DiagramObjects::default();
    let mut claimed = BTreeSet::new();

    for (position, actor) in elements_with_class(doc, "actor-top").enumerate() {
        // `name` carries the alias; otherwise fall back to declaration order.
        let record = actor
            .attribute("name")
            .and_then(|name| view.participant(name))
            .or_else(|| view.participants.get(position));
        let Some(record) = record else {
            continue;
        };
        if objects.participants.iter().any(|p| p.alias == record.alias) {
            continue;
        }
        let id = format!("participant-{}", record.alias);
        tag_all(annotator, &mut claimed, actor, &id);
        objects.participants.push(ParticipantObject {
            id,
            alias: record.alias.to_string(),
            label: record.label().to_owned(),
            participant_type: record.participant_type,
            line_index: record.line_index,
        });
    }

    for (text, record) in elements_with_class(doc, "messageText").zip(view.messages.iter()) {
        let id = format!("msg-{}", record.index);
        tag_all(annotator, &mut claimed, text, &id);
        objects.messages.push(MessageObject {
            id,
            index: record.index,
            from: record.message.from.to_string(),
            to: record.message.to.to_string(),
            arrow: record.message.arrow,
            text: record.message.text.clone(),
            line_index: record.line_index,
        });
    }
    let message_lines = doc.descendants().filter(|n| {
        n.is_element() && (has_class(*n, "messageLine0") || has_class(*n, "messageLine1"))
    });
    for (line, record) in message_lines.zip(view.messages.iter()) {
        tag_all(annotator, &mut claimed, line, &format!("msg-{}", record.index));
    }

    let notes = elements_with_class(doc, "note").filter(|n| n.tag_name().name() == "rect");
    for (rect, record) in notes.zip(view.notes.iter()) {
        let id = format!("note-{}", record.index);
        tag_all(annotator, &mut claimed, rect, &id);
        objects.notes.push(NoteObject {
            id,
            index: record.index,
            placement: record.note.placement,
            participants: record.note.participants.iter().map(ToString::to_string).collect(),
            text: record.note.text.clone(),
            line_index: record.line_index,
        });
    }

    // `rect` highlight blocks render without a label box.
    let labelled = view.fragments.iter().filter(|fragment| fragment.kind != FragmentKind::Rect);
    for (label, record) in elements_with_class(doc, "labelText").zip(labelled) {
        let id = format!("frag-{}", record.index);
        tag_all(annotator, &mut claimed, label, &id);
        objects.fragments.push(FragmentObject {
            id,
            index: record.index,
            kind: record.kind,
            label: record.label.clone(),
            start_line: record.span.start,
            end_line: record.span.end,
        });
    }

    for (node, id) in identified_elements(doc) {
        if !claimed.contains(&node.range().start) {
            objects.others.push(OtherObject {
                id: id.to_owned(),
                class: node.attribute("class").map(str::to_owned),
            });
        }
    }
    objects
}
