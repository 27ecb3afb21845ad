// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeSet;

use smol_str::SmolStr;

use super::{
    body_indent, ensure_declaration, line_at, ApplyError, AttributeSpec, ErOp, RelationshipPatch,
};
use crate::format::mermaid::er::{
    format_entity_block, match_entity_header, parse_er_source, Attribute, AttributeKey, EntityForm,
    EntityRecord, ErView, Relationship, BLOCK_RULES,
};
use crate::format::mermaid::ident::{quote, replace_word_outside_quotes, validate_entity_name};
use crate::model::{indent_of, BlockSpan, DiagramKind, DiagramSource, IdAllocator};
use crate::reconcile::PendingSelection;

pub(super) fn apply_er_op(
    source: &mut DiagramSource,
    op: &ErOp,
    ids: &mut IdAllocator,
) -> Result<Option<PendingSelection>, ApplyError> {
    match op {
        ErOp::AddEntity { name } => add_entity(source, name.as_deref(), ids),
        ErOp::RenameEntity { name, new_name } => rename_entity(source, name, new_name),
        ErOp::DeleteEntity { name } => delete_entity(source, name),
        ErOp::AddAttribute { entity, attribute } => {
            let view = parse_er_source(source);
            let record = find_entity(&view, entity)?;
            let attribute = to_attribute(attribute);
            match block_span(record) {
                Some(span) => {
                    let header = line_at(source, span.start)?;
                    let text = format!("{}    {}", indent_of(header), attribute.render());
                    source.insert_lines(span.end, [text])?;
                }
                None => {
                    let mut attributes = plain_attributes(record);
                    attributes.push(attribute);
                    rewrite_as_block(source, &view, record, &attributes)?;
                }
            }
            Ok(Some(PendingSelection::Entity { name: entity.clone() }))
        }
        ErOp::UpdateAttribute { entity, attribute_name, attribute } => {
            let view = parse_er_source(source);
            let record = find_entity(&view, entity)?;
            let (line_index, _) = find_attribute(record, attribute_name)?;
            let attribute = to_attribute(attribute);
            if block_span(record).is_some() {
                let indent = indent_of(line_at(source, *line_index)?).to_owned();
                source.replace_line(*line_index, format!("{indent}{}", attribute.render()))?;
            } else {
                let attributes = record
                    .attributes
                    .iter()
                    .map(|(_, attr)| {
                        if attr.name == *attribute_name {
                            attribute.clone()
                        } else {
                            attr.clone()
                        }
                    })
                    .collect::<Vec<_>>();
                rewrite_as_block(source, &view, record, &attributes)?;
            }
            Ok(Some(PendingSelection::Entity { name: entity.clone() }))
        }
        ErOp::DeleteAttribute { entity, attribute_name } => {
            let view = parse_er_source(source);
            let record = find_entity(&view, entity)?;
            let (line_index, _) = find_attribute(record, attribute_name)?;
            if block_span(record).is_some() {
                source.delete_lines(*line_index, 1)?;
            } else {
                let attributes = record
                    .attributes
                    .iter()
                    .filter(|(_, attr)| attr.name != *attribute_name)
                    .map(|(_, attr)| attr.clone())
                    .collect::<Vec<_>>();
                rewrite_as_block(source, &view, record, &attributes)?;
            }
            Ok(Some(PendingSelection::Entity { name: entity.clone() }))
        }
        ErOp::AddRelationship {
            entity1,
            cardinality1,
            identification,
            cardinality2,
            entity2,
            label,
        } => {
            let view = parse_er_source(source);
            find_entity(&view, entity1)?;
            find_entity(&view, entity2)?;
            let relationship = Relationship {
                entity1: SmolStr::new(entity1),
                cardinality1: *cardinality1,
                identification: *identification,
                cardinality2: *cardinality2,
                entity2: SmolStr::new(entity2),
                label: label.trim().to_owned(),
            };
            let indent = body_indent(source, view.declaration_line);
            source.push_line(relationship.render(&indent));
            Ok(Some(PendingSelection::Relationship { index: view.relationships.len() }))
        }
        ErOp::UpdateRelationship { index, patch } => update_relationship(source, *index, patch),
        ErOp::DeleteRelationship { index } => {
            let view = parse_er_source(source);
            let record = view
                .relationships
                .get(*index)
                .ok_or(ApplyError::RelationshipNotFound { index: *index })?;
            source.delete_lines(record.line_index, 1)?;
            Ok(None)
        }
    }
}

fn to_attribute(spec: &AttributeSpec) -> Attribute {
    let mut attribute = Attribute::new(spec.attr_type.trim(), spec.name.trim());
    attribute.keys = spec.keys.iter().copied().collect();
    attribute.comment = spec.comment.clone().filter(|comment| !comment.is_empty());
    attribute
}

fn find_entity<'a>(view: &'a ErView, name: &str) -> Result<&'a EntityRecord, ApplyError> {
    view.entity(name).ok_or_else(|| ApplyError::EntityNotFound { name: name.to_owned() })
}

fn find_attribute<'a>(
    record: &'a EntityRecord,
    name: &str,
) -> Result<&'a (usize, Attribute), ApplyError> {
    record.attributes.iter().find(|(_, attr)| attr.name == name).ok_or_else(|| {
        ApplyError::AttributeNotFound { entity: record.name.to_string(), name: name.to_owned() }
    })
}

/// Span of a multi-line `NAME {` ... `}` block; `None` for bare, inline or implicit entities.
fn block_span(record: &EntityRecord) -> Option<BlockSpan> {
    record.span.filter(|span| !record.inline && span.start != span.end)
}

fn plain_attributes(record: &EntityRecord) -> Vec<Attribute> {
    record.attributes.iter().map(|(_, attr)| attr.clone()).collect()
}

fn block_header(record: &EntityRecord) -> String {
    match &record.alias {
        Some(alias) => format!("{}[{}]", record.name, quote(alias)),
        None => record.name.to_string(),
    }
}

/// Replaces a single-line entity (or appends an implicit one) with a multi-line block.
fn rewrite_as_block(
    source: &mut DiagramSource,
    view: &ErView,
    record: &EntityRecord,
    attributes: &[Attribute],
) -> Result<(), ApplyError> {
    match record.span {
        Some(span) => {
            let indent = indent_of(line_at(source, span.start)?).to_owned();
            let lines = format_entity_block(&indent, &block_header(record), attributes);
            source.delete_lines(span.start, span.len())?;
            source.insert_lines(span.start, lines)?;
        }
        None => {
            let indent = body_indent(source, view.declaration_line);
            for line in format_entity_block(&indent, &block_header(record), attributes) {
                source.push_line(line);
            }
        }
    }
    Ok(())
}

fn add_entity(
    source: &mut DiagramSource,
    name: Option<&str>,
    ids: &mut IdAllocator,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_er_source(source);
    let name = match name {
        Some(name) => {
            validate_entity_name(name)
                .map_err(|reason| ApplyError::InvalidIdent { id: name.to_owned(), reason })?;
            if view.entity(name).is_some() {
                return Err(ApplyError::AlreadyExists { id: name.to_owned() });
            }
            name.to_owned()
        }
        None => ids.next_entity_name(|candidate| view.entity(candidate).is_some()),
    };

    let declaration = ensure_declaration(source, DiagramKind::Er, view.declaration_line)?;
    let indent = body_indent(source, Some(declaration));
    let mut key = Attribute::new("string", "id");
    key.keys.push(AttributeKey::Pk);
    for line in format_entity_block(&indent, &name, &[key]) {
        source.push_line(line);
    }
    Ok(Some(PendingSelection::Entity { name }))
}

fn rename_entity(
    source: &mut DiagramSource,
    name: &str,
    new_name: &str,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_er_source(source);
    find_entity(&view, name)?;
    validate_entity_name(new_name)
        .map_err(|reason| ApplyError::InvalidIdent { id: new_name.to_owned(), reason })?;
    if new_name != name && view.entity(new_name).is_some() {
        return Err(ApplyError::AlreadyExists { id: new_name.to_owned() });
    }

    // Attribute names never refer to entities, so their lines are left alone.
    let attribute_lines = view
        .entities
        .iter()
        .flat_map(|entity| entity.attributes.iter())
        .map(|(idx, _)| *idx)
        .collect::<BTreeSet<_>>();
    let body_start = view.declaration_line.map(|idx| idx + 1).unwrap_or(0);
    let inline_lines = view
        .entities
        .iter()
        .filter(|entity| entity.inline)
        .filter_map(|entity| entity.span.map(|span| span.start))
        .collect::<BTreeSet<_>>();

    for idx in body_start..source.len() {
        if attribute_lines.contains(&idx) && !inline_lines.contains(&idx) {
            continue;
        }
        let line = line_at(source, idx)?;
        let renamed = replace_word_outside_quotes(line, name, new_name);
        if renamed != line {
            source.replace_line(idx, renamed)?;
        }
    }
    Ok(Some(PendingSelection::Entity { name: new_name.to_owned() }))
}

fn delete_entity(source: &mut DiagramSource, name: &str) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_er_source(source);
    find_entity(&view, name)?;

    let inside_blocks = view
        .entities
        .iter()
        .filter_map(block_span)
        .flat_map(|span| span.inner())
        .collect::<BTreeSet<_>>();
    let body_start = view.declaration_line.map(|idx| idx + 1).unwrap_or(0);

    let mut remove = BTreeSet::new();
    for (idx, line) in source.lines().iter().enumerate().skip(body_start) {
        if inside_blocks.contains(&idx) {
            continue;
        }
        let Some(header) = match_entity_header(line) else {
            continue;
        };
        if header.name != name {
            continue;
        }
        match header.form {
            EntityForm::BlockOpen => match source.block_at(idx, BLOCK_RULES) {
                Some(span) => remove.extend(span.start..=span.end),
                None => {
                    remove.insert(idx);
                }
            },
            EntityForm::Bare | EntityForm::Inline(_) => {
                remove.insert(idx);
            }
        }
    }
    for record in &view.relationships {
        if record.relationship.entity1 == name || record.relationship.entity2 == name {
            remove.insert(record.line_index);
        }
    }

    source.delete_line_set(remove);
    Ok(None)
}

fn update_relationship(
    source: &mut DiagramSource,
    index: usize,
    patch: &RelationshipPatch,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_er_source(source);
    let record = view.relationships.get(index).ok_or(ApplyError::RelationshipNotFound { index })?;

    let mut relationship = record.relationship.clone();
    if let Some(entity1) = &patch.entity1 {
        find_entity(&view, entity1)?;
        relationship.entity1 = SmolStr::new(entity1);
    }
    if let Some(entity2) = &patch.entity2 {
        find_entity(&view, entity2)?;
        relationship.entity2 = SmolStr::new(entity2);
    }
    if let Some(cardinality) = patch.cardinality1 {
        relationship.cardinality1 = cardinality;
    }
    if let Some(cardinality) = patch.cardinality2 {
        relationship.cardinality2 = cardinality;
    }
    if let Some(identification) = patch.identification {
        relationship.identification = identification;
    }
    if let Some(label) = &patch.label {
        relationship.label = label.trim().to_owned();
    }

    let indent = indent_of(line_at(source, record.line_index)?).to_owned();
    source.replace_line(record.line_index, relationship.render(&indent))?;
    Ok(Some(PendingSelection::Relationship { index }))
}
