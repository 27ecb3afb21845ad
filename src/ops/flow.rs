// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{body_indent, ensure_declaration, line_at, ApplyError, FlowOp, SubgraphDeleteMode};
use crate::format::mermaid::flowchart::{
    format_connector, format_link, format_subgraph_open, id_references, match_subgraph_open,
    parse_flowchart_source, rewrite_ids, scan_node_token, ArrowKind, FlowchartView, LinkMatch,
    NodeDefinition, NodeShape,
};
use crate::format::mermaid::ident::{quote, validate_mermaid_ident};
use crate::format::mermaid::style::{
    format_class_application, format_class_def, format_link_style_directive,
    format_style_directive, set_property, LinkStyleTarget,
};
use crate::model::{indent_of, suffixed_id, DiagramKind, DiagramSource, IdAllocator};
use crate::reconcile::PendingSelection;

const BLOCK_INDENT: &str = "    ";

pub(super) fn apply_flow_op(
    source: &mut DiagramSource,
    op: &FlowOp,
    ids: &mut IdAllocator,
) -> Result<Option<PendingSelection>, ApplyError> {
    match op {
        FlowOp::AddNode { id, shape, label } => add_node(source, id.as_deref(), *shape, label, ids),
        FlowOp::AddEdge { from, to, text } => add_edge(source, from, to, text.as_deref()),
        FlowOp::AddSubgraph { id, label } => add_subgraph(source, id.as_deref(), label, ids),
        FlowOp::DeleteNode { id } => {
            let view = parse_flowchart_source(source);
            if view.node(id).is_none() {
                return Err(ApplyError::NodeNotFound { id: id.clone() });
            }
            let targets = BTreeSet::from([SmolStr::new(id)]);
            delete_cascade(source, &view, &targets, BTreeSet::new())?;
            Ok(None)
        }
        FlowOp::DeleteEdge { index } => {
            let view = parse_flowchart_source(source);
            let record = view.link(*index).ok_or(ApplyError::LinkNotFound { index: *index })?;
            let lines = BTreeSet::from([record.line_index]);
            delete_cascade(source, &view, &BTreeSet::new(), lines)?;
            Ok(None)
        }
        FlowOp::DeleteSubgraph { id, mode } => delete_subgraph(source, id, *mode),
        FlowOp::DuplicateNode { id } => duplicate_node(source, id),
        FlowOp::DuplicateSubgraph { id } => duplicate_subgraph(source, id, ids),
        FlowOp::MoveNode { id, into } => move_node(source, id, into.as_deref()),
        FlowOp::EditLabel { id, label } => {
            rewrite_definitions(source, id, |def| match def {
                Some(def) => def.with_label(label),
                None => NodeDefinition::classic(NodeShape::Rect, label),
            })
        }
        FlowOp::EditSubgraphLabel { id, label } => edit_subgraph_label(source, id, label),
        FlowOp::SetNodeShape { id, shape } => {
            let view = parse_flowchart_source(source);
            let node = view.node(id).ok_or_else(|| ApplyError::NodeNotFound { id: id.clone() })?;
            let label = node.label().to_owned();
            rewrite_definitions(source, id, |_| NodeDefinition::classic(*shape, &label))
        }
        FlowOp::SetNodeStyle { id, key, value } => set_node_style(source, id, key, value.as_deref()),
        FlowOp::SetLinkStyle { index, key, value } => {
            set_link_style(source, *index, key, value.as_deref())
        }
        FlowOp::SetEdgeArrow { index, arrow } => {
            let view = parse_flowchart_source(source);
            let record = view.link(*index).ok_or(ApplyError::LinkNotFound { index: *index })?;
            if record.link.text.is_some() && *arrow != ArrowKind::Arrow {
                return Err(ApplyError::ArrowTextConflict { index: *index, arrow: *arrow });
            }
            relink(source, &view, *index, *arrow, record.link.text.as_deref())
        }
        FlowOp::SetEdgeText { index, text } => {
            let view = parse_flowchart_source(source);
            let record = view.link(*index).ok_or(ApplyError::LinkNotFound { index: *index })?;
            let text = text.as_deref().map(str::trim).filter(|text| !text.is_empty());
            let arrow = if text.is_some() { ArrowKind::Arrow } else { record.link.arrow };
            relink(source, &view, *index, arrow, text)
        }
        FlowOp::SwapEdge { index } => swap_edge(source, *index),
        FlowOp::ApplyClass { ids: targets, class_name } => apply_class(source, targets, class_name),
        FlowOp::SetClassStyle { class_name, key, value } => {
            set_class_style(source, class_name, key, value.as_deref())
        }
    }
}

fn check_new_id(view: &FlowchartView, id: &str) -> Result<(), ApplyError> {
    validate_mermaid_ident(id)
        .map_err(|reason| ApplyError::InvalidIdent { id: id.to_owned(), reason })?;
    if view.has_id(id) {
        return Err(ApplyError::AlreadyExists { id: id.to_owned() });
    }
    Ok(())
}

fn add_node(
    source: &mut DiagramSource,
    id: Option<&str>,
    shape: NodeShape,
    label: &str,
    ids: &mut IdAllocator,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_flowchart_source(source);
    let id = match id {
        Some(id) => {
            check_new_id(&view, id)?;
            id.to_owned()
        }
        None => ids.next_node_id(|candidate| view.has_id(candidate)),
    };

    let declaration = ensure_declaration(source, DiagramKind::Flowchart, view.declaration_line)?;
    let indent = body_indent(source, Some(declaration));
    let definition = NodeDefinition::classic(shape, label).render(&id);
    source.push_line(format!("{indent}{definition}"));
    Ok(Some(PendingSelection::Node { core_id: id }))
}

fn add_edge(
    source: &mut DiagramSource,
    from: &str,
    to: &str,
    text: Option<&str>,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_flowchart_source(source);
    for id in [from, to] {
        if !view.has_id(id) {
            return Err(ApplyError::NodeNotFound { id: id.to_owned() });
        }
    }

    let text = text.map(str::trim).filter(|text| !text.is_empty());
    let indent = body_indent(source, view.declaration_line);
    source.push_line(format_link(&indent, from, ArrowKind::Arrow, text, to));
    Ok(Some(PendingSelection::Edge {
        source_core_id: from.to_owned(),
        target_core_id: to.to_owned(),
        link_index: Some(view.links.len()),
    }))
}

fn add_subgraph(
    source: &mut DiagramSource,
    id: Option<&str>,
    label: &str,
    ids: &mut IdAllocator,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_flowchart_source(source);
    let id = match id {
        Some(id) => {
            check_new_id(&view, id)?;
            id.to_owned()
        }
        None => ids.next_subgraph_id(|candidate| view.has_id(candidate)),
    };

    let declaration = ensure_declaration(source, DiagramKind::Flowchart, view.declaration_line)?;
    let indent = body_indent(source, Some(declaration));
    source.push_line(format_subgraph_open(&indent, &id, Some(label)));
    source.push_line(format!("{indent}end"));
    Ok(Some(PendingSelection::Subgraph { core_id: id }))
}

/// Removes `targets` and `extra_lines`, then repairs the neighbors that lost text with them.
///
/// 1. Drop standalone mentions and links of every target, its `style`/`click` lines, and its
///    entries in `class` lines. `linkStyle` indices are renumbered to the surviving links.
/// 2. Re-insert the pre-deletion definition of every neighbor whose only definition sat on a
///    removed line.
/// 3. Re-add a bare reference for every neighbor that dropped out of a surviving subgraph.
fn delete_cascade(
    source: &mut DiagramSource,
    before: &FlowchartView,
    targets: &BTreeSet<SmolStr>,
    extra_lines: BTreeSet<usize>,
) -> Result<(), ApplyError> {
    let mut remove = extra_lines;
    let mut rewrites = BTreeMap::<usize, String>::new();

    for node in before.nodes.iter().filter(|node| targets.contains(&node.id)) {
        remove.extend(node.mentions.iter().filter(|m| m.standalone).map(|m| m.line_index));
    }
    for record in &before.links {
        if targets.contains(&record.link.source.id) || targets.contains(&record.link.target.id) {
            remove.insert(record.line_index);
        }
    }
    for (idx, style) in &before.styles {
        if targets.contains(&style.target) {
            remove.insert(*idx);
        }
    }
    for (idx, line) in source.lines().iter().enumerate() {
        if line.trim_start().starts_with("click ") {
            let refs = id_references(line);
            if refs.first().is_some_and(|(_, id)| targets.contains(id)) {
                remove.insert(idx);
            }
        }
    }
    for (idx, class) in &before.classes {
        let kept = class.ids.iter().filter(|id| !targets.contains(*id)).cloned().collect::<Vec<_>>();
        if kept.is_empty() {
            remove.insert(*idx);
        } else if kept.len() != class.ids.len() {
            let line = line_at(source, *idx)?;
            rewrites.insert(*idx, format_class_application(indent_of(line), &kept, &class.class_name));
        }
    }

    let removed_links = before
        .links
        .iter()
        .filter(|record| remove.contains(&record.line_index))
        .map(|record| record.index)
        .collect::<BTreeSet<_>>();
    for (idx, link_style) in &before.link_styles {
        if remove.contains(idx) || link_style.target == LinkStyleTarget::Default {
            continue;
        }
        let indices = link_style.indices();
        let renumbered = indices
            .iter()
            .filter(|index| !removed_links.contains(*index))
            .map(|index| index - removed_links.range(..*index).count())
            .collect::<Vec<_>>();
        if renumbered.is_empty() {
            remove.insert(*idx);
        } else if renumbered != indices {
            let line = line_at(source, *idx)?;
            rewrites.insert(
                *idx,
                format_link_style_directive(indent_of(line), &renumbered, &link_style.properties),
            );
        }
    }

    let mut neighbors = Vec::<SmolStr>::new();
    for node in &before.nodes {
        if targets.contains(&node.id) || neighbors.contains(&node.id) {
            continue;
        }
        if node.mentions.iter().any(|m| remove.contains(&m.line_index)) {
            neighbors.push(node.id.clone());
        }
    }

    for (idx, text) in rewrites {
        if !remove.contains(&idx) {
            source.replace_line(idx, text)?;
        }
    }
    source.delete_line_set(remove);

    // Phase 2: definitions that only lived on removed lines.
    let after = parse_flowchart_source(source);
    let insert_at = after.declaration_line.map(|idx| idx + 1).unwrap_or(0);
    let indent = body_indent(source, after.declaration_line);
    let mut backfill = Vec::new();
    for id in &neighbors {
        let Some(definition) = before.node(id).and_then(|node| node.definition.as_ref()) else {
            continue;
        };
        let still_defined = after.node(id).is_some_and(|node| node.definition.is_some());
        if !still_defined {
            backfill.push(format!("{indent}{}", definition.render(id)));
        }
    }
    if !backfill.is_empty() {
        tracing::debug!(count = backfill.len(), "backfilled node definitions");
        source.insert_lines(insert_at, backfill)?;
    }

    // Phase 3: container membership.
    for id in &neighbors {
        for container in before.subgraphs.iter().filter(|sg| sg.members.contains(id)) {
            let after = parse_flowchart_source(source);
            let Some(current) = after.subgraph(&container.id) else {
                continue;
            };
            if current.members.contains(id) {
                continue;
            }
            let end_line = line_at(source, current.span.end)?;
            let reference = format!("{}{BLOCK_INDENT}{id}", indent_of(end_line));
            source.insert_lines(current.span.end, [reference])?;
        }
    }
    Ok(())
}

fn delete_subgraph(
    source: &mut DiagramSource,
    id: &str,
    mode: SubgraphDeleteMode,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_flowchart_source(source);
    let subgraph =
        view.subgraph(id).ok_or_else(|| ApplyError::SubgraphNotFound { id: id.to_owned() })?;
    let span = subgraph.span;

    let (targets, lines) = match mode {
        SubgraphDeleteMode::ContainerOnly => {
            (BTreeSet::from([subgraph.id.clone()]), BTreeSet::from([span.start, span.end]))
        }
        SubgraphDeleteMode::Everything => {
            let nested = view
                .subgraphs
                .iter()
                .filter(|sg| span.contains(sg.span.start))
                .map(|sg| sg.id.clone())
                .collect::<BTreeSet<_>>();
            // Only nodes whose text lives inside the block go with it; links into the block from
            // nodes defined elsewhere are dropped with their lines.
            let mut targets = view
                .nodes
                .iter()
                .filter(|node| anchor_line(&view, &node.id).is_some_and(|line| span.contains(line)))
                .map(|node| node.id.clone())
                .collect::<BTreeSet<_>>();
            targets.extend(nested);
            (targets, (span.start..=span.end).collect())
        }
    };

    delete_cascade(source, &view, &targets, lines)?;
    Ok(None)
}

/// Line that carries the node's text: its definition, else a standalone line, else any mention.
fn anchor_line(view: &FlowchartView, id: &str) -> Option<usize> {
    let node = view.node(id)?;
    node.definition_line
        .or_else(|| node.standalone_line())
        .or_else(|| node.mentions.first().map(|m| m.line_index))
}

fn duplicate_node(source: &mut DiagramSource, id: &str) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_flowchart_source(source);
    let node = view.node(id).ok_or_else(|| ApplyError::NodeNotFound { id: id.to_owned() })?;
    let anchor = anchor_line(&view, id).ok_or_else(|| ApplyError::NodeNotFound { id: id.to_owned() })?;
    let new_id = suffixed_id(id, |candidate| view.has_id(candidate));

    let anchor_text = line_at(source, anchor)?;
    let class_suffix = node
        .mentions
        .iter()
        .filter(|m| m.line_index == anchor)
        .find_map(|m| scan_node_token(anchor_text, m.span.start))
        .and_then(|token| token.class_suffix);
    let definition = node
        .definition
        .clone()
        .unwrap_or_else(|| NodeDefinition::classic(NodeShape::Rect, node.label()));
    let mut clone = format!("{}{}", indent_of(anchor_text), definition.render(&new_id));
    if let Some(class) = class_suffix {
        clone.push_str(":::");
        clone.push_str(&class);
    }

    let new_smol = SmolStr::new(&new_id);
    let mut inserts = vec![(anchor + 1, clone)];
    for (idx, style) in view.styles.iter().filter(|(_, style)| style.target == id) {
        let line = line_at(source, *idx)?;
        inserts.push((idx + 1, format_style_directive(indent_of(line), &new_id, &style.properties)));
    }
    for (idx, class) in view.classes.iter().filter(|(_, class)| class.ids.iter().any(|c| c == id)) {
        let line = line_at(source, *idx)?;
        let ids = [new_smol.clone()];
        inserts.push((idx + 1, format_class_application(indent_of(line), &ids, &class.class_name)));
    }

    inserts.sort_by(|a, b| b.0.cmp(&a.0));
    for (at, text) in inserts {
        source.insert_lines(at, [text])?;
    }
    Ok(Some(PendingSelection::Node { core_id: new_id }))
}

fn duplicate_subgraph(
    source: &mut DiagramSource,
    id: &str,
    ids: &mut IdAllocator,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_flowchart_source(source);
    let subgraph =
        view.subgraph(id).ok_or_else(|| ApplyError::SubgraphNotFound { id: id.to_owned() })?;
    let span = subgraph.span;

    let mut map = BTreeMap::<SmolStr, SmolStr>::new();
    let is_taken = |candidate: &str, map: &BTreeMap<SmolStr, SmolStr>| {
        view.has_id(candidate) || map.values().any(|value| value == candidate)
    };
    for nested in view.subgraphs.iter().filter(|sg| span.contains(sg.span.start)) {
        let new_id = if validate_mermaid_ident(&nested.id).is_ok() {
            suffixed_id(&nested.id, |candidate| is_taken(candidate, &map))
        } else {
            ids.next_subgraph_id(|candidate| is_taken(candidate, &map))
        };
        map.insert(nested.id.clone(), SmolStr::new(new_id));
    }
    for node in &view.nodes {
        let first_inside = node.mentions.first().is_some_and(|m| span.contains(m.line_index));
        if first_inside {
            let new_id = suffixed_id(&node.id, |candidate| is_taken(candidate, &map));
            map.insert(node.id.clone(), SmolStr::new(new_id));
        }
    }

    let mut block = Vec::with_capacity(span.len());
    for idx in span.start..=span.end {
        let line = line_at(source, idx)?;
        let rewritten = match match_subgraph_open(line) {
            Some(header) => {
                let new_id = map.get(&header.id).cloned().unwrap_or(header.id);
                format_subgraph_open(indent_of(line), &new_id, header.label.as_deref())
            }
            None => rewrite_ids(line, &map),
        };
        block.push(rewritten);
    }
    source.insert_lines(span.end + 1, block)?;

    for (idx, style) in view.styles.iter().filter(|(idx, _)| !span.contains(*idx)) {
        if let Some(new_id) = map.get(&style.target) {
            let line = line_at(source, shifted(*idx, span.end, span.len()))?;
            let clone = format_style_directive(indent_of(line), new_id, &style.properties);
            source.push_line(clone);
        }
    }
    for (idx, class) in view.classes.iter().filter(|(idx, _)| !span.contains(*idx)) {
        let mapped = class.ids.iter().filter_map(|id| map.get(id).cloned()).collect::<Vec<_>>();
        if !mapped.is_empty() {
            let line = line_at(source, shifted(*idx, span.end, span.len()))?;
            let clone = format_class_application(indent_of(line), &mapped, &class.class_name);
            source.push_line(clone);
        }
    }

    let new_id = map.get(&subgraph.id).map(SmolStr::to_string).unwrap_or_default();
    Ok(Some(PendingSelection::Subgraph { core_id: new_id }))
}

/// Index of a pre-insert line after `count` lines were inserted following `after`.
fn shifted(idx: usize, after: usize, count: usize) -> usize {
    if idx > after {
        idx + count
    } else {
        idx
    }
}

fn move_node(
    source: &mut DiagramSource,
    id: &str,
    into: Option<&str>,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_flowchart_source(source);
    let node = view.node(id).ok_or_else(|| ApplyError::NodeNotFound { id: id.to_owned() })?;
    let innermost = |line: usize| {
        view.subgraphs
            .iter()
            .filter(|sg| sg.span.inner().contains(&line))
            .max_by_key(|sg| sg.span.start)
    };

    match into {
        Some(target) => {
            let subgraph = view
                .subgraph(target)
                .ok_or_else(|| ApplyError::SubgraphNotFound { id: target.to_owned() })?;
            let end = subgraph.span.end;
            let end_indent = indent_of(line_at(source, end)?).to_owned();
            match node.standalone_line() {
                Some(line) if innermost(line).is_some_and(|sg| sg.id == target) => {}
                Some(line) => {
                    let text = line_at(source, line)?.trim().to_owned();
                    source.delete_lines(line, 1)?;
                    let at = if line < end { end - 1 } else { end };
                    source.insert_lines(at, [format!("{end_indent}{BLOCK_INDENT}{text}")])?;
                }
                None => {
                    source.insert_lines(end, [format!("{end_indent}{BLOCK_INDENT}{id}")])?;
                }
            }
        }
        None => {
            let nested = node
                .mentions
                .iter()
                .filter(|m| m.standalone && innermost(m.line_index).is_some())
                .collect::<Vec<_>>();
            let moved = nested
                .iter()
                .find(|m| m.defines)
                .or_else(|| nested.first())
                .ok_or_else(|| ApplyError::NodeNotMovable { id: id.to_owned() })?;
            let text = line_at(source, moved.line_index)?.trim().to_owned();
            source.delete_line_set(nested.iter().map(|m| m.line_index));
            let at = view.declaration_line.map(|idx| idx + 1).unwrap_or(0);
            let indent = body_indent(source, view.declaration_line);
            source.insert_lines(at, [format!("{indent}{text}")])?;
        }
    }
    Ok(Some(PendingSelection::Node { core_id: id.to_owned() }))
}

/// Re-renders every defining mention of `id` (or its first mention) through `rebuild`.
fn rewrite_definitions(
    source: &mut DiagramSource,
    id: &str,
    rebuild: impl Fn(Option<&NodeDefinition>) -> NodeDefinition,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_flowchart_source(source);
    let node = view.node(id).ok_or_else(|| ApplyError::NodeNotFound { id: id.to_owned() })?;
    let mut mentions = node.mentions.iter().filter(|m| m.defines).collect::<Vec<_>>();
    if mentions.is_empty() {
        mentions.extend(node.mentions.first());
    }
    mentions.sort_by(|a, b| (b.line_index, b.span.start).cmp(&(a.line_index, a.span.start)));

    for mention in mentions {
        let mut line = line_at(source, mention.line_index)?.to_owned();
        let token = scan_node_token(&line, mention.span.start)
            .ok_or_else(|| ApplyError::NodeNotFound { id: id.to_owned() })?;
        let mut text = rebuild(token.definition.as_ref()).render(id);
        if let Some(class) = &token.class_suffix {
            text.push_str(":::");
            text.push_str(class);
        }
        line.replace_range(token.span, &text);
        source.replace_line(mention.line_index, line)?;
    }
    Ok(Some(PendingSelection::Node { core_id: id.to_owned() }))
}

fn edit_subgraph_label(
    source: &mut DiagramSource,
    id: &str,
    label: &str,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_flowchart_source(source);
    let subgraph =
        view.subgraph(id).ok_or_else(|| ApplyError::SubgraphNotFound { id: id.to_owned() })?;
    let line = line_at(source, subgraph.span.start)?;
    let indent = indent_of(line).to_owned();

    // `subgraph "Title"` uses the title as its id, so the id follows the label.
    let (text, core_id) = if validate_mermaid_ident(id).is_ok() {
        (format_subgraph_open(&indent, id, Some(label)), id.to_owned())
    } else {
        (format!("{indent}subgraph {}", quote(label)), label.to_owned())
    };
    source.replace_line(subgraph.span.start, text)?;
    Ok(Some(PendingSelection::Subgraph { core_id }))
}

fn set_node_style(
    source: &mut DiagramSource,
    id: &str,
    key: &str,
    value: Option<&str>,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_flowchart_source(source);
    if !view.has_id(id) {
        return Err(ApplyError::NodeNotFound { id: id.to_owned() });
    }

    match view.style_for(id) {
        Some((idx, style)) => {
            let mut properties = style.properties.clone();
            set_property(&mut properties, key, value);
            if properties.is_empty() {
                source.delete_lines(*idx, 1)?;
            } else {
                let indent = indent_of(line_at(source, *idx)?).to_owned();
                source.replace_line(*idx, format_style_directive(&indent, id, &properties))?;
            }
        }
        None => {
            let mut properties = Vec::new();
            set_property(&mut properties, key, value);
            if !properties.is_empty() {
                let indent = body_indent(source, view.declaration_line);
                source.push_line(format_style_directive(&indent, id, &properties));
            }
        }
    }
    Ok(None)
}

fn set_link_style(
    source: &mut DiagramSource,
    index: usize,
    key: &str,
    value: Option<&str>,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_flowchart_source(source);
    if view.link(index).is_none() {
        return Err(ApplyError::LinkNotFound { index });
    }

    // Lines naming several links are shared; only a line addressing exactly this link is edited.
    let existing = view.link_styles.iter().find(|(_, style)| style.indices() == [index]);
    match existing {
        Some((idx, style)) => {
            let mut properties = style.properties.clone();
            set_property(&mut properties, key, value);
            if properties.is_empty() {
                source.delete_lines(*idx, 1)?;
            } else {
                let indent = indent_of(line_at(source, *idx)?).to_owned();
                let text = format_link_style_directive(&indent, &[index], &properties);
                source.replace_line(*idx, text)?;
            }
        }
        None => {
            let mut properties = Vec::new();
            set_property(&mut properties, key, value);
            if !properties.is_empty() {
                let indent = body_indent(source, view.declaration_line);
                source.push_line(format_link_style_directive(&indent, &[index], &properties));
            }
        }
    }
    Ok(None)
}

fn edge_pending(link: &LinkMatch, index: usize) -> PendingSelection {
    PendingSelection::Edge {
        source_core_id: link.source.id.to_string(),
        target_core_id: link.target.id.to_string(),
        link_index: Some(index),
    }
}

/// Replaces the connector of link `index`, keeping both node tokens verbatim.
fn relink(
    source: &mut DiagramSource,
    view: &FlowchartView,
    index: usize,
    arrow: ArrowKind,
    text: Option<&str>,
) -> Result<Option<PendingSelection>, ApplyError> {
    let record = view.link(index).ok_or(ApplyError::LinkNotFound { index })?;
    let line = line_at(source, record.line_index)?;
    let link = &record.link;
    let updated = format!(
        "{} {} {}",
        &line[..link.source.span.end],
        format_connector(arrow, text),
        &line[link.target.span.start..]
    );
    source.replace_line(record.line_index, updated)?;
    Ok(Some(edge_pending(link, index)))
}

fn swap_edge(source: &mut DiagramSource, index: usize) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_flowchart_source(source);
    let record = view.link(index).ok_or(ApplyError::LinkNotFound { index })?;
    let line = line_at(source, record.line_index)?;
    let (from, to) = (&record.link.source.span, &record.link.target.span);
    let swapped = format!(
        "{}{}{}{}{}",
        &line[..from.start],
        &line[to.clone()],
        &line[from.end..to.start],
        &line[from.clone()],
        &line[to.end..]
    );
    source.replace_line(record.line_index, swapped)?;

    Ok(Some(PendingSelection::Edge {
        source_core_id: record.link.target.id.to_string(),
        target_core_id: record.link.source.id.to_string(),
        link_index: Some(index),
    }))
}

fn apply_class(
    source: &mut DiagramSource,
    targets: &[String],
    class_name: &str,
) -> Result<Option<PendingSelection>, ApplyError> {
    let view = parse_flowchart_source(source);
    validate_mermaid_ident(class_name)
        .map_err(|reason| ApplyError::InvalidIdent { id: class_name.to_owned(), reason })?;
    for id in targets {
        if !view.has_id(id) {
            return Err(ApplyError::NodeNotFound { id: id.clone() });
        }
    }
    if targets.is_empty() {
        return Ok(None);
    }

    let ids = targets.iter().map(SmolStr::new).collect::<Vec<_>>();
    let indent = body_indent(source, view.declaration_line);
    source.push_line(format_class_application(&indent, &ids, class_name));
    Ok(None)
}

fn set_class_style(
    source: &mut DiagramSource,
    class_name: &str,
    key: &str,
    value: Option<&str>,
) -> Result<Option<PendingSelection>, ApplyError> {
    validate_mermaid_ident(class_name)
        .map_err(|reason| ApplyError::InvalidIdent { id: class_name.to_owned(), reason })?;
    let view = parse_flowchart_source(source);

    let existing =
        view.class_defs.iter().find(|(_, def)| def.names.len() == 1 && def.names[0] == class_name);
    match existing {
        Some((idx, def)) => {
            let mut properties = def.properties.clone();
            set_property(&mut properties, key, value);
            if properties.is_empty() {
                source.delete_lines(*idx, 1)?;
            } else {
                let indent = indent_of(line_at(source, *idx)?).to_owned();
                source.replace_line(*idx, format_class_def(&indent, class_name, &properties))?;
            }
        }
        None => {
            let mut properties = Vec::new();
            set_property(&mut properties, key, value);
            if !properties.is_empty() {
                let indent = body_indent(source, view.declaration_line);
                source.push_line(format_class_def(&indent, class_name, &properties));
            }
        }
    }
    Ok(None)
}

/// What the confirmation collaborator shows before a link is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EdgeDeleteConfirmation {
    pub index: usize,
    pub source_label: String,
    pub target_label: String,
    pub prompt: String,
}

pub fn describe_edge_delete(source: &DiagramSource, index: usize) -> Option<EdgeDeleteConfirmation> {
    let view = parse_flowchart_source(source);
    let record = view.link(index)?;
    let label_of = |id: &SmolStr| view.node(id).map_or_else(|| id.to_string(), |n| n.label().to_owned());
    let source_label = label_of(&record.link.source.id);
    let target_label = label_of(&record.link.target.id);
    let prompt = format!("Delete the connection from \"{source_label}\" to \"{target_label}\"?");
    Some(EdgeDeleteConfirmation { index, source_label, target_label, prompt })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeleteChoice {
    pub mode: SubgraphDeleteMode,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SubgraphDeleteChoices {
    pub subgraph_id: String,
    pub label: String,
    pub prompt: String,
    pub choices: Vec<DeleteChoice>,
}

pub fn subgraph_delete_choices(source: &DiagramSource, id: &str) -> Option<SubgraphDeleteChoices> {
    let view = parse_flowchart_source(source);
    let subgraph = view.subgraph(id)?;
    let label = subgraph.label().to_owned();
    Some(SubgraphDeleteChoices {
        subgraph_id: id.to_owned(),
        prompt: format!("Delete \"{label}\" and everything inside it, or only the container?"),
        label,
        choices: vec![
            DeleteChoice {
                mode: SubgraphDeleteMode::Everything,
                label: "Delete Everything".to_owned(),
            },
            DeleteChoice {
                mode: SubgraphDeleteMode::ContainerOnly,
                label: "Delete Container Only".to_owned(),
            },
        ],
    })
}
