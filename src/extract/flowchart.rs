// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::{BTreeMap, BTreeSet};

use roxmltree::{Document, Node};

use super::{has_class, identified_elements, text_content};
use crate::format::mermaid::flowchart::{parse_flowchart_source, FlowchartView};
use crate::model::{
    DiagramObjects, DiagramSource, EdgeObject, NodeObject, OtherObject, SubgraphObject,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Subgraph,
    Node,
    Edge,
    Other,
}

/// First match wins.
fn classify(node: Node<'_, '_>, id: &str) -> Role {
    if has_class(node, "cluster") {
        Role::Subgraph
    } else if has_class(node, "node") {
        Role::Node
    } else if id.starts_with("L_") || id.starts_with("L-") || has_class(node, "flowchart-link") {
        Role::Edge
    } else {
        Role::Other
    }
}

/// Strips the `flowchart-` prefix (and anything before it) plus the trailing `-<n>` counter.
fn node_core_id<'a>(rendered_id: &'a str, view: &FlowchartView) -> &'a str {
    let body = match rendered_id.find("flowchart-") {
        Some(idx) => &rendered_id[idx + "flowchart-".len()..],
        None => rendered_id,
    };
    if view.node(body).is_some() {
        return body;
    }
    match body.rsplit_once('-') {
        Some((head, tail)) if !head.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) => head,
        _ => body,
    }
}

fn subgraph_core_id<'a>(rendered_id: &'a str, view: &'a FlowchartView) -> &'a str {
    view.subgraphs
        .iter()
        .map(|subgraph| subgraph.id.as_str())
        .find(|id| {
            rendered_id == *id
                || rendered_id.strip_suffix(id).is_some_and(|head| head.ends_with(['-', '_']))
        })
        .unwrap_or(rendered_id)
}

/// Parses `L_<source>_<target>[_<ordinal>]` (or the `-` joined legacy form). A purely numeric
/// trailing segment is the per-pair ordinal unless only the reading that keeps it inside the
/// target names two known ids. Known ids pick the split point when ids contain the delimiter.
pub(crate) fn parse_edge_id(
    rendered_id: &str,
    known: &BTreeSet<&str>,
) -> Option<(String, String, usize)> {
    let (delimiter, body) = if let Some(body) = rendered_id.strip_prefix("L_") {
        ("_", body)
    } else {
        ("-", rendered_id.strip_prefix("L-")?)
    };
    let parts = body.split(delimiter).collect::<Vec<_>>();
    if parts.len() < 2 {
        return None;
    }
    let joined = |slice: &[&str]| slice.join(delimiter);
    let both_known = |slice: &[&str]| {
        (1..slice.len()).find(|&k| {
            known.contains(joined(&slice[..k]).as_str())
                && known.contains(joined(&slice[k..]).as_str())
        })
    };

    let trailing = parts
        .last()
        .filter(|_| parts.len() >= 3)
        .and_then(|last| last.parse::<usize>().ok());
    let (parts, ordinal) = match trailing {
        Some(ordinal) => {
            let head = &parts[..parts.len() - 1];
            if both_known(head).is_none() && both_known(&parts[..]).is_some() {
                (&parts[..], 0)
            } else {
                (head, ordinal)
            }
        }
        None => (&parts[..], 0),
    };
    let split = both_known(parts)
        .or_else(|| (1..parts.len()).find(|&k| known.contains(joined(&parts[..k]).as_str())))
        .unwrap_or(1);
    Some((joined(&parts[..split]), joined(&parts[split..]), ordinal))
}

/// Position of each rendered edge among the rendered edges of its pair, by ascending ordinal.
/// The renderer skips ordinal 1 (`0, 2, 3, ...`), so ordinals themselves are not positions.
fn pair_ranks(parsed: &[Option<(String, String, usize)>]) -> Vec<usize> {
    let mut by_pair = BTreeMap::<(&str, &str), Vec<usize>>::new();
    for (source, target, ordinal) in parsed.iter().flatten() {
        by_pair.entry((source.as_str(), target.as_str())).or_default().push(*ordinal);
    }
    for ordinals in by_pair.values_mut() {
        ordinals.sort_unstable();
    }
    parsed
        .iter()
        .map(|entry| {
            entry
                .as_ref()
                .and_then(|(source, target, ordinal)| {
                    by_pair
                        .get(&(source.as_str(), target.as_str()))
                        .and_then(|ordinals| ordinals.iter().position(|o| o == ordinal))
                })
                .unwrap_or(0)
        })
        .collect()
}

pub(super) fn extract_flowchart(doc: &Document<'_>, source: &DiagramSource) -> DiagramObjects {
    let view = parse_flowchart_source(source);
    let mut objects = DiagramObjects::default();
    let mut seen = BTreeSet::new();
    let mut edge_elements = Vec::new();

    for (node, id) in identified_elements(doc) {
        if !seen.insert(id) {
            continue;
        }
        match classify(node, id) {
            Role::Subgraph => {
                let core_id = subgraph_core_id(id, &view);
                let record = view.subgraph(core_id);
                objects.subgraphs.push(SubgraphObject {
                    id: id.to_owned(),
                    core_id: core_id.to_owned(),
                    label: record
                        .map(|r| r.label().to_owned())
                        .unwrap_or_else(|| text_content(node)),
                    start_line: record.map(|r| r.span.start),
                    end_line: record.map(|r| r.span.end),
                    members: record
                        .map(|r| r.members.iter().map(ToString::to_string).collect())
                        .unwrap_or_default(),
                });
            }
            Role::Node => {
                let core_id = node_core_id(id, &view);
                let record = view.node(core_id);
                let style = view
                    .style_for(core_id)
                    .map(|(_, style)| style.properties.iter().cloned().collect::<BTreeMap<_, _>>())
                    .unwrap_or_default();
                objects.nodes.push(NodeObject {
                    id: id.to_owned(),
                    core_id: core_id.to_owned(),
                    label: record.map(|r| r.label().to_owned()).unwrap_or_else(|| {
                        let text = text_content(node);
                        if text.is_empty() {
                            core_id.to_owned()
                        } else {
                            text
                        }
                    }),
                    shape: record
                        .and_then(|r| r.definition.as_ref())
                        .and_then(|def| def.shape_name()),
                    style,
                });
            }
            Role::Edge => edge_elements.push(id),
            Role::Other => objects.others.push(OtherObject {
                id: id.to_owned(),
                class: node.attribute("class").map(str::to_owned),
            }),
        }
    }

    // Edges are resolved after every node so endpoint labels come from this same pass.
    let known = view
        .nodes
        .iter()
        .map(|node| node.id.as_str())
        .chain(view.subgraphs.iter().map(|subgraph| subgraph.id.as_str()))
        .collect::<BTreeSet<_>>();
    let parsed = edge_elements.iter().map(|id| parse_edge_id(id, &known)).collect::<Vec<_>>();
    let ranks = pair_ranks(&parsed);
    for ((id, parsed), rank) in edge_elements.into_iter().zip(parsed).zip(ranks) {
        let Some((source_core_id, target_core_id, _)) = parsed else {
            objects.others.push(OtherObject { id: id.to_owned(), class: None });
            continue;
        };
        let link = view
            .links
            .iter()
            .filter(|record| {
                record.link.source.id == source_core_id && record.link.target.id == target_core_id
            })
            .nth(rank);
        let source_label = objects.node_label(&source_core_id).to_owned();
        let target_label = objects.node_label(&target_core_id).to_owned();
        objects.edges.push(EdgeObject {
            id: id.to_owned(),
            source_label,
            target_label,
            arrow: link.map(|record| record.link.arrow),
            text: link.and_then(|record| record.link.text.clone()),
            link_index: link.map(|record| record.index),
            source_core_id,
            target_core_id,
        });
    }
    objects
}
