// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Derived diagram objects, rebuilt from rendered output after every successful render.
//!
//! `id` is the volatile handle found in the rendered markup. Core ids, entity names and
//! participant aliases are the durable handles that survive re-renders.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::format::mermaid::er::{AttributeKey, Cardinality, Identification};
use crate::format::mermaid::flowchart::ArrowKind;
use crate::format::mermaid::sequence::{FragmentKind, MessageArrow, NotePlacement, ParticipantType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Node,
    Edge,
    Subgraph,
    Entity,
    Relationship,
    Participant,
    Message,
    Note,
    Fragment,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodeObject {
    pub id: String,
    pub core_id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EdgeObject {
    pub id: String,
    pub source_core_id: String,
    pub target_core_id: String,
    pub source_label: String,
    pub target_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrow: Option<ArrowKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Position among all links in source document order; `None` when the rendered edge
    /// could not be paired with a single-connector link line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SubgraphObject {
    pub id: String,
    pub core_id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AttributeObject {
    pub attr_type: String,
    pub name: String,
    #[serde(default)]
    pub keys: Vec<AttributeKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EntityObject {
    pub id: String,
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub attributes: Vec<AttributeObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RelationshipObject {
    pub id: String,
    pub index: usize,
    pub entity1: String,
    pub cardinality1: Cardinality,
    pub identification: Identification,
    pub cardinality2: Cardinality,
    pub entity2: String,
    pub label: String,
    pub line_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ParticipantObject {
    pub id: String,
    pub alias: String,
    pub label: String,
    pub participant_type: ParticipantType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MessageObject {
    pub id: String,
    pub index: usize,
    pub from: String,
    pub to: String,
    pub arrow: MessageArrow,
    pub text: String,
    pub line_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NoteObject {
    pub id: String,
    pub index: usize,
    pub placement: NotePlacement,
    pub participants: Vec<String>,
    pub text: String,
    pub line_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FragmentObject {
    pub id: String,
    pub index: usize,
    pub kind: FragmentKind,
    pub label: String,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OtherObject {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

/// Every object found in one extraction pass, bucketed by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DiagramObjects {
    #[serde(default)]
    pub nodes: Vec<NodeObject>,
    #[serde(default)]
    pub edges: Vec<EdgeObject>,
    #[serde(default)]
    pub subgraphs: Vec<SubgraphObject>,
    #[serde(default)]
    pub entities: Vec<EntityObject>,
    #[serde(default)]
    pub relationships: Vec<RelationshipObject>,
    #[serde(default)]
    pub participants: Vec<ParticipantObject>,
    #[serde(default)]
    pub messages: Vec<MessageObject>,
    #[serde(default)]
    pub notes: Vec<NoteObject>,
    #[serde(default)]
    pub fragments: Vec<FragmentObject>,
    #[serde(default)]
    pub others: Vec<OtherObject>,
}

impl DiagramObjects {
    /// `(id, kind)` for every object, bucket by bucket.
    pub fn ids(&self) -> impl Iterator<Item = (&str, ObjectKind)> + '_ {
        let nodes = self.nodes.iter().map(|o| (o.id.as_str(), ObjectKind::Node));
        let edges = self.edges.iter().map(|o| (o.id.as_str(), ObjectKind::Edge));
        let subgraphs = self.subgraphs.iter().map(|o| (o.id.as_str(), ObjectKind::Subgraph));
        let entities = self.entities.iter().map(|o| (o.id.as_str(), ObjectKind::Entity));
        let relationships =
            self.relationships.iter().map(|o| (o.id.as_str(), ObjectKind::Relationship));
        let participants =
            self.participants.iter().map(|o| (o.id.as_str(), ObjectKind::Participant));
        let messages = self.messages.iter().map(|o| (o.id.as_str(), ObjectKind::Message));
        let notes = self.notes.iter().map(|o| (o.id.as_str(), ObjectKind::Note));
        let fragments = self.fragments.iter().map(|o| (o.id.as_str(), ObjectKind::Fragment));
        let others = self.others.iter().map(|o| (o.id.as_str(), ObjectKind::Other));
        nodes
            .chain(edges)
            .chain(subgraphs)
            .chain(entities)
            .chain(relationships)
            .chain(participants)
            .chain(messages)
            .chain(notes)
            .chain(fragments)
            .chain(others)
    }

    pub fn kind_of(&self, id: &str) -> Option<ObjectKind> {
        self.ids().find(|(candidate, _)| *candidate == id).map(|(_, kind)| kind)
    }

    pub fn contains(&self, id: &str, kind: ObjectKind) -> bool {
        self.ids().any(|(candidate, candidate_kind)| candidate == id && candidate_kind == kind)
    }

    pub fn len(&self) -> usize {
        self.ids().count()
    }

    pub fn is_empty(&self) -> bool {
        self.ids().next().is_none()
    }

    pub fn node_by_core_id(&self, core_id: &str) -> Option<&NodeObject> {
        self.nodes.iter().find(|node| node.core_id == core_id)
    }

    /// Label for a node core id, falling back to the id itself.
    pub fn node_label<'a>(&'a self, core_id: &'a str) -> &'a str {
        self.node_by_core_id(core_id).map(|node| node.label.as_str()).unwrap_or(core_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{DiagramObjects, NodeObject, ObjectKind, OtherObject};

    fn node(id: &str, core: &str, label: &str) -> NodeObject {
        NodeObject {
            id: id.to_owned(),
            core_id: core.to_owned(),
            label: label.to_owned(),
            shape: None,
            style: Default::default(),
        }
    }

    #[test]
    fn lookups_by_id_and_core_id() {
        let objects = DiagramObjects {
            nodes: vec![node("flowchart-A-0", "A", "Start")],
            others: vec![OtherObject { id: "marker".to_owned(), class: None }],
            ..DiagramObjects::default()
        };
        assert_eq!(objects.len(), 2);
        assert_eq!(objects.kind_of("flowchart-A-0"), Some(ObjectKind::Node));
        assert!(objects.contains("marker", ObjectKind::Other));
        assert!(!objects.contains("marker", ObjectKind::Node));
        assert_eq!(objects.node_label("A"), "Start");
        assert_eq!(objects.node_label("Z"), "Z");
    }

    #[test]
    fn serializes_with_snake_case_kinds() {
        let json = serde_json::to_value(ObjectKind::Relationship).expect("serialize");
        assert_eq!(json, serde_json::json!("relationship"));
    }
}
