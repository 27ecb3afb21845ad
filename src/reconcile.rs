// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Identity reconciliation across re-renders.
//!
//! Rendered ids are volatile. After a mutation the engine records a [`PendingSelection`] that
//! names the object by durable attributes; the next extraction pass resolves it exactly once.
//! A token that finds no match is dropped and the selection becomes empty.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::{DiagramObjects, ObjectKind};

/// The selected object, addressed by its rendered id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Selection {
    pub id: String,
    pub kind: ObjectKind,
}

impl Selection {
    pub fn new(id: impl Into<String>, kind: ObjectKind) -> Self {
        Self { id: id.into(), kind }
    }
}

/// Durable description of an object expected to appear in the next extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingSelection {
    Edge {
        source_core_id: String,
        target_core_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        link_index: Option<usize>,
    },
    Node { core_id: String },
    Subgraph { core_id: String },
    Entity { name: String },
    Relationship { index: usize },
    Participant { alias: String },
    Message { index: usize },
    Note { index: usize },
    Fragment { index: usize },
}

impl PendingSelection {
    /// Builds the durable token for `selection` from the objects it was selected in.
    pub fn for_selection(objects: &DiagramObjects, selection: &Selection) -> Option<Self> {
        let id = selection.id.as_str();
        match selection.kind {
            ObjectKind::Node => objects
                .nodes
                .iter()
                .find(|o| o.id == id)
                .map(|o| Self::Node { core_id: o.core_id.clone() }),
            ObjectKind::Edge => objects.edges.iter().find(|o| o.id == id).map(|o| Self::Edge {
                source_core_id: o.source_core_id.clone(),
                target_core_id: o.target_core_id.clone(),
                link_index: o.link_index,
            }),
            ObjectKind::Subgraph => objects
                .subgraphs
                .iter()
                .find(|o| o.id == id)
                .map(|o| Self::Subgraph { core_id: o.core_id.clone() }),
            ObjectKind::Entity => objects
                .entities
                .iter()
                .find(|o| o.id == id)
                .map(|o| Self::Entity { name: o.name.clone() }),
            ObjectKind::Relationship => objects
                .relationships
                .iter()
                .find(|o| o.id == id)
                .map(|o| Self::Relationship { index: o.index }),
            ObjectKind::Participant => objects
                .participants
                .iter()
                .find(|o| o.id == id)
                .map(|o| Self::Participant { alias: o.alias.clone() }),
            ObjectKind::Message => objects
                .messages
                .iter()
                .find(|o| o.id == id)
                .map(|o| Self::Message { index: o.index }),
            ObjectKind::Note => {
                objects.notes.iter().find(|o| o.id == id).map(|o| Self::Note { index: o.index })
            }
            ObjectKind::Fragment => objects
                .fragments
                .iter()
                .find(|o| o.id == id)
                .map(|o| Self::Fragment { index: o.index }),
            ObjectKind::Other => None,
        }
    }

    /// Finds the object this token describes in a fresh extraction.
    pub fn resolve(&self, objects: &DiagramObjects) -> Option<Selection> {
        match self {
            Self::Edge { source_core_id, target_core_id, link_index } => {
                let mut candidates = objects.edges.iter().filter(|edge| {
                    edge.source_core_id == *source_core_id && edge.target_core_id == *target_core_id
                });
                let first = candidates.next()?;
                let exact = std::iter::once(first)
                    .chain(candidates)
                    .find(|edge| link_index.is_some() && edge.link_index == *link_index);
                Some(Selection::new(exact.unwrap_or(first).id.clone(), ObjectKind::Edge))
            }
            Self::Node { core_id } => objects
                .node_by_core_id(core_id)
                .map(|o| Selection::new(o.id.clone(), ObjectKind::Node)),
            Self::Subgraph { core_id } => objects
                .subgraphs
                .iter()
                .find(|o| o.core_id == *core_id)
                .map(|o| Selection::new(o.id.clone(), ObjectKind::Subgraph)),
            Self::Entity { name } => objects
                .entities
                .iter()
                .find(|o| o.name == *name)
                .map(|o| Selection::new(o.id.clone(), ObjectKind::Entity)),
            Self::Relationship { index } => objects
                .relationships
                .iter()
                .find(|o| o.index == *index)
                .map(|o| Selection::new(o.id.clone(), ObjectKind::Relationship)),
            Self::Participant { alias } => objects
                .participants
                .iter()
                .find(|o| o.alias == *alias)
                .map(|o| Selection::new(o.id.clone(), ObjectKind::Participant)),
            Self::Message { index } => objects
                .messages
                .iter()
                .find(|o| o.index == *index)
                .map(|o| Selection::new(o.id.clone(), ObjectKind::Message)),
            Self::Note { index } => objects
                .notes
                .iter()
                .find(|o| o.index == *index)
                .map(|o| Selection::new(o.id.clone(), ObjectKind::Note)),
            Self::Fragment { index } => objects
                .fragments
                .iter()
                .find(|o| o.index == *index)
                .map(|o| Selection::new(o.id.clone(), ObjectKind::Fragment)),
        }
    }
}

/// Holds at most one pending token plus the objects of the previous extraction.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    pending: Option<PendingSelection>,
    previous: Option<DiagramObjects>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&PendingSelection> {
        self.pending.as_ref()
    }

    /// Replaces any earlier token; only the latest mutation's intent is kept.
    pub fn set_pending(&mut self, token: PendingSelection) {
        self.pending = Some(token);
    }

    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    /// Computes the selection to expose alongside `objects`.
    ///
    /// A pending token always wins and is consumed whether or not it matches. Without one, the
    /// current selection is kept when its rendered id survived, or re-found through its durable
    /// handle in the previous extraction.
    pub fn reconcile(
        &mut self,
        objects: &DiagramObjects,
        current: Option<&Selection>,
    ) -> Option<Selection> {
        let previous = self.previous.replace(objects.clone());

        if let Some(token) = self.pending.take() {
            let resolved = token.resolve(objects);
            tracing::debug!(?token, resolved = ?resolved.as_ref().map(|s| &s.id), "resolved pending selection");
            return resolved;
        }

        let current = current?;
        if objects.contains(&current.id, current.kind) {
            return Some(current.clone());
        }
        let token = previous.as_ref().and_then(|prev| PendingSelection::for_selection(prev, current))?;
        let resolved = token.resolve(objects);
        tracing::debug!(from = %current.id, to = ?resolved.as_ref().map(|s| &s.id), "remapped selection");
        resolved
    }
}
