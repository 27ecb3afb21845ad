// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Structural edits expressed as text splices on a [`DiagramSource`].
//!
//! Operations are applied with optimistic concurrency (revision checks). Every op runs against a
//! draft copy of the source; the diagram only changes once the whole batch succeeded and each
//! step kept its blocks balanced.

mod er;
mod flow;
mod seq;

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use flow::{
    describe_edge_delete, subgraph_delete_choices, DeleteChoice, EdgeDeleteConfirmation,
    SubgraphDeleteChoices,
};

use crate::format::mermaid::er::{AttributeKey, Cardinality, Identification};
use crate::format::mermaid::flowchart::{ArrowKind, NodeShape};
use crate::format::mermaid::sequence::{FragmentKind, MessageArrow, NotePlacement, ParticipantType};
use crate::format::mermaid::MermaidIdentError;
use crate::model::{Diagram, DiagramKind, DiagramSource, IdAllocator, SourceError};
use crate::reconcile::PendingSelection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Flow(FlowOp),
    Er(ErOp),
    Seq(SeqOp),
}

impl Op {
    pub fn kind(&self) -> OpKind {
        match self {
            Self::Flow(_) => OpKind::Flow,
            Self::Er(_) => OpKind::Er,
            Self::Seq(_) => OpKind::Seq,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubgraphDeleteMode {
    /// Container block plus every node defined inside it.
    #[default]
    Everything,
    /// Only the `subgraph` and `end` lines; contents move to the parent scope.
    ContainerOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FlowOp {
    AddNode {
        #[serde(default)]
        id: Option<String>,
        #[serde(default = "default_shape")]
        shape: NodeShape,
        label: String,
    },
    AddEdge {
        from: String,
        to: String,
        #[serde(default)]
        text: Option<String>,
    },
    AddSubgraph {
        #[serde(default)]
        id: Option<String>,
        label: String,
    },
    DeleteNode {
        id: String,
    },
    DeleteEdge {
        index: usize,
    },
    DeleteSubgraph {
        id: String,
        #[serde(default)]
        mode: SubgraphDeleteMode,
    },
    DuplicateNode {
        id: String,
    },
    DuplicateSubgraph {
        id: String,
    },
    /// `into: None` moves the node to the top-level scope.
    MoveNode {
        id: String,
        #[serde(default)]
        into: Option<String>,
    },
    EditLabel {
        id: String,
        label: String,
    },
    EditSubgraphLabel {
        id: String,
        label: String,
    },
    SetNodeShape {
        id: String,
        shape: NodeShape,
    },
    SetNodeStyle {
        id: String,
        key: String,
        #[serde(default)]
        value: Option<String>,
    },
    SetLinkStyle {
        index: usize,
        key: String,
        #[serde(default)]
        value: Option<String>,
    },
    SetEdgeArrow {
        index: usize,
        arrow: ArrowKind,
    },
    SetEdgeText {
        index: usize,
        #[serde(default)]
        text: Option<String>,
    },
    SwapEdge {
        index: usize,
    },
    ApplyClass {
        ids: Vec<String>,
        class_name: String,
    },
    /// Edits the `classDef` line for `class_name`, appending one when none addresses it alone.
    SetClassStyle {
        class_name: String,
        key: String,
        #[serde(default)]
        value: Option<String>,
    },
}

fn default_shape() -> NodeShape {
    NodeShape::Rect
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AttributeSpec {
    pub attr_type: String,
    pub name: String,
    #[serde(default)]
    pub keys: Vec<AttributeKey>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RelationshipPatch {
    #[serde(default)]
    pub entity1: Option<String>,
    #[serde(default)]
    pub cardinality1: Option<Cardinality>,
    #[serde(default)]
    pub identification: Option<Identification>,
    #[serde(default)]
    pub cardinality2: Option<Cardinality>,
    #[serde(default)]
    pub entity2: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ErOp {
    AddEntity {
        #[serde(default)]
        name: Option<String>,
    },
    RenameEntity {
        name: String,
        new_name: String,
    },
    DeleteEntity {
        name: String,
    },
    AddAttribute {
        entity: String,
        attribute: AttributeSpec,
    },
    UpdateAttribute {
        entity: String,
        attribute_name: String,
        attribute: AttributeSpec,
    },
    DeleteAttribute {
        entity: String,
        attribute_name: String,
    },
    AddRelationship {
        entity1: String,
        cardinality1: Cardinality,
        identification: Identification,
        cardinality2: Cardinality,
        entity2: String,
        label: String,
    },
    UpdateRelationship {
        index: usize,
        patch: RelationshipPatch,
    },
    DeleteRelationship {
        index: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MessagePatch {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub arrow: Option<MessageArrow>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SeqOp {
    AddParticipant {
        #[serde(default)]
        alias: Option<String>,
        label: String,
        participant_type: ParticipantType,
    },
    UpdateParticipant {
        alias: String,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        participant_type: Option<ParticipantType>,
    },
    DeleteParticipant {
        alias: String,
    },
    AddMessage {
        from: String,
        to: String,
        arrow: MessageArrow,
        text: String,
    },
    UpdateMessage {
        index: usize,
        patch: MessagePatch,
    },
    DeleteMessage {
        index: usize,
    },
    AddNote {
        placement: NotePlacement,
        participants: Vec<String>,
        text: String,
    },
    AddFragment {
        kind: FragmentKind,
        label: String,
    },
    AddBox {
        label: String,
        #[serde(default)]
        color: Option<String>,
        participants: Vec<String>,
    },
    ToggleAutonumber,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyResult {
    pub new_rev: u64,
    pub applied: usize,
    /// Durable description of the object the last op created or re-identified.
    pub pending: Option<PendingSelection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Flow,
    Er,
    Seq,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    Conflict { base_rev: u64, current_rev: u64 },
    KindMismatch { diagram_kind: DiagramKind, op_kind: OpKind },
    NodeNotFound { id: String },
    SubgraphNotFound { id: String },
    LinkNotFound { index: usize },
    EntityNotFound { name: String },
    AttributeNotFound { entity: String, name: String },
    RelationshipNotFound { index: usize },
    ParticipantNotFound { alias: String },
    ParticipantAlreadyBoxed { alias: String },
    MessageNotFound { index: usize },
    AlreadyExists { id: String },
    InvalidIdent { id: String, reason: MermaidIdentError },
    ArrowTextConflict { index: usize, arrow: ArrowKind },
    NodeNotMovable { id: String },
    Source(SourceError),
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict { base_rev, current_rev } => {
                write!(f, "stale base_rev (base_rev={base_rev}, current_rev={current_rev})")
            }
            Self::KindMismatch { diagram_kind, op_kind } => {
                write!(f, "op kind mismatch (diagram_kind={diagram_kind}, op_kind={op_kind:?})")
            }
            Self::NodeNotFound { id } => write!(f, "node '{id}' has no definition in the source"),
            Self::SubgraphNotFound { id } => write!(f, "subgraph '{id}' not found"),
            Self::LinkNotFound { index } => write!(f, "link #{index} not found"),
            Self::EntityNotFound { name } => write!(f, "entity '{name}' not found"),
            Self::AttributeNotFound { entity, name } => {
                write!(f, "attribute '{name}' not found on entity '{entity}'")
            }
            Self::RelationshipNotFound { index } => write!(f, "relationship #{index} not found"),
            Self::ParticipantNotFound { alias } => write!(f, "participant '{alias}' not found"),
            Self::ParticipantAlreadyBoxed { alias } => {
                write!(f, "participant '{alias}' already belongs to a box")
            }
            Self::MessageNotFound { index } => write!(f, "message #{index} not found"),
            Self::AlreadyExists { id } => write!(f, "'{id}' already exists"),
            Self::InvalidIdent { id, reason } => write!(f, "invalid identifier '{id}': {reason}"),
            Self::ArrowTextConflict { index, arrow } => write!(
                f,
                "link #{index} has text; only the default arrow supports inline text (got {arrow:?})"
            ),
            Self::NodeNotMovable { id } => {
                write!(f, "node '{id}' has no standalone line that could be moved")
            }
            Self::Source(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ApplyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidIdent { reason, .. } => Some(reason),
            Self::Source(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SourceError> for ApplyError {
    fn from(err: SourceError) -> Self {
        Self::Source(err)
    }
}

/// Line `index` or [`SourceError::LineOutOfRange`].
pub(crate) fn line_at(source: &DiagramSource, index: usize) -> Result<&str, ApplyError> {
    source
        .line(index)
        .ok_or(ApplyError::Source(SourceError::LineOutOfRange { index, len: source.len() }))
}

/// Indent of the first non-blank body line after `declaration`, or four spaces for an empty body.
pub(crate) fn body_indent(source: &DiagramSource, declaration: Option<usize>) -> String {
    let start = declaration.map(|idx| idx + 1).unwrap_or(0);
    source
        .lines()
        .iter()
        .skip(start)
        .find(|line| !line.trim().is_empty())
        .map(|line| crate::model::indent_of(line))
        .unwrap_or("    ")
        .to_owned()
}

/// Inserts the default declaration at the top when the source has none; returns its index.
pub(crate) fn ensure_declaration(
    source: &mut DiagramSource,
    kind: DiagramKind,
    declaration: Option<usize>,
) -> Result<usize, ApplyError> {
    match declaration {
        Some(idx) => Ok(idx),
        None => {
            source.insert_lines(0, [kind.default_declaration()])?;
            Ok(0)
        }
    }
}

pub fn apply_ops(
    diagram: &mut Diagram,
    base_rev: u64,
    ops: &[Op],
    ids: &mut IdAllocator,
) -> Result<ApplyResult, ApplyError> {
    let current_rev = diagram.rev();
    if base_rev != current_rev {
        return Err(ApplyError::Conflict { base_rev, current_rev });
    }

    if ops.is_empty() {
        return Ok(ApplyResult { new_rev: current_rev, applied: 0, pending: None });
    }

    let kind = diagram.kind();
    let rules = kind.block_rules();
    let mut draft = diagram.source().clone();
    let mut pending = None;

    for op in ops {
        let was_balanced = draft.check_balance(rules).is_ok();
        let token = match (op, kind) {
            (Op::Flow(flow_op), DiagramKind::Flowchart) => flow::apply_flow_op(&mut draft, flow_op, ids)?,
            (Op::Er(er_op), DiagramKind::Er) => er::apply_er_op(&mut draft, er_op, ids)?,
            (Op::Seq(seq_op), DiagramKind::Sequence) => seq::apply_seq_op(&mut draft, seq_op)?,
            _ => {
                return Err(ApplyError::KindMismatch { diagram_kind: kind, op_kind: op.kind() });
            }
        };
        if was_balanced {
            draft.check_balance(rules)?;
        }
        if token.is_some() {
            pending = token;
        }
        tracing::debug!(?op, lines = draft.len(), "applied op");
    }

    diagram.replace_source(draft);
    diagram.bump_rev();
    let new_rev = diagram.rev();

    Ok(ApplyResult { new_rev, applied: ops.len(), pending })
}
