// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! One open diagram plus everything derived from it.
//!
//! The session owns the source, the per-session id counters, the last extracted object list and
//! the current selection. It is driven by the host's event loop: gestures call [`EditorSession::apply`],
//! typing calls [`EditorSession::replace_text`], and every [`RenderOutcome`] is fed back through
//! [`EditorSession::handle_outcome`].

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::extract::{extract, ExtractError};
use crate::model::{
    Diagram, DiagramId, DiagramKind, DiagramObjects, DiagramSource, IdAllocator, IdError,
    UnknownDiagramKind,
};
use crate::ops::{apply_ops, ApplyError, ApplyResult, Op};
use crate::reconcile::{Reconciler, Selection};
use crate::render::RenderOutcome;

/// Persisted form of a diagram, owned by the host's storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SavedDiagram {
    pub id: String,
    pub title: String,
    pub code: String,
    /// Milliseconds since the Unix epoch, as supplied by the host.
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    InvalidId(IdError),
    UnknownKind(UnknownDiagramKind),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidId(err) => write!(f, "invalid diagram id: {err}"),
            Self::UnknownKind(err) => write!(f, "unsupported diagram: {err}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidId(err) => Some(err),
            Self::UnknownKind(err) => Some(err),
        }
    }
}

impl From<IdError> for SessionError {
    fn from(value: IdError) -> Self {
        Self::InvalidId(value)
    }
}

impl From<UnknownDiagramKind> for SessionError {
    fn from(value: UnknownDiagramKind) -> Self {
        Self::UnknownKind(value)
    }
}

#[derive(Debug, Clone)]
pub struct EditorSession {
    diagram: Diagram,
    created_at: u64,
    ids: IdAllocator,
    reconciler: Reconciler,
    objects: DiagramObjects,
    selection: Option<Selection>,
    svg: Option<String>,
    notice: Option<String>,
}

impl EditorSession {
    pub fn new(diagram: Diagram, created_at: u64) -> Self {
        Self {
            diagram,
            created_at,
            ids: IdAllocator::new(),
            reconciler: Reconciler::new(),
            objects: DiagramObjects::default(),
            selection: None,
            svg: None,
            notice: None,
        }
    }

    /// Starts a new document from the minimal template of `kind`.
    pub fn from_template(
        diagram_id: DiagramId,
        title: impl Into<String>,
        kind: DiagramKind,
        created_at: u64,
    ) -> Self {
        let source = DiagramSource::from_text(kind.template());
        Self::new(Diagram::new(diagram_id, title, kind, source), created_at)
    }

    pub fn from_record(record: &SavedDiagram) -> Result<Self, SessionError> {
        let diagram_id = DiagramId::new(record.id.clone())?;
        let diagram = Diagram::from_text(diagram_id, record.title.clone(), &record.code)?;
        Ok(Self::new(diagram, record.created_at))
    }

    pub fn to_record(&self) -> SavedDiagram {
        SavedDiagram {
            id: self.diagram.diagram_id().to_string(),
            title: self.diagram.name().to_owned(),
            code: self.diagram.source().to_text(),
            created_at: self.created_at,
        }
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn source_text(&self) -> String {
        self.diagram.source().to_text()
    }

    pub fn objects(&self) -> &DiagramObjects {
        &self.objects
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn select(&mut self, selection: Option<Selection>) {
        self.selection = selection;
    }

    /// Annotated markup of the last successful render.
    pub fn svg(&self) -> Option<&str> {
        self.svg.as_deref()
    }

    /// Short human-readable message about the last failure, if any.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Applies a gesture's ops. On success the pending selection token is armed for the next
    /// extraction; on failure the source is untouched and the error becomes the notice.
    pub fn apply(&mut self, base_rev: u64, ops: &[Op]) -> Result<ApplyResult, ApplyError> {
        match apply_ops(&mut self.diagram, base_rev, ops, &mut self.ids) {
            Ok(result) => {
                if let Some(token) = result.pending.clone() {
                    self.reconciler.set_pending(token);
                }
                self.notice = None;
                Ok(result)
            }
            Err(err) => {
                tracing::warn!(error = %err, "mutation rejected");
                self.notice = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Replaces the whole text after a direct edit in the code pane.
    pub fn replace_text(&mut self, text: &str) -> u64 {
        self.diagram.replace_source(DiagramSource::from_text(text));
        self.diagram.bump_rev();
        self.diagram.rev()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.diagram.set_name(title);
    }

    /// Extracts objects from a successful render of `source_text` and reconciles the selection.
    pub fn on_render_success(
        &mut self,
        source_text: &str,
        svg: &str,
    ) -> Result<Option<&Selection>, ExtractError> {
        let source = DiagramSource::from_text(source_text);
        let kind = DiagramKind::sniff(&source).unwrap_or(self.diagram.kind());
        let extraction = match extract(kind, svg, &source) {
            Ok(extraction) => extraction,
            Err(err) => {
                tracing::warn!(error = %err, "extraction failed");
                return Err(err);
            }
        };

        self.selection = self.reconciler.reconcile(&extraction.objects, self.selection.as_ref());
        self.objects = extraction.objects;
        self.svg = Some(extraction.svg);
        self.notice = None;
        Ok(self.selection.as_ref())
    }

    /// Keeps the previous objects and markup; only the notice changes.
    pub fn on_render_failure(&mut self, message: &str) {
        self.notice = Some(message.to_owned());
    }

    pub fn handle_outcome(&mut self, outcome: RenderOutcome) -> Result<(), ExtractError> {
        match outcome {
            RenderOutcome::Rendered { source_text, svg, .. } => {
                self.on_render_success(&source_text, &svg)?;
            }
            RenderOutcome::Failed { error, .. } => self.on_render_failure(&error.message),
            RenderOutcome::Superseded { .. } => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{EditorSession, SavedDiagram, SessionError};
    use crate::model::{DiagramId, DiagramKind, IdError};
    use crate::ops::{FlowOp, Op};
    use crate::render::{RenderError, RenderOutcome};

    fn record(code: &str) -> SavedDiagram {
        SavedDiagram {
            id: "d:1".to_owned(),
            title: "Checkout".to_owned(),
            code: code.to_owned(),
            created_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn record_round_trips_through_session() {
        let saved = record("flowchart TD\n    A --> B\n");
        let session = EditorSession::from_record(&saved).expect("session");
        assert_eq!(session.diagram().kind(), DiagramKind::Flowchart);
        assert_eq!(session.to_record(), saved);

        let json = serde_json::to_value(&saved).expect("json");
        assert_eq!(json["createdAt"], 1_700_000_000_000u64);
    }

    #[test]
    fn record_errors_are_typed() {
        let mut bad_id = record("flowchart TD");
        bad_id.id = "has space".to_owned();
        assert_eq!(
            EditorSession::from_record(&bad_id).unwrap_err(),
            SessionError::InvalidId(IdError::ContainsWhitespace)
        );
        assert!(matches!(
            EditorSession::from_record(&record("pie title Pets")).unwrap_err(),
            SessionError::UnknownKind(_)
        ));
    }

    #[test]
    fn template_session_starts_at_revision_zero() {
        let diagram_id = DiagramId::new("d:new").expect("diagram id");
        let session = EditorSession::from_template(diagram_id, "New", DiagramKind::Er, 0);
        assert_eq!(session.diagram().rev(), 0);
        assert!(session.source_text().starts_with("erDiagram"));
    }

    #[test]
    fn rejected_mutation_sets_notice_and_keeps_source() {
        let mut session = EditorSession::from_record(&record("flowchart TD\n    A")).expect("session");
        let ops = [Op::Flow(FlowOp::DeleteNode { id: "Z".to_owned() })];
        assert!(session.apply(0, &ops).is_err());
        assert_eq!(session.notice(), Some("node 'Z' has no definition in the source"));
        assert_eq!(session.source_text(), "flowchart TD\n    A");
    }

    #[test]
    fn render_failure_keeps_previous_objects() {
        let mut session = EditorSession::from_record(&record("flowchart TD\n    A")).expect("session");
        session
            .handle_outcome(RenderOutcome::Failed { token: 1, error: RenderError::new("bad arrow") })
            .expect("handled");
        assert_eq!(session.notice(), Some("bad arrow"));
        assert!(session.objects().is_empty());
        assert!(session.svg().is_none());
    }

    #[test]
    fn typing_bumps_revision_and_resniffs_kind() {
        let mut session = EditorSession::from_record(&record("flowchart TD\n    A")).expect("session");
        let rev = session.replace_text("sequenceDiagram\n    A->>B: hi");
        assert_eq!(rev, 1);
        assert_eq!(session.diagram().kind(), DiagramKind::Sequence);
    }
}
