// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Diasync: text-model synchronization core for visual Mermaid diagram editors.
//!
//! The Mermaid source text is the single source of truth. Visual gestures become line-level
//! text mutations ([`ops`]), the text is rendered by an external service ([`render`]), and the
//! rendered markup is walked back into a typed object list ([`extract`]) whose selection survives
//! re-renders ([`reconcile`]).

pub mod config;
pub mod extract;
pub mod format;
pub mod model;
pub mod ops;
pub mod reconcile;
pub mod render;
pub mod session;

pub use config::{ConfigError, EditorConfig, ThemeConfig};
pub use model::{Diagram, DiagramId, DiagramKind, DiagramSource};
pub use ops::{apply_ops, ApplyError, ApplyResult, Op};
pub use session::{EditorSession, SavedDiagram};
