// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Core data model.
//!
//! A [`Diagram`] owns its [`DiagramSource`], the only authoritative representation. Everything in
//! [`objects`] is derived and rebuilt after each change.

pub mod diagram;
pub mod ids;
pub mod objects;
pub mod source;

pub use diagram::{Diagram, DiagramKind, UnknownDiagramKind};
pub use ids::{numbered_id, suffixed_id, DiagramId, IdAllocator, IdError};
pub use objects::{
    AttributeObject, DiagramObjects, EdgeObject, EntityObject, FragmentObject, MessageObject,
    NodeObject, NoteObject, ObjectKind, OtherObject, ParticipantObject, RelationshipObject,
    SubgraphObject,
};
pub use source::{indent_of, BlockRules, BlockSpan, DiagramSource, SourceError};
