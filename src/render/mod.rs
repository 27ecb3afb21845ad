// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Boundary to the external render service.
//!
//! The core never renders by itself. It hands the current source text to a [`RenderService`]
//! and, through the [`RenderScheduler`], only acts on the answer to the most recent request.

use std::fmt;
use std::future::Future;

use crate::config::ThemeConfig;

mod scheduler;

pub use scheduler::{RenderOutcome, RenderScheduler};

/// Markup produced by a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSvg {
    pub svg: String,
}

impl RenderedSvg {
    pub fn new(svg: impl Into<String>) -> Self {
        Self { svg: svg.into() }
    }
}

/// Any rejection by the renderer; the text is treated as invalid syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "render failed: {}", self.message)
    }
}

impl std::error::Error for RenderError {}

/// An external renderer. `render_id` is unique per request and may be used by the renderer as
/// the id of the element it attaches.
pub trait RenderService {
    fn render(
        &self,
        render_id: &str,
        source_text: &str,
        theme: &ThemeConfig,
    ) -> impl Future<Output = Result<RenderedSvg, RenderError>>;
}
