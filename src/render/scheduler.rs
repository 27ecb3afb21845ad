// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use smol_str::SmolStr;

use super::{RenderError, RenderService};
use crate::config::{EditorConfig, ThemeConfig};

/// What became of one scheduled render request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The request is still the latest one; `source_text` is the text that was rendered.
    Rendered { token: u64, source_text: String, svg: String },
    /// The renderer rejected the text. The derived object model must stay as it was.
    Failed { token: u64, error: RenderError },
    /// A newer request was issued while this one was waiting or in flight.
    Superseded { token: u64 },
}

impl RenderOutcome {
    pub fn token(&self) -> u64 {
        match self {
            Self::Rendered { token, .. } | Self::Failed { token, .. } | Self::Superseded { token } => {
                *token
            }
        }
    }
}

/// Debounces render requests and discards stale results, last writer wins.
///
/// Clones share the request counter, so a clone handed to a spawned task still observes newer
/// requests issued through the original.
#[derive(Debug, Clone)]
pub struct RenderScheduler {
    latest: Arc<AtomicU64>,
    debounce: Duration,
    extraction_delay: Duration,
    id_prefix: SmolStr,
}

impl RenderScheduler {
    pub fn new(debounce: Duration, extraction_delay: Duration, id_prefix: &str) -> Self {
        Self {
            latest: Arc::new(AtomicU64::new(0)),
            debounce,
            extraction_delay,
            id_prefix: SmolStr::new(id_prefix),
        }
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.debounce(), config.extraction_delay(), &config.render_id_prefix)
    }

    pub fn latest_token(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.latest_token() == token
    }

    /// Claims the token for a new request, making every earlier request stale.
    pub fn next_token(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Makes every issued request stale without starting a new one.
    pub fn invalidate(&self) {
        self.next_token();
    }

    pub fn render_id(&self, token: u64) -> String {
        let mut buffer = itoa::Buffer::new();
        let digits = buffer.format(token);
        let mut id = String::with_capacity(self.id_prefix.len() + 1 + digits.len());
        id.push_str(&self.id_prefix);
        id.push('-');
        id.push_str(digits);
        id
    }

    /// Waits out the debounce period, renders, then waits for the extraction delay.
    ///
    /// Staleness is checked after every await point; a superseded request never reaches the
    /// renderer if it was overtaken during the debounce.
    pub async fn schedule<S: RenderService>(
        &self,
        service: &S,
        source_text: String,
        theme: &ThemeConfig,
    ) -> RenderOutcome {
        let token = self.next_token();
        tokio::time::sleep(self.debounce).await;
        if !self.is_current(token) {
            tracing::debug!(token, "render request superseded during debounce");
            return RenderOutcome::Superseded { token };
        }

        let render_id = self.render_id(token);
        let result = service.render(&render_id, &source_text, theme).await;
        if !self.is_current(token) {
            tracing::debug!(token, "render result superseded while in flight");
            return RenderOutcome::Superseded { token };
        }

        match result {
            Ok(rendered) => {
                tokio::time::sleep(self.extraction_delay).await;
                if !self.is_current(token) {
                    tracing::debug!(token, "render result superseded before extraction");
                    return RenderOutcome::Superseded { token };
                }
                tracing::debug!(token, %render_id, bytes = rendered.svg.len(), "render succeeded");
                RenderOutcome::Rendered { token, source_text, svg: rendered.svg }
            }
            Err(error) => {
                tracing::warn!(token, %render_id, message = %error.message, "render failed");
                RenderOutcome::Failed { token, error }
            }
        }
    }
}
