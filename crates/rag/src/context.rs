//! Token-budgeted context assembly
//!
//! Walks the final ranking in order and keeps every passage that still fits.
//! Duplicate ids and duplicate content (same text up to case and whitespace)
//! are skipped; a passage that does not fit is skipped without ending the
//! scan, so a shorter passage further down can still use the space.

use std::collections::HashSet;

use ops_assist_config::ContextConfig;
use ops_assist_core::{Context, PushRejection, ScoredPassage};

use crate::text;

/// Greedy context assembler
pub struct ContextAssembler {
    config: ContextConfig,
}

impl ContextAssembler {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn budget(&self) -> usize {
        self.config.token_budget
    }

    pub fn assemble(&self, ranked: &[ScoredPassage]) -> Context {
        let mut builder = Context::builder(self.config.token_budget);
        let mut seen_content = HashSet::new();
        let mut skipped_budget = 0usize;
        let mut skipped_duplicate = 0usize;

        for (i, scored) in ranked.iter().enumerate() {
            if let Some(max) = self.config.max_passages {
                if builder.len() >= max {
                    break;
                }
            }
            if builder.remaining() == 0 {
                break;
            }

            let hash = text::content_hash(&scored.passage.content);
            if seen_content.contains(&hash) {
                skipped_duplicate += 1;
                continue;
            }

            let tokens = text::estimate_tokens(&scored.passage.content);
            match builder.try_push(scored.passage.clone(), tokens, i + 1) {
                Ok(()) => {
                    seen_content.insert(hash);
                },
                Err(PushRejection::DuplicateId) => skipped_duplicate += 1,
                Err(PushRejection::OverBudget) => skipped_budget += 1,
            }
        }

        let context = builder.build();
        tracing::debug!(
            passages = context.len(),
            tokens = context.total_tokens(),
            budget = context.budget(),
            skipped_budget,
            skipped_duplicate,
            "Context assembled"
        );
        context
    }
}
