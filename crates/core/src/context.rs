//! Assembled generation context
//!
//! A `Context` can only be grown through [`ContextBuilder::try_push`], which
//! rejects duplicate ids and anything that would exceed the token budget, so a
//! finished context satisfies both invariants by construction.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::passage::Passage;

/// One selected passage
#[derive(Debug, Clone)]
pub struct ContextPassage {
    pub passage: Arc<Passage>,
    /// 1-based position inside the context
    pub rank: usize,
    /// 1-based position in the final ranking it was taken from
    pub source_rank: usize,
    pub tokens: usize,
}

/// Read-only, token-bounded, duplicate-free passage sequence
#[derive(Debug, Clone, Default)]
pub struct Context {
    passages: Vec<ContextPassage>,
    total_tokens: usize,
    budget: usize,
}

impl Context {
    pub fn builder(budget: usize) -> ContextBuilder {
        ContextBuilder {
            context: Context {
                passages: Vec::new(),
                total_tokens: 0,
                budget,
            },
            ids: HashSet::new(),
        }
    }

    /// Empty context with the given budget
    pub fn empty(budget: usize) -> Self {
        Self::builder(budget).build()
    }

    pub fn passages(&self) -> &[ContextPassage] {
        &self.passages
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn ids(&self) -> Vec<String> {
        self.passages.iter().map(|p| p.passage.id.clone()).collect()
    }

    /// Concatenated passage text, used by judges for support lookups
    pub fn text(&self) -> String {
        self.passages
            .iter()
            .map(|p| p.passage.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Numbered rendering for prompts: `[n] (id) title: content`
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.passages {
            let _ = write!(out, "[{}] ({})", entry.rank, entry.passage.id);
            if let Some(title) = entry.passage.title() {
                let _ = write!(out, " {}:", title);
            }
            let _ = writeln!(out, " {}", entry.passage.content.trim());
        }
        out
    }
}

/// Why a passage was not added
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushRejection {
    DuplicateId,
    OverBudget,
}

/// Builder enforcing the context invariants
#[derive(Debug)]
pub struct ContextBuilder {
    context: Context,
    ids: HashSet<String>,
}

impl ContextBuilder {
    pub fn try_push(
        &mut self,
        passage: Arc<Passage>,
        tokens: usize,
        source_rank: usize,
    ) -> Result<(), PushRejection> {
        if self.ids.contains(&passage.id) {
            return Err(PushRejection::DuplicateId);
        }
        if self.context.total_tokens + tokens > self.context.budget {
            return Err(PushRejection::OverBudget);
        }

        self.ids.insert(passage.id.clone());
        self.context.total_tokens += tokens;
        let rank = self.context.passages.len() + 1;
        self.context.passages.push(ContextPassage {
            passage,
            rank,
            source_rank,
            tokens,
        });
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.context.budget - self.context.total_tokens
    }

    pub fn len(&self) -> usize {
        self.context.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.context.passages.is_empty()
    }

    pub fn build(self) -> Context {
        self.context
    }
}
