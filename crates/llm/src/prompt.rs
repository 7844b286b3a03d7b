//! Prompt construction for answer generation and judging

use ops_assist_core::Context;

pub use ops_assist_core::{Message, Role};

const ANSWER_SYSTEM_PROMPT: &str = "You are an operations assistant for batch scheduling \
and workload automation. Answer the operator's question using ONLY the numbered context \
passages. Cite passages as [n]. If the context does not contain the answer, say so plainly \
instead of guessing. Keep answers short and actionable.";

const GROUNDEDNESS_PROMPT: &str = r#"You are checking whether an answer is grounded in its context.

Context:
{context}

Answer:
{answer}

List every factual claim in the answer that is NOT supported by the context.
Respond in JSON format:
{
    "grounded": true/false,
    "confidence": 0.0-1.0,
    "unsupported_claims": ["..."],
    "rationale": "one sentence"
}

JSON response:"#;

const USEFULNESS_PROMPT: &str = r#"You are checking whether an answer addresses an operator's question.

Question:
{query}

Answer:
{answer}

Respond in JSON format:
{
    "useful": true/false,
    "confidence": 0.0-1.0,
    "rationale": "one sentence"
}

JSON response:"#;

/// Builder for chat message sequences
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    messages: Vec<Message>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::system(content));
        self
    }

    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    pub fn history(mut self, history: &[Message]) -> Self {
        self.messages.extend_from_slice(history);
        self
    }

    pub fn build(self) -> Vec<Message> {
        self.messages
    }

    /// Answer prompt: instructions, numbered context, prior turns, then the query
    pub fn answer(query: &str, context: &Context, history: &[Message]) -> Vec<Message> {
        let context_block = if context.is_empty() {
            "No context passages were retrieved.".to_string()
        } else {
            context.render()
        };

        Self::new()
            .system(ANSWER_SYSTEM_PROMPT)
            .system(format!("Context:\n{}", context_block))
            .history(history)
            .user(query)
            .build()
    }

    pub fn groundedness(answer: &str, context: &Context) -> Vec<Message> {
        let prompt = GROUNDEDNESS_PROMPT
            .replace("{context}", &context.render())
            .replace("{answer}", answer);
        Self::new().user(prompt).build()
    }

    pub fn usefulness(query: &str, answer: &str) -> Vec<Message> {
        let prompt = USEFULNESS_PROMPT
            .replace("{query}", query)
            .replace("{answer}", answer);
        Self::new().user(prompt).build()
    }
}
