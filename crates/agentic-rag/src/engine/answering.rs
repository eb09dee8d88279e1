//! Answer synthesis for both routes.
use crate::error::TurnError;
use crate::llm::{GenerationBackend, PromptMessage};
use crate::memory::{Message, Role};
use crate::turn::{Route, Source};
use std::sync::Arc;
use tracing::debug;

/// Fixed response when retrieval produced nothing. Returned without a
/// generation call, so an empty context can never be embellished into a
/// fabricated answer.
pub const NO_MATCH_ANSWER: &str =
    "The available documents do not contain material relevant to this question.";

/// Rotated by turn index so refusals keep their meaning but not their
/// exact wording across a session.
const REFUSAL_STYLES: [&str; 3] = [
    "politely decline and restate that your purpose is answering questions about the uploaded documents",
    "briefly explain that the request falls outside your scope as a document assistant",
    "note that you focus on the uploaded document collection and steer back to it",
];

pub struct Answerer {
    backend: Arc<dyn GenerationBackend>,
    temperature: f32,
    max_tokens: u32,
}

impl Answerer {
    pub fn new(backend: Arc<dyn GenerationBackend>, temperature: f32, max_tokens: u32) -> Self {
        Self { backend, temperature, max_tokens }
    }

    /// Produces the raw (un-finalized) answer for the routed query.
    pub async fn answer(
        &self,
        query: &str,
        route: Route,
        sources: &[Source],
        recent_messages: &[Message],
        turn_index: u32,
    ) -> Result<String, TurnError> {
        let messages = match route {
            Route::Retrieve => {
                if sources.is_empty() {
                    debug!("No sources survived retrieval, returning fixed no-match answer");
                    return Ok(NO_MATCH_ANSWER.to_string());
                }
                build_grounded_prompt(query, sources)
            }
            Route::Direct => build_direct_prompt(query, recent_messages, turn_index),
        };

        let raw = self
            .backend
            .generate(&messages, self.temperature, self.max_tokens)
            .await
            .map_err(TurnError::Generation)?;

        Ok(raw.trim().to_string())
    }
}

fn build_grounded_prompt(query: &str, sources: &[Source]) -> Vec<PromptMessage> {
    let context: String = sources
        .iter()
        .map(|s| format!("[{}] ({}) {}", s.id, s.document_name, s.passage))
        .collect::<Vec<_>>()
        .join("\n\n");

    let system = "You are a document question-answering assistant.\n\
         Answer using only the SOURCES below.\n\n\
         Grounding rules:\n\
         - Cite every factual claim with its source tag, like [S1] or [S2].\n\
         - Never invent citations or add facts absent from the sources.\n\
         - If the sources do not answer the question, say the documents do not contain it.\n\n\
         Quality rules:\n\
         - Synthesis across sources (comparison, summary, critique) is allowed, \
         but label it as Analysis and tie it to cited sources.\n\n\
         Formatting rules:\n\
         - Lead with the direct answer, citations inline.\n\
         - Do not ask the user any questions. End with a declarative sentence.";

    let user = format!(
        "QUESTION:\n{}\n\nSOURCES:\n{}\n\nWrite a helpful answer with citations.",
        query, context
    );

    vec![PromptMessage::system(system), PromptMessage::user(user)]
}

fn build_direct_prompt(
    query: &str,
    recent_messages: &[Message],
    turn_index: u32,
) -> Vec<PromptMessage> {
    let refusal_style = REFUSAL_STYLES[turn_index as usize % REFUSAL_STYLES.len()];

    let system = format!(
        "You are a document question-answering assistant for a private document collection.\n\
         You answer questions about uploaded documents with citations, retrieve relevant \
         passages on demand, and keep conversation context across turns.\n\n\
         This query needs no document retrieval. Respond conversationally but stay in \
         character. If asked what you can do, describe your document capabilities.\n\
         If the request is off-topic, {}.\n\
         Use the conversation history for context.\n\
         Do not ask the user any questions. End with a declarative sentence.",
        refusal_style
    );

    let mut messages = vec![PromptMessage::system(system)];
    for message in recent_messages {
        messages.push(match message.role {
            Role::User => PromptMessage::user(message.content.clone()),
            Role::Assistant => PromptMessage::assistant(message.content.clone()),
        });
    }
    messages.push(PromptMessage::user(query));
    messages
}
