//! Answer composition on top of retrieval results.
//!
//! The composer turns a packed context into a grounded prompt, delegates to
//! the completion provider, and hands back the generated text together with
//! the retrieval sources, untouched by generation. When no provider is
//! configured it falls back to a deterministic extractive answer so the
//! service stays usable offline.

use crate::{
    completion::{ChatMessage, CompletionClient, CompletionClientError, get_completion_client},
    metrics::ServiceMetrics,
    qdrant::{SearchFilterArgs, VectorIndex},
    retrieval::{
        ChatSource, RetrievalEngine, RetrievalError, RetrievalOutcome, RetrievedContext, SearchHit,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Fixed response returned when retrieval finds nothing trustworthy enough to
/// ground an answer. Callers can match on it verbatim.
pub const REFUSAL_TEXT: &str =
    "I don't have enough information in the uploaded documents to answer that.";

/// Number of most recent conversation turns forwarded to the generator.
const HISTORY_WINDOW: usize = 4;

/// Errors emitted by the question-answering path.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Retrieval failed before generation could be attempted.
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),
    /// Completion provider failed to generate an answer.
    #[error("Answer generation failed: {0}")]
    Completion(#[from] CompletionClientError),
}

/// Author of one conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Turn written by the end user.
    User,
    /// Turn previously produced by the service.
    Assistant,
}

/// One prior turn of the conversation, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Turn author.
    pub role: ChatRole,
    /// Turn text.
    pub content: String,
}

/// Parameters for one question against the index.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Natural-language question.
    pub question: String,
    /// Number of sources requested.
    pub k: usize,
    /// Optional allow-list filters restricting the searched documents.
    pub filters: SearchFilterArgs,
    /// Prior conversation turns, oldest first.
    pub history: Vec<ChatTurn>,
}

/// Generated answer paired with the sources that grounded it.
#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    /// Generated (or sentinel) answer text.
    pub answer: String,
    /// Sources in citation order; empty when the answer is the refusal.
    pub sources: Vec<ChatSource>,
}

/// Builds grounded prompts and delegates to the completion provider.
pub struct AnswerComposer {
    completion: Option<Box<dyn CompletionClient + Send + Sync>>,
}

impl AnswerComposer {
    /// Build a composer from configuration.
    pub fn new() -> Self {
        Self {
            completion: get_completion_client(),
        }
    }

    /// Assemble a composer with an explicit (possibly absent) client.
    pub fn with_client(completion: Option<Box<dyn CompletionClient + Send + Sync>>) -> Self {
        Self { completion }
    }

    /// Produce an answer for the retrieval outcome.
    ///
    /// When the confidence gate fired, generation is skipped entirely and the
    /// fixed refusal is returned with no sources.
    pub async fn answer(
        &self,
        question: &str,
        history: &[ChatTurn],
        outcome: RetrievalOutcome,
    ) -> Result<ChatAnswer, ChatError> {
        let RetrievalOutcome::Grounded(context) = outcome else {
            return Ok(ChatAnswer {
                answer: REFUSAL_TEXT.to_string(),
                sources: Vec::new(),
            });
        };

        let answer = match &self.completion {
            Some(client) => {
                client
                    .complete(build_messages(question, history, &context.context))
                    .await?
            }
            None => extractive_answer(&context),
        };

        Ok(ChatAnswer {
            answer,
            sources: context.sources,
        })
    }
}

impl Default for AnswerComposer {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble the ordered message sequence for the generator.
fn build_messages(question: &str, history: &[ChatTurn], context: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(HISTORY_WINDOW + 2);
    messages.push(ChatMessage::system(system_instruction()));

    let recent = &history[history.len().saturating_sub(HISTORY_WINDOW)..];
    for turn in recent {
        messages.push(match turn.role {
            ChatRole::User => ChatMessage::user(turn.content.clone()),
            ChatRole::Assistant => ChatMessage::assistant(turn.content.clone()),
        });
    }

    messages.push(ChatMessage::user(format!(
        "Context passages:\n{context}\n\nQuestion: {question}"
    )));
    messages
}

fn system_instruction() -> String {
    format!(
        "You answer questions using only the numbered context passages provided. \
         Cite the passages that support each statement with their [n] markers. \
         If the passages do not contain the information needed, reply exactly: \
         \"{REFUSAL_TEXT}\""
    )
}

/// Deterministic answer assembled from the packed sources when no completion
/// provider is configured.
fn extractive_answer(context: &RetrievedContext) -> String {
    context
        .sources
        .iter()
        .map(|source| format!("[{}] {}", source.citation_index, source.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Abstraction over the query surface used by external transports.
#[async_trait]
pub trait QueryApi: Send + Sync {
    /// Answer a question with citations, or the sentinel refusal.
    async fn chat(&self, request: ChatRequest) -> Result<ChatAnswer, ChatError>;

    /// Rank chunks for a query without generation.
    async fn search(
        &self,
        query: &str,
        k: usize,
        filters: &SearchFilterArgs,
    ) -> Result<Vec<SearchHit>, RetrievalError>;
}

/// Query service combining the retrieval engine and the answer composer.
pub struct QueryService {
    retrieval: RetrievalEngine,
    composer: AnswerComposer,
    metrics: Arc<ServiceMetrics>,
}

impl QueryService {
    /// Build the service from configuration, sharing the given index handle.
    pub fn new(index: Arc<dyn VectorIndex>, metrics: Arc<ServiceMetrics>) -> Self {
        Self {
            retrieval: RetrievalEngine::new(index),
            composer: AnswerComposer::new(),
            metrics,
        }
    }

    /// Assemble the service from explicit components.
    pub fn with_components(
        retrieval: RetrievalEngine,
        composer: AnswerComposer,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            retrieval,
            composer,
            metrics,
        }
    }
}

#[async_trait]
impl QueryApi for QueryService {
    async fn chat(&self, request: ChatRequest) -> Result<ChatAnswer, ChatError> {
        let outcome = self
            .retrieval
            .retrieve(&request.question, request.k, &request.filters)
            .await?;
        let answer = self
            .composer
            .answer(&request.question, &request.history, outcome)
            .await?;

        if answer.sources.is_empty() {
            self.metrics.record_refusal();
        } else {
            self.metrics.record_answer();
        }
        tracing::info!(
            sources = answer.sources.len(),
            refused = answer.sources.is_empty(),
            "Chat request answered"
        );
        Ok(answer)
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        filters: &SearchFilterArgs,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        self.retrieval.search(query, k, filters).await
    }
}
