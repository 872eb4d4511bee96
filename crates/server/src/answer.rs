//! The answering pipeline
//!
//! One state machine for both webhook entry points. The strategy decides how
//! a reply is produced; everything around it (conversation context, turn
//! persistence, degradation to apology strings) is shared.
//!
//! The pipeline never surfaces an upstream failure to the end user: any
//! error inside a strategy degrades to a fixed apology string.

use chatdock_common::convo::{Conversation, ConversationMeta, ConversationStore, MessageRole};
use chatdock_common::db::models::Organization;
use chatdock_common::embeddings::Embedder;
use chatdock_common::errors::Result;
use chatdock_common::llm::{ChatMessage, ChatModel};
use chatdock_common::metrics;
use chatdock_common::vector::VectorIndex;
use chatdock_common::tenant_namespace;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

/// Reply when the similarity query returns nothing
pub const NO_RESULTS_REPLY: &str =
    "I couldn't find any relevant information. Could you please rephrase your question?";

/// Reply when the best match carries no usable text
pub const EMPTY_TEXT_REPLY: &str =
    "I found some information but couldn't process it properly. Please try again.";

/// Reply when anything in the pipeline fails
pub const ERROR_REPLY: &str =
    "I encountered an error while processing your request. Please try again later.";

/// How an organization's replies are produced
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnswerStrategy {
    /// Embed the question, search the tenant namespace, reply with the best
    /// match's stored text
    Retrieval,

    /// Feed the conversation history plus the question to the chat model
    Chat,
}

impl AnswerStrategy {
    /// Resolve the strategy from organization settings; retrieval is the
    /// default for anything other than an explicit "chat".
    pub fn for_organization(org: &Organization) -> Self {
        match org.setting_str("answer_mode") {
            Some("chat") => AnswerStrategy::Chat,
            _ => AnswerStrategy::Retrieval,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnswerStrategy::Retrieval => "retrieval",
            AnswerStrategy::Chat => "chat",
        }
    }
}

/// Drives one inbound message from context load to reply persistence
#[derive(Clone)]
pub struct MessagePipeline {
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    vectors: Arc<dyn VectorIndex>,
    convo: ConversationStore,
    top_k: usize,
}

impl MessagePipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        vectors: Arc<dyn VectorIndex>,
        convo: ConversationStore,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            chat,
            vectors,
            convo,
            top_k,
        }
    }

    /// Handle one inbound message end to end: resolve the conversation
    /// context, produce a reply, persist both turns. Returns the reply text.
    pub async fn handle_incoming(
        &self,
        org: &Organization,
        phone_number: &str,
        text: &str,
    ) -> Result<String> {
        let conversation = self.conversation_context(org.id, phone_number).await?;
        let strategy = AnswerStrategy::for_organization(org);

        let reply = self.answer(org.id, &conversation, strategy, text).await;

        self.convo
            .create_message(&conversation, MessageRole::User, text, BTreeMap::new())
            .await?;
        self.convo
            .create_message(&conversation, MessageRole::Assistant, &reply, BTreeMap::new())
            .await?;

        info!(
            conversation_id = %conversation.id(),
            strategy = strategy.name(),
            "Inbound message answered"
        );

        Ok(reply)
    }

    /// Reuse the most recent conversation for this phone when it belongs to
    /// the caller's organization; otherwise start a fresh one.
    async fn conversation_context(
        &self,
        organization_id: Uuid,
        phone_number: &str,
    ) -> Result<Conversation> {
        match self.convo.latest_conversation(phone_number).await? {
            Some(conversation) if conversation.meta.organization_id == organization_id => {
                Ok(conversation)
            }
            _ => {
                self.convo
                    .create_conversation(phone_number, ConversationMeta::new(organization_id))
                    .await
            }
        }
    }

    /// Produce a reply. Infallible by contract: errors degrade to the
    /// apology string.
    pub async fn answer(
        &self,
        organization_id: Uuid,
        conversation: &Conversation,
        strategy: AnswerStrategy,
        text: &str,
    ) -> String {
        let start = Instant::now();

        let result = match strategy {
            AnswerStrategy::Retrieval => self.answer_retrieval(organization_id, text).await,
            AnswerStrategy::Chat => self.answer_chat(organization_id, conversation, text).await,
        };

        match result {
            Ok(reply) => reply,
            Err(e) => {
                error!(
                    strategy = strategy.name(),
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Answer pipeline failed, degrading to apology"
                );
                ERROR_REPLY.to_string()
            }
        }
    }

    async fn answer_retrieval(&self, organization_id: Uuid, text: &str) -> Result<String> {
        let start = Instant::now();
        let namespace = tenant_namespace(organization_id);

        let embedding = self.embedder.embed(text).await?;
        let matches = self.vectors.query(&namespace, &embedding, self.top_k).await?;

        metrics::record_retrieval(
            start.elapsed().as_secs_f64(),
            AnswerStrategy::Retrieval.name(),
            matches.len(),
        );

        Ok(match matches.first() {
            None => NO_RESULTS_REPLY.to_string(),
            Some(best) => match best.text() {
                Some(t) if !t.trim().is_empty() => t.to_string(),
                _ => EMPTY_TEXT_REPLY.to_string(),
            },
        })
    }

    async fn answer_chat(
        &self,
        organization_id: Uuid,
        conversation: &Conversation,
        text: &str,
    ) -> Result<String> {
        let history = self
            .convo
            .list_messages(&conversation.id(), organization_id)
            .await?;

        let mut messages: Vec<ChatMessage> = history
            .iter()
            .map(|m| ChatMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect();
        messages.push(ChatMessage::user(text));

        self.chat.complete(&messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdock_common::embeddings::MockEmbedder;
    use chatdock_common::llm::MockChat;
    use chatdock_common::vector::{MemoryIndex, VectorRecord};
    use serde_json::json;

    fn offline_store() -> ConversationStore {
        // Never called in these tests; retrieval never touches the store
        let conf = aws_sdk_dynamodb::Config::builder()
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .build();
        ConversationStore::with_client(aws_sdk_dynamodb::Client::from_conf(conf))
    }

    fn pipeline(vectors: Arc<dyn VectorIndex>) -> MessagePipeline {
        MessagePipeline::new(
            Arc::new(MockEmbedder::new(64)),
            Arc::new(MockChat),
            vectors,
            offline_store(),
            4,
        )
    }

    fn conversation(org: Uuid) -> Conversation {
        Conversation {
            phone_number: "15550001111".to_string(),
            timestamp: "2024-01-15T10:30:00.000000Z".to_string(),
            meta: ConversationMeta::new(org),
        }
    }

    #[tokio::test]
    async fn test_retrieval_no_matches_uses_fallback() {
        let org = Uuid::new_v4();
        let pipeline = pipeline(Arc::new(MemoryIndex::new()));

        let reply = pipeline
            .answer(org, &conversation(org), AnswerStrategy::Retrieval, "anything")
            .await;
        assert_eq!(reply, NO_RESULTS_REPLY);
    }

    #[tokio::test]
    async fn test_retrieval_returns_best_match_text() {
        let org = Uuid::new_v4();
        let index = Arc::new(MemoryIndex::new());

        let embedder = MockEmbedder::new(64);
        let values = embedder.embed("what are your hours").await.unwrap();
        index
            .upsert(
                &tenant_namespace(org),
                &[VectorRecord {
                    id: "0-deadbeef".to_string(),
                    values,
                    metadata: Some(json!({ "text": "We are open 9-5." })),
                }],
            )
            .await
            .unwrap();

        let pipeline = pipeline(index);
        let reply = pipeline
            .answer(
                org,
                &conversation(org),
                AnswerStrategy::Retrieval,
                "what are your hours",
            )
            .await;
        assert_eq!(reply, "We are open 9-5.");
    }

    #[tokio::test]
    async fn test_retrieval_empty_text_uses_fallback() {
        let org = Uuid::new_v4();
        let index = Arc::new(MemoryIndex::new());

        let embedder = MockEmbedder::new(64);
        let values = embedder.embed("question").await.unwrap();
        index
            .upsert(
                &tenant_namespace(org),
                &[VectorRecord {
                    id: "0-deadbeef".to_string(),
                    values,
                    metadata: Some(json!({ "text": "   " })),
                }],
            )
            .await
            .unwrap();

        let pipeline = pipeline(index);
        let reply = pipeline
            .answer(org, &conversation(org), AnswerStrategy::Retrieval, "question")
            .await;
        assert_eq!(reply, EMPTY_TEXT_REPLY);
    }

    #[tokio::test]
    async fn test_cross_tenant_namespace_not_visible() {
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        let index = Arc::new(MemoryIndex::new());

        let embedder = MockEmbedder::new(64);
        let values = embedder.embed("question").await.unwrap();
        index
            .upsert(
                &tenant_namespace(org_a),
                &[VectorRecord {
                    id: "0-deadbeef".to_string(),
                    values,
                    metadata: Some(json!({ "text": "tenant A secret" })),
                }],
            )
            .await
            .unwrap();

        let pipeline = pipeline(index);
        let reply = pipeline
            .answer(org_b, &conversation(org_b), AnswerStrategy::Retrieval, "question")
            .await;
        assert_eq!(reply, NO_RESULTS_REPLY);
    }

    #[test]
    fn test_strategy_from_settings() {
        let mut org = Organization {
            id: Uuid::new_v4(),
            name: "acme".to_string(),
            api_key: "key".to_string(),
            is_active: true,
            settings: Some(json!({ "answer_mode": "chat" })),
            created_at: chrono::Utc::now().into(),
            updated_at: None,
        };
        assert_eq!(AnswerStrategy::for_organization(&org), AnswerStrategy::Chat);

        org.settings = Some(json!({ "answer_mode": "retrieval" }));
        assert_eq!(
            AnswerStrategy::for_organization(&org),
            AnswerStrategy::Retrieval
        );

        org.settings = None;
        assert_eq!(
            AnswerStrategy::for_organization(&org),
            AnswerStrategy::Retrieval
        );
    }
}
