//! Conversation store backed by DynamoDB
//!
//! Three tables:
//! - `conversations`: hash `phone_number`, range `timestamp`
//! - `messages`: hash `conversation_id`, range `timestamp`,
//!   GSI `phone_number_index`
//! - `rate_limits`: hash `key` (declared for the deployment environment;
//!   no enforcement reads it)
//!
//! A conversation is addressed by the composite id `<phone>:<timestamp>`.
//! Every read verifies the stored `organization_id` against the caller's
//! organization; a mismatch surfaces as TenantMismatch.

use crate::config::DocumentStoreConfig;
use crate::errors::{AppError, Result};
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, GlobalSecondaryIndex, KeySchemaElement,
    KeyType, Projection, ProjectionType, ScalarAttributeType,
};
use aws_sdk_dynamodb::Client;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

const CONVERSATIONS_TABLE: &str = "conversations";
const MESSAGES_TABLE: &str = "messages";
const RATE_LIMITS_TABLE: &str = "rate_limits";
const PHONE_NUMBER_INDEX: &str = "phone_number_index";

/// Who authored a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("unknown message role: {}", other)),
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed conversation metadata. `organization_id` is mandatory and is the
/// tenancy boundary; everything else rides along in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationMeta {
    pub organization_id: Uuid,

    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ConversationMeta {
    pub fn new(organization_id: Uuid) -> Self {
        Self {
            organization_id,
            extra: BTreeMap::new(),
        }
    }

    /// Tenancy check. The caller's organization must match the stored one.
    pub fn ensure_owned_by(&self, organization_id: Uuid) -> Result<()> {
        if self.organization_id == organization_id {
            Ok(())
        } else {
            Err(AppError::TenantMismatch)
        }
    }
}

/// A stored conversation head record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub phone_number: String,

    /// RFC 3339, assigned at creation; doubles as the range key
    pub timestamp: String,

    pub meta: ConversationMeta,
}

impl Conversation {
    /// Composite id `<phone>:<timestamp>`
    pub fn id(&self) -> String {
        format!("{}:{}", self.phone_number, self.timestamp)
    }
}

/// A stored message within a conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub conversation_id: String,

    pub timestamp: String,

    pub phone_number: String,

    pub role: MessageRole,

    pub content: String,

    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Parsed composite conversation id.
///
/// The phone number never contains a colon; the timestamp does, so the id
/// splits on the FIRST colon only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationKey {
    pub phone_number: String,
    pub timestamp: String,
}

impl ConversationKey {
    pub fn parse(conversation_id: &str) -> Result<Self> {
        let mut parts = conversation_id.splitn(2, ':');
        match (parts.next(), parts.next()) {
            (Some(phone), Some(ts)) if !phone.is_empty() && !ts.is_empty() => Ok(Self {
                phone_number: phone.to_string(),
                timestamp: ts.to_string(),
            }),
            _ => Err(AppError::InvalidFormat {
                message: format!("invalid conversation id: {}", conversation_id),
            }),
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.phone_number, self.timestamp)
    }
}

/// DynamoDB-backed conversation store, constructed once and cloned freely
#[derive(Clone)]
pub struct ConversationStore {
    client: Client,
}

impl ConversationStore {
    /// Build a store from configuration, resolving AWS credentials from the
    /// ambient environment. `endpoint_url` points at LocalStack in dev.
    pub async fn new(config: &DocumentStoreConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let Some(url) = &config.endpoint_url {
            loader = loader.endpoint_url(url);
        }

        let shared = loader.load().await;

        Self {
            client: Client::new(&shared),
        }
    }

    /// Wrap an already constructed client (tests, custom wiring)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Cheap connectivity check for readiness probes
    pub async fn ping(&self) -> Result<()> {
        self.client
            .list_tables()
            .limit(1)
            .send()
            .await
            .map_err(store_err)?;
        Ok(())
    }

    // ========================================================================
    // Table bootstrap
    // ========================================================================

    /// Create the document-store tables when missing. Existing tables are
    /// left untouched.
    pub async fn ensure_tables(&self) -> Result<()> {
        self.create_conversations_table().await?;
        self.create_messages_table().await?;
        self.create_rate_limits_table().await?;
        info!("Document store tables ready");
        Ok(())
    }

    async fn create_conversations_table(&self) -> Result<()> {
        let result = self
            .client
            .create_table()
            .table_name(CONVERSATIONS_TABLE)
            .billing_mode(BillingMode::PayPerRequest)
            .attribute_definitions(string_attr("phone_number")?)
            .attribute_definitions(string_attr("timestamp")?)
            .key_schema(key_element("phone_number", KeyType::Hash)?)
            .key_schema(key_element("timestamp", KeyType::Range)?)
            .send()
            .await;

        ignore_existing(CONVERSATIONS_TABLE, result)
    }

    async fn create_messages_table(&self) -> Result<()> {
        let phone_index = GlobalSecondaryIndex::builder()
            .index_name(PHONE_NUMBER_INDEX)
            .key_schema(key_element("phone_number", KeyType::Hash)?)
            .key_schema(key_element("timestamp", KeyType::Range)?)
            .projection(
                Projection::builder()
                    .projection_type(ProjectionType::All)
                    .build(),
            )
            .build()
            .map_err(|e| AppError::DocumentStore {
                message: format!("invalid index definition: {}", e),
            })?;

        let result = self
            .client
            .create_table()
            .table_name(MESSAGES_TABLE)
            .billing_mode(BillingMode::PayPerRequest)
            .attribute_definitions(string_attr("conversation_id")?)
            .attribute_definitions(string_attr("timestamp")?)
            .attribute_definitions(string_attr("phone_number")?)
            .key_schema(key_element("conversation_id", KeyType::Hash)?)
            .key_schema(key_element("timestamp", KeyType::Range)?)
            .global_secondary_indexes(phone_index)
            .send()
            .await;

        ignore_existing(MESSAGES_TABLE, result)
    }

    async fn create_rate_limits_table(&self) -> Result<()> {
        let result = self
            .client
            .create_table()
            .table_name(RATE_LIMITS_TABLE)
            .billing_mode(BillingMode::PayPerRequest)
            .attribute_definitions(string_attr("key")?)
            .key_schema(key_element("key", KeyType::Hash)?)
            .send()
            .await;

        ignore_existing(RATE_LIMITS_TABLE, result)
    }

    // ========================================================================
    // Conversations
    // ========================================================================

    /// Create a conversation head record. The timestamp is assigned here and
    /// becomes part of the conversation id.
    pub async fn create_conversation(
        &self,
        phone_number: &str,
        meta: ConversationMeta,
    ) -> Result<Conversation> {
        let conversation = Conversation {
            phone_number: phone_number.to_string(),
            timestamp: now_rfc3339(),
            meta,
        };

        self.client
            .put_item()
            .table_name(CONVERSATIONS_TABLE)
            .set_item(Some(conversation_to_item(&conversation)))
            .send()
            .await
            .map_err(store_err)?;

        debug!(conversation_id = %conversation.id(), "Conversation created");

        Ok(conversation)
    }

    /// Get a conversation by exact key, enforcing tenant ownership
    pub async fn get_conversation(
        &self,
        key: &ConversationKey,
        organization_id: Uuid,
    ) -> Result<Conversation> {
        let resp = self
            .client
            .get_item()
            .table_name(CONVERSATIONS_TABLE)
            .key("phone_number", AttributeValue::S(key.phone_number.clone()))
            .key("timestamp", AttributeValue::S(key.timestamp.clone()))
            .send()
            .await
            .map_err(store_err)?;

        let item = resp.item().ok_or(AppError::ConversationNotFound)?;
        let conversation = conversation_from_item(item)?;
        conversation.meta.ensure_owned_by(organization_id)?;

        Ok(conversation)
    }

    /// Most recent conversation for a phone number, if any
    pub async fn latest_conversation(&self, phone_number: &str) -> Result<Option<Conversation>> {
        let resp = self
            .client
            .query()
            .table_name(CONVERSATIONS_TABLE)
            .key_condition_expression("phone_number = :phone")
            .expression_attribute_values(
                ":phone",
                AttributeValue::S(phone_number.to_string()),
            )
            .scan_index_forward(false)
            .limit(1)
            .send()
            .await
            .map_err(store_err)?;

        match resp.items().first() {
            Some(item) => Ok(Some(conversation_from_item(item)?)),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// Append a message to a conversation. The timestamp is assigned here.
    pub async fn create_message(
        &self,
        conversation: &Conversation,
        role: MessageRole,
        content: &str,
        extra: BTreeMap<String, serde_json::Value>,
    ) -> Result<Message> {
        let message = Message {
            conversation_id: conversation.id(),
            timestamp: now_rfc3339(),
            phone_number: conversation.phone_number.clone(),
            role,
            content: content.to_string(),
            extra,
        };

        self.client
            .put_item()
            .table_name(MESSAGES_TABLE)
            .set_item(Some(message_to_item(&message)))
            .send()
            .await
            .map_err(store_err)?;

        Ok(message)
    }

    /// List all messages for a conversation in range-key (chronological)
    /// order, after verifying the conversation belongs to the caller.
    pub async fn list_messages(
        &self,
        conversation_id: &str,
        organization_id: Uuid,
    ) -> Result<Vec<Message>> {
        let key = ConversationKey::parse(conversation_id)?;
        self.get_conversation(&key, organization_id).await?;

        let mut messages = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let mut req = self
                .client
                .query()
                .table_name(MESSAGES_TABLE)
                .key_condition_expression("conversation_id = :cid")
                .expression_attribute_values(
                    ":cid",
                    AttributeValue::S(conversation_id.to_string()),
                )
                .scan_index_forward(true);

            if let Some(key) = start_key.take() {
                req = req.set_exclusive_start_key(Some(key));
            }

            let resp = req.send().await.map_err(store_err)?;

            for item in resp.items() {
                messages.push(message_from_item(item)?);
            }

            match resp.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(messages)
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn string_attr(name: &str) -> Result<AttributeDefinition> {
    AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(ScalarAttributeType::S)
        .build()
        .map_err(|e| AppError::DocumentStore {
            message: format!("invalid attribute definition: {}", e),
        })
}

fn key_element(name: &str, key_type: KeyType) -> Result<KeySchemaElement> {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .map_err(|e| AppError::DocumentStore {
            message: format!("invalid key schema: {}", e),
        })
}

fn ignore_existing<T, E>(table: &str, result: std::result::Result<T, SdkError<E>>) -> Result<()>
where
    E: aws_sdk_dynamodb::error::ProvideErrorMetadata
        + std::error::Error
        + Send
        + Sync
        + 'static,
{
    match result {
        Ok(_) => {
            info!(table, "Table created");
            Ok(())
        }
        Err(err) => {
            if err
                .as_service_error()
                .and_then(|e| e.code())
                .is_some_and(|code| code == "ResourceInUseException")
            {
                debug!(table, "Table already exists");
                Ok(())
            } else {
                Err(store_err(err))
            }
        }
    }
}

fn store_err<E>(err: SdkError<E>) -> AppError
where
    E: std::error::Error + Send + Sync + 'static,
{
    AppError::DocumentStore {
        message: format!("{}", DisplayErrorContext(&err)),
    }
}

// ============================================================================
// Item marshalling
// ============================================================================

fn conversation_to_item(conversation: &Conversation) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();
    item.insert(
        "phone_number".to_string(),
        AttributeValue::S(conversation.phone_number.clone()),
    );
    item.insert(
        "timestamp".to_string(),
        AttributeValue::S(conversation.timestamp.clone()),
    );
    item.insert(
        "organization_id".to_string(),
        AttributeValue::S(conversation.meta.organization_id.to_string()),
    );
    item.insert(
        "metadata".to_string(),
        AttributeValue::M(map_to_attrs(&conversation.meta.extra)),
    );
    item
}

fn conversation_from_item(item: &HashMap<String, AttributeValue>) -> Result<Conversation> {
    let organization_id = item_string(item, "organization_id")?
        .parse::<Uuid>()
        .map_err(|e| AppError::DocumentStore {
            message: format!("bad organization_id on conversation: {}", e),
        })?;

    Ok(Conversation {
        phone_number: item_string(item, "phone_number")?,
        timestamp: item_string(item, "timestamp")?,
        meta: ConversationMeta {
            organization_id,
            extra: item_map(item, "metadata"),
        },
    })
}

fn message_to_item(message: &Message) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();
    item.insert(
        "conversation_id".to_string(),
        AttributeValue::S(message.conversation_id.clone()),
    );
    item.insert(
        "timestamp".to_string(),
        AttributeValue::S(message.timestamp.clone()),
    );
    item.insert(
        "phone_number".to_string(),
        AttributeValue::S(message.phone_number.clone()),
    );
    item.insert(
        "role".to_string(),
        AttributeValue::S(message.role.to_string()),
    );
    item.insert(
        "content".to_string(),
        AttributeValue::S(message.content.clone()),
    );
    item.insert(
        "metadata".to_string(),
        AttributeValue::M(map_to_attrs(&message.extra)),
    );
    item
}

fn message_from_item(item: &HashMap<String, AttributeValue>) -> Result<Message> {
    let role = item_string(item, "role")?
        .parse::<MessageRole>()
        .map_err(|e| AppError::DocumentStore { message: e })?;

    Ok(Message {
        conversation_id: item_string(item, "conversation_id")?,
        timestamp: item_string(item, "timestamp")?,
        phone_number: item_string(item, "phone_number")?,
        role,
        content: item_string(item, "content")?,
        extra: item_map(item, "metadata"),
    })
}

fn item_string(item: &HashMap<String, AttributeValue>, key: &str) -> Result<String> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| AppError::DocumentStore {
            message: format!("missing string attribute: {}", key),
        })
}

fn item_map(
    item: &HashMap<String, AttributeValue>,
    key: &str,
) -> BTreeMap<String, serde_json::Value> {
    item.get(key)
        .and_then(|v| v.as_m().ok())
        .map(attrs_to_map)
        .unwrap_or_default()
}

fn map_to_attrs(map: &BTreeMap<String, serde_json::Value>) -> HashMap<String, AttributeValue> {
    map.iter()
        .map(|(k, v)| (k.clone(), json_to_attr(v)))
        .collect()
}

fn attrs_to_map(attrs: &HashMap<String, AttributeValue>) -> BTreeMap<String, serde_json::Value> {
    attrs
        .iter()
        .map(|(k, v)| (k.clone(), attr_to_json(v)))
        .collect()
}

/// Convert a JSON value to a DynamoDB attribute value
pub fn json_to_attr(value: &serde_json::Value) -> AttributeValue {
    match value {
        serde_json::Value::Null => AttributeValue::Null(true),
        serde_json::Value::Bool(b) => AttributeValue::Bool(*b),
        serde_json::Value::Number(n) => AttributeValue::N(n.to_string()),
        serde_json::Value::String(s) => AttributeValue::S(s.clone()),
        serde_json::Value::Array(values) => {
            AttributeValue::L(values.iter().map(json_to_attr).collect())
        }
        serde_json::Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_attr(v)))
                .collect(),
        ),
    }
}

/// Convert a DynamoDB attribute value back to JSON. Unrepresentable
/// attribute kinds (binary, sets) degrade to null.
pub fn attr_to_json(attr: &AttributeValue) -> serde_json::Value {
    match attr {
        AttributeValue::Null(_) => serde_json::Value::Null,
        AttributeValue::Bool(b) => serde_json::Value::Bool(*b),
        AttributeValue::N(n) => {
            if let Ok(i) = n.parse::<i64>() {
                serde_json::Value::from(i)
            } else if let Ok(f) = n.parse::<f64>() {
                serde_json::Value::from(f)
            } else {
                serde_json::Value::String(n.clone())
            }
        }
        AttributeValue::S(s) => serde_json::Value::String(s.clone()),
        AttributeValue::L(values) => {
            serde_json::Value::Array(values.iter().map(attr_to_json).collect())
        }
        AttributeValue::M(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), attr_to_json(v)))
                .collect(),
        ),
        _ => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_meta() -> ConversationMeta {
        let mut extra = BTreeMap::new();
        extra.insert("channel".to_string(), json!("whatsapp"));
        ConversationMeta {
            organization_id: Uuid::new_v4(),
            extra,
        }
    }

    #[test]
    fn test_conversation_key_splits_on_first_colon() {
        let key = ConversationKey::parse("15550001111:2024-01-15T10:30:00.000000Z").unwrap();
        assert_eq!(key.phone_number, "15550001111");
        assert_eq!(key.timestamp, "2024-01-15T10:30:00.000000Z");
    }

    #[test]
    fn test_conversation_key_rejects_malformed() {
        assert!(ConversationKey::parse("no-colon-here").is_err());
        assert!(ConversationKey::parse(":2024-01-15T10:30:00Z").is_err());
        assert!(ConversationKey::parse("15550001111:").is_err());
    }

    #[test]
    fn test_conversation_id_roundtrip() {
        let conversation = Conversation {
            phone_number: "15550001111".to_string(),
            timestamp: "2024-01-15T10:30:00.000000Z".to_string(),
            meta: sample_meta(),
        };

        let key = ConversationKey::parse(&conversation.id()).unwrap();
        assert_eq!(key.phone_number, conversation.phone_number);
        assert_eq!(key.timestamp, conversation.timestamp);
    }

    #[test]
    fn test_conversation_item_roundtrip() {
        let conversation = Conversation {
            phone_number: "15550001111".to_string(),
            timestamp: now_rfc3339(),
            meta: sample_meta(),
        };

        let item = conversation_to_item(&conversation);
        let parsed = conversation_from_item(&item).unwrap();
        assert_eq!(parsed, conversation);
    }

    #[test]
    fn test_message_item_roundtrip() {
        let mut extra = BTreeMap::new();
        extra.insert("source".to_string(), json!("webhook"));
        extra.insert("attempt".to_string(), json!(1));

        let message = Message {
            conversation_id: "15550001111:2024-01-15T10:30:00.000000Z".to_string(),
            timestamp: now_rfc3339(),
            phone_number: "15550001111".to_string(),
            role: MessageRole::Assistant,
            content: "Hello from the bot".to_string(),
            extra,
        };

        let item = message_to_item(&message);
        let parsed = message_from_item(&item).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_json_attr_roundtrip_nested() {
        let value = json!({
            "name": "doc.pdf",
            "page": 3,
            "score": 0.75,
            "tags": ["a", "b"],
            "nested": { "flag": true, "nothing": null }
        });

        assert_eq!(attr_to_json(&json_to_attr(&value)), value);
    }

    #[test]
    fn test_ensure_owned_by() {
        let org = Uuid::new_v4();
        let meta = ConversationMeta::new(org);
        assert!(meta.ensure_owned_by(org).is_ok());

        let err = meta.ensure_owned_by(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::TenantMismatch));
    }

    #[test]
    fn test_message_role_parse() {
        assert_eq!("user".parse::<MessageRole>().unwrap(), MessageRole::User);
        assert_eq!(
            "assistant".parse::<MessageRole>().unwrap(),
            MessageRole::Assistant
        );
        assert!("system".parse::<MessageRole>().is_err());
    }
}
