use super::api::{NamespaceClient, PutOutcome};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A chat message. Field names on the wire are camelCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub message_id: u64,
    pub parent_id: u64,
    pub user_id: String,
    pub text: String,
    pub time: String,
}

impl ChatMessage {
    /// Key under which the message is published in `channel`.
    pub fn key(&self, channel: &str) -> String {
        format!("{}.{}.{}", channel, self.parent_id, self.message_id)
    }
}

/// Message exchange over the namespace. Keys are capped at 20 bytes, so
/// channel names have to stay short.
pub struct MessageTransport {
    client: NamespaceClient,
}

impl MessageTransport {
    pub fn new(client: NamespaceClient) -> Self {
        Self { client }
    }

    /// Publishes every message. A message whose key is already taken counts
    /// as sent. Returns how many were newly stored.
    pub async fn send_messages(&self, channel: &str, msgs: &[ChatMessage]) -> Result<usize> {
        let mut stored = 0;

        for msg in msgs {
            let key = msg.key(channel);
            let value = serde_json::to_string(msg)?;

            match self.client.put(&key, &value).await? {
                PutOutcome::Stored => stored += 1,
                PutOutcome::AlreadyExists => {
                    tracing::debug!("Message {} already published", key);
                }
            }
        }

        Ok(stored)
    }

    /// Messages in `channel` whose parent is `last_received`.
    pub async fn receive_messages(
        &self,
        channel: &str,
        last_received: u64,
    ) -> Result<Vec<ChatMessage>> {
        let prefix = format!("{}.{}.", channel, last_received);

        self.client
            .get_many(&prefix)
            .await?
            .into_iter()
            .map(|kv| {
                serde_json::from_str(&kv.value)
                    .with_context(|| format!("value under {} is not a message", kv.key))
            })
            .collect()
    }
}
