//! Producer: send messages to topics over a broker connection.

use crate::client::BrokerClient;
use crate::error::Result;
use crate::types::Message;
use std::collections::HashMap;

/// Result of a successful produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceResult {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Producer client; the broker picks the partition from the key.
pub struct Producer {
    client: BrokerClient,
}

impl Producer {
    pub async fn connect(addr: &str) -> Result<Self> {
        Ok(Self::new(BrokerClient::connect(addr).await?))
    }

    pub fn new(client: BrokerClient) -> Self {
        Self { client }
    }

    pub async fn create_topic(&mut self, name: &str, partitions: i32) -> Result<()> {
        self.client.create_topic(name, partitions).await
    }

    /// Send a key/value pair with no headers.
    pub async fn send(&mut self, topic: &str, key: &[u8], value: &[u8]) -> Result<ProduceResult> {
        self.send_with_headers(topic, key, value, HashMap::new()).await
    }

    /// Send a prepared message; its timestamp and offset are assigned by the broker.
    pub async fn send_message(&mut self, topic: &str, message: Message) -> Result<ProduceResult> {
        self.send_with_headers(topic, &message.key, &message.value, message.headers)
            .await
    }

    async fn send_with_headers(
        &mut self,
        topic: &str,
        key: &[u8],
        value: &[u8],
        headers: HashMap<String, String>,
    ) -> Result<ProduceResult> {
        let resp = self.client.produce(topic, key, value, headers).await?;
        Ok(ProduceResult {
            topic: topic.to_string(),
            partition: resp.partition_id,
            offset: resp.offset,
        })
    }
}
