//! Async RabbitMQ publisher for relaying resources onward.
//!
//! The publisher holds one lazily opened connection and channel, shared by
//! every request handler, and reconnects when the channel drops.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions},
    publisher_confirm::Confirmation,
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::types::{DeadLetter, ResourceEnvelope, DEAD_LETTER_QUEUE, RESOURCE_QUEUE};
use crate::dispatch::sink::{OutcomeSink, SinkError};

/// Async RabbitMQ publisher with connection management.
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

struct PublisherInner {
    url: String,
    connection: RwLock<Option<Connection>>,
    channel: RwLock<Option<Channel>>,
}

impl Publisher {
    /// Create a new publisher with the given RabbitMQ URL.
    ///
    /// No connection is made until the first publish.
    pub fn new(url: String) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                url,
                connection: RwLock::new(None),
                channel: RwLock::new(None),
            }),
        }
    }

    /// Ensure we have a valid connection and channel.
    async fn ensure_connected(&self) -> Result<Channel> {
        {
            let channel = self.inner.channel.read().await;
            if let Some(ch) = channel.as_ref() {
                if ch.status().connected() {
                    return Ok(ch.clone());
                }
            }
        }

        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        // Double-check after acquiring write lock
        if let Some(ch) = channel.as_ref() {
            if ch.status().connected() {
                return Ok(ch.clone());
            }
        }

        info!("rabbitmq_publisher_connecting");

        let conn = Connection::connect(&self.inner.url, ConnectionProperties::default())
            .await
            .context("Failed to connect to RabbitMQ")?;

        let ch = conn
            .create_channel()
            .await
            .context("Failed to create channel")?;

        ch.confirm_select(ConfirmSelectOptions::default())
            .await
            .context("Failed to enable publisher confirms")?;

        for queue in [RESOURCE_QUEUE, DEAD_LETTER_QUEUE] {
            ch.queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .with_context(|| format!("Failed to declare queue {queue}"))?;
        }

        info!(
            resource_queue = RESOURCE_QUEUE,
            dead_letter_queue = DEAD_LETTER_QUEUE,
            "rabbitmq_queues_declared"
        );

        *connection = Some(conn);
        *channel = Some(ch.clone());

        Ok(ch)
    }

    /// Publish a JSON message to `queue` and wait for the broker confirm.
    pub async fn publish<T: Serialize>(
        &self,
        queue: &str,
        message_id: String,
        message: &T,
    ) -> Result<()> {
        let channel = self.ensure_connected().await?;

        let body = serde_json::to_vec(message).context("Failed to serialize message")?;

        let confirmation = channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_content_type("application/json".into())
                    .with_message_id(message_id.clone().into()),
            )
            .await
            .with_context(|| format!("Failed to publish to {queue}"))?
            .await
            .context("Failed to confirm publish")?;

        ensure_acked(queue, confirmation)?;

        info!(
            queue = queue,
            message_id = %message_id,
            body_length = body.len(),
            "rabbitmq_message_published"
        );

        Ok(())
    }

    /// Close the connection gracefully.
    pub async fn close(&self) {
        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        if let Some(ch) = channel.take() {
            if let Err(e) = ch.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_channel_close_error");
            }
        }

        if let Some(conn) = connection.take() {
            if let Err(e) = conn.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_connection_close_error");
            }
        }

        info!("rabbitmq_publisher_closed");
    }
}

/// Fail unless the broker acknowledged the message.
fn ensure_acked(queue: &str, confirmation: Confirmation) -> Result<()> {
    match confirmation {
        Confirmation::Ack(_) => Ok(()),
        Confirmation::Nack(_) => bail!("Broker rejected publish to {queue}"),
        Confirmation::NotRequested => bail!("Publisher confirms not enabled for {queue}"),
    }
}

#[async_trait]
impl OutcomeSink for Publisher {
    async fn relay(&self, envelope: &ResourceEnvelope) -> Result<(), SinkError> {
        self.publish(RESOURCE_QUEUE, envelope.message_id(), envelope)
            .await
            .map_err(SinkError::from)
    }

    async fn dead_letter(&self, letter: &DeadLetter) -> Result<(), SinkError> {
        self.publish(DEAD_LETTER_QUEUE, letter.message_id(), letter)
            .await
            .map_err(SinkError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_creation_is_lazy() {
        let publisher = Publisher::new("amqp://localhost:5672".to_string());
        assert!(Arc::strong_count(&publisher.inner) == 1);

        let clone = publisher.clone();
        assert!(Arc::ptr_eq(&publisher.inner, &clone.inner));
    }

    #[test]
    fn test_ensure_acked() {
        assert!(ensure_acked(RESOURCE_QUEUE, Confirmation::Ack(None)).is_ok());

        let err = ensure_acked(DEAD_LETTER_QUEUE, Confirmation::Nack(None)).unwrap_err();
        assert!(err.to_string().contains(DEAD_LETTER_QUEUE));

        assert!(ensure_acked(RESOURCE_QUEUE, Confirmation::NotRequested).is_err());
    }

    #[tokio::test]
    async fn test_close_without_connection() {
        let publisher = Publisher::new("amqp://localhost:5672".to_string());
        publisher.close().await;
        assert!(publisher.inner.channel.read().await.is_none());
    }
}
