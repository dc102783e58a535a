// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Client Facade
//!
//! This module provides the client facade over the AMQP transport: it owns
//! at most one connection and one channel, creates both lazily on first
//! use, declares queues, publishes messages, and consumes messages with
//! ack/nack/reject operations.
//!
//! All lazily created resources live behind a single asynchronous mutex,
//! held for the whole ensure-sequence of an operation. Callers racing to
//! connect or create the channel serialize on that guard and observe the
//! memoized resource instead of creating a duplicate.

use crate::{
    config::{ClientConfig, ClientOptions},
    connection,
    consumer::run_delivery_loop,
    errors::ClientError,
    message::{Message, MessageHandler},
    queue::QueueHandle,
    transport::{AmqpChannel, AmqpConnection, AmqpTransport, LapinTransport},
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Default)]
struct ClientState {
    connection: Option<Box<dyn AmqpConnection>>,
    channel: Option<Box<dyn AmqpChannel>>,
    queue: Option<QueueHandle>,
}

/// Client facade owning one connection and one channel.
///
/// Connection, channel, and queue are created lazily when an operation
/// first needs them and reused for the lifetime of the instance. A failed
/// connection attempt caches nothing, so a later operation retries from
/// scratch.
pub struct RabbitMQClient {
    config: ClientConfig,
    transport: Box<dyn AmqpTransport>,
    state: Mutex<ClientState>,
}

impl RabbitMQClient {
    /// Creates a new client from raw options.
    ///
    /// # Parameters
    /// * `options` - Raw connection and behavior options
    ///
    /// # Returns
    /// The client, or `ParameterError` when the options carry no hostname.
    pub fn new(options: ClientOptions) -> Result<RabbitMQClient, ClientError> {
        Ok(RabbitMQClient {
            config: ClientConfig::new(options)?,
            transport: Box::new(LapinTransport),
            state: Mutex::new(ClientState::default()),
        })
    }

    #[cfg(test)]
    fn with_transport(config: ClientConfig, transport: Box<dyn AmqpTransport>) -> RabbitMQClient {
        RabbitMQClient {
            config,
            transport,
            state: Mutex::new(ClientState::default()),
        }
    }

    /// The normalized configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Establishes the connection, retrying with the configured budget.
    ///
    /// Idempotent: when a live connection is already cached the call
    /// returns immediately without touching the transport.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        self.ensure_connection(&mut state).await
    }

    /// Creates the channel from the live connection.
    ///
    /// Returns the cached channel silently when one exists. Fails with
    /// `ChannelError` when no connection has been established yet.
    pub async fn create_channel(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;

        if state.channel.is_some() {
            return Ok(());
        }
        if state.connection.is_none() {
            return Err(ClientError::ChannelError(
                "there is no connection to create a channel".to_owned(),
            ));
        }

        self.ensure_channel(&mut state).await
    }

    /// Declares a queue and caches the resulting handle.
    ///
    /// Connection and channel are established first if needed. The
    /// durability argument overrides the configured default; re-declaring
    /// replaces any previously cached handle.
    pub async fn assert_queue(
        &self,
        queue: &str,
        durable: Option<bool>,
    ) -> Result<QueueHandle, ClientError> {
        let mut state = self.state.lock().await;
        self.ensure_queue(&mut state, queue, durable).await?;

        let Some(handle) = state.queue.clone() else {
            return Err(ClientError::DeclareQueueError(queue.to_owned()));
        };
        Ok(handle)
    }

    /// Serializes a message to JSON and publishes it.
    ///
    /// Maps and structs become JSON text, numbers their decimal
    /// representation. A serialization failure surfaces as
    /// `ParameterError` before any broker interaction.
    pub async fn publish<T>(
        &self,
        message: &T,
        queue: Option<&str>,
        persistent: Option<bool>,
    ) -> Result<(), ClientError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(message).map_err(|err| {
            ClientError::ParameterError(format!(
                "failure to serialize the message payload: {}",
                err
            ))
        })?;

        self.publish_raw(&payload, queue, persistent).await
    }

    /// Publishes an already-encoded payload.
    ///
    /// The target queue is the argument when given, the configured default
    /// otherwise; with neither, the call fails with `ParameterError` and no
    /// network call is attempted. Connection, channel, and queue are
    /// established lazily. Fire-and-forget: no delivery confirmation is
    /// awaited beyond the transport write.
    pub async fn publish_raw(
        &self,
        payload: &[u8],
        queue: Option<&str>,
        persistent: Option<bool>,
    ) -> Result<(), ClientError> {
        let Some(queue) = queue.or(self.config.queue.as_deref()) else {
            return Err(ClientError::ParameterError(
                "a queue name is required to publish a message".to_owned(),
            ));
        };
        let persistent = persistent.unwrap_or(self.config.persistent);

        let mut state = self.state.lock().await;
        self.ensure_queue(&mut state, queue, None).await?;

        let Some(channel) = state.channel.as_deref() else {
            return Err(ClientError::ChannelError(
                "there is no channel to publish this message".to_owned(),
            ));
        };

        debug!(queue = queue, persistent = persistent, "publishing message");

        match channel.send_to_queue(queue, payload, persistent).await {
            Err(err) => {
                error!(error = err.to_string(), "error publishing message");
                Err(ClientError::PublishingError(queue.to_owned()))
            }
            _ => Ok(()),
        }
    }

    /// Registers a consumer on a queue.
    ///
    /// The queue is asserted first (durability override honored). The
    /// handler runs once per delivered message and once with `None` when
    /// the broker cancels the consumer. The `no_ack` argument overrides the
    /// configured default and selects transport auto-acknowledge.
    ///
    /// # Returns
    /// The generated consumer tag.
    pub async fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
        no_ack: Option<bool>,
        durable: Option<bool>,
    ) -> Result<String, ClientError> {
        let no_ack = no_ack.unwrap_or(self.config.no_ack);

        let mut state = self.state.lock().await;
        self.ensure_queue(&mut state, queue, durable).await?;

        let Some(channel) = state.channel.as_deref() else {
            return Err(ClientError::ChannelError(
                "there is no channel to consume from".to_owned(),
            ));
        };

        let consumer_tag = format!("{}-{}", queue, Uuid::new_v4());
        debug!(
            queue = queue,
            consumer_tag = consumer_tag.as_str(),
            no_ack = no_ack,
            "starting consumer"
        );

        let deliveries = match channel.basic_consume(queue, &consumer_tag, no_ack).await {
            Ok(deliveries) => deliveries,
            Err(err) => {
                error!(error = err.to_string(), "error to create the consumer");
                return Err(ClientError::ConsumerError(queue.to_owned()));
            }
        };

        tokio::spawn(run_delivery_loop(
            queue.to_owned(),
            consumer_tag.clone(),
            deliveries,
            handler,
        ));

        Ok(consumer_tag)
    }

    /// Acknowledges a message.
    ///
    /// With `all_up_to_this` every unacknowledged message up to and
    /// including this one is acknowledged in delivery order.
    pub async fn ack_message(
        &self,
        message: &Message,
        all_up_to_this: bool,
    ) -> Result<(), ClientError> {
        if self.config.no_ack {
            return Err(ClientError::ParameterError(
                "cannot ack a message when no_ack is enabled".to_owned(),
            ));
        }

        let state = self.state.lock().await;
        let Some(channel) = state.channel.as_deref() else {
            return Err(ClientError::ChannelError(
                "there is no channel to ack this message".to_owned(),
            ));
        };

        match channel
            .basic_ack(message.delivery_tag(), all_up_to_this)
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error whiling ack msg");
                Err(ClientError::AckMessageError)
            }
            _ => Ok(()),
        }
    }

    /// Negative-acknowledges a message.
    ///
    /// With `all_up_to_this` every unacknowledged message up to and
    /// including this one is rejected in delivery order; `requeue` sends
    /// the messages back to the queue instead of discarding them.
    pub async fn nack_message(
        &self,
        message: &Message,
        all_up_to_this: bool,
        requeue: bool,
    ) -> Result<(), ClientError> {
        if self.config.no_ack {
            return Err(ClientError::ParameterError(
                "cannot nack a message when no_ack is enabled".to_owned(),
            ));
        }

        let state = self.state.lock().await;
        let Some(channel) = state.channel.as_deref() else {
            return Err(ClientError::ChannelError(
                "there is no channel to nack this message".to_owned(),
            ));
        };

        match channel
            .basic_nack(message.delivery_tag(), all_up_to_this, requeue)
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error whiling nack msg");
                Err(ClientError::NackMessageError)
            }
            _ => Ok(()),
        }
    }

    /// Rejects a single message, optionally requeueing it.
    pub async fn reject_message(
        &self,
        message: &Message,
        requeue: bool,
    ) -> Result<(), ClientError> {
        if self.config.no_ack {
            return Err(ClientError::ParameterError(
                "cannot reject a message when no_ack is enabled".to_owned(),
            ));
        }

        let state = self.state.lock().await;
        let Some(channel) = state.channel.as_deref() else {
            return Err(ClientError::ChannelError(
                "there is no channel to reject this message".to_owned(),
            ));
        };

        match channel
            .basic_reject(message.delivery_tag(), requeue)
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error whiling reject msg");
                Err(ClientError::RejectMessageError)
            }
            _ => Ok(()),
        }
    }

    /// Tears down the channel and connection, best-effort.
    ///
    /// Close failures are ignored; all cached state is cleared.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;

        if let Some(channel) = state.channel.take() {
            if let Err(err) = channel.close().await {
                debug!(error = err.to_string(), "ignoring channel close failure");
            }
        }
        if let Some(connection) = state.connection.take() {
            if let Err(err) = connection.close().await {
                debug!(error = err.to_string(), "ignoring connection close failure");
            }
        }
        state.queue = None;
    }

    async fn ensure_connection(&self, state: &mut ClientState) -> Result<(), ClientError> {
        if state.connection.is_some() {
            debug!("reusing cached amqp connection");
            return Ok(());
        }

        let connection =
            connection::connect_with_retry(self.transport.as_ref(), &self.config).await?;
        state.connection = Some(connection);
        Ok(())
    }

    async fn ensure_channel(&self, state: &mut ClientState) -> Result<(), ClientError> {
        self.ensure_connection(state).await?;

        if state.channel.is_some() {
            return Ok(());
        }
        let Some(connection) = state.connection.as_deref() else {
            return Err(ClientError::ChannelError(
                "there is no connection to create a channel".to_owned(),
            ));
        };

        debug!("creating amqp channel...");
        match connection.create_channel().await {
            Ok(channel) => {
                debug!("channel created");
                state.channel = Some(channel);
                Ok(())
            }
            Err(err) => {
                error!(error = err.to_string(), "error to create the channel");
                Err(ClientError::ChannelError(err.to_string()))
            }
        }
    }

    async fn ensure_queue(
        &self,
        state: &mut ClientState,
        queue: &str,
        durable: Option<bool>,
    ) -> Result<(), ClientError> {
        self.ensure_channel(state).await?;

        let durable = durable.unwrap_or(self.config.durable);
        let Some(channel) = state.channel.as_deref() else {
            return Err(ClientError::ChannelError(
                "there is no channel to declare a queue".to_owned(),
            ));
        };

        debug!("creating queue: {}", queue);
        match channel.queue_declare(queue, durable).await {
            Ok(handle) => {
                debug!("queue: {} was created", queue);
                state.queue = Some(handle);
                Ok(())
            }
            Err(err) => {
                error!(
                    error = err.to_string(),
                    name = queue,
                    "error to declare the queue"
                );
                Err(ClientError::DeclareQueueError(queue.to_owned()))
            }
        }
    }
}
