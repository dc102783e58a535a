// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Transport Seam
//!
//! This module defines the traits the client drives the broker through and
//! their `lapin`-backed implementations. The traits exist so the facade can
//! be exercised against mocks; production code always runs on the `lapin`
//! implementations below.

use crate::{config::ClientConfig, message::Message, queue::QueueHandle};
use async_trait::async_trait;
use futures_util::{stream::BoxStream, StreamExt};
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        BasicRejectOptions, QueueDeclareOptions,
    },
    types::{FieldTable, LongString, ShortString},
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use tracing::debug;
use uuid::Uuid;

/// Delivery mode marking a message persistent on the broker
const PERSISTENT_DELIVERY_MODE: u8 = 2;
/// Delivery mode marking a message transient
const TRANSIENT_DELIVERY_MODE: u8 = 1;

/// Stream of deliveries for one consumer, ending when the broker cancels it.
pub(crate) type DeliveryStream = BoxStream<'static, Result<Message, lapin::Error>>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait AmqpTransport: Send + Sync {
    async fn connect(&self, config: &ClientConfig) -> Result<Box<dyn AmqpConnection>, lapin::Error>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait AmqpConnection: Send + Sync + std::fmt::Debug {
    async fn create_channel(&self) -> Result<Box<dyn AmqpChannel>, lapin::Error>;

    async fn close(&self) -> Result<(), lapin::Error>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait AmqpChannel: Send + Sync {
    async fn queue_declare(&self, queue: &str, durable: bool) -> Result<QueueHandle, lapin::Error>;

    async fn send_to_queue(
        &self,
        queue: &str,
        payload: &[u8],
        persistent: bool,
    ) -> Result<(), lapin::Error>;

    async fn basic_consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        no_ack: bool,
    ) -> Result<DeliveryStream, lapin::Error>;

    async fn basic_ack(&self, delivery_tag: u64, multiple: bool) -> Result<(), lapin::Error>;

    async fn basic_nack(
        &self,
        delivery_tag: u64,
        multiple: bool,
        requeue: bool,
    ) -> Result<(), lapin::Error>;

    async fn basic_reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), lapin::Error>;

    async fn close(&self) -> Result<(), lapin::Error>;
}

/// `lapin`-backed transport.
pub(crate) struct LapinTransport;

#[async_trait]
impl AmqpTransport for LapinTransport {
    async fn connect(
        &self,
        config: &ClientConfig,
    ) -> Result<Box<dyn AmqpConnection>, lapin::Error> {
        let mut options = ConnectionProperties::default();
        if let Some(name) = &config.connection_name {
            options = options.with_connection_name(LongString::from(name.clone()));
        }

        let connection = Connection::connect(&config.uri(), options).await?;
        Ok(Box::new(LapinConnection { connection }))
    }
}

#[derive(Debug)]
pub(crate) struct LapinConnection {
    connection: Connection,
}

#[async_trait]
impl AmqpConnection for LapinConnection {
    async fn create_channel(&self) -> Result<Box<dyn AmqpChannel>, lapin::Error> {
        let channel = self.connection.create_channel().await?;
        Ok(Box::new(LapinChannel { channel }))
    }

    async fn close(&self) -> Result<(), lapin::Error> {
        self.connection.close(200, "closing connection").await
    }
}

pub(crate) struct LapinChannel {
    channel: Channel,
}

#[async_trait]
impl AmqpChannel for LapinChannel {
    async fn queue_declare(&self, queue: &str, durable: bool) -> Result<QueueHandle, lapin::Error> {
        let reply = self
            .channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    passive: false,
                    durable,
                    exclusive: false,
                    auto_delete: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await?;

        Ok(QueueHandle::new(
            reply.name().as_str(),
            reply.message_count(),
            reply.consumer_count(),
        ))
    }

    async fn send_to_queue(
        &self,
        queue: &str,
        payload: &[u8],
        persistent: bool,
    ) -> Result<(), lapin::Error> {
        let delivery_mode = if persistent {
            PERSISTENT_DELIVERY_MODE
        } else {
            TRANSIENT_DELIVERY_MODE
        };

        // Publishes through the default exchange; the routing key is the queue name.
        let _confirmation = self
            .channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                payload,
                BasicProperties::default()
                    .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
                    .with_delivery_mode(delivery_mode),
            )
            .await?;

        Ok(())
    }

    async fn basic_consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        no_ack: bool,
    ) -> Result<DeliveryStream, lapin::Error> {
        debug!("creating consumer on queue: {}", queue);

        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions {
                    no_local: false,
                    no_ack,
                    exclusive: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await?;

        Ok(consumer
            .map(|result| result.map(Message::from_delivery))
            .boxed())
    }

    async fn basic_ack(&self, delivery_tag: u64, multiple: bool) -> Result<(), lapin::Error> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions { multiple })
            .await
    }

    async fn basic_nack(
        &self,
        delivery_tag: u64,
        multiple: bool,
        requeue: bool,
    ) -> Result<(), lapin::Error> {
        self.channel
            .basic_nack(delivery_tag, BasicNackOptions { multiple, requeue })
            .await
    }

    async fn basic_reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), lapin::Error> {
        self.channel
            .basic_reject(delivery_tag, BasicRejectOptions { requeue })
            .await
    }

    async fn close(&self) -> Result<(), lapin::Error> {
        self.channel.close(200, "closing channel").await
    }
}
