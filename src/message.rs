// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Delivered Messages and Handlers
//!
//! This module defines the message value handed to consumer handlers and
//! the handler trait itself. A message carries the opaque payload plus the
//! broker-assigned delivery metadata the client needs to ack, nack, or
//! reject it later.

use crate::errors::ClientError;
use async_trait::async_trait;
use lapin::message::Delivery;

/// A message delivered by the broker.
///
/// The delivery tag identifies the message on the channel it was received
/// on; acknowledgment operations forward it back to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    data: Vec<u8>,
    delivery_tag: u64,
    exchange: String,
    routing_key: String,
    redelivered: bool,
}

impl Message {
    pub(crate) fn new(
        data: Vec<u8>,
        delivery_tag: u64,
        exchange: String,
        routing_key: String,
        redelivered: bool,
    ) -> Message {
        Message {
            data,
            delivery_tag,
            exchange,
            routing_key,
            redelivered,
        }
    }

    pub(crate) fn from_delivery(delivery: Delivery) -> Message {
        Message::new(
            delivery.data,
            delivery.delivery_tag,
            delivery.exchange.to_string(),
            delivery.routing_key.to_string(),
            delivery.redelivered,
        )
    }

    /// The opaque message payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The broker-assigned delivery tag.
    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    /// The exchange the message was published to.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// The routing key the message was published with.
    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    /// Whether the broker redelivered this message.
    pub fn redelivered(&self) -> bool {
        self.redelivered
    }
}

/// Handler invoked once per delivered message.
///
/// The handler receives `None` exactly once when the broker cancels the
/// consumer. Handler failures are logged by the delivery loop and never
/// interrupt consumption.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Option<Message>) -> Result<(), ClientError>;
}
