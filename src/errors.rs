// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the RabbitMQ Client
//!
//! This module provides the error type returned by every client operation.
//! The `ClientError` enum covers caller mistakes (missing parameters,
//! acknowledging under auto-acknowledge), lifecycle misuse (acknowledging
//! before a channel exists), exhausted connection retries, and broker
//! failures surfaced by the underlying transport.

use thiserror::Error;

/// Represents errors that can occur during client operations.
///
/// Parameter and channel errors are raised synchronously before any broker
/// interaction. Connection errors are raised only once the configured retry
/// budget is exhausted and carry the last underlying transport failure.
/// The remaining variants map broker failures of a specific operation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ClientError {
    /// The caller supplied insufficient or invalid input
    #[error("invalid parameter: {0}")]
    ParameterError(String),

    /// An operation required a channel (or connection) that does not exist yet
    #[error("channel unavailable: {0}")]
    ChannelError(String),

    /// The connection could not be established within the retry budget
    #[error("failure to connect: {0}")]
    ConnectionError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error publishing a message to the given queue
    #[error("failure to publish to queue `{0}`")]
    PublishingError(String),

    /// Error declaring a consumer on the given queue
    #[error("failure to declare consumer on queue `{0}`")]
    ConsumerError(String),

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,

    /// Error negative-acknowledging a message
    #[error("failure to nack message")]
    NackMessageError,

    /// Error rejecting a message
    #[error("failure to reject message")]
    RejectMessageError,
}
