// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Handles
//!
//! This module defines the snapshot returned by a queue declaration: the
//! queue name plus the counts the broker reported at declaration time.

/// Result of declaring a queue.
///
/// The client caches at most one handle at a time; re-declaring a queue
/// replaces the cached handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueHandle {
    name: String,
    message_count: u32,
    consumer_count: u32,
}

impl QueueHandle {
    pub(crate) fn new(name: &str, message_count: u32, consumer_count: u32) -> QueueHandle {
        QueueHandle {
            name: name.to_owned(),
            message_count,
            consumer_count,
        }
    }

    /// The declared queue name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of messages the broker reported at declaration time.
    pub fn message_count(&self) -> u32 {
        self.message_count
    }

    /// Number of consumers the broker reported at declaration time.
    pub fn consumer_count(&self) -> u32 {
        self.consumer_count
    }
}
