// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Resilient Connection Establishment
//!
//! This module implements the bounded connection-retry loop. The initial
//! attempt runs without delay; after the Nth consecutive failure the loop
//! sleeps N times the configured base interval before attempting again, so
//! successive delays grow strictly. Once the number of failures exceeds the
//! configured maximum the loop gives up with a `ConnectionError` carrying
//! the last underlying transport failure.

use crate::{
    config::ClientConfig,
    errors::ClientError,
    transport::{AmqpConnection, AmqpTransport},
};
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Opens a connection, retrying with a linearly increasing delay.
///
/// Total attempts are `max_connection_attempts + 1`: the initial attempt
/// plus one retry per budget unit. Every failed attempt is logged with the
/// attempt count and the computed backoff.
///
/// # Parameters
/// * `transport` - Transport used to open the connection
/// * `config` - Normalized client configuration
///
/// # Returns
/// The established connection, or `ConnectionError` once the retry budget
/// is exhausted.
pub(crate) async fn connect_with_retry(
    transport: &dyn AmqpTransport,
    config: &ClientConfig,
) -> Result<Box<dyn AmqpConnection>, ClientError> {
    let mut attempts: u32 = 0;

    loop {
        debug!("creating amqp connection...");

        match transport.connect(config).await {
            Ok(connection) => {
                debug!("amqp connected");
                return Ok(connection);
            }
            Err(err) => {
                if attempts >= config.max_connection_attempts {
                    error!(error = err.to_string(), "failure to connect");
                    return Err(ClientError::ConnectionError(err.to_string()));
                }

                attempts += 1;
                let backoff = config.retry_interval * attempts;

                warn!(
                    error = err.to_string(),
                    attempt = attempts,
                    max_attempts = config.max_connection_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    "failed to connect, retrying"
                );

                sleep(backoff).await;
            }
        }
    }
}
