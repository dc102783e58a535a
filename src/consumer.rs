// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Consumer Delivery Loop
//!
//! Drives the stream of deliveries for one registered consumer. Each
//! delivery is handed to the handler; stream and handler failures are
//! logged and never interrupt consumption. When the broker cancels the
//! consumer the stream ends and the handler is invoked once with `None`.

use crate::{message::MessageHandler, transport::DeliveryStream};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{debug, error};

pub(crate) async fn run_delivery_loop(
    queue: String,
    consumer_tag: String,
    mut deliveries: DeliveryStream,
    handler: Arc<dyn MessageHandler>,
) {
    while let Some(result) = deliveries.next().await {
        match result {
            Ok(message) => {
                if let Err(err) = handler.handle(Some(message)).await {
                    error!(
                        error = err.to_string(),
                        queue = queue.as_str(),
                        "error handling message"
                    );
                }
            }
            Err(err) => error!(
                error = err.to_string(),
                queue = queue.as_str(),
                "error receiving delivery"
            ),
        }
    }

    debug!(
        consumer_tag = consumer_tag.as_str(),
        "consumer cancelled by the broker"
    );

    if let Err(err) = handler.handle(None).await {
        error!(
            error = err.to_string(),
            "error handling consumer cancellation"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::ClientError, message::Message};
    use async_trait::async_trait;
    use futures_util::stream;
    use std::sync::Mutex;

    struct RecordingHandler {
        seen: Mutex<Vec<Option<Message>>>,
        fail: bool,
    }

    impl RecordingHandler {
        fn new(fail: bool) -> Arc<RecordingHandler> {
            Arc::new(RecordingHandler {
                seen: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl MessageHandler for RecordingHandler {
        async fn handle(&self, message: Option<Message>) -> Result<(), ClientError> {
            self.seen.lock().unwrap().push(message);
            if self.fail {
                Err(ClientError::ParameterError("handler failure".to_owned()))
            } else {
                Ok(())
            }
        }
    }

    fn delivered(tag: u64) -> Message {
        Message::new(
            format!("payload-{}", tag).into_bytes(),
            tag,
            "".to_owned(),
            "jobs".to_owned(),
            false,
        )
    }

    #[tokio::test]
    async fn invokes_the_handler_per_delivery_and_once_on_cancellation() {
        let handler = RecordingHandler::new(false);
        let deliveries = stream::iter(vec![
            Ok(delivered(1)),
            Err(lapin::Error::InvalidConnectionState(
                lapin::ConnectionState::Error,
            )),
            Ok(delivered(2)),
        ])
        .boxed();

        run_delivery_loop(
            "jobs".to_owned(),
            "jobs-consumer".to_owned(),
            deliveries,
            handler.clone(),
        )
        .await;

        let seen = handler.seen.lock().unwrap();
        assert_eq!(*seen, vec![Some(delivered(1)), Some(delivered(2)), None]);
    }

    #[tokio::test]
    async fn handler_failures_do_not_stop_the_loop() {
        let handler = RecordingHandler::new(true);
        let deliveries = stream::iter(vec![Ok(delivered(1)), Ok(delivered(2))]).boxed();

        run_delivery_loop(
            "jobs".to_owned(),
            "jobs-consumer".to_owned(),
            deliveries,
            handler.clone(),
        )
        .await;

        let seen = handler.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], None);
    }
}
