//! RabbitMQ consumer serving checkout-session requests.
//!
//! Other services send a `CheckoutRequest` to the `create.payment.session`
//! queue with `reply_to` and `correlation_id` set, and get the session URLs
//! (or an error) back on their reply queue. Each delivery is handled in its
//! own task; on shutdown those tasks finish before the connection closes.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use lapin::{
    message::Delivery,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
        BasicRejectOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::checkout::{CheckoutRequest, CheckoutSessionFactory, CheckoutSessionResult};
use crate::error::CheckoutError;
use crate::queue::{BusEnvelope, CREATE_SESSION_QUEUE};

/// Maximum unacknowledged deliveries in flight.
const PREFETCH: u16 = 32;

/// Body sent back on the reply queue.
#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum SessionReply {
    Created(CheckoutSessionResult),
    Failed { error: String },
}

impl From<Result<CheckoutSessionResult, CheckoutError>> for SessionReply {
    fn from(result: Result<CheckoutSessionResult, CheckoutError>) -> Self {
        match result {
            Ok(session) => SessionReply::Created(session),
            Err(e) => SessionReply::Failed {
                error: e.public_message(),
            },
        }
    }
}

/// Accept either a bare request or one wrapped as `{"pattern", "data"}`.
pub fn parse_request(body: &[u8]) -> Result<CheckoutRequest, serde_json::Error> {
    match serde_json::from_slice::<BusEnvelope<CheckoutRequest>>(body) {
        Ok(envelope) => Ok(envelope.data),
        Err(_) => serde_json::from_slice::<CheckoutRequest>(body),
    }
}

/// Run the consumer until `shutdown` completes or the broker closes the stream.
pub async fn run(
    amqp_url: &str,
    sessions: Arc<CheckoutSessionFactory>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    info!("session_consumer_connecting");

    let conn = Connection::connect(amqp_url, ConnectionProperties::default())
        .await
        .context("Failed to connect to RabbitMQ")?;

    let channel = conn.create_channel().await.context("Failed to create channel")?;

    channel
        .basic_qos(PREFETCH, BasicQosOptions::default())
        .await
        .context("Failed to set QoS")?;

    channel
        .queue_declare(
            CREATE_SESSION_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("Failed to declare queue")?;

    let mut consumer = channel
        .basic_consume(
            CREATE_SESSION_QUEUE,
            "payments-service",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .context("Failed to start consumer")?;

    info!(queue = CREATE_SESSION_QUEUE, prefetch = PREFETCH, "session_consumer_started");

    let channel = Arc::new(channel);
    let mut in_flight = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("session_consumer_stopping");
                break;
            }
            delivery = consumer.next() => {
                match delivery {
                    Some(Ok(delivery)) => {
                        let channel = Arc::clone(&channel);
                        let sessions = Arc::clone(&sessions);
                        in_flight.spawn(async move {
                            handle_delivery(&channel, &sessions, delivery).await;
                        });
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "session_consumer_delivery_error");
                    }
                    None => {
                        warn!("session_consumer_closed");
                        break;
                    }
                }
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                log_join_failure(joined);
            }
        }
    }

    let drained = drain_in_flight(&mut in_flight).await;
    info!(drained = drained, "session_consumer_in_flight_drained");

    if let Err(e) = conn.close(200, "Normal shutdown").await {
        warn!(error = %e, "session_consumer_close_error");
    }

    info!("session_consumer_shutdown_complete");
    Ok(())
}

/// Wait for every spawned delivery task. Returns how many were waited on.
async fn drain_in_flight(in_flight: &mut JoinSet<()>) -> usize {
    let mut drained = 0;
    while let Some(joined) = in_flight.join_next().await {
        log_join_failure(joined);
        drained += 1;
    }
    drained
}

fn log_join_failure(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "session_delivery_task_failed");
    }
}

async fn handle_delivery(channel: &Channel, sessions: &CheckoutSessionFactory, delivery: Delivery) {
    let delivery_tag = delivery.delivery_tag;
    let correlation_id = delivery
        .properties
        .correlation_id()
        .as_ref()
        .map(|s| s.to_string());
    let reply_to = delivery.properties.reply_to().as_ref().map(|s| s.to_string());

    let request = match parse_request(&delivery.data) {
        Ok(request) => request,
        Err(e) => {
            error!(
                delivery_tag = delivery_tag,
                correlation_id = ?correlation_id,
                error = %e,
                "session_request_parse_failed"
            );
            // Requeueing would only fail again
            if let Err(e) = channel
                .basic_reject(delivery_tag, BasicRejectOptions { requeue: false })
                .await
            {
                error!(delivery_tag = delivery_tag, error = %e, "rabbitmq_reject_failed");
            }
            return;
        }
    };

    let reply = SessionReply::from(sessions.create_session(&request).await);

    match reply_to {
        Some(reply_to) => {
            if let Err(e) = send_reply(channel, &reply_to, correlation_id, &reply).await {
                error!(
                    order_id = %request.order_id,
                    reply_to = %reply_to,
                    error = %format!("{:#}", e),
                    "session_reply_failed"
                );
            }
        }
        None => {
            warn!(order_id = %request.order_id, "session_request_without_reply_to");
        }
    }

    if let Err(e) = channel
        .basic_ack(delivery_tag, BasicAckOptions::default())
        .await
    {
        error!(delivery_tag = delivery_tag, error = %e, "rabbitmq_ack_failed");
    }
}

async fn send_reply(
    channel: &Channel,
    reply_to: &str,
    correlation_id: Option<String>,
    reply: &SessionReply,
) -> Result<()> {
    let body = serde_json::to_vec(reply).context("Failed to serialize reply")?;

    let mut properties = BasicProperties::default().with_content_type("application/json".into());
    if let Some(id) = correlation_id {
        properties = properties.with_correlation_id(id.into());
    }

    channel
        .basic_publish("", reply_to, BasicPublishOptions::default(), &body, properties)
        .await
        .context("Failed to publish reply")?
        .await
        .context("Failed to confirm reply")?;

    info!(reply_to = %reply_to, body_length = body.len(), "session_reply_sent");
    Ok(())
}
