use crate::backend::Subscription;
use crate::common::context::Context;
use crate::common::redis_json::Json;
use crate::models::containers::ContainerRef;
use crate::models::messages::RawMessage;
use futures::StreamExt;
use redis::AsyncCommands;
use std::pin::pin;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const BASE_KEY: &str = "travelshare:messages";

fn make_channel(container: ContainerRef) -> String {
    format!("{BASE_KEY}:{container}")
}

/// Returns how many subscribers received the row
pub async fn publish<C: Context>(ctx: &C, raw: &RawMessage) -> anyhow::Result<usize> {
    let mut redis = ctx.redis().await?;
    let channel = make_channel(raw.container);
    let receivers: usize = redis.publish(channel, Json(raw)).await?;
    Ok(receivers)
}

/// Opens a dedicated pub/sub connection for `container` and forwards
/// decoded rows until the subscription is dropped.
pub async fn subscribe<C: Context>(ctx: &C, container: ContainerRef) -> anyhow::Result<Subscription> {
    let channel = make_channel(container);
    let mut pubsub = ctx.redis_client().get_async_pubsub().await?;
    pubsub.subscribe(&channel).await?;

    let (sender, receiver) = mpsc::unbounded_channel();
    let forwarder = tokio::spawn(async move {
        let mut messages = pin!(pubsub.into_on_message());
        while let Some(msg) = messages.next().await {
            let raw: Json<RawMessage> = match msg.get_payload() {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(%channel, "Skipping undecodable message notification: {e}");
                    continue;
                }
            };
            if sender.send(raw.into_inner()).is_err() {
                break;
            }
        }
        debug!(%channel, "Message notification stream ended");
    });
    Ok(Subscription::new(
        container,
        receiver,
        Some(forwarder.abort_handle()),
    ))
}
