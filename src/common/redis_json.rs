use redis::{FromRedisValue, RedisResult, RedisWrite, ToRedisArgs, Value};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::error;

/// Stores a value as a JSON string, used for pub/sub payloads
#[repr(transparent)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Serialize> ToRedisArgs for Json<T> {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        match serde_json::to_vec(&self.0) {
            Ok(json_encoded) => out.write_arg(&json_encoded),
            Err(e) => {
                error!("Failed to serialize redis JSON argument: {e}");
                out.write_arg(b"null");
            }
        }
    }
}

impl<T: for<'a> Deserialize<'a>> FromRedisValue for Json<T> {
    fn from_redis_value(v: &Value) -> RedisResult<Self> {
        let json_encoded = <Vec<u8>>::from_redis_value(v)?;
        let json_decoded: T =
            serde_json::from_slice(&json_encoded).map_err(redis::RedisError::from)?;
        Ok(Json(json_decoded))
    }
}

impl<T: Debug> Debug for Json<T> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(fmt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::containers::ContainerRef;
    use crate::models::messages::RawMessage;
    use chrono::{TimeZone, Utc};

    #[test]
    fn decodes_published_rows() {
        let raw = RawMessage {
            message_id: 41,
            container: ContainerRef::group(3),
            sender_id: 9,
            content: Some("see you at the station".to_owned()),
            shared_post_id: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };
        let payload = Value::BulkString(serde_json::to_vec(&raw).unwrap());
        let decoded = Json::<RawMessage>::from_redis_value(&payload).unwrap();
        assert_eq!(decoded.into_inner(), raw);
    }

    #[test]
    fn rejects_garbage() {
        let payload = Value::BulkString(b"{not json".to_vec());
        assert!(Json::<RawMessage>::from_redis_value(&payload).is_err());
    }
}
