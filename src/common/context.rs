use crate::common::redis_pool::PoolResult;
use async_trait::async_trait;
use sqlx::{MySql, Pool};

#[async_trait]
pub trait Context: Sync + Send {
    fn db(&self) -> &Pool<MySql>;
    async fn redis(&self) -> PoolResult;
    /// Dedicated pub/sub connections cannot come from the pool
    fn redis_client(&self) -> &redis::Client;
}
