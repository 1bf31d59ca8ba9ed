use async_trait::async_trait;
use serde_json::Value;

use crate::error::UpstreamError;

/// `data` object returned by a board mutation.
pub type WriteResult = Result<Value, UpstreamError>;

#[async_trait]
pub trait BoardWriter: Send + Sync {
    async fn post_update(&self, item_id: i64, body: &str) -> WriteResult;
    async fn set_column_value(
        &self,
        board_id: i64,
        item_id: i64,
        column_id: &str,
        value: Value,
    ) -> WriteResult;
}
