use crate::backend::QueryError;
use serde_json::Value;

#[derive(Debug, Clone)]
pub enum AppEvent {
    QueryCompleted {
        request_id: u64,
        result: Result<Value, QueryError>,
    },
}
