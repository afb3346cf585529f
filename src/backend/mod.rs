use crate::event::AppEvent;
use serde_json::{json, Value};
use std::sync::mpsc;
use thiserror::Error;
use tokio::runtime::Handle;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("query endpoint answered HTTP {0}")]
    Status(u16),
    #[error("response body is not valid JSON: {0}")]
    Decode(String),
}

/// Issues one backend query. Completion is reported asynchronously, tagged
/// with the same `request_id`.
pub trait QueryDispatcher {
    fn dispatch(&self, request_id: u64, query: &str);
}

#[derive(Clone)]
pub struct HttpQueryClient {
    http: reqwest::Client,
    query_url: Url,
    tx: mpsc::Sender<AppEvent>,
    runtime_handle: Handle,
}

impl HttpQueryClient {
    pub fn new(query_url: Url, tx: mpsc::Sender<AppEvent>) -> Result<Self, QueryError> {
        let runtime_handle = Handle::try_current()
            .map_err(|err| QueryError::Transport(format!("tokio runtime unavailable: {err}")))?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| QueryError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            query_url,
            tx,
            runtime_handle,
        })
    }

    pub fn query_url(&self) -> &Url {
        &self.query_url
    }

    async fn post_query(
        http: reqwest::Client,
        query_url: Url,
        query: String,
    ) -> Result<Value, QueryError> {
        let response = http
            .post(query_url)
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|err| QueryError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Status(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| QueryError::Decode(err.to_string()))
    }
}

impl QueryDispatcher for HttpQueryClient {
    fn dispatch(&self, request_id: u64, query: &str) {
        let http = self.http.clone();
        let query_url = self.query_url.clone();
        let tx = self.tx.clone();
        let query = query.to_string();

        tracing::info!(request_id, query_len = query.chars().count(), "dispatching query");
        self.runtime_handle.spawn(async move {
            let result = Self::post_query(http, query_url, query).await;
            if tx
                .send(AppEvent::QueryCompleted { request_id, result })
                .is_err()
            {
                tracing::warn!(request_id, "query completed after the window closed");
            }
        });
    }
}

/// Joins the configured endpoint and query path into the POST target.
pub fn query_url(endpoint: &str, query_path: &str) -> Result<Url, url::ParseError> {
    Url::parse(endpoint)?.join(query_path)
}
