//! PostgREST client.
//!
//! Every call is retried on transient failures, traced under a
//! `db_request` span and recorded in the request metrics.

use std::time::{Duration, Instant};

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info_span, Instrument};

use crate::error::{DbError, DbResult};
use crate::metrics::record_request;
use crate::query::Query;
use crate::retry::{with_retry, RetryConfig};

/// Store client configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgREST base URL, e.g. `https://db.example.com/rest/v1`
    pub rest_url: String,
    /// Service-role key, sent as both `apikey` and bearer token
    pub service_key: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
}

impl DbConfig {
    /// Create config from environment variables.
    pub fn from_env() -> DbResult<Self> {
        let rest_url = std::env::var("DB_REST_URL")
            .map_err(|_| DbError::config("DB_REST_URL must be set"))?;
        let service_key = std::env::var("DB_SERVICE_KEY")
            .map_err(|_| DbError::config("DB_SERVICE_KEY must be set"))?;

        if service_key.is_empty() {
            return Err(DbError::config("DB_SERVICE_KEY cannot be empty"));
        }

        let timeout_secs: u64 = std::env::var("DB_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            rest_url,
            service_key,
            timeout: Duration::from_secs(timeout_secs),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::from_env(),
        })
    }
}

/// PostgREST client authenticated with the service-role key.
#[derive(Clone)]
pub struct DbClient {
    http: Client,
    config: DbConfig,
}

impl DbClient {
    pub fn new(config: DbConfig) -> DbResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("framelab-db/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DbError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> DbResult<Self> {
        Self::new(DbConfig::from_env()?)
    }

    fn base_url(&self) -> &str {
        self.config.rest_url.trim_end_matches('/')
    }

    fn table_url(&self, table: &str, query: &Query) -> String {
        if query.is_empty() {
            format!("{}/{}", self.base_url(), table)
        } else {
            format!("{}/{}?{}", self.base_url(), table, query.to_query_string())
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    // =========================================================================
    // Table operations
    // =========================================================================

    /// `GET /{table}?{query}`
    pub async fn select<T: DeserializeOwned>(&self, table: &str, query: &Query) -> DbResult<Vec<T>> {
        let url = self.table_url(table, query);

        self.execute("select", table, || async {
            let response = self.request(Method::GET, &url).send().await?;
            let response = check_status(response, &url).await?;
            Ok(response.json::<Vec<T>>().await?)
        })
        .await
    }

    /// `POST /{table}` with a JSON array body.
    ///
    /// With `on_conflict`, rows colliding on those columns are merged instead
    /// of rejected.
    pub async fn insert<B>(&self, table: &str, rows: &B, on_conflict: Option<&str>) -> DbResult<()>
    where
        B: Serialize + ?Sized + Sync,
    {
        let query = match on_conflict {
            Some(columns) => Query::new().on_conflict(columns),
            None => Query::new(),
        };
        let url = self.table_url(table, &query);
        let prefer = if on_conflict.is_some() {
            "return=minimal,resolution=merge-duplicates"
        } else {
            "return=minimal"
        };

        self.execute("insert", table, || async {
            let response = self
                .request(Method::POST, &url)
                .header("Prefer", prefer)
                .json(rows)
                .send()
                .await?;
            check_status(response, &url).await?;
            Ok(())
        })
        .await
    }

    /// `PATCH /{table}?{query}`, returning the rows that matched.
    pub async fn update<B, T>(&self, table: &str, query: &Query, patch: &B) -> DbResult<Vec<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.table_url(table, query);

        self.execute("update", table, || async {
            let response = self
                .request(Method::PATCH, &url)
                .header("Prefer", "return=representation")
                .json(patch)
                .send()
                .await?;
            let response = check_status(response, &url).await?;
            Ok(response.json::<Vec<T>>().await?)
        })
        .await
    }

    /// `DELETE /{table}?{query}`, returning the number of deleted rows.
    pub async fn delete(&self, table: &str, query: &Query) -> DbResult<usize> {
        let url = self.table_url(table, query);

        self.execute("delete", table, || async {
            let response = self
                .request(Method::DELETE, &url)
                .header("Prefer", "return=representation")
                .send()
                .await?;
            let response = check_status(response, &url).await?;
            let rows: Vec<serde_json::Value> = response.json().await?;
            Ok(rows.len())
        })
        .await
    }

    /// `POST /rpc/{function}`
    pub async fn rpc<B, T>(&self, function: &str, args: &B) -> DbResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}/rpc/{}", self.base_url(), function);

        self.execute("rpc", function, || async {
            let response = self.request(Method::POST, &url).json(args).send().await?;
            let response = check_status(response, &url).await?;
            Ok(response.json::<T>().await?)
        })
        .await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn execute<T, F, Fut>(&self, operation: &str, table: &str, op: F) -> DbResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = DbResult<T>>,
    {
        let span = info_span!("db_request", operation = %operation, table = %table);

        let start = Instant::now();
        let result = with_retry(&self.config.retry, operation, op)
            .instrument(span)
            .await;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, table, status, start.elapsed());

        result
    }
}

async fn check_status(response: Response, url: &str) -> DbResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after_ms = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(|secs| secs * 1000);

    let body = response.text().await.unwrap_or_default();
    match DbError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body)) {
        DbError::RateLimited(default_ms) => {
            Err(DbError::RateLimited(retry_after_ms.unwrap_or(default_ms)))
        }
        other => Err(other),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn test_client(server: &MockServer) -> DbClient {
        DbClient::new(DbConfig {
            rest_url: server.uri(),
            service_key: "service-key".to_string(),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            retry: RetryConfig {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            },
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_select_sends_service_key_and_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/labels"))
            .and(query_param("id", "eq.l1"))
            .and(header("apikey", "service-key"))
            .and(header("authorization", "Bearer service-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "l1", "project_id": "p1", "name": "car"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let rows: Vec<serde_json::Value> = client
            .select("labels", &Query::new().eq("id", "l1"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "car");
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/frames"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/frames"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let rows: Vec<serde_json::Value> = client.select("frames", &Query::new()).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/frames"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad filter"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client
            .select::<serde_json::Value>("frames", &Query::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::RequestFailed(ref msg) if msg.contains("bad filter")));
    }

    #[tokio::test]
    async fn test_upsert_sets_conflict_target() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/frames"))
            .and(query_param("on_conflict", "video_id,frame_number"))
            .and(header("prefer", "return=minimal,resolution=merge-duplicates"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        client
            .insert(
                "frames",
                &serde_json::json!([{"video_id": "v1", "frame_number": 0}]),
                Some("video_id,frame_number"),
            )
            .await
            .unwrap();
    }
}
