//! reqwest implementation of [`SearchClient`] against the Elasticsearch REST API.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::error::{ElasticError, ErrorInfo, Result};
use crate::utils::time::to_es_time;

use super::models::{AsyncSearchResponse, PitOpenResponse, PitSearchResponse};
use super::{PitSearchRequest, SearchClient};

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_TIMEOUT: Duration = Duration::from_secs(30);
const DELETE_TIMEOUT: Duration = Duration::from_secs(30);
const PIT_OPEN_TIMEOUT: Duration = Duration::from_secs(60);
const PIT_CLOSE_TIMEOUT: Duration = Duration::from_secs(30);
/// Headroom added on top of a server-side `wait_for_completion_timeout`.
const WAIT_HEADROOM: Duration = Duration::from_secs(30);

/// What a request is about, used to classify 404s.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Subject<'a> {
    Index(&'a str),
    SearchId(&'a str),
    Pit(&'a str),
}

impl Subject<'_> {
    fn id(&self) -> &str {
        match self {
            Subject::Index(s) | Subject::SearchId(s) | Subject::Pit(s) => s,
        }
    }
}

/// HTTP search client.
///
/// Holds a pooled `reqwest::Client` with the `Authorization: ApiKey ...`
/// header preset when credentials are configured.
#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    http: Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpSearchClient {
    /// Build a client from connection settings.
    ///
    /// # Arguments
    /// * `config` - URL, credentials and timeouts
    ///
    /// # Returns
    /// * `Result<Self>` - Client or configuration error
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        config.validate_url()?;

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        if let (Some(id), Some(key)) = (&config.api_key_id, &config.api_key) {
            headers.insert(header::AUTHORIZATION, api_key_header(id, key)?);
        }
        if !config.has_api_key() {
            debug!("No API key configured; requests are unauthenticated");
        }

        let http = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("elastic-utils/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ElasticError::Usage(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    /// Send a request and decode a successful JSON body into `T`.
    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        subject: Subject<'_>,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = self.send(operation, subject, request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(operation, &e))?;
        serde_json::from_slice(&bytes).map_err(|e| ElasticError::deserialization(operation, e))
    }

    /// Send a request, turning non-success statuses into classified errors.
    async fn send(
        &self,
        operation: &'static str,
        subject: Subject<'_>,
        request: RequestBuilder,
    ) -> Result<reqwest::Response> {
        debug!(operation, subject = subject.id(), "sending request");
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(operation, &e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(operation, subject, status, &body))
    }
}

fn api_key_header(id: &str, key: &str) -> Result<HeaderValue> {
    let encoded = STANDARD.encode(format!("{id}:{key}"));
    let mut value = HeaderValue::from_str(&format!("ApiKey {encoded}"))
        .map_err(|_| ElasticError::Usage("API key contains invalid characters".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

fn wait_timeout(base: Duration, wait_for: Option<Duration>) -> Duration {
    match wait_for {
        Some(wait) => base.max(wait + WAIT_HEADROOM),
        None => base,
    }
}

pub(crate) fn transport_error(operation: &'static str, err: &reqwest::Error) -> ElasticError {
    if err.is_decode() {
        return ElasticError::deserialization(operation, err);
    }
    let kind = if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    ElasticError::Transport {
        operation,
        message: format!("{kind}: {err}"),
    }
}

/// Map a non-success HTTP status onto the error taxonomy.
pub(crate) fn classify_status(
    operation: &'static str,
    subject: Subject<'_>,
    status: StatusCode,
    body: &str,
) -> ElasticError {
    let info = ErrorInfo::from_body(body);
    let code = status.as_u16();

    if info.has_type("index_not_found_exception") {
        let index = match (info.missing_index(), subject) {
            (Some(index), _) => index.to_string(),
            (None, Subject::Index(index)) => index.to_string(),
            (None, _) => subject.id().to_string(),
        };
        return ElasticError::InvalidIndex {
            index,
            message: info.summary(),
        };
    }

    match status {
        StatusCode::NOT_FOUND => match subject {
            Subject::Index(index) => ElasticError::InvalidIndex {
                index: index.to_string(),
                message: info.summary(),
            },
            Subject::SearchId(id) | Subject::Pit(id) => ElasticError::NotFound {
                operation,
                id: id.to_string(),
            },
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ElasticError::Unauthorized {
            operation,
            status: code,
            message: info.summary(),
        },
        StatusCode::TOO_MANY_REQUESTS => ElasticError::Throttled {
            operation,
            message: info.summary(),
        },
        s if s.is_server_error() => ElasticError::ServerBusy {
            operation,
            status: code,
            message: info.summary(),
        },
        _ => ElasticError::Query {
            operation,
            status: code,
            message: info.summary(),
        },
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn submit_async_search(
        &self,
        index: &str,
        query: &Value,
        keep_alive: Duration,
        wait_for: Option<Duration>,
    ) -> Result<AsyncSearchResponse> {
        let mut params = vec![
            ("keep_on_completion", "true".to_string()),
            ("keep_alive", to_es_time(keep_alive)),
        ];
        if let Some(wait) = wait_for {
            params.push(("wait_for_completion_timeout", to_es_time(wait)));
        }

        let request = self
            .request(Method::POST, &format!("/{index}/_async_search"))
            .query(&params)
            .json(query)
            .timeout(wait_timeout(SUBMIT_TIMEOUT, wait_for));

        self.send_json("submit_async_search", Subject::Index(index), request)
            .await
    }

    async fn get_async_search(
        &self,
        search_id: &str,
        wait_for: Option<Duration>,
    ) -> Result<AsyncSearchResponse> {
        let mut request = self.request(Method::GET, &format!("/_async_search/{search_id}"));
        let base = match wait_for {
            Some(wait) => {
                request = request.query(&[("wait_for_completion_timeout", to_es_time(wait))]);
                self.request_timeout
            }
            None => POLL_TIMEOUT.max(self.request_timeout),
        };
        let request = request.timeout(wait_timeout(base, wait_for));

        self.send_json("get_async_search", Subject::SearchId(search_id), request)
            .await
    }

    async fn delete_async_search(&self, search_id: &str) -> Result<bool> {
        let request = self
            .request(Method::DELETE, &format!("/_async_search/{search_id}"))
            .timeout(DELETE_TIMEOUT);

        match self
            .send("delete_async_search", Subject::SearchId(search_id), request)
            .await
        {
            Ok(_) => Ok(true),
            Err(ElasticError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn open_point_in_time(&self, index: &str, keep_alive: Duration) -> Result<String> {
        let request = self
            .request(Method::POST, &format!("/{index}/_pit"))
            .query(&[("keep_alive", to_es_time(keep_alive))])
            .timeout(PIT_OPEN_TIMEOUT);

        let response: PitOpenResponse = self
            .send_json("open_point_in_time", Subject::Index(index), request)
            .await?;
        Ok(response.id)
    }

    async fn search_with_pit(&self, request: &PitSearchRequest) -> Result<PitSearchResponse> {
        let http_request = self
            .request(Method::POST, "/_search")
            .json(&request.to_body())
            .timeout(self.request_timeout);

        self.send_json("search_with_pit", Subject::Pit(&request.pit_id), http_request)
            .await
    }

    async fn close_point_in_time(&self, pit_id: &str) -> Result<()> {
        let request = self
            .request(Method::DELETE, "/_pit")
            .json(&json!({ "id": pit_id }))
            .timeout(PIT_CLOSE_TIMEOUT);

        match self
            .send("close_point_in_time", Subject::Pit(pit_id), request)
            .await
        {
            Ok(_) | Err(ElasticError::NotFound { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> HttpSearchClient {
        let config = ConnectionConfig {
            url: server.url(),
            api_key_id: Some("key-id".into()),
            api_key: Some("secret".into()),
            ..ConnectionConfig::default()
        };
        HttpSearchClient::new(&config).unwrap()
    }

    #[test]
    fn test_classify_statuses() {
        let busy = classify_status(
            "search_with_pit",
            Subject::Pit("p"),
            StatusCode::SERVICE_UNAVAILABLE,
            "",
        );
        assert!(busy.is_retryable());

        let throttled = classify_status(
            "submit_async_search",
            Subject::Index("logs"),
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"type":"es_rejected_execution_exception","reason":"rejected"},"status":429}"#,
        );
        assert!(matches!(throttled, ElasticError::Throttled { .. }));
        assert!(throttled.is_retryable());
        assert!(throttled.to_string().contains("es_rejected_execution_exception"));

        let bad = classify_status(
            "submit_async_search",
            Subject::Index("logs"),
            StatusCode::BAD_REQUEST,
            r#"{"error":{"type":"parsing_exception","reason":"unknown query [matchh]"},"status":400}"#,
        );
        match bad {
            ElasticError::Query { status, message, .. } => {
                assert_eq!(status, 400);
                assert!(message.contains("unknown query"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let gone = classify_status(
            "get_async_search",
            Subject::SearchId("abc"),
            StatusCode::NOT_FOUND,
            r#"{"error":{"type":"resource_not_found_exception","reason":"abc"},"status":404}"#,
        );
        assert!(matches!(gone, ElasticError::NotFound { ref id, .. } if id == "abc"));

        let denied = classify_status(
            "open_point_in_time",
            Subject::Index("logs"),
            StatusCode::FORBIDDEN,
            "",
        );
        assert!(matches!(denied, ElasticError::Unauthorized { status: 403, .. }));
    }

    #[test]
    fn test_index_not_found_wins_over_subject() {
        let err = classify_status(
            "submit_async_search",
            Subject::Index("logs-*"),
            StatusCode::NOT_FOUND,
            r#"{"error":{"root_cause":[{"type":"index_not_found_exception","reason":"no such index [logs-x]","index":"logs-x"}],"type":"index_not_found_exception","reason":"no such index [logs-x]"},"status":404}"#,
        );
        assert!(matches!(err, ElasticError::InvalidIndex { ref index, .. } if index == "logs-x"));
    }

    #[test]
    fn test_api_key_header_is_base64_of_id_and_key() {
        let value = api_key_header("id", "key").unwrap();
        assert_eq!(value.to_str().unwrap(), "ApiKey aWQ6a2V5");
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_rejects_url_without_scheme() {
        let config = ConnectionConfig {
            url: "es.internal:9200".into(),
            ..ConnectionConfig::default()
        };
        assert!(HttpSearchClient::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_submit_sends_keep_alive_and_wait() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/logs/_async_search")
            .match_header("authorization", "ApiKey a2V5LWlkOnNlY3JldA==")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("keep_alive".into(), "1m".into()),
                Matcher::UrlEncoded("wait_for_completion_timeout".into(), "5s".into()),
                Matcher::UrlEncoded("keep_on_completion".into(), "true".into()),
            ]))
            .match_body(Matcher::Json(json!({"query": {"match_all": {}}})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":"s1","is_running":false,"is_partial":false,
                    "response":{"took":3,"timed_out":false,
                      "_shards":{"total":1,"successful":1,"skipped":0,"failed":0},
                      "hits":{"total":{"value":2,"relation":"eq"},"hits":[{"_id":"a"},{"_id":"b"}]}}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let response = client
            .submit_async_search(
                "logs",
                &json!({"query": {"match_all": {}}}),
                Duration::from_secs(60),
                Some(Duration::from_secs(5)),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.id.as_deref(), Some("s1"));
        assert!(!response.is_running);
        assert_eq!(response.hits().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_search_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/_async_search/gone")
            .with_status(404)
            .with_body(r#"{"error":{"type":"resource_not_found_exception","reason":"gone"},"status":404}"#)
            .create_async()
            .await;
        server
            .mock("DELETE", "/_async_search/live")
            .with_status(200)
            .with_body(r#"{"acknowledged":true}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(!client.delete_async_search("gone").await.unwrap());
        assert!(client.delete_async_search("live").await.unwrap());
    }

    #[tokio::test]
    async fn test_pit_lifecycle_requests() {
        let mut server = mockito::Server::new_async().await;
        let open = server
            .mock("POST", "/logs/_pit")
            .match_query(Matcher::UrlEncoded("keep_alive".into(), "10m".into()))
            .with_status(200)
            .with_body(r#"{"id":"pit-0"}"#)
            .create_async()
            .await;
        let page = server
            .mock("POST", "/_search")
            .match_body(Matcher::PartialJson(json!({
                "pit": {"id": "pit-0", "keep_alive": "10m"},
                "size": 2,
                "search_after": [5, 9]
            })))
            .with_status(200)
            .with_body(r#"{"pit_id":"pit-1","hits":{"hits":[{"_id":"x","sort":[6,1]}]}}"#)
            .create_async()
            .await;
        let close = server
            .mock("DELETE", "/_pit")
            .match_body(Matcher::Json(json!({"id": "pit-1"})))
            .with_status(404)
            .create_async()
            .await;

        let client = client_for(&server);
        let pit_id = client
            .open_point_in_time("logs", Duration::from_secs(600))
            .await
            .unwrap();
        assert_eq!(pit_id, "pit-0");

        let response = client
            .search_with_pit(&PitSearchRequest {
                body: json!({"sort": [{"id": "asc"}, {"_shard_doc": "asc"}]}),
                pit_id,
                keep_alive: Duration::from_secs(600),
                size: 2,
                search_after: Some(vec![json!(5), json!(9)]),
            })
            .await
            .unwrap();
        assert_eq!(response.pit_id.as_deref(), Some("pit-1"));

        client.close_point_in_time("pit-1").await.unwrap();

        open.assert_async().await;
        page.assert_async().await;
        close.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_page_is_deserialization_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/_search")
            .with_status(200)
            .with_body(r#"{"pit_id":"p","hits":"nope"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .search_with_pit(&PitSearchRequest {
                body: json!({}),
                pit_id: "p".into(),
                keep_alive: Duration::from_secs(60),
                size: 10,
                search_after: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ElasticError::Deserialization { .. }));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let config = ConnectionConfig {
            url: "http://127.0.0.1:1".into(),
            connect_timeout: Duration::from_millis(200),
            ..ConnectionConfig::default()
        };
        let client = HttpSearchClient::new(&config).unwrap();
        let err = client.get_async_search("abc", None).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
