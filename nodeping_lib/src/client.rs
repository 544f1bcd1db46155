//! HTTP client for the NodePing REST API.

use crate::check::Check;
use crate::check_result::CheckResult;
use crate::config::{ClientConfig, MAX_RESULT_LIMIT};
use crate::error::{Error, MalformedResponseError, Result, ServiceError, TransportError};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client as HttpClient, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use url::Url;

/// Tracing target for client operations.
pub const TRACING_TARGET: &str = "nodeping_lib::client";

/// NodePing API client.
///
/// Holds the API token and an optional sub-account ID. When the account ID is
/// set it is sent as `customerid` on every request, unless the call supplies
/// its own `customerid` (see [`Client::get_account`]).
#[derive(Clone)]
pub struct Client {
    token: String,
    account_id: Option<String>,
    config: ClientConfig,
    http: HttpClient,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("token", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a new client with the given token and optional sub-account ID.
    pub fn new(token: impl Into<String>, account_id: Option<String>) -> Self {
        Self::with_config(token, account_id, ClientConfig::default())
    }

    /// Create a new client with a custom configuration.
    pub fn with_config(
        token: impl Into<String>,
        account_id: Option<String>,
        config: ClientConfig,
    ) -> Self {
        tracing::debug!(
            target: TRACING_TARGET,
            base_url = %config.base_url,
            timeout_secs = config.effective_timeout().as_secs(),
            scoped = account_id.is_some(),
            "Creating NodePing client"
        );
        Self {
            token: token.into(),
            account_id,
            config,
            http: HttpClient::new(),
        }
    }

    /// Sub-account every request is scoped to, if any.
    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// List accounts visible to the token. The payload is returned as decoded.
    pub async fn get_accounts(&self) -> Result<Value> {
        let url = self.build_url("accounts", &[])?;
        self.get(url).await
    }

    /// Get one account by customer ID. The payload is returned as decoded.
    ///
    /// The explicit `account_id` takes precedence over the client's scoped account.
    pub async fn get_account(&self, account_id: &str) -> Result<Value> {
        let url = self.build_url("accounts", &[("customerid", account_id.to_string())])?;
        self.get(url).await
    }

    /// Get all checks, keyed by check ID.
    pub async fn get_checks(&self) -> Result<HashMap<String, Check>> {
        let url = self.build_url("checks", &[])?;
        let data = self.get(url).await?;
        collect_keyed(data, "checks", |v| {
            Check::from_value(v).map(|c| (c.id.clone(), c))
        })
    }

    /// Get results for a check, keyed by result ID.
    ///
    /// `span` is a window in hours, `limit` a record count (service default 300,
    /// maximum [`MAX_RESULT_LIMIT`]). Each is sent only when given; with both,
    /// the service applies whichever yields fewer records.
    pub async fn get_check_results(
        &self,
        check_id: &str,
        span: Option<u32>,
        limit: Option<u32>,
    ) -> Result<HashMap<String, CheckResult>> {
        let mut params = vec![
            ("id", check_id.to_string()),
            ("clean", "true".to_string()),
        ];
        if let Some(s) = span {
            params.push(("span", s.to_string()));
        }
        if let Some(l) = limit {
            if l > MAX_RESULT_LIMIT {
                tracing::warn!(
                    target: TRACING_TARGET,
                    limit = l,
                    max = MAX_RESULT_LIMIT,
                    "Result limit exceeds the service maximum"
                );
            }
            params.push(("limit", l.to_string()));
        }
        let url = self.build_url("results", &params)?;
        let data = self.get(url).await?;
        collect_keyed(data, "results", |v| {
            CheckResult::from_value(v).map(|r| (r.id.clone(), r))
        })
    }

    /// Build `<base><resource>?<params>&token=..[&customerid=..]`.
    fn build_url(&self, resource: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut base = Url::parse(&self.config.base_url)?;
        // without a trailing slash `join` replaces the last segment
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let mut url = base.join(resource.trim_start_matches('/'))?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            query.append_pair("token", &self.token);
            if let Some(ref account) = self.account_id {
                if !params.iter().any(|(key, _)| *key == "customerid") {
                    query.append_pair("customerid", account);
                }
            }
        }
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<Value> {
        // keys only, the token must not reach the logs
        let params: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        tracing::debug!(
            target: TRACING_TARGET,
            path = url.path(),
            params = ?params,
            "Sending request"
        );
        let res = self
            .http
            .get(url)
            .timeout(self.config.effective_timeout())
            .header(USER_AGENT, self.config.effective_user_agent())
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;
        tracing::debug!(
            target: TRACING_TARGET,
            status = status.as_u16(),
            bytes = body.len(),
            "Received response"
        );
        decode_envelope(status, &body)
    }
}

/// Decode a response body, turning a top-level `error` field into [`ServiceError`].
///
/// The `error` check runs before the status check so that error bodies sent
/// with 4xx/5xx statuses keep the service's message.
fn decode_envelope(status: StatusCode, body: &str) -> Result<Value> {
    let data: Option<Value> = serde_json::from_str(body).ok();
    if let Some(message) = data.as_ref().and_then(service_error_message) {
        tracing::warn!(
            target: TRACING_TARGET,
            status = status.as_u16(),
            error = %message,
            "NodePing returned an error"
        );
        return Err(ServiceError::new(message, Some(status.as_u16())).into());
    }
    if !status.is_success() {
        return Err(TransportError::new(format!("HTTP {}", status), Some(status.as_u16())).into());
    }
    data.ok_or_else(|| {
        MalformedResponseError::new("response body is not valid JSON", None).into()
    })
}

fn service_error_message(data: &Value) -> Option<String> {
    match data.get("error")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Map every item of a list payload and key it by ID. Later duplicates replace earlier ones.
///
/// List endpoints may send either an array or an object keyed by ID; both are accepted.
fn collect_keyed<T, F>(data: Value, kind: &str, parse: F) -> Result<HashMap<String, T>>
where
    F: Fn(&Value) -> Result<(String, T)>,
{
    let items: Vec<Value> = match data {
        Value::Array(items) => items,
        Value::Object(map) => map.into_values().collect(),
        other => {
            return Err(Error::MalformedResponse(MalformedResponseError::new(
                format!("expected a list of {}", kind),
                Some(other),
            )))
        }
    };
    let mut out = HashMap::with_capacity(items.len());
    for item in &items {
        let (id, record) = parse(item)?;
        if out.contains_key(&id) {
            tracing::debug!(target: TRACING_TARGET, id = %id, kind, "Duplicate ID in response");
        }
        out.insert(id, record);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn query_of(url: &Url) -> HashMap<String, String> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Accept one connection, answer with `status` and `body`, and yield the request line.
    async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        serve_raw(response, Duration::ZERO).await
    }

    /// Accept one connection, wait `delay`, then write `response` verbatim.
    async fn serve_raw(response: String, delay: Duration) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            // the client may already have given up
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
            String::from_utf8_lossy(&buf)
                .lines()
                .next()
                .unwrap_or_default()
                .to_string()
        });
        (format!("http://{}/api/1/", addr), handle)
    }

    fn local_client(base_url: &str, account_id: Option<&str>) -> Client {
        Client::with_config(
            "tok",
            account_id.map(String::from),
            ClientConfig::default().with_base_url(base_url),
        )
    }

    fn request_query(request_line: &str) -> (String, HashMap<String, String>) {
        let target = request_line.split_whitespace().nth(1).unwrap();
        let url = Url::parse(&format!("http://localhost{}", target)).unwrap();
        (url.path().to_string(), query_of(&url))
    }

    fn check_json(id: &str) -> Value {
        json!({
            "_id": id,
            "customer_id": "201205050153W2Q4C",
            "label": "Site",
            "interval": 1,
            "created": 1336182780000i64,
            "type": "HTTP",
            "enable": "active",
            "public": false,
            "modified": 1336182780000i64,
            "parameters": {"target": "http://example.com/"},
            "uuid": "u",
            "status": "assigned"
        })
    }

    fn result_json(id: &str) -> Value {
        json!({
            "_id": id, "ci": "c", "t": "PING", "th": 5, "i": 1,
            "ra": 1, "s": 2, "e": 3, "sc": "Success", "rt": 12, "su": true
        })
    }

    #[test]
    fn build_url_appends_token_last() {
        let client = Client::new("tok", None);
        let url = client
            .build_url("/results", &[("id", "chk1".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.nodeping.com/api/1/results?id=chk1&token=tok"
        );
    }

    #[test]
    fn build_url_scopes_to_account() {
        let client = Client::new("tok", Some("sub1".to_string()));
        let url = client.build_url("checks", &[]).unwrap();
        let q = query_of(&url);
        assert_eq!(url.path(), "/api/1/checks");
        assert_eq!(q.get("token").map(String::as_str), Some("tok"));
        assert_eq!(q.get("customerid").map(String::as_str), Some("sub1"));
    }

    #[test]
    fn build_url_explicit_customerid_wins() {
        let client = Client::new("tok", Some("sub1".to_string()));
        let url = client
            .build_url("accounts", &[("customerid", "other".to_string())])
            .unwrap();
        let ids: Vec<_> = url
            .query_pairs()
            .filter(|(k, _)| k == "customerid")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(ids, vec!["other".to_string()]);
    }

    #[test]
    fn build_url_keeps_last_base_segment() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url": "https://api.nodeping.com/api/1"}"#).unwrap();
        let client = Client::with_config("t", None, config);
        let url = client.build_url("checks", &[]).unwrap();
        assert_eq!(url.as_str(), "https://api.nodeping.com/api/1/checks?token=t");
    }

    #[test]
    fn build_url_form_encodes_values() {
        let client = Client::new("a b&c=d", None);
        let url = client.build_url("accounts", &[]).unwrap();
        assert_eq!(url.query(), Some("token=a+b%26c%3Dd"));
    }

    #[test]
    fn debug_redacts_token() {
        let out = format!("{:?}", Client::new("secret-token", None));
        assert!(!out.contains("secret-token"));
        assert!(out.contains("redacted"));
    }

    #[test]
    fn decode_envelope_outcomes() {
        let ok = decode_envelope(StatusCode::OK, r#"[{"a":1}]"#).unwrap();
        assert_eq!(ok, json!([{"a": 1}]));

        let err = decode_envelope(StatusCode::OK, r#"{"error":"bad token"}"#).unwrap_err();
        assert_eq!(err.service_message(), Some("bad token"));

        let err = decode_envelope(StatusCode::FORBIDDEN, r#"{"error":"bad token"}"#).unwrap_err();
        assert!(matches!(err, Error::Service(ServiceError { status_code: Some(403), .. })));

        let err = decode_envelope(StatusCode::BAD_GATEWAY, "<html>").unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError { status_code: Some(502), .. })));

        let err = decode_envelope(StatusCode::OK, "not json").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));

        // a null error field is not a failure
        assert!(decode_envelope(StatusCode::OK, r#"{"error":null,"x":1}"#).is_ok());
    }

    #[test]
    fn collect_keyed_accepts_array_and_object() {
        let parse = |v: &Value| Check::from_value(v).map(|c| (c.id.clone(), c));

        let arr = json!([check_json("c-1"), check_json("c-2"), check_json("c-3")]);
        let map = collect_keyed(arr, "checks", parse).unwrap();
        assert_eq!(map.len(), 3);
        for (id, check) in &map {
            assert_eq!(id, &check.id);
        }

        let obj = json!({"c-1": check_json("c-1"), "c-2": check_json("c-2")});
        let map = collect_keyed(obj, "checks", parse).unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("c-2"));

        let err = collect_keyed(json!("nope"), "checks", parse).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[test]
    fn collect_keyed_last_duplicate_wins() {
        let mut second = check_json("dup");
        second["label"] = json!("second");
        let data = json!([check_json("dup"), second]);
        let map = collect_keyed(data, "checks", |v| {
            Check::from_value(v).map(|c| (c.id.clone(), c))
        })
        .unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["dup"].label, "second");
    }

    #[tokio::test]
    async fn check_results_request_and_mapping() {
        let body = json!([result_json("chk1-100"), result_json("chk1-200")]).to_string();
        let (base, server) = serve_once("200 OK", body).await;
        let client = local_client(&base, None);

        let results = client
            .get_check_results("chk1", Some(1), Some(5000))
            .await
            .unwrap();
        let (path, q) = request_query(&server.await.unwrap());

        assert_eq!(path, "/api/1/results");
        assert_eq!(q.get("id").map(String::as_str), Some("chk1"));
        assert_eq!(q.get("clean").map(String::as_str), Some("true"));
        assert_eq!(q.get("span").map(String::as_str), Some("1"));
        assert_eq!(q.get("limit").map(String::as_str), Some("5000"));
        assert_eq!(q.get("token").map(String::as_str), Some("tok"));
        assert!(!q.contains_key("customerid"));

        assert_eq!(results.len(), 2);
        assert_eq!(results["chk1-100"].check_id.as_deref(), Some("chk1"));
        assert_eq!(results["chk1-200"].runtime, 12);
    }

    #[tokio::test]
    async fn check_results_omits_unset_window() {
        let (base, server) = serve_once("200 OK", "[]".to_string()).await;
        let client = local_client(&base, Some("sub1"));

        let results = client.get_check_results("chk1", None, None).await.unwrap();
        let (_, q) = request_query(&server.await.unwrap());

        assert!(results.is_empty());
        assert!(!q.contains_key("span"));
        assert!(!q.contains_key("limit"));
        assert_eq!(q.get("customerid").map(String::as_str), Some("sub1"));
    }

    #[tokio::test]
    async fn checks_keyed_by_id() {
        let body = json!([check_json("a-1"), check_json("a-2")]).to_string();
        let (base, server) = serve_once("200 OK", body).await;
        let checks = local_client(&base, None).get_checks().await.unwrap();
        let (path, _) = request_query(&server.await.unwrap());

        assert_eq!(path, "/api/1/checks");
        assert_eq!(checks.len(), 2);
        assert!(checks["a-1"].enabled);
    }

    #[tokio::test]
    async fn accounts_pass_through() {
        let body = json!({"201205050153W2Q4C": {"name": "Main", "status": "Active"}}).to_string();
        let (base, server) = serve_once("200 OK", body).await;
        let client = local_client(&base, Some("sub1"));

        let account = client.get_account("other").await.unwrap();
        let (path, q) = request_query(&server.await.unwrap());

        assert_eq!(path, "/api/1/accounts");
        assert_eq!(q.get("customerid").map(String::as_str), Some("other"));
        assert_eq!(account["201205050153W2Q4C"]["name"], "Main");
    }

    #[tokio::test]
    async fn service_error_on_every_endpoint() {
        for endpoint in 0..4 {
            let body = r#"{"error":"bad token"}"#.to_string();
            let (base, _server) = serve_once("200 OK", body).await;
            let client = local_client(&base, None);
            let err = match endpoint {
                0 => client.get_accounts().await.unwrap_err(),
                1 => client.get_account("c").await.unwrap_err(),
                2 => client.get_checks().await.unwrap_err(),
                _ => client.get_check_results("chk1", None, None).await.unwrap_err(),
            };
            assert_eq!(err.service_message(), Some("bad token"), "endpoint {}", endpoint);
        }
    }

    #[tokio::test]
    async fn malformed_item_fails_the_call() {
        let body = json!([check_json("a-1"), {"_id": "a-2"}]).to_string();
        let (base, _server) = serve_once("200 OK", body).await;
        let err = local_client(&base, None).get_checks().await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn http_error_without_payload_is_transport() {
        let (base, _server) = serve_once("500 Internal Server Error", "oops".to_string()).await;
        let err = local_client(&base, None).get_accounts().await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError { status_code: Some(500), .. })));
    }

    #[tokio::test]
    async fn connection_failure_is_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = local_client(&format!("http://{}/api/1/", addr), None);
        let err = client.get_accounts().await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        let out = format!("{} {:?}", err, err);
        assert!(!out.contains("token=tok"), "{}", out);
    }

    #[tokio::test]
    async fn truncated_body_error_hides_token() {
        let response = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                        Content-Length: 100\r\nConnection: close\r\n\r\n[1,2"
            .to_string();
        let (base, _server) = serve_raw(response, Duration::ZERO).await;
        let client = Client::with_config(
            "SECRETTOKEN",
            None,
            ClientConfig::default().with_base_url(base),
        );

        let err = client.get_accounts().await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        let mut out = format!("{} {:?}", err, err);
        let mut source = std::error::Error::source(&err);
        while let Some(e) = source {
            out.push_str(&format!(" {} {:?}", e, e));
            source = e.source();
        }
        assert!(!out.contains("SECRETTOKEN"), "{}", out);
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let (base, _server) = serve_raw(
            "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n[]".to_string(),
            Duration::from_secs(3),
        )
        .await;
        let client = Client::with_config(
            "tok",
            None,
            ClientConfig::default().with_base_url(base).with_timeout(1),
        );

        let err = client.get_accounts().await.unwrap_err();
        match err {
            Error::Transport(e) => {
                assert_eq!(e.message, "Request to NodePing timed out");
                assert!(e.source.as_ref().is_some_and(|s| s.is_timeout()));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn limit_above_service_maximum_is_sent_unchanged() {
        let (base, server) = serve_once("200 OK", "[]".to_string()).await;
        let client = local_client(&base, None);

        client
            .get_check_results("chk1", None, Some(50000))
            .await
            .unwrap();
        let (_, q) = request_query(&server.await.unwrap());

        assert_eq!(q.get("limit").map(String::as_str), Some("50000"));
        assert!(!q.contains_key("span"));
    }
}
