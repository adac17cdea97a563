//! etcd v3 client over the JSON gateway
//!
//! Speaks the grpc-gateway HTTP endpoints every etcd v3 server exposes on
//! its client port. Keys and values travel base64 encoded.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::traits::{KeyValue, StoreClient, StoreConnector};
use crate::error::{ConnectionError, QueryError, StoreError};
use crate::roots::Credentials;

const AUTH_PATH: &str = "/v3/auth/authenticate";
const STATUS_PATH: &str = "/v3/maintenance/status";
const RANGE_PATH: &str = "/v3/kv/range";

/// Connector for etcd clusters reachable over HTTP
#[derive(Debug, Clone, Default)]
pub struct EtcdConnector;

impl EtcdConnector {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    name: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
}

#[derive(Debug, Serialize)]
struct RangeRequest {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    range_end: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    keys_only: bool,
}

#[derive(Debug, Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<RawKeyValue>,
}

#[derive(Debug, Deserialize)]
struct RawKeyValue {
    key: String,
    #[serde(default)]
    value: Option<String>,
}

#[async_trait]
impl StoreConnector for EtcdConnector {
    async fn connect(
        &self,
        endpoint: &str,
        credentials: &Credentials,
        dial_timeout: Duration,
    ) -> Result<Box<dyn StoreClient>, StoreError> {
        let http = Client::builder()
            .connect_timeout(dial_timeout)
            .build()
            .map_err(|e| ConnectionError::Unreachable(e.to_string()))?;

        let mut client = EtcdClient {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: None,
            dial_timeout,
        };

        if !credentials.is_anonymous() {
            client.authenticate(credentials).await?;
        }

        debug!(endpoint = %client.endpoint, "etcd client created");
        Ok(Box::new(client))
    }
}

struct EtcdClient {
    http: Client,
    endpoint: String,
    token: Option<String>,
    dial_timeout: Duration,
}

impl EtcdClient {
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), StoreError> {
        let request = AuthRequest {
            name: &credentials.username,
            password: credentials.expose_password(),
        };
        let response: AuthResponse = self.post(&self.endpoint, AUTH_PATH, &request).await?;
        self.token = Some(response.token);
        Ok(())
    }

    async fn post<B, R>(&self, endpoint: &str, path: &str, body: &B) -> Result<R, StoreError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let url = format!("{}{}", endpoint.trim_end_matches('/'), path);
        let mut request = self.http.post(&url).json(body);
        if let Some(token) = &self.token {
            request = request.header("Authorization", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        response
            .json()
            .await
            .map_err(|e| StoreError::Query(QueryError::Failed(format!("bad response: {}", e))))
    }

    fn classify_transport(&self, err: reqwest::Error) -> StoreError {
        // connect_timeout is the only deadline set on the client; query
        // deadlines are enforced by the session and never surface here
        if err.is_timeout() {
            ConnectionError::Timeout(self.dial_timeout.as_millis() as u64).into()
        } else {
            ConnectionError::Unreachable(err.to_string()).into()
        }
    }

    async fn range(&self, request: RangeRequest) -> Result<Vec<KeyValue>, StoreError> {
        let response: RangeResponse = self.post(&self.endpoint, RANGE_PATH, &request).await?;
        response.kvs.into_iter().map(decode_kv).collect()
    }
}

#[async_trait]
impl StoreClient for EtcdClient {
    async fn probe(&self, endpoint: &str) -> Result<(), StoreError> {
        let _: serde_json::Value = self
            .post(endpoint, STATUS_PATH, &serde_json::json!({}))
            .await?;
        Ok(())
    }

    async fn get_prefix(&self, prefix: &str, keys_only: bool) -> Result<Vec<KeyValue>, StoreError> {
        let (key, range_end) = prefix_range(prefix.as_bytes());
        self.range(RangeRequest {
            key: STANDARD.encode(key),
            range_end: Some(STANDARD.encode(range_end)),
            keys_only,
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let kvs = self
            .range(RangeRequest {
                key: STANDARD.encode(key),
                range_end: None,
                keys_only: false,
            })
            .await?;
        Ok(kvs
            .into_iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.unwrap_or_default()))
    }

    async fn close(&mut self) {
        self.token = None;
    }
}

/// Map a non-success gateway reply to the error taxonomy
fn classify_status(status: StatusCode, body: String) -> StoreError {
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || body.contains("authentication failed")
        || body.contains("invalid auth token")
    {
        ConnectionError::AuthFailed(body).into()
    } else if status == StatusCode::NOT_FOUND || status == StatusCode::SERVICE_UNAVAILABLE {
        ConnectionError::Unreachable(format!("{}: {}", status, body)).into()
    } else {
        QueryError::Failed(format!("{}: {}", status, body)).into()
    }
}

/// Start and end of the key range covering every key with `prefix`
///
/// An empty prefix, or one made only of 0xff bytes, has no upper bound;
/// etcd spells that as a single zero byte.
fn prefix_range(prefix: &[u8]) -> (Vec<u8>, Vec<u8>) {
    if prefix.is_empty() {
        return (vec![0], vec![0]);
    }
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return (prefix.to_vec(), end);
        }
    }
    (prefix.to_vec(), vec![0])
}

fn decode_kv(raw: RawKeyValue) -> Result<KeyValue, StoreError> {
    let decode = |field: &str| {
        STANDARD
            .decode(field)
            .map_err(|e| StoreError::Query(QueryError::Failed(format!("bad base64: {}", e))))
    };
    let key = match String::from_utf8(decode(&raw.key)?) {
        Ok(key) => key,
        Err(e) => {
            let key = String::from_utf8_lossy(e.as_bytes()).into_owned();
            warn!(key = %key, raw = %raw.key, "Key is not valid UTF-8, shown lossily and not fetchable");
            key
        }
    };
    let value = raw.value.as_deref().map(decode).transpose()?;
    Ok(KeyValue { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_range_increments_last_byte() {
        assert_eq!(prefix_range(b"/"), (b"/".to_vec(), b"0".to_vec()));
        assert_eq!(prefix_range(b"/a/b"), (b"/a/b".to_vec(), b"/a/c".to_vec()));
    }

    #[test]
    fn prefix_range_carries_past_ff() {
        assert_eq!(prefix_range(&[b'a', 0xff]), (vec![b'a', 0xff], vec![b'b']));
        assert_eq!(prefix_range(&[0xff, 0xff]), (vec![0xff, 0xff], vec![0]));
    }

    #[test]
    fn empty_prefix_covers_everything() {
        assert_eq!(prefix_range(b""), (vec![0], vec![0]));
    }

    #[test]
    fn range_request_omits_defaults() {
        let request = RangeRequest {
            key: "L2E=".to_string(),
            range_end: None,
            keys_only: false,
        };
        assert_eq!(serde_json::to_string(&request).unwrap(), r#"{"key":"L2E="}"#);

        let request = RangeRequest {
            key: "Lw==".to_string(),
            range_end: Some("MA==".to_string()),
            keys_only: true,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""keys_only":true"#));
        assert!(json.contains(r#""range_end":"MA==""#));
    }

    #[test]
    fn range_response_decodes_keys_and_values() {
        let json = r#"{"header":{},"kvs":[{"key":"L2EvYg==","value":"aGk="},{"key":"L2M="}],"count":"2"}"#;
        let response: RangeResponse = serde_json::from_str(json).unwrap();
        let kvs: Vec<KeyValue> = response
            .kvs
            .into_iter()
            .map(decode_kv)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(kvs[0].key, "/a/b");
        assert_eq!(kvs[0].value.as_deref(), Some(b"hi".as_slice()));
        assert_eq!(kvs[1], KeyValue::key_only("/c"));
    }

    #[test]
    fn non_utf8_key_is_decoded_lossily() {
        let kv = decode_kv(RawKeyValue {
            key: "L2H/".to_string(),
            value: None,
        })
        .unwrap();
        assert_eq!(kv.key, "/a\u{FFFD}");
    }

    #[test]
    fn empty_range_response_has_no_kvs() {
        let response: RangeResponse = serde_json::from_str(r#"{"header":{}}"#).unwrap();
        assert!(response.kvs.is_empty());
    }

    #[test]
    fn auth_failures_are_classified() {
        let err = classify_status(
            StatusCode::BAD_REQUEST,
            "etcdserver: authentication failed, invalid user ID or password".to_string(),
        );
        assert!(matches!(
            err,
            StoreError::Connection(ConnectionError::AuthFailed(_))
        ));

        let err = classify_status(StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string());
        assert!(matches!(err, StoreError::Query(QueryError::Failed(_))));
    }
}
