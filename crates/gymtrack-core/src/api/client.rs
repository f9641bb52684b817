//! API client for communicating with the gym REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! API requests for sessions, profile changes, exercises and history.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, multipart, Client, RequestBuilder, Response, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::SessionApi;
use crate::models::{join_url, Exercise, HistoryByDay, UserProfile};

use super::{ApiError, AvatarUpload, BearerAuth};

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Shown for a failed sign in when the server gives no reason.
const INVALID_CREDENTIALS: &str = "Invalid email or password";

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Body of a successful `POST sessions`.
///
/// Both fields are optional here so a malformed success can be told apart
/// from a transport failure.
#[derive(Debug, Clone, Deserialize)]
pub struct SignInResponse {
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub token: Option<String>,
}

/// Body for `POST users`.
#[derive(Debug, Clone, Serialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Body for `PUT users`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateUserRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_password: Option<String>,
}

#[derive(Debug, Serialize)]
struct HistoryRequest<'a> {
    exercise_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct AvatarResponse {
    avatar: String,
}

/// API client for the gym service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling,
/// and clones share the same bearer token.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    bearer: BearerAuth,
}

impl ApiClient {
    /// Create a new API client with the default timeout
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer: BearerAuth::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Handle to the default bearer token used by every request
    pub fn bearer(&self) -> &BearerAuth {
        &self.bearer
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Build a URL from path segments, percent-encoding each one so caller
    /// input can't add a query, fragment or extra path level.
    fn segments_url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || **s == "." || **s == "..")
        {
            return Err(ApiError::InvalidUrl(format!("invalid path segment {:?}", bad)));
        }

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(value) = self.bearer.header_value() {
            headers.insert(header::AUTHORIZATION, header::HeaderValue::from_str(&value)?);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Decode a JSON body, reporting decode failures as invalid responses
    /// rather than network errors.
    async fn parse_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", what, e)))
    }

    /// Send a request, retrying with exponential backoff while rate limited.
    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build().headers(self.auth_headers()?).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self.send_with_retry(&url, || self.client.get(&url)).await?;
        Self::parse_json(response, path).await
    }

    async fn get_segments<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.segments_url(segments)?;
        let response = self
            .send_with_retry(url.as_str(), || self.client.get(url.clone()))
            .await?;
        Self::parse_json(response, url.path()).await
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Response, ApiError> {
        let url = self.url(path);
        self.send_with_retry(&url, || self.client.post(&url).json(body)).await
    }

    // ===== Session & Account =====

    /// Create a session (`POST sessions`).
    pub async fn create_session(&self, email: &str, password: &str) -> Result<SignInResponse, ApiError> {
        let url = self.url("sessions");
        let body = SignInRequest { email, password };

        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status_or(status, &body, INVALID_CREDENTIALS));
        }
        debug!("Session created");
        Self::parse_json(response, "session response").await
    }

    /// Register a new account (`POST users`).
    pub async fn create_account(&self, account: &NewAccount) -> Result<(), ApiError> {
        self.post("users", account).await?;
        debug!(email = %account.email, "Account created");
        Ok(())
    }

    /// Update name and optionally password (`PUT users`).
    pub async fn update_user(&self, update: &UpdateUserRequest) -> Result<(), ApiError> {
        let url = self.url("users");
        let response = self
            .client
            .put(&url)
            .headers(self.auth_headers()?)
            .json(update)
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }

    /// Upload a new avatar (`PATCH users/avatar`), returning the stored file name.
    pub async fn upload_avatar(&self, upload: &AvatarUpload) -> Result<String, ApiError> {
        let part = multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.mime_type)?;
        let form = multipart::Form::new().part("avatar", part);

        let response = self
            .client
            .patch(self.url("users/avatar"))
            .headers(self.auth_headers()?)
            .multipart(form)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let updated: AvatarResponse = Self::parse_json(response, "avatar response").await?;
        debug!(avatar = %updated.avatar, "Avatar uploaded");
        Ok(updated.avatar)
    }

    // ===== Exercises =====

    /// Fetch the list of muscle groups
    pub async fn fetch_groups(&self) -> Result<Vec<String>, ApiError> {
        self.get("groups").await
    }

    /// Fetch all exercises for a muscle group
    pub async fn fetch_exercises_by_group(&self, group: &str) -> Result<Vec<Exercise>, ApiError> {
        self.get_segments(&["exercises", "bygroup", group]).await
    }

    /// Fetch a single exercise
    pub async fn fetch_exercise(&self, exercise_id: &str) -> Result<Exercise, ApiError> {
        self.get_segments(&["exercises", exercise_id]).await
    }

    // ===== History =====

    /// Mark an exercise as completed now
    pub async fn register_history(&self, exercise_id: &str) -> Result<(), ApiError> {
        self.post("history", &HistoryRequest { exercise_id }).await?;
        debug!(exercise_id = exercise_id, "Exercise registered in history");
        Ok(())
    }

    /// Fetch completed exercises grouped by day, newest first
    pub async fn fetch_history(&self) -> Result<Vec<HistoryByDay>, ApiError> {
        self.get("history").await
    }
}

#[async_trait]
impl SessionApi for ApiClient {
    fn bearer(&self) -> &BearerAuth {
        &self.bearer
    }

    async fn create_session(&self, email: &str, password: &str) -> Result<SignInResponse, ApiError> {
        ApiClient::create_session(self, email, password).await
    }

    async fn update_user(&self, update: &UpdateUserRequest) -> Result<(), ApiError> {
        ApiClient::update_user(self, update).await
    }

    async fn upload_avatar(&self, upload: &AvatarUpload) -> Result<String, ApiError> {
        ApiClient::upload_avatar(self, upload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use crate::auth::SessionManager;
    use crate::storage::{MemoryStore, SessionStorage};

    /// Answers each connection with the next canned `(status, body)` and
    /// records the raw requests it received.
    struct StubServer {
        base_url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl StubServer {
        async fn start(replies: Vec<(u16, &'static str)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));

            let seen = requests.clone();
            tokio::spawn(async move {
                for (status, body) in replies {
                    let (mut socket, _) = listener.accept().await.unwrap();
                    let request = read_request(&mut socket).await;
                    seen.lock().unwrap().push(request);
                    let reply = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    socket.write_all(reply.as_bytes()).await.unwrap();
                    socket.shutdown().await.unwrap();
                }
            });

            Self { base_url, requests }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    /// Read one request: headers, then a Content-Length or chunked body.
    /// Returned lowercased so header checks don't depend on casing.
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_lowercase();
            let Some(header_end) = text.find("\r\n\r\n") else {
                continue;
            };
            let content_length = text[..header_end]
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok());
            let complete = match content_length {
                Some(len) => buf.len() >= header_end + 4 + len,
                None if text.contains("transfer-encoding: chunked") => text.ends_with("0\r\n\r\n"),
                None => true,
            };
            if complete {
                break;
            }
        }
        String::from_utf8_lossy(&buf).to_lowercase()
    }

    const SIGN_IN_OK: &str =
        r#"{"user":{"id":"7","name":"Ana","email":"ana@gym.com","avatar":null},"token":"tok123"}"#;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let api = ApiClient::new("http://localhost:3333/").unwrap();
        assert_eq!(api.base_url(), "http://localhost:3333");
        assert_eq!(api.url("sessions"), "http://localhost:3333/sessions");
        assert_eq!(
            api.url(&format!("exercises/bygroup/{}", "costas")),
            "http://localhost:3333/exercises/bygroup/costas"
        );
    }

    #[test]
    fn test_path_segments_are_encoded() {
        let api = ApiClient::new("http://localhost:3333/").unwrap();

        let url = api.segments_url(&["exercises", "bygroup", "ombros?admin=1#x"]).unwrap();
        assert_eq!(url.path(), "/exercises/bygroup/ombros%3Fadmin=1%23x");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());

        let url = api.segments_url(&["exercises", "bygroup", "peito/costas"]).unwrap();
        assert_eq!(url.path(), "/exercises/bygroup/peito%2Fcostas");

        let url = api.segments_url(&["exercises", "12"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3333/exercises/12");
    }

    #[test]
    fn test_dot_segments_are_rejected() {
        let api = ApiClient::new("http://localhost:3333").unwrap();
        for bad in ["..", ".", ""] {
            assert!(matches!(
                api.segments_url(&["exercises", bad]),
                Err(ApiError::InvalidUrl(_))
            ));
        }
    }

    #[test]
    fn test_segments_keep_base_path() {
        let api = ApiClient::new("http://localhost:3333/api").unwrap();
        let url = api.segments_url(&["exercises", "1"]).unwrap();
        assert_eq!(url.path(), "/api/exercises/1");
    }

    #[test]
    fn test_auth_headers_follow_bearer() {
        let api = ApiClient::new("http://localhost:3333").unwrap();
        let headers = api.auth_headers().unwrap();
        assert!(headers.get(header::AUTHORIZATION).is_none());
        assert_eq!(headers.get(header::ACCEPT).unwrap(), "application/json");

        // Clones share the bearer handle
        let clone = api.clone();
        api.bearer().set("tok123");
        let headers = clone.auth_headers().unwrap();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer tok123");
    }

    #[test]
    fn test_auth_headers_reject_invalid_token() {
        let api = ApiClient::new("http://localhost:3333").unwrap();
        api.bearer().set("bad\ntoken");
        assert!(matches!(api.auth_headers(), Err(ApiError::InvalidToken(_))));
    }

    #[test]
    fn test_parse_sign_in_response() {
        let json = r#"{"user": {"id": 1, "name": "A", "email": "a@b.com", "avatar": null}, "token": "tok123", "refresh_token": "r"}"#;
        let resp: SignInResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.user.unwrap().id, "1");
        assert_eq!(resp.token.as_deref(), Some("tok123"));

        let empty: SignInResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.user.is_none() && empty.token.is_none());
    }

    #[test]
    fn test_update_user_request_omits_unset_passwords() {
        let body = UpdateUserRequest {
            name: "Ana".to_string(),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"name":"Ana"}"#);
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried() {
        let server = StubServer::start(vec![(429, ""), (200, r#"["costas","ombros"]"#)]).await;
        let api = ApiClient::new(&server.base_url).unwrap();

        let groups = api.fetch_groups().await.unwrap();

        assert_eq!(groups, vec!["costas", "ombros"]);
        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.starts_with("get /groups ")));
    }

    #[tokio::test]
    async fn test_exercises_by_group_path_on_the_wire() {
        let server = StubServer::start(vec![(200, "[]")]).await;
        let api = ApiClient::new(&server.base_url).unwrap();

        let exercises = api.fetch_exercises_by_group("ombros?admin=1").await.unwrap();

        assert!(exercises.is_empty());
        // Lowercased by the recorder
        assert!(server.requests()[0].starts_with("get /exercises/bygroup/ombros%3fadmin=1 "));
    }

    #[tokio::test]
    async fn test_sign_in_sends_json_and_sets_bearer() {
        let server = StubServer::start(vec![(200, SIGN_IN_OK), (200, "[]")]).await;
        let api = ApiClient::new(&server.base_url).unwrap();
        let session = SessionManager::new(
            Arc::new(api.clone()),
            SessionStorage::new(Arc::new(MemoryStore::new())),
        );
        session.restore().await;

        let profile = session.sign_in("ana@gym.com", "123456").await.unwrap();
        assert_eq!(profile.name, "Ana");
        assert_eq!(api.bearer().header_value().as_deref(), Some("Bearer tok123"));

        api.fetch_history().await.unwrap();

        let requests = server.requests();
        let sign_in = &requests[0];
        assert!(sign_in.starts_with("post /sessions "));
        assert!(sign_in.contains("content-type: application/json"));
        assert!(sign_in.contains("accept: application/json"));
        assert!(sign_in.contains(r#"{"email":"ana@gym.com","password":"123456"}"#));
        assert!(!sign_in.contains("authorization:"));

        assert!(requests[1].starts_with("get /history "));
        assert!(requests[1].contains("authorization: bearer tok123"));
    }

    #[tokio::test]
    async fn test_sign_in_rejected_without_message() {
        let server = StubServer::start(vec![(401, "")]).await;
        let api = ApiClient::new(&server.base_url).unwrap();

        let err = api.create_session("ana@gym.com", "wrong").await.unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == INVALID_CREDENTIALS));
    }

    #[tokio::test]
    async fn test_update_user_sends_put() {
        let server = StubServer::start(vec![(200, "{}")]).await;
        let api = ApiClient::new(&server.base_url).unwrap();
        api.bearer().set("tok123");

        api.update_user(&UpdateUserRequest {
            name: "Ana Silva".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

        let request = &server.requests()[0];
        assert!(request.starts_with("put /users "));
        assert!(request.contains("authorization: bearer tok123"));
        assert!(request.contains(r#"{"name":"ana silva"}"#));
    }

    #[tokio::test]
    async fn test_upload_avatar_sends_multipart_part() {
        let server = StubServer::start(vec![(200, r#"{"avatar":"ana.png"}"#)]).await;
        let api = ApiClient::new(&server.base_url).unwrap();

        let upload = AvatarUpload {
            file_name: "ana.png".to_string(),
            mime_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        };
        let stored = api.upload_avatar(&upload).await.unwrap();

        assert_eq!(stored, "ana.png");
        let request = &server.requests()[0];
        assert!(request.starts_with("patch /users/avatar "));
        assert!(request.contains("content-type: multipart/form-data"));
        assert!(request.contains(r#"name="avatar""#));
        assert!(request.contains(r#"filename="ana.png""#));
        assert!(request.contains("content-type: image/png"));
    }
}
