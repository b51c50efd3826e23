//! Credential session for the BI platform's API.
//!
//! ## Request protocol
//!
//! 1. Attach the current access token as a bearer credential.
//! 2. Send.
//! 3. If the response is `401` *and* its body says the token expired,
//!    refresh the access token once and resend the same request once.
//! 4. Any non-2xx status left after that is a [`ClientError::Request`].
//!
//! Any other 401 is surfaced immediately: it is a caller error, not token
//! staleness.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};

/// `msg` value the API returns in a 401 body when the access token expired.
pub const TOKEN_EXPIRED_MSG: &str = "Token has expired";

/// Username and password for the BI platform's database auth provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both parts must be present and non-empty.
    pub fn from_parts(
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self, ClientError> {
        match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Ok(Self::new(u, p)),
            _ => Err(ClientError::MissingCredentials),
        }
    }

    fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
}

/// Owns the tokens for one API for the lifetime of a run.
///
/// Tokens are replaced in place on login and refresh; nothing is persisted.
pub struct Session {
    api_base_url: String,
    credentials: Credentials,
    access_token: Option<String>,
    refresh_token: Option<String>,
    transport: Box<dyn HttpTransport>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("api_base_url", &self.api_base_url)
            .field("credentials", &self.credentials)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Session {
    /// A session with no tokens yet. Call [`Session::login`] before use.
    pub fn new(
        api_base_url: impl Into<String>,
        credentials: Credentials,
        transport: impl HttpTransport + 'static,
    ) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            credentials,
            access_token: None,
            refresh_token: None,
            transport: Box::new(transport),
        }
    }

    /// [`Session::new`] followed by [`Session::login`].
    pub fn connect(
        api_base_url: impl Into<String>,
        credentials: Credentials,
        transport: impl HttpTransport + 'static,
    ) -> Result<Self, ClientError> {
        let mut session = Self::new(api_base_url, credentials, transport);
        session.login()?;
        Ok(session)
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// Exchange username/password for an access token and a refresh token.
    pub fn login(&mut self) -> Result<(), ClientError> {
        if !self.credentials.is_complete() {
            return Err(ClientError::Authentication(
                "username and password are required".to_string(),
            ));
        }

        let payload = json!({
            "username": self.credentials.username,
            "password": self.credentials.password,
            "provider": "db",
            "refresh": true,
        });
        let request = self.json_request(HttpMethod::Post, "/security/login", Some(&payload))?;
        let response = match self.execute(request, "/security/login", false) {
            Ok(resp) => resp,
            Err(ClientError::Request { status, body, .. }) if status == 401 || status == 403 => {
                return Err(ClientError::Authentication(format!(
                    "login rejected for user '{}' (status {status}): {body}",
                    self.credentials.username
                )));
            }
            Err(e) => return Err(e),
        };

        let tokens: LoginResponse = decode(&response, "/security/login")?;
        let Some(access_token) = tokens.access_token else {
            return Err(ClientError::Authentication(
                "login response carried no access token".to_string(),
            ));
        };
        self.access_token = Some(access_token);
        self.refresh_token = tokens.refresh_token;

        tracing::debug!("login successful");
        Ok(())
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Returns `Ok(false)` when no refresh token is held: the caller has no
    /// option left but to fail.
    pub fn refresh(&mut self) -> Result<bool, ClientError> {
        tracing::debug!("refreshing API token");
        let Some(refresh_token) = self.refresh_token.clone() else {
            tracing::warn!("cannot refresh access token: no refresh token held");
            return Ok(false);
        };

        let mut request = HttpRequest::new(HttpMethod::Post, self.url("/security/refresh"));
        request.set_header("Authorization", format!("Bearer {refresh_token}"));
        let response = self.execute(request, "/security/refresh", false)?;
        let refreshed: RefreshResponse = decode(&response, "/security/refresh")?;
        self.access_token = Some(refreshed.access_token);

        tracing::debug!("token refreshed successfully");
        Ok(true)
    }

    /// Attach the current access token, unless the request already carries
    /// its own credential.
    pub fn authorize(&self, request: &mut HttpRequest) {
        if request.header("Authorization").is_some() {
            return;
        }
        if let Some(token) = &self.access_token {
            request.set_header("Authorization", format!("Bearer {token}"));
        }
    }

    /// Execute an authorized request and parse the JSON response.
    ///
    /// An empty response body yields [`Value::Null`].
    pub fn request(
        &mut self,
        method: HttpMethod,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let mut request = self.json_request(method, endpoint, body)?;
        request.query = query
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        let response = self.execute(request, endpoint, true)?;
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        decode(&response, endpoint)
    }

    /// `GET` and deserialize.
    pub fn get_json<T: DeserializeOwned>(
        &mut self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let value = self.request(HttpMethod::Get, endpoint, query, None)?;
        serde_json::from_value(value).map_err(|e| ClientError::Decode {
            endpoint: endpoint.to_string(),
            source: e,
        })
    }

    /// `PUT` with an optional JSON body.
    pub fn put_json<B: Serialize>(
        &mut self,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<Value, ClientError> {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ClientError::Decode {
                endpoint: endpoint.to_string(),
                source: e,
            })?;
        self.request(HttpMethod::Put, endpoint, &[], body.as_ref())
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.api_base_url, endpoint)
    }

    fn json_request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<HttpRequest, ClientError> {
        let mut request = HttpRequest::new(method, self.url(endpoint));
        request.set_header("Accept", "application/json");
        if let Some(body) = body {
            request.body = serde_json::to_vec(body).map_err(|e| ClientError::Decode {
                endpoint: endpoint.to_string(),
                source: e,
            })?;
            request.set_header("Content-Type", "application/json");
        }
        Ok(request)
    }

    fn execute(
        &mut self,
        request: HttpRequest,
        endpoint: &str,
        refresh_if_needed: bool,
    ) -> Result<HttpResponse, ClientError> {
        let method = request.method.as_str();
        tracing::info!("about to {method} request for endpoint {endpoint}");

        let mut attempt = request.clone();
        self.authorize(&mut attempt);
        let mut response = self.transport.send(attempt)?;
        tracing::debug!(status = response.status, "request finished");

        if refresh_if_needed && response.status == 401 && is_token_expired(&response) && self.refresh()? {
            tracing::debug!("retrying {method} request for endpoint {endpoint} with refreshed token");
            let mut retry = request;
            self.authorize(&mut retry);
            response = self.transport.send(retry)?;
            tracing::debug!(status = response.status, "request finished");
        }

        if !response.is_success() {
            return Err(ClientError::Request {
                method,
                endpoint: endpoint.to_string(),
                status: response.status,
                body: response.body_text(),
            });
        }
        Ok(response)
    }
}

fn is_token_expired(response: &HttpResponse) -> bool {
    serde_json::from_slice::<ErrorBody>(&response.body)
        .ok()
        .and_then(|b| b.msg)
        .is_some_and(|msg| msg == TOKEN_EXPIRED_MSG)
}

fn decode<T: DeserializeOwned>(response: &HttpResponse, endpoint: &str) -> Result<T, ClientError> {
    serde_json::from_slice(&response.body).map_err(|e| ClientError::Decode {
        endpoint: endpoint.to_string(),
        source: e,
    })
}
