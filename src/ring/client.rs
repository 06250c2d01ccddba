use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use url::Url;

use super::{
    id_from_number_or_string, DeviceId, DeviceList, Grant, LoginResponse, RingApi,
    SnapshotTimestamp,
};
use crate::auth::Session;
use crate::error::RemoteError;

const OAUTH_URL: &str = "https://oauth.ring.com/oauth/token";
const API_BASE: &str = "https://api.ring.com/clients_api/";
const CLIENT_ID: &str = "ring_official_android";
const SCOPE: &str = "client";
const API_VERSION: u32 = 11;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    grant_type: &'a str,
    scope: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Body of the 412 answer when a second factor is needed.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SecondFactorResponse {
    tsv_state: Option<String>,
    phone: Option<String>,
}

impl SecondFactorResponse {
    fn hint(self) -> String {
        self.phone
            .or(self.tsv_state)
            .unwrap_or_else(|| "your phone or e-mail".to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TimestampsResponse {
    timestamps: Vec<WireTimestamp>,
}

#[derive(Debug, Deserialize)]
struct WireTimestamp {
    #[serde(deserialize_with = "id_from_number_or_string")]
    doorbot_id: DeviceId,
    /// Epoch milliseconds.
    #[serde(default)]
    timestamp: Option<i64>,
}

impl From<WireTimestamp> for SnapshotTimestamp {
    fn from(wire: WireTimestamp) -> Self {
        SnapshotTimestamp {
            device_id: wire.doorbot_id,
            epoch_seconds: wire.timestamp.map(|ms| ms / 1000),
        }
    }
}

/// Blocking client for the Ring REST API.
pub struct RingClient {
    http: Client,
    oauth_url: Url,
    api_base: Url,
}

impl RingClient {
    pub fn new() -> Result<Self, RemoteError> {
        Self::with_endpoints(OAUTH_URL, API_BASE)
    }

    pub fn with_endpoints(oauth_url: &str, api_base: &str) -> Result<Self, RemoteError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let oauth_url = Url::parse(oauth_url).map_err(|e| RemoteError::Decode(e.to_string()))?;
        // join() drops the last segment unless the base ends with a slash
        let api_base = format!("{}/", api_base.trim_end_matches('/'));
        let api_base = Url::parse(&api_base).map_err(|e| RemoteError::Decode(e.to_string()))?;

        Ok(Self {
            http,
            oauth_url,
            api_base,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        self.api_base
            .join(path)
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    fn authorized(&self, request: RequestBuilder, session: &Session) -> RequestBuilder {
        request.bearer_auth(session.access_token())
    }

    fn request_token(
        &self,
        form: &TokenRequest<'_>,
        hardware_id: &str,
        code: Option<&str>,
    ) -> Result<LoginResponse, RemoteError> {
        debug!("POST {} ({})", self.oauth_url, form.grant_type);

        let response = self
            .http
            .post(self.oauth_url.clone())
            .header("hardware_id", hardware_id)
            .header("2fa-support", "true")
            .header("2fa-code", code.unwrap_or(""))
            .json(form)
            .send()?;

        match response.status() {
            status if status.is_success() => {
                let token: TokenResponse = response.json()?;
                self.register_session(&token.access_token, hardware_id)?;
                Ok(LoginResponse::Granted(Grant {
                    access_token: token.access_token,
                    refresh_token: token.refresh_token.unwrap_or_default(),
                }))
            }
            StatusCode::PRECONDITION_FAILED => {
                let body: SecondFactorResponse = response.json().unwrap_or_default();
                Ok(LoginResponse::SecondFactorRequired(body.hint()))
            }
            StatusCode::TOO_MANY_REQUESTS => Ok(LoginResponse::Throttled),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                let status = response.status();
                let body = response.text().unwrap_or_default();
                debug!("Token request rejected: {} - {}", status, body);
                Ok(LoginResponse::Rejected(format!("{}", status)))
            }
            _ => Err(into_error(response)),
        }
    }

    /// Announce this installation to the API; required before other calls.
    fn register_session(&self, access_token: &str, hardware_id: &str) -> Result<(), RemoteError> {
        let url = self.endpoint("session")?;
        debug!("POST {}", url);

        let body = json!({
            "device": {
                "hardware_id": hardware_id,
                "metadata": { "api_version": API_VERSION },
                "os": "android",
            }
        });

        let response = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(&body)
            .send()?;
        check(response)?;
        Ok(())
    }
}

impl RingApi for RingClient {
    fn authenticate(
        &self,
        username: &str,
        password: &str,
        hardware_id: &str,
    ) -> Result<LoginResponse, RemoteError> {
        let form = TokenRequest {
            client_id: CLIENT_ID,
            grant_type: "password",
            scope: SCOPE,
            username: Some(username),
            password: Some(password),
            refresh_token: None,
        };
        self.request_token(&form, hardware_id, None)
    }

    fn authenticate_by_refresh_token(
        &self,
        refresh_token: &str,
        hardware_id: &str,
    ) -> Result<LoginResponse, RemoteError> {
        let form = TokenRequest {
            client_id: CLIENT_ID,
            grant_type: "refresh_token",
            scope: SCOPE,
            username: None,
            password: None,
            refresh_token: Some(refresh_token),
        };
        self.request_token(&form, hardware_id, None)
    }

    fn submit_second_factor(
        &self,
        username: &str,
        password: &str,
        hardware_id: &str,
        code: &str,
    ) -> Result<LoginResponse, RemoteError> {
        let form = TokenRequest {
            client_id: CLIENT_ID,
            grant_type: "password",
            scope: SCOPE,
            username: Some(username),
            password: Some(password),
            refresh_token: None,
        };
        self.request_token(&form, hardware_id, Some(code))
    }

    fn list_devices(&self, session: &Session) -> Result<DeviceList, RemoteError> {
        let url = self.endpoint("ring_devices")?;
        debug!("GET {}", url);

        let response = self.authorized(self.http.get(url), session).send()?;
        Ok(check(response)?.json()?)
    }

    fn trigger_capture(&self, session: &Session, device_id: DeviceId) -> Result<(), RemoteError> {
        let url = self.endpoint("snapshots/update_all")?;
        debug!("PUT {} (device {})", url, device_id);

        let body = json!({ "doorbot_ids": [device_id], "refresh": true });
        let response = self
            .authorized(self.http.put(url), session)
            .json(&body)
            .send()?;
        check(response)?;
        Ok(())
    }

    fn fetch_latest_timestamps(
        &self,
        session: &Session,
        device_id: DeviceId,
    ) -> Result<Vec<SnapshotTimestamp>, RemoteError> {
        let url = self.endpoint("snapshots/timestamps")?;
        debug!("POST {} (device {})", url, device_id);

        let body = json!({ "doorbot_ids": [device_id] });
        let response = self
            .authorized(self.http.post(url), session)
            .json(&body)
            .send()?;
        let parsed: TimestampsResponse = check(response)?.json()?;
        Ok(parsed.timestamps.into_iter().map(Into::into).collect())
    }

    fn fetch_image(&self, session: &Session, device_id: DeviceId) -> Result<Vec<u8>, RemoteError> {
        let url = self.endpoint(&format!("snapshots/image/{}", device_id))?;
        debug!("GET {}", url);

        let response = self.authorized(self.http.get(url), session).send()?;
        let bytes = check(response)?.bytes()?;
        Ok(bytes.to_vec())
    }
}

fn check(response: Response) -> Result<Response, RemoteError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(into_error(response))
    }
}

fn into_error(response: Response) -> RemoteError {
    let status = response.status();
    let url = response.url().to_string();

    if status == StatusCode::NOT_FOUND {
        return RemoteError::NotFound(url);
    }

    let body = response.text().unwrap_or_default();
    debug!("{} failed: {} - {}", url, status, body);
    RemoteError::Status {
        status: status.as_u16(),
        body,
    }
}
