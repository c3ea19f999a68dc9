use crate::config::{ApiConfig, Config, LegacyConfig};
use crate::dlog;
use crate::error::{Error, Result};
use crate::legacy::LegacySessionClient;
use crate::transport::{HttpTransport, Request, Response, Transport};
use crate::utils::parse_base_url;
use crate::workouts::Workouts;
use reqwest::Method;
use serde_json::{Value as JsonValue, json};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

pub const CSRF_COOKIE: &str = "CSRF_TOKEN";
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";
/// Placeholder the site itself sends before any token has been issued.
const INITIAL_CSRF: &str = "-first-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated { user_id: u64 },
}

struct Credentials {
    email: String,
    password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Cookie-authenticated session against the REST API.
///
/// Every mutating call first re-harvests the rotating anti-forgery token
/// from the profile page, then sends it both as a cookie and a header.
/// Credentials stay in memory so the legacy session can be bootstrapped on demand.
pub struct SessionClient<T = HttpTransport> {
    transport: T,
    base_url: Url,
    legacy_config: LegacyConfig,
    state: SessionState,
    csrf: String,
    cookies: BTreeMap<String, String>,
    credentials: Option<Credentials>,
    legacy: Option<LegacySessionClient<T>>,
}

impl SessionClient<HttpTransport> {
    pub fn new(cfg: &Config) -> Result<Self> {
        let transport = HttpTransport::new(cfg.timeout())?;
        Self::with_transport(transport, &cfg.api, cfg.legacy.clone())
    }
}

impl<T: Transport + Clone> SessionClient<T> {
    pub fn with_transport(transport: T, api: &ApiConfig, legacy: LegacyConfig) -> Result<Self> {
        Ok(Self {
            transport,
            base_url: parse_base_url(&api.base_url)?,
            legacy_config: legacy,
            state: SessionState::Anonymous,
            csrf: INITIAL_CSRF.to_string(),
            cookies: BTreeMap::new(),
            credentials: None,
            legacy: None,
        })
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub const fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    pub const fn user_id(&self) -> Option<u64> {
        match self.state {
            SessionState::Authenticated { user_id } => Some(user_id),
            SessionState::Anonymous => None,
        }
    }

    /// Workout operations bound to this session.
    pub fn workouts(&mut self) -> Workouts<'_, T> {
        Workouts::new(self)
    }

    /// Opens a session and returns the backend's session object.
    pub fn login(&mut self, email: &str, password: &str) -> Result<JsonValue> {
        let url = self.base_url.join("rest/session")?;
        let body = json!({
            "email": email,
            "password": password,
            "remember": true,
        });

        let csrf = self.csrf.clone();
        let resp = self.send_json(Method::POST, url, Some(&body), &csrf)?;
        if !resp.is_success() {
            return Err(Error::Authentication(format!(
                "status {}: {}",
                resp.status, resp.body
            )));
        }

        let session: JsonValue = serde_json::from_str(&resp.body).map_err(|e| {
            Error::Authentication(format!("unreadable session response ({e}): {}", resp.body))
        })?;
        let user_id = session
            .get("id")
            .and_then(|v| v.as_u64().or_else(|| v.as_str()?.parse().ok()))
            .ok_or_else(|| Error::Authentication(format!("no user id in response: {}", resp.body)))?;

        self.state = SessionState::Authenticated { user_id };
        self.credentials = Some(Credentials {
            email: email.to_string(),
            password: password.to_string(),
        });
        self.legacy = None;

        tracing::info!(user_id, "logged in");
        Ok(session)
    }

    /// Current session object; works anonymously too.
    pub fn user_info(&mut self) -> Result<JsonValue> {
        let url = self.base_url.join("session")?;
        let csrf = self.csrf.clone();
        let resp = self.send_json(Method::GET, url, None, &csrf)?;
        decode(resp)
    }

    /// GET `rest/v1/users/{id}/{path}`.
    pub fn get(&mut self, path: &str, query: &[(&str, &str)]) -> Result<JsonValue> {
        let mut url = self.user_url(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        let csrf = self.csrf.clone();
        let resp = self.send_json(Method::GET, url, None, &csrf)?;
        decode(resp)
    }

    pub fn put(&mut self, path: &str, body: &JsonValue) -> Result<JsonValue> {
        self.mutate(Method::PUT, path, Some(body))
    }

    pub fn post(&mut self, path: &str, body: &JsonValue) -> Result<JsonValue> {
        self.mutate(Method::POST, path, Some(body))
    }

    pub fn delete(&mut self, path: &str) -> Result<JsonValue> {
        self.mutate(Method::DELETE, path, None)
    }

    fn mutate(&mut self, method: Method, path: &str, body: Option<&JsonValue>) -> Result<JsonValue> {
        let url = self.user_url(path)?;
        let csrf = self.refresh_csrf()?;
        let resp = self.send_json(method, url, body, &csrf)?;
        decode(resp)
    }

    /// Loads the profile page to pick up a fresh `CSRF_TOKEN` cookie and returns it.
    pub fn refresh_csrf(&mut self) -> Result<String> {
        let user_id = self.user_id().ok_or(Error::NotAuthenticated)?;
        let url = self.base_url.join(&format!("users/{user_id}"))?;

        let resp = self.transport.send(Request::new(Method::GET, url).header(
            "Cookie",
            self.cookie_header(&self.csrf),
        ))?;
        if !resp.is_success() {
            return Err(Error::Api {
                status: resp.status,
                body: resp.body,
            });
        }
        self.absorb_cookies(&resp);

        match resp.cookie(CSRF_COOKIE) {
            Some(token) => {
                dlog!("csrf token refreshed");
                self.csrf = token.to_string();
            }
            None => tracing::warn!(status = resp.status, "profile page did not rotate csrf token"),
        }
        Ok(self.csrf.clone())
    }

    /// Lazily built legacy session, authenticated with the login credentials.
    pub fn legacy_api(&mut self) -> Result<&mut LegacySessionClient<T>> {
        if self.legacy.is_none() {
            let creds = self.credentials.as_ref().ok_or(Error::NotAuthenticated)?;
            let mut legacy = LegacySessionClient::new(self.transport.clone(), &self.legacy_config)?;
            legacy.request_auth_token(&creds.email, &creds.password)?;
            self.legacy = Some(legacy);
        }
        self.legacy.as_mut().ok_or(Error::NotAuthenticated)
    }

    /// Drops the cached legacy session; the next `legacy_api` call re-authenticates.
    pub fn reset_legacy(&mut self) {
        self.legacy = None;
    }

    fn user_url(&self, path: &str) -> Result<Url> {
        let user_id = self.user_id().ok_or(Error::NotAuthenticated)?;
        let path = path.trim_start_matches('/');
        Ok(self.base_url.join(&format!("rest/v1/users/{user_id}/{path}"))?)
    }

    fn send_json(
        &mut self,
        method: Method,
        url: Url,
        body: Option<&JsonValue>,
        csrf: &str,
    ) -> Result<Response> {
        dlog!("{method} {url}");
        let mut req = Request::new(method, url)
            .header("Content-Type", "application/json")
            .header("Cookie", self.cookie_header(csrf))
            .header(CSRF_HEADER, csrf);
        if let Some(body) = body {
            req = req.json_body(body.to_string());
        }

        let resp = self.transport.send(req)?;
        self.absorb_cookies(&resp);
        Ok(resp)
    }

    fn absorb_cookies(&mut self, resp: &Response) {
        for raw in &resp.set_cookies {
            if let Some((name, value)) = crate::transport::parse_set_cookie(raw)
                && name != CSRF_COOKIE
            {
                self.cookies.insert(name.to_string(), value.to_string());
            }
        }
    }

    fn cookie_header(&self, csrf: &str) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .chain(std::iter::once(format!("{CSRF_COOKIE}={csrf}")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Non-2xx or non-JSON bodies become `Error::Api`; an empty 2xx body is `Null`.
fn decode(resp: Response) -> Result<JsonValue> {
    if !resp.is_success() {
        return Err(Error::Api {
            status: resp.status,
            body: resp.body,
        });
    }
    if resp.body.trim().is_empty() {
        return Ok(JsonValue::Null);
    }
    serde_json::from_str(&resp.body).map_err(|_| Error::Api {
        status: resp.status,
        body: resp.body,
    })
}
