use crate::error::Result;
use reqwest::Method;
use reqwest::header::SET_COOKIE;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<String>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn json_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    /// Raw `Set-Cookie` header values, in arrival order.
    pub set_cookies: Vec<String>,
    pub body: String,
}

impl Response {
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Value of the named cookie if the response set it.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.set_cookies
            .iter()
            .filter_map(|c| parse_set_cookie(c))
            .filter(|(n, _)| *n == name)
            .map(|(_, v)| v)
            .last()
    }
}

/// `NAME=VALUE; Path=/; HttpOnly` -> `(NAME, VALUE)`.
pub fn parse_set_cookie(raw: &str) -> Option<(&str, &str)> {
    let pair = raw.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim().trim_matches('"')))
}

/// One blocking request/response exchange. Both session types talk through this.
pub trait Transport {
    fn send(&self, req: Request) -> Result<Response>;
}

/// Production transport backed by `reqwest`'s blocking client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, req: Request) -> Result<Response> {
        tracing::trace!(method = %req.method, url = %redacted(&req.url), "http request");

        let mut builder = self.client.request(req.method, req.url);
        for (name, value) in req.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        let resp = builder.send()?;
        let status = resp.status().as_u16();
        let set_cookies = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_owned)
            .collect();
        let body = resp.text()?;

        tracing::trace!(status, bytes = body.len(), "http response");
        Ok(Response {
            status,
            set_cookies,
            body,
        })
    }
}

/// URL without its query string; legacy calls carry credentials there.
pub fn redacted(url: &Url) -> String {
    let mut u = url.clone();
    u.set_query(None);
    u.to_string()
}
