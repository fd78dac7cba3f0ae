// API client module: contains a small blocking HTTP client that talks to
// the rentry.co pastebin service. One `RentryClient` is one session: the
// constructor performs the CSRF handshake, and every call after that
// reuses the same cookie jar and token.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::REFERER;
use serde::Deserialize;
use serde_json::Value;

/// Where the service lives. Passed explicitly to the session constructor;
/// the library never reads the environment on its own.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Scheme including the separator, e.g. `https://`.
    pub protocol: String,
    /// Host (and optional port), e.g. `rentry.co`.
    pub host: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            protocol: "https://".into(),
            host: "rentry.co".into(),
        }
    }
}

impl ServiceConfig {
    /// Build a config from the environment variables `BASE_PROTOCOL` and
    /// `BASE_URL`, falling back to the rentry.co defaults.
    pub fn from_env() -> Self {
        let defaults = ServiceConfig::default();
        ServiceConfig {
            protocol: std::env::var("BASE_PROTOCOL").unwrap_or(defaults.protocol),
            host: std::env::var("BASE_URL").unwrap_or(defaults.host),
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}{}", self.protocol, self.host)
    }
}

/// Parameters for creating an entry. Fields left empty are omitted from
/// the request body entirely, which makes the service pick a random slug
/// or edit code.
#[derive(Debug, Default, Clone)]
pub struct NewEntry {
    pub text: String,
    pub url: String,
    pub edit_code: String,
    pub metadata: String,
}

/// Parameters for editing an entry. `metadata` and `update_mode` are
/// omitted from the request body when empty.
#[derive(Debug, Default, Clone)]
pub struct EditEntry {
    pub edit_code: String,
    pub text: String,
    pub metadata: String,
    pub update_mode: String,
}

/// Successful create reply.
#[derive(Debug)]
pub struct Created {
    pub url: String,
    pub edit_code: String,
}

/// Decoded service reply: either the operation's payload or the error
/// report the service attached to a non-"200" status. A failure reply is
/// normal data the caller branches on; only transport and protocol
/// problems surface as `Err`.
#[derive(Debug)]
pub enum ApiReply<T> {
    Success(T),
    Failure(ServiceError),
}

/// Error report from a non-"200" service reply.
#[derive(Debug)]
pub struct ServiceError {
    /// Application-level status. The service sends this as a string
    /// (e.g. `"400"`), distinct from the transport HTTP status code.
    pub status: String,
    pub content: String,
    /// Raw `errors` field, a `.`-delimited list of sub-messages.
    pub errors: Option<String>,
}

impl ServiceError {
    /// The non-empty `.`-separated pieces of the `errors` field. A missing
    /// or malformed field yields no sub-messages.
    pub fn sub_messages(&self) -> Vec<&str> {
        self.errors
            .as_deref()
            .map(|e| e.split('.').filter(|part| !part.is_empty()).collect())
            .unwrap_or_default()
    }
}

/// Shape of every JSON reply the service sends. Which fields are present
/// depends on the operation and on whether it succeeded.
#[derive(Debug, Deserialize)]
struct WireReply {
    status: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    edit_code: Option<String>,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    errors: Option<Value>,
}

impl WireReply {
    fn into_failure(self) -> ServiceError {
        ServiceError {
            status: self.status,
            content: match self.content {
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => String::new(),
            },
            // Anything other than a plain string means there are no
            // sub-messages to report.
            errors: match self.errors {
                Some(Value::String(s)) => Some(s),
                _ => None,
            },
        }
    }
}

/// A session with the rentry service: a cookie-keeping blocking client
/// plus the CSRF token obtained during the handshake. Not synchronized;
/// concurrent callers should each establish their own session.
#[derive(Debug, Clone)]
pub struct RentryClient {
    http: Client,
    base_url: String,
    csrf_token: String,
}

impl RentryClient {
    /// Establish a session. Performs the CSRF handshake once: GET the base
    /// URL (with a same-origin Referer, which the service's CSRF middleware
    /// requires) and pull the `csrftoken` cookie out of the response. The
    /// cookie jar is kept for all subsequent calls; the token is resent
    /// explicitly in every mutating request body because the service reads
    /// it from the form field, not the cookie.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let base_url = config.base_url();
        let http = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        let res = http
            .get(&base_url)
            .header(REFERER, &base_url)
            .send()
            .context("Failed to reach the rentry service")?;
        let csrf_token = res
            .cookies()
            .find(|cookie| cookie.name() == "csrftoken")
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| anyhow!("CSRF token not found"))?;

        Ok(RentryClient {
            http,
            base_url,
            csrf_token,
        })
    }

    /// Create a new entry.
    pub fn create(&self, params: &NewEntry) -> Result<ApiReply<Created>> {
        let mut form = vec![
            ("csrfmiddlewaretoken", self.csrf_token.as_str()),
            ("text", params.text.as_str()),
        ];
        push_optional(&mut form, "url", &params.url);
        push_optional(&mut form, "edit_code", &params.edit_code);
        push_optional(&mut form, "metadata", &params.metadata);

        let reply = self.post_form("/api/new", &form)?;
        if reply.status != "200" {
            return Ok(ApiReply::Failure(reply.into_failure()));
        }
        let url = reply
            .url
            .context("Service reply is missing the url field")?;
        let edit_code = reply
            .edit_code
            .context("Service reply is missing the edit_code field")?;
        Ok(ApiReply::Success(Created { url, edit_code }))
    }

    /// Edit an existing entry.
    pub fn edit(&self, slug: &str, params: &EditEntry) -> Result<ApiReply<()>> {
        let mut form = vec![
            ("csrfmiddlewaretoken", self.csrf_token.as_str()),
            ("edit_code", params.edit_code.as_str()),
            ("text", params.text.as_str()),
        ];
        push_optional(&mut form, "metadata", &params.metadata);
        push_optional(&mut form, "update_mode", &params.update_mode);

        let reply = self.post_form(&format!("/api/edit/{slug}"), &form)?;
        if reply.status != "200" {
            return Ok(ApiReply::Failure(reply.into_failure()));
        }
        Ok(ApiReply::Success(()))
    }

    /// Get the raw markdown text of an entry. The only operation without
    /// the CSRF token; it may carry a caller-supplied `rentry-auth` header
    /// instead.
    pub fn raw(&self, slug: &str, auth: Option<&str>) -> Result<ApiReply<String>> {
        let mut req = self
            .http
            .get(format!("{}/api/raw/{}", self.base_url, slug))
            .header(REFERER, &self.base_url);
        if let Some(auth) = auth {
            req = req.header("rentry-auth", auth);
        }
        let res = req.send().context("Failed to send the raw request")?;
        let reply: WireReply = res
            .json()
            .context("Failed to decode the service response")?;
        if reply.status != "200" {
            return Ok(ApiReply::Failure(reply.into_failure()));
        }
        match reply.content {
            Some(Value::String(text)) => Ok(ApiReply::Success(text)),
            _ => Err(anyhow!("Service reply is missing the content field")),
        }
    }

    /// Fetch the details of an entry. `content` is a structured mapping
    /// the service defines; it is passed through undecoded.
    pub fn fetch(&self, slug: &str, edit_code: &str) -> Result<ApiReply<Value>> {
        let form = [
            ("csrfmiddlewaretoken", self.csrf_token.as_str()),
            ("edit_code", edit_code),
        ];
        let reply = self.post_form(&format!("/api/fetch/{slug}"), &form)?;
        if reply.status != "200" {
            return Ok(ApiReply::Failure(reply.into_failure()));
        }
        let content = reply
            .content
            .context("Service reply is missing the content field")?;
        Ok(ApiReply::Success(content))
    }

    /// Delete an entry.
    pub fn delete(&self, slug: &str, edit_code: &str) -> Result<ApiReply<()>> {
        let form = [
            ("csrfmiddlewaretoken", self.csrf_token.as_str()),
            ("edit_code", edit_code),
        ];
        let reply = self.post_form(&format!("/api/delete/{slug}"), &form)?;
        if reply.status != "200" {
            return Ok(ApiReply::Failure(reply.into_failure()));
        }
        Ok(ApiReply::Success(()))
    }

    /// POST a url-encoded form and decode the JSON reply. The body is
    /// decoded regardless of the transport status code; status handling
    /// happens on the reply's own `status` string.
    fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<WireReply> {
        let res = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header(REFERER, &self.base_url)
            .form(form)
            .send()
            .with_context(|| format!("Failed to send the request to {path}"))?;
        res.json().context("Failed to decode the service response")
    }
}

/// Append a form field only when its value is non-empty. The service
/// treats an absent field differently from an empty one (absent `url`
/// means "generate a random slug").
fn push_optional<'a>(form: &mut Vec<(&'a str, &'a str)>, name: &'a str, value: &'a str) {
    if !value.is_empty() {
        form.push((name, value));
    }
}
