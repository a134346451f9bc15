use std::thread::sleep;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Remote state of a title on the target wiki.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Missing,
    Redirect,
    Exists,
}

impl PageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Redirect => "redirect",
            Self::Exists => "exists",
        }
    }
}

/// Read and write operations the reconciler needs from the target wiki.
pub trait RemoteWikiGateway {
    fn page_status(&mut self, title: &str) -> Result<PageStatus>;
    /// Create `title` as a redirect to `origin_title` on the source wiki.
    /// Without `replace_redirect` the edit is create-only and fails if any
    /// page, redirects included, already sits at `title`.
    fn create_redirect(
        &mut self,
        title: &str,
        origin_title: &str,
        replace_redirect: bool,
    ) -> Result<bool>;
    fn move_page(&mut self, from: &str, to: &str) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Endpoint with the target language already substituted.
    pub api_url: String,
    pub credentials: GatewayCredentials,
    pub source_language: String,
    pub create_summary: String,
    pub move_summary: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub rate_limit_read_ms: u64,
    pub rate_limit_write_ms: u64,
    pub max_retries: usize,
    pub max_write_retries: usize,
    pub retry_delay_ms: u64,
}

impl GatewayConfig {
    pub fn redirect_content(&self, origin_title: &str) -> String {
        format!("#REDIRECT [[:{}:{}]]", self.source_language, origin_title)
    }
}

/// MediaWiki Action API client bound to one target-language wiki.
pub struct MediaWikiGateway {
    client: Client,
    config: GatewayConfig,
    last_request_at: Option<Instant>,
    request_count: usize,
    csrf_token: Option<String>,
}

impl MediaWikiGateway {
    /// Build the client and log in once; the session cookie is reused for every call.
    pub fn connect(config: GatewayConfig) -> Result<Self> {
        let mut gateway = Self::new(config)?;
        let GatewayCredentials { username, password } = gateway.config.credentials.clone();
        gateway
            .login(&username, &password)
            .with_context(|| format!("failed to log in to {}", gateway.config.api_url))?;
        Ok(gateway)
    }

    fn new(config: GatewayConfig) -> Result<Self> {
        Url::parse(&config.api_url)
            .with_context(|| format!("invalid target wiki API URL: {}", config.api_url))?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .cookie_store(true)
            .build()
            .context("failed to build MediaWiki HTTP client")?;

        Ok(Self {
            client,
            config,
            last_request_at: None,
            request_count: 0,
            csrf_token: None,
        })
    }

    pub fn request_count(&self) -> usize {
        self.request_count
    }

    fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let token_response = self.request_json_get(&[
            ("action", "query".to_string()),
            ("meta", "tokens".to_string()),
            ("type", "login".to_string()),
        ])?;
        let token_payload: TokenQueryResponse = serde_json::from_value(token_response)
            .context("failed to decode login token response")?;
        let login_token = token_payload
            .query
            .tokens
            .and_then(|tokens| tokens.logintoken)
            .ok_or_else(|| anyhow::anyhow!("failed to get MediaWiki login token"))?;

        let login_response = self.request_json_post(
            &[
                ("action", "login".to_string()),
                ("lgname", username.to_string()),
                ("lgpassword", password.to_string()),
                ("lgtoken", login_token),
            ],
            true,
        )?;
        let login_payload: LoginResponse =
            serde_json::from_value(login_response).context("failed to decode login response")?;
        match login_payload.login.result.as_deref() {
            Some("Success") => {
                self.csrf_token = None;
                debug!(api_url = %self.config.api_url, "logged in to target wiki");
                Ok(())
            }
            other => bail!(
                "MediaWiki login failed: {}",
                login_payload
                    .login
                    .reason
                    .or_else(|| other.map(ToString::to_string))
                    .unwrap_or_else(|| "unknown error".to_string())
            ),
        }
    }

    fn ensure_csrf_token(&mut self) -> Result<String> {
        if let Some(token) = &self.csrf_token {
            return Ok(token.clone());
        }
        let response = self.request_json_get(&[
            ("action", "query".to_string()),
            ("meta", "tokens".to_string()),
        ])?;
        let parsed: TokenQueryResponse =
            serde_json::from_value(response).context("failed to decode csrf token response")?;
        let token = parsed
            .query
            .tokens
            .and_then(|tokens| tokens.csrftoken)
            .ok_or_else(|| anyhow::anyhow!("failed to get MediaWiki csrf token"))?;
        self.csrf_token = Some(token.clone());
        Ok(token)
    }

    fn request_json_get(&mut self, params: &[(&str, String)]) -> Result<Value> {
        let base_url = Url::parse(&self.config.api_url)
            .with_context(|| format!("invalid target wiki API URL: {}", self.config.api_url))?;
        let pairs = api_pairs(params);

        for attempt in 0..=self.config.max_retries {
            self.apply_rate_limit(false);
            let response = self
                .client
                .get(base_url.clone())
                .header("User-Agent", self.config.user_agent.clone())
                .query(&pairs)
                .send();

            match response {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        if attempt < self.config.max_retries && is_retryable_status(status) {
                            self.wait_before_retry(attempt, false);
                            continue;
                        }
                        bail!("MediaWiki API request failed with HTTP {status}");
                    }
                    let payload: Value = response
                        .json()
                        .context("failed to decode MediaWiki API JSON response")?;
                    return check_api_error(payload);
                }
                Err(error) => {
                    if attempt < self.config.max_retries && is_retryable_error(&error) {
                        self.wait_before_retry(attempt, false);
                        continue;
                    }
                    return Err(error).context("failed to call MediaWiki API");
                }
            }
        }

        bail!("MediaWiki API request exhausted retry budget")
    }

    fn request_json_post(&mut self, params: &[(&str, String)], is_write: bool) -> Result<Value> {
        let max_retries = if is_write {
            self.config.max_write_retries
        } else {
            self.config.max_retries
        };
        let pairs = api_pairs(params);

        for attempt in 0..=max_retries {
            self.apply_rate_limit(is_write);
            let response = self
                .client
                .post(&self.config.api_url)
                .header("User-Agent", self.config.user_agent.clone())
                .form(&pairs)
                .send();

            match response {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        if attempt < max_retries && is_retryable_status(status) {
                            self.wait_before_retry(attempt, is_write);
                            continue;
                        }
                        bail!("MediaWiki API request failed with HTTP {status}");
                    }
                    let payload: Value = response
                        .json()
                        .context("failed to decode MediaWiki API JSON response")?;
                    return check_api_error(payload);
                }
                Err(error) => {
                    if attempt < max_retries && is_retryable_error(&error) {
                        self.wait_before_retry(attempt, is_write);
                        continue;
                    }
                    return Err(error).context("failed to call MediaWiki API");
                }
            }
        }

        bail!("MediaWiki API request exhausted retry budget")
    }

    fn apply_rate_limit(&mut self, is_write: bool) {
        let delay = if is_write {
            Duration::from_millis(self.config.rate_limit_write_ms)
        } else {
            Duration::from_millis(self.config.rate_limit_read_ms)
        };
        if let Some(last) = self.last_request_at {
            let elapsed = last.elapsed();
            if elapsed < delay {
                sleep(delay - elapsed);
            }
        }
        self.last_request_at = Some(Instant::now());
        self.request_count += 1;
    }

    fn wait_before_retry(&self, attempt: usize, is_write: bool) {
        let exponent = u32::try_from(attempt).unwrap_or(16);
        let base = self
            .config
            .retry_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent));
        let jitter = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| u64::from(duration.subsec_millis() % 100))
            .unwrap_or(0);
        let multiplier = if is_write { 2u64 } else { 1u64 };
        sleep(Duration::from_millis(
            base.saturating_mul(multiplier).saturating_add(jitter),
        ));
    }
}

impl RemoteWikiGateway for MediaWikiGateway {
    fn page_status(&mut self, title: &str) -> Result<PageStatus> {
        debug!(title, "querying target wiki page status");
        let response = self.request_json_get(&[
            ("action", "query".to_string()),
            ("titles", title.to_string()),
            ("prop", "info".to_string()),
        ])?;
        parse_page_status(response, title)
    }

    fn create_redirect(
        &mut self,
        title: &str,
        origin_title: &str,
        replace_redirect: bool,
    ) -> Result<bool> {
        let token = self.ensure_csrf_token()?;
        let content = self.config.redirect_content(origin_title);
        debug!(title, origin_title, replace_redirect, "creating redirect on target wiki");
        let mut params = vec![
            ("action", "edit".to_string()),
            ("title", title.to_string()),
            ("text", content),
            ("summary", self.config.create_summary.clone()),
            ("notminor", "1".to_string()),
            ("bot", "1".to_string()),
        ];
        if !replace_redirect {
            params.push(("createonly", "1".to_string()));
        }
        params.push(("token", token));
        let response = self.request_json_post(&params, true)?;
        let payload: EditResponse =
            serde_json::from_value(response).context("failed to decode edit response")?;
        Ok(payload
            .edit
            .and_then(|edit| edit.result)
            .is_some_and(|result| result == "Success"))
    }

    fn move_page(&mut self, from: &str, to: &str) -> Result<bool> {
        let token = self.ensure_csrf_token()?;
        debug!(from, to, "moving redirect on target wiki");
        let response = self.request_json_post(
            &[
                ("action", "move".to_string()),
                ("from", from.to_string()),
                ("to", to.to_string()),
                ("reason", self.config.move_summary.clone()),
                ("token", token),
            ],
            true,
        )?;
        let payload: MoveResponse =
            serde_json::from_value(response).context("failed to decode move response")?;
        Ok(payload.moved.is_some_and(|moved| moved.to.is_some()))
    }
}

/// `redirect` marker wins, then `missing`; anything else is a real page.
pub fn parse_page_status(response: Value, title: &str) -> Result<PageStatus> {
    let parsed: QueryResponse =
        serde_json::from_value(response).context("failed to decode page info response")?;
    let page = parsed
        .query
        .pages
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("page info response has no pages for {title}"))?;
    if page.invalid {
        bail!(
            "target wiki rejected title {title}: {}",
            page.invalidreason.unwrap_or_else(|| "invalid title".to_string())
        );
    }
    if page.redirect {
        return Ok(PageStatus::Redirect);
    }
    if page.missing {
        return Ok(PageStatus::Missing);
    }
    Ok(PageStatus::Exists)
}

fn api_pairs(params: &[(&str, String)]) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(params.len() + 2);
    pairs.push(("format".to_string(), "json".to_string()));
    pairs.push(("formatversion".to_string(), "2".to_string()));
    for (key, value) in params {
        if !value.is_empty() {
            pairs.push(((*key).to_string(), value.clone()));
        }
    }
    pairs
}

fn check_api_error(payload: Value) -> Result<Value> {
    if let Some(error) = payload.get("error") {
        let code = error
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        let info = error
            .get("info")
            .and_then(Value::as_str)
            .unwrap_or("unknown info");
        bail!("MediaWiki API error [{code}]: {info}");
    }
    Ok(payload)
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

#[derive(Debug, Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    query: QueryPayload,
}

#[derive(Debug, Deserialize, Default)]
struct QueryPayload {
    #[serde(default)]
    pages: Vec<PageInfoItem>,
}

#[derive(Debug, Deserialize)]
struct PageInfoItem {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    redirect: bool,
    #[serde(default)]
    invalid: bool,
    invalidreason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TokenQueryResponse {
    #[serde(default)]
    query: TokenQueryPayload,
}

#[derive(Debug, Deserialize, Default)]
struct TokenQueryPayload {
    tokens: Option<TokenPayload>,
}

#[derive(Debug, Deserialize, Default)]
struct TokenPayload {
    logintoken: Option<String>,
    csrftoken: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct LoginResponse {
    #[serde(default)]
    login: LoginPayload,
}

#[derive(Debug, Deserialize, Default)]
struct LoginPayload {
    result: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct EditResponse {
    edit: Option<EditPayload>,
}

#[derive(Debug, Deserialize, Default)]
struct EditPayload {
    result: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct MoveResponse {
    #[serde(rename = "move")]
    moved: Option<MovePayload>,
}

#[derive(Debug, Deserialize, Default)]
struct MovePayload {
    to: Option<String>,
}
