use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::ListingEntry;

pub const JSON_BASE_URL: &str = "https://slackmojis.com";
pub const ASSET_BASE_URL: &str = "https://emojis.slackmojis.com";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub json_base: String,
    pub asset_base: String,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            json_base: JSON_BASE_URL.to_string(),
            asset_base: ASSET_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("mojimirror/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http status {0}")]
    Status(u16),
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("unparseable listing body: {0}")]
    Parse(#[source] reqwest::Error),
}

/// Transport against the catalog hosts. Stateless per call beyond the pooled
/// connections; retry policy belongs to the caller.
pub struct ListingClient {
    http: reqwest::Client,
    json_base: Url,
    asset_base: Url,
}

impl ListingClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ClientError> {
        let json_base = parse_base(&settings.json_base)?;
        let asset_base = parse_base(&settings.asset_base)?;
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent)
            .build()
            .map_err(ClientError::Network)?;
        Ok(Self {
            http,
            json_base,
            asset_base,
        })
    }

    /// Fetch one page of catalog entries. An empty array is the remote's
    /// end-of-data signal for that index, not an error.
    pub async fn fetch_page(&self, page: u64) -> Result<Vec<ListingEntry>, ClientError> {
        let mut target = self
            .json_base
            .join("/emojis.json")
            .map_err(|err| ClientError::InvalidUrl(err.to_string()))?;
        target
            .query_pairs_mut()
            .append_pair("page", &page.to_string());
        let response = self
            .http
            .get(target)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }
        response
            .json::<Vec<ListingEntry>>()
            .await
            .map_err(map_reqwest_error)
    }

    /// Open a streaming GET for one asset; the caller drains the body. The
    /// listing embeds asset URLs on a separate host, so only the path and
    /// query of `raw` are kept and rebased onto the asset host.
    pub async fn fetch_asset(&self, raw: &str) -> Result<reqwest::Response, ClientError> {
        let target = self.rebase_asset_url(raw)?;
        let response = self
            .http
            .get(target)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }
        Ok(response)
    }

    /// GET an arbitrary absolute URL and parse the body as JSON. Used for the
    /// best-effort resume-hint document.
    pub async fn get_json(&self, raw: &str) -> Result<serde_json::Value, ClientError> {
        let target = Url::parse(raw).map_err(|err| ClientError::InvalidUrl(err.to_string()))?;
        let response = self
            .http
            .get(target)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }
        response
            .json::<serde_json::Value>()
            .await
            .map_err(map_reqwest_error)
    }

    fn rebase_asset_url(&self, raw: &str) -> Result<Url, ClientError> {
        match Url::parse(raw) {
            Ok(parsed) => {
                let mut target = self.asset_base.clone();
                target.set_path(parsed.path());
                target.set_query(parsed.query());
                Ok(target)
            }
            Err(_) => self
                .asset_base
                .join(raw)
                .map_err(|err| ClientError::InvalidUrl(err.to_string())),
        }
    }
}

fn parse_base(raw: &str) -> Result<Url, ClientError> {
    Url::parse(raw).map_err(|err| ClientError::InvalidUrl(format!("{raw}: {err}")))
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else if err.is_decode() {
        ClientError::Parse(err)
    } else {
        ClientError::Network(err)
    }
}
