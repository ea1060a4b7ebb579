//! HTTP access for manifests and segments
//!
//! Redirects are followed explicitly, one hop at a time, so each hop is
//! logged and the hop limit comes from configuration rather than from the
//! client's built-in policy.

use reqwest::{header::LOCATION, redirect, Client, Response};
use tokio::time::Duration;
use tracing::{debug, trace};
use url::Url;

use crate::error::{HlsError, Result};

const DEFAULT_USER_AGENT: &str = concat!("PMOVoice/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of redirect hops followed per request
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Default longest wait for the next bytes of a response
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// GET client shared by manifest resolution and segment downloads
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_redirects: usize,
}

impl HttpFetcher {
    /// Builds a fetcher with its own client and the default read timeout
    pub fn new(max_redirects: usize) -> Result<Self> {
        Self::with_read_timeout(max_redirects, DEFAULT_READ_TIMEOUT)
    }

    /// Builds a fetcher whose requests fail once the server stays silent
    /// for `read_timeout`, headers or body alike
    pub fn with_read_timeout(max_redirects: usize, read_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(read_timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self::with_client(client, max_redirects))
    }

    /// Wraps an existing client
    ///
    /// The client must be built with `redirect::Policy::none()`, otherwise
    /// reqwest follows redirects before this fetcher sees them.
    pub fn with_client(client: Client, max_redirects: usize) -> Self {
        Self {
            client,
            max_redirects,
        }
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    /// Issues a GET and follows redirects until a final response
    ///
    /// Returns the response with its body unread. Non-success final statuses
    /// become [`HlsError::Status`].
    pub async fn get(&self, url: &Url) -> Result<Response> {
        let mut current = url.clone();

        for hop in 0..=self.max_redirects {
            trace!(url = %current, hop, "GET");
            let response = self.client.get(current.clone()).send().await?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| {
                        HlsError::Redirect(format!(
                            "{} answered {} without a Location header",
                            current, status
                        ))
                    })?;
                let next = current.join(location)?;
                debug!(from = %current, to = %next, status = status.as_u16(), hop, "Following redirect");
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(HlsError::Status {
                    url: current.to_string(),
                    status: status.as_u16(),
                });
            }

            return Ok(response);
        }

        Err(HlsError::Redirect(format!(
            "more than {} redirects starting from {}",
            self.max_redirects, url
        )))
    }

    /// Fetches a whole body as text
    pub async fn get_text(&self, url: &Url) -> Result<String> {
        Ok(self.get(url).await?.text().await?)
    }
}
