use log::debug;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use url::Url;

use crate::auth::Token;
use crate::error::{PayslipError, Result};

/// HTTP client for the HR partner API.
///
/// Holds no credential: every operation borrows the caller's [`Token`].
pub struct HrApiClient {
    client: Client,
    api_url: Url,
    auth_url: Url,
}

impl HrApiClient {
    pub fn new(base_url: &str, auth_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("payslip-collector/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| PayslipError::Config(format!("Failed to create HTTP client: {e}")))?;

        let api_url = Url::parse(base_url)
            .map_err(|e| PayslipError::Config(format!("Invalid base URL: {e}")))?;
        let auth_url = Url::parse(auth_url)
            .map_err(|e| PayslipError::Config(format!("Invalid auth URL: {e}")))?;

        if api_url.cannot_be_a_base() || auth_url.cannot_be_a_base() {
            return Err(PayslipError::Config(
                "API and auth URLs must be hierarchical http(s) URLs".to_string(),
            ));
        }

        Ok(Self {
            client,
            api_url,
            auth_url,
        })
    }

    pub(super) fn client(&self) -> &Client {
        &self.client
    }

    pub(super) fn auth_request(&self, request: RequestBuilder, token: &Token) -> RequestBuilder {
        request.bearer_auth(token.as_str())
    }

    /// Appends percent-encoded path segments to the API base URL.
    pub(super) fn api_endpoint(&self, segments: &[&str]) -> Url {
        Self::join_segments(&self.api_url, segments)
    }

    pub(super) fn auth_endpoint(&self, segments: &[&str]) -> Url {
        Self::join_segments(&self.auth_url, segments)
    }

    fn join_segments(base: &Url, segments: &[&str]) -> Url {
        let mut url = base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Sends the request and turns any non-success status into [`PayslipError::Upstream`].
    pub(super) async fn send_checked(&self, request: RequestBuilder, context: &str) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        debug!("{context}: HTTP {status}");

        if !status.is_success() {
            return Err(PayslipError::Upstream {
                status: status.as_u16(),
                context: context.to_string(),
            });
        }

        Ok(response)
    }
}
