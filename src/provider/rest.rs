//! Minimal JSON-over-HTTP client shared by the GitLab and Gitea adapters

use anyhow::{anyhow, Context, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

const USER_AGENT: &str = concat!("repomirror/", env!("CARGO_PKG_VERSION"));

/// How the access token is presented to the API
#[derive(Debug, Clone)]
pub enum TokenHeader {
    /// `PRIVATE-TOKEN: <token>` (GitLab)
    PrivateToken(String),
    /// `Authorization: token <token>` (Gitea)
    Token(String),
    Anonymous,
}

/// HTTP client bound to one API root such as `https://gitlab.com/api/v4`
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    api_root: String,
    auth: TokenHeader,
}

impl RestClient {
    pub fn new(api_root: impl Into<String>, auth: TokenHeader) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_root: api_root.into().trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.api_root, path);
        debug!("{} {}", method, url);

        let builder = self.http.request(method, url);
        match &self.auth {
            TokenHeader::PrivateToken(token) => builder.header("PRIVATE-TOKEN", token),
            TokenHeader::Token(token) => builder.header("Authorization", format!("token {}", token)),
            TokenHeader::Anonymous => builder,
        }
    }

    async fn send(&self, method: Method, path: &str, builder: RequestBuilder) -> Result<Response> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("{} {} request failed", method, path))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(anyhow!(ApiError {
            status,
            message: format!("{} {} returned {}: {}", method, path, status, body.trim()),
        }))
    }

    /// GET returning the decoded body together with the response headers
    pub async fn get_with_headers<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<(T, HeaderMap)> {
        let builder = self.request(Method::GET, path).query(query);
        let response = self.send(Method::GET, path, builder).await?;
        let headers = response.headers().clone();
        let body = response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode response of GET {}", path))?;
        Ok((body, headers))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        Ok(self.get_with_headers(path, query).await?.0)
    }

    /// Send `body` as JSON and decode the JSON reply
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(method.clone(), path).json(body);
        let response = self.send(method.clone(), path, builder).await?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode response of {} {}", method, path))
    }

    /// DELETE, treating 404 as already gone
    pub async fn delete(&self, path: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, path);
        match self.send(Method::DELETE, path, builder).await {
            Ok(_) => Ok(()),
            Err(e) if status_of(&e) == Some(StatusCode::NOT_FOUND) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Non-success HTTP status from a provider API
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

/// HTTP status carried by an error chain, if any
pub fn status_of(error: &anyhow::Error) -> Option<StatusCode> {
    error.downcast_ref::<ApiError>().map(|e| e.status)
}

/// Percent-encode `/` so a namespaced path fits one URL segment
pub fn encode_path(path: &str) -> String {
    path.replace('%', "%25").replace('/', "%2F")
}

/// Parse a numeric header such as `x-next-page`; empty values mean absent
pub fn header_number(headers: &HeaderMap, name: &str) -> Option<u32> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse().ok())
}
