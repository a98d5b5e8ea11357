mod basic;
mod url_param;

pub use basic::BasicClient;
pub use url_param::UrlParam;

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::{Request, Response};
use serde::de::DeserializeOwned;

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// Issues a GET and deserializes the JSON body, failing on non-2xx status.
pub async fn get_json<C: HttpClient, T: DeserializeOwned>(client: &C, url: &str) -> Result<T> {
    let req = Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("request failed with status {status}: {body}");
    }

    Ok(resp.json().await?)
}
