//! AUR RPC client.

use anyhow::{Result, bail};
use async_trait::async_trait;
use log::debug;

use crate::http::HttpClient;

use super::Registry;

pub const DEFAULT_AUR_URL: &str = "https://aur.archlinux.org";

/// AUR RPC v5 response types (internal).
mod api {
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct Response {
        #[serde(rename = "type")]
        pub kind: String,
        pub resultcount: usize,
        #[serde(default)]
        pub results: Vec<Package>,
        pub error: Option<String>,
    }

    #[derive(Deserialize, Debug)]
    pub struct Package {
        #[serde(rename = "Name")]
        pub name: String,
        #[serde(rename = "Version")]
        pub version: String,
    }
}

/// Looks up package versions through the AUR `info` endpoint.
pub struct AurRegistry {
    http_client: HttpClient,
    base_url: String,
}

impl AurRegistry {
    pub fn new(http_client: HttpClient, base_url: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Registry for AurRegistry {
    #[tracing::instrument(skip(self))]
    async fn latest_version(&self, name: &str) -> Result<Option<String>> {
        let url = format!("{}/rpc/", self.base_url);
        let response: api::Response = self
            .http_client
            .get_json_with_query(&url, &[("v", "5"), ("type", "info"), ("arg[]", name)])
            .await?;

        if response.kind == "error" {
            bail!(
                "AUR error: {}",
                response.error.as_deref().unwrap_or("unknown error")
            );
        }
        debug!("AUR returned {} result(s) for {}", response.resultcount, name);

        Ok(response
            .results
            .into_iter()
            .find(|package| package.name == name)
            .map(|package| package.version))
    }
}
