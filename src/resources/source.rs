use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Where the model server's documents come from.
///
/// `Http` is what the browser build uses; `Directory` mirrors the server's
/// path layout on disk and lets the native viewer (and the tests) run
/// without a server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetSource {
    Http { base_url: String },
    Directory { root: PathBuf },
}

impl Default for AssetSource {
    fn default() -> Self {
        AssetSource::Http {
            base_url: "http://127.0.0.1:8080/".to_string(),
        }
    }
}

impl AssetSource {
    /// Anything that looks like a URL is fetched over HTTP, everything else is a directory.
    pub fn from_arg(arg: &str) -> Self {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            AssetSource::Http {
                base_url: arg.to_string(),
            }
        } else {
            AssetSource::Directory { root: arg.into() }
        }
    }

    /// Resolve a server-relative path against an HTTP base URL.
    pub fn url(&self, path: &str) -> Result<reqwest::Url> {
        let AssetSource::Http { base_url } = self else {
            anyhow::bail!("{path} is not served over HTTP");
        };
        let base = if base_url.ends_with('/') {
            reqwest::Url::parse(base_url)
        } else {
            reqwest::Url::parse(&format!("{base_url}/"))
        }
        .with_context(|| format!("invalid base url {base_url}"))?;
        Ok(base.join(path.trim_start_matches('/'))?)
    }

    /// Fetch a text document such as the model, material and texture headers.
    pub async fn load_string(&self, path: &str) -> Result<String> {
        let bytes = self.load_binary(path).await?;
        String::from_utf8(bytes).with_context(|| format!("{path} is not valid UTF-8"))
    }

    pub async fn load_binary(&self, path: &str) -> Result<Vec<u8>> {
        log::debug!("fetching {path}");
        match self {
            AssetSource::Http { .. } => {
                let url = self.url(path)?;
                let response = reqwest::get(url.clone())
                    .await
                    .with_context(|| format!("request for {url} failed"))?
                    .error_for_status()
                    .with_context(|| format!("server rejected {url}"))?;
                Ok(response.bytes().await?.to_vec())
            }
            #[cfg(not(target_arch = "wasm32"))]
            AssetSource::Directory { root } => {
                let file = root.join(path.trim_start_matches('/'));
                tokio::fs::read(&file)
                    .await
                    .with_context(|| format!("could not read {}", file.display()))
            }
            #[cfg(target_arch = "wasm32")]
            AssetSource::Directory { root } => {
                anyhow::bail!("{} cannot be read from the browser", root.display())
            }
        }
    }
}
