use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

const USER_AGENT: &str = "rankmap/0.1.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Where compressed resource bytes come from.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>>;
}

/// Pick a source for a configured base: HTTP(S) URLs go over the network,
/// anything else is treated as a local directory.
pub fn source_for_base(base: &str) -> Arc<dyn ResourceSource> {
    if base.starts_with("http://") || base.starts_with("https://") {
        Arc::new(HttpSource::new(base))
    } else {
        Arc::new(DirectorySource::new(base))
    }
}

/// Reads resources from files under a root directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(Error::fetch(key, "key escapes the resource directory"));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ResourceSource for DirectorySource {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| Error::fetch(key, format!("{}: {}", path.display(), e)))
    }
}

/// Fetches resources with `GET <base>/<key>`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    base: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, key: &str) -> String {
        format!("{}/{}", self.base, key.trim_start_matches('/'))
    }
}

#[async_trait]
impl ResourceSource for HttpSource {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.url(key))
            .header("User-Agent", USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::fetch(key, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(key, format!("HTTP {status}")));
        }

        let body = response.bytes().await.map_err(|e| Error::fetch(key, e))?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_url() {
        let source = HttpSource::new("https://example.org/w/");
        assert_eq!(source.url("/map/1.tsv.gz"), "https://example.org/w/map/1.tsv.gz");
        assert_eq!(source.url("raid_info.json.gz"), "https://example.org/w/raid_info.json.gz");
    }

    #[test]
    fn test_directory_rejects_parent_components() {
        let source = DirectorySource::new("/srv/data");
        assert!(source.resolve("../etc/passwd").is_err());
        assert_eq!(
            source.resolve("/map/1.tsv").unwrap(),
            PathBuf::from("/srv/data/map/1.tsv")
        );
    }

    #[tokio::test]
    async fn test_directory_fetch() {
        let dir = std::env::temp_dir().join(format!("rankmap-source-{}", std::process::id()));
        tokio::fs::create_dir_all(dir.join("map")).await.unwrap();
        tokio::fs::write(dir.join("map/1.tsv"), b"1\t5\t3\t10\t0\n").await.unwrap();

        let source = DirectorySource::new(&dir);
        assert_eq!(source.fetch("map/1.tsv").await.unwrap(), b"1\t5\t3\t10\t0\n");

        let err = source.fetch("map/missing.tsv").await.unwrap_err();
        assert!(err.is_retryable());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
