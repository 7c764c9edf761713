//! Where documents come from. Generation itself is synchronous; loading the
//! markup is the only async step.

#[cfg(feature = "chrome")]
pub mod chrome;

#[cfg(feature = "chrome")]
pub use chrome::ChromeSource;

use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::Html;
use std::path::PathBuf;
use tracing::debug;

/// Markup snapshot of one page.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub source: String,
    pub html: String,
    pub loaded_at: DateTime<Utc>,
}

impl LoadedPage {
    pub fn new(source: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            html: html.into(),
            loaded_at: Utc::now(),
        }
    }

    pub fn parse(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

#[async_trait]
pub trait HtmlSource: Send + Sync {
    /// Human readable origin, used in reports.
    fn describe(&self) -> String;

    async fn load(&self) -> Result<LoadedPage>;
}

/// Markup read from a file on disk.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl HtmlSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<LoadedPage> {
        let html = tokio::fs::read_to_string(&self.path).await?;
        debug!("read {} bytes from {}", html.len(), self.path.display());
        Ok(LoadedPage::new(self.describe(), html))
    }
}

/// Markup already in memory.
pub struct InlineSource {
    name: String,
    html: String,
}

impl InlineSource {
    pub fn new(name: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            html: html.into(),
        }
    }
}

#[async_trait]
impl HtmlSource for InlineSource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    async fn load(&self) -> Result<LoadedPage> {
        Ok(LoadedPage::new(self.name.clone(), self.html.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SelectorError;

    #[test]
    fn test_inline_source() {
        let source = InlineSource::new("fixture", "<p>hi</p>");
        let page = tokio_test::block_on(source.load()).unwrap();
        assert_eq!(page.source, "fixture");
        assert_eq!(page.parse().root_element().value().name(), "html");
    }

    #[tokio::test]
    async fn test_file_source() {
        let path = std::env::temp_dir().join(format!("ragent-selectors-{}.html", std::process::id()));
        tokio::fs::write(&path, "<button>Go</button>").await.unwrap();

        let page = FileSource::new(&path).load().await.unwrap();
        assert!(page.html.contains("Go"));
        tokio::fs::remove_file(&path).await.unwrap();

        let missing = FileSource::new(&path).load().await;
        assert!(matches!(missing, Err(SelectorError::IoError(_))));
    }
}
