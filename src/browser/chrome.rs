use super::{HtmlSource, LoadedPage};
use crate::core::BrowserConfig;
use crate::errors::{Result, SelectorError};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use std::ffi::OsStr;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Renders a live page in headless Chrome and snapshots its DOM.
///
/// `headless_chrome` is blocking, so each load runs on tokio's blocking pool.
pub struct ChromeSource {
    url: Url,
    config: BrowserConfig,
}

impl ChromeSource {
    pub fn new(url: &str, config: BrowserConfig) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| SelectorError::NavigationFailed(format!("{}: {}", url, e)))?;
        if !matches!(url.scheme(), "http" | "https" | "file") {
            return Err(SelectorError::NavigationFailed(format!(
                "unsupported scheme \"{}\"",
                url.scheme()
            )));
        }
        Ok(Self { url, config })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

fn launch(config: &BrowserConfig) -> Result<Browser> {
    let window_size_arg = format!("--window-size={},{}", config.viewport.width, config.viewport.height);

    let user_agent_arg = config.user_agent.as_ref().map(|ua| format!("--user-agent={}", ua));

    let mut args = vec![
        OsStr::new("--no-sandbox"),
        OsStr::new("--disable-dev-shm-usage"),
        OsStr::new(&window_size_arg),
    ];

    if let Some(ref ua_arg) = user_agent_arg {
        args.push(OsStr::new(ua_arg));
    }

    if config.disable_images {
        args.push(OsStr::new("--blink-settings=imagesEnabled=false"));
    }

    for arg in &config.args {
        args.push(OsStr::new(arg));
    }

    let launch_options = LaunchOptions::default_builder()
        .headless(config.headless)
        .args(args)
        .build()
        .map_err(|e| SelectorError::LaunchFailed(e.to_string()))?;

    Browser::new(launch_options).map_err(|e| SelectorError::LaunchFailed(e.to_string()))
}

fn snapshot(url: &Url, config: &BrowserConfig) -> Result<LoadedPage> {
    let browser = launch(config)?;
    let tab = browser.new_tab().map_err(SelectorError::from_any_error)?;

    tab.navigate_to(url.as_str())
        .map_err(|e| SelectorError::NavigationFailed(e.to_string()))?;
    tab.wait_until_navigated()
        .map_err(|e| SelectorError::NavigationFailed(e.to_string()))?;

    // Give client-side rendering a moment to settle.
    std::thread::sleep(Duration::from_millis(config.settle_timeout_ms));

    let result = tab
        .evaluate("document.documentElement.outerHTML", false)
        .map_err(SelectorError::from_any_error)?;
    let html = result
        .value
        .as_ref()
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| SelectorError::ChromeError("page returned no markup".to_string()))?;

    debug!("captured {} bytes from {}", html.len(), tab.get_url());
    Ok(LoadedPage::new(url.to_string(), html))
}

#[async_trait]
impl HtmlSource for ChromeSource {
    fn describe(&self) -> String {
        self.url.to_string()
    }

    async fn load(&self) -> Result<LoadedPage> {
        info!("Navigating to {}", self.url);
        let url = self.url.clone();
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || snapshot(&url, &config))
            .await
            .map_err(|e| SelectorError::ChromeError(e.to_string()))?
    }
}
