//! Chrome over WebDriver

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::key::Key;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::chromedriver::ChromeDriverProcess;
use crate::config::BrowserConfig;
use crate::driver::{PageDriver, RowSnapshot};
use crate::error::{E2eError, E2eResult};

/// Chrome capabilities: viewport, headless mode and a silent download directory
pub fn chrome_capabilities(config: &BrowserConfig, downloads_dir: &Path) -> Map<String, Value> {
    let mut args = vec![
        format!("--window-size={},{}", config.viewport_width, config.viewport_height),
        "--disable-gpu".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
    }

    let mut caps = Map::new();
    caps.insert("browserName".to_string(), json!("chrome"));
    caps.insert(
        "goog:chromeOptions".to_string(),
        json!({
            "args": args,
            "prefs": {
                "download.default_directory": downloads_dir.to_string_lossy(),
                "download.prompt_for_download": false,
                "download.directory_upgrade": true,
                "safebrowsing.enabled": true,
            }
        }),
    );
    caps
}

/// Sets `value` through the prototype setter and fires `input`, which React handles.
const CLEAR_SCRIPT: &str = r#"
const el = arguments[0];
const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, '');
el.dispatchEvent(new Event('input', { bubbles: true }));
"#;

/// Ctrl+A, release modifiers, Backspace
fn clear_keys() -> String {
    let ctrl: char = Key::Control.into();
    let release: char = Key::Null.into();
    let backspace: char = Key::Backspace.into();
    format!("{ctrl}a{release}{backspace}")
}

/// A WebDriver session bound to the site under test
pub struct WebDriverPage {
    client: Client,
    site_url: String,
}

impl fmt::Debug for WebDriverPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDriverPage")
            .field("site_url", &self.site_url)
            .finish_non_exhaustive()
    }
}

impl WebDriverPage {
    pub async fn connect(
        webdriver_url: &str,
        config: &BrowserConfig,
        downloads_dir: &Path,
        site_url: &str,
    ) -> E2eResult<Self> {
        let client = ClientBuilder::native()
            .capabilities(chrome_capabilities(config, downloads_dir))
            .connect(webdriver_url)
            .await?;
        client
            .set_window_size(config.viewport_width, config.viewport_height)
            .await?;

        Ok(Self {
            client,
            site_url: site_url.to_string(),
        })
    }

    async fn first(&self, selector: &str) -> E2eResult<Option<Element>> {
        let mut found = self.client.find_all(Locator::Css(selector)).await?;
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.swap_remove(0))
        })
    }

    async fn require(&self, selector: &str) -> E2eResult<Element> {
        self.first(selector)
            .await?
            .ok_or_else(|| E2eError::ElementNotFound(selector.to_string()))
    }

    /// Native click, falling back to a script click when something overlays the element.
    async fn click_element(&self, element: Element) -> E2eResult<()> {
        let arg = serde_json::to_value(&element)?;
        if let Err(e) = element.click().await {
            debug!("Native click failed ({}); clicking via script", e);
            self.client
                .execute("arguments[0].click();", vec![arg])
                .await?;
        }
        Ok(())
    }

    /// Empties an input the way typing does, so React sees the change.
    ///
    /// Element Clear only resets `value`; React's value tracker already holds
    /// the old text and swallows the event. When the select-all chord has no
    /// effect (macOS binds it to Cmd) the native setter is driven directly.
    async fn clear_element(&self, element: &Element) -> E2eResult<()> {
        element.send_keys(&clear_keys()).await?;
        let left = element.prop("value").await?.unwrap_or_default();
        if !left.is_empty() {
            debug!("Keyboard clear left {:?}; clearing via input event", left);
            let arg = serde_json::to_value(element)?;
            self.client.execute(CLEAR_SCRIPT, vec![arg]).await?;
        }
        Ok(())
    }

    pub async fn close(self) -> E2eResult<()> {
        self.client.close().await?;
        Ok(())
    }
}

#[async_trait]
impl PageDriver for WebDriverPage {
    async fn visit(&self, path: &str) -> E2eResult<()> {
        let url = format!("{}{}", self.site_url, path);
        debug!("Visiting {}", url);
        self.client.goto(&url).await?;
        Ok(())
    }

    async fn exists(&self, selector: &str) -> E2eResult<bool> {
        Ok(self.first(selector).await?.is_some())
    }

    async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        match self.first(selector).await? {
            Some(el) => Ok(el.is_displayed().await?),
            None => Ok(false),
        }
    }

    async fn text(&self, selector: &str) -> E2eResult<Option<String>> {
        match self.first(selector).await? {
            Some(el) => Ok(Some(el.text().await?)),
            None => Ok(None),
        }
    }

    async fn value(&self, selector: &str) -> E2eResult<Option<String>> {
        match self.first(selector).await? {
            Some(el) => Ok(el.prop("value").await?),
            None => Ok(None),
        }
    }

    async fn attr(&self, selector: &str, name: &str) -> E2eResult<Option<String>> {
        match self.first(selector).await? {
            Some(el) => Ok(el.attr(name).await?),
            None => Ok(None),
        }
    }

    async fn rows(&self, row_selector: &str, cell_selector: &str) -> E2eResult<Vec<RowSnapshot>> {
        let rows = self.client.find_all(Locator::Css(row_selector)).await?;
        let mut snapshots = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            let visible = row.is_displayed().await?;
            let mut cells = Vec::new();
            for cell in row.find_all(Locator::Css(cell_selector)).await? {
                cells.push(cell.text().await?);
            }
            snapshots.push(RowSnapshot {
                index,
                cells,
                visible,
            });
        }
        Ok(snapshots)
    }

    async fn click(&self, selector: &str) -> E2eResult<()> {
        let el = self.require(selector).await?;
        self.click_element(el).await
    }

    async fn click_in_row(&self, row_selector: &str, index: usize, target: &str) -> E2eResult<()> {
        let mut rows = self.client.find_all(Locator::Css(row_selector)).await?;
        if index >= rows.len() {
            return Err(E2eError::ElementNotFound(format!(
                "{row_selector} #{index} (only {} rendered)",
                rows.len()
            )));
        }
        let row = rows.swap_remove(index);
        let mut targets = row.find_all(Locator::Css(target)).await?;
        if targets.is_empty() {
            return Err(E2eError::ElementNotFound(format!("{target} in {row_selector} #{index}")));
        }
        self.click_element(targets.swap_remove(0)).await
    }

    async fn clear(&self, selector: &str) -> E2eResult<()> {
        let el = self.require(selector).await?;
        self.clear_element(&el).await
    }

    async fn fill(&self, selector: &str, text: &str) -> E2eResult<()> {
        let el = self.require(selector).await?;
        self.clear_element(&el).await?;
        el.send_keys(text).await?;
        Ok(())
    }

    async fn is_valid(&self, selector: &str) -> E2eResult<bool> {
        let el = self.require(selector).await?;
        let arg = serde_json::to_value(&el)?;
        let valid = self
            .client
            .execute("return arguments[0].checkValidity();", vec![arg])
            .await?;
        Ok(valid.as_bool().unwrap_or(true))
    }

    async fn press_enter(&self, selector: &str) -> E2eResult<()> {
        let enter: char = Key::Enter.into();
        self.require(selector)
            .await?
            .send_keys(&enter.to_string())
            .await?;
        Ok(())
    }
}

/// Browser plus the chromedriver backing it, when this run started one
#[derive(Debug)]
pub struct BrowserSession {
    page: WebDriverPage,
    driver: Option<ChromeDriverProcess>,
}

impl BrowserSession {
    pub async fn start(config: &BrowserConfig, site_url: &str) -> E2eResult<Self> {
        std::fs::create_dir_all(&config.downloads_dir)?;
        let downloads_dir = std::fs::canonicalize(&config.downloads_dir)?;

        let driver = match &config.webdriver_url {
            Some(_) => None,
            None => Some(ChromeDriverProcess::spawn(&config.chromedriver, config.startup_timeout).await?),
        };
        let url = match (&config.webdriver_url, &driver) {
            (Some(url), _) => url.clone(),
            (None, Some(process)) => process.url().to_string(),
            (None, None) => {
                return Err(E2eError::InvalidConfig("no WebDriver endpoint".to_string()))
            }
        };

        info!("Opening Chrome session via {}", url);
        let page = WebDriverPage::connect(&url, config, &downloads_dir, site_url).await?;
        Ok(Self { page, driver })
    }

    pub fn page(&self) -> &WebDriverPage {
        &self.page
    }

    pub async fn close(self) -> E2eResult<()> {
        let Self { page, driver } = self;
        if let Err(e) = page.close().await {
            warn!("Closing browser session failed: {}", e);
        }
        if let Some(mut driver) = driver {
            driver.stop()?;
        }
        Ok(())
    }
}
