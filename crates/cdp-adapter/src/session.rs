use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::dom::ChromiumDom;
use crate::error::{AdapterError, AdapterErrorKind};

/// A launched (or attached) browser plus the task pumping its CDP handler.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    cfg: CdpConfig,
}

impl BrowserSession {
    pub async fn start(cfg: CdpConfig) -> Result<Self, AdapterError> {
        let (browser, mut handler) = match &cfg.websocket_url {
            Some(url) => {
                info!(target: "cdp-adapter", "attaching to running browser");
                Browser::connect(url.clone()).await?
            }
            None => {
                let config = launch_config(&cfg)?;
                info!(
                    target: "cdp-adapter",
                    executable = %cfg.executable.display(),
                    headless = cfg.headless,
                    "launching chromium"
                );
                Browser::launch(config).await.map_err(|err| {
                    AdapterError::new(AdapterErrorKind::Launch).with_hint(err.to_string())
                })?
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    warn!(target: "cdp-adapter", %err, "cdp handler stopped");
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            cfg,
        })
    }

    /// Reuses a tab matching `page_url_contains`, otherwise opens `start_url`.
    pub async fn page(&self) -> Result<ChromiumDom, AdapterError> {
        let deadline = Duration::from_millis(self.cfg.default_deadline_ms);
        if let Some(needle) = &self.cfg.page_url_contains {
            for page in self.browser.pages().await? {
                if let Ok(Some(url)) = page.url().await {
                    if url.contains(needle.as_str()) {
                        debug!(target: "cdp-adapter", "reusing open tab");
                        return Ok(self.wrap(page));
                    }
                }
            }
        }

        let url = self.cfg.start_url.as_deref().unwrap_or("about:blank");
        let page = timeout(deadline, self.browser.new_page(url))
            .await
            .map_err(|_| {
                AdapterError::new(AdapterErrorKind::PageNotFound)
                    .with_hint(format!("opening a page took longer than {deadline:?}"))
            })??;
        Ok(self.wrap(page))
    }

    fn wrap(&self, page: Page) -> ChromiumDom {
        ChromiumDom::new(page, Duration::from_millis(self.cfg.mutation_poll_ms))
    }

    pub async fn close(mut self) -> Result<(), AdapterError> {
        if self.cfg.websocket_url.is_none() {
            self.browser.close().await?;
            let _ = self.browser.wait().await;
        }
        self.handler.abort();
        Ok(())
    }
}

fn launch_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    let mut builder = BrowserConfig::builder().user_data_dir(&cfg.user_data_dir);
    if !cfg.executable.as_os_str().is_empty() {
        builder = builder.chrome_executable(&cfg.executable);
    }
    if !cfg.headless {
        builder = builder.with_head();
    }
    builder
        .build()
        .map_err(|err| AdapterError::new(AdapterErrorKind::Launch).with_hint(err))
}
