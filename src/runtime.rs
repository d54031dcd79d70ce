//! Chromiumoxide-based browser runtime.
//!
//! Owns the browser connection: either an attachment to an already-running
//! browser over CDP, or a locally launched Chrome/Chromium instance. Higher
//! level components obtain [`ChromiumPage`] handles from here and wrap them
//! in a [`ChromiumSurface`](crate::page::ChromiumSurface).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chromiumoxide::{
    browser::{Browser, BrowserConfig},
    page::Page as ChromiumPage,
};
use futures_util::StreamExt;
use thiserror::Error;
use tokio::{fs, sync::Mutex, task::JoinHandle};

/// Errors raised by the browser runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{0}")]
    Message(String),
    #[error("browser runtime has not been launched")]
    NotInitialized,
}

/// How to obtain a browser.
#[derive(Debug, Clone)]
pub enum LaunchPlan {
    /// Attach to an already-running browser over CDP.
    AttachCdp { url: String },
    /// Launch a local Chrome/Chromium instance.
    LaunchLocal(LocalLaunchOptions),
}

/// Options for launching a local browser.
#[derive(Debug, Clone)]
pub struct LocalLaunchOptions {
    pub chrome_executable: Option<String>,
    pub headless: bool,
    pub user_data_dir: Option<PathBuf>,
    pub args: Vec<String>,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for LocalLaunchOptions {
    fn default() -> Self {
        LocalLaunchOptions {
            chrome_executable: None,
            headless: true,
            user_data_dir: None,
            args: Vec::new(),
            viewport_width: 1288,
            viewport_height: 711,
        }
    }
}

pub struct ChromiumRuntime {
    state: Arc<Mutex<Option<RuntimeState>>>,
}

struct RuntimeState {
    browser: Arc<Browser>,
    _handler: JoinHandle<()>,
    pages: HashMap<String, ChromiumPage>,
}

impl ChromiumRuntime {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(None)),
        }
    }

    /// Connect or launch per the plan. Idempotent: a second call while a
    /// browser is live is a no-op.
    pub async fn launch(&self, plan: &LaunchPlan) -> Result<(), RuntimeError> {
        if self.state.lock().await.is_some() {
            return Ok(());
        }

        let (browser, handler) = match plan {
            LaunchPlan::AttachCdp { url } => {
                Browser::connect(url).await.map_err(map_chromium_error)?
            }
            LaunchPlan::LaunchLocal(options) => {
                let config = build_config(options)?;
                if let Some(dir) = &options.user_data_dir {
                    fs::create_dir_all(dir)
                        .await
                        .map_err(|err| RuntimeError::Message(err.to_string()))?;
                }
                Browser::launch(config).await.map_err(map_chromium_error)?
            }
        };

        let new_state = RuntimeState {
            browser: Arc::new(browser),
            _handler: spawn_handler(handler),
            pages: HashMap::new(),
        };

        let mut guard = self.state.lock().await;
        *guard = Some(new_state);
        Ok(())
    }

    /// Open a page at `url` and return its target id.
    pub async fn open_page(&self, url: &str) -> Result<String, RuntimeError> {
        let browser = {
            let guard = self.state.lock().await;
            let state = guard.as_ref().ok_or(RuntimeError::NotInitialized)?;
            state.browser.clone()
        };

        let page = browser.new_page(url).await.map_err(map_chromium_error)?;
        let page_id = page.target_id().as_ref().to_string();

        let mut guard = self.state.lock().await;
        if let Some(state) = guard.as_mut() {
            state.pages.insert(page_id.clone(), page);
        }

        Ok(page_id)
    }

    pub async fn page(&self, page_id: &str) -> Result<Option<ChromiumPage>, RuntimeError> {
        let guard = self.state.lock().await;
        let state = guard.as_ref().ok_or(RuntimeError::NotInitialized)?;
        Ok(state.pages.get(page_id).cloned())
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let state = {
            let mut guard = self.state.lock().await;
            guard.take()
        };

        if let Some(mut state) = state {
            state._handler.abort();
            state.pages.clear();
        }

        Ok(())
    }
}

impl Default for ChromiumRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn build_config(options: &LocalLaunchOptions) -> Result<BrowserConfig, RuntimeError> {
    let viewport = chromiumoxide::handler::viewport::Viewport {
        width: options.viewport_width,
        height: options.viewport_height,
        device_scale_factor: None,
        emulating_mobile: false,
        is_landscape: options.viewport_width >= options.viewport_height,
        has_touch: false,
    };

    let mut builder = BrowserConfig::builder();

    if let Some(path) = &options.chrome_executable {
        builder = builder.chrome_executable(path);
    }

    let builder = builder.viewport(viewport).args(options.args.clone());

    let builder = if options.headless {
        builder
    } else {
        builder.with_head()
    };

    let builder = match &options.user_data_dir {
        Some(dir) => builder.user_data_dir(dir),
        None => builder,
    };

    builder.build().map_err(RuntimeError::Message)
}

fn map_chromium_error<E: std::fmt::Display>(err: E) -> RuntimeError {
    RuntimeError::Message(err.to_string())
}

fn spawn_handler(mut handler: chromiumoxide::handler::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(result) = handler.next().await {
            if let Err(err) = result {
                eprintln!("chromiumoxide handler error: {err}");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn page_lookup_requires_launch() {
        let runtime = ChromiumRuntime::new();
        let err = runtime
            .page("missing")
            .await
            .expect_err("should fail before launch");
        assert!(matches!(err, RuntimeError::NotInitialized));
    }

    #[test]
    fn local_launch_defaults_are_headless() {
        let options = LocalLaunchOptions::default();
        assert!(options.headless);
        assert!(options.chrome_executable.is_none());
        assert_eq!(options.viewport_width, 1288);
    }
}
