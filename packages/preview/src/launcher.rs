// ABOUTME: Opens a ready dev server according to the configured preview type
// ABOUTME: Resolves the port to a URL first so remote/proxied setups get a usable address

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::host::{PreviewSurface, UrlResolver};
use crate::types::{PreviewResult, PreviewType, ViewerOptions};

/// Nothing useful to show for this URL in an external browser
pub const BLANK_URL: &str = "about:blank";

#[derive(Clone)]
pub struct PreviewLauncher {
    preview_type: PreviewType,
    resolver: Arc<dyn UrlResolver>,
    surface: Arc<dyn PreviewSurface>,
}

impl PreviewLauncher {
    pub fn new(
        preview_type: PreviewType,
        resolver: Arc<dyn UrlResolver>,
        surface: Arc<dyn PreviewSurface>,
    ) -> Self {
        Self {
            preview_type,
            resolver,
            surface,
        }
    }

    pub fn preview_type(&self) -> &PreviewType {
        &self.preview_type
    }

    /// Resolve `port` to a URL, dispatch it, and return the URL
    pub async fn launch(&self, port: u16) -> PreviewResult<String> {
        let url = self.resolver.resolve(port);
        debug!("Resolved port {} to {}", port, url);
        self.open_browser(&url).await?;
        Ok(url)
    }

    /// Present `url` the way `preview_type` asks for
    pub async fn open_browser(&self, url: &str) -> PreviewResult<()> {
        let result = self.dispatch(url).await;
        if let Err(e) = &result {
            error!("Failed to open preview for {}: {}", url, e);
        }
        result
    }

    async fn dispatch(&self, url: &str) -> PreviewResult<()> {
        match &self.preview_type {
            PreviewType::None => Ok(()),
            PreviewType::External => {
                if url == BLANK_URL {
                    debug!("Not opening {} externally", BLANK_URL);
                    return Ok(());
                }
                info!("Opening {} in the external browser", url);
                self.surface.open_external(url).await
            }
            PreviewType::Internal | PreviewType::Unrecognized(_) => {
                if matches!(self.preview_type, PreviewType::Internal) {
                    if let Some(hook) = self.surface.internal_preview() {
                        info!("Opening {} in the internal preview", url);
                        return hook.open(url).await;
                    }
                }
                info!("Opening {} in the viewer", url);
                self.surface
                    .open_viewer(url, ViewerOptions::default())
                    .await
            }
        }
    }
}
