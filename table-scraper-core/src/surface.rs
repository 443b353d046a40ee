//! The table surface the collector drives.
//!
//! [`Surface`] and [`TableRow`] are the only browser capabilities the
//! collector needs: scroll, bounded loader waits, and row reads.
//! [`ChromeTableSurface`] implements them over a chromiumoxide [`Page`].

use crate::config::TableSelectors;
use crate::error::SurfaceError;
use crate::record::RATING_COLUMN;
use async_trait::async_trait;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Target state for [`Surface::wait_for_loader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    /// A placeholder row is rendered and visible.
    Visible,
    /// No placeholder row is left in the table.
    Detached,
}

/// Raw texts read from one rendered row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSnapshot {
    pub cells: Vec<String>,
    /// Text of the rating sub-element, `None` when the element is absent.
    pub rating: Option<String>,
}

impl RowSnapshot {
    pub fn new<S: Into<String>>(cells: impl IntoIterator<Item = S>, rating: Option<&str>) -> Self {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
            rating: rating.map(str::to_string),
        }
    }
}

/// A row currently rendered by the surface.
#[async_trait]
pub trait TableRow: Send + Sync {
    async fn read(&self) -> Result<RowSnapshot, SurfaceError>;
}

/// A live, virtualized table.
#[async_trait]
pub trait Surface: Send + Sync {
    type Row: TableRow;

    /// Scroll the table container to its current maximum extent.
    async fn scroll_to_end(&self) -> Result<(), SurfaceError>;

    /// Wait up to `timeout` for the loading placeholder to reach `state`.
    ///
    /// Returns `Ok(false)` when the timeout elapses first.
    async fn wait_for_loader(
        &self,
        state: LoaderState,
        timeout: Duration,
    ) -> Result<bool, SurfaceError>;

    /// All data rows currently rendered, in rendering order.
    async fn rendered_rows(&self) -> Result<Vec<Self::Row>, SurfaceError>;
}

/// Scrolls the container; returns `false` when the container is missing.
const SCROLL_CONTAINER_JS: &str = r#"
(selector) => {
    const el = document.querySelector(selector);
    if (!el) return false;
    el.scrollTo(0, el.scrollHeight);
    return true;
}
"#;

/// Reports whether a row containing the placeholder text exists, and whether
/// any such row is visible.
const LOADER_PROBE_JS: &str = r#"
(selector, marker) => {
    const rows = Array.from(document.querySelectorAll(selector))
        .filter(row => (row.innerText || row.textContent || '').includes(marker));
    const visible = rows.some(row => row.getClientRects().length > 0
        && getComputedStyle(row).visibility !== 'hidden');
    return { attached: rows.length > 0, visible: visible };
}
"#;

#[derive(Debug, serde::Deserialize)]
struct LoaderProbe {
    attached: bool,
    visible: bool,
}

fn js_call(function: &str, args: &[&str]) -> Result<String, SurfaceError> {
    let args = args
        .iter()
        .map(|a| serde_json::to_string(a))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SurfaceError::Browser(format!("Failed to encode script argument: {}", e)))?;
    Ok(format!("({})({})", function, args.join(", ")))
}

/// chromiumoxide-backed table surface.
pub struct ChromeTableSurface {
    page: Page,
    selectors: Arc<TableSelectors>,
    poll_interval: Duration,
}

impl ChromeTableSurface {
    pub fn new(page: Page, selectors: TableSelectors) -> Self {
        Self {
            page,
            selectors: Arc::new(selectors),
            poll_interval: Duration::from_millis(200),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    async fn probe_loader(&self) -> Result<LoaderProbe, SurfaceError> {
        let js = js_call(
            LOADER_PROBE_JS,
            &[
                self.selectors.any_row.as_str(),
                self.selectors.placeholder.as_str(),
            ],
        )?;
        self.page
            .evaluate_expression(js)
            .await?
            .into_value::<LoaderProbe>()
            .map_err(|e| SurfaceError::Browser(format!("Failed to parse loader probe: {:?}", e)))
    }
}

#[async_trait]
impl Surface for ChromeTableSurface {
    type Row = ChromeRow;

    async fn scroll_to_end(&self) -> Result<(), SurfaceError> {
        let js = js_call(SCROLL_CONTAINER_JS, &[self.selectors.container.as_str()])?;
        let found: bool = self
            .page
            .evaluate_expression(js)
            .await?
            .into_value()
            .map_err(|e| SurfaceError::Browser(format!("Failed to parse scroll result: {:?}", e)))?;

        if found {
            Ok(())
        } else {
            Err(SurfaceError::Missing(self.selectors.container.clone()))
        }
    }

    async fn wait_for_loader(
        &self,
        state: LoaderState,
        timeout: Duration,
    ) -> Result<bool, SurfaceError> {
        let start = Instant::now();

        loop {
            let probe = self.probe_loader().await?;
            let reached = match state {
                LoaderState::Visible => probe.visible,
                LoaderState::Detached => !probe.attached,
            };
            if reached {
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                return Ok(false);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn rendered_rows(&self) -> Result<Vec<ChromeRow>, SurfaceError> {
        let elements = match self.page.find_elements(&self.selectors.rows).await {
            Ok(elements) => elements,
            Err(CdpError::NotFound) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(elements
            .into_iter()
            .map(|element| ChromeRow {
                element,
                selectors: self.selectors.clone(),
            })
            .collect())
    }
}

/// One `<tr>` handle on a [`ChromeTableSurface`].
pub struct ChromeRow {
    element: Element,
    selectors: Arc<TableSelectors>,
}

#[async_trait]
impl TableRow for ChromeRow {
    async fn read(&self) -> Result<RowSnapshot, SurfaceError> {
        let cells = self.element.find_elements(&self.selectors.cell).await?;

        let mut texts = Vec::with_capacity(cells.len());
        for cell in &cells {
            texts.push(cell.inner_text().await?.unwrap_or_default());
        }

        let rating = match cells.get(RATING_COLUMN) {
            Some(cell) => match cell.find_elements(&self.selectors.rating).await {
                Ok(spans) => match spans.first() {
                    Some(span) => Some(span.inner_text().await?.unwrap_or_default()),
                    None => None,
                },
                Err(CdpError::NotFound) => None,
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        Ok(RowSnapshot {
            cells: texts,
            rating,
        })
    }
}
