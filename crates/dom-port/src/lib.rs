//! DOM surface the booking agents drive.
//!
//! Every agent talks to the page through [`DomPort`]. The Chromium adapter
//! implements it over CDP; [`memory::MemoryDom`] implements it in-process for
//! tests and dry runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use slotpilot_core_types::{ElementRef, Rect};

pub mod errors;
pub mod event;
pub mod memory;

pub use errors::DomError;
pub use event::{EventInit, EventKind, SyntheticEvent};

/// Point-in-time view of an element, re-read on every attempt.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementState {
    pub tag: String,
    /// `offsetParent !== null`: attached and not under `display: none`.
    pub laid_out: bool,
    /// Computed `visibility: hidden`.
    pub visibility_hidden: bool,
    pub disabled: bool,
    pub rect: Rect,
    /// Raw `textContent`.
    pub text: String,
    pub attributes: BTreeMap<String, String>,
    pub classes: Vec<String>,
}

impl ElementState {
    pub fn is_visible(&self) -> bool {
        self.laid_out && !self.visibility_hidden
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// One delivery from a mutation observer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MutationBatch {
    pub records: usize,
}

/// Live mutation subscription. Dropping it disconnects the observer.
#[derive(Debug)]
pub struct MutationStream {
    rx: mpsc::UnboundedReceiver<MutationBatch>,
}

impl MutationStream {
    pub fn new(rx: mpsc::UnboundedReceiver<MutationBatch>) -> Self {
        Self { rx }
    }

    /// Next batch, or `None` once the page side has gone away.
    pub async fn next(&mut self) -> Option<MutationBatch> {
        self.rx.recv().await
    }

    pub fn disconnect(self) {}
}

#[async_trait]
pub trait DomPort: Send + Sync {
    /// `document.querySelectorAll(selector)` in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementRef>, DomError>;

    /// `scope.querySelectorAll(selector)`.
    async fn query_within(
        &self,
        scope: &ElementRef,
        selector: &str,
    ) -> Result<Vec<ElementRef>, DomError>;

    /// First node of an absolute XPath such as `/html/body/div[2]/button`.
    async fn query_xpath(&self, path: &str) -> Result<Option<ElementRef>, DomError>;

    /// `element.closest(selector)`, the element itself included.
    async fn closest(
        &self,
        element: &ElementRef,
        selector: &str,
    ) -> Result<Option<ElementRef>, DomError>;

    /// `None` when the element is detached or was replaced by a re-render.
    async fn inspect(&self, element: &ElementRef) -> Result<Option<ElementState>, DomError>;

    async fn dispatch(&self, target: &ElementRef, event: &SyntheticEvent) -> Result<(), DomError>;

    async fn focus(&self, target: &ElementRef) -> Result<(), DomError>;

    async fn current_url(&self) -> Result<String, DomError>;

    /// Resolves on the next animation frame.
    async fn next_frame(&self) -> Result<(), DomError>;

    /// Observe child-list, attribute and text changes under the first match of
    /// `root_selector`.
    async fn observe(&self, root_selector: &str) -> Result<MutationStream, DomError>;

    async fn query_first(&self, selector: &str) -> Result<Option<ElementRef>, DomError> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }
}

/// First element matching `selector` that is laid out and not `visibility: hidden`.
pub async fn first_visible(
    port: &dyn DomPort,
    selector: &str,
) -> Result<Option<(ElementRef, ElementState)>, DomError> {
    for element in port.query_all(selector).await? {
        if let Some(state) = port.inspect(&element).await? {
            if state.is_visible() {
                return Ok(Some((element, state)));
            }
        }
    }
    Ok(None)
}

/// Every element matching `selector` whose state passes `keep`.
pub async fn collect_matching<F>(
    port: &dyn DomPort,
    selector: &str,
    mut keep: F,
) -> Result<Vec<(ElementRef, ElementState)>, DomError>
where
    F: FnMut(&ElementState) -> bool + Send,
{
    let mut out = Vec::new();
    for element in port.query_all(selector).await? {
        if let Some(state) = port.inspect(&element).await? {
            if keep(&state) {
                out.push((element, state));
            }
        }
    }
    Ok(out)
}
