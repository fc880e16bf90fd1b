use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use dom_port::{DomError, DomPort, ElementState, MutationBatch, MutationStream, SyntheticEvent};
use slotpilot_core_types::{ElementRef, Rect};

use crate::error::{to_dom_error, AdapterError, AdapterErrorKind};
use crate::script::{call, erased::Arg};

/// [`DomPort`] over one Chromium tab.
#[derive(Clone)]
pub struct ChromiumDom {
    page: Page,
    mutation_poll: Duration,
}

#[derive(Deserialize)]
struct Envelope<T> {
    value: T,
}

#[derive(Deserialize)]
struct RawRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

#[derive(Deserialize)]
struct RawState {
    tag: String,
    laid_out: bool,
    visibility_hidden: bool,
    disabled: bool,
    rect: RawRect,
    text: String,
    attributes: BTreeMap<String, String>,
    classes: Vec<String>,
}

impl From<RawState> for ElementState {
    fn from(raw: RawState) -> Self {
        ElementState {
            tag: raw.tag,
            laid_out: raw.laid_out,
            visibility_hidden: raw.visibility_hidden,
            disabled: raw.disabled,
            rect: Rect::new(raw.rect.x, raw.rect.y, raw.rect.width, raw.rect.height),
            text: raw.text,
            attributes: raw.attributes,
            classes: raw.classes,
        }
    }
}

#[derive(Serialize)]
struct RawInit {
    bubbles: bool,
    cancelable: bool,
}

#[derive(Serialize)]
struct RawPoint {
    x: f64,
    y: f64,
}

impl ChromiumDom {
    pub fn new(page: Page, mutation_poll: Duration) -> Self {
        Self {
            page,
            mutation_poll,
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub async fn goto(&self, url: &str) -> Result<(), AdapterError> {
        self.page.goto(url).await?;
        Ok(())
    }

    /// Element ids the page still tracks, detached ones not yet swept included.
    pub async fn registered_handles(&self) -> Result<usize, AdapterError> {
        Self::eval(&self.page, "registered", &[]).await
    }

    async fn eval<T: DeserializeOwned>(
        page: &Page,
        method: &str,
        args: &[&dyn Arg],
    ) -> Result<T, AdapterError> {
        let result = page.evaluate(call(method, args)).await?;
        result
            .into_value::<Envelope<T>>()
            .map(|envelope| envelope.value)
            .map_err(|err| {
                AdapterError::new(AdapterErrorKind::Decode).with_hint(format!("{method}: {err}"))
            })
    }

    async fn refs(
        &self,
        method: &str,
        args: &[&dyn Arg],
        selector: &str,
    ) -> Result<Vec<ElementRef>, DomError> {
        let ids: Vec<String> = Self::eval(&self.page, method, args)
            .await
            .map_err(|err| to_dom_error(err, Some(selector)))?;
        Ok(ids.into_iter().map(ElementRef).collect())
    }

    async fn maybe_ref(
        &self,
        method: &str,
        args: &[&dyn Arg],
        selector: Option<&str>,
    ) -> Result<Option<ElementRef>, DomError> {
        let id: Option<String> = Self::eval(&self.page, method, args)
            .await
            .map_err(|err| to_dom_error(err, selector))?;
        Ok(id.map(ElementRef))
    }

    async fn ack(&self, method: &str, args: &[&dyn Arg]) -> Result<(), DomError> {
        let _: bool = Self::eval(&self.page, method, args)
            .await
            .map_err(|err| to_dom_error(err, None))?;
        Ok(())
    }
}

#[async_trait]
impl DomPort for ChromiumDom {
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementRef>, DomError> {
        self.refs("queryAll", &[&selector], selector).await
    }

    async fn query_within(
        &self,
        scope: &ElementRef,
        selector: &str,
    ) -> Result<Vec<ElementRef>, DomError> {
        self.refs("queryWithin", &[&scope.0, &selector], selector).await
    }

    async fn query_xpath(&self, path: &str) -> Result<Option<ElementRef>, DomError> {
        self.maybe_ref("xpath", &[&path], None).await
    }

    async fn closest(
        &self,
        element: &ElementRef,
        selector: &str,
    ) -> Result<Option<ElementRef>, DomError> {
        self.maybe_ref("closest", &[&element.0, &selector], Some(selector))
            .await
    }

    async fn inspect(&self, element: &ElementRef) -> Result<Option<ElementState>, DomError> {
        let raw: Option<RawState> = Self::eval(&self.page, "inspect", &[&element.0])
            .await
            .map_err(|err| to_dom_error(err, None))?;
        Ok(raw.map(ElementState::from))
    }

    async fn dispatch(&self, target: &ElementRef, event: &SyntheticEvent) -> Result<(), DomError> {
        let init = RawInit {
            bubbles: event.init.bubbles,
            cancelable: event.init.cancelable,
        };
        let client = event.client.map(|point| RawPoint {
            x: point.x,
            y: point.y,
        });
        trace!(target: "cdp-adapter", element = %target.0, kind = %event.kind, "dispatch");
        self.ack(
            "dispatch",
            &[&target.0, &event.kind.dom_type(), &init, &client],
        )
        .await
    }

    async fn focus(&self, target: &ElementRef) -> Result<(), DomError> {
        self.ack("focus", &[&target.0]).await
    }

    async fn current_url(&self) -> Result<String, DomError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|err| to_dom_error(err.into(), None))?;
        Ok(url.unwrap_or_default())
    }

    async fn next_frame(&self) -> Result<(), DomError> {
        self.ack("frame", &[]).await
    }

    async fn observe(&self, root_selector: &str) -> Result<MutationStream, DomError> {
        let token: Option<String> = Self::eval(&self.page, "observe", &[&root_selector])
            .await
            .map_err(|err| to_dom_error(err, Some(root_selector)))?;
        let token =
            token.ok_or_else(|| DomError::Script(format!("no observer root `{root_selector}`")))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let page = self.page.clone();
        let poll = self.mutation_poll;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(poll).await;
                if tx.is_closed() {
                    let _ = Self::eval::<bool>(&page, "disconnect", &[&token]).await;
                    break;
                }
                let batches: Option<Vec<usize>> =
                    match Self::eval(&page, "drain", &[&token]).await {
                        Ok(batches) => batches,
                        Err(err) => {
                            debug!(target: "cdp-adapter", %err, "mutation drain failed");
                            None
                        }
                    };
                // A navigation drops the page-side observer.
                let Some(batches) = batches else { break };
                for records in batches {
                    if tx.send(MutationBatch { records }).is_err() {
                        break;
                    }
                }
            }
        });
        Ok(MutationStream::new(rx))
    }
}
