use async_trait::async_trait;
use futures::future::BoxFuture;

use dom_port::{first_visible, DomError, DomPort, ElementState};
use slotpilot_core_types::ElementRef;

/// Side-effect-free predicate over the page, re-evaluated until it yields.
///
/// `Ok(None)` means "not yet". Errors are treated the same way by the poller.
#[async_trait]
pub trait Condition: Send + Sync {
    type Output: Send;

    async fn evaluate(&self, port: &dyn DomPort) -> Result<Option<Self::Output>, DomError>;
}

/// First visible element matching a selector.
#[derive(Clone, Debug)]
pub struct VisibleMatch {
    pub selector: String,
}

impl VisibleMatch {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

#[async_trait]
impl Condition for VisibleMatch {
    type Output = (ElementRef, ElementState);

    async fn evaluate(&self, port: &dyn DomPort) -> Result<Option<Self::Output>, DomError> {
        first_visible(port, &self.selector).await
    }
}

/// First element matching a selector, visible or not.
#[derive(Clone, Debug)]
pub struct Present {
    pub selector: String,
}

impl Present {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

#[async_trait]
impl Condition for Present {
    type Output = ElementRef;

    async fn evaluate(&self, port: &dyn DomPort) -> Result<Option<Self::Output>, DomError> {
        port.query_first(&self.selector).await
    }
}

/// Condition backed by a closure returning a boxed future.
pub struct FnCondition<F> {
    f: F,
}

#[async_trait]
impl<F, T> Condition for FnCondition<F>
where
    F: for<'a> Fn(&'a dyn DomPort) -> BoxFuture<'a, Result<Option<T>, DomError>> + Send + Sync,
    T: Send,
{
    type Output = T;

    async fn evaluate(&self, port: &dyn DomPort) -> Result<Option<T>, DomError> {
        (self.f)(port).await
    }
}

pub fn condition_fn<F, T>(f: F) -> FnCondition<F>
where
    F: for<'a> Fn(&'a dyn DomPort) -> BoxFuture<'a, Result<Option<T>, DomError>> + Send + Sync,
    T: Send,
{
    FnCondition { f }
}
