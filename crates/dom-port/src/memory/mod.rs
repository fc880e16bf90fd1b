//! In-process page used by tests and dry runs.
//!
//! The page reacts to synthetic events through registered handlers, advances
//! animation frames only when a caller awaits [`DomPort::next_frame`], and
//! delivers subtree-scoped mutation batches after every change.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use slotpilot_core_types::{ElementRef, Point};

use crate::errors::DomError;
use crate::event::{EventKind, SyntheticEvent};
use crate::{DomPort, ElementState, MutationBatch, MutationStream};

mod selector;
mod tree;

pub use tree::{DomTree, ElementSpec, NodeId};

type ReactionFn = Box<dyn FnMut(&mut DomTree, NodeId) + Send>;
type FrameFn = Box<dyn FnMut(&mut DomTree, u64) + Send>;

struct Reaction {
    selector: String,
    kind: EventKind,
    handler: ReactionFn,
}

struct Observer {
    root: NodeId,
    tx: mpsc::UnboundedSender<MutationBatch>,
}

/// One event the page received, in arrival order.
#[derive(Clone, Debug, PartialEq)]
pub struct DispatchRecord {
    pub target: ElementRef,
    pub kind: EventKind,
    pub bubbles: bool,
    pub cancelable: bool,
    pub client: Option<Point>,
    /// Animation frames elapsed when the event arrived.
    pub frame: u64,
}

struct Inner {
    tree: DomTree,
    url: String,
    reactions: Vec<Reaction>,
    frame_hooks: Vec<FrameFn>,
    frames: u64,
    log: Vec<DispatchRecord>,
    focused: Option<NodeId>,
    observers: Vec<Observer>,
    observe_supported: bool,
}

impl Inner {
    fn flush(&mut self) {
        let dirty = self.tree.take_dirty();
        if dirty.is_empty() {
            return;
        }
        let tree = &self.tree;
        self.observers.retain(|observer| {
            if observer.tx.is_closed() {
                return false;
            }
            let records = dirty
                .iter()
                .filter(|node| within(tree, **node, observer.root))
                .count();
            if records == 0 {
                return true;
            }
            observer.tx.send(MutationBatch { records }).is_ok()
        });
    }
}

fn within(tree: &DomTree, node: NodeId, root: NodeId) -> bool {
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        if current == root {
            return true;
        }
        cursor = tree.parent(current);
    }
    false
}

pub struct MemoryDom {
    inner: Mutex<Inner>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::with_tree(DomTree::new())
    }
}

impl MemoryDom {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_tree(tree: DomTree) -> Self {
        Self {
            inner: Mutex::new(Inner {
                tree,
                url: "about:blank".into(),
                reactions: Vec::new(),
                frame_hooks: Vec::new(),
                frames: 0,
                log: Vec::new(),
                focused: None,
                observers: Vec::new(),
                observe_supported: true,
            }),
        }
    }

    pub fn handle(node: NodeId) -> ElementRef {
        ElementRef(format!("mem:{}", node.0))
    }

    pub fn node_of(element: &ElementRef) -> Option<NodeId> {
        element
            .0
            .strip_prefix("mem:")
            .and_then(|raw| raw.parse().ok())
            .map(NodeId)
    }

    fn live_node(inner: &Inner, element: &ElementRef) -> Result<NodeId, DomError> {
        match Self::node_of(element) {
            Some(node) if inner.tree.is_attached(node) => Ok(node),
            _ => Err(DomError::Detached(element.clone())),
        }
    }

    /// Applies `f` to the tree and notifies observers of what changed.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut DomTree) -> R) -> R {
        let mut inner = self.inner.lock();
        let out = f(&mut inner.tree);
        inner.flush();
        out
    }

    /// Read-only access to the tree.
    pub fn read<R>(&self, f: impl FnOnce(&DomTree) -> R) -> R {
        let inner = self.inner.lock();
        f(&inner.tree)
    }

    /// Runs `handler` whenever an event of `kind` reaches an element matching
    /// `selector`, either as its target or while bubbling through it.
    pub fn on_event<F>(&self, selector: &str, kind: EventKind, handler: F)
    where
        F: FnMut(&mut DomTree, NodeId) + Send + 'static,
    {
        self.inner.lock().reactions.push(Reaction {
            selector: selector.to_string(),
            kind,
            handler: Box::new(handler),
        });
    }

    /// Runs `hook` on every animation frame with the new frame count.
    pub fn on_frame<F>(&self, hook: F)
    where
        F: FnMut(&mut DomTree, u64) + Send + 'static,
    {
        self.inner.lock().frame_hooks.push(Box::new(hook));
    }

    pub fn set_url(&self, url: &str) {
        self.inner.lock().url = url.to_string();
    }

    /// Makes `observe` fail, as on pages where no observer can be installed.
    pub fn disable_observers(&self) {
        self.inner.lock().observe_supported = false;
    }

    pub fn frames(&self) -> u64 {
        self.inner.lock().frames
    }

    pub fn dispatch_log(&self) -> Vec<DispatchRecord> {
        self.inner.lock().log.clone()
    }

    /// Events of `kind` delivered to `target`.
    pub fn events_on(&self, target: NodeId, kind: EventKind) -> usize {
        let handle = Self::handle(target);
        self.inner
            .lock()
            .log
            .iter()
            .filter(|record| record.target == handle && record.kind == kind)
            .count()
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.inner.lock().focused
    }

    /// Live observers, after pruning the ones whose stream was dropped.
    pub fn observer_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.observers.retain(|observer| !observer.tx.is_closed());
        inner.observers.len()
    }
}

#[async_trait]
impl DomPort for MemoryDom {
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementRef>, DomError> {
        let inner = self.inner.lock();
        Ok(inner
            .tree
            .select(selector)?
            .into_iter()
            .map(Self::handle)
            .collect())
    }

    async fn query_within(
        &self,
        scope: &ElementRef,
        selector: &str,
    ) -> Result<Vec<ElementRef>, DomError> {
        let inner = self.inner.lock();
        let scope = Self::live_node(&inner, scope)?;
        Ok(inner
            .tree
            .select_within(scope, selector)?
            .into_iter()
            .map(Self::handle)
            .collect())
    }

    async fn query_xpath(&self, path: &str) -> Result<Option<ElementRef>, DomError> {
        let inner = self.inner.lock();
        Ok(inner.tree.xpath(path)?.map(Self::handle))
    }

    async fn closest(
        &self,
        element: &ElementRef,
        selector: &str,
    ) -> Result<Option<ElementRef>, DomError> {
        let inner = self.inner.lock();
        let node = Self::live_node(&inner, element)?;
        Ok(inner.tree.closest(node, selector)?.map(Self::handle))
    }

    async fn inspect(&self, element: &ElementRef) -> Result<Option<ElementState>, DomError> {
        let inner = self.inner.lock();
        Ok(Self::node_of(element).and_then(|node| inner.tree.state(node)))
    }

    async fn dispatch(&self, target: &ElementRef, event: &SyntheticEvent) -> Result<(), DomError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let node = Self::live_node(inner, target)?;
        inner.log.push(DispatchRecord {
            target: target.clone(),
            kind: event.kind,
            bubbles: event.init.bubbles,
            cancelable: event.init.cancelable,
            client: event.client,
            frame: inner.frames,
        });
        trace!(target = %target, event = %event.kind, "memory dispatch");

        let mut path = vec![node];
        if event.init.bubbles {
            let mut cursor = inner.tree.parent(node);
            while let Some(ancestor) = cursor {
                path.push(ancestor);
                cursor = inner.tree.parent(ancestor);
            }
        }
        for current in path {
            for reaction in inner.reactions.iter_mut() {
                if reaction.kind != event.kind || !inner.tree.is_attached(current) {
                    continue;
                }
                if inner.tree.matches(current, &reaction.selector).unwrap_or(false) {
                    (reaction.handler)(&mut inner.tree, current);
                }
            }
        }
        inner.flush();
        Ok(())
    }

    async fn focus(&self, target: &ElementRef) -> Result<(), DomError> {
        let mut inner = self.inner.lock();
        let node = Self::live_node(&inner, target)?;
        inner.focused = Some(node);
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DomError> {
        Ok(self.inner.lock().url.clone())
    }

    async fn next_frame(&self) -> Result<(), DomError> {
        {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            inner.frames += 1;
            let frame = inner.frames;
            for hook in inner.frame_hooks.iter_mut() {
                hook(&mut inner.tree, frame);
            }
            inner.flush();
        }
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn observe(&self, root_selector: &str) -> Result<MutationStream, DomError> {
        let mut inner = self.inner.lock();
        if !inner.observe_supported {
            return Err(DomError::Unsupported("mutation observers"));
        }
        let root = inner
            .tree
            .select(root_selector)?
            .into_iter()
            .next()
            .ok_or_else(|| DomError::Script(format!("no observer root `{root_selector}`")))?;
        let (tx, rx) = mpsc::unbounded_channel();
        inner.observers.push(Observer { root, tx });
        Ok(MutationStream::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotpilot_core_types::Rect;

    #[tokio::test]
    async fn bubbling_event_reaches_delegated_handler() {
        let dom = MemoryDom::new();
        let (button, icon) = dom.mutate(|tree| {
            let body = tree.body();
            let button = tree.append(body, ElementSpec::new("span").attr("role", "button"));
            let icon = tree.append(button, ElementSpec::new("span").class("k-icon k-i-calendar"));
            (button, icon)
        });
        dom.on_event(r#"span[role="button"]"#, EventKind::Click, |tree, node| {
            tree.set_attr(node, "aria-expanded", "true");
        });

        let event = SyntheticEvent::pointer(EventKind::Click, Point::default());
        dom.dispatch(&MemoryDom::handle(icon), &event).await.unwrap();
        let expanded = dom.read(|tree| tree.attr(button, "aria-expanded").map(str::to_string));
        assert_eq!(expanded.as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn non_bubbling_event_stays_on_target() {
        let dom = MemoryDom::new();
        let (outer, inner) = dom.mutate(|tree| {
            let body = tree.body();
            let outer = tree.append(body, ElementSpec::new("div").class("outer"));
            let inner = tree.append(outer, ElementSpec::new("input"));
            (outer, inner)
        });
        dom.on_event(".outer", EventKind::Change, move |tree, node| {
            tree.set_attr(node, "seen", "1");
        });
        let mut event = SyntheticEvent::notify(EventKind::Change);
        event.init.bubbles = false;
        dom.dispatch(&MemoryDom::handle(inner), &event).await.unwrap();
        assert!(dom.read(|tree| tree.attr(outer, "seen").is_none()));
    }

    #[tokio::test]
    async fn dispatch_to_removed_node_is_detached() {
        let dom = MemoryDom::new();
        let node = dom.mutate(|tree| {
            let body = tree.body();
            let node = tree.append(
                body,
                ElementSpec::new("div").rect(Rect::new(0.0, 0.0, 5.0, 5.0)),
            );
            tree.remove(node);
            node
        });
        let handle = MemoryDom::handle(node);
        assert!(dom.inspect(&handle).await.unwrap().is_none());
        let err = dom
            .dispatch(&handle, &SyntheticEvent::notify(EventKind::Input))
            .await
            .unwrap_err();
        assert_eq!(err, DomError::Detached(handle));
    }

    #[tokio::test]
    async fn observers_are_scoped_and_pruned() {
        let dom = MemoryDom::new();
        let (form, aside) = dom.mutate(|tree| {
            let body = tree.body();
            let form = tree.append(body, ElementSpec::new("form"));
            let aside = tree.append(body, ElementSpec::new("aside"));
            (form, aside)
        });
        let mut stream = dom.observe("form").await.unwrap();
        dom.mutate(|tree| tree.set_text(aside, "elsewhere"));
        dom.mutate(|tree| {
            tree.append(form, ElementSpec::new("div").class("mb-3"));
        });
        assert_eq!(stream.next().await, Some(MutationBatch { records: 1 }));
        assert_eq!(dom.observer_count(), 1);
        stream.disconnect();
        assert_eq!(dom.observer_count(), 0);
    }

    #[tokio::test]
    async fn frame_hooks_run_once_per_frame() {
        let dom = MemoryDom::new();
        let loader = dom.mutate(|tree| {
            let body = tree.body();
            tree.append(body, ElementSpec::new("div").class("global-overlay-loader"))
        });
        dom.on_frame(move |tree, frame| {
            if frame == 3 {
                tree.remove(loader);
            }
        });
        for _ in 0..3 {
            dom.next_frame().await.unwrap();
        }
        assert_eq!(dom.frames(), 3);
        assert!(dom.query_all(".global-overlay-loader").await.unwrap().is_empty());
    }
}
