use std::collections::BTreeMap;

use slotpilot_core_types::Rect;

use crate::errors::DomError;
use crate::memory::selector::{self, Chain, Combinator, Step};
use crate::ElementState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    hidden: bool,
    visibility_hidden: bool,
    rect: Rect,
    attached: bool,
}

/// Builder for elements inserted into a [`DomTree`].
#[derive(Debug, Clone)]
pub struct ElementSpec {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    hidden: bool,
    visibility_hidden: bool,
    rect: Rect,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            text: String::new(),
            hidden: false,
            visibility_hidden: false,
            rect: Rect::new(0.0, 0.0, 100.0, 20.0),
        }
    }

    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    /// Space-separated class list, appended to any classes already set.
    pub fn class(mut self, classes: &str) -> Self {
        let merged = match self.attrs.get("class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {classes}"),
            _ => classes.to_string(),
        };
        self.attrs.insert("class".into(), merged);
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    /// `display: none`; the element and its subtree have no `offsetParent`.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn visibility_hidden(mut self) -> Self {
        self.visibility_hidden = true;
        self
    }

    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }
}

/// Arena-backed document. Node ids are never reused, so a handle to a removed
/// node stays dead even when a look-alike replaces it.
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<Node>,
    root: NodeId,
    body: NodeId,
    revision: u64,
    dirty: Vec<NodeId>,
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DomTree {
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
            revision: 0,
            dirty: Vec::new(),
        };
        let root = tree.create(None, ElementSpec::new("html"));
        let body = tree.create(Some(root), ElementSpec::new("body"));
        tree.root = root;
        tree.body = body;
        tree.dirty.clear();
        tree.revision = 0;
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn create(&mut self, parent: Option<NodeId>, spec: ElementSpec) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            tag: spec.tag,
            attrs: spec.attrs,
            text: spec.text,
            hidden: spec.hidden,
            visibility_hidden: spec.visibility_hidden,
            rect: spec.rect,
            attached: true,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
            self.touch(parent);
        }
        id
    }

    fn touch(&mut self, node: NodeId) {
        self.revision += 1;
        self.dirty.push(node);
    }

    pub(crate) fn take_dirty(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.dirty)
    }

    pub fn append(&mut self, parent: NodeId, spec: ElementSpec) -> NodeId {
        self.create(Some(parent), spec)
    }

    /// Detaches `node` and its subtree. Handles to them inspect as absent.
    pub fn remove(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get(node.0).and_then(|n| n.parent) else {
            return;
        };
        self.nodes[parent.0].children.retain(|child| *child != node);
        self.nodes[node.0].parent = None;
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            self.nodes[current.0].attached = false;
            stack.extend(self.nodes[current.0].children.iter().copied());
        }
        self.touch(parent);
    }

    /// Removes every child of `node`.
    pub fn clear_children(&mut self, node: NodeId) {
        let children = self.nodes[node.0].children.clone();
        for child in children {
            self.remove(child);
        }
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        self.nodes[node.0]
            .attrs
            .insert(name.to_string(), value.to_string());
        self.touch(node);
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if self.nodes[node.0].attrs.remove(name).is_some() {
            self.touch(node);
        }
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if self.has_class(node, class) {
            return;
        }
        let mut classes = self.classes(node);
        classes.push(class.to_string());
        self.set_attr(node, "class", &classes.join(" "));
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        if !self.has_class(node, class) {
            return;
        }
        let classes: Vec<String> = self
            .classes(node)
            .into_iter()
            .filter(|c| c != class)
            .collect();
        self.set_attr(node, "class", &classes.join(" "));
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.nodes[node.0].text = text.to_string();
        self.touch(node);
    }

    pub fn set_hidden(&mut self, node: NodeId, hidden: bool) {
        self.nodes[node.0].hidden = hidden;
        self.touch(node);
    }

    pub fn set_visibility_hidden(&mut self, node: NodeId, hidden: bool) {
        self.nodes[node.0].visibility_hidden = hidden;
        self.touch(node);
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.nodes.get(node.0).map(|n| n.attached).unwrap_or(false)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn tag(&self, node: NodeId) -> &str {
        &self.nodes[node.0].tag
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node.0].attrs.get(name).map(String::as_str)
    }

    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.attr(node, "class")
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attr(node, "class")
            .map(|raw| raw.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// `textContent`: own text followed by descendants' text in order.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        out.push_str(&self.nodes[node.0].text);
        for child in &self.nodes[node.0].children {
            self.collect_text(*child, out);
        }
    }

    /// `offsetParent !== null`.
    pub fn is_laid_out(&self, node: NodeId) -> bool {
        if !self.is_attached(node) {
            return false;
        }
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if self.nodes[current.0].hidden {
                return false;
            }
            cursor = self.nodes[current.0].parent;
        }
        true
    }

    fn is_visibility_hidden(&self, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if self.nodes[current.0].visibility_hidden {
                return true;
            }
            cursor = self.nodes[current.0].parent;
        }
        false
    }

    pub fn state(&self, node: NodeId) -> Option<ElementState> {
        if !self.is_attached(node) {
            return None;
        }
        let laid_out = self.is_laid_out(node);
        let raw = &self.nodes[node.0];
        Some(ElementState {
            tag: raw.tag.clone(),
            laid_out,
            visibility_hidden: self.is_visibility_hidden(node),
            disabled: raw.attrs.contains_key("disabled"),
            rect: if laid_out { raw.rect } else { Rect::default() },
            text: self.text_content(node),
            attributes: raw.attrs.clone(),
            classes: self.classes(node),
        })
    }

    fn descendants(&self, node: NodeId, out: &mut Vec<NodeId>) {
        for child in &self.nodes[node.0].children {
            out.push(*child);
            self.descendants(*child, out);
        }
    }

    /// Document-order matches of `selector` under the whole document.
    pub fn select(&self, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let groups = selector::parse_groups(selector)?;
        let mut candidates = vec![self.root];
        self.descendants(self.root, &mut candidates);
        Ok(candidates
            .into_iter()
            .filter(|node| groups.iter().any(|chain| self.matches_chain(*node, chain)))
            .collect())
    }

    /// Document-order matches strictly inside `scope`.
    pub fn select_within(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let groups = selector::parse_groups(selector)?;
        let mut candidates = Vec::new();
        self.descendants(scope, &mut candidates);
        Ok(candidates
            .into_iter()
            .filter(|node| groups.iter().any(|chain| self.matches_chain(*node, chain)))
            .collect())
    }

    pub fn first(&self, selector: &str) -> Option<NodeId> {
        self.select(selector).ok().and_then(|v| v.into_iter().next())
    }

    pub fn matches(&self, node: NodeId, selector: &str) -> Result<bool, DomError> {
        let groups = selector::parse_groups(selector)?;
        Ok(groups.iter().any(|chain| self.matches_chain(node, chain)))
    }

    pub fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, DomError> {
        let groups = selector::parse_groups(selector)?;
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if groups.iter().any(|chain| self.matches_chain(current, chain)) {
                return Ok(Some(current));
            }
            cursor = self.parent(current);
        }
        Ok(None)
    }

    pub fn xpath(&self, path: &str) -> Result<Option<NodeId>, DomError> {
        let steps = selector::parse_xpath(path)?;
        let mut iter = steps.iter();
        let Some(first) = iter.next() else {
            return Ok(None);
        };
        if first.tag != self.nodes[self.root.0].tag || first.index != 1 {
            return Ok(None);
        }
        let mut current = self.root;
        for step in iter {
            let next = self.nodes[current.0]
                .children
                .iter()
                .filter(|child| self.nodes[child.0].tag == step.tag)
                .nth(step.index - 1)
                .copied();
            match next {
                Some(node) => current = node,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    fn matches_chain(&self, node: NodeId, chain: &Chain) -> bool {
        match chain.len() {
            0 => false,
            len => self.matches_from(node, chain, len - 1),
        }
    }

    fn matches_from(&self, node: NodeId, chain: &Chain, idx: usize) -> bool {
        let part = &chain[idx];
        if !self.matches_step(node, &part.step) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match part.combinator.unwrap_or(Combinator::Descendant) {
            Combinator::Child => self
                .parent(node)
                .map(|parent| self.matches_from(parent, chain, idx - 1))
                .unwrap_or(false),
            Combinator::Descendant => {
                let mut cursor = self.parent(node);
                while let Some(ancestor) = cursor {
                    if self.matches_from(ancestor, chain, idx - 1) {
                        return true;
                    }
                    cursor = self.parent(ancestor);
                }
                false
            }
        }
    }

    fn matches_step(&self, node: NodeId, step: &Step) -> bool {
        let raw = &self.nodes[node.0];
        if let Some(tag) = &step.tag {
            if &raw.tag != tag {
                return false;
            }
        }
        if let Some(id) = &step.id {
            if raw.attrs.get("id") != Some(id) {
                return false;
            }
        }
        if !step.classes.iter().all(|class| self.has_class(node, class)) {
            return false;
        }
        step.attrs.iter().all(|cond| match (&cond.value, raw.attrs.get(&cond.name)) {
            (None, Some(_)) => true,
            (Some(expected), Some(actual)) => expected == actual,
            (_, None) => false,
        })
    }
}
