//! Page-side helper the adapter evaluates against.
//!
//! Elements handed to Rust are registered under short ids (`n1`, `n2`, ...)
//! and held through `WeakRef`, so a re-rendered node simply stops resolving.
//! Every 256 new ids the registry drops entries whose node is gone.
//! The helper is installed lazily on every call because a navigation drops it.

use serde::Serialize;

pub(crate) const DETACHED_MARKER: &str = "slotpilot-detached:";

const PRELUDE: &str = r#"if (!window.__slotpilot) {
  window.__slotpilot = (() => {
    const SWEEP_EVERY = 256;
    const nodes = new Map();
    const ids = new WeakMap();
    const observers = new Map();
    let seq = 0;
    let issued = 0;
    const sweep = () => {
      for (const [id, weak] of nodes) {
        const el = weak.deref();
        if (!el || !el.isConnected) nodes.delete(id);
      }
    };
    const ref = (el) => {
      let id = ids.get(el);
      if (!id) {
        id = 'n' + (++seq);
        ids.set(el, id);
        if (++issued % SWEEP_EVERY === 0) sweep();
      }
      if (!nodes.has(id)) nodes.set(id, new WeakRef(el));
      return id;
    };
    const get = (id) => {
      const weak = nodes.get(id);
      const el = weak && weak.deref();
      if (!el || !el.isConnected) {
        nodes.delete(id);
        return null;
      }
      return el;
    };
    const need = (id) => {
      const el = get(id);
      if (!el) throw new Error('slotpilot-detached:' + id);
      return el;
    };
    const all = (scope, selector) => Array.from(scope.querySelectorAll(selector), ref);
    return {
      queryAll: (selector) => all(document, selector),
      queryWithin: (id, selector) => all(need(id), selector),
      xpath: (path) => {
        const node = document.evaluate(
          path, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null,
        ).singleNodeValue;
        return node instanceof Element ? ref(node) : null;
      },
      closest: (id, selector) => {
        const el = need(id).closest(selector);
        return el ? ref(el) : null;
      },
      inspect: (id) => {
        const el = get(id);
        if (!el) return null;
        const rect = el.getBoundingClientRect();
        const attributes = {};
        for (const attr of el.attributes) attributes[attr.name] = attr.value;
        return {
          tag: el.tagName.toLowerCase(),
          laid_out: el.offsetParent !== null,
          visibility_hidden: getComputedStyle(el).visibility === 'hidden',
          disabled: el.hasAttribute('disabled'),
          rect: { x: rect.x, y: rect.y, width: rect.width, height: rect.height },
          text: el.textContent || '',
          attributes,
          classes: Array.from(el.classList),
        };
      },
      dispatch: (id, type, init, client) => {
        const el = need(id);
        const event = client
          ? new MouseEvent(type, { ...init, clientX: client.x, clientY: client.y, view: window })
          : new Event(type, init);
        el.dispatchEvent(event);
        return true;
      },
      focus: (id) => {
        need(id).focus();
        return true;
      },
      registered: () => nodes.size,
      frame: () => new Promise((resolve) => requestAnimationFrame(() => resolve(true))),
      observe: (selector) => {
        const root = document.querySelector(selector);
        if (!root) return null;
        const token = 'o' + (++seq);
        const entry = { batches: [] };
        entry.observer = new MutationObserver((records) => entry.batches.push(records.length));
        entry.observer.observe(root, {
          childList: true, subtree: true, attributes: true, characterData: true,
        });
        observers.set(token, entry);
        return token;
      },
      drain: (token) => {
        const entry = observers.get(token);
        if (!entry) return null;
        const out = entry.batches;
        entry.batches = [];
        return out;
      },
      disconnect: (token) => {
        const entry = observers.get(token);
        if (entry) {
          entry.observer.disconnect();
          observers.delete(token);
        }
        return true;
      },
    };
  })();
}
"#;

/// Builds a call to `__slotpilot.<method>(<args>)` with the helper prelude in
/// front. The result resolves to `{ value }` so a `null` survives the trip.
pub(crate) fn call(method: &str, args: &[&dyn erased::Arg]) -> String {
    let rendered: Vec<String> = args.iter().map(|arg| arg.render()).collect();
    format!(
        "{PRELUDE}(async () => ({{ value: await window.__slotpilot.{method}({}) }}))()",
        rendered.join(", ")
    )
}

pub(crate) mod erased {
    use super::Serialize;

    /// JSON-encodable call argument.
    pub trait Arg: Sync {
        fn render(&self) -> String;
    }

    impl<T: Serialize + Sync> Arg for T {
        fn render(&self) -> String {
            serde_json::to_string(self).unwrap_or_else(|_| "null".into())
        }
    }
}
