//! Chromium DevTools Protocol implementation of [`dom_port::DomPort`].
//!
//! [`BrowserSession`] launches or attaches to Chromium through chromiumoxide;
//! [`ChromiumDom`] evaluates a small page-side helper for every port call.

pub mod config;
pub mod dom;
pub mod error;
mod script;
pub mod session;

pub use config::{detect_chrome_executable, CdpConfig};
pub use dom::ChromiumDom;
pub use error::{AdapterError, AdapterErrorKind};
pub use session::BrowserSession;
