//! Resilient automation engine for chat-style web UIs.
//!
//! The target page is treated as an untrusted, uncooperative black box: its
//! markup is unversioned, elements appear and disappear, and streamed answers
//! carry no explicit "done" signal. The engine therefore touches the page
//! only through narrow locate, inject, and observe verbs behind the
//! [`surface::DocumentSurface`] seam, which keeps the whole pipeline testable
//! against a simulated document and runnable against a live chromiumoxide
//! page.
//!
//! One automation cycle runs the locator, the injector, the submission
//! protocol, and the completion detector in order, sequenced by
//! [`engine::AutomationEngine`]. Cycles are strictly sequential; overlapping
//! response streams cannot be told apart.

pub mod config;
pub mod detect;
pub mod dom_scripts;
pub mod engine;
pub mod export;
pub mod inject;
pub mod locator;
pub mod logging;
pub mod page;
pub mod runner;
pub mod runtime;
pub mod submit;
pub mod surface;
pub mod types;
