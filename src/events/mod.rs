//! Hook for observing committed team changes.
//!
//! The engine dispatches a [`TeamEvent`] after each successful mutation.
//! With no listeners registered, dispatch is a no-op. This is where an audit
//! trail attaches.
//!
//! ```rust,ignore
//! use teamgate::register_event_listeners;
//! use teamgate::events::listeners::LoggingListener;
//!
//! register_event_listeners(|registry| {
//!     registry.listen(LoggingListener::new());
//! });
//! ```

mod event;
mod listener;
mod registry;

pub mod listeners;

pub use event::TeamEvent;
pub use listener::Listener;
pub use registry::{EventRegistry, dispatch, register_event_listeners};
