//! In-process event dispatch.
//!
//! # Architecture
//!
//! Remote events are decoded by bridge tasks and republished here:
//! - `EventDispatcher`: name → ordered handler list, frozen once shared
//! - `publish` spawns the dispatch and returns immediately; handlers for one
//!   event are started in registration order and run concurrently
//! - `event_types`: the remote event catalogue and local event names

mod dispatcher;
pub mod event_types;

pub use dispatcher::{
    handler_fn, DispatchError, DispatchHandle, EventDispatcher, EventHandler, FnHandler,
    HandlerError, HandlerFailure,
};
pub use event_types::RemoteEvent;
