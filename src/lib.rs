//! Dynframe: Dynamic-Context Propagation
//!
//! A closure keeps its lexical environment but loses its dynamic one: the error handlers and
//! rebound cells that were in effect where it was created. Wrapping a callback with
//! [`create_context`] captures that dynamic environment as a frame in a parent-pointer tree and
//! reinstalls it whenever the wrapper is invoked, no matter who invokes it or when.

pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod logging;

pub use context::{
    create_context, current_trace, wrap, ContextFn, ContextOptions, Fault, FaultOrigin, Outcome,
};
pub use error::{ConfigError, SettingsError};
pub use frame::{
    build_trace, current_context, is_context, with_scoped_value, AsWrapperId, DynamicCell, Frame,
    Trace, WrapperId,
};
