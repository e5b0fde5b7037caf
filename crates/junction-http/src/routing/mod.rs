//! Path matching and request dispatch.
//!
//! - [`pattern`] compiles path specs into matchers.
//! - [`params`] holds captured parameters and the merge rule for mounts.
//! - [`handler`] defines handler traits and the [`Flow`] they return.
//! - [`layer`] and [`route`] are the nodes a [`Router`] dispatches through.
//! - [`router`] is the dispatch engine.

pub mod handler;
pub mod layer;
pub mod params;
pub mod pattern;
pub mod route;
pub mod router;

pub use handler::{
    error_handler, handler, param_handler, BoxFuture, Callback, Callbacks, ErrorHandler, Flow,
    Handler, HandlerResult, ParamHandler,
};
pub use layer::{Layer, LayerKind};
pub use params::{ParamKey, Params};
pub use pattern::{decode_param, PathMatch, PathPattern, PathSpec, PatternOptions};
pub use route::Route;
pub use router::{Outcome, Router, RouterOptions, RouterScope};
