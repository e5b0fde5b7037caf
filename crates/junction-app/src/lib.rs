//! # junction-app
//!
//! The application layer of junction. An [`App`] owns its [`Settings`], a
//! lazily created root [`Router`], view engines and template locals. Apps
//! mount inside other apps, inheriting the settings they did not set
//! themselves, and freeze into an [`Application`] that answers requests
//! directly or through axum.
//!
//! ## Modules
//!
//! - [`app`] - the application builder and its shared context
//! - [`view`] - view lookup and the [`ViewEngine`] trait
//! - [`server`] - the axum adapter and `run`
//!
//! [`Settings`]: junction_core::Settings
//! [`Router`]: junction_http::Router

pub mod app;
pub mod server;
pub mod view;

pub use app::{App, AppContext, Application, MountPoint};
pub use view::{RenderExt, View, ViewEngine};
