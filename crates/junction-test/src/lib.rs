//! # junction-test
//!
//! Testing utilities for junction. [`TestClient`] drives an `axum::Router`
//! in-process, so an application built with `junction-app` can be exercised
//! end to end without binding a socket.

pub mod client;

pub use client::{TestClient, TestResponse};
