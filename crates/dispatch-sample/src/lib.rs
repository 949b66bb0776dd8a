//! # Dispatch Sample Library
//!
//! A demo application embedding the dispatch engine. The modules are exposed
//! for integration testing.

pub mod async_actor;
pub mod echo_actor;
pub mod error;
pub mod lifecycle;
pub mod permission_actor;
