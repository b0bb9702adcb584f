//! Runtime support shipped inside generated bindings.
//!
//! The callback registry is compiled here so it is tested like any other module, and
//! [`REGISTRY_SOURCE`] carries the same text into every generated Rust file.

pub mod registry;

pub use registry::CallbackRegistry;

/// Source of [`registry`], embedded by the Rust emitter.
pub const REGISTRY_SOURCE: &str = include_str!("runtime/registry.rs");

#[cfg(test)]
#[path = "runtime/registry_tests.rs"]
mod registry_tests;
