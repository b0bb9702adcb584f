//! plugify-gen - Plugin manifest to language bindings
//!
//! This crate turns a plugin manifest into ready-to-compile bindings for C, C++, D, C#, Go,
//! Lua (LuaJIT FFI), Python (ctypes) and Rust:
//!
//! ```text
//! manifest text
//!     ↓  plugify_gen_manifest::load
//! Package (IR)
//!     ↓  classes::synthesize        handle families grouped into classes
//!     ↓  callbacks / symbols / abi  per-target checks, names, C signatures
//!     ↓  codegen::generate          one emitter per target
//! {file name: contents}
//! ```
//!
//! Generated code never links against the plugin. It receives a resolver at start-up,
//! looks every `"<package>.<Function>"` symbol up once and calls through the resolved table.
//! Callback parameters are served by per-type registries of fixed trampoline slots.
//!
//! # Example
//!
//! ```
//! use plugify_gen::{GeneratorOptions, convert};
//!
//! let manifest = r#"{
//!     "name": "demo",
//!     "version": "1.0.0",
//!     "functions": [
//!         { "name": "Add", "params": [{ "name": "a", "type": "int32" }, { "name": "b", "type": "int32" }],
//!           "return": { "type": "int32" } }
//!     ]
//! }"#;
//!
//! let conversion = convert(manifest, "python", &GeneratorOptions::default()).unwrap();
//! assert!(conversion.files["demo.py"].contains("def add(a: int, b: int) -> int:"));
//! ```

pub mod abi;
pub mod callbacks;
pub mod classes;
pub mod codegen;
pub mod error;
pub mod facade;
pub mod naming;
pub mod options;
pub mod reserved;
pub mod runtime;
pub mod symbols;
pub mod target;
pub mod types;

pub use classes::{ClassModel, Receiver, Synthesis, synthesize};
pub use codegen::{Files, VERSION};
pub use error::{GenError, GenResult};
pub use facade::{Conversion, ConvertResult, convert, convert_to_json, supported_targets, version};
pub use options::{DEFAULT_CALLBACK_SLOTS, GeneratorOptions, MAX_CALLBACK_SLOTS};
pub use target::Target;

pub use plugify_gen_manifest::{ManifestError, Package, load};
