//! Plugin manifest model and loader.
//!
//! A manifest describes the exported surface of a native plugin: its enums, callback
//! signatures, functions and (optionally) classes. This crate turns manifest text into a
//! validated, fully resolved [`Package`]:
//!
//! ```text
//! manifest text
//!     ↓
//!  [schema]   serde structs mirroring the JSON layout (both manifest dialects)
//!     ↓
//!  [loader]   inline-definition hoisting, type resolution, validation
//!     ↓
//!  Package    every type reference resolved to an IR node
//! ```
//!
//! # Example
//!
//! ```
//! use plugify_gen_manifest::{load, TypeRef};
//!
//! let package = load(r#"{
//!     "name": "demo",
//!     "version": "1.0.0",
//!     "functions": [
//!         { "name": "Add", "params": [{ "name": "a", "type": "int32" }, { "name": "b", "type": "int32" }],
//!           "return": { "type": "int32" } }
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(package.functions[0].params.len(), 2);
//! assert_eq!(package.functions[0].ret.ty, TypeRef::int(32, true));
//! ```

mod error;
mod loader;
mod model;
mod schema;

pub use error::{ManifestError, ManifestResult};
pub use loader::load;
pub use model::{
    BindingDecl, CallbackId, CallbackType, ClassAlias, ClassDecl, EnumId, EnumMember, EnumType,
    FloatWidth, FunctionDescriptor, HandleWidth, IntRepr, Ownership, Package, ParamDescriptor,
    ReturnDescriptor, SharedType, TypeRef, is_identifier,
};
