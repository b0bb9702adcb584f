//! Serde mirror of the manifest document.
//!
//! Two dialects are accepted. The canonical one uses `functions`, `params`, `return`, `doc`
//! and `members`; plugin manifests (`.pplugin`) use `methods`, `paramTypes`, `retType`,
//! `description` and `values`, and may declare enums and callback prototypes inline on the
//! parameter that uses them. Unknown fields are ignored.

use serde::Deserialize;
use serde_json::{Number, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: Option<Value>,
    #[serde(default, alias = "doc")]
    pub description: Option<String>,
    #[serde(default, alias = "createdBy")]
    pub author: Option<String>,
    #[serde(default, alias = "createdByURL")]
    pub website: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub enums: Vec<RawEnum>,
    #[serde(default)]
    pub callbacks: Vec<RawCallback>,
    #[serde(default, alias = "methods", alias = "exportedMethods")]
    pub functions: Vec<RawFunction>,
    #[serde(default)]
    pub classes: Vec<RawClass>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawEnum {
    #[serde(default)]
    pub name: String,
    /// Underlying integer type. Inline enums inherit the parameter's type instead.
    #[serde(default, rename = "type")]
    pub ty: Option<String>,
    #[serde(default, alias = "description")]
    pub doc: Option<String>,
    #[serde(default, alias = "values")]
    pub members: Vec<RawEnumMember>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawEnumMember {
    #[serde(default)]
    pub name: String,
    /// Omitted values continue from the previous member, starting at zero.
    #[serde(default)]
    pub value: Option<Number>,
    #[serde(default, alias = "description")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawCallback {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "description")]
    pub doc: Option<String>,
    #[serde(default, alias = "paramTypes")]
    pub params: Vec<RawParam>,
    #[serde(default, rename = "return", alias = "retType")]
    pub ret: Option<RawReturn>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawFunction {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "description")]
    pub doc: Option<String>,
    #[serde(default)]
    pub deprecated: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default, alias = "paramTypes")]
    pub params: Vec<RawParam>,
    #[serde(default, rename = "return", alias = "retType")]
    pub ret: Option<RawReturn>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, rename = "ref")]
    pub by_ref: bool,
    #[serde(default, alias = "description")]
    pub doc: Option<String>,
    #[serde(default)]
    pub ownership: Option<String>,
    #[serde(default, rename = "enum")]
    pub inline_enum: Option<RawEnum>,
    #[serde(default)]
    pub prototype: Option<Box<RawCallback>>,
    #[serde(default)]
    pub default: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawReturn {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, alias = "description")]
    pub doc: Option<String>,
    #[serde(default)]
    pub ownership: Option<String>,
    #[serde(default, rename = "enum")]
    pub inline_enum: Option<RawEnum>,
    #[serde(default)]
    pub prototype: Option<Box<RawCallback>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawClass {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "description")]
    pub doc: Option<String>,
    #[serde(default, alias = "handle")]
    pub handle_type: Option<String>,
    #[serde(default)]
    pub invalid_value: Option<Value>,
    #[serde(default)]
    pub constructors: Vec<String>,
    #[serde(default)]
    pub destructor: Option<String>,
    #[serde(default)]
    pub bindings: Vec<RawBinding>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawBinding {
    #[serde(default)]
    pub name: String,
    pub method: String,
    #[serde(default)]
    pub bind_self: bool,
    #[serde(default)]
    pub param_aliases: Vec<Option<RawAlias>>,
    #[serde(default)]
    pub ret_alias: Option<RawAlias>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawAlias {
    pub name: String,
    #[serde(default)]
    pub owner: bool,
}
