//! Intermediate representation of a plugin manifest.
//!
//! Everything here is plain data. A [`Package`] is built once by the loader and is read-only
//! afterwards; every [`TypeRef`] in it points at a node that exists in the same package.

use std::collections::BTreeSet;
use std::fmt;

/// A validated plugin manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub website: Option<String>,
    pub license: Option<String>,
    pub enums: Vec<EnumType>,
    pub callbacks: Vec<CallbackType>,
    pub functions: Vec<FunctionDescriptor>,
    pub classes: Vec<ClassDecl>,
    /// Shared value types referenced anywhere in the package.
    pub shared_types: BTreeSet<SharedType>,
}

impl Package {
    pub fn enum_type(&self, id: EnumId) -> &EnumType {
        &self.enums[id.0]
    }

    pub fn callback(&self, id: CallbackId) -> &CallbackType {
        &self.callbacks[id.0]
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Render a type the way a manifest would spell it.
    pub fn type_name(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::Enum(id) => self.enum_type(*id).name.clone(),
            TypeRef::Callback(id) => self.callback(*id).name.clone(),
            TypeRef::Array(inner) => format!("{}[]", self.type_name(inner)),
            other => other.to_string(),
        }
    }

    /// True when some function returns plugin-allocated memory the caller must release.
    pub fn needs_free(&self) -> bool {
        self.functions.iter().any(|f| match &f.ret.ty {
            TypeRef::Str(Ownership::Owned) | TypeRef::Array(_) => true,
            _ => false,
        })
    }
}

/// Fixed-layout value types shared between the plugin and every target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SharedType {
    Vec2,
    Vec3,
    Vec4,
    Mat4x4,
}

impl SharedType {
    pub const ALL: [SharedType; 4] = [
        SharedType::Vec2,
        SharedType::Vec3,
        SharedType::Vec4,
        SharedType::Mat4x4,
    ];

    /// Canonical type name, as emitted in C-family targets.
    pub fn name(self) -> &'static str {
        match self {
            SharedType::Vec2 => "Vec2",
            SharedType::Vec3 => "Vec3",
            SharedType::Vec4 => "Vec4",
            SharedType::Mat4x4 => "Mat4x4",
        }
    }

    /// Manifest spelling.
    pub fn manifest_name(self) -> &'static str {
        match self {
            SharedType::Vec2 => "vec2",
            SharedType::Vec3 => "vec3",
            SharedType::Vec4 => "vec4",
            SharedType::Mat4x4 => "mat4x4",
        }
    }

    /// Field names in memory order. `Mat4x4` is a single `m[16]` array.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            SharedType::Vec2 => &["x", "y"],
            SharedType::Vec3 => &["x", "y", "z"],
            SharedType::Vec4 => &["x", "y", "z", "w"],
            SharedType::Mat4x4 => &["m"],
        }
    }

    /// Number of `f32` components.
    pub fn float_count(self) -> usize {
        match self {
            SharedType::Vec2 => 2,
            SharedType::Vec3 => 3,
            SharedType::Vec4 => 4,
            SharedType::Mat4x4 => 16,
        }
    }
}

/// Integer width and signedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntRepr {
    pub width: u8,
    pub signed: bool,
}

impl IntRepr {
    pub const fn new(width: u8, signed: bool) -> Self {
        Self { width, signed }
    }

    /// Inclusive value range.
    pub fn range(self) -> (i128, i128) {
        let bits = u32::from(self.width);
        if self.signed {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        } else {
            (0, (1i128 << bits) - 1)
        }
    }

    pub fn contains(self, value: i64) -> bool {
        let (min, max) = self.range();
        (min..=max).contains(&i128::from(value))
    }

    /// Index into `[i8, i16, i32, i64, u8, u16, u32, u64]` style tables.
    pub fn table_index(self) -> usize {
        let base = match self.width {
            8 => 0,
            16 => 1,
            32 => 2,
            _ => 3,
        };
        if self.signed { base } else { base + 4 }
    }
}

impl fmt::Display for IntRepr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.signed { "int" } else { "uint" };
        write!(f, "{prefix}{}", self.width)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleWidth {
    W32,
    W64,
}

impl HandleWidth {
    pub fn repr(self) -> IntRepr {
        match self {
            HandleWidth::W32 => IntRepr::new(32, false),
            HandleWidth::W64 => IntRepr::new(64, false),
        }
    }
}

/// Who owns the bytes of a string crossing the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Ownership {
    /// The receiver takes ownership: returned strings are released through the package's
    /// `Free` entry point after copying.
    #[default]
    Owned,
    /// The sender keeps ownership: the receiver copies or borrows, and never releases.
    Borrowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnumId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallbackId(pub usize);

/// Closed set of IR types. Downstream stages switch on this, never on type strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Void,
    Bool,
    Int(IntRepr),
    Float(FloatWidth),
    Str(Ownership),
    Handle(HandleWidth),
    Array(Box<TypeRef>),
    Enum(EnumId),
    Callback(CallbackId),
    Shared(SharedType),
}

impl TypeRef {
    pub const fn int(width: u8, signed: bool) -> Self {
        TypeRef::Int(IntRepr::new(width, signed))
    }

    pub fn array(inner: TypeRef) -> Self {
        TypeRef::Array(Box::new(inner))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Void)
    }

    /// Types that fit in a register and may be passed through a mutable pointer.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            TypeRef::Bool
                | TypeRef::Int(_)
                | TypeRef::Float(_)
                | TypeRef::Handle(_)
                | TypeRef::Enum(_)
        )
    }

    /// Visit this type and every type nested inside it.
    pub fn walk(&self, visit: &mut impl FnMut(&TypeRef)) {
        visit(self);
        if let TypeRef::Array(inner) = self {
            inner.walk(visit);
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Void => f.write_str("void"),
            TypeRef::Bool => f.write_str("bool"),
            TypeRef::Int(repr) => write!(f, "{repr}"),
            TypeRef::Float(FloatWidth::F32) => f.write_str("float"),
            TypeRef::Float(FloatWidth::F64) => f.write_str("double"),
            TypeRef::Str(_) => f.write_str("string"),
            TypeRef::Handle(HandleWidth::W32) => f.write_str("ptr32"),
            TypeRef::Handle(HandleWidth::W64) => f.write_str("ptr64"),
            TypeRef::Array(inner) => write!(f, "{inner}[]"),
            TypeRef::Enum(id) => write!(f, "enum#{}", id.0),
            TypeRef::Callback(id) => write!(f, "callback#{}", id.0),
            TypeRef::Shared(shared) => f.write_str(shared.manifest_name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
    pub doc: Option<String>,
}

/// An enumeration. Member values may repeat; repeated values are aliases and are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    pub name: String,
    pub repr: IntRepr,
    pub members: Vec<EnumMember>,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub name: String,
    pub ty: TypeRef,
    /// Passed through a mutable pointer so the callee can write back.
    pub by_ref: bool,
    pub doc: Option<String>,
    /// Value used when the caller omits this argument. Only trailing integer, enum and
    /// bool parameters carry one.
    pub default: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnDescriptor {
    pub ty: TypeRef,
    pub doc: Option<String>,
}

impl ReturnDescriptor {
    pub fn void() -> Self {
        Self {
            ty: TypeRef::Void,
            doc: None,
        }
    }
}

/// A function-pointer type used in parameter lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackType {
    pub name: String,
    pub params: Vec<ParamDescriptor>,
    pub ret: ReturnDescriptor,
    pub doc: Option<String>,
}

/// An exported plugin function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    pub name: String,
    pub params: Vec<ParamDescriptor>,
    pub ret: ReturnDescriptor,
    pub doc: Option<String>,
    pub deprecated: Option<String>,
    pub group: Option<String>,
    /// Position in the manifest's function list.
    pub order: usize,
}

/// A class declared explicitly in the manifest. Function references are indices into
/// [`Package::functions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    pub name: String,
    pub doc: Option<String>,
    pub handle: TypeRef,
    /// Handle value that means "no object". Wrappers never destroy it.
    pub invalid_value: i64,
    pub constructors: Vec<usize>,
    pub destructor: Option<usize>,
    pub bindings: Vec<BindingDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDecl {
    pub name: String,
    pub function: usize,
    /// The function's first parameter is the class handle.
    pub bind_self: bool,
    /// One entry per method parameter (the receiver excluded). `Some` passes a wrapper of
    /// that class instead of a raw handle.
    pub param_aliases: Vec<Option<ClassAlias>>,
    /// The raw handle returned by the function is wrapped in this class.
    pub ret_alias: Option<ClassAlias>,
}

/// A handle-typed parameter or return value exposed as a class wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassAlias {
    /// Index into [`Package::classes`].
    pub class: usize,
    /// Ownership of the handle moves with the value.
    pub owner: bool,
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
#[path = "model/model_tests.rs"]
mod model_tests;
