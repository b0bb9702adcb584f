//! Type mapper: one static table per target.
//!
//! [`map_type`] turns an IR type into the fragments an emitter needs: the declaration form
//! (fields, return types), the parameter-passing form, and the marshalling [`Strategy`]. The
//! generation context collects the strategies a package uses so emitters can leave out support
//! code nothing needs. Every IR variant has a rule for every target; constructs with no native
//! layout fail with a type-mapping error.

use crate::error::{GenError, GenResult};
use crate::symbols::Symbols;
use crate::target::Target;
use plugify_gen_manifest::{
    FloatWidth, HandleWidth, Ownership, SharedType, TypeRef,
};

/// How a value crosses the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strategy {
    /// Copied as a plain value (scalars, enums, shared value types)
    ByValue,
    /// Passed through a mutable pointer so the callee can write back
    ByReference,
    /// NUL-terminated copy; returned buffers are released through the package's `Free`
    OwnedString,
    /// NUL-terminated text that stays owned by the sender
    BorrowedString,
    /// Integer token, never dereferenced
    OpaqueHandle,
    /// Native function pointer obtained from a callback registry
    Callback,
    /// Pointer plus element count
    Sequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Param,
    Return,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedType {
    pub decl: String,
    pub param: String,
    pub strategy: Strategy,
}

/// Spelling of every IR type family in one target. Patterns use `{}` for the element or
/// referenced type name.
#[derive(Debug)]
pub struct TypeTable {
    pub void: &'static str,
    pub boolean: &'static str,
    /// `[i8, i16, i32, i64, u8, u16, u32, u64]`
    pub ints: [&'static str; 8],
    /// `[f32, f64]`
    pub floats: [&'static str; 2],
    /// `[decl, param]`
    pub owned_string: [&'static str; 2],
    /// `[decl, param]`
    pub borrowed_string: [&'static str; 2],
    /// `[decl, param]` patterns
    pub sequence: [&'static str; 2],
    /// `[decl, param]` patterns over the callback type name
    pub callback: [&'static str; 2],
    pub by_ref: &'static str,
    /// `[vec2, vec3, vec4, mat4x4]`
    pub shared: [&'static str; 4],
}

static C_TABLE: TypeTable = TypeTable {
    void: "void",
    boolean: "bool",
    ints: [
        "int8_t", "int16_t", "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t",
    ],
    floats: ["float", "double"],
    owned_string: ["char*", "const char*"],
    borrowed_string: ["const char*", "const char*"],
    sequence: ["{}*", "const {}*"],
    callback: ["{}", "{}"],
    by_ref: "{}*",
    shared: ["Vec2", "Vec3", "Vec4", "Mat4x4"],
};

static CPP_TABLE: TypeTable = TypeTable {
    void: "void",
    boolean: "bool",
    ints: [
        "int8_t", "int16_t", "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t",
    ],
    floats: ["float", "double"],
    owned_string: ["std::string", "const std::string&"],
    borrowed_string: ["std::string_view", "const char*"],
    sequence: ["std::vector<{}>", "const std::vector<{}>&"],
    callback: ["{}", "{}"],
    by_ref: "{}&",
    shared: ["Vec2", "Vec3", "Vec4", "Mat4x4"],
};

static DLANG_TABLE: TypeTable = TypeTable {
    void: "void",
    boolean: "bool",
    ints: ["byte", "short", "int", "long", "ubyte", "ushort", "uint", "ulong"],
    floats: ["float", "double"],
    owned_string: ["string", "string"],
    borrowed_string: ["const(char)*", "const(char)*"],
    sequence: ["{}[]", "const({})[]"],
    callback: ["{}", "{}"],
    by_ref: "ref {}",
    shared: ["Vec2", "Vec3", "Vec4", "Mat4x4"],
};

static DOTNET_TABLE: TypeTable = TypeTable {
    void: "void",
    boolean: "bool",
    ints: ["sbyte", "short", "int", "long", "byte", "ushort", "uint", "ulong"],
    floats: ["float", "double"],
    owned_string: ["string", "string"],
    borrowed_string: ["string", "string"],
    sequence: ["{}[]", "ReadOnlySpan<{}>"],
    callback: ["nint", "nint"],
    by_ref: "ref {}",
    shared: ["Vector2", "Vector3", "Vector4", "Matrix4x4"],
};

static GO_TABLE: TypeTable = TypeTable {
    void: "",
    boolean: "bool",
    ints: ["int8", "int16", "int32", "int64", "uint8", "uint16", "uint32", "uint64"],
    floats: ["float32", "float64"],
    owned_string: ["string", "string"],
    borrowed_string: ["string", "string"],
    sequence: ["[]{}", "[]{}"],
    callback: ["Native{}", "Native{}"],
    by_ref: "*{}",
    shared: ["Vec2", "Vec3", "Vec4", "Mat4x4"],
};

static LUA_TABLE: TypeTable = TypeTable {
    void: "nil",
    boolean: "boolean",
    ints: [
        "integer", "integer", "integer", "integer", "integer", "integer", "integer", "integer",
    ],
    floats: ["number", "number"],
    owned_string: ["string", "string"],
    borrowed_string: ["string", "string"],
    sequence: ["{}[]", "{}[]"],
    callback: ["ffi.cdata*", "ffi.cdata*"],
    by_ref: "{}",
    shared: ["Vec2", "Vec3", "Vec4", "Mat4x4"],
};

static PYTHON_TABLE: TypeTable = TypeTable {
    void: "None",
    boolean: "bool",
    ints: ["int", "int", "int", "int", "int", "int", "int", "int"],
    floats: ["float", "float"],
    owned_string: ["str", "str"],
    borrowed_string: ["str", "str"],
    sequence: ["list[{}]", "Sequence[{}]"],
    callback: ["{}", "{}"],
    by_ref: "{}",
    shared: ["Vec2", "Vec3", "Vec4", "Mat4x4"],
};

static RUST_TABLE: TypeTable = TypeTable {
    void: "()",
    boolean: "bool",
    ints: ["i8", "i16", "i32", "i64", "u8", "u16", "u32", "u64"],
    floats: ["f32", "f64"],
    owned_string: ["String", "&str"],
    borrowed_string: ["String", "&CStr"],
    sequence: ["Vec<{}>", "&[{}]"],
    callback: ["{}", "{}"],
    by_ref: "&mut {}",
    shared: ["Vec2", "Vec3", "Vec4", "Mat4x4"],
};

pub fn table(target: Target) -> &'static TypeTable {
    match target {
        Target::C => &C_TABLE,
        Target::Cpp => &CPP_TABLE,
        Target::DLang => &DLANG_TABLE,
        Target::DotNet => &DOTNET_TABLE,
        Target::Golang => &GO_TABLE,
        Target::Lua => &LUA_TABLE,
        Target::Python => &PYTHON_TABLE,
        Target::Rust => &RUST_TABLE,
    }
}

impl TypeTable {
    pub fn shared_name(&self, shared: SharedType) -> &'static str {
        self.shared[shared as usize]
    }

    fn float(&self, width: FloatWidth) -> &'static str {
        match width {
            FloatWidth::F32 => self.floats[0],
            FloatWidth::F64 => self.floats[1],
        }
    }

    fn handle(&self, width: HandleWidth) -> &'static str {
        self.ints[width.repr().table_index()]
    }
}

/// Why `ty` has no native layout as an array element, if it has none.
fn element_problem(element: &TypeRef) -> Option<&'static str> {
    match element {
        TypeRef::Array(_) => Some("nested arrays have no native layout"),
        TypeRef::Str(_) => Some("arrays of strings have no native layout"),
        TypeRef::Callback(_) => Some("arrays of callbacks have no native layout"),
        TypeRef::Void => Some("arrays of void have no native layout"),
        _ => None,
    }
}

/// Reject constructs no target can lower. Shared by the mapper and ABI lowering.
pub fn check_supported(
    ty: &TypeRef,
    by_ref: bool,
    position: Position,
    target: Target,
    symbol: &str,
) -> GenResult<()> {
    if let TypeRef::Array(element) = ty
        && let Some(problem) = element_problem(element)
    {
        return Err(GenError::mapping(target, symbol, problem));
    }
    if position == Position::Param {
        if ty.is_void() {
            return Err(GenError::mapping(target, symbol, "parameters cannot be void"));
        }
        if by_ref && !(ty.is_scalar() || matches!(ty, TypeRef::Shared(_))) {
            return Err(GenError::mapping(
                target,
                symbol,
                "only scalars, enums, handles and shared types can be passed by reference",
            ));
        }
    }
    Ok(())
}

pub fn strategy(ty: &TypeRef, by_ref: bool) -> Strategy {
    if by_ref {
        return Strategy::ByReference;
    }
    match ty {
        TypeRef::Handle(_) => Strategy::OpaqueHandle,
        TypeRef::Str(Ownership::Owned) => Strategy::OwnedString,
        TypeRef::Str(Ownership::Borrowed) => Strategy::BorrowedString,
        TypeRef::Callback(_) => Strategy::Callback,
        TypeRef::Array(_) => Strategy::Sequence,
        _ => Strategy::ByValue,
    }
}

/// Map one IR type for `symbols.target`. `symbol` names the enclosing function or callback
/// for error messages.
pub fn map_type(
    symbols: &Symbols,
    ty: &TypeRef,
    by_ref: bool,
    position: Position,
    symbol: &str,
) -> GenResult<MappedType> {
    let target = symbols.target;
    check_supported(ty, by_ref, position, target, symbol)?;
    let table = table(target);
    let by_ref = by_ref && position == Position::Param;

    let (decl, param) = match ty {
        TypeRef::Void => (table.void.to_string(), table.void.to_string()),
        TypeRef::Bool => same(table.boolean),
        TypeRef::Int(repr) => same(table.ints[repr.table_index()]),
        TypeRef::Float(width) => same(table.float(*width)),
        TypeRef::Handle(width) => same(table.handle(*width)),
        TypeRef::Shared(shared) => same(table.shared_name(*shared)),
        TypeRef::Enum(id) => same(symbols.enum_name(*id)),
        TypeRef::Str(Ownership::Owned) => pair(table.owned_string),
        TypeRef::Str(Ownership::Borrowed) => pair(table.borrowed_string),
        TypeRef::Callback(id) => {
            let name = symbols.callback_name(*id);
            (
                table.callback[0].replace("{}", name),
                table.callback[1].replace("{}", name),
            )
        }
        TypeRef::Array(element) => {
            let inner = map_type(symbols, element, false, Position::Return, symbol)?;
            (
                table.sequence[0].replace("{}", &inner.decl),
                table.sequence[1].replace("{}", &inner.decl),
            )
        }
    };

    let param = if position == Position::Return {
        decl.clone()
    } else if by_ref {
        table.by_ref.replace("{}", &decl)
    } else {
        param
    };

    Ok(MappedType {
        decl,
        param,
        strategy: strategy(ty, by_ref),
    })
}

fn same(s: &str) -> (String, String) {
    (s.to_string(), s.to_string())
}

fn pair(forms: [&str; 2]) -> (String, String) {
    (forms[0].to_string(), forms[1].to_string())
}
