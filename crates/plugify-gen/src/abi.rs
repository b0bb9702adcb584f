//! C ABI lowering.
//!
//! Every exported function and every callback crosses the boundary with a plain C signature.
//! Lowering is shared by all targets: arrays become a pointer plus an element count, array
//! returns gain a trailing `size_t*` out-parameter, by-reference parameters become mutable
//! pointers, strings become `const char*` and handles become unsigned integers.

use crate::error::GenResult;
use crate::symbols::{SignatureNames, Symbols};
use crate::target::Target;
use crate::types::{Position, check_supported};
use plugify_gen_manifest::{
    CallbackId, EnumId, FloatWidth, IntRepr, Package, ParamDescriptor, SharedType, TypeRef,
};

/// A type as it appears in the lowered C signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiType {
    Void,
    Bool,
    Int(IntRepr),
    Float(FloatWidth),
    /// `size_t`
    Size,
    /// NUL-terminated UTF-8
    CStr,
    Shared(SharedType),
    Enum(EnumId),
    Callback(CallbackId),
    /// `const T*`
    Ptr(Box<AbiType>),
    /// `T*`
    PtrMut(Box<AbiType>),
}

/// Where a lowered parameter comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Parameter `i` itself
    Value(usize),
    /// Data pointer of array parameter `i`
    Data(usize),
    /// Element count of array parameter `i`
    Len(usize),
    /// Element count of the returned array
    OutLen,
}

impl Slot {
    /// Identifier of this slot inside the signature.
    pub fn name<'a>(&self, names: &'a SignatureNames) -> &'a str {
        match self {
            Slot::Value(i) | Slot::Data(i) => &names.params[*i],
            Slot::Len(i) => names.lens[*i].as_deref().unwrap_or("len"),
            Slot::OutLen => names.out_len.as_deref().unwrap_or("out_len"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiParam {
    pub ty: AbiType,
    pub slot: Slot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiSignature {
    pub params: Vec<AbiParam>,
    pub ret: AbiType,
}

impl AbiSignature {
    /// True when the lowered return is an array pointer paired with [`Slot::OutLen`].
    pub fn returns_array(&self) -> bool {
        self.params.iter().any(|p| p.slot == Slot::OutLen)
    }
}

fn lower_value(ty: &TypeRef) -> AbiType {
    match ty {
        TypeRef::Void => AbiType::Void,
        TypeRef::Bool => AbiType::Bool,
        TypeRef::Int(repr) => AbiType::Int(*repr),
        TypeRef::Float(width) => AbiType::Float(*width),
        TypeRef::Str(_) => AbiType::CStr,
        TypeRef::Handle(width) => AbiType::Int(width.repr()),
        TypeRef::Array(inner) => AbiType::Ptr(Box::new(lower_value(inner))),
        TypeRef::Enum(id) => AbiType::Enum(*id),
        TypeRef::Callback(id) => AbiType::Callback(*id),
        TypeRef::Shared(shared) => AbiType::Shared(*shared),
    }
}

/// Lower one signature. `symbol` names the function or callback for error messages.
pub fn lower(
    params: &[ParamDescriptor],
    ret: &TypeRef,
    target: Target,
    symbol: &str,
) -> GenResult<AbiSignature> {
    let mut lowered = Vec::with_capacity(params.len() + 1);
    for (i, param) in params.iter().enumerate() {
        check_supported(&param.ty, param.by_ref, Position::Param, target, symbol)?;
        match &param.ty {
            TypeRef::Array(inner) => {
                lowered.push(AbiParam {
                    ty: AbiType::Ptr(Box::new(lower_value(inner))),
                    slot: Slot::Data(i),
                });
                lowered.push(AbiParam {
                    ty: AbiType::Size,
                    slot: Slot::Len(i),
                });
            }
            ty if param.by_ref => lowered.push(AbiParam {
                ty: AbiType::PtrMut(Box::new(lower_value(ty))),
                slot: Slot::Value(i),
            }),
            ty => lowered.push(AbiParam {
                ty: lower_value(ty),
                slot: Slot::Value(i),
            }),
        }
    }

    check_supported(ret, false, Position::Return, target, symbol)?;
    let ret = match ret {
        TypeRef::Array(inner) => {
            lowered.push(AbiParam {
                ty: AbiType::PtrMut(Box::new(AbiType::Size)),
                slot: Slot::OutLen,
            });
            AbiType::PtrMut(Box::new(lower_value(inner)))
        }
        other => lower_value(other),
    };

    Ok(AbiSignature {
        params: lowered,
        ret,
    })
}

/// `[i8, i16, i32, i64, u8, u16, u32, u64]` in C.
pub const C_INTS: [&str; 8] = [
    "int8_t", "int16_t", "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t",
];

/// How named types are spelled in a C rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CStyle<'a> {
    /// Spell enums with their typedef name instead of the underlying integer type.
    pub named_enums: bool,
    /// Prepended to enum and callback typedef names.
    pub prefix: &'a str,
}

impl CStyle<'_> {
    pub const NAMED: CStyle<'static> = CStyle {
        named_enums: true,
        prefix: "",
    };
    pub const REPR: CStyle<'static> = CStyle {
        named_enums: false,
        prefix: "",
    };
}

/// Render `ty` as a C type. Used by every target that declares its boundary in C syntax.
pub fn c_type(ty: &AbiType, pkg: &Package, symbols: &Symbols, style: CStyle<'_>) -> String {
    match ty {
        AbiType::Void => "void".to_string(),
        AbiType::Bool => "bool".to_string(),
        AbiType::Int(repr) => C_INTS[repr.table_index()].to_string(),
        AbiType::Float(FloatWidth::F32) => "float".to_string(),
        AbiType::Float(FloatWidth::F64) => "double".to_string(),
        AbiType::Size => "size_t".to_string(),
        AbiType::CStr => "const char*".to_string(),
        AbiType::Shared(shared) => shared.name().to_string(),
        AbiType::Enum(id) if style.named_enums => {
            format!("{}{}", style.prefix, symbols.enum_name(*id))
        }
        AbiType::Enum(id) => C_INTS[pkg.enum_type(*id).repr.table_index()].to_string(),
        AbiType::Callback(id) => format!("{}{}", style.prefix, symbols.callback_name(*id)),
        AbiType::Ptr(inner) => format!("const {}*", c_type(inner, pkg, symbols, style)),
        AbiType::PtrMut(inner) => format!("{}*", c_type(inner, pkg, symbols, style)),
    }
}

/// Render the parameter list of `sig` in C syntax, `void` when empty.
pub fn c_params(
    sig: &AbiSignature,
    names: &SignatureNames,
    pkg: &Package,
    symbols: &Symbols,
    style: CStyle<'_>,
) -> String {
    if sig.params.is_empty() {
        return "void".to_string();
    }
    sig.params
        .iter()
        .map(|p| format!("{} {}", c_type(&p.ty, pkg, symbols, style), p.slot.name(names)))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[path = "abi/abi_tests.rs"]
mod abi_tests;
