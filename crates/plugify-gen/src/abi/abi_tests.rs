#![allow(non_snake_case)]

use super::*;
use plugify_gen_manifest::{Ownership, load};

const MANIFEST: &str = r#"{
    "name": "pkg",
    "enums": [{ "name": "Color", "type": "uint8", "members": [{ "name": "Red" }] }],
    "functions": [
        { "name": "SetColor", "params": [
            { "name": "handle", "type": "uint64" },
            { "name": "color", "type": "Color" }
        ]},
        { "name": "Scale", "params": [
            { "name": "values", "type": "float[]" },
            { "name": "factor", "type": "double", "ref": true }
        ], "return": { "type": "int32[]" } },
        { "name": "GetName", "params": [{ "name": "entity", "type": "ptr64" }],
          "return": { "type": "string" } }
    ]
}"#;

fn lower_function(pkg: &Package, index: usize) -> AbiSignature {
    let f = &pkg.functions[index];
    lower(&f.params, &f.ret.ty, Target::C, &f.name).unwrap()
}

#[test]
fn lower___scalar_signature___keeps_order_and_widths() {
    let pkg = load(MANIFEST).unwrap();

    let sig = lower_function(&pkg, 0);

    assert_eq!(
        sig.params,
        [
            AbiParam { ty: AbiType::Int(IntRepr::new(64, false)), slot: Slot::Value(0) },
            AbiParam { ty: AbiType::Enum(EnumId(0)), slot: Slot::Value(1) },
        ]
    );
    assert_eq!(sig.ret, AbiType::Void);
    assert!(!sig.returns_array());
}

#[test]
fn lower___array_param_and_return___add_lengths() {
    let pkg = load(MANIFEST).unwrap();

    let sig = lower_function(&pkg, 1);

    let slots: Vec<_> = sig.params.iter().map(|p| p.slot).collect();
    assert_eq!(slots, [Slot::Data(0), Slot::Len(0), Slot::Value(1), Slot::OutLen]);
    assert_eq!(sig.params[0].ty, AbiType::Ptr(Box::new(AbiType::Float(FloatWidth::F32))));
    assert_eq!(sig.params[2].ty, AbiType::PtrMut(Box::new(AbiType::Float(FloatWidth::F64))));
    assert_eq!(sig.ret, AbiType::PtrMut(Box::new(AbiType::Int(IntRepr::new(32, true)))));
    assert!(sig.returns_array());
}

#[test]
fn lower___string_and_handle___become_c_primitives() {
    let pkg = load(MANIFEST).unwrap();

    let sig = lower_function(&pkg, 2);

    assert_eq!(sig.params[0].ty, AbiType::Int(IntRepr::new(64, false)));
    assert_eq!(sig.ret, AbiType::CStr);
}

#[test]
fn lower___array_of_strings___is_rejected() {
    let params = [ParamDescriptor {
        name: "names".to_string(),
        ty: TypeRef::array(TypeRef::Str(Ownership::Owned)),
        by_ref: false,
        doc: None,
        default: None,
    }];

    let err = lower(&params, &TypeRef::Void, Target::Lua, "SetNames").unwrap_err();

    assert_eq!(err.error_code(), 4);
    assert!(err.to_string().contains("SetNames"));
}

#[test]
fn c_params___renders_lowered_names() {
    let pkg = load(MANIFEST).unwrap();
    let symbols = Symbols::resolve(&pkg, &[], Target::C).unwrap();

    let sig = lower_function(&pkg, 1);
    let rendered = c_params(&sig, &symbols.functions[1], &pkg, &symbols, CStyle::NAMED);

    assert_eq!(
        rendered,
        "const float* values, size_t values_len, double* factor, size_t* out_len"
    );
    assert_eq!(c_type(&sig.ret, &pkg, &symbols, CStyle::NAMED), "int32_t*");
}

#[test]
fn c_type___style___selects_enum_spelling() {
    let pkg = load(MANIFEST).unwrap();
    let symbols = Symbols::resolve(&pkg, &[], Target::C).unwrap();
    let ty = AbiType::Enum(EnumId(0));

    assert_eq!(c_type(&ty, &pkg, &symbols, CStyle::NAMED), "Color");
    assert_eq!(c_type(&ty, &pkg, &symbols, CStyle::REPR), "uint8_t");
}

#[test]
fn c_params___empty_signature___is_void() {
    let pkg = load(r#"{ "name": "pkg", "functions": [{ "name": "Ping" }] }"#).unwrap();
    let symbols = Symbols::resolve(&pkg, &[], Target::C).unwrap();

    let sig = lower_function(&pkg, 0);

    assert_eq!(c_params(&sig, &symbols.functions[0], &pkg, &symbols, CStyle::REPR), "void");
}

#[test]
fn c_type___prefix___applies_to_named_types() {
    let pkg = load(MANIFEST).unwrap();
    let symbols = Symbols::resolve(&pkg, &[], Target::Lua).unwrap();
    let style = CStyle {
        named_enums: true,
        prefix: "pkg_",
    };

    assert_eq!(c_type(&AbiType::Enum(EnumId(0)), &pkg, &symbols, style), "pkg_Color");
    assert_eq!(c_type(&AbiType::Size, &pkg, &symbols, style), "size_t");
}
