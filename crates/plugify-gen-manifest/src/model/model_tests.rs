#![allow(non_snake_case)]

use super::*;
use test_case::test_case;

#[test_case(8, true, -128, 127)]
#[test_case(8, false, 0, 255)]
#[test_case(16, true, -32768, 32767)]
#[test_case(32, false, 0, 4_294_967_295)]
#[test_case(64, true, i64::MIN as i128, i64::MAX as i128)]
#[test_case(64, false, 0, u64::MAX as i128)]
fn IntRepr___range___matches_width(width: u8, signed: bool, min: i128, max: i128) {
    assert_eq!(IntRepr::new(width, signed).range(), (min, max));
}

#[test]
fn IntRepr___contains___rejects_out_of_range() {
    let repr = IntRepr::new(8, false);

    assert!(repr.contains(0));
    assert!(repr.contains(255));
    assert!(!repr.contains(256));
    assert!(!repr.contains(-1));
}

#[test_case(8, true, 0)]
#[test_case(64, true, 3)]
#[test_case(8, false, 4)]
#[test_case(32, false, 6)]
fn IntRepr___table_index___orders_signed_first(width: u8, signed: bool, expected: usize) {
    assert_eq!(IntRepr::new(width, signed).table_index(), expected);
}

#[test]
fn TypeRef___display___uses_manifest_spelling() {
    assert_eq!(TypeRef::int(64, false).to_string(), "uint64");
    assert_eq!(TypeRef::Float(FloatWidth::F64).to_string(), "double");
    assert_eq!(TypeRef::array(TypeRef::Bool).to_string(), "bool[]");
    assert_eq!(TypeRef::Shared(SharedType::Mat4x4).to_string(), "mat4x4");
}

#[test]
fn TypeRef___is_scalar___excludes_aggregates() {
    assert!(TypeRef::Handle(HandleWidth::W64).is_scalar());
    assert!(TypeRef::Enum(EnumId(0)).is_scalar());
    assert!(!TypeRef::Str(Ownership::Owned).is_scalar());
    assert!(!TypeRef::Shared(SharedType::Vec2).is_scalar());
    assert!(!TypeRef::array(TypeRef::Bool).is_scalar());
}

#[test]
fn TypeRef___walk___visits_nested_elements() {
    let ty = TypeRef::array(TypeRef::array(TypeRef::Bool));
    let mut seen = Vec::new();

    ty.walk(&mut |t| seen.push(t.clone()));

    assert_eq!(seen.len(), 3);
    assert_eq!(seen[2], TypeRef::Bool);
}

#[test_case("Color", true)]
#[test_case("_private", true)]
#[test_case("v2", true)]
#[test_case("2d", false)]
#[test_case("", false)]
#[test_case("has-dash", false)]
#[test_case("ünicode", false)]
fn is_identifier___checks_c_identifier_shape(input: &str, expected: bool) {
    assert_eq!(is_identifier(input), expected);
}

#[test]
fn SharedType___float_count___matches_fields() {
    for shared in SharedType::ALL {
        if shared == SharedType::Mat4x4 {
            assert_eq!(shared.float_count(), 16);
        } else {
            assert_eq!(shared.float_count(), shared.fields().len());
        }
    }
}
