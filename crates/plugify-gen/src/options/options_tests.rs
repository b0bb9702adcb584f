#![allow(non_snake_case)]

use super::*;
use test_case::test_case;

#[test]
fn GeneratorOptions___default___enables_classes() {
    let options = GeneratorOptions::default();

    assert!(options.generate_classes);
    assert_eq!(options.callback_slots, DEFAULT_CALLBACK_SLOTS);
}

#[test_case(b"" ; "empty")]
#[test_case(b"   \n" ; "whitespace")]
#[test_case(b"{}" ; "empty object")]
fn GeneratorOptions___from_json___blank_input_gives_defaults(input: &[u8]) {
    let options = GeneratorOptions::from_json(input).unwrap();

    assert_eq!(options, GeneratorOptions::default());
}

#[test]
fn GeneratorOptions___from_json___reads_camel_case_fields() {
    let options =
        GeneratorOptions::from_json(br#"{"generateClasses": false, "callbackSlots": 4}"#).unwrap();

    assert!(!options.generate_classes);
    assert_eq!(options.callback_slots, 4);
}

#[test_case(0 ; "zero")]
#[test_case(MAX_CALLBACK_SLOTS + 1 ; "too many")]
fn GeneratorOptions___validate___rejects_slot_count(slots: usize) {
    let err = GeneratorOptions::new()
        .with_callback_slots(slots)
        .validate()
        .unwrap_err();

    assert_eq!(err.error_code(), 6);
}

#[test]
fn GeneratorOptions___from_json___malformed_is_invalid_options() {
    let err = GeneratorOptions::from_json(b"{ generateClasses: }").unwrap_err();

    assert!(matches!(err, GenError::InvalidOptions(_)));
}

#[test]
fn GeneratorOptions___builders___chain() {
    let options = GeneratorOptions::new()
        .with_classes(false)
        .with_callback_slots(2);

    assert!(!options.generate_classes);
    assert_eq!(options.callback_slots, 2);
}
