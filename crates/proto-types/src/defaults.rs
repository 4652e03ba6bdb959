//! Shared default values for unset fields.
//!
//! Every read of an unset field resolves here, so lookups are O(1) and never
//! allocate: the table is built once per process and handed out by `'static`
//! reference. The values are never mutated; a message that wants to write to
//! a field aliasing one of them replaces its own reference first (see
//! [`Message::repeated_mut`](crate::Message::repeated_mut)).

use crate::field::{FieldDescriptor, FieldModifier, FieldType};
use crate::value::{FieldValue, MapValue};
use crate::wide::WideInteger;
use bytes::Bytes;
use std::sync::{Arc, LazyLock};

struct DefaultValues {
    repeated: FieldValue,
    map: FieldValue,
    bool_false: FieldValue,
    string: FieldValue,
    bytes: FieldValue,
    signed_zero: FieldValue,
    unsigned_zero: FieldValue,
    int32: FieldValue,
    uint32: FieldValue,
    float: FieldValue,
    double: FieldValue,
    enum_zero: FieldValue,
}

static DEFAULTS: LazyLock<DefaultValues> = LazyLock::new(|| DefaultValues {
    repeated: FieldValue::Repeated(Arc::new(Vec::new())),
    map: FieldValue::Map(Arc::new(MapValue::new())),
    bool_false: FieldValue::Bool(false),
    string: FieldValue::String(Arc::from("")),
    bytes: FieldValue::Bytes(Bytes::new()),
    signed_zero: FieldValue::Wide(WideInteger::SIGNED_ZERO),
    unsigned_zero: FieldValue::Wide(WideInteger::UNSIGNED_ZERO),
    int32: FieldValue::Int32(0),
    uint32: FieldValue::Uint32(0),
    float: FieldValue::Float(0.0),
    double: FieldValue::Double(0.0),
    enum_zero: FieldValue::Enum(0),
});

/// Default value of an unset field.
///
/// Returns `None` for singular MESSAGE and GROUP fields: an absent message
/// stays absent and callers check presence explicitly.
pub fn default_for(field: &FieldDescriptor) -> Option<&'static FieldValue> {
    default_for_type(field.modifier, field.field_type)
}

/// Same as [`default_for`], keyed by `(modifier, type)` directly.
pub fn default_for_type(
    modifier: FieldModifier,
    field_type: FieldType,
) -> Option<&'static FieldValue> {
    let defaults = &*DEFAULTS;
    let value = match (modifier, field_type) {
        (FieldModifier::Repeated, _) => &defaults.repeated,
        (FieldModifier::Map, _) => &defaults.map,
        (FieldModifier::Singular, field_type) => match field_type {
            FieldType::Bool => &defaults.bool_false,
            FieldType::String => &defaults.string,
            FieldType::Bytes => &defaults.bytes,
            FieldType::Message | FieldType::Group => return None,
            FieldType::Uint64 | FieldType::Fixed64 => &defaults.unsigned_zero,
            FieldType::Int64 | FieldType::Sint64 | FieldType::Sfixed64 => &defaults.signed_zero,
            FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32 => &defaults.int32,
            FieldType::Uint32 | FieldType::Fixed32 => &defaults.uint32,
            FieldType::Float => &defaults.float,
            FieldType::Double => &defaults.double,
            FieldType::Enum => &defaults.enum_zero,
        },
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_shared() {
        let a = FieldDescriptor::new("a", 1, FieldType::Int32).repeated();
        let b = FieldDescriptor::new("b", 7, FieldType::String).repeated();

        let first = default_for(&a).unwrap();
        let second = default_for(&a).unwrap();
        let other = default_for(&b).unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(std::ptr::eq(first, other));

        let (FieldValue::Repeated(x), FieldValue::Repeated(y)) = (first, other) else {
            panic!("expected repeated defaults");
        };
        assert!(Arc::ptr_eq(x, y));
    }

    #[test]
    fn test_default_table() {
        let cases = [
            (FieldType::Bool, FieldValue::Bool(false)),
            (FieldType::String, FieldValue::from("")),
            (FieldType::Bytes, FieldValue::Bytes(Bytes::new())),
            (FieldType::Uint64, FieldValue::Wide(WideInteger::UNSIGNED_ZERO)),
            (FieldType::Fixed64, FieldValue::Wide(WideInteger::UNSIGNED_ZERO)),
            (FieldType::Int64, FieldValue::Wide(WideInteger::SIGNED_ZERO)),
            (FieldType::Sint64, FieldValue::Wide(WideInteger::SIGNED_ZERO)),
            (FieldType::Sfixed64, FieldValue::Wide(WideInteger::SIGNED_ZERO)),
            (FieldType::Sint32, FieldValue::Int32(0)),
            (FieldType::Fixed32, FieldValue::Uint32(0)),
            (FieldType::Float, FieldValue::Float(0.0)),
            (FieldType::Double, FieldValue::Double(0.0)),
            (FieldType::Enum, FieldValue::Enum(0)),
        ];
        for (field_type, expected) in cases {
            assert_eq!(
                default_for_type(FieldModifier::Singular, field_type),
                Some(&expected),
                "default for {field_type}"
            );
        }
    }

    #[test]
    fn test_message_default_is_absent() {
        assert!(default_for(&FieldDescriptor::message("m", 1, "Other")).is_none());
        assert!(default_for_type(FieldModifier::Singular, FieldType::Group).is_none());
        let repeated = default_for_type(FieldModifier::Repeated, FieldType::Message);
        assert!(repeated.unwrap().is_empty_collection());
    }

    #[test]
    fn test_map_default() {
        let field = FieldDescriptor::map("m", 1, FieldType::String, FieldType::Int64);
        let value = default_for(&field).unwrap();
        assert!(value.as_map().unwrap().is_empty());
        assert!(std::ptr::eq(value, default_for(&field).unwrap()));
    }
}
