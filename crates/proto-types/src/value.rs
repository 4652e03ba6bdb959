//! Runtime field values.
//!
//! Sequences, maps and strings are reference counted so that shared default
//! instances and cloned messages alias the same storage. Mutation always goes
//! through `Arc::make_mut`, which copies when the storage is shared.

use crate::field::{FieldDescriptor, FieldModifier, FieldType};
use crate::message::Message;
use crate::wide::{Signedness, WideInteger};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;

/// Represents a field value in a message.
///
/// Equality compares FLOAT and DOUBLE by bit pattern, so NaN payloads and
/// `-0.0` compare the way they travel on the wire.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Bool(bool),
    /// INT32, SINT32 and SFIXED32
    Int32(i32),
    /// UINT32 and FIXED32
    Uint32(u32),
    /// All 64-bit integer types
    Wide(WideInteger),
    Float(f32),
    Double(f64),
    Enum(i32),
    String(Arc<str>),
    Bytes(Bytes),
    /// MESSAGE and GROUP
    Message(Box<Message>),
    Repeated(Arc<Vec<FieldValue>>),
    Map(Arc<MapValue>),
}

impl FieldValue {
    pub fn repeated(values: Vec<FieldValue>) -> Self {
        FieldValue::Repeated(Arc::new(values))
    }

    pub fn map(map: MapValue) -> Self {
        FieldValue::Map(Arc::new(map))
    }

    /// Short name of the variant, used in mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "bool",
            FieldValue::Int32(_) => "int32",
            FieldValue::Uint32(_) => "uint32",
            FieldValue::Wide(w) if w.is_signed() => "signed wide integer",
            FieldValue::Wide(_) => "unsigned wide integer",
            FieldValue::Float(_) => "float",
            FieldValue::Double(_) => "double",
            FieldValue::Enum(_) => "enum",
            FieldValue::String(_) => "string",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Message(_) => "message",
            FieldValue::Repeated(_) => "repeated",
            FieldValue::Map(_) => "map",
        }
    }

    /// Whether this single (non-collection) value can be stored in a field
    /// of `field_type`.
    pub fn matches_type(&self, field_type: FieldType) -> bool {
        match self {
            FieldValue::Bool(_) => field_type == FieldType::Bool,
            FieldValue::Int32(_) => matches!(
                field_type,
                FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32
            ),
            FieldValue::Uint32(_) => matches!(field_type, FieldType::Uint32 | FieldType::Fixed32),
            FieldValue::Wide(w) => match w.signedness() {
                Signedness::Signed => matches!(
                    field_type,
                    FieldType::Int64 | FieldType::Sint64 | FieldType::Sfixed64
                ),
                Signedness::Unsigned => {
                    matches!(field_type, FieldType::Uint64 | FieldType::Fixed64)
                }
            },
            FieldValue::Float(_) => field_type == FieldType::Float,
            FieldValue::Double(_) => field_type == FieldType::Double,
            FieldValue::Enum(_) => field_type == FieldType::Enum,
            FieldValue::String(_) => field_type == FieldType::String,
            FieldValue::Bytes(_) => field_type == FieldType::Bytes,
            FieldValue::Message(_) => field_type.is_message(),
            FieldValue::Repeated(_) | FieldValue::Map(_) => false,
        }
    }

    /// Shape check against a descriptor. Nested messages are not descended
    /// into.
    pub fn conforms_to(&self, field: &FieldDescriptor) -> bool {
        match (field.modifier, self) {
            (FieldModifier::Singular, value) => value.matches_type(field.field_type),
            (FieldModifier::Repeated, FieldValue::Repeated(items)) => {
                items.iter().all(|item| item.matches_type(field.field_type))
            }
            (FieldModifier::Map, FieldValue::Map(map)) => {
                let Some(key_type) = field.key_type else {
                    return false;
                };
                map.iter().all(|(key, value)| {
                    key.matches_type(key_type) && value.matches_type(field.field_type)
                })
            }
            _ => false,
        }
    }

    /// Zero, false, or empty: the value an implicit-presence encoder omits.
    pub fn is_default_scalar(&self) -> bool {
        match self {
            FieldValue::Bool(b) => !b,
            FieldValue::Int32(v) | FieldValue::Enum(v) => *v == 0,
            FieldValue::Uint32(v) => *v == 0,
            FieldValue::Wide(w) => w.is_zero(),
            FieldValue::Float(v) => v.to_bits() == 0,
            FieldValue::Double(v) => v.to_bits() == 0,
            FieldValue::String(s) => s.is_empty(),
            FieldValue::Bytes(b) => b.is_empty(),
            FieldValue::Message(_) | FieldValue::Repeated(_) | FieldValue::Map(_) => false,
        }
    }

    /// An empty sequence or map, which reads the same as an absent field.
    pub fn is_empty_collection(&self) -> bool {
        match self {
            FieldValue::Repeated(items) => items.is_empty(),
            FieldValue::Map(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            FieldValue::Int32(v) | FieldValue::Enum(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            FieldValue::Uint32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_wide(&self) -> Option<WideInteger> {
        match self {
            FieldValue::Wide(w) => Some(*w),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            FieldValue::Message(m) => Some(&**m),
            _ => None,
        }
    }

    pub fn as_repeated(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Repeated(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            FieldValue::Map(map) => Some(&**map),
            _ => None,
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Int32(a), FieldValue::Int32(b)) => a == b,
            (FieldValue::Uint32(a), FieldValue::Uint32(b)) => a == b,
            (FieldValue::Wide(a), FieldValue::Wide(b)) => a == b,
            (FieldValue::Float(a), FieldValue::Float(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::Double(a), FieldValue::Double(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::Enum(a), FieldValue::Enum(b)) => a == b,
            (FieldValue::String(a), FieldValue::String(b)) => a == b,
            (FieldValue::Bytes(a), FieldValue::Bytes(b)) => a == b,
            (FieldValue::Message(a), FieldValue::Message(b)) => a == b,
            (FieldValue::Repeated(a), FieldValue::Repeated(b)) => a == b,
            (FieldValue::Map(a), FieldValue::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int32(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Uint32(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        FieldValue::Float(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<WideInteger> for FieldValue {
    fn from(value: WideInteger) -> Self {
        FieldValue::Wide(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(Arc::from(value))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(Arc::from(value))
    }
}

impl From<Bytes> for FieldValue {
    fn from(value: Bytes) -> Self {
        FieldValue::Bytes(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Bytes(Bytes::from(value))
    }
}

impl From<Message> for FieldValue {
    fn from(value: Message) -> Self {
        FieldValue::Message(Box::new(value))
    }
}

impl From<MapValue> for FieldValue {
    fn from(value: MapValue) -> Self {
        FieldValue::map(value)
    }
}

/// Key of a MAP field entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Int32(i32),
    Uint32(u32),
    Wide(WideInteger),
    String(Arc<str>),
}

impl MapKey {
    pub fn matches_type(&self, field_type: FieldType) -> bool {
        self.to_value().matches_type(field_type)
    }

    pub fn to_value(&self) -> FieldValue {
        match self {
            MapKey::Int32(v) => FieldValue::Int32(*v),
            MapKey::Uint32(v) => FieldValue::Uint32(*v),
            MapKey::Wide(w) => FieldValue::Wide(*w),
            MapKey::String(s) => FieldValue::String(Arc::clone(s)),
        }
    }

    /// Converts a decoded key value; `None` for types that cannot key a map.
    pub fn from_value(value: FieldValue) -> Option<MapKey> {
        match value {
            FieldValue::Int32(v) => Some(MapKey::Int32(v)),
            FieldValue::Uint32(v) => Some(MapKey::Uint32(v)),
            FieldValue::Wide(w) => Some(MapKey::Wide(w)),
            FieldValue::String(s) => Some(MapKey::String(s)),
            _ => None,
        }
    }
}

impl From<&str> for MapKey {
    fn from(value: &str) -> Self {
        MapKey::String(Arc::from(value))
    }
}

impl From<i32> for MapKey {
    fn from(value: i32) -> Self {
        MapKey::Int32(value)
    }
}

impl From<u32> for MapKey {
    fn from(value: u32) -> Self {
        MapKey::Uint32(value)
    }
}

impl From<WideInteger> for MapKey {
    fn from(value: WideInteger) -> Self {
        MapKey::Wide(value)
    }
}

/// Insertion-ordered map with last-write-wins inserts.
///
/// Encoding walks entries in insertion order; that order is not canonical,
/// and equality ignores it.
#[derive(Debug, Clone, Default)]
pub struct MapValue {
    entries: Vec<(MapKey, FieldValue)>,
    index: HashMap<MapKey, usize>,
}

impl MapValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites. An overwritten key keeps its original position.
    pub fn insert(&mut self, key: MapKey, value: FieldValue) -> Option<FieldValue> {
        match self.index.get(&key) {
            Some(&idx) => Some(std::mem::replace(&mut self.entries[idx].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &MapKey) -> Option<&FieldValue> {
        self.index.get(key).map(|idx| &self.entries[*idx].1)
    }

    pub fn remove(&mut self, key: &MapKey) -> Option<FieldValue> {
        let idx = self.index.remove(key)?;
        let (_, value) = self.entries.remove(idx);
        for slot in self.index.values_mut() {
            if *slot > idx {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn contains_key(&self, key: &MapKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MapKey, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl PartialEq for MapValue {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl FromIterator<(MapKey, FieldValue)> for MapValue {
    fn from_iter<T: IntoIterator<Item = (MapKey, FieldValue)>>(iter: T) -> Self {
        let mut map = MapValue::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_last_write_wins() {
        let mut map = MapValue::new();
        assert!(map.insert("a".into(), FieldValue::from(1)).is_none());
        map.insert("b".into(), FieldValue::from(2));
        let old = map.insert("a".into(), FieldValue::from(3));
        assert_eq!(old, Some(FieldValue::Int32(1)));
        assert_eq!(map.len(), 2);

        let keys: Vec<_> = map.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![MapKey::from("a"), MapKey::from("b")]);
        assert_eq!(map.get(&"a".into()), Some(&FieldValue::Int32(3)));
    }

    #[test]
    fn test_map_equality_ignores_order() {
        let left: MapValue = [
            (MapKey::from(1), FieldValue::from("x")),
            (MapKey::from(2), FieldValue::from("y")),
        ]
        .into_iter()
        .collect();
        let right: MapValue = [
            (MapKey::from(2), FieldValue::from("y")),
            (MapKey::from(1), FieldValue::from("x")),
        ]
        .into_iter()
        .collect();
        assert_eq!(left, right);
    }

    #[test]
    fn test_map_remove_reindexes() {
        let mut map: MapValue = (0..4)
            .map(|i| (MapKey::Int32(i), FieldValue::Int32(i * 10)))
            .collect();
        assert_eq!(map.remove(&MapKey::Int32(1)), Some(FieldValue::Int32(10)));
        assert_eq!(map.get(&MapKey::Int32(3)), Some(&FieldValue::Int32(30)));
        assert!(!map.contains_key(&MapKey::Int32(1)));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_matches_type() {
        assert!(FieldValue::Int32(-1).matches_type(FieldType::Sint32));
        assert!(!FieldValue::Int32(-1).matches_type(FieldType::Uint32));
        assert!(FieldValue::Wide(WideInteger::from_u64(1)).matches_type(FieldType::Fixed64));
        assert!(!FieldValue::Wide(WideInteger::from_u64(1)).matches_type(FieldType::Int64));
        assert!(FieldValue::from(Message::new()).matches_type(FieldType::Group));
        assert!(!FieldValue::repeated(vec![]).matches_type(FieldType::Int32));
    }

    #[test]
    fn test_conforms_to_modifiers() {
        let ids = FieldDescriptor::new("ids", 1, FieldType::Int32).repeated();
        assert!(FieldValue::repeated(vec![1.into(), 2.into()]).conforms_to(&ids));
        assert!(!FieldValue::repeated(vec![1.into(), "x".into()]).conforms_to(&ids));
        assert!(!FieldValue::Int32(1).conforms_to(&ids));

        let labels = FieldDescriptor::map("labels", 2, FieldType::String, FieldType::Int32);
        let map: MapValue = [(MapKey::from("a"), FieldValue::from(1))].into_iter().collect();
        assert!(FieldValue::map(map).conforms_to(&labels));
        let bad: MapValue = [(MapKey::from(1), FieldValue::from(1))].into_iter().collect();
        assert!(!FieldValue::map(bad).conforms_to(&labels));
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(FieldValue::Float(f32::NAN), FieldValue::Float(f32::NAN));
        assert_eq!(FieldValue::Double(f64::NAN), FieldValue::Double(f64::NAN));
        assert_ne!(FieldValue::Double(0.0), FieldValue::Double(-0.0));
        assert_ne!(FieldValue::Float(1.0), FieldValue::Double(1.0));
        assert_eq!(
            FieldValue::repeated(vec![f64::NAN.into()]),
            FieldValue::repeated(vec![f64::NAN.into()])
        );
    }

    #[test]
    fn test_default_scalar_detection() {
        assert!(FieldValue::Bool(false).is_default_scalar());
        assert!(FieldValue::from("").is_default_scalar());
        assert!(FieldValue::Double(0.0).is_default_scalar());
        assert!(!FieldValue::Double(-0.0).is_default_scalar());
        assert!(!FieldValue::Enum(2).is_default_scalar());
        assert!(!FieldValue::from(Message::new()).is_default_scalar());
    }
}
