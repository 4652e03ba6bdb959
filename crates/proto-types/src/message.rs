//! Message instances.

use crate::defaults::default_for;
use crate::error::{Result, SchemaError};
use crate::field::{FieldDescriptor, WireType};
use crate::schema::MessageDescriptor;
use crate::value::{FieldValue, MapValue};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A field the schema does not know, kept verbatim for re-encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownField {
    pub number: u32,
    pub wire_type: WireType,
    /// Tag and value exactly as they appeared on the wire
    pub raw: Bytes,
}

/// A message: present field values keyed by field number.
///
/// Only fields that were explicitly set or decoded are stored; everything
/// else reads through [`default_for`]. Fields iterate in ascending number
/// order.
///
/// Equality treats an empty sequence or map the same as an absent field,
/// since both read back as the shared empty default.
#[derive(Debug, Clone, Default)]
pub struct Message {
    fields: BTreeMap<u32, FieldValue>,
    unknown: Vec<UnknownField>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, returning the previous one.
    pub fn set(&mut self, number: u32, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.fields.insert(number, value.into())
    }

    /// Store a value after checking it against the field named `name`.
    ///
    /// Setting a member of a oneof group clears the other members.
    pub fn set_checked(
        &mut self,
        descriptor: &MessageDescriptor,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<Option<FieldValue>> {
        let field = descriptor
            .get_field(name)
            .ok_or_else(|| SchemaError::FieldNotFound {
                message: descriptor.name.clone(),
                field: name.to_string(),
            })?;
        let value = value.into();
        if !value.conforms_to(field) {
            return Err(SchemaError::FieldValueTypeMismatch {
                field: field.name.clone(),
                expected: expected_shape(field),
                actual: value.kind_name(),
            });
        }
        if let Some(group) = field.oneof {
            for sibling in descriptor.oneof_members(group) {
                if sibling.number != field.number {
                    self.fields.remove(&sibling.number);
                }
            }
        }
        Ok(self.set(field.number, value))
    }

    /// Present value of a field, if any.
    pub fn get(&self, number: u32) -> Option<&FieldValue> {
        self.fields.get(&number)
    }

    /// Present value, or the shared default for the field. `None` only for
    /// an unset singular message field.
    pub fn get_or_default(&self, field: &FieldDescriptor) -> Option<&FieldValue> {
        self.get(field.number).or_else(|| default_for(field))
    }

    pub fn has_field(&self, number: u32) -> bool {
        self.fields.contains_key(&number)
    }

    pub fn clear_field(&mut self, number: u32) -> Option<FieldValue> {
        self.fields.remove(&number)
    }

    /// Remove every field, known or not.
    pub fn clear(&mut self) {
        self.fields.clear();
        self.unknown.clear();
    }

    /// Present field numbers in ascending order.
    pub fn field_numbers(&self) -> Vec<u32> {
        self.fields.keys().copied().collect()
    }

    pub fn fields(&self) -> impl Iterator<Item = (u32, &FieldValue)> {
        self.fields.iter().map(|(number, value)| (*number, value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.unknown.is_empty()
    }

    /// Append to a repeated field. A present singular scalar is promoted to
    /// the first element of the sequence.
    pub fn append(&mut self, number: u32, value: impl Into<FieldValue>) -> Result<()> {
        self.repeated_mut(number)?.push(value.into());
        Ok(())
    }

    /// Mutable access to a repeated field's elements.
    ///
    /// Storage shared with another message or with the default table is
    /// copied first, so other holders never observe the write. A slot
    /// holding a map or a nested message is a type mismatch.
    pub fn repeated_mut(&mut self, number: u32) -> Result<&mut Vec<FieldValue>> {
        let slot = self
            .fields
            .entry(number)
            .or_insert_with(|| FieldValue::Repeated(Arc::new(Vec::new())));
        if let FieldValue::Map(_) | FieldValue::Message(_) = slot {
            return Err(SchemaError::FieldValueTypeMismatch {
                field: number.to_string(),
                expected: "repeated".to_string(),
                actual: slot.kind_name(),
            });
        }
        if !matches!(slot, FieldValue::Repeated(_)) {
            let single = std::mem::replace(slot, FieldValue::Repeated(Arc::new(Vec::new())));
            *slot = FieldValue::repeated(vec![single]);
        }
        match slot {
            FieldValue::Repeated(items) => Ok(Arc::make_mut(items)),
            other => Err(SchemaError::FieldValueTypeMismatch {
                field: number.to_string(),
                expected: "repeated".to_string(),
                actual: other.kind_name(),
            }),
        }
    }

    /// Mutable access to a map field, copy-on-write like [`repeated_mut`].
    ///
    /// [`repeated_mut`]: Message::repeated_mut
    pub fn map_mut(&mut self, number: u32) -> Result<&mut MapValue> {
        let slot = self
            .fields
            .entry(number)
            .or_insert_with(|| FieldValue::Map(Arc::new(MapValue::new())));
        match slot {
            FieldValue::Map(map) => Ok(Arc::make_mut(map)),
            other => Err(SchemaError::FieldValueTypeMismatch {
                field: number.to_string(),
                expected: "map".to_string(),
                actual: other.kind_name(),
            }),
        }
    }

    /// Mutable access to a nested message, inserting an empty one if unset.
    pub fn message_mut(&mut self, number: u32) -> Result<&mut Message> {
        let slot = self
            .fields
            .entry(number)
            .or_insert_with(|| FieldValue::Message(Box::default()));
        match slot {
            FieldValue::Message(message) => Ok(&mut **message),
            other => Err(SchemaError::FieldValueTypeMismatch {
                field: number.to_string(),
                expected: "message".to_string(),
                actual: other.kind_name(),
            }),
        }
    }

    /// Fields the schema did not declare, in arrival order.
    pub fn unknown_fields(&self) -> &[UnknownField] {
        &self.unknown
    }

    pub fn push_unknown(&mut self, field: UnknownField) {
        self.unknown.push(field);
    }

    pub fn clear_unknown_fields(&mut self) {
        self.unknown.clear();
    }

    fn significant_fields(&self) -> impl Iterator<Item = (&u32, &FieldValue)> {
        self.fields
            .iter()
            .filter(|(_, value)| !value.is_empty_collection())
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.significant_fields().eq(other.significant_fields()) && self.unknown == other.unknown
    }
}

fn expected_shape(field: &FieldDescriptor) -> String {
    if field.is_map() {
        format!("map<{}>", field.field_type)
    } else if field.is_repeated() {
        format!("repeated {}", field.field_type)
    } else {
        field.field_type.to_string()
    }
}
