//! Human-readable rendering of decoded messages.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use proto_types::{FieldValue, MapKey, Message, MessageDescriptor, Schema};
use std::fmt;

/// Displays a message with field names resolved through its descriptor.
///
/// Scalar sequences print inline, nested messages and maps as indented
/// blocks, and preserved unknown fields as `#number [wire type] N bytes`.
pub struct MessageView<'a> {
    schema: &'a Schema,
    descriptor: &'a MessageDescriptor,
    message: &'a Message,
}

impl<'a> MessageView<'a> {
    pub fn new(schema: &'a Schema, descriptor: &'a MessageDescriptor, message: &'a Message) -> Self {
        Self {
            schema,
            descriptor,
            message,
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        for (number, value) in self.message.fields() {
            let field = self.descriptor.field(number);
            let label = field.map_or_else(|| format!("#{number}"), |field| field.name.clone());
            let nested = field
                .and_then(|field| field.message_type.as_deref())
                .and_then(|name| self.schema.get_message(name));

            match value {
                FieldValue::Repeated(values)
                    if !values.iter().any(|v| matches!(v, FieldValue::Message(_))) =>
                {
                    write!(f, "{:indent$}{label}: [", "")?;
                    for (i, value) in values.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write_scalar(f, value)?;
                    }
                    writeln!(f, "]")?;
                }
                FieldValue::Repeated(values) => {
                    for value in values.iter() {
                        self.write_entry(f, indent, &label, value, nested)?;
                    }
                }
                FieldValue::Map(map) => {
                    writeln!(f, "{:indent$}{label} {{", "")?;
                    for (key, value) in map.iter() {
                        self.write_entry(f, indent + 2, &render_key(key), value, nested)?;
                    }
                    writeln!(f, "{:indent$}}}", "")?;
                }
                other => self.write_entry(f, indent, &label, other, nested)?,
            }
        }

        for unknown in self.message.unknown_fields() {
            writeln!(
                f,
                "{:indent$}#{} [{}] {} bytes",
                "",
                unknown.number,
                unknown.wire_type,
                unknown.raw.len()
            )?;
        }
        Ok(())
    }

    fn write_entry(
        &self,
        f: &mut fmt::Formatter<'_>,
        indent: usize,
        label: &str,
        value: &FieldValue,
        nested: Option<&MessageDescriptor>,
    ) -> fmt::Result {
        match (value, nested) {
            (FieldValue::Message(inner), Some(descriptor)) => {
                writeln!(f, "{:indent$}{label} {{", "")?;
                MessageView::new(self.schema, descriptor, inner).write(f, indent + 2)?;
                writeln!(f, "{:indent$}}}", "")
            }
            _ => {
                write!(f, "{:indent$}{label}: ", "")?;
                write_scalar(f, value)?;
                writeln!(f)
            }
        }
    }
}

impl fmt::Display for MessageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, 0)
    }
}

fn write_scalar(f: &mut fmt::Formatter<'_>, value: &FieldValue) -> fmt::Result {
    match value {
        FieldValue::Bool(v) => write!(f, "{v}"),
        FieldValue::Int32(v) => write!(f, "{v}"),
        FieldValue::Uint32(v) => write!(f, "{v}"),
        FieldValue::Wide(v) => write!(f, "{v}"),
        FieldValue::Float(v) => write!(f, "{v}"),
        FieldValue::Double(v) => write!(f, "{v}"),
        FieldValue::Enum(v) => write!(f, "{v}"),
        FieldValue::String(v) => write!(f, "{v:?}"),
        FieldValue::Bytes(v) => write!(f, "base64:{}", BASE64.encode(v)),
        FieldValue::Message(v) => write!(f, "{{ {} fields }}", v.len()),
        FieldValue::Repeated(v) => write!(f, "[{} values]", v.len()),
        FieldValue::Map(v) => write!(f, "{{ {} entries }}", v.len()),
    }
}

fn render_key(key: &MapKey) -> String {
    match key {
        MapKey::Int32(v) => v.to_string(),
        MapKey::Uint32(v) => v.to_string(),
        MapKey::Wide(v) => v.to_string(),
        MapKey::String(v) => format!("{v:?}"),
    }
}
