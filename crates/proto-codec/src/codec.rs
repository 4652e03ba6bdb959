//! Schema-driven message encoding and decoding.

use crate::config::{CodecConfig, UnknownFieldPolicy};
use crate::error::{CodecError, Result};
use crate::plan::{build_plans, FieldPlan, FieldShape, MessagePlan, ScalarCodec, ValueCodec};
use crate::reader::{Tag, WireReader};
use crate::varint::encoded_len_varint;
use crate::writer::{tag_len, WireWriter};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use proto_types::{
    default_for_type, FieldModifier, FieldValue, MapKey, Message, Schema, UnknownField, WireType,
};
use std::sync::Arc;
use tracing::{debug, trace};

/// Encodes and decodes messages of one [`Schema`].
///
/// Construction resolves every field descriptor into a [`FieldPlan`]; after
/// that the codec is immutable and can be shared between threads behind an
/// `Arc`.
///
/// # Example
///
/// ```
/// use proto_codec::{CodecConfig, MessageCodec};
/// use proto_types::{FieldDescriptor, FieldType, Message, MessageDescriptor, Schema};
///
/// let schema = Schema::new(vec![MessageDescriptor::new(
///     "test.Person",
///     vec![
///         FieldDescriptor::new("name", 1, FieldType::String),
///         FieldDescriptor::new("ids", 2, FieldType::Int32).repeated().packed(false),
///     ],
/// )])
/// .unwrap();
/// let codec = MessageCodec::new(schema, CodecConfig::default()).unwrap();
///
/// let mut person = Message::new();
/// person.set(1, "hi");
/// person.append(2, 1).unwrap();
/// person.append(2, 300).unwrap();
///
/// let bytes = codec.encode(&person, "test.Person").unwrap();
/// assert_eq!(&bytes[..], &[0x0A, 0x02, 0x68, 0x69, 0x10, 0x01, 0x10, 0xAC, 0x02]);
/// assert_eq!(codec.decode("test.Person", &bytes).unwrap(), person);
/// ```
#[derive(Debug, Clone)]
pub struct MessageCodec {
    schema: Arc<Schema>,
    plans: Vec<MessagePlan>,
    config: CodecConfig,
}

/// The message and field a value belongs to, for error reporting.
#[derive(Clone, Copy)]
struct FieldSite<'a> {
    message: &'a MessagePlan,
    field: &'a FieldPlan,
}

impl FieldSite<'_> {
    fn value_mismatch(&self, actual: &'static str) -> CodecError {
        CodecError::FieldValueTypeMismatch {
            message: self.message.name.clone(),
            field: self.field.number,
            expected: self.field.expected.clone(),
            actual,
        }
    }

    fn wire_mismatch(&self, actual: WireType) -> CodecError {
        CodecError::WireTypeMismatch {
            message: self.message.name.clone(),
            field: self.field.number,
            field_type: self.field.field_type,
            actual,
        }
    }

    fn invalid_utf8(&self) -> CodecError {
        CodecError::InvalidUtf8 {
            message: self.message.name.clone(),
            field: self.field.number,
        }
    }

    fn expect_wire(&self, tag: Tag, expected: WireType) -> Result<()> {
        if tag.wire_type == expected {
            Ok(())
        } else {
            Err(self.wire_mismatch(tag.wire_type))
        }
    }
}

impl MessageCodec {
    pub fn new(schema: impl Into<Arc<Schema>>, config: CodecConfig) -> Result<Self> {
        config.validate()?;
        let schema = schema.into();
        let plans = build_plans(&schema)?;
        debug!(
            messages = plans.len(),
            max_depth = config.max_depth,
            unknown_fields = ?config.unknown_fields,
            "built message codec"
        );
        Ok(Self {
            schema,
            plans,
            config,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Encode `message` as an instance of `message_type`.
    ///
    /// Present fields are written in ascending field-number order, followed
    /// by preserved unknown fields. Fails with
    /// [`CodecError::FieldValueTypeMismatch`] when a stored value does not
    /// fit its descriptor, or is stored under an undeclared number.
    pub fn encode(&self, message: &Message, message_type: &str) -> Result<Bytes> {
        let index = self.plan_index(message_type)?;
        let len = self.message_len(message, index, 0)?;
        let mut writer = WireWriter::with_capacity(len);
        self.encode_message(message, index, &mut writer, 0)?;
        debug_assert_eq!(writer.len(), len);
        trace!(message_type, len, "encoded message");
        Ok(writer.into_bytes())
    }

    /// Exact size in bytes of `encode(message, message_type)`, without
    /// encoding. Fails the same way [`encode`](Self::encode) does.
    pub fn encoded_len(&self, message: &Message, message_type: &str) -> Result<usize> {
        let index = self.plan_index(message_type)?;
        self.message_len(message, index, 0)
    }

    /// Decode `data` as an instance of `message_type`.
    pub fn decode(&self, message_type: &str, data: &[u8]) -> Result<Message> {
        self.decode_bytes(message_type, Bytes::copy_from_slice(data))
    }

    /// Like [`decode`](Self::decode), but BYTES values and preserved unknown
    /// fields share `data` instead of copying it.
    pub fn decode_bytes(&self, message_type: &str, data: Bytes) -> Result<Message> {
        let index = self.plan_index(message_type)?;
        let mut reader = self.reader(data.clone());
        let mut message = Message::new();
        match self.decode_fields(&mut reader, index, &mut message, 0, None) {
            Ok(()) => Ok(message),
            Err(e) => {
                debug!(
                    message_type,
                    position = reader.position(),
                    error = %e,
                    payload = %BASE64.encode(&data),
                    "failed to decode message"
                );
                Err(e)
            }
        }
    }

    fn plan_index(&self, message_type: &str) -> Result<usize> {
        self.schema
            .message_index(message_type)
            .ok_or_else(|| CodecError::MessageTypeNotFound(message_type.to_string()))
    }

    fn reader(&self, data: Bytes) -> WireReader {
        WireReader::new(data).with_max_depth(self.config.max_depth)
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.config.max_depth {
            return Err(CodecError::MessageTooDeep {
                limit: self.config.max_depth,
            });
        }
        Ok(())
    }

    fn field_site<'a>(
        &self,
        plan: &'a MessagePlan,
        number: u32,
        value: &FieldValue,
    ) -> Result<FieldSite<'a>> {
        let field = plan
            .field(number)
            .ok_or_else(|| CodecError::FieldValueTypeMismatch {
                message: plan.name.clone(),
                field: number,
                expected: "a declared field".to_string(),
                actual: value.kind_name(),
            })?;
        Ok(FieldSite {
            message: plan,
            field,
        })
    }

    fn skips_default(&self, field: &FieldPlan, value: &FieldValue) -> bool {
        self.config.skip_default_scalars
            && field.oneof.is_none()
            && value.is_default_scalar()
            && value.matches_type(field.field_type)
    }

    // Size pass. Mirrors the encode functions below one for one; a nested
    // message is sized again at every enclosing level.

    fn message_len(&self, message: &Message, index: usize, depth: usize) -> Result<usize> {
        let plan = &self.plans[index];
        let mut len = 0;
        for (number, value) in message.fields() {
            let site = self.field_site(plan, number, value)?;
            len += self.field_len(site, value, depth)?;
        }
        if self.config.unknown_fields == UnknownFieldPolicy::Preserve {
            len += message
                .unknown_fields()
                .iter()
                .map(|unknown| unknown.raw.len())
                .sum::<usize>();
        }
        Ok(len)
    }

    fn field_len(&self, site: FieldSite<'_>, value: &FieldValue, depth: usize) -> Result<usize> {
        let field = site.field;
        match (field.shape, value) {
            (FieldShape::Singular, value) => {
                if self.skips_default(field, value) {
                    return Ok(0);
                }
                self.value_len(site, field.number, field.value, value, depth)
            }
            (FieldShape::Repeated { packed }, FieldValue::Repeated(items)) => match field.value {
                ValueCodec::Scalar(codec) if packed => {
                    if items.is_empty() {
                        return Ok(0);
                    }
                    let run = packed_len(site, codec, items)?;
                    Ok(tag_len(field.number) + encoded_len_varint(run as u64) + run)
                }
                codec => items
                    .iter()
                    .map(|item| self.value_len(site, field.number, codec, item, depth))
                    .sum(),
            },
            (FieldShape::Map { key }, FieldValue::Map(map)) => {
                let mut len = 0;
                for (entry_key, entry_value) in map.iter() {
                    let entry = self.map_entry_len(site, key, entry_key, entry_value, depth)?;
                    len += tag_len(field.number) + encoded_len_varint(entry as u64) + entry;
                }
                Ok(len)
            }
            (_, value) => Err(site.value_mismatch(value.kind_name())),
        }
    }

    fn map_entry_len(
        &self,
        site: FieldSite<'_>,
        key: ScalarCodec,
        entry_key: &MapKey,
        entry_value: &FieldValue,
        depth: usize,
    ) -> Result<usize> {
        let key_value = entry_key.to_value();
        let key_len = self.value_len(site, 1, ValueCodec::Scalar(key), &key_value, depth)?;
        let value_len = self.value_len(site, 2, site.field.value, entry_value, depth)?;
        Ok(key_len + value_len)
    }

    fn value_len(
        &self,
        site: FieldSite<'_>,
        number: u32,
        codec: ValueCodec,
        value: &FieldValue,
        depth: usize,
    ) -> Result<usize> {
        match (codec, value) {
            (ValueCodec::Scalar(scalar), value) => {
                let wire = scalar
                    .to_wire(value)
                    .ok_or_else(|| site.value_mismatch(value.kind_name()))?;
                Ok(tag_len(number) + wire.encoded_len())
            }
            (ValueCodec::Message(target), FieldValue::Message(nested)) => {
                self.check_depth(depth + 1)?;
                let len = self.message_len(nested, target, depth + 1)?;
                Ok(tag_len(number) + encoded_len_varint(len as u64) + len)
            }
            (ValueCodec::Group(target), FieldValue::Message(nested)) => {
                self.check_depth(depth + 1)?;
                Ok(2 * tag_len(number) + self.message_len(nested, target, depth + 1)?)
            }
            (_, value) => Err(site.value_mismatch(value.kind_name())),
        }
    }

    fn encode_message(
        &self,
        message: &Message,
        index: usize,
        writer: &mut WireWriter,
        depth: usize,
    ) -> Result<()> {
        let plan = &self.plans[index];
        for (number, value) in message.fields() {
            let site = self.field_site(plan, number, value)?;
            self.encode_field(site, value, writer, depth)?;
        }
        if self.config.unknown_fields == UnknownFieldPolicy::Preserve {
            for unknown in message.unknown_fields() {
                writer.write_raw(&unknown.raw);
            }
        }
        Ok(())
    }

    fn encode_field(
        &self,
        site: FieldSite<'_>,
        value: &FieldValue,
        writer: &mut WireWriter,
        depth: usize,
    ) -> Result<()> {
        let field = site.field;
        match (field.shape, value) {
            (FieldShape::Singular, value) => {
                if self.skips_default(field, value) {
                    return Ok(());
                }
                self.encode_value(site, field.number, field.value, value, writer, depth)
            }
            (FieldShape::Repeated { packed }, FieldValue::Repeated(items)) => {
                match field.value {
                    ValueCodec::Scalar(codec) if packed => {
                        if items.is_empty() {
                            return Ok(());
                        }
                        writer.write_tag(field.number, WireType::LengthDelimited);
                        writer.write_varint(packed_len(site, codec, items)? as u64);
                        for item in items.iter() {
                            let wire = codec
                                .to_wire(item)
                                .ok_or_else(|| site.value_mismatch(item.kind_name()))?;
                            writer.write_value(wire);
                        }
                    }
                    codec => {
                        for item in items.iter() {
                            self.encode_value(site, field.number, codec, item, writer, depth)?;
                        }
                    }
                }
                Ok(())
            }
            (FieldShape::Map { key }, FieldValue::Map(map)) => {
                for (entry_key, entry_value) in map.iter() {
                    let entry = self.map_entry_len(site, key, entry_key, entry_value, depth)?;
                    writer.write_tag(field.number, WireType::LengthDelimited);
                    writer.write_varint(entry as u64);
                    let key_value = entry_key.to_value();
                    self.encode_value(site, 1, ValueCodec::Scalar(key), &key_value, writer, depth)?;
                    self.encode_value(site, 2, field.value, entry_value, writer, depth)?;
                }
                Ok(())
            }
            (_, value) => Err(site.value_mismatch(value.kind_name())),
        }
    }

    /// Write one tagged value under `number`.
    fn encode_value(
        &self,
        site: FieldSite<'_>,
        number: u32,
        codec: ValueCodec,
        value: &FieldValue,
        writer: &mut WireWriter,
        depth: usize,
    ) -> Result<()> {
        match (codec, value) {
            (ValueCodec::Scalar(scalar), value) => {
                let wire = scalar
                    .to_wire(value)
                    .ok_or_else(|| site.value_mismatch(value.kind_name()))?;
                writer.write_field(number, wire);
            }
            (ValueCodec::Message(target), FieldValue::Message(nested)) => {
                self.check_depth(depth + 1)?;
                writer.write_tag(number, WireType::LengthDelimited);
                writer.write_varint(self.message_len(nested, target, depth + 1)? as u64);
                self.encode_message(nested, target, writer, depth + 1)?;
            }
            (ValueCodec::Group(target), FieldValue::Message(nested)) => {
                self.check_depth(depth + 1)?;
                writer.write_tag(number, WireType::StartGroup);
                self.encode_message(nested, target, writer, depth + 1)?;
                writer.write_tag(number, WireType::EndGroup);
            }
            (_, value) => return Err(site.value_mismatch(value.kind_name())),
        }
        Ok(())
    }

    /// Decode fields into `message` until the buffer ends, or until the
    /// END_GROUP closing `group` when decoding a group body.
    fn decode_fields(
        &self,
        reader: &mut WireReader,
        index: usize,
        message: &mut Message,
        depth: usize,
        group: Option<u32>,
    ) -> Result<()> {
        let plan = &self.plans[index];
        loop {
            if reader.is_eof() {
                return match group {
                    Some(_) => Err(CodecError::TruncatedMessage),
                    None => Ok(()),
                };
            }
            let tag = reader.read_tag()?;
            if tag.wire_type == WireType::EndGroup {
                return match group {
                    Some(number) if number == tag.field_number => Ok(()),
                    _ => Err(CodecError::UnexpectedEndGroup(tag.field_number)),
                };
            }
            match plan.field(tag.field_number) {
                Some(field) => {
                    trace!(
                        message_type = %plan.name,
                        field = %field.name,
                        wire_type = %tag.wire_type,
                        "decoding field"
                    );
                    let site = FieldSite {
                        message: plan,
                        field,
                    };
                    self.decode_field(reader, site, tag, message, depth)?;
                }
                None => self.decode_unknown(reader, plan, tag, message, depth)?,
            }
        }
    }

    fn decode_unknown(
        &self,
        reader: &mut WireReader,
        plan: &MessagePlan,
        tag: Tag,
        message: &mut Message,
        depth: usize,
    ) -> Result<()> {
        let raw = reader.skip_nested(tag, depth)?;
        match self.config.unknown_fields {
            UnknownFieldPolicy::Preserve => {
                debug!(
                    message_type = %plan.name,
                    field = tag.field_number,
                    wire_type = %tag.wire_type,
                    len = raw.len(),
                    "preserving unknown field"
                );
                message.push_unknown(UnknownField {
                    number: tag.field_number,
                    wire_type: tag.wire_type,
                    raw,
                });
            }
            UnknownFieldPolicy::Discard => {
                debug!(
                    message_type = %plan.name,
                    field = tag.field_number,
                    wire_type = %tag.wire_type,
                    "discarding unknown field"
                );
            }
        }
        Ok(())
    }

    fn decode_field(
        &self,
        reader: &mut WireReader,
        site: FieldSite<'_>,
        tag: Tag,
        message: &mut Message,
        depth: usize,
    ) -> Result<()> {
        let field = site.field;
        let repeated = matches!(field.shape, FieldShape::Repeated { .. });
        if let Some(group) = field.oneof {
            // the last member seen on the wire is the one that survives
            for &sibling in site.message.oneof_members(group) {
                if sibling != field.number {
                    message.clear_field(sibling);
                }
            }
        }
        match (field.shape, field.value) {
            (FieldShape::Map { key }, _) => {
                site.expect_wire(tag, WireType::LengthDelimited)?;
                let payload = reader.read_length_delimited()?;
                let (entry_key, entry_value) = self.decode_map_entry(payload, site, key, depth)?;
                message.map_mut(field.number)?.insert(entry_key, entry_value);
            }
            (_, ValueCodec::Scalar(codec)) => {
                if codec.accepts(tag.wire_type) {
                    let value = read_scalar(reader, site, codec, tag.wire_type)?;
                    if repeated {
                        message.append(field.number, value)?;
                    } else {
                        message.set(field.number, value);
                    }
                } else if tag.wire_type == WireType::LengthDelimited && codec.is_packable() {
                    let payload = reader.read_length_delimited()?;
                    if repeated {
                        codec.read_packed(payload, message.repeated_mut(field.number)?)?;
                    } else {
                        // a packed run sent to a singular field: last element wins
                        let mut values = Vec::new();
                        codec.read_packed(payload, &mut values)?;
                        if let Some(last) = values.pop() {
                            message.set(field.number, last);
                        }
                    }
                } else {
                    return Err(site.wire_mismatch(tag.wire_type));
                }
            }
            (_, ValueCodec::Message(target)) => {
                site.expect_wire(tag, WireType::LengthDelimited)?;
                let payload = reader.read_length_delimited()?;
                if repeated {
                    let mut nested = Message::new();
                    self.decode_nested(payload, target, &mut nested, depth + 1)?;
                    message.append(field.number, nested)?;
                } else {
                    // a repeated occurrence merges into the existing message
                    let nested = message.message_mut(field.number)?;
                    self.decode_nested(payload, target, nested, depth + 1)?;
                }
            }
            (_, ValueCodec::Group(target)) => {
                site.expect_wire(tag, WireType::StartGroup)?;
                self.check_depth(depth + 1)?;
                if repeated {
                    let mut nested = Message::new();
                    self.decode_fields(reader, target, &mut nested, depth + 1, Some(field.number))?;
                    message.append(field.number, nested)?;
                } else {
                    let nested = message.message_mut(field.number)?;
                    self.decode_fields(reader, target, nested, depth + 1, Some(field.number))?;
                }
            }
        }
        Ok(())
    }

    fn decode_nested(
        &self,
        payload: Bytes,
        index: usize,
        message: &mut Message,
        depth: usize,
    ) -> Result<()> {
        self.check_depth(depth)?;
        let mut reader = self.reader(payload);
        self.decode_fields(&mut reader, index, message, depth, None)
    }

    /// Decode one `{1: key, 2: value}` entry. A missing key or value takes
    /// its type default; a message value defaults to an empty message.
    fn decode_map_entry(
        &self,
        payload: Bytes,
        site: FieldSite<'_>,
        key: ScalarCodec,
        depth: usize,
    ) -> Result<(MapKey, FieldValue)> {
        let mut reader = self.reader(payload);
        let mut entry_key = None;
        let mut entry_value = None;

        while !reader.is_eof() {
            let tag = reader.read_tag()?;
            match (tag.field_number, site.field.value) {
                (1, _) if key.accepts(tag.wire_type) => {
                    entry_key = Some(read_scalar(&mut reader, site, key, tag.wire_type)?);
                }
                (2, ValueCodec::Scalar(codec)) if codec.accepts(tag.wire_type) => {
                    entry_value = Some(read_scalar(&mut reader, site, codec, tag.wire_type)?);
                }
                (2, ValueCodec::Message(target)) if tag.wire_type == WireType::LengthDelimited => {
                    let payload = reader.read_length_delimited()?;
                    let mut nested = match entry_value.take() {
                        Some(FieldValue::Message(existing)) => *existing,
                        _ => Message::new(),
                    };
                    self.decode_nested(payload, target, &mut nested, depth + 1)?;
                    entry_value = Some(FieldValue::from(nested));
                }
                (1 | 2, _) => return Err(site.wire_mismatch(tag.wire_type)),
                _ => {
                    reader.skip_nested(tag, depth)?;
                }
            }
        }

        let entry_key = match entry_key {
            Some(value) => value,
            None => scalar_default(site, key)?,
        };
        let entry_key =
            MapKey::from_value(entry_key).ok_or_else(|| site.value_mismatch("map key"))?;
        let entry_value = match (entry_value, site.field.value) {
            (Some(value), _) => value,
            (None, ValueCodec::Scalar(codec)) => scalar_default(site, codec)?,
            (None, _) => FieldValue::from(Message::new()),
        };
        Ok((entry_key, entry_value))
    }
}

fn read_scalar(
    reader: &mut WireReader,
    site: FieldSite<'_>,
    codec: ScalarCodec,
    wire_type: WireType,
) -> Result<FieldValue> {
    codec
        .read(reader, wire_type)?
        .ok_or_else(|| site.invalid_utf8())
}

fn scalar_default(site: FieldSite<'_>, codec: ScalarCodec) -> Result<FieldValue> {
    default_for_type(FieldModifier::Singular, codec.field_type())
        .cloned()
        .ok_or_else(|| site.value_mismatch("absent value"))
}

/// Payload size of a packed run, without tag or length prefix.
fn packed_len(site: FieldSite<'_>, codec: ScalarCodec, items: &[FieldValue]) -> Result<usize> {
    items
        .iter()
        .map(|item| {
            codec
                .to_wire(item)
                .map(|wire| wire.encoded_len())
                .ok_or_else(|| site.value_mismatch(item.kind_name()))
        })
        .sum()
}
