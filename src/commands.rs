//! Subcommand implementations.
//!
//! Each command returns its output instead of printing it, so `main` stays a
//! thin dispatcher and the commands can be tested against temporary files.

use crate::render::MessageView;
use crate::{InputOpts, MessageOpts};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use proto_codec::inspect::inspect_with_depth;
use proto_codec::{CodecConfig, Listing, MessageCodec};
use proto_types::{FieldDescriptor, FieldModifier, FieldType, Message, Schema};
use std::fmt::Write;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Read an encoded payload, decoding base64 text when requested.
/// Whitespace in base64 input is ignored.
pub fn read_input(input: &InputOpts) -> Result<Bytes> {
    let raw = fs::read(&input.input)
        .with_context(|| format!("Failed to read input from {:?}", input.input))?;
    if !input.base64 {
        return Ok(Bytes::from(raw));
    }
    let text: Vec<u8> = raw
        .into_iter()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let decoded = BASE64
        .decode(&text)
        .with_context(|| format!("Input {:?} is not valid base64", input.input))?;
    debug!(len = decoded.len(), "decoded base64 input");
    Ok(Bytes::from(decoded))
}

pub fn load_schema(path: &Path) -> Result<Schema> {
    Schema::from_file(path).with_context(|| format!("Failed to load schema from {path:?}"))
}

/// Schema-less listing of every field in the payload.
pub fn inspect_payload(input: &InputOpts, config: &CodecConfig) -> Result<String> {
    let data = read_input(input)?;
    let fields = inspect_with_depth(data, config.max_depth)
        .with_context(|| format!("Failed to parse {:?}", input.input))?;
    Ok(Listing(&fields).to_string())
}

/// List message types and their fields, or dump the table as JSON.
pub fn describe_schema(path: &Path, json: bool) -> Result<String> {
    let schema = load_schema(path)?;
    if json {
        return serde_json::to_string_pretty(&schema).context("Failed to serialize schema");
    }

    let mut out = String::new();
    for descriptor in schema.messages() {
        writeln!(out, "{}", descriptor.name)?;
        for field in &descriptor.fields {
            writeln!(
                out,
                "  {} = {}: {}",
                field.name,
                field.number,
                describe_field(field)
            )?;
        }
    }
    Ok(out)
}

fn describe_field(field: &FieldDescriptor) -> String {
    let value = match &field.message_type {
        Some(name) => format!("{} {name}", field.field_type),
        None => field.field_type.to_string(),
    };
    let mut text = match field.modifier {
        FieldModifier::Singular => value,
        FieldModifier::Repeated if field.field_type.is_packable() && !field.is_packed() => {
            format!("repeated {value} (unpacked)")
        }
        FieldModifier::Repeated => format!("repeated {value}"),
        FieldModifier::Map => format!(
            "map<{}, {value}>",
            field.key_type.map_or("?", FieldType::type_name)
        ),
    };
    if let Some(index) = field.oneof {
        let _ = write!(text, " (oneof {index})");
    }
    text
}

fn decode_message(
    opts: &MessageOpts,
    input: &InputOpts,
    config: CodecConfig,
) -> Result<(MessageCodec, Message)> {
    let schema = load_schema(&opts.schema)?;
    let codec = MessageCodec::new(schema, config).context("Failed to build codec")?;
    let data = read_input(input)?;
    let len = data.len();
    let message = codec
        .decode_bytes(&opts.message_type, data)
        .with_context(|| format!("Failed to decode {:?} as {}", input.input, opts.message_type))?;
    info!(
        message_type = %opts.message_type,
        bytes = len,
        fields = message.len(),
        unknown = message.unknown_fields().len(),
        "decoded message"
    );
    Ok((codec, message))
}

/// Decode the payload and render it with field names.
pub fn decode_payload(opts: &MessageOpts, input: &InputOpts, config: CodecConfig) -> Result<String> {
    let (codec, message) = decode_message(opts, input, config)?;
    let descriptor = codec
        .schema()
        .get_message(&opts.message_type)
        .ok_or_else(|| anyhow!("Message type not found: {}", opts.message_type))?;
    Ok(MessageView::new(codec.schema(), descriptor, &message).to_string())
}

/// Decode the payload, encode it again and write the result to `output`.
/// Returns the number of bytes written.
pub fn reencode_payload(
    opts: &MessageOpts,
    input: &InputOpts,
    output: &Path,
    mut config: CodecConfig,
    skip_defaults: bool,
) -> Result<usize> {
    config.skip_default_scalars |= skip_defaults;
    let (codec, message) = decode_message(opts, input, config)?;
    let encoded = codec
        .encode(&message, &opts.message_type)
        .with_context(|| format!("Failed to encode {}", opts.message_type))?;
    fs::write(output, &encoded).with_context(|| format!("Failed to write output to {output:?}"))?;
    info!(
        message_type = %opts.message_type,
        bytes = encoded.len(),
        output = ?output,
        "wrote re-encoded message"
    );
    Ok(encoded.len())
}
