//! Schema-driven encoding, decoding and verification of [Message]s.
//!
//! Every function walks a [Schema] alongside a [Message] (or wire bytes). Embedded message and
//! enum types are looked up by name through a [Resolver] only when a value of that type is
//! actually encountered, so recursive schemas never cause unbounded work on their own.
//!
//! # Format
//!
//! Fields are written in schema declaration order as `(tag, payload)` pairs, where the tag is the
//! varint `(number << 3) | wire_type`. Singular fields without explicit presence are omitted when
//! they hold their default value. Repeated fields emit one pair per element, or a single
//! length-delimited pair when packed. Maps emit one length-delimited `{1: key, 2: value}` entry
//! per key. Unknown fields preserved by [decode] are appended after the known fields.
//!
//! Decoding accepts fields in any order, skips numbers the schema does not describe (according to
//! [Config::unknown_fields]), accepts repeated numeric fields in both packed and unpacked form and
//! lets the last occurrence of a singular field or oneof member win (embedded messages merge).

use crate::{
    field::{self, delimited_len},
    schema::{Field, Label, Schema, Type},
    value::{key_ref, FieldValue, Message, Value},
    varint,
    wire::{Reader, Tag, WireType, Writer, MAX_FIELD_NUMBER},
    Config, Error, Resolver, UnknownFields,
};
use bytes::{Buf, Bytes};
use std::collections::HashSet;
use tracing::{trace, warn};

/// Names the field a value error was found in. Errors that already name a field (those from
/// embedded messages) are kept.
fn in_field(schema: &Schema, field: &Field, err: Error) -> Error {
    match err {
        Error::InvalidValue(context, reason) if !context.contains('.') => {
            Error::InvalidValue(format!("{}.{}", schema.name(), field.name()), reason)
        }
        other => other,
    }
}

fn invalid(schema: &Schema, reason: String) -> Error {
    Error::InvalidValue(schema.name().to_string(), reason)
}

/// What a message holds for one schema field.
enum Slot<'a> {
    Single(&'a Value),
    Repeated(&'a [Value]),
    Map(&'a [(Value, Value)]),
}

/// Collects the values to emit for `field`, in emission order.
fn slots<'a>(schema: &Schema, field: &Field, message: &'a Message) -> Result<Vec<Slot<'a>>, Error> {
    let mut slots = Vec::new();
    match message.field(field.number()) {
        None => {}
        Some(FieldValue::Single(value)) => {
            if field.is_repeated() || field.is_map() {
                return Err(in_field(schema, field, Error::InvalidValue(String::new(), "expected a collection".into())));
            }
            if field.has_presence() || !field::is_default(value) {
                slots.push(Slot::Single(value));
            }
        }
        Some(FieldValue::Repeated(values)) => {
            if !field.is_repeated() {
                return Err(in_field(schema, field, Error::InvalidValue(String::new(), "unexpected repeated value".into())));
            }
            slots.push(Slot::Repeated(values));
        }
        Some(FieldValue::Map(entries)) => {
            if !field.is_map() {
                return Err(in_field(schema, field, Error::InvalidValue(String::new(), "unexpected map value".into())));
            }
            slots.push(Slot::Map(entries));
        }
    }
    if let Some(index) = field.oneof() {
        let group = &schema.oneofs()[index];
        if let Some(case) = message.which(group) {
            if case.number == field.number() {
                slots.push(Slot::Single(&case.value));
            }
        }
    }
    Ok(slots)
}

/// Rejects regular fields and oneof cases the schema does not describe, and preserved unknown
/// fields whose numbers cannot be written as a tag.
fn check_membership(schema: &Schema, message: &Message) -> Result<(), Error> {
    for (number, _) in message.fields() {
        if schema.field_by_number(number).is_none() {
            return Err(invalid(schema, format!("unknown field number {number}")));
        }
    }
    for unknown in message.unknown_fields() {
        if unknown.number == 0 || unknown.number > MAX_FIELD_NUMBER {
            return Err(invalid(
                schema,
                format!("invalid unknown field number {}", unknown.number),
            ));
        }
    }
    for (group, case) in message.cases() {
        let index = schema
            .oneof_index(group)
            .ok_or_else(|| invalid(schema, format!("unknown oneof {group}")))?;
        match schema.field_by_number(case.number) {
            Some(field) if field.oneof() == Some(index) => {}
            _ => {
                return Err(invalid(
                    schema,
                    format!("field {} is not a member of oneof {group}", case.number),
                ))
            }
        }
    }
    Ok(())
}

/// Length of the payload (no tag) of a single value of type `ty`.
fn value_len<R: Resolver + ?Sized>(resolver: &R, ty: &Type, value: &Value) -> Result<usize, Error> {
    match (ty, value) {
        (Type::Scalar(scalar), value) => field::scalar_len(*scalar, value),
        (Type::Enum(_), Value::Enum(number)) => Ok(varint::size(*number as i64 as u64)),
        (Type::Message(name), Value::Message(message)) => {
            let schema = resolver.resolve(name)?;
            Ok(delimited_len(encoded_len(resolver, schema, message)?))
        }
        (Type::Enum(name) | Type::Message(name), value) => Err(Error::InvalidValue(
            value.kind().to_string(),
            format!("expected {name}"),
        )),
        (Type::Map(_, _), _) => Err(Error::InvalidValue(
            "map".into(),
            "nested maps are not supported".into(),
        )),
    }
}

fn write_value<R: Resolver + ?Sized>(
    resolver: &R,
    writer: &mut Writer,
    ty: &Type,
    value: &Value,
) -> Result<(), Error> {
    match (ty, value) {
        (Type::Scalar(scalar), value) => field::write_scalar(writer, *scalar, value),
        (Type::Enum(_), Value::Enum(number)) => {
            writer.write_varint(*number as i64 as u64);
            Ok(())
        }
        (Type::Message(name), Value::Message(message)) => {
            let schema = resolver.resolve(name)?;
            writer.write_varint(encoded_len(resolver, schema, message)? as u64);
            write(resolver, schema, message, writer)
        }
        // Rejected by `value_len` before anything is written.
        _ => Err(Error::InvalidValue(
            "value".into(),
            format!("found {}", value.kind()),
        )),
    }
}

fn entry_len<R: Resolver + ?Sized>(
    resolver: &R,
    key_type: &Type,
    value_type: &Type,
    key: &Value,
    value: &Value,
) -> Result<usize, Error> {
    Ok(Tag::encoded_len(1)
        + value_len(resolver, key_type, key)?
        + Tag::encoded_len(2)
        + value_len(resolver, value_type, value)?)
}

fn slot_len<R: Resolver + ?Sized>(resolver: &R, field: &Field, slot: Slot<'_>) -> Result<usize, Error> {
    let tag_len = Tag::encoded_len(field.number());
    let ty = field.ty();
    match slot {
        Slot::Single(value) => Ok(tag_len + value_len(resolver, ty, value)?),
        Slot::Repeated(values) if field.is_packed() => {
            if values.is_empty() {
                return Ok(0);
            }
            let mut payload = 0;
            for value in values {
                payload += value_len(resolver, ty, value)?;
            }
            Ok(tag_len + delimited_len(payload))
        }
        Slot::Repeated(values) => {
            let mut len = 0;
            for value in values {
                len += tag_len + value_len(resolver, ty, value)?;
            }
            Ok(len)
        }
        Slot::Map(entries) => {
            let Type::Map(key, value_type) = ty else {
                unreachable!("map slots only exist for map fields");
            };
            let key_type = Type::Scalar(*key);
            let mut len = 0;
            for (k, v) in entries {
                len += tag_len + delimited_len(entry_len(resolver, &key_type, value_type, k, v)?);
            }
            Ok(len)
        }
    }
}

/// Returns the exact number of bytes [write] produces for `message`.
pub fn encoded_len<R: Resolver + ?Sized>(
    resolver: &R,
    schema: &Schema,
    message: &Message,
) -> Result<usize, Error> {
    check_membership(schema, message)?;
    let mut len = 0;
    for field in schema.fields() {
        for slot in slots(schema, field, message)? {
            len += slot_len(resolver, field, slot).map_err(|err| in_field(schema, field, err))?;
        }
    }
    for unknown in message.unknown_fields() {
        len += unknown.payload.encoded_len(unknown.number);
    }
    Ok(len)
}

/// Writes `message` to `writer`.
pub fn write<R: Resolver + ?Sized>(
    resolver: &R,
    schema: &Schema,
    message: &Message,
    writer: &mut Writer,
) -> Result<(), Error> {
    for field in schema.fields() {
        let number = field.number();
        for slot in slots(schema, field, message)? {
            match (slot, field.ty()) {
                (Slot::Single(value), ty) => {
                    writer.write_tag(number, ty.wire_type());
                    write_value(resolver, writer, ty, value)?;
                }
                (Slot::Repeated(values), ty) if field.is_packed() => {
                    if values.is_empty() {
                        continue;
                    }
                    let mut payload = 0;
                    for value in values {
                        payload += value_len(resolver, ty, value)?;
                    }
                    writer.write_tag(number, WireType::LengthDelimited);
                    writer.write_varint(payload as u64);
                    for value in values {
                        write_value(resolver, writer, ty, value)?;
                    }
                }
                (Slot::Repeated(values), ty) => {
                    for value in values {
                        writer.write_tag(number, ty.wire_type());
                        write_value(resolver, writer, ty, value)?;
                    }
                }
                (Slot::Map(entries), Type::Map(key, value_type)) => {
                    let key_type = Type::Scalar(*key);
                    for (k, v) in entries {
                        writer.write_tag(number, WireType::LengthDelimited);
                        let entry = entry_len(resolver, &key_type, value_type, k, v)?;
                        writer.write_varint(entry as u64);
                        writer.write_tag(1, key_type.wire_type());
                        write_value(resolver, writer, &key_type, k)?;
                        writer.write_tag(2, value_type.wire_type());
                        write_value(resolver, writer, value_type, v)?;
                    }
                }
                (Slot::Map(_), _) => unreachable!("map slots only exist for map fields"),
            }
        }
    }
    for unknown in message.unknown_fields() {
        writer.write_payload(unknown.number, &unknown.payload);
    }
    Ok(())
}

/// Encodes `message` as an instance of `schema`.
///
/// The message does not need to pass [verify] first, but every value must match the kind of
/// its field and every embedded type must resolve.
pub fn encode<R: Resolver + ?Sized>(
    resolver: &R,
    schema: &Schema,
    message: &Message,
) -> Result<Bytes, Error> {
    let len = encoded_len(resolver, schema, message)?;
    let mut writer = Writer::with_capacity(len);
    write(resolver, schema, message, &mut writer)?;
    assert_eq!(writer.len(), len, "write() did not write expected bytes");
    Ok(writer.finish())
}

/// Encodes `message` preceded by its length as a varint.
pub fn encode_delimited<R: Resolver + ?Sized>(
    resolver: &R,
    schema: &Schema,
    message: &Message,
) -> Result<Bytes, Error> {
    let len = encoded_len(resolver, schema, message)?;
    let mut writer = Writer::with_capacity(delimited_len(len));
    writer.write_varint(len as u64);
    write(resolver, schema, message, &mut writer)?;
    assert_eq!(writer.len(), delimited_len(len), "write() did not write expected bytes");
    Ok(writer.finish())
}

/// Reads a single value of type `ty` (tag already consumed).
fn read_value<R: Resolver + ?Sized>(
    resolver: &R,
    ty: &Type,
    reader: &mut Reader,
    config: &Config,
    depth: usize,
) -> Result<Value, Error> {
    match ty {
        Type::Scalar(scalar) => field::read_scalar(reader, *scalar),
        Type::Enum(_) => Ok(Value::Enum(reader.read_varint()? as i32)),
        Type::Message(name) => {
            let schema = resolver.resolve(name)?;
            let mut sub = reader.read_delimited()?;
            read_fields(resolver, schema, &mut sub, config, depth + 1).map(Value::Message)
        }
        Type::Map(_, _) => Err(Error::InvalidValue(
            "map".into(),
            "nested maps are not supported".into(),
        )),
    }
}

/// The value a map entry takes when its key or value is missing from the wire.
fn entry_default(ty: &Type) -> Value {
    match ty {
        Type::Scalar(scalar) => field::default_value(*scalar),
        Type::Enum(_) => Value::Enum(0),
        Type::Message(_) | Type::Map(_, _) => Value::Message(Message::new()),
    }
}

fn expect_wire_type(field: u32, expected: WireType, tag: Tag) -> Result<(), Error> {
    if tag.wire_type != expected {
        return Err(Error::WireTypeMismatch {
            field,
            expected,
            found: tag.wire_type,
        });
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn read_field<R: Resolver + ?Sized>(
    resolver: &R,
    schema: &Schema,
    field: &Field,
    tag: Tag,
    reader: &mut Reader,
    message: &mut Message,
    config: &Config,
    depth: usize,
) -> Result<(), Error> {
    let number = field.number();
    let ty = field.ty();

    // Map entry
    if let Type::Map(key, value_type) = ty {
        expect_wire_type(number, WireType::LengthDelimited, tag)?;
        let key_type = Type::Scalar(*key);
        let mut entry = reader.read_delimited()?;
        let mut k = None;
        let mut v = None;
        while !entry.is_empty() {
            let tag = entry.read_tag()?;
            match tag.number {
                1 => {
                    expect_wire_type(1, key_type.wire_type(), tag)?;
                    k = Some(read_value(resolver, &key_type, &mut entry, config, depth)?);
                }
                2 => {
                    expect_wire_type(2, value_type.wire_type(), tag)?;
                    v = Some(read_value(resolver, value_type, &mut entry, config, depth)?);
                }
                _ => {
                    entry.skip(tag)?;
                }
            }
        }
        let k = k.unwrap_or_else(|| entry_default(&key_type));
        let v = v.unwrap_or_else(|| entry_default(value_type));
        message.append_entry(number, k, v);
        return Ok(());
    }

    // Packed elements
    if field.is_repeated()
        && ty.is_packable()
        && tag.wire_type == WireType::LengthDelimited
    {
        let mut packed = reader.read_delimited()?;
        while !packed.is_empty() {
            let value = read_value(resolver, ty, &mut packed, config, depth)?;
            message.push(number, value);
        }
        return Ok(());
    }

    expect_wire_type(number, ty.wire_type(), tag)?;
    let value = read_value(resolver, ty, reader, config, depth)?;
    if field.is_repeated() {
        message.push(number, value);
    } else if let Some(index) = field.oneof() {
        message.merge_case(&schema.oneofs()[index], number, value);
    } else {
        message.merge_single(number, value);
    }
    Ok(())
}

/// Reads fields from `reader` until it is exhausted.
///
/// `depth` is the nesting level of this message (0 for the outermost).
pub fn read<R: Resolver + ?Sized>(
    resolver: &R,
    schema: &Schema,
    reader: &mut Reader,
    config: &Config,
    depth: usize,
) -> Result<Message, Error> {
    let mut message = read_fields(resolver, schema, reader, config, depth)?;
    message.dedupe_entries();
    Ok(message)
}

// Map entries are appended as they arrive and deduplicated once by [read].
fn read_fields<R: Resolver + ?Sized>(
    resolver: &R,
    schema: &Schema,
    reader: &mut Reader,
    config: &Config,
    depth: usize,
) -> Result<Message, Error> {
    if depth > config.max_depth {
        return Err(Error::DepthExceeded(config.max_depth));
    }
    let mut message = Message::new();
    while !reader.is_empty() {
        let tag = reader.read_tag()?;
        match schema.field_by_number(tag.number) {
            Some(field) => {
                read_field(resolver, schema, field, tag, reader, &mut message, config, depth)?
            }
            None => match config.unknown_fields {
                UnknownFields::Preserve => {
                    let payload = reader.skip(tag)?;
                    trace!(
                        message = schema.name(),
                        field = tag.number,
                        "preserving unknown field"
                    );
                    message.push_unknown(tag.number, payload);
                }
                UnknownFields::Discard => {
                    reader.skip(tag)?;
                    trace!(
                        message = schema.name(),
                        field = tag.number,
                        "discarding unknown field"
                    );
                }
                UnknownFields::Reject => {
                    warn!(
                        message = schema.name(),
                        field = tag.number,
                        position = reader.position(),
                        "rejecting unknown field"
                    );
                    return Err(Error::UnknownField(schema.name().to_string(), tag.number));
                }
            },
        }
    }
    check_required(schema, &message)?;
    Ok(message)
}

fn check_required(schema: &Schema, message: &Message) -> Result<(), Error> {
    for field in schema.fields() {
        if field.label() == Label::Required && message.field(field.number()).is_none() {
            return Err(Error::MissingRequired(format!(
                "{}.{}",
                schema.name(),
                field.name()
            )));
        }
    }
    Ok(())
}

/// Decodes an instance of `schema` from all of `buf`.
///
/// Any failure discards the partially decoded message.
pub fn decode<R: Resolver + ?Sized>(
    resolver: &R,
    schema: &Schema,
    mut buf: impl Buf,
    config: &Config,
) -> Result<Message, Error> {
    let len = buf.remaining();
    if len > config.max_len {
        return Err(Error::LengthExceeded(len, config.max_len));
    }
    let mut reader = Reader::new(buf.copy_to_bytes(len));
    read(resolver, schema, &mut reader, config, 0)
}

/// Reads one length-prefixed instance of `schema`, leaving the reader after it.
pub fn read_delimited<R: Resolver + ?Sized>(
    resolver: &R,
    schema: &Schema,
    reader: &mut Reader,
    config: &Config,
) -> Result<Message, Error> {
    let len = reader.read_varint()?;
    let len = usize::try_from(len).map_err(|_| Error::Truncated)?;
    if len > config.max_len {
        return Err(Error::LengthExceeded(len, config.max_len));
    }
    let mut sub = reader.sub_reader(len)?;
    read(resolver, schema, &mut sub, config, 0)
}

/// Decodes exactly one length-prefixed instance of `schema` from `buf`.
pub fn decode_delimited<R: Resolver + ?Sized>(
    resolver: &R,
    schema: &Schema,
    mut buf: impl Buf,
    config: &Config,
) -> Result<Message, Error> {
    let len = buf.remaining();
    let mut reader = Reader::new(buf.copy_to_bytes(len));
    let message = read_delimited(resolver, schema, &mut reader, config)?;
    if !reader.is_empty() {
        return Err(Error::ExtraData(reader.remaining()));
    }
    Ok(message)
}

fn check_value<R: Resolver + ?Sized>(resolver: &R, ty: &Type, value: &Value) -> Result<(), Error> {
    match (ty, value) {
        (Type::Scalar(scalar), value) => {
            if !field::is_compatible(*scalar, value) {
                return Err(Error::InvalidValue(
                    scalar.name().to_string(),
                    format!("found {}", value.kind()),
                ));
            }
            Ok(())
        }
        (Type::Enum(_), Value::Enum(_)) => Ok(()),
        (Type::Message(name), Value::Message(message)) => {
            check(resolver, resolver.resolve(name)?, message)
        }
        (Type::Enum(name) | Type::Message(name), value) => Err(Error::InvalidValue(
            value.kind().to_string(),
            format!("expected {name}"),
        )),
        (Type::Map(_, _), _) => Err(Error::InvalidValue(
            "map".into(),
            "nested maps are not supported".into(),
        )),
    }
}

/// Checks `message` against `schema` without encoding it.
///
/// Reports, in order of discovery: fields or oneof cases the schema does not describe, values
/// of the wrong kind, more than one present member of a oneof group, duplicate map keys,
/// missing required fields, and the same problems in embedded messages.
pub fn check<R: Resolver + ?Sized>(
    resolver: &R,
    schema: &Schema,
    message: &Message,
) -> Result<(), Error> {
    check_membership(schema, message)?;

    for (index, group) in schema.oneofs().iter().enumerate() {
        let mut present = schema
            .oneof_members(index)
            .filter(|member| message.field(member.number()).is_some())
            .count();
        if message.which(group).is_some() {
            present += 1;
        }
        if present > 1 {
            return Err(Error::OneofViolation(
                schema.name().to_string(),
                group.clone(),
            ));
        }
    }

    for field in schema.fields() {
        for slot in slots(schema, field, message)? {
            match (slot, field.ty()) {
                (Slot::Single(value), ty) => check_value(resolver, ty, value),
                (Slot::Repeated(values), ty) => values
                    .iter()
                    .try_for_each(|value| check_value(resolver, ty, value)),
                (Slot::Map(entries), Type::Map(key, value_type)) => {
                    let key_type = Type::Scalar(*key);
                    let mut seen = HashSet::new();
                    for (k, v) in entries {
                        check_value(resolver, &key_type, k)?;
                        check_value(resolver, value_type, v)?;
                        if let Some(key) = key_ref(k) {
                            if !seen.insert(key) {
                                return Err(Error::DuplicateMapKey(format!(
                                    "{}.{}",
                                    schema.name(),
                                    field.name()
                                )));
                            }
                        }
                    }
                    Ok(())
                }
                (Slot::Map(_), _) => unreachable!("map slots only exist for map fields"),
            }
            .map_err(|err| in_field(schema, field, err))?;
        }
    }

    check_required(schema, message)
}

/// Returns `None` if `message` is a valid instance of `schema`, or a description of the first
/// problem found (see [check]).
pub fn verify<R: Resolver + ?Sized>(
    resolver: &R,
    schema: &Schema,
    message: &Message,
) -> Option<String> {
    check(resolver, schema, message).err().map(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{wire::Payload, Registry, Scalar};
    use wireform_macros::test_traced;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                Schema::new("test.Input")
                    .field(Field::scalar(1, "to_address", Scalar::String))
                    .field(Field::scalar(2, "amount", Scalar::Bytes))
                    .field(Field::scalar(3, "nonce", Scalar::Uint64))
                    .field(Field::scalar(4, "ids", Scalar::Int32).repeated().packed())
                    .field(Field::scalar(5, "names", Scalar::String).repeated())
                    .field(Field::map(6, "tags", Scalar::String, Type::Scalar(Scalar::Uint64)))
                    .field(Field::message(7, "memo", "test.Memo"))
                    .oneof(
                        "order",
                        [
                            Field::message(10, "trade", "test.Memo"),
                            Field::scalar(11, "label", Scalar::String),
                        ],
                    ),
            )
            .unwrap();
        registry
            .register(
                Schema::new("test.Memo")
                    .field(Field::scalar(1, "text", Scalar::String))
                    .field(Field::scalar(2, "count", Scalar::Uint32)),
            )
            .unwrap();
        registry
            .register(Schema::new("test.Scalar").field(Field::scalar(1, "a", Scalar::Int32)))
            .unwrap();
        registry
            .register(Schema::new("test.Req").field(Field::scalar(1, "id", Scalar::Uint32).required()))
            .unwrap();
        registry
            .register(Schema::new("test.Node").field(Field::message(1, "child", "test.Node")))
            .unwrap();
        registry.register(Schema::new("test.Empty")).unwrap();
        registry
            .register(Schema::new("test.Wrap").field(Field::message(1, "input", "test.Input")))
            .unwrap();
        registry.validate().unwrap();
        registry
    }

    fn sample() -> Message {
        let mut message = Message::new()
            .with(1, "bnb1")
            .with(2, vec![0x01, 0x00])
            .with(3, 42u64)
            .with(7, Message::new().with(1, "memo").with(2, 3u32))
            .with_case("order", 10, Message::new().with(1, "BNB_BUSD"));
        message
            .push(4, 1i32)
            .push(4, -1i32)
            .push(5, "a")
            .push(5, "")
            .insert(6, "fee", 7u64)
            .insert(6, "gas", 0u64);
        message
    }

    fn hex(bytes: &[u8]) -> Vec<u8> {
        bytes.to_vec()
    }

    #[test]
    fn test_canonical_varint_field() {
        let registry = registry();
        let encoded = registry
            .encode("test.Scalar", &Message::new().with(1, 150i32))
            .unwrap();
        assert_eq!(hex(&encoded), vec![0x08, 0x96, 0x01]);
        let decoded = registry.decode("test.Scalar", encoded).unwrap();
        assert_eq!(decoded.get(1), Some(&Value::I32(150)));
    }

    #[test]
    fn test_negative_int32_is_ten_bytes() {
        let registry = registry();
        let encoded = registry
            .encode("test.Scalar", &Message::new().with(1, -1i32))
            .unwrap();
        assert_eq!(encoded.len(), 11);
        let decoded = registry.decode("test.Scalar", encoded).unwrap();
        assert_eq!(decoded.get(1), Some(&Value::I32(-1)));
    }

    #[test]
    fn test_schema_order() {
        let registry = registry();
        let message = Message::new().with(2, vec![0x01]).with(1, "a");
        let encoded = registry.encode("test.Input", &message).unwrap();
        assert_eq!(hex(&encoded), vec![0x0a, 0x01, 0x61, 0x12, 0x01, 0x01]);
    }

    #[test]
    fn test_defaults_omitted() {
        let registry = registry();
        let message = Message::new()
            .with(1, "")
            .with(3, 0u64)
            .with(2, Vec::<u8>::new());
        assert!(registry.encode("test.Input", &message).unwrap().is_empty());

        // Embedded messages are written even when empty
        let message = Message::new().with(7, Message::new());
        assert_eq!(
            hex(&registry.encode("test.Input", &message).unwrap()),
            vec![0x3a, 0x00]
        );
    }

    #[test]
    fn test_required_presence() {
        let registry = registry();
        let encoded = registry
            .encode("test.Req", &Message::new().with(1, 0u32))
            .unwrap();
        assert_eq!(hex(&encoded), vec![0x08, 0x00]);
        assert!(matches!(
            registry.decode("test.Req", Bytes::new()),
            Err(Error::MissingRequired(name)) if name == "test.Req.id"
        ));
        assert!(registry
            .verify("test.Req", &Message::new())
            .unwrap()
            .contains("test.Req.id"));
    }

    #[test]
    fn test_empty_message() {
        let registry = registry();
        let encoded = registry.encode("test.Empty", &Message::new()).unwrap();
        assert!(encoded.is_empty());
        assert!(registry.decode("test.Empty", encoded).unwrap().is_empty());
    }

    #[test]
    fn test_packed_encoding() {
        let registry = registry();
        let mut message = Message::new();
        message.push(4, 1i32).push(4, -1i32);
        let encoded = registry.encode("test.Input", &message).unwrap();
        let mut expected = vec![0x22, 0x0b, 0x01];
        expected.extend([0xff; 9]);
        expected.push(0x01);
        assert_eq!(hex(&encoded), expected);
    }

    #[test]
    fn test_packed_and_unpacked_accepted() {
        let registry = registry();
        let bytes = Bytes::from_static(&[0x20, 0x01, 0x22, 0x02, 0x02, 0x03, 0x20, 0x04]);
        let decoded = registry.decode("test.Input", bytes).unwrap();
        assert_eq!(
            decoded.repeated(4),
            &[Value::I32(1), Value::I32(2), Value::I32(3), Value::I32(4)]
        );
    }

    #[test]
    fn test_map_entries() {
        let registry = registry();
        let mut message = Message::new();
        message.insert(6, "a", 1u64);
        let encoded = registry.encode("test.Input", &message).unwrap();
        assert_eq!(
            hex(&encoded),
            vec![0x32, 0x05, 0x0a, 0x01, 0x61, 0x10, 0x01]
        );

        // Duplicate keys keep the last value; missing values take the default
        let bytes = Bytes::from_static(&[
            0x32, 0x05, 0x0a, 0x01, 0x61, 0x10, 0x01, // a = 1
            0x32, 0x03, 0x0a, 0x01, 0x62, // b
            0x32, 0x05, 0x0a, 0x01, 0x61, 0x10, 0x02, // a = 2
        ]);
        let decoded = registry.decode("test.Input", bytes).unwrap();
        assert_eq!(
            decoded.entries(6),
            &[
                (Value::from("a"), Value::U64(2)),
                (Value::from("b"), Value::U64(0)),
            ]
        );
    }

    #[test]
    fn test_map_many_keys() {
        let registry = registry();
        let mut message = Message::new();
        for i in 0..50_000u64 {
            message.append_entry(6, Value::from(format!("key{i}")), Value::U64(i));
        }
        let encoded = registry.encode("test.Input", &message).unwrap();
        let decoded = registry.decode("test.Input", encoded).unwrap();
        assert_eq!(decoded.entries(6).len(), 50_000);
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_map_keys_merge_across_occurrences() {
        let registry = registry();
        let bytes = Bytes::from_static(&[
            0x0a, 0x07, 0x32, 0x05, 0x0a, 0x01, 0x61, 0x10, 0x01, // input { tags { a: 1 } }
            0x0a, 0x07, 0x32, 0x05, 0x0a, 0x01, 0x62, 0x10, 0x03, // input { tags { b: 3 } }
            0x0a, 0x07, 0x32, 0x05, 0x0a, 0x01, 0x61, 0x10, 0x02, // input { tags { a: 2 } }
        ]);
        let decoded = registry.decode("test.Wrap", bytes).unwrap();
        let input = decoded.get(1).and_then(Value::as_message).unwrap();
        assert_eq!(
            input.entries(6),
            &[
                (Value::from("a"), Value::U64(2)),
                (Value::from("b"), Value::U64(3)),
            ]
        );
        assert_eq!(registry.verify("test.Wrap", &decoded), None);
    }

    #[test]
    fn test_round_trip_and_idempotence() {
        let registry = registry();
        let message = sample();
        assert_eq!(registry.verify("test.Input", &message), None);

        let encoded = registry.encode("test.Input", &message).unwrap();
        assert_eq!(
            encoded.len(),
            encoded_len(&registry, registry.resolve("test.Input").unwrap(), &message).unwrap()
        );
        let decoded = registry.decode("test.Input", encoded.clone()).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(registry.encode("test.Input", &decoded).unwrap(), encoded);
    }

    #[test]
    fn test_repeated_embedded_message_merges() {
        let registry = registry();
        let bytes = Bytes::from_static(&[
            0x3a, 0x03, 0x0a, 0x01, 0x61, // memo { text: "a" }
            0x3a, 0x02, 0x10, 0x05, // memo { count: 5 }
            0x08, 0x01, // to_address would be a string; see below
        ]);
        assert!(matches!(
            registry.decode("test.Input", bytes.clone()),
            Err(Error::WireTypeMismatch {
                field: 1,
                expected: WireType::LengthDelimited,
                found: WireType::Varint
            })
        ));
        let decoded = registry.decode("test.Input", bytes.slice(..9)).unwrap();
        assert_eq!(
            decoded.get(7),
            Some(&Value::Message(Message::new().with(1, "a").with(2, 5u32)))
        );
    }

    #[test]
    fn test_oneof_last_wins() {
        let registry = registry();
        let decoded = registry
            .decode(
                "test.Input",
                Bytes::from_static(&[0x52, 0x00, 0x5a, 0x01, 0x78]),
            )
            .unwrap();
        let case = decoded.which("order").unwrap();
        assert_eq!(case.number, 11);
        assert_eq!(case.value, Value::from("x"));

        let decoded = registry
            .decode(
                "test.Input",
                Bytes::from_static(&[0x5a, 0x01, 0x78, 0x52, 0x00]),
            )
            .unwrap();
        let case = decoded.which("order").unwrap();
        assert_eq!(case.number, 10);
        assert_eq!(case.value, Value::Message(Message::new()));
    }

    #[test_traced]
    fn test_unknown_fields_preserved() {
        let registry = registry();
        let bytes = Bytes::from_static(&[0x08, 0x96, 0x01, 0x15, 1, 2, 3, 4]);
        let decoded = registry.decode("test.Empty", bytes.clone()).unwrap();
        assert_eq!(
            decoded.unknown_fields()[0].payload,
            Payload::Varint(150)
        );
        assert_eq!(
            decoded.unknown_fields()[1].payload,
            Payload::Fixed32(0x04030201)
        );
        assert_eq!(registry.encode("test.Empty", &decoded).unwrap(), bytes);
    }

    #[test_traced]
    fn test_unknown_fields_discarded() {
        let registry = registry();
        let config = Config {
            unknown_fields: UnknownFields::Discard,
            ..Config::default()
        };
        let decoded = registry
            .decode_cfg("test.Empty", Bytes::from_static(&[0x08, 0x96, 0x01]), &config)
            .unwrap();
        assert!(decoded.is_empty());
    }

    #[test_traced("WARN")]
    fn test_unknown_fields_rejected() {
        let registry = registry();
        let result = registry.decode_cfg(
            "test.Empty",
            Bytes::from_static(&[0x08, 0x96, 0x01]),
            &Config::strict(),
        );
        assert!(matches!(
            result,
            Err(Error::UnknownField(name, 1)) if name == "test.Empty"
        ));
    }

    fn nested(levels: usize) -> Message {
        let mut message = Message::new();
        for _ in 0..levels {
            message = Message::new().with(1, message);
        }
        message
    }

    #[test]
    fn test_depth_limit() {
        let registry = registry();
        let config = Config {
            max_depth: 2,
            ..Config::default()
        };
        let ok = registry.encode("test.Node", &nested(2)).unwrap();
        assert_eq!(registry.decode_cfg("test.Node", ok, &config).unwrap(), nested(2));

        let deep = registry.encode("test.Node", &nested(3)).unwrap();
        assert!(matches!(
            registry.decode_cfg("test.Node", deep, &config),
            Err(Error::DepthExceeded(2))
        ));
    }

    #[test]
    fn test_length_limit() {
        let registry = registry();
        let config = Config {
            max_len: 2,
            ..Config::default()
        };
        assert!(matches!(
            registry.decode_cfg("test.Scalar", Bytes::from_static(&[0x08, 0x96, 0x01]), &config),
            Err(Error::LengthExceeded(3, 2))
        ));
    }

    #[test]
    fn test_truncated_field() {
        let registry = registry();
        for bytes in [&[0x08, 0x96][..], &[0x0a, 0x05, 0x61][..], &[0x15, 0x01][..]] {
            assert!(matches!(
                registry.decode("test.Empty", Bytes::copy_from_slice(bytes)),
                Err(Error::Truncated)
            ));
        }
    }

    #[test]
    fn test_delimited_truncation() {
        let registry = registry();
        let encoded = registry.encode_delimited("test.Input", &sample()).unwrap();
        assert_eq!(
            registry.decode_delimited("test.Input", encoded.clone()).unwrap(),
            sample()
        );
        for len in 0..encoded.len() {
            assert!(
                matches!(
                    registry.decode_delimited("test.Input", encoded.slice(..len)),
                    Err(Error::Truncated)
                ),
                "prefix of {len} bytes"
            );
        }
    }

    #[test]
    fn test_delimited_extra_data() {
        let registry = registry();
        let mut bytes = registry
            .encode_delimited("test.Scalar", &Message::new().with(1, 1i32))
            .unwrap()
            .to_vec();
        bytes.push(0x00);
        assert!(matches!(
            registry.decode_delimited("test.Scalar", Bytes::from(bytes)),
            Err(Error::ExtraData(1))
        ));
    }

    #[test]
    fn test_delimited_stream() {
        let registry = registry();
        let schema = registry.resolve("test.Scalar").unwrap();
        let mut stream = Vec::new();
        for value in [1i32, 300, -5] {
            let message = Message::new().with(1, value);
            stream.extend_from_slice(&encode_delimited(&registry, schema, &message).unwrap());
        }
        let mut reader = Reader::new(Bytes::from(stream));
        let mut values = Vec::new();
        while !reader.is_empty() {
            let message = read_delimited(&registry, schema, &mut reader, &Config::default()).unwrap();
            values.push(message.get(1).cloned());
        }
        assert_eq!(
            values,
            vec![
                Some(Value::I32(1)),
                Some(Value::I32(300)),
                Some(Value::I32(-5))
            ]
        );
    }

    #[test]
    fn test_verify_oneof_violation() {
        let registry = registry();
        let message = Message::new()
            .with(10, Message::new())
            .with(11, "x");
        let reason = registry.verify("test.Input", &message).unwrap();
        assert!(reason.contains("order"), "{reason}");

        let message = Message::new()
            .with_case("order", 10, Message::new())
            .with(11, "x");
        assert!(matches!(
            check(&registry, registry.resolve("test.Input").unwrap(), &message),
            Err(Error::OneofViolation(_, group)) if group == "order"
        ));
    }

    #[test]
    fn test_verify_nested() {
        let registry = registry();
        let message = Message::new().with(7, Message::new().with(2, "not a number"));
        let reason = registry.verify("test.Input", &message).unwrap();
        assert!(reason.contains("test.Memo.count"), "{reason}");
    }

    #[test]
    fn test_verify_duplicate_map_key() {
        let registry = registry();
        let mut message = Message::new();
        message
            .append_entry(6, Value::from("a"), Value::U64(1))
            .append_entry(6, Value::from("a"), Value::U64(2));
        assert!(matches!(
            check(&registry, registry.resolve("test.Input").unwrap(), &message),
            Err(Error::DuplicateMapKey(field)) if field == "test.Input.tags"
        ));
    }

    #[test]
    fn test_unknown_number_and_wrong_kind() {
        let registry = registry();
        assert!(registry
            .verify("test.Input", &Message::new().with(99, 1u32))
            .is_some());
        assert!(registry
            .encode("test.Input", &Message::new().with(99, 1u32))
            .is_err());

        let message = Message::new().with(3, "x");
        assert!(registry.verify("test.Input", &message).is_some());
        assert!(matches!(
            registry.encode("test.Input", &message),
            Err(Error::InvalidValue(context, _)) if context == "test.Input.nonce"
        ));
        assert!(matches!(
            registry.encode("test.Input", &Message::new().with(5, "x")),
            Err(Error::InvalidValue(context, _)) if context == "test.Input.names"
        ));

        for number in [0, MAX_FIELD_NUMBER + 1] {
            let mut message = Message::new();
            message.push_unknown(number, Payload::Varint(1));
            assert!(registry.verify("test.Input", &message).is_some());
            assert!(matches!(
                registry.encode("test.Input", &message),
                Err(Error::InvalidValue(context, _)) if context == "test.Input"
            ));
        }
    }
}
