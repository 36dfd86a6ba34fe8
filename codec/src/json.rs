//! Conversion between [Message]s and untyped JSON values.
//!
//! Field names are rendered in lowerCamelCase and accepted in either lowerCamelCase or their
//! declared form. Bytes are base64 strings, maps are objects keyed by the stringified key and
//! `null` stands for an absent field. Unknown fields are not rendered.

use crate::{
    field,
    schema::{Scalar, Schema, Type},
    value::{FieldValue, Message, Value},
    Error, Resolver,
};
use serde_json::{Map, Number, Value as Json};

/// Rendering of 64-bit integers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Longs {
    /// JSON numbers (values beyond 2^53 lose precision in most JSON consumers).
    #[default]
    Number,
    /// Decimal strings.
    String,
}

/// Rendering of enum values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Enums {
    #[default]
    Number,
    /// The declared value name, or the number when it has none.
    Name,
}

/// Options for [to_untyped].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Options {
    pub longs: Longs,
    pub enums: Enums,

    /// Render absent singular fields as their zero value and absent collections as empty.
    pub defaults: bool,

    /// Add a `"<group>": "<member>"` entry naming the selected member of every oneof.
    pub oneofs: bool,
}

impl Options {
    /// Canonical JSON: longs as strings, enums by name.
    pub fn json() -> Self {
        Self {
            longs: Longs::String,
            enums: Enums::Name,
            ..Self::default()
        }
    }
}

fn invalid(context: &str, reason: impl Into<String>) -> Error {
    Error::InvalidValue(context.to_string(), reason.into())
}

fn render_float(value: f64) -> Json {
    if value.is_nan() {
        Json::String("NaN".into())
    } else if value.is_infinite() {
        Json::String(if value > 0.0 { "Infinity" } else { "-Infinity" }.into())
    } else {
        // Finite values always convert
        Number::from_f64(value).map_or(Json::Null, Json::Number)
    }
}

// Widens through the shortest decimal form, so 1.1f32 renders as 1.1.
fn widen(value: f32) -> f64 {
    if !value.is_finite() {
        return value as f64;
    }
    value.to_string().parse().unwrap_or(value as f64)
}

fn render_long<T: ToString + Into<Number>>(value: T, options: &Options) -> Json {
    match options.longs {
        Longs::Number => Json::Number(value.into()),
        Longs::String => Json::String(value.to_string()),
    }
}

fn render_value<R: Resolver + ?Sized>(
    resolver: &R,
    ty: &Type,
    value: &Value,
    options: &Options,
) -> Result<Json, Error> {
    let json = match (ty, value) {
        (Type::Scalar(scalar), value) if !field::is_compatible(*scalar, value) => {
            return Err(invalid(scalar.name(), format!("found {}", value.kind())));
        }
        (Type::Scalar(_), Value::Bool(v)) => Json::Bool(*v),
        (Type::Scalar(_), Value::I32(v)) => Json::Number((*v).into()),
        (Type::Scalar(_), Value::U32(v)) => Json::Number((*v).into()),
        (Type::Scalar(_), Value::I64(v)) => render_long(*v, options),
        (Type::Scalar(_), Value::U64(v)) => render_long(*v, options),
        (Type::Scalar(_), Value::F32(v)) => render_float(widen(*v)),
        (Type::Scalar(_), Value::F64(v)) => render_float(*v),
        (Type::Scalar(_), Value::String(v)) => Json::String(v.clone()),
        (Type::Scalar(_), Value::Bytes(v)) => Json::String(base64::encode(v)),
        (Type::Enum(name), Value::Enum(number)) => match options.enums {
            Enums::Number => Json::Number((*number).into()),
            Enums::Name => match resolver.resolve_enum(name)?.name_of(*number) {
                Some(label) => Json::String(label.to_string()),
                None => Json::Number((*number).into()),
            },
        },
        (Type::Message(name), Value::Message(message)) => {
            to_untyped(resolver, resolver.resolve(name)?, message, options)?
        }
        (Type::Enum(name) | Type::Message(name), value) => {
            return Err(invalid(name, format!("found {}", value.kind())));
        }
        (Type::Scalar(scalar), value) => {
            return Err(invalid(scalar.name(), format!("found {}", value.kind())));
        }
        (Type::Map(_, _), _) => return Err(invalid("map", "nested maps are not supported")),
    };
    Ok(json)
}

fn render_key(key: &Value) -> Result<String, Error> {
    Ok(match key {
        Value::Bool(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::U32(v) => v.to_string(),
        Value::U64(v) => v.to_string(),
        Value::String(v) => v.clone(),
        other => return Err(invalid("map key", format!("found {}", other.kind()))),
    })
}

fn zero_value(ty: &Type, options: &Options) -> Json {
    match ty {
        Type::Scalar(Scalar::Int64 | Scalar::Sint64 | Scalar::Sfixed64)
        | Type::Scalar(Scalar::Uint64 | Scalar::Fixed64) => render_long(0u64, options),
        Type::Scalar(scalar) => match field::default_value(*scalar) {
            Value::Bool(v) => Json::Bool(v),
            Value::String(_) | Value::Bytes(_) => Json::String(String::new()),
            Value::F32(_) | Value::F64(_) => render_float(0.0),
            _ => Json::Number(0u64.into()),
        },
        Type::Enum(_) => Json::Number(0u64.into()),
        Type::Message(_) | Type::Map(_, _) => Json::Null,
    }
}

/// Renders `message` as a JSON object.
pub fn to_untyped<R: Resolver + ?Sized>(
    resolver: &R,
    schema: &Schema,
    message: &Message,
    options: &Options,
) -> Result<Json, Error> {
    let mut object = Map::new();
    for field in schema.fields() {
        let key = field.json_name().to_string();
        let ty = field.ty();
        let present = match field.oneof() {
            Some(index) => message
                .which(&schema.oneofs()[index])
                .filter(|case| case.number == field.number())
                .map(|case| FieldValue::Single(case.value.clone()))
                .or_else(|| message.field(field.number()).cloned()),
            None => message.field(field.number()).cloned(),
        };
        let rendered = match (present, ty) {
            (Some(FieldValue::Single(value)), ty) if !field.is_repeated() && !field.is_map() => {
                render_value(resolver, ty, &value, options)?
            }
            (Some(FieldValue::Repeated(values)), ty) if field.is_repeated() => Json::Array(
                values
                    .iter()
                    .map(|value| render_value(resolver, ty, value, options))
                    .collect::<Result<_, _>>()?,
            ),
            (Some(FieldValue::Map(entries)), Type::Map(_, value_type)) => {
                let mut map = Map::new();
                for (k, v) in &entries {
                    map.insert(render_key(k)?, render_value(resolver, value_type, v, options)?);
                }
                Json::Object(map)
            }
            (Some(_), _) => {
                return Err(invalid(
                    &format!("{}.{}", schema.name(), field.name()),
                    "value does not match field shape",
                ))
            }
            (None, _) if !options.defaults => continue,
            (None, _) if field.is_map() => Json::Object(Map::new()),
            (None, _) if field.is_repeated() => Json::Array(Vec::new()),
            (None, _) if field.has_presence() => continue,
            (None, ty) => zero_value(ty, options),
        };
        object.insert(key, rendered);
    }
    if options.oneofs {
        for (index, group) in schema.oneofs().iter().enumerate() {
            let selected = schema.oneof_members(index).find(|member| {
                message.which(group).map(|case| case.number) == Some(member.number())
                    || message.field(member.number()).is_some()
            });
            if let Some(member) = selected {
                object.insert(group.clone(), Json::String(member.json_name().to_string()));
            }
        }
    }
    Ok(Json::Object(object))
}

fn parse_int(json: &Json, context: &str) -> Result<i128, Error> {
    match json {
        Json::Number(number) => {
            if let Some(v) = number.as_i64() {
                Ok(v as i128)
            } else if let Some(v) = number.as_u64() {
                Ok(v as i128)
            } else {
                match number.as_f64() {
                    Some(v) if v.fract() == 0.0 && v.abs() < 1e38 => Ok(v as i128),
                    _ => Err(invalid(context, format!("{number} is not an integer"))),
                }
            }
        }
        Json::String(text) => text
            .trim()
            .parse::<i128>()
            .map_err(|_| invalid(context, format!("{text:?} is not an integer"))),
        other => Err(invalid(context, format!("expected integer, found {other}"))),
    }
}

fn parse_ranged<T: TryFrom<i128>>(json: &Json, context: &str) -> Result<T, Error> {
    let value = parse_int(json, context)?;
    T::try_from(value).map_err(|_| invalid(context, format!("{value} is out of range")))
}

fn parse_float(json: &Json, context: &str) -> Result<f64, Error> {
    match json {
        Json::Number(number) => number
            .as_f64()
            .ok_or_else(|| invalid(context, format!("{number} is not a number"))),
        Json::String(text) => match text.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            text => text
                .trim()
                .parse::<f64>()
                .map_err(|_| invalid(context, format!("{text:?} is not a number"))),
        },
        other => Err(invalid(context, format!("expected number, found {other}"))),
    }
}

/// Decodes standard or URL-safe base64, with or without padding.
fn parse_bytes(text: &str, context: &str) -> Result<Vec<u8>, Error> {
    let normalized: String = text
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();
    base64::decode_config(normalized, base64::STANDARD_NO_PAD)
        .map_err(|err| invalid(context, format!("invalid base64: {err}")))
}

fn parse_scalar(scalar: Scalar, json: &Json, context: &str) -> Result<Value, Error> {
    let value = match scalar {
        Scalar::Bool => match json {
            Json::Bool(v) => Value::Bool(*v),
            other => return Err(invalid(context, format!("expected bool, found {other}"))),
        },
        Scalar::Int32 | Scalar::Sint32 | Scalar::Sfixed32 => Value::I32(parse_ranged(json, context)?),
        Scalar::Int64 | Scalar::Sint64 | Scalar::Sfixed64 => Value::I64(parse_ranged(json, context)?),
        Scalar::Uint32 | Scalar::Fixed32 => Value::U32(parse_ranged(json, context)?),
        Scalar::Uint64 | Scalar::Fixed64 => Value::U64(parse_ranged(json, context)?),
        Scalar::Float => Value::F32(parse_float(json, context)? as f32),
        Scalar::Double => Value::F64(parse_float(json, context)?),
        Scalar::String => match json {
            Json::String(v) => Value::String(v.clone()),
            other => return Err(invalid(context, format!("expected string, found {other}"))),
        },
        Scalar::Bytes => match json {
            Json::String(v) => Value::Bytes(parse_bytes(v, context)?.into()),
            other => return Err(invalid(context, format!("expected base64, found {other}"))),
        },
    };
    Ok(value)
}

fn parse_value<R: Resolver + ?Sized>(
    resolver: &R,
    ty: &Type,
    json: &Json,
    context: &str,
) -> Result<Value, Error> {
    match ty {
        Type::Scalar(scalar) => parse_scalar(*scalar, json, context),
        Type::Enum(name) => match json {
            Json::String(label) => resolver
                .resolve_enum(name)?
                .number_of(label)
                .map(Value::Enum)
                .ok_or_else(|| invalid(context, format!("unknown {name} value {label}"))),
            json => Ok(Value::Enum(parse_ranged(json, context)?)),
        },
        Type::Message(name) => from_untyped(resolver, resolver.resolve(name)?, json).map(Value::Message),
        Type::Map(_, _) => Err(invalid(context, "nested maps are not supported")),
    }
}

fn parse_key(scalar: Scalar, key: &str, context: &str) -> Result<Value, Error> {
    match scalar {
        Scalar::Bool => match key {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid(context, format!("{key:?} is not a bool key"))),
        },
        Scalar::String => Ok(Value::String(key.to_string())),
        scalar => parse_scalar(scalar, &Json::String(key.to_string()), context),
    }
}

/// Builds a message from a JSON object.
///
/// Keys that name no field (including the discriminators [to_untyped] adds) are ignored.
pub fn from_untyped<R: Resolver + ?Sized>(
    resolver: &R,
    schema: &Schema,
    json: &Json,
) -> Result<Message, Error> {
    let Json::Object(object) = json else {
        return Err(invalid(schema.name(), format!("expected object, found {json}")));
    };
    let mut message = Message::new();
    for (key, value) in object {
        let Some(field) = schema.field_by_name(key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let context = format!("{}.{}", schema.name(), field.name());
        let number = field.number();
        match field.ty() {
            Type::Map(key_type, value_type) => {
                let Json::Object(entries) = value else {
                    return Err(invalid(&context, format!("expected object, found {value}")));
                };
                for (k, v) in entries {
                    let k = parse_key(*key_type, k, &context)?;
                    let v = parse_value(resolver, value_type, v, &context)?;
                    message.insert(number, k, v);
                }
            }
            ty if field.is_repeated() => {
                let Json::Array(elements) = value else {
                    return Err(invalid(&context, format!("expected array, found {value}")));
                };
                for element in elements {
                    message.push(number, parse_value(resolver, ty, element, &context)?);
                }
            }
            ty => {
                let parsed = parse_value(resolver, ty, value, &context)?;
                match field.oneof() {
                    Some(index) => {
                        let group = &schema.oneofs()[index];
                        if message.which(group).is_some() {
                            return Err(Error::OneofViolation(
                                schema.name().to_string(),
                                group.clone(),
                            ));
                        }
                        message.select(group.clone(), number, parsed);
                    }
                    None => {
                        message.set(number, parsed);
                    }
                }
            }
        }
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        schema::{EnumSchema, Field},
        Registry,
    };
    use serde_json::json;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                Schema::new("test.Order")
                    .field(Field::scalar(1, "to_address", Scalar::String))
                    .field(Field::scalar(2, "amount", Scalar::Bytes))
                    .field(Field::scalar(3, "nonce", Scalar::Uint64))
                    .field(Field::scalar(4, "ratio", Scalar::Double))
                    .field(Field::enumeration(5, "mode", "test.Mode"))
                    .field(Field::scalar(6, "ids", Scalar::Sint32).repeated().packed())
                    .field(Field::map(7, "tags", Scalar::Uint32, Type::Scalar(Scalar::String)))
                    .field(Field::message(8, "memo", "test.Memo").optional())
                    .oneof(
                        "kind",
                        [
                            Field::scalar(10, "trade", Scalar::String),
                            Field::message(11, "send", "test.Memo"),
                        ],
                    ),
            )
            .unwrap();
        registry
            .register(Schema::new("test.Memo").field(Field::scalar(1, "text", Scalar::String)))
            .unwrap();
        registry
            .register_enum(EnumSchema::new("test.Mode").value("LEGACY", 0).value("ENVELOPE", 1))
            .unwrap();
        registry
    }

    fn sample() -> Message {
        let mut message = Message::new()
            .with(1, "bnb1xyz")
            .with(2, vec![0xfbu8, 0xff])
            .with(3, u64::MAX)
            .with(4, f64::NAN)
            .with(5, Value::Enum(1))
            .with_case("kind", 10, "limit");
        message
            .push(6, -1i32)
            .push(6, 2i32)
            .insert(7, 1u32, "a")
            .set(8, Message::new().with(1, "hi"));
        message
    }

    #[test]
    fn test_render_default_options() {
        let registry = registry();
        let json = registry
            .to_untyped("test.Order", &sample(), &Options::default())
            .unwrap();
        assert_eq!(
            json,
            json!({
                "toAddress": "bnb1xyz",
                "amount": "+/8=",
                "nonce": u64::MAX,
                "ratio": "NaN",
                "mode": 1,
                "ids": [-1, 2],
                "tags": {"1": "a"},
                "memo": {"text": "hi"},
                "trade": "limit",
            })
        );
    }

    #[test]
    fn test_render_json_options() {
        let registry = registry();
        let options = Options {
            oneofs: true,
            ..Options::json()
        };
        let json = registry.to_untyped("test.Order", &sample(), &options).unwrap();
        assert_eq!(json["nonce"], json!("18446744073709551615"));
        assert_eq!(json["mode"], json!("ENVELOPE"));
        assert_eq!(json["kind"], json!("trade"));
    }

    #[test]
    fn test_render_defaults() {
        let registry = registry();
        let options = Options {
            defaults: true,
            ..Options::default()
        };
        let json = registry
            .to_untyped("test.Order", &Message::new(), &options)
            .unwrap();
        assert_eq!(
            json,
            json!({
                "toAddress": "",
                "amount": "",
                "nonce": 0,
                "ratio": 0.0,
                "mode": 0,
                "ids": [],
                "tags": {},
            })
        );
    }

    #[test]
    fn test_round_trip() {
        let registry = registry();
        let mut message = sample();
        message.set(4, 0.5f64);
        for options in [Options::default(), Options::json()] {
            let json = registry.to_untyped("test.Order", &message, &options).unwrap();
            let parsed = registry.from_untyped("test.Order", &json).unwrap();
            assert_eq!(parsed, message);
        }
    }

    #[test]
    fn test_parse_lenient_inputs() {
        let registry = registry();
        let parsed = registry
            .from_untyped(
                "test.Order",
                &json!({
                    "to_address": "x",
                    "amount": "-_8",
                    "nonce": "42",
                    "ratio": "-Infinity",
                    "mode": "ENVELOPE",
                    "memo": null,
                    "unrelated": true,
                }),
            )
            .unwrap();
        assert_eq!(parsed.get(1), Some(&Value::from("x")));
        assert_eq!(parsed.get(2), Some(&Value::from(vec![0xfbu8, 0xff])));
        assert_eq!(parsed.get(3), Some(&Value::U64(42)));
        assert_eq!(parsed.get(4), Some(&Value::F64(f64::NEG_INFINITY)));
        assert_eq!(parsed.get(5), Some(&Value::Enum(1)));
        assert_eq!(parsed.get(8), None);
    }

    #[test]
    fn test_parse_oneof_violation() {
        let registry = registry();
        let err = registry
            .from_untyped("test.Order", &json!({"trade": "x", "send": {}}))
            .unwrap_err();
        assert!(matches!(err, Error::OneofViolation(_, group) if group == "kind"));
    }

    #[test]
    fn test_render_float_shortest() {
        let mut registry = Registry::new();
        registry
            .register(
                Schema::new("test.Gauge")
                    .field(Field::scalar(1, "level", Scalar::Float))
                    .field(Field::scalar(2, "limit", Scalar::Float)),
            )
            .unwrap();
        let message = Message::new().with(1, 1.1f32).with(2, f32::NEG_INFINITY);
        let json = registry
            .to_untyped("test.Gauge", &message, &Options::default())
            .unwrap();
        assert_eq!(json, json!({"level": 1.1, "limit": "-Infinity"}));
        assert_eq!(registry.from_untyped("test.Gauge", &json).unwrap(), message);
    }

    #[test]
    fn test_parse_type_errors() {
        let registry = registry();
        for input in [
            json!({"nonce": -1}),
            json!({"nonce": "abc"}),
            json!({"toAddress": 5}),
            json!({"ids": 5}),
            json!({"tags": {"x": "a"}}),
            json!({"mode": "UNKNOWN"}),
            json!({"amount": "not base64!"}),
            json!([1, 2]),
        ] {
            assert!(
                matches!(
                    registry.from_untyped("test.Order", &input),
                    Err(Error::InvalidValue(_, _))
                ),
                "{input}"
            );
        }
    }
}
