//! Declarative descriptions of message and enum types.
//!
//! A [Schema] lists the fields of one message type in declaration order. Each [Field] carries
//! its number, [Type], [Label] and (for members of an exclusive group) the index of its oneof.
//! References to other messages and enums are made by fully-qualified name and resolved lazily
//! through a [crate::Resolver], so schemas may refer to themselves or to each other.
//!
//! # Example
//!
//! ```
//! use wireform_codec::{Field, Scalar, Schema};
//!
//! let schema = Schema::new("binance.SigningInput")
//!     .field(Field::scalar(1, "to_address", Scalar::String))
//!     .field(Field::scalar(2, "amount", Scalar::Bytes))
//!     .oneof(
//!         "order",
//!         [
//!             Field::message(10, "trade_order", "binance.TradeOrder"),
//!             Field::message(11, "send_order", "binance.SendOrder"),
//!         ],
//!     );
//! assert_eq!(schema.fields().len(), 4);
//! assert_eq!(schema.field_by_number(10).unwrap().json_name(), "tradeOrder");
//! ```

use crate::{
    wire::{WireType, MAX_FIELD_NUMBER},
    Error,
};
use std::collections::{HashMap, HashSet};

/// Scalar kinds of the wire format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scalar {
    Bool,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Float,
    Double,
    String,
    Bytes,
}

impl Scalar {
    pub fn wire_type(self) -> WireType {
        match self {
            Self::Bool
            | Self::Int32
            | Self::Int64
            | Self::Uint32
            | Self::Uint64
            | Self::Sint32
            | Self::Sint64 => WireType::Varint,
            Self::Fixed32 | Self::Sfixed32 | Self::Float => WireType::Fixed32,
            Self::Fixed64 | Self::Sfixed64 | Self::Double => WireType::Fixed64,
            Self::String | Self::Bytes => WireType::LengthDelimited,
        }
    }

    /// Returns true for kinds that may use packed repeated encoding.
    pub fn is_packable(self) -> bool {
        !matches!(self, Self::String | Self::Bytes)
    }

    /// Returns true for kinds allowed as map keys.
    pub fn is_map_key(self) -> bool {
        !matches!(self, Self::Float | Self::Double | Self::Bytes)
    }

    /// Returns true for 64-bit integer kinds.
    pub fn is_long(self) -> bool {
        matches!(
            self,
            Self::Int64 | Self::Uint64 | Self::Sint64 | Self::Fixed64 | Self::Sfixed64
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Sint32 => "sint32",
            Self::Sint64 => "sint64",
            Self::Fixed32 => "fixed32",
            Self::Fixed64 => "fixed64",
            Self::Sfixed32 => "sfixed32",
            Self::Sfixed64 => "sfixed64",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }
}

/// The type of a field.
#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Scalar(Scalar),
    /// An embedded message, by fully-qualified name.
    Message(String),
    /// An enum, by fully-qualified name. Encoded as an `int32`.
    Enum(String),
    /// A map, encoded as repeated `{1: key, 2: value}` entries.
    Map(Scalar, Box<Type>),
}

impl Type {
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Scalar(scalar) => scalar.wire_type(),
            Self::Enum(_) => WireType::Varint,
            Self::Message(_) | Self::Map(_, _) => WireType::LengthDelimited,
        }
    }

    pub fn is_packable(&self) -> bool {
        match self {
            Self::Scalar(scalar) => scalar.is_packable(),
            Self::Enum(_) => true,
            Self::Message(_) | Self::Map(_, _) => false,
        }
    }
}

/// The cardinality and presence discipline of a field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Label {
    /// Implicit presence: a value equal to the type's default is not encoded.
    #[default]
    Singular,
    /// Explicit presence: a set value is always encoded.
    Optional,
    /// Explicit presence that must be satisfied for a message to be valid.
    Required,
    Repeated,
}

/// One field of a [Schema].
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    number: u32,
    name: String,
    json_name: String,
    ty: Type,
    label: Label,
    packed: bool,
    oneof: Option<usize>,
}

impl Field {
    pub fn new(number: u32, name: impl Into<String>, ty: Type) -> Self {
        let name = name.into();
        let label = match ty {
            Type::Map(_, _) => Label::Repeated,
            _ => Label::Singular,
        };
        Self {
            number,
            json_name: json_name(&name),
            name,
            ty,
            label,
            packed: false,
            oneof: None,
        }
    }

    pub fn scalar(number: u32, name: impl Into<String>, scalar: Scalar) -> Self {
        Self::new(number, name, Type::Scalar(scalar))
    }

    pub fn message(number: u32, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(number, name, Type::Message(message.into()))
    }

    pub fn enumeration(number: u32, name: impl Into<String>, enumeration: impl Into<String>) -> Self {
        Self::new(number, name, Type::Enum(enumeration.into()))
    }

    pub fn map(number: u32, name: impl Into<String>, key: Scalar, value: Type) -> Self {
        Self::new(number, name, Type::Map(key, Box::new(value)))
    }

    pub fn optional(mut self) -> Self {
        self.label = Label::Optional;
        self
    }

    pub fn required(mut self) -> Self {
        self.label = Label::Required;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.label = Label::Repeated;
        self
    }

    /// Marks a repeated numeric field for packed encoding.
    pub fn packed(mut self) -> Self {
        self.label = Label::Repeated;
        self.packed = true;
        self
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lowerCamelCase name used by the untyped representation.
    pub fn json_name(&self) -> &str {
        &self.json_name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn is_packed(&self) -> bool {
        self.packed
    }

    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated && !self.is_map()
    }

    pub fn is_map(&self) -> bool {
        matches!(self.ty, Type::Map(_, _))
    }

    /// Index of the oneof group this field belongs to.
    pub fn oneof(&self) -> Option<usize> {
        self.oneof
    }

    /// Returns true if presence is tracked explicitly (the field is encoded even when it
    /// holds its default value).
    pub fn has_presence(&self) -> bool {
        matches!(self.label, Label::Optional | Label::Required)
            || self.oneof.is_some()
            || matches!(self.ty, Type::Message(_))
    }

    pub fn wire_type(&self) -> WireType {
        self.ty.wire_type()
    }
}

/// Converts a declared field name to lowerCamelCase.
pub fn json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut capitalize = false;
    for c in name.chars() {
        if c == '_' {
            capitalize = true;
        } else if capitalize {
            out.push(c.to_ascii_uppercase());
            capitalize = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// The description of one message type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    name: String,
    fields: Vec<Field>,
    oneofs: Vec<String>,
    nested: Vec<Schema>,
    enums: Vec<EnumSchema>,
    by_number: HashMap<u32, usize>,
}

impl Schema {
    /// Creates an empty schema. Top-level schemas use their fully-qualified name; schemas
    /// passed to [Schema::nested] use their local name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.push(field);
        self
    }

    /// Adds an exclusive group: at most one of `fields` may be set at a time.
    pub fn oneof(mut self, group: impl Into<String>, fields: impl IntoIterator<Item = Field>) -> Self {
        let index = self.oneofs.len();
        self.oneofs.push(group.into());
        for mut field in fields {
            field.oneof = Some(index);
            self.push(field);
        }
        self
    }

    /// Declares a message type scoped to this one (registered as `<name>.<local name>`).
    pub fn nested(mut self, schema: Schema) -> Self {
        self.nested.push(schema);
        self
    }

    /// Declares an enum scoped to this message (registered as `<name>.<local name>`).
    pub fn nested_enum(mut self, enumeration: EnumSchema) -> Self {
        self.enums.push(enumeration);
        self
    }

    fn push(&mut self, field: Field) {
        // Duplicates are reported by `validate`; the first declaration stays indexed.
        self.by_number.entry(field.number).or_insert(self.fields.len());
        self.fields.push(field);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Names of the oneof groups, indexed by [Field::oneof].
    pub fn oneofs(&self) -> &[String] {
        &self.oneofs
    }

    pub fn nested_schemas(&self) -> &[Schema] {
        &self.nested
    }

    pub fn nested_enums(&self) -> &[EnumSchema] {
        &self.enums
    }

    pub(crate) fn take_nested(&mut self) -> (Vec<Schema>, Vec<EnumSchema>) {
        (
            std::mem::take(&mut self.nested),
            std::mem::take(&mut self.enums),
        )
    }

    pub fn field_by_number(&self, number: u32) -> Option<&Field> {
        self.by_number.get(&number).map(|&index| &self.fields[index])
    }

    /// Looks up a field by declared name or lowerCamelCase name.
    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| field.name == name || field.json_name == name)
    }

    /// Index of the oneof group named `group`.
    pub fn oneof_index(&self, group: &str) -> Option<usize> {
        self.oneofs.iter().position(|name| name == group)
    }

    /// Members of the oneof group at `index`, in declaration order.
    pub fn oneof_members(&self, index: usize) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .filter(move |field| field.oneof == Some(index))
    }

    /// Checks the structural invariants of this schema and everything nested in it.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |reason: String| Error::InvalidSchema(self.name.clone(), reason);

        let mut numbers = HashSet::new();
        let mut names = HashSet::new();
        for field in &self.fields {
            if field.number == 0 || field.number > MAX_FIELD_NUMBER {
                return Err(invalid(format!(
                    "field {} has invalid number {}",
                    field.name, field.number
                )));
            }
            if !numbers.insert(field.number) {
                return Err(invalid(format!("duplicate field number {}", field.number)));
            }
            if !names.insert(field.name.as_str()) {
                return Err(invalid(format!("duplicate field name {}", field.name)));
            }
            if field.json_name != field.name && !names.insert(field.json_name.as_str()) {
                return Err(invalid(format!("duplicate field name {}", field.json_name)));
            }
            if let Type::Map(key, value) = &field.ty {
                if !key.is_map_key() {
                    return Err(invalid(format!(
                        "map {} has invalid key type {}",
                        field.name,
                        key.name()
                    )));
                }
                if matches!(value.as_ref(), Type::Map(_, _)) {
                    return Err(invalid(format!("map {} has a map value", field.name)));
                }
                if field.label != Label::Repeated {
                    return Err(invalid(format!("map {} must be repeated", field.name)));
                }
            }
            if field.packed && !(field.is_repeated() && field.ty.is_packable()) {
                return Err(invalid(format!("field {} cannot be packed", field.name)));
            }
            if field.oneof.is_some() && field.label != Label::Singular {
                return Err(invalid(format!(
                    "oneof member {} must be singular",
                    field.name
                )));
            }
        }

        let mut groups = HashSet::new();
        for (index, group) in self.oneofs.iter().enumerate() {
            if !groups.insert(group.as_str()) || names.contains(group.as_str()) {
                return Err(invalid(format!("duplicate oneof name {group}")));
            }
            if self.oneof_members(index).next().is_none() {
                return Err(invalid(format!("oneof {group} has no members")));
            }
        }

        let mut locals = HashSet::new();
        for nested in &self.nested {
            if !locals.insert(nested.name.as_str()) {
                return Err(invalid(format!("duplicate nested type {}", nested.name)));
            }
            nested.validate()?;
        }
        for enumeration in &self.enums {
            if !locals.insert(enumeration.name.as_str()) {
                return Err(invalid(format!(
                    "duplicate nested type {}",
                    enumeration.name
                )));
            }
            enumeration.validate()?;
        }
        Ok(())
    }
}

/// The description of one enum type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnumSchema {
    name: String,
    values: Vec<(String, i32)>,
}

impl EnumSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn value(mut self, name: impl Into<String>, number: i32) -> Self {
        self.values.push((name.into(), number));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn values(&self) -> &[(String, i32)] {
        &self.values
    }

    /// The first declared name for `number` (numbers may alias).
    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, n)| *n == number)
            .map(|(name, _)| name.as_str())
    }

    pub fn number_of(&self, name: &str) -> Option<i32> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, number)| *number)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.values.is_empty() {
            return Err(Error::InvalidSchema(
                self.name.clone(),
                "enum has no values".into(),
            ));
        }
        let mut names = HashSet::new();
        for (name, _) in &self.values {
            if !names.insert(name.as_str()) {
                return Err(Error::InvalidSchema(
                    self.name.clone(),
                    format!("duplicate enum value {name}"),
                ));
            }
        }
        Ok(())
    }
}
