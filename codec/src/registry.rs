//! Name-indexed collections of schemas.
//!
//! A [Registry] owns every [Schema] and [EnumSchema] a program knows about, keyed by
//! fully-qualified name. Schemas refer to each other by name only, so a registry may be
//! populated in any order and [Registry::validate] checks that every reference resolves once
//! population is complete.
//!
//! A single registry can be published for the whole process with [install] and read back
//! with [global]. Publication happens once; after it, reads are lock-free.

use crate::{
    json::{self, Options},
    message,
    schema::{EnumSchema, Schema, Type},
    Config, Error, Message,
};
use bytes::{Buf, Bytes};
use std::{
    collections::HashMap,
    sync::OnceLock,
};
use tracing::debug;

/// Looks up message and enum schemas by fully-qualified name.
pub trait Resolver {
    /// Returns the message schema registered as `name`.
    fn resolve(&self, name: &str) -> Result<&Schema, Error>;

    /// Returns the enum schema registered as `name`.
    fn resolve_enum(&self, name: &str) -> Result<&EnumSchema, Error>;
}

/// Message and enum schemas keyed by fully-qualified name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Registry {
    schemas: HashMap<String, Schema>,
    enums: HashMap<String, EnumSchema>,
}

/// Flattens `schema` and everything nested in it into `parent.Local`-named definitions.
fn flatten(mut schema: Schema, schemas: &mut Vec<Schema>, enums: &mut Vec<EnumSchema>) {
    let (nested, nested_enums) = schema.take_nested();
    let prefix = schema.name().to_string();
    for mut enumeration in nested_enums {
        enumeration.set_name(format!("{prefix}.{}", enumeration.name()));
        enums.push(enumeration);
    }
    schemas.push(schema);
    for mut child in nested {
        child.set_name(format!("{prefix}.{}", child.name()));
        flatten(child, schemas, enums);
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered message and enum schemas.
    pub fn len(&self) -> usize {
        self.schemas.len() + self.enums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn conflicts(&self, name: &str) -> Error {
        Error::SchemaConflict(name.to_string())
    }

    /// Registers `schema` and the types nested in it.
    ///
    /// Registering a definition identical to an existing one is a no-op. If any name is
    /// already taken by a different definition, nothing is registered.
    pub fn register(&mut self, schema: Schema) -> Result<&mut Self, Error> {
        schema.validate()?;
        let name = schema.name().to_string();
        let mut schemas = Vec::new();
        let mut enums = Vec::new();
        flatten(schema, &mut schemas, &mut enums);

        for schema in &schemas {
            if self.enums.contains_key(schema.name()) {
                return Err(self.conflicts(schema.name()));
            }
            match self.schemas.get(schema.name()) {
                Some(existing) if existing != schema => return Err(self.conflicts(schema.name())),
                _ => {}
            }
        }
        for enumeration in &enums {
            if self.schemas.contains_key(enumeration.name()) {
                return Err(self.conflicts(enumeration.name()));
            }
            match self.enums.get(enumeration.name()) {
                Some(existing) if existing != enumeration => {
                    return Err(self.conflicts(enumeration.name()))
                }
                _ => {}
            }
        }

        debug!(
            schema = name,
            messages = schemas.len(),
            enums = enums.len(),
            "registered schema"
        );
        for schema in schemas {
            self.schemas.insert(schema.name().to_string(), schema);
        }
        for enumeration in enums {
            self.enums.insert(enumeration.name().to_string(), enumeration);
        }
        Ok(self)
    }

    /// Registers a top-level enum.
    pub fn register_enum(&mut self, enumeration: EnumSchema) -> Result<&mut Self, Error> {
        enumeration.validate()?;
        let name = enumeration.name();
        if self.schemas.contains_key(name) {
            return Err(self.conflicts(name));
        }
        match self.enums.get(name).map(|existing| *existing == enumeration) {
            Some(false) => return Err(self.conflicts(name)),
            Some(true) => return Ok(self),
            None => {}
        }
        debug!(schema = name, "registered enum");
        self.enums.insert(name.to_string(), enumeration);
        Ok(self)
    }

    /// Checks that every message and enum reference of every registered schema resolves.
    pub fn validate(&self) -> Result<(), Error> {
        for schema in self.schemas.values() {
            for field in schema.fields() {
                let target = match field.ty() {
                    Type::Map(_, value) => value.as_ref(),
                    ty => ty,
                };
                let missing = match target {
                    Type::Message(name) => (!self.schemas.contains_key(name)).then_some(name),
                    Type::Enum(name) => (!self.enums.contains_key(name)).then_some(name),
                    _ => None,
                };
                if let Some(name) = missing {
                    return Err(Error::InvalidSchema(
                        schema.name().to_string(),
                        format!("field {} refers to unknown type {name}", field.name()),
                    ));
                }
            }
        }
        debug!(
            messages = self.schemas.len(),
            enums = self.enums.len(),
            "validated registry"
        );
        Ok(())
    }

    /// Registered message names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Encodes `msg` as an instance of the schema registered as `name`.
    pub fn encode(&self, name: &str, msg: &Message) -> Result<Bytes, Error> {
        message::encode(self, self.resolve(name)?, msg)
    }

    /// Decodes an instance of the schema registered as `name` with the default [Config].
    pub fn decode(&self, name: &str, buf: impl Buf) -> Result<Message, Error> {
        self.decode_cfg(name, buf, &Config::default())
    }

    pub fn decode_cfg(&self, name: &str, buf: impl Buf, config: &Config) -> Result<Message, Error> {
        message::decode(self, self.resolve(name)?, buf, config)
    }

    pub fn encode_delimited(&self, name: &str, msg: &Message) -> Result<Bytes, Error> {
        message::encode_delimited(self, self.resolve(name)?, msg)
    }

    pub fn decode_delimited(&self, name: &str, buf: impl Buf) -> Result<Message, Error> {
        message::decode_delimited(self, self.resolve(name)?, buf, &Config::default())
    }

    /// Returns `None` if `msg` is a valid instance of `name`, or the reason it is not.
    pub fn verify(&self, name: &str, msg: &Message) -> Option<String> {
        match self.resolve(name) {
            Ok(schema) => message::verify(self, schema, msg),
            Err(err) => Some(err.to_string()),
        }
    }

    pub fn to_untyped(
        &self,
        name: &str,
        msg: &Message,
        options: &Options,
    ) -> Result<serde_json::Value, Error> {
        json::to_untyped(self, self.resolve(name)?, msg, options)
    }

    pub fn from_untyped(&self, name: &str, value: &serde_json::Value) -> Result<Message, Error> {
        json::from_untyped(self, self.resolve(name)?, value)
    }
}

impl Resolver for Registry {
    fn resolve(&self, name: &str) -> Result<&Schema, Error> {
        self.schemas
            .get(name)
            .ok_or_else(|| Error::UnknownSchema(name.to_string()))
    }

    fn resolve_enum(&self, name: &str) -> Result<&EnumSchema, Error> {
        self.enums
            .get(name)
            .ok_or_else(|| Error::UnknownSchema(name.to_string()))
    }
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Validates `registry` and publishes it as the process-wide registry.
///
/// Only the first call publishes. Later calls succeed if they pass an identical registry and
/// fail with [Error::SchemaConflict] otherwise.
pub fn install(registry: Registry) -> Result<&'static Registry, Error> {
    registry.validate()?;

    let mut pending = Some(registry);
    let installed = GLOBAL.get_or_init(|| {
        let registry = pending.take().unwrap_or_default();
        debug!(schemas = registry.len(), "installed global registry");
        registry
    });
    match pending {
        Some(rejected) if rejected != *installed => {
            Err(Error::SchemaConflict("global registry".into()))
        }
        _ => Ok(installed),
    }
}

/// Returns the process-wide registry, if one was installed.
pub fn global() -> Option<&'static Registry> {
    GLOBAL.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, Scalar};
    use wireform_macros::test_traced;

    fn order() -> Schema {
        Schema::new("binance.SigningInput")
            .field(Field::scalar(1, "to_address", Scalar::String))
            .oneof(
                "order",
                [
                    Field::message(10, "trade_order", "binance.SigningInput.TradeOrder"),
                    Field::message(11, "send_order", "binance.SigningInput.SendOrder"),
                ],
            )
            .nested(Schema::new("TradeOrder").field(Field::scalar(1, "symbol", Scalar::String)))
            .nested(
                Schema::new("SendOrder")
                    .field(Field::enumeration(1, "side", "binance.SigningInput.SendOrder.Side"))
                    .nested_enum(EnumSchema::new("Side").value("BUY", 0).value("SELL", 1)),
            )
    }

    #[test_traced]
    fn test_register_nested() {
        let mut registry = Registry::new();
        registry.register(order()).unwrap();
        registry.validate().unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "binance.SigningInput",
                "binance.SigningInput.SendOrder",
                "binance.SigningInput.TradeOrder",
            ]
        );
        let side = registry
            .resolve_enum("binance.SigningInput.SendOrder.Side")
            .unwrap();
        assert_eq!(side.number_of("SELL"), Some(1));
        assert!(registry
            .resolve("binance.SigningInput")
            .unwrap()
            .nested_schemas()
            .is_empty());
    }

    #[test_traced]
    fn test_register_idempotent() {
        let mut registry = Registry::new();
        registry.register(order()).unwrap();
        let before = registry.clone();
        registry.register(order()).unwrap();
        assert_eq!(registry, before);
    }

    #[test_traced]
    fn test_register_conflict_is_atomic() {
        let mut registry = Registry::new();
        registry
            .register(Schema::new("binance.SigningInput.TradeOrder"))
            .unwrap();
        let before = registry.clone();
        assert!(matches!(
            registry.register(order()),
            Err(Error::SchemaConflict(name)) if name == "binance.SigningInput.TradeOrder"
        ));
        assert_eq!(registry, before);
    }

    #[test]
    fn test_register_invalid() {
        let mut registry = Registry::new();
        let schema = Schema::new("a.B")
            .field(Field::scalar(1, "x", Scalar::Bool))
            .field(Field::scalar(1, "y", Scalar::Bool));
        assert!(matches!(
            registry.register(schema),
            Err(Error::InvalidSchema(_, _))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_enum_and_message_share_names() {
        let mut registry = Registry::new();
        registry.register(Schema::new("a.B")).unwrap();
        assert!(matches!(
            registry.register_enum(EnumSchema::new("a.B").value("X", 0)),
            Err(Error::SchemaConflict(_))
        ));
    }

    #[test_traced]
    fn test_validate_late_registration() {
        let mut registry = Registry::new();
        registry
            .register(Schema::new("a.Outer").field(Field::message(1, "inner", "a.Inner")))
            .unwrap();
        assert!(matches!(
            registry.validate(),
            Err(Error::InvalidSchema(name, _)) if name == "a.Outer"
        ));
        registry.register(Schema::new("a.Inner")).unwrap();
        registry.validate().unwrap();
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = Registry::new();
        assert!(matches!(
            registry.resolve("missing.Type"),
            Err(Error::UnknownSchema(name)) if name == "missing.Type"
        ));
        assert!(registry
            .verify("missing.Type", &Message::new())
            .unwrap()
            .contains("missing.Type"));
    }

    #[test_traced]
    fn test_install_once() {
        let mut registry = Registry::new();
        registry.register(order()).unwrap();
        let installed = install(registry.clone()).unwrap();
        assert!(std::ptr::eq(installed, global().unwrap()));

        // Identical
        install(registry).unwrap();

        // Different
        let mut other = Registry::new();
        other.register(Schema::new("other.Message")).unwrap();
        assert!(matches!(install(other), Err(Error::SchemaConflict(_))));
        assert!(global().unwrap().resolve("other.Message").is_err());
    }
}
