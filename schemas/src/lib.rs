//! Representative transaction schemas.
//!
//! A small table of `SigningInput`/`SigningOutput` messages in the shape blockchain signers
//! exchange them, plus recursive types that exercise lazy name resolution:
//! - `binance`: strings, bytes and a oneof of order messages (one of them an empty marker)
//! - `ethereum`: 64-bit integers, an enum and a repeated embedded message
//! - `cosmos`: repeated messages, a map and zigzag-encoded integers
//! - `tezos`: a self-referential expression tree
//! - `ton`: a pair of mutually recursive messages

use tracing::debug;
use wireform_codec::{EnumSchema, Error, Registry, Schema};

pub mod binance;
pub mod cosmos;
pub mod ethereum;
pub mod tezos;
pub mod ton;

/// Every message schema in the table (nested types are declared inside their parent).
pub fn table() -> Vec<Schema> {
    let mut schemas = Vec::new();
    schemas.extend(binance::schemas());
    schemas.extend(ethereum::schemas());
    schemas.extend(cosmos::schemas());
    schemas.extend(tezos::schemas());
    schemas.extend(ton::schemas());
    schemas
}

/// Every top-level enum in the table.
pub fn enums() -> Vec<EnumSchema> {
    ethereum::enums()
}

/// Builds and validates a registry holding the whole table.
pub fn registry() -> Result<Registry, Error> {
    let mut registry = Registry::new();
    for enumeration in enums() {
        registry.register_enum(enumeration)?;
    }
    for schema in table() {
        registry.register(schema)?;
    }
    registry.validate()?;
    debug!(schemas = registry.len(), "built schema table");
    Ok(registry)
}

/// Publishes the table as the process-wide registry (see [wireform_codec::install]).
pub fn install() -> Result<&'static Registry, Error> {
    wireform_codec::install(registry()?)
}
