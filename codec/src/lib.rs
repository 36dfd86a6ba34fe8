//! Encode and decode Protocol Buffers messages described at runtime.
//!
//! # Overview
//!
//! Messages are not generated types. A [Schema] describes the fields of a message type, a
//! [Registry] holds the schemas a program knows about, and a [Message] holds field values keyed
//! by field number. The codec walks the schema to turn a message into standard Protocol Buffers
//! wire bytes and back:
//! - [encode] / [decode]: the plain wire format
//! - [encode_delimited] / [decode_delimited]: a message preceded by its varint length
//! - [verify]: check a message against its schema without encoding it
//! - [to_untyped] / [from_untyped]: convert to and from JSON values
//!
//! Decoding treats its input as untrusted: limits on length and nesting come from [Config],
//! fields the schema does not describe are preserved (or discarded, or rejected) according
//! to [UnknownFields], and every failure is reported as an [Error] without producing a
//! partial message.
//!
//! # Example
//!
//! ```
//! use wireform_codec::{Field, Message, Registry, Scalar, Schema};
//!
//! let mut registry = Registry::new();
//! registry
//!     .register(
//!         Schema::new("binance.SigningInput")
//!             .field(Field::scalar(1, "to_address", Scalar::String))
//!             .field(Field::scalar(2, "amount", Scalar::Bytes))
//!             .oneof(
//!                 "order",
//!                 [
//!                     Field::message(10, "trade_order", "binance.SigningInput.Order"),
//!                     Field::message(11, "send_order", "binance.SigningInput.Order"),
//!                 ],
//!             )
//!             .nested(Schema::new("Order").field(Field::scalar(1, "symbol", Scalar::String))),
//!     )
//!     .unwrap();
//! registry.validate().unwrap();
//!
//! let input = Message::new()
//!     .with(1, "bnb1grpf0955h0ykzq3ar5nmum7y6gdfl6lxfn46h2")
//!     .with(2, vec![0x01, 0x00])
//!     .with_case("order", 11, Message::new().with(1, "BNB"));
//! assert!(registry.verify("binance.SigningInput", &input).is_none());
//!
//! let encoded = registry.encode("binance.SigningInput", &input).unwrap();
//! let decoded = registry.decode("binance.SigningInput", encoded).unwrap();
//! assert_eq!(decoded, input);
//! ```

pub mod config;
pub mod error;
pub mod field;
pub mod json;
pub mod message;
pub mod registry;
pub mod schema;
pub mod value;
pub mod varint;
pub mod wire;

// Re-export main types and functions
pub use config::{Config, UnknownFields};
pub use error::Error;
pub use json::{from_untyped, to_untyped, Enums, Longs, Options};
pub use message::{
    check, decode, decode_delimited, encode, encode_delimited, encoded_len, verify,
};
pub use registry::{global, install, Registry, Resolver};
pub use schema::{json_name, EnumSchema, Field, Label, Scalar, Schema, Type};
pub use value::{FieldValue, Message, OneofCase, UnknownField, Value};
pub use wire::{Payload, Reader, Tag, WireType, Writer};
