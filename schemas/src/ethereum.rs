//! Ethereum transaction signing.

use wireform_codec::{EnumSchema, Field, Scalar, Schema};

pub const SIGNING_INPUT: &str = "ethereum.SigningInput";
pub const TRANSACTION_MODE: &str = "ethereum.TransactionMode";

pub(crate) fn enums() -> Vec<EnumSchema> {
    vec![EnumSchema::new(TRANSACTION_MODE)
        .value("Legacy", 0)
        .value("Enveloped", 1)
        .value("UserOp", 2)]
}

pub(crate) fn schemas() -> Vec<Schema> {
    vec![Schema::new(SIGNING_INPUT)
        .field(Field::scalar(1, "chain_id", Scalar::Uint64))
        .field(Field::scalar(2, "nonce", Scalar::Uint64))
        .field(Field::enumeration(3, "tx_mode", TRANSACTION_MODE))
        .field(Field::scalar(4, "gas_price", Scalar::Bytes))
        .field(Field::scalar(5, "gas_limit", Scalar::Uint64))
        .field(Field::scalar(6, "to_address", Scalar::String))
        .field(Field::scalar(7, "amount", Scalar::Bytes))
        .field(Field::scalar(8, "data", Scalar::Bytes).optional())
        .field(Field::message(9, "access_list", "ethereum.SigningInput.Access").repeated())
        .nested(
            Schema::new("Access")
                .field(Field::scalar(1, "address", Scalar::String))
                .field(Field::scalar(2, "stored_keys", Scalar::Bytes).repeated()),
        )]
}
