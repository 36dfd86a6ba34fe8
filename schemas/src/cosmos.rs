//! Cosmos SDK transaction signing.

use wireform_codec::{Field, Scalar, Schema, Type};

pub const SIGNING_INPUT: &str = "cosmos.SigningInput";

pub(crate) fn schemas() -> Vec<Schema> {
    vec![Schema::new(SIGNING_INPUT)
        .field(Field::scalar(1, "account_number", Scalar::Uint64))
        .field(Field::scalar(2, "chain_id", Scalar::String))
        .field(Field::message(3, "fee", "cosmos.SigningInput.Fee"))
        .field(Field::scalar(4, "memo", Scalar::String))
        .field(Field::scalar(5, "sequence", Scalar::Uint64))
        .field(Field::message(6, "messages", "cosmos.SigningInput.Message").repeated())
        .field(Field::map(7, "memo_tags", Scalar::String, Type::Scalar(Scalar::String)))
        .field(Field::scalar(8, "timeout_height", Scalar::Sint64))
        .nested(
            Schema::new("Amount")
                .field(Field::scalar(1, "denom", Scalar::String))
                .field(Field::scalar(2, "amount", Scalar::String)),
        )
        .nested(
            Schema::new("Fee")
                .field(Field::message(1, "amounts", "cosmos.SigningInput.Amount").repeated())
                .field(Field::scalar(2, "gas", Scalar::Uint64)),
        )
        .nested(
            Schema::new("Message")
                .field(Field::scalar(1, "from_address", Scalar::String))
                .field(Field::scalar(2, "to_address", Scalar::String))
                .field(Field::message(3, "amounts", "cosmos.SigningInput.Amount").repeated())
                .field(Field::scalar(4, "type_prefix", Scalar::String)),
        )]
}
