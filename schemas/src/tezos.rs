//! Tezos Michelson expressions.

use wireform_codec::{Field, Scalar, Schema};

/// A Micheline node. Sequences and primitive arguments are themselves nodes.
pub const MICHELINE: &str = "tezos.Micheline";

pub(crate) fn schemas() -> Vec<Schema> {
    vec![Schema::new(MICHELINE)
        .oneof(
            "node",
            [
                Field::scalar(1, "int", Scalar::Sint64),
                Field::scalar(2, "string", Scalar::String),
                Field::scalar(3, "bytes", Scalar::Bytes),
                Field::message(4, "prim", "tezos.Micheline.Prim"),
            ],
        )
        .field(Field::message(5, "sequence", MICHELINE).repeated())
        .nested(
            Schema::new("Prim")
                .field(Field::scalar(1, "prim", Scalar::String))
                .field(Field::message(2, "args", MICHELINE).repeated())
                .field(Field::scalar(3, "annots", Scalar::String).repeated()),
        )]
}
