//! Binance chain order signing.

use wireform_codec::{Field, Scalar, Schema};

pub const SIGNING_INPUT: &str = "binance.SigningInput";
pub const SIGNING_OUTPUT: &str = "binance.SigningOutput";

/// Number of the `to_address` field of [SIGNING_INPUT].
pub const TO_ADDRESS: u32 = 1;
pub const AMOUNT: u32 = 2;
pub const CHAIN_ID: u32 = 3;
pub const SEQUENCE: u32 = 4;
pub const MEMO: u32 = 5;
pub const PRIVATE_KEY: u32 = 6;

/// Oneof group of [SIGNING_INPUT] selecting the order type.
pub const ORDER: &str = "order_oneof";
pub const TRADE_ORDER: u32 = 10;
pub const SEND_ORDER: u32 = 11;
pub const CANCEL_ORDER: u32 = 12;

pub(crate) fn schemas() -> Vec<Schema> {
    let input = Schema::new(SIGNING_INPUT)
        .field(Field::scalar(TO_ADDRESS, "to_address", Scalar::String))
        .field(Field::scalar(AMOUNT, "amount", Scalar::Bytes))
        .field(Field::scalar(CHAIN_ID, "chain_id", Scalar::String))
        .field(Field::scalar(SEQUENCE, "sequence", Scalar::Int64))
        .field(Field::scalar(MEMO, "memo", Scalar::String))
        .field(Field::scalar(PRIVATE_KEY, "private_key", Scalar::Bytes))
        .oneof(
            ORDER,
            [
                Field::message(TRADE_ORDER, "trade_order", "binance.SigningInput.TradeOrder"),
                Field::message(SEND_ORDER, "send_order", "binance.SigningInput.SendOrder"),
                Field::message(CANCEL_ORDER, "cancel_order", "binance.SigningInput.CancelOrder"),
            ],
        )
        .nested(
            Schema::new("TradeOrder")
                .field(Field::scalar(1, "sender", Scalar::Bytes))
                .field(Field::scalar(2, "id", Scalar::String))
                .field(Field::scalar(3, "symbol", Scalar::String))
                .field(Field::scalar(4, "ordertype", Scalar::Int64))
                .field(Field::scalar(5, "side", Scalar::Int64))
                .field(Field::scalar(6, "price", Scalar::Int64))
                .field(Field::scalar(7, "quantity", Scalar::Int64))
                .field(Field::scalar(8, "timeinforce", Scalar::Int64)),
        )
        .nested(
            Schema::new("SendOrder")
                .field(Field::message(1, "inputs", "binance.SigningInput.SendOrder.Io").repeated())
                .field(Field::message(2, "outputs", "binance.SigningInput.SendOrder.Io").repeated())
                .nested(
                    Schema::new("Io")
                        .field(Field::scalar(1, "address", Scalar::Bytes))
                        .field(Field::message(2, "coins", "binance.SigningInput.SendOrder.Token").repeated()),
                )
                .nested(
                    Schema::new("Token")
                        .field(Field::scalar(1, "denom", Scalar::String))
                        .field(Field::scalar(2, "amount", Scalar::Int64)),
                ),
        )
        // Marker: selecting it carries no data
        .nested(Schema::new("CancelOrder"));

    let output = Schema::new(SIGNING_OUTPUT)
        .field(Field::scalar(1, "encoded", Scalar::Bytes))
        .field(Field::scalar(2, "signature", Scalar::Bytes))
        .field(Field::scalar(3, "error_message", Scalar::String));

    vec![input, output]
}
