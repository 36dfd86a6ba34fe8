#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use wireform_codec::Message;
use wireform_schemas::binance;

#[derive(Arbitrary, Debug)]
enum Order {
    None,
    Trade { symbol: String, price: i64 },
    Send { address: Vec<u8>, denom: String, amount: i64 },
    Cancel,
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    to_address: String,
    amount: Vec<u8>,
    sequence: i64,
    memo: String,
    order: Order,
}

fn fuzz(input: FuzzInput) {
    let registry = wireform_schemas::registry().expect("table must be valid");
    let mut message = Message::new()
        .with(binance::TO_ADDRESS, input.to_address)
        .with(binance::AMOUNT, input.amount)
        .with(binance::SEQUENCE, input.sequence)
        .with(binance::MEMO, input.memo);
    match input.order {
        Order::None => {}
        Order::Trade { symbol, price } => {
            let order = Message::new().with(3, symbol).with(6, price);
            message.select(binance::ORDER, binance::TRADE_ORDER, order);
        }
        Order::Send {
            address,
            denom,
            amount,
        } => {
            let mut io = Message::new().with(1, address);
            io.push(2, Message::new().with(1, denom).with(2, amount));
            let mut order = Message::new();
            order.push(1, io);
            message.select(binance::ORDER, binance::SEND_ORDER, order);
        }
        Order::Cancel => {
            message.select(binance::ORDER, binance::CANCEL_ORDER, Message::new());
        }
    }
    assert!(registry.verify(binance::SIGNING_INPUT, &message).is_none());

    let encoded = registry
        .encode(binance::SIGNING_INPUT, &message)
        .expect("valid message must encode");
    let decoded = registry
        .decode(binance::SIGNING_INPUT, encoded.clone())
        .expect("encoded message must decode");
    let reencoded = registry
        .encode(binance::SIGNING_INPUT, &decoded)
        .expect("decoded message must encode");
    assert_eq!(encoded, reencoded);
    assert_eq!(
        decoded.which(binance::ORDER).map(|case| case.number),
        message.which(binance::ORDER).map(|case| case.number)
    );
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
