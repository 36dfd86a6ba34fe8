#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use wireform_codec::{decode_delimited, Config, Resolver, UnknownFields};

#[derive(Arbitrary, Debug)]
enum Policy {
    Preserve,
    Discard,
    Reject,
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    schema: u8,
    policy: Policy,
    max_depth: u8,
    delimited: bool,
    data: Vec<u8>,
}

fn fuzz(input: FuzzInput) {
    let registry = wireform_schemas::registry().expect("table must be valid");
    let names = registry.names();
    let name = names[input.schema as usize % names.len()];
    let config = Config {
        max_depth: input.max_depth as usize,
        max_len: 1 << 20,
        unknown_fields: match input.policy {
            Policy::Preserve => UnknownFields::Preserve,
            Policy::Discard => UnknownFields::Discard,
            Policy::Reject => UnknownFields::Reject,
        },
    };

    // Arbitrary input must either fail with a typed error or decode
    let data = Bytes::from(input.data);
    let decoded = if input.delimited {
        let schema = registry.resolve(name).expect("name is registered");
        let Ok(decoded) = decode_delimited(&registry, schema, data, &config) else {
            return;
        };
        decoded
    } else {
        let Ok(decoded) = registry.decode_cfg(name, data, &config) else {
            return;
        };
        decoded
    };

    // Anything decoded must re-encode, and re-encoding must be stable
    let encoded = registry
        .encode(name, &decoded)
        .expect("decoded message must encode");
    let replay = Config {
        max_len: usize::MAX,
        ..config
    };
    let redecoded = registry
        .decode_cfg(name, encoded.clone(), &replay)
        .expect("encoded message must decode");
    let reencoded = registry
        .encode(name, &redecoded)
        .expect("decoded message must encode");
    assert_eq!(encoded, reencoded);
    assert!(registry.verify(name, &redecoded).is_none());
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
