//! In-memory message instances.
//!
//! A [Message] holds regular fields by number, one [OneofCase] per exclusive group, and any
//! fields preserved from the wire that its schema does not describe. It does not reference its
//! schema: the same value is interpreted by whichever [crate::Schema] it is encoded or verified
//! against.

use crate::wire::Payload;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};

/// A single field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    /// `int32`, `sint32` and `sfixed32` fields.
    I32(i32),
    /// `int64`, `sint64` and `sfixed64` fields.
    I64(i64),
    /// `uint32` and `fixed32` fields.
    U32(u32),
    /// `uint64` and `fixed64` fields.
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Bytes),
    Enum(i32),
    Message(Message),
}

impl Value {
    /// A short description of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Enum(_) => "enum",
            Self::Message(_) => "message",
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

macro_rules! impl_from {
    ($type:ty, $variant:ident) => {
        impl From<$type> for Value {
            fn from(value: $type) -> Self {
                Value::$variant(value.into())
            }
        }
    };
}
impl_from!(bool, Bool);
impl_from!(i32, I32);
impl_from!(i64, I64);
impl_from!(u32, U32);
impl_from!(u64, U64);
impl_from!(f32, F32);
impl_from!(f64, F64);
impl_from!(String, String);
impl_from!(&str, String);
impl_from!(Bytes, Bytes);
impl_from!(Vec<u8>, Bytes);
impl_from!(Message, Message);

/// The contents of a regular (non-oneof) field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Single(Value),
    Repeated(Vec<Value>),
    /// Map entries in insertion order. Keys are expected to be unique.
    Map(Vec<(Value, Value)>),
}

/// The selected member of a oneof group.
#[derive(Clone, Debug, PartialEq)]
pub struct OneofCase {
    pub number: u32,
    pub value: Value,
}

/// A field read from the wire that the schema does not describe.
#[derive(Clone, Debug, PartialEq)]
pub struct UnknownField {
    pub number: u32,
    pub payload: Payload,
}

/// A message instance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Message {
    fields: BTreeMap<u32, FieldValue>,
    oneofs: BTreeMap<String, OneofCase>,
    unknown: Vec<UnknownField>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no field, oneof case or unknown field is present.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.oneofs.is_empty() && self.unknown.is_empty()
    }

    /// Sets a singular field, replacing any previous value.
    ///
    /// Members of a oneof group should be set with [Message::select]; setting them here is
    /// accepted but bypasses the exclusivity the group provides (see [crate::verify]).
    pub fn set(&mut self, number: u32, value: impl Into<Value>) -> &mut Self {
        self.fields
            .insert(number, FieldValue::Single(value.into()));
        self
    }

    /// Builder form of [Message::set].
    pub fn with(mut self, number: u32, value: impl Into<Value>) -> Self {
        self.set(number, value);
        self
    }

    /// Appends an element to a repeated field.
    pub fn push(&mut self, number: u32, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        match self.fields.get_mut(&number) {
            Some(FieldValue::Repeated(values)) => values.push(value),
            _ => {
                self.fields.insert(number, FieldValue::Repeated(vec![value]));
            }
        }
        self
    }

    /// Inserts a map entry, replacing the value of an existing equal key.
    pub fn insert(
        &mut self,
        number: u32,
        key: impl Into<Value>,
        value: impl Into<Value>,
    ) -> &mut Self {
        let (key, value) = (key.into(), value.into());
        match self.fields.get_mut(&number) {
            Some(FieldValue::Map(entries)) => upsert(entries, key, value),
            _ => {
                self.fields.insert(number, FieldValue::Map(vec![(key, value)]));
            }
        }
        self
    }

    /// Appends a map entry without checking for an existing key.
    pub fn append_entry(&mut self, number: u32, key: Value, value: Value) -> &mut Self {
        match self.fields.get_mut(&number) {
            Some(FieldValue::Map(entries)) => entries.push((key, value)),
            _ => {
                self.fields.insert(number, FieldValue::Map(vec![(key, value)]));
            }
        }
        self
    }

    /// Selects member `number` of oneof `group`, replacing any other member.
    pub fn select(
        &mut self,
        group: impl Into<String>,
        number: u32,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.oneofs.insert(
            group.into(),
            OneofCase {
                number,
                value: value.into(),
            },
        );
        self
    }

    /// Builder form of [Message::select].
    pub fn with_case(mut self, group: impl Into<String>, number: u32, value: impl Into<Value>) -> Self {
        self.select(group, number, value);
        self
    }

    /// Returns a singular field or a selected oneof member.
    pub fn get(&self, number: u32) -> Option<&Value> {
        match self.fields.get(&number) {
            Some(FieldValue::Single(value)) => Some(value),
            Some(_) => None,
            None => self
                .oneofs
                .values()
                .find(|case| case.number == number)
                .map(|case| &case.value),
        }
    }

    /// Returns the elements of a repeated field (empty if absent).
    pub fn repeated(&self, number: u32) -> &[Value] {
        match self.fields.get(&number) {
            Some(FieldValue::Repeated(values)) => values,
            _ => &[],
        }
    }

    /// Returns the entries of a map field (empty if absent).
    pub fn entries(&self, number: u32) -> &[(Value, Value)] {
        match self.fields.get(&number) {
            Some(FieldValue::Map(entries)) => entries,
            _ => &[],
        }
    }

    /// Returns the selected member of `group`.
    pub fn which(&self, group: &str) -> Option<&OneofCase> {
        self.oneofs.get(group)
    }

    pub fn field(&self, number: u32) -> Option<&FieldValue> {
        self.fields.get(&number)
    }

    /// Regular fields ordered by number.
    pub fn fields(&self) -> impl Iterator<Item = (u32, &FieldValue)> {
        self.fields.iter().map(|(number, value)| (*number, value))
    }

    /// Selected oneof members ordered by group name.
    pub fn cases(&self) -> impl Iterator<Item = (&str, &OneofCase)> {
        self.oneofs.iter().map(|(group, case)| (group.as_str(), case))
    }

    /// Removes field `number`, whether regular or a selected oneof member.
    pub fn clear(&mut self, number: u32) -> &mut Self {
        self.fields.remove(&number);
        self.oneofs.retain(|_, case| case.number != number);
        self
    }

    /// Removes the selected member of `group`.
    pub fn clear_case(&mut self, group: &str) -> Option<OneofCase> {
        self.oneofs.remove(group)
    }

    pub fn unknown_fields(&self) -> &[UnknownField] {
        &self.unknown
    }

    pub fn push_unknown(&mut self, number: u32, payload: Payload) -> &mut Self {
        self.unknown.push(UnknownField { number, payload });
        self
    }

    /// Stores a decoded singular value, merging into an existing embedded message.
    pub(crate) fn merge_single(&mut self, number: u32, value: Value) {
        let mut incoming = Message::new();
        incoming.set(number, value);
        self.absorb(incoming);
    }

    /// Stores a decoded oneof member, replacing any other member of `group` and merging into
    /// an existing embedded message of the same member.
    pub(crate) fn merge_case(&mut self, group: &str, number: u32, value: Value) {
        let mut incoming = Message::new();
        incoming.select(group, number, value);
        self.absorb(incoming);
    }

    /// Drops all preserved unknown fields (recursively).
    pub fn clear_unknown(&mut self) {
        self.unknown.clear();
        for field in self.fields.values_mut() {
            match field {
                FieldValue::Single(value) => clear_unknown_value(value),
                FieldValue::Repeated(values) => values.iter_mut().for_each(clear_unknown_value),
                FieldValue::Map(entries) => {
                    entries.iter_mut().for_each(|(_, value)| clear_unknown_value(value))
                }
            }
        }
        for case in self.oneofs.values_mut() {
            clear_unknown_value(&mut case.value);
        }
    }

    /// Merges `other` into `self`: singular scalars are replaced, nested messages are merged,
    /// repeated fields are appended, map entries are inserted (replacing equal keys), oneof
    /// cases replace the group (merging when both select the same message member) and unknown
    /// fields are appended.
    pub fn merge(&mut self, other: Message) {
        self.absorb(other);
        self.dedupe_entries();
    }

    /// Drops all but the last value of each repeated map key (recursively). The surviving
    /// entry keeps the position of the first occurrence of its key.
    pub(crate) fn dedupe_entries(&mut self) {
        for field in self.fields.values_mut() {
            match field {
                FieldValue::Single(value) => dedupe_value(value),
                FieldValue::Repeated(values) => values.iter_mut().for_each(dedupe_value),
                FieldValue::Map(entries) => {
                    dedupe(entries);
                    entries.iter_mut().for_each(|(_, value)| dedupe_value(value));
                }
            }
        }
        for case in self.oneofs.values_mut() {
            dedupe_value(&mut case.value);
        }
    }

    // Like merge, but map entries are appended. Callers dedupe once when done.
    fn absorb(&mut self, other: Message) {
        for (number, incoming) in other.fields {
            let Some(existing) = self.fields.get_mut(&number) else {
                self.fields.insert(number, incoming);
                continue;
            };
            match (existing, incoming) {
                (
                    FieldValue::Single(Value::Message(existing)),
                    FieldValue::Single(Value::Message(message)),
                ) => existing.absorb(message),
                (FieldValue::Repeated(existing), FieldValue::Repeated(values)) => {
                    existing.extend(values)
                }
                (FieldValue::Map(existing), FieldValue::Map(entries)) => existing.extend(entries),
                (existing, incoming) => *existing = incoming,
            }
        }
        for (group, case) in other.oneofs {
            let merged = match self.oneofs.remove(&group) {
                Some(OneofCase {
                    number,
                    value: Value::Message(mut existing),
                }) if number == case.number => match case.value {
                    Value::Message(message) => {
                        existing.absorb(message);
                        OneofCase {
                            number,
                            value: Value::Message(existing),
                        }
                    }
                    value => OneofCase { number, value },
                },
                _ => case,
            };
            self.oneofs.insert(group, merged);
        }
        self.unknown.extend(other.unknown);
    }
}

fn upsert(entries: &mut Vec<(Value, Value)>, key: Value, value: Value) {
    match entries.iter_mut().find(|(existing, _)| *existing == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}

/// A hashable view of a map key.
#[derive(PartialEq, Eq, Hash)]
pub(crate) enum KeyRef<'a> {
    Bool(bool),
    Signed(i64),
    Unsigned(u64),
    Str(&'a str),
}

pub(crate) fn key_ref(value: &Value) -> Option<KeyRef<'_>> {
    match value {
        Value::Bool(v) => Some(KeyRef::Bool(*v)),
        Value::I32(v) => Some(KeyRef::Signed(*v as i64)),
        Value::I64(v) => Some(KeyRef::Signed(*v)),
        Value::U32(v) => Some(KeyRef::Unsigned(*v as u64)),
        Value::U64(v) => Some(KeyRef::Unsigned(*v)),
        Value::String(v) => Some(KeyRef::Str(v.as_str())),
        _ => None,
    }
}

// Values that cannot be map keys are never treated as duplicates.
fn dedupe(entries: &mut Vec<(Value, Value)>) {
    let targets = {
        let mut first = HashMap::with_capacity(entries.len());
        let targets: Vec<usize> = entries
            .iter()
            .enumerate()
            .map(|(index, (key, _))| match key_ref(key) {
                Some(key) => *first.entry(key).or_insert(index),
                None => index,
            })
            .collect();
        targets
    };
    if targets.iter().enumerate().all(|(index, target)| index == *target) {
        return;
    }
    let mut slots: Vec<Option<(Value, Value)>> = Vec::with_capacity(entries.len());
    for ((key, value), target) in entries.drain(..).zip(targets) {
        if target == slots.len() {
            slots.push(Some((key, value)));
        } else {
            if let Some(entry) = slots[target].as_mut() {
                entry.1 = value;
            }
            slots.push(None);
        }
    }
    entries.extend(slots.into_iter().flatten());
}

fn dedupe_value(value: &mut Value) {
    if let Value::Message(message) = value {
        message.dedupe_entries();
    }
}

fn clear_unknown_value(value: &mut Value) {
    if let Value::Message(message) = value {
        message.clear_unknown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_replaces_case() {
        let mut message = Message::new();
        message.select("order", 10, Message::new().with(1, "buy"));
        message.select("order", 11, Message::new());
        assert_eq!(message.which("order").unwrap().number, 11);
        assert!(message.get(10).is_none());
        assert_eq!(message.get(11), Some(&Value::Message(Message::new())));
    }

    #[test]
    fn test_repeated_and_map_accessors() {
        let mut message = Message::new();
        message.push(3, 1u32).push(3, 2u32);
        message.insert(4, "a", 1i64).insert(4, "b", 2i64).insert(4, "a", 3i64);
        assert_eq!(message.repeated(3), &[Value::U32(1), Value::U32(2)]);
        assert_eq!(
            message.entries(4),
            &[
                (Value::from("a"), Value::I64(3)),
                (Value::from("b"), Value::I64(2))
            ]
        );
        assert!(message.repeated(9).is_empty());
        assert!(message.get(3).is_none());
    }

    #[test]
    fn test_merge() {
        let mut base = Message::new()
            .with(1, "old")
            .with(2, Message::new().with(1, 1u64))
            .with_case("order", 10, Message::new().with(1, "x"));
        base.push(3, 1u32);

        let mut update = Message::new()
            .with(1, "new")
            .with(2, Message::new().with(2, true))
            .with_case("order", 10, Message::new().with(2, "y"));
        update.push(3, 2u32);

        base.merge(update);
        assert_eq!(base.get(1), Some(&Value::from("new")));
        assert_eq!(
            base.get(2),
            Some(&Value::Message(Message::new().with(1, 1u64).with(2, true)))
        );
        assert_eq!(base.repeated(3), &[Value::U32(1), Value::U32(2)]);
        assert_eq!(
            base.which("order").unwrap().value,
            Value::Message(Message::new().with(1, "x").with(2, "y"))
        );
    }

    #[test]
    fn test_merge_replaces_map_keys() {
        let mut base = Message::new();
        base.insert(6, "a", 1u64).insert(6, "b", 2u64);
        let mut update = Message::new();
        update.insert(6, "c", 3u64).insert(6, "a", 4u64);

        base.merge(update);
        assert_eq!(
            base.entries(6),
            &[
                (Value::from("a"), Value::U64(4)),
                (Value::from("b"), Value::U64(2)),
                (Value::from("c"), Value::U64(3)),
            ]
        );
    }

    #[test]
    fn test_clear_unknown_is_recursive() {
        let mut inner = Message::new();
        inner.push_unknown(9, Payload::Varint(1));
        let mut outer = Message::new().with(1, inner);
        outer.push_unknown(8, Payload::Fixed32(2));

        outer.clear_unknown();
        assert!(outer.unknown_fields().is_empty());
        assert!(outer.get(1).unwrap().as_message().unwrap().is_empty());
    }
}
