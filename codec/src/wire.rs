//! Cursor-based access to wire bytes.
//!
//! [Reader] consumes a [Bytes] buffer front to back. Length-delimited payloads are read through
//! [Reader::sub_reader], which returns a reader bounded to the declared payload so that nested
//! decoding can never run past its boundary. [Writer] appends to a growable [BytesMut].

use crate::{varint, Error};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// The largest valid field number (`2^29 - 1`).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// The 3-bit suffix of a tag that describes how the payload is framed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    StartGroup = 3,
    EndGroup = 4,
    Fixed32 = 5,
}

impl WireType {
    /// Parses the low 3 bits of a tag.
    pub fn from_u8(value: u8) -> Result<Self, Error> {
        match value {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Fixed64),
            2 => Ok(Self::LengthDelimited),
            3 => Ok(Self::StartGroup),
            4 => Ok(Self::EndGroup),
            5 => Ok(Self::Fixed32),
            other => Err(Error::InvalidWireType(other)),
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Varint => "varint",
            Self::Fixed64 => "fixed64",
            Self::LengthDelimited => "length-delimited",
            Self::StartGroup => "start-group",
            Self::EndGroup => "end-group",
            Self::Fixed32 => "fixed32",
        };
        f.write_str(name)
    }
}

/// A field key: `(number << 3) | wire_type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tag {
    pub number: u32,
    pub wire_type: WireType,
}

impl Tag {
    pub fn new(number: u32, wire_type: WireType) -> Self {
        Self { number, wire_type }
    }

    /// The varint value of the key.
    pub fn key(&self) -> u32 {
        (self.number << 3) | self.wire_type as u32
    }

    /// The number of bytes the key occupies on the wire.
    pub fn encoded_len(number: u32) -> usize {
        varint::size(number << 3)
    }
}

/// A forward-only, bounds-checked reader over wire bytes.
#[derive(Clone, Debug)]
pub struct Reader {
    buf: Bytes,
    position: usize,
}

impl Reader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf, position: 0 }
    }

    /// Absolute offset of the cursor within the outermost buffer.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    fn require(&self, n: usize) -> Result<(), Error> {
        if self.buf.remaining() < n {
            return Err(Error::Truncated);
        }
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8, Error> {
        self.require(1)?;
        self.position += 1;
        Ok(self.buf.get_u8())
    }

    /// Reads exactly `n` bytes without copying.
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes, Error> {
        self.require(n)?;
        self.position += n;
        Ok(self.buf.split_to(n))
    }

    pub fn read_varint(&mut self) -> Result<u64, Error> {
        let before = self.buf.remaining();
        let value = varint::read::<u64>(&mut self.buf)?;
        self.position += before - self.buf.remaining();
        Ok(value)
    }

    pub fn read_fixed32(&mut self) -> Result<u32, Error> {
        self.require(4)?;
        self.position += 4;
        Ok(self.buf.get_u32_le())
    }

    pub fn read_fixed64(&mut self) -> Result<u64, Error> {
        self.require(8)?;
        self.position += 8;
        Ok(self.buf.get_u64_le())
    }

    /// Reads a varint length prefix and checks it against the remaining input.
    pub fn read_length(&mut self) -> Result<usize, Error> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| Error::Truncated)?;
        self.require(len)?;
        Ok(len)
    }

    /// Reads a field key, rejecting field number 0, numbers beyond [MAX_FIELD_NUMBER] and the
    /// reserved wire types 6 and 7.
    pub fn read_tag(&mut self) -> Result<Tag, Error> {
        let key = self.read_varint()?;
        let number = key >> 3;
        if number == 0 || number > MAX_FIELD_NUMBER as u64 {
            return Err(Error::InvalidTag(number));
        }
        let wire_type = WireType::from_u8((key & 0x7) as u8)?;
        Ok(Tag::new(number as u32, wire_type))
    }

    /// Returns a reader over the next `len` bytes and advances past them.
    pub fn sub_reader(&mut self, len: usize) -> Result<Reader, Error> {
        self.require(len)?;
        let sub = Reader {
            buf: self.buf.split_to(len),
            position: self.position,
        };
        self.position += len;
        Ok(sub)
    }

    /// Reads a length-prefixed payload into a bounded reader.
    pub fn read_delimited(&mut self) -> Result<Reader, Error> {
        let len = self.read_length()?;
        self.sub_reader(len)
    }

    /// Consumes the payload of a field whose tag has just been read, returning the raw bytes
    /// of the payload (excluding any length prefix).
    pub fn skip(&mut self, tag: Tag) -> Result<Payload, Error> {
        match tag.wire_type {
            WireType::Varint => self.read_varint().map(Payload::Varint),
            WireType::Fixed64 => self.read_fixed64().map(Payload::Fixed64),
            WireType::Fixed32 => self.read_fixed32().map(Payload::Fixed32),
            WireType::LengthDelimited => {
                let len = self.read_length()?;
                self.read_bytes(len).map(Payload::LengthDelimited)
            }
            WireType::StartGroup => self.skip_group(tag.number).map(Payload::Group),
            WireType::EndGroup => Err(Error::UnterminatedGroup(tag.number)),
        }
    }

    // Groups nest, so scan until the matching end tag. Open groups are tracked on the heap
    // so that hostile nesting cannot exhaust the stack.
    fn skip_group(&mut self, number: u32) -> Result<Bytes, Error> {
        let start = self.buf.clone();
        let before = self.remaining();
        let mut open = vec![number];
        loop {
            if self.is_empty() {
                return Err(Error::Truncated);
            }
            let consumed = before - self.remaining();
            let tag = self.read_tag()?;
            match tag.wire_type {
                WireType::StartGroup => open.push(tag.number),
                WireType::EndGroup => {
                    if open.pop() != Some(tag.number) {
                        return Err(Error::UnterminatedGroup(number));
                    }
                    if open.is_empty() {
                        return Ok(start.slice(..consumed));
                    }
                }
                _ => {
                    self.skip(tag)?;
                }
            }
        }
    }
}

/// The raw payload of a field the schema does not describe.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Varint(u64),
    Fixed64(u64),
    LengthDelimited(Bytes),
    Group(Bytes),
    Fixed32(u32),
}

/// An append-only writer over a growable buffer.
#[derive(Debug, Default)]
pub struct Writer {
    buf: BytesMut,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn reserve(&mut self, hint: usize) {
        self.buf.reserve(hint);
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.buf.put_u8(byte);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    pub fn write_varint(&mut self, value: u64) {
        varint::write(value, &mut self.buf);
    }

    pub fn write_fixed32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    pub fn write_fixed64(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    pub fn write_tag(&mut self, number: u32, wire_type: WireType) {
        varint::write(Tag::new(number, wire_type).key(), &mut self.buf);
    }

    /// Writes a length prefix followed by `bytes`.
    pub fn write_length_delimited(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as u64);
        self.write_bytes(bytes);
    }

    /// Writes a raw payload under `number`.
    pub fn write_payload(&mut self, number: u32, payload: &Payload) {
        match payload {
            Payload::Varint(value) => {
                self.write_tag(number, WireType::Varint);
                self.write_varint(*value);
            }
            Payload::Fixed64(value) => {
                self.write_tag(number, WireType::Fixed64);
                self.write_fixed64(*value);
            }
            Payload::Fixed32(value) => {
                self.write_tag(number, WireType::Fixed32);
                self.write_fixed32(*value);
            }
            Payload::LengthDelimited(bytes) => {
                self.write_tag(number, WireType::LengthDelimited);
                self.write_length_delimited(bytes);
            }
            Payload::Group(bytes) => {
                self.write_tag(number, WireType::StartGroup);
                self.write_bytes(bytes);
                self.write_tag(number, WireType::EndGroup);
            }
        }
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

impl Payload {
    /// The number of bytes [Writer::write_payload] emits, including the tag(s).
    pub fn encoded_len(&self, number: u32) -> usize {
        let tag = Tag::encoded_len(number);
        match self {
            Payload::Varint(value) => tag + varint::size(*value),
            Payload::Fixed64(_) => tag + 8,
            Payload::Fixed32(_) => tag + 4,
            Payload::LengthDelimited(bytes) => {
                tag + varint::size(bytes.len() as u64) + bytes.len()
            }
            Payload::Group(bytes) => 2 * tag + bytes.len(),
        }
    }
}
