//! Little-endian wire codec for primitives and composite values.
//!
//! Layout rules: fixed-width numbers are little-endian, vectors are their float
//! components back to back, `Option<T>` is a presence byte followed by the
//! payload when present, strings and lists carry a `u32` count prefix.

use glam::{Vec2, Vec3};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    TruncatedInput { needed: usize, remaining: usize },
    #[error("invalid bool byte {0:#04x}")]
    InvalidBool(u8),
    #[error("invalid {what} tag {value}")]
    InvalidTag { what: &'static str, value: u8 },
    #[error("invalid utf-8 in string")]
    InvalidUtf8,
    #[error("change mask {mask:#x} names fields beyond the {field_count} declared")]
    InvalidMask { mask: u32, field_count: usize },
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

#[derive(Debug, Clone, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn write<T: WireEncode + ?Sized>(&mut self, value: &T) {
        value.encode(self);
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub fn read<T: WireDecode>(&mut self) -> Result<T, CodecError> {
        T::decode(self)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let remaining = self.remaining();
        if remaining < len {
            return Err(CodecError::TruncatedInput {
                needed: len,
                remaining,
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn finish(self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}

pub trait WireEncode {
    fn encode(&self, w: &mut WireWriter);
}

pub trait WireDecode: Sized {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError>;
}

pub fn encode<T: WireEncode + ?Sized>(value: &T) -> Vec<u8> {
    let mut w = WireWriter::new();
    value.encode(&mut w);
    w.into_bytes()
}

pub fn decode<T: WireDecode>(bytes: &[u8]) -> Result<T, CodecError> {
    let mut r = WireReader::new(bytes);
    let value = T::decode(&mut r)?;
    r.finish()?;
    Ok(value)
}

macro_rules! impl_wire_number {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WireEncode for $ty {
                #[inline]
                fn encode(&self, w: &mut WireWriter) {
                    w.write_bytes(&self.to_le_bytes());
                }
            }

            impl WireDecode for $ty {
                #[inline]
                fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
                    Ok(<$ty>::from_le_bytes(r.read_array()?))
                }
            }
        )*
    };
}

impl_wire_number!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl WireEncode for bool {
    fn encode(&self, w: &mut WireWriter) {
        w.write_u8(u8::from(*self));
    }
}

impl WireDecode for bool {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        match r.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidBool(other)),
        }
    }
}

impl WireEncode for str {
    fn encode(&self, w: &mut WireWriter) {
        w.write(&(self.len() as u32));
        w.write_bytes(self.as_bytes());
    }
}

impl WireEncode for String {
    fn encode(&self, w: &mut WireWriter) {
        self.as_str().encode(w);
    }
}

impl WireDecode for String {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let len = r.read::<u32>()? as usize;
        let bytes = r.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8)
    }
}

impl WireEncode for Vec2 {
    fn encode(&self, w: &mut WireWriter) {
        w.write(&self.x);
        w.write(&self.y);
    }
}

impl WireDecode for Vec2 {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Vec2::new(r.read()?, r.read()?))
    }
}

impl WireEncode for Vec3 {
    fn encode(&self, w: &mut WireWriter) {
        w.write(&self.x);
        w.write(&self.y);
        w.write(&self.z);
    }
}

impl WireDecode for Vec3 {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Vec3::new(r.read()?, r.read()?, r.read()?))
    }
}

impl<T: WireEncode> WireEncode for Option<T> {
    fn encode(&self, w: &mut WireWriter) {
        match self {
            Some(value) => {
                w.write_u8(1);
                value.encode(w);
            }
            None => w.write_u8(0),
        }
    }
}

impl<T: WireDecode> WireDecode for Option<T> {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        match r.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(T::decode(r)?)),
            other => Err(CodecError::InvalidTag {
                what: "option presence",
                value: other,
            }),
        }
    }
}

impl<T: WireEncode> WireEncode for [T] {
    fn encode(&self, w: &mut WireWriter) {
        w.write(&(self.len() as u32));
        for item in self {
            item.encode(w);
        }
    }
}

impl<T: WireEncode> WireEncode for Vec<T> {
    fn encode(&self, w: &mut WireWriter) {
        self.as_slice().encode(w);
    }
}

impl<T: WireDecode> WireDecode for Vec<T> {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let count = r.read::<u32>()? as usize;
        // Every element occupies at least one byte; refuse counts the input can't hold.
        if count > r.remaining() {
            return Err(CodecError::TruncatedInput {
                needed: count,
                remaining: r.remaining(),
            });
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(T::decode(r)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_roundtrip_is_bit_identical() {
        let v = Vec3::new(1.5, -2.25, 0.0);
        let bytes = encode(&v);
        assert_eq!(bytes.len(), 12);

        let decoded: Vec3 = decode(&bytes).unwrap();
        assert_eq!(decoded.x.to_bits(), v.x.to_bits());
        assert_eq!(decoded.y.to_bits(), v.y.to_bits());
        assert_eq!(decoded.z.to_bits(), v.z.to_bits());
    }

    #[test]
    fn numbers_are_little_endian() {
        assert_eq!(encode(&0x0102_0304u32), vec![4, 3, 2, 1]);
        assert_eq!(encode(&-2i16), vec![0xfe, 0xff]);
        assert_eq!(encode(&1.0f32), 1.0f32.to_le_bytes().to_vec());
    }

    #[test]
    fn truncated_input() {
        let err = decode::<u32>(&[1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            CodecError::TruncatedInput {
                needed: 4,
                remaining: 3
            }
        );

        let mut bytes = encode("hello");
        bytes.pop();
        assert!(matches!(
            decode::<String>(&bytes),
            Err(CodecError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn option_presence_byte() {
        assert_eq!(encode(&None::<u16>), vec![0]);
        assert_eq!(encode(&Some(7u16)), vec![1, 7, 0]);
        assert_eq!(decode::<Option<u16>>(&[1, 7, 0]).unwrap(), Some(7));
        assert!(matches!(
            decode::<Option<u16>>(&[2]),
            Err(CodecError::InvalidTag { .. })
        ));
    }

    #[test]
    fn lists_and_strings() {
        let list = vec![Vec2::new(1.0, 2.0), Vec2::new(-3.0, 4.5)];
        let decoded: Vec<Vec2> = decode(&encode(&list)).unwrap();
        assert_eq!(decoded, list);

        let text = "granada ñ ¡fuego!".to_string();
        assert_eq!(decode::<String>(&encode(&text)).unwrap(), text);
    }

    #[test]
    fn oversized_list_count_is_rejected() {
        let mut w = WireWriter::new();
        w.write(&u32::MAX);
        assert!(matches!(
            decode::<Vec<u8>>(w.as_slice()),
            Err(CodecError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn rejects_bad_bool_and_utf8() {
        assert_eq!(decode::<bool>(&[2]), Err(CodecError::InvalidBool(2)));
        assert_eq!(
            decode::<String>(&[2, 0, 0, 0, 0xff, 0xfe]),
            Err(CodecError::InvalidUtf8)
        );
    }

    #[test]
    fn trailing_bytes() {
        assert_eq!(decode::<u8>(&[1, 2]), Err(CodecError::TrailingBytes(1)));
    }
}
