use std::io::{self, Write};

use base64::prelude::*;
use nom::bytes::complete;
use nom::number::complete::{be_u16, be_u32, be_u64};
use num::FromPrimitive;
use serde::de::Error as _;
use serde::ser::{Error as _, SerializeStruct};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::*;
use crate::errors::Error;

/// The four fixed metadata fields of a tag entry, 16 bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TagHeader {
    pub(crate) id: u32,
    pub(crate) type_code: u32,
    pub(crate) offset: u32,
    pub(crate) count: u32,
}

impl TagHeader {
    pub(crate) fn parse(input: &[u8]) -> Result<(&[u8], TagHeader), Error> {
        let (input, id) = be_u32(input)?;
        let (input, type_code) = be_u32(input)?;
        let (input, offset) = be_u32(input)?;
        let (rest, count) = be_u32(input)?;
        Ok((
            rest,
            TagHeader {
                id,
                type_code,
                offset,
                count,
            },
        ))
    }

    pub(crate) fn write(&self, out: &mut dyn Write) -> Result<(), Error> {
        out.write_all(&self.id.to_be_bytes())?;
        out.write_all(&self.type_code.to_be_bytes())?;
        out.write_all(&self.offset.to_be_bytes())?;
        out.write_all(&self.count.to_be_bytes())?;
        Ok(())
    }

    pub(crate) fn describe(&self, sig: bool) -> String {
        format!(
            "{}, {}, {}, {:#x}, {}",
            tag_name(self.id, sig),
            self.id,
            self.count,
            self.offset,
            type_name(self.type_code)
        )
    }
}

/// Symbolic name of a tag id, with the signature section mapping taking
/// precedence when `sig` is set. Unknown ids print as their number.
pub fn tag_name(id: u32, sig: bool) -> String {
    if sig {
        if let Some(tag) = IndexSignatureTag::from_u32(id) {
            return tag.to_string();
        }
    }
    match IndexTag::from_u32(id) {
        Some(tag) => tag.to_string(),
        None => id.to_string(),
    }
}

fn type_name(type_code: u32) -> String {
    match type_code {
        RPM_CHAR_TYPE => "char".to_string(),
        RPM_INT8_TYPE => "int8".to_string(),
        RPM_INT16_TYPE => "int16".to_string(),
        RPM_INT32_TYPE => "int32".to_string(),
        RPM_INT64_TYPE => "int64".to_string(),
        RPM_STRING_TYPE => "str".to_string(),
        RPM_BIN_TYPE => "bin".to_string(),
        RPM_STRING_ARRAY_TYPE => "[]str".to_string(),
        RPM_I18NSTRING_TYPE => "i18n".to_string(),
        other => format!("unknown({:#x})", other),
    }
}

/// Typed storage for the payload of one tag entry.
///
/// The type code to value shape mapping is strict: the three string-ish type
/// codes share [`TagValue::Str`] and the three byte-ish codes share
/// [`TagValue::Bin`], every other code has exactly one shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Bin(Vec<u8>),
    Int16(Vec<u16>),
    Int32(Vec<u32>),
    Int64(Vec<u64>),
    Str(Vec<String>),
}

impl TagValue {
    /// Exact on-wire size of the value.
    pub fn wire_len(&self) -> u32 {
        match self {
            TagValue::Bin(data) => data.len() as u32,
            TagValue::Int16(data) => data.len() as u32 * 2,
            TagValue::Int32(data) => data.len() as u32 * 4,
            TagValue::Int64(data) => data.len() as u32 * 8,
            TagValue::Str(data) => data.iter().map(|s| s.len() as u32 + 1).sum(),
        }
    }

    /// Writes the value: integers big-endian, strings as NUL terminated runs,
    /// blobs verbatim. Returns the number of bytes written.
    pub fn serialize(&self, out: &mut dyn Write) -> Result<u64, Error> {
        match self {
            TagValue::Bin(data) => out.write_all(data)?,
            TagValue::Int16(data) => {
                for v in data {
                    out.write_all(&v.to_be_bytes())?;
                }
            }
            TagValue::Int32(data) => {
                for v in data {
                    out.write_all(&v.to_be_bytes())?;
                }
            }
            TagValue::Int64(data) => {
                for v in data {
                    out.write_all(&v.to_be_bytes())?;
                }
            }
            TagValue::Str(data) => {
                for v in data {
                    out.write_all(v.as_bytes())?;
                    out.write_all(&[0])?;
                }
            }
        }
        Ok(u64::from(self.wire_len()))
    }

    /// Decodes a value of `type_code` with `count` elements from `span`, the
    /// byte range the enclosing header assigns to this tag. Anything left of
    /// the span after decoding is alignment padding for the next tag and must
    /// be shorter than 8 bytes.
    pub(crate) fn parse(span: &[u8], type_code: u32, count: u32) -> Result<TagValue, Error> {
        let dl = span.len() as u32;
        let value = match type_code {
            RPM_INT16_TYPE => {
                if count > dl >> 1 {
                    return Err(Error::TagSize);
                }
                let mut data = Vec::with_capacity(count as usize);
                let mut rest = span;
                for _ in 0..count {
                    let (r, v) = be_u16(rest)?;
                    data.push(v);
                    rest = r;
                }
                TagValue::Int16(data)
            }
            RPM_INT32_TYPE => {
                if count > dl >> 2 {
                    return Err(Error::TagSize);
                }
                let mut data = Vec::with_capacity(count as usize);
                let mut rest = span;
                for _ in 0..count {
                    let (r, v) = be_u32(rest)?;
                    data.push(v);
                    rest = r;
                }
                TagValue::Int32(data)
            }
            RPM_INT64_TYPE => {
                if count > dl >> 3 {
                    return Err(Error::TagSize);
                }
                let mut data = Vec::with_capacity(count as usize);
                let mut rest = span;
                for _ in 0..count {
                    let (r, v) = be_u64(rest)?;
                    data.push(v);
                    rest = r;
                }
                TagValue::Int64(data)
            }
            RPM_STRING_TYPE | RPM_STRING_ARRAY_TYPE | RPM_I18NSTRING_TYPE => {
                // count is the number of NUL terminated strings, this only
                // rejects counts that cannot possibly fit
                if count > dl {
                    return Err(Error::TagSize);
                }
                let mut data = Vec::with_capacity(count as usize);
                let mut rest = span;
                for _ in 0..count {
                    let (r, raw) =
                        complete::take_till::<_, _, nom::error::Error<&[u8]>>(|b| b == 0)(rest)?;
                    if r.is_empty() {
                        return Err(Error::UnexpectedEof);
                    }
                    data.push(String::from_utf8_lossy(raw).into_owned());
                    rest = &r[1..];
                }
                TagValue::Str(data)
            }
            RPM_BIN_TYPE | RPM_CHAR_TYPE | RPM_INT8_TYPE => {
                if count > dl {
                    return Err(Error::TagSize);
                }
                TagValue::Bin(span[..count as usize].to_vec())
            }
            _ => return Err(Error::TagType),
        };

        if dl - value.wire_len() >= 8 {
            return Err(Error::UnexpectedEof);
        }
        Ok(value)
    }
}

/// One typed attribute of a [`Header`](crate::Header).
#[derive(Debug, Clone)]
pub struct Tag {
    pub(crate) hdr: TagHeader,
    pub(crate) value: TagValue,
    /// Absolute stream offset of the tag data, set when read from a stream.
    pub(crate) stream_off: u64,
}

/// Where a tag was read from does not take part in equality.
impl PartialEq for Tag {
    fn eq(&self, other: &Tag) -> bool {
        self.hdr == other.hdr && self.value == other.value
    }
}

impl Eq for Tag {}

impl Tag {
    pub(crate) fn new(hdr: TagHeader, value: TagValue) -> Tag {
        Tag {
            hdr,
            value,
            stream_off: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.hdr.id
    }

    pub fn type_code(&self) -> u32 {
        self.hdr.type_code
    }

    /// Byte offset of the value inside the header data region.
    pub fn offset(&self) -> u32 {
        self.hdr.offset
    }

    pub fn count(&self) -> u32 {
        self.hdr.count
    }

    pub fn value(&self) -> &TagValue {
        &self.value
    }

    /// One line description: name, id, count, offset and type.
    pub fn describe(&self, sig: bool) -> String {
        self.hdr.describe(sig)
    }

    fn mismatch(&self) -> Error {
        Error::Tag {
            desc: self.describe(false),
            source: Box::new(Error::TagType),
        }
    }

    pub fn as_str(&self) -> Result<&str, Error> {
        match &self.value {
            TagValue::Str(data) if !data.is_empty() => Ok(&data[0]),
            _ => Err(self.mismatch()),
        }
    }

    pub fn as_string_array(&self) -> Result<&[String], Error> {
        match &self.value {
            TagValue::Str(data) => Ok(data),
            _ => Err(self.mismatch()),
        }
    }

    pub fn as_u16_array(&self) -> Result<&[u16], Error> {
        match &self.value {
            TagValue::Int16(data) => Ok(data),
            _ => Err(self.mismatch()),
        }
    }

    pub fn as_u32_array(&self) -> Result<&[u32], Error> {
        match &self.value {
            TagValue::Int32(data) => Ok(data),
            _ => Err(self.mismatch()),
        }
    }

    pub fn as_u64_array(&self) -> Result<&[u64], Error> {
        match &self.value {
            TagValue::Int64(data) => Ok(data),
            _ => Err(self.mismatch()),
        }
    }

    pub fn as_binary(&self) -> Result<&[u8], Error> {
        match &self.value {
            TagValue::Bin(data) => Ok(data),
            _ => Err(self.mismatch()),
        }
    }

    /// Writes a human readable rendition of the tag and its value, the way
    /// the dump tool prints headers. `sig` selects the signature section name
    /// mapping.
    pub fn dump(&self, out: &mut dyn Write, sig: bool) -> Result<(), Error> {
        write!(out, "{:#x}: tag: {}", self.stream_off, self.describe(sig))?;
        match self.hdr.type_code {
            RPM_INT8_TYPE => {
                let data = self.as_binary()?;
                writeln!(out, "\n  {}", hex::encode(data))?;
            }
            RPM_CHAR_TYPE => {
                let data = self.as_binary()?;
                writeln!(out, "\n  {:?}", String::from_utf8_lossy(data))?;
            }
            RPM_INT16_TYPE => {
                writeln!(out, "\n  {:x?}", self.as_u16_array()?)?;
            }
            RPM_INT32_TYPE => {
                writeln!(out, "\n  {:x?}", self.as_u32_array()?)?;
            }
            RPM_INT64_TYPE => {
                writeln!(out, "\n  {:x?}", self.as_u64_array()?)?;
            }
            RPM_BIN_TYPE => {
                writeln!(out)?;
                hex_dump(out, self.as_binary()?)?;
            }
            RPM_STRING_TYPE | RPM_I18NSTRING_TYPE => {
                writeln!(out)?;
                nl(out, 0, 0, self.as_str()?)?;
            }
            RPM_STRING_ARRAY_TYPE => {
                let data = self.as_string_array()?;
                writeln!(out)?;

                if data.len() == 1 {
                    nl(out, 0, 0, &data[0])?;
                    return Ok(());
                }

                // repeated entries collapse into a run count
                let mut last = "";
                let mut run = 0usize;
                for (i, v) in data.iter().enumerate() {
                    if last == v.as_str() && i > 0 {
                        run += 1;
                        continue;
                    }
                    if run > 0 {
                        writeln!(out, " {:+4}", run)?;
                    }
                    nl(out, i, 1, v)?;
                    last = v;
                    run = 0;
                }
                if run > 0 {
                    writeln!(out, " {:+4}", run)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Quoted string output with multi line values printed as continuations.
fn nl(out: &mut dyn Write, idx: usize, n: usize, data: &str) -> Result<(), Error> {
    match data.find('\n') {
        None => {
            if n == 0 {
                writeln!(out, "  {:?}", data)?;
            } else {
                writeln!(out, " {:4}:{:?}", idx, data)?;
            }
        }
        Some(i) => {
            writeln!(out, " {:4}:{:?}", idx, &data[..i])?;
            for v in data[i + 1..].split('\n') {
                writeln!(out, "      {:?}", v)?;
            }
        }
    }
    Ok(())
}

fn hex_dump(out: &mut dyn Write, data: &[u8]) -> io::Result<()> {
    for (i, chunk) in data.chunks(16).enumerate() {
        write!(out, "{:08x} ", i * 16)?;
        for j in 0..16 {
            if j % 8 == 0 {
                write!(out, " ")?;
            }
            match chunk.get(j) {
                Some(b) => write!(out, "{:02x} ", b)?,
                None => write!(out, "   ")?,
            }
        }
        write!(out, " |")?;
        for b in chunk {
            let c = if b.is_ascii_graphic() || *b == b' ' {
                *b as char
            } else {
                '.'
            };
            write!(out, "{}", c)?;
        }
        writeln!(out, "|")?;
    }
    Ok(())
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("Tag", 5)?;
        st.serialize_field("Tag", &self.hdr.id)?;
        st.serialize_field("Type", &self.hdr.type_code)?;
        st.serialize_field("Offset", &self.hdr.offset)?;
        st.serialize_field("Count", &self.hdr.count)?;
        match (self.hdr.type_code, &self.value) {
            (RPM_STRING_TYPE | RPM_STRING_ARRAY_TYPE | RPM_I18NSTRING_TYPE, TagValue::Str(v)) => {
                st.serialize_field("Data", v)?
            }
            (RPM_INT16_TYPE, TagValue::Int16(v)) => st.serialize_field("Data", v)?,
            (RPM_INT32_TYPE, TagValue::Int32(v)) => st.serialize_field("Data", v)?,
            (RPM_INT64_TYPE, TagValue::Int64(v)) => st.serialize_field("Data", v)?,
            (_, TagValue::Bin(v)) => st.serialize_field("Data", &BASE64_STANDARD.encode(v))?,
            _ => return Err(S::Error::custom("invalid tag type")),
        }
        st.end()
    }
}

#[derive(Deserialize)]
struct TagRepr {
    #[serde(rename = "Tag")]
    id: u32,
    #[serde(rename = "Type")]
    type_code: u32,
    #[serde(rename = "Offset")]
    offset: u32,
    #[serde(rename = "Count")]
    count: u32,
    #[serde(rename = "Data")]
    data: serde_json::Value,
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = TagRepr::deserialize(deserializer)?;
        let value = match repr.type_code {
            RPM_STRING_TYPE | RPM_STRING_ARRAY_TYPE | RPM_I18NSTRING_TYPE => TagValue::Str(
                serde_json::from_value(repr.data).map_err(D::Error::custom)?,
            ),
            RPM_INT16_TYPE => TagValue::Int16(
                serde_json::from_value(repr.data).map_err(D::Error::custom)?,
            ),
            RPM_INT32_TYPE => TagValue::Int32(
                serde_json::from_value(repr.data).map_err(D::Error::custom)?,
            ),
            RPM_INT64_TYPE => TagValue::Int64(
                serde_json::from_value(repr.data).map_err(D::Error::custom)?,
            ),
            _ => {
                let encoded: String =
                    serde_json::from_value(repr.data).map_err(D::Error::custom)?;
                TagValue::Bin(
                    BASE64_STANDARD
                        .decode(encoded.as_bytes())
                        .map_err(D::Error::custom)?,
                )
            }
        };
        Ok(Tag::new(
            TagHeader {
                id: repr.id,
                type_code: repr.type_code,
                offset: repr.offset,
                count: repr.count,
            },
            value,
        ))
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn make_value(type_code: u32) -> (TagValue, u32) {
        match type_code {
            RPM_STRING_TYPE | RPM_I18NSTRING_TYPE => (TagValue::Str(vec!["foo".to_string()]), 1),
            RPM_STRING_ARRAY_TYPE => {
                (TagValue::Str(vec!["foo".to_string(), "bar".to_string()]), 2)
            }
            RPM_INT16_TYPE => (TagValue::Int16(vec![0xdead, 0xbeef]), 2),
            RPM_INT32_TYPE => (TagValue::Int32(vec![0xdeadbeef, 0x11223344]), 2),
            RPM_INT64_TYPE => (
                TagValue::Int64(vec![0x1122334455667788, 0xdeadbeef11112222]),
                2,
            ),
            _ => (TagValue::Bin(b"foobar".to_vec()), 6),
        }
    }

    #[test]
    fn tag_json_roundtrip() {
        for type_code in [
            RPM_BIN_TYPE,
            RPM_CHAR_TYPE,
            RPM_I18NSTRING_TYPE,
            RPM_INT16_TYPE,
            RPM_INT32_TYPE,
            RPM_INT64_TYPE,
            RPM_INT8_TYPE,
            RPM_STRING_ARRAY_TYPE,
            RPM_STRING_TYPE,
        ] {
            let (value, count) = make_value(type_code);
            let tag = Tag::new(
                TagHeader {
                    id: 1,
                    type_code,
                    offset: 0,
                    count,
                },
                value,
            );

            let encoded = serde_json::to_string(&tag).expect("tag marshal");
            let decoded: Tag = serde_json::from_str(&encoded).expect("tag unmarshal");
            assert_eq!(tag, decoded);
        }
    }

    #[test]
    fn value_roundtrip() {
        for type_code in [
            RPM_BIN_TYPE,
            RPM_INT16_TYPE,
            RPM_INT32_TYPE,
            RPM_INT64_TYPE,
            RPM_STRING_ARRAY_TYPE,
        ] {
            let (value, count) = make_value(type_code);
            let mut buf = Vec::new();
            let n = value.serialize(&mut buf).expect("serialize");
            assert_eq!(n, u64::from(value.wire_len()));

            let decoded = TagValue::parse(&buf, type_code, count).expect("parse");
            assert_eq!(value, decoded);
        }
    }

    #[test]
    fn value_count_too_large() {
        let err = TagValue::parse(&[0u8; 6], RPM_INT32_TYPE, 2).unwrap_err();
        assert!(matches!(err, Error::TagSize));
    }

    #[test]
    fn value_unknown_type() {
        let err = TagValue::parse(&[0u8; 4], 0xff, 1).unwrap_err();
        assert!(matches!(err, Error::TagType));
    }

    #[test]
    fn value_missing_terminator() {
        let err = TagValue::parse(b"foo", RPM_STRING_TYPE, 1).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof));
    }
}
