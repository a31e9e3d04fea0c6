use std::io::Write;

use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::tag::TagHeader;
use super::{Tag, TagValue};
use crate::constants::*;
use crate::errors::Error;

const ZERO_PAD: [u8; 8] = [0; 8];

/// On-wire serialization of one part of a package file.
///
/// Returns the number of bytes written. Implemented by [`Lead`](crate::Lead),
/// [`Header`] and plain byte buffers, which lets pre-serialized parts be
/// framed by [`write_headers`].
pub trait WriteTo {
    fn write_to(&self, out: &mut dyn Write) -> Result<u64, Error>;
}

impl WriteTo for [u8] {
    fn write_to(&self, out: &mut dyn Write) -> Result<u64, Error> {
        out.write_all(self)?;
        Ok(self.len() as u64)
    }
}

impl WriteTo for Vec<u8> {
    fn write_to(&self, out: &mut dyn Write) -> Result<u64, Error> {
        self.as_slice().write_to(out)
    }
}

/// Writes each part in order, aligning the output cursor to 8 bytes with
/// zero padding before each one. The payload archive is appended after the
/// last header by the caller, without further alignment.
pub fn write_headers(out: &mut dyn Write, parts: &[&dyn WriteTo]) -> Result<u64, Error> {
    let mut written: u64 = 0;
    for part in parts {
        let aligned = (written + 0x7) & !0x7;
        out.write_all(&ZERO_PAD[..(aligned - written) as usize])?;
        written = aligned;
        written += part.write_to(out)?;
    }
    Ok(written)
}

/// Ordered collection of tag entries with a running data region cursor.
///
/// Tags keep their insertion order; the on-disk layout is produced in offset
/// order at serialization time. A header may carry a *region* tag whose
/// 16 byte value is a backward reference to its own index, emitted first in
/// the index and last in the data region.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    tags: Vec<Tag>,
    /// Next free offset in the data region, only ever advanced by the add
    /// methods.
    data_end: u32,
    region: Option<u32>,
}

impl Header {
    pub fn new() -> Header {
        Header::default()
    }

    /// A header marked as the signature section.
    pub fn new_signature() -> Header {
        let mut hdr = Header::new();
        hdr.set_region(HEADER_SIGNATURES);
        hdr
    }

    /// A header marked as the payload metadata section.
    pub fn new_payload() -> Header {
        let mut hdr = Header::new();
        hdr.set_region(HEADER_IMMUTABLE);
        hdr
    }

    pub(crate) fn from_parts(tags: Vec<Tag>, data_end: u32, region: Option<u32>) -> Header {
        Header {
            tags,
            data_end,
            region,
        }
    }

    /// Number of tags, not counting the region.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Declared size of the data region as it would appear in the preamble.
    pub fn data_len(&self) -> u32 {
        match self.region {
            Some(_) => self.data_end + TAG_SIZE,
            None => self.data_end,
        }
    }

    /// Number of index entries as it would appear in the preamble.
    pub fn entry_count(&self) -> u32 {
        self.tags.len() as u32 + u32::from(self.region.is_some())
    }

    /// Marks this header as a region header. `id` is one of
    /// [`HEADER_SIGNATURES`] or [`HEADER_IMMUTABLE`].
    pub fn set_region(&mut self, id: impl Into<u32>) {
        self.region = Some(id.into());
    }

    /// The materialized region tag: type BIN, count 16, placed at the current
    /// end of the data region, holding a synthetic tag header that points
    /// back at the index.
    pub fn region_tag(&self) -> Option<Tag> {
        let id = self.region?;
        let back = TagHeader {
            id,
            type_code: RPM_BIN_TYPE,
            offset: (-((self.tags.len() as i32 + 1) * TAG_SIZE as i32)) as u32,
            count: TAG_SIZE,
        };
        let mut data = Vec::with_capacity(TAG_SIZE as usize);
        back.write(&mut data).ok()?;
        Some(Tag::new(
            TagHeader {
                id,
                type_code: RPM_BIN_TYPE,
                offset: self.data_end,
                count: TAG_SIZE,
            },
            TagValue::Bin(data),
        ))
    }

    fn align(&mut self, n: u32) {
        self.data_end = (self.data_end + n) & !n;
    }

    fn push(&mut self, id: u32, type_code: u32, count: u32, value: TagValue) {
        match type_code {
            RPM_INT16_TYPE => self.align(0x1),
            RPM_INT32_TYPE => self.align(0x3),
            RPM_INT64_TYPE => self.align(0x7),
            _ => {}
        }
        let offset = self.data_end;
        self.data_end += value.wire_len();
        self.tags.push(Tag::new(
            TagHeader {
                id,
                type_code,
                offset,
                count,
            },
            value,
        ));
    }

    pub fn add_string(&mut self, id: impl Into<u32>, data: impl Into<String>) {
        self.push(
            id.into(),
            RPM_STRING_TYPE,
            1,
            TagValue::Str(vec![data.into()]),
        );
    }

    pub fn add_string_i18n(&mut self, id: impl Into<u32>, data: impl Into<String>) {
        self.push(
            id.into(),
            RPM_I18NSTRING_TYPE,
            1,
            TagValue::Str(vec![data.into()]),
        );
    }

    pub fn add_string_array<I, S>(&mut self, id: impl Into<u32>, data: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let data: Vec<String> = data.into_iter().map(Into::into).collect();
        self.push(
            id.into(),
            RPM_STRING_ARRAY_TYPE,
            data.len() as u32,
            TagValue::Str(data),
        );
    }

    pub fn add_int16(&mut self, id: impl Into<u32>, data: &[u16]) {
        self.push(
            id.into(),
            RPM_INT16_TYPE,
            data.len() as u32,
            TagValue::Int16(data.to_vec()),
        );
    }

    pub fn add_int32(&mut self, id: impl Into<u32>, data: &[u32]) {
        self.push(
            id.into(),
            RPM_INT32_TYPE,
            data.len() as u32,
            TagValue::Int32(data.to_vec()),
        );
    }

    pub fn add_int64(&mut self, id: impl Into<u32>, data: &[u64]) {
        self.push(
            id.into(),
            RPM_INT64_TYPE,
            data.len() as u32,
            TagValue::Int64(data.to_vec()),
        );
    }

    pub fn add_bin(&mut self, id: impl Into<u32>, data: impl Into<Vec<u8>>) {
        let data = data.into();
        self.push(
            id.into(),
            RPM_BIN_TYPE,
            data.len() as u32,
            TagValue::Bin(data),
        );
    }

    fn pad(out: &mut dyn Write, offset: u64, cur: u64) -> Result<u64, Error> {
        if offset < cur {
            return Err(Error::InvalidOffset);
        }
        let n = offset - cur;
        if n > ZERO_PAD.len() as u64 {
            return Err(Error::InvalidOffset);
        }
        out.write_all(&ZERO_PAD[..n as usize])?;
        Ok(n)
    }
}

impl WriteTo for Header {
    fn write_to(&self, out: &mut dyn Write) -> Result<u64, Error> {
        if self.tags.is_empty() {
            return Err(Error::NoTags);
        }

        let count = self.entry_count();
        let length = self.data_len();
        let region = self.region_tag();

        out.write_all(&HEADER_MAGIC)?;
        out.write_all(&count.to_be_bytes())?;
        out.write_all(&length.to_be_bytes())?;

        // the region entry leads the index while its data trails the region
        if let Some(region) = &region {
            region.hdr.write(out)?;
        }

        let mut sorted: Vec<&Tag> = self.tags.iter().collect();
        sorted.sort_by_key(|t| t.offset());

        for tag in &sorted {
            tag.hdr.write(out)?;
        }

        let mut cur: u64 = 0;
        for tag in &sorted {
            cur += Self::pad(out, u64::from(tag.offset()), cur)?;
            cur += tag.value.serialize(out)?;
        }
        if let Some(region) = &region {
            cur += region.value.serialize(out)?;
        }

        if cur != u64::from(length) {
            return Err(Error::DataLen);
        }
        Ok(u64::from(TAG_SIZE) + u64::from(count) * u64::from(TAG_SIZE) + u64::from(length))
    }
}

impl Serialize for Header {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let region = self.region_tag();
        let len = self.tags.len() + usize::from(region.is_some());
        let mut seq = serializer.serialize_seq(Some(len))?;
        if let Some(region) = &region {
            seq.serialize_element(region)?;
        }
        for tag in &self.tags {
            seq.serialize_element(tag)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Header {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut tags = Vec::<Tag>::deserialize(deserializer)?;
        if tags.is_empty() {
            return Ok(Header::new());
        }

        // the region tag is the last tag in offset order
        tags.sort_by_key(|t| t.offset());

        let last = &tags[tags.len() - 1];
        let (region, data_end) = match last.id() {
            HEADER_IMMUTABLE | HEADER_SIGNATURES => {
                let last = tags.pop().expect("tags is not empty");
                (Some(last.id()), last.offset())
            }
            _ => (None, last.offset() + last.value().wire_len()),
        };
        Ok(Header::from_parts(tags, data_end, region))
    }
}
