use std::io::{self, Read};

use nom::bytes::complete;
use nom::number::complete::be_u32;

use super::headers::tag::TagHeader;
use super::{Header, Lead, Tag, TagValue};
use crate::constants::*;
use crate::errors::Error;

/// Streaming package reader: one [`lead`](Reader::lead) call followed by one
/// [`next`](Reader::next) call per header.
///
/// Headers inside a package are aligned to 8 bytes, so the reader keeps a
/// running byte offset which also annotates every error it returns.
pub struct Reader<R> {
    inner: R,
    off: u64,
}

impl<R: Read> Reader<R> {
    pub fn new(inner: R) -> Reader<R> {
        Reader { inner, off: 0 }
    }

    /// Offset of the next unread byte.
    pub fn offset(&self) -> u64 {
        self.off
    }

    /// The wrapped stream. The archive body following the headers is read
    /// directly from it.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    fn err(&self, err: Error) -> Error {
        Error::AtOffset {
            offset: self.off,
            source: Box::new(err),
        }
    }

    fn tag_err(&self, tag: &TagHeader, err: Error) -> Error {
        self.err(Error::Tag {
            desc: tag.describe(false),
            source: Box::new(err),
        })
    }

    fn read_full(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        self.inner.read_exact(buf).map_err(|err| {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                Error::UnexpectedEof
            } else {
                Error::Io(err)
            }
        })
    }

    fn align(&mut self) -> Result<(), Error> {
        let target = (self.off + 0x7) & !0x7;
        let n = (target - self.off) as usize;
        if n > 0 {
            let mut pad = [0u8; 8];
            match self.read_full(&mut pad[..n]) {
                Ok(()) => {}
                Err(Error::UnexpectedEof) => return Err(self.err(Error::BadAlign)),
                Err(err) => return Err(self.err(err)),
            }
            self.off = target;
        }
        Ok(())
    }

    /// Reads the 96 byte lead. Must precede the first [`next`](Reader::next)
    /// call.
    pub fn lead(&mut self) -> Result<Lead, Error> {
        let mut buf = [0u8; LEAD_SIZE];
        self.read_full(&mut buf).map_err(|e| self.err(e))?;
        let lead = Lead::parse(&buf).map_err(|e| self.err(e))?;
        self.off += LEAD_SIZE as u64;
        Ok(lead)
    }

    fn preamble(&mut self) -> Result<(u32, u32), Error> {
        let mut buf = [0u8; TAG_SIZE as usize];
        self.read_full(&mut buf).map_err(|e| self.err(e))?;

        let input = &buf[..];
        let parsed: Result<(u32, u32), Error> = (|| {
            let (rest, magic) = complete::take(8usize)(input)?;
            if magic != HEADER_MAGIC {
                return Err(Error::InvalidHeader);
            }
            let (rest, count) = be_u32(rest)?;
            let (_, length) = be_u32(rest)?;
            Ok((count, length))
        })();
        let (count, length) = parsed.map_err(|e| self.err(e))?;
        self.off += u64::from(TAG_SIZE);
        Ok((count, length))
    }

    /// Aligns to 8 bytes and parses one header: preamble, index, data region.
    ///
    /// Tag data is checked for ordering, bounds and per-type alignment, and
    /// a trailing region tag is moved out of the tag list.
    pub fn next(&mut self) -> Result<Header, Error> {
        self.align()?;

        let (count, length) = self.preamble()?;

        let mut raw = Vec::with_capacity(std::cmp::min(count, 1024) as usize);
        for _ in 0..count {
            let mut buf = [0u8; TAG_SIZE as usize];
            self.read_full(&mut buf).map_err(|e| self.err(e))?;
            let (_, th) = TagHeader::parse(&buf).map_err(|e| self.err(e))?;
            if th.offset >= length {
                return Err(self.tag_err(&th, Error::OffsetOob));
            }
            self.off += u64::from(TAG_SIZE);
            raw.push(th);
        }

        if raw.is_empty() {
            return Ok(Header::from_parts(Vec::new(), length, None));
        }

        raw.sort_by_key(|th| th.offset);

        let mut tags = Vec::with_capacity(raw.len());
        for (i, th) in raw.iter().enumerate() {
            if !tag_aligned(th) {
                return Err(self.tag_err(th, Error::BadAlign));
            }

            let next_off = match raw.get(i + 1) {
                Some(next) => next.offset,
                None => length,
            };
            if next_off <= th.offset {
                return Err(self.tag_err(th, Error::OffsetOob));
            }

            let span = next_off - th.offset;
            let mut data = vec![0u8; span as usize];
            self.read_full(&mut data)
                .map_err(|e| self.tag_err(th, e))?;

            let value = TagValue::parse(&data, th.type_code, th.count)
                .map_err(|e| self.tag_err(th, e))?;

            let mut tag = Tag::new(*th, value);
            tag.stream_off = self.off;
            self.off += u64::from(span);
            tags.push(tag);
        }

        // a trailing region marker is the region of this header, everything
        // else keeps the full data region
        let last = &tags[tags.len() - 1];
        let (region, data_end) = match last.id() {
            HEADER_IMMUTABLE | HEADER_SIGNATURES => {
                let last = tags.pop().expect("tags is not empty");
                (Some(last.id()), last.offset())
            }
            _ => (None, length),
        };

        Ok(Header::from_parts(tags, data_end, region))
    }
}

fn tag_aligned(th: &TagHeader) -> bool {
    match th.type_code {
        RPM_INT16_TYPE => th.offset & 0x1 == 0,
        RPM_INT32_TYPE => th.offset & 0x3 == 0,
        RPM_INT64_TYPE => th.offset & 0x7 == 0,
        _ => true,
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::WriteTo;

    fn raw_header(tags: &[TagHeader], length: u32, data: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&HEADER_MAGIC);
        buf.extend_from_slice(&(tags.len() as u32).to_be_bytes());
        buf.extend_from_slice(&length.to_be_bytes());
        for th in tags {
            th.write(&mut buf).expect("tag header write");
        }
        buf.extend_from_slice(data);
        buf
    }

    #[test]
    fn offset_out_of_bounds() {
        let buf = raw_header(
            &[TagHeader {
                id: 1,
                type_code: RPM_INT32_TYPE,
                offset: 8,
                count: 1,
            }],
            8,
            &[0u8; 8],
        );
        let err = Reader::new(&buf[..]).next().unwrap_err();
        assert!(matches!(err.root(), Error::OffsetOob));
    }

    #[test]
    fn misaligned_tag() {
        let mut data = vec![0u8; 7];
        data[0] = b'a';
        let buf = raw_header(
            &[
                TagHeader {
                    id: 1,
                    type_code: RPM_BIN_TYPE,
                    offset: 0,
                    count: 3,
                },
                TagHeader {
                    id: 2,
                    type_code: RPM_INT32_TYPE,
                    offset: 3,
                    count: 1,
                },
            ],
            7,
            &data,
        );
        let err = Reader::new(&buf[..]).next().unwrap_err();
        assert!(matches!(err.root(), Error::BadAlign));
    }

    #[test]
    fn non_increasing_offsets() {
        let buf = raw_header(
            &[
                TagHeader {
                    id: 1,
                    type_code: RPM_BIN_TYPE,
                    offset: 0,
                    count: 4,
                },
                TagHeader {
                    id: 2,
                    type_code: RPM_BIN_TYPE,
                    offset: 0,
                    count: 4,
                },
            ],
            4,
            &[0u8; 4],
        );
        let err = Reader::new(&buf[..]).next().unwrap_err();
        assert!(matches!(err.root(), Error::OffsetOob));
    }

    #[test]
    fn bad_preamble_magic() {
        let mut buf = raw_header(&[], 0, &[]);
        buf[0] = 0xff;
        let err = Reader::new(&buf[..]).next().unwrap_err();
        assert!(matches!(err.root(), Error::InvalidHeader));
    }

    #[test]
    fn truncated_value() {
        let buf = raw_header(
            &[TagHeader {
                id: 1,
                type_code: RPM_BIN_TYPE,
                offset: 0,
                count: 4,
            }],
            4,
            &[0u8; 2],
        );
        let err = Reader::new(&buf[..]).next().unwrap_err();
        assert!(matches!(err.root(), Error::UnexpectedEof));
    }

    #[test]
    fn errors_carry_the_stream_offset() {
        let mut hdr = Header::new();
        hdr.add_string(1u32, "foo");
        let mut buf = Vec::new();
        hdr.write_to(&mut buf).expect("header write");
        buf.truncate(buf.len() - 1);

        let err = Reader::new(&buf[..]).next().unwrap_err();
        match err {
            Error::AtOffset { offset, .. } => assert_eq!(offset, 32),
            other => panic!("expected offset annotation, got {other}"),
        }
    }
}
