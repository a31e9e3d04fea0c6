use std::io::{self, Write};

use super::{NEWC_MAGIC, SCPIO_MAGIC, TRAILER_NAME};
use crate::errors::Error;

const ZERO_PAD: [u8; 4] = [0; 4];

fn header(magic: &[u8; 6], fields: &[u32]) -> Vec<u8> {
    let mut r = Vec::with_capacity(magic.len() + fields.len() * 8);
    r.extend_from_slice(magic);
    for field in fields {
        r.extend_from_slice(hex::encode(field.to_be_bytes()).as_bytes());
    }
    r
}

pub(crate) fn trailer() -> Vec<u8> {
    let mut r = header(NEWC_MAGIC, &[0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 11, 0]);
    r.extend_from_slice(TRAILER_NAME);
    r
}

/// Streaming archive writer.
///
/// Record headers are written with [`write_header`](Writer::write_header);
/// the record payload is whatever the caller writes through the
/// [`io::Write`] impl in between. [`close`](Writer::close) terminates the
/// stream with the trailer record.
pub struct Writer<W> {
    inner: W,
    off: u64,
}

impl<W: Write> Writer<W> {
    pub fn new(inner: W) -> Writer<W> {
        Writer { inner, off: 0 }
    }

    /// Bytes written since construction.
    pub fn offset(&self) -> u64 {
        self.off
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn put(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.write_all(buf).map_err(|err| {
            if err.kind() == io::ErrorKind::WriteZero {
                Error::ShortWrite
            } else {
                Error::Io(err)
            }
        })
    }

    fn align(&mut self) -> Result<(), Error> {
        let target = (self.off + 0x3) & !0x3;
        let n = (target - self.off) as usize;
        self.put(&ZERO_PAD[..n])
    }

    /// Aligns to 4 bytes and writes a record header for `ino`. The header
    /// itself is padded out to 16 bytes, so the payload starts aligned too.
    pub fn write_header(&mut self, ino: u32) -> Result<(), Error> {
        self.align()?;
        self.put(&header(SCPIO_MAGIC, &[ino]))?;
        self.align()
    }

    /// Terminates the stream with the trailer record.
    pub fn close(&mut self) -> Result<(), Error> {
        self.align()?;
        self.put(&trailer())?;
        self.align()
    }
}

impl<W: Write> Write for Writer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.off += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
