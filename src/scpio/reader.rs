use std::io::{self, Read};

use super::{NEWC_MAGIC, SCPIO_MAGIC, TRAILER_NAME};
use crate::errors::Error;

/// Streaming archive reader.
///
/// The reader is caller driven: [`next`](Reader::next) yields the inode of
/// the following record, then the caller reads that record's payload
/// directly from the underlying stream (see [`get_mut`](Reader::get_mut))
/// and passes the number of bytes it consumed to the next call.
pub struct Reader<R> {
    inner: R,
    off: u64,
}

impl<R: Read> Reader<R> {
    pub fn new(inner: R) -> Reader<R> {
        Reader { inner, off: 0 }
    }

    /// The wrapped stream, for reading record payloads.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    fn err(&self, err: Error) -> Error {
        Error::AtOffset {
            offset: self.off,
            source: Box::new(err),
        }
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
        let target = (self.off + 0x3) & !0x3;
        let n = (target - self.off) as usize;
        if n > 0 {
            let mut pad = [0u8; 4];
            self.read_full(&mut pad[..n])?;
            self.off = target;
        }
        Ok(())
    }

    fn trailer(&mut self) -> Result<(), Error> {
        // 13 newc fields of which 10 hex digits were already consumed with
        // the magic, then the trailer name
        let len = 8 * 12 + TRAILER_NAME.len() - 2;
        let mut buf = vec![0u8; len];
        self.read_full(&mut buf)?;
        if &buf[len - TRAILER_NAME.len()..] != TRAILER_NAME {
            return Err(Error::InvalidTrailer);
        }
        self.off += len as u64;
        self.align()
    }

    /// Accounts for the `prev_size` payload bytes the caller consumed,
    /// aligns to 4 bytes and reads the next record header. Returns the
    /// record's inode, or `None` once the trailer terminates the stream.
    pub fn next(&mut self, prev_size: u64) -> Result<Option<u32>, Error> {
        self.off += prev_size;
        self.align().map_err(|e| self.err(e))?;

        let mut buf = [0u8; 6 + 8 + 2];
        self.read_full(&mut buf).map_err(|e| self.err(e))?;
        self.off += buf.len() as u64;

        match &buf[..6] {
            m if m == *SCPIO_MAGIC => {}
            m if m == *NEWC_MAGIC => {
                self.trailer().map_err(|e| self.err(e))?;
                return Ok(None);
            }
            _ => return Err(self.err(Error::BadMagic)),
        }

        let mut ino = [0u8; 4];
        hex::decode_to_slice(&buf[6..14], &mut ino).map_err(|e| self.err(e.into()))?;
        Ok(Some(u32::from_be_bytes(ino)))
    }
}
