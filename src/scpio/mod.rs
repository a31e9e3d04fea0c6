//! The CPIO-like streaming codec framing a package's file archive.
//!
//! Records use a non-standard 16 byte header, `"07070X"` followed by the
//! inode as 8 hex digits and 4 byte alignment padding; the stream ends with
//! a standard newc (`"070701"`) trailer record.

mod reader;
mod writer;

pub use reader::*;
pub use writer::*;

pub(crate) const NEWC_MAGIC: &[u8; 6] = b"070701";
pub(crate) const SCPIO_MAGIC: &[u8; 6] = b"07070X";

pub(crate) const TRAILER_NAME: &[u8] = b"TRAILER!!!\x00";

#[cfg(test)]
mod test {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    const CASES: [(&str, u32); 7] = [
        ("foo", 0),
        ("A", 1),
        ("", 2),
        ("bar", 0),
        ("", 3),
        ("baz", 0),
        ("C", 4),
    ];

    fn align(buf: &mut Vec<u8>) {
        let target = (buf.len() + 0x3) & !0x3;
        buf.resize(target, 0);
    }

    fn make_data() -> Vec<u8> {
        let mut buf = Vec::new();
        for (data, ino) in CASES {
            buf.extend_from_slice(SCPIO_MAGIC);
            buf.extend_from_slice(format!("{:08x}", ino).as_bytes());
            buf.extend_from_slice(&[0, 0]);
            buf.extend_from_slice(data.as_bytes());
            align(&mut buf);
        }
        buf.extend_from_slice(&writer::trailer());
        align(&mut buf);
        buf
    }

    #[test]
    fn reader_ordered_stream() {
        let data = make_data();
        let mut cursor = &data[..];
        let mut r = Reader::new(&mut cursor);
        let mut last = 0u64;
        for (i, (payload, ino)) in CASES.iter().enumerate() {
            let have = r
                .next(last)
                .unwrap_or_else(|e| panic!("read error, {i}: {e}"))
                .unwrap_or_else(|| panic!("early trailer, {i}"));
            assert_eq!(have, *ino, "ino, {i}");

            let mut buf = vec![0u8; payload.len()];
            std::io::Read::read_exact(r.get_mut(), &mut buf)
                .unwrap_or_else(|e| panic!("payload read, {i}: {e}"));
            assert_eq!(buf, payload.as_bytes(), "payload, {i}");
            last = payload.len() as u64;
        }
        assert!(r.next(last).expect("trailer read").is_none());
    }

    #[test]
    fn writer_matches_handmade_stream() {
        let want = make_data();
        let mut buf = Vec::new();
        let mut w = Writer::new(&mut buf);
        for (data, ino) in CASES {
            w.write_header(ino).expect("write header");
            w.write_all(data.as_bytes()).expect("write payload");
        }
        w.close().expect("close");
        drop(w);
        assert_eq!(hex::encode(&buf), hex::encode(&want));
    }

    #[test]
    fn reader_rejects_bad_magic() {
        let mut data = make_data();
        data[0] = b'9';
        let err = Reader::new(&data[..]).next(0).unwrap_err();
        assert!(matches!(err.root(), crate::Error::BadMagic));
    }

    #[test]
    fn reader_rejects_bad_trailer() {
        let mut data = make_data();
        // clobber the final byte of the trailer name, the stream ends with
        // three bytes of alignment padding after it
        let len = data.len();
        data[len - 4] = b'x';

        let mut cursor = &data[..];
        let mut r = Reader::new(&mut cursor);
        let mut last = 0u64;
        for (payload, _) in CASES {
            r.next(last).expect("record read");
            let mut buf = vec![0u8; payload.len()];
            std::io::Read::read_exact(r.get_mut(), &mut buf).expect("payload read");
            last = payload.len() as u64;
        }
        let err = r.next(last).unwrap_err();
        assert!(matches!(err.root(), crate::Error::InvalidTrailer));
    }
}
