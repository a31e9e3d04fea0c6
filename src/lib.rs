//! # rpmkit
//!
//! A library for reading, constructing and writing rpm package files: the
//! 96 byte lead, the tagged signature and payload headers, and the
//! CPIO-like archive framing the package's files.
//!
//! Cryptography stays out of scope: signature and digest tags are stored as
//! opaque values, and the payload is written uncompressed.
//!
//! # Example
//!
//! ```rust
//! use std::io::Write;
//!
//! use rpmkit::{
//!     write_headers, File, FileIndex, Header, IndexSignatureTag, IndexTag, Lead, LeadType,
//! };
//!
//! # fn main() -> Result<(), rpmkit::Error> {
//! // the archive body, one record per file
//! let mut archive = Vec::new();
//! let mut w = rpmkit::scpio::Writer::new(&mut archive);
//! w.write_header(0)?;
//! w.write_all(b"hello\n")?;
//! w.close()?;
//! drop(w);
//!
//! // the file columns of the payload header
//! let mut idx = FileIndex::new();
//! idx.add(&File {
//!     name: "/etc/hello".to_string(),
//!     mode: rpmkit::file_mode(0o100644)?,
//!     size: 6,
//!     ..File::default()
//! });
//!
//! let mut hdr = Header::new_payload();
//! hdr.add_string(IndexTag::RPMTAG_NAME, "hello");
//! hdr.add_string(IndexTag::RPMTAG_VERSION, "1");
//! idx.append_to(&mut hdr);
//!
//! let mut sig = Header::new_signature();
//! sig.add_string(IndexSignatureTag::RPMSIGTAG_SHA256, "0".repeat(64));
//!
//! let mut out = Vec::new();
//! write_headers(&mut out, &[&Lead::new("hello-1", LeadType::Binary), &sig, &hdr])?;
//! out.extend_from_slice(&archive);
//!
//! // and back again
//! let mut r = rpmkit::Reader::new(&out[..]);
//! r.lead()?;
//! r.next()?;
//! let parsed = r.next()?;
//! assert_eq!(parsed.tags()[0].as_str()?, "hello");
//! # Ok(())
//! # }
//! ```

mod errors;
pub use crate::errors::*;

pub(crate) mod constants;
pub use crate::constants::*;

mod rpm;
pub use crate::rpm::*;

pub mod scpio;
