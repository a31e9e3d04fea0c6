use std::io::Write;

use nom::bytes::complete;
use nom::number::complete::{be_u16, be_u8};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::WriteTo;
use crate::constants::*;
use crate::errors::Error;

/// Package type recorded in the lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum LeadType {
    Binary = 0,
    Source = 1,
}

/// The 96 byte prologue identifying the file as an rpm package.
///
/// Most of its fields are fixed for compatibility; the real package metadata
/// lives in the payload header.
#[derive(Debug, Clone)]
pub struct Lead {
    magic: [u8; 4],
    major: u8,
    minor: u8,
    lead_type: u16,
    arch_num: u16,
    name: [u8; 66],
    os_num: u16,
    signature_type: u16,
    reserved: [u8; 16],
}

impl Lead {
    pub fn new(name: &str, lead_type: LeadType) -> Lead {
        // 3.0 signature header format, defined as 5 in lib/rpmlead.c
        const HEADER_SIG_TYPE: u16 = 5;

        let mut name_arr = [0; 66];
        // the last byte stays a NUL terminator
        let name_size = std::cmp::min(name_arr.len() - 1, name.len());
        name_arr[..name_size].copy_from_slice(&name.as_bytes()[..name_size]);

        Lead {
            magic: LEAD_MAGIC,
            major: 3,
            minor: 0,
            lead_type: lead_type as u16,
            arch_num: 1,
            name: name_arr,
            os_num: 1,
            signature_type: HEADER_SIG_TYPE,
            reserved: [0; 16],
        }
    }

    /// Name as written, up to the first NUL.
    pub fn name(&self) -> String {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    pub(crate) fn parse(input: &[u8]) -> Result<Lead, Error> {
        let (rest, magic) = complete::take(4usize)(input)?;
        if magic != LEAD_MAGIC {
            return Err(Error::InvalidLead);
        }
        let (rest, major) = be_u8(rest)?;
        let (rest, minor) = be_u8(rest)?;
        let (rest, lead_type) = be_u16(rest)?;
        let (rest, arch_num) = be_u16(rest)?;
        let (rest, name) = complete::take(66usize)(rest)?;
        let (rest, os_num) = be_u16(rest)?;
        let (rest, signature_type) = be_u16(rest)?;
        let (_, reserved) = complete::take(16usize)(rest)?;

        let mut name_arr = [0; 66];
        name_arr.copy_from_slice(name);
        let mut reserved_arr = [0; 16];
        reserved_arr.copy_from_slice(reserved);

        Ok(Lead {
            magic: LEAD_MAGIC,
            major,
            minor,
            lead_type,
            arch_num,
            name: name_arr,
            os_num,
            signature_type,
            reserved: reserved_arr,
        })
    }
}

impl WriteTo for Lead {
    fn write_to(&self, out: &mut dyn Write) -> Result<u64, Error> {
        out.write_all(&self.magic)?;
        out.write_all(&self.major.to_be_bytes())?;
        out.write_all(&self.minor.to_be_bytes())?;
        out.write_all(&self.lead_type.to_be_bytes())?;
        out.write_all(&self.arch_num.to_be_bytes())?;
        out.write_all(&self.name)?;
        out.write_all(&self.os_num.to_be_bytes())?;
        out.write_all(&self.signature_type.to_be_bytes())?;
        out.write_all(&self.reserved)?;
        Ok(LEAD_SIZE as u64)
    }
}

impl PartialEq for Lead {
    fn eq(&self, other: &Lead) -> bool {
        self.magic == other.magic
            && self.major == other.major
            && self.minor == other.minor
            && self.lead_type == other.lead_type
            && self.arch_num == other.arch_num
            && self.name[..] == other.name[..]
            && self.os_num == other.os_num
            && self.signature_type == other.signature_type
            && self.reserved == other.reserved
    }
}

impl Eq for Lead {}

#[derive(Serialize, Deserialize)]
struct LeadRepr {
    #[serde(rename = "Magic")]
    magic: [u8; 4],
    #[serde(rename = "Major")]
    major: u8,
    #[serde(rename = "Minor")]
    minor: u8,
    #[serde(rename = "Type")]
    lead_type: u16,
    #[serde(rename = "ArchNum")]
    arch_num: u16,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "OsNum")]
    os_num: u16,
    #[serde(rename = "SignatureType")]
    signature_type: u16,
}

impl Serialize for Lead {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        LeadRepr {
            magic: self.magic,
            major: self.major,
            minor: self.minor,
            lead_type: self.lead_type,
            arch_num: self.arch_num,
            name: self.name(),
            os_num: self.os_num,
            signature_type: self.signature_type,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Lead {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = LeadRepr::deserialize(deserializer)?;
        let mut name = [0; 66];
        let name_size = std::cmp::min(name.len() - 1, repr.name.len());
        name[..name_size].copy_from_slice(&repr.name.as_bytes()[..name_size]);
        Ok(Lead {
            magic: repr.magic,
            major: repr.major,
            minor: repr.minor,
            lead_type: repr.lead_type,
            arch_num: repr.arch_num,
            name,
            os_num: repr.os_num,
            signature_type: repr.signature_type,
            reserved: [0; 16],
        })
    }
}
