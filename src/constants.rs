//! RPM specific constants
//!
//! Tag ids and type codes as defined by the rpm upstream project C headers.

use std::fmt::Display;

use bitflags::bitflags;

/// Magic of the 96 byte lead at the start of every package file.
pub const LEAD_MAGIC: [u8; 4] = [0xed, 0xab, 0xee, 0xdb];
pub const LEAD_SIZE: usize = 96;

/// Magic of a tagged header block: 3 magic bytes, the header version (always 1)
/// and 4 reserved bytes.
pub const HEADER_MAGIC: [u8; 8] = [0x8e, 0xad, 0xe8, 0x01, 0x00, 0x00, 0x00, 0x00];

/// Size of one tag header entry, and of the header preamble.
pub(crate) const TAG_SIZE: u32 = 16;

pub const HEADER_IMAGE: u32 = 61;
pub const HEADER_SIGNATURES: u32 = 62;
pub const HEADER_IMMUTABLE: u32 = 63;
pub const HEADER_REGIONS: u32 = 64;
pub const HEADER_I18NTABLE: u32 = 100;

pub const RPM_CHAR_TYPE: u32 = 1;
pub const RPM_INT8_TYPE: u32 = 2;
pub const RPM_INT16_TYPE: u32 = 3;
pub const RPM_INT32_TYPE: u32 = 4;
pub const RPM_INT64_TYPE: u32 = 5;
pub const RPM_STRING_TYPE: u32 = 6;
pub const RPM_BIN_TYPE: u32 = 7;
pub const RPM_STRING_ARRAY_TYPE: u32 = 8;
pub const RPM_I18NSTRING_TYPE: u32 = 9;

/// File type nibble stored in the upper 4 bits of `RPMTAG_FILEMODES` entries.
pub const FILE_TYPE_DIR: u16 = 0o04;
pub const FILE_TYPE_REGULAR: u16 = 0o10;
pub const FILE_TYPE_SYMLINK: u16 = 0o12;

/// `PGPHASHALGO_SHA256`, the value of the `*DIGESTALGO` tags for SHA-256.
pub const PGPHASHALGO_SHA256: u32 = 8;

/// Tag ids of the payload header section.
#[repr(u32)]
#[derive(
    num_derive::FromPrimitive,
    num_derive::ToPrimitive,
    Debug,
    PartialEq,
    Eq,
    Copy,
    Clone,
    enum_display_derive::Display,
)]
#[allow(non_camel_case_types)]
pub enum IndexTag {
    RPMTAG_HEADERIMAGE = HEADER_IMAGE,
    RPMTAG_HEADERSIGNATURES = HEADER_SIGNATURES,
    RPMTAG_HEADERIMMUTABLE = HEADER_IMMUTABLE,
    RPMTAG_HEADERREGIONS = HEADER_REGIONS,
    RPMTAG_HEADERI18NTABLE = HEADER_I18NTABLE,

    RPMTAG_NAME = 1000,
    RPMTAG_VERSION = 1001,
    RPMTAG_RELEASE = 1002,
    RPMTAG_EPOCH = 1003,
    RPMTAG_SUMMARY = 1004,
    RPMTAG_DESCRIPTION = 1005,
    RPMTAG_BUILDTIME = 1006,
    RPMTAG_BUILDHOST = 1007,
    RPMTAG_INSTALLTIME = 1008,
    RPMTAG_SIZE = 1009,
    RPMTAG_DISTRIBUTION = 1010,
    RPMTAG_VENDOR = 1011,
    RPMTAG_LICENSE = 1014,
    RPMTAG_PACKAGER = 1015,
    RPMTAG_GROUP = 1016,
    RPMTAG_URL = 1020,
    RPMTAG_OS = 1021,
    RPMTAG_ARCH = 1022,
    RPMTAG_PREIN = 1023,
    RPMTAG_POSTIN = 1024,
    RPMTAG_PREUN = 1025,
    RPMTAG_POSTUN = 1026,
    RPMTAG_OLDFILENAMES = 1027,
    RPMTAG_FILESIZES = 1028,
    RPMTAG_FILESTATES = 1029,
    RPMTAG_FILEMODES = 1030,
    RPMTAG_FILERDEVS = 1033,
    RPMTAG_FILEMTIMES = 1034,
    RPMTAG_FILEDIGESTS = 1035,
    RPMTAG_FILELINKTOS = 1036,
    RPMTAG_FILEFLAGS = 1037,
    RPMTAG_FILEUSERNAME = 1039,
    RPMTAG_FILEGROUPNAME = 1040,
    RPMTAG_SOURCERPM = 1044,
    RPMTAG_FILEVERIFYFLAGS = 1045,
    RPMTAG_ARCHIVESIZE = 1046,
    RPMTAG_PROVIDENAME = 1047,
    RPMTAG_REQUIREFLAGS = 1048,
    RPMTAG_REQUIRENAME = 1049,
    RPMTAG_REQUIREVERSION = 1050,
    RPMTAG_CONFLICTFLAGS = 1053,
    RPMTAG_CONFLICTNAME = 1054,
    RPMTAG_CONFLICTVERSION = 1055,
    RPMTAG_EXCLUDEARCH = 1059,
    RPMTAG_EXCLUDEOS = 1060,
    RPMTAG_EXCLUSIVEARCH = 1061,
    RPMTAG_EXCLUSIVEOS = 1062,
    RPMTAG_RPMVERSION = 1064,
    RPMTAG_TRIGGERSCRIPTS = 1065,
    RPMTAG_TRIGGERNAME = 1066,
    RPMTAG_TRIGGERVERSION = 1067,
    RPMTAG_TRIGGERFLAGS = 1068,
    RPMTAG_TRIGGERINDEX = 1069,
    RPMTAG_VERIFYSCRIPT = 1079,
    RPMTAG_CHANGELOGTIME = 1080,
    RPMTAG_CHANGELOGNAME = 1081,
    RPMTAG_CHANGELOGTEXT = 1082,
    RPMTAG_PREINPROG = 1085,
    RPMTAG_POSTINPROG = 1086,
    RPMTAG_PREUNPROG = 1087,
    RPMTAG_POSTUNPROG = 1088,
    RPMTAG_BUILDARCHS = 1089,
    RPMTAG_OBSOLETENAME = 1090,
    RPMTAG_VERIFYSCRIPTPROG = 1091,
    RPMTAG_TRIGGERSCRIPTPROG = 1092,
    RPMTAG_COOKIE = 1094,
    RPMTAG_FILEDEVICES = 1095,
    RPMTAG_FILEINODES = 1096,
    RPMTAG_FILELANGS = 1097,
    RPMTAG_PREFIXES = 1098,
    RPMTAG_INSTPREFIXES = 1099,
    RPMTAG_SOURCEPACKAGE = 1106,
    RPMTAG_PROVIDEFLAGS = 1112,
    RPMTAG_PROVIDEVERSION = 1113,
    RPMTAG_OBSOLETEFLAGS = 1114,
    RPMTAG_OBSOLETEVERSION = 1115,
    RPMTAG_DIRINDEXES = 1116,
    RPMTAG_BASENAMES = 1117,
    RPMTAG_DIRNAMES = 1118,
    RPMTAG_OPTFLAGS = 1122,
    RPMTAG_DISTURL = 1123,
    RPMTAG_PAYLOADFORMAT = 1124,
    RPMTAG_PAYLOADCOMPRESSOR = 1125,
    RPMTAG_PAYLOADFLAGS = 1126,
    RPMTAG_PLATFORM = 1132,
    RPMTAG_FILECOLORS = 1140,
    RPMTAG_FILECLASS = 1141,
    RPMTAG_CLASSDICT = 1142,
    RPMTAG_FILEDEPENDSX = 1143,
    RPMTAG_FILEDEPENDSN = 1144,
    RPMTAG_DEPENDSDICT = 1145,
    RPMTAG_SOURCEPKGID = 1146,
    RPMTAG_PRETRANS = 1151,
    RPMTAG_POSTTRANS = 1152,
    RPMTAG_PRETRANSPROG = 1153,
    RPMTAG_POSTTRANSPROG = 1154,
    RPMTAG_DISTTAG = 1155,

    RPMTAG_LONGFILESIZES = 5008,
    RPMTAG_LONGSIZE = 5009,
    RPMTAG_FILECAPS = 5010,
    RPMTAG_FILEDIGESTALGO = 5011,
    RPMTAG_BUGURL = 5012,
    RPMTAG_ENCODING = 5062,
    RPMTAG_PAYLOADDIGEST = 5092,
    RPMTAG_PAYLOADDIGESTALGO = 5093,
    RPMTAG_MODULARITYLABEL = 5096,
}

impl From<IndexTag> for u32 {
    fn from(tag: IndexTag) -> u32 {
        tag as u32
    }
}

/// Tag ids of the signature header section.
///
/// These numerically overlap the payload section ids, so tags of a signature
/// header must be named through this mapping and not [`IndexTag`].
#[repr(u32)]
#[derive(
    num_derive::FromPrimitive,
    num_derive::ToPrimitive,
    Debug,
    PartialEq,
    Eq,
    Copy,
    Clone,
    enum_display_derive::Display,
)]
#[allow(non_camel_case_types)]
pub enum IndexSignatureTag {
    HEADER_SIGNATURES = HEADER_SIGNATURES,

    RPMSIGTAG_BADSHA1_1 = 264,
    RPMSIGTAG_BADSHA1_2 = 265,
    RPMSIGTAG_DSA = 267,
    RPMSIGTAG_RSA = 268,
    RPMSIGTAG_SHA1 = 269,
    RPMSIGTAG_LONGSIGSIZE = 270,
    RPMSIGTAG_LONGARCHIVESIZE = 271,
    RPMSIGTAG_SHA256 = 273,

    RPMSIGTAG_SIZE = 1000,
    RPMSIGTAG_LEMD5_1 = 1001,
    RPMSIGTAG_PGP = 1002,
    RPMSIGTAG_LEMD5_2 = 1003,
    RPMSIGTAG_MD5 = 1004,
    RPMSIGTAG_GPG = 1005,
    RPMSIGTAG_PGP5 = 1006,
    RPMSIGTAG_PAYLOADSIZE = 1007,
}

impl From<IndexSignatureTag> for u32 {
    fn from(tag: IndexSignatureTag) -> u32 {
        tag as u32
    }
}

bitflags! {
    /// Sense flags of a provides/requires/conflicts dependency entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DependencyFlags: u32 {
        const ANY = 0;
        const LESS = 1 << 1;
        const GREATER = 1 << 2;
        const EQUAL = 1 << 3;
    }
}

bitflags! {
    /// Per file classification flags stored in `RPMTAG_FILEFLAGS`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileFlags: u32 {
        const CONFIG = 1;
        const DOC = 1 << 1;
        const ICON = 1 << 2;
        const MISSINGOK = 1 << 3;
        const NOREPLACE = 1 << 4;
        const SPECFILE = 1 << 5;
        const GHOST = 1 << 6;
        const LICENSE = 1 << 7;
        const README = 1 << 8;
    }
}
