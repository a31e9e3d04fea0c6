use std::collections::HashMap;
use std::io::Write;

use chrono::{TimeZone, Utc};
use num::FromPrimitive;

use super::{Header, Tag};
use crate::constants::*;
use crate::errors::Error;

/// Directory name deduplication: every distinct directory prefix gets the
/// next sequential index in first-seen order.
#[derive(Debug, Clone, Default)]
struct PrefixMap {
    names: Vec<String>,
    map: HashMap<String, u32>,
}

impl PrefixMap {
    /// Splits `path` into its directory prefix and base name, interning the
    /// prefix. A path without a separator lives in `"/"`.
    fn index(&mut self, path: &str) -> (String, u32) {
        let (dir, base) = match path.rfind('/') {
            Some(i) => (&path[..=i], &path[i + 1..]),
            None => ("/", path),
        };
        if let Some(&i) = self.map.get(dir) {
            return (base.to_string(), i);
        }
        let i = self.names.len() as u32;
        self.map.insert(dir.to_string(), i);
        self.names.push(dir.to_string());
        (base.to_string(), i)
    }

    fn from_names(names: &[String]) -> PrefixMap {
        let mut map = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            map.entry(name.clone()).or_insert(i as u32);
        }
        PrefixMap {
            names: names.to_vec(),
            map,
        }
    }
}

/// One file record to be added to a [`FileIndex`].
#[derive(Debug, Clone, Default)]
pub struct File {
    /// Full installed path of the file.
    pub name: String,
    pub user: String,
    pub group: String,
    /// Type nibble and permission bits, see [`file_mode`].
    pub mode: u16,
    pub link_to: String,
    pub mtime: u32,
    /// Hex digest of the file contents, empty for non-regular files.
    pub digest: String,
    /// Verification bits to skip for this file, stored inverted.
    pub no_verify: u32,
    pub size: u64,
    /// `%config`/`%ghost` style classification, see [`FileFlags`].
    pub flags: u32,
}

/// Maps Unix `st_mode` type bits to the packed rpm file mode: the type
/// nibble in the upper 4 bits, permission bits below.
pub fn file_mode(mode: u32) -> Result<u16, Error> {
    const S_IFMT: u32 = 0o170000;
    const S_IFDIR: u32 = 0o040000;
    const S_IFREG: u32 = 0o100000;
    const S_IFLNK: u32 = 0o120000;

    let r = match mode & S_IFMT {
        S_IFREG => FILE_TYPE_REGULAR,
        S_IFDIR => FILE_TYPE_DIR,
        S_IFLNK => FILE_TYPE_SYMLINK,
        _ => return Err(Error::InvalidFileMode),
    };
    Ok(r << 12 | (mode & 0o7777) as u16)
}

/// Columnar projection of a file listing into the parallel tag arrays rpm
/// stores. All per-file columns share the same length; directory names are
/// kept deduplicated with a dense index column pointing into them.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    dir_names: PrefixMap,   // RPMTAG_DIRNAMES
    dir_indexes: Vec<u32>,  // RPMTAG_DIRINDEXES
    names: Vec<String>,     // RPMTAG_BASENAMES
    users: Vec<String>,     // RPMTAG_FILEUSERNAME
    groups: Vec<String>,    // RPMTAG_FILEGROUPNAME
    mtimes: Vec<u32>,       // RPMTAG_FILEMTIMES
    modes: Vec<u16>,        // RPMTAG_FILEMODES
    link_tos: Vec<String>,  // RPMTAG_FILELINKTOS
    digests: Vec<String>,   // RPMTAG_FILEDIGESTS
    flags: Vec<u32>,        // RPMTAG_FILEFLAGS
    verify: Vec<u32>,       // RPMTAG_FILEVERIFYFLAGS, inverted NoVerify
    sizes: Vec<u64>,        // RPMTAG_FILESIZES / RPMTAG_LONGFILESIZES
    total_size: u64,        // RPMTAG_SIZE / RPMTAG_LONGSIZE
}

impl FileIndex {
    pub fn new() -> FileIndex {
        FileIndex::default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn add(&mut self, file: &File) {
        let (name, di) = self.dir_names.index(&file.name);
        self.dir_indexes.push(di);
        self.names.push(name);
        self.modes.push(file.mode);
        self.mtimes.push(file.mtime);
        self.verify.push(!file.no_verify);
        self.link_tos.push(file.link_to.clone());
        self.digests.push(file.digest.clone());
        self.flags.push(file.flags);

        // empty owners trigger a "user does not exist - using root" warning
        self.users.push(def(&file.user, "", "root"));
        self.groups.push(def(&file.group, "", "root"));

        self.sizes.push(file.size);
        self.total_size += file.size;
    }

    /// Emits the file columns onto `hdr`. The 64 bit size tags are used only
    /// when some file does not fit the 32 bit pair.
    pub fn append_to(&self, hdr: &mut Header) {
        if self.names.is_empty() {
            return;
        }
        hdr.add_string_array(IndexTag::RPMTAG_DIRNAMES, self.dir_names.names.clone());
        hdr.add_string_array(IndexTag::RPMTAG_BASENAMES, self.names.clone());
        hdr.add_string_array(IndexTag::RPMTAG_FILEUSERNAME, self.users.clone());
        hdr.add_string_array(IndexTag::RPMTAG_FILEGROUPNAME, self.groups.clone());
        hdr.add_string_array(IndexTag::RPMTAG_FILELINKTOS, self.link_tos.clone());
        hdr.add_string_array(IndexTag::RPMTAG_FILEDIGESTS, self.digests.clone());
        hdr.add_int32(IndexTag::RPMTAG_DIRINDEXES, &self.dir_indexes);
        hdr.add_int32(IndexTag::RPMTAG_FILEMTIMES, &self.mtimes);
        hdr.add_int16(IndexTag::RPMTAG_FILEMODES, &self.modes);
        hdr.add_int32(IndexTag::RPMTAG_FILEFLAGS, &self.flags);
        hdr.add_int32(IndexTag::RPMTAG_FILEVERIFYFLAGS, &self.verify);

        if self.sizes.iter().any(|&s| s > u64::from(u32::MAX)) {
            hdr.add_int64(IndexTag::RPMTAG_LONGFILESIZES, &self.sizes);
            hdr.add_int64(IndexTag::RPMTAG_LONGSIZE, &[self.total_size]);
        } else {
            let sizes: Vec<u32> = self.sizes.iter().map(|&s| s as u32).collect();
            hdr.add_int32(IndexTag::RPMTAG_FILESIZES, &sizes);
            hdr.add_int32(IndexTag::RPMTAG_SIZE, &[self.total_size as u32]);
        }
    }

    /// Rebuilds an index from the file columns of a parsed header. A tag
    /// carrying the wrong value shape is an error, unknown tags are ignored.
    pub fn from_header(hdr: &Header) -> Result<FileIndex, Error> {
        let mut idx = FileIndex::new();
        for tag in hdr.tags() {
            idx.ingest(tag)?;
        }
        Ok(idx)
    }

    fn ingest(&mut self, tag: &Tag) -> Result<(), Error> {
        let id = match IndexTag::from_u32(tag.id()) {
            Some(id) => id,
            None => return Ok(()),
        };
        match id {
            IndexTag::RPMTAG_DIRNAMES => {
                self.dir_names = PrefixMap::from_names(tag.as_string_array()?);
            }
            IndexTag::RPMTAG_BASENAMES => self.names = tag.as_string_array()?.to_vec(),
            IndexTag::RPMTAG_FILEUSERNAME => self.users = tag.as_string_array()?.to_vec(),
            IndexTag::RPMTAG_FILEGROUPNAME => self.groups = tag.as_string_array()?.to_vec(),
            IndexTag::RPMTAG_FILELINKTOS => self.link_tos = tag.as_string_array()?.to_vec(),
            IndexTag::RPMTAG_FILEDIGESTS => self.digests = tag.as_string_array()?.to_vec(),
            IndexTag::RPMTAG_DIRINDEXES => self.dir_indexes = tag.as_u32_array()?.to_vec(),
            IndexTag::RPMTAG_FILEMTIMES => self.mtimes = tag.as_u32_array()?.to_vec(),
            IndexTag::RPMTAG_FILEFLAGS => self.flags = tag.as_u32_array()?.to_vec(),
            IndexTag::RPMTAG_FILEVERIFYFLAGS => self.verify = tag.as_u32_array()?.to_vec(),
            IndexTag::RPMTAG_FILEMODES => self.modes = tag.as_u16_array()?.to_vec(),
            IndexTag::RPMTAG_FILESIZES => {
                self.sizes = tag.as_u32_array()?.iter().map(|&s| u64::from(s)).collect();
            }
            IndexTag::RPMTAG_LONGFILESIZES => self.sizes = tag.as_u64_array()?.to_vec(),
            IndexTag::RPMTAG_SIZE => {
                self.total_size = tag.as_u32_array()?.first().copied().unwrap_or(0).into();
            }
            IndexTag::RPMTAG_LONGSIZE => {
                self.total_size = tag.as_u64_array()?.first().copied().unwrap_or(0);
            }
            _ => {}
        }
        Ok(())
    }

    fn size(&self, i: usize) -> u64 {
        self.sizes.get(i).copied().unwrap_or(0)
    }

    fn path(&self, i: usize) -> String {
        let dir = self
            .dir_names
            .names
            .get(self.dir_indexes[i] as usize)
            .map(String::as_str)
            .unwrap_or("");
        let link = match self.link_tos[i].as_str() {
            "" => String::new(),
            target => format!(" -> {}", target),
        };
        format!("{}{}{}", dir, self.names[i], link)
    }

    /// Writes the file listing, one line per file: verify and classification
    /// bits, digest, mode, owner, size, modification time and path.
    pub fn dump(&self, out: &mut dyn Write) -> Result<(), Error> {
        if self.names.is_empty() {
            return Ok(());
        }

        for (i, len) in [
            self.verify.len(),
            self.flags.len(),
            self.digests.len(),
            self.users.len(),
            self.groups.len(),
            self.mtimes.len(),
            self.dir_indexes.len(),
            self.link_tos.len(),
            self.modes.len(),
        ]
        .into_iter()
        .enumerate()
        {
            if len != self.names.len() {
                return Err(Error::FileIndexColumn(i));
            }
        }

        for i in 0..self.names.len() {
            writeln!(
                out,
                "{} {} {} {} {} {} {:>8} {} {}",
                bit_letters(!self.verify[i]),
                bit_letters(self.flags[i]),
                def(&self.digests[i], "", "-"),
                mode_string(self.modes[i]),
                def(&self.users[i], "root", "-"),
                def(&self.groups[i], "root", "-"),
                self.size(i),
                rfc3339(self.mtimes[i]),
                self.path(i),
            )?;
        }
        Ok(())
    }
}

fn def(a: &str, b: &str, d: &str) -> String {
    if a == b {
        d.to_string()
    } else {
        a.to_string()
    }
}

/// One letter per set bit, `-` for none and `!` for all.
fn bit_letters(mask: u32) -> String {
    const LETTERS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUV";
    if mask == 0 {
        return "-".to_string();
    }
    if mask == u32::MAX {
        return "!".to_string();
    }
    let mut r = String::new();
    for (i, &letter) in LETTERS.iter().enumerate() {
        if mask >> i & 0x1 == 1 {
            r.push(letter as char);
        }
    }
    r
}

fn mode_string(mode: u16) -> String {
    let mut r = String::with_capacity(10);
    r.push(match mode >> 12 {
        m if m == FILE_TYPE_DIR => 'd',
        m if m == FILE_TYPE_SYMLINK => 'L',
        _ => '-',
    });
    for i in (0..9).rev() {
        let set = mode >> i & 0x1 == 1;
        let c = match (i % 3, set) {
            (2, true) => 'r',
            (1, true) => 'w',
            (0, true) => 'x',
            _ => '-',
        };
        r.push(c);
    }
    r
}

fn rfc3339(mtime: u32) -> String {
    match Utc.timestamp_opt(i64::from(mtime), 0).single() {
        Some(t) => t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        None => mtime.to_string(),
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn prefix_dedup() {
        let mut pm = PrefixMap::default();
        for (add, idx, name) in [
            ("/file1", 0, "file1"),
            ("/dir1/file2", 1, "file2"),
            ("/file3", 0, "file3"),
            ("/dir2/file4", 2, "file4"),
            ("nosep", 0, "nosep"),
        ] {
            let (n, i) = pm.index(add);
            assert_eq!(i, idx, "index of {add}");
            assert_eq!(n, name, "name of {add}");
        }
        assert_eq!(pm.names, ["/", "/dir1/", "/dir2/"]);
    }

    #[test]
    fn mode_conversion() {
        assert_eq!(file_mode(0o100644).expect("regular"), 0o100644 as u16);
        assert_eq!(file_mode(0o040755).expect("dir"), 0o040755 as u16);
        assert_eq!(file_mode(0o120777).expect("symlink"), 0o120777 as u16);
        assert!(matches!(
            file_mode(0o060644),
            Err(Error::InvalidFileMode)
        ));
    }

    fn dump_string(idx: &FileIndex) -> String {
        let mut buf = Vec::new();
        idx.dump(&mut buf).expect("dump");
        String::from_utf8(buf).expect("dump is utf-8")
    }

    #[test]
    fn header_roundtrip() {
        let mut fi = FileIndex::new();
        for (i, file) in [
            File {
                name: "/dir/file1".to_string(),
                user: "foo".to_string(),
                ..File::default()
            },
            File {
                name: "/dir/file2".to_string(),
                group: "bar".to_string(),
                ..File::default()
            },
            File {
                name: "/dir".to_string(),
                ..File::default()
            },
            File {
                name: "/foo".to_string(),
                link_to: "bar".to_string(),
                ..File::default()
            },
        ]
        .into_iter()
        .enumerate()
        {
            fi.add(&File {
                size: i as u64,
                ..file
            });
        }

        let mut hdr = Header::new();
        fi.append_to(&mut hdr);

        let idx = FileIndex::from_header(&hdr).expect("ingest");
        assert_eq!(dump_string(&idx), dump_string(&fi));
    }

    #[test]
    fn size_width_selection() {
        let mut fi = FileIndex::new();
        fi.add(&File {
            name: "/small".to_string(),
            size: 1,
            ..File::default()
        });
        let mut hdr = Header::new();
        fi.append_to(&mut hdr);
        assert!(hdr
            .tags()
            .iter()
            .any(|t| t.id() == IndexTag::RPMTAG_FILESIZES as u32));

        fi.add(&File {
            name: "/large".to_string(),
            size: u64::from(u32::MAX) + 1,
            ..File::default()
        });
        let mut hdr = Header::new();
        fi.append_to(&mut hdr);
        assert!(hdr
            .tags()
            .iter()
            .any(|t| t.id() == IndexTag::RPMTAG_LONGFILESIZES as u32));
        assert!(!hdr
            .tags()
            .iter()
            .any(|t| t.id() == IndexTag::RPMTAG_FILESIZES as u32));
    }

    #[test]
    fn ingest_rejects_wrong_shape() {
        let mut hdr = Header::new();
        hdr.add_int32(IndexTag::RPMTAG_BASENAMES, &[1]);
        let err = FileIndex::from_header(&hdr).unwrap_err();
        assert!(matches!(err.root(), Error::TagType));
    }
}
