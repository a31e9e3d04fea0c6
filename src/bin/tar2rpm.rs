use std::collections::HashSet;
use std::error;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tar::EntryType;

use rpmkit::{
    file_mode, scpio, write_headers, DependencyFlags, Error, File, FileIndex, Header,
    IndexSignatureTag, IndexTag, Lead, LeadType, WriteTo, PGPHASHALGO_SHA256,
};

#[derive(Parser)]
#[command(name = "tar2rpm", about = "Assemble an rpm package from a tar archive on stdin")]
struct Cli {
    /// Config file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
}

#[derive(Deserialize)]
struct Scriptlet {
    script: String,
    #[serde(default = "default_prog")]
    prog: String,
}

fn default_prog() -> String {
    "/bin/sh".to_string()
}

#[derive(Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct Config {
    name: String,
    version: String,
    release: String,
    arch: String,
    license: String,
    url: String,
    bug_url: String,
    packager: String,
    vendor: String,
    summary: String,
    description: String,
    provides: Vec<String>,
    requires: Vec<String>,
    pre_install: Option<Scriptlet>,
    post_install: Option<Scriptlet>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            name: "package".to_string(),
            version: "1".to_string(),
            release: "1".to_string(),
            arch: "noarch".to_string(),
            license: String::new(),
            url: String::new(),
            bug_url: String::new(),
            packager: String::new(),
            vendor: String::new(),
            summary: String::new(),
            description: String::new(),
            provides: Vec::new(),
            requires: Vec::new(),
            pre_install: None,
            post_install: None,
        }
    }
}

struct Sense {
    name: String,
    version: String,
    flags: DependencyFlags,
}

/// Splits a `name<op>version` dependency string into its parts.
fn sense_flags(value: &str) -> Sense {
    let i = match value.find(['<', '>', '=']) {
        Some(i) => i,
        None => {
            return Sense {
                name: value.to_string(),
                version: String::new(),
                flags: DependencyFlags::ANY,
            }
        }
    };

    let mut r = Sense {
        name: value[..i].to_string(),
        version: String::new(),
        flags: DependencyFlags::ANY,
    };
    for (j, c) in value[i..].char_indices() {
        match c {
            '<' => r.flags |= DependencyFlags::LESS,
            '>' => r.flags |= DependencyFlags::GREATER,
            '=' => r.flags |= DependencyFlags::EQUAL,
            _ => {
                r.version = value[i + j..].to_string();
                return r;
            }
        }
    }
    r
}

/// Emits name/version/flags triples for a dependency tag set, deduplicated
/// by name in first-seen order.
fn dependencies(hdr: &mut Header, entries: &[String], name: IndexTag, version: IndexTag, flags: IndexTag) {
    let mut seen = HashSet::new();
    let mut flag_vals = Vec::new();
    let mut names = Vec::new();
    let mut versions = Vec::new();
    for entry in entries {
        let s = sense_flags(entry);
        if !seen.insert(s.name.clone()) {
            continue;
        }
        flag_vals.push(s.flags.bits());
        names.push(s.name);
        versions.push(s.version);
    }
    hdr.add_int32(flags, &flag_vals);
    hdr.add_string_array(name, names);
    hdr.add_string_array(version, versions);
}

fn add(hdr: &mut Header, tag: IndexTag, value: &str) {
    if !value.is_empty() {
        hdr.add_string(tag, value);
    }
}

impl Config {
    fn append_to(&self, hdr: &mut Header) {
        add(hdr, IndexTag::RPMTAG_NAME, &self.name);
        add(hdr, IndexTag::RPMTAG_VERSION, &self.version);
        add(hdr, IndexTag::RPMTAG_RELEASE, &self.release);
        add(hdr, IndexTag::RPMTAG_ARCH, &self.arch);
        add(hdr, IndexTag::RPMTAG_LICENSE, &self.license);
        add(hdr, IndexTag::RPMTAG_URL, &self.url);
        add(hdr, IndexTag::RPMTAG_BUGURL, &self.bug_url);
        add(hdr, IndexTag::RPMTAG_PACKAGER, &self.packager);
        add(hdr, IndexTag::RPMTAG_VENDOR, &self.vendor);
        add(hdr, IndexTag::RPMTAG_SUMMARY, &self.summary);
        add(hdr, IndexTag::RPMTAG_DESCRIPTION, &self.description);

        if let Some(scriptlet) = &self.pre_install {
            hdr.add_string(IndexTag::RPMTAG_PREIN, &*scriptlet.script);
            hdr.add_string(IndexTag::RPMTAG_PREINPROG, &*scriptlet.prog);
        }
        if let Some(scriptlet) = &self.post_install {
            hdr.add_string(IndexTag::RPMTAG_POSTIN, &*scriptlet.script);
            hdr.add_string(IndexTag::RPMTAG_POSTINPROG, &*scriptlet.prog);
        }

        let mut provides = self.provides.clone();
        provides.push(format!("{}={}-{}", self.name, self.version, self.release));
        dependencies(
            hdr,
            &provides,
            IndexTag::RPMTAG_PROVIDENAME,
            IndexTag::RPMTAG_PROVIDEVERSION,
            IndexTag::RPMTAG_PROVIDEFLAGS,
        );
        if !self.requires.is_empty() {
            dependencies(
                hdr,
                &self.requires,
                IndexTag::RPMTAG_REQUIRENAME,
                IndexTag::RPMTAG_REQUIREVERSION,
                IndexTag::RPMTAG_REQUIREFLAGS,
            );
        }
    }
}

/// Writes to both sinks, failing on the first error.
struct Tee<A, B>(A, B);

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write_all(buf)?;
        self.1.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()?;
        self.1.flush()
    }
}

fn entry_path(entry: &tar::Entry<impl Read>) -> Result<String, Box<dyn error::Error>> {
    let path = entry.path()?;
    let name = path.to_string_lossy();
    let name = name.trim_start_matches("./").trim_matches('/');
    Ok(format!("/{name}"))
}

fn entry_mode(entry: &tar::Entry<impl Read>) -> Result<u16, Box<dyn error::Error>> {
    const S_IFDIR: u32 = 0o040000;
    const S_IFREG: u32 = 0o100000;
    const S_IFLNK: u32 = 0o120000;

    let fmt = match entry.header().entry_type() {
        EntryType::Regular | EntryType::Continuous | EntryType::Link => S_IFREG,
        EntryType::Directory => S_IFDIR,
        EntryType::Symlink => S_IFLNK,
        _ => return Err(Error::InvalidFileMode.into()),
    };
    Ok(file_mode(fmt | (entry.header().mode()? & 0o7777))?)
}

/// Streams every tar entry into the archive writer while collecting the
/// file index, then closes the archive with its trailer.
fn index<R: Read, W: Write>(
    input: R,
    w: &mut scpio::Writer<W>,
) -> Result<FileIndex, Box<dyn error::Error>> {
    let mut idx = FileIndex::new();
    let mut archive = tar::Archive::new(input);
    let mut ino = 0u32;

    for entry in archive.entries()? {
        let mut entry = entry?;

        let mut file = File {
            name: entry_path(&entry)?,
            mode: entry_mode(&entry)?,
            mtime: entry.header().mtime()? as u32,
            size: entry.header().size()?,
            link_to: entry
                .link_name()?
                .map(|l| l.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ..File::default()
        };

        w.write_header(ino)?;
        ino += 1;

        if entry.header().entry_type() != EntryType::Regular {
            idx.add(&file);
            continue;
        }

        let mut sum = Sha256::new();
        let n = io::copy(&mut entry, &mut Tee(&mut *w, &mut sum))?;
        if n != file.size {
            return Err(format!("entry size mismatch, want {}, have {}", file.size, n).into());
        }

        file.digest = hex::encode(sum.finalize());
        idx.add(&file);
    }

    w.close()?;
    Ok(idx)
}

fn run() -> Result<(), Box<dyn error::Error>> {
    let cli = Cli::parse();

    let mut config = Config::default();
    if let Some(path) = &cli.config {
        config = toml::from_str(&fs::read_to_string(path)?)?;
    }

    let mut hdr = Header::new_payload();
    config.append_to(&mut hdr);

    let mut data = Vec::new();
    let mut payload_sum = Sha256::new();
    let mut w = scpio::Writer::new(Tee(&mut data, &mut payload_sum));
    let idx = index(io::stdin().lock(), &mut w)?;
    drop(w);

    hdr.add_string_array(IndexTag::RPMTAG_HEADERI18NTABLE, ["C"]);
    hdr.add_string(IndexTag::RPMTAG_ENCODING, "utf-8");
    hdr.add_string(IndexTag::RPMTAG_PAYLOADFORMAT, "cpio");
    hdr.add_string(IndexTag::RPMTAG_OS, "linux");
    hdr.add_int32(IndexTag::RPMTAG_BUILDTIME, &[0]);

    hdr.add_int32(IndexTag::RPMTAG_PAYLOADDIGESTALGO, &[PGPHASHALGO_SHA256]);
    hdr.add_int32(IndexTag::RPMTAG_FILEDIGESTALGO, &[PGPHASHALGO_SHA256]);
    hdr.add_string_array(
        IndexTag::RPMTAG_PAYLOADDIGEST,
        [hex::encode(payload_sum.finalize())],
    );

    idx.append_to(&mut hdr);

    // the signature covers the serialized payload header
    let mut hdr_data = Vec::new();
    let mut hdr_sum = Sha256::new();
    hdr.write_to(&mut Tee(&mut hdr_data, &mut hdr_sum))?;

    let mut sig = Header::new_signature();
    sig.add_string(
        IndexSignatureTag::RPMSIGTAG_SHA256,
        hex::encode(hdr_sum.finalize()),
    );

    let lead = Lead::new(
        &format!("{}-{}-{}", config.name, config.version, config.release),
        LeadType::Binary,
    );

    let stdout = io::stdout();
    let mut out = io::BufWriter::with_capacity(1 << 20, stdout.lock());
    write_headers(&mut out, &[&lead, &sig, &hdr_data])?;
    out.write_all(&data)?;
    out.flush()?;
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("tar2rpm: {err}");
        process::exit(1);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dependency_sense() {
        let s = sense_flags("foo>=1.2");
        assert_eq!(s.name, "foo");
        assert_eq!(s.version, "1.2");
        assert_eq!(s.flags, DependencyFlags::GREATER | DependencyFlags::EQUAL);

        let s = sense_flags("bar");
        assert_eq!(s.name, "bar");
        assert_eq!(s.version, "");
        assert_eq!(s.flags, DependencyFlags::ANY);

        let s = sense_flags("baz<2");
        assert_eq!(s.flags, DependencyFlags::LESS);
        assert_eq!(s.version, "2");
    }

    #[test]
    fn config_defaults() {
        let config: Config = toml::from_str("name = \"pkg\"").expect("config");
        assert_eq!(config.name, "pkg");
        assert_eq!(config.version, "1");
        assert_eq!(config.arch, "noarch");
    }
}
