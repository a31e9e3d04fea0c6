use std::error;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;

use rpmkit::{FileIndex, Header, Reader, HEADER_SIGNATURES};

#[derive(Parser)]
#[command(name = "rpmdump", about = "Dump the lead and headers of an rpm package")]
struct Cli {
    /// Package file, stdin if not given
    path: Option<PathBuf>,

    /// JSON format
    #[arg(long)]
    json: bool,

    /// Filelist from tags
    #[arg(long)]
    files: bool,

    /// Number of headers
    #[arg(long, default_value_t = 2)]
    nhdr: u32,
}

fn dump(out: &mut dyn Write, files: bool, headers: &[Header]) -> Result<(), Box<dyn error::Error>> {
    for (i, hdr) in headers.iter().enumerate() {
        let region = hdr.region_tag();

        writeln!(
            out,
            "hdr({}), len:{:#x}, count:{}",
            i,
            hdr.data_len(),
            hdr.entry_count()
        )?;

        let mut sig = false;
        if let Some(region) = &region {
            sig = region.id() == HEADER_SIGNATURES;
            region.dump(out, sig)?;
        }

        for tag in hdr.tags() {
            tag.dump(out, sig)?;
            writeln!(out)?;
        }

        if !files {
            continue;
        }
        let idx = FileIndex::from_header(hdr)?;
        idx.dump(out)?;
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn error::Error>> {
    let cli = Cli::parse();

    let input: Box<dyn Read> = match &cli.path {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin()),
    };
    let mut r = Reader::new(BufReader::with_capacity(1 << 20, input));

    r.lead()?;
    if cli.nhdr < 1 {
        return Ok(());
    }

    let mut headers = Vec::new();
    let mut last_err = None;
    for _ in 0..cli.nhdr {
        match r.next() {
            Ok(hdr) => headers.push(hdr),
            Err(err) => {
                last_err = Some(err);
                break;
            }
        }
    }
    if headers.is_empty() {
        let err = last_err.expect("nhdr is positive");
        return Err(format!("no headers: {err}").into());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if cli.json {
        serde_json::to_writer(&mut out, &headers)?;
        writeln!(out)?;
        return Ok(());
    }

    dump(&mut out, cli.files, &headers)?;

    match last_err {
        Some(err) if !err.is_eof() => Err(err.into()),
        _ => Ok(()),
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("rpmdump: {err}");
        process::exit(1);
    }
}
