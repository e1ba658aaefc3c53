//! pdfdump - Inspect the object structure of a PDF file
//!
//! A command line tool for dumping indirect objects, trailers and
//! cross-reference tables without decoding page content.

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use memmap2::Mmap;
use serde_json::{Value, json};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vellum_core::utils::{decode_text, hexdump};
use vellum_core::{
    Dictionary, Document, LoadOptions, Object, PdfString, Reference, XrefEntry,
};

/// A command line tool for inspecting PDF object structure.
#[derive(Parser, Debug)]
#[command(name = "pdfdump")]
#[command(author, version, about = "Inspect PDF object structure", long_about = None)]
struct Args {
    /// Path to a PDF file
    file: PathBuf,

    /// Dump a single indirect object
    #[arg(short = 'i', long = "object", value_name = "NUM[:GEN]")]
    object: Option<String>,

    /// Dump every trailer dictionary, newest first
    #[arg(short = 't', long = "trailer", action = ArgAction::SetTrue)]
    trailer: bool,

    /// Dump the merged cross-reference table
    #[arg(short = 'x', long = "xref", action = ArgAction::SetTrue)]
    xref: bool,

    /// Hexdump the raw (still encoded) stream payload of the object
    #[arg(long = "raw", action = ArgAction::SetTrue, requires = "object")]
    raw: bool,

    /// Hexdump the decoded stream payload of the object
    #[arg(long = "decode", action = ArgAction::SetTrue, requires = "object", conflicts_with = "raw")]
    decode: bool,

    /// Emit JSON instead of plain text
    #[arg(long = "json", action = ArgAction::SetTrue)]
    json: bool,

    /// Skip the cross-reference table and rebuild it by scanning
    #[arg(long = "scan", action = ArgAction::SetTrue)]
    scan: bool,

    /// Path to file where output is written, or "-" for stdout
    #[arg(short = 'o', long, default_value = "-")]
    outfile: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let file = File::open(&args.file)
        .with_context(|| format!("opening {}", args.file.display()))?;
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("mapping {}", args.file.display()))?;

    let options = LoadOptions {
        force_scan: args.scan,
        ..LoadOptions::default()
    };
    let doc = Document::from_mmap_with(mmap, options)
        .with_context(|| format!("loading {}", args.file.display()))?;

    let mut out: Box<dyn Write> = if args.outfile == "-" {
        Box::new(BufWriter::new(io::stdout()))
    } else {
        let file = File::create(&args.outfile)
            .with_context(|| format!("creating {}", args.outfile))?;
        Box::new(BufWriter::new(file))
    };

    if let Some(ref spec) = args.object {
        let reference = parse_object_spec(spec)?;
        dump_object(&mut out, &doc, reference, args.raw, args.decode, args.json)?;
    } else if args.trailer {
        dump_trailers(&mut out, &doc, args.json)?;
    } else if args.xref {
        dump_xref(&mut out, &doc, args.json)?;
    } else {
        dump_summary(&mut out, &doc, args.json)?;
    }

    out.flush()?;
    doc.shutdown();
    Ok(())
}

/// Parse an object spec of the form `NUM` or `NUM:GEN`.
fn parse_object_spec(spec: &str) -> Result<Reference> {
    let (num, r#gen) = spec.split_once(':').unwrap_or((spec, "0"));
    let num: u32 = num
        .trim()
        .parse()
        .with_context(|| format!("bad object number in {spec:?}"))?;
    let r#gen: u16 = r#gen
        .trim()
        .parse()
        .with_context(|| format!("bad generation number in {spec:?}"))?;
    Ok(Reference::new(num, r#gen))
}

fn dump_object<W: Write>(
    out: &mut W,
    doc: &Document,
    reference: Reference,
    raw: bool,
    decode: bool,
    json: bool,
) -> Result<()> {
    let object = doc.get(reference);
    if object.is_null() && !doc.xref().contains(reference.num) {
        bail!("object {reference} not found");
    }

    if raw || decode {
        let stream = object.as_stream()?;
        let data = if raw {
            doc.library().raw_stream_bytes(stream)?
        } else {
            doc.library().decoded_stream(reference, stream)?
        };
        out.write_all(hexdump(&data).as_bytes())?;
        return Ok(());
    }

    if json {
        serde_json::to_writer_pretty(&mut *out, &object_to_json(&object))?;
        writeln!(out)?;
    } else {
        writeln!(out, "{} {} obj", reference.num, reference.r#gen)?;
        format_object(out, &object, 0)?;
        writeln!(out)?;
    }
    Ok(())
}

fn dump_trailers<W: Write>(out: &mut W, doc: &Document, json: bool) -> Result<()> {
    if json {
        let trailers: Vec<Value> = doc
            .trailers()
            .iter()
            .map(|t| {
                json!({
                    "offset": t.offset,
                    "dict": object_to_json(&Object::Dict(t.dict.clone())),
                })
            })
            .collect();
        serde_json::to_writer_pretty(&mut *out, &Value::Array(trailers))?;
        writeln!(out)?;
        return Ok(());
    }

    for trailer in doc.trailers() {
        writeln!(out, "trailer @ {}", trailer.offset)?;
        format_dict(out, &trailer.dict, 0)?;
        writeln!(out)?;
        writeln!(out)?;
    }
    Ok(())
}

fn dump_xref<W: Write>(out: &mut W, doc: &Document, json: bool) -> Result<()> {
    let nums = doc.live_objects();

    if json {
        let entries: Vec<Value> = nums
            .iter()
            .filter_map(|&num| {
                let entry = doc.xref().entry(num)?;
                Some(match entry {
                    XrefEntry::Used { offset, r#gen } => {
                        json!({"num": num, "type": "used", "offset": offset, "gen": r#gen})
                    }
                    XrefEntry::Compressed { container, index } => {
                        json!({"num": num, "type": "compressed", "container": container, "index": index})
                    }
                })
            })
            .collect();
        serde_json::to_writer_pretty(&mut *out, &Value::Array(entries))?;
        writeln!(out)?;
        return Ok(());
    }

    for num in nums {
        match doc.xref().entry(num) {
            Some(XrefEntry::Used { offset, r#gen }) => {
                writeln!(out, "{num:>8} used offset={offset} gen={gen}")?;
            }
            Some(XrefEntry::Compressed { container, index }) => {
                writeln!(out, "{num:>8} compressed container={container} index={index}")?;
            }
            None => {}
        }
    }
    Ok(())
}

fn dump_summary<W: Write>(out: &mut W, doc: &Document, json: bool) -> Result<()> {
    let version = doc.version().map(|(major, minor)| format!("{major}.{minor}"));
    let info = doc.info();

    if json {
        let info_json = info.as_ref().map(|dict| {
            let entries: serde_json::Map<String, Value> = dict
                .iter()
                .filter_map(|(key, value)| {
                    let text = info_value_text(doc, value)?;
                    Some((key.as_str().to_owned(), Value::String(text)))
                })
                .collect();
            Value::Object(entries)
        });
        let summary = json!({
            "version": version,
            "objects": doc.live_objects().len(),
            "xref_sections": doc.xref().section_count(),
            "trailers": doc.trailers().len(),
            "encrypted": doc.is_encrypted(),
            "recovered": doc.recovered(),
            "root": doc.catalog_ref().to_string(),
            "info": info_json,
        });
        serde_json::to_writer_pretty(&mut *out, &summary)?;
        writeln!(out)?;
        return Ok(());
    }

    match version {
        Some(v) => writeln!(out, "version: {v}")?,
        None => writeln!(out, "version: (no header)")?,
    }
    writeln!(out, "objects: {}", doc.live_objects().len())?;
    writeln!(out, "xref sections: {}", doc.xref().section_count())?;
    writeln!(out, "trailers: {}", doc.trailers().len())?;
    writeln!(out, "encrypted: {}", doc.is_encrypted())?;
    writeln!(out, "recovered: {}", doc.recovered())?;
    writeln!(out, "root: {}", doc.catalog_ref())?;
    if let Some(dict) = info {
        for (key, value) in dict.iter() {
            if let Some(text) = info_value_text(doc, value) {
                writeln!(out, "info.{}: {}", key.as_str(), text)?;
            }
        }
    }
    Ok(())
}

/// Render an /Info entry as display text, if it has a textual value.
fn info_value_text(doc: &Document, value: &Object) -> Option<String> {
    match doc.library().resolve(value) {
        Object::String(ref s) => Some(decode_text(&doc.library().decrypt_string(s))),
        Object::Name(n) => Some(n.as_str().to_owned()),
        Object::Integer(n) => Some(n.to_string()),
        Object::Real(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Write an object in PDF-like text notation.
fn format_object<W: Write>(out: &mut W, object: &Object, indent: usize) -> io::Result<()> {
    match object {
        Object::Null => write!(out, "null"),
        Object::Bool(b) => write!(out, "{b}"),
        Object::Integer(n) => write!(out, "{n}"),
        Object::Real(n) => write!(out, "{n}"),
        Object::Name(n) => write!(out, "/{}", n.as_str()),
        Object::String(s) => format_string(out, s),
        Object::Array(items) => {
            write!(out, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(out, " ")?;
                }
                format_object(out, item, indent)?;
            }
            write!(out, "]")
        }
        Object::Dict(dict) => format_dict(out, dict, indent),
        Object::Stream(stream) => {
            format_dict(out, &stream.dict, indent)?;
            writeln!(out)?;
            write!(out, "{}stream ({} bytes)", "  ".repeat(indent), stream.raw_len())
        }
        Object::Reference(r) => write!(out, "{r}"),
    }
}

fn format_dict<W: Write>(out: &mut W, dict: &Dictionary, indent: usize) -> io::Result<()> {
    writeln!(out, "<<")?;
    for (key, value) in dict.iter() {
        write!(out, "{}/{} ", "  ".repeat(indent + 1), key.as_str())?;
        format_object(out, value, indent + 1)?;
        writeln!(out)?;
    }
    write!(out, "{}>>", "  ".repeat(indent))
}

/// Literal notation when every byte is printable, hex notation otherwise.
fn format_string<W: Write>(out: &mut W, s: &PdfString) -> io::Result<()> {
    let printable = s.data.iter().all(|&b| (0x20..0x7f).contains(&b));
    if printable {
        write!(out, "(")?;
        for &b in &s.data {
            match b {
                b'(' | b')' | b'\\' => write!(out, "\\{}", b as char)?,
                _ => write!(out, "{}", b as char)?,
            }
        }
        write!(out, ")")
    } else {
        write!(out, "<")?;
        for &b in &s.data {
            write!(out, "{b:02x}")?;
        }
        write!(out, ">")
    }
}

/// Convert an object to a JSON value. Binary strings come out as lossy
/// UTF-8; streams keep their dictionary and raw length only.
fn object_to_json(object: &Object) -> Value {
    match object {
        Object::Null => Value::Null,
        Object::Bool(b) => json!(b),
        Object::Integer(n) => json!(n),
        Object::Real(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
        Object::Name(n) => json!(format!("/{}", n.as_str())),
        Object::String(s) => json!(String::from_utf8_lossy(&s.data)),
        Object::Array(items) => Value::Array(items.iter().map(object_to_json).collect()),
        Object::Dict(dict) => dict_to_json(dict),
        Object::Stream(stream) => {
            json!({
                "dict": dict_to_json(&stream.dict),
                "length": stream.raw_len(),
            })
        }
        Object::Reference(r) => json!(r.to_string()),
    }
}

fn dict_to_json(dict: &Dictionary) -> Value {
    let entries: serde_json::Map<String, Value> = dict
        .iter()
        .map(|(key, value)| (key.as_str().to_owned(), object_to_json(value)))
        .collect();
    Value::Object(entries)
}
