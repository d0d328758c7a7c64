//! I/O utilities: input sources, acceptance checks, decoding, and CSV reader/writer construction.
//!
//! All byte-level I/O in csv-intake flows through this module. It provides:
//!
//! - **Input sources**: a file path, an upload descriptor (stored path plus the
//!   client's file name and MIME type), or an already-open stream.
//! - **Acceptance**: path and upload inputs must look like delimited text
//!   (`.csv`, `.tsv`, `.txt`, or a `text/csv`/`text/plain` upload).
//! - **Encoding**: a UTF-8 BOM is consumed and forces UTF-8; otherwise the
//!   configured `encoding_rs` label is used. Decoding is lossy so that bad bytes
//!   surface as U+FFFD and are reported per column instead of aborting the read.
//! - **Reader/writer construction** with the configured delimiter, enclosure, and escape.

use std::{
    collections::VecDeque,
    fmt,
    fs::File,
    io::{self, BufRead, BufReader, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use serde::Serialize;

use crate::error::{ConfigError, InputError};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const ACCEPTED_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];
const ACCEPTED_MIME_TYPES: &[&str] = &["text/csv", "text/plain"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    FilePath,
    Upload,
    Stream,
}

/// A file received through an upload form: where it was stored, plus what the client said about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    pub path: PathBuf,
    pub original_name: String,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
}

impl UploadDescriptor {
    pub fn new(path: impl Into<PathBuf>, original_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            original_name: original_name.into(),
            mime_type: None,
            size: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    fn is_accepted(&self) -> bool {
        has_accepted_extension(Path::new(&self.original_name))
            || self.mime_type.as_deref().is_some_and(|mime| {
                let essence = mime.split(';').next().unwrap_or(mime).trim();
                ACCEPTED_MIME_TYPES
                    .iter()
                    .any(|accepted| essence.eq_ignore_ascii_case(accepted))
            })
    }
}

pub enum InputSource {
    Path(PathBuf),
    Upload(UploadDescriptor),
    Stream(Box<dyn Read>),
}

impl InputSource {
    pub fn stream<R: Read + 'static>(reader: R) -> Self {
        InputSource::Stream(Box::new(reader))
    }

    pub fn kind(&self) -> InputKind {
        match self {
            InputSource::Path(_) => InputKind::FilePath,
            InputSource::Upload(_) => InputKind::Upload,
            InputSource::Stream(_) => InputKind::Stream,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            InputSource::Path(path) => path.display().to_string(),
            InputSource::Upload(upload) => {
                format!("{} ({})", upload.original_name, upload.path.display())
            }
            InputSource::Stream(_) => "<stream>".to_string(),
        }
    }
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            InputSource::Upload(upload) => f.debug_tuple("Upload").field(upload).finish(),
            InputSource::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<PathBuf> for InputSource {
    fn from(path: PathBuf) -> Self {
        InputSource::Path(path)
    }
}

impl From<&Path> for InputSource {
    fn from(path: &Path) -> Self {
        InputSource::Path(path.to_path_buf())
    }
}

impl From<&str> for InputSource {
    fn from(path: &str) -> Self {
        InputSource::Path(PathBuf::from(path))
    }
}

impl From<UploadDescriptor> for InputSource {
    fn from(upload: UploadDescriptor) -> Self {
        InputSource::Upload(upload)
    }
}

fn has_accepted_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
}

fn open_file(path: &Path) -> Result<Box<dyn Read>, InputError> {
    let file = File::open(path).map_err(|source| InputError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Box::new(file))
}

/// Checks that the source exists and looks like delimited text, then opens it.
pub fn open_input(source: InputSource) -> Result<Box<dyn Read>, InputError> {
    match source {
        InputSource::Path(path) => {
            if !path.exists() {
                return Err(InputError::NotFound(path));
            }
            if !has_accepted_extension(&path) {
                return Err(InputError::NotCsv);
            }
            open_file(&path)
        }
        InputSource::Upload(upload) => {
            if !upload.path.exists() {
                return Err(InputError::NotFound(upload.path));
            }
            if !upload.is_accepted() {
                return Err(InputError::NotCsv);
            }
            open_file(&upload.path)
        }
        InputSource::Stream(reader) => Ok(reader),
    }
}

/// Single-byte CSV dialect derived from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvDialect {
    pub delimiter: u8,
    pub enclosure: u8,
    pub escape: Option<u8>,
}

impl CsvDialect {
    pub fn new(delimiter: char, enclosure: char, escape: Option<char>) -> Result<Self, ConfigError> {
        Ok(Self {
            delimiter: ascii_byte("delimiter", delimiter)?,
            enclosure: ascii_byte("enclosure", enclosure)?,
            escape: escape.map(|ch| ascii_byte("escape", ch)).transpose()?,
        })
    }
}

fn ascii_byte(option: &'static str, value: char) -> Result<u8, ConfigError> {
    if value.is_ascii() {
        Ok(value as u8)
    } else {
        Err(ConfigError::InvalidCharacter { option, value })
    }
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding, ConfigError> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| ConfigError::UnknownEncoding(value.to_string())),
        None => Ok(UTF_8),
    }
}

/// Consumes a leading UTF-8 BOM if present. A BOM overrides the configured encoding.
pub fn sniff_encoding<R: BufRead>(
    reader: &mut R,
    configured: &'static Encoding,
) -> io::Result<&'static Encoding> {
    let buffer = reader.fill_buf()?;
    if buffer.starts_with(UTF8_BOM) {
        reader.consume(UTF8_BOM.len());
        Ok(UTF_8)
    } else {
        Ok(configured)
    }
}

pub fn open_csv_reader<R>(reader: R, dialect: CsvDialect) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(dialect.delimiter)
        .quote(dialect.enclosure)
        .escape(dialect.escape)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

/// Newline-tracking wrapper under the CSV parser.
///
/// The parser drops blank lines without reporting them and stops a CRLF record
/// before its `\n`, so recovering physical line numbers needs to know whether
/// the last byte a record consumed was a newline.
#[derive(Debug)]
pub struct TrackedInput<R> {
    inner: R,
    bytes_read: u64,
    newlines: VecDeque<u64>,
}

impl<R> TrackedInput<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
            newlines: VecDeque::new(),
        }
    }

    /// Whether the byte just before `offset` is a `\n`. Offsets below it are forgotten.
    pub fn newline_before(&mut self, offset: u64) -> bool {
        let Some(last) = offset.checked_sub(1) else {
            return false;
        };
        while self.newlines.front().is_some_and(|&at| at < last) {
            self.newlines.pop_front();
        }
        self.newlines.front() == Some(&last)
    }
}

impl<R: Read> Read for TrackedInput<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        let base = self.bytes_read;
        self.newlines.extend(
            buf[..read]
                .iter()
                .enumerate()
                .filter(|(_, byte)| **byte == b'\n')
                .map(|(index, _)| base + index as u64),
        );
        self.bytes_read += read as u64;
        Ok(read)
    }
}

pub type SourceReader = csv::Reader<TrackedInput<BufReader<Box<dyn Read>>>>;

/// Opens the source and wraps it in a CSV reader, returning the encoding to decode fields with.
pub fn open_csv_source(
    source: InputSource,
    dialect: CsvDialect,
    encoding: &'static Encoding,
) -> Result<(SourceReader, &'static Encoding), InputError> {
    let mut buffered = BufReader::new(open_input(source)?);
    let encoding = sniff_encoding(&mut buffered, encoding)?;
    Ok((open_csv_reader(TrackedInput::new(buffered), dialect), encoding))
}

pub fn decode_field(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _had_errors) = encoding.decode_without_bom_handling(bytes);
    text.into_owned()
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Vec<String> {
    record
        .iter()
        .map(|field| decode_field(field, encoding))
        .collect()
}

/// Creates `path` (parent directories included) and returns a CSV writer that
/// has already emitted a UTF-8 BOM.
pub fn create_csv_writer_with_bom(path: &Path, dialect: CsvDialect) -> Result<csv::Writer<File>> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Creating export directory {parent:?}"))?;
    }
    let mut file = File::create(path).with_context(|| format!("Creating export file {path:?}"))?;
    file.write_all(UTF8_BOM)
        .with_context(|| format!("Writing BOM to {path:?}"))?;

    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(dialect.delimiter)
        .quote(dialect.enclosure)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .flexible(true);
    Ok(builder.from_writer(file))
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn dialect_rejects_non_ascii() {
        assert!(CsvDialect::new(',', '"', Some('\\')).is_ok());
        assert!(matches!(
            CsvDialect::new('§', '"', None),
            Err(ConfigError::InvalidCharacter {
                option: "delimiter",
                ..
            })
        ));
    }

    #[test]
    fn sniff_encoding_consumes_bom() {
        let mut reader = BufReader::new(Cursor::new(b"\xEF\xBB\xBFname\n".to_vec()));
        let encoding = sniff_encoding(&mut reader, encoding_rs::WINDOWS_1252).unwrap();
        assert_eq!(encoding, UTF_8);
        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "name\n");
    }

    #[test]
    fn decode_field_replaces_invalid_bytes() {
        assert_eq!(decode_field(b"caf\xE9", UTF_8), "caf\u{FFFD}");
        assert_eq!(decode_field(b"caf\xE9", encoding_rs::WINDOWS_1252), "café");
    }

    #[test]
    fn uploads_are_accepted_by_name_or_mime() {
        let by_name = UploadDescriptor::new("/tmp/php123", "people.CSV");
        assert!(by_name.is_accepted());
        let by_mime = UploadDescriptor::new("/tmp/php123", "blob").with_mime_type("text/csv; charset=utf-8");
        assert!(by_mime.is_accepted());
        let rejected = UploadDescriptor::new("/tmp/php123", "photo.png").with_mime_type("image/png");
        assert!(!rejected.is_accepted());
    }

    #[test]
    fn open_input_reports_missing_and_non_csv_paths() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.csv");
        assert!(matches!(
            open_input(InputSource::from(missing.as_path())),
            Err(InputError::NotFound(_))
        ));
        let notes = dir.path().join("notes.md");
        std::fs::write(&notes, "This is not a CSV file.").unwrap();
        let err = open_input(InputSource::from(notes)).err().expect("rejected");
        assert!(err.to_string().contains("not a CSV"));
    }

    #[test]
    fn tracked_input_remembers_newline_offsets() {
        let mut input = TrackedInput::new(Cursor::new(b"a\r\nb\n\nc".to_vec()));
        let mut buffer = [0u8; 3];
        assert_eq!(input.read(&mut buffer).unwrap(), 3);
        assert!(input.newline_before(3));
        assert!(!input.newline_before(2));
        let mut rest = Vec::new();
        input.read_to_end(&mut rest).unwrap();
        assert!(input.newline_before(5));
        assert!(input.newline_before(6));
        assert!(!input.newline_before(7));
        assert!(!input.newline_before(0));
    }

    #[test]
    fn reader_honours_custom_dialect() {
        let dialect = CsvDialect::new(';', '\'', None).unwrap();
        let mut reader = open_csv_reader(Cursor::new("a;'b;c'\n"), dialect);
        let record = reader.byte_records().next().unwrap().unwrap();
        assert_eq!(decode_record(&record, UTF_8), vec!["a", "b;c"]);
    }
}
