//! Output formatting
//!
//! Serializes assembled books to JSON and encodes the text for the chosen
//! destination:
//! - ASCII-escaping mode (`unicode-escape`): every non-ASCII character
//!   becomes a `\uXXXX` escape
//! - `ascii`: strict 7-bit output, any other character is an error
//! - `utf-16`, `utf-16le`, `utf-16be`: UTF-16 code units; plain `utf-16`
//!   starts with a little-endian byte order mark
//! - any other encoding label: the JSON text is encoded with that codec

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use encoding_rs::{Encoding, UTF_8};
use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};
use tracing::debug;

use crate::error::{ScrapeError, ScrapeResult};
use crate::models::Book;

const BYTE_ORDER_MARK: u16 = 0xFEFF;

/// Default indentation width
pub const DEFAULT_INDENT: usize = 4;

/// Requested ordering of highlights within a book
///
/// Accepted and carried through, but not applied: highlights are emitted in
/// listing order whichever value is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoteSort {
    #[default]
    Recency,
    Location,
}

impl fmt::Display for NoteSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteSort::Recency => write!(f, "recency"),
            NoteSort::Location => write!(f, "location"),
        }
    }
}

impl FromStr for NoteSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recency" => Ok(NoteSort::Recency),
            "location" => Ok(NoteSort::Location),
            other => Err(format!(
                "invalid note sort '{}' (expected recency or location)",
                other
            )),
        }
    }
}

/// Byte order of UTF-16 output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// Text encoding of the serialized document
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextEncoding {
    /// Pure ASCII output with `\uXXXX` escapes
    AsciiEscape,
    /// Strict ASCII; non-ASCII characters are unencodable
    Ascii,
    /// UTF-16 code units, optionally preceded by a byte order mark
    Utf16 { order: ByteOrder, bom: bool },
    /// Encode the JSON text with a registered codec
    Codec(&'static Encoding),
}

impl TextEncoding {
    /// Resolve an encoding label
    ///
    /// Labels are case-insensitive and `_` is read as `-`. ASCII and UTF-16
    /// are handled here since the registry maps them to windows-1252 and to
    /// UTF-8 output respectively.
    pub fn parse(label: &str) -> ScrapeResult<Self> {
        let label = label.trim();
        let normalized = label.to_ascii_lowercase().replace('_', "-");

        let encoding = match normalized.as_str() {
            "unicode-escape" | "ascii-escape" => TextEncoding::AsciiEscape,
            "ascii" | "us-ascii" | "646" => TextEncoding::Ascii,
            "utf-16" | "utf16" => TextEncoding::Utf16 {
                order: ByteOrder::Little,
                bom: true,
            },
            "utf-16le" | "utf-16-le" => TextEncoding::Utf16 {
                order: ByteOrder::Little,
                bom: false,
            },
            "utf-16be" | "utf-16-be" => TextEncoding::Utf16 {
                order: ByteOrder::Big,
                bom: false,
            },
            _ => Encoding::for_label(label.as_bytes())
                .map(TextEncoding::Codec)
                .ok_or_else(|| ScrapeError::InvalidEncoding(label.to_string()))?,
        };
        Ok(encoding)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::AsciiEscape => "unicode-escape",
            TextEncoding::Ascii => "ascii",
            TextEncoding::Utf16 { bom: true, .. } => "UTF-16",
            TextEncoding::Utf16 {
                order: ByteOrder::Little,
                ..
            } => "UTF-16LE",
            TextEncoding::Utf16 {
                order: ByteOrder::Big,
                ..
            } => "UTF-16BE",
            TextEncoding::Codec(encoding) => encoding.name(),
        }
    }

    fn unencodable(&self) -> ScrapeError {
        ScrapeError::Unencodable {
            encoding: self.name().to_string(),
        }
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        TextEncoding::Codec(UTF_8)
    }
}

/// How the document is rendered
#[derive(Debug, Clone, PartialEq)]
pub struct FormatOptions {
    pub encoding: TextEncoding,
    /// Spaces per indentation level; 0 keeps line breaks without indenting
    pub indent: usize,
    pub sort_keys: bool,
    pub note_sort: NoteSort,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            encoding: TextEncoding::default(),
            indent: DEFAULT_INDENT,
            sort_keys: true,
            note_sort: NoteSort::default(),
        }
    }
}

/// Render books to encoded bytes
pub fn format(books: &[Book], options: &FormatOptions) -> ScrapeResult<Vec<u8>> {
    debug!(
        note_sort = %options.note_sort,
        "Highlights keep listing order; note sort is not applied"
    );

    let indent = vec![b' '; options.indent];
    let pretty = PrettyFormatter::with_indent(&indent);

    let encoding = options.encoding;
    let json = match encoding {
        TextEncoding::AsciiEscape => to_json(books, options.sort_keys, AsciiEscaping(pretty))?,
        _ => to_json(books, options.sort_keys, pretty)?,
    };

    match encoding {
        TextEncoding::AsciiEscape => Ok(json),
        TextEncoding::Codec(codec) if codec == UTF_8 => Ok(json),
        TextEncoding::Ascii if json.is_ascii() => Ok(json),
        TextEncoding::Ascii => Err(encoding.unencodable()),
        TextEncoding::Utf16 { order, bom } => Ok(encode_utf16(&json_text(json)?, order, bom)),
        TextEncoding::Codec(codec) => {
            let text = json_text(json)?;
            let (bytes, _, had_errors) = codec.encode(&text);
            if had_errors {
                return Err(encoding.unencodable());
            }
            Ok(bytes.into_owned())
        }
    }
}

fn json_text(json: Vec<u8>) -> ScrapeResult<String> {
    String::from_utf8(json)
        .map_err(|e| ScrapeError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

fn encode_utf16(text: &str, order: ByteOrder, bom: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2 + 2);
    let units = bom.then_some(BYTE_ORDER_MARK).into_iter().chain(text.encode_utf16());
    for unit in units {
        match order {
            ByteOrder::Little => out.extend_from_slice(&unit.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&unit.to_be_bytes()),
        }
    }
    out
}

fn to_json<F: Formatter>(books: &[Book], sort_keys: bool, formatter: F) -> ScrapeResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);

    // Relies on serde_json's BTreeMap-backed Map; the `preserve_order`
    // feature would keep insertion order and silently disable sorting.
    if sort_keys {
        serde_json::to_value(books)?.serialize(&mut serializer)?;
    } else {
        books.serialize(&mut serializer)?;
    }

    Ok(out)
}

/// Formatter that escapes every non-ASCII character, layout delegated
struct AsciiEscaping<F>(F);

impl<F: Formatter> Formatter for AsciiEscaping<F> {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            if c.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn begin_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.begin_array(writer)
    }

    fn end_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.end_array(writer)
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.end_array_value(writer)
    }

    fn begin_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.begin_object(writer)
    }

    fn end_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.end_object(writer)
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.begin_object_key(writer, first)
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.end_object_value(writer)
    }
}

/// Where the rendered document goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    File(PathBuf),
    Stdout,
}

impl Destination {
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map(Destination::File).unwrap_or(Destination::Stdout)
    }

    /// Write the document; stdout output gets a trailing newline
    pub fn write(&self, bytes: &[u8]) -> ScrapeResult<()> {
        match self {
            Destination::File(path) => {
                std::fs::write(path, bytes).map_err(|e| ScrapeError::from_io(e, path.clone()))
            }
            Destination::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(bytes)?;
                stdout.write_all(b"\n")?;
                stdout.flush()?;
                Ok(())
            }
        }
    }
}

/// Check up front that the output path can be written
///
/// Creates a test file at the path and removes it again. Anything already at
/// the path is replaced.
pub fn validate_output_path(path: &Path) -> ScrapeResult<()> {
    std::fs::File::create(path).map_err(|e| ScrapeError::from_io(e, path.to_path_buf()))?;

    if !path.is_file() {
        return Err(ScrapeError::Output {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::Other, "test file was not created"),
        });
    }

    std::fs::remove_file(path).map_err(|e| ScrapeError::from_io(e, path.to_path_buf()))
}
