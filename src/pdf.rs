//! Document handle for one PDF being signed.
//!
//! A [`Pdf`] wraps one input document together with the place its signed
//! version is written to. It drives the placeholder engine through its steps:
//!
//! ```ignore
//! use pdf_ais::pdf::PdfBuilder;
//!
//! let mut pdf = PdfBuilder::new().input_path("contract.pdf").sig_size(16384).build()?;
//! let digest = pdf.digest()?;            // base64 SHA-256, 44 characters
//! let signature = remote_sign(&digest)?; // CMS SignedData from elsewhere
//! pdf.write_signature(&signature)?;
//! std::fs::write("contract.signed.pdf", pdf.into_signed_bytes().unwrap_or_default())?;
//! ```
//!
//! Where the signed bytes end up depends on the [`StorageStrategy`], which is
//! resolved once, at [`PdfBuilder::build`] time, from the kind of source and
//! whether an explicit destination was given.

use crate::config::PdfOptions;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::signatures::{
    CmsEmbedder, DocumentDigest, EmbedderSession, Placement, SigFieldSpec, SigMdpSetup, SignatureObject,
};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A stream that can be read and repositioned.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// A stream that can be written and repositioned.
pub trait WriteSeek: Write + Seek {}
impl<T: Write + Seek + ?Sized> WriteSeek for T {}

/// A stream that can be read, written and repositioned.
pub trait ReadWriteSeek: Read + Write + Seek {}
impl<T: Read + Write + Seek + ?Sized> ReadWriteSeek for T {}

/// Where the document to sign comes from.
pub enum PdfSource<'a> {
    /// File on disk, read completely into memory.
    Path(PathBuf),
    /// Read/write stream holding the document; the signature is appended to it.
    InPlace(&'a mut dyn ReadWriteSeek),
    /// Seekable stream, read but never written.
    Seekable(&'a mut dyn ReadSeek),
    /// Forward-only stream, read completely into memory.
    Reader(&'a mut dyn Read),
}

impl PdfSource<'_> {
    /// The variant without its payload.
    pub fn kind(&self) -> SourceKind {
        match self {
            PdfSource::Path(_) => SourceKind::Path,
            PdfSource::InPlace(_) => SourceKind::InPlace,
            PdfSource::Seekable(_) => SourceKind::Seekable,
            PdfSource::Reader(_) => SourceKind::Reader,
        }
    }
}

impl std::fmt::Debug for PdfSource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PdfSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            other => f.debug_tuple("PdfSource").field(&other.kind()).finish(),
        }
    }
}

/// Kind of a [`PdfSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// [`PdfSource::Path`]
    Path,
    /// [`PdfSource::InPlace`]
    InPlace,
    /// [`PdfSource::Seekable`]
    Seekable,
    /// [`PdfSource::Reader`]
    Reader,
}

/// How input and output storage relate for one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageStrategy {
    /// The caller's read/write stream is both input and output.
    InPlace,
    /// A seekable source is read directly; the signed copy goes to the
    /// destination, or to a fresh in-memory buffer.
    CopyOut,
    /// The whole input is read into memory first. The buffer is the output
    /// unless an explicit destination was given.
    Buffered,
}

impl StorageStrategy {
    /// Pick the strategy for a source kind and destination presence.
    ///
    /// Fails with [`Error::InvalidInput`] when there is no source, or when an
    /// in-place stream is combined with a separate destination.
    pub fn resolve(source: Option<SourceKind>, has_destination: bool) -> Result<Self> {
        match source {
            Some(SourceKind::InPlace) if has_destination => Err(Error::InvalidInput(
                "an in-place stream cannot be combined with an output stream".to_string(),
            )),
            Some(SourceKind::InPlace) => Ok(StorageStrategy::InPlace),
            None => Err(Error::InvalidInput("no input document given".to_string())),
            Some(SourceKind::Path) | Some(SourceKind::Reader) => Ok(StorageStrategy::Buffered),
            Some(SourceKind::Seekable) => Ok(StorageStrategy::CopyOut),
        }
    }
}

/// Lifecycle phase of a [`Pdf`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Built; nothing written yet.
    Constructed,
    /// Placeholder written and digest computed.
    Digested,
    /// Signature embedded.
    Signed,
}

enum Output<'a> {
    Owned(Cursor<Vec<u8>>),
    Borrowed(&'a mut dyn WriteSeek),
    InPlace(&'a mut dyn ReadWriteSeek),
}

impl Write for Output<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Output::Owned(cursor) => cursor.write(buf),
            Output::Borrowed(stream) => stream.write(buf),
            Output::InPlace(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Output::Owned(cursor) => cursor.flush(),
            Output::Borrowed(stream) => stream.flush(),
            Output::InPlace(stream) => stream.flush(),
        }
    }
}

impl Seek for Output<'_> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            Output::Owned(cursor) => cursor.seek(pos),
            Output::Borrowed(stream) => stream.seek(pos),
            Output::InPlace(stream) => stream.seek(pos),
        }
    }
}

/// Builder for [`Pdf`].
///
/// Exactly one source setter must be called; calling two different ones is
/// an error at [`build`](PdfBuilder::build) time.
#[derive(Default)]
pub struct PdfBuilder<'a> {
    source: Option<PdfSource<'a>>,
    conflicting_source: bool,
    destination: Option<&'a mut dyn WriteSeek>,
    options: PdfOptions,
}

impl<'a> PdfBuilder<'a> {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_source(mut self, source: PdfSource<'a>) -> Self {
        if self.source.is_some() {
            self.conflicting_source = true;
        }
        self.source = Some(source);
        self
    }

    /// Read the document from a file.
    pub fn input_path(self, path: impl AsRef<Path>) -> Self {
        self.with_source(PdfSource::Path(path.as_ref().to_path_buf()))
    }

    /// Read the document from a forward-only stream.
    pub fn input_stream(self, reader: &'a mut dyn Read) -> Self {
        self.with_source(PdfSource::Reader(reader))
    }

    /// Read the document from a seekable stream without modifying it.
    pub fn input_seekable(self, reader: &'a mut dyn ReadSeek) -> Self {
        self.with_source(PdfSource::Seekable(reader))
    }

    /// Sign the document held by `stream` in place.
    pub fn inout_stream(self, stream: &'a mut dyn ReadWriteSeek) -> Self {
        self.with_source(PdfSource::InPlace(stream))
    }

    /// Use an explicit source.
    pub fn source(self, source: PdfSource<'a>) -> Self {
        self.with_source(source)
    }

    /// Write the signed document to `output`, starting at its current position.
    pub fn out_stream(mut self, output: &'a mut dyn WriteSeek) -> Self {
        self.destination = Some(output);
        self
    }

    /// Name of the signature field to fill or create.
    pub fn sig_name(mut self, name: impl Into<String>) -> Self {
        self.options.field_name = name.into();
        self
    }

    /// Reserved signature capacity, in hex digits of the encoded signature.
    pub fn sig_size(mut self, size: usize) -> Self {
        self.options.sig_size = size;
        self
    }

    /// Replace all handle options at once.
    pub fn options(mut self, options: PdfOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve storage, load the document and open the signing session.
    pub fn build(self) -> Result<Pdf<'a>> {
        if self.conflicting_source {
            return Err(Error::InvalidInput("more than one input source given".to_string()));
        }
        if self.options.field_name.is_empty() {
            return Err(Error::InvalidInput("signature field name is empty".to_string()));
        }
        if self.options.sig_size == 0 {
            return Err(Error::InvalidInput("signature size must be positive".to_string()));
        }

        let strategy = StorageStrategy::resolve(
            self.source.as_ref().map(|source| source.kind()),
            self.destination.is_some(),
        )?;
        let source = self
            .source
            .ok_or_else(|| Error::InvalidInput("no input document given".to_string()))?;

        let (data, output, placement) = match source {
            PdfSource::InPlace(stream) => {
                let data = read_from_start(&mut *stream)?;
                (data, Output::InPlace(stream), Placement::Append)
            },
            PdfSource::Seekable(reader) => {
                let data = read_from_start(reader)?;
                let output = match self.destination {
                    Some(destination) => Output::Borrowed(destination),
                    None => Output::Owned(Cursor::new(Vec::with_capacity(data.len()))),
                };
                (data, output, Placement::Copy)
            },
            PdfSource::Path(path) => {
                let data = std::fs::read(&path)?;
                log::debug!("Read {} bytes from {}", data.len(), path.display());
                buffered(data, self.destination)
            },
            PdfSource::Reader(reader) => {
                let mut data = Vec::new();
                reader.read_to_end(&mut data)?;
                buffered(data, self.destination)
            },
        };

        let document = PdfDocument::from_bytes(data)?;
        let session = CmsEmbedder::start(SigFieldSpec::new(self.options.field_name.clone()), document)?;
        log::debug!(
            "Opened {:?} handle for field {:?} with {} reserved",
            strategy,
            self.options.field_name,
            self.options.sig_size
        );

        Ok(Pdf {
            session,
            output,
            placement,
            strategy,
            options: self.options,
            phase: Phase::Constructed,
            digest: None,
        })
    }
}

fn read_from_start<R: Read + Seek + ?Sized>(reader: &mut R) -> Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(0))?;
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    Ok(data)
}

fn buffered<'a>(data: Vec<u8>, destination: Option<&'a mut dyn WriteSeek>) -> (Vec<u8>, Output<'a>, Placement) {
    match destination {
        Some(destination) => (data, Output::Borrowed(destination), Placement::Copy),
        None => {
            let output = Output::Owned(Cursor::new(data.clone()));
            (data, output, Placement::Append)
        },
    }
}

/// One document being signed.
pub struct Pdf<'a> {
    session: EmbedderSession,
    output: Output<'a>,
    placement: Placement,
    strategy: StorageStrategy,
    options: PdfOptions,
    phase: Phase,
    digest: Option<DocumentDigest>,
}

impl std::fmt::Debug for Pdf<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pdf")
            .field("field", &self.options.field_name)
            .field("strategy", &self.strategy)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl<'a> Pdf<'a> {
    /// Start building a handle.
    pub fn builder() -> PdfBuilder<'a> {
        PdfBuilder::new()
    }

    /// Open the file at `path` with default options.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        PdfBuilder::new().input_path(path).build()
    }

    /// Write the signature placeholder and return the base64 SHA-256 digest
    /// of everything outside it.
    ///
    /// The output stream holds the complete document afterwards; its length
    /// no longer changes. Can be called once.
    pub fn digest(&mut self) -> Result<String> {
        if self.phase != Phase::Constructed {
            return Err(Error::IllegalState("digest already computed"));
        }

        let mut signature = SignatureObject::new(self.options.sig_size);
        if let Some(name) = &self.options.signer_name {
            signature = signature.with_name(name.clone());
        }
        if let Some(reason) = &self.options.reason {
            signature = signature.with_reason(reason.clone());
        }
        if let Some(location) = &self.options.location {
            signature = signature.with_location(location.clone());
        }
        if let Some(contact) = &self.options.contact_info {
            signature = signature.with_contact_info(contact.clone());
        }

        let digest = self.session.reserve_and_digest(
            &SigMdpSetup::certify_no_changes(),
            &signature,
            &mut self.output,
            self.placement,
        )?;
        let encoded = digest.to_base64();
        self.digest = Some(digest);
        self.phase = Phase::Digested;
        Ok(encoded)
    }

    /// Embed `signature` (a DER-encoded CMS container) into the reserved region.
    ///
    /// The hex-encoded signature takes `2 * signature.len()` bytes; more than
    /// the reserved capacity fails with [`Error::SignatureTooLarge`] and
    /// leaves the output untouched.
    pub fn write_signature(&mut self, signature: &[u8]) -> Result<()> {
        match self.phase {
            Phase::Constructed => return Err(Error::IllegalState("digest must be computed before writing a signature")),
            Phase::Signed => return Err(Error::IllegalState("signature already written")),
            Phase::Digested => {},
        }

        let required = signature.len() * 2;
        if required > self.options.sig_size {
            return Err(Error::SignatureTooLarge(required));
        }

        self.session.finalize(signature, &mut self.output)?;
        self.phase = Phase::Signed;
        Ok(())
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Storage strategy chosen at build time.
    pub fn strategy(&self) -> StorageStrategy {
        self.strategy
    }

    /// Name of the signature field.
    pub fn field_name(&self) -> &str {
        self.session.field_name()
    }

    /// Reserved capacity for the hex-encoded signature.
    pub fn signature_capacity(&self) -> usize {
        self.options.sig_size
    }

    /// Digest computed by [`digest`](Pdf::digest), if any.
    pub fn document_digest(&self) -> Option<&DocumentDigest> {
        self.digest.as_ref()
    }

    /// The original (unsigned) document.
    pub fn document(&self) -> &PdfDocument {
        self.session.document()
    }

    /// Output bytes when the handle owns its output buffer.
    ///
    /// `None` when the output is a caller-supplied stream.
    pub fn signed_bytes(&self) -> Option<&[u8]> {
        match &self.output {
            Output::Owned(cursor) => Some(cursor.get_ref()),
            Output::Borrowed(_) | Output::InPlace(_) => None,
        }
    }

    /// Take the owned output buffer. See [`signed_bytes`](Pdf::signed_bytes).
    pub fn into_signed_bytes(self) -> Option<Vec<u8>> {
        match self.output {
            Output::Owned(cursor) => Some(cursor.into_inner()),
            Output::Borrowed(_) | Output::InPlace(_) => None,
        }
    }
}
