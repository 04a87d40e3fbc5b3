//! Forward-streaming archive rewriter.
//!
//! [`ZipTransformer`] consumes an archive as a sequence of arbitrarily sized
//! chunks and produces a new archive chunk by chunk. Every entry is either
//! copied through untouched, dropped, or captured: its data is buffered,
//! decompressed, handed to a transform and re-emitted with a fresh header.
//! Because entries can move or disappear, the Central Directory and EOCD
//! are rewritten on the way out so that offsets, sizes and counts describe
//! the new archive.
//!
//! Only one entry is ever in flight, and only a captured entry is held in
//! memory in full.

use bytes::{Buf, Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

use crate::error::{Result, ZipError};
use crate::io::ByteStream;

use super::compression::{compress, decompress};
use super::crc::crc32;
use super::structures::*;

/// New content for a captured entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// Empty content still writes a zero-length entry
    Bytes(Vec<u8>),
    Text(String),
    /// Omit the entry from the output
    Drop,
}

impl From<Vec<u8>> for Replacement {
    fn from(data: Vec<u8>) -> Self {
        Replacement::Bytes(data)
    }
}

impl From<String> for Replacement {
    fn from(text: String) -> Self {
        Replacement::Text(text)
    }
}

impl From<&str> for Replacement {
    fn from(text: &str) -> Self {
        Replacement::Text(text.to_string())
    }
}

impl Replacement {
    fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Replacement::Bytes(data) => Some(data),
            Replacement::Text(text) => Some(text.into_bytes()),
            Replacement::Drop => None,
        }
    }
}

/// Receives an entry's decompressed content and returns its replacement.
pub type TransformFn = Box<dyn FnOnce(Vec<u8>) -> Result<Replacement> + Send>;

/// What to do with one entry
pub enum Selection {
    /// Copy the entry through unchanged
    Passthrough,
    /// Buffer the entry and rewrite it with the transform's output
    Capture(TransformFn),
    /// Omit the entry without looking at its content
    Drop,
}

impl Selection {
    pub fn capture<F>(transform: F) -> Self
    where
        F: FnOnce(Vec<u8>) -> Result<Replacement> + Send + 'static,
    {
        Selection::Capture(Box::new(transform))
    }
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selection::Passthrough => f.write_str("Passthrough"),
            Selection::Capture(_) => f.write_str("Capture"),
            Selection::Drop => f.write_str("Drop"),
        }
    }
}

/// Decides per entry name what happens to each entry.
///
/// Called once for every local header in stream order with `Some(name)`,
/// then exactly once with `None` when the stream ends (or is abandoned) so
/// that resources owned by the selector can be released. The selection
/// returned for `None` is ignored.
pub trait Selector: Send {
    fn select(&mut self, name: Option<&str>) -> Selection;
}

impl<F> Selector for F
where
    F: FnMut(Option<&str>) -> Selection + Send,
{
    fn select(&mut self, name: Option<&str>) -> Selection {
        self(name)
    }
}

/// Passes every entry through
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughAll;

impl Selector for PassthroughAll {
    fn select(&mut self, _name: Option<&str>) -> Selection {
        Selection::Passthrough
    }
}

/// Attributes of a rewritten entry, patched into its Central Directory record
#[derive(Debug, Clone, Copy)]
struct Rewritten {
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
}

/// Bookkeeping for the archive being produced
#[derive(Debug, Default)]
struct TransformState {
    /// Bytes emitted so far
    offset: u64,
    /// New local header offset of every emitted entry
    local_offsets: HashMap<String, u32>,
    rewritten: HashMap<String, Rewritten>,
    cd_offset: Option<u64>,
    cd_size: u64,
    cd_count: u32,
    /// Whether a data descriptor following the current entry is re-emitted
    emit_descriptor: bool,
}

impl TransformState {
    fn current_offset(&self) -> Result<u32> {
        u32::try_from(self.offset).map_err(|_| ZipError::TooLarge("archive offset"))
    }
}

enum Disposition {
    Passthrough,
    Drop,
    Capture(Capture),
}

struct Capture {
    name: String,
    header: LocalFileHeader,
    transform: TransformFn,
    data: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
enum Extent {
    /// Sizes are in the local header
    Exactly(u64),
    /// Sizes follow the data in a descriptor
    UntilDescriptor,
}

struct EntryData {
    disposition: Disposition,
    extent: Extent,
    /// Data bytes consumed so far
    consumed: u64,
}

enum Phase {
    AwaitingHeader,
    Data(EntryData),
}

/// Where a descriptor-terminated entry's data ends within the buffer
#[derive(Debug, PartialEq, Eq)]
enum Boundary {
    /// The data ends here and a validated descriptor follows
    Found(usize),
    /// Everything before this position is data; the rest must wait for more input
    Undecided(usize),
}

/// Locate the end of a streamed entry's data.
///
/// The descriptor signature may occur by chance inside compressed data, so a
/// candidate only counts when the descriptor's compressed size equals the
/// number of data bytes before it. A candidate whose 16 bytes are not all
/// buffered yet, or a buffer ending in a prefix of the signature, holds back
/// the bytes from that point on.
fn find_descriptor(buf: &[u8], consumed: u64) -> Boundary {
    let sig = DataDescriptor::SIGNATURE_BYTES;
    let mut from = 0;

    while let Some(found) = buf[from..].windows(4).position(|w| w == sig) {
        let at = from + found;
        if at + DataDescriptor::SIZE > buf.len() {
            return Boundary::Undecided(at);
        }
        let declared = u64::from(u32::from_le_bytes([
            buf[at + 8],
            buf[at + 9],
            buf[at + 10],
            buf[at + 11],
        ]));
        if declared == consumed + at as u64 {
            return Boundary::Found(at);
        }
        from = at + 1;
    }

    for partial in (1..4).rev() {
        if buf.len() >= partial && buf[buf.len() - partial..] == sig[..partial] {
            return Boundary::Undecided(buf.len() - partial);
        }
    }
    Boundary::Undecided(buf.len())
}

/// Synchronous core of the streaming rewriter.
///
/// Feed input with [`push`](Self::push), which returns whatever output
/// became available, and call [`finish`](Self::finish) once the input is
/// exhausted.
pub struct ZipTransformer<S: Selector> {
    selector: S,
    buffer: BytesMut,
    phase: Phase,
    state: TransformState,
    released: bool,
}

impl<S: Selector> ZipTransformer<S> {
    pub fn new(selector: S) -> Self {
        Self {
            selector,
            buffer: BytesMut::new(),
            phase: Phase::AwaitingHeader,
            state: TransformState::default(),
            released: false,
        }
    }

    /// Bytes emitted so far
    pub fn output_offset(&self) -> u64 {
        self.state.offset
    }

    /// Consume a chunk of input and return the output it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();
        while self.step(&mut out)? {}
        Ok(out)
    }

    /// Signal the end of input.
    ///
    /// Notifies the selector, then fails with [`ZipError::TruncatedStream`]
    /// if the input stopped inside a record or an entry's data.
    pub fn finish(&mut self) -> Result<()> {
        self.release();
        if !matches!(self.phase, Phase::AwaitingHeader) || !self.buffer.is_empty() {
            return Err(ZipError::TruncatedStream);
        }
        Ok(())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.selector.select(None);
        }
    }

    /// Perform one parsing step. Returns false when more input is needed.
    fn step(&mut self, out: &mut Vec<Bytes>) -> Result<bool> {
        match std::mem::replace(&mut self.phase, Phase::AwaitingHeader) {
            Phase::AwaitingHeader => self.read_header(out),
            Phase::Data(entry) => self.read_data(entry, out),
        }
    }

    fn emit(&mut self, chunk: Bytes, out: &mut Vec<Bytes>) {
        if !chunk.is_empty() {
            self.state.offset += chunk.len() as u64;
            out.push(chunk);
        }
    }

    fn read_header(&mut self, out: &mut Vec<Bytes>) -> Result<bool> {
        let Some(signature) = peek_signature(&self.buffer) else {
            return Ok(false);
        };

        match signature {
            LocalFileHeader::SIGNATURE => {
                let Decode::Complete { record, len } = LocalFileHeader::decode(&self.buffer)? else {
                    return Ok(false);
                };
                let raw = self.buffer.split_to(len).freeze();
                self.begin_entry(record, raw, out)?;
            }
            DataDescriptor::SIGNATURE => {
                let Decode::Complete { len, .. } = DataDescriptor::decode(&self.buffer)? else {
                    return Ok(false);
                };
                let raw = self.buffer.split_to(len).freeze();
                if self.state.emit_descriptor {
                    self.emit(raw, out);
                }
            }
            CentralDirectoryEntry::SIGNATURE => {
                let Decode::Complete { record, len } = CentralDirectoryEntry::decode(&self.buffer)?
                else {
                    return Ok(false);
                };
                self.buffer.advance(len);
                self.rewrite_central_entry(record, out)?;
            }
            EndOfCentralDirectory::SIGNATURE => {
                let Decode::Complete { record, len } = EndOfCentralDirectory::decode(&self.buffer)?
                else {
                    return Ok(false);
                };
                self.buffer.advance(len);
                self.rewrite_end_record(record, out)?;
            }
            other => return Err(ZipError::UnknownSignature(other)),
        }
        Ok(true)
    }

    fn begin_entry(&mut self, header: LocalFileHeader, raw: Bytes, out: &mut Vec<Bytes>) -> Result<()> {
        let name = header.name();
        let extent = if header.has_data_descriptor() {
            Extent::UntilDescriptor
        } else {
            Extent::Exactly(u64::from(header.compressed_size))
        };

        let disposition = match self.selector.select(Some(&name)) {
            Selection::Passthrough => {
                let offset = self.state.current_offset()?;
                self.state.local_offsets.insert(name, offset);
                self.state.emit_descriptor = true;
                self.emit(raw, out);
                Disposition::Passthrough
            }
            Selection::Drop => {
                debug!(name = %name, "dropping entry");
                self.state.emit_descriptor = false;
                Disposition::Drop
            }
            Selection::Capture(transform) => {
                debug!(name = %name, ?extent, "capturing entry");
                self.state.emit_descriptor = false;
                Disposition::Capture(Capture {
                    name,
                    header,
                    transform,
                    data: Vec::new(),
                })
            }
        };

        self.phase = Phase::Data(EntryData {
            disposition,
            extent,
            consumed: 0,
        });
        Ok(())
    }

    fn read_data(&mut self, mut entry: EntryData, out: &mut Vec<Bytes>) -> Result<bool> {
        let (take, complete) = match entry.extent {
            Extent::Exactly(size) => {
                let left = size - entry.consumed;
                let available = self.buffer.len() as u64;
                (left.min(available) as usize, left <= available)
            }
            Extent::UntilDescriptor => match find_descriptor(&self.buffer, entry.consumed) {
                Boundary::Found(at) => (at, true),
                Boundary::Undecided(at) => (at, false),
            },
        };

        if take == 0 && !complete {
            self.phase = Phase::Data(entry);
            return Ok(false);
        }

        let data = self.buffer.split_to(take).freeze();
        entry.consumed += take as u64;
        match &mut entry.disposition {
            Disposition::Passthrough => self.emit(data, out),
            Disposition::Drop => {}
            Disposition::Capture(capture) => capture.data.extend_from_slice(&data),
        }

        if complete {
            if let Disposition::Capture(capture) = entry.disposition {
                self.complete_capture(capture, out)?;
            }
        } else {
            self.phase = Phase::Data(entry);
        }
        Ok(true)
    }

    fn complete_capture(&mut self, capture: Capture, out: &mut Vec<Bytes>) -> Result<()> {
        let Capture {
            name,
            mut header,
            transform,
            data,
        } = capture;
        let method = header.compression_method;
        let content = decompress(&data, method)?;

        let Some(content) = transform(content)?.into_bytes() else {
            debug!(name = %name, "transform dropped entry");
            return Ok(());
        };

        let compressed = compress(&content, method)?;
        let rewritten = Rewritten {
            crc32: crc32(&content),
            compressed_size: u32::try_from(compressed.len())
                .map_err(|_| ZipError::TooLarge("compressed entry"))?,
            uncompressed_size: u32::try_from(content.len())
                .map_err(|_| ZipError::TooLarge("entry"))?,
        };

        header.flags &= !FLAG_DATA_DESCRIPTOR;
        header.crc32 = rewritten.crc32;
        header.compressed_size = rewritten.compressed_size;
        header.uncompressed_size = rewritten.uncompressed_size;

        let offset = self.state.current_offset()?;
        debug!(
            name = %name,
            offset,
            size = rewritten.uncompressed_size,
            "rewrote entry"
        );
        self.state.local_offsets.insert(name.clone(), offset);
        self.state.rewritten.insert(name, rewritten);

        self.emit(Bytes::from(header.encode()), out);
        self.emit(Bytes::from(compressed), out);
        Ok(())
    }

    fn rewrite_central_entry(&mut self, mut record: CentralDirectoryEntry, out: &mut Vec<Bytes>) -> Result<()> {
        let name = record.name();
        let Some(&offset) = self.state.local_offsets.get(&name) else {
            debug!(name = %name, "omitting central directory record of dropped entry");
            return Ok(());
        };

        record.local_header_offset = offset;
        if let Some(rewritten) = self.state.rewritten.get(&name) {
            record.flags &= !FLAG_DATA_DESCRIPTOR;
            record.crc32 = rewritten.crc32;
            record.compressed_size = rewritten.compressed_size;
            record.uncompressed_size = rewritten.uncompressed_size;
        }

        let bytes = record.encode();
        if self.state.cd_offset.is_none() {
            self.state.cd_offset = Some(self.state.offset);
        }
        self.state.cd_count += 1;
        self.state.cd_size += bytes.len() as u64;
        self.emit(Bytes::from(bytes), out);
        Ok(())
    }

    fn rewrite_end_record(&mut self, mut record: EndOfCentralDirectory, out: &mut Vec<Bytes>) -> Result<()> {
        let count = u16::try_from(self.state.cd_count).map_err(|_| ZipError::TooLarge("entry count"))?;
        let cd_offset = self.state.cd_offset.unwrap_or(self.state.offset);

        record.disk_entries = count;
        record.total_entries = count;
        record.cd_size =
            u32::try_from(self.state.cd_size).map_err(|_| ZipError::TooLarge("central directory"))?;
        record.cd_offset =
            u32::try_from(cd_offset).map_err(|_| ZipError::TooLarge("central directory offset"))?;

        info!(
            entries = count,
            cd_offset = record.cd_offset,
            cd_size = record.cd_size,
            "rewrote end of central directory"
        );
        self.emit(Bytes::from(record.encode()), out);
        Ok(())
    }
}

impl<S: Selector> Drop for ZipTransformer<S> {
    fn drop(&mut self) {
        self.release();
    }
}

/// State threaded through [`modify_zip`]'s pull loop
struct Pump<S: Selector> {
    input: ByteStream,
    transformer: ZipTransformer<S>,
    pending: VecDeque<Bytes>,
    done: bool,
}

async fn pump<S: Selector>(mut pump: Pump<S>) -> Result<Option<(Bytes, Pump<S>)>> {
    loop {
        if let Some(chunk) = pump.pending.pop_front() {
            return Ok(Some((chunk, pump)));
        }
        if pump.done {
            return Ok(None);
        }
        match pump.input.next().await {
            Some(chunk) => {
                let chunk = chunk?;
                pump.pending.extend(pump.transformer.push(&chunk)?);
            }
            None => {
                pump.transformer.finish()?;
                pump.done = true;
            }
        }
    }
}

/// Rewrite an archive stream.
///
/// Input is pulled only when the consumer asks for output that is not
/// already pending, so at most one captured entry is buffered at a time.
/// The returned stream ends after the first error; dropping it early drops
/// the input stream and notifies the selector.
pub fn modify_zip<St, S>(input: St, selector: S) -> impl Stream<Item = Result<Bytes>> + Send
where
    St: Stream<Item = Result<Bytes>> + Send + 'static,
    S: Selector + 'static,
{
    let state = Pump {
        input: input.boxed(),
        transformer: ZipTransformer::new(selector),
        pending: VecDeque::new(),
        done: false,
    };
    stream::try_unfold(state, pump)
}
