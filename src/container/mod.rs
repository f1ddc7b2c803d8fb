//! Container engine: writer and reader.
//!
//! # Writer
//! [`ContainerWriter`] writes the header (magic, schema text, metadata,
//! sync marker) immediately on `create`, then buffers encoded records
//! until a flush threshold (pending record count or pending payload
//! bytes) emits a block: `object-count | payload-length | payload |
//! sync-marker`.  `close` flushes whatever is buffered, so no appended
//! record is ever dropped, and is idempotent; `append` after `close`
//! fails with [`ContainerError::Closed`].
//!
//! # Reader
//! [`ContainerReader`] parses the header on `open` (an unreadable header
//! is fatal) and exposes the recovered schema, which is all the decoder
//! needs; the caller need not know the record shape in advance.  Records
//! are pulled one at a time with `has_next`/`next_record`; blocks are
//! loaded whole and their trailing sync marker checked against the
//! header's.  A marker mismatch or a truncated tail ends iteration
//! silently: records from intact blocks are served, the damaged tail is
//! not.  The `Iterator` impl is the same sequence as a lazy, forward-only
//! view; it is not restartable after exhaustion.
//!
//! # Sinks and sources
//! The writer owns a plain `Write` sink and the reader a plain `Read`
//! source; nothing here touches the file system directly, so both run
//! against in-memory buffers in tests.

use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};

use thiserror::Error;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::decode::{self, decode_record, DecodingError, MAX_DECODE_LEN};
use crate::encode::{encode_record_into, EncodingError};
use crate::header::{ContainerHeader, HeaderError, SYNC_MARKER_LEN};
use crate::schema::Schema;
use crate::value::Record;
use crate::varint;

/// Flush after this many buffered records.
pub const DEFAULT_BLOCK_RECORDS: usize = 100;
/// Flush once the pending payload reaches this many bytes.
pub const DEFAULT_BLOCK_BYTES: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("invalid container: {0}")]
    InvalidContainer(#[from] HeaderError),
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
    #[error("decoding error: {0}")]
    Decoding(#[from] DecodingError),
    #[error("writer used after close")]
    Closed,
    #[error("no further records: reader is exhausted")]
    Exhausted,
    #[error("container schema does not match the expected record schema")]
    SchemaMismatch,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Writer ───────────────────────────────────────────────────────────────────

/// Configuration for [`ContainerWriter::with_options`].
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Block flush threshold by buffered record count.
    pub block_records: usize,
    /// Block flush threshold by pending payload bytes.
    pub block_bytes: usize,
    /// Fixed sync marker; `None` generates a fresh random one per file.
    pub sync_marker: Option<[u8; SYNC_MARKER_LEN]>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            block_records: DEFAULT_BLOCK_RECORDS,
            block_bytes: DEFAULT_BLOCK_BYTES,
            sync_marker: None,
        }
    }
}

pub struct ContainerWriter<W: Write> {
    sink: W,
    schema: Schema,
    sync_marker: [u8; SYNC_MARKER_LEN],
    pending: Vec<u8>,
    pending_records: u64,
    opts: WriterOptions,
    closed: bool,
}

impl<W: Write> ContainerWriter<W> {
    /// Open a writer with default thresholds and a fresh sync marker.
    /// The header is written to `sink` before this returns.
    pub fn create(
        schema: Schema,
        sink: W,
        metadata: HashMap<String, String>,
    ) -> Result<Self, ContainerError> {
        Self::with_options(schema, sink, metadata, WriterOptions::default())
    }

    pub fn with_options(
        schema: Schema,
        mut sink: W,
        metadata: HashMap<String, String>,
        opts: WriterOptions,
    ) -> Result<Self, ContainerError> {
        let sync_marker = opts
            .sync_marker
            .unwrap_or_else(|| Uuid::new_v4().into_bytes());
        let header = ContainerHeader { schema: schema.clone(), metadata, sync_marker };
        header.write(&mut sink)?;
        Ok(Self {
            sink,
            schema,
            sync_marker,
            pending: Vec::new(),
            pending_records: 0,
            opts: WriterOptions { block_records: opts.block_records.max(1), ..opts },
            closed: false,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn sync_marker(&self) -> [u8; SYNC_MARKER_LEN] {
        self.sync_marker
    }

    /// Validate `record` against the writer's schema and buffer it.
    ///
    /// A record that fails the type check leaves the writer unchanged:
    /// no partial bytes reach the pending block or the sink.
    pub fn append(&mut self, record: &Record) -> Result<(), ContainerError> {
        if self.closed {
            return Err(ContainerError::Closed);
        }
        encode_record_into(&self.schema, record, &mut self.pending)?;
        self.pending_records += 1;
        if self.pending_records >= self.opts.block_records as u64
            || self.pending.len() >= self.opts.block_bytes
        {
            self.flush_block()?;
        }
        Ok(())
    }

    fn flush_block(&mut self) -> Result<(), ContainerError> {
        if self.pending_records == 0 {
            return Ok(());
        }
        let mut frame = Vec::with_capacity(self.pending.len() + SYNC_MARKER_LEN + 20);
        varint::encode_long(self.pending_records as i64, &mut frame);
        varint::encode_long(self.pending.len() as i64, &mut frame);
        frame.extend_from_slice(&self.pending);
        frame.extend_from_slice(&self.sync_marker);
        self.sink.write_all(&frame)?;
        debug!(
            records = self.pending_records,
            bytes = self.pending.len(),
            "flushed block"
        );
        self.pending.clear();
        self.pending_records = 0;
        Ok(())
    }

    /// Flush any partially-filled block and seal the writer.
    /// A second `close` is a no-op.
    pub fn close(&mut self) -> Result<(), ContainerError> {
        if self.closed {
            return Ok(());
        }
        self.flush_block()?;
        self.sink.flush()?;
        self.closed = true;
        Ok(())
    }

    /// Close and hand back the sink.
    pub fn into_inner(mut self) -> Result<W, ContainerError> {
        self.close()?;
        Ok(self.sink)
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ContainerReader<R: Read> {
    source: R,
    header: ContainerHeader,
    block: Cursor<Vec<u8>>,
    block_remaining: u64,
    exhausted: bool,
}

impl<R: Read> ContainerReader<R> {
    /// Parse the header and expose the recovered schema.  A missing or
    /// garbled header fails here; nothing after it can be trusted.
    pub fn open(mut source: R) -> Result<Self, ContainerError> {
        let header = ContainerHeader::read(&mut source)?;
        debug!(fields = header.schema.len(), "opened container");
        Ok(Self {
            source,
            header,
            block: Cursor::new(Vec::new()),
            block_remaining: 0,
            exhausted: false,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.header.schema
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.header.metadata
    }

    /// Whether at least one more record is available, loading the next
    /// block (and verifying its sync marker) when the current one is
    /// spent.  Corrupt or truncated tails end iteration here, quietly.
    pub fn has_next(&mut self) -> bool {
        if self.block_remaining > 0 {
            return true;
        }
        while !self.exhausted {
            match self.advance_block() {
                // An empty block is legal framing; keep scanning.
                Ok(true) if self.block_remaining == 0 => continue,
                Ok(true) => return true,
                Ok(false) => self.exhausted = true,
                Err(_) => {
                    // Indistinguishable from a truncated tail; records
                    // already served remain valid.
                    debug!("soft end: unreadable block tail");
                    self.exhausted = true;
                }
            }
        }
        false
    }

    /// Decode exactly one record, or fail with
    /// [`ContainerError::Exhausted`] past the end of the stream.
    pub fn next_record(&mut self) -> Result<Record, ContainerError> {
        if !self.has_next() {
            return Err(ContainerError::Exhausted);
        }
        let record = decode_record(&self.header.schema, &mut self.block)?;
        self.block_remaining -= 1;
        Ok(record)
    }

    /// `Ok(true)`: next block loaded.  `Ok(false)`: clean end of stream,
    /// or a sync-marker mismatch (tail cannot be trusted).  `Err`: the
    /// tail is malformed or cut short mid-block.
    fn advance_block(&mut self) -> Result<bool, ContainerError> {
        let count = match varint::read_long_or_eof(&mut self.source)
            .map_err(DecodingError::from)?
        {
            None => return Ok(false),
            Some(n) => n,
        };
        if count < 0 {
            return Err(DecodingError::NegativeLength(count).into());
        }

        let payload_len = varint::read_long(&mut self.source).map_err(DecodingError::from)?;
        if payload_len < 0 {
            return Err(DecodingError::NegativeLength(payload_len).into());
        }
        if payload_len as u64 > MAX_DECODE_LEN {
            return Err(DecodingError::LengthOverflow {
                len: payload_len as u64,
                max: MAX_DECODE_LEN,
            }
            .into());
        }

        let payload = decode::read_exact_len(&mut self.source, payload_len as u64)?;

        let mut sync = [0u8; SYNC_MARKER_LEN];
        self.source.read_exact(&mut sync).map_err(DecodingError::from)?;
        if sync != self.header.sync_marker {
            debug!("sync marker mismatch, stopping before this block");
            return Ok(false);
        }

        trace!(records = count, bytes = payload.len(), "entered block");
        self.block = Cursor::new(payload);
        self.block_remaining = count as u64;
        Ok(true)
    }
}

impl<R: Read> Iterator for ContainerReader<R> {
    type Item = Result<Record, ContainerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.has_next() {
            Some(self.next_record())
        } else {
            None
        }
    }
}
