//! Journal page codec.
//!
//! ```text
//! magic u32 | version u16 | record_count u32 | payload_len u32 | crc32 u32 | payload
//! ```
//!
//! All integers are little-endian. The payload holds the columns in this
//! order, each with `record_count` entries:
//!
//! 1. combined ids, `i64`
//! 2. metadata words, `i64`
//! 3. feature bitmaps, `i32`
//! 4. sizes, `i32`
//! 5. terms: varint term count, then per term `i64` id, `u16` flags and a
//!    delta-coded position list
//! 6. spans: one encoded [`DocumentSpans`] record per document

use std::fs;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::error::{Result, TesseraError};
use crate::id::is_clean;
use crate::journal::{JournalRecord, JournalTerm};
use crate::metadata::{DocumentMetadata, WordFlags};
use crate::spans::DocumentSpans;
use crate::util::varint::{decode_delta_list, decode_u32, encode_delta_list, encode_u32_into};

pub const PAGE_MAGIC: u32 = 0x5453_4A50; // "PJST"
pub const PAGE_VERSION: u16 = 1;
pub const HEADER_BYTES: usize = 18;

/// Bytes per record taken by the four fixed-width columns.
const FIXED_COLUMN_BYTES: usize = 8 + 8 + 4 + 4;

/// A decoded, validated journal page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalPage {
    records: Vec<JournalRecord>,
}

impl JournalPage {
    pub fn new(records: Vec<JournalRecord>) -> Self {
        JournalPage { records }
    }

    pub fn records(&self) -> &[JournalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Read and validate the page at `path`.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        Self::decode(&bytes)
            .map_err(|e| TesseraError::journal(format!("{}: {e}", path.display())))
    }

    /// Serialize the page, header included.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut payload = Vec::new();

        for r in &self.records {
            payload.write_i64::<LittleEndian>(r.id)?;
        }
        for r in &self.records {
            payload.write_i64::<LittleEndian>(r.metadata.0)?;
        }
        for r in &self.records {
            payload.write_i32::<LittleEndian>(r.features)?;
        }
        for r in &self.records {
            payload.write_i32::<LittleEndian>(r.size)?;
        }
        for r in &self.records {
            encode_u32_into(&mut payload, r.terms.len() as u32);
            for term in &r.terms {
                payload.write_i64::<LittleEndian>(term.term_id)?;
                payload.write_u16::<LittleEndian>(term.flags.0)?;
                encode_delta_list(&mut payload, &term.positions);
            }
        }
        for r in &self.records {
            r.spans.encode(&mut payload);
        }

        let payload_len = u32::try_from(payload.len())
            .map_err(|_| TesseraError::journal("page payload exceeds 4 GiB"))?;

        let mut bytes = Vec::with_capacity(HEADER_BYTES + payload.len());
        bytes.write_u32::<LittleEndian>(PAGE_MAGIC)?;
        bytes.write_u16::<LittleEndian>(PAGE_VERSION)?;
        bytes.write_u32::<LittleEndian>(self.records.len() as u32)?;
        bytes.write_u32::<LittleEndian>(payload_len)?;
        bytes.write_u32::<LittleEndian>(crc32fast::hash(&payload))?;
        bytes.extend_from_slice(&payload);

        Ok(bytes)
    }

    /// Parse and validate a serialized page.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_BYTES {
            return Err(TesseraError::journal(format!(
                "page of {} bytes is shorter than its header",
                bytes.len()
            )));
        }

        let magic = LittleEndian::read_u32(&bytes[0..4]);
        if magic != PAGE_MAGIC {
            return Err(TesseraError::journal(format!("bad page magic {magic:#010x}")));
        }
        let version = LittleEndian::read_u16(&bytes[4..6]);
        if version != PAGE_VERSION {
            return Err(TesseraError::journal(format!(
                "unsupported page version {version}"
            )));
        }
        let count = LittleEndian::read_u32(&bytes[6..10]) as usize;
        let payload_len = LittleEndian::read_u32(&bytes[10..14]) as usize;
        let checksum = LittleEndian::read_u32(&bytes[14..18]);

        let payload = &bytes[HEADER_BYTES..];
        if payload.len() != payload_len {
            return Err(TesseraError::journal(format!(
                "payload is {} bytes, header says {payload_len}",
                payload.len()
            )));
        }
        if crc32fast::hash(payload) != checksum {
            return Err(TesseraError::journal("page checksum mismatch"));
        }
        if count.saturating_mul(FIXED_COLUMN_BYTES) > payload.len() {
            return Err(TesseraError::journal(format!(
                "{count} records do not fit in a {payload_len} byte payload"
            )));
        }

        let mut cursor = PayloadCursor::new(payload);

        let ids = cursor.fixed_column(count, 8, LittleEndian::read_i64)?;
        let metadata = cursor.fixed_column(count, 8, LittleEndian::read_i64)?;
        let features = cursor.fixed_column(count, 4, LittleEndian::read_i32)?;
        let sizes = cursor.fixed_column(count, 4, LittleEndian::read_i32)?;

        let mut terms = Vec::with_capacity(count);
        for _ in 0..count {
            terms.push(cursor.terms()?);
        }
        let mut spans = Vec::with_capacity(count);
        for _ in 0..count {
            spans.push(cursor.spans()?);
        }

        if !cursor.is_at_end() {
            return Err(TesseraError::journal(format!(
                "{} trailing payload bytes after the last column",
                cursor.remaining()
            )));
        }

        let mut records = Vec::with_capacity(count);
        let columns = ids
            .into_iter()
            .zip(metadata)
            .zip(features)
            .zip(sizes)
            .zip(terms)
            .zip(spans);
        for (((((id, meta), features), size), terms), spans) in columns {
            if id < 0 || !is_clean(id) {
                return Err(TesseraError::journal(format!(
                    "record id {id:#x} is not a clean document id"
                )));
            }
            records.push(JournalRecord {
                id,
                metadata: DocumentMetadata(meta),
                features,
                size,
                terms,
                spans,
            });
        }

        Ok(JournalPage { records })
    }
}

struct PayloadCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> PayloadCursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        PayloadCursor { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn is_at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(TesseraError::journal(format!(
                "column truncated: wanted {len} bytes at {}, {} left",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn fixed_column<T>(&mut self, count: usize, width: usize, read: fn(&[u8]) -> T) -> Result<Vec<T>> {
        let column = self.take(count * width)?;
        Ok(column.chunks_exact(width).map(read).collect())
    }

    fn terms(&mut self) -> Result<Vec<JournalTerm>> {
        let (count, read) = decode_u32(&self.bytes[self.pos..]).map_err(malformed)?;
        self.pos += read;

        let mut terms = Vec::with_capacity((count as usize).min(self.remaining() / 11));
        for _ in 0..count {
            let term_id = LittleEndian::read_i64(self.take(8)?);
            let flags = WordFlags(LittleEndian::read_u16(self.take(2)?));

            let (positions, read) =
                decode_delta_list(&self.bytes[self.pos..]).map_err(malformed)?;
            self.pos += read;

            if positions.first().is_some_and(|&p| p < 0)
                || positions.windows(2).any(|w| w[1] < w[0])
            {
                return Err(TesseraError::journal(format!(
                    "positions of term {term_id} are not ascending"
                )));
            }

            terms.push(JournalTerm {
                term_id,
                flags,
                positions,
            });
        }
        Ok(terms)
    }

    fn spans(&mut self) -> Result<DocumentSpans> {
        let (spans, read) = DocumentSpans::decode(&self.bytes[self.pos..]).map_err(malformed)?;
        self.pos += read;
        Ok(spans)
    }
}

fn malformed(e: TesseraError) -> TesseraError {
    TesseraError::journal(format!("malformed column: {e}"))
}
