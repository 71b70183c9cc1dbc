use crate::document::Document;
use crate::document::codec::{ByteReader, decode_document, encode_document};
use crate::error::{Error, Result};
use crate::types::Sequence;

/// Kind of mutation a journal record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Insert = 0x01,
    Update = 0x02,
    Delete = 0x03,
}

impl RecordType {
    fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(RecordType::Insert),
            0x02 => Ok(RecordType::Update),
            0x03 => Ok(RecordType::Delete),
            _ => Err(Error::Format(format!("invalid record type: {byte}"))),
        }
    }
}

/// A single mutation in the journal.
///
/// On-disk format:
/// ```text
/// ┌──────────┬─────────┬──────────┬──────────┬────────────┬───────────┬────────────┬───────────┐
/// │ CRC (4B) │ Len (4B)│ Type (1B)│ Seq (8B) │ KeyLen (4B)│ Key (var) │ DocLen (8B)│ Doc (var) │
/// └──────────┴─────────┴──────────┴──────────┴────────────┴───────────┴────────────┴───────────┘
/// ```
///
/// `Len` counts the payload after itself. CRC covers everything after the
/// CRC field. Delete records stop after the key. A record whose CRC does not
/// match was cut short by a crash; nothing valid follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalRecord {
    pub record_type: RecordType,
    pub sequence: Sequence,
    pub key: String,
    /// Encoded document bytes; empty for deletes.
    pub document: Vec<u8>,
}

const CRC_SIZE: usize = 4;
const LEN_SIZE: usize = 4;
const TYPE_SIZE: usize = 1;
const SEQ_SIZE: usize = 8;
const KEY_LEN_SIZE: usize = 4;
const DOC_LEN_SIZE: usize = 8;
const HEADER_SIZE: usize = CRC_SIZE + LEN_SIZE + TYPE_SIZE + SEQ_SIZE + KEY_LEN_SIZE;

impl JournalRecord {
    pub fn insert(sequence: Sequence, key: &str, document: &Document) -> Self {
        Self::with_document(RecordType::Insert, sequence, key, document)
    }

    pub fn update(sequence: Sequence, key: &str, document: &Document) -> Self {
        Self::with_document(RecordType::Update, sequence, key, document)
    }

    pub fn delete(sequence: Sequence, key: &str) -> Self {
        JournalRecord {
            record_type: RecordType::Delete,
            sequence,
            key: key.to_owned(),
            document: Vec::new(),
        }
    }

    fn with_document(record_type: RecordType, sequence: Sequence, key: &str, document: &Document) -> Self {
        JournalRecord {
            record_type,
            sequence,
            key: key.to_owned(),
            document: encode_document(document),
        }
    }

    /// Decode the carried document. `None` for deletes.
    pub fn decode_document(&self) -> Result<Option<Document>> {
        match self.record_type {
            RecordType::Delete => Ok(None),
            RecordType::Insert | RecordType::Update => decode_document(&self.document).map(Some),
        }
    }

    fn document_section_len(&self) -> usize {
        match self.record_type {
            RecordType::Delete => 0,
            RecordType::Insert | RecordType::Update => DOC_LEN_SIZE + self.document.len(),
        }
    }

    fn payload_len(&self) -> usize {
        self.encoded_size() - CRC_SIZE - LEN_SIZE
    }

    /// Serialize this record to bytes (including CRC header).
    pub fn encode(&self) -> Vec<u8> {
        let payload_len = self.payload_len();
        let mut buf = Vec::with_capacity(CRC_SIZE + LEN_SIZE + payload_len);

        // CRC placeholder, filled once the rest is written
        buf.extend_from_slice(&[0u8; CRC_SIZE]);
        buf.extend_from_slice(&(payload_len as u32).to_le_bytes());
        buf.push(self.record_type as u8);
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&(self.key.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.key.as_bytes());
        if self.record_type != RecordType::Delete {
            buf.extend_from_slice(&(self.document.len() as u64).to_le_bytes());
            buf.extend_from_slice(&self.document);
        }

        let crc = crc32fast::hash(&buf[CRC_SIZE..]);
        buf[..CRC_SIZE].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Deserialize the record at the start of `data`. Returns an error if the
    /// record is truncated or its CRC doesn't match.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let stored_crc = u32::from_le_bytes(reader.array()?);
        let payload_len = reader.u32()? as usize;
        let payload = reader.take(payload_len)?;

        let computed_crc = crc32fast::hash(&data[CRC_SIZE..CRC_SIZE + LEN_SIZE + payload_len]);
        if stored_crc != computed_crc {
            return Err(Error::Format("CRC mismatch".into()));
        }

        let mut reader = ByteReader::new(payload);
        let record_type = RecordType::from_u8(reader.u8()?)?;
        let sequence = reader.u64()?;
        let key = reader.string()?;
        let document = match record_type {
            RecordType::Delete => Vec::new(),
            RecordType::Insert | RecordType::Update => {
                let doc_len = usize::try_from(reader.u64()?)
                    .map_err(|_| Error::Format("document length overflows usize".into()))?;
                reader.take(doc_len)?.to_vec()
            }
        };
        reader.finish()?;

        Ok(JournalRecord {
            record_type,
            sequence,
            key,
            document,
        })
    }

    /// Size of this record when serialized on disk.
    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE + self.key.len() + self.document_section_len()
    }
}
