//! Transfer batch codec.
//!
//! A transfer list is partitioned into a chain of chunks, each holding at
//! most [`QUOTA`] records, linked in list order. The chain has a compact,
//! deterministic binary form used both to derive a job's identity and to
//! persist the chunks a job has not processed yet.
//!
//! Layout, per chunk:
//!
//! ```text
//! count: u16 BE | record * count | link: u8 (0x00 last, 0x01 successor follows)
//! record := amount_len: u8 | amount: [u8; amount_len] BE minimal | workchain: u8 | hash: [u8; 32]
//! ```
//!
//! The empty list encodes to the empty byte string.

use super::address::Address;
use super::coins::Coins;
use super::transfer::Transfer;
use thiserror::Error;

/// Maximum outbound transfers the host permits in one activation.
pub const QUOTA: usize = 254;
/// Hard ceiling on the number of transfers in one job.
pub const MAX_TOTAL: usize = 4 * QUOTA;

const LINK_END: u8 = 0x00;
const LINK_NEXT: u8 = 0x01;
const MAX_AMOUNT_LEN: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("chunk {chunk} holds {count} records, more than the quota of {QUOTA}")]
    ChunkOverQuota { chunk: usize, count: usize },
    #[error("chunk {chunk} holds no records")]
    EmptyChunk { chunk: usize },
    #[error("chain holds at least {count} records, more than the limit of {MAX_TOTAL}")]
    TooManyRecords { count: usize },
    #[error("chunk {chunk} declares a successor but the chain ends")]
    MissingSuccessor { chunk: usize },
    #[error("chunk {chunk} has unknown link byte {byte:#04x}")]
    InvalidLink { chunk: usize, byte: u8 },
    #[error("amount length {0} exceeds {MAX_AMOUNT_LEN} bytes")]
    InvalidAmountLength(u8),
    #[error("amount at offset {0} is not minimally encoded")]
    NonMinimalAmount(usize),
    #[error("unexpected end of input at offset {0}")]
    Truncated(usize),
    #[error("{0} trailing bytes after the last chunk")]
    TrailingBytes(usize),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

pub type ChunkIndex = usize;

/// A bounded group of transfer records and the link to its successor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    transfers: Vec<Transfer>,
    next: Option<ChunkIndex>,
}

impl Chunk {
    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    pub fn next(&self) -> Option<ChunkIndex> {
        self.next
    }
}

/// The records one activation will process, and where the chain resumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSlice {
    pub transfers: Vec<Transfer>,
    pub chunks: usize,
    pub resume_at: Option<ChunkIndex>,
}

/// An arena of chunks with explicit successor links.
///
/// `head` points at the first chunk not processed yet. Processing only ever
/// moves `head` forward; chunks are never edited in place. Two chains are
/// equal when their pending chunks hold the same records.
#[derive(Debug, Clone, Default)]
pub struct ChunkChain {
    arena: Vec<Chunk>,
    head: Option<ChunkIndex>,
}

impl ChunkChain {
    /// Splits `transfers` into chunks of [`QUOTA`] records in list order.
    pub fn partition(transfers: &[Transfer]) -> Result<Self, CodecError> {
        Self::from_chunks(transfers.chunks(QUOTA).map(<[Transfer]>::to_vec).collect())
    }

    /// Links pre-built chunks in the given order, validating their bounds.
    pub fn from_chunks(chunks: Vec<Vec<Transfer>>) -> Result<Self, CodecError> {
        let mut total = 0usize;
        for (chunk, records) in chunks.iter().enumerate() {
            if records.is_empty() {
                return Err(CodecError::EmptyChunk { chunk });
            }
            if records.len() > QUOTA {
                return Err(CodecError::ChunkOverQuota {
                    chunk,
                    count: records.len(),
                });
            }
            total += records.len();
            if total > MAX_TOTAL {
                return Err(CodecError::TooManyRecords { count: total });
            }
        }

        let len = chunks.len();
        let arena: Vec<Chunk> = chunks
            .into_iter()
            .enumerate()
            .map(|(i, transfers)| Chunk {
                transfers,
                next: (i + 1 < len).then_some(i + 1),
            })
            .collect();
        let head = (!arena.is_empty()).then_some(0);
        Ok(Self { arena, head })
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Pending chunks, following links from the head.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> + '_ {
        std::iter::successors(self.head.map(|i| &self.arena[i]), |chunk| {
            chunk.next.map(|i| &self.arena[i])
        })
    }

    /// Number of pending chunks.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn transfers(&self) -> impl Iterator<Item = &Transfer> + '_ {
        self.iter().flat_map(|chunk| chunk.transfers.iter())
    }

    pub fn transfer_count(&self) -> usize {
        self.iter().map(Chunk::len).sum()
    }

    /// Takes chunks from the head while their combined size fits `QUOTA`.
    ///
    /// Returns `None` when nothing is pending.
    pub fn next_step(&self) -> Option<StepSlice> {
        let first = self.head?;
        let mut transfers = self.arena[first].transfers.clone();
        let mut chunks = 1;
        let mut resume_at = self.arena[first].next;
        while let Some(i) = resume_at {
            let candidate = &self.arena[i];
            if transfers.len() + candidate.len() > QUOTA {
                break;
            }
            transfers.extend_from_slice(&candidate.transfers);
            chunks += 1;
            resume_at = candidate.next;
        }
        Some(StepSlice {
            transfers,
            chunks,
            resume_at,
        })
    }

    /// Moves the head past the chunks of `step`, which must come from
    /// [`ChunkChain::next_step`] on this chain. A resume index outside the
    /// arena leaves the chain untouched.
    pub(crate) fn advance(&mut self, step: &StepSlice) {
        match step.resume_at {
            Some(i) if i >= self.arena.len() => {}
            resume_at => self.head = resume_at,
        }
    }

    /// Encodes the pending chunks.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut pending = self.iter().peekable();
        while let Some(chunk) = pending.next() {
            out.extend_from_slice(&(chunk.len() as u16).to_be_bytes());
            for transfer in &chunk.transfers {
                encode_record(transfer, &mut out);
            }
            out.push(if pending.peek().is_some() {
                LINK_NEXT
            } else {
                LINK_END
            });
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = Cursor::new(bytes);
        let mut chunks = Vec::new();
        let mut total = 0usize;

        while !cursor.is_at_end() {
            let chunk = chunks.len();
            let count = cursor.read_u16()? as usize;
            if count == 0 {
                return Err(CodecError::EmptyChunk { chunk });
            }
            if count > QUOTA {
                return Err(CodecError::ChunkOverQuota { chunk, count });
            }
            total += count;
            if total > MAX_TOTAL {
                return Err(CodecError::TooManyRecords { count: total });
            }

            let mut records = Vec::with_capacity(count);
            for _ in 0..count {
                records.push(decode_record(&mut cursor)?);
            }
            chunks.push(records);

            match cursor.read_u8()? {
                LINK_END => {
                    if !cursor.is_at_end() {
                        return Err(CodecError::TrailingBytes(cursor.remaining()));
                    }
                }
                LINK_NEXT => {
                    if cursor.is_at_end() {
                        return Err(CodecError::MissingSuccessor { chunk });
                    }
                }
                byte => return Err(CodecError::InvalidLink { chunk, byte }),
            }
        }

        Self::from_chunks(chunks)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    pub fn from_hex(s: &str) -> Result<Self, CodecError> {
        let bytes = hex::decode(s).map_err(|e| CodecError::InvalidHex(e.to_string()))?;
        Self::decode(&bytes)
    }
}

impl PartialEq for ChunkChain {
    fn eq(&self, other: &Self) -> bool {
        self.iter()
            .map(Chunk::transfers)
            .eq(other.iter().map(Chunk::transfers))
    }
}

impl Eq for ChunkChain {}

fn encode_record(transfer: &Transfer, out: &mut Vec<u8>) {
    let amount = transfer.amount.nano().to_be_bytes();
    let skip = amount.iter().take_while(|b| **b == 0).count();
    out.push((MAX_AMOUNT_LEN - skip) as u8);
    out.extend_from_slice(&amount[skip..]);
    out.push(transfer.destination.workchain as u8);
    out.extend_from_slice(&transfer.destination.hash);
}

fn decode_record(cursor: &mut Cursor<'_>) -> Result<Transfer, CodecError> {
    let len = cursor.read_u8()?;
    if len as usize > MAX_AMOUNT_LEN {
        return Err(CodecError::InvalidAmountLength(len));
    }
    let offset = cursor.pos;
    let digits = cursor.take(len as usize)?;
    if digits.first() == Some(&0) {
        return Err(CodecError::NonMinimalAmount(offset));
    }
    let mut amount = [0u8; MAX_AMOUNT_LEN];
    amount[MAX_AMOUNT_LEN - digits.len()..].copy_from_slice(digits);

    let workchain = cursor.read_u8()? as i8;
    let mut hash = [0u8; 32];
    hash.copy_from_slice(cursor.take(32)?);

    Ok(Transfer::new(
        Address::new(workchain, hash),
        Coins::from_nano(u128::from_be_bytes(amount)),
    ))
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated(self.bytes.len()));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }
}
