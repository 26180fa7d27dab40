use crate::domain::transfer::Transfer;
use crate::error::{DisbursementError, Result};
use crate::interfaces::transfer_list::{collect_list, parse_entry};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct TransferRow {
    destination: String,
    amount: String,
}

/// Reads a transfer list from a CSV source.
///
/// Each row is `destination,amount`, the amount in display units (e.g.
/// `0.5`). A leading `destination,amount` header is optional. Whitespace is
/// trimmed and empty lines are skipped.
pub struct TransferReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> TransferReader<R> {
    /// Creates a new `TransferReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily parses rows into transfers.
    ///
    /// Each item stands alone: list-level checks such as duplicate
    /// destinations are left to [`TransferReader::read_list`].
    pub fn transfers(self) -> impl Iterator<Item = Result<Transfer>> {
        self.reader
            .into_records()
            .enumerate()
            .filter(|(i, record)| {
                !(*i == 0
                    && record
                        .as_ref()
                        .is_ok_and(|r| r.get(0).is_some_and(|f| f.eq_ignore_ascii_case("destination"))))
            })
            .map(|(i, record)| parse_row(i + 1, record?))
    }

    /// Reads and validates the whole list.
    ///
    /// Fails on the first bad row, on a repeated destination, and when the
    /// list is longer than one job can hold.
    pub fn read_list(self) -> Result<Vec<Transfer>> {
        collect_list(self.transfers())
    }
}

/// `index` is only used when the record carries no position.
fn parse_row(index: usize, record: csv::StringRecord) -> Result<Transfer> {
    let line = record.position().map_or(index as u64, |p| p.line());
    let location = format!("line {line}");
    let parsed: TransferRow = record
        .deserialize(None)
        .map_err(|e| DisbursementError::ValidationError(format!("{location}: {e}")))?;

    parse_entry(&location, &parsed.destination, &parsed.amount)
}
