//! Checks shared by every transfer list input format, and selection of the
//! reader from a file name.

use super::csv::transfer_reader::TransferReader;
use super::json::JsonTransferReader;
use super::text::TextTransferReader;
use crate::domain::address::Address;
use crate::domain::codec::MAX_TOTAL;
use crate::domain::coins::Coins;
use crate::domain::transfer::Transfer;
use crate::error::{DisbursementError, Result};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

/// Largest input file accepted, in bytes.
pub const MAX_INPUT_BYTES: u64 = 1024 * 1024;

/// Input formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// `destination,amount` rows.
    Csv,
    /// An object mapping each destination to an amount string.
    Json,
    /// `destination: amount` lines.
    Text,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            Some("txt") => Ok(Self::Text),
            _ => Err(DisbursementError::ValidationError(format!(
                "unsupported input file {}: expected a .csv, .json or .txt extension",
                path.display()
            ))),
        }
    }
}

/// Reads and validates the transfer list stored at `path`.
pub fn read_transfer_file(path: &Path) -> Result<Vec<Transfer>> {
    let format = InputFormat::from_path(path)?;
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    if size > MAX_INPUT_BYTES {
        return Err(DisbursementError::ValidationError(format!(
            "input file is {size} bytes, the limit is {MAX_INPUT_BYTES}"
        )));
    }

    match format {
        InputFormat::Csv => TransferReader::new(file).read_list(),
        InputFormat::Json => JsonTransferReader::new(file).read_list(),
        InputFormat::Text => TextTransferReader::new(file).read_list(),
    }
}

/// Parses one entry. `location` names it in error messages, e.g. `line 3`.
pub fn parse_entry(location: &str, destination: &str, amount: &str) -> Result<Transfer> {
    let destination: Address = destination
        .parse()
        .map_err(|e| DisbursementError::ValidationError(format!("{location}: {e}")))?;

    let value = Decimal::from_str(amount).map_err(|_| {
        DisbursementError::ValidationError(format!(
            "{location}: amount \"{amount}\" is not a number"
        ))
    })?;
    if value <= Decimal::ZERO {
        return Err(DisbursementError::ValidationError(format!(
            "{location}: amount must be positive, got {value}"
        )));
    }
    let amount = Coins::from_decimal(value)
        .map_err(|e| DisbursementError::ValidationError(format!("{location}: {e}")))?;

    Ok(Transfer::new(destination, amount))
}

/// Collects parsed entries into a list one job can hold.
///
/// Fails on the first bad entry, on a repeated destination, and when the
/// list is longer than [`MAX_TOTAL`].
pub fn collect_list<I>(entries: I) -> Result<Vec<Transfer>>
where
    I: IntoIterator<Item = Result<Transfer>>,
{
    let mut seen = HashSet::new();
    let mut transfers = Vec::new();
    for (index, transfer) in entries.into_iter().enumerate() {
        let transfer = transfer?;
        if !seen.insert(transfer.destination) {
            return Err(DisbursementError::ValidationError(format!(
                "destination {} appears more than once (entry {})",
                transfer.destination,
                index + 1
            )));
        }
        transfers.push(transfer);
        if transfers.len() > MAX_TOTAL {
            return Err(DisbursementError::OversizedList {
                count: transfers.len(),
                max: MAX_TOTAL,
            });
        }
    }
    Ok(transfers)
}
