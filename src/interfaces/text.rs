use crate::domain::transfer::Transfer;
use crate::error::{DisbursementError, Result};
use crate::interfaces::transfer_list::{collect_list, parse_entry};
use std::io::{BufRead, BufReader, Read};

/// Reads a transfer list from `destination: amount` lines.
///
/// The separator is a colon followed by one space, so raw addresses such as
/// `0:4884...: 1.5` split after the hash. Blank lines are skipped.
pub struct TextTransferReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> TextTransferReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: BufReader::new(source),
        }
    }

    pub fn transfers(self) -> impl Iterator<Item = Result<Transfer>> {
        self.reader
            .lines()
            .enumerate()
            .filter(|(_, line)| line.as_ref().map_or(true, |l| !l.trim().is_empty()))
            .map(|(i, line)| parse_line(i + 1, &line?))
    }

    pub fn read_list(self) -> Result<Vec<Transfer>> {
        collect_list(self.transfers())
    }
}

fn parse_line(number: usize, line: &str) -> Result<Transfer> {
    let location = format!("line {number}");
    let (destination, amount) = line.trim().split_once(": ").ok_or_else(|| {
        DisbursementError::ValidationError(format!(
            "{location}: expected `destination: amount`, got \"{}\"",
            line.trim()
        ))
    })?;
    parse_entry(&location, destination.trim_end(), amount.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::address::Address;
    use crate::domain::coins::Coins;

    const A: &str = "EQBIhPuWmjT7fP-VomuTWseE8JNWv2q7QYfsVQ1IZwnMk8wL";
    const RAW: &str = "0:0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn test_text_lines() {
        let data = format!("{A}: 0.1\n\n{RAW}: 1.2\n");
        let list = TextTransferReader::new(data.as_bytes()).read_list().unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].destination, A.parse::<Address>().unwrap());
        assert_eq!(list[1].destination, RAW.parse::<Address>().unwrap());
        assert_eq!(list[1].amount, Coins::from_nano(1_200_000_000));
    }

    #[test]
    fn test_text_rejects_missing_separator() {
        for data in [format!("{A} 0.1\n"), format!("{A},0.1\n"), format!("{A}:0.1\n")] {
            let err = TextTransferReader::new(data.as_bytes()).read_list().unwrap_err();
            assert!(err.to_string().contains("expected `destination: amount`"), "{data}");
        }
    }

    #[test]
    fn test_text_names_file_line() {
        let data = format!("{A}: 1\n\n{RAW}: -1\n");
        let err = TextTransferReader::new(data.as_bytes()).read_list().unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
    }

    #[test]
    fn test_text_rejects_repeated_destination() {
        let data = format!("{A}: 1\n{A}: 2\n");
        let err = TextTransferReader::new(data.as_bytes()).read_list().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}
