use crate::domain::transfer::Transfer;
use crate::error::{DisbursementError, Result};
use crate::interfaces::transfer_list::{collect_list, parse_entry};
use serde::Deserialize;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde_json::Value;
use std::fmt;
use std::io::Read;

/// Object entries in document order. Repeated keys are all kept.
struct Entries(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for Entries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Entries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping destinations to amounts")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Entries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, Value>()? {
                    entries.push(entry);
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Reads a transfer list from a JSON object.
///
/// Keys are destinations and values amount strings in display units:
/// `{ "EQBIhPuW...": "0.1" }`. Numbers are rejected so no amount goes
/// through a float.
pub struct JsonTransferReader<R: Read> {
    source: R,
}

impl<R: Read> JsonTransferReader<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Parses entries in document order.
    pub fn transfers(self) -> Result<Vec<Result<Transfer>>> {
        let Entries(entries) = serde_json::from_reader(self.source).map_err(|e| {
            DisbursementError::ValidationError(format!("invalid JSON transfer list: {e}"))
        })?;

        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(i, (destination, amount))| {
                let location = format!("entry {}", i + 1);
                match amount {
                    Value::String(amount) => parse_entry(&location, &destination, &amount),
                    other => Err(DisbursementError::ValidationError(format!(
                        "{location}: amount for {destination} must be a string, got {other}"
                    ))),
                }
            })
            .collect())
    }

    pub fn read_list(self) -> Result<Vec<Transfer>> {
        collect_list(self.transfers()?)
    }
}
