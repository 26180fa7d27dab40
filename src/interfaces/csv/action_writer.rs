use crate::domain::transfer::OutboundAction;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ActionRow {
    kind: &'static str,
    recipient: String,
    amount: String,
}

impl From<&OutboundAction> for ActionRow {
    fn from(action: &OutboundAction) -> Self {
        let kind = match action {
            OutboundAction::Transfer(_) => "transfer",
            OutboundAction::Refund { .. } => "refund",
        };
        Self {
            kind,
            recipient: action.recipient().to_string(),
            amount: action.amount().to_string(),
        }
    }
}

/// Writes the outbound actions of an activation as CSV.
///
/// Columns are `kind,recipient,amount`, the amount in display units.
pub struct ActionWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ActionWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_actions<'a, I>(&mut self, actions: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a OutboundAction>,
    {
        let mut wrote_any = false;
        for action in actions {
            self.writer.serialize(ActionRow::from(action))?;
            wrote_any = true;
        }
        if !wrote_any {
            self.writer.write_record(["kind", "recipient", "amount"])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::address::Address;
    use crate::domain::coins::Coins;
    use crate::domain::transfer::Transfer;

    #[test]
    fn test_write_actions() {
        let dest = Address::new(0, [0x11; 32]);
        let caller = Address::new(-1, [0x22; 32]);
        let actions = vec![
            OutboundAction::Transfer(Transfer::new(dest, Coins::from_nano(1_500_000_000))),
            OutboundAction::Refund {
                to: caller,
                amount: Coins::from_nano(100_000_000),
            },
        ];

        let mut out = Vec::new();
        ActionWriter::new(&mut out).write_actions(&actions).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "kind,recipient,amount");
        assert_eq!(lines[1], format!("transfer,0:{},1.5", "11".repeat(32)));
        assert_eq!(lines[2], format!("refund,-1:{},0.1", "22".repeat(32)));
    }

    #[test]
    fn test_write_no_actions_keeps_header() {
        let mut out = Vec::new();
        ActionWriter::new(&mut out).write_actions(&[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "kind,recipient,amount\n");
    }
}
