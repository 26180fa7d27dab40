use super::address::Address;
use super::coins::Coins;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// One destination transfer. Immutable once a job is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub destination: Address,
    pub amount: Coins,
}

impl Transfer {
    pub fn new(destination: Address, amount: Coins) -> Self {
        Self {
            destination,
            amount,
        }
    }
}

/// Sum of the amounts in `transfers`.
pub fn total_amount<'a, I>(transfers: I) -> Result<Coins>
where
    I: IntoIterator<Item = &'a Transfer>,
{
    Coins::checked_sum(transfers.into_iter().map(|t| t.amount))
}

/// An action the host performs on behalf of an activation once it commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OutboundAction {
    /// Payment of a transfer record to its destination.
    Transfer(Transfer),
    /// Surplus value returned to the activating caller.
    Refund { to: Address, amount: Coins },
}

impl OutboundAction {
    pub fn recipient(&self) -> Address {
        match self {
            OutboundAction::Transfer(t) => t.destination,
            OutboundAction::Refund { to, .. } => *to,
        }
    }

    pub fn amount(&self) -> Coins {
        match self {
            OutboundAction::Transfer(t) => t.amount,
            OutboundAction::Refund { amount, .. } => *amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_amount() {
        let dest = Address::new(0, [1; 32]);
        let transfers = vec![
            Transfer::new(dest, Coins::from_nano(5)),
            Transfer::new(dest, Coins::from_nano(7)),
        ];
        assert_eq!(total_amount(&transfers).unwrap(), Coins::from_nano(12));
        assert_eq!(total_amount(&Vec::<Transfer>::new()).unwrap(), Coins::ZERO);
    }

    #[test]
    fn test_action_accessors() {
        let dest = Address::new(0, [2; 32]);
        let transfer = OutboundAction::Transfer(Transfer::new(dest, Coins::from_nano(3)));
        assert_eq!(transfer.recipient(), dest);
        assert_eq!(transfer.amount(), Coins::from_nano(3));

        let refund = OutboundAction::Refund {
            to: dest,
            amount: Coins::from_nano(9),
        };
        assert_eq!(refund.amount(), Coins::from_nano(9));
    }
}
