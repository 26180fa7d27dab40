#![allow(dead_code)]

use mass_sender::domain::address::Address;
use mass_sender::domain::coins::Coins;
use mass_sender::domain::transfer::Transfer;
use rand::Rng;
use std::fs::File;
use std::io::Error;
use std::path::Path;

/// Distinct address derived from `n`.
pub fn address(n: u64) -> Address {
    let mut hash = [0u8; 32];
    hash[..8].copy_from_slice(&n.to_be_bytes());
    hash[31] = 0x5a;
    Address::new(0, hash)
}

/// `count` transfers of `amount` to distinct destinations.
pub fn uniform_transfers(count: usize, amount: Coins) -> Vec<Transfer> {
    (0..count)
        .map(|i| Transfer::new(address(10_000 + i as u64), amount))
        .collect()
}

/// `count` transfers with random amounts between 0.000000001 and 5.
pub fn random_transfers<R: Rng>(rng: &mut R, count: usize) -> Vec<Transfer> {
    (0..count)
        .map(|i| {
            let nano = rng.gen_range(1..=5_000_000_000u128);
            Transfer::new(address(20_000 + i as u64), Coins::from_nano(nano))
        })
        .collect()
}

/// Writes `transfers` as a `destination,amount` CSV, with or without a header.
pub fn write_transfers_csv(path: &Path, transfers: &[Transfer], header: bool) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    if header {
        wtr.write_record(["destination", "amount"])?;
    }
    for (i, transfer) in transfers.iter().enumerate() {
        // Alternate address forms; both must parse to the same destination.
        let destination = if i % 2 == 0 {
            transfer.destination.to_string()
        } else {
            transfer.destination.to_friendly(true, false)
        };
        wtr.write_record([destination, transfer.amount.to_string()])?;
    }

    wtr.flush()?;
    Ok(())
}
