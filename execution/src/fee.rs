//! Entrance fee pricing.
//!
//! The minimum entry value is fixed in reference-currency base units (18 decimals).
//! The fee in native base units is `minimum * 10^decimals / price`, rounded down,
//! where `price / 10^decimals` is the feed's answer.

use raffle_types::{Amount, Error, PriceReading};

/// Compute the fee required to enter given the latest price reading.
pub fn entrance_fee(minimum_reference_value: Amount, reading: PriceReading) -> Result<Amount, Error> {
    if reading.price <= 0 {
        return Err(Error::OracleUnavailable(format!(
            "non-positive price {}",
            reading.price
        )));
    }
    let price = reading.price as u128;
    let scale = 10u128
        .checked_pow(reading.decimals as u32)
        .ok_or(Error::FeeOverflow)?;
    let scaled = minimum_reference_value
        .checked_mul(scale)
        .ok_or(Error::FeeOverflow)?;
    Ok(scaled / price)
}
