//! C1: instrument identity and exact venue-decimal <-> tick-space
//! conversions. This is the one place floating point or arbitrary-precision
//! decimal arithmetic is allowed to appear; everything downstream of it
//! operates on plain integers.

use crate::errors::InstrumentError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Default tolerance, expressed as a fraction of one tick, below which a
/// quotation's residual from the price lattice is considered rounding
/// noise rather than a contract violation.
pub const DEFAULT_TICK_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

/// A tradeable instrument: immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    id: String,
    lot_size: i64,
    px_step: Decimal,
    tick_tolerance: Decimal,
}

impl Instrument {
    /// Construct an instrument. `lot_size` must be positive and `px_step`
    /// a positive rational with enough precision to exactly recover the
    /// integer tick count of any quotation the venue emits.
    pub fn new(id: impl Into<String>, lot_size: i64, px_step: Decimal) -> Self {
        assert!(lot_size > 0, "lot_size must be positive, got {lot_size}");
        assert!(px_step > Decimal::ZERO, "px_step must be positive, got {px_step}");
        Self {
            id: id.into(),
            lot_size,
            px_step,
            tick_tolerance: DEFAULT_TICK_TOLERANCE,
        }
    }

    /// Override the default rounding tolerance (tests exercise this with a
    /// much wider window to probe rejection behaviour).
    pub fn with_tick_tolerance(mut self, tolerance: Decimal) -> Self {
        self.tick_tolerance = tolerance;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn lot_size(&self) -> i64 {
        self.lot_size
    }

    pub fn px_step(&self) -> Decimal {
        self.px_step
    }

    /// Convert a venue decimal quotation (`units` + `nano` billionths) to
    /// an integer tick price, rounding to the nearest tick and rejecting
    /// quotations that do not lie on the lattice within tolerance.
    pub fn quotation_to_px(&self, units: i64, nano: i32) -> Result<i64, InstrumentError> {
        let quotation = Decimal::from(units) + Decimal::new(nano as i64, 9);
        let raw_ticks = quotation / self.px_step;
        let rounded = raw_ticks.round();
        let residual = (raw_ticks - rounded).abs();
        if residual > self.tick_tolerance {
            return Err(InstrumentError::Precision {
                residual_nano: (residual * Decimal::new(1_000_000_000, 0))
                    .to_i64()
                    .unwrap_or(i64::MAX),
                tolerance_nano: (self.tick_tolerance * Decimal::new(1_000_000_000, 0))
                    .to_i64()
                    .unwrap_or(0),
            });
        }
        Ok(rounded.to_i64().expect("tick price fits in i64"))
    }

    /// Convert an integer tick price back to a venue decimal quotation.
    pub fn px_to_quotation(&self, px: i64) -> (i64, i32) {
        let value = Decimal::from(px) * self.px_step;
        let units = value.trunc();
        let nano = ((value - units) * Decimal::new(1_000_000_000, 0))
            .round()
            .to_i64()
            .unwrap_or(0);
        let units_i64 = units.to_i64().expect("quotation units fit in i64");
        // Rounding the fractional part can carry into a full unit (e.g.
        // 0.999_999_999_6 -> nano == 1_000_000_000); normalize that here so
        // the invariant `nano in [0, 1e9)` always holds.
        if nano >= 1_000_000_000 {
            (units_i64 + 1, 0)
        } else {
            (units_i64, nano as i32)
        }
    }

    /// Convert a raw venue quantity to lots, failing if it does not divide
    /// evenly by `lot_size`.
    pub fn qty_to_lots(&self, raw_qty: i64) -> Result<i64, InstrumentError> {
        if raw_qty % self.lot_size != 0 {
            return Err(InstrumentError::Lot {
                raw_qty,
                lot_size: self.lot_size,
            });
        }
        Ok(raw_qty / self.lot_size)
    }

    /// Convert a decimal money amount to the integer `money` unit
    /// (`px_step x lot_size`), accepting a wider tolerance than price
    /// conversion since money is not always exactly on a lattice.
    pub fn money_to_int(&self, money_value: Decimal) -> i64 {
        let unit = self.px_step * Decimal::from(self.lot_size);
        let raw = money_value / unit;
        raw.round().to_i64().expect("money value fits in i64")
    }
}
