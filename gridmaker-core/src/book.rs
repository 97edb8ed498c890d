//! Order book, trade record, and the `Side` enum shared by every component
//! that needs to express "the bid direction" or "the ask direction" without
//! duplicating arithmetic.

/// Which side of the book / ladder / order a value refers to. Carries a
/// sign so a single routine can serve both sides instead of duplicating
/// the arithmetic per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// +1 for `Bid`, -1 for `Ask`. Ticks move away from the midpoint in the
    /// direction of this sign for both the book and the target ladder.
    #[inline]
    pub const fn sign(self) -> i64 {
        match self {
            Side::Bid => 1,
            Side::Ask => -1,
        }
    }

    #[inline]
    pub const fn opposite(self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

/// The buy/sell direction of an order or a trade print. Distinct from
/// `Side` because an order's direction determines *which* ladder side it
/// belongs to, but the book itself has no notion of "direction", only of
/// bid/ask levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    #[inline]
    pub const fn sign(self) -> i64 {
        match self {
            Direction::Buy => 1,
            Direction::Sell => -1,
        }
    }

    /// The ladder side a resting order of this direction lives on.
    #[inline]
    pub const fn side(self) -> Side {
        match self {
            Direction::Buy => Side::Bid,
            Direction::Sell => Side::Ask,
        }
    }
}

/// One level of a one-sided book: a (price, quantity) pair at a given
/// depth index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub px: i64,
    pub qty: i64,
}

/// Maximum subscription depth: up to `MAX_DEPTH` levels per side.
pub const MAX_DEPTH: usize = 50;

/// A fixed-capacity, ordered sequence of up to `MAX_DEPTH` levels for one
/// side of the book. Index 0 is always best. Strictly monotonic: bids
/// descending, asks ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneSidedBook {
    side: Side,
    levels: Vec<Level>,
}

impl OneSidedBook {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: Vec::with_capacity(MAX_DEPTH),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn best(&self) -> Option<Level> {
        self.levels.first().copied()
    }

    pub fn best_px(&self) -> Option<i64> {
        self.best().map(|l| l.px)
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Overwrite this side from a fresh snapshot. `levels` must already be
    /// in best-first order and strictly monotonic in the direction implied
    /// by `side`; a malformed snapshot is a fatal assertion, not a
    /// recoverable error.
    pub fn sync_from_snapshot(&mut self, levels: Vec<Level>) {
        assert!(
            levels.len() <= MAX_DEPTH,
            "book snapshot depth {} exceeds MAX_DEPTH {MAX_DEPTH}",
            levels.len()
        );
        let sign = self.side.sign();
        for pair in levels.windows(2) {
            assert!(
                pair[1].px * sign < pair[0].px * sign,
                "book snapshot is not strictly monotonic for side {:?}: {:?} then {:?}",
                self.side,
                pair[0],
                pair[1]
            );
        }
        self.levels = levels;
    }
}

/// Paired bid/ask book plus the venue timestamp of the last snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBook {
    pub bid: OneSidedBook,
    pub ask: OneSidedBook,
    pub venue_timestamp_ns: i64,
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            bid: OneSidedBook::new(Side::Bid),
            ask: OneSidedBook::new(Side::Ask),
            venue_timestamp_ns: 0,
        }
    }

    /// Apply a fresh snapshot for both sides. Asserts `bid.px[0] <
    /// ask.px[0]` whenever both sides are non-empty: the book must never
    /// be crossed after a snapshot is applied.
    pub fn sync_from_snapshot(
        &mut self,
        bid_levels: Vec<Level>,
        ask_levels: Vec<Level>,
        venue_timestamp_ns: i64,
    ) {
        self.bid.sync_from_snapshot(bid_levels);
        self.ask.sync_from_snapshot(ask_levels);
        self.venue_timestamp_ns = venue_timestamp_ns;
        if let (Some(bid), Some(ask)) = (self.bid.best(), self.ask.best()) {
            assert!(
                bid.px < ask.px,
                "crossed book: bid.px[0]={} >= ask.px[0]={}",
                bid.px,
                ask.px
            );
        }
    }

    pub fn is_ready(&self) -> bool {
        self.bid.depth() > 0 && self.ask.depth() > 0
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

/// Last-value trade print. `None` until the first trade is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trade {
    pub timestamp_ns: i64,
    pub direction: Direction,
    pub px: i64,
    pub qty: i64,
}
