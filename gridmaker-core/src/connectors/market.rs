//! C2: market connector. Subscribes to the order-book and trades
//! streams, parses frames, maintains the current snapshot and last trade,
//! and reports the readiness/update transitions the dispatch core needs
//! to fan out to the strategy.
//!
//! The order-book stream's internal readiness is tied to its first
//! successful snapshot, not its subscribe-ack; the trades stream's
//! readiness is tied to the subscribe-ack itself. This asymmetry comes
//! straight from the connector this module is grounded on and is easy to
//! get wrong by assuming both streams behave the same way.
//!
//! `pump` does not call the dispatch core directly: doing so would
//! require this type's `&mut self` borrow (held for the whole pump) to
//! coexist with the `&mut dyn StrategyContext` the dispatch core hands to
//! the strategy, which in this engine reads the very same book `self`
//! owns. Returning events and letting the caller (`Engine`) drive
//! `Dispatch` once `pump` has returned avoids that conflict entirely
//! instead of reaching for interior mutability or unsafe aliasing.

use crate::book::{Level, OrderBook, Trade};
use crate::errors::MarketConnectorError;
use crate::instrument::Instrument;
use crate::venue::{DecimalPrice, MarketDataStream, MarketFrame, SnapshotLevel};
use tracing::{debug, info, warn};

/// One readiness/update transition observed while draining frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketEvent {
    /// Both internal streams (order book + trades) just became ready.
    ConnectorReady,
    /// A snapshot arrived after the connector was already ready.
    BookUpdate,
    /// A trade print arrived.
    TradeUpdate,
}

pub struct MarketConnector<S> {
    stream: S,
    instrument: Instrument,
    depth: usize,
    order_book_ready: bool,
    trades_ready: bool,
    book: OrderBook,
    last_trade: Option<Trade>,
}

impl<S: MarketDataStream> MarketConnector<S> {
    pub fn new(stream: S, instrument: Instrument, depth: usize) -> Self {
        assert!(
            (1..=crate::book::MAX_DEPTH).contains(&depth),
            "market depth {depth} out of range 1..={}",
            crate::book::MAX_DEPTH
        );
        Self {
            stream,
            instrument,
            depth,
            order_book_ready: false,
            trades_ready: false,
            book: OrderBook::new(),
            last_trade: None,
        }
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Direct access to the underlying stream, for feeding a mock venue
    /// from outside the connector (tests, the simulated binary).
    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn last_trade(&self) -> Option<&Trade> {
        self.last_trade.as_ref()
    }

    /// Internal readiness: both streams subscribed (order book's via its
    /// first snapshot, trades' via its subscribe-ack).
    pub fn is_ready(&self) -> bool {
        self.order_book_ready && self.trades_ready
    }

    pub fn start(&mut self) -> Result<(), crate::errors::RpcError> {
        info!(instrument = self.instrument.id(), depth = self.depth, "starting market connector");
        self.stream.subscribe_order_book(self.instrument.id(), self.depth)?;
        self.stream.subscribe_trades(self.instrument.id())?;
        Ok(())
    }

    /// Drain and process every currently-available frame, returning the
    /// readiness/update transitions observed, in order.
    pub fn pump(&mut self) -> Result<Vec<MarketEvent>, MarketConnectorError> {
        let mut events = Vec::new();
        while let Some(frame) = self.stream.poll_frame() {
            if let Some(event) = self.process_frame(frame)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn process_frame(&mut self, frame: MarketFrame) -> Result<Option<MarketEvent>, MarketConnectorError> {
        match frame {
            MarketFrame::SubscribeAck { order_book_ok, trades_ok } => {
                if order_book_ok {
                    info!("order book stream subscribe: success");
                }
                if trades_ok {
                    info!("trades stream subscribe: success");
                    self.trades_ready = true;
                    if self.is_ready() {
                        return Ok(Some(MarketEvent::ConnectorReady));
                    }
                }
                Ok(None)
            }
            MarketFrame::Snapshot { bid, ask, timestamp_ns } => self.apply_snapshot(bid, ask, timestamp_ns),
            MarketFrame::Trade { timestamp_ns, direction, price, raw_qty } => {
                Ok(Some(self.apply_trade(timestamp_ns, direction, price, raw_qty)))
            }
            MarketFrame::Ping => {
                debug!("market stream ping");
                Ok(None)
            }
        }
    }

    fn apply_snapshot(
        &mut self,
        bid: Vec<SnapshotLevel>,
        ask: Vec<SnapshotLevel>,
        timestamp_ns: i64,
    ) -> Result<Option<MarketEvent>, MarketConnectorError> {
        if !self.order_book_ready && (bid.is_empty() || ask.is_empty()) {
            warn!("empty order book at subscription time");
            return Err(MarketConnectorError::MarketClosed);
        }

        assert_eq!(
            bid.len(),
            self.depth,
            "order book snapshot bid depth {} disagrees with configured depth {}",
            bid.len(),
            self.depth
        );
        assert_eq!(
            ask.len(),
            self.depth,
            "order book snapshot ask depth {} disagrees with configured depth {}",
            ask.len(),
            self.depth
        );

        let bid_levels = self.convert_levels(&bid);
        let ask_levels = self.convert_levels(&ask);
        self.book.sync_from_snapshot(bid_levels, ask_levels, timestamp_ns);

        if !self.order_book_ready {
            self.order_book_ready = true;
            if self.is_ready() {
                return Ok(Some(MarketEvent::ConnectorReady));
            }
            Ok(None)
        } else {
            Ok(Some(MarketEvent::BookUpdate))
        }
    }

    fn convert_levels(&self, levels: &[SnapshotLevel]) -> Vec<Level> {
        levels
            .iter()
            .map(|level| Level {
                px: self
                    .instrument
                    .quotation_to_px(level.price.units, level.price.nano)
                    .unwrap_or_else(|e| panic!("non-lattice price in order book snapshot: {e}")),
                qty: self
                    .instrument
                    .qty_to_lots(level.raw_qty)
                    .unwrap_or_else(|e| panic!("non-lot-aligned quantity in order book snapshot: {e}")),
            })
            .collect()
    }

    fn apply_trade(
        &mut self,
        timestamp_ns: i64,
        direction: crate::book::Direction,
        price: DecimalPrice,
        raw_qty: i64,
    ) -> MarketEvent {
        let px = self
            .instrument
            .quotation_to_px(price.units, price.nano)
            .unwrap_or_else(|e| panic!("non-lattice price in trade print: {e}"));
        let qty = self
            .instrument
            .qty_to_lots(raw_qty)
            .unwrap_or_else(|e| panic!("non-lot-aligned quantity in trade print: {e}"));
        self.last_trade = Some(Trade { timestamp_ns, direction, px, qty });
        MarketEvent::TradeUpdate
    }
}
