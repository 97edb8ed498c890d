//! In-process mock venue for tests and the `*-simulated` binary. Stands in
//! for a real gRPC client, which this crate deliberately leaves out of
//! scope.

pub mod mock_venue;

pub use mock_venue::{MockMarketStream, MockUserStream};
