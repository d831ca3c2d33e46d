//! # MQ Bridge Test Suite
//!
//! Unified test crate for flows that cross the broker, the bridge core and
//! the HTTP front end.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── bridge_benchmarks.rs  # Cache hits, credential decoding, line joining
//! └── src/integration/
//!     ├── mod.rs                # Shared fixtures
//!     ├── round_trip.rs         # Send and await reply end to end
//!     ├── concurrency.rs        # Resource cache under contention
//!     └── http_front.rs         # Status codes, challenge, framing
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p mq-bridge-tests
//! cargo test -p mq-bridge-tests integration::round_trip::
//! cargo bench -p mq-bridge-tests
//! ```

pub mod integration;
