//! # Keycast Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/   # Settings → runtime → registry → injector scenarios
//! │   ├── e2e_dispatch.rs
//! │   └── dynamic_routes.rs
//! └── benches/           # Channel and routing throughput (criterion)
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p keycast-tests
//! cargo test -p keycast-tests integration::dynamic_routes
//!
//! # Benchmarks
//! cargo bench -p keycast-tests
//! ```

pub mod integration;
