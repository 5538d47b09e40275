//! # mooring-cli — CLI for the Anchoring Engine
//!
//! Provides the `mooring` command-line interface.
//!
//! ## Subcommands
//!
//! - `mooring run --scenario <file>`: seed an in-memory commit store from
//!   a scenario file, anchor it against the mock ledger, and print a JSON
//!   report of the anchor commits and completion notices.
//! - `mooring config`: print the effective anchoring configuration.
//!
//! ```bash
//! mooring run --scenario scenarios/two-docs.yaml
//! MOORING_ANCHOR_DELAY_MS=250 mooring config --file anchor.yaml --format json
//! ```

pub mod config;
pub mod scenario;
