//! Flow Bulk - sequenced bulk transactions on the Flow blockchain
//!
//! Flow-specific collaborators for the `core-logic` submission engine and
//! the jobs built on top of them.
//!
//! # Architecture
//!
//! - **[`FlowCli`]**: transaction backend that runs `flow transactions send`
//! - **[`AccessApiLedger`]**: sequence numbers and transaction results from
//!   the Access REST API
//! - **[`HttpMetadataSource`]**: JSON over HTTPS (tier mappings, REST calls)
//! - **Jobs**: [`jobs::exchange`] (NFTs for TSHOT), [`jobs::tiers`]
//!   (play tiers per set) and [`jobs::sets`] (default tiers, set locking)
//!
//! # Quick Start
//!
//! ```bash
//! # Exchange every NFT of a child account, 40 per transaction
//! cargo run -p flow-bulk --bin flow-exchange -- --child-address 0x4ab8b294112f182c
//!
//! # Assign tiers from a mapping file, resuming an interrupted run
//! cargo run -p flow-bulk --bin flow-tiers -- --mapping-file open_set_play_tier_mapping.json --resume
//!
//! # Lock sets, one transaction each
//! cargo run -p flow-bulk --bin flow-sets -- lock --sets 1-73,75-99
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded from `config/flow-bulk.toml`; see [`config`].
//! Command line flags override file values.

pub mod access_api;
pub mod args;
pub mod cadence;
pub mod config;
pub mod flow_cli;
pub mod jobs;
pub mod metadata;

pub use access_api::AccessApiLedger;
pub use args::RunArgs;
pub use config::FlowBulkConfig;
pub use flow_cli::{FlowCli, FlowCliError};
pub use metadata::HttpMetadataSource;
