//! Probing subsystem.
//!
//! # Data Flow
//! ```text
//! ServiceTarget
//!     → client.rs (GET {proxy}/{prefix}/, bounded body read)
//!     → markers.rs (mount point, script and stylesheet references)
//!     → client.rs (secondary GETs for the first N assets)
//!     → ProbeResult | ProbeError (types.rs)
//! ```
//!
//! # Design Decisions
//! - The body is scanned then dropped; results carry counts only
//! - Transport failures keep their kind (timeout, refused, DNS, TLS)
//! - No retries inside a probe

pub mod client;
pub mod markers;
pub mod types;

pub use client::ProbeClient;
pub use types::{AssetCheck, FailedAsset, Markers, ProbeError, ProbeOutcome, ProbeResult};
