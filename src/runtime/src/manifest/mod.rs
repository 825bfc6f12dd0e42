//! Multi-architecture manifest assembly.
//!
//! Per-architecture build jobs leave `digest-<image>-<arch>.txt` files
//! behind. This module turns a directory of those files into a published
//! manifest list:
//!
//! - `digest`: discover and write digest files
//! - `validate`: format, freshness and duplicate checks
//! - `filter`: required-architecture policy
//! - `assemble`: digest-qualified manifest entries
//! - `verify`: confirm digests exist in the registry
//! - `idempotency`: skip when an identical list is live
//! - `publish`: per-tag push with partial-failure reporting
//! - `pipeline`: the stages wired together

pub mod assemble;
pub mod digest;
pub mod filter;
pub mod idempotency;
pub mod metadata;
pub mod pipeline;
pub mod platform;
pub mod publish;
pub mod validate;
pub mod verify;

#[cfg(test)]
pub(crate) mod test_support;

pub use assemble::{assemble, ManifestEntry};
pub use digest::{digest_pattern, discover, save_digest, DigestRecord};
pub use filter::filter_architectures;
pub use metadata::{parse_key_value, ManifestMetadata};
pub use pipeline::{ManifestPipeline, PipelineOptions, PipelineReport};
pub use platform::{normalize_architecture, parse_platform, PlatformInfo};
pub use publish::{ManifestTarget, PublishOutcome, Publisher};
pub use validate::{is_valid_digest, validate, validate_at};
pub use verify::{verify, DEFAULT_VERIFY_CONCURRENCY, MAX_VERIFY_CONCURRENCY};
