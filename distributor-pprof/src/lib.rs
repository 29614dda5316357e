//! `distributor-pprof`: pprof-shaped profile codec, normalization and
//! sample-label splitting.
//!
//! # Where
//! Plays the role the teacher's `spark-codec-rtp`/`spark-codec-sdp` play
//! for the media stack: a self-contained wire-format crate with its own
//! parse/encode responsibilities, consumed by the higher-level pipeline
//! crate but unaware of tenants, rate limits or the ring.

pub mod codec;
pub mod error;
pub mod proto;
pub mod split;

pub use codec::{decode_gzip_profile, decompressed_len, encode_gzip_profile};
pub use error::PprofError;
pub use proto::{Label, Profile, Sample, ValueType};
pub use split::{extract_sample_series, ExtractOutcome};
