//! Wire-adjacent request/response shapes (spec §3, §6).

use uuid::Uuid;

use crate::label::LabelPair;

/// How a sample's raw bytes should be interpreted before normalization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RawProfileType {
    Pprof,
    Jfr,
    Otel,
}

/// One decoded/split sample: the (possibly re-serialized) raw payload plus
/// the opaque id assigned when it is produced by `extractSampleSeries`.
#[derive(Clone, Debug)]
pub struct ProfileSample {
    pub id: Uuid,
    pub raw_profile: Vec<u8>,
    pub format: RawProfileType,
}

impl ProfileSample {
    pub fn new(raw_profile: Vec<u8>, format: RawProfileType) -> Self {
        Self {
            id: Uuid::nil(),
            raw_profile,
            format,
        }
    }

    /// Assign a fresh id, as required on every sample produced by the
    /// splitting step (spec §4.1 step 8).
    pub fn with_fresh_id(mut self) -> Self {
        self.id = Uuid::new_v4();
        self
    }
}

/// An ordered, uniquely-named label set plus the samples that share it.
#[derive(Clone, Debug)]
pub struct ProfileSeries {
    pub labels: Vec<LabelPair>,
    pub samples: Vec<ProfileSample>,
}

impl ProfileSeries {
    pub fn new(labels: Vec<LabelPair>, samples: Vec<ProfileSample>) -> Self {
        Self { labels, samples }
    }

    /// Sum of the raw, gzip-compressed wire byte length of every sample —
    /// the `RawProfileSize` figure from spec §4.1 step 3. Rate-limiting and
    /// discard accounting key off the *decompressed* size instead (see
    /// `distributor_pprof::decompressed_len`); this stays for call sites
    /// that genuinely want the compressed wire size.
    pub fn raw_byte_len(&self) -> usize {
        self.samples.iter().map(|s| s.raw_profile.len()).sum()
    }
}

/// The inbound (and, reused verbatim, outbound) `Push` payload.
#[derive(Clone, Debug, Default)]
pub struct PushRequest {
    pub series: Vec<ProfileSeries>,
}

impl PushRequest {
    pub fn new(series: Vec<ProfileSeries>) -> Self {
        Self { series }
    }

    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.samples.is_empty())
    }

    pub fn total_samples(&self) -> usize {
        self.series.iter().map(|s| s.samples.len()).sum()
    }
}

/// Empty-on-success response to a `Push` call.
#[derive(Clone, Copy, Debug, Default)]
pub struct PushResponse;
