//! pprof wire shapes.
//!
//! # Why
//! Spec §1 explicitly treats the pprof binary decoder as an external,
//! out-of-scope collaborator ("assumed: a library that parses,
//! re-serializes, normalizes..."). We still need *a* concrete shape to
//! operate on, so this mirrors the handful of `google/pprof` `profile.proto`
//! messages the splitting pipeline actually touches — sample values,
//! sample labels and the string table — and skips `Mapping`/`Location`/
//! `Function` (symbolization), which no operation in spec §4.1 reads or
//! writes.
//!
//! # How
//! Hand-written `prost::Message` impls (via `#[derive(prost::Message)]`),
//! the same way the teacher's codec crates (`spark-codec-rtp`,
//! `spark-codec-sdp`) hand-write their wire structs instead of reaching
//! for a code generator.

use prost::Message;

/// `ValueType` names one of a sample's value columns (e.g. `cpu`/`nanoseconds`),
/// both resolved through the profile's string table.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct ValueType {
    #[prost(int64, tag = "1")]
    pub r#type: i64,
    #[prost(int64, tag = "2")]
    pub unit: i64,
}

/// One label attached to a `Sample`: either a string value (`str`) or a
/// numeric value (`num`/`num_unit`), per `pprof`'s `Label` message.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct Label {
    #[prost(int64, tag = "1")]
    pub key: i64,
    #[prost(int64, tag = "2")]
    pub str: i64,
    #[prost(int64, tag = "3")]
    pub num: i64,
    #[prost(int64, tag = "4")]
    pub num_unit: i64,
}

/// One stack sample: a sequence of values (one per `sample_type`) plus the
/// labels attached to that specific sample (as opposed to the series-level
/// labels the distributor attaches separately).
#[derive(Clone, PartialEq, Eq, Message)]
pub struct Sample {
    #[prost(uint64, repeated, tag = "1")]
    pub location_id: Vec<u64>,
    #[prost(int64, repeated, tag = "2")]
    pub value: Vec<i64>,
    #[prost(message, repeated, tag = "3")]
    pub label: Vec<Label>,
}

/// A decoded profile: everything the splitting/merge pipeline needs.
///
/// `mapping`/`location`/`function` are intentionally absent — symbolization
/// is out of scope here (spec §1) and nothing downstream reads them.
#[derive(Clone, PartialEq, Message)]
pub struct Profile {
    #[prost(message, repeated, tag = "1")]
    pub sample_type: Vec<ValueType>,
    #[prost(message, repeated, tag = "2")]
    pub sample: Vec<Sample>,
    #[prost(string, repeated, tag = "6")]
    pub string_table: Vec<String>,
    #[prost(int64, tag = "9")]
    pub time_nanos: i64,
    #[prost(int64, tag = "10")]
    pub duration_nanos: i64,
    #[prost(message, optional, tag = "11")]
    pub period_type: Option<ValueType>,
    #[prost(int64, tag = "12")]
    pub period: i64,
    #[prost(int64, repeated, tag = "13")]
    pub comment: Vec<i64>,
    #[prost(int64, tag = "14")]
    pub default_sample_type: i64,
}

impl Profile {
    /// A profile's string table must start with the empty string at index
    /// 0 (the `pprof` convention for "no string"); every freshly
    /// constructed `Profile` in this crate upholds that.
    pub fn empty() -> Self {
        Self {
            sample_type: Vec::new(),
            sample: Vec::new(),
            string_table: vec![String::new()],
            time_nanos: 0,
            duration_nanos: 0,
            period_type: None,
            period: 0,
            comment: Vec::new(),
            default_sample_type: 0,
        }
    }

    /// Intern `value`, returning its string-table index. Reuses an
    /// existing entry when present so repeated labels don't bloat the
    /// table on every split.
    pub fn intern(&mut self, value: &str) -> i64 {
        if let Some(idx) = self.string_table.iter().position(|s| s == value) {
            return idx as i64;
        }
        self.string_table.push(value.to_owned());
        (self.string_table.len() - 1) as i64
    }

    pub fn string_at(&self, idx: i64) -> &str {
        self.string_table
            .get(idx as usize)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf).expect("Vec<u8> writes never fail");
        buf
    }
}
