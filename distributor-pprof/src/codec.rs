//! Gzip framing around the protobuf profile (spec §6: "`RawProfile` is
//! pprof-gzip by default").

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use prost::Message;

use crate::error::PprofError;
use crate::proto::Profile;

/// Decompress and parse a `pprof`-gzip payload.
pub fn decode_gzip_profile(raw: &[u8]) -> Result<Profile, PprofError> {
    let mut decoder = GzDecoder::new(raw);
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf).map_err(PprofError::Gunzip)?;
    Profile::decode(buf.as_slice()).map_err(PprofError::from)
}

/// Serialize and gzip-compress a profile back into transport bytes.
pub fn encode_gzip_profile(profile: &Profile) -> Result<Vec<u8>, PprofError> {
    let encoded = profile.encode_to_vec();
    let mut encoder = GzEncoder::new(Vec::with_capacity(encoded.len()), Compression::default());
    encoder.write_all(&encoded).map_err(PprofError::Gzip)?;
    encoder.finish().map_err(PprofError::Gzip)
}

/// Size of a profile's decompressed, protobuf-encoded form — the figure
/// spec §4.1 step 3's size accounting is actually defined over, distinct
/// from the gzip-compressed bytes callers hold in `raw_profile`. Exposed
/// here so callers never need `prost::Message` in scope themselves.
pub fn decompressed_len(profile: &Profile) -> usize {
    profile.encoded_len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_an_empty_profile() {
        let profile = Profile::empty();
        let raw = encode_gzip_profile(&profile).unwrap();
        let decoded = decode_gzip_profile(&raw).unwrap();
        assert_eq!(decoded, profile);
    }
}
