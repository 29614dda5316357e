use thiserror::Error;

/// Failures from decoding, decompressing or re-encoding a profile payload.
#[derive(Debug, Error)]
pub enum PprofError {
    #[error("failed to gunzip profile payload: {0}")]
    Gunzip(#[source] std::io::Error),

    #[error("failed to gzip profile payload: {0}")]
    Gzip(#[source] std::io::Error),

    #[error("failed to decode pprof protobuf: {0}")]
    Decode(#[from] prost::DecodeError),
}
