//! TCP connection pool and `IngesterClient` (spec §4.5): lazy dial,
//! `DashMap`-keyed cache, idle eviction, length-prefixed batched `Push`
//! framing.
//!
//! # Where
//! Grounded on the teacher's `spark-transport-tcp::channel::TcpChannel`:
//! one `tokio::sync::Mutex`-guarded `TcpStream` per peer, `bytes::BufMut`
//! for outbound framing, `tracing` for connection lifecycle logging.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, BufMut, BytesMut};
use dashmap::DashMap;
use distributor_core::error::DistributorError;
use distributor_core::model::{ProfileSample, ProfileSeries, PushRequest, RawProfileType};
use distributor_core::pool::{ConnectionPool, IngesterClient};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, OnceCell};
use tracing::debug;

fn format_tag(format: RawProfileType) -> u8 {
    match format {
        RawProfileType::Pprof => 0,
        RawProfileType::Jfr => 1,
        RawProfileType::Otel => 2,
    }
}

fn format_from_tag(tag: u8) -> Result<RawProfileType, DistributorError> {
    match tag {
        0 => Ok(RawProfileType::Pprof),
        1 => Ok(RawProfileType::Jfr),
        2 => Ok(RawProfileType::Otel),
        other => Err(DistributorError::internal(format!("unknown profile format tag {other}"))),
    }
}

/// Encode a `PushRequest` into the wire frame sent to one ingester:
/// series count, then per series a label list and a sample list, each
/// length-prefixed.
fn encode_push_request(request: &PushRequest) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_u32(request.series.len() as u32);
    for series in &request.series {
        buf.put_u32(series.labels.len() as u32);
        for label in &series.labels {
            put_str(&mut buf, &label.name);
            put_str(&mut buf, &label.value);
        }
        buf.put_u32(series.samples.len() as u32);
        for sample in &series.samples {
            buf.put_slice(sample.id.as_bytes());
            buf.put_u8(format_tag(sample.format));
            buf.put_u32(sample.raw_profile.len() as u32);
            buf.put_slice(&sample.raw_profile);
        }
    }
    buf
}

fn put_str(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn decode_push_request(mut buf: &[u8]) -> Result<PushRequest, DistributorError> {
    let bad_frame = || DistributorError::internal("truncated push frame");
    let series_count = read_u32(&mut buf).ok_or_else(bad_frame)? as usize;
    let mut series = Vec::with_capacity(series_count);
    for _ in 0..series_count {
        let label_count = read_u32(&mut buf).ok_or_else(bad_frame)? as usize;
        let mut labels = Vec::with_capacity(label_count);
        for _ in 0..label_count {
            let name = read_str(&mut buf).ok_or_else(bad_frame)?;
            let value = read_str(&mut buf).ok_or_else(bad_frame)?;
            labels.push(distributor_core::LabelPair::new(name, value));
        }
        let sample_count = read_u32(&mut buf).ok_or_else(bad_frame)? as usize;
        let mut samples = Vec::with_capacity(sample_count);
        for _ in 0..sample_count {
            if buf.remaining() < 16 {
                return Err(bad_frame());
            }
            let mut id_bytes = [0u8; 16];
            buf.copy_to_slice(&mut id_bytes);
            let tag = buf.get_u8();
            let len = read_u32(&mut buf).ok_or_else(bad_frame)? as usize;
            if buf.remaining() < len {
                return Err(bad_frame());
            }
            let mut raw_profile = vec![0u8; len];
            buf.copy_to_slice(&mut raw_profile);
            let mut sample = ProfileSample::new(raw_profile, format_from_tag(tag)?);
            sample.id = uuid::Uuid::from_bytes(id_bytes);
            samples.push(sample);
        }
        series.push(ProfileSeries::new(labels, samples));
    }
    Ok(PushRequest::new(series))
}

fn read_u32(buf: &mut &[u8]) -> Option<u32> {
    if buf.remaining() < 4 {
        return None;
    }
    Some(buf.get_u32())
}

fn read_str(buf: &mut &[u8]) -> Option<String> {
    let len = read_u32(buf)? as usize;
    if buf.remaining() < len {
        return None;
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).ok()
}

/// One pooled connection: a single TCP stream guarded by an async mutex
/// so concurrent fan-out tasks share it without racing on partial writes.
pub struct TcpIngesterClient {
    addr: String,
    stream: AsyncMutex<TcpStream>,
    response_timeout: Duration,
}

impl TcpIngesterClient {
    async fn connect(addr: &str, response_timeout: Duration) -> Result<Self, DistributorError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| DistributorError::unavailable(format!("dial {addr} failed: {e}")))?;
        Ok(Self { addr: addr.to_string(), stream: AsyncMutex::new(stream), response_timeout })
    }
}

#[async_trait]
impl IngesterClient for TcpIngesterClient {
    async fn push(&self, request: PushRequest) -> Result<(), DistributorError> {
        let frame = encode_push_request(&request);
        let mut stream = self.stream.lock().await;

        stream
            .write_u32(frame.len() as u32)
            .await
            .map_err(|e| DistributorError::unavailable(format!("write to {}: {e}", self.addr)))?;
        stream
            .write_all(&frame)
            .await
            .map_err(|e| DistributorError::unavailable(format!("write to {}: {e}", self.addr)))?;

        let ack = tokio::time::timeout(self.response_timeout, stream.read_u8()).await;
        match ack {
            Ok(Ok(0)) => Ok(()),
            Ok(Ok(code)) => Err(DistributorError::unavailable(format!("{} rejected push (code {code})", self.addr))),
            Ok(Err(e)) => Err(DistributorError::unavailable(format!("read from {}: {e}", self.addr))),
            Err(_) => Err(DistributorError::deadline_exceeded(format!("push to {} timed out", self.addr))),
        }
    }
}

/// One cache slot: `client` memoizes the dial so concurrent callers racing
/// on the same fresh `addr` await the same in-flight connect instead of
/// each dialing their own (the pool's documented "must not dial twice"
/// contract).
struct PoolEntry {
    client: OnceCell<Arc<TcpIngesterClient>>,
    last_used: AtomicI64,
}

/// `DashMap`-keyed pool with idle eviction, grounded on the membership
/// table's `DashMap` usage in `distributor-ring`.
pub struct TcpConnectionPool {
    clients: DashMap<String, Arc<PoolEntry>>,
    response_timeout: Duration,
    idle_ttl: Duration,
}

impl TcpConnectionPool {
    pub fn new(response_timeout: Duration, idle_ttl: Duration) -> Self {
        Self { clients: DashMap::new(), response_timeout, idle_ttl }
    }

    pub fn live_client_count(&self) -> usize {
        self.clients.len()
    }

    /// Drop pooled entries idle for longer than `idle_ttl`. Intended to be
    /// called periodically from a maintenance task.
    pub fn evict_idle(&self) {
        let now = unix_time_secs();
        let before = self.clients.len();
        self.clients.retain(|_, entry| now - entry.last_used.load(Ordering::Acquire) <= self.idle_ttl.as_secs() as i64);
        let evicted = before - self.clients.len();
        if evicted > 0 {
            debug!(evicted, "evicted idle ingester connections");
        }
    }
}

fn unix_time_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl ConnectionPool for TcpConnectionPool {
    async fn get(&self, addr: &str) -> Result<Arc<dyn IngesterClient>, DistributorError> {
        // `entry().or_insert_with()` only ever holds the dashmap shard
        // lock for the duration of this one statement: the dial itself
        // happens below, against the cloned `Arc<PoolEntry>`, well after
        // the guard has been dropped.
        let entry = self
            .clients
            .entry(addr.to_string())
            .or_insert_with(|| Arc::new(PoolEntry { client: OnceCell::new(), last_used: AtomicI64::new(unix_time_secs()) }))
            .clone();
        entry.last_used.store(unix_time_secs(), Ordering::Release);

        let response_timeout = self.response_timeout;
        let addr_owned = addr.to_string();
        let client = entry
            .client
            .get_or_try_init(|| async move {
                let client = TcpIngesterClient::connect(&addr_owned, response_timeout).await?;
                debug!(addr = %addr_owned, "dialed new ingester connection");
                Ok::<_, DistributorError>(Arc::new(client))
            })
            .await?;
        Ok(client.clone() as Arc<dyn IngesterClient>)
    }
}
