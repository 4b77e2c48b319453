//! A coalescing, single-flight prefetch cache over a [`ByteSource`].
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::lock::Mutex;

use crate::error::Result;
use crate::source::ByteSource;

/// Ranges closer than this are merged into one segment, trading a bounded
/// amount of padding for fewer reads.
const COALESCE_GAP: u64 = 32 * 1024;

#[derive(Debug)]
struct Segment {
    start: u64,
    end: u64,
    /// Filled by the first reader; the async lock makes concurrent readers
    /// of the same segment share that one fetch.
    data: Mutex<Option<Arc<Vec<u8>>>>,
}

/// Wraps a [`ByteSource`] with a set of planned ranges: reads inside a
/// planned segment are served from one lazily issued fetch, everything else
/// falls through to the source.
#[derive(Debug)]
pub struct PrefetchCache<S: ByteSource> {
    source: S,
    segments: Vec<Segment>,
}

impl<S: ByteSource> PrefetchCache<S> {
    /// Plans segments over the union of the half-open `ranges`.
    pub fn new(source: S, ranges: &[(u64, u64)]) -> Self {
        let mut ranges: Vec<(u64, u64)> = ranges
            .iter()
            .copied()
            .filter(|(start, end)| end > start)
            .collect();
        ranges.sort_unstable();
        let mut segments: Vec<Segment> = vec![];
        for (start, end) in ranges {
            match segments.last_mut() {
                Some(last) if start <= last.end.saturating_add(COALESCE_GAP) => {
                    last.end = last.end.max(end);
                }
                _ => segments.push(Segment {
                    start,
                    end,
                    data: Mutex::new(None),
                }),
            }
        }
        log::debug!("prefetch plan holds {} segments", segments.len());
        Self { source, segments }
    }

    /// The planned segments, in file order.
    pub fn segments(&self) -> Vec<(u64, u64)> {
        self.segments
            .iter()
            .map(|segment| (segment.start, segment.end))
            .collect()
    }

    /// Consumes the cache, returning the wrapped source.
    pub fn into_inner(self) -> S {
        self.source
    }

    async fn segment_bytes(&self, index: usize) -> Result<Arc<Vec<u8>>> {
        let segment = &self.segments[index];
        let mut slot = segment.data.lock().await;
        if let Some(data) = slot.as_ref() {
            return Ok(data.clone());
        }
        let data = Arc::new(self.source.slice(segment.start, segment.end).await?);
        *slot = Some(data.clone());
        Ok(data)
    }
}

impl<S: ByteSource> ByteSource for PrefetchCache<S> {
    fn byte_length(&self) -> u64 {
        self.source.byte_length()
    }

    fn slice(&self, start: u64, end: u64) -> BoxFuture<'_, Result<Vec<u8>>> {
        Box::pin(async move {
            let index = self
                .segments
                .iter()
                .position(|segment| start >= segment.start && end <= segment.end);
            match index {
                Some(index) => {
                    let segment_start = self.segments[index].start;
                    let data = self.segment_bytes(index).await?;
                    let offset = (start - segment_start) as usize;
                    Ok(data[offset..offset + (end - start) as usize].to_vec())
                }
                None => {
                    log::debug!("read [{}, {}) misses the plan, delegating", start, end);
                    self.source.slice(start, end).await
                }
            }
        })
    }
}
