// SPDX-License-Identifier: GPL-3.0-only

//! Frame reader execution cycles
//!
//! One cycle resolves the stream id, reads at most
//! [`READS_PER_CYCLE`](crate::constants::reader::READS_PER_CYCLE) times and
//! copies the first real sample into the destination. The first sample after
//! a stream opens is often empty, hence the retry. A cycle that finds nothing
//! fails without touching the session.

use crate::backends::camera::frame_loop::{CaptureLoopController, LoopAction};
use crate::backends::camera::{SessionId, SessionRegistry};
use crate::constants::{reader::READS_PER_CYCLE, timing::FRAME_LOG_INTERVAL};
use crate::errors::CycleError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cycle counters, shared with the reader thread
#[derive(Debug, Default)]
pub struct ReaderStats {
    pub cycles: AtomicU64,
    pub frames: AtomicU64,
    pub failures: AtomicU64,
}

impl ReaderStats {
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Pulls frames for a stream id out of the registry
#[derive(Clone)]
pub struct FrameReader {
    registry: SessionRegistry,
    stats: Arc<ReaderStats>,
}

impl FrameReader {
    pub fn new(registry: SessionRegistry) -> Self {
        Self {
            registry,
            stats: Arc::new(ReaderStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ReaderStats> {
        Arc::clone(&self.stats)
    }

    /// Run one execution cycle, copying a frame into `dest`
    ///
    /// Returns the number of bytes copied, which is the smaller of the sample
    /// and the destination.
    pub fn execute(&self, stream_id: Option<&str>, dest: &mut [u8]) -> Result<usize, CycleError> {
        self.stats.cycles.fetch_add(1, Ordering::Relaxed);
        let result = self.run_cycle(stream_id, dest);
        match &result {
            Ok(_) => {
                let frames = self.stats.frames.fetch_add(1, Ordering::Relaxed) + 1;
                if frames % FRAME_LOG_INTERVAL == 0 {
                    debug!(frames, "Frame reader progress");
                }
            }
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, "Read cycle failed");
            }
        }
        result
    }

    fn run_cycle(&self, stream_id: Option<&str>, dest: &mut [u8]) -> Result<usize, CycleError> {
        let raw = stream_id
            .filter(|id| !id.is_empty())
            .ok_or(CycleError::MissingStream)?;
        let id: SessionId = raw
            .parse()
            .map_err(|_| CycleError::InvalidStreamId(raw.to_string()))?;
        let session = self
            .registry
            .get(&id)
            .ok_or_else(|| CycleError::SessionNotFound(raw.to_string()))?;

        for attempt in 0..READS_PER_CYCLE {
            let Some(sample) = session.read_sample() else {
                debug!(session = %id, attempt, "No sample");
                continue;
            };

            if sample.len() != dest.len() {
                warn!(
                    session = %id,
                    sample = sample.len(),
                    buffer = dest.len(),
                    "Buffer size mismatch"
                );
            }
            let len = sample.len().min(dest.len());
            dest[..len].copy_from_slice(&sample[..len]);
            return Ok(len);
        }

        Err(CycleError::NoSample)
    }

    /// Run cycles for `id` every `interval` on a dedicated thread
    ///
    /// The destination is sized from the session's negotiated format, so
    /// the session must be open and its format must have a fixed frame size.
    /// Each cycle result is handed to `on_cycle`, which decides whether to
    /// go on.
    pub fn spawn<F>(
        &self,
        id: SessionId,
        interval: Duration,
        mut on_cycle: F,
    ) -> Result<CaptureLoopController, CycleError>
    where
        F: FnMut(Result<&[u8], CycleError>) -> LoopAction + Send + 'static,
    {
        let session = self
            .registry
            .get(&id)
            .ok_or_else(|| CycleError::SessionNotFound(id.to_string()))?;
        let negotiated = *session.negotiated();
        drop(session);

        let frame_len = negotiated
            .sub_type
            .frame_len(negotiated.resolution)
            .ok_or_else(|| CycleError::UnknownFrameSize(negotiated.format_tag().to_string()))?;
        info!(session = %id, frame_len, "Starting frame reader");

        let reader = self.clone();
        let stream_id = id.to_string();
        let mut dest = vec![0u8; frame_len];

        Ok(CaptureLoopController::start_periodic("frame-reader", interval, move || {
            match reader.execute(Some(&stream_id), &mut dest) {
                Ok(len) => on_cycle(Ok(&dest[..len])),
                Err(e) => on_cycle(Err(e)),
            }
        }))
    }
}
