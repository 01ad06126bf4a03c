// SPDX-License-Identifier: GPL-3.0-only

//! In-memory output driver

use super::{OutputConfig, OutputDriver, OutputSink};
use crate::errors::OutputError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Frames written through a [`MemoryDriver`]
#[derive(Clone, Default)]
pub struct MemoryFrames {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
    opened: Arc<AtomicUsize>,
}

impl MemoryFrames {
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self) -> usize {
        self.frames.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn sinks_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

/// Driver keeping every frame in memory
#[derive(Default)]
pub struct MemoryDriver {
    frames: MemoryFrames,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> MemoryFrames {
        self.frames.clone()
    }
}

impl OutputDriver for MemoryDriver {
    fn name(&self) -> &str {
        "memory"
    }

    fn open(&self, _config: &OutputConfig) -> Result<Box<dyn OutputSink>, OutputError> {
        self.frames.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySink {
            frames: self.frames.clone(),
        }))
    }
}

struct MemorySink {
    frames: MemoryFrames,
}

impl OutputSink for MemorySink {
    fn write_frame(&mut self, data: &[u8]) -> Result<(), OutputError> {
        self.frames
            .frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(data.to_vec());
        Ok(())
    }
}
