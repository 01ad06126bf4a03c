// SPDX-License-Identifier: GPL-3.0-only

//! Capture session registry
//!
//! The registry provides:
//! - Session creation against a fresh format snapshot
//! - Shared lookup from the frame reader thread
//! - Exactly-once teardown
//!
//! The table lock only covers map operations. Format enumeration, reader
//! open and reader close all run with the lock released.

use super::catalog::FormatCatalog;
use super::session::{CaptureSession, SessionId, StreamInfo};
use super::types::*;
use crate::errors::SessionError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Result of a successful open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: SessionId,
    /// Negotiated stream metadata (may differ from the request)
    pub info: StreamInfo,
}

/// Session registry
///
/// Thread-safe and can be shared across threads.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, Arc<CaptureSession>>>>,
    catalog: FormatCatalog,
}

impl SessionRegistry {
    pub fn new(catalog: FormatCatalog) -> Self {
        info!(backend = %catalog.backend().backend_type(), "Creating session registry");
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            catalog,
        }
    }

    pub fn catalog(&self) -> &FormatCatalog {
        &self.catalog
    }

    /// Open a session for `tuple` on `device`
    ///
    /// The tuple must be present in a fresh format snapshot of the device,
    /// otherwise the backend is never asked.
    pub fn open(&self, device: &Device, tuple: &CapabilityTuple) -> Result<SessionHandle, SessionError> {
        let Some(descriptor) = self.catalog.find_format(device, tuple) else {
            warn!(device = %device.name, tuple = %tuple, "Requested tuple not offered by device");
            return Err(SessionError::UnsupportedTuple {
                device: device.name.clone(),
                tuple: *tuple,
            });
        };

        let reader = self
            .catalog
            .backend()
            .open_reader(device, &descriptor)
            .map_err(|e| {
                warn!(device = %device.name, tuple = %tuple, error = %e, "Failed to open reader");
                SessionError::from(e)
            })?;

        let session = Arc::new(CaptureSession::new(device.clone(), descriptor, reader));
        let id = session.id();
        let info = session.info();
        let negotiated = session.negotiated().tuple();

        self.write().insert(id, session);

        info!(
            session = %id,
            device = %device.name,
            requested = %tuple,
            negotiated = %negotiated,
            "Capture session opened"
        );
        Ok(SessionHandle { id, info })
    }

    /// Look up an open session
    pub fn get(&self, id: &SessionId) -> Option<Arc<CaptureSession>> {
        self.read().get(id).cloned()
    }

    /// Remove and close a session; unknown ids are ignored
    pub fn delete(&self, id: &SessionId) {
        let removed = self.write().remove(id);
        match removed {
            Some(session) => {
                session.close();
            }
            None => debug!(session = %id, "Delete of unknown session ignored"),
        }
    }

    /// Close every session
    pub fn close_all(&self) {
        let sessions: Vec<_> = self.write().drain().map(|(_, s)| s).collect();
        if !sessions.is_empty() {
            info!(count = sessions.len(), "Closing all capture sessions");
        }
        for session in sessions {
            session.close();
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionId, Arc<CaptureSession>>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, Arc<CaptureSession>>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}
