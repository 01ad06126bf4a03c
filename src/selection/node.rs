// SPDX-License-Identifier: GPL-3.0-only

//! Stream node: runs resolver transitions against the registry and host

use super::level::Level;
use super::resolver::{Effect, LevelChanged, SelectionResolver, Transition};
use crate::backends::camera::{SessionId, SessionRegistry, StreamInfo};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Status shown on the node
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NodeStatus {
    #[default]
    Idle,
    Streaming,
    /// Diagnostic from the last failed open
    Error(String),
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Idle => write!(f, "Idle"),
            NodeStatus::Streaming => write!(f, "Streaming"),
            NodeStatus::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// Host side of a node's parameters
pub trait ParameterHost {
    /// The node changed a level's value (correction or auto-select)
    fn set_value(&mut self, level: Level, value: &str);

    /// Replace the option list named `list_name`
    fn update_options(&mut self, list_name: &str, level: Level, options: &[String]);

    /// Stream metadata, or `None` once the stream is gone
    fn publish_stream(&mut self, info: Option<&StreamInfo>);

    /// Restart whatever consumes this node's output
    fn restart_path(&mut self);

    fn report_status(&mut self, status: &NodeStatus);
}

/// One capture node: a resolver, its session and its host
pub struct StreamNode<H: ParameterHost> {
    id: String,
    resolver: SelectionResolver,
    registry: SessionRegistry,
    host: H,
    session: Option<SessionId>,
    stream_info: Option<StreamInfo>,
    status: NodeStatus,
}

impl<H: ParameterHost> StreamNode<H> {
    pub fn new(id: impl Into<String>, registry: SessionRegistry, host: H) -> Self {
        let resolver = SelectionResolver::new(Arc::new(registry.catalog().clone()));
        Self {
            id: id.into(),
            resolver,
            registry,
            host,
            session: None,
            stream_info: None,
            status: NodeStatus::Idle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn resolver(&self) -> &SelectionResolver {
        &self.resolver
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session
    }

    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.stream_info.as_ref()
    }

    pub fn status(&self) -> &NodeStatus {
        &self.status
    }

    /// Publish the device list
    pub fn refresh_devices(&mut self) {
        let transition = self.resolver.refresh_devices();
        self.execute(transition);
    }

    /// Handle a value change from the host
    pub fn on_level_changed(&mut self, event: LevelChanged) -> Transition {
        let transition = self.resolver.handle(&event);
        self.execute(transition.clone());
        transition
    }

    /// Convenience for a user-driven change
    pub fn set(&mut self, level: Level, value: &str) -> Transition {
        self.on_level_changed(LevelChanged::new(level, value))
    }

    /// Close the session, e.g. when the node is removed
    pub fn shutdown(&mut self) {
        self.close_session();
        self.resolver.forget_session();
    }

    fn execute(&mut self, transition: Transition) {
        for effect in transition.effects {
            match effect {
                Effect::SetValue { level, value } => self.host.set_value(level, &value),
                Effect::UpdateOptions { level, options } => {
                    let list_name = level.list_name(&self.id);
                    self.host.update_options(&list_name, level, &options);
                }
                Effect::CloseSession => self.close_session(),
                Effect::OpenSession { device, tuple } => {
                    // At most one session per node
                    self.close_session();

                    match self.registry.open(&device, &tuple) {
                        Ok(handle) => {
                            info!(node = %self.id, session = %handle.id, "Node streaming");
                            self.session = Some(handle.id);
                            self.host.publish_stream(Some(&handle.info));
                            self.stream_info = Some(handle.info);
                            self.host.restart_path();
                            self.set_status(NodeStatus::Streaming);
                        }
                        Err(e) => {
                            warn!(node = %self.id, error = %e, "Failed to open stream");
                            let diagnostic = e.to_string();
                            self.set_status(NodeStatus::Error(diagnostic.clone()));
                            let rejected = self.resolver.reject_open(&diagnostic);
                            self.execute(rejected);
                        }
                    }
                }
            }
        }
    }

    fn close_session(&mut self) {
        if let Some(id) = self.session.take() {
            debug!(node = %self.id, session = %id, "Closing node session");
            self.registry.delete(&id);
            self.stream_info = None;
            self.host.publish_stream(None);
            if self.status == NodeStatus::Streaming {
                self.set_status(NodeStatus::Idle);
            }
        }
    }

    fn set_status(&mut self, status: NodeStatus) {
        self.status = status;
        self.host.report_status(&self.status);
    }
}

impl<H: ParameterHost> Drop for StreamNode<H> {
    fn drop(&mut self) {
        if let Some(id) = self.session.take() {
            self.registry.delete(&id);
        }
    }
}

/// Host that records every call, for tests and dry runs
#[derive(Debug, Default, Clone)]
pub struct RecordingHost {
    pub values: Vec<(Level, String)>,
    pub options: Vec<(String, Vec<String>)>,
    pub streams: Vec<Option<StreamInfo>>,
    pub restarts: usize,
    pub statuses: Vec<NodeStatus>,
}

impl RecordingHost {
    /// Latest options published under `list_name`
    pub fn latest_options(&self, list_name: &str) -> Option<&[String]> {
        self.options
            .iter()
            .rev()
            .find(|(name, _)| name == list_name)
            .map(|(_, options)| options.as_slice())
    }

    /// Latest value the node pushed for `level`
    pub fn latest_value(&self, level: Level) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(l, _)| *l == level)
            .map(|(_, v)| v.as_str())
    }
}

impl ParameterHost for RecordingHost {
    fn set_value(&mut self, level: Level, value: &str) {
        self.values.push((level, value.to_string()));
    }

    fn update_options(&mut self, list_name: &str, _level: Level, options: &[String]) {
        self.options.push((list_name.to_string(), options.to_vec()));
    }

    fn publish_stream(&mut self, info: Option<&StreamInfo>) {
        self.streams.push(info.cloned());
    }

    fn restart_path(&mut self) {
        self.restarts += 1;
    }

    fn report_status(&mut self, status: &NodeStatus) {
        self.statuses.push(status.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::mock::MockBackend;
    use crate::backends::camera::types::{FormatDescriptor, FourCc, FrameRate};
    use crate::backends::camera::FormatCatalog;

    fn node(backend: &MockBackend) -> StreamNode<RecordingHost> {
        let registry = SessionRegistry::new(FormatCatalog::new(Arc::new(backend.clone())));
        StreamNode::new("1", registry, RecordingHost::default())
    }

    fn single_format_backend() -> MockBackend {
        MockBackend::new().with_device(
            "D",
            vec![FormatDescriptor::video(FourCc::NV12, 1920, 1080, FrameRate::Fps60)],
        )
    }

    #[test]
    fn test_open_publishes_stream_and_restarts() {
        let backend = single_format_backend();
        let mut node = node(&backend);

        node.set(Level::Device, "D");

        assert!(node.session_id().is_some());
        assert_eq!(node.status(), &NodeStatus::Streaming);
        assert_eq!(node.host().restarts, 1);
        let info = node.stream_info().unwrap();
        assert_eq!(info.format_name, "NV12");
        assert_eq!(info.stream_index, 0);
        assert_eq!(
            node.host().latest_options("webcam.FrameRateList.1"),
            Some(&["NONE".to_string(), "60".to_string()][..])
        );
    }

    #[test]
    fn test_open_failure_resets_frame_rate() {
        let backend = single_format_backend();
        backend.set_open_failure(Some("device busy"));
        let mut node = node(&backend);

        node.set(Level::Device, "D");

        assert!(node.session_id().is_none());
        assert_eq!(node.host().latest_value(Level::FrameRate), Some("NONE"));
        assert_eq!(
            node.status(),
            &NodeStatus::Error("Open failed: device busy".to_string())
        );
        assert!(node.resolver().state().frame_rate.is_none());
    }

    #[test]
    fn test_drop_closes_session() {
        let backend = single_format_backend();
        let mut node = node(&backend);
        node.set(Level::Device, "D");

        drop(node);
        assert_eq!(backend.release_count(), 1);
    }

    #[test]
    fn test_shutdown_then_drop_releases_once() {
        let backend = single_format_backend();
        let mut node = node(&backend);
        node.set(Level::Device, "D");

        node.shutdown();
        assert_eq!(node.host().streams.last(), Some(&None));
        drop(node);
        assert_eq!(backend.release_count(), 1);
    }
}
