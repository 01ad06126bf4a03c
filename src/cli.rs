// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for capture operations
//!
//! This module provides command-line functionality for:
//! - Listing capture devices and their formats
//! - Driving a stream node through the selection cascade
//! - Reading frames, optionally dumping or relaying them

use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};
use webcam_stream::backends::camera::frame_loop::LoopAction;
use webcam_stream::backends::camera::{
    CaptureBackend, FormatCatalog, SessionId, StreamInfo, get_backend,
};
use webcam_stream::backends::virtual_camera::{OutputConfig, OutputFormat, OwnerId, VirtualOutput};
use webcam_stream::config::{Config, SelectionSettings};
use webcam_stream::constants::timing::FRAME_LOG_INTERVAL;
use webcam_stream::selection::{LevelChanged, NodeStatus, ParameterHost};
use webcam_stream::{AppError, AppResult, FrameReader, Level, SessionRegistry, StreamNode};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Loaded configuration and where it came from
pub struct Context {
    pub config: Config,
    path: Option<PathBuf>,
}

impl Context {
    pub fn load(path: Option<PathBuf>) -> AppResult<Self> {
        let config = match &path {
            Some(path) => Config::load_from(path)?,
            None => Config::load(),
        };
        Ok(Self { config, path })
    }

    fn catalog(&self) -> AppResult<FormatCatalog> {
        let backend = get_backend(self.config.backend, self.config.buffer_count)?;
        Ok(FormatCatalog::with_supported_formats(
            backend,
            self.config.supported_fourccs(),
        ))
    }

    fn save(&self) {
        let result = match &self.path {
            Some(path) => self.config.save_to(path),
            None => self.config.save(),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to save selection");
        }
    }
}

/// Values for each selection level
#[derive(clap::Args, Debug, Default)]
pub struct SelectionArgs {
    /// Device name (from 'webcam-stream list')
    #[arg(short, long)]
    pub device: Option<String>,

    /// Pixel format, e.g. NV12
    #[arg(short, long)]
    pub format: Option<String>,

    /// Resolution, e.g. 1280x720
    #[arg(short, long)]
    pub resolution: Option<String>,

    /// Frame rate, e.g. 30 or 29.97
    #[arg(long = "fps")]
    pub frame_rate: Option<String>,
}

impl SelectionArgs {
    fn get(&self, level: Level) -> Option<&str> {
        match level {
            Level::Device => self.device.as_deref(),
            Level::Format => self.format.as_deref(),
            Level::Resolution => self.resolution.as_deref(),
            Level::FrameRate => self.frame_rate.as_deref(),
        }
    }
}

/// Prints what the node publishes
#[derive(Default)]
struct ConsoleHost;

impl ParameterHost for ConsoleHost {
    fn set_value(&mut self, level: Level, value: &str) {
        println!("  {:<11} = {}", level.name(), value);
    }

    fn update_options(&mut self, list_name: &str, _level: Level, options: &[String]) {
        debug!(list = list_name, count = options.len(), "Options updated");
    }

    fn publish_stream(&mut self, info: Option<&StreamInfo>) {
        match info {
            Some(info) => println!(
                "Stream {}: {} {} {} @ {}fps",
                info.id, info.device_name, info.format_name, info.resolution, info.frame_rate
            ),
            None => debug!("Stream closed"),
        }
    }

    fn restart_path(&mut self) {
        debug!("Output path restart requested");
    }

    fn report_status(&mut self, status: &NodeStatus) {
        if let NodeStatus::Error(msg) = status {
            eprintln!("Error: {}", msg);
        }
    }
}

/// List all available capture devices
pub fn list_devices(ctx: &Context) -> CliResult {
    let catalog = ctx.catalog()?;
    let devices = catalog.list_devices();

    if devices.is_empty() {
        println!("No capture devices found.");
        return Ok(());
    }

    println!("Available devices ({}):", catalog.backend().backend_type());
    println!();
    for device in &devices {
        let formats = catalog.list_formats(device);
        println!("  {} ({})", device.name, device.id);
        if let Some(best) = formats.first() {
            println!("      {} formats, preferred: {}", formats.len(), best.tuple());
        } else {
            println!("      no supported formats");
        }
    }

    Ok(())
}

/// Print the supported formats of `name`, in selection order
pub fn show_formats(ctx: &Context, name: &str) -> CliResult {
    let catalog = ctx.catalog()?;
    let device = catalog
        .list_devices()
        .into_iter()
        .find(|d| d.name == name)
        .ok_or_else(|| AppError::Other(format!("No device named '{}'", name)))?;

    let formats = catalog.list_formats(&device);
    if formats.is_empty() {
        println!("{}: no supported formats", device.name);
        return Ok(());
    }

    println!("{}:", device.name);
    for descriptor in &formats {
        println!(
            "  [{}] {:<4} {:>9} @ {}fps",
            descriptor.stream_index,
            descriptor.format_tag(),
            descriptor.resolution.to_string(),
            descriptor.frame_rate
        );
    }

    Ok(())
}

/// Run the selection cascade and read frames until the limit or Ctrl-C
pub fn stream(
    ctx: &mut Context,
    selection: SelectionArgs,
    frames: Option<u64>,
    output: Option<PathBuf>,
) -> CliResult {
    let registry = SessionRegistry::new(ctx.catalog()?);
    let mut node = select(ctx, &registry, &selection)?;
    let id = opened(&node)?;

    let dump = match output {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            Some(FrameDump::new(dir, node.stream_info()))
        }
        None => None,
    };

    let reader = FrameReader::new(registry.clone());
    let count = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&count);

    println!("Streaming... (press Ctrl+C to stop)");
    let mut controller = reader.spawn(id, ctx.config.read_interval(), move |cycle| {
        let frame = match cycle {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "Cycle produced no frame");
                return LoopAction::Continue;
            }
        };

        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(dump) = &dump
            && let Err(e) = dump.write(n, frame)
        {
            warn!(error = %e, "Failed to write frame");
        }
        if n % FRAME_LOG_INTERVAL == 0 {
            println!("  {} frames", n);
        }

        match frames {
            Some(limit) if n >= limit => LoopAction::Stop,
            _ => LoopAction::Continue,
        }
    })?;

    let stop = controller.stop_signal();
    ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))?;
    controller.join();

    let stats = reader.stats();
    println!(
        "Read {} frames ({} failed cycles)",
        count.load(Ordering::SeqCst),
        stats.failures()
    );

    node.shutdown();
    registry.close_all();
    Ok(())
}

/// Run the selection cascade and relay frames to a loopback device
pub fn relay(
    ctx: &mut Context,
    selection: SelectionArgs,
    sink: Option<PathBuf>,
    frames: Option<u64>,
) -> CliResult {
    let registry = SessionRegistry::new(ctx.catalog()?);
    let mut node = select(ctx, &registry, &selection)?;
    let id = opened(&node)?;

    let info = node
        .stream_info()
        .cloned()
        .ok_or_else(|| AppError::Other("stream info missing".to_string()))?;
    let config = OutputConfig {
        width: info.resolution.width,
        height: info.resolution.height,
        frame_rate: info.frame_rate.as_f64(),
        format: info.format_name.parse::<OutputFormat>()?,
    };

    let path = sink.unwrap_or_else(|| PathBuf::from(&ctx.config.output.device));
    let output = Arc::new(loopback_output(&path)?);
    let owner = OwnerId::new();
    output.acquire(owner, config)?;
    println!("Relaying to {}... (press Ctrl+C to stop)", path.display());

    let reader = FrameReader::new(registry.clone());
    let sent = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&sent);
    let relay_output = Arc::clone(&output);

    let mut controller = reader.spawn(id, ctx.config.read_interval(), move |cycle| {
        let Ok(frame) = cycle else {
            return LoopAction::Continue;
        };
        if let Err(e) = relay_output.send_frame(owner, frame) {
            warn!(error = %e, "Failed to relay frame");
            return LoopAction::Continue;
        }

        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        match frames {
            Some(limit) if n >= limit => LoopAction::Stop,
            _ => LoopAction::Continue,
        }
    })?;

    let stop = controller.stop_signal();
    ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))?;
    controller.join();

    println!("Relayed {} frames", sent.load(Ordering::SeqCst));
    output.release(owner);
    output.shutdown();
    node.shutdown();
    registry.close_all();
    Ok(())
}

#[cfg(target_os = "linux")]
fn loopback_output(path: &Path) -> AppResult<VirtualOutput> {
    use webcam_stream::backends::virtual_camera::LoopbackDriver;
    Ok(VirtualOutput::new(Box::new(LoopbackDriver::new(path))))
}

#[cfg(not(target_os = "linux"))]
fn loopback_output(_path: &Path) -> AppResult<VirtualOutput> {
    Err(AppError::Other(
        "loopback output is only available on Linux".to_string(),
    ))
}

/// Build a node, run [`apply_selection`] and remember an opened selection
fn select(
    ctx: &mut Context,
    registry: &SessionRegistry,
    args: &SelectionArgs,
) -> AppResult<StreamNode<ConsoleHost>> {
    let mut node = StreamNode::new("1", registry.clone(), ConsoleHost);
    node.refresh_devices();

    apply_selection(&mut node, &ctx.config.last_selection, args);

    if node.session_id().is_some() {
        let state = node.resolver().state();
        for level in Level::ALL {
            ctx.config.last_selection.set(level, state.value(level));
        }
        ctx.save();
    }

    Ok(node)
}

/// Replay `stored` as an initial restore, then apply `args` as user changes
///
/// The restore is skipped when `args` names another device. An argument equal
/// to the current value is only skipped while a session is open; otherwise it
/// is re-applied so single options below it get auto-selected.
fn apply_selection<H: ParameterHost>(
    node: &mut StreamNode<H>,
    stored: &SelectionSettings,
    args: &SelectionArgs,
) {
    let restore = match (args.device.as_deref(), stored.device.as_deref()) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(wanted), Some(saved)) => wanted == saved,
    };

    if restore {
        debug!("Restoring last selection");
        for level in Level::ALL {
            if let Some(value) = stored.get(level) {
                node.on_level_changed(LevelChanged::restore(level, value));
            }
        }
    }

    for level in Level::ALL {
        let Some(value) = args.get(level) else {
            continue;
        };
        let unchanged = node.resolver().state().value(level).as_deref() == Some(value);
        if unchanged && node.session_id().is_some() {
            continue;
        }
        node.set(level, value);
    }
}

/// The node's session, or the options for the first level still missing
fn opened(node: &StreamNode<ConsoleHost>) -> AppResult<SessionId> {
    if let Some(id) = node.session_id() {
        return Ok(id);
    }

    if let NodeStatus::Error(msg) = node.status() {
        return Err(AppError::Other(msg.clone()));
    }

    let state = node.resolver().state();
    let missing = Level::ALL
        .into_iter()
        .find(|level| !state.is_set(*level))
        .unwrap_or(Level::FrameRate);
    let options = node.resolver().options(missing);
    Err(AppError::Other(format!(
        "No stream opened; choose a {}: {}",
        missing.name(),
        options.join(", ")
    )))
}

/// Writes raw frames as numbered files
struct FrameDump {
    dir: PathBuf,
    prefix: String,
    extension: String,
}

impl FrameDump {
    fn new(dir: PathBuf, info: Option<&StreamInfo>) -> Self {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let extension = info
            .map(|i| i.format_name.to_ascii_lowercase())
            .unwrap_or_else(|| "raw".to_string());
        Self {
            dir,
            prefix: format!("frame_{}", timestamp),
            extension,
        }
    }

    fn write(&self, n: u64, frame: &[u8]) -> std::io::Result<()> {
        let path = self
            .dir
            .join(format!("{}_{:06}.{}", self.prefix, n, self.extension));
        std::fs::write(path, frame)
    }
}
