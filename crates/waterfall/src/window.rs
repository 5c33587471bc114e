use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use tracing::{debug, error, info};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use crate::gpu::GpuBackend;
use crate::gradient::GradientTable;
use crate::pipeline::{FramePipeline, PipelineStats};
use crate::types::{InboundRow, WaterfallConfig};

/// How long the event loop sleeps between checks of the row channel.
const ROW_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Settings for the preview window.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub pipeline: WaterfallConfig,
    pub width: u32,
    pub height: u32,
    /// Screen pixels per ring row; sets how many rows the window shows.
    pub row_height: u32,
    pub title: String,
}

impl WindowConfig {
    pub fn visible_rows(&self, window_height: u32) -> u32 {
        visible_rows(window_height, self.row_height)
    }
}

fn visible_rows(window_height: u32, row_height: u32) -> u32 {
    (window_height / row_height.max(1)).max(1)
}

#[derive(Debug, Clone)]
enum WindowCommand {
    SetGradient(GradientTable),
    Shutdown,
}

/// A window on its own thread that feeds every received row through a
/// [`FramePipeline`] backed by the GPU.
pub struct WindowRuntime {
    proxy: EventLoopProxy<WindowCommand>,
    join_handle: Option<JoinHandle<Result<PipelineStats>>>,
}

impl WindowRuntime {
    /// Opens the window. Rows are pulled from `rows`; a bounded channel
    /// pushes back on the producer when rendering falls behind.
    pub fn spawn(config: WindowConfig, rows: Receiver<InboundRow>) -> Result<Self> {
        let (ready_tx, ready_rx) = bounded(1);
        let handle = thread::Builder::new()
            .name("waterfall-window".into())
            .spawn(move || run_window_thread(config, rows, ready_tx))
            .map_err(|err| anyhow!("failed to spawn window thread: {err}"))?;

        let proxy = ready_rx
            .recv()
            .map_err(|err| anyhow!("window thread failed to initialise: {err}"))??;

        Ok(Self {
            proxy,
            join_handle: Some(handle),
        })
    }

    pub fn set_gradient(&self, table: GradientTable) -> Result<()> {
        self.proxy
            .send_event(WindowCommand::SetGradient(table))
            .map_err(|err| anyhow!("window is gone: {err}"))
    }

    /// True once the window thread has exited on its own (closed, Escape,
    /// feed disconnected or a fatal render error).
    pub fn is_finished(&self) -> bool {
        self.join_handle
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }

    /// Closes the window and returns the pipeline totals.
    pub fn shutdown(mut self) -> Result<PipelineStats> {
        let handle = self
            .join_handle
            .take()
            .ok_or_else(|| anyhow!("window runtime already shut down"))?;
        let _ = self.proxy.send_event(WindowCommand::Shutdown);
        handle
            .join()
            .map_err(|err| anyhow!("window thread panicked: {err:?}"))?
    }
}

impl Drop for WindowRuntime {
    fn drop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            let _ = self.proxy.send_event(WindowCommand::Shutdown);
            let _ = handle.join();
        }
    }
}

fn run_window_thread(
    config: WindowConfig,
    rows: Receiver<InboundRow>,
    ready_tx: Sender<Result<EventLoopProxy<WindowCommand>>>,
) -> Result<PipelineStats> {
    let mut builder = EventLoopBuilder::<WindowCommand>::with_user_event();
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        use winit::platform::wayland::EventLoopBuilderExtWayland;
        EventLoopBuilderExtWayland::with_any_thread(&mut builder, true);
    }

    #[cfg(any(
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    ))]
    {
        use winit::platform::x11::EventLoopBuilderExtX11;
        EventLoopBuilderExtX11::with_any_thread(&mut builder, true);
    }
    let event_loop = match builder.build() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            let _ = ready_tx.send(Err(anyhow!("failed to create event loop: {err}")));
            return Err(anyhow!("failed to create event loop: {err}"));
        }
    };
    let proxy = event_loop.create_proxy();

    let window = match WindowBuilder::new()
        .with_title(config.title.clone())
        .with_inner_size(PhysicalSize::new(config.width, config.height))
        .build(&event_loop)
    {
        Ok(window) => Arc::new(window),
        Err(err) => {
            let _ = ready_tx.send(Err(anyhow!("failed to create window: {err}")));
            return Err(anyhow!("failed to create window: {err}"));
        }
    };

    let backend = match GpuBackend::new(window.clone(), &config.pipeline) {
        Ok(backend) => backend,
        Err(err) => {
            let wrapped = anyhow!("failed to initialise waterfall renderer: {err:#}");
            let message = wrapped.to_string();
            let _ = ready_tx.send(Err(anyhow!(message)));
            return Err(wrapped);
        }
    };
    let mut pipeline = FramePipeline::new(backend);
    let mut visible = config.visible_rows(pipeline.backend().surface_size().height);
    info!(
        width = config.width,
        height = config.height,
        visible_rows = visible,
        slots = config.pipeline.max_buffers,
        "waterfall window ready"
    );

    let _ = ready_tx.send(Ok(proxy));

    let mut failure: Option<anyhow::Error> = None;
    let run_result = event_loop.run(|event, elwt| match event {
        Event::UserEvent(command) => match command {
            WindowCommand::SetGradient(table) => {
                debug!("replacing gradient table");
                pipeline.set_gradient(&table);
            }
            WindowCommand::Shutdown => elwt.exit(),
        },
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && matches!(event.logical_key, Key::Named(NamedKey::Escape))
                {
                    elwt.exit();
                }
            }
            WindowEvent::Resized(new_size) => {
                pipeline.backend_mut().resize(new_size);
                visible = config.visible_rows(new_size.height);
                debug!(
                    width = new_size.width,
                    height = new_size.height,
                    visible_rows = visible,
                    "window resized"
                );
            }
            _ => {}
        },
        Event::AboutToWait => {
            loop {
                match rows.try_recv() {
                    Ok(row) => {
                        let bins = row.window;
                        if let Err(err) = pipeline.on_row(
                            &row.samples,
                            bins.starting_bin,
                            bins.ending_bin,
                            visible,
                        ) {
                            error!(error = %err, "render failed; closing window");
                            failure = Some(err);
                            elwt.exit();
                            return;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        info!("row feed closed");
                        elwt.exit();
                        return;
                    }
                }
            }
            pipeline.maintain();
            elwt.set_control_flow(ControlFlow::WaitUntil(Instant::now() + ROW_POLL_INTERVAL));
        }
        _ => {}
    });

    if let Err(err) = run_result {
        return Err(anyhow!("window event loop error: {err}"));
    }
    if let Some(err) = failure {
        return Err(err);
    }

    let stats = pipeline.stats();
    info!(
        rows = stats.rows,
        presented = stats.presented,
        skipped = stats.skipped,
        "waterfall window closed"
    );
    Ok(stats)
}
