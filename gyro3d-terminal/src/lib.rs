/// Terminal front end: render loop, input and the device connection
use crossterm::{
    cursor,
    event::{self, Event},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use gyro3d_core::{AppState, Camera, Endpoint, Transform, UserCommand};
use std::io::{stdout, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

pub mod config;
pub mod loader;
pub mod net;
pub mod remote;
pub mod renderer;
pub mod scene;
pub mod telemetry;
pub mod ui;

pub use config::AppConfig;
pub use renderer::AsciiRenderer;
pub use scene::SceneDriver;
pub use telemetry::TelemetryConnection;
pub use ui::{InputHandler, UiAction};

use remote::UploadError;

/// Rows under the frame used by the status bar
const STATUS_ROWS: u16 = 2;

/// Main application struct for the telemetry viewer
pub struct TerminalApp {
    config: AppConfig,
    state: AppState,
    telemetry: TelemetryConnection,
    scene: SceneDriver,
    input: InputHandler,
    endpoint_url: String,
    camera: Camera,
    renderer: AsciiRenderer,
    viewport: (u16, u16),
    notice: Option<String>,
    uploads_tx: mpsc::UnboundedSender<Result<String, UploadError>>,
    uploads_rx: mpsc::UnboundedReceiver<Result<String, UploadError>>,
    running: bool,
    last_fps_sample: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalApp {
    pub fn new(config: AppConfig) -> Self {
        let (width, height) = terminal::size().unwrap_or((80, 24));
        let viewport = scene_viewport(width, height);
        let (uploads_tx, uploads_rx) = mpsc::unbounded_channel();

        Self {
            state: AppState::new(),
            telemetry: TelemetryConnection::new(),
            scene: SceneDriver::new(),
            input: InputHandler::new(config.rotate_step, config.scale_step),
            endpoint_url: config.endpoint_url.clone(),
            camera: Camera::new(viewport.0 as u32, viewport.1 as u32),
            renderer: AsciiRenderer::new(viewport.0 as usize, viewport.1 as usize),
            viewport,
            notice: None,
            uploads_tx,
            uploads_rx,
            running: true,
            last_fps_sample: Instant::now(),
            frame_count: 0,
            fps: 0.0,
            config,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Take over the terminal until the user quits.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            stdout(),
            terminal::EnterAlternateScreen,
            terminal::Clear(ClearType::All),
            cursor::Hide
        )?;

        let result = self.main_loop().await;

        self.telemetry.close().await;
        terminal::disable_raw_mode()?;
        execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    async fn main_loop(&mut self) -> anyhow::Result<()> {
        if self.config.connect_on_start {
            let url = self.endpoint_url.clone();
            self.apply_endpoint(url).await;
        }

        let period = Duration::from_secs_f64(1.0 / self.config.effective_frame_rate() as f64);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.running {
            ticker.tick().await;

            while event::poll(Duration::ZERO)? {
                match event::read()? {
                    Event::Key(key) => {
                        let action = self.input.handle_key(key);
                        self.handle_action(action).await;
                    }
                    Event::Resize(width, height) => self.resize(width, height)?,
                    _ => {}
                }
                if !self.running {
                    break;
                }
            }

            self.update();
            self.render()?;
        }

        Ok(())
    }

    pub async fn handle_action(&mut self, action: UiAction) {
        match action {
            UiAction::None => {}
            UiAction::Quit => self.running = false,
            UiAction::Command(command) => {
                tracing::debug!(?command, "User command");
                self.state.apply(command);
            }
            UiAction::OpenEndpointPrompt => self.input.edit_endpoint(&self.endpoint_url),
            UiAction::ApplyEndpoint(url) => self.apply_endpoint(url).await,
            UiAction::UploadModel(path) => self.start_upload(PathBuf::from(path)),
            UiAction::ResetRemote => match Endpoint::parse(&self.endpoint_url) {
                Ok(endpoint) => {
                    remote::reset_remote_orientation(endpoint);
                }
                Err(e) => tracing::warn!(error = %e, "Cannot reset remote orientation"),
            },
        }
    }

    async fn apply_endpoint(&mut self, url: String) {
        // Failures land in the connection status and show up in the status bar
        let _ = self.telemetry.set_endpoint(&url).await;
        self.endpoint_url = url;
    }

    fn start_upload(&mut self, path: PathBuf) {
        let endpoint = match Endpoint::parse(&self.endpoint_url) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.notice = Some(format!("upload failed: {}", e));
                return;
            }
        };
        self.notice = Some(format!("uploading {}", path.display()));
        let tx = self.uploads_tx.clone();
        tokio::spawn(async move {
            let result = remote::upload_model(&endpoint, &path).await;
            let _ = tx.send(result);
        });
    }

    /// Fold in everything that arrived since the last frame.
    pub fn update(&mut self) {
        for sample in self.telemetry.drain() {
            self.state.apply_sample(&sample);
        }

        while let Ok(result) = self.uploads_rx.try_recv() {
            match result {
                Ok(url) => {
                    tracing::info!(%url, "Upload accepted");
                    self.notice = None;
                    self.state.apply(UserCommand::UseCustomModel(url));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Model upload failed");
                    self.notice = Some(e.to_string());
                }
            }
        }

        self.frame_count += 1;
        let elapsed = self.last_fps_sample.elapsed();
        if elapsed.as_secs() >= 1 {
            self.fps = self.frame_count as f32 / elapsed.as_secs_f32();
            self.frame_count = 0;
            self.last_fps_sample = Instant::now();
        }
    }

    fn resize(&mut self, width: u16, height: u16) -> std::io::Result<()> {
        self.viewport = scene_viewport(width, height);
        self.camera.resize(self.viewport.0 as u32, self.viewport.1 as u32);
        self.renderer
            .resize(self.viewport.0 as usize, self.viewport.1 as usize);
        execute!(stdout(), terminal::Clear(ClearType::All))
    }

    fn render(&mut self) -> std::io::Result<()> {
        let transform = self.state.transform();
        let mut stdout = stdout();

        if self
            .scene
            .frame(
                self.state.active_model(),
                self.state.model_revision(),
                transform,
                self.viewport,
            )
        {
            self.renderer.clear();
            self.renderer.render_mesh(
                self.scene.mesh(),
                &Transform::model_matrix(&transform),
                &self.camera,
            );
            self.renderer.draw(&mut stdout)?;
        }

        let (first, second) = self.status_lines();
        let top = self.viewport.1;
        queue!(
            stdout,
            cursor::MoveTo(0, top),
            terminal::Clear(ClearType::CurrentLine),
            SetForegroundColor(Color::Yellow),
            Print(truncate(&first, self.viewport.0)),
            cursor::MoveTo(0, top + 1),
            terminal::Clear(ClearType::CurrentLine),
            SetForegroundColor(Color::Grey),
            Print(truncate(&second, self.viewport.0)),
            ResetColor
        )?;

        stdout.flush()
    }

    /// Status bar text.
    ///
    /// The first line leads with the connection, including its error, which
    /// persists until the endpoint is re-applied. The second line shows the
    /// prompt, the latest upload or model message, or key help.
    pub fn status_lines(&self) -> (String, String) {
        let t = self.state.transform();
        let connection = match self.telemetry.last_error() {
            Some(error) => format!("{}: {}", self.telemetry.state(), error),
            None => self.telemetry.state().to_string(),
        };
        let mut first = format!(
            "gyro3d | {} | {} | rot {:.2} {:.2} {:.2} scale {:.2} | {:.0} FPS",
            connection,
            self.endpoint_url,
            t.rotation.x,
            t.rotation.y,
            t.rotation.z,
            t.scale,
            self.fps
        );
        if self.scene.is_loading() {
            first.push_str(" | loading model");
        }

        let second = if let Some(prompt) = self.input.prompt() {
            prompt
        } else if let Some(notice) = &self.notice {
            notice.clone()
        } else if let Some(error) = self.scene.load_error() {
            format!("model: {}", error)
        } else {
            "WASD/Arrows/E/R rotate  +/- scale  C endpoint  M model  0 reset device  Q quit"
                .to_string()
        };
        (first, second)
    }
}

fn scene_viewport(width: u16, height: u16) -> (u16, u16) {
    (width.max(1), height.saturating_sub(STATUS_ROWS).max(1))
}

fn truncate(text: &str, width: u16) -> String {
    text.chars().take(width as usize).collect()
}
