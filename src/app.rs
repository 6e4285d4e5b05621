//! Windowed application: event loop, input, and the per-frame driver.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::KeyCode;
use winit::window::{Window, WindowId};

use crate::config::SceneConfig;
use crate::gpu::GpuContext;
use crate::input::Input;
use crate::orchestrator::FrameOrchestrator;
use crate::pass::mouse_vector;
use crate::pipeline::FrameState;
use crate::player::Player;

/// Player circle radius in pixels.
pub const PLAYER_RADIUS: u32 = 5;
/// Player movement speed in pixels per second.
const PLAYER_SPEED: f32 = 200.0;

/// Startup options for [`run`].
pub struct AppConfig {
    /// Directory holding `scene.json` and its shader files.
    pub scene_dir: PathBuf,
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scene_dir: PathBuf::from("scenes/infinite"),
            width: 1024,
            height: 768,
            title: String::from("barrage"),
        }
    }
}

struct App {
    config: AppConfig,
    window: Option<Arc<Window>>,
    gpu: Option<GpuContext>,
    orchestrator: Option<FrameOrchestrator>,
    player: Player,
    input: Input,
    start_time: Instant,
    last_frame: Instant,
    frame_count: u32,
}

impl App {
    fn new(config: AppConfig) -> Self {
        let start = Vec2::new(config.width as f32 * 0.5, config.height as f32 * 0.15);
        Self {
            player: Player::new(start, PLAYER_SPEED, PLAYER_RADIUS),
            config,
            window: None,
            gpu: None,
            orchestrator: None,
            input: Input::new(),
            start_time: Instant::now(),
            last_frame: Instant::now(),
            frame_count: 0,
        }
    }

    fn frame(&mut self) {
        let (Some(gpu), Some(orchestrator)) = (self.gpu.as_ref(), self.orchestrator.as_mut())
        else {
            return;
        };

        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;

        let viewport = Vec2::new(gpu.width() as f32, gpu.height() as f32);
        if self.input.key_down(KeyCode::ArrowUp) {
            self.player.move_up(dt, viewport);
        } else if self.input.key_down(KeyCode::ArrowDown) {
            self.player.move_down(dt, viewport);
        }
        if self.input.key_down(KeyCode::ArrowLeft) {
            self.player.move_left(dt, viewport);
        } else if self.input.key_down(KeyCode::ArrowRight) {
            self.player.move_right(dt, viewport);
        }

        let frame = FrameState {
            time: self.start_time.elapsed().as_secs_f32(),
            frame: self.frame_count,
            mouse: mouse_vector(
                self.input.mouse_position(),
                viewport.y,
                self.input.mouse_down(MouseButton::Left),
                self.input.mouse_down(MouseButton::Right),
            ),
        };
        self.frame_count = self.frame_count.wrapping_add(1);

        match orchestrator.render_frame(gpu, &frame, &self.player) {
            Ok(true) => log::debug!("collision at frame {}", frame.frame),
            Ok(false) => {}
            Err(e) => log::error!("frame {}: {e}", frame.frame),
        }

        self.input.begin_frame();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let attributes = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .expect("failed to create window"),
        );

        let gpu = GpuContext::new(window.clone());
        let scene = SceneConfig::load(&self.config.scene_dir)
            .unwrap_or_else(|e| panic!("failed to load scene: {e}"));
        let orchestrator =
            FrameOrchestrator::new(&gpu, &scene, &self.config.scene_dir, PLAYER_RADIUS)
                .unwrap_or_else(|e| panic!("failed to build pipeline: {e}"));

        self.gpu = Some(gpu);
        self.orchestrator = Some(orchestrator);
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.input.handle_event(&event);
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { .. } if self.input.key_pressed(KeyCode::Escape) => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                self.frame();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => (),
        }
    }
}

/// Runs the windowed app until the window closes.
pub fn run(config: AppConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}
