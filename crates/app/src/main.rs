//! Instanced rendering sample.
//!
//! Loads three OBJ meshes, scatters a few instances of each inside the view
//! frustum and flies a camera through them.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use instancing_core::config::{SceneConfig, WINDOW_HEIGHT, WINDOW_WIDTH};
use instancing_core::FrameTimer;
use instancing_platform::{InputState, KeyCode, MouseButton, Window};
use instancing_renderer::Renderer;
use instancing_resources::{AssetManifest, LoadedAssets};
use instancing_scene::{
    Camera, FlyController, InitOutcome, InitRequest, MovementKeys, SceneInstances, SpinAnimation,
};

const WINDOW_TITLE: &str = "Instanced Rendering";
const ASSET_DIR: &str = "assets";
const MESH_COUNT: usize = 3;
/// Set to a number for a reproducible scene.
const SEED_VAR: &str = "INSTANCING_SEED";

/// First fatal error seen by the event loop.
///
/// Device loss is absorbed by the renderer, so anything recorded here ends the
/// process.
#[derive(Debug, Default)]
struct Shutdown {
    error: Option<anyhow::Error>,
}

impl Shutdown {
    /// Records `error` unless an earlier one is already pending.
    fn fail(&mut self, error: anyhow::Error) {
        error!("Fatal: {:#}", error);
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn requested(&self) -> bool {
        self.error.is_some()
    }

    fn into_result(self) -> Result<()> {
        self.error.map_or(Ok(()), Err)
    }
}

struct App {
    /// Handed to the renderer on first resume.
    assets: Option<LoadedAssets>,
    window: Option<Window>,
    renderer: Option<Renderer>,
    input: InputState,
    timer: FrameTimer,
    camera: Camera,
    controller: FlyController,
    scene: SceneInstances,
    spin: SpinAnimation,
    shutdown: Shutdown,
}

impl App {
    fn new(assets: LoadedAssets, scene: SceneInstances, camera: Camera) -> Self {
        Self {
            assets: Some(assets),
            window: None,
            renderer: None,
            input: InputState::new(),
            timer: FrameTimer::new(),
            camera,
            controller: FlyController::new(),
            scene,
            spin: SpinAnimation::default(),
            shutdown: Shutdown::default(),
        }
    }

    fn movement_keys(&self) -> MovementKeys {
        MovementKeys {
            forward: self.input.is_key_pressed(KeyCode::KeyW),
            backward: self.input.is_key_pressed(KeyCode::KeyS),
            left: self.input.is_key_pressed(KeyCode::KeyA),
            right: self.input.is_key_pressed(KeyCode::KeyD),
            up: self.input.is_key_pressed(KeyCode::KeyE),
            down: self.input.is_key_pressed(KeyCode::KeyQ),
        }
    }

    /// One tick: controller, camera, animation, then draw.
    fn frame(&mut self) {
        let dt = self.timer.tick();

        self.controller
            .set_look_enabled(self.input.is_mouse_pressed(MouseButton::Left));
        let (dx, dy) = self.input.mouse_delta();
        self.controller.on_mouse_delta(dx, dy);
        self.controller.update(self.movement_keys());
        self.camera.advance(
            self.controller.velocity(),
            self.controller.look_direction(),
            dt,
        );
        self.spin.advance(dt);
        self.input.begin_frame();

        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        if let Err(e) = renderer.update(&self.scene, self.spin.phase(), &self.camera) {
            self.shutdown.fail(anyhow!("scene update failed: {e}"));
            return;
        }
        if let Err(e) = renderer.render_frame() {
            self.shutdown.fail(anyhow!("frame render failed: {e}"));
            return;
        }

        if self.timer.frame_count() % 600 == 0 {
            debug!("{:.1} fps", self.timer.fps());
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let Some(assets) = self.assets.take() else {
            return;
        };

        let window = match Window::new(event_loop, WINDOW_WIDTH, WINDOW_HEIGHT, WINDOW_TITLE) {
            Ok(window) => window,
            Err(e) => {
                self.shutdown.fail(anyhow!("failed to create window: {e}"));
                event_loop.exit();
                return;
            }
        };
        match Renderer::new(window.clone(), assets) {
            Ok(renderer) => {
                info!(
                    "Initialization complete ({} frame slots), entering main loop",
                    renderer.frame_slots()
                );
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(e) => {
                self.shutdown.fail(anyhow!("failed to create renderer: {e}"));
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    self.camera.set_viewport(size.width, size.height);
                }
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                self.frame();
                if self.shutdown.requested() {
                    event_loop.exit();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.input.on_key_pressed(key);
                    } else {
                        self.input.on_key_released(key);
                    }
                }
                if self.input.is_key_just_pressed(KeyCode::Escape) {
                    info!("Escape pressed, shutting down");
                    event_loop.exit();
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => self.input.on_mouse_pressed(button.into()),
                ElementState::Released => self.input.on_mouse_released(button.into()),
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .on_mouse_moved(position.x as f32, position.y as f32);
            }
            WindowEvent::CursorLeft { .. } => self.input.on_mouse_left(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.shutdown.requested() {
            event_loop.exit();
            return;
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn scene_rng() -> ChaCha8Rng {
    match std::env::var(SEED_VAR).map(|v| v.parse::<u64>()) {
        Ok(Ok(seed)) => {
            info!("Scene seed {}", seed);
            ChaCha8Rng::seed_from_u64(seed)
        }
        Ok(Err(e)) => {
            warn!("Ignoring {}: {}", SEED_VAR, e);
            ChaCha8Rng::from_entropy()
        }
        Err(_) => ChaCha8Rng::from_entropy(),
    }
}

fn build_scene(mesh_count: usize, camera: &Camera) -> Result<SceneInstances> {
    let config = SceneConfig::default();
    let request = InitRequest {
        instance_counts: &config.instance_counts,
        material_indices: &config.material_indices,
        frustum_half_width: config.frustum_half_width,
        min_distance: config.min_distance,
        max_distance: config.max_distance,
    };

    let mut scene = SceneInstances::new();
    let outcome = scene
        .initialize_objects(mesh_count, &request, camera, &mut scene_rng())
        .context("failed to place scene instances")?;
    if let InitOutcome::Applied { total_instances } = outcome {
        info!("Scene has {} instances over {} meshes", total_instances, mesh_count);
    }
    Ok(scene)
}

fn main() -> Result<()> {
    instancing_core::init_logging();
    info!("Starting {}", WINDOW_TITLE);

    let manifest = AssetManifest::numbered(Path::new(ASSET_DIR), MESH_COUNT, 0);
    let assets = LoadedAssets::load(&manifest).context("failed to load assets")?;
    let camera = Camera::new(WINDOW_WIDTH, WINDOW_HEIGHT);
    let scene = build_scene(assets.mesh_count(), &camera)?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(assets, scene, camera);
    event_loop.run_app(&mut app)?;

    app.shutdown.into_result()
}
