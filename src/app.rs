use std::path::PathBuf;
use std::time;

use anyhow::anyhow;
use show_image::{create_window, event, ImageInfo, ImageView, WindowOptions};
use tracing::info;

use crate::frame::Image;
use crate::scene::pipeline::{AntiAlias, Rasterizer, RenderConfig, RenderMode};
use crate::scene::Scene;

/// Execution context, filled from the command line.
/// Options left as None keep the values from the scene file.
pub struct Params {
    pub scene_path: PathBuf,
    pub output_path: PathBuf,
    pub depth_path: Option<PathBuf>,
    pub mode: Option<RenderMode>,
    pub antialias: Option<AntiAlias>,
    pub samples_per_pixel: Option<u32>,
    pub seed: Option<u64>,
    pub preview: bool,
}

impl Params {
    fn apply_overrides(&self, config: &mut RenderConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(antialias) = self.antialias {
            config.antialias = antialias;
        }
        if let Some(samples_per_pixel) = self.samples_per_pixel {
            config.samples_per_pixel = samples_per_pixel;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
    }
}

/// Helper, defining exit event to be an Escape key press.
fn is_exit_event(window_event: event::WindowEvent) -> bool {
    if let event::WindowEvent::KeyboardInput(event) = window_event {
        if event.input.key_code == Some(event::VirtualKeyCode::Escape) && event.input.state.is_released() {
            return true;
        }
    }

    return false;
}

/// Shows the rendered image and blocks until the window is closed or Escape is pressed.
fn show_preview(image: &Image) -> anyhow::Result<()> {
    let window_options = WindowOptions {
        size: Some([image.width, image.height]),
        ..Default::default()
    };
    let window = create_window("output", window_options)
        .map_err(|e| anyhow!("failed to create preview window: {}", e))?;
    let image_data = image.as_rgb8_data();
    window
        .set_image("image", ImageView::new(ImageInfo::rgb8(image.width, image.height), &image_data))
        .map_err(|e| anyhow!("failed to show image: {}", e))?;

    let event_channel = window
        .event_channel()
        .map_err(|e| anyhow!("failed to listen to preview window: {}", e))?;
    // Channel disconnects when the window is destroyed.
    for window_event in event_channel {
        if is_exit_event(window_event) {
            break;
        }
    }

    return Ok(());
}

/// Loads the scene, renders one frame and writes it out.
pub fn run(params: Params) -> anyhow::Result<()> {
    let mut scene = Scene::load(&params.scene_path)?;
    params.apply_overrides(&mut scene.render);

    let meshes = scene.load_meshes()?;
    info!(
        meshes = meshes.len(),
        triangles = meshes.iter().map(Vec::len).sum::<usize>(),
        lights = scene.lights.len(),
        "Scene loaded"
    );

    let time_begin = time::Instant::now();
    let mut rasterizer = Rasterizer::new(scene.render.clone());
    let frame = rasterizer.render(&scene, &meshes);
    info!(elapsed_ms = time_begin.elapsed().as_millis() as u64, "Frame rendered");

    frame.image.save(&params.output_path)?;
    info!(path = %params.output_path.display(), "Image written");
    if let Some(depth_path) = &params.depth_path {
        frame.depth.to_image().save(depth_path)?;
        info!(path = %depth_path.display(), "Depth image written");
    }

    if params.preview {
        show_preview(&frame.image)?;
    }

    return Ok(());
}
