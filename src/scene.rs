//! Scene description: camera, lights, shading constants, output resolution and mesh instances.
//!
//! Loaded from a JSON file, meshes come either from OBJ files or are listed inline.

pub mod buffer;
pub mod depth;
pub mod pipeline;
pub mod raster;
pub mod shader;
pub mod transform;
pub mod util;

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use nalgebra as na;
use na::{Matrix4, Rotation3, Unit, Vector3};
use obj::{load_obj, Obj};
use serde::Deserialize;
use tracing::debug;

use crate::util::{Color, WHITE};
use pipeline::RenderConfig;
use util::Triangle;

/// Pinhole camera. Near and far are positive distances along the view direction, width and
/// height give the size of the view window on the near plane.
#[derive(Debug, Clone, Deserialize)]
pub struct Camera {
    pub position: Vector3<f32>,
    pub look_at: Vector3<f32>,
    #[serde(default = "default_up")]
    pub up: Vector3<f32>,
    pub near: f32,
    pub far: f32,
    pub width: f32,
    pub height: f32,
}

/// Point light.
#[derive(Debug, Clone, Deserialize)]
pub struct Light {
    pub position: Vector3<f32>,
    #[serde(default = "default_light_color")]
    pub color: Color,
    pub intensity: f32,
}

/// Rotation given as an axis and an angle in degrees.
#[derive(Debug, Clone, Deserialize)]
pub struct AxisAngle {
    pub axis: Vector3<f32>,
    pub angle_degrees: f32,
}

impl Default for AxisAngle {
    fn default() -> Self {
        return Self {
            axis: Vector3::y(),
            angle_degrees: 0.0,
        };
    }
}

impl AxisAngle {
    /// Homogenous rotation matrix, None for a zero axis.
    pub fn to_matrix(&self) -> Option<Matrix4<f32>> {
        let axis = Unit::try_new(self.axis, f32::EPSILON)?;
        return Some(Rotation3::from_axis_angle(&axis, self.angle_degrees.to_radians()).to_homogeneous());
    }
}

/// Triangle listed directly in the scene file.
#[derive(Debug, Clone, Deserialize)]
pub struct TriangleDesc {
    pub positions: [Vector3<f32>; 3],
    pub normals: [Vector3<f32>; 3],
    #[serde(default)]
    pub colors: Option<[Color; 3]>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshSource {
    Obj(PathBuf),
    Triangles(Vec<TriangleDesc>),
}

/// One placed copy of a mesh.
#[derive(Debug, Clone, Deserialize)]
pub struct MeshInstance {
    pub source: MeshSource,
    #[serde(default)]
    pub translation: Vector3<f32>,
    #[serde(default)]
    pub rotation: AxisAngle,
    #[serde(default = "default_scale")]
    pub scale: Vector3<f32>,
    /// Solid color used by the coverage render mode.
    #[serde(default = "default_mesh_color")]
    pub color: Color,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scene {
    /// Output resolution in pixels.
    pub width: u32,
    pub height: u32,
    pub camera: Camera,
    #[serde(default)]
    pub lights: Vec<Light>,
    #[serde(default = "default_ambient")]
    pub ambient: Color,
    #[serde(default = "default_specular_exponent")]
    pub specular_exponent: f32,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub meshes: Vec<MeshInstance>,
}

fn default_up() -> Vector3<f32> {
    return Vector3::y();
}

fn default_light_color() -> Color {
    return WHITE;
}

fn default_scale() -> Vector3<f32> {
    return Vector3::repeat(1.0);
}

fn default_mesh_color() -> Color {
    return WHITE;
}

fn default_ambient() -> Color {
    return Color::new(0.05, 0.05, 0.05);
}

fn default_specular_exponent() -> f32 {
    return 32.0;
}

impl Scene {
    /// Parses and validates a scene from JSON. Relative OBJ paths are left as they are.
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let scene: Scene = serde_json::from_str(s).context("failed to parse scene description")?;
        scene.validate()?;
        return Ok(scene);
    }

    /// Loads a scene file, relative OBJ paths are resolved against the directory of the file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read scene file {}", path.display()))?;
        let mut scene = Scene::from_json_str(&contents)
            .with_context(|| format!("invalid scene file {}", path.display()))?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        for mesh in &mut scene.meshes {
            if let MeshSource::Obj(obj_path) = &mut mesh.source {
                if obj_path.is_relative() {
                    *obj_path = base_dir.join(obj_path.as_path());
                }
            }
        }
        return Ok(scene);
    }

    /// Rejects scenes the pipeline can't build matrices for.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("output resolution must be non-zero, got {}x{}", self.width, self.height);
        }

        let camera = &self.camera;
        if !(camera.near > 0.0) || !(camera.far > camera.near) {
            bail!("expected 0 < near < far, got near = {}, far = {}", camera.near, camera.far);
        }
        if !(camera.width > 0.0) || !(camera.height > 0.0) {
            bail!("camera view window must be positive, got {}x{}", camera.width, camera.height);
        }
        let view_direction = camera.look_at - camera.position;
        if view_direction.norm() <= f32::EPSILON {
            bail!("camera position and look_at coincide");
        }
        if view_direction.normalize().cross(&camera.up).norm() <= 1e-6 {
            bail!("camera up vector is zero or parallel to the view direction");
        }

        for (i, mesh) in self.meshes.iter().enumerate() {
            if mesh.rotation.to_matrix().is_none() {
                bail!("mesh {} has a zero rotation axis", i);
            }
        }
        return Ok(());
    }

    /// Loads triangles of every mesh instance, in the order of `meshes`.
    pub fn load_meshes(&self) -> anyhow::Result<Vec<Vec<Triangle>>> {
        return self.meshes.iter().map(MeshInstance::triangles).collect();
    }
}

impl MeshInstance {
    /// Triangles of the mesh in model space.
    pub fn triangles(&self) -> anyhow::Result<Vec<Triangle>> {
        match &self.source {
            MeshSource::Obj(path) => return load_obj_triangles(path),
            MeshSource::Triangles(descs) => {
                return Ok(descs
                    .iter()
                    .map(|desc| {
                        let triangle = Triangle::new(desc.positions, desc.normals);
                        match desc.colors {
                            Some(colors) => triangle.with_color(colors),
                            None => triangle,
                        }
                    })
                    .collect());
            }
        }
    }
}

/// Reads an OBJ file with positions and normals into a triangle list.
fn load_obj_triangles(path: &Path) -> anyhow::Result<Vec<Triangle>> {
    let file = File::open(path).with_context(|| format!("failed to open mesh {}", path.display()))?;
    let model: Obj = load_obj(BufReader::new(file))
        .with_context(|| format!("failed to parse mesh {}", path.display()))?;
    debug!(
        path = %path.display(),
        vertices = model.vertices.len(),
        indices = model.indices.len(),
        "Loaded mesh"
    );

    let mut triangles = Vec::with_capacity(model.indices.len() / 3);
    for face in model.indices.chunks_exact(3) {
        let mut positions = [Vector3::zeros(); 3];
        let mut normals = [Vector3::zeros(); 3];
        for i in 0..3 {
            let vertex = match model.vertices.get(face[i] as usize) {
                Some(vertex) => vertex,
                None => bail!("mesh {} references missing vertex {}", path.display(), face[i]),
            };
            positions[i] = Vector3::from(vertex.position);
            normals[i] = Vector3::from(vertex.normal);
        }
        triangles.push(Triangle::new(positions, normals));
    }
    return Ok(triangles);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::pipeline::{AntiAlias, RenderMode};
    use std::io::Write;

    const MINIMAL: &str = r#"{
        "width": 64,
        "height": 48,
        "camera": {
            "position": [0.0, 0.0, 5.0],
            "look_at": [0.0, 0.0, 0.0],
            "near": 1.0,
            "far": 10.0,
            "width": 2.0,
            "height": 1.5
        }
    }"#;

    fn minimal() -> Scene {
        return Scene::from_json_str(MINIMAL).unwrap();
    }

    #[test]
    fn defaults_are_filled_in() {
        let scene = minimal();
        assert_eq!(scene.camera.up, Vector3::y());
        assert!(scene.lights.is_empty());
        assert!(scene.meshes.is_empty());
        assert_eq!(scene.specular_exponent, 32.0);
        assert_eq!(scene.render.mode, RenderMode::Shaded);
        assert_eq!(scene.render.antialias, AntiAlias::None);
    }

    #[test]
    fn full_scene_parses() {
        let scene = Scene::from_json_str(
            r#"{
                "width": 8, "height": 8,
                "camera": { "position": [0, 0, 5], "look_at": [0, 0, 0], "up": [0, 1, 0],
                            "near": 1, "far": 10, "width": 2, "height": 2 },
                "lights": [{ "position": [0, 4, 4], "color": [1, 0.5, 0.5], "intensity": 20 }],
                "ambient": [0.1, 0.1, 0.1],
                "specular_exponent": 8,
                "render": { "mode": "coverage", "antialias": "ssaa", "samples_per_pixel": 8, "seed": 3 },
                "meshes": [{
                    "source": { "triangles": [{
                        "positions": [[0, 0, 0], [1, 0, 0], [0, 1, 0]],
                        "normals": [[0, 0, 1], [0, 0, 1], [0, 0, 1]],
                        "colors": [[1, 0, 0], [0, 1, 0], [0, 0, 1]]
                    }] },
                    "translation": [1, 2, 3],
                    "rotation": { "axis": [0, 0, 1], "angle_degrees": 90 },
                    "scale": [2, 2, 2],
                    "color": [0.2, 0.4, 0.6]
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(scene.lights.len(), 1);
        assert_eq!(scene.lights[0].color, Color::new(1.0, 0.5, 0.5));
        assert_eq!(scene.render.mode, RenderMode::Coverage);
        assert_eq!(scene.render.antialias, AntiAlias::Ssaa);
        assert_eq!(scene.render.samples_per_pixel, 8);
        assert_eq!(scene.render.seed, Some(3));

        let triangles = scene.load_meshes().unwrap();
        assert_eq!(triangles.len(), 1);
        assert_eq!(triangles[0].len(), 1);
        assert!(triangles[0][0].color.is_some());
        assert_eq!(scene.meshes[0].translation, Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn invalid_cameras_are_rejected() {
        let mut scene = minimal();
        scene.camera.far = 0.5;
        assert!(scene.validate().is_err());

        let mut scene = minimal();
        scene.camera.look_at = scene.camera.position;
        assert!(scene.validate().is_err());

        let mut scene = minimal();
        scene.camera.up = Vector3::new(0.0, 0.0, 3.0);
        assert!(scene.validate().is_err());

        let mut scene = minimal();
        scene.width = 0;
        assert!(scene.validate().is_err());

        let mut scene = minimal();
        scene.camera.height = 0.0;
        assert!(scene.validate().is_err());
    }

    #[test]
    fn zero_rotation_axis_is_rejected() {
        let mut scene = minimal();
        scene.meshes.push(MeshInstance {
            source: MeshSource::Triangles(Vec::new()),
            translation: Vector3::zeros(),
            rotation: AxisAngle { axis: Vector3::zeros(), angle_degrees: 10.0 },
            scale: default_scale(),
            color: WHITE,
        });
        assert!(scene.validate().is_err());
    }

    #[test]
    fn obj_meshes_load_relative_to_scene_file() {
        let dir = std::env::temp_dir().join(format!("tiny_rasterizer_scene_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let mut obj_file = File::create(dir.join("tri.obj")).unwrap();
        writeln!(obj_file, "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1").unwrap();

        let scene_json = MINIMAL.replacen(
            "\"camera\"",
            "\"meshes\": [{ \"source\": { \"obj\": \"tri.obj\" } }], \"camera\"",
            1,
        );
        fs::write(dir.join("scene.json"), scene_json).unwrap();

        let scene = Scene::load(&dir.join("scene.json")).unwrap();
        let triangles = scene.load_meshes().unwrap();
        assert_eq!(triangles[0].len(), 1);
        assert_eq!(triangles[0][0].points()[1], Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(triangles[0][0].normal[2], Vector3::new(0.0, 0.0, 1.0));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_scene_file_is_an_error() {
        assert!(Scene::load(Path::new("/nonexistent/scene.json")).is_err());
    }
}
