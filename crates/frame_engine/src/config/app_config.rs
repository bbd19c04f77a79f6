//! Viewer configuration
//!
//! Every section has defaults, so a file only needs the values it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::assets::HeightMapParams;
use crate::foundation::math::Vec3;
use crate::render::{PresentModePreference, RendererOptions, ShaderPaths, SwapchainOptions, DEFAULT_FENCE_TIMEOUT};
use crate::scene::TransformComponent;

use super::{Config, ConfigError};

/// Directories searched for compiled shaders, in order
pub const SHADER_SEARCH_DIRS: [&str; 4] = ["target/shaders", "shaders", "resources/shaders", "../target/shaders"];

/// Window creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Title bar text
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Frame Engine Viewer".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Compiled shader locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Directory holding the SPIR-V files; searched for when unset
    pub directory: Option<PathBuf>,
    /// Lit mesh vertex shader
    pub simple_vertex: String,
    /// Lit mesh fragment shader
    pub simple_fragment: String,
    /// Light billboard vertex shader
    pub point_light_vertex: String,
    /// Light billboard fragment shader
    pub point_light_fragment: String,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            directory: None,
            simple_vertex: "simple_shader.vert.spv".to_string(),
            simple_fragment: "simple_shader.frag.spv".to_string(),
            point_light_vertex: "point_light.vert.spv".to_string(),
            point_light_fragment: "point_light.frag.spv".to_string(),
        }
    }
}

impl ShaderConfig {
    /// Path of `file`, in the configured directory or the first search directory that
    /// has it
    pub fn resolve(&self, file: &str) -> PathBuf {
        if let Some(directory) = &self.directory {
            return directory.join(file);
        }
        SHADER_SEARCH_DIRS
            .iter()
            .map(|dir| Path::new(dir).join(file))
            .find(|path| path.exists())
            .unwrap_or_else(|| Path::new(SHADER_SEARCH_DIRS[0]).join(file))
    }

    /// Shaders of the mesh render system
    pub fn simple_shaders(&self) -> ShaderPaths {
        ShaderPaths::new(self.resolve(&self.simple_vertex), self.resolve(&self.simple_fragment))
    }

    /// Shaders of the light billboard system
    pub fn point_light_shaders(&self) -> ShaderPaths {
        ShaderPaths::new(
            self.resolve(&self.point_light_vertex),
            self.resolve(&self.point_light_fragment),
        )
    }
}

/// Renderer and device options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name reported to the driver
    pub application_name: String,
    /// Presentation mode preference
    pub present_mode: PresentModePreference,
    /// Swapchain image count; one more than the surface minimum when unset
    pub desired_image_count: Option<u32>,
    /// Clear color
    pub clear_color: [f32; 4],
    /// Clear depth
    pub clear_depth: f32,
    /// Bound on fence waits in milliseconds; unset waits forever
    pub fence_timeout_ms: Option<u64>,
    /// Enable the Khronos validation layer
    pub enable_validation: bool,
    /// Wait for the device to go idle at the end of every loop iteration
    pub wait_idle_each_frame: bool,
    /// Shader files
    pub shaders: ShaderConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        let defaults = RendererOptions::default();
        Self {
            application_name: "Frame Engine Viewer".to_string(),
            present_mode: PresentModePreference::default(),
            desired_image_count: None,
            clear_color: defaults.clear_color,
            clear_depth: defaults.clear_depth,
            fence_timeout_ms: Some(DEFAULT_FENCE_TIMEOUT.as_millis() as u64),
            enable_validation: cfg!(debug_assertions),
            wait_idle_each_frame: true,
            shaders: ShaderConfig::default(),
        }
    }
}

impl RendererConfig {
    /// Renderer options described by this section
    pub fn renderer_options(&self) -> RendererOptions {
        RendererOptions {
            swapchain: SwapchainOptions {
                present_mode: self.present_mode,
                desired_image_count: self.desired_image_count,
            },
            fence_timeout: self.fence_timeout_ms.map(Duration::from_millis),
            clear_color: self.clear_color,
            clear_depth: self.clear_depth,
        }
    }
}

/// Engine-wide behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `env_logger` filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: crate::foundation::logging::DEFAULT_FILTER.to_string(),
        }
    }
}

/// A model placed in the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// OBJ file
    pub path: PathBuf,
    /// Position
    pub translation: [f32; 3],
    /// Rotation in radians around X, Y and Z
    pub rotation: [f32; 3],
    /// Per-axis scale
    pub scale: [f32; 3],
    /// Object color
    pub color: [f32; 3],
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            translation: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
            color: [1.0; 3],
        }
    }
}

impl ModelConfig {
    /// Model at `path` with the given placement
    pub fn new(path: impl Into<PathBuf>, translation: [f32; 3], scale: [f32; 3]) -> Self {
        Self {
            path: path.into(),
            translation,
            scale,
            ..Self::default()
        }
    }

    /// Placement as a scene transform
    pub fn transform(&self) -> TransformComponent {
        TransformComponent {
            translation: Vec3::from(self.translation),
            scale: Vec3::from(self.scale),
            rotation: Vec3::from(self.rotation),
        }
    }
}

/// Height-map terrain placed in the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainConfig {
    /// Raw little-endian `f32` height file
    pub path: PathBuf,
    /// Grid spacing and height scale
    #[serde(default)]
    pub params: HeightMapParams,
    /// Position of the grid's first corner
    #[serde(default)]
    pub translation: [f32; 3],
}

/// What the viewer loads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Models, drawn in this order
    pub models: Vec<ModelConfig>,
    /// Optional terrain
    pub terrain: Option<TerrainConfig>,
    /// Point light position
    pub light_position: [f32; 3],
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            models: vec![
                ModelConfig::new("resources/models/cube.obj", [-0.5, 0.25, 0.0], [0.5, 0.5, 0.5]),
                ModelConfig::new("resources/models/cube.obj", [0.5, 0.25, 0.0], [0.5, 0.5, 0.5]),
                ModelConfig::new("resources/models/quad.obj", [0.0, 0.5, 0.0], [3.0, 1.0, 3.0]),
            ],
            terrain: None,
            light_position: [-1.0, -1.0, -1.0],
        }
    }
}

/// Complete viewer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Window
    pub window: WindowConfig,
    /// Renderer
    pub renderer: RendererConfig,
    /// Engine
    pub engine: EngineConfig,
    /// Scene
    pub scene: SceneConfig,
}

impl AppConfig {
    /// Reject values the renderer cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        if self.renderer.application_name.is_empty() {
            return Err(ConfigError::Invalid("application name cannot be empty".to_string()));
        }
        if self.renderer.desired_image_count == Some(0) {
            return Err(ConfigError::Invalid("desired image count must be at least 1".to_string()));
        }
        if self.renderer.fence_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid("fence timeout must be non-zero".to_string()));
        }
        if !(0.0..=1.0).contains(&self.renderer.clear_depth) {
            return Err(ConfigError::Invalid(format!(
                "clear depth {} is outside 0..=1",
                self.renderer.clear_depth
            )));
        }
        if let Some(terrain) = &self.scene.terrain {
            let params = terrain.params;
            if params.cell_size <= 0.0 || !params.cell_size.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "terrain cell size must be positive, got {}",
                    params.cell_size
                )));
            }
        }
        Ok(())
    }
}

impl Config for AppConfig {}
