//! Configuration System for Fluid Wallpaper
//! Simulation parameters, force tuning and per-host profiles

use egui::Color32;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// RGB color with channels in 0.0..=1.0
pub type Rgb = [f32; 3];

pub const DEFAULT_COLOR1: Rgb = [0.2, 0.6, 1.0];
pub const DEFAULT_COLOR2: Rgb = [0.8, 0.2, 0.9];

pub const SPEED_MIN: f32 = 0.1;
pub const SPEED_MAX: f32 = 5.0;
pub const VISCOSITY_MIN: f32 = 0.1;
pub const VISCOSITY_MAX: f32 = 3.0;
pub const TURBULENCE_MIN: f32 = 0.0;
pub const TURBULENCE_MAX: f32 = 1.0;

pub const FPS_MIN: u32 = 15;
pub const FPS_MAX: u32 = 120;
pub const DEFAULT_FPS: u32 = 60;
pub const BATTERY_SAVE_FPS: u32 = 30;

// ============================================================================
// Enums
// ============================================================================

/// Active effect mode. Persisted as its numeric id (0 = particle flow, 1 = liquid).
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(from = "u32", into = "u32")]
pub enum EffectType {
    #[default]
    ParticleFlow,
    Liquid,
}

impl EffectType {
    pub fn all() -> [EffectType; 2] {
        [EffectType::ParticleFlow, EffectType::Liquid]
    }

    pub fn id(self) -> u32 {
        match self {
            EffectType::ParticleFlow => 0,
            EffectType::Liquid => 1,
        }
    }

    /// Unknown ids fall back to particle flow.
    pub fn from_id(id: u32) -> Self {
        match id {
            1 => EffectType::Liquid,
            _ => EffectType::ParticleFlow,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EffectType::ParticleFlow => "Particle Flow",
            EffectType::Liquid => "Liquid",
        }
    }
}

impl From<u32> for EffectType {
    fn from(id: u32) -> Self {
        EffectType::from_id(id)
    }
}

impl From<EffectType> for u32 {
    fn from(effect: EffectType) -> Self {
        effect.id()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub enum HostKind {
    /// In-app preview surface; receives setter calls in-process.
    Preview,
    /// Wallpaper service engine; only learns about changes by polling the store.
    WallpaperEngine,
}

// ============================================================================
// Colors
// ============================================================================

pub fn rgb_to_color32(rgb: Rgb) -> Color32 {
    Color32::from_rgb(channel_u8(rgb[0]), channel_u8(rgb[1]), channel_u8(rgb[2]))
}

fn channel_u8(c: f32) -> u8 {
    // NaN saturates to 0 on the cast
    (c.clamp(0.0, 1.0) * 255.0) as u8
}

fn sanitize_rgb(rgb: Rgb, fallback: Rgb) -> Rgb {
    let mut out = fallback;
    for (i, c) in rgb.iter().enumerate() {
        if c.is_finite() {
            out[i] = c.clamp(0.0, 1.0);
        }
    }
    out
}

/// Clamp `value` into `min..=max`, keeping `fallback` when the value is not a number.
pub fn clamp_or(value: f32, fallback: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

// ============================================================================
// Simulation Parameters
// ============================================================================

/// User-tunable parameters. Owned by the UI layer; render surfaces hold a mirror.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct SimulationParams {
    pub effect_type: EffectType,
    pub speed: f32,
    pub viscosity: f32,
    pub turbulence: f32,
    pub color1: Rgb,
    pub color2: Rgb,
    pub battery_save: bool,
    pub fps_limit: u32,
    pub touch_interaction: bool,
    pub gyroscope_enabled: bool,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            effect_type: EffectType::ParticleFlow,
            speed: 1.0,
            viscosity: 1.0,
            turbulence: 0.5,
            color1: DEFAULT_COLOR1,
            color2: DEFAULT_COLOR2,
            battery_save: false,
            fps_limit: DEFAULT_FPS,
            touch_interaction: true,
            gyroscope_enabled: false,
        }
    }
}

impl SimulationParams {
    /// Copy with every numeric field forced into its documented range.
    /// Non-numeric values keep the corresponding field of `fallback`.
    pub fn sanitized(self, fallback: &SimulationParams) -> Self {
        Self {
            speed: clamp_or(self.speed, fallback.speed, SPEED_MIN, SPEED_MAX),
            viscosity: clamp_or(self.viscosity, fallback.viscosity, VISCOSITY_MIN, VISCOSITY_MAX),
            turbulence: clamp_or(
                self.turbulence,
                fallback.turbulence,
                TURBULENCE_MIN,
                TURBULENCE_MAX,
            ),
            color1: sanitize_rgb(self.color1, fallback.color1),
            color2: sanitize_rgb(self.color2, fallback.color2),
            fps_limit: self.fps_limit.clamp(FPS_MIN, FPS_MAX),
            ..self
        }
    }

    pub fn target_fps(&self) -> u32 {
        if self.battery_save {
            BATTERY_SAVE_FPS
        } else {
            self.fps_limit.clamp(FPS_MIN, FPS_MAX)
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.target_fps() as u64)
    }

    pub fn palette(&self) -> [Color32; 2] {
        [rgb_to_color32(self.color1), rgb_to_color32(self.color2)]
    }
}

// ============================================================================
// Force Tuning
// ============================================================================

/// Particle-flow force constants. Empirically tuned; adjust freely.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct FlowTuning {
    /// Speed free particles are renormalized to (normalized units/tick)
    pub target_speed: f32,
    pub speed_epsilon: f32,
    /// Radial pull toward the touch point per tick
    pub attraction: f32,
    /// Tangential push around the touch point per tick
    pub orbital: f32,
    pub max_speed: f32,
    pub min_touch_distance: f32,
    pub turbulence_scale: f32,
    pub viscosity_scale: f32,
    pub tilt_scale: f32,
    pub min_size: f32,
    pub max_size: f32,
}

impl Default for FlowTuning {
    fn default() -> Self {
        Self {
            target_speed: 0.04,
            speed_epsilon: 0.001,
            attraction: 0.02,
            orbital: 0.015,
            max_speed: 0.05,
            min_touch_distance: 0.001,
            turbulence_scale: 0.01,
            viscosity_scale: 0.01,
            tilt_scale: 0.001,
            min_size: 15.0,
            max_size: 35.0,
        }
    }
}

/// Decorative touch burst constants.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct TouchTuning {
    pub cap: usize,
    pub decay: f32,

    pub press_count: usize,
    pub press_speed: f32,
    pub press_speed_jitter: f32,
    pub press_size: (f32, f32),

    pub drag_probability: f32,
    pub drag_life: f32,
    pub drag_size: (f32, f32),

    pub release_count: usize,
    pub release_speed: f32,
    pub release_speed_jitter: f32,
    pub release_life: f32,
    pub release_size: (f32, f32),

    pub explosion_count: usize,
    pub explosion_spread: f32,
    pub explosion_size: (f32, f32),
}

impl Default for TouchTuning {
    fn default() -> Self {
        Self {
            cap: 30,
            decay: 0.02,
            press_count: 8,
            press_speed: 0.02,
            press_speed_jitter: 0.01,
            press_size: (5.0, 15.0),
            drag_probability: 0.3,
            drag_life: 0.5,
            drag_size: (3.0, 11.0),
            release_count: 4,
            release_speed: 0.015,
            release_speed_jitter: 0.005,
            release_life: 0.8,
            release_size: (8.0, 20.0),
            explosion_count: 5,
            explosion_spread: 0.1,
            explosion_size: (20.0, 50.0),
        }
    }
}

impl TouchTuning {
    /// Lighter bursts for the always-on wallpaper engine.
    pub fn wallpaper() -> Self {
        Self {
            cap: 25,
            decay: 0.015,
            press_count: 6,
            press_size: (4.0, 12.0),
            drag_probability: 0.2,
            drag_life: 0.3,
            drag_size: (2.0, 8.0),
            release_count: 3,
            release_life: 0.6,
            release_size: (6.0, 16.0),
            ..Self::default()
        }
    }
}

/// Liquid blob constants.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct BlobTuning {
    /// Blob radius in pixels
    pub radius: f32,
    pub start: [[f32; 2]; 2],
    pub touch_pull: f32,
    pub turbulence_scale: f32,
    pub viscosity_drag: f32,
    pub drag_min: f32,
    pub drag_max: f32,
    pub edge_margin: f32,
    pub pair_strength: f32,
    pub pair_max: f32,
    pub min_distance: f32,
    /// Bridge is drawn while pixel distance < combined radii * bridge_factor
    pub bridge_factor: f32,
    pub glow_scale: f32,
    pub glow_alpha: f32,
    pub bridge_width: f32,
    pub bridge_pulse_rate: f32,
    pub bridge_pulse_depth: f32,
}

impl Default for BlobTuning {
    fn default() -> Self {
        Self {
            radius: 140.0,
            start: [[0.35, 0.5], [0.65, 0.5]],
            touch_pull: 0.0008,
            turbulence_scale: 0.004,
            viscosity_drag: 0.02,
            drag_min: 0.90,
            drag_max: 0.995,
            edge_margin: 0.08,
            pair_strength: 0.00002,
            pair_max: 0.0004,
            min_distance: 0.01,
            bridge_factor: 1.1,
            glow_scale: 1.6,
            glow_alpha: 0.25,
            bridge_width: 0.6,
            bridge_pulse_rate: 3.0,
            bridge_pulse_depth: 0.25,
        }
    }
}

// ============================================================================
// Host Profiles
// ============================================================================

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct HostProfile {
    pub kind: HostKind,
    pub pool_size: usize,
    pub poll_interval_ms: u64,
    /// Upper bound on waiting for the canvas before a tick is skipped
    pub canvas_timeout_ms: u64,
    pub flow: FlowTuning,
    pub touch: TouchTuning,
    pub blobs: BlobTuning,
}

impl HostProfile {
    pub fn preview() -> Self {
        Self {
            kind: HostKind::Preview,
            pool_size: 30,
            poll_interval_ms: 100,
            canvas_timeout_ms: 8,
            flow: FlowTuning::default(),
            touch: TouchTuning::default(),
            blobs: BlobTuning::default(),
        }
    }

    pub fn wallpaper_engine() -> Self {
        Self {
            kind: HostKind::WallpaperEngine,
            pool_size: 40,
            poll_interval_ms: 200,
            canvas_timeout_ms: 8,
            flow: FlowTuning::default(),
            touch: TouchTuning::wallpaper(),
            blobs: BlobTuning::default(),
        }
    }

    pub fn for_kind(kind: HostKind) -> Self {
        match kind {
            HostKind::Preview => Self::preview(),
            HostKind::WallpaperEngine => Self::wallpaper_engine(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ============================================================================
// Main App Configuration
// ============================================================================

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct AppConfig {
    /// Directory holding the shared parameter store files
    pub store_dir: PathBuf,
    #[serde(default = "HostProfile::preview")]
    pub preview: HostProfile,
    #[serde(default = "HostProfile::wallpaper_engine")]
    pub wallpaper: HostProfile,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("fluid_wallpaper_store"),
            preview: HostProfile::preview(),
            wallpaper: HostProfile::wallpaper_engine(),
        }
    }
}

impl AppConfig {
    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &str) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_type_serializes_as_id() {
        let json = serde_json::to_string(&EffectType::Liquid).unwrap();
        assert_eq!(json, "1");
        let back: EffectType = serde_json::from_str("0").unwrap();
        assert_eq!(back, EffectType::ParticleFlow);
        let unknown: EffectType = serde_json::from_str("7").unwrap();
        assert_eq!(unknown, EffectType::ParticleFlow);
    }

    #[test]
    fn sanitized_clamps_and_rejects_nan() {
        let fallback = SimulationParams::default();
        let wild = SimulationParams {
            speed: 99.0,
            viscosity: f32::NAN,
            turbulence: -3.0,
            color1: [2.0, f32::INFINITY, -1.0],
            fps_limit: 1000,
            ..SimulationParams::default()
        };
        let clean = wild.sanitized(&fallback);
        assert_eq!(clean.speed, SPEED_MAX);
        assert_eq!(clean.viscosity, fallback.viscosity);
        assert_eq!(clean.turbulence, 0.0);
        assert_eq!(clean.color1, [1.0, fallback.color1[1], 0.0]);
        assert_eq!(clean.fps_limit, FPS_MAX);
    }

    #[test]
    fn battery_save_halves_frame_rate() {
        let mut params = SimulationParams::default();
        assert_eq!(params.frame_interval(), Duration::from_millis(16));
        params.battery_save = true;
        assert_eq!(params.target_fps(), BATTERY_SAVE_FPS);
        assert_eq!(params.frame_interval(), Duration::from_millis(33));
    }

    #[test]
    fn app_config_round_trips_through_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let path = path.to_string_lossy().to_string();

        let mut config = AppConfig::default();
        config.wallpaper.pool_size = 64;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.wallpaper.pool_size, 64);
        assert_eq!(loaded.preview, HostProfile::preview());
    }
}
