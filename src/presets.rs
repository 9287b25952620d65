//! Presets for Fluid Wallpaper
//! Named parameter snapshots, built-ins and the JSON share format

use crate::config::{EffectType, Rgb, SimulationParams, DEFAULT_COLOR1, DEFAULT_COLOR2};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Built-in presets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PresetType {
    /// Documented default parameters
    #[default]
    Default,
    Ocean,
    Sunset,
    LavaLamp,
    Nebula,
}

impl PresetType {
    pub fn all() -> Vec<PresetType> {
        vec![
            Self::Default,
            Self::Ocean,
            Self::Sunset,
            Self::LavaLamp,
            Self::Nebula,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::Ocean => "Ocean",
            Self::Sunset => "Sunset",
            Self::LavaLamp => "Lava Lamp",
            Self::Nebula => "Nebula",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Default => "Blue and violet particles drifting at normal speed",
            Self::Ocean => "Slow, thick flow in deep blues",
            Self::Sunset => "Warm orange and pink with a light swirl",
            Self::LavaLamp => "Two heavy liquid blobs in red and amber",
            Self::Nebula => "Fast, turbulent particles in cyan and magenta",
        }
    }
}

/// Share format keys are camelCase: name, effectType, speed, viscosity,
/// turbulence, color1, color2.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub name: String,
    pub effect_type: EffectType,
    pub speed: f32,
    pub viscosity: f32,
    pub turbulence: f32,
    pub color1: Rgb,
    pub color2: Rgb,
}

impl Default for Preset {
    fn default() -> Self {
        Self::from_type(PresetType::Default)
    }
}

impl Preset {
    pub fn from_type(preset_type: PresetType) -> Self {
        let name = preset_type.name().to_string();
        match preset_type {
            PresetType::Default => Self {
                name,
                effect_type: EffectType::ParticleFlow,
                speed: 1.0,
                viscosity: 1.0,
                turbulence: 0.5,
                color1: DEFAULT_COLOR1,
                color2: DEFAULT_COLOR2,
            },
            PresetType::Ocean => Self {
                name,
                effect_type: EffectType::ParticleFlow,
                speed: 0.6,
                viscosity: 2.2,
                turbulence: 0.3,
                color1: [0.0, 0.35, 0.8],
                color2: [0.1, 0.8, 0.9],
            },
            PresetType::Sunset => Self {
                name,
                effect_type: EffectType::ParticleFlow,
                speed: 1.2,
                viscosity: 0.8,
                turbulence: 0.4,
                color1: [1.0, 0.5, 0.1],
                color2: [0.95, 0.3, 0.6],
            },
            PresetType::LavaLamp => Self {
                name,
                effect_type: EffectType::Liquid,
                speed: 0.8,
                viscosity: 1.5,
                turbulence: 0.6,
                color1: [0.9, 0.15, 0.1],
                color2: [1.0, 0.7, 0.1],
            },
            PresetType::Nebula => Self {
                name,
                effect_type: EffectType::ParticleFlow,
                speed: 2.5,
                viscosity: 0.3,
                turbulence: 0.9,
                color1: [0.1, 0.9, 1.0],
                color2: [0.9, 0.1, 0.9],
            },
        }
    }

    /// Snapshot the visual parameters under `name`.
    pub fn from_params(name: impl Into<String>, params: &SimulationParams) -> Self {
        Self {
            name: name.into(),
            effect_type: params.effect_type,
            speed: params.speed,
            viscosity: params.viscosity,
            turbulence: params.turbulence,
            color1: params.color1,
            color2: params.color2,
        }
    }

    /// Overwrite the preset's fields in `params`, clamped to their ranges.
    pub fn apply_to(&self, params: &mut SimulationParams) {
        let fallback = *params;
        *params = SimulationParams {
            effect_type: self.effect_type,
            speed: self.speed,
            viscosity: self.viscosity,
            turbulence: self.turbulence,
            color1: self.color1,
            color2: self.color2,
            ..fallback
        }
        .sanitized(&fallback);
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let preset: Preset = serde_json::from_str(json)?;
        anyhow::ensure!(!preset.name.trim().is_empty(), "preset name is empty");
        Ok(preset)
    }
}

// ============================================================================
// Library
// ============================================================================

/// User-saved presets, persisted as a JSON array.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetLibrary {
    presets: Vec<Preset>,
}

impl PresetLibrary {
    pub fn with_builtins() -> Self {
        Self {
            presets: PresetType::all().into_iter().map(Preset::from_type).collect(),
        }
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn get(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name == name)
    }

    /// Insert, replacing any preset with the same name.
    pub fn save(&mut self, preset: Preset) {
        match self.presets.iter_mut().find(|p| p.name == preset.name) {
            Some(existing) => *existing = preset,
            None => self.presets.push(preset),
        }
    }

    pub fn delete(&mut self, name: &str) -> bool {
        let before = self.presets.len();
        self.presets.retain(|p| p.name != name);
        self.presets.len() != before
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_json_uses_camel_case_keys() {
        let json = Preset::from_type(PresetType::LavaLamp).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["name"], "Lava Lamp");
        assert_eq!(value["effectType"], 1);
        assert!(value["color1"].is_array());
        assert!(value.get("effect_type").is_none());
    }

    #[test]
    fn imports_shared_json() {
        let json = r#"{
            "name": "Mine",
            "effectType": 0,
            "speed": 1.5,
            "viscosity": 0.7,
            "turbulence": 0.25,
            "color1": [1.0, 0.0, 0.0],
            "color2": [0.0, 1.0, 0.0]
        }"#;
        let preset = Preset::from_json(json).unwrap();
        assert_eq!(preset.name, "Mine");
        assert_eq!(preset.effect_type, EffectType::ParticleFlow);
        assert_eq!(preset.color2, [0.0, 1.0, 0.0]);

        assert!(Preset::from_json("{\"name\": \"\"}").is_err());
        assert!(Preset::from_json("not json").is_err());
    }

    #[test]
    fn apply_clamps_and_keeps_other_settings() {
        let mut params = SimulationParams {
            battery_save: true,
            fps_limit: 90,
            ..SimulationParams::default()
        };
        let preset = Preset {
            speed: 50.0,
            turbulence: -1.0,
            ..Preset::from_type(PresetType::Ocean)
        };
        preset.apply_to(&mut params);
        assert_eq!(params.speed, 5.0);
        assert_eq!(params.turbulence, 0.0);
        assert_eq!(params.viscosity, 2.2);
        assert!(params.battery_save);
        assert_eq!(params.fps_limit, 90);
    }

    #[test]
    fn library_replaces_by_name_and_persists() {
        let mut library = PresetLibrary::with_builtins();
        assert_eq!(library.presets().len(), PresetType::all().len());

        let mine = Preset::from_params("Mine", &SimulationParams::default());
        library.save(mine.clone());
        library.save(Preset {
            speed: 3.0,
            ..mine
        });
        assert_eq!(library.get("Mine").map(|p| p.speed), Some(3.0));
        assert!(library.delete("Ocean"));
        assert!(!library.delete("Ocean"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.json");
        library.save_to(&path).unwrap();
        assert_eq!(PresetLibrary::load_from(&path).unwrap(), library);
    }
}
