//! Parameter Controller
//!
//! UI-side owner of the simulation parameters. Every change is clamped here,
//! written to the shared store (which the wallpaper engine polls) and forwarded
//! straight to the in-process preview. A failed store write is logged and the
//! in-memory value is kept. The preset library is saved to its file after every
//! change when one is configured.

use crate::config::{
    clamp_or, EffectType, Rgb, SimulationParams, FPS_MAX, FPS_MIN, SPEED_MAX, SPEED_MIN,
    TURBULENCE_MAX, TURBULENCE_MIN, VISCOSITY_MAX, VISCOSITY_MIN,
};
use crate::presets::{Preset, PresetLibrary};
use crate::simulation::SimulationHandle;
use crate::store::{SharedStores, StoreError};
use std::path::{Path, PathBuf};

pub struct ParameterController {
    stores: SharedStores,
    preview: Option<SimulationHandle>,
    params: SimulationParams,
    library: PresetLibrary,
    library_path: Option<PathBuf>,
}

impl ParameterController {
    /// Start from whatever the store holds (defaults if it was never written).
    pub fn new(stores: SharedStores) -> Self {
        let params = stores.load_params(SimulationParams::default());
        Self {
            stores,
            preview: None,
            params,
            library: PresetLibrary::with_builtins(),
            library_path: None,
        }
    }

    /// Keep the preset library in `path`, loading it if it already exists.
    pub fn with_preset_file(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            match PresetLibrary::load_from(&path) {
                Ok(library) => self.library = library,
                Err(e) => log::warn!("ignoring preset file {}: {}", path.display(), e),
            }
        }
        self.library_path = Some(path);
        self
    }

    pub fn attach_preview(&mut self, handle: SimulationHandle) {
        handle.set_params(self.params);
        self.preview = Some(handle);
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn stores(&self) -> &SharedStores {
        &self.stores
    }

    pub fn set_effect_type(&mut self, effect: EffectType) {
        self.params.effect_type = effect;
        self.commit_settings();
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.params.speed = clamp_or(speed, self.params.speed, SPEED_MIN, SPEED_MAX);
        self.commit_settings();
    }

    pub fn set_viscosity(&mut self, viscosity: f32) {
        self.params.viscosity =
            clamp_or(viscosity, self.params.viscosity, VISCOSITY_MIN, VISCOSITY_MAX);
        self.commit_settings();
    }

    pub fn set_turbulence(&mut self, turbulence: f32) {
        self.params.turbulence = clamp_or(
            turbulence,
            self.params.turbulence,
            TURBULENCE_MIN,
            TURBULENCE_MAX,
        );
        self.commit_settings();
    }

    pub fn set_battery_save_mode(&mut self, enabled: bool) {
        self.params.battery_save = enabled;
        self.commit_settings();
    }

    pub fn set_fps_limit(&mut self, fps: u32) {
        self.params.fps_limit = fps.clamp(FPS_MIN, FPS_MAX);
        self.commit_settings();
    }

    pub fn set_touch_interaction(&mut self, enabled: bool) {
        self.params.touch_interaction = enabled;
        self.commit_settings();
    }

    pub fn set_gyroscope_enabled(&mut self, enabled: bool) {
        self.params.gyroscope_enabled = enabled;
        self.commit_settings();
    }

    pub fn set_colors(&mut self, color1: Rgb, color2: Rgb) {
        let candidate = SimulationParams {
            color1,
            color2,
            ..self.params
        };
        self.params = candidate.sanitized(&self.params);
        self.forward();
        let (c1, c2) = (self.params.color1, self.params.color2);
        report(self.stores.write_colors(c1, c2));
    }

    // ========================================================================
    // Presets
    // ========================================================================

    pub fn library(&self) -> &PresetLibrary {
        &self.library
    }

    pub fn current_preset(&self, name: &str) -> Preset {
        Preset::from_params(name, &self.params)
    }

    pub fn save_preset(&mut self, name: &str) {
        self.library.save(self.current_preset(name));
        self.persist_library();
    }

    pub fn delete_preset(&mut self, name: &str) -> bool {
        let deleted = self.library.delete(name);
        if deleted {
            self.persist_library();
        }
        deleted
    }

    /// Apply a preset; both store records are rewritten.
    pub fn apply_preset(&mut self, preset: &Preset) {
        preset.apply_to(&mut self.params);
        self.forward();
        report(self.stores.write_sim_params(&self.params));
        report(
            self.stores
                .write_colors(self.params.color1, self.params.color2),
        );
        log::info!("applied preset '{}'", preset.name);
    }

    /// Import a shared preset into the library and apply it.
    pub fn import_preset(&mut self, json: &str) -> anyhow::Result<()> {
        let preset = Preset::from_json(json)?;
        self.apply_preset(&preset);
        self.library.save(preset);
        self.persist_library();
        Ok(())
    }

    pub fn reset_to_defaults(&mut self) {
        self.apply_preset(&Preset::default());
        let defaults = SimulationParams::default();
        self.params.battery_save = defaults.battery_save;
        self.params.fps_limit = defaults.fps_limit;
        self.params.touch_interaction = defaults.touch_interaction;
        self.params.gyroscope_enabled = defaults.gyroscope_enabled;
        self.commit_settings();
    }

    fn persist_library(&self) {
        let Some(path) = &self.library_path else {
            return;
        };
        if let Err(e) = self.library.save_to(path) {
            log::warn!("failed to save presets to {}: {}", path.display(), e);
        }
    }

    fn commit_settings(&mut self) {
        self.forward();
        report(self.stores.write_sim_params(&self.params));
    }

    fn forward(&self) {
        if let Some(preview) = &self.preview {
            preview.set_params(self.params);
        }
    }
}

fn report(result: Result<u64, StoreError>) {
    if let Err(e) = result {
        log::warn!("store write failed, keeping in-memory value: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::HostProfile;
    use crate::presets::PresetType;
    use crate::simulation::SimulationContext;

    fn controller() -> (ParameterController, ManualClock) {
        let clock = ManualClock::new(5_000);
        let stores = SharedStores::in_memory(clock.shared());
        (ParameterController::new(stores), clock)
    }

    #[test]
    fn setters_clamp_before_writing() {
        let (mut ctl, _) = controller();
        ctl.set_speed(9.0);
        ctl.set_viscosity(0.0);
        ctl.set_turbulence(f32::NAN);
        ctl.set_fps_limit(5);
        assert_eq!(ctl.params().speed, 5.0);
        assert_eq!(ctl.params().viscosity, 0.1);
        assert_eq!(ctl.params().turbulence, 0.5);
        assert_eq!(ctl.params().fps_limit, 15);

        let (stored, ts) = ctl.stores().read_sim_params();
        assert!(ts > 0);
        assert_eq!(stored.speed, 5.0);
        assert_eq!(stored.fps_limit, 15);
    }

    #[test]
    fn preview_sees_changes_immediately() {
        let (mut ctl, clock) = controller();
        let ctx = SimulationContext::seeded(
            HostProfile::preview(),
            SimulationParams::default(),
            clock.shared(),
            1,
        );
        ctl.attach_preview(ctx.handle());
        ctl.set_colors([1.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
        assert_eq!(ctx.handle().params().color1, [1.0, 0.0, 0.0]);
        assert_eq!(ctl.stores().read_colors().0, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn controller_resumes_from_store() {
        let (mut ctl, clock) = controller();
        ctl.set_effect_type(EffectType::Liquid);
        ctl.set_colors([0.0, 1.0, 0.0], [0.0, 0.0, 0.0]);
        clock.advance(10);
        let reopened = ParameterController::new(ctl.stores().clone());
        assert_eq!(reopened.params().effect_type, EffectType::Liquid);
        assert_eq!(reopened.params().color1, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn presets_round_trip_through_controller() {
        let (mut ctl, _) = controller();
        ctl.apply_preset(&Preset::from_type(PresetType::LavaLamp));
        assert_eq!(ctl.params().effect_type, EffectType::Liquid);
        assert_eq!(ctl.stores().read_colors().0, [0.9, 0.15, 0.1]);

        ctl.save_preset("Snapshot");
        let saved = ctl.library().get("Snapshot").cloned().unwrap();
        assert_eq!(saved.effect_type, EffectType::Liquid);
        assert!(ctl.delete_preset("Snapshot"));

        ctl.reset_to_defaults();
        assert_eq!(*ctl.params(), SimulationParams::default());

        let json = Preset::from_type(PresetType::Nebula).to_json().unwrap();
        ctl.import_preset(&json).unwrap();
        assert_eq!(ctl.params().speed, 2.5);
        assert!(ctl.import_preset("{").is_err());
    }

    #[test]
    fn saved_presets_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets").join("library.json");
        let (ctl, clock) = controller();
        let stores = ctl.stores().clone();

        let mut first = ParameterController::new(stores.clone()).with_preset_file(&path);
        first.set_speed(4.0);
        first.save_preset("Fast");
        assert!(first.delete_preset("Ocean"));
        assert!(first.delete_preset("Sunset"));
        first
            .import_preset(&Preset::from_type(PresetType::Sunset).to_json().unwrap())
            .unwrap();
        drop(first);

        clock.advance(10);
        let second = ParameterController::new(stores).with_preset_file(&path);
        assert_eq!(second.library().get("Fast").unwrap().speed, 4.0);
        assert!(second.library().get("Ocean").is_none());
        assert!(second.library().get("Sunset").is_some());
    }

    #[test]
    fn corrupt_preset_file_falls_back_to_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");
        std::fs::write(&path, "not json").unwrap();
        let (ctl, _) = controller();
        let ctl = ParameterController::new(ctl.stores().clone()).with_preset_file(&path);
        assert_eq!(ctl.library(), &PresetLibrary::with_builtins());
    }
}
