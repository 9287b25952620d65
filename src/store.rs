//! Shared Parameter Store
//!
//! Two timestamped records (colors, simulation settings) written by the UI layer
//! and polled by every render surface. A record is always written whole together
//! with its timestamp, so a reader never sees a torn update. Readers compare the
//! stored timestamp against the last one they applied and reload everything when
//! it moved forward; writes between two polls are simply superseded.

use crate::clock::SharedClock;
use crate::config::{
    clamp_or, EffectType, Rgb, SimulationParams, DEFAULT_COLOR1, DEFAULT_COLOR2, DEFAULT_FPS,
    FPS_MAX, FPS_MIN, SPEED_MAX, SPEED_MIN, TURBULENCE_MAX, TURBULENCE_MIN, VISCOSITY_MAX,
    VISCOSITY_MIN,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store record is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// A record together with the wall-clock millis of its last write (0 = never written).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stamped<T> {
    pub values: T,
    pub last_update_ms: u64,
}

// ============================================================================
// Records
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorRecord {
    pub color1: Rgb,
    pub color2: Rgb,
}

impl Default for ColorRecord {
    fn default() -> Self {
        Self {
            color1: DEFAULT_COLOR1,
            color2: DEFAULT_COLOR2,
        }
    }
}

impl ColorRecord {
    pub fn apply_to(&self, params: &mut SimulationParams) {
        let sanitized = SimulationParams {
            color1: self.color1,
            color2: self.color2,
            ..*params
        }
        .sanitized(params);
        params.color1 = sanitized.color1;
        params.color2 = sanitized.color2;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsRecord {
    pub effect_type: EffectType,
    pub speed: f32,
    pub viscosity: f32,
    pub turbulence: f32,
    pub battery_save: bool,
    pub fps_limit: u32,
    pub touch_interaction: bool,
    pub gyroscope_enabled: bool,
}

impl Default for SettingsRecord {
    fn default() -> Self {
        Self::from_params(&SimulationParams::default())
    }
}

impl SettingsRecord {
    pub fn from_params(params: &SimulationParams) -> Self {
        Self {
            effect_type: params.effect_type,
            speed: params.speed,
            viscosity: params.viscosity,
            turbulence: params.turbulence,
            battery_save: params.battery_save,
            fps_limit: params.fps_limit,
            touch_interaction: params.touch_interaction,
            gyroscope_enabled: params.gyroscope_enabled,
        }
    }

    /// Values read back from storage are clamped again; garbage keeps the prior value.
    pub fn apply_to(&self, params: &mut SimulationParams) {
        params.effect_type = self.effect_type;
        params.speed = clamp_or(self.speed, params.speed, SPEED_MIN, SPEED_MAX);
        params.viscosity = clamp_or(self.viscosity, params.viscosity, VISCOSITY_MIN, VISCOSITY_MAX);
        params.turbulence = clamp_or(
            self.turbulence,
            params.turbulence,
            TURBULENCE_MIN,
            TURBULENCE_MAX,
        );
        params.battery_save = self.battery_save;
        params.fps_limit = if self.fps_limit == 0 {
            DEFAULT_FPS
        } else {
            self.fps_limit.clamp(FPS_MIN, FPS_MAX)
        };
        params.touch_interaction = self.touch_interaction;
        params.gyroscope_enabled = self.gyroscope_enabled;
    }
}

// ============================================================================
// Parameter Store
// ============================================================================

enum Backend {
    Memory(Mutex<Option<String>>),
    File(PathBuf),
}

impl Backend {
    fn load(&self) -> Result<Option<String>, StoreError> {
        match self {
            Backend::Memory(slot) => Ok(slot.lock().clone()),
            Backend::File(path) => match std::fs::read_to_string(path) {
                Ok(json) => Ok(Some(json)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            },
        }
    }

    fn save(&self, json: String) -> Result<(), StoreError> {
        match self {
            Backend::Memory(slot) => {
                *slot.lock() = Some(json);
                Ok(())
            }
            Backend::File(path) => {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)?;
                }
                // Write-then-rename so readers see either the old or the new record.
                let tmp = path.with_extension("json.tmp");
                std::fs::write(&tmp, json)?;
                std::fs::rename(&tmp, path)?;
                Ok(())
            }
        }
    }
}

/// One timestamped record persisted as a single JSON document.
pub struct ParameterStore<T> {
    name: &'static str,
    backend: Backend,
    clock: SharedClock,
    last_written_ms: Mutex<u64>,
    _record: PhantomData<fn() -> T>,
}

impl<T> ParameterStore<T>
where
    T: Serialize + DeserializeOwned + Default + Clone,
{
    pub fn in_memory(name: &'static str, clock: SharedClock) -> Self {
        Self::with_backend(name, Backend::Memory(Mutex::new(None)), clock)
    }

    pub fn open(name: &'static str, path: impl AsRef<Path>, clock: SharedClock) -> Self {
        Self::with_backend(name, Backend::File(path.as_ref().to_path_buf()), clock)
    }

    fn with_backend(name: &'static str, backend: Backend, clock: SharedClock) -> Self {
        Self {
            name,
            backend,
            clock,
            last_written_ms: Mutex::new(0),
            _record: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Persist all values plus a fresh timestamp. Timestamps are strictly
    /// increasing per store so two writes in the same millisecond stay distinguishable.
    pub fn write(&self, values: &T) -> Result<u64, StoreError> {
        let mut last = self.last_written_ms.lock();
        let previous = (*last).max(self.last_update_timestamp());
        let stamp = self.clock.now_millis().max(previous + 1);

        let record = Stamped {
            values: values.clone(),
            last_update_ms: stamp,
        };
        self.backend.save(serde_json::to_string(&record)?)?;
        *last = stamp;

        log::debug!("{}: wrote record at {}", self.name, stamp);
        Ok(stamp)
    }

    pub fn try_read(&self) -> Result<Option<Stamped<T>>, StoreError> {
        match self.backend.load()? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Current record, or defaults stamped 0 when nothing was written or storage failed.
    pub fn read_all(&self) -> Stamped<T> {
        match self.try_read() {
            Ok(Some(record)) => record,
            Ok(None) => Stamped {
                values: T::default(),
                last_update_ms: 0,
            },
            Err(e) => {
                log::warn!("{}: read failed, treating as no update: {}", self.name, e);
                Stamped {
                    values: T::default(),
                    last_update_ms: 0,
                }
            }
        }
    }

    pub fn last_update_timestamp(&self) -> u64 {
        self.read_all().last_update_ms
    }
}

/// The color and settings stores shared between the UI and every render surface.
#[derive(Clone)]
pub struct SharedStores {
    colors: Arc<ParameterStore<ColorRecord>>,
    settings: Arc<ParameterStore<SettingsRecord>>,
}

impl SharedStores {
    pub fn in_memory(clock: SharedClock) -> Self {
        Self {
            colors: Arc::new(ParameterStore::in_memory("colors", clock.clone())),
            settings: Arc::new(ParameterStore::in_memory("settings", clock)),
        }
    }

    /// File-backed stores under `dir`; survive process restarts.
    pub fn open(dir: impl AsRef<Path>, clock: SharedClock) -> Self {
        let dir = dir.as_ref();
        Self {
            colors: Arc::new(ParameterStore::open(
                "colors",
                dir.join("colors.json"),
                clock.clone(),
            )),
            settings: Arc::new(ParameterStore::open(
                "settings",
                dir.join("settings.json"),
                clock,
            )),
        }
    }

    pub fn colors(&self) -> &ParameterStore<ColorRecord> {
        &self.colors
    }

    pub fn settings(&self) -> &ParameterStore<SettingsRecord> {
        &self.settings
    }

    pub fn write_colors(&self, color1: Rgb, color2: Rgb) -> Result<u64, StoreError> {
        self.colors.write(&ColorRecord { color1, color2 })
    }

    pub fn read_colors(&self) -> (Rgb, Rgb, u64) {
        let record = self.colors.read_all();
        (
            record.values.color1,
            record.values.color2,
            record.last_update_ms,
        )
    }

    pub fn write_sim_params(&self, params: &SimulationParams) -> Result<u64, StoreError> {
        self.settings.write(&SettingsRecord::from_params(params))
    }

    pub fn read_sim_params(&self) -> (SettingsRecord, u64) {
        let record = self.settings.read_all();
        (record.values, record.last_update_ms)
    }

    /// Latest write across both records.
    pub fn last_update_timestamp(&self) -> u64 {
        self.colors
            .last_update_timestamp()
            .max(self.settings.last_update_timestamp())
    }

    /// Full parameter set as currently persisted, starting from `base` for anything unset.
    pub fn load_params(&self, base: SimulationParams) -> SimulationParams {
        let mut params = base;
        self.colors.read_all().values.apply_to(&mut params);
        self.settings.read_all().values.apply_to(&mut params);
        params
    }
}

// ============================================================================
// Poller
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollOutcome {
    pub polled: bool,
    pub colors_changed: bool,
    pub settings_changed: bool,
}

impl PollOutcome {
    pub fn changed(&self) -> bool {
        self.colors_changed || self.settings_changed
    }
}

/// Per-surface "last known timestamp" bookkeeping for the store.
#[derive(Debug, Clone)]
pub struct ParameterPoller {
    interval_ms: u64,
    last_poll_ms: Option<u64>,
    known_colors_ms: u64,
    known_settings_ms: u64,
}

impl ParameterPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            last_poll_ms: None,
            known_colors_ms: 0,
            known_settings_ms: 0,
        }
    }

    /// Make the next `poll_if_due` read the store regardless of the interval.
    pub fn force_next(&mut self) {
        self.last_poll_ms = None;
    }

    /// A clock that stepped backwards past the last poll counts as due.
    pub fn is_due(&self, now_ms: u64) -> bool {
        match self.last_poll_ms {
            None => true,
            Some(last) if now_ms < last => true,
            Some(last) => now_ms - last >= self.interval_ms,
        }
    }

    pub fn poll_if_due(
        &mut self,
        now_ms: u64,
        stores: &SharedStores,
        params: &mut SimulationParams,
    ) -> PollOutcome {
        if !self.is_due(now_ms) {
            return PollOutcome::default();
        }
        self.last_poll_ms = Some(now_ms);
        self.poll(stores, params)
    }

    /// Reload each record whose stored timestamp is newer than the last one applied.
    pub fn poll(&mut self, stores: &SharedStores, params: &mut SimulationParams) -> PollOutcome {
        let mut outcome = PollOutcome {
            polled: true,
            ..PollOutcome::default()
        };

        let colors = stores.colors().read_all();
        if colors.last_update_ms > self.known_colors_ms {
            log::debug!("colors updated at {}, reloading", colors.last_update_ms);
            colors.values.apply_to(params);
            self.known_colors_ms = colors.last_update_ms;
            outcome.colors_changed = true;
        }

        let settings = stores.settings().read_all();
        if settings.last_update_ms > self.known_settings_ms {
            log::debug!("settings updated at {}, reloading", settings.last_update_ms);
            settings.values.apply_to(params);
            self.known_settings_ms = settings.last_update_ms;
            outcome.settings_changed = true;
        }

        outcome
    }

    pub fn known_timestamps(&self) -> (u64, u64) {
        (self.known_colors_ms, self.known_settings_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};

    #[test]
    fn defaults_until_first_write() {
        let stores = SharedStores::in_memory(ManualClock::new(1_000).shared());
        let (c1, c2, ts) = stores.read_colors();
        assert_eq!((c1, c2, ts), (DEFAULT_COLOR1, DEFAULT_COLOR2, 0));

        let (settings, ts) = stores.read_sim_params();
        assert_eq!(ts, 0);
        assert_eq!(settings.speed, 1.0);
        assert_eq!(settings.viscosity, 1.0);
        assert_eq!(settings.turbulence, 0.5);
        assert_eq!(settings.fps_limit, 60);
        assert!(!settings.battery_save);
    }

    #[test]
    fn color_write_round_trips_with_newer_timestamp() {
        let clock = ManualClock::new(5_000);
        let stores = SharedStores::in_memory(clock.shared());
        let before = stores.last_update_timestamp();

        let c1 = [0.123_456_7, 0.5, 0.999];
        let c2 = [0.0, 1.0, 0.333_333_3];
        stores.write_colors(c1, c2).unwrap();

        let (r1, r2, ts) = stores.read_colors();
        assert_eq!(r1, c1);
        assert_eq!(r2, c2);
        assert!(ts >= before);
        assert_eq!(ts, 5_000);
    }

    #[test]
    fn same_millisecond_writes_stay_ordered() {
        let clock = ManualClock::new(42);
        let stores = SharedStores::in_memory(clock.shared());
        let first = stores.write_colors([1.0, 0.0, 0.0], [0.0, 0.0, 0.0]).unwrap();
        let second = stores.write_colors([0.0, 1.0, 0.0], [0.0, 0.0, 0.0]).unwrap();
        assert!(second > first);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(10_000);
        {
            let stores = SharedStores::open(dir.path(), clock.shared());
            let params = SimulationParams {
                speed: 2.5,
                effect_type: EffectType::Liquid,
                ..SimulationParams::default()
            };
            stores.write_sim_params(&params).unwrap();
        }

        let reopened = SharedStores::open(dir.path(), clock.shared());
        let (settings, ts) = reopened.read_sim_params();
        assert_eq!(settings.speed, 2.5);
        assert_eq!(settings.effect_type, EffectType::Liquid);
        assert_eq!(ts, 10_000);
    }

    #[test]
    fn corrupt_file_reads_as_no_update() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("colors.json"), "{ not json").unwrap();
        let stores = SharedStores::open(dir.path(), ManualClock::new(1).shared());

        let mut params = SimulationParams {
            color1: [1.0, 1.0, 1.0],
            ..SimulationParams::default()
        };
        let mut poller = ParameterPoller::new(Duration::from_millis(100));
        let outcome = poller.poll(&stores, &mut params);
        assert!(!outcome.colors_changed);
        assert_eq!(params.color1, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn poll_without_new_write_is_idempotent() {
        let clock = ManualClock::new(1_000);
        let stores = SharedStores::in_memory(clock.shared());
        stores.write_colors([0.3, 0.3, 0.3], [0.7, 0.7, 0.7]).unwrap();

        let mut params = SimulationParams::default();
        let mut poller = ParameterPoller::new(Duration::from_millis(100));
        assert!(poller.poll(&stores, &mut params).colors_changed);
        let snapshot = params;

        clock.advance(500);
        let outcome = poller.poll_if_due(clock.now_millis(), &stores, &mut params);
        assert!(outcome.polled);
        assert!(!outcome.changed());
        assert_eq!(params, snapshot);
    }

    #[test]
    fn poll_respects_interval() {
        let clock = ManualClock::new(0);
        let stores = SharedStores::in_memory(clock.shared());
        let mut params = SimulationParams::default();
        let mut poller = ParameterPoller::new(Duration::from_millis(200));

        assert!(poller.poll_if_due(1_000, &stores, &mut params).polled);
        assert!(!poller.poll_if_due(1_150, &stores, &mut params).polled);
        assert!(poller.poll_if_due(1_200, &stores, &mut params).polled);

        poller.force_next();
        assert!(poller.poll_if_due(1_201, &stores, &mut params).polled);
    }

    #[test]
    fn backward_clock_step_keeps_polling() {
        let clock = ManualClock::new(1_000_000);
        let stores = SharedStores::in_memory(clock.shared());
        let mut params = SimulationParams::default();
        let mut poller = ParameterPoller::new(Duration::from_millis(200));
        assert!(poller.poll_if_due(clock.now_millis(), &stores, &mut params).polled);

        clock.set(640_000);
        stores.write_colors([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]).unwrap();

        let outcome = poller.poll_if_due(clock.now_millis(), &stores, &mut params);
        assert!(outcome.colors_changed);
        assert_eq!(params.color1, [1.0, 0.0, 0.0]);

        // The interval is measured from the new clock position
        clock.advance(100);
        assert!(!poller.poll_if_due(clock.now_millis(), &stores, &mut params).polled);
        clock.advance(100);
        assert!(poller.poll_if_due(clock.now_millis(), &stores, &mut params).polled);
    }

    #[test]
    fn out_of_range_settings_are_clamped_on_read() {
        let stores = SharedStores::in_memory(ManualClock::new(7).shared());
        let wild = SimulationParams {
            speed: 50.0,
            viscosity: 0.0,
            turbulence: 4.0,
            fps_limit: 2,
            ..SimulationParams::default()
        };
        stores.write_sim_params(&wild).unwrap();

        let mut params = SimulationParams::default();
        ParameterPoller::new(Duration::ZERO).poll(&stores, &mut params);
        assert_eq!(params.speed, SPEED_MAX);
        assert_eq!(params.viscosity, VISCOSITY_MIN);
        assert_eq!(params.turbulence, TURBULENCE_MAX);
        assert_eq!(params.fps_limit, FPS_MIN);
    }
}
