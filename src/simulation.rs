//! Per-surface simulation stack
//!
//! `SimulationContext` owns everything one surface animates: the main particle
//! pool, the touch-effect bursts, the lazily created blob pair and the store
//! poller. It is moved onto the render thread and only ever mutated there.
//!
//! `SimulationHandle` is the cheap, cloneable input side used by UI and input
//! threads. Parameter setters and touch state are last-value-wins snapshots read
//! at the start of a tick; anything that would append particles travels through
//! a bounded intake queue that the render thread drains before updating.

use crate::blobs::LiquidBlobs;
use crate::canvas::FrameCanvas;
use crate::clock::SharedClock;
use crate::config::{EffectType, HostProfile, Rgb, SimulationParams};
use crate::particles::ParticleField;
use crate::store::{ParameterPoller, PollOutcome, SharedStores};
use crate::touch::{clamp_unit, TouchEffects, TouchState};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use egui::Color32;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// Queued input that creates particles or touches the pool.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Emission {
    Press { x: f32, y: f32 },
    Drag { x: f32, y: f32 },
    Release { x: f32, y: f32 },
    Explosion { x: f32, y: f32 },
    Tilt { x: f32, y: f32 },
}

pub const INTAKE_CAPACITY: usize = 256;

/// Simulated seconds per tick for time-based animation.
pub const TICK_SECONDS: f32 = 0.016;

struct SharedInput {
    params: Mutex<SimulationParams>,
    touch: Mutex<TouchState>,
}

// ============================================================================
// Handle
// ============================================================================

/// Input boundary of one surface's simulation.
#[derive(Clone)]
pub struct SimulationHandle {
    shared: Arc<SharedInput>,
    intake: Sender<Emission>,
}

impl SimulationHandle {
    pub fn params(&self) -> SimulationParams {
        *self.shared.params.lock()
    }

    pub fn touch_state(&self) -> TouchState {
        *self.shared.touch.lock()
    }

    /// Replace the whole local mirror at once.
    pub fn set_params(&self, params: SimulationParams) {
        *self.shared.params.lock() = params;
    }

    fn update_params(&self, f: impl FnOnce(&mut SimulationParams)) {
        f(&mut *self.shared.params.lock());
    }

    pub fn set_effect_type(&self, effect: EffectType) {
        self.update_params(|p| p.effect_type = effect);
    }

    pub fn set_speed(&self, speed: f32) {
        self.update_params(|p| p.speed = speed);
    }

    pub fn set_viscosity(&self, viscosity: f32) {
        self.update_params(|p| p.viscosity = viscosity);
    }

    pub fn set_turbulence(&self, turbulence: f32) {
        self.update_params(|p| p.turbulence = turbulence);
    }

    pub fn set_colors(&self, color1: Rgb, color2: Rgb) {
        self.update_params(|p| {
            p.color1 = color1;
            p.color2 = color2;
        });
    }

    pub fn set_battery_save_mode(&self, enabled: bool) {
        self.update_params(|p| p.battery_save = enabled);
    }

    pub fn set_fps_limit(&self, fps: u32) {
        self.update_params(|p| p.fps_limit = fps);
    }

    pub fn set_touch_interaction(&self, enabled: bool) {
        self.update_params(|p| p.touch_interaction = enabled);
    }

    pub fn set_gyroscope_enabled(&self, enabled: bool) {
        self.update_params(|p| p.gyroscope_enabled = enabled);
    }

    /// Programmatic touch: scatter a burst at `(x, y)` without holding a touch.
    pub fn set_touch_position(&self, x: f32, y: f32) {
        self.emit(Emission::Explosion {
            x: clamp_unit(x),
            y: clamp_unit(y),
        });
    }

    pub fn on_touch_down(&self, x: f32, y: f32) {
        let (x, y) = (clamp_unit(x), clamp_unit(y));
        *self.shared.touch.lock() = TouchState {
            is_touching: true,
            x,
            y,
        };
        self.emit(Emission::Press { x, y });
    }

    pub fn on_touch_move(&self, x: f32, y: f32) {
        let (x, y) = (clamp_unit(x), clamp_unit(y));
        *self.shared.touch.lock() = TouchState {
            is_touching: true,
            x,
            y,
        };
        self.emit(Emission::Drag { x, y });
    }

    /// Release at `(x, y)`; a non-finite point falls back to where the touch was last seen.
    pub fn on_touch_up(&self, x: f32, y: f32) {
        let (x, y) = {
            let mut touch = self.shared.touch.lock();
            if x.is_finite() && y.is_finite() {
                touch.x = clamp_unit(x);
                touch.y = clamp_unit(y);
            }
            touch.is_touching = false;
            (touch.x, touch.y)
        };
        self.emit(Emission::Release { x, y });
    }

    /// Device tilt sample; ignored unless the gyroscope setting is on.
    pub fn set_gyroscope_data(&self, x: f32, y: f32, _z: f32) {
        if !self.shared.params.lock().gyroscope_enabled {
            return;
        }
        self.emit(Emission::Tilt { x, y });
    }

    fn emit(&self, emission: Emission) {
        match self.intake.try_send(emission) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                log::debug!("intake queue full, dropping {:?}", dropped);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("simulation gone, ignoring input");
            }
        }
    }
}

// ============================================================================
// Context
// ============================================================================

/// Everything one surface simulates. Never shared between surfaces.
pub struct SimulationContext {
    profile: HostProfile,
    shared: Arc<SharedInput>,
    intake_tx: Sender<Emission>,
    intake: Receiver<Emission>,

    field: ParticleField,
    effects: TouchEffects,
    blobs: Option<LiquidBlobs>,

    stores: Option<SharedStores>,
    poller: ParameterPoller,
    clock: SharedClock,

    rng: StdRng,
    params: SimulationParams,
    touch: TouchState,
    palette: [Color32; 2],
    time: f32,
    ticks: u64,
}

impl SimulationContext {
    pub fn new(profile: HostProfile, params: SimulationParams, clock: SharedClock) -> Self {
        Self::with_rng(profile, params, clock, StdRng::from_entropy())
    }

    /// Deterministic context for tests and reproducible runs.
    pub fn seeded(
        profile: HostProfile,
        params: SimulationParams,
        clock: SharedClock,
        seed: u64,
    ) -> Self {
        Self::with_rng(profile, params, clock, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        profile: HostProfile,
        params: SimulationParams,
        clock: SharedClock,
        mut rng: StdRng,
    ) -> Self {
        let (intake_tx, intake) = bounded(INTAKE_CAPACITY);
        let palette = params.palette();
        let field = ParticleField::new(profile.pool_size, profile.flow, &palette, &mut rng);

        Self {
            profile,
            shared: Arc::new(SharedInput {
                params: Mutex::new(params),
                touch: Mutex::new(TouchState::default()),
            }),
            intake_tx,
            intake,
            field,
            effects: TouchEffects::new(profile.touch),
            blobs: None,
            stores: None,
            poller: ParameterPoller::new(profile.poll_interval()),
            clock,
            rng,
            params,
            touch: TouchState::default(),
            palette,
            time: 0.0,
            ticks: 0,
        }
    }

    /// Attach the shared store and adopt whatever it currently holds.
    pub fn with_stores(mut self, stores: SharedStores) -> Self {
        {
            let mut params = self.shared.params.lock();
            self.poller.poll(&stores, &mut *params);
            self.params = *params;
        }
        self.stores = Some(stores);
        self.sync_palette();
        self
    }

    pub fn handle(&self) -> SimulationHandle {
        SimulationHandle {
            shared: Arc::clone(&self.shared),
            intake: self.intake_tx.clone(),
        }
    }

    pub fn profile(&self) -> &HostProfile {
        &self.profile
    }

    /// Parameters as of the last tick.
    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn field(&self) -> &ParticleField {
        &self.field
    }

    pub fn effects(&self) -> &TouchEffects {
        &self.effects
    }

    pub fn blobs(&self) -> Option<&LiquidBlobs> {
        self.blobs.as_ref()
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Read the store on the next poll regardless of the interval.
    pub fn force_poll(&mut self) {
        self.poller.force_next();
    }

    /// Reload from the store when the host's poll interval has elapsed.
    pub fn poll_store(&mut self) -> PollOutcome {
        let Some(stores) = &self.stores else {
            return PollOutcome::default();
        };
        let now = self.clock.now_millis();
        let outcome = self
            .poller
            .poll_if_due(now, stores, &mut *self.shared.params.lock());
        if outcome.changed() {
            log::info!(
                "{:?}: parameters updated in store, reloading",
                self.profile.kind
            );
        }
        outcome
    }

    /// Advance the active effect by one tick.
    pub fn step(&mut self) {
        self.params = *self.shared.params.lock();
        self.touch = *self.shared.touch.lock();
        self.sync_palette();
        self.drain_intake();

        match self.params.effect_type {
            EffectType::ParticleFlow => {
                self.field.update(
                    self.touch.flow_mode(),
                    &self.params,
                    &self.palette,
                    &mut self.rng,
                );
            }
            EffectType::Liquid => {
                let tuning = self.profile.blobs;
                let blobs = self.blobs.get_or_insert_with(|| {
                    log::debug!("creating liquid blobs");
                    LiquidBlobs::new(tuning)
                });
                blobs.update(self.touch.point(), &self.params, &mut self.rng);
            }
        }
        self.effects.update();

        self.time += TICK_SECONDS;
        self.ticks += 1;
    }

    /// Poll then step, without drawing.
    pub fn tick(&mut self) {
        self.poll_store();
        self.step();
    }

    pub fn draw(&self, canvas: &mut FrameCanvas) {
        match self.params.effect_type {
            EffectType::ParticleFlow => self.field.render(canvas),
            EffectType::Liquid => {
                if let Some(blobs) = &self.blobs {
                    blobs.render(canvas, &self.palette, self.time);
                }
            }
        }
        self.effects.render(canvas);
    }

    fn sync_palette(&mut self) {
        let palette = self.params.palette();
        if palette != self.palette {
            self.palette = palette;
            self.field.recolor(&palette, &mut self.rng);
        }
    }

    fn drain_intake(&mut self) {
        for emission in self.intake.try_iter() {
            match emission {
                Emission::Press { x, y } => self.effects.emit_press(x, y, &mut self.rng),
                Emission::Drag { x, y } => self.effects.emit_drag(x, y, &mut self.rng),
                Emission::Release { x, y } => self.effects.emit_release(x, y, &mut self.rng),
                Emission::Explosion { x, y } => {
                    self.effects.emit_explosion(x, y, &self.palette, &mut self.rng)
                }
                Emission::Tilt { x, y } => self.field.apply_tilt(x, y),
            }
        }
    }
}
