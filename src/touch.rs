//! Touch input state and decorative touch-effect bursts

use crate::canvas::FrameCanvas;
use crate::config::TouchTuning;
use crate::particles::{wrap_unit, FlowMode, Particle};
use egui::Color32;
use rand::Rng;
use std::collections::VecDeque;
use std::f32::consts::TAU;

/// Half-transparent white left along a drag path.
pub fn drag_color() -> Color32 {
    Color32::from_rgba_unmultiplied(255, 255, 255, 128)
}

pub const RELEASE_COLOR: Color32 = Color32::from_rgb(0, 255, 255);

const GLOW_ALPHA: f32 = 80.0 / 255.0;

/// Latest gesture snapshot; normalized coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TouchState {
    pub is_touching: bool,
    pub x: f32,
    pub y: f32,
}

impl TouchState {
    pub fn flow_mode(&self) -> FlowMode {
        if self.is_touching {
            FlowMode::Attracted {
                x: self.x,
                y: self.y,
            }
        } else {
            FlowMode::Free
        }
    }

    /// Touch point while a touch is held.
    pub fn point(&self) -> Option<(f32, f32)> {
        self.is_touching.then_some((self.x, self.y))
    }
}

/// Clamp a normalized coordinate into the unit square; NaN maps to the center.
pub fn clamp_unit(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

// ============================================================================
// Touch Effects
// ============================================================================

/// One gesture's ring of outward-moving particles.
#[derive(Clone, Copy, Debug)]
struct RingBurst {
    count: usize,
    speed: f32,
    jitter: f32,
    color: Color32,
    size: (f32, f32),
    life: f32,
}

/// Bounded FIFO of short-lived burst particles.
pub struct TouchEffects {
    effects: VecDeque<Particle>,
    tuning: TouchTuning,
    emitted: u64,
}

impl TouchEffects {
    pub fn new(tuning: TouchTuning) -> Self {
        Self {
            effects: VecDeque::with_capacity(tuning.cap + 1),
            tuning,
            emitted: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.tuning.cap
    }

    /// Total particles ever emitted, including evicted ones.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.effects.iter()
    }

    fn push(&mut self, particle: Particle) {
        self.emitted += 1;
        self.effects.push_back(particle);
        while self.effects.len() > self.tuning.cap {
            self.effects.pop_front();
        }
    }

    /// Evenly spaced ring of particles around `(x, y)`.
    fn emit_ring<R: Rng + ?Sized>(&mut self, x: f32, y: f32, ring: RingBurst, rng: &mut R) {
        if ring.count == 0 {
            return;
        }
        let step = TAU / ring.count as f32;
        for i in 0..ring.count {
            let angle = i as f32 * step;
            let s = ring.speed + rng.gen::<f32>() * ring.jitter;
            self.push(Particle {
                x,
                y,
                vx: angle.cos() * s,
                vy: angle.sin() * s,
                color: ring.color,
                size: random_size(ring.size, rng),
                life: ring.life,
            });
        }
    }

    pub fn emit_press<R: Rng + ?Sized>(&mut self, x: f32, y: f32, rng: &mut R) {
        let t = self.tuning;
        let ring = RingBurst {
            count: t.press_count,
            speed: t.press_speed,
            jitter: t.press_speed_jitter,
            color: Color32::WHITE,
            size: t.press_size,
            life: 1.0,
        };
        self.emit_ring(x, y, ring, rng);
    }

    /// Occasionally leaves a stationary translucent dot on the drag path.
    pub fn emit_drag<R: Rng + ?Sized>(&mut self, x: f32, y: f32, rng: &mut R) {
        let t = self.tuning;
        if rng.gen::<f32>() >= t.drag_probability {
            return;
        }
        self.push(Particle {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            color: drag_color(),
            size: random_size(t.drag_size, rng),
            life: t.drag_life,
        });
    }

    pub fn emit_release<R: Rng + ?Sized>(&mut self, x: f32, y: f32, rng: &mut R) {
        let t = self.tuning;
        let ring = RingBurst {
            count: t.release_count,
            speed: t.release_speed,
            jitter: t.release_speed_jitter,
            color: RELEASE_COLOR,
            size: t.release_size,
            life: t.release_life,
        };
        self.emit_ring(x, y, ring, rng);
    }

    /// Scattered burst in palette colors, used for programmatic touches.
    pub fn emit_explosion<R: Rng + ?Sized>(
        &mut self,
        x: f32,
        y: f32,
        palette: &[Color32; 2],
        rng: &mut R,
    ) {
        let t = self.tuning;
        for _ in 0..t.explosion_count {
            let color = if rng.gen_bool(0.5) {
                palette[0]
            } else {
                palette[1]
            };
            self.push(Particle {
                x,
                y,
                vx: (rng.gen::<f32>() - 0.5) * t.explosion_spread,
                vy: (rng.gen::<f32>() - 0.5) * t.explosion_spread,
                color,
                size: random_size(t.explosion_size, rng),
                life: 1.0,
            });
        }
    }

    /// Age, move and cull. Dead entries are dropped before moving.
    pub fn update(&mut self) {
        let decay = self.tuning.decay;
        self.effects.retain(|p| p.life > 0.0);
        for p in &mut self.effects {
            p.x = wrap_unit(p.x + p.vx);
            p.y = wrap_unit(p.y + p.vy);
            p.life = (p.life - decay).max(0.0);
        }
        while self.effects.len() > self.tuning.cap {
            self.effects.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }

    pub fn render(&self, canvas: &mut FrameCanvas) {
        for p in &self.effects {
            let life = p.life.clamp(0.0, 1.0);
            p.render(canvas, life, life * GLOW_ALPHA);
        }
    }
}

fn random_size<R: Rng + ?Sized>((min, max): (f32, f32), rng: &mut R) -> f32 {
    min + rng.gen::<f32>() * (max - min).max(0.0)
}
