//! Particle Engine for Fluid Wallpaper
//! Constant-size particle pool driven by the particle-flow force model

use crate::canvas::FrameCanvas;
use crate::config::{FlowTuning, SimulationParams};
use egui::Color32;
use rand::Rng;
use std::f32::consts::TAU;

const GLOW_SCALE: f32 = 2.0;
const GLOW_ALPHA: f32 = 100.0 / 255.0;

/// Individual particle data. Position is normalized to the unit square.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub color: Color32,
    /// Radius in pixels at life = 1
    pub size: f32,
    pub life: f32,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            x: 0.5,
            y: 0.5,
            vx: 0.0,
            vy: 0.0,
            color: Color32::WHITE,
            size: 5.0,
            life: 1.0,
        }
    }
}

impl Particle {
    pub fn speed(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.vx.is_finite() && self.vy.is_finite()
    }

    /// Draw as a solid disk plus a wider translucent glow, both scaled by life.
    pub fn render(&self, canvas: &mut FrameCanvas, alpha: f32, glow_alpha: f32) {
        let radius = self.size * self.life;
        if radius <= 0.0 {
            return;
        }
        let cx = self.x * canvas.width() as f32;
        let cy = self.y * canvas.height() as f32;
        canvas.draw_circle_soft(cx, cy, radius * GLOW_SCALE, self.color, glow_alpha);
        canvas.fill_circle(cx, cy, radius, self.color, alpha);
    }
}

/// Wrap a coordinate onto the unit torus. The result is always in `[0, 1)`.
pub fn wrap_unit(v: f32) -> f32 {
    if !v.is_finite() {
        return 0.0;
    }
    let w = v.rem_euclid(1.0);
    // rem_euclid can round up to exactly 1.0 for tiny negative inputs
    if w >= 1.0 {
        0.0
    } else {
        w
    }
}

/// Global force mode, switched by whether a touch is held.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FlowMode {
    Free,
    Attracted { x: f32, y: f32 },
}

/// Spawn a main-pool particle with a random position, heading and palette color.
pub fn spawn_particle<R: Rng + ?Sized>(
    tuning: &FlowTuning,
    palette: &[Color32; 2],
    rng: &mut R,
) -> Particle {
    let angle = rng.gen::<f32>() * TAU;
    Particle {
        x: rng.gen::<f32>(),
        y: rng.gen::<f32>(),
        vx: angle.cos() * tuning.target_speed,
        vy: angle.sin() * tuning.target_speed,
        color: pick_color(palette, rng),
        size: tuning.min_size + rng.gen::<f32>() * (tuning.max_size - tuning.min_size).max(0.0),
        life: 1.0,
    }
}

fn pick_color<R: Rng + ?Sized>(palette: &[Color32; 2], rng: &mut R) -> Color32 {
    if rng.gen_bool(0.5) {
        palette[0]
    } else {
        palette[1]
    }
}

// ============================================================================
// Particle Field
// ============================================================================

/// Main particle population. Its length never changes after construction.
pub struct ParticleField {
    particles: Vec<Particle>,
    tuning: FlowTuning,
}

impl ParticleField {
    pub fn new<R: Rng + ?Sized>(
        pool_size: usize,
        tuning: FlowTuning,
        palette: &[Color32; 2],
        rng: &mut R,
    ) -> Self {
        let particles = (0..pool_size)
            .map(|_| spawn_particle(&tuning, palette, rng))
            .collect();
        Self { particles, tuning }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn tuning(&self) -> &FlowTuning {
        &self.tuning
    }

    /// Reassign every particle to one of the two palette colors at random.
    pub fn recolor<R: Rng + ?Sized>(&mut self, palette: &[Color32; 2], rng: &mut R) {
        for p in &mut self.particles {
            p.color = pick_color(palette, rng);
        }
    }

    /// Nudge all velocities by a device tilt vector (z is ignored).
    pub fn apply_tilt(&mut self, x: f32, y: f32) {
        if !(x.is_finite() && y.is_finite()) {
            return;
        }
        for p in &mut self.particles {
            p.vx += x * self.tuning.tilt_scale;
            p.vy += y * self.tuning.tilt_scale;
        }
    }

    /// Advance one tick.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        mode: FlowMode,
        params: &SimulationParams,
        palette: &[Color32; 2],
        rng: &mut R,
    ) {
        let t = self.tuning;
        let speed = if params.speed.is_finite() { params.speed } else { 1.0 };
        let turbulence = if params.turbulence.is_finite() {
            params.turbulence
        } else {
            0.0
        };
        let damping = if params.viscosity.is_finite() {
            (1.0 - params.viscosity * t.viscosity_scale).clamp(0.0, 1.0)
        } else {
            1.0
        };

        for p in &mut self.particles {
            match mode {
                FlowMode::Free => {
                    let current = p.speed();
                    if current == 0.0 || (current - t.target_speed).abs() > t.speed_epsilon {
                        let angle = rng.gen::<f32>() * TAU;
                        p.vx = angle.cos() * t.target_speed;
                        p.vy = angle.sin() * t.target_speed;
                    }
                }
                FlowMode::Attracted { x, y } => {
                    let dx = x - p.x;
                    let dy = y - p.y;
                    let dist = (dx * dx + dy * dy).sqrt().max(t.min_touch_distance);
                    let nx = dx / dist;
                    let ny = dy / dist;

                    p.vx += nx * t.attraction - ny * t.orbital;
                    p.vy += ny * t.attraction + nx * t.orbital;

                    let current = p.speed();
                    if current > t.max_speed {
                        let scale = t.max_speed / current;
                        p.vx *= scale;
                        p.vy *= scale;
                    }
                }
            }

            p.x += p.vx * speed;
            p.y += p.vy * speed;

            p.vx += (rng.gen::<f32>() - 0.5) * turbulence * t.turbulence_scale;
            p.vy += (rng.gen::<f32>() - 0.5) * turbulence * t.turbulence_scale;

            p.vx *= damping;
            p.vy *= damping;

            p.x = wrap_unit(p.x);
            p.y = wrap_unit(p.y);

            if !p.is_finite() {
                *p = spawn_particle(&t, palette, rng);
            }
        }
    }

    pub fn render(&self, canvas: &mut FrameCanvas) {
        for p in &self.particles {
            p.render(canvas, 1.0, GLOW_ALPHA);
        }
    }

    pub fn average_speed(&self) -> f32 {
        if self.particles.is_empty() {
            return 0.0;
        }
        self.particles.iter().map(Particle::speed).sum::<f32>() / self.particles.len() as f32
    }
}
