//! Liquid Blob Engine
//! Two soft bodies with touch pull, pairwise attraction, edge bounce and a pulsing bridge

use crate::canvas::{lerp_color, FrameCanvas};
use crate::config::{BlobTuning, SimulationParams};
use egui::Color32;
use rand::Rng;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Blob {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Radius in pixels
    pub radius: f32,
}

impl Blob {
    pub fn at(x: f32, y: f32, radius: f32) -> Self {
        Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            radius,
        }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.vx.is_finite() && self.vy.is_finite()
    }

    /// Reflect velocity on axes where the blob sits inside the edge margin moving outward.
    fn bounce(&mut self, margin: f32) {
        if (self.x < margin && self.vx < 0.0) || (self.x > 1.0 - margin && self.vx > 0.0) {
            self.vx = -self.vx;
        }
        if (self.y < margin && self.vy < 0.0) || (self.y > 1.0 - margin && self.vy > 0.0) {
            self.vy = -self.vy;
        }
        self.x = self.x.clamp(0.0, 1.0);
        self.y = self.y.clamp(0.0, 1.0);
    }
}

/// The blob pair. Created once per surface on first use of the liquid effect.
pub struct LiquidBlobs {
    blobs: [Blob; 2],
    tuning: BlobTuning,
}

impl LiquidBlobs {
    pub fn new(tuning: BlobTuning) -> Self {
        let [a, b] = tuning.start;
        Self {
            blobs: [
                Blob::at(a[0], a[1], tuning.radius),
                Blob::at(b[0], b[1], tuning.radius),
            ],
            tuning,
        }
    }

    pub fn blobs(&self) -> &[Blob; 2] {
        &self.blobs
    }

    pub fn blobs_mut(&mut self) -> &mut [Blob; 2] {
        &mut self.blobs
    }

    pub fn tuning(&self) -> &BlobTuning {
        &self.tuning
    }

    /// Viscosity-derived velocity multiplier, kept inside the tuned range.
    pub fn drag_factor(&self, viscosity: f32) -> f32 {
        let t = &self.tuning;
        let raw = if viscosity.is_finite() {
            1.0 - viscosity * t.viscosity_drag
        } else {
            t.drag_max
        };
        raw.clamp(t.drag_min, t.drag_max)
    }

    /// Advance one tick. `touch` is the held touch point, if any.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        touch: Option<(f32, f32)>,
        params: &SimulationParams,
        rng: &mut R,
    ) {
        let t = self.tuning;
        let speed = if params.speed.is_finite() { params.speed } else { 1.0 };
        let turbulence = if params.turbulence.is_finite() {
            params.turbulence
        } else {
            0.0
        };
        let drag = self.drag_factor(params.viscosity);

        for blob in &mut self.blobs {
            if let Some((tx, ty)) = touch {
                let dx = tx - blob.x;
                let dy = ty - blob.y;
                let dist = (dx * dx + dy * dy).sqrt().max(t.min_distance);
                blob.vx += dx / dist * t.touch_pull;
                blob.vy += dy / dist * t.touch_pull;
            }
            blob.vx += (rng.gen::<f32>() - 0.5) * turbulence * t.turbulence_scale;
            blob.vy += (rng.gen::<f32>() - 0.5) * turbulence * t.turbulence_scale;
        }

        // Equal and opposite pull keeps the pair's momentum unchanged.
        let [a, b] = &mut self.blobs;
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let dist = (dx * dx + dy * dy).sqrt().max(t.min_distance);
        let force = (t.pair_strength / dist).min(t.pair_max);
        let fx = dx / dist * force;
        let fy = dy / dist * force;
        a.vx += fx;
        a.vy += fy;
        b.vx -= fx;
        b.vy -= fy;

        for (i, blob) in self.blobs.iter_mut().enumerate() {
            blob.vx *= drag;
            blob.vy *= drag;
            blob.x += blob.vx * speed;
            blob.y += blob.vy * speed;
            blob.bounce(t.edge_margin);

            if !blob.is_finite() {
                let start = t.start[i];
                *blob = Blob::at(start[0], start[1], t.radius);
            }
        }
    }

    /// Center distance in pixels for a `width` x `height` viewport.
    pub fn pixel_distance(&self, width: f32, height: f32) -> f32 {
        let [a, b] = &self.blobs;
        let dx = (b.x - a.x) * width;
        let dy = (b.y - a.y) * height;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn bridge_threshold(&self) -> f32 {
        (self.blobs[0].radius + self.blobs[1].radius) * self.tuning.bridge_factor
    }

    /// Pure threshold test, no hysteresis.
    pub fn bridge_eligible(&self, width: f32, height: f32) -> bool {
        self.pixel_distance(width, height) < self.bridge_threshold()
    }

    /// Bridge width in pixels, pulsing with simulation time.
    pub fn bridge_thickness(&self, time: f32) -> f32 {
        let t = &self.tuning;
        let base = self.blobs[0].radius.min(self.blobs[1].radius) * t.bridge_width;
        base * (1.0 + t.bridge_pulse_depth * (time * t.bridge_pulse_rate).sin())
    }

    pub fn render(&self, canvas: &mut FrameCanvas, palette: &[Color32; 2], time: f32) {
        let t = &self.tuning;
        let w = canvas.width() as f32;
        let h = canvas.height() as f32;

        // Glow first so both bodies sit on top of it
        for (blob, &color) in self.blobs.iter().zip(palette) {
            canvas.draw_circle_soft(
                blob.x * w,
                blob.y * h,
                blob.radius * t.glow_scale,
                color,
                t.glow_alpha,
            );
        }

        if self.bridge_eligible(w, h) {
            let [a, b] = &self.blobs;
            let (ax, ay) = (a.x * w, a.y * h);
            let (bx, by) = (b.x * w, b.y * h);
            let dist = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt().max(1.0);
            let nx = (bx - ax) / dist;
            let ny = (by - ay) / dist;
            // Span the gap between the two rims, reaching halfway into each body
            let reach_a = (a.radius * 0.5).min(dist * 0.5);
            let reach_b = (b.radius * 0.5).min(dist * 0.5);
            let mid = lerp_color(palette[0], palette[1], 0.5);
            canvas.fill_capsule(
                (ax + nx * reach_a, ay + ny * reach_a),
                (bx - nx * reach_b, by - ny * reach_b),
                self.bridge_thickness(time) * 0.5,
                mid,
                0.85,
            );
        }

        for (blob, &color) in self.blobs.iter().zip(palette) {
            canvas.draw_gradient_disk(
                blob.x * w,
                blob.y * h,
                blob.radius,
                lerp_color(color, Color32::WHITE, 0.7),
                color,
                1.0,
            );
        }
    }
}
