//! CPU drawing surface.
//!
//! `FrameCanvas` rasterizes the wallpaper into a float RGB buffer and quantizes
//! to RGBA8 when a frame is posted. `OffscreenSurface` wraps one canvas behind a
//! lock with a bounded acquire, the way a platform surface holder hands out its
//! canvas: a render thread locks it, draws one frame, then unlocks and posts.
//!
//! Notes:
//! - Colors are egui's premultiplied `Color32`; blending is premultiplied OVER
//!   and the canvas itself is opaque.
//! - Coordinates are pixels with the origin at the top-left (y grows downward).

use egui::Color32;
use parking_lot::{Mutex, MutexGuard};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

pub const BACKGROUND: Color32 = Color32::BLACK;

/// Simple CPU canvas.
pub struct FrameCanvas {
    width: u32,
    height: u32,
    /// RGB buffer in 0..255 float space.
    rgb: Vec<f32>,
    /// Output RGBA8.
    out_rgba: Vec<u8>,
}

impl FrameCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let px = (width * height) as usize;
        Self {
            width,
            height,
            rgb: vec![0.0; px * 3],
            out_rgba: vec![0; px * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        if self.width != width || self.height != height {
            *self = Self::new(width, height);
        }
    }

    pub fn clear(&mut self, bg: Color32) {
        let r = bg.r() as f32;
        let g = bg.g() as f32;
        let b = bg.b() as f32;
        self.rgb.par_chunks_mut(3).for_each(|px| {
            px[0] = r;
            px[1] = g;
            px[2] = b;
        });
    }

    /// Quantized RGB of one pixel (for inspection).
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0];
        }
        let base = ((y * self.width + x) * 3) as usize;
        [
            self.rgb[base].clamp(0.0, 255.0) as u8,
            self.rgb[base + 1].clamp(0.0, 255.0) as u8,
            self.rgb[base + 2].clamp(0.0, 255.0) as u8,
        ]
    }

    /// Composite `color` scaled by the coverage `a` in 0..1.
    #[inline]
    fn blend(&mut self, px: i32, py: i32, color: Color32, a: f32) {
        let idx = (py as u32 * self.width + px as u32) as usize;
        let base = idx * 3;
        let inv = 1.0 - a * color.a() as f32 / 255.0;
        self.rgb[base] = self.rgb[base] * inv + color.r() as f32 * a;
        self.rgb[base + 1] = self.rgb[base + 1] * inv + color.g() as f32 * a;
        self.rgb[base + 2] = self.rgb[base + 2] * inv + color.b() as f32 * a;
    }

    /// Pixel bounds of a box around (cx, cy), or None when fully off-canvas.
    fn bounds(&self, cx: f32, cy: f32, extent: f32) -> Option<(i32, i32, i32, i32)> {
        if !(cx.is_finite() && cy.is_finite() && extent.is_finite()) {
            return None;
        }
        let min_x = (cx - extent).floor().max(0.0) as i32;
        let max_x = (cx + extent).ceil().min(self.width as f32 - 1.0) as i32;
        let min_y = (cy - extent).floor().max(0.0) as i32;
        let max_y = (cy + extent).ceil().min(self.height as f32 - 1.0) as i32;
        if min_x > max_x || min_y > max_y {
            return None;
        }
        Some((min_x, max_x, min_y, max_y))
    }

    /// Solid disk with a one-pixel antialiased rim. `alpha` in 0..1 scales the color.
    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color32, alpha: f32) {
        if radius <= 0.1 || alpha <= 0.0 || color.a() == 0 {
            return;
        }
        let Some((min_x, max_x, min_y, max_y)) = self.bounds(cx, cy, radius + 1.0) else {
            return;
        };

        for py in min_y..=max_y {
            for px in min_x..=max_x {
                let dx = px as f32 + 0.5 - cx;
                let dy = py as f32 + 0.5 - cy;
                let dist = (dx * dx + dy * dy).sqrt();
                let coverage = (radius + 0.5 - dist).clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    continue;
                }
                self.blend(px, py, color, (alpha * coverage).min(1.0));
            }
        }
    }

    /// Disk fading smoothly from `alpha` at the center to nothing at `radius`.
    pub fn draw_circle_soft(&mut self, cx: f32, cy: f32, radius: f32, color: Color32, alpha: f32) {
        if radius <= 0.1 || alpha <= 0.0 || color.a() == 0 {
            return;
        }
        let Some((min_x, max_x, min_y, max_y)) = self.bounds(cx, cy, radius) else {
            return;
        };
        let radius_sq = radius * radius;

        for py in min_y..=max_y {
            for px in min_x..=max_x {
                let dx = px as f32 - cx;
                let dy = py as f32 - cy;
                let dist_sq = dx * dx + dy * dy;
                if dist_sq > radius_sq {
                    continue;
                }
                let t = (dist_sq.sqrt() / radius).clamp(0.0, 1.0);
                let falloff = (1.0 - t).powf(1.8);
                self.blend(px, py, color, (alpha * falloff).clamp(0.0, 1.0));
            }
        }
    }

    /// Radial gradient disk: `center` at the middle, `edge` by 60% of the radius,
    /// then fading to transparent at the rim.
    pub fn draw_gradient_disk(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        center: Color32,
        edge: Color32,
        alpha: f32,
    ) {
        if radius <= 0.1 || alpha <= 0.0 {
            return;
        }
        let Some((min_x, max_x, min_y, max_y)) = self.bounds(cx, cy, radius) else {
            return;
        };
        let radius_sq = radius * radius;

        for py in min_y..=max_y {
            for px in min_x..=max_x {
                let dx = px as f32 - cx;
                let dy = py as f32 - cy;
                let dist_sq = dx * dx + dy * dy;
                if dist_sq > radius_sq {
                    continue;
                }
                let t = dist_sq.sqrt() / radius;
                let (color, a) = if t < 0.6 {
                    (lerp_color(center, edge, t / 0.6), 1.0)
                } else {
                    (edge, 1.0 - (t - 0.6) / 0.4)
                };
                self.blend(px, py, color, (alpha * a).clamp(0.0, 1.0));
            }
        }
    }

    /// Soft-edged thick segment from `a` to `b` with the given half width.
    pub fn fill_capsule(
        &mut self,
        a: (f32, f32),
        b: (f32, f32),
        half_width: f32,
        color: Color32,
        alpha: f32,
    ) {
        if half_width <= 0.1 || alpha <= 0.0 {
            return;
        }
        let (ax, ay) = a;
        let (bx, by) = b;
        let cx = (ax + bx) * 0.5;
        let cy = (ay + by) * 0.5;
        let half_len = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt() * 0.5;
        let Some((min_x, max_x, min_y, max_y)) = self.bounds(cx, cy, half_len + half_width) else {
            return;
        };

        let seg_x = bx - ax;
        let seg_y = by - ay;
        let seg_len_sq = (seg_x * seg_x + seg_y * seg_y).max(1e-6);

        for py in min_y..=max_y {
            for px in min_x..=max_x {
                let fx = px as f32 - ax;
                let fy = py as f32 - ay;
                let t = ((fx * seg_x + fy * seg_y) / seg_len_sq).clamp(0.0, 1.0);
                let dx = fx - seg_x * t;
                let dy = fy - seg_y * t;
                let dist = (dx * dx + dy * dy).sqrt();
                if dist > half_width {
                    continue;
                }
                let falloff = 1.0 - (dist / half_width).powi(2);
                self.blend(px, py, color, (alpha * falloff).clamp(0.0, 1.0));
            }
        }
    }

    /// Quantize to RGBA8.
    pub fn to_rgba(&mut self) -> &[u8] {
        self.out_rgba
            .par_chunks_mut(4)
            .zip(self.rgb.par_chunks(3))
            .for_each(|(out, rgb)| {
                out[0] = rgb[0].clamp(0.0, 255.0) as u8;
                out[1] = rgb[1].clamp(0.0, 255.0) as u8;
                out[2] = rgb[2].clamp(0.0, 255.0) as u8;
                out[3] = 255;
            });
        &self.out_rgba
    }
}

/// Linear mix of two premultiplied colors.
pub fn lerp_color(a: Color32, b: Color32, t: f32) -> Color32 {
    let t = t.clamp(0.0, 1.0);
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Color32::from_rgba_premultiplied(
        mix(a.r(), b.r()),
        mix(a.g(), b.g()),
        mix(a.b(), b.b()),
        mix(a.a(), b.a()),
    )
}

// ============================================================================
// Surfaces
// ============================================================================

/// A drawing surface a render loop can lock one frame at a time.
pub trait Surface: Send + Sync {
    /// Exclusive canvas access; `None` when the surface is invalid or busy.
    fn lock_canvas(&self) -> Option<MutexGuard<'_, FrameCanvas>>;

    fn unlock_canvas_and_post(&self, canvas: MutexGuard<'_, FrameCanvas>);

    fn is_valid(&self) -> bool;
}

/// Last frame handed to the host for display.
#[derive(Clone, Debug, Default)]
pub struct PostedFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    pub sequence: u64,
}

/// In-memory surface: a back canvas for drawing and a posted front frame for display.
pub struct OffscreenSurface {
    canvas: Mutex<FrameCanvas>,
    front: Mutex<PostedFrame>,
    valid: AtomicBool,
    posted: AtomicU64,
    acquire_timeout: Duration,
}

impl OffscreenSurface {
    pub fn new(width: u32, height: u32, acquire_timeout: Duration) -> Self {
        Self {
            canvas: Mutex::new(FrameCanvas::new(width, height)),
            front: Mutex::new(PostedFrame::default()),
            valid: AtomicBool::new(false),
            posted: AtomicU64::new(0),
            acquire_timeout,
        }
    }

    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::SeqCst);
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.canvas.lock().resize(width, height);
    }

    pub fn size(&self) -> (u32, u32) {
        let canvas = self.canvas.lock();
        (canvas.width(), canvas.height())
    }

    pub fn frames_posted(&self) -> u64 {
        self.posted.load(Ordering::SeqCst)
    }

    /// Copy of the latest posted frame if it is newer than `sequence`.
    pub fn frame_since(&self, sequence: u64) -> Option<PostedFrame> {
        let front = self.front.lock();
        if front.sequence > sequence {
            Some(front.clone())
        } else {
            None
        }
    }
}

impl Surface for OffscreenSurface {
    fn lock_canvas(&self) -> Option<MutexGuard<'_, FrameCanvas>> {
        if !self.is_valid() {
            return None;
        }
        self.canvas.try_lock_for(self.acquire_timeout)
    }

    fn unlock_canvas_and_post(&self, mut canvas: MutexGuard<'_, FrameCanvas>) {
        let (width, height) = (canvas.width(), canvas.height());
        let rgba = canvas.to_rgba();

        let sequence = self.posted.fetch_add(1, Ordering::SeqCst) + 1;
        let mut front = self.front.lock();
        front.width = width;
        front.height = height;
        front.rgba.clear();
        front.rgba.extend_from_slice(rgba);
        front.sequence = sequence;
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }
}
