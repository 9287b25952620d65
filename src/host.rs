//! Surface Hosts
//!
//! A host couples one drawing surface with one simulation stack and maps the
//! platform lifecycle onto the render loop: surface created/changed/destroyed,
//! visibility, pause and resume. It also turns pixel-space pointer input into
//! normalized touch events.
//!
//! The preview host lives in the UI process and receives parameter setters
//! directly. The wallpaper engine host only learns about changes through the
//! shared store, and reloads it as soon as it becomes visible.

use crate::canvas::{OffscreenSurface, Surface};
use crate::clock::SharedClock;
use crate::config::{HostKind, HostProfile, SimulationParams};
use crate::render_loop::RenderLoop;
use crate::simulation::{SimulationContext, SimulationHandle};
use crate::store::SharedStores;
use std::sync::Arc;
use std::time::Duration;

pub struct SurfaceHost {
    kind: HostKind,
    surface: Arc<OffscreenSurface>,
    handle: SimulationHandle,
    idle: Option<SimulationContext>,
    running: Option<RenderLoop>,
    visible: bool,
}

impl SurfaceHost {
    pub fn new(context: SimulationContext) -> Self {
        let profile = *context.profile();
        let surface = Arc::new(OffscreenSurface::new(
            1,
            1,
            Duration::from_millis(profile.canvas_timeout_ms),
        ));
        Self {
            kind: profile.kind,
            surface,
            handle: context.handle(),
            idle: Some(context),
            running: None,
            visible: true,
        }
    }

    /// In-app preview bound to the shared store.
    pub fn preview(profile: HostProfile, stores: SharedStores, clock: SharedClock) -> Self {
        let context = SimulationContext::new(profile, SimulationParams::default(), clock);
        Self::new(context.with_stores(stores))
    }

    /// Wallpaper engine; starts hidden until the platform reports it visible.
    pub fn wallpaper_engine(profile: HostProfile, stores: SharedStores, clock: SharedClock) -> Self {
        let context = SimulationContext::new(profile, SimulationParams::default(), clock);
        let mut host = Self::new(context.with_stores(stores));
        host.visible = false;
        host
    }

    pub fn kind(&self) -> HostKind {
        self.kind
    }

    pub fn handle(&self) -> &SimulationHandle {
        &self.handle
    }

    pub fn surface(&self) -> &Arc<OffscreenSurface> {
        &self.surface
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(RenderLoop::is_running)
    }

    /// The paused simulation, if the loop is not running.
    pub fn idle_context(&self) -> Option<&SimulationContext> {
        self.idle.as_ref()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn surface_created(&mut self, width: u32, height: u32) {
        log::info!("{:?}: surface created {}x{}", self.kind, width, height);
        self.surface.resize(width, height);
        self.surface.set_valid(true);
        if self.visible {
            self.resume();
        }
    }

    pub fn surface_changed(&mut self, width: u32, height: u32) {
        if self.surface.size() != (width.max(1), height.max(1)) {
            log::debug!("{:?}: surface resized to {}x{}", self.kind, width, height);
            self.surface.resize(width, height);
        }
    }

    pub fn surface_destroyed(&mut self) {
        log::info!("{:?}: surface destroyed", self.kind);
        self.pause();
        self.surface.set_valid(false);
    }

    pub fn set_visible(&mut self, visible: bool) {
        if visible == self.visible {
            return;
        }
        self.visible = visible;
        log::debug!("{:?}: visible = {}", self.kind, visible);
        if visible {
            if self.kind == HostKind::WallpaperEngine {
                if let Some(context) = self.idle.as_mut() {
                    context.force_poll();
                }
            }
            self.resume();
        } else {
            self.pause();
        }
    }

    /// Stop and join the render loop. No frame is drawn after this returns.
    pub fn pause(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        match running.stop() {
            Some(context) => self.idle = Some(context),
            None => log::error!("{:?}: simulation lost, host stays stopped", self.kind),
        }
    }

    /// Restart the render loop if the surface is valid. Returns whether it runs.
    pub fn resume(&mut self) -> bool {
        if self.is_running() {
            return true;
        }
        // Reclaim a loop that ended on its own
        self.pause();
        if !self.surface.is_valid() {
            log::debug!("{:?}: resume ignored, surface not valid", self.kind);
            return false;
        }
        let Some(context) = self.idle.take() else {
            return false;
        };
        match RenderLoop::start(context, self.surface.clone()) {
            Ok(running) => {
                self.running = Some(running);
                true
            }
            Err(e) => {
                log::error!("{:?}: failed to start render loop: {}", self.kind, e);
                false
            }
        }
    }

    // ========================================================================
    // Touch
    // ========================================================================

    fn normalize(&self, px: f32, py: f32) -> (f32, f32) {
        let (w, h) = self.surface.size();
        (px / w as f32, py / h as f32)
    }

    fn touch_enabled(&self) -> bool {
        self.handle.params().touch_interaction
    }

    pub fn touch_down(&self, px: f32, py: f32) {
        if !self.touch_enabled() {
            return;
        }
        let (x, y) = self.normalize(px, py);
        self.handle.on_touch_down(x, y);
    }

    pub fn touch_move(&self, px: f32, py: f32) {
        if !self.touch_enabled() {
            return;
        }
        let (x, y) = self.normalize(px, py);
        self.handle.on_touch_move(x, y);
    }

    /// Always ends a touch that is in progress, even if interaction was turned off.
    pub fn touch_up(&self, px: f32, py: f32) {
        if self.handle.touch_state().is_touching {
            let (x, y) = self.normalize(px, py);
            self.handle.on_touch_up(x, y);
        }
    }
}

impl Drop for SurfaceHost {
    fn drop(&mut self) {
        self.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn stores() -> (SharedStores, ManualClock) {
        let clock = ManualClock::new(10_000);
        (SharedStores::in_memory(clock.shared()), clock)
    }

    #[test]
    fn resume_requires_valid_surface() {
        let (stores, clock) = stores();
        let mut host = SurfaceHost::preview(HostProfile::preview(), stores, clock.shared());
        assert!(!host.resume());
        assert!(!host.is_running());

        host.surface_created(32, 32);
        assert!(host.is_running());

        host.surface_destroyed();
        assert!(!host.is_running());
        assert!(!host.resume());
    }

    #[test]
    fn wallpaper_waits_for_visibility() {
        let (stores, clock) = stores();
        let mut host =
            SurfaceHost::wallpaper_engine(HostProfile::wallpaper_engine(), stores, clock.shared());
        host.surface_created(32, 32);
        assert!(!host.is_running());

        host.set_visible(true);
        assert!(host.is_running());
        host.set_visible(false);
        assert!(!host.is_running());
        assert!(host.idle_context().is_some());
    }

    #[test]
    fn touches_are_normalized_by_surface_size() {
        let (stores, clock) = stores();
        let mut host = SurfaceHost::preview(HostProfile::preview(), stores, clock.shared());
        host.surface_changed(200, 400);
        host.touch_down(50.0, 300.0);
        let touch = host.handle().touch_state();
        assert!(touch.is_touching);
        assert_eq!((touch.x, touch.y), (0.25, 0.75));
        host.touch_up(100.0, 100.0);
        let touch = host.handle().touch_state();
        assert!(!touch.is_touching);
        assert_eq!((touch.x, touch.y), (0.5, 0.25));
    }

    #[test]
    fn disabled_interaction_ignores_touches() {
        let (stores, clock) = stores();
        let host = SurfaceHost::preview(HostProfile::preview(), stores, clock.shared());
        host.handle().set_touch_interaction(false);
        host.touch_down(1.0, 1.0);
        assert!(!host.handle().touch_state().is_touching);
    }

    #[test]
    fn hosts_start_from_stored_parameters() {
        let (stores, clock) = stores();
        stores.write_colors([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]).unwrap();
        let host =
            SurfaceHost::wallpaper_engine(HostProfile::wallpaper_engine(), stores, clock.shared());
        assert_eq!(host.handle().params().color1, [1.0, 0.0, 0.0]);
        assert_eq!(host.handle().params().color2, [0.0, 1.0, 0.0]);
    }
}
