//! Render Loop
//! Dedicated thread per surface: lock, clear, poll, update, draw, post, sleep

use crate::canvas::{Surface, BACKGROUND};
use crate::config::HostKind;
use crate::simulation::SimulationContext;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// One frame against `surface`. Returns false when the canvas was unavailable
/// and the tick was skipped.
pub fn render_frame(context: &mut SimulationContext, surface: &dyn Surface) -> bool {
    let Some(mut canvas) = surface.lock_canvas() else {
        return false;
    };
    canvas.clear(BACKGROUND);
    context.poll_store();
    context.step();
    context.draw(&mut canvas);
    surface.unlock_canvas_and_post(canvas);
    true
}

/// A running render thread. The simulation context lives on the thread and is
/// handed back by `stop`, so state survives pause/resume.
pub struct RenderLoop {
    kind: HostKind,
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<SimulationContext>>,
}

impl RenderLoop {
    pub fn start(
        mut context: SimulationContext,
        surface: Arc<dyn Surface>,
    ) -> std::io::Result<Self> {
        let kind = context.profile().kind;
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let thread = thread::Builder::new()
            .name(format!("{:?}-render", kind))
            .spawn(move || {
                log::info!("{:?}: render loop started", kind);
                loop {
                    let started = Instant::now();
                    let frame = catch_unwind(AssertUnwindSafe(|| {
                        render_frame(&mut context, surface.as_ref())
                    }));
                    if let Err(panic) = frame {
                        log::error!("{:?}: {}", kind, panic_message(panic.as_ref()));
                        break;
                    }

                    // The stop signal doubles as an interruptible frame sleep
                    let wait = context
                        .params()
                        .frame_interval()
                        .saturating_sub(started.elapsed());
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::info!("{:?}: render loop stopped", kind);
                context
            })?;

        Ok(Self {
            kind,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    pub fn kind(&self) -> HostKind {
        self.kind
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal the thread and wait for it. No frame is drawn after this returns.
    /// Yields the context back unless the thread itself died.
    pub fn stop(mut self) -> Option<SimulationContext> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<SimulationContext> {
        if let Some(tx) = self.stop_tx.take() {
            // Full means a stop is already pending
            let _ = tx.try_send(());
        }
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(context) => Some(context),
            Err(panic) => {
                log::error!("{:?}: {}", self.kind, panic_message(panic.as_ref()));
                None
            }
        }
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("render thread panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("render thread panicked: {}", s)
    } else {
        "render thread panicked with unknown error".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::OffscreenSurface;
    use crate::clock::ManualClock;
    use crate::config::{HostProfile, SimulationParams};
    use std::time::Duration;

    fn context() -> SimulationContext {
        SimulationContext::seeded(
            HostProfile::preview(),
            SimulationParams {
                fps_limit: 120,
                ..SimulationParams::default()
            },
            ManualClock::new(0).shared(),
            3,
        )
    }

    #[test]
    fn invalid_surface_skips_frame() {
        let mut ctx = context();
        let surface = OffscreenSurface::new(32, 32, Duration::from_millis(1));
        assert!(!render_frame(&mut ctx, &surface));
        assert_eq!(ctx.ticks(), 0);

        surface.set_valid(true);
        assert!(render_frame(&mut ctx, &surface));
        assert_eq!(ctx.ticks(), 1);
        assert_eq!(surface.frames_posted(), 1);
    }

    #[test]
    fn loop_renders_until_stopped() {
        let surface = Arc::new(OffscreenSurface::new(64, 64, Duration::from_millis(5)));
        surface.set_valid(true);

        let running = RenderLoop::start(context(), surface.clone()).unwrap();
        thread::sleep(Duration::from_millis(100));
        assert!(running.is_running());

        let ctx = running.stop().expect("context handed back");
        let posted = surface.frames_posted();
        assert!(posted > 0);
        assert_eq!(ctx.ticks(), posted);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(surface.frames_posted(), posted);
    }

    #[test]
    fn stop_is_prompt_even_at_low_frame_rate() {
        let surface = Arc::new(OffscreenSurface::new(16, 16, Duration::from_millis(5)));
        surface.set_valid(true);
        let ctx = context();
        ctx.handle().set_battery_save_mode(true);

        let running = RenderLoop::start(ctx, surface).unwrap();
        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        running.stop();
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
