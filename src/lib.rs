//! Fluid Wallpaper
//! Particle-flow and liquid-blob live wallpaper engine with polled parameter sync

pub mod blobs;
pub mod canvas;
pub mod clock;
pub mod config;
pub mod controller;
pub mod host;
pub mod particles;
pub mod presets;
pub mod render_loop;
pub mod simulation;
pub mod store;
pub mod touch;
