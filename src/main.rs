//! Fluid Wallpaper - Desktop Shell
//! Settings panel plus the preview and wallpaper engine surfaces side by side

use eframe::egui;
use fluid_wallpaper::clock::system_clock;
use fluid_wallpaper::config::{
    AppConfig, EffectType, FPS_MAX, FPS_MIN, SPEED_MAX, SPEED_MIN, TURBULENCE_MAX,
    TURBULENCE_MIN, VISCOSITY_MAX, VISCOSITY_MIN,
};
use fluid_wallpaper::controller::ParameterController;
use fluid_wallpaper::host::SurfaceHost;
use fluid_wallpaper::store::SharedStores;

const CONFIG_PATH: &str = "fluid_wallpaper.json";
const PRESETS_FILE: &str = "presets.json";

#[derive(Clone, Copy, PartialEq, Eq)]
enum SettingsTab {
    Effect,
    Colors,
    System,
    Presets,
}

/// One hosted surface and the texture mirroring its last posted frame.
struct SurfaceView {
    title: &'static str,
    host: SurfaceHost,
    texture: Option<egui::TextureHandle>,
    sequence: u64,
    created: bool,
    touching: bool,
    last_touch: egui::Vec2,
}

impl SurfaceView {
    fn new(title: &'static str, host: SurfaceHost) -> Self {
        Self {
            title,
            host,
            texture: None,
            sequence: 0,
            created: false,
            touching: false,
            last_touch: egui::Vec2::ZERO,
        }
    }

    fn show(&mut self, ui: &mut egui::Ui, size: egui::Vec2) {
        let (rect, response) = ui.allocate_exact_size(size, egui::Sense::click_and_drag());
        let width = rect.width().round().max(1.0) as u32;
        let height = rect.height().round().max(1.0) as u32;

        if self.created {
            self.host.surface_changed(width, height);
        } else {
            self.host.surface_created(width, height);
            self.created = true;
        }

        // Touch input in surface pixels
        let local = response.interact_pointer_pos().map(|pos| pos - rect.min);
        let pressed = response.is_pointer_button_down_on();
        match (pressed, self.touching, local) {
            (true, false, Some(p)) => {
                self.host.touch_down(p.x, p.y);
                self.touching = true;
                self.last_touch = p;
            }
            (true, true, Some(p)) if response.dragged() => {
                self.host.touch_move(p.x, p.y);
                self.last_touch = p;
            }
            (false, true, p) => {
                let p = p.unwrap_or(self.last_touch);
                self.host.touch_up(p.x, p.y);
                self.touching = false;
            }
            _ => {}
        }

        if let Some(frame) = self.host.surface().frame_since(self.sequence) {
            self.sequence = frame.sequence;
            let image = egui::ColorImage::from_rgba_unmultiplied(
                [frame.width as usize, frame.height as usize],
                &frame.rgba,
            );
            match &mut self.texture {
                Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
                None => {
                    self.texture =
                        Some(ui.ctx().load_texture(self.title, image, egui::TextureOptions::LINEAR))
                }
            }
        }

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, egui::Color32::BLACK);
        if let Some(texture) = &self.texture {
            let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            painter.image(texture.id(), rect, uv, egui::Color32::WHITE);
        }
        if !self.host.is_running() {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "paused",
                egui::FontId::proportional(18.0),
                egui::Color32::GRAY,
            );
        }
    }
}

/// Main application state
struct FluidWallpaperApp {
    controller: ParameterController,
    preview: SurfaceView,
    wallpaper: SurfaceView,

    // UI state
    settings_tab: SettingsTab,
    selected_preset: usize,
    preset_name: String,
    preset_json: String,
    status: Option<String>,
    tilt: [f32; 2],
}

impl FluidWallpaperApp {
    fn new(cc: &eframe::CreationContext<'_>) -> Self {
        // Setup dark theme
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = egui::Color32::from_rgba_unmultiplied(20, 20, 35, 240);
        cc.egui_ctx.set_visuals(visuals);

        let config = match AppConfig::load(CONFIG_PATH) {
            Ok(config) => config,
            Err(e) => {
                log::info!("using default config ({}): {}", CONFIG_PATH, e);
                AppConfig::default()
            }
        };

        let clock = system_clock();
        let stores = SharedStores::open(&config.store_dir, clock.clone());
        let mut controller = ParameterController::new(stores.clone())
            .with_preset_file(config.store_dir.join(PRESETS_FILE));

        let preview = SurfaceHost::preview(config.preview, stores.clone(), clock.clone());
        controller.attach_preview(preview.handle().clone());
        let wallpaper = SurfaceHost::wallpaper_engine(config.wallpaper, stores, clock);

        Self {
            controller,
            preview: SurfaceView::new("Preview", preview),
            wallpaper: SurfaceView::new("Wallpaper", wallpaper),
            settings_tab: SettingsTab::Effect,
            selected_preset: 0,
            preset_name: String::from("My Preset"),
            preset_json: String::new(),
            status: None,
            tilt: [0.0, 0.0],
        }
    }
}

impl eframe::App for FluidWallpaperApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.render_settings_panel(ctx);
        self.render_surfaces(ctx);

        // Simulated sensor feed
        if self.controller.params().gyroscope_enabled && self.tilt != [0.0, 0.0] {
            for view in [&self.preview, &self.wallpaper] {
                view.host
                    .handle()
                    .set_gyroscope_data(self.tilt[0], self.tilt[1], 0.0);
            }
        }

        ctx.request_repaint();
    }
}

impl FluidWallpaperApp {
    fn render_settings_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("settings_panel")
            .min_width(280.0)
            .show(ctx, |ui| {
                ui.heading("Settings");
                ui.separator();

                ui.horizontal(|ui| {
                    ui.selectable_value(&mut self.settings_tab, SettingsTab::Effect, "Effect");
                    ui.selectable_value(&mut self.settings_tab, SettingsTab::Colors, "Colors");
                    ui.selectable_value(&mut self.settings_tab, SettingsTab::System, "System");
                    ui.selectable_value(&mut self.settings_tab, SettingsTab::Presets, "Presets");
                });

                ui.separator();

                egui::ScrollArea::vertical().show(ui, |ui| match self.settings_tab {
                    SettingsTab::Effect => self.render_effect_settings(ui),
                    SettingsTab::Colors => self.render_color_settings(ui),
                    SettingsTab::System => self.render_system_settings(ui),
                    SettingsTab::Presets => self.render_preset_settings(ui),
                });

                if let Some(status) = &self.status {
                    ui.separator();
                    ui.label(status);
                }
            });
    }

    fn render_effect_settings(&mut self, ui: &mut egui::Ui) {
        let mut params = *self.controller.params();

        ui.label("Effect");
        egui::ComboBox::from_id_source("effect_combo")
            .selected_text(params.effect_type.name())
            .show_ui(ui, |ui| {
                for effect in EffectType::all() {
                    ui.selectable_value(&mut params.effect_type, effect, effect.name());
                }
            });
        if params.effect_type != self.controller.params().effect_type {
            self.controller.set_effect_type(params.effect_type);
        }

        ui.add_space(8.0);
        ui.label("Speed");
        if ui
            .add(egui::Slider::new(&mut params.speed, SPEED_MIN..=SPEED_MAX))
            .changed()
        {
            self.controller.set_speed(params.speed);
        }

        ui.label("Viscosity");
        if ui
            .add(egui::Slider::new(&mut params.viscosity, VISCOSITY_MIN..=VISCOSITY_MAX))
            .changed()
        {
            self.controller.set_viscosity(params.viscosity);
        }

        ui.label("Turbulence");
        if ui
            .add(egui::Slider::new(&mut params.turbulence, TURBULENCE_MIN..=TURBULENCE_MAX))
            .changed()
        {
            self.controller.set_turbulence(params.turbulence);
        }

        ui.add_space(8.0);
        ui.separator();
        if ui.button("Burst at center").clicked() {
            self.preview.host.handle().set_touch_position(0.5, 0.5);
        }
    }

    fn render_color_settings(&mut self, ui: &mut egui::Ui) {
        let mut params = *self.controller.params();
        let mut changed = false;

        ui.horizontal(|ui| {
            ui.label("Primary");
            changed |= ui.color_edit_button_rgb(&mut params.color1).changed();
        });
        ui.horizontal(|ui| {
            ui.label("Secondary");
            changed |= ui.color_edit_button_rgb(&mut params.color2).changed();
        });

        if changed {
            self.controller.set_colors(params.color1, params.color2);
        }
    }

    fn render_system_settings(&mut self, ui: &mut egui::Ui) {
        let mut params = *self.controller.params();

        if ui
            .checkbox(&mut params.battery_save, "Battery save (30 fps)")
            .changed()
        {
            self.controller.set_battery_save_mode(params.battery_save);
        }

        ui.label("FPS limit");
        if ui
            .add_enabled(
                !params.battery_save,
                egui::Slider::new(&mut params.fps_limit, FPS_MIN..=FPS_MAX),
            )
            .changed()
        {
            self.controller.set_fps_limit(params.fps_limit);
        }

        if ui
            .checkbox(&mut params.touch_interaction, "Touch interaction")
            .changed()
        {
            self.controller.set_touch_interaction(params.touch_interaction);
        }

        if ui
            .checkbox(&mut params.gyroscope_enabled, "Gyroscope")
            .changed()
        {
            self.controller.set_gyroscope_enabled(params.gyroscope_enabled);
        }
        if params.gyroscope_enabled {
            ui.label("Tilt X");
            ui.add(egui::Slider::new(&mut self.tilt[0], -5.0..=5.0));
            ui.label("Tilt Y");
            ui.add(egui::Slider::new(&mut self.tilt[1], -5.0..=5.0));
        }

        ui.add_space(8.0);
        ui.separator();
        ui.heading("Surfaces");

        let mut visible = self.wallpaper.host.is_visible();
        if ui.checkbox(&mut visible, "Wallpaper visible").changed() {
            self.wallpaper.host.set_visible(visible);
        }

        ui.horizontal(|ui| {
            if self.preview.host.is_running() {
                if ui.button("Pause preview").clicked() {
                    self.preview.host.pause();
                }
            } else if ui.button("Resume preview").clicked() {
                self.preview.host.resume();
            }
        });
    }

    fn render_preset_settings(&mut self, ui: &mut egui::Ui) {
        let names: Vec<String> = self
            .controller
            .library()
            .presets()
            .iter()
            .map(|p| p.name.clone())
            .collect();
        self.selected_preset = self.selected_preset.min(names.len().saturating_sub(1));

        ui.horizontal(|ui| {
            ui.label("Preset:");
            egui::ComboBox::from_id_source("preset_combo")
                .selected_text(
                    names
                        .get(self.selected_preset)
                        .map(String::as_str)
                        .unwrap_or("-"),
                )
                .show_ui(ui, |ui| {
                    for (i, name) in names.iter().enumerate() {
                        ui.selectable_value(&mut self.selected_preset, i, name);
                    }
                });
        });

        let selected = names
            .get(self.selected_preset)
            .and_then(|name| self.controller.library().get(name))
            .cloned();

        ui.horizontal(|ui| {
            if let Some(preset) = &selected {
                if ui.button("Apply").clicked() {
                    self.controller.apply_preset(preset);
                    self.status = Some(format!("Applied \"{}\"", preset.name));
                }
                if ui.button("Share").clicked() {
                    match preset.to_json() {
                        Ok(json) => self.preset_json = json,
                        Err(e) => self.status = Some(format!("Export failed: {}", e)),
                    }
                }
                if ui.button("Delete").clicked() && self.controller.delete_preset(&preset.name) {
                    self.status = Some(format!("Deleted \"{}\"", preset.name));
                }
            }
        });

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut self.preset_name);
            if ui.button("Save current").clicked() && !self.preset_name.trim().is_empty() {
                self.controller.save_preset(self.preset_name.trim());
                self.status = Some(format!("Saved \"{}\"", self.preset_name.trim()));
            }
        });

        ui.add_space(8.0);
        ui.label("Preset JSON");
        ui.add(
            egui::TextEdit::multiline(&mut self.preset_json)
                .code_editor()
                .desired_rows(8),
        );
        if ui.button("Import").clicked() {
            self.status = Some(match self.controller.import_preset(&self.preset_json) {
                Ok(()) => "Preset imported".to_string(),
                Err(e) => format!("Import failed: {}", e),
            });
        }

        ui.add_space(8.0);
        if ui.button("Reset to defaults").clicked() {
            self.controller.reset_to_defaults();
            self.status = Some("Defaults restored".to_string());
        }
    }

    fn render_surfaces(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let available = ui.available_size();
            // Two portrait panes side by side
            let pane_w = ((available.x - 24.0) / 2.0).max(1.0);
            let pane_h = (available.y - 28.0).max(1.0).min(pane_w * 16.0 / 9.0);
            let size = egui::vec2(pane_w, pane_h);

            ui.horizontal_top(|ui| {
                for view in [&mut self.preview, &mut self.wallpaper] {
                    ui.vertical(|ui| {
                        ui.label(view.title);
                        view.show(ui, size);
                    });
                    ui.add_space(8.0);
                }
            });
        });
    }
}

fn main() -> eframe::Result<()> {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 800.0])
            .with_title("Fluid Wallpaper")
            .with_min_inner_size([700.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Fluid Wallpaper",
        options,
        Box::new(|cc| Box::new(FluidWallpaperApp::new(cc))),
    )
}
