use cortical_column::neuro::recorder::{INPUT_SERIES, Trace};
use cortical_column::neuro::stimuli::{StimulusMode, StimulusSpec};
use cortical_column::{Simulation, SimulationConfig, StateVar};
use egui::{Color32, CursorIcon, UiBuilder};
use egui_plot::{Line, Plot, PlotPoints};

/// Samples kept on screen.
const HISTORY_LEN: usize = 20_000;
const MANUAL_PULSE_ID: u64 = u64::MAX;

pub struct App {
    config: SimulationConfig,
    simulation: Option<Simulation>,
    running: bool,
    steps_per_frame: u32,

    pulse_amplitude: f64,
    pulse_duration: f64,

    params_dirty: bool,
    status: Option<String>,

    sim_split: f32,
}

impl App {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: SimulationConfig) -> Self {
        let mut app = Self {
            config,
            simulation: None,
            running: false,
            steps_per_frame: 10,

            pulse_amplitude: 2.0,
            pulse_duration: 50.0,

            params_dirty: false,
            status: None,

            sim_split: 0.55,
        };

        for var in [StateVar::Vp, StateVar::Vi, StateVar::Na] {
            if !app.config.record.vars.contains(&var) {
                app.config.record.vars.push(var);
            }
        }
        app.config.record.record_input = true;

        app.rebuild();

        app
    }

    fn rebuild(&mut self) {
        match Simulation::from_config(&self.config) {
            Ok(simulation) => {
                self.simulation = Some(simulation);
                self.params_dirty = false;
                self.status = None;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to build simulation");
                self.status = Some(err.to_string());
                self.simulation = None;
                self.running = false;
            }
        }
    }

    fn fire_pulse(&mut self) {
        let Some(simulation) = self.simulation.as_mut() else {
            return;
        };
        let spec = StimulusSpec {
            mode: StimulusMode::ManualPulse {
                amplitude: self.pulse_amplitude,
                duration: self.pulse_duration,
            },
            enabled: true,
        };
        let tick = simulation.tick();
        simulation.stimuli.fire(MANUAL_PULSE_ID, &spec, tick);
    }

    fn advance(&mut self) {
        let Some(simulation) = self.simulation.as_mut() else {
            return;
        };
        for _ in 0..self.steps_per_frame {
            if let Err(err) = simulation.step() {
                self.status = Some(err.to_string());
                self.running = false;
                break;
            }
        }
        simulation.recorder.truncate_front(HISTORY_LEN);
    }
}

fn series_points(trace: &Trace, name: &str) -> Option<Vec<[f64; 2]>> {
    let values = trace.get(name)?;
    Some(
        trace
            .time_ms
            .iter()
            .zip(values)
            .map(|(&t, &v)| [t, v])
            .collect(),
    )
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        if self.running {
            self.advance();
            ctx.request_repaint();
        }

        egui::SidePanel::left("controls").show(ctx, |ui| {
            ui.heading("Simulation");

            if self.running {
                if ui.button("Pause").clicked() {
                    self.running = false;
                }
            } else if ui.button("Start").clicked() {
                if self.params_dirty || self.simulation.is_none() {
                    self.rebuild();
                }
                self.running = self.simulation.is_some();
            }

            if ui.button("Reset").clicked() {
                self.rebuild();
            }

            ui.add(
                egui::DragValue::new(&mut self.steps_per_frame)
                    .range(1..=1000)
                    .prefix("steps/frame "),
            );

            if let Some(simulation) = &self.simulation {
                ui.label(format!("t = {:.1} ms", simulation.time_ms()));
            }

            ui.separator();
            ui.heading("Stimulus");

            ui.add(
                egui::DragValue::new(&mut self.pulse_amplitude)
                    .speed(0.1)
                    .prefix("amp "),
            );
            ui.add(
                egui::DragValue::new(&mut self.pulse_duration)
                    .speed(1.0)
                    .range(0.1..=10_000.0)
                    .prefix("ms "),
            );
            if ui.button("Fire pulse").clicked() {
                self.fire_pulse();
            }

            ui.separator();
            ui.heading("Parameters");

            let params = &mut self.config.params;
            let mut changed = false;
            changed |= ui
                .add(
                    egui::DragValue::new(&mut params.sigma_p)
                        .speed(0.05)
                        .range(0.1..=20.0)
                        .prefix("σp "),
                )
                .changed();
            changed |= ui
                .add(
                    egui::DragValue::new(&mut params.g_kna)
                        .speed(0.01)
                        .range(0.0..=10.0)
                        .prefix("gKNa "),
                )
                .changed();
            changed |= ui
                .add(
                    egui::DragValue::new(&mut params.dphi)
                        .speed(0.05)
                        .range(0.0..=20.0)
                        .prefix("dphi "),
                )
                .changed();
            if changed {
                self.params_dirty = true;
            }
            if self.params_dirty {
                ui.label("Reset to apply parameter changes.");
            }

            if let Some(status) = &self.status {
                ui.separator();
                ui.colored_label(Color32::from_rgb(220, 20, 60), status);
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Cortical Column");

            let total = ui.available_size();
            let handle_h = 12.0;
            let min_section = 80.0;

            let (full_rect, _) = ui.allocate_exact_size(total, egui::Sense::hover());
            let usable_height = (full_rect.height() - handle_h).max(min_section * 2.0);

            let mut top_height =
                (usable_height * self.sim_split).clamp(min_section, usable_height - min_section);
            self.sim_split = top_height / usable_height;

            let rects_for = |top: f32| {
                let top_rect =
                    egui::Rect::from_min_size(full_rect.min, egui::vec2(full_rect.width(), top));
                let handle_rect = egui::Rect::from_min_max(
                    top_rect.left_bottom(),
                    top_rect.left_bottom() + egui::vec2(full_rect.width(), handle_h),
                );
                let bottom_rect = egui::Rect::from_min_size(
                    handle_rect.left_bottom(),
                    egui::vec2(full_rect.width(), usable_height - top),
                );
                (top_rect, handle_rect, bottom_rect)
            };

            let (mut top_rect, mut handle_rect, mut bottom_rect) = rects_for(top_height);

            let handle_id = ui.id().with("sim_splitter");
            let handle = ui.interact(handle_rect, handle_id, egui::Sense::click_and_drag());
            if handle.dragged() {
                let delta = ui.input(|i| i.pointer.delta().y);
                if delta.abs() > f32::EPSILON {
                    let new_top =
                        (top_height + delta).clamp(min_section, usable_height - min_section);
                    if (new_top - top_height).abs() > f32::EPSILON {
                        self.sim_split = new_top / usable_height;
                        top_height = new_top;
                        (top_rect, handle_rect, bottom_rect) = rects_for(top_height);
                        ui.ctx().request_repaint();
                    }
                }
            }
            let stroke_color = ui.visuals().widgets.inactive.fg_stroke.color;
            let fill = ui.visuals().widgets.inactive.bg_fill.linear_multiply(0.4);
            ui.painter().rect_filled(handle_rect, 2.0, fill);
            ui.painter().hline(
                handle_rect.x_range(),
                handle_rect.center().y,
                egui::Stroke::new(2.0, stroke_color),
            );
            if handle.hovered() {
                ui.output_mut(|o| o.cursor_icon = CursorIcon::ResizeVertical);
            }

            let Some(simulation) = &self.simulation else {
                return;
            };
            let trace = simulation.trace();

            ui.scope_builder(UiBuilder::new().max_rect(top_rect), |ui| {
                ui.set_min_size(top_rect.size());
                let plot = Plot::new("membrane_plot")
                    .height(top_rect.height())
                    .include_y(-70.0)
                    .include_y(-45.0);

                plot.show(ui, |plot_ui| {
                    let lines = [
                        (StateVar::Vp.name(), Color32::from_rgb(100, 149, 237)),
                        (StateVar::Vi.name(), Color32::from_rgb(220, 20, 60)),
                    ];
                    for (name, color) in lines {
                        if let Some(points) = series_points(trace, name) {
                            plot_ui.line(
                                Line::new(name, PlotPoints::from(points)).color(color),
                            );
                        }
                    }
                });
            });

            ui.scope_builder(UiBuilder::new().max_rect(bottom_rect), |ui| {
                ui.set_min_size(bottom_rect.size());
                let plot = Plot::new("sodium_plot")
                    .height(bottom_rect.height())
                    .include_y(0.0);

                plot.show(ui, |plot_ui| {
                    let lines = [
                        (StateVar::Na.name(), Color32::from_rgb(50, 205, 50)),
                        (INPUT_SERIES, Color32::from_rgb(255, 165, 0)),
                    ];
                    for (name, color) in lines {
                        if let Some(points) = series_points(trace, name) {
                            plot_ui.line(
                                Line::new(name, PlotPoints::from(points)).color(color),
                            );
                        }
                    }
                });
            });
        });
    }
}
