//! Main GUI application

use crate::live::{self, StartResult};
use crate::state::{AppState, BusChoice};
use adxl345_rpm_monitor::{PlotEvent, SampleRecord};
use eframe::egui;
use egui_plot::{HLine, Legend, Line, LineStyle, Plot, PlotPoints, Points};
use std::path::PathBuf;

const RPM_COLOR: egui::Color32 = egui::Color32::from_rgb(100, 180, 255);
const VIBRATION_COLOR: egui::Color32 = egui::Color32::from_rgb(100, 255, 100);
const THRESHOLD_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 100, 100);

/// Main application struct
pub struct RpmGuiApp {
    state: AppState,
    /// Elapsed time the display froze at, while paused
    paused_at: Option<f64>,
}

impl RpmGuiApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        Self {
            state: AppState::default(),
            paused_at: None,
        }
    }

    /// Drain events from the sampling thread
    fn poll_events(&mut self) {
        let Some(handle) = &self.state.handle else {
            return;
        };

        // Check first so every event sent before exit is drained below
        let thread_done = handle.thread.as_ref().map_or(true, |t| t.is_finished());
        let events: Vec<PlotEvent> = handle.rx.try_iter().collect();

        let mut finished = thread_done;
        for event in events {
            match event {
                PlotEvent::Record(record) => self.state.history.push(record),
                PlotEvent::Alarm(alarm) => self.state.push_alarm(alarm),
                PlotEvent::Finished => finished = true,
            }
        }

        if finished {
            self.finish_run();
        }
    }

    /// Start a run with the sidebar settings
    fn start_run(&mut self) {
        self.state.error = None;

        self.state.config.output.csv_path = PathBuf::from(self.state.csv_path_text.trim());
        if let Err(e) = self.state.config.validate() {
            self.state.error = Some(e.to_string());
            return;
        }

        self.state.status = "Starting...".to_string();
        self.state.reset_run();
        self.paused_at = None;

        match live::start_monitor(self.state.config.clone(), self.state.bus.clone()) {
            StartResult::Success(handle) => {
                self.state.handle = Some(handle);
                self.state.status = "Running".to_string();
            }
            StartResult::Error(e) => {
                self.state.error = Some(e);
                self.state.status = "Start failed".to_string();
            }
        }
    }

    /// Ask the sampler to stop; the run is collected once it reports back
    fn stop_run(&mut self) {
        if let Some(handle) = &self.state.handle {
            handle.stop();
            self.state.status = "Stopping...".to_string();
        }
    }

    fn finish_run(&mut self) {
        let Some(handle) = self.state.handle.take() else {
            return;
        };

        match handle.join() {
            Ok(summary) => {
                self.state.status = format!(
                    "Stopped: {} records, {} alarms, {} failed reads",
                    summary.records, summary.alarms, summary.failed_ticks
                );
                self.state.last_summary = Some(summary);
            }
            Err(e) => {
                self.state.error = Some(e);
                self.state.status = "Run failed".to_string();
            }
        }
    }

    /// Render the top toolbar
    fn render_toolbar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("ADXL345 RPM Monitor");
                ui.separator();

                if self.state.is_running() {
                    if ui.button("⏹ Stop").clicked() {
                        self.stop_run();
                    }
                    ui.label("🟢 Running");
                } else if ui.button("▶ Start").clicked() {
                    self.start_run();
                }

                // Status on the right
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some(error) = &self.state.error {
                        ui.colored_label(egui::Color32::RED, error);
                    } else {
                        ui.label(&self.state.status);
                    }
                });
            });
        });
    }

    /// Render the left sidebar
    fn render_sidebar(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("sidebar")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| {
                let running = self.state.is_running();

                ui.heading("Settings");
                ui.add_enabled_ui(!running, |ui| {
                    let device = &mut self.state.config.device;
                    egui::Grid::new("settings").num_columns(2).show(ui, |ui| {
                        ui.label("Interval:");
                        ui.add(
                            egui::DragValue::new(&mut device.poll_interval_seconds)
                                .speed(0.01)
                                .range(0.001..=60.0)
                                .suffix(" s"),
                        );
                        ui.end_row();

                        ui.label("Threshold:");
                        ui.add(
                            egui::DragValue::new(&mut device.rpm_threshold)
                                .speed(10.0)
                                .range(1.0..=100_000.0)
                                .suffix(" RPM"),
                        );
                        ui.end_row();

                        ui.label("Factor:");
                        ui.add(
                            egui::DragValue::new(&mut device.conversion_factor)
                                .speed(1.0)
                                .range(0.001..=100_000.0)
                                .suffix(" RPM/g"),
                        );
                        ui.end_row();

                        ui.label("Sensitivity:");
                        ui.add(
                            egui::DragValue::new(&mut device.sensitivity_g_per_lsb)
                                .speed(0.0001)
                                .range(0.0001..=1.0)
                                .suffix(" g/LSB"),
                        );
                        ui.end_row();
                    });

                    ui.horizontal(|ui| {
                        ui.label("CSV:");
                        ui.text_edit_singleline(&mut self.state.csv_path_text);
                    });

                    ui.separator();
                    ui.heading("Bus");
                    self.render_bus_settings(ui);
                });
                ui.separator();

                ui.heading("Info");
                ui.label(format!("Records: {}", self.state.history.total_appended()));
                ui.label(format!("Alarms: {}", self.state.alarm_count));
                if let Some(handle) = &self.state.handle {
                    let dropped = handle.dropped_events();
                    if dropped > 0 {
                        ui.colored_label(egui::Color32::YELLOW, format!("Plot dropped: {}", dropped));
                    }
                }
                if let Some(record) = self.state.history.latest() {
                    ui.label(format!("Time: {:.1}s", record.elapsed_secs));
                    ui.label(format!("RPM: {:.1}", record.rpm));
                    ui.label(format!("Vibration: {:.4} g", record.vibration));
                }
                if let Some(summary) = &self.state.last_summary {
                    ui.label(format!("Rate: {:.1} Hz", summary.record_rate()));
                    if summary.log_failures > 0 {
                        ui.colored_label(
                            egui::Color32::YELLOW,
                            format!("Unlogged: {}", summary.log_failures),
                        );
                    }
                }
                ui.separator();

                ui.heading("Live View");
                ui.horizontal(|ui| {
                    ui.label("Window:");
                    ui.add(
                        egui::Slider::new(&mut self.state.time_window, 5.0..=300.0)
                            .suffix("s")
                            .logarithmic(true),
                    );
                });
                if ui.checkbox(&mut self.state.paused, "Pause display").changed() {
                    self.paused_at = if self.state.paused {
                        self.state.history.latest().map(|r| r.elapsed_secs)
                    } else {
                        None
                    };
                }
            });
    }

    fn render_bus_settings(&mut self, ui: &mut egui::Ui) {
        let choices = bus_choices();
        if choices.len() > 1 {
            ui.horizontal_wrapped(|ui| {
                for (label, choice) in choices {
                    let selected =
                        std::mem::discriminant(&self.state.bus) == std::mem::discriminant(&choice);
                    if ui.radio(selected, label).clicked() && !selected {
                        self.state.bus = choice;
                    }
                }
            });
        }

        match &mut self.state.bus {
            BusChoice::Simulated {
                frequency_hz,
                amplitude_g,
            } => {
                ui.horizontal(|ui| {
                    ui.label("Frequency:");
                    ui.add(
                        egui::DragValue::new(frequency_hz)
                            .speed(0.5)
                            .range(0.0..=500.0)
                            .suffix(" Hz"),
                    );
                });
                ui.horizontal(|ui| {
                    ui.label("Amplitude:");
                    ui.add(
                        egui::DragValue::new(amplitude_g)
                            .speed(0.05)
                            .range(0.0..=16.0)
                            .suffix(" g"),
                    );
                });
            }
            #[cfg(target_os = "linux")]
            BusChoice::LinuxI2c { device } => {
                ui.horizontal(|ui| {
                    ui.label("Device:");
                    ui.text_edit_singleline(device);
                });
            }
            #[cfg(feature = "ft232h")]
            BusChoice::Ft232h { channel } => {
                ui.horizontal(|ui| {
                    ui.label("Channel:");
                    ui.add(egui::DragValue::new(channel).range(0..=7));
                });
            }
        }
    }

    /// Render RPM and vibration plots
    fn render_plots(&self, ui: &mut egui::Ui) {
        let mut records: Vec<&SampleRecord> = self.state.history.window(self.state.time_window);
        if let Some(cutoff) = self.paused_at {
            records.retain(|r| r.elapsed_secs <= cutoff);
        }

        if records.is_empty() {
            ui.centered_and_justified(|ui| {
                if self.state.is_running() {
                    ui.label("Waiting for data...");
                } else {
                    ui.label("Click 'Start' to begin monitoring.");
                }
            });
            return;
        }

        if let Some(latest) = records.last() {
            ui.horizontal(|ui| {
                ui.label("Current:");
                ui.colored_label(RPM_COLOR, format!("RPM={:.1}", latest.rpm));
                ui.colored_label(VIBRATION_COLOR, format!("Vibration={:.4}g", latest.vibration));
                ui.label(latest.iso_timestamp());
            });
            ui.separator();
        }

        let threshold = self.state.config.device.rpm_threshold;
        let window_start = records.first().map(|r| r.elapsed_secs).unwrap_or(0.0);
        let available_height = ui.available_height();

        ui.label("RPM");
        let rpm_plot = Plot::new("live_rpm")
            .height(available_height * 0.5)
            .allow_zoom(false)
            .allow_drag(false)
            .include_y(0.0)
            .include_y(threshold * 1.1)
            .x_axis_label("Time (s)")
            .legend(Legend::default());

        rpm_plot.show(ui, |plot_ui| {
            let points: PlotPoints = records.iter().map(|r| [r.elapsed_secs, r.rpm]).collect();
            plot_ui.line(Line::new(points).name("RPM").color(RPM_COLOR).width(1.5));

            plot_ui.hline(
                HLine::new(threshold)
                    .name("Threshold")
                    .color(THRESHOLD_COLOR)
                    .style(LineStyle::dashed_dense()),
            );

            let alarms: PlotPoints = self
                .state
                .alarms
                .iter()
                .filter(|a| a.elapsed_secs >= window_start)
                .map(|a| [a.elapsed_secs, a.raw_rpm])
                .collect();
            plot_ui.points(
                Points::new(alarms)
                    .name("Over threshold")
                    .color(THRESHOLD_COLOR)
                    .radius(3.0),
            );
        });

        ui.add_space(5.0);

        ui.label("Vibration (g)");
        let vibration_plot = Plot::new("live_vibration")
            .height(available_height * 0.4)
            .allow_zoom(false)
            .allow_drag(false)
            .include_y(0.0)
            .x_axis_label("Time (s)")
            .legend(Legend::default());

        vibration_plot.show(ui, |plot_ui| {
            let points: PlotPoints = records
                .iter()
                .map(|r| [r.elapsed_secs, r.vibration])
                .collect();
            plot_ui.line(
                Line::new(points)
                    .name("Magnitude")
                    .color(VIBRATION_COLOR)
                    .width(1.5),
            );
        });
    }
}

/// Buses compiled into this build, with their default settings
fn bus_choices() -> Vec<(&'static str, BusChoice)> {
    #[allow(unused_mut)]
    let mut choices = vec![("Simulated", BusChoice::default())];
    #[cfg(target_os = "linux")]
    choices.push((
        "Linux I2C",
        BusChoice::LinuxI2c {
            device: adxl345_rpm_monitor::DEFAULT_I2C_DEVICE.to_string(),
        },
    ));
    #[cfg(feature = "ft232h")]
    choices.push(("FT232H", BusChoice::Ft232h { channel: 0 }));
    choices
}

impl eframe::App for RpmGuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_events();

        // Request repaint for live updates
        if self.state.is_running() {
            ctx.request_repaint_after(std::time::Duration::from_millis(50));
        }

        self.render_toolbar(ctx);
        self.render_sidebar(ctx);
        egui::CentralPanel::default().show(ctx, |ui| self.render_plots(ui));
    }
}

impl Drop for RpmGuiApp {
    fn drop(&mut self) {
        // Let the CSV log flush before the process exits
        if let Some(handle) = self.state.handle.take() {
            handle.stop();
            let _ = handle.join();
        }
    }
}
