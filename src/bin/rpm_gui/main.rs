//! ADXL345 RPM Monitor GUI
//!
//! Live RPM and vibration plots with the threshold drawn in, while every
//! record is appended to the CSV log.

mod app;
mod live;
mod state;

use app::RpmGuiApp;
use env_logger::{Builder, Env};
use std::io::Write;

fn main() -> eframe::Result<()> {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 750.0])
            .with_min_inner_size([800.0, 560.0]),
        ..Default::default()
    };

    eframe::run_native(
        "ADXL345 RPM Monitor",
        options,
        Box::new(|cc| Ok(Box::new(RpmGuiApp::new(cc)))),
    )
}
