#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod session;

use clap::Parser;

use session::SessionLimits;

/// Measure your clicks per second across click styles.
#[derive(Parser, Debug)]
#[command(name = "cps_tester", version)]
struct Cli {
    /// Seconds of inactivity that ends a run
    #[arg(long, default_value_t = 2.0)]
    idle_timeout: f32,

    /// Score over a fixed window of this many seconds instead of waiting for idle
    #[arg(long)]
    window: Option<f32>,
}

impl Cli {
    fn limits(&self) -> SessionLimits {
        SessionLimits::from_secs(self.idle_timeout, self.window)
    }
}

fn main() -> eframe::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let limits = cli.limits();
    log::info!("starting with {:?}", limits);

    let mut opts = eframe::NativeOptions::default();
    opts.viewport.inner_size = Some(egui::vec2(800.0, 600.0));
    opts.viewport.resizable = Some(true);
    opts.follow_system_theme = false;

    eframe::run_native(
        "CPS Tester",
        opts,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
            Box::new(app::CpsApp::new(limits))
        }),
    )
}
