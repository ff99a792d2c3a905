// GUI-subsystem binary: no console window is ever allocated by Windows.
// In CLI mode (--input/-i flag present) AttachConsole(ATTACH_PARENT_PROCESS)
// reconnects to the launching terminal so println!/eprintln! are visible.
#![windows_subsystem = "windows"]

use std::path::PathBuf;

use eframe::egui;
use photoedit::app::PhotoEditApp;
use photoedit::{cli, logger};

fn main() -> Result<(), eframe::Error> {
    #[cfg(target_os = "windows")]
    if cli::CliArgs::is_cli_mode() {
        unsafe extern "system" {
            fn AttachConsole(dwProcessId: u32) -> i32;
        }
        const ATTACH_PARENT_PROCESS: u32 = 0xFFFF_FFFF;
        unsafe {
            AttachConsole(ATTACH_PARENT_PROCESS);
        }
    }

    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS { 0 } else { 1 });
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    // `photoedit <image>` opens that image on the first frame
    let startup_file = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .filter(|p| p.is_file());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([900.0, 600.0])
            .with_drag_and_drop(true)
            .with_title("PhotoEdit"),
        ..Default::default()
    };

    eframe::run_native(
        "PhotoEdit",
        options,
        Box::new(move |cc| Box::new(PhotoEditApp::new(cc, startup_file))),
    )
}
