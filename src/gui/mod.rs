//! Desktop front end: a handwriting form with preview and an assistant panel
//! that streams text from the local model server.

mod app;

use eframe::NativeOptions;

pub use app::HandscriptApp;

pub fn run() -> eframe::Result<()> {
    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_title("handscript"),
        ..Default::default()
    };

    eframe::run_native(
        "handscript",
        options,
        Box::new(|cc| Ok(Box::new(HandscriptApp::new(cc)?))),
    )
}
