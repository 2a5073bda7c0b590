fn main() -> eframe::Result<()> {
    let verbose = std::env::var_os("HANDSCRIPT_VERBOSE").is_some();
    if let Err(err) = handscript::logging::init(verbose) {
        eprintln!("warning: failed to initialise logging: {:#}", err);
    }
    handscript::gui::run()
}
