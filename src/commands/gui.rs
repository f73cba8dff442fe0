use std::path::PathBuf;

use crate::gui::app::App;

pub fn run(config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = super::load_config(config.as_deref())?;

    eframe::run_native(
        "Cortical Column",
        eframe::NativeOptions::default(),
        Box::new(|cc| Ok(Box::new(App::new(cc, config)))),
    )
    .map_err(|err| anyhow::anyhow!("gui exited with error: {err}"))?;
    Ok(())
}
