use std::path::Path;

use anyhow::{Context, Result};
use dotmatrix_common::app::App;
use dotmatrix_gb::GameBoyApp;
use dotmatrix_sdl2::{SdlContext, SdlInitInfo};

/// Load a cartridge image, wire up its battery save and run the SDL
/// window loop until exit.
pub fn run(rom_path: &str) -> Result<()> {
    let rom = std::fs::read(rom_path).with_context(|| format!("failed to read {rom_path}"))?;

    let mut app = GameBoyApp::default();
    app.gb
        .load_rom(&rom)
        .with_context(|| format!("failed to load {rom_path}"))?;
    app.attach_save_file(Path::new(rom_path).with_extension("sav"));

    let init_info = SdlInitInfo::builder()
        .width(app.width())
        .height(app.height())
        .scale(app.scale())
        .title(app.title())
        .build();
    SdlContext::run(init_info, app)?;
    Ok(())
}
