use std::path::PathBuf;

use dotmatrix_common::app::App;
use dotmatrix_common::key::Key;

use crate::{GameBoy, SCREEN_HEIGHT, SCREEN_SCALE, SCREEN_WIDTH};

/// SDL-facing application wrapper for the Game Boy machine.
///
/// Runs one emulated frame per host frame, converts the RGBA framebuffer
/// to the RGB24 buffer the runner uploads, and owns the keyboard-to-joypad
/// mapping plus battery-save persistence.
pub struct GameBoyApp {
    pub gb: GameBoy,
    should_exit: bool,
    /// Driver-side joypad vector, 0 = pressed.
    joypad_state: u8,
    save_path: Option<PathBuf>,
    frame_counter: u64,
}

impl Default for GameBoyApp {
    fn default() -> Self {
        Self {
            gb: GameBoy::new(),
            should_exit: false,
            joypad_state: 0xFF,
            save_path: None,
            frame_counter: 0,
        }
    }
}

impl GameBoyApp {
    /// Persist battery RAM to `path` on exit, loading any existing save
    /// now.
    pub fn attach_save_file(&mut self, path: PathBuf) {
        match std::fs::read(&path) {
            Ok(data) => {
                log::info!("loaded battery save {} ({} bytes)", path.display(), data.len());
                self.gb.load_battery_ram(&data);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => log::warn!("failed to read battery save {}: {}", path.display(), err),
        }
        self.save_path = Some(path);
    }

    fn flush_battery_save(&self) {
        let Some(path) = &self.save_path else {
            return;
        };
        let Some(ram) = self.gb.battery_ram() else {
            return;
        };
        match std::fs::write(path, &ram) {
            Ok(()) => log::info!("wrote battery save {} ({} bytes)", path.display(), ram.len()),
            Err(err) => log::error!("failed to write battery save {}: {}", path.display(), err),
        }
    }

    fn set_joypad_bit(&mut self, bit: u8, pressed: bool) {
        if pressed {
            self.joypad_state &= !(1 << bit);
        } else {
            self.joypad_state |= 1 << bit;
        }
        self.gb.set_joypad_state(self.joypad_state);
    }
}

impl App for GameBoyApp {
    fn init(&mut self) {
        log::info!("Game Boy init");
    }

    fn update(&mut self, screen: &mut [u8]) {
        self.gb.set_joypad_state(self.joypad_state);
        self.gb.run_frame();
        self.gb.clear_frame_ready();

        self.frame_counter = self.frame_counter.wrapping_add(1);
        if self.frame_counter % 600 == 0 {
            let regs = &self.gb.cpu.regs;
            log::debug!(
                "frame={} pc=0x{:04X} sp=0x{:04X} af=0x{:04X} ly={} mode={:?} ime={} halted={} stopped={}",
                self.frame_counter,
                regs.pc,
                regs.sp,
                regs.af(),
                self.gb.bus.ppu.ly(),
                self.gb.bus.ppu.mode(),
                self.gb.cpu.ime,
                self.gb.cpu.halted,
                self.gb.cpu.is_stopped(),
            );
        }

        // RGBA (0xAARRGGBB) to packed RGB24.
        for (pixel, out) in self.gb.framebuffer().iter().zip(screen.chunks_exact_mut(3)) {
            out[0] = (pixel >> 16) as u8;
            out[1] = (pixel >> 8) as u8;
            out[2] = *pixel as u8;
        }
    }

    fn handle_key_event(&mut self, key: Key, is_down: bool) {
        match key {
            // D-pad.
            Key::Right => self.set_joypad_bit(0, is_down),
            Key::Left => self.set_joypad_bit(1, is_down),
            Key::Up => self.set_joypad_bit(2, is_down),
            Key::Down => self.set_joypad_bit(3, is_down),
            // Face and system buttons: Z => A, X => B, A => Select,
            // S => Start.
            Key::Z => self.set_joypad_bit(4, is_down),
            Key::X => self.set_joypad_bit(5, is_down),
            Key::A => self.set_joypad_bit(6, is_down),
            Key::S => self.set_joypad_bit(7, is_down),
            Key::Escape if is_down => self.should_exit = true,
            _ => {}
        }
    }

    fn should_exit(&self) -> bool {
        self.should_exit
    }

    fn exit(&mut self) {
        self.flush_battery_save();
        log::info!("Game Boy exit");
    }

    fn width(&self) -> u32 {
        SCREEN_WIDTH as u32
    }

    fn height(&self) -> u32 {
        SCREEN_HEIGHT as u32
    }

    fn scale(&self) -> u32 {
        SCREEN_SCALE
    }

    fn title(&self) -> String {
        "dotmatrix".to_string()
    }
}
