use crate::cpu::Cpu;

use super::bus::Bus;
use super::cartridge::LoadError;
use super::CYCLES_PER_FRAME;

/// High-level Game Boy machine.
///
/// Owns the CPU core and the bus (which in turn owns every memory-mapped
/// component). This is the main entry point used by the `GameBoyApp`
/// wrapper and by tests.
pub struct GameBoy {
    pub cpu: Cpu,
    pub(crate) bus: Bus,
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}

impl GameBoy {
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            bus: Bus::new(),
        }
    }

    /// Load a cartridge image. The matching bank controller is created
    /// from the header; a bad image leaves the machine unchanged.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), LoadError> {
        self.bus.load_rom(rom)?;
        self.reset();
        Ok(())
    }

    /// Restore the post-boot state. The loaded cartridge is kept; only a
    /// new `load_rom` replaces it. Must not be called from inside
    /// `run_frame` (scheduler callbacks cannot re-enter the driver).
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.reset();
        log::info!("machine reset");
    }

    /// Execute one instruction and advance every clocked component by its
    /// T-cycle cost. Returns that cost.
    pub fn step(&mut self) -> u32 {
        let cycles = self.cpu.step(&mut self.bus);

        self.bus.step_video(cycles);
        self.bus.step_timer(cycles);
        self.bus.scheduler.advance(cycles as u64);
        self.bus.process_events();

        cycles
    }

    /// Run until one frame worth of T-cycles has elapsed.
    pub fn run_frame(&mut self) {
        let mut frame_cycles = 0u32;
        while frame_cycles < CYCLES_PER_FRAME {
            frame_cycles += self.step();
        }
    }

    /// Latch the driver's joypad vector (bit 0 Right .. bit 7 Start,
    /// 0 = pressed). A press edge also wakes the CPU from STOP.
    pub fn set_joypad_state(&mut self, state: u8) {
        if self.bus.set_joypad_state(state) {
            self.cpu.wake_from_stop();
        }
    }

    /// The 160x144 RGBA framebuffer, row-major.
    pub fn framebuffer(&self) -> &[u32] {
        self.bus.ppu.framebuffer()
    }

    pub fn is_frame_ready(&self) -> bool {
        self.bus.ppu.is_frame_ready()
    }

    pub fn clear_frame_ready(&mut self) {
        self.bus.ppu.clear_frame_ready()
    }

    /// Total elapsed T-cycles since reset.
    pub fn cycle_count(&self) -> u64 {
        self.bus.scheduler.current_cycle()
    }

    /// T-cycles until the next pending timed event fires, for drivers
    /// that batch work between events. `u64::MAX` when nothing is queued.
    pub fn cycles_to_next_event(&self) -> u64 {
        self.bus.scheduler.cycles_to_next()
    }

    /// Battery save blob for the loaded cartridge, if it has one.
    pub fn battery_ram(&self) -> Option<Vec<u8>> {
        self.bus.cartridge().and_then(|c| c.battery_ram())
    }

    pub fn load_battery_ram(&mut self, data: &[u8]) {
        if let Some(cartridge) = self.bus.cartridge_mut() {
            cartridge.load_battery_ram(data);
        }
    }
}
