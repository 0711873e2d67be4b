use super::{padded_rom, ROM_BANK_SIZE};

/// Flat 32 KiB cartridge (type code 0x00): no banking, no RAM.
pub(in super::super) struct RomOnlyCartridge {
    rom: Vec<u8>,
}

impl RomOnlyCartridge {
    pub(super) fn new(rom: &[u8]) -> Self {
        log::info!("flat ROM cartridge, {} bytes", rom.len());
        Self {
            rom: padded_rom(rom),
        }
    }

    pub(super) fn rom_read(&self, addr: u16) -> u8 {
        self.rom.get(addr as usize).copied().unwrap_or(0xFF)
    }

    pub(super) fn rom_write(&mut self, addr: u16, value: u8) {
        // No banking registers; writes to the ROM range are discarded.
        log::trace!("discarded ROM write 0x{:02X} at 0x{:04X}", value, addr);
    }

    pub(super) fn ram_read(&self, _addr: u16) -> u8 {
        0xFF
    }

    pub(super) fn ram_write(&mut self, _addr: u16, _value: u8) {}

    pub(super) fn rom_data(&self) -> &[u8] {
        &self.rom
    }

    pub(super) fn switchable_bank_base(&self) -> u32 {
        ROM_BANK_SIZE as u32
    }
}
