use super::{copy_save, padded_rom, RAM_BANK_SIZE, ROM_BANK_SIZE};

/// Type-5 controller (codes 0x19-0x1E): up to 8 MiB ROM, 128 KiB RAM.
///
/// The ROM bank register is 9 bits wide, split across two write regions,
/// and bank 0 is addressable in the switchable window (no remap to 1).
pub(in super::super) struct Mbc5Cartridge {
    rom: Vec<u8>,
    ram: Vec<u8>,
    num_rom_banks: u16,
    rom_bank: u16,
    ram_bank: u8,
    ram_enable: bool,
    has_battery: bool,
}

impl Mbc5Cartridge {
    pub(super) fn new(rom: &[u8], has_battery: bool) -> Self {
        let rom = padded_rom(rom);
        let num_rom_banks = (rom.len() / ROM_BANK_SIZE) as u16;
        log::info!(
            "MBC5 cartridge, {} ROM banks, battery: {}",
            num_rom_banks,
            has_battery,
        );

        Self {
            rom,
            ram: vec![0; 16 * RAM_BANK_SIZE],
            num_rom_banks,
            rom_bank: 1,
            ram_bank: 0,
            ram_enable: false,
            has_battery,
        }
    }

    fn effective_rom_bank(&self) -> u16 {
        (self.rom_bank & 0x1FF) % self.num_rom_banks
    }

    fn check_bank_range(&self) {
        if self.rom_bank >= self.num_rom_banks {
            log::warn!(
                "ROM bank select {} out of range ({} banks), wrapping",
                self.rom_bank,
                self.num_rom_banks,
            );
        }
    }

    pub(super) fn rom_read(&self, addr: u16) -> u8 {
        let offset = if addr < 0x4000 {
            addr as usize
        } else {
            self.effective_rom_bank() as usize * ROM_BANK_SIZE + (addr & 0x3FFF) as usize
        };
        self.rom.get(offset).copied().unwrap_or(0xFF)
    }

    pub(super) fn rom_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enable = (value & 0x0F) == 0x0A,
            // ROM bank bits 7..0.
            0x2000..=0x2FFF => {
                self.rom_bank = (self.rom_bank & 0x100) | value as u16;
                self.check_bank_range();
            }
            // ROM bank bit 8.
            0x3000..=0x3FFF => {
                self.rom_bank = (self.rom_bank & 0x0FF) | (((value & 0x01) as u16) << 8);
                self.check_bank_range();
            }
            0x4000..=0x5FFF => self.ram_bank = value & 0x0F,
            _ => {}
        }
    }

    pub(super) fn ram_read(&self, addr: u16) -> u8 {
        if !self.ram_enable {
            return 0xFF;
        }
        let offset = self.ram_bank as usize * RAM_BANK_SIZE + (addr as usize - 0xA000);
        self.ram.get(offset).copied().unwrap_or(0xFF)
    }

    pub(super) fn ram_write(&mut self, addr: u16, value: u8) {
        if !self.ram_enable {
            return;
        }
        let offset = self.ram_bank as usize * RAM_BANK_SIZE + (addr as usize - 0xA000);
        if let Some(slot) = self.ram.get_mut(offset) {
            *slot = value;
        }
    }

    pub(super) fn rom_data(&self) -> &[u8] {
        &self.rom
    }

    pub(super) fn switchable_bank_base(&self) -> u32 {
        self.effective_rom_bank() as u32 * ROM_BANK_SIZE as u32
    }

    pub(super) fn has_battery(&self) -> bool {
        self.has_battery
    }

    pub(super) fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub(super) fn load_ram(&mut self, data: &[u8]) {
        copy_save(&mut self.ram, data);
    }
}
