use super::{copy_save, padded_rom, RAM_BANK_SIZE, ROM_BANK_SIZE};

/// Type-1 controller (codes 0x01-0x03): up to 2 MiB ROM, up to 32 KiB RAM.
///
/// The 5-bit primary register selects the switchable ROM bank (value 0 is
/// remapped to 1). The 2-bit secondary register supplies the upper ROM bank
/// bits, and doubles as the RAM bank select when the banking mode bit is 1;
/// in mode 0 the RAM is locked to bank 0.
pub(in super::super) struct Mbc1Cartridge {
    rom: Vec<u8>,
    ram: Vec<u8>,
    num_rom_banks: u16,
    rom_bank_low5: u8,
    bank_hi2: u8,
    ram_enable: bool,
    banking_mode: u8,
    has_battery: bool,
}

impl Mbc1Cartridge {
    pub(super) fn new(rom: &[u8], has_battery: bool) -> Self {
        let rom = padded_rom(rom);
        let num_rom_banks = (rom.len() / ROM_BANK_SIZE) as u16;
        log::info!(
            "MBC1 cartridge, {} ROM banks, battery: {}",
            num_rom_banks,
            has_battery,
        );

        Self {
            rom,
            ram: vec![0; 4 * RAM_BANK_SIZE],
            num_rom_banks,
            rom_bank_low5: 1,
            bank_hi2: 0,
            ram_enable: false,
            banking_mode: 0,
            has_battery,
        }
    }

    /// Effective switchable ROM bank: the 5-bit register (0 remapped to 1)
    /// plus the secondary register as bits 6..5, wrapped to the bank count.
    fn effective_rom_bank(&self) -> u16 {
        let mut bank = (self.rom_bank_low5 & 0x1F) as u16;
        if bank == 0 {
            bank = 1;
        }
        bank |= ((self.bank_hi2 & 0x03) as u16) << 5;
        bank % self.num_rom_banks
    }

    fn ram_bank(&self) -> u8 {
        if self.banking_mode == 1 {
            self.bank_hi2 & 0x03
        } else {
            0
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
            // RAM enable: low nibble 0xA enables, anything else disables.
            0x0000..=0x1FFF => self.ram_enable = (value & 0x0F) == 0x0A,
            0x2000..=0x3FFF => {
                self.rom_bank_low5 = value & 0x1F;
                if self.rom_bank_low5 == 0 {
                    self.rom_bank_low5 = 1;
                }
                if (self.rom_bank_low5 as u16) >= self.num_rom_banks {
                    log::warn!(
                        "ROM bank select {} out of range ({} banks), wrapping",
                        self.rom_bank_low5,
                        self.num_rom_banks,
                    );
                }
            }
            0x4000..=0x5FFF => self.bank_hi2 = value & 0x03,
            0x6000..=0x7FFF => self.banking_mode = value & 0x01,
            _ => {}
        }
    }

    pub(super) fn ram_read(&self, addr: u16) -> u8 {
        if !self.ram_enable {
            return 0xFF;
        }
        let offset = self.ram_bank() as usize * RAM_BANK_SIZE + (addr as usize - 0xA000);
        self.ram.get(offset).copied().unwrap_or(0xFF)
    }

    pub(super) fn ram_write(&mut self, addr: u16, value: u8) {
        if !self.ram_enable {
            return;
        }
        let offset = self.ram_bank() as usize * RAM_BANK_SIZE + (addr as usize - 0xA000);
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
