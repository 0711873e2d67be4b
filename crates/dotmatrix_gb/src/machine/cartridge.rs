mod mbc1;
mod mbc3;
mod mbc5;
mod rom;

pub(super) use mbc1::Mbc1Cartridge;
pub(super) use mbc3::Mbc3Cartridge;
pub(super) use mbc5::Mbc5Cartridge;
pub(super) use rom::RomOnlyCartridge;

use thiserror::Error;

/// ROM bank granularity: the switchable window at 0x4000-0x7FFF is one bank.
pub(super) const ROM_BANK_SIZE: usize = 0x4000;
/// External RAM bank granularity.
pub(super) const RAM_BANK_SIZE: usize = 0x2000;

/// Errors reported when a cartridge image is rejected at load time.
///
/// Guest-visible banking mistakes (out-of-range bank selects and the like)
/// are not errors; they are logged and clamped.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("ROM image is {0} bytes, smaller than the 0x150-byte header")]
    RomTooSmall(usize),
    #[error("unsupported cartridge type code 0x{0:02X}")]
    UnsupportedMapper(u8),
}

/// Fields of the cartridge header the core consumes.
pub(super) struct Header {
    pub(super) title: String,
    pub(super) cart_type: u8,
    pub(super) rom_size_code: u8,
    pub(super) ram_size_code: u8,
}

impl Header {
    pub(super) fn parse(rom: &[u8]) -> Self {
        let title = rom[0x134..0x144]
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect();

        Self {
            title,
            cart_type: rom[0x147],
            rom_size_code: rom[0x148],
            ram_size_code: rom[0x149],
        }
    }

    pub(super) fn log(&self) {
        if !self.title.is_empty() {
            log::info!("ROM title: {}", self.title);
        }
        log::info!(
            "cartridge type 0x{:02X}, ROM {} KiB (code 0x{:02X}), RAM size code 0x{:02X}",
            self.cart_type,
            32u32 << self.rom_size_code,
            self.rom_size_code,
            self.ram_size_code,
        );
    }
}

/// Supported memory bank controllers, selected by header byte 0x0147.
///
/// The variant is chosen once at load time and stored by value on the bus.
pub(super) enum Cartridge {
    Rom(RomOnlyCartridge),
    Mbc1(Mbc1Cartridge),
    Mbc3(Mbc3Cartridge),
    Mbc5(Mbc5Cartridge),
}

impl Cartridge {
    pub(super) fn from_image(rom: &[u8]) -> Result<Self, LoadError> {
        if rom.len() < 0x150 {
            log::error!("ROM rejected: {} bytes is smaller than the header", rom.len());
            return Err(LoadError::RomTooSmall(rom.len()));
        }

        let header = Header::parse(rom);
        header.log();

        match header.cart_type {
            0x00 => Ok(Self::Rom(RomOnlyCartridge::new(rom))),
            0x01..=0x03 => Ok(Self::Mbc1(Mbc1Cartridge::new(rom, header.cart_type == 0x03))),
            0x0F..=0x13 => Ok(Self::Mbc3(Mbc3Cartridge::new(
                rom,
                matches!(header.cart_type, 0x0F | 0x10),
                matches!(header.cart_type, 0x0F | 0x10 | 0x13),
            ))),
            0x19..=0x1E => Ok(Self::Mbc5(Mbc5Cartridge::new(
                rom,
                matches!(header.cart_type, 0x1B | 0x1E),
            ))),
            code => {
                log::error!("unsupported cartridge type code 0x{:02X}", code);
                Err(LoadError::UnsupportedMapper(code))
            }
        }
    }

    /// Read a ROM byte at a CPU address in 0x0000-0x7FFF.
    pub(super) fn rom_read(&self, addr: u16) -> u8 {
        match self {
            Cartridge::Rom(c) => c.rom_read(addr),
            Cartridge::Mbc1(c) => c.rom_read(addr),
            Cartridge::Mbc3(c) => c.rom_read(addr),
            Cartridge::Mbc5(c) => c.rom_read(addr),
        }
    }

    /// Consume a write to 0x0000-0x7FFF as banking control.
    pub(super) fn rom_write(&mut self, addr: u16, value: u8) {
        match self {
            Cartridge::Rom(c) => c.rom_write(addr, value),
            Cartridge::Mbc1(c) => c.rom_write(addr, value),
            Cartridge::Mbc3(c) => c.rom_write(addr, value),
            Cartridge::Mbc5(c) => c.rom_write(addr, value),
        }
    }

    /// Read external RAM (or an RTC register) at a CPU address in
    /// 0xA000-0xBFFF.
    pub(super) fn ram_read(&self, addr: u16) -> u8 {
        match self {
            Cartridge::Rom(c) => c.ram_read(addr),
            Cartridge::Mbc1(c) => c.ram_read(addr),
            Cartridge::Mbc3(c) => c.ram_read(addr),
            Cartridge::Mbc5(c) => c.ram_read(addr),
        }
    }

    pub(super) fn ram_write(&mut self, addr: u16, value: u8) {
        match self {
            Cartridge::Rom(c) => c.ram_write(addr, value),
            Cartridge::Mbc1(c) => c.ram_write(addr, value),
            Cartridge::Mbc3(c) => c.ram_write(addr, value),
            Cartridge::Mbc5(c) => c.ram_write(addr, value),
        }
    }

    /// Direct byte access into the (bank-padded) ROM image. Used by the bus
    /// page tables, which precompute bank-relative offsets.
    pub(super) fn rom_byte(&self, offset: u32) -> u8 {
        let data = match self {
            Cartridge::Rom(c) => c.rom_data(),
            Cartridge::Mbc1(c) => c.rom_data(),
            Cartridge::Mbc3(c) => c.rom_data(),
            Cartridge::Mbc5(c) => c.rom_data(),
        };
        data.get(offset as usize).copied().unwrap_or(0xFF)
    }

    /// Byte offset into the ROM image of the bank currently mapped at
    /// 0x4000-0x7FFF.
    pub(super) fn switchable_bank_base(&self) -> u32 {
        match self {
            Cartridge::Rom(c) => c.switchable_bank_base(),
            Cartridge::Mbc1(c) => c.switchable_bank_base(),
            Cartridge::Mbc3(c) => c.switchable_bank_base(),
            Cartridge::Mbc5(c) => c.switchable_bank_base(),
        }
    }

    pub(super) fn has_battery(&self) -> bool {
        match self {
            Cartridge::Rom(_) => false,
            Cartridge::Mbc1(c) => c.has_battery(),
            Cartridge::Mbc3(c) => c.has_battery(),
            Cartridge::Mbc5(c) => c.has_battery(),
        }
    }

    /// Battery save blob: the raw external RAM array, plus RTC state for a
    /// clock-equipped MBC3. `None` for cartridges without battery backing.
    pub(super) fn battery_ram(&self) -> Option<Vec<u8>> {
        if !self.has_battery() {
            return None;
        }
        match self {
            Cartridge::Rom(_) => None,
            Cartridge::Mbc1(c) => Some(c.ram().to_vec()),
            Cartridge::Mbc3(c) => Some(c.battery_blob()),
            Cartridge::Mbc5(c) => Some(c.ram().to_vec()),
        }
    }

    /// Restore a previously saved battery blob. Oversized input is
    /// truncated, undersized input fills the RAM prefix.
    pub(super) fn load_battery_ram(&mut self, data: &[u8]) {
        match self {
            Cartridge::Rom(_) => {}
            Cartridge::Mbc1(c) => c.load_ram(data),
            Cartridge::Mbc3(c) => c.load_battery_blob(data),
            Cartridge::Mbc5(c) => c.load_ram(data),
        }
    }
}

/// Copy `data` into a buffer padded with 0xFF to a whole number of 16 KiB
/// banks (at least two), so bank arithmetic never indexes out of bounds.
pub(super) fn padded_rom(data: &[u8]) -> Vec<u8> {
    let banks = data.len().div_ceil(ROM_BANK_SIZE).max(2);
    let mut rom = vec![0xFF; banks * ROM_BANK_SIZE];
    rom[..data.len()].copy_from_slice(data);
    rom
}

/// Copy a save blob into a RAM array, tolerating size mismatches.
pub(super) fn copy_save(ram: &mut [u8], data: &[u8]) {
    let len = ram.len().min(data.len());
    ram[..len].copy_from_slice(&data[..len]);
    if data.len() != ram.len() {
        log::warn!(
            "battery save is {} bytes, RAM array is {}; loaded {}",
            data.len(),
            ram.len(),
            len,
        );
    }
}
