use std::time::{SystemTime, UNIX_EPOCH};

use super::{copy_save, padded_rom, RAM_BANK_SIZE, ROM_BANK_SIZE};

/// Bytes appended to the RAM array in a battery blob when an RTC is fitted:
/// five latched registers plus the 64-bit base timestamp.
const RTC_BLOB_LEN: usize = 5 + 8;

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Real-time clock of clock-equipped Type-3 cartridges.
///
/// The live counter is represented as a wall-clock base timestamp; a
/// 0x00 -> 0x01 rising edge on the latch port snapshots the elapsed time
/// into the five read-visible registers. Register writes rebase the live
/// counter so the written values read back consistently.
pub(super) struct RealTimeClock {
    /// Wall-clock second at which the counter read zero.
    base_epoch: u64,
    halted: bool,
    seconds: u8,
    minutes: u8,
    hours: u8,
    day_low: u8,
    day_high: u8,
}

impl RealTimeClock {
    fn new() -> Self {
        Self {
            base_epoch: now_epoch(),
            halted: false,
            seconds: 0,
            minutes: 0,
            hours: 0,
            day_low: 0,
            day_high: 0,
        }
    }

    /// Snapshot the live counter into the read-visible registers.
    fn latch(&mut self) {
        if self.halted {
            return;
        }
        let elapsed = now_epoch().saturating_sub(self.base_epoch);
        let days = elapsed / 86_400;

        self.seconds = (elapsed % 60) as u8;
        self.minutes = (elapsed / 60 % 60) as u8;
        self.hours = (elapsed / 3_600 % 24) as u8;
        self.day_low = (days & 0xFF) as u8;
        self.day_high = (self.day_high & 0x40) | ((days >> 8) & 0x01) as u8;
        if days > 0x1FF {
            // Day counter carry sticks until software clears it.
            self.day_high |= 0x80;
        }
    }

    /// Registers 0x08-0x0C as selected through the RAM bank port.
    fn read(&self, reg: u8) -> u8 {
        match reg {
            0x08 => self.seconds,
            0x09 => self.minutes,
            0x0A => self.hours,
            0x0B => self.day_low,
            0x0C => self.day_high,
            _ => 0xFF,
        }
    }

    fn write(&mut self, reg: u8, value: u8) {
        match reg {
            0x08 => self.seconds = value & 0x3F,
            0x09 => self.minutes = value & 0x3F,
            0x0A => self.hours = value & 0x1F,
            0x0B => self.day_low = value,
            0x0C => {
                self.day_high = value & 0xC1;
                self.halted = (value & 0x40) != 0;
            }
            _ => return,
        }
        // Rebase the live counter so the written registers stay coherent
        // with future latches.
        let days = ((self.day_high & 0x01) as u64) << 8 | self.day_low as u64;
        let total = days * 86_400
            + self.hours as u64 * 3_600
            + self.minutes as u64 * 60
            + self.seconds as u64;
        self.base_epoch = now_epoch().saturating_sub(total);
    }

    fn to_blob(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[
            self.seconds,
            self.minutes,
            self.hours,
            self.day_low,
            self.day_high,
        ]);
        out.extend_from_slice(&self.base_epoch.to_le_bytes());
    }

    fn from_blob(&mut self, data: &[u8]) {
        if data.len() < RTC_BLOB_LEN {
            return;
        }
        self.seconds = data[0];
        self.minutes = data[1];
        self.hours = data[2];
        self.day_low = data[3];
        self.day_high = data[4];
        self.halted = (self.day_high & 0x40) != 0;
        let mut epoch = [0u8; 8];
        epoch.copy_from_slice(&data[5..13]);
        self.base_epoch = u64::from_le_bytes(epoch);
    }
}

/// Type-3 controller (codes 0x0F-0x13): up to 2 MiB ROM, 32 KiB RAM,
/// optional real-time clock.
pub(in super::super) struct Mbc3Cartridge {
    rom: Vec<u8>,
    ram: Vec<u8>,
    num_rom_banks: u16,
    rom_bank: u8,
    /// 0x00-0x03 select a RAM bank; 0x08-0x0C select an RTC register.
    ram_select: u8,
    ram_enable: bool,
    latch_byte: u8,
    rtc: Option<RealTimeClock>,
    has_battery: bool,
}

impl Mbc3Cartridge {
    pub(super) fn new(rom: &[u8], has_rtc: bool, has_battery: bool) -> Self {
        let rom = padded_rom(rom);
        let num_rom_banks = (rom.len() / ROM_BANK_SIZE) as u16;
        log::info!(
            "MBC3 cartridge, {} ROM banks, RTC: {}, battery: {}",
            num_rom_banks,
            has_rtc,
            has_battery,
        );

        Self {
            rom,
            ram: vec![0; 4 * RAM_BANK_SIZE],
            num_rom_banks,
            rom_bank: 1,
            ram_select: 0,
            ram_enable: false,
            latch_byte: 0xFF,
            rtc: has_rtc.then(RealTimeClock::new),
            has_battery,
        }
    }

    fn effective_rom_bank(&self) -> u16 {
        let mut bank = (self.rom_bank & 0x7F) as u16;
        if bank == 0 {
            bank = 1;
        }
        bank % self.num_rom_banks
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
            // Enables both RAM and the RTC register window.
            0x0000..=0x1FFF => self.ram_enable = (value & 0x0F) == 0x0A,
            0x2000..=0x3FFF => {
                self.rom_bank = value & 0x7F;
                if self.rom_bank == 0 {
                    self.rom_bank = 1;
                }
                if (self.rom_bank as u16) >= self.num_rom_banks {
                    log::warn!(
                        "ROM bank select {} out of range ({} banks), wrapping",
                        self.rom_bank,
                        self.num_rom_banks,
                    );
                }
            }
            0x4000..=0x5FFF => self.ram_select = value,
            0x6000..=0x7FFF => {
                // A 0x00 -> 0x01 edge latches the live clock.
                if self.latch_byte == 0x00 && value == 0x01 {
                    if let Some(rtc) = &mut self.rtc {
                        rtc.latch();
                    }
                }
                self.latch_byte = value;
            }
            _ => {}
        }
    }

    pub(super) fn ram_read(&self, addr: u16) -> u8 {
        if !self.ram_enable {
            return 0xFF;
        }
        match self.ram_select {
            0x00..=0x03 => {
                let offset =
                    self.ram_select as usize * RAM_BANK_SIZE + (addr as usize - 0xA000);
                self.ram.get(offset).copied().unwrap_or(0xFF)
            }
            0x08..=0x0C => match &self.rtc {
                Some(rtc) => rtc.read(self.ram_select),
                None => 0xFF,
            },
            _ => 0xFF,
        }
    }

    pub(super) fn ram_write(&mut self, addr: u16, value: u8) {
        if !self.ram_enable {
            return;
        }
        match self.ram_select {
            0x00..=0x03 => {
                let offset =
                    self.ram_select as usize * RAM_BANK_SIZE + (addr as usize - 0xA000);
                if let Some(slot) = self.ram.get_mut(offset) {
                    *slot = value;
                }
            }
            0x08..=0x0C => {
                if let Some(rtc) = &mut self.rtc {
                    rtc.write(self.ram_select, value);
                }
            }
            _ => {}
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

    /// RAM array, with RTC registers and base timestamp appended when a
    /// clock is fitted.
    pub(super) fn battery_blob(&self) -> Vec<u8> {
        let mut blob = self.ram.clone();
        if let Some(rtc) = &self.rtc {
            rtc.to_blob(&mut blob);
        }
        blob
    }

    pub(super) fn load_battery_blob(&mut self, data: &[u8]) {
        let ram_len = self.ram.len();
        if let Some(rtc) = &mut self.rtc {
            if data.len() >= ram_len + RTC_BLOB_LEN {
                rtc.from_blob(&data[ram_len..]);
            }
        }
        copy_save(&mut self.ram, &data[..data.len().min(ram_len)]);
    }
}
