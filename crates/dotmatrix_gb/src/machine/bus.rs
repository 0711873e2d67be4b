use super::cartridge::{Cartridge, LoadError};
use super::joypad::Joypad;
use super::ppu::Ppu;
use super::scheduler::{EventKind, Scheduler};
use super::timer::Timer;

const WRAM_SIZE: usize = 0x2000;
const VRAM_SIZE: usize = 0x2000;
const OAM_SIZE: usize = 160;
const HRAM_SIZE: usize = 127;
const IO_SIZE: usize = 128;

/// The 64 KiB space is split into 256 pages of 256 bytes for the
/// fast-path lookup tables.
const PAGE_SIZE: usize = 256;
const PAGE_COUNT: usize = 256;

/// Offset of IF within the I/O buffer.
const IF_OFFSET: usize = 0x0F;

/// An OAM DMA transfer occupies the external bus for 160 M-cycles.
const DMA_CYCLES: u64 = 640;

/// One serial transfer is 8 bits at 8192 Hz: 4096 T-cycles.
const SERIAL_CYCLES: u64 = 4_096;

/// Page-table entry: where a 256-byte page of the address space lives.
/// `Absent` routes the access through the slow-path range dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Absent,
    /// Offset into work RAM (also used for the echo region).
    Wram(u16),
    /// Offset into video RAM.
    Vram(u16),
    /// Offset into the cartridge ROM image; present in the read table only,
    /// so ROM writes fall through to the banking registers.
    Rom(u32),
}

/// Handler tag for one I/O register. The default `Buffer` policy reads and
/// writes the backing byte; every other tag dispatches to the owning
/// component with direct field access, so no shared aliasing or reentrancy
/// is possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoHandler {
    Buffer,
    Joypad,
    SerialCtrl,
    TimerDiv,
    TimerCounter,
    TimerModulo,
    TimerCtrl,
    InterruptFlag,
    Ppu,
    OamDma,
}

/// The memory bus: 64 KiB address space with page-table fast paths, the
/// I/O register file, and ownership of every memory-mapped component.
pub(crate) struct Bus {
    wram: [u8; WRAM_SIZE],
    vram: [u8; VRAM_SIZE],
    oam: [u8; OAM_SIZE],
    hram: [u8; HRAM_SIZE],
    io: [u8; IO_SIZE],
    ie_reg: u8,

    read_pages: [Page; PAGE_COUNT],
    write_pages: [Page; PAGE_COUNT],
    io_handlers: [IoHandler; IO_SIZE],

    cartridge: Option<Cartridge>,
    pub(crate) ppu: Ppu,
    timer: Timer,
    joypad: Joypad,
    pub(super) scheduler: Scheduler,

    /// True while an OAM DMA transfer occupies the external bus; CPU
    /// accesses outside the I/O page and HRAM see 0xFF until it completes.
    dma_active: bool,
}

impl Bus {
    pub(super) fn new() -> Self {
        let mut bus = Self {
            wram: [0; WRAM_SIZE],
            vram: [0; VRAM_SIZE],
            oam: [0; OAM_SIZE],
            hram: [0; HRAM_SIZE],
            io: [0; IO_SIZE],
            ie_reg: 0,
            read_pages: [Page::Absent; PAGE_COUNT],
            write_pages: [Page::Absent; PAGE_COUNT],
            io_handlers: [IoHandler::Buffer; IO_SIZE],
            cartridge: None,
            ppu: Ppu::new(),
            timer: Timer::new(),
            joypad: Joypad::new(),
            scheduler: Scheduler::new(),
            dma_active: false,
        };
        bus.register_io_handlers();
        bus.seed_page_tables();
        bus.apply_initial_io_state();
        bus
    }

    /// Reset memory and components to the post-boot state. The cartridge
    /// survives (it is recreated on ROM load, not on reset).
    pub(super) fn reset(&mut self) {
        self.wram.fill(0);
        self.vram.fill(0);
        self.oam.fill(0);
        self.hram.fill(0);
        self.io.fill(0);
        self.ie_reg = 0;
        self.dma_active = false;

        self.ppu.reset();
        self.timer.reset();
        self.joypad = Joypad::new();
        self.scheduler.reset();

        self.seed_page_tables();
        self.apply_initial_io_state();

        log::debug!("bus reset");
    }

    /// Parse the header, build the matching cartridge controller and map
    /// its ROM into the read page table.
    pub(super) fn load_rom(&mut self, rom: &[u8]) -> Result<(), LoadError> {
        let cartridge = Cartridge::from_image(rom)?;
        self.cartridge = Some(cartridge);
        self.seed_page_tables();
        Ok(())
    }

    pub(super) fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    pub(super) fn cartridge_mut(&mut self) -> Option<&mut Cartridge> {
        self.cartridge.as_mut()
    }

    /// Route each special I/O register to its owning component. Everything
    /// not listed keeps the default buffer policy.
    fn register_io_handlers(&mut self) {
        self.register_io_handler(0xFF00, IoHandler::Joypad);
        self.register_io_handler(0xFF02, IoHandler::SerialCtrl);
        self.register_io_handler(0xFF04, IoHandler::TimerDiv);
        self.register_io_handler(0xFF05, IoHandler::TimerCounter);
        self.register_io_handler(0xFF06, IoHandler::TimerModulo);
        self.register_io_handler(0xFF07, IoHandler::TimerCtrl);
        self.register_io_handler(0xFF0F, IoHandler::InterruptFlag);
        for addr in 0xFF40..=0xFF45 {
            self.register_io_handler(addr, IoHandler::Ppu);
        }
        self.register_io_handler(0xFF46, IoHandler::OamDma);
        for addr in 0xFF47..=0xFF4B {
            self.register_io_handler(addr, IoHandler::Ppu);
        }
    }

    fn register_io_handler(&mut self, addr: u16, handler: IoHandler) {
        if !(0xFF00..=0xFF7F).contains(&addr) {
            log::warn!("ignored I/O handler registration for 0x{:04X}", addr);
            return;
        }
        self.io_handlers[(addr - 0xFF00) as usize] = handler;
    }

    /// Populate the fast-path tables: VRAM, WRAM and the echo region on
    /// both tables; cartridge ROM on the read table only.
    fn seed_page_tables(&mut self) {
        self.read_pages = [Page::Absent; PAGE_COUNT];
        self.write_pages = [Page::Absent; PAGE_COUNT];

        // VRAM 0x8000-0x9FFF.
        for i in 0..(VRAM_SIZE / PAGE_SIZE) {
            let page = 0x80 + i;
            self.read_pages[page] = Page::Vram((i * PAGE_SIZE) as u16);
            self.write_pages[page] = Page::Vram((i * PAGE_SIZE) as u16);
        }

        // WRAM 0xC000-0xDFFF.
        for i in 0..(WRAM_SIZE / PAGE_SIZE) {
            let page = 0xC0 + i;
            self.read_pages[page] = Page::Wram((i * PAGE_SIZE) as u16);
            self.write_pages[page] = Page::Wram((i * PAGE_SIZE) as u16);
        }

        // Echo RAM 0xE000-0xFDFF mirrors the first 0x1E00 bytes of WRAM.
        for i in 0..0x1E {
            let page = 0xE0 + i;
            self.read_pages[page] = Page::Wram((i * PAGE_SIZE) as u16);
            self.write_pages[page] = Page::Wram((i * PAGE_SIZE) as u16);
        }

        self.remap_rom_pages();

        log::trace!("page tables seeded");
    }

    /// Refresh the ROM read pages after a banking change. Bank 0 is fixed
    /// at 0x0000-0x3FFF; the switchable window base comes from the
    /// cartridge controller.
    fn remap_rom_pages(&mut self) {
        let Some(cartridge) = &self.cartridge else {
            for page in 0x00..0x80 {
                self.read_pages[page] = Page::Absent;
            }
            return;
        };

        for page in 0x00..0x40usize {
            self.read_pages[page] = Page::Rom((page * PAGE_SIZE) as u32);
        }
        let bank_base = cartridge.switchable_bank_base();
        for page in 0x40..0x80usize {
            self.read_pages[page] = Page::Rom(bank_base + ((page - 0x40) * PAGE_SIZE) as u32);
        }
    }

    /// Post-boot I/O register contents visible to software. Registers with
    /// component handlers hold their state in the component instead.
    fn apply_initial_io_state(&mut self) {
        // Serial: no transfer in progress.
        self.io[0x01] = 0x00;
        self.io[0x02] = 0x7E;

        // VBlank is already pending when control reaches 0x0100.
        self.io[IF_OFFSET] = 0x01;

        // APU register file as left by the boot ROM. The audio unit itself
        // is not emulated, but software reads these back.
        self.io[0x10] = 0x80;
        self.io[0x11] = 0xBF;
        self.io[0x12] = 0xF3;
        self.io[0x13] = 0xFF;
        self.io[0x14] = 0xBF;
        self.io[0x16] = 0x3F;
        self.io[0x17] = 0x00;
        self.io[0x18] = 0xFF;
        self.io[0x19] = 0xBF;
        self.io[0x1A] = 0x7F;
        self.io[0x1B] = 0xFF;
        self.io[0x1C] = 0x9F;
        self.io[0x1D] = 0xFF;
        self.io[0x1E] = 0xBF;
        self.io[0x20] = 0xFF;
        self.io[0x21] = 0x00;
        self.io[0x22] = 0x00;
        self.io[0x23] = 0xBF;
        self.io[0x24] = 0x77;
        self.io[0x25] = 0xF3;
        self.io[0x26] = 0xF1;

        // DMA source as left by the boot ROM.
        self.io[0x46] = 0xFF;
    }

    /// OR a mask into IF directly, bypassing I/O handler dispatch.
    pub(super) fn request_interrupt(&mut self, mask: u8) {
        self.io[IF_OFFSET] |= mask;
        log::trace!("interrupt requested 0x{:02X}, IF=0x{:02X}", mask, self.io[IF_OFFSET]);
    }

    pub(crate) fn read8(&mut self, addr: u16) -> u8 {
        // During OAM DMA the CPU only reaches the register file, HRAM and
        // IE; everything below reads back 0xFF.
        if self.dma_active && addr < 0xFF00 {
            return 0xFF;
        }
        self.read8_internal(addr)
    }

    pub(crate) fn write8(&mut self, addr: u16, value: u8) {
        if self.dma_active && addr < 0xFF00 {
            return;
        }
        self.write8_internal(addr, value);
    }

    fn read8_internal(&mut self, addr: u16) -> u8 {
        let offset = addr as usize % PAGE_SIZE;
        match self.read_pages[addr as usize / PAGE_SIZE] {
            Page::Wram(base) => self.wram[base as usize + offset],
            Page::Vram(base) => self.vram[base as usize + offset],
            Page::Rom(base) => match &self.cartridge {
                Some(cartridge) => cartridge.rom_byte(base + offset as u32),
                None => 0xFF,
            },
            Page::Absent => self.read_slow(addr),
        }
    }

    fn write8_internal(&mut self, addr: u16, value: u8) {
        let offset = addr as usize % PAGE_SIZE;
        match self.write_pages[addr as usize / PAGE_SIZE] {
            Page::Wram(base) => self.wram[base as usize + offset] = value,
            Page::Vram(base) => self.vram[base as usize + offset] = value,
            // ROM pages are never present in the write table.
            Page::Rom(_) => unreachable!("ROM page in write table"),
            Page::Absent => self.write_slow(addr, value),
        }
    }

    /// Slow-path read dispatch for everything the page tables do not cover.
    fn read_slow(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => match &self.cartridge {
                Some(cartridge) => cartridge.rom_read(addr),
                None => {
                    log::warn!("read from ROM address 0x{:04X} with no ROM loaded", addr);
                    0xFF
                }
            },
            0x8000..=0x9FFF => self.vram[(addr - 0x8000) as usize],
            0xA000..=0xBFFF => match &self.cartridge {
                Some(cartridge) => cartridge.ram_read(addr),
                None => 0xFF,
            },
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize],
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize],
            0xFE00..=0xFE9F => self.oam[(addr - 0xFE00) as usize],
            // Unusable region.
            0xFEA0..=0xFEFF => 0xFF,
            0xFF00..=0xFF7F => self.read_io(addr),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.ie_reg,
        }
    }

    fn write_slow(&mut self, addr: u16, value: u8) {
        match addr {
            // Banking control; the effective bank may have moved, so the
            // ROM read pages are re-seeded afterwards.
            0x0000..=0x7FFF => {
                if let Some(cartridge) = &mut self.cartridge {
                    cartridge.rom_write(addr, value);
                    self.remap_rom_pages();
                }
            }
            0x8000..=0x9FFF => self.vram[(addr - 0x8000) as usize] = value,
            0xA000..=0xBFFF => {
                if let Some(cartridge) = &mut self.cartridge {
                    cartridge.ram_write(addr, value);
                }
            }
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize] = value,
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize] = value,
            0xFE00..=0xFE9F => self.oam[(addr - 0xFE00) as usize] = value,
            // Unusable region: writes are dropped.
            0xFEA0..=0xFEFF => {}
            0xFF00..=0xFF7F => self.write_io(addr, value),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = value,
            0xFFFF => self.ie_reg = value,
        }
    }

    fn read_io(&mut self, addr: u16) -> u8 {
        let offset = (addr - 0xFF00) as usize;
        match self.io_handlers[offset] {
            IoHandler::Buffer => self.io[offset],
            IoHandler::Joypad => self.joypad.read(),
            // Unused SC bits read as 1.
            IoHandler::SerialCtrl => self.io[offset] | 0x7E,
            IoHandler::TimerDiv => self.timer.read_div(),
            IoHandler::TimerCounter => self.timer.read_tima(),
            IoHandler::TimerModulo => self.timer.read_tma(),
            IoHandler::TimerCtrl => self.timer.read_tac(),
            // Upper 3 bits of IF always read as 1.
            IoHandler::InterruptFlag => self.io[IF_OFFSET] | 0xE0,
            IoHandler::Ppu => self.ppu.read_register(addr),
            IoHandler::OamDma => self.io[offset],
        }
    }

    fn write_io(&mut self, addr: u16, value: u8) {
        let offset = (addr - 0xFF00) as usize;
        match self.io_handlers[offset] {
            IoHandler::Buffer => self.io[offset] = value,
            IoHandler::Joypad => self.joypad.write(value),
            IoHandler::SerialCtrl => {
                self.io[offset] = value & 0x81;
                // Bit 7 with internal clock starts a transfer; with no link
                // partner it completes against an open line.
                if value & 0x81 == 0x81 {
                    self.scheduler.deschedule(EventKind::SerialDone);
                    self.scheduler.schedule(EventKind::SerialDone, SERIAL_CYCLES);
                }
            }
            IoHandler::TimerDiv => self.timer.write_div(value),
            IoHandler::TimerCounter => self.timer.write_tima(value),
            IoHandler::TimerModulo => self.timer.write_tma(value),
            IoHandler::TimerCtrl => self.timer.write_tac(value),
            IoHandler::InterruptFlag => self.io[IF_OFFSET] = value & 0x1F,
            IoHandler::Ppu => self.ppu.write_register(addr, value),
            IoHandler::OamDma => self.start_oam_dma(value),
        }
    }

    /// OAM DMA: copy 160 bytes from `value << 8` into OAM, then hold the
    /// external bus for 640 T-cycles.
    fn start_oam_dma(&mut self, value: u8) {
        let base = (value as u16) << 8;
        for i in 0..OAM_SIZE as u16 {
            self.oam[i as usize] = self.read8_internal(base.wrapping_add(i));
        }
        self.io[0x46] = value;

        self.scheduler.deschedule(EventKind::DmaComplete);
        self.scheduler.schedule(EventKind::DmaComplete, DMA_CYCLES);
        self.dma_active = true;

        log::trace!("OAM DMA from 0x{:04X}", base);
    }

    /// Advance the pixel unit, giving it the video memories and the IF
    /// byte to post interrupts into.
    pub(super) fn step_video(&mut self, cycles: u32) {
        let Self {
            ppu, vram, oam, io, ..
        } = self;
        ppu.step(cycles, vram, oam, &mut io[IF_OFFSET]);
    }

    pub(super) fn step_timer(&mut self, cycles: u32) {
        let Self { timer, io, .. } = self;
        timer.step(cycles, &mut io[IF_OFFSET]);
    }

    /// Drain every due scheduler event. Events run on the driver thread
    /// and mutate bus state directly.
    pub(super) fn process_events(&mut self) {
        while let Some(kind) = self.scheduler.pop_due() {
            match kind {
                EventKind::DmaComplete => {
                    self.dma_active = false;
                }
                EventKind::SerialDone => {
                    // The open line shifts in all ones.
                    self.io[0x01] = 0xFF;
                    self.io[0x02] &= 0x7F;
                    self.request_interrupt(0x08);
                }
            }
        }
    }

    pub(super) fn set_joypad_state(&mut self, state: u8) -> bool {
        let Self { joypad, io, .. } = self;
        joypad.set_state(state, &mut io[IF_OFFSET])
    }
}

impl crate::cpu::Bus for Bus {
    fn read8(&mut self, addr: u16) -> u8 {
        Bus::read8(self, addr)
    }

    fn write8(&mut self, addr: u16, value: u8) {
        Bus::write8(self, addr, value)
    }
}
