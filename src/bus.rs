use bitflags::bitflags;

use crate::apu::APU;
use crate::cartridge::Cartridge;
use crate::controller::Controller;
use crate::ppu::PPU;

bitflags! {
    /// One bit per IRQ source feeding the CPU's IRQ line.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqSource: u8 {
        const EXTERNAL      = 0x01;
        const FRAME_COUNTER = 0x02;
        const DMC           = 0x04;
        const FDS_DISK      = 0x08;
    }
}

/// Signal block shared by every subsystem on the bus. The PPU drives the NMI
/// line, the APU and mappers drive IRQ sources and DMA requests, and the CPU
/// samples all of them at its cycle boundaries. This replaces the web of
/// back-pointers the hardware's wiring would otherwise suggest.
#[derive(Debug, Default)]
pub struct Interrupts {
    irq_flags: IrqSource,
    nmi_line: bool,
    oam_dma_page: Option<u8>,
    dmc_dma_request: bool,
}

impl Interrupts {
    pub fn set_irq_source(&mut self, source: IrqSource) {
        self.irq_flags.insert(source);
    }

    pub fn clear_irq_source(&mut self, source: IrqSource) {
        self.irq_flags.remove(source);
    }

    pub fn has_irq_source(&self, source: IrqSource) -> bool {
        self.irq_flags.intersects(source)
    }

    pub fn irq_pending(&self, mask: u8) -> bool {
        self.irq_flags.bits() & mask != 0
    }

    pub fn set_nmi_line(&mut self) {
        self.nmi_line = true;
    }

    pub fn clear_nmi_line(&mut self) {
        self.nmi_line = false;
    }

    pub fn nmi_line(&self) -> bool {
        self.nmi_line
    }

    pub fn request_oam_dma(&mut self, page: u8) {
        self.oam_dma_page = Some(page);
    }

    pub fn request_dmc_dma(&mut self) {
        self.dmc_dma_request = true;
    }

    pub(crate) fn take_oam_dma(&mut self) -> Option<u8> {
        self.oam_dma_page.take()
    }

    pub(crate) fn take_dmc_dma(&mut self) -> bool {
        std::mem::take(&mut self.dmc_dma_request)
    }
}

impl Default for IrqSource {
    fn default() -> Self {
        IrqSource::empty()
    }
}

/// CPU-visible address space. Every read refreshes the open-bus byte; reads
/// of unmapped or write-only locations return it unchanged.
pub struct Bus {
    pub wram: [u8; 0x800],
    pub ppu: PPU,
    pub apu: APU,
    pub cart: Cartridge,
    pub port1: Controller,
    pub port2: Controller,
    pub intr: Interrupts,
    pub open_bus: u8,
    /// Mirror of the CPU cycle counter, refreshed at every cycle start so
    /// write-parity effects ($4017, DMC enable, MMC1 write collapse) can see
    /// it without a back-reference.
    pub cpu_cycles: u64,
}

impl Bus {
    pub fn new(cart: Cartridge) -> Self {
        Bus {
            wram: [0; 0x800],
            ppu: PPU::new(),
            apu: APU::new(),
            cart,
            port1: Controller::new(),
            port2: Controller::new(),
            intr: Interrupts::default(),
            open_bus: 0,
            cpu_cycles: 0,
        }
    }

    pub fn read(&mut self, addr: u16) -> u8 {
        let value = match addr {
            0x0000..=0x1FFF => self.wram[(addr & 0x07FF) as usize],
            0x2000..=0x3FFF => self.ppu.read_register(addr, &mut self.cart, &mut self.intr),
            0x4000..=0x4013 | 0x4014 => self.open_bus,
            0x4015 => self.apu.read_status(&mut self.intr),
            0x4016 => self.port1.read() | (self.open_bus & 0xE0),
            0x4017 => self.port2.read() | (self.open_bus & 0xE0),
            0x4018..=0x40FF => self.cart.ex_read(addr).unwrap_or(self.open_bus),
            0x4100..=0xFFFF => {
                self.cart
                    .read_cpu(addr, self.open_bus, self.cpu_cycles, &mut self.intr)
            }
        };
        self.open_bus = value;
        value
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x1FFF => self.wram[(addr & 0x07FF) as usize] = value,
            0x2000..=0x3FFF => {
                self.ppu
                    .write_register(addr, value, &mut self.cart, &mut self.intr);
                self.cart.notify_cpu_register_write(addr & 0x2007, value);
            }
            0x4014 => self.intr.request_oam_dma(value),
            0x4000..=0x4013 | 0x4015 => {
                self.apu
                    .write_register(addr, value, self.cpu_cycles, &mut self.intr)
            }
            0x4016 => {
                self.port1.write(value);
                self.port2.write(value);
            }
            0x4017 => self
                .apu
                .write_register(addr, value, self.cpu_cycles, &mut self.intr),
            0x4018 => {}
            0x4019..=0x40FF => self.cart.ex_write(addr, value),
            0x4100..=0xFFFF => {
                self.cart
                    .write_cpu(addr, value, self.cpu_cycles, &mut self.intr)
            }
        }
    }

    pub fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Run the PPU until its master clock is within one dot (4 master cycles)
    /// of the CPU master clock. Called by the CPU on both edges of every bus
    /// access, so register reads observe the exact dot the silicon would.
    pub(crate) fn run_ppu_to(&mut self, master_clock: u64) {
        while self.ppu.master_clock + 4 <= master_clock - 1 {
            self.ppu.step(&mut self.cart, &mut self.intr);
            self.ppu.master_clock += 4;
        }
    }

    pub(crate) fn step_apu(&mut self) {
        self.apu.step(&mut self.intr);
    }

    pub(crate) fn step_mapper(&mut self) {
        self.cart.step(&mut self.intr);
    }

    pub(crate) fn dmc_read_address(&self) -> u16 {
        self.apu.dmc_read_address()
    }

    pub(crate) fn dmc_buffer_filled(&mut self, value: u8) {
        self.apu.set_dmc_read_buffer(value, &mut self.intr);
    }
}
