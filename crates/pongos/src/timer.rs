//! Programmable interval timer (8253/8254)
//!
//! Channel 0 is programmed once as a rate generator; delays then spin on
//! bit 0 of the system control port, once per tick.

use crate::port::PortIo;

/// PIT input clock in Hz
pub const PIT_FREQUENCY: u32 = 1_193_180;

/// Channel 0 data port
pub const CHANNEL0_PORT: u16 = 0x40;
/// Mode/command register
pub const COMMAND_PORT: u16 = 0x43;
/// System control port B; bit 0 is polled as the tick flag
pub const GATE_PORT: u16 = 0x61;

/// Channel 0, lobyte/hibyte access, mode 3 (square wave), binary
pub const CMD_CHANNEL0_SQUARE_WAVE: u8 = 0x36;

const TICK_FLAG: u8 = 0x01;

/// Compute the 16-bit reload value for a tick rate of `hz`
///
/// Rates too low for a 16-bit divisor are clamped to the slowest one.
pub const fn divisor_for(hz: u32) -> u16 {
    let hz = if hz == 0 { 1 } else { hz };
    let divisor = PIT_FREQUENCY / hz;
    if divisor > u16::MAX as u32 {
        u16::MAX
    } else if divisor == 0 {
        1
    } else {
        divisor as u16
    }
}

/// Busy-wait timer
pub struct Pit<P> {
    ports: P,
    tick_hz: u32,
}

impl<P: PortIo> Pit<P> {
    /// Wrap the timer ports; call [`Pit::configure`] before waiting
    pub fn new(ports: P) -> Self {
        Pit { ports, tick_hz: 1000 }
    }

    /// Program channel 0 to tick `hz` times per second
    pub fn configure(&mut self, hz: u32) {
        let divisor = divisor_for(hz);
        let [low, high] = divisor.to_le_bytes();
        self.ports.write_u8(COMMAND_PORT, CMD_CHANNEL0_SQUARE_WAVE);
        self.ports.write_u8(CHANNEL0_PORT, low);
        self.ports.write_u8(CHANNEL0_PORT, high);
        self.tick_hz = hz.max(1);
        trace!(debug, hz, divisor, "pit configured");
    }

    /// Configured tick rate
    pub fn tick_hz(&self) -> u32 {
        self.tick_hz
    }

    /// Spin for `ticks` timer ticks
    pub fn wait_ticks(&mut self, ticks: u32) {
        for _ in 0..ticks {
            while (self.ports.read_u8(GATE_PORT) & TICK_FLAG) == 0 {
                core::hint::spin_loop();
            }
        }
    }

    /// Spin for roughly `ms` milliseconds
    pub fn delay_ms(&mut self, ms: u32) {
        let ticks = (u64::from(ms) * u64::from(self.tick_hz) / 1000) as u32;
        self.wait_ticks(ticks);
    }

    pub fn ports(&self) -> &P {
        &self.ports
    }
}
