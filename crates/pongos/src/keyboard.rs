//! PS/2 keyboard controller
//!
//! Entirely polled: the controller's status register is read until the
//! bit of interest changes. There is no timeout, so a controller that
//! never raises "output full" (or never drops "input full") stalls the
//! caller for good.
//!
//! # Example
//!
//! ```no_run
//! use pongos::keyboard::{self, Keyboard};
//! use pongos::port::X86Ports;
//!
//! let mut keyboard = Keyboard::new(unsafe { X86Ports::new() });
//! keyboard.enable_reporting();
//!
//! loop {
//!     if let Some(code) = keyboard.poll() {
//!         if code == keyboard::scancode::ENTER {
//!             break;
//!         }
//!     }
//! }
//! ```

use crate::port::PortIo;

/// Data port: scan codes in, commands out
pub const DATA_PORT: u16 = 0x60;
/// Status register (read)
pub const STATUS_PORT: u16 = 0x64;

/// Status bit 0: a byte is waiting in the output buffer
pub const STATUS_OUTPUT_FULL: u8 = 0x01;
/// Status bit 1: the controller has not consumed the last write yet
pub const STATUS_INPUT_FULL: u8 = 0x02;

/// Device command: enable scanning
pub const CMD_ENABLE_SCANNING: u8 = 0xF4;

/// Scan code set 1 make codes used by the game
pub mod scancode {
    /// Enter
    pub const ENTER: u8 = 28;
    /// W
    pub const W: u8 = 17;
    /// S
    pub const S: u8 = 31;
    /// Up arrow
    pub const UP: u8 = 72;
    /// Down arrow
    pub const DOWN: u8 = 80;
}

/// Polled keyboard controller
pub struct Keyboard<P> {
    ports: P,
}

impl<P: PortIo> Keyboard<P> {
    pub fn new(ports: P) -> Self {
        Keyboard { ports }
    }

    /// Check whether a scan code is ready to read
    #[inline]
    pub fn has_data(&mut self) -> bool {
        (self.ports.read_u8(STATUS_PORT) & STATUS_OUTPUT_FULL) != 0
    }

    /// Read one scan code, spinning until one is available
    pub fn read_scan_code(&mut self) -> u8 {
        while !self.has_data() {
            core::hint::spin_loop();
        }
        self.ports.read_u8(DATA_PORT)
    }

    /// Read a scan code only if one is already waiting
    pub fn poll(&mut self) -> Option<u8> {
        if self.has_data() {
            Some(self.ports.read_u8(DATA_PORT))
        } else {
            None
        }
    }

    /// Write a command byte once the controller's input buffer is empty
    pub fn send_command(&mut self, command: u8) {
        while (self.ports.read_u8(STATUS_PORT) & STATUS_INPUT_FULL) != 0 {
            core::hint::spin_loop();
        }
        self.ports.write_u8(DATA_PORT, command);
        trace!(debug, command, "keyboard command sent");
    }

    /// Turn on scan code reporting
    pub fn enable_reporting(&mut self) {
        self.send_command(CMD_ENABLE_SCANNING);
    }

    /// Access the underlying port backing
    pub fn ports(&self) -> &P {
        &self.ports
    }

    pub fn ports_mut(&mut self) -> &mut P {
        &mut self.ports
    }
}
