//! Port I/O capability
//!
//! Every device this kernel talks to through I/O ports (the PS/2
//! controller and the PIT) goes through [`PortIo`]. On hardware that is
//! [`X86Ports`]; on a host it is one of the deterministic fakes below,
//! which never block as long as their script lasts.

/// Byte-wide port access
pub trait PortIo {
    /// Read one byte from `port`
    fn read_u8(&mut self, port: u16) -> u8;

    /// Write one byte to `port`
    fn write_u8(&mut self, port: u16, value: u8);
}

impl<P: PortIo + ?Sized> PortIo for &mut P {
    #[inline]
    fn read_u8(&mut self, port: u16) -> u8 {
        (**self).read_u8(port)
    }

    #[inline]
    fn write_u8(&mut self, port: u16, value: u8) {
        (**self).write_u8(port, value);
    }
}

/// Real port access through `in`/`out` instructions
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[derive(Debug)]
pub struct X86Ports {
    _private: (),
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl X86Ports {
    /// # Safety
    ///
    /// The caller must run at an I/O privilege level that allows port
    /// access, and must be the only code driving the ports it touches.
    pub const unsafe fn new() -> Self {
        X86Ports { _private: () }
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl PortIo for X86Ports {
    #[inline]
    fn read_u8(&mut self, port: u16) -> u8 {
        let value: u8;
        // SAFETY: port access was granted when this value was constructed
        unsafe {
            core::arch::asm!("in al, dx", in("dx") port, out("al") value, options(nomem, nostack, preserves_flags));
        }
        value
    }

    #[inline]
    fn write_u8(&mut self, port: u16, value: u8) {
        // SAFETY: see `read_u8`
        unsafe {
            core::arch::asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
        }
    }
}

/// Scripted PS/2 controller
///
/// Drives the keyboard protocol from an iterator of events: `Some(code)`
/// is a scan code waiting in the output buffer, `None` is consumed by one
/// status read that reports no data. The input buffer is always empty, so
/// commands are accepted immediately.
///
/// Once the script runs out the controller reports no data forever, just
/// like an idle keyboard. A blocking read at that point never returns.
///
/// # Example
///
/// ```
/// use pongos::keyboard::Keyboard;
/// use pongos::port::ScriptedPorts;
///
/// let mut keyboard = Keyboard::new(ScriptedPorts::new([None, Some(28)].into_iter()));
/// assert_eq!(keyboard.poll(), None);
/// assert_eq!(keyboard.poll(), Some(28));
/// ```
#[derive(Debug)]
pub struct ScriptedPorts<I: Iterator<Item = Option<u8>>> {
    events: core::iter::Peekable<I>,
    commands: usize,
    last_command: Option<u8>,
}

impl<I: Iterator<Item = Option<u8>>> ScriptedPorts<I> {
    pub fn new(events: I) -> Self {
        ScriptedPorts {
            events: events.peekable(),
            commands: 0,
            last_command: None,
        }
    }

    /// Number of bytes written to the data port
    pub fn commands_sent(&self) -> usize {
        self.commands
    }

    /// Most recent byte written to the data port
    pub fn last_command(&self) -> Option<u8> {
        self.last_command
    }

    /// Whether the script has been fully consumed
    pub fn is_exhausted(&mut self) -> bool {
        self.events.peek().is_none()
    }
}

impl<I: Iterator<Item = Option<u8>>> PortIo for ScriptedPorts<I> {
    fn read_u8(&mut self, port: u16) -> u8 {
        use crate::keyboard::{DATA_PORT, STATUS_OUTPUT_FULL, STATUS_PORT};

        match port {
            STATUS_PORT => match self.events.peek() {
                Some(Some(_)) => STATUS_OUTPUT_FULL,
                Some(None) => {
                    self.events.next();
                    0
                }
                None => 0,
            },
            DATA_PORT => match self.events.next() {
                Some(Some(code)) => code,
                _ => 0,
            },
            _ => 0xFF,
        }
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        if port == crate::keyboard::DATA_PORT {
            self.commands += 1;
            self.last_command = Some(value);
        }
    }
}

/// Device whose status bits are always set
///
/// Every read returns `0x01`, which is "tick elapsed" for the PIT gate
/// port. Writes are counted. Used as the timer on hosts, where delays
/// should cost nothing.
#[derive(Debug, Default, Clone)]
pub struct ReadyPorts {
    reads: usize,
    writes: usize,
    last_write: Option<(u16, u8)>,
}

impl ReadyPorts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of port reads served
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Number of port writes seen
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Most recent `(port, value)` write
    pub fn last_write(&self) -> Option<(u16, u8)> {
        self.last_write
    }
}

impl PortIo for ReadyPorts {
    fn read_u8(&mut self, _port: u16) -> u8 {
        self.reads += 1;
        0x01
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        self.writes += 1;
        self.last_write = Some((port, value));
    }
}
