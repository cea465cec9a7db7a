//! Freestanding entry point
//!
//! The bootloader (multiboot stub, linker script, target spec) lives
//! outside this crate and jumps to [`kernel_main`] with interrupts off.

use core::fmt::{self, Write};
use core::panic::PanicInfo;

use crate::arena::Arena;
use crate::display::{Attribute, CELL_COUNT, Cell, Surface, VgaBuffer};
use crate::error::KernelError;
use crate::kernel::{Config, Machine};
use crate::port::X86Ports;

/// Bytes handed to the arena
const HEAP_SIZE: usize = 1024 * 1024;

static mut HEAP: [u8; HEAP_SIZE] = [0; HEAP_SIZE];

#[unsafe(no_mangle)]
pub extern "C" fn kernel_main() -> ! {
    // SAFETY: runs once on the only CPU; nothing else refers to HEAP
    let heap: &'static mut [u8] = unsafe { &mut *(&raw mut HEAP) };

    let booted = Arena::new(heap).map_err(Into::into).and_then(|arena| {
        // SAFETY: ring 0, identity-mapped low memory, single thread
        let (keyboard, timer, vga) = unsafe { (X86Ports::new(), X86Ports::new(), VgaBuffer::text_mode()) };
        Machine::boot(keyboard, timer, arena, vga, Config::default())
    });

    match booted {
        Ok(mut machine) => machine.run(),
        Err(error) => boot_failed(&error),
    }
    halt()
}

/// Last-resort message written straight to the text buffer
fn boot_failed(error: &KernelError) {
    // SAFETY: the machine never came up, so nothing else owns the buffer
    let vga = unsafe { VgaBuffer::text_mode() };
    let mut console = RawConsole { vga, index: 0 };
    let _ = write!(console, "boot failed: {error}");
}

/// Unbuffered text output from the top-left corner
struct RawConsole {
    vga: VgaBuffer,
    index: usize,
}

impl Write for RawConsole {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        for byte in text.bytes() {
            if self.index >= CELL_COUNT {
                return Err(fmt::Error);
            }
            let glyph = if byte.is_ascii() { byte } else { b'?' };
            self.vga.write_cell(self.index, Cell::new(glyph, Attribute::DEFAULT));
            self.index += 1;
        }
        Ok(())
    }
}

fn halt() -> ! {
    loop {
        // SAFETY: `hlt` only stops the CPU until the next interrupt
        unsafe { core::arch::asm!("hlt", options(nomem, nostack)) }
    }
}

#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    halt()
}
