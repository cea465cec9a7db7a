//! # PongOS - a freestanding pong kernel
//!
//! A two-paddle ball game that runs directly on x86 hardware with no
//! operating system underneath it.
//!
//! ## Features
//!
//! - **Arena**: first-fit block allocator over a fixed byte region
//! - **Display**: double-buffered 80x25 VGA text grid
//! - **Keyboard**: polled PS/2 controller input (scan code set 1)
//! - **Timer**: PIT-driven busy-wait delays
//! - **Game**: deterministic fixed-step ball and paddle simulation
//!
//! ## Quick Start
//!
//! The same [`kernel::Machine`] that runs on hardware can be booted on a
//! host against the in-memory fakes:
//!
//! ```
//! use pongos::prelude::*;
//!
//! let arena = Arena::new(vec![0u8; 16 * 1024]).unwrap();
//! let keys = [Some(scancode::ENTER), None, None].into_iter();
//! let mut machine = Machine::boot(
//!     ScriptedPorts::new(keys),
//!     ReadyPorts::new(),
//!     arena,
//!     MemorySurface::new(),
//!     Config::default(),
//! )
//! .unwrap();
//!
//! machine.iterate();
//! assert_eq!(machine.game().phase(), Phase::Playing);
//! ```
//!
//! ## Modules
//!
//! - [`arena`] - Block allocator
//! - [`display`] - Cells, colors, surfaces and the double-buffered screen
//! - [`port`] - Port I/O capability, x86 backing and deterministic fakes
//! - [`keyboard`] - PS/2 controller protocol
//! - [`timer`] - Programmable interval timer
//! - [`game`] - Simulation state machine
//! - [`kernel`] - Main loop

#![cfg_attr(not(test), no_std)]

/// Forwards to `tracing::$level!` when the `tracing` feature is on.
macro_rules! trace {
    ($level:ident, $($arg:tt)+) => {{
        #[cfg(feature = "tracing")]
        ::tracing::$level!($($arg)+);
    }};
}

pub mod arena;
pub mod display;
pub mod error;
pub mod game;
pub mod kernel;
pub mod keyboard;
pub mod port;
pub mod timer;

#[cfg(all(target_os = "none", any(target_arch = "x86", target_arch = "x86_64")))]
mod boot;

pub use error::{ArenaError, KernelError, KernelResult};

/// Convenient re-exports for common usage
///
/// Import everything you need with:
/// ```
/// use pongos::prelude::*;
/// ```
pub mod prelude {
    pub use crate::arena::{Arena, ArenaStats, Block};
    pub use crate::display::{Attribute, Cell, Color, MemorySurface, Screen, Surface};
    pub use crate::error::{ArenaError, KernelError, KernelResult};
    pub use crate::game::{Ball, Game, Phase, Side, Trigger};
    pub use crate::kernel::{Config, Flow, Machine};
    pub use crate::keyboard::{self, Keyboard, scancode};
    pub use crate::port::{PortIo, ReadyPorts, ScriptedPorts};
    pub use crate::timer::Pit;
}

/// Kernel version information
pub mod version {
    /// Major version number
    pub const MAJOR: u8 = 0;
    /// Minor version number
    pub const MINOR: u8 = 1;
    /// Patch version number
    pub const PATCH: u8 = 0;
    /// Version as string
    pub const STRING: &str = "0.1.0";
}
