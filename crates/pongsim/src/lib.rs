//! Host simulator for PongOS
//!
//! Runs the kernel with scripted keyboard input, a zero-cost timer and an
//! in-memory text buffer, and renders frames as plain text.
//!
//! # Example
//!
//! ```
//! use pongsim::script::Script;
//! use pongsim::session::{Settings, StopReason, simulate};
//!
//! let script = Script::parse("enter .*20").unwrap();
//! let settings = Settings { frames: 20, ..Settings::default() };
//! let summary = simulate(script, &settings, |_| {}).unwrap();
//! assert_eq!(summary.reason, StopReason::FrameLimit);
//! ```

pub mod render;
pub mod script;
pub mod session;

pub use script::{Script, ScriptError};
pub use session::{Settings, StopReason, Summary, simulate};
