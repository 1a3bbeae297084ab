//! Native GNU/Linux debugging support for the Xilinx MicroBlaze architecture.
//!
//! This crate supplies the MicroBlaze-specific glue a debugger core needs to
//! control a traced process on GNU/Linux:
//!
//! - marshalling the general register block between `ptrace(2)` and the
//!   debugger's register cache ([`nat`])
//! - software breakpoint encode/restore, signal-trampoline unwinding, and the
//!   SVR4 link-map layout ([`tdep`])
//!
//! There is no standalone behavior here: every entry point is reached through
//! the capability traits in [`target`]. The debugger core holds a
//! [`NativeOps`] trait object for the inferior-facing operations, and hands in
//! the host-owned services (register cache, inferior memory, frame cache,
//! auxiliary vector) as trait objects of its own.
//!
//! The live OS interface is abstracted behind [`trace::Tracer`], with a real
//! `ptrace(2)`-backed implementation available on Linux. Tests run against
//! mock tracers, so none of the marshalling logic requires a MicroBlaze
//! board to exercise.

pub mod arch;
pub mod nat;
pub mod target;
pub mod tdep;
pub mod trace;
pub mod version;

pub use nat::MicroBlazeLinuxNat;
pub use target::NativeOps;
pub use target::RegSelector;
