//! Guest execution runtime (§4.5–§4.8): the memory model, the CPU context
//! emitted code reads and writes, function dispatch, and the guest heap.
//! `ps2recomp-kernel` and `ps2recomp-io` build on top of this crate's
//! [`memory::GuestMemory`], [`context::R5900Context`], and
//! [`dispatch::PS2Runtime`]; this crate itself has no knowledge of EE
//! syscalls or host I/O.

pub mod context;
pub mod dispatch;
pub mod fpu;
pub mod heap;
pub mod memory;
pub mod mmi;
pub mod vu0;

pub use context::R5900Context;
pub use dispatch::{ExceptionKind, GuestFn, PS2Runtime};
pub use heap::GuestHeap;
pub use memory::{GuestMemory, MemoryError};
