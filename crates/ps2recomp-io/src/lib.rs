//! Host-side I/O surface (§4.10): pad input, the GS framebuffer blit, and
//! the 60 Hz VSync worker. Everything here is host-thread plumbing around
//! `ps2recomp-runtime::GuestMemory`; the rendering backend that actually
//! presents a [`blit::Frame`] and the GUI studio that feeds [`pad::PadOverride`]
//! are external collaborators (§1).

pub mod blit;
pub mod pad;
pub mod vsync;
