//! Numeric EE kernel return codes (§7 "Syscalls"). Every syscall returns
//! one of these, or a non-negative success value, in `$v0`.

pub const KE_OK: i32 = 0;
pub const KE_ERROR: i32 = -1;
pub const KE_ILLEGAL_THID: i32 = -406;
pub const KE_UNKNOWN_THID: i32 = -407;
pub const KE_UNKNOWN_SEMID: i32 = -408;
pub const KE_DORMANT: i32 = -413;
pub const KE_SEMA_ZERO: i32 = -419;
pub const KE_SEMA_OVF: i32 = -420;
pub const KE_EVF_COND: i32 = -421;
pub const KE_UNKNOWN_EVFID: i32 = -424;
