use libc::{c_void, ucontext_t, REG_ERR};

use super::AccessKind;

/// Bit 1 of the page-fault error code is set iff the access was a write.
const ERROR_CODE_WRITE_BIT: i64 = 0x2;

pub(super) unsafe fn access_kind(ctx: *mut c_void) -> AccessKind {
    let context = &*(ctx as *const ucontext_t);

    if context.uc_mcontext.gregs[REG_ERR as usize] & ERROR_CODE_WRITE_BIT != 0 {
        AccessKind::Write
    } else {
        AccessKind::Read
    }
}
