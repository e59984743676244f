//! Spin-delay primitive.
//!
//! Busy-waits on the calling CPU for an exact duration measured by the
//! platform's monotonic clock. Never yields or sleeps, so it is safe to call
//! from the probe handler.

use crate::platform::{Platform, PlatformOps};

/// Spin for at least `delay_ns` nanoseconds.
///
/// `0` returns immediately. An in-progress delay cannot be cancelled.
#[inline]
pub fn spin_delay_ns(delay_ns: u64) {
    spin_delay_ns_on::<Platform>(delay_ns)
}

/// Same as [`spin_delay_ns`], on an explicit platform.
pub fn spin_delay_ns_on<P: PlatformOps>(delay_ns: u64) {
    if delay_ns == 0 {
        return;
    }

    let start_ns = P::time_ns();
    loop {
        P::cpu_relax();
        // A clock that steps backwards must not end the wait early.
        if P::time_ns().saturating_sub(start_ns) >= delay_ns {
            break;
        }
    }
}
