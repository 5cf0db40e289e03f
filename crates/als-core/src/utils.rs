use nix::time::{ClockId, clock_gettime};

#[cfg(any(target_os = "linux", target_os = "android"))]
const BOOT_CLOCK: ClockId = ClockId::CLOCK_BOOTTIME;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
const BOOT_CLOCK: ClockId = ClockId::CLOCK_MONOTONIC;

/// Nanoseconds since boot, including time spent suspended.
///
/// Falls back to the plain monotonic clock if the boot clock is unavailable.
// time_t and c_long are i32 on some targets
#[allow(clippy::useless_conversion)]
#[must_use]
pub fn boot_time_ns() -> i64 {
    clock_gettime(BOOT_CLOCK)
        .or_else(|_| clock_gettime(ClockId::CLOCK_MONOTONIC))
        .map(|ts| {
            i64::from(ts.tv_sec())
                .saturating_mul(1_000_000_000)
                .saturating_add(i64::from(ts.tv_nsec()))
        })
        .unwrap_or(0)
}
