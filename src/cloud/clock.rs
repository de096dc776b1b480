//! Time source for keep-alive, throttle windows and backoff.

/// Monotonic time plus a blocking wait, supplied by the integrator.
///
/// On bare metal this usually wraps a hardware timer; on Linux the `std`
/// feature provides [`StdClock`].
pub trait Clock {
    /// Milliseconds since an arbitrary, fixed origin. Must never go backwards.
    fn now_ms(&self) -> u64;

    /// Block the calling thread for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

/// [`Clock`] backed by `std::time::Instant` and `std::thread::sleep`.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    /// A clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(ms.into()));
    }
}
