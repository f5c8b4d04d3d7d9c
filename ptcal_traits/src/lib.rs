pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Byte-stream transport to one sensor bank.
///
/// Implementations wrap a serial port (or a simulation of one). Errors cross
/// this boundary boxed so that the core can stay independent of any serial
/// backend; see `ptcal_core::hw_error` for the mapping back to typed errors.
pub trait SerialLink {
    /// Discard everything received but not yet read.
    fn clear_input(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Read up to `buf.len()` bytes. `Ok(0)` means the read timed out with no
    /// data available.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Box<dyn std::error::Error + Send + Sync>>;
}

impl<L: SerialLink + ?Sized> SerialLink for Box<L> {
    fn clear_input(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).clear_input()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read(buf)
    }
}
