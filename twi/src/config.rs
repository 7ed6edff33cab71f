pub const SCL_100KHZ: u32 = 100_000;
pub const SCL_400KHZ: u32 = 400_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidBusClock;

/// Bus clock setup.
///
/// The peripheral derives SCL as `cpu / (16 + 2 * bit_rate)` with the prescaler fixed at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TwiConfig {
    pub cpu_hz: u32,
    pub scl_hz: u32,
}

impl TwiConfig {
    pub const fn new(cpu_hz: u32, scl_hz: u32) -> Self {
        Self { cpu_hz, scl_hz }
    }

    pub const fn bit_rate(&self) -> Result<u8, InvalidBusClock> {
        if self.scl_hz == 0 {
            return Err(InvalidBusClock);
        }

        let ratio = self.cpu_hz / self.scl_hz;
        if ratio < 16 {
            return Err(InvalidBusClock);
        }

        let bit_rate = (ratio - 16) / 2;
        if bit_rate > u8::MAX as u32 {
            return Err(InvalidBusClock);
        }

        Ok(bit_rate as u8)
    }
}
