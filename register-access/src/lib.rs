#![cfg_attr(not(test), no_std)]

use device_descriptor::{ReadOnlyRegister, Register};
use embedded_hal::delay::DelayNs;

/// Total number of writes `write_and_verify` attempts before giving up.
pub const VERIFY_ATTEMPTS: u8 = 3;

/// Register values travel least significant byte first.
#[inline]
pub const fn encode(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

#[inline]
pub const fn decode(bytes: [u8; 2]) -> u16 {
    u16::from_le_bytes(bytes)
}

/// Outcome of [`RegisterAccess::write_and_verify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Verification {
    /// Number of writes issued, `1..=VERIFY_ATTEMPTS`.
    pub attempts: u8,
    /// Whether the last read-back equals the written value.
    pub matched: bool,
    /// The value read back after the last write.
    pub readback: u16,
}

pub trait RegisterAccess {
    type Error;

    fn read_register(&mut self, address: u8) -> Result<u16, Self::Error>;
    fn write_register(&mut self, address: u8, value: u16) -> Result<(), Self::Error>;

    fn read<R>(&mut self) -> Result<R, Self::Error>
    where
        R: ReadOnlyRegister,
    {
        self.read_register(R::ADDRESS).map(R::from_bits)
    }

    fn write<R>(&mut self, reg: R) -> Result<(), Self::Error>
    where
        R: Register,
    {
        self.write_register(R::ADDRESS, reg.bits())
    }

    /// Writes `value`, lets the device settle, and reads it back. Repeats while the read-back
    /// differs, at most [`VERIFY_ATTEMPTS`] times in total.
    ///
    /// A mismatch after the last attempt is not an error here, the caller decides what it means.
    /// Bus errors abort immediately.
    fn write_and_verify(
        &mut self,
        address: u8,
        value: u16,
        delay: &mut impl DelayNs,
        settle_ms: u32,
    ) -> Result<Verification, Self::Error> {
        let mut attempts = 0;
        loop {
            self.write_register(address, value)?;
            delay.delay_ms(settle_ms);
            let readback = self.read_register(address)?;
            attempts += 1;

            let matched = readback == value;
            if matched || attempts >= VERIFY_ATTEMPTS {
                return Ok(Verification {
                    attempts,
                    matched,
                    readback,
                });
            }
        }
    }
}

impl<T> RegisterAccess for &mut T
where
    T: RegisterAccess,
{
    type Error = T::Error;

    fn read_register(&mut self, address: u8) -> Result<u16, Self::Error> {
        T::read_register(self, address)
    }

    fn write_register(&mut self, address: u8, value: u16) -> Result<(), Self::Error> {
        T::write_register(self, address, value)
    }
}

#[cfg(test)]
mod test {
    use std::collections::VecDeque;

    use embedded_hal_mock::eh1::delay::NoopDelay;

    use super::*;

    /// Records writes and answers reads from a script.
    struct Scripted {
        readbacks: VecDeque<u16>,
        writes: Vec<(u8, u16)>,
        reads: usize,
    }

    impl Scripted {
        fn new(readbacks: &[u16]) -> Self {
            Self {
                readbacks: readbacks.iter().copied().collect(),
                writes: Vec::new(),
                reads: 0,
            }
        }
    }

    impl RegisterAccess for Scripted {
        type Error = ();

        fn read_register(&mut self, _address: u8) -> Result<u16, ()> {
            self.reads += 1;
            self.readbacks.pop_front().ok_or(())
        }

        fn write_register(&mut self, address: u8, value: u16) -> Result<(), ()> {
            self.writes.push((address, value));
            Ok(())
        }
    }

    #[test]
    fn little_endian_wire_order() {
        assert_eq!(encode(0xBEEF), [0xEF, 0xBE]);
        assert_eq!(decode([0x34, 0x12]), 0x1234);

        for value in [0x0000, 0x0001, 0x00FF, 0x0100, 0x8000, 0xA561, 0xFFFF] {
            assert_eq!(decode(encode(value)), value);
        }
    }

    #[test]
    fn verify_succeeds_on_first_match() {
        let mut dev = Scripted::new(&[0x0080]);

        let result = dev
            .write_and_verify(0x00, 0x0080, &mut NoopDelay::new(), 1)
            .unwrap();

        assert_eq!(
            result,
            Verification {
                attempts: 1,
                matched: true,
                readback: 0x0080
            }
        );
        assert_eq!(dev.writes, [(0x00, 0x0080)]);
    }

    #[test]
    fn verify_retries_until_third_attempt_matches() {
        let mut dev = Scripted::new(&[0x0082, 0x0082, 0x0080]);

        let result = dev
            .write_and_verify(0x00, 0x0080, &mut NoopDelay::new(), 1)
            .unwrap();

        assert_eq!(result.attempts, 3);
        assert!(result.matched);
        assert_eq!(dev.writes.len(), 3);
        assert_eq!(dev.reads, 3);
    }

    #[test]
    fn verify_reports_mismatch_after_three_attempts() {
        let mut dev = Scripted::new(&[0x0082, 0x0082, 0x0083, 0x0080]);

        let result = dev
            .write_and_verify(0x00, 0x0080, &mut NoopDelay::new(), 1)
            .unwrap();

        assert_eq!(
            result,
            Verification {
                attempts: 3,
                matched: false,
                readback: 0x0083
            }
        );
        assert_eq!(dev.writes, [(0x00, 0x0080); 3]);
        // the fourth scripted value is never consumed
        assert_eq!(dev.readbacks.len(), 1);
    }

    #[test]
    fn bus_error_aborts_verification() {
        let mut dev = Scripted::new(&[]);

        assert_eq!(
            dev.write_and_verify(0x00, 0x0080, &mut NoopDelay::new(), 1),
            Err(())
        );
        assert_eq!(dev.writes.len(), 1);
    }
}
