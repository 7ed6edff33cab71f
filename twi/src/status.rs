use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

/// Status code reported by the TWI peripheral after each bus phase, prescaler bits masked off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusStatus(pub u8);

impl BusStatus {
    /// Illegal start or stop condition.
    pub const BUS_ERROR: Self = Self(0x00);
    pub const START: Self = Self(0x08);
    pub const REPEATED_START: Self = Self(0x10);

    pub const WRITE_ADDRESS_ACK: Self = Self(0x18);
    pub const WRITE_ADDRESS_NACK: Self = Self(0x20);
    pub const WRITE_DATA_ACK: Self = Self(0x28);
    pub const WRITE_DATA_NACK: Self = Self(0x30);

    pub const ARBITRATION_LOST: Self = Self(0x38);

    pub const READ_ADDRESS_ACK: Self = Self(0x40);
    pub const READ_ADDRESS_NACK: Self = Self(0x48);
    pub const READ_DATA_ACK: Self = Self(0x50);
    pub const READ_DATA_NACK: Self = Self(0x58);

    /// No relevant state information, the completion flag is not set.
    pub const IDLE: Self = Self(0xF8);

    pub const fn from_raw(raw: u8) -> Self {
        Self(raw & 0xF8)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub fn kind(self) -> ErrorKind {
        match self {
            Self::WRITE_ADDRESS_NACK | Self::READ_ADDRESS_NACK => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
            }
            Self::WRITE_DATA_NACK => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            Self::ARBITRATION_LOST => ErrorKind::ArbitrationLoss,
            Self::BUS_ERROR => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}

/// A bus phase ended with an unexpected status. The transaction it belonged to was abandoned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusError {
    pub status: BusStatus,
}

impl embedded_hal::i2c::Error for BusError {
    fn kind(&self) -> ErrorKind {
        self.status.kind()
    }
}
