use max17263::{BatteryParameters, LedMode, LedTimer, Timing};
use twi::{TwiConfig, SCL_100KHZ};

/// LED driver setup applied before the first configuration load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LedSetup {
    pub bars: u8,
    pub mode: LedMode,
    /// 0 to 31
    pub brightness: u8,
    pub timer: LedTimer,
    pub charge_indicator: bool,
    pub empty_blink: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BoardConfig {
    pub cpu_hz: u32,
    pub scl_hz: u32,
    pub battery: BatteryParameters,
    pub leds: LedSetup,
    /// Watchdog wakeups between two gauge polls.
    pub poll_interval_ticks: u8,
    pub timing: Timing,
    /// Offset of the learned parameter mirror in the EEPROM.
    pub eeprom_base: u32,
}

impl BoardConfig {
    pub const fn twi(&self) -> TwiConfig {
        TwiConfig::new(self.cpu_hz, self.scl_hz)
    }
}

/// Watchdog wakeup period.
pub const TICK_PERIOD_S: u32 = 8;

pub const BOARD: BoardConfig = BoardConfig {
    cpu_hz: 8_000_000,
    scl_hz: SCL_100KHZ,
    battery: BatteryParameters {
        capacity_mah: 1200,
        charge_termination_ma: 100,
        sense_resistor_mohm: 10,
    },
    leds: LedSetup {
        bars: 4,
        mode: LedMode::PushButtonTimer,
        brightness: 31,
        timer: LedTimer::Ms1300,
        charge_indicator: true,
        empty_blink: false,
    },
    // about a minute
    poll_interval_ticks: (60 / TICK_PERIOD_S) as u8,
    timing: Timing::DEFAULT,
    eeprom_base: 0,
};

#[cfg(test)]
mod test {
    use max17263::DesignData;

    use super::*;

    #[test]
    fn board_config_is_valid() {
        assert_eq!(BOARD.twi().bit_rate(), Ok(32));
        assert_eq!(BOARD.poll_interval_ticks, 7);

        let design = DesignData::new(BOARD.battery).unwrap();
        assert_eq!(design.capacity, 2400);
        assert_eq!(design.i_chg_term, 640);
    }
}
