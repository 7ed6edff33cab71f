use embedded_hal::{delay::DelayNs, i2c::I2c};
use embedded_storage::Storage;
use max17263::{
    ConfigError, DesignData, FuelGaugeReading, LearnedParamStore, Max17263, ParameterError,
};
use twi::{InvalidBusClock, TwiBus, TwiPeripheral};

use crate::{
    config::{BoardConfig, LedSetup},
    schedule::Ticks,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetupError {
    BusClock(InvalidBusClock),
    Parameters(ParameterError),
}

/// A poll that did not complete. The next scheduled poll starts over.
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollError<BE, SE> {
    pub error: ConfigError<BE, SE>,
    /// Failed polls in a row, including this one.
    pub consecutive_failures: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollReport {
    /// The gauge had lost its configuration and was reloaded.
    pub reconfigured: bool,
    /// The Cycles toggle bit flipped and the learned parameters were saved.
    pub saved: bool,
    pub reading: FuelGaugeReading,
}

pub struct BatteryMonitor<I, S> {
    gauge: Max17263<I>,
    store: LearnedParamStore<S>,
    poll_interval_ticks: u8,
    consecutive_failures: u16,
    /// Set when the Cycles toggle bit flipped, cleared once the learned parameters are stored.
    save_pending: bool,
}

impl<P, S> BatteryMonitor<TwiBus<P>, S>
where
    P: TwiPeripheral,
    S: Storage,
{
    pub fn from_board(peripheral: P, storage: S, config: &BoardConfig) -> Result<Self, SetupError> {
        let design = DesignData::new(config.battery).map_err(SetupError::Parameters)?;
        let bus = TwiBus::new(peripheral, config.twi()).map_err(SetupError::BusClock)?;

        Ok(Self::new(
            Max17263::new(bus, design).with_timing(config.timing),
            LearnedParamStore::with_base(storage, config.eeprom_base),
            config.poll_interval_ticks,
        ))
    }
}

impl<I, S> BatteryMonitor<I, S>
where
    I: I2c,
    S: Storage,
{
    pub fn new(gauge: Max17263<I>, store: LearnedParamStore<S>, poll_interval_ticks: u8) -> Self {
        Self {
            gauge,
            store,
            poll_interval_ticks,
            consecutive_failures: 0,
            save_pending: false,
        }
    }

    pub fn gauge(&mut self) -> &mut Max17263<I> {
        &mut self.gauge
    }

    pub fn consecutive_failures(&self) -> u16 {
        self.consecutive_failures
    }

    pub fn release(self) -> (Max17263<I>, LearnedParamStore<S>) {
        (self.gauge, self.store)
    }

    fn apply_leds(&mut self, leds: &LedSetup) -> Result<(), I::Error> {
        self.gauge.set_led_bars(leds.bars)?;
        self.gauge.set_led_mode(leds.mode)?;
        self.gauge.set_led_brightness(leds.brightness)?;
        self.gauge.set_led_timer(leds.timer)?;
        self.gauge.enable_led_charge_indicator(leds.charge_indicator)?;
        self.gauge.enable_led_empty_blink(leds.empty_blink)
    }

    /// Sets up the LEDs and configures the gauge.
    ///
    /// A failure here leaves the POR flag set, so the next poll retries the configuration.
    pub fn start(
        &mut self,
        leds: &LedSetup,
        delay: &mut impl DelayNs,
    ) -> Result<(), ConfigError<I::Error, S::Error>> {
        self.apply_leds(leds).map_err(ConfigError::Transfer)?;
        self.gauge.load_config(&mut self.store, delay)?;

        info!("Battery monitor started");
        Ok(())
    }

    fn poll_inner(
        &mut self,
        delay: &mut impl DelayNs,
    ) -> Result<PollReport, ConfigError<I::Error, S::Error>> {
        let mut reconfigured = false;
        if self.gauge.check_por().map_err(ConfigError::Transfer)? {
            info!("Power-on reset detected, reloading configuration");
            self.gauge.load_config(&mut self.store, delay)?;
            // the gauge now runs on the stored parameters
            self.save_pending = false;
            reconfigured = true;
        }

        if self.gauge.check_cycles().map_err(ConfigError::Transfer)? {
            self.save_pending = true;
        }

        let mut saved = false;
        if self.save_pending {
            self.gauge.save_learned_params(&mut self.store)?;
            self.save_pending = false;
            saved = true;
        }

        let reading = self.gauge.read_fuel_gauge().map_err(ConfigError::Transfer)?;
        trace!(
            "Battery: {}%, {} raw capacity",
            reading.soc_percent(),
            reading.rep_cap
        );

        Ok(PollReport {
            reconfigured,
            saved,
            reading,
        })
    }

    /// Reconfigures the gauge after a power-on reset, saves the learned parameters when they
    /// changed and reads the fuel gauge outputs.
    ///
    /// A save that failed is retried by the following polls until it succeeds.
    pub fn poll(
        &mut self,
        delay: &mut impl DelayNs,
    ) -> Result<PollReport, PollError<I::Error, S::Error>> {
        match self.poll_inner(delay) {
            Ok(report) => {
                if self.consecutive_failures > 0 {
                    info!(
                        "Gauge poll recovered after {} failures",
                        self.consecutive_failures
                    );
                }
                self.consecutive_failures = 0;
                Ok(report)
            }
            Err(error) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                warn!(
                    "Gauge poll failed ({} in a row): {}",
                    self.consecutive_failures,
                    error.reason()
                );
                Err(PollError {
                    error,
                    consecutive_failures: self.consecutive_failures,
                })
            }
        }
    }

    /// Polls once the poll interval has elapsed, returns `None` otherwise.
    pub fn service(
        &mut self,
        ticks: &Ticks,
        delay: &mut impl DelayNs,
    ) -> Option<Result<PollReport, PollError<I::Error, S::Error>>> {
        if ticks.take_elapsed(self.poll_interval_ticks) {
            Some(self.poll(delay))
        } else {
            None
        }
    }
}
