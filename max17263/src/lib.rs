#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate logger;

use device_descriptor::{ReadOnlyRegister, Register};
use embedded_hal::i2c::I2c;
use embedded_storage::Storage;
use register_access::RegisterAccess;

pub mod descriptors;
pub mod ll;
mod model;
pub mod persistence;
mod sequence;

use descriptors::*;

pub use descriptors::{AnimationMode, ChargeVoltage, LedMode, LedTimer};
pub use persistence::{LearnedParamStore, NvState, StoreError};

/// A bounded wait that ran out of polls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wait {
    /// FStat.DNR did not clear after power-up.
    DataReady,
    /// ModelCfg.Refresh did not clear after loading the model.
    ModelRefresh,
}

#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError<BE, SE> {
    Transfer(BE),
    Storage(StoreError<SE>),
    /// A write did not stick after all attempts.
    Verify {
        register: u8,
        expected: u16,
        readback: u16,
    },
    NotResponding(Wait),
}

impl<BE, SE> ConfigError<BE, SE> {
    /// Short description that does not need the wrapped error types to be printable.
    pub fn reason(&self) -> &'static str {
        match self {
            ConfigError::Transfer(_) => "bus transfer failed",
            ConfigError::Storage(StoreError::Storage(_)) => "storage access failed",
            ConfigError::Storage(StoreError::Uninitialized) => "storage not initialized",
            ConfigError::Verify { .. } => "register verification failed",
            ConfigError::NotResponding(Wait::DataReady) => "gauge data not ready",
            ConfigError::NotResponding(Wait::ModelRefresh) => "model refresh timed out",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParameterError {
    ZeroSenseResistor,
    /// The value does not fit the 16-bit register.
    OutOfRange,
}

/// Cell and board properties supplied by the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryParameters {
    pub capacity_mah: u16,
    pub charge_termination_ma: u16,
    pub sense_resistor_mohm: u16,
}

/// Configuration loaded into the gauge by EZ Config.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DesignData {
    /// Design capacity
    /// LSB = 5μVh/r_sense
    pub capacity: u16,

    /// Charge termination current
    /// LSB = 1.5625μV/r_sense
    pub i_chg_term: u16,

    pub v_empty: VEmpty,

    pub model_cfg: ModelCfg,

    /// LSB = 1mOhm
    pub r_sense: u16,
}

impl DesignData {
    pub fn new(params: BatteryParameters) -> Result<Self, ParameterError> {
        Ok(Self {
            capacity: Self::mah_to_raw_capacity(params.capacity_mah, params.sense_resistor_mohm)?,
            i_chg_term: Self::ma_to_raw_current(
                params.charge_termination_ma,
                params.sense_resistor_mohm,
            )?,
            v_empty: VEmpty::default(),
            model_cfg: ModelCfg::default(),
            r_sense: params.sense_resistor_mohm,
        })
    }

    /// Converts a capacity in mAh to the raw register value, truncating.
    ///
    /// ```rust
    /// # use max17263::DesignData;
    /// assert_eq!(DesignData::mah_to_raw_capacity(1200, 10), Ok(2400));
    /// assert_eq!(DesignData::mah_to_raw_capacity(3000, 10), Ok(6000));
    /// assert!(DesignData::mah_to_raw_capacity(40_000, 10).is_err());
    /// ```
    pub fn mah_to_raw_capacity(mah: u16, r_sense: u16) -> Result<u16, ParameterError> {
        if r_sense == 0 {
            return Err(ParameterError::ZeroSenseResistor);
        }

        let raw = mah as u32 * r_sense as u32 / 5;
        u16::try_from(raw).map_err(|_| ParameterError::OutOfRange)
    }

    /// Converts a current in mA to the raw register value, truncating.
    ///
    /// ```rust
    /// # use max17263::DesignData;
    /// assert_eq!(DesignData::ma_to_raw_current(100, 10), Ok(640));
    /// assert_eq!(DesignData::ma_to_raw_current(250, 10), Ok(1600));
    /// ```
    pub fn ma_to_raw_current(ma: u16, r_sense: u16) -> Result<u16, ParameterError> {
        if r_sense == 0 {
            return Err(ParameterError::ZeroSenseResistor);
        }

        let raw = ma as u64 * r_sense as u64 * 10_000 / 15_625;
        u16::try_from(raw).map_err(|_| ParameterError::OutOfRange)
    }

    /// Converts the raw register value to a capacity value in μAh.
    #[allow(non_snake_case)]
    #[inline]
    pub fn raw_capacity_to_uAh(&self, raw: u16) -> u32 {
        (raw as u32 * 5_000) / self.r_sense as u32
    }

    /// Converts the raw register value to a current value in μA.
    ///
    /// ```rust
    /// # use max17263::{BatteryParameters, DesignData};
    /// let design_data = DesignData::new(BatteryParameters {
    ///     capacity_mah: 1200,
    ///     charge_termination_ma: 100,
    ///     sense_resistor_mohm: 10,
    /// })
    /// .unwrap();
    ///
    /// assert_eq!(design_data.raw_current_to_uA(0), 0);
    /// assert_eq!(design_data.raw_current_to_uA(1), 156);
    /// assert_eq!(design_data.raw_current_to_uA(0xFFFF), -156);
    /// ```
    #[allow(non_snake_case)]
    #[inline]
    pub fn raw_current_to_uA(&self, raw: u16) -> i32 {
        let raw = raw as i16 as i32;

        (raw * 1_5625) / (self.r_sense as i32 * 10)
    }

    /// Converts the raw register value to a voltage value in μV.
    #[allow(non_snake_case)]
    #[inline]
    pub fn raw_voltage_to_uV(raw: u16) -> u32 {
        (raw as u32 * 625) / 8
    }

    /// Converts a raw time register value to seconds.
    #[inline]
    pub fn raw_time_to_s(raw: u16) -> u32 {
        (raw as u32 * 5_625) / 1_000
    }
}

/// Model parameters the gauge learns over the life of the cell.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LearnedParams {
    pub rcomp0: u16,
    pub temp_co: u16,
    pub full_cap_rep: u16,
    pub cycles: u16,
    pub full_cap_nom: u16,
}

impl LearnedParams {
    /// Device registers holding the parameters, in restore order.
    pub const REGISTERS: [u8; 5] = [
        RComp0::ADDRESS,
        TempCo::ADDRESS,
        FullCapRep::ADDRESS,
        Cycles::ADDRESS,
        FullCapNom::ADDRESS,
    ];

    /// Starting point for a cell the gauge has never seen.
    pub const fn initial(rcomp0: u16, temp_co: u16, design_capacity: u16) -> Self {
        Self {
            rcomp0,
            temp_co,
            full_cap_rep: design_capacity,
            cycles: 0,
            full_cap_nom: design_capacity,
        }
    }

    pub const fn to_words(&self) -> [u16; 5] {
        [
            self.rcomp0,
            self.temp_co,
            self.full_cap_rep,
            self.cycles,
            self.full_cap_nom,
        ]
    }

    pub const fn from_words(words: [u16; 5]) -> Self {
        let [rcomp0, temp_co, full_cap_rep, cycles, full_cap_nom] = words;
        Self {
            rcomp0,
            temp_co,
            full_cap_rep,
            cycles,
            full_cap_nom,
        }
    }
}

/// The latest fuel gauge outputs, refreshed on every poll.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FuelGaugeReading {
    pub rep_cap: u16,
    pub rep_soc: u16,
    pub time_to_empty: u16,
}

impl FuelGaugeReading {
    /// Reported remaining capacity in μAh.
    pub fn rep_cap_uah(&self, design: &DesignData) -> u32 {
        design.raw_capacity_to_uAh(self.rep_cap)
    }

    /// Reported state of charge in whole %.
    pub fn soc_percent(&self) -> u8 {
        (self.rep_soc >> 8) as u8
    }

    /// Estimated time to empty, `None` while the cell is not discharging.
    pub fn time_to_empty_s(&self) -> Option<u32> {
        if self.time_to_empty == u16::MAX {
            None
        } else {
            Some(DesignData::raw_time_to_s(self.time_to_empty))
        }
    }
}

/// Delays and bounds used while configuring the gauge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    pub poll_interval_ms: u32,
    pub max_polls: u16,
    /// Time between a verified write and its read-back.
    pub verify_settle_ms: u32,
}

impl Timing {
    pub const DEFAULT: Self = Self {
        poll_interval_ms: 10,
        max_polls: 100,
        verify_settle_ms: 1,
    };
}

impl Default for Timing {
    fn default() -> Self {
        Self::DEFAULT
    }
}

pub struct Max17263<I> {
    driver: ll::I2cInterface<I>,
    design: DesignData,
    timing: Timing,
    learned: LearnedParams,
    reading: FuelGaugeReading,
    led_cfg1: LedCfg1,
    led_cfg2: LedCfg2,
    led_cfg3: LedCfg3,
    cust_led: CustLed,
}

impl<I> Max17263<I> {
    pub const fn new(i2c: I, design: DesignData) -> Self {
        Self {
            driver: ll::I2cInterface::new(i2c),
            design,
            timing: Timing::DEFAULT,
            learned: LearnedParams::initial(0, 0, design.capacity),
            reading: FuelGaugeReading {
                rep_cap: 0,
                rep_soc: 0,
                time_to_empty: 0,
            },
            led_cfg1: LedCfg1::from_bits(LedCfg1::DEFAULT_VALUE),
            led_cfg2: LedCfg2::from_bits(LedCfg2::DEFAULT_VALUE),
            led_cfg3: LedCfg3::from_bits(LedCfg3::DEFAULT_VALUE),
            cust_led: CustLed::from_bits(CustLed::DEFAULT_VALUE),
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn design(&self) -> &DesignData {
        &self.design
    }

    pub fn learned_params(&self) -> &LearnedParams {
        &self.learned
    }

    pub fn reading(&self) -> &FuelGaugeReading {
        &self.reading
    }

    pub fn release(self) -> I {
        self.driver.i2c
    }
}

impl<I> Max17263<I>
where
    I: I2c,
{
    /// Whether the gauge lost its configuration.
    pub fn check_por(&mut self) -> Result<bool, I::Error> {
        let status = self.driver.read::<Status>()?;
        Ok(status.por().read())
    }

    /// Reads the Cycles register and reports whether its toggle bit changed since the last
    /// tracked value. The tracked value is updated on every call.
    pub fn check_cycles(&mut self) -> Result<bool, I::Error> {
        let cycles = self.driver.read::<Cycles>()?;
        let tracked = Cycles::from_bits(self.learned.cycles);

        let toggled = cycles.toggle().read() != tracked.toggle().read();
        self.learned.cycles = cycles.bits();

        if toggled {
            debug!("Cycles toggle bit flipped: {:#x}", cycles.bits());
        }

        Ok(toggled)
    }

    /// Reads the remaining capacity, state of charge and time to empty.
    pub fn read_fuel_gauge(&mut self) -> Result<FuelGaugeReading, I::Error> {
        self.reading = FuelGaugeReading {
            rep_cap: self.driver.read::<RepCap>()?.capacity().read(),
            rep_soc: self.driver.read::<RepSoc>()?.percentage().read(),
            time_to_empty: self.driver.read::<Tte>()?.time().read(),
        };

        Ok(self.reading)
    }

    pub fn read_learned_params(&mut self) -> Result<LearnedParams, I::Error> {
        Ok(LearnedParams {
            rcomp0: self.driver.read::<RComp0>()?.value().read(),
            temp_co: self.driver.read::<TempCo>()?.value().read(),
            full_cap_rep: self.driver.read::<FullCapRep>()?.capacity().read(),
            cycles: self.driver.read::<Cycles>()?.bits(),
            full_cap_nom: self.driver.read::<FullCapNom>()?.capacity().read(),
        })
    }

    /// Refreshes the learned parameters from the device and mirrors them to `store`.
    ///
    /// The datasheet recommends doing this every time the Cycles toggle bit flips, see
    /// [`Self::check_cycles`].
    pub fn save_learned_params<S>(
        &mut self,
        store: &mut LearnedParamStore<S>,
    ) -> Result<(), ConfigError<I::Error, S::Error>>
    where
        S: Storage,
    {
        self.learned = self
            .read_learned_params()
            .map_err(ConfigError::Transfer)?;

        store.save(&self.learned).map_err(ConfigError::Storage)?;

        info!("Learned parameters saved");
        Ok(())
    }

    /// Returns the design capacity in μAh.
    pub fn read_design_capacity(&mut self) -> Result<u32, I::Error> {
        let reg = self.driver.read::<DesignCap>()?;
        Ok(self.design.raw_capacity_to_uAh(reg.capacity().read()))
    }

    /// Returns the reported full capacity in μAh.
    pub fn read_reported_capacity(&mut self) -> Result<u32, I::Error> {
        let reg = self.driver.read::<FullCapRep>()?;
        Ok(self.design.raw_capacity_to_uAh(reg.capacity().read()))
    }

    /// Returns the cell age in %.
    pub fn read_cell_age(&mut self) -> Result<u8, I::Error> {
        let reg = self.driver.read::<Age>()?;
        Ok((reg.percentage().read() >> 8) as u8)
    }

    /// Returns the cell voltage in μV.
    pub fn read_vcell(&mut self) -> Result<u32, I::Error> {
        let reg = self.driver.read::<VCell>()?;
        Ok(DesignData::raw_voltage_to_uV(reg.voltage().read()))
    }

    /// Returns the average cell voltage in μV.
    pub fn read_avg_vcell(&mut self) -> Result<u32, I::Error> {
        let reg = self.driver.read::<AvgVCell>()?;
        Ok(DesignData::raw_voltage_to_uV(reg.voltage().read()))
    }

    /// Returns the battery current in μA.
    pub fn read_current(&mut self) -> Result<i32, I::Error> {
        let reg = self.driver.read::<Current>()?;
        Ok(self.design.raw_current_to_uA(reg.current().read()))
    }

    /// Returns the average battery current in μA.
    pub fn read_avg_current(&mut self) -> Result<i32, I::Error> {
        let reg = self.driver.read::<AvgCurrent>()?;
        Ok(self.design.raw_current_to_uA(reg.current().read()))
    }

    /// Returns the estimated time to full in seconds.
    pub fn read_time_to_full(&mut self) -> Result<u32, I::Error> {
        let reg = self.driver.read::<Ttf>()?;
        Ok(DesignData::raw_time_to_s(reg.time().read()))
    }
}
