use device_descriptor::ReadOnlyRegister;
use embedded_hal::{delay::DelayNs, i2c::I2c};
use embedded_storage::Storage;
use register_access::RegisterAccess;

use crate::{
    descriptors::{Command, DesignCap, FStat, HibCfg, IChgTerm, ModelCfg, RComp0, Status, TempCo},
    ConfigError, LearnedParamStore, LearnedParams, Max17263, NvState, Wait,
};

impl<I> Max17263<I>
where
    I: I2c,
{
    /// Polls `R` until `busy` returns false, at most `Timing::max_polls` times.
    fn wait_until_clear<R, SE>(
        &mut self,
        wait: Wait,
        delay: &mut impl DelayNs,
        busy: impl Fn(R) -> bool,
    ) -> Result<(), ConfigError<I::Error, SE>>
    where
        R: ReadOnlyRegister,
    {
        for _ in 0..self.timing.max_polls {
            let reg = self.driver.read::<R>().map_err(ConfigError::Transfer)?;
            if !busy(reg) {
                return Ok(());
            }
            delay.delay_ms(self.timing.poll_interval_ms);
        }

        error!("Gauge stuck waiting for {:?}", wait);
        Err(ConfigError::NotResponding(wait))
    }

    fn write_learned_params(&mut self, params: &LearnedParams) -> Result<(), I::Error> {
        for (address, value) in LearnedParams::REGISTERS.into_iter().zip(params.to_words()) {
            self.driver.write_register(address, value)?;
        }
        Ok(())
    }

    /// Loads the EZ Config model and the learned parameters into the gauge and clears the
    /// power-on reset flag.
    ///
    /// Learned parameters come from `store` if it has been seeded. Otherwise they are derived
    /// from the device defaults and the design capacity, and the store is seeded with them.
    pub fn load_config<S>(
        &mut self,
        store: &mut LearnedParamStore<S>,
        delay: &mut impl DelayNs,
    ) -> Result<(), ConfigError<I::Error, S::Error>>
    where
        S: Storage,
    {
        let nv_state = store.state().map_err(ConfigError::Storage)?;
        debug!("Learned parameter storage: {:?}", nv_state);

        self.wait_until_clear::<FStat, S::Error>(Wait::DataReady, delay, |fstat| {
            fstat.dnr().read()
        })?;

        let hib_cfg = self
            .driver
            .read::<HibCfg>()
            .map_err(ConfigError::Transfer)?;
        self.exit_hibernation().map_err(ConfigError::Transfer)?;
        debug!("Hibernation disabled, saved HibCfg: {:#x}", hib_cfg.bits());

        self.ez_config().map_err(ConfigError::Transfer)?;
        self.wait_until_clear::<ModelCfg, S::Error>(Wait::ModelRefresh, delay, |model_cfg| {
            model_cfg.refresh().read()
        })?;
        debug!("Model loaded");

        let params = match nv_state {
            NvState::Uninitialized => {
                let rcomp0 = self.driver.read::<RComp0>().map_err(ConfigError::Transfer)?;
                let temp_co = self.driver.read::<TempCo>().map_err(ConfigError::Transfer)?;

                let params = LearnedParams::initial(
                    rcomp0.value().read(),
                    temp_co.value().read(),
                    self.design.capacity,
                );
                store.seed(&params).map_err(ConfigError::Storage)?;
                params
            }
            NvState::Restored => store.load().map_err(ConfigError::Storage)?,
        };

        self.learned = params;
        self.write_learned_params(&params)
            .map_err(ConfigError::Transfer)?;
        debug!("Learned parameters restored: {:?}", params);

        self.driver.write(hib_cfg).map_err(ConfigError::Transfer)?;

        let (led_cfg1, led_cfg2, led_cfg3) = self.led_config();
        self.driver.write(led_cfg1).map_err(ConfigError::Transfer)?;
        self.driver.write(led_cfg2).map_err(ConfigError::Transfer)?;
        self.driver.write(led_cfg3).map_err(ConfigError::Transfer)?;

        self.clear_por::<S::Error>(delay)?;

        info!("Gauge configured");
        Ok(())
    }

    fn exit_hibernation(&mut self) -> Result<(), I::Error> {
        self.driver.write(Command::CLEAR)?;
        self.driver.write(HibCfg::from_bits(0))?;
        self.driver.write(Command::SOFT_WAKEUP)
    }

    fn ez_config(&mut self) -> Result<(), I::Error> {
        let design = self.design;

        self.driver.write(DesignCap::from_bits(design.capacity))?;
        self.driver.write(IChgTerm::from_bits(design.i_chg_term))?;
        self.driver.write(design.v_empty)?;
        self.driver.write(design.model_cfg.refresh().write(true))
    }

    fn clear_por<SE>(
        &mut self,
        delay: &mut impl DelayNs,
    ) -> Result<(), ConfigError<I::Error, SE>> {
        let status = self.driver.read::<Status>().map_err(ConfigError::Transfer)?;
        let expected = status.por().write(false).bits();

        let verification = self
            .driver
            .write_and_verify(
                <Status as ReadOnlyRegister>::ADDRESS,
                expected,
                delay,
                self.timing.verify_settle_ms,
            )
            .map_err(ConfigError::Transfer)?;

        if !verification.matched {
            error!(
                "Failed to clear POR after {} attempts, Status: {:#x}",
                verification.attempts, verification.readback
            );
            return Err(ConfigError::Verify {
                register: <Status as ReadOnlyRegister>::ADDRESS,
                expected,
                readback: verification.readback,
            });
        }

        Ok(())
    }
}
