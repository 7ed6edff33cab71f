//! LED driver and model setters.
//!
//! Each setter updates the register copy held by the driver and writes the whole register. The
//! device is never read back first. Values wider than their field are truncated.

use embedded_hal::{delay::DelayNs, i2c::I2c};
use register_access::RegisterAccess;

use crate::{
    descriptors::{
        AnimationMode, ChargeVoltage, CustLed, LedCfg1, LedCfg2, LedCfg3, LedMode, LedTimer,
        ModelCfg, VEmpty,
    },
    Max17263,
};

impl<I> Max17263<I>
where
    I: I2c,
{
    fn write_led_cfg1(&mut self, reg: LedCfg1) -> Result<(), I::Error> {
        self.led_cfg1 = reg;
        self.driver.write(reg)
    }

    fn write_led_cfg2(&mut self, reg: LedCfg2) -> Result<(), I::Error> {
        self.led_cfg2 = reg;
        self.driver.write(reg)
    }

    fn write_led_cfg3(&mut self, reg: LedCfg3) -> Result<(), I::Error> {
        self.led_cfg3 = reg;
        self.driver.write(reg)
    }

    /// Number of LEDs in the bar graph, 0 to 15.
    pub fn set_led_bars(&mut self, bars: u8) -> Result<(), I::Error> {
        self.write_led_cfg1(self.led_cfg1.bars().write(bars))
    }

    pub fn enable_led_grayscale(&mut self, enable: bool) -> Result<(), I::Error> {
        self.write_led_cfg1(self.led_cfg1.grayscale().write(enable))
    }

    /// Lights the LEDs while charging.
    pub fn enable_led_charge_indicator(&mut self, enable: bool) -> Result<(), I::Error> {
        self.write_led_cfg1(self.led_cfg1.charge_indicator().write(enable))
    }

    pub fn set_led_mode(&mut self, mode: LedMode) -> Result<(), I::Error> {
        self.write_led_cfg1(self.led_cfg1.mode().write(mode))
    }

    pub fn set_led_animation_mode(&mut self, mode: AnimationMode) -> Result<(), I::Error> {
        self.write_led_cfg1(self.led_cfg1.animation_mode().write(mode))
    }

    pub fn set_led_animation_step(&mut self, step: u8) -> Result<(), I::Error> {
        self.write_led_cfg1(self.led_cfg1.animation_step().write(step))
    }

    pub fn set_led_timer(&mut self, timer: LedTimer) -> Result<(), I::Error> {
        self.write_led_cfg1(self.led_cfg1.timer().write(timer))
    }

    /// LED brightness, 0 to 31.
    pub fn set_led_brightness(&mut self, brightness: u8) -> Result<(), I::Error> {
        self.write_led_cfg2(self.led_cfg2.brightness().write(brightness))
    }

    pub fn enable_led_full_blink(&mut self, enable: bool) -> Result<(), I::Error> {
        self.write_led_cfg2(self.led_cfg2.full_blink().write(enable))
    }

    pub fn enable_led_empty_blink(&mut self, enable: bool) -> Result<(), I::Error> {
        self.write_led_cfg2(self.led_cfg2.empty_blink().write(enable))
    }

    pub fn enable_led_gray_blink(&mut self, enable: bool) -> Result<(), I::Error> {
        self.write_led_cfg2(self.led_cfg2.gray_blink().write(enable))
    }

    pub fn set_led_auto_count(&mut self, count: u8) -> Result<(), I::Error> {
        self.write_led_cfg2(self.led_cfg2.auto_count().write(count))
    }

    pub fn set_led_voltage(&mut self, voltage: u8) -> Result<(), I::Error> {
        self.write_led_cfg2(self.led_cfg2.led_voltage().write(voltage))
    }

    pub fn enable_direct_led(&mut self, enable: bool) -> Result<(), I::Error> {
        self.write_led_cfg2(self.led_cfg2.direct_led().write(enable))
    }

    /// Hands the LEDs over to the CustLED register.
    pub fn enable_custom_led_control(&mut self, enable: bool) -> Result<(), I::Error> {
        self.write_led_cfg3(self.led_cfg3.custom_led_control().write(enable))
    }

    /// One bit per LED, only shown while custom LED control is enabled.
    pub fn set_custom_led_pattern(&mut self, pattern: u16) -> Result<(), I::Error> {
        self.cust_led = CustLed::from_bits(pattern);
        self.driver.write(self.cust_led)
    }

    /// Lights each LED in turn for `step_ms`, then restores the previous LED control.
    pub fn walk_leds(&mut self, delay: &mut impl DelayNs, step_ms: u32) -> Result<(), I::Error> {
        let previous = self.led_cfg3;
        let bars = self.led_cfg1.bars().read().max(1);

        self.write_led_cfg3(previous.custom_led_control().write(true))?;
        for led in 0..bars {
            self.set_custom_led_pattern(1 << led)?;
            delay.delay_ms(step_ms);
        }

        self.set_custom_led_pattern(0)?;
        self.write_led_cfg3(previous)
    }

    fn write_v_empty(&mut self, reg: VEmpty) -> Result<(), I::Error> {
        self.design.v_empty = reg;
        self.driver.write(reg)
    }

    /// Voltage regarded as empty, in 10 mV steps up to 5110 mV. Larger values are clamped.
    pub fn set_empty_voltage(&mut self, millivolts: u16) -> Result<(), I::Error> {
        let field = self.design.v_empty.empty();
        let raw = (millivolts / 10).min(field.range().max_value());
        self.write_v_empty(field.write(raw))
    }

    /// Voltage at which the empty detection is released, in 40 mV steps up to 5080 mV. Larger
    /// values are clamped.
    pub fn set_recovery_voltage(&mut self, millivolts: u16) -> Result<(), I::Error> {
        let field = self.design.v_empty.recovery();
        let raw = (millivolts / 40).min(field.range().max_value()) as u8;
        self.write_v_empty(field.write(raw))
    }

    /// Selects the cell model. Takes effect on the next configuration load.
    pub fn set_model(
        &mut self,
        model_id: u8,
        charge_voltage: ChargeVoltage,
        r100: bool,
    ) -> Result<(), I::Error> {
        let reg = self.design.model_cfg.model_id().write(model_id);
        let reg = reg.charge_voltage().write(charge_voltage);
        let reg: ModelCfg = reg.r100().write(r100);

        self.design.model_cfg = reg;
        self.driver.write(reg)
    }

    /// Register values the next configuration load writes.
    pub fn led_config(&self) -> (LedCfg1, LedCfg2, LedCfg3) {
        (self.led_cfg1, self.led_cfg2, self.led_cfg3)
    }
}

#[cfg(test)]
mod test {
    use embedded_hal_mock::eh1::{
        delay::NoopDelay,
        i2c::{Mock, Transaction},
    };

    use super::*;
    use crate::{BatteryParameters, DesignData};

    fn write(reg: u8, value: u16) -> Transaction {
        let [low, high] = value.to_le_bytes();
        Transaction::write(0x36, vec![reg, low, high])
    }

    fn gauge(expectations: &[Transaction]) -> Max17263<Mock> {
        let design = DesignData::new(BatteryParameters {
            capacity_mah: 1200,
            charge_termination_ma: 100,
            sense_resistor_mohm: 10,
        })
        .unwrap();

        Max17263::new(Mock::new(expectations), design)
    }

    #[test]
    fn led_cfg1_setters_accumulate() {
        let mut gauge = gauge(&[
            write(0x40, 0x6074),
            write(0x40, 0x6074),
            write(0x40, 0x6074),
            write(0x40, 0x6074),
            write(0x40, 0x6054),
            write(0x40, 0x6154),
            write(0x40, 0x6D54),
        ]);

        gauge.set_led_bars(4).unwrap();
        gauge.set_led_mode(LedMode::PushButtonTimer).unwrap();
        gauge.set_led_timer(LedTimer::Ms1300).unwrap();
        gauge.enable_led_charge_indicator(true).unwrap();
        gauge.enable_led_charge_indicator(false).unwrap();
        gauge.set_led_animation_mode(AnimationMode::Fill).unwrap();
        gauge.set_led_animation_step(3).unwrap();

        assert_eq!(gauge.led_config().0.bits(), 0x6D54);
        gauge.release().done();
    }

    #[test]
    fn led_cfg2_setters_accumulate() {
        let mut gauge = gauge(&[
            write(0x4B, 0x010A),
            write(0x4B, 0x014A),
            write(0x4B, 0x814A),
            write(0x4B, 0x894A),
        ]);

        gauge.set_led_brightness(10).unwrap();
        gauge.enable_led_empty_blink(true).unwrap();
        gauge.enable_direct_led(true).unwrap();
        gauge.set_led_voltage(2).unwrap();

        gauge.release().done();
    }

    #[test]
    fn oversized_values_are_truncated_to_the_field() {
        let mut gauge = gauge(&[write(0x40, 0x607F)]);

        gauge.set_led_bars(0x1F).unwrap();

        gauge.release().done();
    }

    #[test]
    fn failed_write_still_updates_the_copy() {
        let mut gauge = gauge(&[
            write(0x4B, 0x0100).with_error(embedded_hal::i2c::ErrorKind::Other),
        ]);

        assert!(gauge.set_led_brightness(0).is_err());
        assert_eq!(gauge.led_config().1.bits(), 0x0100);

        gauge.release().done();
    }

    #[test]
    fn empty_and_recovery_voltage() {
        let mut gauge = gauge(&[write(0x3A, 0x9661), write(0x3A, 0x9658)]);

        gauge.set_empty_voltage(3000).unwrap();
        gauge.set_recovery_voltage(3520).unwrap();

        assert_eq!(gauge.design().v_empty.bits(), 0x9658);
        gauge.release().done();
    }

    #[test]
    fn out_of_range_voltages_are_clamped() {
        let mut gauge = gauge(&[write(0x3A, 0xFFE1), write(0x3A, 0xFFFF)]);

        gauge.set_empty_voltage(6000).unwrap();
        assert_eq!(gauge.design().v_empty.empty().read(), 511);

        gauge.set_recovery_voltage(6000).unwrap();
        assert_eq!(gauge.design().v_empty.recovery().read(), 127);

        gauge.release().done();
    }

    #[test]
    fn model_selection() {
        let mut gauge = gauge(&[write(0xDB, 0xA060)]);

        gauge.set_model(6, ChargeVoltage::V4_2, true).unwrap();

        assert_eq!(gauge.design().model_cfg.bits(), 0xA060);
        gauge.release().done();
    }

    #[test]
    fn led_walk_restores_control() {
        let mut gauge = gauge(&[
            write(0x40, 0x6073),
            write(0x37, 0xA000),
            write(0x64, 0x0001),
            write(0x64, 0x0002),
            write(0x64, 0x0004),
            write(0x64, 0x0000),
            write(0x37, 0x8000),
        ]);

        gauge.set_led_bars(3).unwrap();
        gauge.walk_leds(&mut NoopDelay::new(), 1000).unwrap();

        assert_eq!(gauge.led_config().2.bits(), 0x8000);
        gauge.release().done();
    }
}
