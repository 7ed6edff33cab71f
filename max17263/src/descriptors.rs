use device_descriptor::{device, field_enum};

field_enum! {
    /// When the LED bar graph lights up.
    pub enum LedMode: 2 {
        Off = 0,
        /// Lit for the configured timer after a button press.
        PushButtonTimer = 1,
        /// Lit while the button is held.
        PushButton = 2,
        AlwaysOn = 3,
    }
}

field_enum! {
    pub enum AnimationMode: 2 {
        Off = 0,
        Fill = 1,
        Breathe = 2,
        FillBreathe = 3,
    }
}

field_enum! {
    /// How long the LEDs stay lit in push-button timer mode.
    pub enum LedTimer: 3 {
        Ms100 = 0,
        Ms300 = 1,
        Ms600 = 2,
        Ms1300 = 3,
        Ms2700 = 4,
        Ms5500 = 5,
        Ms8600 = 6,
        S10 = 7,
    }
}

field_enum! {
    /// Charge voltage the model is tuned for.
    pub enum ChargeVoltage: 1 {
        V4_2 = 0,
        V4_4 = 1,
    }
}

device! {
    Status(addr = 0x00, default = 0x8082) {
        /// Power-on reset. Set by the device, cleared by the host after configuration.
        por @ 1..2 => bool,
        current_min @ 2..3 => bool,
        battery_status @ 3..4 => bool,
        current_max @ 6..7 => bool,
        soc_changed @ 7..8 => bool,
        voltage_min @ 8..9 => bool,
        temperature_min @ 9..10 => bool,
        soc_min @ 10..11 => bool,
        battery_insertion @ 11..12 => bool,
        voltage_max @ 12..13 => bool,
        temperature_max @ 13..14 => bool,
        soc_max @ 14..15 => bool,
        battery_removal @ 15..16 => bool,
    }

    /// LSB = 5μVh / r_sense
    RepCap(addr = 0x05) {
        capacity @ 0..16 => u16,
    }

    /// LSB = 1/256 %
    RepSoc(addr = 0x06) {
        percentage @ 0..16 => u16,
    }

    Age(addr = 0x07) {
        percentage @ 0..16 => u16,
    }

    /// LSB = 78.125μV
    VCell(addr = 0x09) {
        voltage @ 0..16 => u16,
    }

    /// Two's complement, LSB = 1.5625μV / r_sense
    Current(addr = 0x0A) {
        current @ 0..16 => u16,
    }

    AvgCurrent(addr = 0x0B) {
        current @ 0..16 => u16,
    }

    FullCapRep(addr = 0x10) {
        capacity @ 0..16 => u16,
    }

    /// LSB = 5.625s
    Tte(addr = 0x11) {
        time @ 0..16 => u16,
    }

    /// LSB = 1%
    Cycles(addr = 0x17) {
        /// Flips every 64% of accumulated charge or discharge.
        toggle @ 6..7 => bool,
    }

    DesignCap(addr = 0x18, default = 0x0BB8) {
        capacity @ 0..16 => u16,
    }

    AvgVCell(addr = 0x19) {
        voltage @ 0..16 => u16,
    }

    IChgTerm(addr = 0x1E, default = 0x0640) {
        current @ 0..16 => u16,
    }

    Ttf(addr = 0x20) {
        time @ 0..16 => u16,
    }

    FullCapNom(addr = 0x23) {
        capacity @ 0..16 => u16,
    }

    LedCfg3(addr = 0x37, default = 0x8000) {
        custom_led_control @ 13..14 => bool,
        dnc @ 14..15 => bool,
        full_speed @ 15..16 => bool,
    }

    RComp0(addr = 0x38) {
        value @ 0..16 => u16,
    }

    TempCo(addr = 0x39) {
        value @ 0..16 => u16,
    }

    VEmpty(addr = 0x3A, default = 0xA561) {
        /// LSB = 40mV
        recovery @ 0..7 => u8,
        /// LSB = 10mV
        empty @ 7..16 => u16,
    }

    FStat(addr = 0x3D) {
        /// Data not ready, set while the gauge is starting up.
        dnr @ 0..1 => bool,
        relaxed_long @ 6..7 => bool,
        full_qualified @ 7..8 => bool,
        empty_detected @ 8..9 => bool,
        relaxed @ 9..10 => bool,
    }

    LedCfg1(addr = 0x40, default = 0x6070) {
        bars @ 0..4 => u8,
        grayscale @ 4..5 => bool,
        charge_indicator @ 5..6 => bool,
        mode @ 6..8 => LedMode,
        animation_mode @ 8..10 => AnimationMode,
        animation_step @ 10..13 => u8,
        timer @ 13..16 => LedTimer,
    }

    LedCfg2(addr = 0x4B, default = 0x011F) {
        brightness @ 0..5 => u8,
        full_blink @ 5..6 => bool,
        empty_blink @ 6..7 => bool,
        gray_blink @ 7..8 => bool,
        auto_count @ 8..10 => u8,
        led_voltage @ 10..15 => u8,
        direct_led @ 15..16 => bool,
    }

    Command(addr = 0x60, default = 0x0000) {
        code @ 0..16 => u16,
    }

    CustLed(addr = 0x64, default = 0x0000) {
        pattern @ 0..16 => u16,
    }

    HibCfg(addr = 0xBA, default = 0x870C) {
        scalar @ 0..3 => u8,
        exit_time @ 3..5 => u8,
        threshold @ 8..12 => u8,
        enter_time @ 12..15 => u8,
        enabled @ 15..16 => bool,
    }

    ModelCfg(addr = 0xDB, default = 0x8400) {
        csel @ 2..3 => bool,
        vsel @ 3..4 => bool,
        model_id @ 4..8 => u8,
        charge_voltage @ 10..11 => ChargeVoltage,
        r100 @ 13..14 => bool,
        /// Set by the host to load the model, cleared by the device when done.
        refresh @ 15..16 => bool,
    }
}

impl Command {
    pub const CLEAR: Self = Self::from_bits(0x0000);
    pub const SOFT_WAKEUP: Self = Self::from_bits(0x0090);
}
