#![cfg_attr(not(test), no_std)]

//! Register descriptions for devices with 16-bit registers.
//!
//! A register is a plain `u16` wrapped in a newtype generated by [`device!`]. Every field of a
//! register is described by a [`BitRange`], and all encoding and decoding goes through it, so the
//! bit layout is independent of any struct layout.

use core::marker::PhantomData;

/// A contiguous run of bits inside a 16-bit register word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitRange {
    pub pos: u8,
    pub width: u8,
}

impl BitRange {
    /// Describes bits `pos..end`.
    pub const fn new(pos: u8, end: u8) -> Self {
        assert!(pos < end && end <= 16, "bit range out of bounds");
        Self {
            pos,
            width: end - pos,
        }
    }

    pub const fn bit(pos: u8) -> Self {
        Self::new(pos, pos + 1)
    }

    pub const fn mask(self) -> u16 {
        (((1u32 << self.width) - 1) << self.pos) as u16
    }

    /// Largest value the field can hold.
    pub const fn max_value(self) -> u16 {
        ((1u32 << self.width) - 1) as u16
    }

    /// Extracts the field from a register word.
    pub const fn decode(self, word: u16) -> u16 {
        (word & self.mask()) >> self.pos
    }

    /// Replaces the field in `word` with `value`. Bits of `value` above the field width are
    /// discarded.
    pub const fn encode(self, word: u16, value: u16) -> u16 {
        (word & !self.mask()) | ((value << self.pos) & self.mask())
    }
}

/// Compile-time check that no two fields of a register share a bit.
pub const fn assert_disjoint(fields: &[(&str, BitRange)]) {
    let mut seen = 0u16;
    let mut i = 0;
    while i < fields.len() {
        let mask = fields[i].1.mask();
        assert!(seen & mask == 0, "overlapping register fields");
        seen |= mask;
        i += 1;
    }
}

/// Conversion between a field's raw bits and its typed value.
pub trait FieldValue: Copy {
    fn from_field(raw: u16) -> Self;
    fn into_field(self) -> u16;
}

impl FieldValue for bool {
    fn from_field(raw: u16) -> Self {
        raw != 0
    }

    fn into_field(self) -> u16 {
        self as u16
    }
}

impl FieldValue for u8 {
    fn from_field(raw: u16) -> Self {
        raw as u8
    }

    fn into_field(self) -> u16 {
        self as u16
    }
}

impl FieldValue for u16 {
    fn from_field(raw: u16) -> Self {
        raw
    }

    fn into_field(self) -> u16 {
        self
    }
}

pub trait ReadOnlyRegister: Copy {
    const ADDRESS: u8;
    const NAME: &'static str;

    fn bits(&self) -> u16;
    fn from_bits(bits: u16) -> Self;
}

pub trait Register: ReadOnlyRegister {
    const DEFAULT_VALUE: u16;
}

/// Typed view of one field of a register value.
pub struct Field<const POS: u8, const END: u8, T, R> {
    reg: R,
    _marker: PhantomData<T>,
}

impl<const POS: u8, const END: u8, T, R> Field<POS, END, T, R>
where
    T: FieldValue,
    R: ReadOnlyRegister,
{
    pub const RANGE: BitRange = BitRange::new(POS, END);

    pub const fn new(reg: R) -> Self {
        Self {
            reg,
            _marker: PhantomData,
        }
    }

    pub const fn range(&self) -> BitRange {
        Self::RANGE
    }

    #[inline(always)]
    pub fn read(&self) -> T {
        T::from_field(Self::RANGE.decode(self.reg.bits()))
    }
}

impl<const POS: u8, const END: u8, T, R> Field<POS, END, T, R>
where
    T: FieldValue,
    R: Register,
{
    /// Returns the register value with this field replaced.
    #[inline(always)]
    pub fn write(self, value: T) -> R {
        R::from_bits(Self::RANGE.encode(self.reg.bits(), value.into_field()))
    }
}

/// Declares an enum that covers every value of an `N`-bit field.
///
/// Variants must be listed in ascending order starting at zero, one for each possible value, which
/// makes decoding total.
#[macro_export]
macro_rules! field_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident: $width:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[repr(u8)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value ),+
        }

        impl $name {
            const TABLE: [Self; 1 << $width] = [ $( Self::$variant ),+ ];
        }

        const _: () = {
            let mut i = 0;
            while i < $name::TABLE.len() {
                assert!($name::TABLE[i] as usize == i, "variants must be listed in value order");
                i += 1;
            }
        };

        impl $crate::FieldValue for $name {
            fn from_field(raw: u16) -> Self {
                Self::TABLE[(raw as usize) & ((1 << $width) - 1)]
            }

            fn into_field(self) -> u16 {
                self as u16
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! register {
    (
        $(#[$meta:meta])*
        $reg:ident(addr = $addr:literal) {
            $( $(#[$fmeta:meta])* $field:ident @ $pos:literal .. $end:literal => $ty:ty ),*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[must_use]
        #[allow(non_camel_case_types)]
        pub struct $reg {
            value: u16,
        }

        impl $reg {
            pub const FIELDS: &'static [(&'static str, $crate::BitRange)] = &[
                $( (stringify!($field), $crate::BitRange::new($pos, $end)) ),*
            ];

            pub const fn from_bits(bits: u16) -> Self {
                Self { value: bits }
            }

            pub const fn bits(self) -> u16 {
                self.value
            }

            $(
                $(#[$fmeta])*
                #[inline(always)]
                pub const fn $field(self) -> $crate::Field<$pos, $end, $ty, Self> {
                    $crate::Field::new(self)
                }
            )*
        }

        const _: () = $crate::assert_disjoint($reg::FIELDS);

        impl $crate::ReadOnlyRegister for $reg {
            const ADDRESS: u8 = $addr;
            const NAME: &'static str = stringify!($reg);

            #[inline(always)]
            fn bits(&self) -> u16 {
                self.value
            }

            #[inline(always)]
            fn from_bits(bits: u16) -> Self {
                Self { value: bits }
            }
        }
    };

    (
        $(#[$meta:meta])*
        $reg:ident(addr = $addr:literal, default = $default:literal) {
            $( $(#[$fmeta:meta])* $field:ident @ $pos:literal .. $end:literal => $ty:ty ),*
        }
    ) => {
        $crate::register! {
            $(#[$meta])*
            $reg(addr = $addr) {
                $( $(#[$fmeta])* $field @ $pos .. $end => $ty ),*
            }
        }

        impl $crate::Register for $reg {
            const DEFAULT_VALUE: u16 = $default;
        }

        impl Default for $reg {
            #[inline(always)]
            fn default() -> Self {
                Self::from_bits($default)
            }
        }
    };
}

/// Declares the register map of a device.
///
/// Registers declared with a `default` value are writable.
#[macro_export]
macro_rules! device {
    (
        $(
            $(#[$meta:meta])*
            $reg:ident(addr = $addr:literal $(, default = $default:literal)?) {
                $( $(#[$fmeta:meta])* $field:ident @ $pos:literal .. $end:literal => $ty:ty ),* $(,)?
            }
        )+
    ) => {
        $(
            $crate::register! {
                $(#[$meta])*
                $reg(addr = $addr $(, default = $default)?) {
                    $( $(#[$fmeta])* $field @ $pos .. $end => $ty ),*
                }
            }
        )+
    };
}

#[cfg(test)]
mod test {
    use super::*;

    field_enum! {
        pub enum Speed: 2 {
            Off = 0,
            Slow = 1,
            Fast = 2,
            Max = 3,
        }
    }

    device! {
        Ctrl(addr = 0x40, default = 0x6070) {
            count @ 0..4 => u8,
            enable @ 4..5 => bool,
            speed @ 6..8 => Speed,
            timer @ 13..16 => u8
        }
        Level(addr = 0x05) {
            value @ 0..16 => u16
        }
    }

    #[test]
    fn bit_range_masks() {
        assert_eq!(BitRange::new(0, 4).mask(), 0x000F);
        assert_eq!(BitRange::new(7, 16).mask(), 0xFF80);
        assert_eq!(BitRange::bit(15).mask(), 0x8000);
        assert_eq!(BitRange::new(0, 16).mask(), 0xFFFF);
        assert_eq!(BitRange::new(10, 13).max_value(), 7);
    }

    #[test]
    fn encode_only_touches_the_field() {
        let range = BitRange::new(7, 16);

        assert_eq!(range.decode(0xA561), 0x14A);
        assert_eq!(range.encode(0xA561, 0x100), 0x8061);
        assert_eq!(range.encode(0x0000, 0xFFFF), 0xFF80);
    }

    #[test]
    fn fields_decode_register_value() {
        let ctrl = Ctrl::default();

        assert_eq!(ctrl.count().read(), 0);
        assert!(ctrl.enable().read());
        assert_eq!(ctrl.speed().read(), Speed::Slow);
        assert_eq!(ctrl.timer().read(), 3);
    }

    #[test]
    fn field_writes_return_updated_register() {
        let ctrl = Ctrl::default().count().write(4);
        let ctrl = ctrl.speed().write(Speed::Max);
        let ctrl = ctrl.enable().write(false);

        assert_eq!(ctrl.bits(), 0x60E4);
        assert_eq!(<Ctrl as ReadOnlyRegister>::ADDRESS, 0x40);
        assert_eq!(<Ctrl as ReadOnlyRegister>::NAME, "Ctrl");
    }

    #[test]
    fn read_only_register_exposes_fields() {
        let level = Level::from_bits(0x1234);
        assert_eq!(level.value().read(), 0x1234);
        assert_eq!(Level::FIELDS.len(), 1);
        assert_eq!(level.value().range(), BitRange::new(0, 16));
    }
}
