use embedded_hal::i2c::I2c;
use register_access::{decode, encode, RegisterAccess};

pub struct I2cInterface<I> {
    pub i2c: I,
}

impl<I> I2cInterface<I> {
    pub const DEVICE_ADDR: u8 = 0x36;

    pub const fn new(i2c: I) -> Self {
        Self { i2c }
    }
}

impl<I> RegisterAccess for I2cInterface<I>
where
    I: I2c,
{
    type Error = I::Error;

    fn read_register(&mut self, address: u8) -> Result<u16, Self::Error> {
        let mut buffer = [0; 2];
        self.i2c
            .write_read(Self::DEVICE_ADDR, &[address], &mut buffer)?;
        Ok(decode(buffer))
    }

    fn write_register(&mut self, address: u8, value: u16) -> Result<(), Self::Error> {
        let [low, high] = encode(value);
        self.i2c.write(Self::DEVICE_ADDR, &[address, low, high])
    }
}
