#![cfg_attr(not(test), no_std)]

//! Blocking controller driver for a TWI (two-wire, I2C compatible) peripheral.
//!
//! Every bus phase is started by a [`Command`], then the driver spins on the completion flag and
//! checks the resulting [`BusStatus`]. Any unexpected status abandons the transaction and releases
//! the bus with a stop condition.

#[macro_use]
extern crate logger;

use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress};

mod config;
mod status;

pub use config::{InvalidBusClock, TwiConfig, SCL_100KHZ, SCL_400KHZ};
pub use status::{BusError, BusStatus};

/// Bus actions the peripheral can perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Generate a start, or a repeated start if the bus is still held.
    Start,
    Stop,
    /// Shift out the contents of the data register.
    Transmit,
    /// Receive a byte and acknowledge it.
    ReceiveAck,
    /// Receive a byte and answer with a not-acknowledge.
    ReceiveNack,
}

/// Register-level access to the peripheral.
pub trait TwiPeripheral {
    /// Programs the bit-rate divider (prescaler 1) and enables the peripheral.
    fn configure(&mut self, bit_rate: u8);

    fn disable(&mut self);

    /// Starts a bus action and clears the completion flag.
    fn command(&mut self, command: Command);

    /// Whether the last action other than `Stop` has completed.
    fn is_complete(&mut self) -> bool;

    /// Whether a stop condition is still being generated.
    fn is_stop_pending(&mut self) -> bool;

    fn status(&mut self) -> BusStatus;

    fn write_data(&mut self, byte: u8);

    fn read_data(&mut self) -> u8;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Write = 0,
    Read = 1,
}

impl Direction {
    const fn address_ack(self) -> BusStatus {
        match self {
            Direction::Write => BusStatus::WRITE_ADDRESS_ACK,
            Direction::Read => BusStatus::READ_ADDRESS_ACK,
        }
    }
}

pub struct TwiBus<P> {
    peripheral: P,
}

impl<P> TwiBus<P>
where
    P: TwiPeripheral,
{
    pub fn new(mut peripheral: P, config: TwiConfig) -> Result<Self, InvalidBusClock> {
        let bit_rate = config.bit_rate()?;
        peripheral.configure(bit_rate);

        debug!("TWI: bit rate register set to {}", bit_rate);

        Ok(Self { peripheral })
    }

    /// Disables the peripheral and gives it back.
    pub fn release(mut self) -> P {
        self.peripheral.disable();
        self.peripheral
    }

    fn wait_for_completion(&mut self) {
        while !self.peripheral.is_complete() {
            core::hint::spin_loop();
        }
    }

    fn run(&mut self, command: Command) -> BusStatus {
        self.peripheral.command(command);
        self.wait_for_completion();
        self.peripheral.status()
    }

    fn expect(status: BusStatus, accepted: &[BusStatus]) -> Result<(), BusError> {
        if accepted.contains(&status) {
            Ok(())
        } else {
            Err(BusError { status })
        }
    }

    /// Generates a (repeated) start and addresses the target.
    pub fn start(&mut self, address: SevenBitAddress, direction: Direction) -> Result<(), BusError> {
        let status = self.run(Command::Start);
        Self::expect(status, &[BusStatus::START, BusStatus::REPEATED_START])?;

        self.peripheral.write_data((address << 1) | direction as u8);
        let status = self.run(Command::Transmit);
        Self::expect(status, &[direction.address_ack()])
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        self.peripheral.write_data(byte);
        let status = self.run(Command::Transmit);
        Self::expect(status, &[BusStatus::WRITE_DATA_ACK])
    }

    /// Receives a byte and asks the target for more.
    pub fn read_byte_ack(&mut self) -> Result<u8, BusError> {
        let status = self.run(Command::ReceiveAck);
        Self::expect(status, &[BusStatus::READ_DATA_ACK])?;
        Ok(self.peripheral.read_data())
    }

    /// Receives the last byte of a read.
    pub fn read_byte_nack(&mut self) -> Result<u8, BusError> {
        let status = self.run(Command::ReceiveNack);
        Self::expect(status, &[BusStatus::READ_DATA_NACK])?;
        Ok(self.peripheral.read_data())
    }

    /// Generates a stop condition and waits until it is on the bus.
    pub fn stop(&mut self) {
        self.peripheral.command(Command::Stop);
        while self.peripheral.is_stop_pending() {
            core::hint::spin_loop();
        }
    }

    fn read_into(&mut self, buffer: &mut [u8], nack_last: bool) -> Result<(), BusError> {
        let Some((last, head)) = buffer.split_last_mut() else {
            return Ok(());
        };

        for byte in head.iter_mut() {
            *byte = self.read_byte_ack()?;
        }

        *last = if nack_last {
            self.read_byte_nack()?
        } else {
            self.read_byte_ack()?
        };

        Ok(())
    }

    fn transact_inner(
        &mut self,
        address: SevenBitAddress,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), BusError> {
        if !write.is_empty() || read.is_empty() {
            self.start(address, Direction::Write)?;
            for &byte in write {
                self.write_byte(byte)?;
            }
        }

        if !read.is_empty() {
            self.start(address, Direction::Read)?;
            self.read_into(read, true)?;
        }

        Ok(())
    }

    /// Writes `write`, then reads `read.len()` bytes after a repeated start.
    ///
    /// Either phase is skipped when its buffer is empty. With both empty, only the address is
    /// probed. The bus is released at the end unless `keep_open` is set, and always on failure.
    pub fn transact(
        &mut self,
        address: SevenBitAddress,
        write: &[u8],
        read: &mut [u8],
        keep_open: bool,
    ) -> Result<(), BusError> {
        let result = self.transact_inner(address, write, read);

        if let Err(e) = result {
            warn!("TWI: transfer to {:#x} failed: {:?}", address, e);
        }

        if result.is_err() || !keep_open {
            self.stop();
        }

        result
    }

    fn run_operations(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), BusError> {
        let mut previous = None;
        let mut operations = operations.iter_mut().peekable();

        while let Some(operation) = operations.next() {
            let followed_by_read = matches!(operations.peek(), Some(Operation::Read(_)));

            match operation {
                Operation::Write(bytes) => {
                    if previous != Some(Direction::Write) {
                        self.start(address, Direction::Write)?;
                    }
                    for &byte in bytes.iter() {
                        self.write_byte(byte)?;
                    }
                    previous = Some(Direction::Write);
                }
                Operation::Read(buffer) => {
                    if previous != Some(Direction::Read) {
                        self.start(address, Direction::Read)?;
                    }
                    self.read_into(buffer, !followed_by_read)?;
                    previous = Some(Direction::Read);
                }
            }
        }

        Ok(())
    }
}

impl<P> ErrorType for TwiBus<P>
where
    P: TwiPeripheral,
{
    type Error = BusError;
}

impl<P> I2c for TwiBus<P>
where
    P: TwiPeripheral,
{
    fn write_read(
        &mut self,
        address: SevenBitAddress,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.transact(address, write, read, false)
    }

    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if operations.is_empty() {
            return Ok(());
        }

        let result = self.run_operations(address, operations);
        if let Err(e) = result {
            warn!("TWI: transaction with {:#x} failed: {:?}", address, e);
        }
        self.stop();

        result
    }
}
