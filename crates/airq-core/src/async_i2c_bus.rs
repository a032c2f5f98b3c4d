//! Shared async I2C bus handles.
//!
//! The scanner owns the bus alone. Once it hands the bus back, the ENS160,
//! the AHT2x and the OLED each get their own [`AsyncI2cDevice`] pointing at
//! one mutex-guarded master, so every transaction runs to completion before
//! the next device gets the bus.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal_async::i2c::{ErrorType, I2c, Operation};

/// The mutex every device handle locks around a transaction.
pub type SharedI2cBus<T> = Mutex<CriticalSectionRawMutex, T>;

/// One device's view of a [`SharedI2cBus`].
///
/// ```ignore
/// static I2C_BUS: StaticCell<SharedI2cBus<I2c<'static, Async>>> = StaticCell::new();
///
/// let bus = I2C_BUS.init(Mutex::new(i2c.into_async()));
/// let ens160 = Ens160::new(AsyncI2cDevice::new(bus), Delay, ENS160_ADDRESS_HIGH);
/// let aht2x = Aht2x::new(AsyncI2cDevice::new(bus), Delay);
/// ```
pub struct AsyncI2cDevice<'a, T> {
    bus: &'a SharedI2cBus<T>,
}

impl<'a, T> AsyncI2cDevice<'a, T> {
    #[inline]
    pub const fn new(bus: &'a SharedI2cBus<T>) -> Self {
        Self { bus }
    }
}

impl<T> Clone for AsyncI2cDevice<'_, T> {
    fn clone(&self) -> Self {
        Self { bus: self.bus }
    }
}

impl<T> ErrorType for AsyncI2cDevice<'_, T>
where
    T: ErrorType,
{
    type Error = T::Error;
}

impl<T> I2c for AsyncI2cDevice<'_, T>
where
    T: I2c,
{
    #[inline]
    async fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock().await;
        bus.read(address, read).await
    }

    #[inline]
    async fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock().await;
        bus.write(address, write).await
    }

    /// Holds the lock across the repeated start, so no other device can
    /// slip in between the register pointer write and the read.
    #[inline]
    async fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock().await;
        bus.write_read(address, write, read).await
    }

    #[inline]
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock().await;
        bus.transaction(address, operations).await
    }
}

// Safety: AsyncI2cDevice can be sent across thread boundaries if the underlying
// bus type is Send. The Mutex ensures exclusive access.
unsafe impl<T: Send> Send for AsyncI2cDevice<'_, T> {}
