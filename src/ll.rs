use device_descriptor::Register;
use embedded_hal::i2c::I2c;
use register_access::RegisterAccess;

/// Register-level I2C transport for the MAX17263.
///
/// Registers are 16 bits wide, addressed by a single register byte and
/// transferred low byte first. One bus transaction per call, no retries.
pub struct Max17263Interface<I> {
    pub i2c: I,
}

impl<I> Max17263Interface<I> {
    const DEVICE_ADDR: u8 = 0x36;
}

impl<I> RegisterAccess for Max17263Interface<I>
where
    I: I2c,
{
    type Error = I::Error;

    fn read_register<R>(&mut self) -> Result<R, Self::Error>
    where
        R: Register,
    {
        let mut data = [0; 2];
        self.i2c
            .write_read(Self::DEVICE_ADDR, &[R::ADDRESS], &mut data)?;

        Ok(R::from_bits(u16::from_le_bytes(data)))
    }

    fn write_register<R>(&mut self, reg: R) -> Result<(), Self::Error>
    where
        R: Register,
    {
        let [low, high] = reg.bits().to_le_bytes();
        self.i2c.write(Self::DEVICE_ADDR, &[R::ADDRESS, low, high])
    }
}
