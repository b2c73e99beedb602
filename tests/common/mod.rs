use embedded_hal::i2c::{ErrorType, I2c, Operation};

/// In-memory stand-in for the chip's register file: every register is a
/// plain 16-bit memory cell behind the MAX17263 bus framing (register
/// address byte, then a little-endian 16-bit payload).
pub struct RegisterBank {
    regs: [u16; 256],
    pointer: u8,
    /// Registers written through the bus, in order, with their values.
    pub writes: Vec<(u8, u16)>,
}

impl RegisterBank {
    pub fn new() -> Self {
        Self {
            regs: [0; 256],
            pointer: 0,
            writes: Vec::new(),
        }
    }

    pub fn set(&mut self, addr: u8, value: u16) {
        self.regs[addr as usize] = value;
    }

    pub fn get(&self, addr: u8) -> u16 {
        self.regs[addr as usize]
    }

    /// The register addresses written, in order.
    pub fn written_addresses(&self) -> Vec<u8> {
        self.writes.iter().map(|(addr, _)| *addr).collect()
    }
}

impl ErrorType for RegisterBank {
    type Error = core::convert::Infallible;
}

impl I2c for RegisterBank {
    fn transaction(
        &mut self,
        _address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for op in operations {
            match op {
                Operation::Write(bytes) => match **bytes {
                    [reg] => self.pointer = reg,
                    [reg, low, high] => {
                        let value = u16::from_le_bytes([low, high]);
                        self.pointer = reg;
                        self.writes.push((reg, value));
                        self.regs[reg as usize] = value;
                    }
                    _ => panic!("unexpected write of {} bytes", bytes.len()),
                },
                Operation::Read(buffer) => {
                    let value = self.regs[self.pointer as usize];
                    buffer.copy_from_slice(&value.to_le_bytes());
                }
            }
        }

        Ok(())
    }
}
