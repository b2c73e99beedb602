#![no_std]

use device_descriptor::Register;

/// Typed register access over an addressed bus.
///
/// Implementations translate one register read or write into exactly one bus
/// transaction; retry policy, if any, belongs to the caller.
pub trait RegisterAccess {
    type Error;

    fn read_register<R>(&mut self) -> Result<R, Self::Error>
    where
        R: Register;

    fn write_register<R>(&mut self, reg: R) -> Result<(), Self::Error>
    where
        R: Register;
}

/// Read, write and modify entry points hung off the register types
/// themselves.
pub trait RegisterOps: Register {
    fn read<A>(iface: &mut A) -> Result<Self, A::Error>
    where
        A: RegisterAccess;

    fn write<A>(self, iface: &mut A) -> Result<(), A::Error>
    where
        A: RegisterAccess;

    /// Read-modify-write. Not atomic; assumes no concurrent writer.
    fn modify<A, F>(iface: &mut A, f: F) -> Result<(), A::Error>
    where
        A: RegisterAccess,
        F: FnOnce(Self) -> Self;
}

impl<R> RegisterOps for R
where
    R: Register,
{
    fn read<A>(iface: &mut A) -> Result<Self, A::Error>
    where
        A: RegisterAccess,
    {
        iface.read_register()
    }

    fn write<A>(self, iface: &mut A) -> Result<(), A::Error>
    where
        A: RegisterAccess,
    {
        iface.write_register(self)
    }

    fn modify<A, F>(iface: &mut A, f: F) -> Result<(), A::Error>
    where
        A: RegisterAccess,
        F: FnOnce(Self) -> Self,
    {
        let current = Self::read(iface)?;
        f(current).write(iface)
    }
}
