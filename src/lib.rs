#![no_std]

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod descriptors;
pub mod ll;

use embedded_hal::{delay::DelayNs, i2c::I2c};

use device_descriptor::Register;
use register_access::RegisterOps;

use crate::{
    descriptors::{
        AvgCurrent, AvgVCell, Current, DesignCap, FStat, HibCfg, IChgTerm, LedCfg1, LedCfg2,
        ModelCfg, RepCap, RepSOC, Status, Temp, VCell, VEmpty, TTE,
    },
    ll::Max17263Interface,
};

const POLL_INTERVAL_MS: u32 = 10;
const POLL_ATTEMPTS: u32 = 100;
const WAKEUP_SETTLE_MS: u32 = 10;

/// Recovery-voltage code written alongside every empty-voltage target
/// (low 7 bits of VEmpty, 40mV per LSB).
pub const VEMPTY_RECOVERY_CODE: u16 = 0x0A;

const LED_CFG1: u16 = 0x0570;
const LED_CFG2: u16 = 0x0000;

const LI_ION_VCELL_MIN_UV: u32 = 2_500_000;
const LI_ION_VCELL_MAX_UV: u32 = 4_500_000;

/// Readiness polls that can exceed their deadline during initialization.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollTarget {
    /// Waiting for FStat.DNR to clear after wakeup.
    DataReady,
    /// Waiting for ModelCfg.Refresh to be cleared by device firmware.
    ModelRefresh,
}

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The underlying bus transaction failed.
    Transfer(E),
    /// A readiness poll did not complete within its deadline.
    Timeout(PollTarget),
}

/// Battery model classifications supported by the EZ configuration, without
/// full cell characterization.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModelId {
    /// For the majority of lithium cobalt cells.
    #[default]
    Default = 0,
    /// For LiFePO4 cells.
    LiFePo = 6,
}

impl ModelId {
    fn code(self) -> u16 {
        self as u16
    }
}

#[derive(Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DesignData {
    /// Design capacity of the cell.
    /// LSB = 1mAh
    pub capacity: u16,

    /// The IChgTerm register allows the device to detect when a charge cycle
    /// of the cell has completed.
    /// LSB = 1.5625μV/r_sense
    pub i_chg_term: u16,

    /// Empty Voltage Target, During Load. Written with 10mV resolution.
    /// LSB = 1mV
    pub v_empty: u16,

    /// Battery model selector applied during initialization.
    pub model: ModelId,

    /// Set when the sense resistor value is scaled by 100.
    pub r100: bool,

    /// Set for cells charged to more than 4.25V.
    pub v_chg: bool,

    /// LSB = 1mOhm
    pub r_sense: u32,
}

impl DesignData {
    /// Converts the raw register value to a current value in μA.
    ///
    /// ```rust
    /// # use max17263::DesignData;
    /// let design_data = DesignData {
    ///     r_sense: 20,
    ///     ..Default::default()
    /// };
    ///
    /// assert_eq!(design_data.raw_current_to_uA(0), 0);
    /// assert_eq!(design_data.raw_current_to_uA(1), 78);
    /// assert_eq!(design_data.raw_current_to_uA(0xFFFF), -78);
    ///
    /// let design_data = DesignData {
    ///     r_sense: 10,
    ///     ..Default::default()
    /// };
    ///
    /// assert_eq!(design_data.raw_current_to_uA(1), 156);
    /// assert_eq!(design_data.raw_current_to_uA(100), 15_625);
    /// ```
    #[allow(non_snake_case)]
    #[inline]
    pub fn raw_current_to_uA(&self, raw: u16) -> i32 {
        let raw = raw as i16 as i32;
        let rsense = self.r_sense as i32;

        (raw * 1_5625) / (rsense * 10)
    }

    /// Converts the raw register value to a capacity value in μAh.
    ///
    /// ```rust
    /// # use max17263::DesignData;
    /// let design_data = DesignData {
    ///     r_sense: 20,
    ///     ..Default::default()
    /// };
    ///
    /// assert_eq!(design_data.raw_capacity_to_uAh(0), 0);
    /// assert_eq!(design_data.raw_capacity_to_uAh(1), 250);
    /// assert_eq!(design_data.raw_capacity_to_uAh(65535), 16_383_750);
    /// ```
    #[allow(non_snake_case)]
    #[inline]
    pub fn raw_capacity_to_uAh(&self, raw: u16) -> u32 {
        let raw = raw as u32;
        let rsense = self.r_sense;

        (raw * 5_000) / rsense
    }

    /// Converts a capacity value in μAh to the raw register encoding.
    ///
    /// ```rust
    /// # use max17263::DesignData;
    /// let design_data = DesignData {
    ///     r_sense: 20,
    ///     ..Default::default()
    /// };
    ///
    /// assert_eq!(design_data.uAh_to_raw_capacity(0), 0);
    /// assert_eq!(design_data.uAh_to_raw_capacity(250), 1);
    /// assert_eq!(design_data.uAh_to_raw_capacity(16_383_750), 65535);
    /// ```
    #[allow(non_snake_case)]
    #[inline]
    pub fn uAh_to_raw_capacity(&self, uah: u32) -> u16 {
        (uah as u64 * self.r_sense as u64 / 5_000) as u16
    }

    /// Converts the raw register value to a voltage value in μV.
    ///
    /// ```rust
    /// # use max17263::DesignData;
    /// let design_data = DesignData::default();
    ///
    /// assert_eq!(design_data.raw_voltage_to_uV(0), 0);
    /// assert_eq!(design_data.raw_voltage_to_uV(1), 78);
    /// assert_eq!(design_data.raw_voltage_to_uV(65535), 5_119_921);
    /// ```
    #[allow(non_snake_case)]
    #[inline]
    pub fn raw_voltage_to_uV(&self, raw: u16) -> u32 {
        let raw = raw as u32;

        (raw * 625) / 8
    }

    /// Converts the raw register value to a temperature in m°C, rounded
    /// towards zero.
    ///
    /// ```rust
    /// # use max17263::DesignData;
    /// let design_data = DesignData::default();
    ///
    /// assert_eq!(design_data.raw_temp_to_mC(0x1900), 25_000);
    /// assert_eq!(design_data.raw_temp_to_mC(0xF600), -10_000);
    /// assert_eq!(design_data.raw_temp_to_mC(1), 3);
    /// ```
    #[allow(non_snake_case)]
    #[inline]
    pub fn raw_temp_to_mC(&self, raw: u16) -> i32 {
        let raw = raw as i16 as i32;

        (raw * 1_000) / 256
    }

    /// Converts the raw register value to a time in ms. The all-ones register
    /// value means the device has no valid estimate and maps to `None`.
    ///
    /// ```rust
    /// # use max17263::DesignData;
    /// let design_data = DesignData::default();
    ///
    /// assert_eq!(design_data.raw_time_to_ms(0), Some(0));
    /// assert_eq!(design_data.raw_time_to_ms(640), Some(3_600_000));
    /// assert_eq!(design_data.raw_time_to_ms(0xFFFF), None);
    /// ```
    #[inline]
    pub fn raw_time_to_ms(&self, raw: u16) -> Option<u32> {
        if raw == u16::MAX {
            return None;
        }

        Some(raw as u32 * 5_625)
    }
}

/// MAX17263 fuel gauge driver.
pub struct Max17263<I> {
    iface: Max17263Interface<I>,
    config: DesignData,
}

impl<I> Max17263<I> {
    pub const fn new(i2c: I, config: DesignData) -> Self {
        Self {
            iface: Max17263Interface { i2c },
            config,
        }
    }

    /// Returns the design data the driver was constructed with.
    pub const fn config(&self) -> &DesignData {
        &self.config
    }

    /// Consumes the driver and returns the bus.
    pub fn release(self) -> I {
        self.iface.i2c
    }
}

impl<I> Max17263<I>
where
    I: I2c,
{
    /// Checks whether a battery is attached, according to the Status
    /// register.
    pub fn battery_present(&mut self) -> Result<bool, I::Error> {
        let status = Status::read(&mut self.iface)?;
        Ok(!status.bst().get())
    }

    /// Checks whether the device has gone through a power-on reset since the
    /// flag was last cleared. A set flag means the configuration was lost
    /// and [`initialize`](Self::initialize) must run again.
    pub fn power_on_reset_event(&mut self) -> Result<bool, I::Error> {
        let status = Status::read(&mut self.iface)?;
        Ok(status.por().get())
    }

    /// Applies the EZ model configuration procedure from the datasheet.
    ///
    /// Wakes the device out of hibernate mode, waits until the fuel gauge
    /// outputs are ready, loads the battery model described by
    /// [`DesignData`], applies the LED configuration and finally restores
    /// the hibernate configuration captured on entry. The hibernate
    /// configuration is restored even when one of the readiness polls times
    /// out.
    pub fn initialize(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<I::Error>> {
        self.exit_hibernate(delay)?;

        let hib_cfg = HibCfg::read(&mut self.iface).map_err(Error::Transfer)?;

        let configured = self.configure(delay);
        let restored = hib_cfg.write(&mut self.iface).map_err(Error::Transfer);

        configured.and(restored)?;

        info!("MAX17263 initialized");
        Ok(())
    }

    /// Reads back identification and configuration registers and checks the
    /// cell voltage against the plausible Li-ion band. Out-of-range readings
    /// are logged; transport failures are returned.
    pub fn production_test(&mut self) -> Result<(), I::Error> {
        let status = Status::read(&mut self.iface)?;
        let model_cfg = ModelCfg::read(&mut self.iface)?;
        let design_cap = DesignCap::read(&mut self.iface)?;

        debug!(
            "Production test: status {} model cfg {} design cap {}",
            status.bits(),
            model_cfg.bits(),
            design_cap.bits()
        );

        let vcell = self.read_vcell()?;
        if !(LI_ION_VCELL_MIN_UV..=LI_ION_VCELL_MAX_UV).contains(&vcell) {
            warn!("Cell voltage {}μV outside the expected Li-ion range", vcell);
        }

        Ok(())
    }

    /// Returns the battery current in μA. Discharge reads negative.
    pub fn read_current(&mut self) -> Result<i32, I::Error> {
        let reg = Current::read(&mut self.iface)?;
        Ok(self.config.raw_current_to_uA(reg.current().get()))
    }

    /// Returns the average battery current in μA.
    pub fn read_avg_current(&mut self) -> Result<i32, I::Error> {
        let reg = AvgCurrent::read(&mut self.iface)?;
        Ok(self.config.raw_current_to_uA(reg.current().get()))
    }

    /// Returns the cell voltage in μV.
    pub fn read_vcell(&mut self) -> Result<u32, I::Error> {
        let reg = VCell::read(&mut self.iface)?;
        Ok(self.config.raw_voltage_to_uV(reg.voltage().get()))
    }

    /// Returns the average cell voltage in μV, as filtered by the device.
    pub fn read_avg_vcell(&mut self) -> Result<u32, I::Error> {
        let reg = AvgVCell::read(&mut self.iface)?;
        Ok(self.config.raw_voltage_to_uV(reg.voltage().get()))
    }

    /// Returns the reported remaining capacity in μAh.
    pub fn read_reported_remaining_capacity(&mut self) -> Result<u32, I::Error> {
        let reg = RepCap::read(&mut self.iface)?;
        Ok(self.config.raw_capacity_to_uAh(reg.capacity().get()))
    }

    /// Returns the design capacity read back from the device, in μAh.
    pub fn read_design_capacity(&mut self) -> Result<u32, I::Error> {
        let reg = DesignCap::read(&mut self.iface)?;
        Ok(self.config.raw_capacity_to_uAh(reg.capacity().get()))
    }

    /// Returns the reported state of charge in %.
    pub fn read_reported_soc(&mut self) -> Result<u8, I::Error> {
        let reg = RepSOC::read(&mut self.iface)?;
        Ok((reg.percentage().get() >> 8) as u8)
    }

    /// Returns the estimated time to empty in ms, or `None` while the device
    /// has no valid estimate (for example while charging).
    pub fn read_time_to_empty(&mut self) -> Result<Option<u32>, I::Error> {
        let reg = TTE::read(&mut self.iface)?;
        Ok(self.config.raw_time_to_ms(reg.time().get()))
    }

    /// Returns the temperature in m°C.
    pub fn read_temperature(&mut self) -> Result<i32, I::Error> {
        let reg = Temp::read(&mut self.iface)?;
        Ok(self.config.raw_temp_to_mC(reg.temperature().get()))
    }

    /// Writes the design capacity of the cell. Usable on its own;
    /// [`initialize`](Self::initialize) applies the value from
    /// [`DesignData`].
    pub fn set_design_capacity(&mut self, capacity_mah: u16) -> Result<(), I::Error> {
        let raw = self.config.uAh_to_raw_capacity(capacity_mah as u32 * 1_000);
        DesignCap::new(0).capacity().set(raw).write(&mut self.iface)
    }

    /// Writes the charge termination current, in raw IChgTerm units.
    pub fn set_charge_termination_current(&mut self, raw: u16) -> Result<(), I::Error> {
        IChgTerm::new(0).current().set(raw).write(&mut self.iface)
    }

    /// Writes the empty-voltage target in mV, with 10mV resolution, together
    /// with the fixed recovery-voltage code.
    pub fn set_empty_voltage(&mut self, v_empty_mv: u16) -> Result<(), I::Error> {
        VEmpty::new(0)
            .ve()
            .set(v_empty_mv / 10)
            .vr()
            .set(VEMPTY_RECOVERY_CODE)
            .write(&mut self.iface)
    }

    /// Forces the device into active mode so that the configuration sequence
    /// is not slowed down by the hibernate sampling period.
    fn exit_hibernate(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<I::Error>> {
        HibCfg::new(0x0000)
            .write(&mut self.iface)
            .map_err(Error::Transfer)?;
        Status::new(0x0000)
            .write(&mut self.iface)
            .map_err(Error::Transfer)?;

        delay.delay_ms(WAKEUP_SETTLE_MS);
        Ok(())
    }

    fn configure(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<I::Error>> {
        self.wait_data_ready(delay)?;
        self.clear_power_on_reset().map_err(Error::Transfer)?;
        self.apply_ez_config(delay)?;
        self.write_led_config().map_err(Error::Transfer)?;
        Ok(())
    }

    /// Polls FStat.DNR until the fuel gauge outputs are up to date. The bit
    /// stays set for about 710ms after power-up.
    fn wait_data_ready(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<I::Error>> {
        for _ in 0..POLL_ATTEMPTS {
            let fstat = FStat::read(&mut self.iface).map_err(Error::Transfer)?;
            if !fstat.dnr().get() {
                return Ok(());
            }

            delay.delay_ms(POLL_INTERVAL_MS);
        }

        warn!(
            "Fuel gauge data not ready after {}ms",
            POLL_ATTEMPTS * POLL_INTERVAL_MS
        );
        Err(Error::Timeout(PollTarget::DataReady))
    }

    /// Clears the power-on reset flag while preserving the other status
    /// bits, acknowledging that the model has been loaded.
    fn clear_power_on_reset(&mut self) -> Result<(), I::Error> {
        Status::modify(&mut self.iface, |status| status.por().set(false))
    }

    fn apply_ez_config(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<I::Error>> {
        self.wait_data_ready(delay)?;

        debug!("Loading EZ model configuration");

        let config = self.config;
        self.set_design_capacity(config.capacity)
            .map_err(Error::Transfer)?;
        self.set_charge_termination_current(config.i_chg_term)
            .map_err(Error::Transfer)?;
        self.set_empty_voltage(config.v_empty)
            .map_err(Error::Transfer)?;

        self.request_model_refresh().map_err(Error::Transfer)?;
        self.wait_model_refresh(delay)?;

        Ok(())
    }

    /// Requests a model refresh with the configured model selector. The
    /// refresh window is cleared before the new selector is applied.
    fn request_model_refresh(&mut self) -> Result<(), I::Error> {
        let config = self.config;
        ModelCfg::modify(&mut self.iface, |model_cfg| {
            ModelCfg::new(model_cfg.bits() & !ModelCfg::REFRESH_WINDOW)
                .model_id()
                .set(config.model.code())
                .r100()
                .set(config.r100)
                .v_chg()
                .set(config.v_chg)
                .refresh()
                .set(true)
        })
    }

    /// Polls ModelCfg.Refresh until the device firmware acknowledges the new
    /// model. The bit self-clears once the refresh completes.
    fn wait_model_refresh(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<I::Error>> {
        for _ in 0..POLL_ATTEMPTS {
            let model_cfg = ModelCfg::read(&mut self.iface).map_err(Error::Transfer)?;
            if !model_cfg.refresh().get() {
                return Ok(());
            }

            delay.delay_ms(POLL_INTERVAL_MS);
        }

        warn!(
            "Model refresh still pending after {}ms",
            POLL_ATTEMPTS * POLL_INTERVAL_MS
        );
        Err(Error::Timeout(PollTarget::ModelRefresh))
    }

    /// Applies the fixed LED bar configuration.
    fn write_led_config(&mut self) -> Result<(), I::Error> {
        LedCfg1::new(LED_CFG1).write(&mut self.iface)?;
        LedCfg2::new(LED_CFG2).write(&mut self.iface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_conversion_is_signed() {
        let design_data = DesignData {
            r_sense: 10,
            ..Default::default()
        };

        assert_eq!(design_data.raw_current_to_uA(0x8000), -5_120_000);
        assert_eq!(design_data.raw_current_to_uA(0x7FFF), 5_119_843);
    }

    #[test]
    fn temperature_conversion_covers_the_full_range() {
        let design_data = DesignData::default();

        assert_eq!(design_data.raw_temp_to_mC(0), 0);
        assert_eq!(design_data.raw_temp_to_mC(0x7FFF), 127_996);
        assert_eq!(design_data.raw_temp_to_mC(0x8000), -128_000);
    }

    #[test]
    fn time_sentinel_is_distinguished_from_large_values() {
        let design_data = DesignData::default();

        assert_eq!(design_data.raw_time_to_ms(0xFFFE), Some(368_628_750));
        assert_eq!(design_data.raw_time_to_ms(0xFFFF), None);
    }
}
