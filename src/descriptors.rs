use device_descriptor::device;

device! {
    /// The Status register maintains all flags related to alert thresholds
    /// and battery insertion or removal.
    Status(0x00, default = 0x0002) {
        /// (Battery Status) => This bit is set to 0 when a battery is present
        /// in the system and set to 1 when the battery is absent.
        bst @ 3 => bool,
        /// (Power-On Reset) => This bit is set to 1 when the device detects
        /// that a software or hardware POR event has occurred. It must be
        /// cleared by system software to detect the next POR event.
        por @ 1 => bool,
    }
    RepCap(0x05) {
        /// RepCap or reported remaining capacity in mAh.
        /// This register is protected from making sudden jumps during load
        /// changes.
        capacity @ 0..16 => u16,
    }
    RepSOC(0x06) {
        /// RepSOC is the reported state-of-charge percentage output for use
        /// by the application GUI. 1/256% per LSB.
        percentage @ 0..16 => u16,
    }
    Temp(0x08) {
        /// Temperature measurement selected by Config.TSel, in 1/256°C
        /// two's-complement steps.
        temperature @ 0..16 => u16,
    }
    VCell(0x09) {
        /// VCell reports the voltage measured between BATT and GND.
        voltage @ 0..16 => u16,
    }
    Current(0x0A) {
        /// Current measured across the sense resistor, two's complement.
        /// 1.5625μV/R_sense per LSB; discharge reads negative.
        current @ 0..16 => u16,
    }
    AvgCurrent(0x0B) {
        /// The AvgCurrent register reports an average of Current register
        /// readings over a configurable filter period.
        current @ 0..16 => u16,
    }
    TTE(0x11) {
        /// The TTE register holds the estimated time to empty for the
        /// application under present temperature and load conditions. The TTE
        /// value is determined by relating AvCap with AvgCurrent. The
        /// corresponding AvgCurrent filtering gives a delay in TTE, but
        /// provides more stable results. 5.625s per LSB.
        time @ 0..16 => u16,
    }
    DesignCap(0x18, default = 0x0000) {
        /// The DesignCap register holds the expected capacity of the cell.
        /// This value is used to determine age and health of the cell by
        /// comparing against the measured present cell capacity.
        capacity @ 0..16 => u16,
    }
    AvgVCell(0x19) {
        /// The AvgVCell register reports an average of the VCell register
        /// readings.
        voltage @ 0..16 => u16,
    }
    IChgTerm(0x1E, default = 0x0640) {
        /// The IChgTerm register allows the device to detect when a charge
        /// cycle of the cell has completed. IChgTerm should be programmed to
        /// the exact charge termination current used in the application.
        current @ 0..16 => u16,
    }
    VEmpty(0x3A, default = 0xA561) {
        /// (Empty Voltage Target, During Load) => The fuel gauge provides
        /// capacity and percentage relative to the empty voltage target,
        /// eventually declaring 0% at VE. A 10mV resolution gives a 0 to
        /// 5.11V range.
        ve @ 7..16 => u16,
        /// (Recovery Voltage) => Sets the voltage level for clearing empty
        /// detection. Once the cell voltage rises above this point, empty
        /// voltage detection is reenabled. A 40mV resolution gives a 0 to
        /// 5.08V range.
        vr @ 0..7 => u16,
    }
    FStat(0x3D) {
        /// (Data Not Ready) => This bit is set to 1 at cell insertion and
        /// remains set until the output registers have been updated.
        /// Afterwards, the IC clears this bit indicating the fuel gauge
        /// calculations are now up to date. This takes 710ms from power-up.
        dnr @ 0 => bool,
    }
    /// LED display control: bar mode, timing and blink configuration.
    LedCfg1(0x40) {}
    /// Additional LED display control: brightness and animation
    /// configuration.
    LedCfg2(0x4B) {}
    /// The HibCfg register controls hibernate mode functionality. The device
    /// enters and exits hibernate when the battery current is less than about
    /// C/100. While in hibernate mode the IC reduces its operating current by
    /// reducing ADC sampling. Treated as an opaque snapshot by the driver.
    HibCfg(0xBA, default = 0x870C) {}
    ModelCfg(0xDB, default = 0x0000) {
        /// Set 1 to command the model refreshing.
        /// After firmware executes the command, it will be cleared by
        /// firmware.
        refresh @ 15 => bool,
        /// Set to 1 when the sense resistor value is scaled by 100, so the
        /// model interprets capacity-related registers accordingly.
        r100 @ 13 => bool,
        /// Set to 1 for cells charged to more than 4.25V, 0 for 4.2V cells.
        v_chg @ 10 => bool,
        /// Choose from common classifications of lithium batteries supported
        /// by the EZ model, without characterization. For the majority of
        /// batteries, use model 0.
        model_id @ 4..8 => u16,
    }
}

impl ModelCfg {
    /// Bits cleared before a refresh request is assembled: the refresh bit
    /// and the window around the model selector.
    pub const REFRESH_WINDOW: u16 = 0x8F00;
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_descriptor::{DefaultValue, Register};

    #[test]
    fn status_flags_match_the_datasheet_bits() {
        assert!(Status::new(0x0008).bst().get());
        assert!(Status::new(0x0002).por().get());
        assert!(!Status::new(0x0000).bst().get());
        assert!(!Status::new(0xFFF5).bst().get());
    }

    #[test]
    fn vempty_packs_target_and_recovery_fields() {
        let reg = VEmpty::new(0).ve().set(330).vr().set(0x0A);
        assert_eq!(reg.bits(), 0xA50A);

        // the documented power-on value decodes to 3.3V / 3.88V
        let default = VEmpty::default();
        assert_eq!(default.ve().get(), 330);
        assert_eq!(default.vr().get(), 0x61);
    }

    #[test]
    fn model_cfg_assembles_the_refresh_request() {
        let reg = ModelCfg::new(0)
            .model_id()
            .set(6)
            .r100()
            .set(true)
            .v_chg()
            .set(true)
            .refresh()
            .set(true);
        assert_eq!(reg.bits(), 0x8000 | 0x2000 | 0x0400 | 0x0060);
    }

    #[test]
    fn refresh_window_covers_the_refresh_bit() {
        assert_eq!(ModelCfg::REFRESH_WINDOW & 0x8000, 0x8000);
        assert_eq!(0xFFFF & !ModelCfg::REFRESH_WINDOW, 0x70FF);
    }

    #[test]
    fn register_addresses_match_the_memory_map() {
        assert_eq!(Status::ADDRESS, 0x00);
        assert_eq!(RepCap::ADDRESS, 0x05);
        assert_eq!(RepSOC::ADDRESS, 0x06);
        assert_eq!(Temp::ADDRESS, 0x08);
        assert_eq!(VCell::ADDRESS, 0x09);
        assert_eq!(Current::ADDRESS, 0x0A);
        assert_eq!(AvgCurrent::ADDRESS, 0x0B);
        assert_eq!(TTE::ADDRESS, 0x11);
        assert_eq!(DesignCap::ADDRESS, 0x18);
        assert_eq!(AvgVCell::ADDRESS, 0x19);
        assert_eq!(IChgTerm::ADDRESS, 0x1E);
        assert_eq!(VEmpty::ADDRESS, 0x3A);
        assert_eq!(FStat::ADDRESS, 0x3D);
        assert_eq!(LedCfg1::ADDRESS, 0x40);
        assert_eq!(LedCfg2::ADDRESS, 0x4B);
        assert_eq!(HibCfg::ADDRESS, 0xBA);
        assert_eq!(ModelCfg::ADDRESS, 0xDB);
        assert_eq!(HibCfg::DEFAULT_VALUE, 0x870C);
    }
}
