//! Per-silicon-revision capability and calibration tables.
//!
//! Exactly one [`VariantDescriptor`] is bound to a device for its lifetime. The
//! descriptor is resolved once at attach time (usually from the devicetree
//! compatible string) and every later decision reads its fields instead of
//! re-dispatching on the revision.

use crate::regs::{
    self, GPADC_TEMP_DATA, SUN4I_CTRL1_ADC_CHAN_MASK, SUN4I_CTRL1_TP_ADC_SELECT,
    SUN4I_CTRL1_TP_MODE_EN, SUN6I_CTRL1_ADC_CHAN_MASK, SUN6I_CTRL1_TP_ADC_SELECT,
    SUN6I_CTRL1_TP_MODE_EN, SUN8I_A33_CTRL1_CHOP_TEMP_EN, THS_TDATA0,
};

/// Upper bound on logical thermal sensors behind one conversion pipeline.
pub const MAX_SENSOR_COUNT: usize = 4;

/// Number of general purpose voltage inputs multiplexed onto the ADC.
pub const ADC_CHANNEL_COUNT: u8 = 4;

/// Distance between consecutive per-sensor temperature data registers.
pub const TEMP_REGISTER_STRIDE: u32 = 4;

/// Encoding used for the CTRL1 channel-select field.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelSelect {
    /// Binary channel number (A10/A13).
    Binary,
    /// One bit per channel (A31).
    OneHot,
    /// No voltage multiplexer is exposed.
    Unavailable,
}

impl ChannelSelect {
    /// Encodes `channel` into CTRL1 select bits.
    #[must_use]
    pub const fn encode(self, channel: u8) -> u32 {
        match self {
            ChannelSelect::Binary => regs::genmask(2, 0) & channel as u32,
            ChannelSelect::OneHot => regs::genmask(3, 0) & regs::bit(channel as u32),
            ChannelSelect::Unavailable => 0,
        }
    }
}

/// How the block reports completed conversions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqMode {
    /// No interrupt is wired; data registers are read on demand.
    Polled,
    /// An interrupt completes one armed read at a time.
    OnDemand,
    /// The sensor free-runs and raises a periodic "fresh sample" interrupt.
    FreeRunning,
}

/// Register programs applied on runtime resume/suspend.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerProgram {
    /// Touchscreen controller with the periodic temperature timer (A10..A33).
    TouchscreenAdc,
    /// Dedicated thermal sensor controller (H3).
    ThermalSensor,
}

/// Immutable description of one silicon revision.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VariantDescriptor {
    pub name: &'static str,
    pub compatible: &'static str,
    /// Raw-count offset added before scaling.
    pub temp_offset: i32,
    /// Milli-degree per raw count; negative on some revisions.
    pub temp_scale: i32,
    pub tp_mode_en: u32,
    pub tp_adc_select: u32,
    pub channel_select: ChannelSelect,
    pub channel_mask: u32,
    pub has_dedicated_voltage_channel: bool,
    pub supports_interrupt: bool,
    pub irq_mode: IrqMode,
    pub has_bus_clock: bool,
    pub has_bus_reset: bool,
    pub has_module_clock: bool,
    pub supports_calibration: bool,
    pub ctrl_base: u32,
    pub temp_data_base: u32,
    pub sensor_count: u8,
    /// Status bits written back to acknowledge a free-running sample interrupt.
    pub irq_clear: u32,
    pub power_program: PowerProgram,
}

impl VariantDescriptor {
    /// CTRL1 bits that select voltage `channel`.
    #[must_use]
    pub const fn encode_channel(&self, channel: u8) -> u32 {
        self.channel_select.encode(channel)
    }

    /// Absolute offset of a control-block register.
    #[must_use]
    pub const fn ctrl_register(&self, offset: u32) -> u32 {
        self.ctrl_base + offset
    }

    /// Data register holding the latest sample for `sensor`.
    #[must_use]
    pub const fn temp_data_register(&self, sensor: u8) -> u32 {
        self.temp_data_base + sensor as u32 * TEMP_REGISTER_STRIDE
    }

    /// Returns `true` when temperature data refreshes without an armed read.
    #[must_use]
    pub const fn free_running_temperature(&self) -> bool {
        !self.has_dedicated_voltage_channel
    }

    /// Converts a raw sample to milli-degrees Celsius: `(raw + offset) * scale`.
    #[must_use]
    pub fn temperature_millicelsius(&self, raw: u32) -> i32 {
        let value =
            (i64::from(raw) + i64::from(self.temp_offset)) * i64::from(self.temp_scale);
        i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
    }
}

pub const SUN4I_A10: VariantDescriptor = VariantDescriptor {
    name: "sun4i-a10",
    compatible: "allwinner,sun4i-a10-gpadc",
    temp_offset: -1932,
    temp_scale: 133,
    tp_mode_en: SUN4I_CTRL1_TP_MODE_EN,
    tp_adc_select: SUN4I_CTRL1_TP_ADC_SELECT,
    channel_select: ChannelSelect::Binary,
    channel_mask: SUN4I_CTRL1_ADC_CHAN_MASK,
    has_dedicated_voltage_channel: true,
    supports_interrupt: true,
    irq_mode: IrqMode::OnDemand,
    has_bus_clock: false,
    has_bus_reset: false,
    has_module_clock: false,
    supports_calibration: false,
    ctrl_base: 0,
    temp_data_base: GPADC_TEMP_DATA,
    sensor_count: 1,
    irq_clear: 0,
    power_program: PowerProgram::TouchscreenAdc,
};

pub const SUN5I_A13: VariantDescriptor = VariantDescriptor {
    name: "sun5i-a13",
    compatible: "allwinner,sun5i-a13-gpadc",
    temp_offset: -1447,
    temp_scale: 100,
    ..SUN4I_A10
};

pub const SUN6I_A31: VariantDescriptor = VariantDescriptor {
    name: "sun6i-a31",
    compatible: "allwinner,sun6i-a31-gpadc",
    temp_offset: -1623,
    temp_scale: 167,
    tp_mode_en: SUN6I_CTRL1_TP_MODE_EN,
    tp_adc_select: SUN6I_CTRL1_TP_ADC_SELECT,
    channel_select: ChannelSelect::OneHot,
    channel_mask: SUN6I_CTRL1_ADC_CHAN_MASK,
    ..SUN4I_A10
};

pub const SUN8I_A33: VariantDescriptor = VariantDescriptor {
    name: "sun8i-a33",
    compatible: "allwinner,sun8i-a33-ths",
    temp_offset: -1662,
    temp_scale: 162,
    tp_mode_en: SUN8I_A33_CTRL1_CHOP_TEMP_EN,
    tp_adc_select: 0,
    channel_select: ChannelSelect::Unavailable,
    channel_mask: 0,
    has_dedicated_voltage_channel: false,
    supports_interrupt: false,
    irq_mode: IrqMode::Polled,
    ..SUN4I_A10
};

pub const SUN8I_H3: VariantDescriptor = VariantDescriptor {
    name: "sun8i-h3",
    compatible: "allwinner,sun8i-h3-ths",
    temp_offset: -1791,
    temp_scale: -121,
    tp_mode_en: 0,
    tp_adc_select: 0,
    channel_select: ChannelSelect::Unavailable,
    channel_mask: 0,
    has_dedicated_voltage_channel: false,
    supports_interrupt: true,
    irq_mode: IrqMode::FreeRunning,
    has_bus_clock: true,
    has_bus_reset: true,
    has_module_clock: true,
    supports_calibration: true,
    ctrl_base: 0,
    temp_data_base: THS_TDATA0,
    sensor_count: 1,
    irq_clear: regs::ths_ints_tdata_irq(0),
    power_program: PowerProgram::ThermalSensor,
};

/// Every revision the driver knows, in devicetree match order.
pub const VARIANTS: [&VariantDescriptor; 5] =
    [&SUN8I_A33, &SUN4I_A10, &SUN5I_A13, &SUN6I_A31, &SUN8I_H3];

/// Resolves a devicetree compatible string to its descriptor.
#[must_use]
pub fn lookup(compatible: &str) -> Option<&'static VariantDescriptor> {
    VARIANTS
        .iter()
        .copied()
        .find(|variant| variant.compatible == compatible)
}

/// Resolves a short revision name such as `sun8i-h3`.
#[must_use]
pub fn by_name(name: &str) -> Option<&'static VariantDescriptor> {
    VARIANTS
        .iter()
        .copied()
        .find(|variant| variant.name.eq_ignore_ascii_case(name))
}
