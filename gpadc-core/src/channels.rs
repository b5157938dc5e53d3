//! Channel table exposed to voltage and temperature consumers.
//!
//! Mirrors what an industrial-I/O style consumer expects: four voltage inputs
//! reporting raw codes and a fixed scale, plus the temperature channel with
//! raw/scale/offset so `(raw + offset) * scale` yields milli-degrees.

use core::fmt;

use crate::variant::{ADC_CHANNEL_COUNT, VariantDescriptor};

/// Full-scale input range of the 12-bit converter, in millivolts.
pub const FULL_SCALE_MV: u32 = 3_000;

/// Converter resolution in codes.
pub const ADC_CODES: u32 = 4_096;

/// 3000 mV / 4096 codes = 0.732421875 mV per code, in nano-units.
pub const VOLTAGE_SCALE_NANO: i32 = 732_421_875;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelType {
    Voltage,
    Temperature,
}

/// Attribute requested from a channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelInfo {
    Raw,
    Scale,
    Offset,
}

impl fmt::Display for ChannelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelInfo::Raw => f.write_str("raw"),
            ChannelInfo::Scale => f.write_str("scale"),
            ChannelInfo::Offset => f.write_str("offset"),
        }
    }
}

/// Value of a channel attribute.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IioValue {
    Int(i32),
    /// `integer + nano * 1e-9`.
    IntPlusNano(i32, i32),
}

impl fmt::Display for IioValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IioValue::Int(value) => write!(f, "{value}"),
            IioValue::IntPlusNano(int, nano) => write!(f, "{int}.{:09}", nano.unsigned_abs()),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelSpec {
    pub kind: ChannelType,
    pub channel: u8,
    pub datasheet_name: &'static str,
    pub info: &'static [ChannelInfo],
}

impl ChannelSpec {
    #[must_use]
    pub fn supports(&self, info: ChannelInfo) -> bool {
        self.info.contains(&info)
    }
}

const VOLTAGE_INFO: &[ChannelInfo] = &[ChannelInfo::Raw, ChannelInfo::Scale];
const TEMPERATURE_INFO: &[ChannelInfo] = &[
    ChannelInfo::Raw,
    ChannelInfo::Scale,
    ChannelInfo::Offset,
];

const fn voltage(channel: u8, datasheet_name: &'static str) -> ChannelSpec {
    ChannelSpec {
        kind: ChannelType::Voltage,
        channel,
        datasheet_name,
        info: VOLTAGE_INFO,
    }
}

/// Channels of the touchscreen-block revisions.
pub const GPADC_CHANNELS: [ChannelSpec; ADC_CHANNEL_COUNT as usize + 1] = [
    voltage(0, "adc_chan0"),
    voltage(1, "adc_chan1"),
    voltage(2, "adc_chan2"),
    voltage(3, "adc_chan3"),
    ChannelSpec {
        kind: ChannelType::Temperature,
        channel: 0,
        datasheet_name: "temp_adc",
        info: TEMPERATURE_INFO,
    },
];

/// Channel table for `variant`; empty for thermal-only revisions.
#[must_use]
pub fn channels_for(variant: &VariantDescriptor) -> &'static [ChannelSpec] {
    if variant.has_dedicated_voltage_channel {
        &GPADC_CHANNELS
    } else {
        &[]
    }
}

/// Looks up a channel by datasheet name.
#[must_use]
pub fn find(variant: &VariantDescriptor, datasheet_name: &str) -> Option<&'static ChannelSpec> {
    channels_for(variant)
        .iter()
        .find(|spec| spec.datasheet_name == datasheet_name)
}

/// Converts a raw code to millivolts, rounding down.
#[must_use]
pub fn millivolts(raw: u32) -> u32 {
    let scaled = u64::from(raw) * u64::from(FULL_SCALE_MV) / u64::from(ADC_CODES);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{SUN4I_A10, SUN8I_H3};

    #[test]
    fn voltage_scale_is_3000mv_over_4096() {
        assert_eq!(
            i64::from(VOLTAGE_SCALE_NANO) * i64::from(ADC_CODES),
            i64::from(FULL_SCALE_MV) * 1_000_000_000
        );
        assert_eq!(millivolts(4_096), 3_000);
        assert_eq!(millivolts(2_048), 1_500);
        assert_eq!(format!("{}", IioValue::IntPlusNano(0, VOLTAGE_SCALE_NANO)), "0.732421875");
    }

    #[test]
    fn thermal_only_revisions_expose_no_channels() {
        assert_eq!(channels_for(&SUN4I_A10).len(), 5);
        assert!(channels_for(&SUN8I_H3).is_empty());
        assert!(find(&SUN8I_H3, "temp_adc").is_none());
    }

    #[test]
    fn temperature_channel_reports_offset() {
        let temp = find(&SUN4I_A10, "temp_adc").unwrap();
        assert!(temp.supports(ChannelInfo::Offset));
        assert!(!find(&SUN4I_A10, "adc_chan2").unwrap().supports(ChannelInfo::Offset));
    }
}
