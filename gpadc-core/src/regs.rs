//! Register map for the sunxi GPADC/touchscreen block and the H3-style THS block.
//!
//! Offsets are relative to the block base. Field helpers mirror the datasheet
//! bit layouts and mask their inputs so out-of-range values never spill into a
//! neighbouring field.

/// Contiguous bitmask covering bits `low..=high`.
#[must_use]
pub const fn genmask(high: u32, low: u32) -> u32 {
    (u32::MAX >> (31 - high)) & (u32::MAX << low)
}

/// Single-bit mask; positions past bit 31 yield zero.
#[must_use]
pub const fn bit(position: u32) -> u32 {
    match 1u32.checked_shl(position) {
        Some(value) => value,
        None => 0,
    }
}

// GPADC / touchscreen controller (A10, A13, A31, A33).

pub const GPADC_CTRL0: u32 = 0x00;

#[must_use]
pub const fn ctrl0_adc_clk_divider(divider: u32) -> u32 {
    (genmask(1, 0) & divider) << 20
}

#[must_use]
pub const fn ctrl0_fs_div(divider: u32) -> u32 {
    (genmask(3, 0) & divider) << 16
}

#[must_use]
pub const fn ctrl0_t_acq(cycles: u32) -> u32 {
    genmask(15, 0) & cycles
}

pub const GPADC_CTRL1: u32 = 0x04;
pub const SUN4I_CTRL1_TP_MODE_EN: u32 = bit(4);
pub const SUN4I_CTRL1_TP_ADC_SELECT: u32 = bit(3);
pub const SUN4I_CTRL1_ADC_CHAN_MASK: u32 = genmask(2, 0);
pub const SUN6I_CTRL1_TP_MODE_EN: u32 = bit(5);
pub const SUN6I_CTRL1_TP_ADC_SELECT: u32 = bit(4);
pub const SUN6I_CTRL1_ADC_CHAN_MASK: u32 = genmask(3, 0);
pub const SUN8I_A33_CTRL1_CHOP_TEMP_EN: u32 = bit(8);

pub const GPADC_CTRL3: u32 = 0x0c;
pub const CTRL3_FILTER_EN: u32 = bit(2);

#[must_use]
pub const fn ctrl3_filter_type(kind: u32) -> u32 {
    genmask(1, 0) & kind
}

pub const GPADC_INT_FIFOC: u32 = 0x10;
pub const INT_FIFOC_TEMP_IRQ_EN: u32 = bit(18);
pub const INT_FIFOC_TP_DATA_IRQ_EN: u32 = bit(16);
pub const INT_FIFOC_TP_FIFO_FLUSH: u32 = bit(4);

#[must_use]
pub const fn int_fifoc_tp_fifo_trig_level(level: u32) -> u32 {
    (genmask(4, 0) & level) << 8
}

pub const GPADC_TPR: u32 = 0x18;
pub const TPR_TEMP_ENABLE: u32 = bit(16);

/// Periodic temperature sample interval; `period * 256 * 16 / clkin` seconds.
#[must_use]
pub const fn tpr_temp_period(period: u32) -> u32 {
    genmask(15, 0) & period
}

pub const GPADC_TEMP_DATA: u32 = 0x20;
pub const GPADC_DATA: u32 = 0x24;

// Thermal sensor controller (H3 and later).

pub const THS_CTRL0: u32 = 0x00;
pub const THS_CTRL2: u32 = 0x40;

#[must_use]
pub const fn ths_acq1(cycles: u32) -> u32 {
    genmask(31, 16) & (cycles << 16)
}

#[must_use]
pub const fn ths_temp_sense_en(sensor: u8) -> u32 {
    bit(sensor as u32)
}

pub const THS_INTC: u32 = 0x44;

#[must_use]
pub const fn ths_intc_tdata_irq_en(sensor: u8) -> u32 {
    bit(8 + sensor as u32)
}

#[must_use]
pub const fn ths_temp_period(period: u32) -> u32 {
    genmask(31, 12) & (period << 12)
}

pub const THS_STAT: u32 = 0x48;

#[must_use]
pub const fn ths_ints_tdata_irq(sensor: u8) -> u32 {
    bit(8 + sensor as u32)
}

pub const THS_FILTER: u32 = 0x70;
pub const THS_TDATA0: u32 = 0x80;
