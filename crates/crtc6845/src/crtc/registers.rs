/*
    MartyPC
    https://github.com/dbalsom/martypc

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    crtc::registers.rs

    Register file and decode for the shared CRTC engine: per-index write
    masks, read masking for the write-only registers, the status byte, and
    bitfield views of the packed mode/cursor/sync registers.

*/

use modular_bitfield::{bitfield, prelude::*};
use strum_macros::{Display, FromRepr};

use super::*;

#[derive(Copy, Clone, Debug, Display, FromRepr)]
#[repr(u8)]
pub enum CrtcRegister {
    HorizontalTotal = 0x00,
    HorizontalDisplayed = 0x01,
    HorizontalSyncPosition = 0x02,
    SyncWidth = 0x03,
    VerticalTotal = 0x04,
    VerticalTotalAdjust = 0x05,
    VerticalDisplayed = 0x06,
    VerticalSync = 0x07,
    ModeControl = 0x08,
    MaximumScanlineAddress = 0x09,
    CursorStartLine = 0x0A,
    CursorEndLine = 0x0B,
    StartAddressH = 0x0C,
    StartAddressL = 0x0D,
    CursorAddressH = 0x0E,
    CursorAddressL = 0x0F,
    LightPenPositionH = 0x10,
    LightPenPositionL = 0x11,
    UpdateAddressH = 0x12,
    UpdateAddressL = 0x13,
    TransparentUpdate = 0x1F,
}

/// R8 - Mode Control. Only the transparent-capable variants implement the
/// upper bits; the skew fields are stored but not emulated.
#[bitfield]
#[derive(Copy, Clone)]
pub struct CModeControl {
    pub interlace: B2,
    pub row_column_addressing: bool,
    pub transparent: bool,
    pub display_enable_skew: bool,
    pub cursor_skew: bool,
    pub update_strobe: bool,
    pub update_during_phi2: bool,
}

impl CModeControl {
    #[inline]
    pub fn interlace_and_video(&self) -> bool {
        self.interlace() == 0b11
    }

    #[inline]
    pub fn transparent_phi2(&self) -> bool {
        self.transparent() && self.update_during_phi2()
    }

    #[inline]
    pub fn transparent_blank(&self) -> bool {
        self.transparent() && !self.update_during_phi2()
    }
}

/// R3 - Sync Width. The vertical field is honored only on variants that
/// support it; elsewhere the pulse is a fixed 16 lines.
#[bitfield]
#[derive(Copy, Clone)]
pub struct CSyncWidth {
    pub horizontal: B4,
    pub vertical:   B4,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, BitfieldSpecifier)]
pub enum CursorMode {
    Steady,
    Off,
    BlinkFast,
    BlinkSlow,
}

/// R10 - Cursor Start Raster, with the blink mode field in bits 5-6.
#[bitfield]
#[derive(Copy, Clone)]
pub struct CCursorStart {
    pub start: B5,
    pub mode:  CursorMode,
    #[skip]
    unused: B1,
}

impl Crtc6845 {
    /// Write the register address-select latch. The latch field is 5 bits
    /// wide on most variants, 6 on the extended ones.
    pub fn address_w(&mut self, data: u8) {
        self.register_address_latch = data & self.caps.addr_latch_mask;
    }

    pub fn register_w(&mut self, data: u8) {
        use CrtcRegister::*;

        if let Some(reg) = CrtcRegister::from_repr(self.register_address_latch) {
            trace!(self, "R{:02} {} <= {:02X}", self.register_address_latch, reg, data);

            match reg {
                HorizontalTotal => self.horiz_char_total = data,
                HorizontalDisplayed => self.horiz_disp = data,
                HorizontalSyncPosition => self.horiz_sync_pos = data,
                SyncWidth => self.sync_width = CSyncWidth::from_bytes([data]),
                VerticalTotal => self.vert_char_total = data & 0x7F,
                VerticalTotalAdjust => self.vert_total_adj = data & 0x1F,
                VerticalDisplayed => self.vert_disp = data & 0x7F,
                VerticalSync => self.vert_sync_pos = data & 0x7F,
                ModeControl => {
                    self.mode_control = CModeControl::from_bytes([data]);
                    if data != 0 && !self.caps.supports_transparent {
                        log::warn!("{}: mode control {:02X} is not supported", self.chip_type, data);
                    }
                }
                MaximumScanlineAddress => self.max_ras_addr = data & 0x1F,
                CursorStartLine => self.cursor_start_ras = CCursorStart::from_bytes([data & 0x7F]),
                CursorEndLine => self.cursor_end_ras = data & 0x1F,
                StartAddressH => {
                    self.disp_start_addr = (((data & 0x3F) as u16) << 8) | (self.disp_start_addr & 0x00FF)
                }
                StartAddressL => self.disp_start_addr = (data as u16) | (self.disp_start_addr & 0xFF00),
                CursorAddressH => self.cursor_addr = (((data & 0x3F) as u16) << 8) | (self.cursor_addr & 0x00FF),
                CursorAddressL => self.cursor_addr = (data as u16) | (self.cursor_addr & 0xFF00),
                LightPenPositionH | LightPenPositionL => {
                    // Read-only.
                }
                UpdateAddressH => {
                    if self.caps.supports_transparent {
                        self.update_addr = (((data & 0x3F) as u16) << 8) | (self.update_addr & 0x00FF);
                        if self.mode_control.transparent_phi2() {
                            let strobe = self.mode_control.update_strobe() as u8;
                            self.call_on_update_address(strobe);
                        }
                    }
                }
                UpdateAddressL => {
                    if self.caps.supports_transparent {
                        self.update_addr = (data as u16) | (self.update_addr & 0xFF00);
                        if self.mode_control.transparent_phi2() {
                            let strobe = self.mode_control.update_strobe() as u8;
                            self.call_on_update_address(strobe);
                        }
                    }
                }
                TransparentUpdate => self.transparent_update(),
            }
        }

        // Hardware behavior for undefined register selects is unspecified;
        // tolerate them as no-ops, but still revalidate geometry.
        self.recompute_parameters(false);
    }

    pub fn register_r(&mut self) -> u8 {
        use CrtcRegister::*;

        let mut ret = 0;

        match CrtcRegister::from_repr(self.register_address_latch) {
            Some(StartAddressH) => {
                if self.caps.supports_disp_start_addr_r {
                    ret = (self.disp_start_addr >> 8) as u8;
                }
            }
            Some(StartAddressL) => {
                if self.caps.supports_disp_start_addr_r {
                    ret = (self.disp_start_addr & 0xFF) as u8;
                }
            }
            Some(CursorAddressH) => ret = (self.cursor_addr >> 8) as u8,
            Some(CursorAddressL) => ret = (self.cursor_addr & 0xFF) as u8,
            Some(LightPenPositionH) => {
                ret = (self.light_pen_addr >> 8) as u8;
                self.light_pen_latched = false;
            }
            Some(LightPenPositionL) => {
                ret = (self.light_pen_addr & 0xFF) as u8;
                self.light_pen_latched = false;
            }
            Some(TransparentUpdate) => self.transparent_update(),
            // All other registers are write-only and read as zero.
            _ => {}
        }

        ret
    }

    pub fn status_r(&self) -> u8 {
        let mut ret = 0;

        // Vertical blanking
        if self.caps.supports_status_reg_d5 && !self.line_enable_ff {
            ret |= 0x20;
        }

        // Light pen latched
        if self.caps.supports_status_reg_d6 && self.light_pen_latched {
            ret |= 0x40;
        }

        // Update ready
        if self.caps.supports_status_reg_d7 && self.update_ready_bit {
            ret |= 0x80;
        }

        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{crtc::tests::test_core, variants::ChipType};

    fn write_reg(crtc: &mut Crtc6845, index: u8, data: u8) {
        crtc.address_w(index);
        crtc.register_w(data);
    }

    #[test]
    fn writes_are_masked_to_field_width() {
        let mut crtc = test_core(ChipType::Mc6845);

        write_reg(&mut crtc, 0x00, 0xFF);
        assert_eq!(crtc.horiz_char_total, 0xFF);
        write_reg(&mut crtc, 0x04, 0xFF);
        assert_eq!(crtc.vert_char_total, 0x7F);
        write_reg(&mut crtc, 0x05, 0xFF);
        assert_eq!(crtc.vert_total_adj, 0x1F);
        write_reg(&mut crtc, 0x09, 0xFF);
        assert_eq!(crtc.max_ras_addr, 0x1F);
        write_reg(&mut crtc, 0x0B, 0xFF);
        assert_eq!(crtc.cursor_end_ras, 0x1F);
        write_reg(&mut crtc, 0x0C, 0xFF);
        write_reg(&mut crtc, 0x0D, 0xEE);
        assert_eq!(crtc.disp_start_addr, 0x3FEE);
        write_reg(&mut crtc, 0x0E, 0xFF);
        write_reg(&mut crtc, 0x0F, 0x55);
        assert_eq!(crtc.cursor_addr, 0x3F55);
    }

    #[test]
    fn address_latch_is_five_bits_on_base_chips() {
        let mut crtc = test_core(ChipType::Mc6845);
        crtc.address_w(0x2A);
        assert_eq!(crtc.register_address_latch, 0x0A);
    }

    #[test]
    fn write_only_registers_read_as_zero() {
        let mut crtc = test_core(ChipType::Mc6845);
        write_reg(&mut crtc, 0x00, 0x61);
        crtc.address_w(0x00);
        assert_eq!(crtc.register_r(), 0);
    }

    #[test]
    fn cursor_address_reads_back() {
        let mut crtc = test_core(ChipType::Mc6845);
        write_reg(&mut crtc, 0x0E, 0x12);
        write_reg(&mut crtc, 0x0F, 0x34);
        crtc.address_w(0x0E);
        assert_eq!(crtc.register_r(), 0x12);
        crtc.address_w(0x0F);
        assert_eq!(crtc.register_r(), 0x34);
    }

    #[test]
    fn display_start_readback_is_capability_gated() {
        let mut crtc = test_core(ChipType::Mc6845);
        write_reg(&mut crtc, 0x0C, 0x15);
        crtc.address_w(0x0C);
        assert_eq!(crtc.register_r(), 0);

        let mut crtc = test_core(ChipType::Mc6845_1);
        write_reg(&mut crtc, 0x0C, 0x15);
        crtc.address_w(0x0C);
        assert_eq!(crtc.register_r(), 0x15);
    }

    #[test]
    fn light_pen_read_clears_latch() {
        let mut crtc = test_core(ChipType::C6545_1);
        crtc.light_pen_addr = 0x1234;
        crtc.light_pen_latched = true;

        assert_eq!(crtc.status_r() & 0x40, 0x40);
        crtc.address_w(0x10);
        assert_eq!(crtc.register_r(), 0x12);
        assert_eq!(crtc.status_r() & 0x40, 0x00);
    }

    #[test]
    fn undefined_register_select_is_tolerated() {
        let mut crtc = test_core(ChipType::Mc6845);
        crtc.address_w(0x14);
        crtc.register_w(0xAA);
        assert_eq!(crtc.register_r(), 0);
    }

    #[test]
    fn status_bits_are_capability_gated() {
        let mut crtc = test_core(ChipType::Mc6845);
        crtc.light_pen_latched = true;
        crtc.update_ready_bit = true;
        assert_eq!(crtc.status_r(), 0);

        let mut crtc = test_core(ChipType::C6545_1);
        crtc.light_pen_latched = true;
        crtc.update_ready_bit = true;
        // d5 (not in vblank? line enable is false at power on) + d6
        assert_eq!(crtc.status_r(), 0x60);

        let mut crtc = test_core(ChipType::R6545_1);
        crtc.light_pen_latched = true;
        crtc.update_ready_bit = true;
        assert_eq!(crtc.status_r(), 0xE0);
    }

    #[test]
    fn cursor_start_decodes_blink_mode() {
        let mut crtc = test_core(ChipType::Mc6845);
        write_reg(&mut crtc, 0x0A, 0x4A);
        assert_eq!(crtc.cursor_start_ras.start(), 0x0A);
        assert_eq!(crtc.cursor_start_ras.mode(), CursorMode::BlinkFast);
    }

    #[test]
    fn mode_control_decodes_fields() {
        let mode = CModeControl::from_bytes([0x8F]);
        assert!(mode.interlace_and_video());
        assert!(mode.row_column_addressing());
        assert!(mode.transparent());
        assert!(mode.transparent_phi2());
        assert!(!mode.transparent_blank());

        let mode = CModeControl::from_bytes([0x48]);
        assert!(mode.transparent_blank());
        assert!(mode.update_strobe());
    }
}
