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

    crtc2::mod.rs

    The HD6345 "CRTC-II": the Hitachi engine with a 6-bit register latch,
    up to four independently addressed display screens selected by split
    position, and a second cursor (stored but not rendered).

*/

use serde_derive::{Deserialize, Serialize};

use crate::{
    crtc::{trace, CCursorStart, CSyncWidth, Crtc6845, CrtcState, ScreenGeometry},
    types::*,
    variants::{ChipType, CrtController, DeviceState},
};

pub struct Crtc2 {
    pub(crate) crtc: Crtc6845,

    // Screen 2-4 split positions and start addresses
    pub(crate) disp2_pos: u8,
    pub(crate) disp2_start_addr: u16,
    pub(crate) disp3_pos: u8,
    pub(crate) disp3_start_addr: u16,
    pub(crate) disp4_pos: u8,
    pub(crate) disp4_start_addr: u16,

    pub(crate) vert_sync_pos_adj: u8,
    pub(crate) smooth_scroll_ras: u8,
    pub(crate) control1: u8,
    pub(crate) control2: u8,
    pub(crate) control3: u8,
    pub(crate) mem_width_offs: u8,

    // Second cursor; register storage only.
    pub(crate) cursor2_start_ras: u8,
    pub(crate) cursor2_end_ras: u8,
    pub(crate) cursor2_addr: u16,
    pub(crate) cursor_width: u8,
    pub(crate) cursor2_width: u8,
}

impl Crtc2 {
    pub(crate) fn new(crtc: Crtc6845) -> Self {
        Self {
            crtc,
            disp2_pos: 0,
            disp2_start_addr: 0,
            disp3_pos: 0,
            disp3_start_addr: 0,
            disp4_pos: 0,
            disp4_start_addr: 0,
            vert_sync_pos_adj: 0,
            smooth_scroll_ras: 0,
            control1: 0,
            control2: 0,
            control3: 0,
            mem_width_offs: 0,
            cursor2_start_ras: 0,
            cursor2_end_ras: 0,
            cursor2_addr: 0,
            cursor_width: 0,
            cursor2_width: 0,
        }
    }

    pub fn register_w(&mut self, data: u8) {
        let crtc = &mut self.crtc;
        trace!(crtc, "R{:02} <= {:02X}", crtc.register_address_latch, data);

        match crtc.register_address_latch {
            0x00 => crtc.horiz_char_total = data,
            0x01 => crtc.horiz_disp = data,
            0x02 => crtc.horiz_sync_pos = data,
            0x03 => crtc.sync_width = CSyncWidth::from_bytes([data]),
            // The CRTC-II vertical counts are full 8-bit fields.
            0x04 => crtc.vert_char_total = data,
            0x05 => crtc.vert_total_adj = data & 0x1F,
            0x06 => crtc.vert_disp = data,
            0x07 => crtc.vert_sync_pos = data,
            0x08 => crtc.mode_control = crate::crtc::CModeControl::from_bytes([data & 0xF3]),
            0x09 => crtc.max_ras_addr = data & 0x1F,
            0x0A => crtc.cursor_start_ras = CCursorStart::from_bytes([data & 0x7F]),
            0x0B => crtc.cursor_end_ras = data & 0x1F,
            0x0C => crtc.disp_start_addr = (((data & 0x3F) as u16) << 8) | (crtc.disp_start_addr & 0x00FF),
            0x0D => crtc.disp_start_addr = (data as u16) | (crtc.disp_start_addr & 0xFF00),
            0x0E => crtc.cursor_addr = (((data & 0x3F) as u16) << 8) | (crtc.cursor_addr & 0x00FF),
            0x0F => crtc.cursor_addr = (data as u16) | (crtc.cursor_addr & 0xFF00),
            0x10 | 0x11 => {
                // Light pen, read-only.
            }
            0x12 => self.disp2_pos = data,
            0x13 => self.disp2_start_addr = (((data & 0x3F) as u16) << 8) | (self.disp2_start_addr & 0x00FF),
            0x14 => self.disp2_start_addr = (data as u16) | (self.disp2_start_addr & 0xFF00),
            0x15 => self.disp3_pos = data,
            0x16 => self.disp3_start_addr = (((data & 0x3F) as u16) << 8) | (self.disp3_start_addr & 0x00FF),
            0x17 => self.disp3_start_addr = (data as u16) | (self.disp3_start_addr & 0xFF00),
            0x18 => self.disp4_pos = data,
            0x19 => self.disp4_start_addr = (((data & 0x3F) as u16) << 8) | (self.disp4_start_addr & 0x00FF),
            0x1A => self.disp4_start_addr = (data as u16) | (self.disp4_start_addr & 0xFF00),
            0x1B => self.vert_sync_pos_adj = data & 0x1F,
            0x1C => {
                // Light pen raster, read-only.
            }
            0x1D => self.smooth_scroll_ras = data & 0x1F,
            0x1E => self.control1 = data,
            0x1F => self.control2 = data & 0xF8,
            0x20 => self.control3 = data & 0xFE,
            0x21 => self.mem_width_offs = data,
            0x22 => self.cursor2_start_ras = data & 0x7F,
            0x23 => self.cursor2_end_ras = data & 0x1F,
            0x24 => self.cursor2_addr = (((data & 0x3F) as u16) << 8) | (self.cursor2_addr & 0x00FF),
            0x25 => self.cursor2_addr = (data as u16) | (self.cursor2_addr & 0xFF00),
            0x26 => self.cursor_width = data,
            0x27 => self.cursor2_width = data,
            _ => {}
        }

        self.crtc.recompute_parameters(false);
    }

    pub fn register_r(&mut self) -> u8 {
        let crtc = &mut self.crtc;

        match crtc.register_address_latch {
            0x0C => (crtc.disp_start_addr >> 8) as u8,
            0x0D => (crtc.disp_start_addr & 0xFF) as u8,
            0x0E => (crtc.cursor_addr >> 8) as u8,
            0x0F => (crtc.cursor_addr & 0xFF) as u8,
            0x10 => {
                let ret = (crtc.light_pen_addr >> 8) as u8;
                crtc.light_pen_latched = false;
                ret
            }
            0x11 => {
                let ret = (crtc.light_pen_addr & 0xFF) as u8;
                crtc.light_pen_latched = false;
                ret
            }
            0x12 => self.disp2_pos,
            0x13 => (self.disp2_start_addr >> 8) as u8,
            0x14 => (self.disp2_start_addr & 0xFF) as u8,
            0x15 => self.disp3_pos,
            0x16 => (self.disp3_start_addr >> 8) as u8,
            0x17 => (self.disp3_start_addr & 0xFF) as u8,
            0x18 => self.disp4_pos,
            0x19 => (self.disp4_start_addr >> 8) as u8,
            0x1A => (self.disp4_start_addr & 0xFF) as u8,
            0x1B => self.vert_sync_pos_adj,
            0x1D => self.smooth_scroll_ras,
            0x21 => self.mem_width_offs,
            0x24 => (self.cursor2_addr >> 8) as u8,
            0x25 => (self.cursor2_addr & 0xFF) as u8,
            0x26 => self.cursor_width,
            0x27 => self.cursor2_width,
            _ => 0,
        }
    }

    /// Draw one scanline, then switch the running display address at a
    /// split boundary. A split is active when enabled by the control-1
    /// screen count and its position is unambiguous.
    pub fn draw_scanline(&mut self, y: u16, bitmap: &mut Bitmap32, clip: &ClipRect) -> u8 {
        let ra = self.crtc.draw_scanline(y, bitmap, clip);

        if ra == self.crtc.max_ras_addr + self.crtc.video_ras_adjust() - 1 {
            let char_height = (self.crtc.max_ras_addr + self.crtc.video_ras_adjust()) as u16;
            let y_pos = y / char_height;
            let screens = self.control1 & 0x03;

            if screens > 0
                && y_pos == self.disp2_pos as u16
                && self.disp2_pos != self.disp3_pos
                && self.disp2_pos != self.disp4_pos
            {
                self.crtc.current_disp_addr = self.disp2_start_addr;
            }
            if screens > 1
                && y_pos == self.disp3_pos as u16
                && self.disp3_pos != self.disp2_pos
                && self.disp3_pos != self.disp4_pos
            {
                self.crtc.current_disp_addr = self.disp3_start_addr;
            }
            if screens > 2
                && y_pos == self.disp4_pos as u16
                && self.disp4_pos != self.disp2_pos
                && self.disp4_pos != self.disp3_pos
            {
                self.crtc.current_disp_addr = self.disp4_start_addr;
            }
        }

        ra
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Crtc2State {
    pub crtc: CrtcState,
    pub disp2_pos: u8,
    pub disp2_start_addr: u16,
    pub disp3_pos: u8,
    pub disp3_start_addr: u16,
    pub disp4_pos: u8,
    pub disp4_start_addr: u16,
    pub vert_sync_pos_adj: u8,
    pub smooth_scroll_ras: u8,
    pub control1: u8,
    pub control2: u8,
    pub control3: u8,
    pub mem_width_offs: u8,
    pub cursor2_start_ras: u8,
    pub cursor2_end_ras: u8,
    pub cursor2_addr: u16,
    pub cursor_width: u8,
    pub cursor2_width: u8,
}

impl CrtController for Crtc2 {
    fn chip_type(&self) -> ChipType {
        self.crtc.chip_type
    }

    fn reset(&mut self) {
        self.crtc.reset();
        self.control1 = 0;
        self.control2 = 0;
        self.control3 = 0;
    }

    fn run(&mut self, cclks: u64) {
        self.crtc.run(cclks);
    }

    fn select_register(&mut self, index: u8) {
        self.crtc.address_w(index);
    }

    fn read_register(&mut self) -> u8 {
        Crtc2::register_r(self)
    }

    fn write_register(&mut self, data: u8) {
        Crtc2::register_w(self, data);
    }

    fn read_status(&mut self) -> u8 {
        self.crtc.status_r()
    }

    fn screen_update(&mut self, bitmap: &mut Bitmap32, clip: &ClipRect) {
        if !self.crtc.begin_screen_update(bitmap, clip) {
            return;
        }

        for y in clip.min_y..=clip.max_y {
            self.draw_scanline(y, bitmap, clip);
        }

        if let Some(cb) = self.crtc.end_update.as_mut() {
            cb(bitmap, clip);
        }
    }

    fn assert_light_pen_input(&mut self) {
        self.crtc.assert_light_pen_input();
    }

    fn get_ma(&mut self) -> u16 {
        self.crtc.get_ma()
    }

    fn get_ra(&self) -> u8 {
        self.crtc.get_ra()
    }

    fn de(&self) -> bool {
        self.crtc.de()
    }

    fn hsync(&self) -> bool {
        self.crtc.hsync()
    }

    fn vsync(&self) -> bool {
        self.crtc.vsync()
    }

    fn cursor(&self) -> bool {
        self.crtc.cursor()
    }

    fn set_hpixels_per_column(&mut self, hpixels_per_column: u8) {
        self.crtc.set_hpixels_per_column(hpixels_per_column);
    }

    fn geometry(&self) -> ScreenGeometry {
        self.crtc.geometry()
    }

    fn save_state(&self) -> DeviceState {
        DeviceState::Crtc2(Crtc2State {
            crtc: self.crtc.snapshot(),
            disp2_pos: self.disp2_pos,
            disp2_start_addr: self.disp2_start_addr,
            disp3_pos: self.disp3_pos,
            disp3_start_addr: self.disp3_start_addr,
            disp4_pos: self.disp4_pos,
            disp4_start_addr: self.disp4_start_addr,
            vert_sync_pos_adj: self.vert_sync_pos_adj,
            smooth_scroll_ras: self.smooth_scroll_ras,
            control1: self.control1,
            control2: self.control2,
            control3: self.control3,
            mem_width_offs: self.mem_width_offs,
            cursor2_start_ras: self.cursor2_start_ras,
            cursor2_end_ras: self.cursor2_end_ras,
            cursor2_addr: self.cursor2_addr,
            cursor_width: self.cursor_width,
            cursor2_width: self.cursor2_width,
        })
    }

    fn restore_state(&mut self, state: &DeviceState) {
        match state {
            DeviceState::Crtc2(state) => {
                self.crtc.restore_snapshot(&state.crtc);
                self.disp2_pos = state.disp2_pos;
                self.disp2_start_addr = state.disp2_start_addr;
                self.disp3_pos = state.disp3_pos;
                self.disp3_start_addr = state.disp3_start_addr;
                self.disp4_pos = state.disp4_pos;
                self.disp4_start_addr = state.disp4_start_addr;
                self.vert_sync_pos_adj = state.vert_sync_pos_adj;
                self.smooth_scroll_ras = state.smooth_scroll_ras;
                self.control1 = state.control1;
                self.control2 = state.control2;
                self.control3 = state.control3;
                self.mem_width_offs = state.mem_width_offs;
                self.cursor2_start_ras = state.cursor2_start_ras;
                self.cursor2_end_ras = state.cursor2_end_ras;
                self.cursor2_addr = state.cursor2_addr;
                self.cursor_width = state.cursor_width;
                self.cursor2_width = state.cursor2_width;
            }
            _ => log::warn!("{}: state snapshot is for a different chip family", self.crtc.chip_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variants::{CrtcBuilder, CrtcDevice};

    fn test_crtc2() -> Crtc2 {
        match CrtcBuilder::new(ChipType::Hd6345, 2_000_000, 8)
            .update_row(|_, _, _| {})
            .build()
            .unwrap()
        {
            CrtcDevice::Crtc2(crtc2) => crtc2,
            _ => panic!("expected CRTC-II"),
        }
    }

    fn write_reg(crtc2: &mut Crtc2, index: u8, data: u8) {
        crtc2.crtc.address_w(index);
        crtc2.register_w(data);
    }

    fn program_text_screen(crtc2: &mut Crtc2) {
        write_reg(crtc2, 0x00, 49);
        write_reg(crtc2, 0x01, 40);
        write_reg(crtc2, 0x02, 42);
        write_reg(crtc2, 0x03, 0x24);
        write_reg(crtc2, 0x04, 5);
        write_reg(crtc2, 0x06, 4);
        write_reg(crtc2, 0x07, 5);
        write_reg(crtc2, 0x09, 7);
    }

    #[test]
    fn address_latch_is_six_bits() {
        let mut crtc2 = test_crtc2();
        crtc2.crtc.address_w(0x27);
        assert_eq!(crtc2.crtc.register_address_latch, 0x27);
    }

    #[test]
    fn extended_registers_store_and_read_back() {
        let mut crtc2 = test_crtc2();

        write_reg(&mut crtc2, 0x12, 12);
        write_reg(&mut crtc2, 0x13, 0xFF);
        write_reg(&mut crtc2, 0x14, 0x80);
        write_reg(&mut crtc2, 0x1B, 0xFF);
        write_reg(&mut crtc2, 0x1F, 0xFF);
        write_reg(&mut crtc2, 0x20, 0xFF);
        write_reg(&mut crtc2, 0x26, 3);

        assert_eq!(crtc2.disp2_pos, 12);
        assert_eq!(crtc2.disp2_start_addr, 0x3F80);
        assert_eq!(crtc2.vert_sync_pos_adj, 0x1F);
        assert_eq!(crtc2.control2, 0xF8);
        assert_eq!(crtc2.control3, 0xFE);

        crtc2.crtc.address_w(0x13);
        assert_eq!(crtc2.register_r(), 0x3F);
        crtc2.crtc.address_w(0x26);
        assert_eq!(crtc2.register_r(), 3);
    }

    #[test]
    fn vertical_counts_are_eight_bit_fields() {
        let mut crtc2 = test_crtc2();
        write_reg(&mut crtc2, 0x04, 0xF0);
        write_reg(&mut crtc2, 0x06, 0xE0);
        assert_eq!(crtc2.crtc.vert_char_total, 0xF0);
        assert_eq!(crtc2.crtc.vert_disp, 0xE0);
    }

    #[test]
    fn split_switches_running_display_address() {
        let mut crtc2 = test_crtc2();
        program_text_screen(&mut crtc2);
        write_reg(&mut crtc2, 0x0C, 0x01); // screen 1 start 0x0100
        write_reg(&mut crtc2, 0x0D, 0x00);
        write_reg(&mut crtc2, 0x12, 1); // screen 2 at character row 1
        write_reg(&mut crtc2, 0x13, 0x08); // screen 2 start 0x0800
        write_reg(&mut crtc2, 0x14, 0x00);
        write_reg(&mut crtc2, 0x1E, 0x01); // one split active

        let mut bitmap = Bitmap32::new(400, 48);
        let clip = ClipRect::new(0, 399, 0, 31);
        crtc2.screen_update(&mut bitmap, &clip);

        // After the split row finished, the running address continues from
        // the second screen (plus one row advance).
        assert_eq!(crtc2.crtc.current_disp_addr, (0x0800 + 2 * 40) & 0x3FFF);
    }

    #[test]
    fn split_positions_must_be_unambiguous() {
        let mut crtc2 = test_crtc2();
        program_text_screen(&mut crtc2);
        write_reg(&mut crtc2, 0x12, 1);
        write_reg(&mut crtc2, 0x13, 0x08);
        write_reg(&mut crtc2, 0x15, 1); // screen 3 collides with screen 2
        write_reg(&mut crtc2, 0x1E, 0x02);

        let mut bitmap = Bitmap32::new(400, 48);
        let clip = ClipRect::new(0, 399, 0, 31);
        crtc2.screen_update(&mut bitmap, &clip);

        // No switch occurred: four rows of forty characters from zero.
        assert_eq!(crtc2.crtc.current_disp_addr, 4 * 40);
    }
}
