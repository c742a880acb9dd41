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

    vdc::mod.rs

    The MOS8563/8568 VDC: the shared CRTC engine with its own 64KiB of
    video memory, an extended register file (attributes, smooth scroll,
    colors, block copy engine) and an internal text/attribute row renderer.

*/

mod draw;

use modular_bitfield::{bitfield, prelude::*};
use serde_derive::{Deserialize, Serialize};

use crate::{
    crtc::{trace, CCursorStart, CModeControl, CSyncWidth, Crtc6845, CrtcState, ScreenGeometry, TimerId},
    types::*,
    variants::{ChipType, CrtController, DeviceState},
};

pub const VDC_RAM_SIZE: usize = 0x10000;

/// R24 - Vertical Smooth Scroll, with the character blink rate, reverse
/// screen and block-copy mode bits.
#[bitfield]
#[derive(Copy, Clone)]
pub struct CVertScroll {
    pub scroll: B5,
    pub cbrate: bool,
    pub rvs:    bool,
    pub copy:   bool,
}

/// R25 - Horizontal Smooth Scroll, with the pixel double-width, semi-bright
/// shift, attribute enable and text mode bits.
#[bitfield]
#[derive(Copy, Clone)]
pub struct CHorizScroll {
    pub scroll: B4,
    pub dbl:    bool,
    pub semi:   bool,
    pub attr:   bool,
    pub text:   bool,
}

pub struct Vdc8563 {
    pub(crate) crtc: Crtc6845,

    vram: Box<[u8; VDC_RAM_SIZE]>,

    pub(crate) revision: u8,
    pub(crate) attribute_addr: u16, // R20/R21
    pub(crate) horiz_char: u8,      // R22 character total/displayed pixels
    pub(crate) vert_char_disp: u8,  // R23
    pub(crate) vert_scroll: CVertScroll, // R24
    pub(crate) horiz_scroll: CHorizScroll, // R25
    pub(crate) color: u8,           // R26 fg/bg color
    pub(crate) row_addr_incr: u8,   // R27
    pub(crate) char_base_addr: u8,  // R28
    pub(crate) underline_ras: u8,   // R29
    pub(crate) word_count: u8,      // R30
    pub(crate) data_byte: u8,       // R31 latch
    pub(crate) block_addr: u16,     // R32/R33
    pub(crate) de_begin: u16,       // R34/R35
    pub(crate) dram_refresh: u8,    // R36
    pub(crate) sync_polarity: u8,   // R37

    pub(crate) char_blink_state: bool,
    pub(crate) char_blink_count: u8,
    frames_seen: u64,
}

impl Vdc8563 {
    pub(crate) fn new(mut crtc: Crtc6845) -> Self {
        // The update engine comes up idle and ready.
        crtc.update_ready_bit = true;

        let mut vdc = Self {
            crtc,
            vram: vec![0; VDC_RAM_SIZE].into_boxed_slice().try_into().unwrap(),
            revision: 1,
            attribute_addr: 0,
            horiz_char: 0,
            vert_char_disp: 0,
            vert_scroll: CVertScroll::new(),
            horiz_scroll: CHorizScroll::new(),
            color: 0,
            row_addr_incr: 0,
            char_base_addr: 0,
            underline_ras: 0,
            word_count: 0,
            data_byte: 0,
            block_addr: 0,
            de_begin: 0,
            dram_refresh: 0,
            sync_polarity: 0xC0,
            char_blink_state: false,
            char_blink_count: 0,
            frames_seen: 0,
        };

        // Uninitialized DRAM pattern.
        let mut data = 0xFF;
        for offset in 0..VDC_RAM_SIZE {
            vdc.vram[offset] = data;
            data ^= 0xFF;
        }

        vdc
    }

    #[inline]
    pub fn read_vram(&self, offset: u16) -> u8 {
        self.vram[offset as usize]
    }

    #[inline]
    pub fn write_vram(&mut self, offset: u16, data: u8) {
        self.vram[offset as usize] = data;
    }

    pub fn mem(&self) -> &[u8] {
        &self.vram[..]
    }

    pub fn mem_mut(&mut self) -> &mut [u8] {
        &mut self.vram[..]
    }

    pub fn register_w(&mut self, data: u8) {
        let crtc = &mut self.crtc;
        trace!(crtc, "R{:02} <= {:02X}", crtc.register_address_latch, data);

        match crtc.register_address_latch {
            0x00 => crtc.horiz_char_total = data,
            0x01 => crtc.horiz_disp = data,
            0x02 => crtc.horiz_sync_pos = data,
            0x03 => crtc.sync_width = CSyncWidth::from_bytes([data]),
            // Full 8-bit vertical counts and 16-bit addresses on the VDC.
            0x04 => crtc.vert_char_total = data,
            0x05 => crtc.vert_total_adj = data & 0x1F,
            0x06 => crtc.vert_disp = data,
            0x07 => crtc.vert_sync_pos = data,
            0x08 => crtc.mode_control = CModeControl::from_bytes([data & 0x03]),
            0x09 => crtc.max_ras_addr = data & 0x1F,
            0x0A => crtc.cursor_start_ras = CCursorStart::from_bytes([data & 0x7F]),
            0x0B => crtc.cursor_end_ras = data & 0x1F,
            0x0C => crtc.disp_start_addr = ((data as u16) << 8) | (crtc.disp_start_addr & 0x00FF),
            0x0D => crtc.disp_start_addr = (data as u16) | (crtc.disp_start_addr & 0xFF00),
            0x0E => crtc.cursor_addr = ((data as u16) << 8) | (crtc.cursor_addr & 0x00FF),
            0x0F => crtc.cursor_addr = (data as u16) | (crtc.cursor_addr & 0xFF00),
            0x10 | 0x11 => {
                // Light pen, read-only.
            }
            0x12 => crtc.update_addr = ((data as u16) << 8) | (crtc.update_addr & 0x00FF),
            0x13 => crtc.update_addr = (data as u16) | (crtc.update_addr & 0xFF00),
            0x14 => self.attribute_addr = ((data as u16) << 8) | (self.attribute_addr & 0x00FF),
            0x15 => self.attribute_addr = (data as u16) | (self.attribute_addr & 0xFF00),
            0x16 => self.horiz_char = data,
            0x17 => self.vert_char_disp = data & 0x1F,
            0x18 => self.vert_scroll = CVertScroll::from_bytes([data]),
            0x19 => {
                // Toggling the double-width bit switches the dot clock
                // divisor, which forces a full geometry reconfiguration.
                let dbl = self.horiz_scroll.dbl();
                self.horiz_scroll = CHorizScroll::from_bytes([data]);
                if dbl && !self.horiz_scroll.dbl() {
                    self.crtc.clk_scale = 4;
                    self.crtc.recompute_parameters(true);
                }
                if !dbl && self.horiz_scroll.dbl() {
                    self.crtc.clk_scale = 8;
                    self.crtc.recompute_parameters(true);
                }
            }
            0x1A => self.color = data,
            0x1B => self.row_addr_incr = data,
            0x1C => self.char_base_addr = data & 0xE0,
            0x1D => self.underline_ras = data & 0x1F,
            0x1E => {
                self.word_count = data;
                self.crtc.update_ready_bit = false;
                self.crtc.timers.adjust(TimerId::BlockCopy, self.crtc.cycles, 1);
            }
            0x1F => {
                self.data_byte = data;
                let addr = self.crtc.update_addr;
                self.write_vram(addr, data);
                self.crtc.update_addr = addr.wrapping_add(1);
            }
            0x20 => self.block_addr = ((data as u16) << 8) | (self.block_addr & 0x00FF),
            0x21 => self.block_addr = (data as u16) | (self.block_addr & 0xFF00),
            0x22 => self.de_begin = ((data as u16) << 8) | (self.de_begin & 0x00FF),
            0x23 => self.de_begin = (data as u16) | (self.de_begin & 0xFF00),
            0x24 => self.dram_refresh = data & 0x0F,
            0x25 => self.sync_polarity = data & 0xC0,
            _ => {}
        }

        self.crtc.recompute_parameters(false);
    }

    pub fn register_r(&mut self) -> u8 {
        let crtc = &mut self.crtc;

        match crtc.register_address_latch {
            0x00 => crtc.horiz_char_total,
            0x01 => crtc.horiz_disp,
            0x02 => crtc.horiz_sync_pos,
            0x03 => crtc.sync_width.into_bytes()[0],
            0x04 => crtc.vert_char_total,
            0x05 => crtc.vert_total_adj | 0xC0,
            0x06 => crtc.vert_disp,
            0x07 => crtc.vert_sync_pos,
            0x08 => crtc.mode_control.into_bytes()[0] | 0xFC,
            0x09 => crtc.max_ras_addr | 0xE0,
            0x0A => crtc.cursor_start_ras.into_bytes()[0] | 0x80,
            0x0B => crtc.cursor_end_ras | 0xE0,
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
            0x12 => (crtc.update_addr >> 8) as u8,
            0x13 => (crtc.update_addr & 0xFF) as u8,
            0x14 => (self.attribute_addr >> 8) as u8,
            0x15 => (self.attribute_addr & 0xFF) as u8,
            0x16 => self.horiz_char,
            0x17 => self.vert_char_disp | 0xE0,
            0x18 => self.vert_scroll.into_bytes()[0],
            0x19 => self.horiz_scroll.into_bytes()[0],
            0x1A => self.color,
            0x1B => self.row_addr_incr,
            0x1C => self.char_base_addr | 0x1F,
            0x1D => self.underline_ras | 0xE0,
            0x1E => self.word_count,
            0x1F => {
                // Memory read through the update pointer, post-incrementing.
                let addr = self.crtc.update_addr;
                self.crtc.update_addr = addr.wrapping_add(1);
                self.read_vram(addr)
            }
            0x20 => (self.block_addr >> 8) as u8,
            0x21 => (self.block_addr & 0xFF) as u8,
            0x22 => (self.de_begin >> 8) as u8,
            0x23 => (self.de_begin & 0xFF) as u8,
            0x24 => self.dram_refresh | 0xF0,
            0x25 => self.sync_polarity | 0x3F,
            _ => 0xFF,
        }
    }

    pub fn status_r(&self) -> u8 {
        let mut ret = self.revision;

        // Vertical blanking
        if !self.crtc.line_enable_ff {
            ret |= 0x20;
        }

        // Light pen latched
        if self.crtc.light_pen_latched {
            ret |= 0x40;
        }

        // Update ready
        if self.crtc.update_ready_bit {
            ret |= 0x80;
        }

        ret
    }

    /// One step of the block copy engine: move (or fill) a single byte,
    /// then reschedule until the word count runs out.
    fn block_copy_tick(&mut self) {
        let data = if self.vert_scroll.copy() {
            let addr = self.block_addr;
            self.block_addr = addr.wrapping_add(1);
            self.read_vram(addr)
        }
        else {
            self.data_byte
        };

        let addr = self.crtc.update_addr;
        self.write_vram(addr, data);
        self.crtc.update_addr = addr.wrapping_add(1);

        self.word_count = self.word_count.wrapping_sub(1);
        if self.word_count != 0 {
            self.crtc.timers.adjust(TimerId::BlockCopy, self.crtc.cycles, 1);
        }
        else {
            self.crtc.update_ready_bit = true;
        }
    }

    /// Bring the character blink state up to date with the frames the
    /// engine has completed since we last drew.
    pub(crate) fn sync_blink_state(&mut self) {
        while self.frames_seen < self.crtc.frame_count {
            self.frames_seen += 1;

            let last_count = self.char_blink_count;
            self.char_blink_count = self.char_blink_count.wrapping_add(1);

            let mask = if self.vert_scroll.cbrate() { 0x20 } else { 0x10 };
            if (last_count & mask) != (self.char_blink_count & mask) {
                self.char_blink_state = !self.char_blink_state;
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VdcState {
    pub crtc: CrtcState,
    pub vram: Vec<u8>,
    pub revision: u8,
    pub attribute_addr: u16,
    pub horiz_char: u8,
    pub vert_char_disp: u8,
    pub vert_scroll: u8,
    pub horiz_scroll: u8,
    pub color: u8,
    pub row_addr_incr: u8,
    pub char_base_addr: u8,
    pub underline_ras: u8,
    pub word_count: u8,
    pub data_byte: u8,
    pub block_addr: u16,
    pub de_begin: u16,
    pub dram_refresh: u8,
    pub sync_polarity: u8,
    pub char_blink_state: bool,
    pub char_blink_count: u8,
    pub frames_seen: u64,
}

impl CrtController for Vdc8563 {
    fn chip_type(&self) -> ChipType {
        self.crtc.chip_type
    }

    fn reset(&mut self) {
        self.crtc.reset();
        self.sync_polarity = 0xC0;
    }

    fn run(&mut self, cclks: u64) {
        let deadline = self.crtc.cycles + cclks;
        while let Some((id, param)) = self.crtc.next_event(deadline) {
            match id {
                TimerId::BlockCopy => self.block_copy_tick(),
                _ => self.crtc.dispatch(id, param),
            }
        }
        self.crtc.cycles = deadline;
    }

    fn select_register(&mut self, index: u8) {
        self.crtc.address_w(index);
    }

    fn read_register(&mut self) -> u8 {
        Vdc8563::register_r(self)
    }

    fn write_register(&mut self, data: u8) {
        Vdc8563::register_w(self, data);
    }

    fn read_status(&mut self) -> u8 {
        Vdc8563::status_r(self)
    }

    fn screen_update(&mut self, bitmap: &mut Bitmap32, clip: &ClipRect) {
        if !self.crtc.begin_screen_update(bitmap, clip) {
            return;
        }

        self.sync_blink_state();

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
        DeviceState::Vdc(VdcState {
            crtc: self.crtc.snapshot(),
            vram: self.vram.to_vec(),
            revision: self.revision,
            attribute_addr: self.attribute_addr,
            horiz_char: self.horiz_char,
            vert_char_disp: self.vert_char_disp,
            vert_scroll: self.vert_scroll.into_bytes()[0],
            horiz_scroll: self.horiz_scroll.into_bytes()[0],
            color: self.color,
            row_addr_incr: self.row_addr_incr,
            char_base_addr: self.char_base_addr,
            underline_ras: self.underline_ras,
            word_count: self.word_count,
            data_byte: self.data_byte,
            block_addr: self.block_addr,
            de_begin: self.de_begin,
            dram_refresh: self.dram_refresh,
            sync_polarity: self.sync_polarity,
            char_blink_state: self.char_blink_state,
            char_blink_count: self.char_blink_count,
            frames_seen: self.frames_seen,
        })
    }

    fn restore_state(&mut self, state: &DeviceState) {
        match state {
            DeviceState::Vdc(state) => {
                self.crtc.restore_snapshot(&state.crtc);
                let len = state.vram.len().min(VDC_RAM_SIZE);
                self.vram[..len].copy_from_slice(&state.vram[..len]);
                self.revision = state.revision;
                self.attribute_addr = state.attribute_addr;
                self.horiz_char = state.horiz_char;
                self.vert_char_disp = state.vert_char_disp;
                self.vert_scroll = CVertScroll::from_bytes([state.vert_scroll]);
                self.horiz_scroll = CHorizScroll::from_bytes([state.horiz_scroll]);
                self.color = state.color;
                self.row_addr_incr = state.row_addr_incr;
                self.char_base_addr = state.char_base_addr;
                self.underline_ras = state.underline_ras;
                self.word_count = state.word_count;
                self.data_byte = state.data_byte;
                self.block_addr = state.block_addr;
                self.de_begin = state.de_begin;
                self.dram_refresh = state.dram_refresh;
                self.sync_polarity = state.sync_polarity;
                self.char_blink_state = state.char_blink_state;
                self.char_blink_count = state.char_blink_count;
                self.frames_seen = state.frames_seen;
            }
            _ => log::warn!("{}: state snapshot is for a different chip family", self.crtc.chip_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variants::{CrtcBuilder, CrtcDevice};

    pub(crate) fn test_vdc() -> Vdc8563 {
        match CrtcBuilder::new(ChipType::Mos8563, 16_000_000, 8).build().unwrap() {
            CrtcDevice::Vdc8563(vdc) => vdc,
            _ => panic!("expected VDC"),
        }
    }

    pub(crate) fn write_reg(vdc: &mut Vdc8563, index: u8, data: u8) {
        vdc.crtc.address_w(index);
        vdc.register_w(data);
    }

    #[test]
    fn vram_powers_up_with_alternating_pattern() {
        let vdc = test_vdc();
        assert_eq!(vdc.read_vram(0), 0xFF);
        assert_eq!(vdc.read_vram(1), 0x00);
        assert_eq!(vdc.read_vram(0xFFFE), 0xFF);
        assert_eq!(vdc.read_vram(0xFFFF), 0x00);
    }

    #[test]
    fn data_register_write_stores_and_post_increments() {
        let mut vdc = test_vdc();
        write_reg(&mut vdc, 0x12, 0x01); // update address 0x0100
        write_reg(&mut vdc, 0x13, 0x00);
        write_reg(&mut vdc, 0x1F, 0x55);
        write_reg(&mut vdc, 0x1F, 0xAA);

        assert_eq!(vdc.read_vram(0x0100), 0x55);
        assert_eq!(vdc.read_vram(0x0101), 0xAA);
        assert_eq!(vdc.crtc.update_addr, 0x0102);
    }

    #[test]
    fn data_register_read_post_increments() {
        let mut vdc = test_vdc();
        vdc.write_vram(0x0200, 0x12);
        vdc.write_vram(0x0201, 0x34);
        write_reg(&mut vdc, 0x12, 0x02);
        write_reg(&mut vdc, 0x13, 0x00);

        vdc.crtc.address_w(0x1F);
        assert_eq!(vdc.register_r(), 0x12);
        assert_eq!(vdc.register_r(), 0x34);
    }

    #[test]
    fn block_fill_writes_word_count_bytes() {
        let mut vdc = test_vdc();
        write_reg(&mut vdc, 0x12, 0x01); // update address 0x0100
        write_reg(&mut vdc, 0x13, 0x00);
        write_reg(&mut vdc, 0x1F, 0x55); // fill byte, stored at 0x0100

        write_reg(&mut vdc, 0x1E, 4); // start the fill
        assert!(!vdc.crtc.update_ready_bit);
        vdc.run(4);

        for addr in 0x0101..0x0105 {
            assert_eq!(vdc.read_vram(addr), 0x55);
        }
        assert_eq!(vdc.read_vram(0x0105), 0x00, "fill must stop at the word count");
        assert!(vdc.crtc.update_ready_bit);
        assert_eq!(vdc.status_r() & 0x80, 0x80);
    }

    #[test]
    fn block_copy_moves_from_block_address() {
        let mut vdc = test_vdc();
        for i in 0..4u16 {
            vdc.write_vram(0x2000 + i, 0xA0 + i as u8);
        }
        write_reg(&mut vdc, 0x18, 0x80); // copy mode
        write_reg(&mut vdc, 0x12, 0x30); // destination 0x3000
        write_reg(&mut vdc, 0x13, 0x00);
        write_reg(&mut vdc, 0x20, 0x20); // source 0x2000
        write_reg(&mut vdc, 0x21, 0x00);
        write_reg(&mut vdc, 0x1E, 4);
        vdc.run(4);

        for i in 0..4u16 {
            assert_eq!(vdc.read_vram(0x3000 + i), 0xA0 + i as u8);
        }
        assert_eq!(vdc.block_addr, 0x2004);
        assert_eq!(vdc.crtc.update_addr, 0x3004);
    }

    #[test]
    fn status_carries_revision_and_vblank() {
        let vdc = test_vdc();
        // Line enable is low at power-on: revision 1 + vblank + update ready.
        assert_eq!(vdc.status_r(), 0xA1);
    }

    #[test]
    fn reads_fold_in_fixed_bits() {
        let mut vdc = test_vdc();
        write_reg(&mut vdc, 0x05, 0x02);
        vdc.crtc.address_w(0x05);
        assert_eq!(vdc.register_r(), 0xC2);

        write_reg(&mut vdc, 0x1C, 0xFF);
        vdc.crtc.address_w(0x1C);
        assert_eq!(vdc.register_r(), 0xFF);
        assert_eq!(vdc.char_base_addr, 0xE0);

        write_reg(&mut vdc, 0x17, 0x08);
        vdc.crtc.address_w(0x17);
        assert_eq!(vdc.register_r(), 0xE8);
    }

    #[test]
    fn sixteen_bit_display_start_is_accepted() {
        let mut vdc = test_vdc();
        write_reg(&mut vdc, 0x0C, 0xD5);
        write_reg(&mut vdc, 0x0D, 0xAA);
        assert_eq!(vdc.crtc.disp_start_addr, 0xD5AA);
    }

    #[test]
    fn double_width_bit_switches_clock_scale() {
        let mut vdc = test_vdc();
        assert_eq!(vdc.crtc.clk_scale, 8);
        write_reg(&mut vdc, 0x19, 0x10); // set double width
        assert_eq!(vdc.crtc.clk_scale, 8);
        write_reg(&mut vdc, 0x19, 0x00); // clear it again
        assert_eq!(vdc.crtc.clk_scale, 4);
    }
}
