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

    crtc::draw.rs

    Scanline renderer bridge. For each visible scanline, computes the row
    parameters (display address, raster row, cursor column, blanking
    porches) and hands them to the external row-draw callback.

*/

use super::*;

impl Crtc6845 {
    /// Compute the row-draw parameters for scanline `y`.
    pub(crate) fn scanline_params(&self, y: u16) -> RowParams {
        let char_height = (self.max_ras_addr + self.video_ras_adjust()) as u16;
        let ra = (y % char_height) as u8;

        let cursor_x = if self.check_cursor_visible(ra, self.current_disp_addr) {
            // In units of characters, relative to the start of the
            // displayable area.
            (self.cursor_addr - self.current_disp_addr) as i32
        }
        else {
            -1
        };

        let de = y <= self.geometry.max_visible_y;
        let hbp = self.geometry.horiz_pix_total.saturating_sub(self.geometry.hsync_off_pos);
        let vbp = self.geometry.vert_pix_total.saturating_sub(self.geometry.vsync_off_pos);

        let ma = if self.mode_control.row_column_addressing() {
            let char_row = y / char_height;
            (char_row << 8).wrapping_add(self.disp_start_addr)
        }
        else {
            self.current_disp_addr
        };

        RowParams {
            ma,
            ra,
            y,
            x_count: self.horiz_disp,
            cursor_x,
            de,
            hbp,
            vbp,
        }
    }

    /// Advance the running display address when the bottom raster row of a
    /// character cell has been drawn.
    pub(crate) fn advance_row_addr(&mut self, ra: u8) {
        if ra == self.max_ras_addr + self.video_ras_adjust() - 1 {
            self.current_disp_addr = (self.current_disp_addr + self.horiz_disp as u16) & MA_MASK;
        }
    }

    /// Draw one scanline through the external row callback. Returns the
    /// raster row drawn.
    pub fn draw_scanline(&mut self, y: u16, bitmap: &mut Bitmap32, clip: &ClipRect) -> u8 {
        let params = self.scanline_params(y);

        if let Some(cb) = self.update_row.as_mut() {
            cb(bitmap, clip, &params);
        }

        self.advance_row_addr(params.ra);
        params.ra
    }

    /// Validity gate and per-frame setup shared by all variants' screen
    /// updates. Returns false if the display is blanked.
    pub(crate) fn begin_screen_update(&mut self, bitmap: &mut Bitmap32, clip: &ClipRect) -> bool {
        if !self.geometry.valid {
            if !self.display_disabled_msg_shown {
                log::error!("{}: invalid screen parameters - display disabled", self.chip_type);
                self.display_disabled_msg_shown = true;
            }
            return false;
        }

        if self.display_disabled_msg_shown {
            log::info!("{}: valid screen parameters - display reenabled", self.chip_type);
            self.display_disabled_msg_shown = false;
        }

        if let Some(cb) = self.begin_update.as_mut() {
            cb(bitmap, clip);
        }

        // Read the start address at the beginning of the frame.
        if clip.min_y == 0 {
            self.current_disp_addr = self.disp_start_addr;
        }

        true
    }

    /// Draw every scanline in the clip region, in increasing y order.
    pub fn screen_update(&mut self, bitmap: &mut Bitmap32, clip: &ClipRect) {
        if !self.begin_screen_update(bitmap, clip) {
            return;
        }

        for y in clip.min_y..=clip.max_y {
            self.draw_scanline(y, bitmap, clip);
        }

        if let Some(cb) = self.end_update.as_mut() {
            cb(bitmap, clip);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variants::{ChipType, CrtcBuilder, CrtcDevice};
    use std::sync::{Arc, Mutex};

    fn write_reg(crtc: &mut Crtc6845, index: u8, data: u8) {
        crtc.address_w(index);
        crtc.register_w(data);
    }

    fn recording_core(chip_type: ChipType) -> (Crtc6845, Arc<Mutex<Vec<RowParams>>>) {
        let rows = Arc::new(Mutex::new(Vec::new()));
        let rows_c = rows.clone();

        let mut builder = CrtcBuilder::new(chip_type, 2_000_000, 8).update_row(move |_, _, params| {
            rows_c.lock().unwrap().push(*params);
        });
        if chip_type.caps().supports_transparent {
            builder = builder.on_update_addr(|_, _| {});
        }

        let crtc = match builder.build().unwrap() {
            CrtcDevice::Crtc6845(crtc) => crtc,
            _ => unreachable!(),
        };

        (crtc, rows)
    }

    /// 40x4 character text screen, 8 raster rows per character.
    fn program_text_screen(crtc: &mut Crtc6845) {
        write_reg(crtc, 0x00, 49);
        write_reg(crtc, 0x01, 40);
        write_reg(crtc, 0x02, 42);
        write_reg(crtc, 0x03, 0x24);
        write_reg(crtc, 0x04, 5);
        write_reg(crtc, 0x06, 4);
        write_reg(crtc, 0x07, 5);
        write_reg(crtc, 0x09, 7);
    }

    #[test]
    fn linear_addressing_advances_each_character_row() {
        let (mut crtc, rows) = recording_core(ChipType::Mc6845);
        program_text_screen(&mut crtc);
        write_reg(&mut crtc, 0x0C, 0x01); // display start 0x0100
        write_reg(&mut crtc, 0x0D, 0x00);

        let mut bitmap = Bitmap32::new(400, 48);
        let clip = ClipRect::new(0, 399, 0, 31);
        crtc.screen_update(&mut bitmap, &clip);

        let rows = rows.lock().unwrap();
        assert_eq!(rows.len(), 32);
        assert!(rows[0..8].iter().all(|r| r.ma == 0x0100));
        assert!(rows[8..16].iter().all(|r| r.ma == 0x0128));
        assert!(rows[16..24].iter().all(|r| r.ma == 0x0150));
        assert_eq!(rows[8].ra, 0);
        assert_eq!(rows[15].ra, 7);
        assert_eq!(rows[0].x_count, 40);
    }

    #[test]
    fn row_column_addressing_packs_character_row() {
        let (mut crtc, rows) = recording_core(ChipType::R6545_1);
        // Quiet the unsupported-mode warning path by using a chip that
        // implements the mode register.
        program_text_screen(&mut crtc);
        write_reg(&mut crtc, 0x08, 0x04); // row/column addressing
        write_reg(&mut crtc, 0x0C, 0x01);
        write_reg(&mut crtc, 0x0D, 0x00);

        let mut bitmap = Bitmap32::new(400, 48);
        let clip = ClipRect::new(0, 399, 0, 31);
        crtc.screen_update(&mut bitmap, &clip);

        let rows = rows.lock().unwrap();
        assert_eq!(rows[0].ma, 0x0100);
        assert_eq!(rows[8].ma, 0x0200);
        assert_eq!(rows[24].ma, 0x0400);
    }

    #[test]
    fn porches_derive_from_sync_off_positions() {
        let (mut crtc, rows) = recording_core(ChipType::Mc6845);
        program_text_screen(&mut crtc);

        let geometry = crtc.geometry();
        assert!(geometry.valid);

        let mut bitmap = Bitmap32::new(400, 48);
        let clip = ClipRect::new(0, 399, 0, 0);
        crtc.screen_update(&mut bitmap, &clip);

        let rows = rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].hbp,
            geometry.horiz_pix_total - geometry.hsync_off_pos
        );
        assert_eq!(rows[0].vbp, geometry.vert_pix_total - geometry.vsync_off_pos);
    }

    #[test]
    fn cursor_column_is_relative_to_display_start() {
        let (mut crtc, rows) = recording_core(ChipType::Mc6845);
        program_text_screen(&mut crtc);
        write_reg(&mut crtc, 0x0A, 0x00); // cursor spans the whole cell
        write_reg(&mut crtc, 0x0B, 7);
        write_reg(&mut crtc, 0x0E, 0x00); // cursor at address 0x0005
        write_reg(&mut crtc, 0x0F, 0x05);
        crtc.cursor_state = true;

        let mut bitmap = Bitmap32::new(400, 48);
        let clip = ClipRect::new(0, 399, 0, 7);
        crtc.screen_update(&mut bitmap, &clip);

        let rows = rows.lock().unwrap();
        assert!(rows.iter().all(|r| r.cursor_x == 5));
    }

    #[test]
    fn rows_below_visible_area_have_de_low() {
        let (mut crtc, rows) = recording_core(ChipType::Mc6845);
        program_text_screen(&mut crtc);

        let max_y = crtc.geometry().max_visible_y;
        let mut bitmap = Bitmap32::new(400, 48);
        let clip = ClipRect::new(0, 399, 0, max_y + 1);
        crtc.screen_update(&mut bitmap, &clip);

        let rows = rows.lock().unwrap();
        assert!(rows[..rows.len() - 1].iter().all(|r| r.de));
        assert!(!rows.last().unwrap().de);
    }

    #[test]
    fn invalid_geometry_blanks_the_screen() {
        let (mut crtc, rows) = recording_core(ChipType::Mc6845);
        // Power-on register values are degenerate; no rows may be drawn.
        let mut bitmap = Bitmap32::new(400, 48);
        let clip = ClipRect::new(0, 399, 0, 31);
        crtc.screen_update(&mut bitmap, &clip);
        assert!(rows.lock().unwrap().is_empty());
        assert!(crtc.display_disabled_msg_shown);
    }

    #[test]
    fn frame_restarts_at_display_start() {
        let (mut crtc, rows) = recording_core(ChipType::Mc6845);
        program_text_screen(&mut crtc);
        write_reg(&mut crtc, 0x0C, 0x02);
        write_reg(&mut crtc, 0x0D, 0x00);

        let mut bitmap = Bitmap32::new(400, 48);
        let full = ClipRect::new(0, 399, 0, 31);
        crtc.screen_update(&mut bitmap, &full);
        crtc.screen_update(&mut bitmap, &full);

        let rows = rows.lock().unwrap();
        assert_eq!(rows.len(), 64);
        // Both frames start from the programmed display start address.
        assert_eq!(rows[0].ma, 0x0200);
        assert_eq!(rows[32].ma, 0x0200);
    }
}
