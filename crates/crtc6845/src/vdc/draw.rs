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

    vdc::draw.rs

    Internal row renderer for the VDC: text cells and font cells fetched
    from video memory, with per-cell attribute decode (color, blink,
    underline, reverse video, alternate character set).

*/

use super::*;

// 0xAARRGGBB
pub const VDC_PALETTE: [u32; 16] = [
    0xFF000000, // black
    0xFF555555, // dark gray
    0xFF0000AA, // blue
    0xFF5555FF, // light blue
    0xFF00AA00, // green
    0xFF55FF55, // light green
    0xFF00AAAA, // cyan
    0xFF55FFFF, // light cyan
    0xFFAA0000, // red
    0xFFFF5555, // light red
    0xFFAA00AA, // purple
    0xFFFF55FF, // light purple
    0xFFAA5500, // brown
    0xFFFFFF55, // yellow
    0xFFAAAAAA, // light gray
    0xFFFFFFFF, // white
];

const ATTR_BLINK: u8 = 0x10;
const ATTR_UNDERLINE: u8 = 0x20;
const ATTR_REVERSE: u8 = 0x40;
const ATTR_ALTERNATE_CHARSET: u8 = 0x80;

impl Vdc8563 {
    /// Draw one scanline through the internal renderer, or the external row
    /// callback when one is bound. Returns the raster row drawn.
    pub fn draw_scanline(&mut self, y: u16, bitmap: &mut Bitmap32, clip: &ClipRect) -> u8 {
        let params = self.crtc.scanline_params(y);

        if let Some(cb) = self.crtc.update_row.as_mut() {
            cb(bitmap, clip, &params);
        }
        else {
            self.render_row(bitmap, &params);
        }

        self.crtc.advance_row_addr(params.ra);

        // The VDC steps its row pitch separately from the displayed width.
        if params.ra == self.crtc.max_ras_addr {
            self.crtc.current_disp_addr =
                (self.crtc.current_disp_addr + self.row_addr_incr as u16) & crate::crtc::MA_MASK;
        }

        params.ra
    }

    pub(crate) fn render_row(&self, bitmap: &mut Bitmap32, params: &RowParams) {
        // Vertical smooth scroll offsets the raster row within the cell.
        let ra = (params.ra + (self.vert_scroll.scroll() & 0x0F)) & 0x0F;

        let dbl = self.horiz_scroll.dbl();
        let cth = (self.horiz_char >> 4) + if dbl { 0 } else { 1 };
        let cdh = (self.horiz_char & 0x0F) + if dbl { 0 } else { 1 };
        let cdv = self.vert_char_disp;
        let hscroll = self.horiz_scroll.scroll();

        for column in 0..params.x_count as u16 {
            let code = self.read_vram(params.ma.wrapping_add(column));
            let mut attr = 0;

            let mut fg = self.color >> 4;
            let mut bg = self.color & 0x0F;

            if self.horiz_scroll.attr() {
                let attr_addr = self.attribute_addr.wrapping_add(params.ma).wrapping_add(column);
                attr = self.read_vram(attr_addr);
            }

            if self.horiz_scroll.text() {
                if self.horiz_scroll.attr() {
                    fg = attr >> 4;
                    bg = attr & 0x0F;
                }

                let mut code = code;
                if self.vert_scroll.rvs() {
                    code ^= 0xFF;
                }

                for bit in 0..cdh {
                    let x = hscroll as i32 - cth as i32 + (column as i32 * cth as i32) + bit as i32;
                    let x = x.max(0) as usize;
                    let color = if code & 0x80 != 0 { fg } else { bg };

                    bitmap.set_pix(
                        (params.vbp + params.y) as usize,
                        params.hbp as usize + x,
                        VDC_PALETTE[if params.de { color as usize } else { 0 }],
                    );
                }
            }
            else {
                if self.horiz_scroll.attr() {
                    fg = attr & 0x0F;
                }

                let alt = ((attr & ATTR_ALTERNATE_CHARSET) != 0) as u16;

                let font_addr = if self.crtc.max_ras_addr < 16 {
                    (((self.char_base_addr & 0xE0) as u16) << 8)
                        | (alt << 12)
                        | ((code as u16) << 4)
                        | (ra & 0x0F) as u16
                }
                else {
                    (((self.char_base_addr & 0xC0) as u16) << 8)
                        | (alt << 13)
                        | ((code as u16) << 5)
                        | (ra & 0x1F) as u16
                };

                let mut data = self.read_vram(font_addr);

                if ra >= cdv {
                    data = 0;
                }
                if (attr & ATTR_UNDERLINE != 0) && ra == self.underline_ras {
                    data = 0xFF;
                }
                if (attr & ATTR_BLINK != 0) && !self.char_blink_state {
                    data = 0;
                }
                if attr & ATTR_REVERSE != 0 {
                    data ^= 0xFF;
                }
                if column as i32 == params.cursor_x {
                    data ^= 0xFF;
                }
                if self.vert_scroll.rvs() {
                    data ^= 0xFF;
                }

                for bit in 0..cdh {
                    let x = (hscroll & 0x0F) as i32 - cth as i32 + (column as i32 * cth as i32) + bit as i32;
                    let x = x.max(0) as usize;
                    let color = if data & 0x80 != 0 { fg } else { bg };

                    bitmap.set_pix(
                        (params.vbp + params.y) as usize,
                        params.hbp as usize + x,
                        VDC_PALETTE[if params.de { color as usize } else { 0 }],
                    );

                    // The semi-bright shift holds the last glyph bit for the
                    // widened cell tail.
                    if (bit < 8) || !self.horiz_scroll.semi() {
                        data <<= 1;
                    }
                }
            }
        }
    }
}
