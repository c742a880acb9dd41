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

    types.rs

    Support types shared by the CRTC variants: the render target handed to
    the row-draw callback, clipping rectangle, geometry notification payload
    and the callback type aliases themselves.

*/

use serde_derive::{Deserialize, Serialize};

/// An inclusive clipping rectangle, in pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipRect {
    pub min_x: u16,
    pub max_x: u16,
    pub min_y: u16,
    pub max_y: u16,
}

impl ClipRect {
    pub fn new(min_x: u16, max_x: u16, min_y: u16, max_y: u16) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        (self.max_x as u32) - (self.min_x as u32) + 1
    }

    #[inline]
    pub fn height(&self) -> u32 {
        (self.max_y as u32) - (self.min_y as u32) + 1
    }
}

/// A simple row-major 32-bit RGBA render target. The host owns one of these
/// sized to the current screen geometry; the CRTC only writes pixels into it
/// from the memory-mapped variant's internal row renderer. External row-draw
/// callbacks are free to interpret it however they like.
pub struct Bitmap32 {
    pub w: usize,
    pub h: usize,
    data:  Vec<u32>,
}

impl Bitmap32 {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![0; w * h],
        }
    }

    #[inline]
    pub fn pix(&self, y: usize, x: usize) -> u32 {
        self.data[y * self.w + x]
    }

    /// Write a pixel, ignoring coordinates outside the bitmap. Out of range
    /// writes can legitimately occur while the host bitmap lags a geometry
    /// change.
    #[inline]
    pub fn set_pix(&mut self, y: usize, x: usize, color: u32) {
        if x < self.w && y < self.h {
            self.data[y * self.w + x] = color;
        }
    }

    pub fn fill(&mut self, color: u32) {
        self.data.fill(color);
    }

    pub fn data(&self) -> &[u32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u32] {
        &mut self.data
    }
}

/// Payload of the geometry-change notification.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScreenConfig {
    pub width:   u16,
    pub height:  u16,
    pub visarea: ClipRect,
    pub refresh_hz: f64,
}

/// Per-scanline parameters handed to the row-draw callback.
#[derive(Copy, Clone, Debug)]
pub struct RowParams {
    /// Display memory address of the first character of this row.
    pub ma: u16,
    /// Raster row within the current character cell.
    pub ra: u8,
    /// Absolute scanline.
    pub y:  u16,
    /// Displayed character count for this row.
    pub x_count: u8,
    /// Cursor column relative to the start of the displayed area, or -1 if
    /// the cursor is not visible on this row.
    pub cursor_x: i32,
    /// Display enable for this row.
    pub de: bool,
    /// Horizontal back porch, in pixels.
    pub hbp: u16,
    /// Vertical back porch, in pixels.
    pub vbp: u16,
}

pub type UpdateRowCallback = dyn FnMut(&mut Bitmap32, &ClipRect, &RowParams) + Send;
pub type BeginUpdateCallback = dyn FnMut(&mut Bitmap32, &ClipRect) + Send;
pub type EndUpdateCallback = dyn FnMut(&mut Bitmap32, &ClipRect) + Send;
pub type ReconfigureCallback = dyn FnMut(ScreenConfig) + Send;
pub type SignalCallback = dyn FnMut(bool) + Send;
pub type UpdateAddrCallback = dyn FnMut(u16, u8) + Send;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_set_pix_ignores_out_of_range() {
        let mut bitmap = Bitmap32::new(4, 2);
        bitmap.set_pix(1, 3, 0xFFFF_FFFF);
        bitmap.set_pix(2, 0, 0xDEAD_BEEF);
        bitmap.set_pix(0, 4, 0xDEAD_BEEF);
        assert_eq!(bitmap.pix(1, 3), 0xFFFF_FFFF);
        assert!(!bitmap.data().contains(&0xDEAD_BEEF));
    }

    #[test]
    fn clip_rect_dimensions() {
        let clip = ClipRect::new(0, 399, 0, 299);
        assert_eq!(clip.width(), 400);
        assert_eq!(clip.height(), 300);
    }
}
