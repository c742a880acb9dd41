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

    crtc::state.rs

    Save/restore snapshot of the shared engine. Every register, counter and
    signal level is listed individually; derived geometry is recomputed on
    restore rather than stored.

*/

use serde_derive::{Deserialize, Serialize};

use super::*;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrtcState {
    // Registers
    pub register_address_latch: u8,
    pub horiz_char_total: u8,
    pub horiz_disp: u8,
    pub horiz_sync_pos: u8,
    pub sync_width: u8,
    pub vert_char_total: u8,
    pub vert_total_adj: u8,
    pub vert_disp: u8,
    pub vert_sync_pos: u8,
    pub mode_control: u8,
    pub max_ras_addr: u8,
    pub cursor_start_ras: u8,
    pub cursor_end_ras: u8,
    pub disp_start_addr: u16,
    pub cursor_addr: u16,
    pub light_pen_addr: u16,
    pub update_addr: u16,

    // Counters and latches
    pub cycles: u64,
    pub character_counter: u8,
    pub hsync_width_counter: u8,
    pub vsync_width_counter: u8,
    pub raster_counter: u8,
    pub line_counter: u8,
    pub adjust_counter: u8,
    pub line_address: u16,
    pub current_disp_addr: u16,
    pub cursor_blink_count: u8,
    pub cursor_state: bool,
    pub cursor_x: i32,
    pub light_pen_latched: bool,
    pub update_ready_bit: bool,
    pub line_enable_ff: bool,
    pub vsync_ff: bool,
    pub adjust_active: bool,
    pub frame_count: u64,

    // Signal levels
    pub de: bool,
    pub hsync: bool,
    pub vsync: bool,
    pub cur: bool,

    // Pending one-shots
    pub timers: TimerSet,

    pub hpixels_per_column: u8,
    pub clk_scale: u32,
}

impl Crtc6845 {
    pub fn snapshot(&self) -> CrtcState {
        CrtcState {
            register_address_latch: self.register_address_latch,
            horiz_char_total: self.horiz_char_total,
            horiz_disp: self.horiz_disp,
            horiz_sync_pos: self.horiz_sync_pos,
            sync_width: self.sync_width.into_bytes()[0],
            vert_char_total: self.vert_char_total,
            vert_total_adj: self.vert_total_adj,
            vert_disp: self.vert_disp,
            vert_sync_pos: self.vert_sync_pos,
            mode_control: self.mode_control.into_bytes()[0],
            max_ras_addr: self.max_ras_addr,
            cursor_start_ras: self.cursor_start_ras.into_bytes()[0],
            cursor_end_ras: self.cursor_end_ras,
            disp_start_addr: self.disp_start_addr,
            cursor_addr: self.cursor_addr,
            light_pen_addr: self.light_pen_addr,
            update_addr: self.update_addr,

            cycles: self.cycles,
            character_counter: self.character_counter,
            hsync_width_counter: self.hsync_width_counter,
            vsync_width_counter: self.vsync_width_counter,
            raster_counter: self.raster_counter,
            line_counter: self.line_counter,
            adjust_counter: self.adjust_counter,
            line_address: self.line_address,
            current_disp_addr: self.current_disp_addr,
            cursor_blink_count: self.cursor_blink_count,
            cursor_state: self.cursor_state,
            cursor_x: self.cursor_x,
            light_pen_latched: self.light_pen_latched,
            update_ready_bit: self.update_ready_bit,
            line_enable_ff: self.line_enable_ff,
            vsync_ff: self.vsync_ff,
            adjust_active: self.adjust_active,
            frame_count: self.frame_count,

            de: self.de,
            hsync: self.hsync,
            vsync: self.vsync,
            cur: self.cur,

            timers: self.timers.clone(),

            hpixels_per_column: self.hpixels_per_column,
            clk_scale: self.clk_scale,
        }
    }

    /// Restore a snapshot. Geometry is recomputed in post-load mode so that
    /// the host is re-notified of the screen configuration without the
    /// frame-origin reset side effect.
    pub fn restore_snapshot(&mut self, state: &CrtcState) {
        self.register_address_latch = state.register_address_latch;
        self.horiz_char_total = state.horiz_char_total;
        self.horiz_disp = state.horiz_disp;
        self.horiz_sync_pos = state.horiz_sync_pos;
        self.sync_width = CSyncWidth::from_bytes([state.sync_width]);
        self.vert_char_total = state.vert_char_total;
        self.vert_total_adj = state.vert_total_adj;
        self.vert_disp = state.vert_disp;
        self.vert_sync_pos = state.vert_sync_pos;
        self.mode_control = CModeControl::from_bytes([state.mode_control]);
        self.max_ras_addr = state.max_ras_addr;
        self.cursor_start_ras = CCursorStart::from_bytes([state.cursor_start_ras]);
        self.cursor_end_ras = state.cursor_end_ras;
        self.disp_start_addr = state.disp_start_addr;
        self.cursor_addr = state.cursor_addr;
        self.light_pen_addr = state.light_pen_addr;
        self.update_addr = state.update_addr;

        self.cycles = state.cycles;
        self.character_counter = state.character_counter;
        self.hsync_width_counter = state.hsync_width_counter;
        self.vsync_width_counter = state.vsync_width_counter;
        self.raster_counter = state.raster_counter;
        self.line_counter = state.line_counter;
        self.adjust_counter = state.adjust_counter;
        self.line_address = state.line_address;
        self.current_disp_addr = state.current_disp_addr;
        self.cursor_blink_count = state.cursor_blink_count;
        self.cursor_state = state.cursor_state;
        self.cursor_x = state.cursor_x;
        self.light_pen_latched = state.light_pen_latched;
        self.update_ready_bit = state.update_ready_bit;
        self.line_enable_ff = state.line_enable_ff;
        self.vsync_ff = state.vsync_ff;
        self.adjust_active = state.adjust_active;
        self.frame_count = state.frame_count;

        self.de = state.de;
        self.hsync = state.hsync;
        self.vsync = state.vsync;
        self.cur = state.cur;

        self.timers = state.timers.clone();

        self.hpixels_per_column = state.hpixels_per_column;
        self.clk_scale = state.clk_scale;

        self.recompute_parameters(true);
    }
}
