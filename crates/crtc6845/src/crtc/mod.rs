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

    crtc::mod.rs

    Implementation of the Motorola MC6845 CRT controller timing engine,
    shared by all variants. Counters advance on line-boundary events; the
    sub-line signal transitions (DE off, HSYNC, cursor pulse) are one-shot
    timers scheduled within the line.

*/

mod registers;
mod draw;
mod state;
pub mod timers;

pub use registers::{CCursorStart, CModeControl, CSyncWidth, CrtcRegister, CursorMode};
pub use state::CrtcState;
pub(crate) use timers::{TimerId, TimerSet};

use crate::{
    tracelogger::TraceLogger,
    types::*,
    variants::{ChipCaps, ChipType, CrtcBuilder},
};

/// The display address bus is 14 bits wide.
pub const MA_MASK: u16 = 0x3FFF;

const LINE_COUNTER_MASK: u8 = 0x7F;
const RASTER_COUNTER_MASK: u8 = 0x1F;
const ADJUST_COUNTER_MASK: u8 = 0x1F;
const VSYNC_WIDTH_MASK: u8 = 0x0F;

macro_rules! trace {
    ($self:ident, $($t:tt)*) => {{
        if $self.trace_logger.is_some() {
            $self.trace_logger.println(&format!($($t)*));
        }
    }};
}

pub(crate) use trace;

/// Derived screen geometry, cached between recomputations.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ScreenGeometry {
    pub horiz_pix_total: u16,
    pub vert_pix_total:  u16,
    pub max_visible_x:   u16,
    pub max_visible_y:   u16,
    pub hsync_on_pos:    u16,
    pub hsync_off_pos:   u16,
    pub vsync_on_pos:    u16,
    pub vsync_off_pos:   u16,
    pub valid: bool,
}

pub struct Crtc6845 {
    // Fixed at construction
    pub(crate) chip_type: ChipType,
    pub(crate) caps: ChipCaps,
    pub(crate) clock_hz: u32,
    pub(crate) clk_scale: u32,
    pub(crate) hpixels_per_column: u8,
    pub(crate) show_border_area: bool,
    pub(crate) visarea_adjust: (i16, i16, i16, i16),

    // Programmable registers
    pub(crate) register_address_latch: u8,
    pub(crate) horiz_char_total: u8,        // R0
    pub(crate) horiz_disp: u8,              // R1
    pub(crate) horiz_sync_pos: u8,          // R2
    pub(crate) sync_width: CSyncWidth,       // R3
    pub(crate) vert_char_total: u8,         // R4
    pub(crate) vert_total_adj: u8,          // R5
    pub(crate) vert_disp: u8,               // R6
    pub(crate) vert_sync_pos: u8,           // R7
    pub(crate) mode_control: CModeControl,   // R8
    pub(crate) max_ras_addr: u8,            // R9
    pub(crate) cursor_start_ras: CCursorStart, // R10
    pub(crate) cursor_end_ras: u8,          // R11
    pub(crate) disp_start_addr: u16,        // R12/R13
    pub(crate) cursor_addr: u16,            // R14/R15
    pub(crate) light_pen_addr: u16,         // R16/R17, latched
    pub(crate) update_addr: u16,            // R18/R19, transparent variants

    // Run-time counters and latches
    pub(crate) cycles: u64,
    pub(crate) character_counter: u8,
    pub(crate) hsync_width_counter: u8,
    pub(crate) vsync_width_counter: u8,
    pub(crate) raster_counter: u8,
    pub(crate) line_counter: u8,
    pub(crate) adjust_counter: u8,
    pub(crate) line_address: u16,
    pub(crate) current_disp_addr: u16,
    pub(crate) cursor_blink_count: u8,
    pub(crate) cursor_state: bool,
    pub(crate) cursor_x: i32,
    pub(crate) light_pen_latched: bool,
    pub(crate) update_ready_bit: bool,
    pub(crate) line_enable_ff: bool,
    pub(crate) vsync_ff: bool,
    pub(crate) adjust_active: bool,
    pub(crate) frame_count: u64,

    // Output signal levels
    pub(crate) de: bool,
    pub(crate) hsync: bool,
    pub(crate) vsync: bool,
    pub(crate) cur: bool,

    // Derived geometry cache
    pub(crate) geometry: ScreenGeometry,
    pub(crate) display_disabled_msg_shown: bool,
    pub(crate) upd_time: u64,

    pub(crate) timers: TimerSet,

    // Host bindings
    pub(crate) update_row: Option<Box<UpdateRowCallback>>,
    pub(crate) begin_update: Option<Box<BeginUpdateCallback>>,
    pub(crate) end_update: Option<Box<EndUpdateCallback>>,
    pub(crate) reconfigure: Option<Box<ReconfigureCallback>>,
    pub(crate) on_update_addr: Option<Box<UpdateAddrCallback>>,
    pub(crate) out_de: Option<Box<SignalCallback>>,
    pub(crate) out_hsync: Option<Box<SignalCallback>>,
    pub(crate) out_vsync: Option<Box<SignalCallback>>,
    pub(crate) out_cur: Option<Box<SignalCallback>>,

    pub(crate) trace_logger: TraceLogger,
}

impl Crtc6845 {
    pub(crate) fn from_builder(builder: CrtcBuilder, clk_scale: u32) -> Self {
        let caps = builder.chip_type.caps();
        let mut crtc = Self {
            chip_type: builder.chip_type,
            caps,
            clock_hz: builder.clock_hz,
            clk_scale,
            hpixels_per_column: builder.hpixels_per_column,
            show_border_area: builder.show_border_area,
            visarea_adjust: builder.visarea_adjust,

            register_address_latch: 0,
            // Large power-up values; a real chip comes up with undefined
            // register contents.
            horiz_char_total: 0xFF,
            horiz_disp: 0,
            horiz_sync_pos: 1,
            sync_width: CSyncWidth::from_bytes([0x01]),
            vert_char_total: 0x7F,
            vert_total_adj: 0,
            vert_disp: 0,
            vert_sync_pos: 0,
            mode_control: CModeControl::new(),
            max_ras_addr: 0x1F,
            cursor_start_ras: CCursorStart::new(),
            cursor_end_ras: 0,
            disp_start_addr: 0,
            cursor_addr: 0,
            light_pen_addr: 0,
            update_addr: 0,

            cycles: 0,
            character_counter: 0,
            hsync_width_counter: 0,
            vsync_width_counter: 0,
            raster_counter: 0,
            line_counter: 0,
            adjust_counter: 0,
            line_address: 0,
            current_disp_addr: 0,
            cursor_blink_count: 0,
            cursor_state: false,
            cursor_x: 0,
            light_pen_latched: false,
            update_ready_bit: false,
            line_enable_ff: false,
            vsync_ff: false,
            adjust_active: false,
            frame_count: 0,

            de: false,
            hsync: false,
            vsync: false,
            cur: false,

            geometry: ScreenGeometry::default(),
            display_disabled_msg_shown: false,
            upd_time: 0,

            timers: TimerSet::new(),

            update_row: builder.update_row,
            begin_update: builder.begin_update,
            end_update: builder.end_update,
            reconfigure: builder.reconfigure,
            on_update_addr: builder.on_update_addr,
            out_de: builder.out_de,
            out_hsync: builder.out_hsync,
            out_vsync: builder.out_vsync,
            out_cur: builder.out_cur,

            trace_logger: builder.trace_logger,
        };

        crtc.recompute_parameters(true);
        crtc.reset();
        crtc
    }

    /// Reset the chip. Registers other than the mode control and address
    /// latches keep their contents; all outputs go low.
    pub fn reset(&mut self) {
        self.set_de(false);
        self.set_hsync(false);
        self.set_vsync(false);
        self.set_cur(false);

        if !self.timers.enabled(TimerId::Line) {
            self.timers
                .adjust(TimerId::Line, self.cycles, self.horiz_char_total as u64 + 1);
        }

        self.light_pen_latched = false;

        self.cursor_addr = 0;
        self.line_address = 0;
        self.horiz_disp = 0;
        self.cursor_x = 0;
        self.mode_control = CModeControl::new();
        self.register_address_latch = 0;
        self.update_addr = 0;
        self.light_pen_addr = 0;
    }

    // ------------------------------------------------------------------------
    // Event pump

    /// Run the chip for `cclks` character clocks, firing any timers that
    /// come due.
    pub fn run(&mut self, cclks: u64) {
        let deadline = self.cycles + cclks;
        while let Some((id, param)) = self.next_event(deadline) {
            self.dispatch(id, param);
        }
        self.cycles = deadline;
    }

    /// Advance the chip clock to the next pending event at or before
    /// `deadline`, disarming and returning it. Returns None when no event is
    /// due within the deadline.
    pub(crate) fn next_event(&mut self, deadline: u64) -> Option<(TimerId, u32)> {
        let id = self.timers.next_due(deadline)?;
        let (fire_at, param) = self.timers.take(id);
        self.cycles = fire_at;
        Some((id, param))
    }

    pub(crate) fn dispatch(&mut self, id: TimerId, param: u32) {
        match id {
            TimerId::Line => self.handle_line_timer(),
            TimerId::DeOff => self.set_de(false),
            TimerId::CursorOn => {
                self.set_cur(true);
                // Cursor pulse is exactly one character clock wide.
                self.timers.adjust(TimerId::CursorOff, self.cycles, 1);
            }
            TimerId::CursorOff => self.set_cur(false),
            TimerId::HsyncOn => {
                let hsync_width = match self.sync_width.horizontal() {
                    0 => 0x10,
                    w => w,
                };
                self.hsync_width_counter = 0;
                self.set_hsync(true);
                self.timers.adjust(TimerId::HsyncOff, self.cycles, hsync_width as u64);
            }
            TimerId::HsyncOff => self.set_hsync(false),
            TimerId::LightPenLatch => {
                self.light_pen_addr = self.get_ma();
                self.light_pen_latched = true;
            }
            TimerId::UpdateAddr => {
                let strobe = self.mode_control.update_strobe() as u8;
                self.call_on_update_address(strobe);
            }
            TimerId::UpdateTransfer => {
                let addr = (param >> 8) as u16;
                let strobe = (param & 0xFF) as u8;

                if let Some(cb) = self.on_update_addr.as_mut() {
                    cb(addr, strobe);
                }

                if !self.update_ready_bit && self.mode_control.transparent_blank() {
                    self.update_addr = (self.update_addr + 1) & MA_MASK;
                    self.update_ready_bit = true;
                }
            }
            // Owned by the memory-mapped variant.
            TimerId::BlockCopy => {}
        }
    }

    // ------------------------------------------------------------------------
    // Line boundary state machine

    pub(crate) fn handle_line_timer(&mut self) {
        let mut new_vsync = self.vsync;

        self.character_counter = 0;
        self.cursor_x = -1;

        if self.vsync_ff {
            let vsync_width = if self.caps.supports_vert_sync_width {
                self.sync_width.vertical()
            }
            else {
                0
            };

            // The width counter wraps mod 16; a programmed width of 0 (and
            // the fixed-width variants) produce a 16 line pulse.
            self.vsync_width_counter = (self.vsync_width_counter + 1) & VSYNC_WIDTH_MASK;

            if self.vsync_width_counter == vsync_width {
                self.vsync_ff = false;
                new_vsync = false;
            }
        }

        if self.raster_counter == self.max_ras_addr + self.video_ras_adjust() - 1 {
            // Finished the last raster row of this character row.
            if self.line_counter == self.vert_char_total {
                self.adjust_counter = 0;
                self.adjust_active = true;
            }

            self.raster_counter = 0;
            self.line_counter = (self.line_counter + 1) & LINE_COUNTER_MASK;
            self.line_address = (self.line_address + self.horiz_disp as u16) & MA_MASK;

            if self.match_line() {
                new_vsync = true;
            }
        }
        else {
            self.raster_counter = (self.raster_counter + 1) & RASTER_COUNTER_MASK;
        }

        if self.adjust_active {
            if self.adjust_counter == self.vert_total_adj {
                // End of vertical adjust; this is the frame origin.
                self.adjust_active = false;
                self.raster_counter = 0;
                self.line_counter = 0;
                self.line_address = self.disp_start_addr;
                self.line_enable_ff = true;

                if self.caps.supports_vert_sync_width {
                    if self.match_line() {
                        new_vsync = true;
                    }
                }

                self.update_cursor_state();
                self.frame_count = self.frame_count.wrapping_add(1);
            }
            else {
                self.adjust_counter = (self.adjust_counter + 1) & ADJUST_COUNTER_MASK;
            }
        }

        if self.line_enable_ff {
            self.timers.adjust(TimerId::DeOff, self.cycles, self.horiz_disp as u64);

            if self.check_cursor_visible(self.raster_counter, self.line_address) {
                self.cursor_x = (self.cursor_addr - self.line_address) as i32;
                self.timers.adjust(TimerId::CursorOn, self.cycles, self.cursor_x as u64);
            }
        }

        self.timers
            .adjust(TimerId::HsyncOn, self.cycles, self.horiz_sync_pos as u64);
        self.timers
            .adjust(TimerId::Line, self.cycles, self.horiz_char_total as u64 + 1);

        // Apply levels only after the full counter advance, so callbacks
        // observe consistent state.
        self.set_vsync(new_vsync);
        self.set_de(self.line_enable_ff);
    }

    /// Character-row boundary checks shared by the line handler and the end
    /// of vertical adjust. Returns true if VSYNC should rise.
    fn match_line(&mut self) -> bool {
        if self.line_counter == self.vert_disp {
            self.line_enable_ff = false;
            self.current_disp_addr = self.disp_start_addr;
        }

        if self.line_counter == self.vert_sync_pos {
            self.vsync_width_counter = 0;
            self.vsync_ff = true;
            trace!(self, "vsync start at line {}", self.line_counter);
            return true;
        }

        false
    }

    // ------------------------------------------------------------------------
    // Signal outputs (edge-triggered)

    pub(crate) fn set_de(&mut self, state: bool) {
        if self.de != state {
            self.de = state;

            if self.de {
                // An in-flight transparent update cycle is abandoned when
                // display enable returns.
                self.timers.cancel(TimerId::UpdateAddr);
            }
            else if !self.update_ready_bit {
                self.update_upd_adr_timer();
            }

            if let Some(cb) = self.out_de.as_mut() {
                cb(state);
            }
        }
    }

    pub(crate) fn set_hsync(&mut self, state: bool) {
        if self.hsync != state {
            self.hsync = state;
            if let Some(cb) = self.out_hsync.as_mut() {
                cb(state);
            }
        }
    }

    pub(crate) fn set_vsync(&mut self, state: bool) {
        if self.vsync != state {
            self.vsync = state;
            if let Some(cb) = self.out_vsync.as_mut() {
                cb(state);
            }
        }
    }

    pub(crate) fn set_cur(&mut self, state: bool) {
        if self.cur != state {
            self.cur = state;
            if let Some(cb) = self.out_cur.as_mut() {
                cb(state);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Counter queries

    /// Raster height of a character cell for the current interlace mode.
    #[inline]
    pub(crate) fn video_ras_adjust(&self) -> u8 {
        if self.mode_control.interlace_and_video() {
            self.caps.interlace_adjust
        }
        else {
            self.caps.noninterlace_adjust
        }
    }

    pub(crate) fn update_counters(&mut self) {
        self.character_counter = self.timers.elapsed(TimerId::Line, self.cycles) as u8;

        if self.timers.enabled(TimerId::HsyncOff) {
            self.hsync_width_counter = self.timers.elapsed(TimerId::HsyncOff, self.cycles) as u8;
        }
    }

    /// Current display memory address (MA0-MA13).
    pub fn get_ma(&mut self) -> u16 {
        self.update_counters();
        (self.line_address + self.character_counter as u16) & MA_MASK
    }

    /// Current raster row address (RA0-RA4).
    pub fn get_ra(&self) -> u8 {
        self.raster_counter
    }

    // ------------------------------------------------------------------------
    // Cursor

    pub(crate) fn update_cursor_state(&mut self) {
        let last_count = self.cursor_blink_count;
        self.cursor_blink_count = self.cursor_blink_count.wrapping_add(1);

        match self.cursor_start_ras.mode() {
            CursorMode::Steady => self.cursor_state = true,
            CursorMode::Off => self.cursor_state = false,
            CursorMode::BlinkFast => {
                if (last_count & 0x10) != (self.cursor_blink_count & 0x10) {
                    self.cursor_state = !self.cursor_state;
                }
            }
            CursorMode::BlinkSlow => {
                if (last_count & 0x20) != (self.cursor_blink_count & 0x20) {
                    self.cursor_state = !self.cursor_state;
                }
            }
        }
    }

    pub(crate) fn check_cursor_visible(&self, ra: u8, line_addr: u16) -> bool {
        if !self.cursor_state {
            return false;
        }

        if (self.cursor_addr < line_addr) || (self.cursor_addr >= line_addr + self.horiz_disp as u16) {
            // Not a cursor character line.
            return false;
        }

        let cursor_start_ras = self.cursor_start_ras.start();
        let max_ras_addr = self.max_ras_addr + self.video_ras_adjust() - 1;

        if cursor_start_ras > max_ras_addr {
            // No cursor.
            return false;
        }

        if !self.caps.cursor_wrap {
            if cursor_start_ras > self.cursor_end_ras {
                return false;
            }
            return (ra >= cursor_start_ras) && (ra <= self.cursor_end_ras);
        }

        if cursor_start_ras <= self.cursor_end_ras {
            if self.cursor_end_ras > max_ras_addr {
                // Wraps to produce a full cursor.
                return true;
            }
            // Cursor from start to end inclusive.
            return (ra >= cursor_start_ras) && (ra <= self.cursor_end_ras);
        }

        // Start past end gives a split cursor.
        (ra <= self.cursor_end_ras) || (ra >= cursor_start_ras)
    }

    // ------------------------------------------------------------------------
    // Light pen

    /// The display address latches one character clock after the light pen
    /// input asserts.
    pub fn assert_light_pen_input(&mut self) {
        self.timers.adjust(TimerId::LightPenLatch, self.cycles, 1);
    }

    // ------------------------------------------------------------------------
    // Transparent memory mode

    pub(crate) fn call_on_update_address(&mut self, strobe: u8) {
        if self.on_update_addr.is_some() {
            self.timers.adjust_param(
                TimerId::UpdateTransfer,
                self.cycles,
                0,
                ((self.update_addr as u32) << 8) | strobe as u32,
            );
        }
        else {
            // The builder refuses to construct a transparent-capable chip
            // without a handler, so this only triggers on a mode write that
            // enables transparent mode on a chip that cannot support it.
            log::error!("{}: transparent memory mode without handler", self.chip_type);
        }
    }

    pub(crate) fn transparent_update(&mut self) {
        if self.caps.supports_transparent && self.mode_control.transparent() {
            if self.mode_control.transparent_phi2() {
                self.update_addr = (self.update_addr + 1) & MA_MASK;
                let strobe = self.mode_control.update_strobe() as u8;
                self.call_on_update_address(strobe);
            }
            else if self.update_ready_bit {
                self.update_ready_bit = false;
                self.update_upd_adr_timer();
            }
        }
    }

    pub(crate) fn update_upd_adr_timer(&mut self) {
        if !self.de && self.caps.supports_transparent {
            self.timers.adjust(TimerId::UpdateAddr, self.cycles, self.upd_time);
        }
    }

    // ------------------------------------------------------------------------
    // Geometry

    pub fn set_hpixels_per_column(&mut self, hpixels_per_column: u8) {
        if hpixels_per_column == 0 {
            log::warn!("{}: ignoring zero pixels per character column", self.chip_type);
            return;
        }

        if hpixels_per_column != self.hpixels_per_column {
            self.hpixels_per_column = hpixels_per_column;
            self.recompute_parameters(false);
        }
    }

    pub fn geometry(&self) -> ScreenGeometry {
        self.geometry
    }

    /// Recompute the derived screen geometry from the current registers.
    /// `postload` forces the recomputation (after state restore) and
    /// suppresses the frame-origin side effect.
    pub(crate) fn recompute_parameters(&mut self, postload: bool) {
        let video_char_height = self.max_ras_addr as u32 + self.video_ras_adjust() as u32;

        let horiz_pix_total = (self.horiz_char_total as u32 + 1) * self.hpixels_per_column as u32;
        let vert_pix_total = (self.vert_char_total as u32 + 1) * video_char_height + self.vert_total_adj as u32;

        // A zero displayed count wraps to an impossible visible maximum and
        // fails validation below, just as the hardware displays nothing.
        let max_visible_x = (self.horiz_disp as u32 * self.hpixels_per_column as u32).wrapping_sub(1) & 0xFFFF;
        let max_visible_y = (self.vert_disp as u32 * video_char_height).wrapping_sub(1) & 0xFFFF;

        let horiz_sync_char_width = match self.sync_width.horizontal() {
            0 => 0x10u32,
            w => w as u32,
        };
        let vert_sync_pix_width = if self.caps.supports_vert_sync_width {
            match self.sync_width.vertical() {
                0 => 0x10u32,
                w => w as u32,
            }
        }
        else {
            0x10u32
        };

        // One transparent update cycle every four character clocks.
        self.upd_time = 4 * self.hpixels_per_column as u64;

        let hsync_on_pos = self.horiz_sync_pos as u32 * self.hpixels_per_column as u32;
        let mut hsync_off_pos = hsync_on_pos + (horiz_sync_char_width * self.hpixels_per_column as u32);
        let mut vsync_on_pos = self.vert_sync_pos as u32 * video_char_height;
        let mut vsync_off_pos = vsync_on_pos + vert_sync_pix_width;

        // Some monitors (the Commodore PET's 20kHz unit) require an HSYNC
        // pulse wider than the scanline; clamp rather than reject.
        if hsync_off_pos > horiz_pix_total {
            hsync_off_pos = horiz_pix_total;
        }
        if vsync_on_pos > vert_pix_total {
            vsync_on_pos = vert_pix_total;
        }
        if vsync_off_pos > vert_pix_total {
            vsync_off_pos = vert_pix_total;
        }

        let new_geometry = ScreenGeometry {
            horiz_pix_total: horiz_pix_total as u16,
            vert_pix_total: vert_pix_total as u16,
            max_visible_x: max_visible_x as u16,
            max_visible_y: max_visible_y as u16,
            hsync_on_pos: hsync_on_pos as u16,
            hsync_off_pos: hsync_off_pos as u16,
            vsync_on_pos: vsync_on_pos as u16,
            vsync_off_pos: vsync_off_pos as u16,
            valid: false,
        };

        // Update only if the derived values changed, unless we are coming
        // here after loading a saved state.
        if postload
            || (new_geometry.horiz_pix_total != self.geometry.horiz_pix_total)
            || (new_geometry.vert_pix_total != self.geometry.vert_pix_total)
            || (new_geometry.max_visible_x != self.geometry.max_visible_x)
            || (new_geometry.max_visible_y != self.geometry.max_visible_y)
            || (new_geometry.hsync_on_pos != self.geometry.hsync_on_pos)
            || (new_geometry.vsync_on_pos != self.geometry.vsync_on_pos)
            || (new_geometry.hsync_off_pos != self.geometry.hsync_off_pos)
            || (new_geometry.vsync_off_pos != self.geometry.vsync_off_pos)
        {
            let valid = (horiz_pix_total > 0)
                && (max_visible_x < horiz_pix_total)
                && (vert_pix_total > 0)
                && (max_visible_y < vert_pix_total)
                && (hsync_on_pos <= horiz_pix_total)
                && (vsync_on_pos <= vert_pix_total)
                && (hsync_on_pos != hsync_off_pos);

            self.geometry = new_geometry;
            self.geometry.valid = valid;

            if valid {
                let visarea = if self.show_border_area {
                    ClipRect::new(
                        0,
                        horiz_pix_total.saturating_sub(2) as u16,
                        0,
                        vert_pix_total.saturating_sub(2) as u16,
                    )
                }
                else {
                    let (min_x, max_x, min_y, max_y) = self.visarea_adjust;
                    ClipRect::new(
                        min_x.max(0) as u16,
                        (max_visible_x as i32 + max_x as i32).max(0) as u16,
                        min_y.max(0) as u16,
                        (max_visible_y as i32 + max_y as i32).max(0) as u16,
                    )
                };

                let cclk_hz = self.clock_hz as f64 / self.clk_scale as f64;
                let refresh_hz = cclk_hz / ((self.horiz_char_total as f64 + 1.0) * vert_pix_total as f64);

                log::debug!(
                    "{} config screen: HTOTAL: {} VTOTAL: {} MAX_X: {} MAX_Y: {} HSYNC: {}-{} VSYNC: {}-{} Freq: {:.4}fps",
                    self.chip_type,
                    horiz_pix_total,
                    vert_pix_total,
                    max_visible_x,
                    max_visible_y,
                    hsync_on_pos,
                    hsync_off_pos.saturating_sub(1),
                    vsync_on_pos,
                    vsync_off_pos.saturating_sub(1),
                    refresh_hz
                );

                if let Some(cb) = self.reconfigure.as_mut() {
                    cb(ScreenConfig {
                        width: horiz_pix_total as u16,
                        height: vert_pix_total as u16,
                        visarea,
                        refresh_hz,
                    });
                }
            }

            // Realign the frame origin with the new geometry, but never as a
            // side effect of a state restore.
            if self.reconfigure.is_some() && !postload {
                self.line_counter = 0;
            }
        }
    }

    // ------------------------------------------------------------------------
    // Signal level queries

    #[inline]
    pub fn de(&self) -> bool {
        self.de
    }

    #[inline]
    pub fn hsync(&self) -> bool {
        self.hsync
    }

    #[inline]
    pub fn vsync(&self) -> bool {
        self.vsync
    }

    #[inline]
    pub fn cursor(&self) -> bool {
        self.cur
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variants::{ChipType, CrtcBuilder, CrtcDevice};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    pub(crate) fn test_core(chip_type: ChipType) -> Crtc6845 {
        let mut builder = CrtcBuilder::new(chip_type, 2_000_000, 8).update_row(|_, _, _| {});
        if chip_type.caps().supports_transparent {
            builder = builder.on_update_addr(|_, _| {});
        }
        match builder.build().unwrap() {
            CrtcDevice::Crtc6845(crtc) => crtc,
            _ => panic!("expected shared-engine chip"),
        }
    }

    fn write_reg(crtc: &mut Crtc6845, index: u8, data: u8) {
        crtc.address_w(index);
        crtc.register_w(data);
    }

    /// Program a minimal 10-cclk line, 1-raster character screen.
    fn program_tiny_screen(crtc: &mut Crtc6845) {
        write_reg(crtc, 0x00, 9); // horizontal total (10 cclks/line)
        write_reg(crtc, 0x01, 2); // horizontal displayed
        write_reg(crtc, 0x02, 4); // horizontal sync position
        write_reg(crtc, 0x03, 0x42); // 2 cclk hsync, 4 line vsync
        write_reg(crtc, 0x04, 30); // vertical total
        write_reg(crtc, 0x05, 0); // vertical total adjust
        write_reg(crtc, 0x06, 10); // vertical displayed
        write_reg(crtc, 0x07, 20); // vertical sync position
        write_reg(crtc, 0x09, 0); // one raster row per character
    }

    /// Consume the line event armed at reset with the power-up horizontal
    /// total, so subsequent lines run at the programmed period.
    fn settle(crtc: &mut Crtc6845) {
        crtc.run(0x100);
    }

    impl Crtc6845 {
        fn run_lines(&mut self, count: u32) {
            for _ in 0..count {
                self.run(self.horiz_char_total as u64 + 1);
            }
        }
    }

    #[test]
    fn geometry_total_width() {
        let mut crtc = test_core(ChipType::Mc6845);
        program_tiny_screen(&mut crtc);
        write_reg(&mut crtc, 0x00, 49);
        assert_eq!(crtc.geometry().horiz_pix_total, 400);
    }

    #[test]
    fn geometry_recompute_is_idempotent() {
        let notifications = Arc::new(AtomicUsize::new(0));
        let notifications_c = notifications.clone();

        let mut crtc = match CrtcBuilder::new(ChipType::Mc6845, 2_000_000, 8)
            .update_row(|_, _, _| {})
            .reconfigure(move |_| {
                notifications_c.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap()
        {
            CrtcDevice::Crtc6845(crtc) => crtc,
            _ => unreachable!(),
        };

        program_tiny_screen(&mut crtc);
        let count = notifications.load(Ordering::SeqCst);
        assert!(count > 0);

        // Rewriting the same values must not notify again.
        crtc.recompute_parameters(false);
        crtc.address_w(0x00);
        crtc.register_w(9);
        assert_eq!(notifications.load(Ordering::SeqCst), count);
    }

    #[test]
    fn vsync_pulse_width_is_programmable() {
        let mut crtc = test_core(ChipType::Mc6845_1);
        program_tiny_screen(&mut crtc);
        settle(&mut crtc);

        // Run until the line counter reaches the vertical sync position.
        while crtc.line_counter != 20 {
            crtc.run_lines(1);
        }
        assert!(crtc.vsync());

        // Width nibble is 4: still asserted for the next three boundaries,
        // clear on the fourth.
        crtc.run_lines(3);
        assert!(crtc.vsync());
        crtc.run_lines(1);
        assert!(!crtc.vsync());
    }

    #[test]
    fn fixed_vsync_width_is_sixteen_lines() {
        let mut crtc = test_core(ChipType::Mc6845);
        program_tiny_screen(&mut crtc);
        settle(&mut crtc);

        while crtc.line_counter != 20 {
            crtc.run_lines(1);
        }
        assert!(crtc.vsync());

        crtc.run_lines(15);
        assert!(crtc.vsync());
        crtc.run_lines(1);
        assert!(!crtc.vsync());
    }

    #[test]
    fn frame_wraps_through_vertical_adjust() {
        let mut crtc = test_core(ChipType::Mc6845);
        program_tiny_screen(&mut crtc);
        write_reg(&mut crtc, 0x05, 3); // vertical total adjust
        write_reg(&mut crtc, 0x0C, 0x02); // display start 0x0200
        write_reg(&mut crtc, 0x0D, 0x00);
        settle(&mut crtc);

        // Advance to the boundary where the line counter passes vertical
        // total (30). The adjust counter has already advanced to 1 by the
        // time the flag is observable.
        while !crtc.adjust_active {
            crtc.run_lines(1);
        }

        // Three adjust scanlines in total, then the frame origin resets.
        crtc.run_lines(2);
        assert!(crtc.adjust_active);
        crtc.run_lines(1);
        assert!(!crtc.adjust_active);
        assert_eq!(crtc.line_counter, 0);
        assert_eq!(crtc.raster_counter, 0);
        assert_eq!(crtc.line_address, 0x0200);
        assert!(crtc.line_enable_ff);
    }

    #[test]
    fn de_is_edge_triggered() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_c = calls.clone();

        let mut crtc = match CrtcBuilder::new(ChipType::Mc6845, 2_000_000, 8)
            .update_row(|_, _, _| {})
            .out_de(move |_| {
                calls_c.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap()
        {
            CrtcDevice::Crtc6845(crtc) => crtc,
            _ => unreachable!(),
        };

        crtc.set_de(true);
        crtc.set_de(true);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        crtc.set_de(false);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cursor_range_is_inclusive() {
        let mut crtc = test_core(ChipType::Mc6845);
        program_tiny_screen(&mut crtc);
        write_reg(&mut crtc, 0x09, 7); // max raster address
        write_reg(&mut crtc, 0x0A, 2); // cursor start, steady mode
        write_reg(&mut crtc, 0x0B, 5); // cursor end
        write_reg(&mut crtc, 0x0E, 0x00); // cursor address 0x0001
        write_reg(&mut crtc, 0x0F, 0x01);
        crtc.cursor_state = true;

        let visible: Vec<u8> = (0u8..8).filter(|&ra| crtc.check_cursor_visible(ra, 0)).collect();
        assert_eq!(visible, vec![2, 3, 4, 5]);
    }

    #[test]
    fn cursor_wraps_when_start_exceeds_end() {
        let mut crtc = test_core(ChipType::Mc6845);
        program_tiny_screen(&mut crtc);
        write_reg(&mut crtc, 0x09, 7);
        write_reg(&mut crtc, 0x0A, 6);
        write_reg(&mut crtc, 0x0B, 2);
        write_reg(&mut crtc, 0x0E, 0x00);
        write_reg(&mut crtc, 0x0F, 0x01);
        crtc.cursor_state = true;

        let visible: Vec<u8> = (0u8..8).filter(|&ra| crtc.check_cursor_visible(ra, 0)).collect();
        assert_eq!(visible, vec![0, 1, 2, 6, 7]);
    }

    #[test]
    fn nonwrap_variant_hides_inverted_cursor() {
        let mut crtc = test_core(ChipType::Hd6845s);
        program_tiny_screen(&mut crtc);
        write_reg(&mut crtc, 0x09, 7);
        write_reg(&mut crtc, 0x0A, 6);
        write_reg(&mut crtc, 0x0B, 2);
        write_reg(&mut crtc, 0x0E, 0x00);
        write_reg(&mut crtc, 0x0F, 0x01);
        crtc.cursor_state = true;

        assert!((0u8..8).all(|ra| !crtc.check_cursor_visible(ra, 0)));
    }

    #[test]
    fn cursor_outside_line_address_range_is_hidden() {
        let mut crtc = test_core(ChipType::Mc6845);
        program_tiny_screen(&mut crtc);
        write_reg(&mut crtc, 0x09, 7);
        write_reg(&mut crtc, 0x0A, 0);
        write_reg(&mut crtc, 0x0B, 7);
        write_reg(&mut crtc, 0x0E, 0x00);
        write_reg(&mut crtc, 0x0F, 0x50);
        crtc.cursor_state = true;

        // horiz_disp is 2, so addresses 0..2 are on the line at address 0.
        assert!(!crtc.check_cursor_visible(0, 0));
        assert!(crtc.check_cursor_visible(0, 0x50));
    }

    #[test]
    fn ma_tracks_character_counter_within_line() {
        let mut crtc = test_core(ChipType::Mc6845);
        program_tiny_screen(&mut crtc);
        settle(&mut crtc);
        crtc.run_lines(1);

        let base = crtc.line_address;
        crtc.run(3);
        assert_eq!(crtc.get_ma(), (base + 3) & MA_MASK);
    }

    #[test]
    fn light_pen_latches_one_clock_later() {
        let mut crtc = test_core(ChipType::Mc6845);
        program_tiny_screen(&mut crtc);
        settle(&mut crtc);
        crtc.run_lines(1);
        crtc.run(2);

        assert!(!crtc.light_pen_latched);
        crtc.assert_light_pen_input();
        crtc.run(1);
        assert!(crtc.light_pen_latched);
        assert_eq!(crtc.light_pen_addr, (crtc.line_address + 3) & MA_MASK);
    }

    #[test]
    fn hsync_width_zero_means_sixteen() {
        let mut crtc = test_core(ChipType::Mc6845);
        program_tiny_screen(&mut crtc);
        write_reg(&mut crtc, 0x00, 24); // room for a 16 cclk pulse
        write_reg(&mut crtc, 0x03, 0x40); // h width 0 -> 16
        settle(&mut crtc);
        crtc.run_lines(1);

        // HSYNC rises at the sync position...
        crtc.run(4);
        assert!(crtc.hsync());
        // ...and holds for 16 character clocks.
        crtc.run(15);
        assert!(crtc.hsync());
        crtc.run(1);
        assert!(!crtc.hsync());
    }

    #[test]
    fn transparent_phi2_fires_update_callback() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_c = seen.clone();

        let mut crtc = match CrtcBuilder::new(ChipType::R6545_1, 2_000_000, 8)
            .update_row(|_, _, _| {})
            .on_update_addr(move |addr, strobe| {
                seen_c.lock().unwrap().push((addr, strobe));
            })
            .build()
            .unwrap()
        {
            CrtcDevice::Crtc6845(crtc) => crtc,
            _ => unreachable!(),
        };

        program_tiny_screen(&mut crtc);
        write_reg(&mut crtc, 0x08, 0x88); // transparent, phi2
        write_reg(&mut crtc, 0x12, 0x12); // update address high
        write_reg(&mut crtc, 0x13, 0x34); // update address low
        crtc.run(1);

        // Each half of the address write strobes the handler.
        let calls = seen.lock().unwrap().clone();
        assert!(!calls.is_empty());
        assert_eq!(calls.last().unwrap().0, 0x1234);

        // A dummy-register access increments and strobes again.
        crtc.address_w(0x1F);
        crtc.register_w(0x00);
        crtc.run(1);
        assert_eq!(seen.lock().unwrap().last().unwrap().0, 0x1235);
    }
}
