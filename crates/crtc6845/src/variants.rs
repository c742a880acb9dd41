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

    variants.rs

    Chip selection: the per-variant capability table, the device builder
    with its mandatory-callback validation, and the dispatch enum over the
    three engine specializations.

*/

use enum_dispatch::enum_dispatch;
use serde_derive::{Deserialize, Serialize};
use strum_macros::Display;

use crate::{
    crtc::{Crtc6845, CrtcState, ScreenGeometry},
    crtc2::{Crtc2, Crtc2State},
    error::CrtcError,
    tracelogger::TraceLogger,
    types::*,
    vdc::{Vdc8563, VdcState},
};

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChipType {
    #[strum(to_string = "MC6845")]
    Mc6845,
    #[strum(to_string = "MC6845-1")]
    Mc6845_1,
    #[strum(to_string = "C6545-1")]
    C6545_1,
    #[strum(to_string = "R6545-1")]
    R6545_1,
    #[strum(to_string = "HD6845S")]
    Hd6845s,
    #[strum(to_string = "SY6545-1")]
    Sy6545_1,
    #[strum(to_string = "SY6845E")]
    Sy6845e,
    #[strum(to_string = "HD6345")]
    Hd6345,
    #[strum(to_string = "AMS40489")]
    Ams40489,
    #[strum(to_string = "MOS8563")]
    Mos8563,
    #[strum(to_string = "MOS8568")]
    Mos8568,
}

/// Capability record parameterizing the shared engine. Selected once at
/// construction and never mutated.
#[derive(Copy, Clone, Debug)]
pub struct ChipCaps {
    pub addr_latch_mask: u8,
    pub supports_disp_start_addr_r: bool,
    pub supports_vert_sync_width: bool,
    pub supports_status_reg_d5: bool,
    pub supports_status_reg_d6: bool,
    pub supports_status_reg_d7: bool,
    pub supports_transparent: bool,
    /// A cursor start raster past the end raster wraps into a split cursor
    /// on most variants; the Hitachi parts show no cursor instead.
    pub cursor_wrap: bool,
    pub noninterlace_adjust: u8,
    pub interlace_adjust: u8,
}

const BASE_CAPS: ChipCaps = ChipCaps {
    addr_latch_mask: 0x1F,
    supports_disp_start_addr_r: false,
    supports_vert_sync_width: false,
    supports_status_reg_d5: false,
    supports_status_reg_d6: false,
    supports_status_reg_d7: false,
    supports_transparent: false,
    cursor_wrap: true,
    noninterlace_adjust: 1,
    interlace_adjust: 1,
};

impl ChipType {
    pub fn caps(&self) -> ChipCaps {
        match self {
            ChipType::Mc6845 => BASE_CAPS,
            ChipType::Mc6845_1 => ChipCaps {
                supports_disp_start_addr_r: true,
                supports_vert_sync_width: true,
                ..BASE_CAPS
            },
            ChipType::C6545_1 => ChipCaps {
                supports_vert_sync_width: true,
                supports_status_reg_d5: true,
                supports_status_reg_d6: true,
                ..BASE_CAPS
            },
            ChipType::R6545_1 | ChipType::Sy6545_1 | ChipType::Sy6845e => ChipCaps {
                supports_vert_sync_width: true,
                supports_status_reg_d5: true,
                supports_status_reg_d6: true,
                supports_status_reg_d7: true,
                supports_transparent: true,
                ..BASE_CAPS
            },
            ChipType::Hd6845s => ChipCaps {
                supports_disp_start_addr_r: true,
                supports_vert_sync_width: true,
                cursor_wrap: false,
                // In interlace sync & video mode the Hitachi parts are
                // programmed with two less than the raster total.
                interlace_adjust: 2,
                ..BASE_CAPS
            },
            ChipType::Hd6345 => ChipCaps {
                addr_latch_mask: 0x3F,
                supports_disp_start_addr_r: true,
                supports_vert_sync_width: true,
                cursor_wrap: false,
                interlace_adjust: 2,
                ..BASE_CAPS
            },
            ChipType::Ams40489 => ChipCaps {
                supports_disp_start_addr_r: true,
                ..BASE_CAPS
            },
            ChipType::Mos8563 | ChipType::Mos8568 => ChipCaps {
                addr_latch_mask: 0x3F,
                supports_disp_start_addr_r: true,
                supports_status_reg_d5: true,
                supports_status_reg_d6: true,
                supports_status_reg_d7: true,
                ..BASE_CAPS
            },
        }
    }
}

/// Builder for a CRTC device. Mandatory callbacks are validated at build
/// time: a missing row-draw handler (except on the VDC, which renders
/// internally) or a missing update-address handler on a transparent-capable
/// chip is a construction error.
pub struct CrtcBuilder {
    pub(crate) chip_type: ChipType,
    pub(crate) clock_hz: u32,
    pub(crate) hpixels_per_column: u8,
    pub(crate) show_border_area: bool,
    pub(crate) visarea_adjust: (i16, i16, i16, i16),
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

impl CrtcBuilder {
    pub fn new(chip_type: ChipType, clock_hz: u32, hpixels_per_column: u8) -> Self {
        Self {
            chip_type,
            clock_hz,
            hpixels_per_column,
            show_border_area: false,
            visarea_adjust: (0, 0, 0, 0),
            update_row: None,
            begin_update: None,
            end_update: None,
            reconfigure: None,
            on_update_addr: None,
            out_de: None,
            out_hsync: None,
            out_vsync: None,
            out_cur: None,
            trace_logger: TraceLogger::None,
        }
    }

    pub fn update_row(mut self, cb: impl FnMut(&mut Bitmap32, &ClipRect, &RowParams) + Send + 'static) -> Self {
        self.update_row = Some(Box::new(cb));
        self
    }

    pub fn begin_update(mut self, cb: impl FnMut(&mut Bitmap32, &ClipRect) + Send + 'static) -> Self {
        self.begin_update = Some(Box::new(cb));
        self
    }

    pub fn end_update(mut self, cb: impl FnMut(&mut Bitmap32, &ClipRect) + Send + 'static) -> Self {
        self.end_update = Some(Box::new(cb));
        self
    }

    pub fn reconfigure(mut self, cb: impl FnMut(ScreenConfig) + Send + 'static) -> Self {
        self.reconfigure = Some(Box::new(cb));
        self
    }

    pub fn on_update_addr(mut self, cb: impl FnMut(u16, u8) + Send + 'static) -> Self {
        self.on_update_addr = Some(Box::new(cb));
        self
    }

    pub fn out_de(mut self, cb: impl FnMut(bool) + Send + 'static) -> Self {
        self.out_de = Some(Box::new(cb));
        self
    }

    pub fn out_hsync(mut self, cb: impl FnMut(bool) + Send + 'static) -> Self {
        self.out_hsync = Some(Box::new(cb));
        self
    }

    pub fn out_vsync(mut self, cb: impl FnMut(bool) + Send + 'static) -> Self {
        self.out_vsync = Some(Box::new(cb));
        self
    }

    pub fn out_cur(mut self, cb: impl FnMut(bool) + Send + 'static) -> Self {
        self.out_cur = Some(Box::new(cb));
        self
    }

    pub fn show_border_area(mut self, show: bool) -> Self {
        self.show_border_area = show;
        self
    }

    pub fn visarea_adjust(mut self, min_x: i16, max_x: i16, min_y: i16, max_y: i16) -> Self {
        self.visarea_adjust = (min_x, max_x, min_y, max_y);
        self
    }

    pub fn trace_logger(mut self, trace_logger: TraceLogger) -> Self {
        self.trace_logger = trace_logger;
        self
    }

    pub fn build(self) -> Result<CrtcDevice, CrtcError> {
        if self.clock_hz == 0 {
            return Err(CrtcError::InvalidClock(self.chip_type));
        }
        if self.hpixels_per_column == 0 {
            return Err(CrtcError::InvalidCharWidth(self.chip_type));
        }

        let caps = self.chip_type.caps();
        let has_internal_renderer = matches!(self.chip_type, ChipType::Mos8563 | ChipType::Mos8568);

        if self.update_row.is_none() && !has_internal_renderer {
            return Err(CrtcError::MissingRowHandler(self.chip_type));
        }
        if caps.supports_transparent && self.on_update_addr.is_none() {
            return Err(CrtcError::MissingUpdateHandler(self.chip_type));
        }

        Ok(match self.chip_type {
            ChipType::Mos8563 | ChipType::Mos8568 => {
                CrtcDevice::Vdc8563(Vdc8563::new(Crtc6845::from_builder(self, 8)))
            }
            ChipType::Hd6345 => CrtcDevice::Crtc2(Crtc2::new(Crtc6845::from_builder(self, 1))),
            _ => CrtcDevice::Crtc6845(Crtc6845::from_builder(self, 1)),
        })
    }
}

/// Snapshot of any CRTC device variant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum DeviceState {
    Crtc(CrtcState),
    Crtc2(Crtc2State),
    Vdc(VdcState),
}

#[enum_dispatch]
pub enum CrtcDevice {
    Crtc6845,
    Crtc2,
    Vdc8563,
}

#[enum_dispatch(CrtcDevice)]
pub trait CrtController {
    fn chip_type(&self) -> ChipType;
    fn reset(&mut self);
    /// Run the chip for `cclks` character clocks.
    fn run(&mut self, cclks: u64);
    /// Write the register address-select latch.
    fn select_register(&mut self, index: u8);
    fn read_register(&mut self) -> u8;
    fn write_register(&mut self, data: u8);
    fn read_status(&mut self) -> u8;
    /// Draw every scanline of the clip region through the row-draw path.
    fn screen_update(&mut self, bitmap: &mut Bitmap32, clip: &ClipRect);
    fn assert_light_pen_input(&mut self);
    fn get_ma(&mut self) -> u16;
    fn get_ra(&self) -> u8;
    fn de(&self) -> bool;
    fn hsync(&self) -> bool;
    fn vsync(&self) -> bool;
    fn cursor(&self) -> bool;
    fn set_hpixels_per_column(&mut self, hpixels_per_column: u8);
    fn geometry(&self) -> ScreenGeometry;
    fn save_state(&self) -> DeviceState;
    fn restore_state(&mut self, state: &DeviceState);
}

impl CrtController for Crtc6845 {
    fn chip_type(&self) -> ChipType {
        self.chip_type
    }

    fn reset(&mut self) {
        Crtc6845::reset(self);
    }

    fn run(&mut self, cclks: u64) {
        Crtc6845::run(self, cclks);
    }

    fn select_register(&mut self, index: u8) {
        self.address_w(index);
    }

    fn read_register(&mut self) -> u8 {
        self.register_r()
    }

    fn write_register(&mut self, data: u8) {
        self.register_w(data);
    }

    fn read_status(&mut self) -> u8 {
        self.status_r()
    }

    fn screen_update(&mut self, bitmap: &mut Bitmap32, clip: &ClipRect) {
        Crtc6845::screen_update(self, bitmap, clip);
    }

    fn assert_light_pen_input(&mut self) {
        Crtc6845::assert_light_pen_input(self);
    }

    fn get_ma(&mut self) -> u16 {
        Crtc6845::get_ma(self)
    }

    fn get_ra(&self) -> u8 {
        Crtc6845::get_ra(self)
    }

    fn de(&self) -> bool {
        Crtc6845::de(self)
    }

    fn hsync(&self) -> bool {
        Crtc6845::hsync(self)
    }

    fn vsync(&self) -> bool {
        Crtc6845::vsync(self)
    }

    fn cursor(&self) -> bool {
        Crtc6845::cursor(self)
    }

    fn set_hpixels_per_column(&mut self, hpixels_per_column: u8) {
        Crtc6845::set_hpixels_per_column(self, hpixels_per_column);
    }

    fn geometry(&self) -> ScreenGeometry {
        Crtc6845::geometry(self)
    }

    fn save_state(&self) -> DeviceState {
        DeviceState::Crtc(self.snapshot())
    }

    fn restore_state(&mut self, state: &DeviceState) {
        match state {
            DeviceState::Crtc(state) => self.restore_snapshot(state),
            _ => log::warn!("{}: state snapshot is for a different chip family", self.chip_type),
        }
    }
}
