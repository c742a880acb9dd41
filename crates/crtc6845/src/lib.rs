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

    lib.rs

    Emulation of the MC6845 CRT controller and its clone/variant family
    (MC6845-1, C6545-1, R6545-1, HD6845S, SY6545-1, SY6845E, HD6345,
    AMS40489, MOS8563/8568).

*/

#![allow(dead_code)]

pub mod crtc;
pub mod crtc2;
pub mod error;
pub mod tracelogger;
pub mod types;
pub mod variants;
pub mod vdc;

pub use crtc::{Crtc6845, ScreenGeometry};
pub use crtc2::Crtc2;
pub use error::CrtcError;
pub use tracelogger::TraceLogger;
pub use types::{Bitmap32, ClipRect, RowParams, ScreenConfig};
pub use variants::{ChipCaps, ChipType, CrtController, CrtcBuilder, CrtcDevice, DeviceState};
pub use vdc::Vdc8563;
