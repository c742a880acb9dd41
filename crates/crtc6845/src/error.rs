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

    error.rs

    Construction-time errors for the CRTC device builder.

*/

use std::{
    error::Error,
    fmt,
    fmt::Display,
};

use crate::variants::ChipType;

#[derive(Debug)]
pub enum CrtcError {
    MissingRowHandler(ChipType),
    MissingUpdateHandler(ChipType),
    InvalidClock(ChipType),
    InvalidCharWidth(ChipType),
}
impl Error for CrtcError {}
impl Display for CrtcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self {
            CrtcError::MissingRowHandler(chip) => {
                write!(f, "{}: no row draw handler was bound", chip)
            }
            CrtcError::MissingUpdateHandler(chip) => {
                write!(f, "{}: transparent memory mode without update handler", chip)
            }
            CrtcError::InvalidClock(chip) => {
                write!(f, "{}: character clock rate must be nonzero", chip)
            }
            CrtcError::InvalidCharWidth(chip) => {
                write!(f, "{}: pixels per character column must be nonzero", chip)
            }
        }
    }
}
