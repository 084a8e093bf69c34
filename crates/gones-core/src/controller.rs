//! Standard joypad
//!
//! The host sets the button state; the CPU latches it by writing the strobe
//! port and then shifts it out one bit per read.

use bitflags::bitflags;

use crate::bits::bit;

bitflags! {
    /// Button state, in the order the joypad shifts it out
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Buttons: u8 {
        const A = 0b0000_0001;
        const B = 0b0000_0010;
        const SELECT = 0b0000_0100;
        const START = 0b0000_1000;
        const UP = 0b0001_0000;
        const DOWN = 0b0010_0000;
        const LEFT = 0b0100_0000;
        const RIGHT = 0b1000_0000;
    }
}

/// Joypad serial port state
#[derive(Debug, Clone, Default)]
pub struct Controller {
    buttons: Buttons,
    strobe: bool,
    index: u8,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole button state
    pub fn set_buttons(&mut self, buttons: Buttons) {
        self.buttons = buttons;
    }

    /// Press or release a set of buttons
    pub fn set_pressed(&mut self, buttons: Buttons, pressed: bool) {
        self.buttons.set(buttons, pressed);
    }

    pub fn buttons(&self) -> Buttons {
        self.buttons
    }

    /// Strobe port write. Bit 0 high holds the shift index at button A.
    pub fn write(&mut self, data: u8) {
        self.strobe = data & 1 == 1;
        if self.strobe {
            self.index = 0;
        }
    }

    /// Serial read port. Returns 1 once all eight buttons have been read.
    pub fn read(&mut self) -> u8 {
        if self.index > 7 {
            return 1;
        }
        let value = bit(self.buttons.bits(), self.index);
        if !self.strobe {
            self.index += 1;
        }
        value
    }
}
