use bitflags::bitflags;

bitflags! {
    /// Standard NES controller state word.
    ///
    /// Bit order follows the serial read order of the 4021 shift register
    /// inside the pad: A, B, Select, Start, Up, Down, Left, Right.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
    pub struct Buttons: u8 {
        const A = 1 << 0;
        const B = 1 << 1;
        const SELECT = 1 << 2;
        const START = 1 << 3;
        const UP = 1 << 4;
        const DOWN = 1 << 5;
        const LEFT = 1 << 6;
        const RIGHT = 1 << 7;
    }
}

impl Buttons {
    /// Bit `index` of the serial stream the CPU reads from `$4016`/`$4017`.
    /// Reads past the eighth bit return 1, as on an official pad.
    pub fn serial_bit(self, index: usize) -> bool {
        match index {
            0..=7 => self.bits() & (1 << index) != 0,
            _ => true,
        }
    }
}
