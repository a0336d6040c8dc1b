//! Execution timing markers.
//!
//! A marker spans two absolute PRG addresses. Whenever execution passes the
//! start address the start timestamp is taken, and the end timestamp tracks
//! execution until the end address is reached, so a debugger can show how
//! many frames and cycles a piece of code took.

use retrones_common::Color;

pub const MAX_MARKERS: usize = 8;

const PALETTE: [Color; MAX_MARKERS] = [
    Color::RED,
    Color::GREEN,
    Color::BLUE,
    Color::YELLOW,
    Color::CYAN,
    Color::MAGENTA,
    Color::ORANGE,
    Color::WHITE,
];

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum MarkerState {
    #[default]
    Invalid,
    /// Start address set, end address not yet chosen.
    Started,
    Complete,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct Timestamp {
    pub frame: u32,
    pub cycle: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Marker {
    pub state: MarkerState,
    pub start_addr: Option<u32>,
    pub end_addr: Option<u32>,
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    pub color: Color,
}

impl Marker {
    fn new(color: Color) -> Self {
        Self {
            state: MarkerState::Invalid,
            start_addr: None,
            end_addr: None,
            start: None,
            end: None,
            color,
        }
    }

    fn zero(&mut self) {
        self.start = None;
        self.end = None;
    }
}

#[derive(Clone, Debug)]
pub struct MarkerSet {
    markers: [Marker; MAX_MARKERS],
}

impl Default for MarkerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerSet {
    pub fn new() -> Self {
        Self {
            markers: PALETTE.map(Marker::new),
        }
    }

    /// Number of slots, used or not.
    pub fn slots(&self) -> usize {
        self.markers.len()
    }

    /// Whether every slot is free.
    pub fn has_no_markers(&self) -> bool {
        self.markers
            .iter()
            .all(|marker| marker.state == MarkerState::Invalid)
    }

    pub fn get(&self, index: usize) -> Option<&Marker> {
        self.markers.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter()
    }

    /// Start a marker at `abs` in the first free slot.
    ///
    /// Returns `None` and leaves the set untouched when every slot is taken.
    pub fn add(&mut self, abs: u32) -> Option<usize> {
        let index = self
            .markers
            .iter()
            .position(|marker| marker.state == MarkerState::Invalid)?;

        let marker = &mut self.markers[index];
        marker.state = MarkerState::Started;
        marker.start_addr = Some(abs);
        marker.end_addr = None;
        marker.zero();
        log::debug!("Marker {} started at ${:05X}", index, abs);
        Some(index)
    }

    pub fn find_in_progress(&self) -> Option<usize> {
        self.markers
            .iter()
            .position(|marker| marker.state == MarkerState::Started)
    }

    /// Close a started marker at `abs`. Anything else is refused.
    pub fn complete(&mut self, index: usize, abs: u32) -> bool {
        match self.markers.get_mut(index) {
            Some(marker) if marker.state == MarkerState::Started => {
                marker.state = MarkerState::Complete;
                marker.end_addr = Some(abs);
                log::debug!("Marker {} completed at ${:05X}", index, abs);
                true
            }
            _ => false,
        }
    }

    /// Feed the address of the instruction being executed.
    pub fn update(&mut self, abs: u32, frame: u32, cycle: u32) {
        let now = Timestamp { frame, cycle };
        for marker in &mut self.markers {
            if marker.state == MarkerState::Invalid {
                continue;
            }

            if marker.start_addr == Some(abs) {
                marker.start = Some(now);
                marker.end = None;
            } else if marker.start.is_some() {
                match marker.state {
                    MarkerState::Complete if marker.end_addr == Some(abs) => {
                        marker.end = Some(now);
                    }
                    MarkerState::Started => marker.end = Some(now),
                    _ => {}
                }
            }
        }
    }

    pub fn clear_all(&mut self) {
        self.markers = PALETTE.map(Marker::new);
    }

    /// Forget every timestamp but keep the markers themselves.
    pub fn zero_all(&mut self) {
        self.markers.iter_mut().for_each(Marker::zero);
    }
}
