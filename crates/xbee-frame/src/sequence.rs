/// Correlation id generator.
///
/// Cycles through 1..=255 and wraps back to 1. Zero is never produced because
/// an id of zero tells the radio not to answer.
#[derive(Debug, Clone)]
pub struct Sequence {
    last: u8,
}

impl Sequence {
    pub fn new() -> Self {
        Self { last: 0 }
    }

    /// Next id in the cycle.
    pub fn next_id(&mut self) -> u8 {
        self.last = if self.last == u8::MAX { 1 } else { self.last + 1 };
        self.last
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for Sequence {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        Some(self.next_id())
    }
}
