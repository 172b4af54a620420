//! Button edge detection.
//!
//! Turns sampled key levels into the edges the recorder reacts to. Pure
//! logic: the caller supplies the level and the time.

/// Edges seen by one `update`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEdges {
    pub pressed: bool,
    pub released: bool,
    /// Held past the long-press threshold (once per hold).
    pub held_for: bool,
}

/// Edge tracker for one key.
#[derive(Debug, Clone, Copy)]
pub struct ButtonTracker {
    hold_ms: u32,
    down: bool,
    down_since_ms: i64,
    held_fired: bool,
}

impl ButtonTracker {
    pub const fn new(hold_ms: u32) -> Self {
        Self {
            hold_ms,
            down: false,
            down_since_ms: 0,
            held_fired: false,
        }
    }

    #[inline]
    pub fn is_pressed(&self) -> bool {
        self.down
    }

    /// Feed the current level (`true` = pressed).
    pub fn update(&mut self, level: bool, now_ms: i64) -> ButtonEdges {
        let mut edges = ButtonEdges::default();

        match (self.down, level) {
            (false, true) => {
                self.down = true;
                self.down_since_ms = now_ms;
                self.held_fired = false;
                edges.pressed = true;
            }
            (true, false) => {
                self.down = false;
                edges.released = true;
            }
            _ => {}
        }

        if self.down
            && !self.held_fired
            && now_ms - self.down_since_ms >= self.hold_ms as i64
        {
            self.held_fired = true;
            edges.held_for = true;
        }

        edges
    }
}
