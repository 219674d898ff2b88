use serde::{Serialize, Deserialize};

/// Continuous position in physical units; `x` along columns, `y` along rows.
#[derive(Copy, Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    #[inline(always)]
    pub fn new(x: f64, y: f64) -> Self { Self { x, y } }
    #[inline(always)]
    pub fn add(self, other: Self) -> Self { Self::new(self.x + other.x, self.y + other.y) }

    /// Wraps the position into `[0, width) x [0, height)`.
    pub fn wrap(self, width: f64, height: f64) -> Self {
        Self::new(self.x.rem_euclid(width), self.y.rem_euclid(height))
    }
}

impl From<[f64; 2]> for Vec2 {
    fn from(value: [f64; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}
