use ferrodp_core::{ensure_fixed_part_size, DecodeResult, EncodeResult, ReadCursor, WriteCursor};

/// A rectangle with inclusive bounds, as used by the TS_RECTANGLE16 wire
/// structure and by the raster primitives.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct InclusiveRectangle {
    pub left: u16,
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
}

impl InclusiveRectangle {
    pub const NAME: &'static str = "InclusiveRectangle";

    pub const FIXED_PART_SIZE: usize = 4 * 2;

    pub fn width(&self) -> u16 {
        self.right - self.left + 1
    }

    pub fn height(&self) -> u16 {
        self.bottom - self.top + 1
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let result = Self {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        };

        (result.left <= result.right && result.top <= result.bottom).then_some(result)
    }

    pub fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u16(self.left);
        dst.write_u16(self.top);
        dst.write_u16(self.right);
        dst.write_u16(self.bottom);

        Ok(())
    }

    pub fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let left = src.read_u16();
        let top = src.read_u16();
        let right = src.read_u16();
        let bottom = src.read_u16();

        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_is_empty_for_disjoint_rectangles() {
        let a = InclusiveRectangle {
            left: 0,
            top: 0,
            right: 9,
            bottom: 9,
        };
        let b = InclusiveRectangle {
            left: 10,
            top: 10,
            right: 19,
            bottom: 19,
        };
        assert_eq!(a.intersect(&b), None);

        let c = InclusiveRectangle {
            left: 5,
            top: 5,
            right: 14,
            bottom: 14,
        };
        let i = a.intersect(&c).unwrap();
        assert_eq!((i.left, i.top, i.right, i.bottom), (5, 5, 9, 9));
    }
}
