//! Bit-packed fill/stroke flags and the enums they encode
//!
//! Fill and stroke options travel through the public API and the
//! command-list encoding as single `u32` words so they serialize
//! verbatim.

/// Whether the flattened path is convex or needs concave decomposition
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PathType {
    #[default]
    Convex = 0,
    Concave = 1,
}

/// Fill rule for concave decomposition
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FillRule {
    #[default]
    NonZero = 0,
    EvenOdd = 1,
}

/// Line cap style
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineCap {
    #[default]
    Butt = 0,
    Round = 1,
    Square = 2,
}

/// Line join style
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineJoin {
    #[default]
    Miter = 0,
    Round = 1,
    Bevel = 2,
}

/// Arc sweep direction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Winding {
    #[default]
    Ccw = 0,
    Cw = 1,
}

/// Matrix composition order for `transform_mult`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransformOrder {
    /// Apply the given matrix before the current transform
    Pre = 0,
    /// Apply the given matrix after the current transform
    #[default]
    Post = 1,
}

/// Stencil comparison rule for clip regions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClipRule {
    /// Draw inside the clip shapes (stencil EQUAL)
    #[default]
    In = 0,
    /// Draw outside the clip shapes (stencil NOT_EQUAL)
    NotIn = 1,
}

const FILL_PATH_TYPE_MASK: u32 = 0x01;
const FILL_RULE_SHIFT: u32 = 1;
const FILL_RULE_MASK: u32 = 0x01 << FILL_RULE_SHIFT;
const FILL_AA_SHIFT: u32 = 2;
const FILL_AA_MASK: u32 = 0x01 << FILL_AA_SHIFT;

/// Packed fill options: path type, fill rule, anti-aliasing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FillFlags(u32);

impl FillFlags {
    pub fn new(path_type: PathType, fill_rule: FillRule, aa: bool) -> Self {
        FillFlags(
            path_type as u32
                | (fill_rule as u32) << FILL_RULE_SHIFT
                | (aa as u32) << FILL_AA_SHIFT,
        )
    }

    /// Convex path, non-zero rule, AA on
    pub fn convex_aa() -> Self {
        Self::new(PathType::Convex, FillRule::NonZero, true)
    }

    /// Concave path, non-zero rule, AA on
    pub fn concave_aa() -> Self {
        Self::new(PathType::Concave, FillRule::NonZero, true)
    }

    pub fn path_type(self) -> PathType {
        if self.0 & FILL_PATH_TYPE_MASK == 0 {
            PathType::Convex
        } else {
            PathType::Concave
        }
    }

    pub fn fill_rule(self) -> FillRule {
        if self.0 & FILL_RULE_MASK == 0 {
            FillRule::NonZero
        } else {
            FillRule::EvenOdd
        }
    }

    pub fn aa(self) -> bool {
        self.0 & FILL_AA_MASK != 0
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        FillFlags(bits)
    }
}

const STROKE_CAP_MASK: u32 = 0x03;
const STROKE_JOIN_SHIFT: u32 = 2;
const STROKE_JOIN_MASK: u32 = 0x03 << STROKE_JOIN_SHIFT;
const STROKE_AA_SHIFT: u32 = 4;
const STROKE_AA_MASK: u32 = 0x01 << STROKE_AA_SHIFT;
const STROKE_FIXED_WIDTH_SHIFT: u32 = 5;
const STROKE_FIXED_WIDTH_MASK: u32 = 0x01 << STROKE_FIXED_WIDTH_SHIFT;

/// Packed stroke options: cap, join, anti-aliasing, fixed width
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StrokeFlags(u32);

impl StrokeFlags {
    pub fn new(cap: LineCap, join: LineJoin, aa: bool) -> Self {
        StrokeFlags(
            cap as u32 | (join as u32) << STROKE_JOIN_SHIFT | (aa as u32) << STROKE_AA_SHIFT,
        )
    }

    /// Butt cap, miter join, AA on
    pub fn default_aa() -> Self {
        Self::new(LineCap::Butt, LineJoin::Miter, true)
    }

    /// Keep the stroke width in canvas units regardless of the current
    /// transform's scale.
    pub fn with_fixed_width(self) -> Self {
        StrokeFlags(self.0 | STROKE_FIXED_WIDTH_MASK)
    }

    pub fn cap(self) -> LineCap {
        match self.0 & STROKE_CAP_MASK {
            0 => LineCap::Butt,
            1 => LineCap::Round,
            _ => LineCap::Square,
        }
    }

    pub fn join(self) -> LineJoin {
        match (self.0 & STROKE_JOIN_MASK) >> STROKE_JOIN_SHIFT {
            0 => LineJoin::Miter,
            1 => LineJoin::Round,
            _ => LineJoin::Bevel,
        }
    }

    pub fn aa(self) -> bool {
        self.0 & STROKE_AA_MASK != 0
    }

    pub fn fixed_width(self) -> bool {
        self.0 & STROKE_FIXED_WIDTH_MASK != 0
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        StrokeFlags(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_flags_roundtrip() {
        let f = FillFlags::new(PathType::Concave, FillRule::EvenOdd, true);
        assert_eq!(f.path_type(), PathType::Concave);
        assert_eq!(f.fill_rule(), FillRule::EvenOdd);
        assert!(f.aa());
        assert_eq!(FillFlags::from_bits(f.bits()), f);
    }

    #[test]
    fn test_stroke_flags_roundtrip() {
        let f = StrokeFlags::new(LineCap::Square, LineJoin::Round, false).with_fixed_width();
        assert_eq!(f.cap(), LineCap::Square);
        assert_eq!(f.join(), LineJoin::Round);
        assert!(!f.aa());
        assert!(f.fixed_width());
        assert_eq!(StrokeFlags::from_bits(f.bits()), f);
    }
}
