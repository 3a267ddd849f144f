//! Sizing descriptors and the resolved constraints fed to the solver.

use geom::Size;

/// One sizing bound: an absolute unit count, or a fraction of whatever
/// space is available when the bound is resolved. Fractions are expected
/// to be at most 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dim {
    Absolute(i32),
    Fraction(f32),
}

impl Dim {
    /// Resolve against an available extent. Fractions truncate.
    pub fn resolve(&self, available: i32) -> i32 {
        match *self {
            Self::Absolute(v) => v,
            Self::Fraction(f) => (available as f32 * f) as i32,
        }
    }
}

impl From<i32> for Dim {
    fn from(v: i32) -> Self {
        Self::Absolute(v)
    }
}

impl From<f32> for Dim {
    fn from(f: f32) -> Self {
        Self::Fraction(f)
    }
}

/// A resolved constraint on one axis of one item. Preferred is only used
/// when free sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint {
    pub minimum: i32,
    pub maximum: i32,
    pub preferred: Option<i32>,
}

impl Constraint {
    pub fn new(minimum: i32, maximum: i32, preferred: Option<i32>) -> Self {
        Self {
            minimum,
            maximum,
            preferred,
        }
    }

    /// A constraint that accepts any size.
    pub fn free() -> Self {
        Self::new(0, i32::MAX, None)
    }

    /// A constraint pinned to one size.
    pub fn fixed(v: i32) -> Self {
        Self::new(v, v, Some(v))
    }
}

/// Describes the sizing for a canvas item.
///
/// Width, height, and aspect ratio can each specify minimum, maximum, and
/// preferred values. Width and height bounds may be absolute or a fraction
/// of the available space; unset (`None`) means the layout engine decides.
/// Preferred values are only used when free sizing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sizing {
    pub preferred_width: Option<Dim>,
    pub preferred_height: Option<Dim>,
    pub minimum_width: Option<Dim>,
    pub minimum_height: Option<Dim>,
    pub maximum_width: Option<Dim>,
    pub maximum_height: Option<Dim>,
    pub preferred_aspect_ratio: Option<f32>,
    pub minimum_aspect_ratio: Option<f32>,
    pub maximum_aspect_ratio: Option<f32>,
    /// Force all sizes to zero when a composite has no visible children.
    pub collapsible: bool,
}

impl Sizing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the width to a single value.
    pub fn set_fixed_width(&mut self, width: impl Into<Dim>) {
        let width = width.into();
        self.preferred_width = Some(width);
        self.minimum_width = Some(width);
        self.maximum_width = Some(width);
    }

    /// Pin the height to a single value.
    pub fn set_fixed_height(&mut self, height: impl Into<Dim>) {
        let height = height.into();
        self.preferred_height = Some(height);
        self.minimum_height = Some(height);
        self.maximum_height = Some(height);
    }

    /// Pin both axes.
    pub fn set_fixed_size(&mut self, size: Size) {
        self.set_fixed_width(size.w);
        self.set_fixed_height(size.h);
    }

    pub fn with_fixed_width(mut self, width: impl Into<Dim>) -> Self {
        self.set_fixed_width(width);
        self
    }

    pub fn with_fixed_height(mut self, height: impl Into<Dim>) -> Self {
        self.set_fixed_height(height);
        self
    }

    pub fn with_fixed_size(mut self, size: Size) -> Self {
        self.set_fixed_size(size);
        self
    }

    pub fn with_minimum_width(mut self, width: impl Into<Dim>) -> Self {
        self.minimum_width = Some(width.into());
        self
    }

    pub fn with_maximum_width(mut self, width: impl Into<Dim>) -> Self {
        self.maximum_width = Some(width.into());
        self
    }

    pub fn with_preferred_width(mut self, width: impl Into<Dim>) -> Self {
        self.preferred_width = Some(width.into());
        self
    }

    pub fn with_minimum_height(mut self, height: impl Into<Dim>) -> Self {
        self.minimum_height = Some(height.into());
        self
    }

    pub fn with_maximum_height(mut self, height: impl Into<Dim>) -> Self {
        self.maximum_height = Some(height.into());
        self
    }

    pub fn with_preferred_height(mut self, height: impl Into<Dim>) -> Self {
        self.preferred_height = Some(height.into());
        self
    }

    pub fn with_collapsible(mut self, collapsible: bool) -> Self {
        self.collapsible = collapsible;
        self
    }

    /// Resolve the width bounds against a known available extent.
    pub fn width_constraint(&self, available: i32) -> Constraint {
        Self::constraint(
            self.minimum_width,
            self.maximum_width,
            self.preferred_width,
            available,
        )
    }

    /// Resolve the height bounds against a known available extent.
    pub fn height_constraint(&self, available: i32) -> Constraint {
        Self::constraint(
            self.minimum_height,
            self.maximum_height,
            self.preferred_height,
            available,
        )
    }

    fn constraint(
        minimum: Option<Dim>,
        maximum: Option<Dim>,
        preferred: Option<Dim>,
        available: i32,
    ) -> Constraint {
        Constraint {
            minimum: minimum.map_or(0, |d| d.resolve(available)),
            maximum: maximum.map_or(i32::MAX, |d| d.resolve(available)),
            preferred: preferred.map(|d| d.resolve(available)),
        }
    }

    /// Force every bound on both axes to zero. Applied to collapsible
    /// composites with no visible children.
    pub(crate) fn collapse(&mut self) {
        self.set_fixed_width(0);
        self.set_fixed_height(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_resolves_against_available() {
        let sizing = Sizing::new()
            .with_minimum_width(0.25)
            .with_maximum_width(0.5);
        let c = sizing.width_constraint(200);
        assert_eq!(c.minimum, 50);
        assert_eq!(c.maximum, 100);
        assert_eq!(c.preferred, None);
    }

    #[test]
    fn unset_bounds_are_open() {
        let c = Sizing::new().width_constraint(100);
        assert_eq!(c.minimum, 0);
        assert_eq!(c.maximum, i32::MAX);
        assert_eq!(c.preferred, None);
    }

    #[test]
    fn fixed_pins_all_three() {
        let c = Sizing::new().with_fixed_height(40).height_constraint(100);
        assert_eq!((c.minimum, c.maximum, c.preferred), (40, 40, Some(40)));
    }
}
