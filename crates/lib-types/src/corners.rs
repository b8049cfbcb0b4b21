//! Corner-valued scalars.
//!
//! Every electrical quantity in an IBIS model carries three process corners:
//! `typ`, `min`, and `max`. Any of the three may be unset, in which case the
//! emitter prints `NA` and the planner skips the corresponding simulation.

use serde::{Deserialize, Serialize};

/// One of the three characterization corners.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Corner {
    #[default]
    Typ,
    Min,
    Max,
}

impl Corner {
    /// All corners in simulation order.
    pub const ALL: [Corner; 3] = [Corner::Typ, Corner::Min, Corner::Max];

    /// Lower-case label used in filenames and log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Corner::Typ => "typ",
            Corner::Min => "min",
            Corner::Max => "max",
        }
    }
}

impl std::fmt::Display for Corner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A `{typ, min, max}` triple with each element optionally unset.
///
/// Note: for the temperature-range field, min/max name the slowest/fastest
/// process corners and may appear numerically reversed. That ordering is a
/// domain convention and is preserved literally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Corners<T> {
    pub typ: Option<T>,
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T: Copy> Corners<T> {
    pub fn new(typ: T, min: T, max: T) -> Self {
        Self {
            typ: Some(typ),
            min: Some(min),
            max: Some(max),
        }
    }

    /// A triple with only the typical value set.
    pub fn from_typ(typ: T) -> Self {
        Self {
            typ: Some(typ),
            min: None,
            max: None,
        }
    }

    /// The same value in all three corners.
    pub fn splat(value: T) -> Self {
        Self::new(value, value, value)
    }

    pub fn get(&self, corner: Corner) -> Option<T> {
        match corner {
            Corner::Typ => self.typ,
            Corner::Min => self.min,
            Corner::Max => self.max,
        }
    }

    pub fn set(&mut self, corner: Corner, value: T) {
        match corner {
            Corner::Typ => self.typ = Some(value),
            Corner::Min => self.min = Some(value),
            Corner::Max => self.max = Some(value),
        }
    }

    /// True when none of the three corners is set.
    pub fn is_empty(&self) -> bool {
        self.typ.is_none() && self.min.is_none() && self.max.is_none()
    }

    /// True when all three corners are set.
    pub fn is_complete(&self) -> bool {
        self.typ.is_some() && self.min.is_some() && self.max.is_some()
    }

    /// Corner value with fallback to `typ` when the corner is unset.
    pub fn get_or_typ(&self, corner: Corner) -> Option<T> {
        self.get(corner).or(self.typ)
    }

    /// Fill any unset corner from `parent`, leaving set corners untouched.
    ///
    /// This is the single inheritance step of the hierarchical defaults walk
    /// (Model over Component over Document).
    pub fn inherit(&mut self, parent: &Corners<T>) {
        if self.typ.is_none() {
            self.typ = parent.typ;
        }
        if self.min.is_none() {
            self.min = parent.min;
        }
        if self.max.is_none() {
            self.max = parent.max;
        }
    }

    pub fn map<U: Copy>(&self, f: impl Fn(T) -> U) -> Corners<U> {
        Corners {
            typ: self.typ.map(&f),
            min: self.min.map(&f),
            max: self.max.map(&f),
        }
    }
}

impl Corners<f64> {
    /// Element-wise subtraction; an unset operand on either side leaves the
    /// result unset. Used for the enable-based driver/clamp separation.
    pub fn sub(&self, rhs: &Corners<f64>) -> Corners<f64> {
        Corners {
            typ: zip_sub(self.typ, rhs.typ),
            min: zip_sub(self.min, rhs.min),
            max: zip_sub(self.max, rhs.max),
        }
    }
}

fn zip_sub(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a - b),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inherit_fills_only_unset() {
        let mut child = Corners {
            typ: Some(3.3),
            min: None,
            max: None,
        };
        let parent = Corners::new(5.0, 4.5, 5.5);
        child.inherit(&parent);
        assert_eq!(child.typ, Some(3.3));
        assert_eq!(child.min, Some(4.5));
        assert_eq!(child.max, Some(5.5));
    }

    #[test]
    fn test_inherit_idempotent() {
        let mut c = Corners::from_typ(1.8);
        let parent = Corners::new(3.3, 3.0, 3.6);
        c.inherit(&parent);
        let once = c;
        c.inherit(&parent);
        assert_eq!(c, once);
    }

    #[test]
    fn test_sub_propagates_unset() {
        let a = Corners::new(1.0, 2.0, 3.0);
        let b = Corners {
            typ: Some(0.5),
            min: None,
            max: Some(1.0),
        };
        let d = a.sub(&b);
        assert_eq!(d.typ, Some(0.5));
        assert_eq!(d.min, None);
        assert_eq!(d.max, Some(2.0));
    }
}
