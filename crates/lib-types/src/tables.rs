//! Tabular characterization data: V/I tables, V/T waveforms, ramp records.

use crate::constants::MAX_TABLE_SIZE;
use crate::corners::{Corner, Corners};
use serde::{Deserialize, Serialize};

/// One row of a V/I table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ViPoint {
    pub v: f64,
    pub i: Corners<f64>,
}

/// A voltage/current table, monotonic in `v` once finalized.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ViTable {
    pub points: Vec<ViPoint>,
}

impl ViTable {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            points: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn push(&mut self, v: f64, i: Corners<f64>) {
        self.points.push(ViPoint { v, i });
    }

    /// True when voltage strictly increases row to row.
    pub fn is_monotonic(&self) -> bool {
        self.points.windows(2).all(|w| w[0].v < w[1].v)
    }

    /// Element-wise current subtraction against `other`, matched by row
    /// index. An unset corner on either side leaves the result unset.
    /// Tables of unequal length are truncated to the shorter one.
    pub fn subtract(&mut self, other: &ViTable) {
        let n = self.points.len().min(other.points.len());
        for k in 0..n {
            let d = other.points[k].i;
            self.points[k].i = self.points[k].i.sub(&d);
        }
        self.points.truncate(n);
    }

    /// Derive min/max columns from typ by scaling with `pct` percent, but
    /// only where the explicit corner is missing.
    pub fn derate(&mut self, pct: f64) {
        if pct == 0.0 {
            return;
        }
        let scale = pct / 100.0;
        for p in &mut self.points {
            if let Some(typ) = p.i.typ {
                if p.i.min.is_none() {
                    p.i.min = Some(typ - typ.abs() * scale);
                }
                if p.i.max.is_none() {
                    p.i.max = Some(typ + typ.abs() * scale);
                }
            }
        }
    }

    /// Zero out clamp currents whose magnitude sits below `tol`.
    pub fn suppress_below(&mut self, tol: f64) {
        if tol <= 0.0 {
            return;
        }
        for p in &mut self.points {
            p.i = p.i.map(|i| if i.abs() < tol { 0.0 } else { i });
        }
    }

    /// Decimate to at most `cap` rows, always keeping the first and last.
    pub fn decimate(&mut self, cap: usize) {
        let cap = cap.min(MAX_TABLE_SIZE);
        if self.points.len() <= cap {
            return;
        }
        if cap < 2 {
            self.points.truncate(cap);
            return;
        }
        let last = self.points.len() - 1;
        let mut kept = Vec::with_capacity(cap);
        for k in 0..cap {
            let idx = (k as f64 * last as f64 / (cap - 1) as f64).round() as usize;
            kept.push(self.points[idx]);
        }
        self.points = kept;
    }

    /// Linear interpolation of the current at `voltage` for one corner.
    /// Clamps to the end points outside the table range.
    pub fn current_at(&self, voltage: f64, corner: Corner) -> Option<f64> {
        let first = self.points.first()?;
        if voltage <= first.v {
            return first.i.get(corner);
        }
        let last = self.points.last()?;
        if voltage >= last.v {
            return last.i.get(corner);
        }
        let idx = self.points.partition_point(|p| p.v < voltage);
        let (lo, hi) = (&self.points[idx - 1], &self.points[idx]);
        let frac = (voltage - lo.v) / (hi.v - lo.v);
        match (lo.i.get(corner), hi.i.get(corner)) {
            (Some(a), Some(b)) => Some(a + frac * (b - a)),
            _ => None,
        }
    }
}

/// One row of a V/T waveform table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WavePoint {
    pub t: f64,
    pub v: Corners<f64>,
}

/// External network a waveform is characterized into.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub r_fixture: f64,
    pub v_fixture: Corners<f64>,
    pub l_fixture: Option<f64>,
    pub c_fixture: Option<f64>,
    pub r_dut: Option<f64>,
    pub l_dut: Option<f64>,
    pub c_dut: Option<f64>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            r_fixture: crate::constants::RLOAD_DEFAULT,
            v_fixture: Corners::from_typ(0.0),
            l_fixture: None,
            c_fixture: None,
            r_dut: None,
            l_dut: None,
            c_dut: None,
        }
    }
}

/// A binned V/T waveform table with its fixture.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WaveTable {
    pub fixture: Fixture,
    pub points: Vec<WavePoint>,
}

impl WaveTable {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True when time strictly increases row to row.
    pub fn is_monotonic(&self) -> bool {
        self.points.windows(2).all(|w| w[0].t < w[1].t)
    }
}

/// The 20–80 % edge-rate record: numerator and denominator are kept apart so
/// that derating can widen dt without touching dV.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ramp {
    pub dv_rise: Corners<f64>,
    pub dt_rise: Corners<f64>,
    pub dv_fall: Corners<f64>,
    pub dt_fall: Corners<f64>,
    pub r_load: f64,
}

impl Ramp {
    /// dV/dt for the rising edge, if both parts of the corner are present.
    pub fn rise_rate(&self, corner: Corner) -> Option<f64> {
        rate(self.dv_rise.get(corner), self.dt_rise.get(corner))
    }

    /// dV/dt for the falling edge, if both parts of the corner are present.
    pub fn fall_rate(&self, corner: Corner) -> Option<f64> {
        rate(self.dv_fall.get(corner), self.dt_fall.get(corner))
    }

    pub fn has_rise(&self) -> bool {
        self.dv_rise.typ.is_some()
    }

    pub fn has_fall(&self) -> bool {
        self.dv_fall.typ.is_some()
    }
}

fn rate(dv: Option<f64>, dt: Option<f64>) -> Option<f64> {
    match (dv, dt) {
        (Some(dv), Some(dt)) if dt != 0.0 => Some(dv / dt),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(f64, f64)]) -> ViTable {
        let mut t = ViTable::default();
        for &(v, i) in rows {
            t.push(v, Corners::from_typ(i));
        }
        t
    }

    #[test]
    fn test_monotonic() {
        assert!(table(&[(0.0, 0.0), (0.5, 1.0), (1.0, 2.0)]).is_monotonic());
        assert!(!table(&[(0.0, 0.0), (0.0, 1.0)]).is_monotonic());
    }

    #[test]
    fn test_subtract_truncates_and_poisons() {
        let mut a = table(&[(0.0, 5.0), (1.0, 6.0), (2.0, 7.0)]);
        let mut b = table(&[(0.0, 1.0), (1.0, 1.0)]);
        b.points[1].i.typ = None;
        a.subtract(&b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.points[0].i.typ, Some(4.0));
        assert_eq!(a.points[1].i.typ, None);
    }

    #[test]
    fn test_decimate_keeps_endpoints() {
        let mut t = ViTable::default();
        for k in 0..250 {
            t.push(k as f64 * 0.01, Corners::from_typ(k as f64));
        }
        t.decimate(MAX_TABLE_SIZE);
        assert_eq!(t.len(), MAX_TABLE_SIZE);
        assert_eq!(t.points[0].v, 0.0);
        assert!((t.points[99].v - 2.49).abs() < 1e-12);
        assert!(t.is_monotonic());
    }

    #[test]
    fn test_current_at_interpolates() {
        let t = table(&[(0.0, 0.0), (1.0, 2.0)]);
        assert_eq!(t.current_at(0.5, Corner::Typ), Some(1.0));
        assert_eq!(t.current_at(-1.0, Corner::Typ), Some(0.0));
        assert_eq!(t.current_at(5.0, Corner::Typ), Some(2.0));
    }

    #[test]
    fn test_derate_only_fills_missing() {
        let mut t = table(&[(0.0, 10.0)]);
        t.points[0].i.min = Some(9.9);
        t.derate(10.0);
        assert_eq!(t.points[0].i.min, Some(9.9));
        assert_eq!(t.points[0].i.max, Some(11.0));
    }

    #[test]
    fn test_ramp_rate_requires_both_parts() {
        let mut r = Ramp::default();
        assert_eq!(r.rise_rate(Corner::Typ), None);
        r.dv_rise.typ = Some(2.0);
        r.dt_rise.typ = Some(1e-9);
        assert_eq!(r.rise_rate(Corner::Typ), Some(2.0e9));
    }
}
