//! Curve derivation: raw simulator data into emission-ready IBIS tables.
//!
//! This stage owns the enable-based subtraction, the Vcc-relative table
//! transforms the IBIS grammar wants, clamp-tolerance suppression, derating,
//! the 20–80 % ramp measurement, and transient binning into fixed-count
//! waveform tables.

use crate::error::DeriveError;
use lib_spice::{DcPoint, TranPoint};
use lib_types::{Corner, Corners, CurveType, ViTable, WavePoint, WaveTable, MAX_TABLE_SIZE};

/// Merge one corner's DC sweep into the raw accumulation table. The first
/// corner to arrive defines the voltage column; later corners fill their
/// current column row by row.
pub fn merge_dc_corner(table: &mut ViTable, points: &[DcPoint], corner: Corner) {
    if table.is_empty() {
        for p in points {
            let mut i = Corners::default();
            i.set(corner, p.i);
            table.push(p.v, i);
        }
        return;
    }
    let n = table.len().min(points.len());
    for k in 0..n {
        table.points[k].i.set(corner, points[k].i);
    }
    if points.len() != table.len() {
        tracing::warn!(
            expected = table.len(),
            got = points.len(),
            %corner,
            "corner sweep length mismatch, truncating to shorter"
        );
    }
}

/// `enabled - disabled`, row by row. Any unset corner on either side leaves
/// the result unset, so a failed disabled corner poisons only itself.
pub fn subtract_disabled(enabled: &mut ViTable, disabled: &ViTable) {
    enabled.subtract(disabled);
}

/// Normalize a raw sweep into the emission-ready form for its curve type,
/// then derate, suppress, and decimate. Pullup-side tables are rewritten
/// Vcc-relative (`V' = Vcc_typ - V`) and reversed so voltage increases.
pub fn finalize_vi(
    curve: CurveType,
    mut raw: ViTable,
    vcc_typ: f64,
    clamp_tol: f64,
    derate_vi_pct: f64,
) -> Result<ViTable, DeriveError> {
    if raw.is_empty() {
        return Err(DeriveError::EmptyResult);
    }

    match curve {
        CurveType::Pullup | CurveType::DisabledPullup | CurveType::SeriesVi => {
            for p in &mut raw.points {
                p.v = vcc_typ - p.v;
            }
            raw.points.reverse();
        }
        CurveType::PowerClamp => {
            // Keep the pad-voltage region at and above the rail, expressed
            // Vcc-relative; reversal restores increasing order.
            raw.points.retain(|p| p.v >= vcc_typ - 1e-12);
            for p in &mut raw.points {
                p.v = vcc_typ - p.v;
            }
            raw.points.reverse();
        }
        CurveType::GndClamp => {
            raw.points.retain(|p| p.v <= vcc_typ + 1e-12);
        }
        _ => {}
    }

    if matches!(curve, CurveType::PowerClamp | CurveType::GndClamp) {
        raw.suppress_below(clamp_tol);
    }
    raw.derate(derate_vi_pct);
    raw.decimate(MAX_TABLE_SIZE);

    // Collapse duplicate sweep points before the monotonicity check.
    raw.points.dedup_by(|a, b| (a.v - b.v).abs() < 1e-12);
    if !raw.is_monotonic() {
        return Err(DeriveError::NonMonotonic { curve });
    }
    Ok(raw)
}

/// Measure the 20 %→80 % traversal of a transient edge. The thresholds come
/// from the expected total swing `v_start -> v_end` (the corner's rails), so
/// a weak driver or a too-short window that never reaches 80 % of the swing
/// is refused rather than silently reported. Returns `(dv, dt)` with `dv`
/// the magnitude of the 20–80 window and `dt` the crossing time.
pub fn extract_ramp(
    samples: &[TranPoint],
    v_start: f64,
    v_end: f64,
) -> Result<(f64, f64), DeriveError> {
    if samples.len() < 2 {
        return Err(DeriveError::EmptyResult);
    }
    let v20 = v_start + 0.2 * (v_end - v_start);
    let v80 = v_start + 0.8 * (v_end - v_start);
    let rising = v_end >= v_start;

    let crossed = |v: f64, threshold: f64| {
        if rising {
            v >= threshold
        } else {
            v <= threshold
        }
    };
    let mut t20 = None;
    let mut t80 = None;
    let (mut t_prev, mut v_prev) = (samples[0].t, samples[0].v);
    for s in &samples[1..] {
        if t20.is_none() && crossed(s.v, v20) {
            t20 = Some(lerp_time(t_prev, v_prev, s.t, s.v, v20));
        }
        if t80.is_none() && crossed(s.v, v80) {
            t80 = Some(lerp_time(t_prev, v_prev, s.t, s.v, v80));
        }
        t_prev = s.t;
        v_prev = s.v;
        if t20.is_some() && t80.is_some() {
            break;
        }
    }
    let t20 = t20.ok_or(DeriveError::RampNotCrossed { pct: 20 })?;
    let t80 = t80.ok_or(DeriveError::RampNotCrossed { pct: 80 })?;
    Ok(((v80 - v20).abs(), t80 - t20))
}

fn lerp_time(t1: f64, v1: f64, t2: f64, v2: f64, v: f64) -> f64 {
    if (v2 - v1).abs() < 1e-30 {
        return t2;
    }
    t1 + (v - v1) * (t2 - t1) / (v2 - v1)
}

/// Bin one corner's transient samples into a fixed-count waveform table.
///
/// The window `[0, sim_time]` splits into `bins` uniform slots; samples in a
/// slot are averaged, empty interior slots are linearly interpolated from
/// their filled neighbors, and edge slots clamp to the nearest value. The
/// final row is pinned to exactly `sim_time`.
pub fn bin_transient(
    samples: &[TranPoint],
    sim_time: f64,
    bins: usize,
    corner: Corner,
    wave: &mut WaveTable,
) -> Result<(), DeriveError> {
    if samples.is_empty() || bins < 2 || sim_time <= 0.0 {
        return Err(DeriveError::EmptyResult);
    }
    let bin_time = sim_time / (bins - 1) as f64;

    if wave.points.len() != bins {
        wave.points = (0..bins)
            .map(|k| WavePoint {
                t: if k == bins - 1 { sim_time } else { k as f64 * bin_time },
                v: Corners::default(),
            })
            .collect();
    }

    let mut sums = vec![0.0f64; bins];
    let mut counts = vec![0usize; bins];
    for s in samples {
        if s.t < 0.0 {
            continue;
        }
        let bin = ((s.t / bin_time).round() as usize).min(bins - 1);
        sums[bin] += s.v;
        counts[bin] += 1;
    }

    let mut values: Vec<Option<f64>> = (0..bins)
        .map(|k| (counts[k] > 0).then(|| sums[k] / counts[k] as f64))
        .collect();

    let first_filled = values.iter().position(Option::is_some).ok_or(DeriveError::EmptyResult)?;
    let last_filled = values.iter().rposition(Option::is_some).expect("nonempty");
    for v in values.iter_mut().take(first_filled) {
        *v = values_at(&sums, &counts, first_filled);
    }
    for v in values.iter_mut().skip(last_filled + 1) {
        *v = values_at(&sums, &counts, last_filled);
    }

    // Interior gaps: linear interpolation between the bracketing filled bins.
    let mut k = first_filled;
    while k <= last_filled {
        if values[k].is_some() {
            k += 1;
            continue;
        }
        let gap_start = k;
        let mut gap_end = k;
        while values[gap_end].is_none() {
            gap_end += 1;
        }
        let lo = values[gap_start - 1].expect("filled");
        let hi = values[gap_end].expect("filled");
        let span = (gap_end - gap_start + 1) as f64;
        for (offset, slot) in (gap_start..gap_end).enumerate() {
            let frac = (offset + 1) as f64 / span;
            values[slot] = Some(lo + frac * (hi - lo));
        }
        k = gap_end + 1;
    }

    for (slot, value) in values.into_iter().enumerate() {
        wave.points[slot].v.set(corner, value.expect("all bins filled"));
    }
    Ok(())
}

fn values_at(sums: &[f64], counts: &[usize], idx: usize) -> Option<f64> {
    (counts[idx] > 0).then(|| sums[idx] / counts[idx] as f64)
}

/// Widen the min/max ramp dt by `pct` percent when explicit corner runs are
/// unavailable; typ is never touched.
pub fn derate_ramp(dt: &mut Corners<f64>, pct: f64) {
    if pct == 0.0 {
        return;
    }
    if let Some(typ) = dt.typ {
        if dt.min.is_none() {
            dt.min = Some(typ * (1.0 - pct / 100.0));
        }
        if dt.max.is_none() {
            dt.max = Some(typ * (1.0 + pct / 100.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dc(points: &[(f64, f64)]) -> Vec<DcPoint> {
        points.iter().map(|&(v, i)| DcPoint { v, i }).collect()
    }

    fn tran(points: &[(f64, f64)]) -> Vec<TranPoint> {
        points.iter().map(|&(t, v)| TranPoint { t, v, i: None }).collect()
    }

    #[test]
    fn test_merge_corners_fills_columns() {
        let mut table = ViTable::default();
        merge_dc_corner(&mut table, &dc(&[(0.0, 1.0), (0.1, 2.0)]), Corner::Typ);
        merge_dc_corner(&mut table, &dc(&[(0.0, 0.9), (0.1, 1.8)]), Corner::Min);
        assert_eq!(table.points[1].i.typ, Some(2.0));
        assert_eq!(table.points[1].i.min, Some(1.8));
        assert_eq!(table.points[1].i.max, None);
    }

    #[test]
    fn test_finalize_pullup_is_vcc_relative_and_monotonic() {
        let mut raw = ViTable::default();
        // swept pad voltage -3.3 .. 6.6
        merge_dc_corner(
            &mut raw,
            &dc(&[(-3.3, 0.5), (0.0, 0.2), (3.3, 0.0), (6.6, -0.4)]),
            Corner::Typ,
        );
        let table = finalize_vi(CurveType::Pullup, raw, 3.3, 0.0, 0.0).unwrap();
        assert!(table.is_monotonic());
        assert_eq!(table.points[0].v, 3.3 - 6.6);
        assert_eq!(table.points.last().unwrap().v, 3.3 - -3.3);
    }

    #[test]
    fn test_finalize_gnd_clamp_truncates_above_rail() {
        let mut raw = ViTable::default();
        merge_dc_corner(
            &mut raw,
            &dc(&[(-3.3, -0.8), (0.0, 0.0), (3.3, 0.0), (6.6, 0.9)]),
            Corner::Typ,
        );
        let table = finalize_vi(CurveType::GndClamp, raw, 3.3, 0.0, 0.0).unwrap();
        assert!(table.points.iter().all(|p| p.v <= 3.3 + 1e-12));
    }

    #[test]
    fn test_clamp_tolerance_zeroes_small_currents() {
        let mut raw = ViTable::default();
        merge_dc_corner(&mut raw, &dc(&[(-1.0, -0.5), (0.0, 1e-9), (1.0, 2e-3)]), Corner::Typ);
        let table = finalize_vi(CurveType::GndClamp, raw, 3.3, 1e-6, 0.0).unwrap();
        assert_eq!(table.points[1].i.typ, Some(0.0));
        assert_eq!(table.points[2].i.typ, Some(2e-3));
    }

    #[test]
    fn test_extract_ramp_20_80() {
        // linear ramp 0 -> 1 V over 1 ns: 20-80 window is 0.6 V in 0.6 ns
        let samples = tran(&[(0.0, 0.0), (0.5e-9, 0.5), (1.0e-9, 1.0)]);
        let (dv, dt) = extract_ramp(&samples, 0.0, 1.0).unwrap();
        assert!((dv - 0.6).abs() < 1e-12);
        assert!((dt - 0.6e-9).abs() < 1e-21);
    }

    #[test]
    fn test_extract_ramp_falling() {
        let samples = tran(&[(0.0, 3.3), (1.0e-9, 0.0)]);
        let (dv, dt) = extract_ramp(&samples, 3.3, 0.0).unwrap();
        assert!((dv - 1.98).abs() < 1e-9);
        assert!(dt > 0.0);
    }

    #[test]
    fn test_extract_ramp_refuses_unfinished_edge() {
        // stalls at 50% of the expected 0..1 V swing
        let samples = tran(&[(0.0, 0.0), (0.4e-9, 0.5), (1.0e-9, 0.5)]);
        assert!(matches!(
            extract_ramp(&samples, 0.0, 1.0),
            Err(DeriveError::RampNotCrossed { pct: 80 })
        ));
    }

    #[test]
    fn test_bin_transient_counts_and_endpoints() {
        let sim_time = 1.0e-9;
        let bins = 100;
        // sparse samples: 10% of bins filled
        let samples: Vec<TranPoint> = (0..10)
            .map(|k| TranPoint {
                t: k as f64 * sim_time / 9.0,
                v: k as f64 * 0.1,
                i: None,
            })
            .collect();
        let mut wave = WaveTable::default();
        bin_transient(&samples, sim_time, bins, Corner::Typ, &mut wave).unwrap();
        assert_eq!(wave.len(), bins);
        assert_eq!(wave.points[0].t, 0.0);
        assert_eq!(wave.points[bins - 1].t, sim_time);
        assert!(wave.is_monotonic());
        // every bin filled after interpolation
        assert!(wave.points.iter().all(|p| p.v.typ.is_some()));
        // interpolation is monotone for a monotone edge
        let vals: Vec<f64> = wave.points.iter().map(|p| p.v.typ.unwrap()).collect();
        assert!(vals.windows(2).all(|w| w[1] >= w[0] - 1e-12));
    }

    #[test]
    fn test_bin_transient_multiple_corners_share_time_axis() {
        let sim_time = 1.0e-9;
        let mut wave = WaveTable::default();
        let samples = tran(&[(0.0, 0.0), (0.5e-9, 0.6), (1.0e-9, 1.0)]);
        bin_transient(&samples, sim_time, 100, Corner::Typ, &mut wave).unwrap();
        bin_transient(&samples, sim_time, 100, Corner::Max, &mut wave).unwrap();
        assert!(wave.points.iter().all(|p| p.v.typ.is_some() && p.v.max.is_some()));
    }

    #[test]
    fn test_derate_ramp_fills_only_missing() {
        let mut dt = Corners::from_typ(1.0e-9);
        derate_ramp(&mut dt, 10.0);
        assert!((dt.min.unwrap() - 0.9e-9).abs() < 1e-21);
        assert!((dt.max.unwrap() - 1.1e-9).abs() < 1e-21);

        let mut dt2 = Corners::new(1.0e-9, 0.8e-9, 1.2e-9);
        derate_ramp(&mut dt2, 10.0);
        assert_eq!(dt2.min, Some(0.8e-9));
    }
}
