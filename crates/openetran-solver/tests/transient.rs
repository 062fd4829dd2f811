//! End-to-end transient scenarios on small systems with known answers.

use openetran_core::CFKONST;
use openetran_parser::parse_deck;
use openetran_solver::{MeterInfo, SampleSink, Simulation};

/// Records every sample row for later inspection.
#[derive(Default)]
struct TraceSink {
    names: Vec<String>,
    rows: Vec<(f64, Vec<f64>)>,
}

impl SampleSink for TraceSink {
    fn begin(&mut self, meters: &[MeterInfo], _dt: f64, _tmax: f64) {
        self.names = meters.iter().map(|m| m.text_name.clone()).collect();
        self.rows.clear();
    }
    fn sample(&mut self, t: f64, values: &[f64]) {
        self.rows.push((t, values.to_vec()));
    }
    fn finish(&mut self, _t: f64, _step: usize) {}
}

fn build(deck: &str) -> Simulation {
    Simulation::build(&parse_deck(deck).unwrap()).unwrap()
}

const MATCHED_POLE: &str = "\
* single phase, single pole, 300 ohm, matched both ends
1 1 300.0 1 1 5.0e-9 5.0e-5
cable 1 300.0 3.0e8 0.0
end
surge 10.0e3 1.2e-6 50.0e-6 0.0
pairs 1 0
poles 1
meter 0
pairs 1 0
poles 1
";

#[test]
fn matched_pole_peaks_at_half_surge_impedance() {
    let mut sim = build(MATCHED_POLE);
    let mut trace = TraceSink::default();
    sim.run(Some(&mut trace)).unwrap();
    assert_eq!(trace.names, vec!["P1:1-0".to_string()]);

    let (mut vpk, mut tpk) = (0.0f64, 0.0f64);
    for (t, row) in &trace.rows {
        if row[0].abs() > vpk.abs() {
            vpk = row[0];
            tpk = *t;
        }
    }
    // V = 0.5 * Zs * Ipk into the two matched terminations
    let expect = 0.5 * 300.0 * 10.0e3;
    assert!((vpk - expect).abs() / expect < 0.01, "vpk = {vpk}");
    // the 1-cosine front crests half a front-constant after onset
    let crest = 0.5 * CFKONST * 1.2e-6;
    assert!((tpk - crest).abs() <= 5.0e-9 + 1e-15, "tpk = {tpk}");
}

const CLAMPED_POLE: &str = "\
1 1 300.0 1 1 5.0e-9 4.0e-4
cable 1 300.0 3.0e8 0.0
end
surge 10.0e3 1.2e-6 50.0e-6 0.0
pairs 1 0
poles 1
arrester 40.0e3 30.0e3 1.0 0.0 0.0
pairs 1 0
poles 1
meter 0
pairs 1 0
poles 1
";

#[test]
fn arrester_clamps_front_and_releases_on_tail() {
    let mut sim = build(CLAMPED_POLE);
    let mut trace = TraceSink::default();
    let answers = sim.run(Some(&mut trace)).unwrap();

    let vpk = trace
        .rows
        .iter()
        .map(|(_, row)| row[0])
        .fold(0.0f64, |a, v| if v.abs() > a.abs() { v } else { a });
    // clamped to the gap sparkover level, far below the 1.5 MV open value
    assert!(vpk > 39.0e3 && vpk < 42.0e3, "vpk = {vpk}");

    // while conducting on the tail the voltage sags toward the knee, then
    // the arrester clears and the bare tail rides below 30 kV
    assert!(!sim.arresters[0].conducting);
    let late_peak = trace
        .rows
        .iter()
        .filter(|(t, _)| *t > 280.0e-6)
        .map(|(_, row)| row[0].abs())
        .fold(0.0f64, f64::max);
    assert!(late_peak < 30.0e3 * 1.01, "late_peak = {late_peak}");
    assert!(late_peak > 5.0e3, "late_peak = {late_peak}");

    assert!(answers.energy > 0.0);
    assert!(answers.charge > 0.0);
    assert!(answers.current > 5.0e3, "current = {}", answers.current);
}

#[test]
fn arrester_below_gap_is_invisible() {
    // raise the gap far above the surge: voltages must match the bare pole
    let with_arr = "\
1 1 300.0 1 1 5.0e-9 5.0e-5
cable 1 300.0 3.0e8 0.0
end
surge 10.0e3 1.2e-6 50.0e-6 0.0
pairs 1 0
poles 1
arrester 5.0e6 4.0e6 1.0 0.0 0.0
pairs 1 0
poles 1
meter 0
pairs 1 0
poles 1
";
    let mut bare = build(MATCHED_POLE);
    let mut trace_bare = TraceSink::default();
    bare.run(Some(&mut trace_bare)).unwrap();

    let mut armed = build(with_arr);
    let mut trace_armed = TraceSink::default();
    armed.run(Some(&mut trace_armed)).unwrap();

    assert_eq!(trace_bare.rows.len(), trace_armed.rows.len());
    for ((_, a), (_, b)) in trace_bare.rows.iter().zip(trace_armed.rows.iter()) {
        assert!((a[0] - b[0]).abs() <= 1e-9 * a[0].abs().max(1.0));
    }
    assert!(!armed.arresters[0].conducting);
}

const TWO_POLE_WAVE: &str = "\
* travelling wave: 2 poles, 300 m span, matched both ends
1 2 300.0 1 1 5.0e-9 1.0e-5
cable 1 300.0 3.0e8 0.0
end
surge 1.0e3 0.2e-6 0.5e-6 0.0
pairs 1 0
poles 1
meter 0
pairs 1 0
poles 1 2
";

#[test]
fn travelling_wave_arrives_after_transit_and_is_absorbed() {
    let mut sim = build(TWO_POLE_WAVE);
    let transit_steps = (300.0f64 / 3.0e8 / 5.0e-9).round() as usize;
    let mut trace = TraceSink::default();
    sim.run(Some(&mut trace)).unwrap();

    let v1_peak = trace
        .rows
        .iter()
        .map(|(_, r)| r[0].abs())
        .fold(0.0f64, f64::max);
    // quiet at the far end before one transit time
    for (_, row) in trace.rows.iter().take(transit_steps - 1) {
        assert!(row[1].abs() < 1e-6 * v1_peak, "early arrival: {}", row[1]);
    }
    // the wave reappears with unit transmission into the matched end
    let v2_peak = trace
        .rows
        .iter()
        .map(|(_, r)| r[1].abs())
        .fold(0.0f64, f64::max);
    assert!((v2_peak - v1_peak).abs() / v1_peak < 0.01);
    // the shifted waveforms line up sample for sample
    for k in 0..trace.rows.len() - transit_steps {
        let v1 = trace.rows[k].1[0];
        let v2 = trace.rows[k + transit_steps].1[1];
        assert!(
            (v1 - v2).abs() <= 1e-6 * v1_peak,
            "mismatch at sample {k}: {v1} vs {v2}"
        );
    }
    // matched terminations: after the surge dies everything settles
    let residual = trace
        .rows
        .iter()
        .rev()
        .take(10)
        .map(|(_, r)| r[0].abs().max(r[1].abs()))
        .fold(0.0f64, f64::max);
    assert!(residual < 1e-6 * v1_peak, "residual ring {residual}");
}

#[test]
fn reset_reproduces_bitwise_identical_runs() {
    let mut sim = build(CLAMPED_POLE);
    let mut first = TraceSink::default();
    sim.run(Some(&mut first)).unwrap();
    sim.reset().unwrap();
    let mut second = TraceSink::default();
    sim.run(Some(&mut second)).unwrap();

    assert_eq!(first.rows.len(), second.rows.len());
    for ((t1, a), (t2, b)) in first.rows.iter().zip(second.rows.iter()) {
        assert_eq!(t1.to_bits(), t2.to_bits());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.to_bits(), y.to_bits(), "sample diverged at t = {t1}");
        }
    }
}

const INSULATED_POLE: &str = "\
1 1 300.0 1 1 5.0e-9 5.0e-5
cable 1 300.0 3.0e8 0.0
end
surge 10.0e3 1.2e-6 50.0e-6 0.0
pairs 1 0
poles 1
insulator 100.0e3 400.0e3 1.0 0.5
pairs 1 0
poles 1
meter 0
pairs 1 0
poles 1
";

#[test]
fn insulator_flashover_halts_when_enabled() {
    let mut sim = build(INSULATED_POLE);
    sim.flash_halt_enabled = true;
    let answers = sim.run(None).unwrap();
    assert_eq!(answers.si, 1.0);
    // halted well before Tmax
    assert!(sim.t < 40.0e-6, "ran to t = {}", sim.t);
    assert!(sim.insulators[0].flashed);
    assert!(sim.insulators[0].t_flash > 0.0);
}

#[test]
fn severity_index_scales_below_flashover() {
    // a weak stroke stresses the insulator without flashing it
    let weak = INSULATED_POLE.replace("surge 10.0e3", "surge 3.0e3");
    let mut sim = build(&weak);
    let answers = sim.run(None).unwrap();
    assert!(answers.si > 0.0 && answers.si < 1.0, "si = {}", answers.si);
    assert!(!sim.insulators[0].flashed);
}

const SECOND_DT: &str = "\
2dt 1 1 300.0 1 1 5.0e-9 2.0e-4 2.0e-5
cable 1 300.0 3.0e8 0.0
end
surge 10.0e3 1.2e-6 50.0e-6 0.0
pairs 1 0
poles 1
ground 10.0 100.0 400.0e3 1.0e-6 3.0
pairs 1 0
poles 1
inductor 50.0 1.0e-2
pairs 1 0
poles 1
meter 0
pairs 1 0
poles 1
";

#[test]
fn second_dt_switch_keeps_histories_continuous() {
    let mut sim = build(SECOND_DT);
    assert!(sim.using_second_dt);
    let mut trace = TraceSink::default();
    sim.run(Some(&mut trace)).unwrap();
    assert!(sim.dt_switched);

    // find the switch: the first sample spaced by the second time step
    let mut switch_idx = None;
    for k in 1..trace.rows.len() {
        if trace.rows[k].0 - trace.rows[k - 1].0 > 5.0e-9 * 1.5 {
            switch_idx = Some(k);
            break;
        }
    }
    let k = switch_idx.expect("the time step never switched");
    let v_before = trace.rows[k - 1].1[0];
    let v_after = trace.rows[k].1[0];
    // the tail decays a percent and a half per long step; anything beyond
    // a few percent is a history discontinuity
    assert!(
        (v_after - v_before).abs() < 0.05 * v_before.abs(),
        "jump across the switch: {v_before} -> {v_after}"
    );

    // cross-check the long-step tail against an unswitched run
    let plain = "\
1 1 300.0 1 1 5.0e-9 6.0e-5
cable 1 300.0 3.0e8 0.0
end
surge 10.0e3 1.2e-6 50.0e-6 0.0
pairs 1 0
poles 1
ground 10.0 100.0 400.0e3 1.0e-6 3.0
pairs 1 0
poles 1
inductor 50.0 1.0e-2
pairs 1 0
poles 1
meter 0
pairs 1 0
poles 1
";
    let mut ref_sim = build(plain);
    let mut ref_trace = TraceSink::default();
    ref_sim.run(Some(&mut ref_trace)).unwrap();

    let probe = 40.0e-6;
    let v_switched = sample_at(&trace, probe);
    let v_reference = sample_at(&ref_trace, probe);
    assert!(
        (v_switched - v_reference).abs() / v_reference.abs() < 0.03,
        "switched {v_switched} vs reference {v_reference}"
    );
}

fn sample_at(trace: &TraceSink, t: f64) -> f64 {
    trace
        .rows
        .iter()
        .min_by(|a, b| {
            (a.0 - t)
                .abs()
                .partial_cmp(&(b.0 - t).abs())
                .unwrap()
        })
        .map(|(_, r)| r[0])
        .unwrap()
}

#[test]
fn severity_index_is_monotone_in_stroke_current() {
    let mut sim = build(INSULATED_POLE);
    sim.flash_halt_enabled = true;
    let mut last_si = -1.0;
    for i_pk in [2.0e3, 3.0e3, 4.0e3, 6.0e3, 10.0e3] {
        sim.reset().unwrap();
        sim.surges[0].move_to(0, 1, 0, i_pk, 1.2e-6, 50.0e-6, 0.0);
        let answers = sim.run(None).unwrap();
        assert!(
            answers.si >= last_si - 1e-12,
            "SI fell from {last_si} to {} at {i_pk} A",
            answers.si
        );
        last_si = answers.si;
    }
    assert!(last_si >= 1.0);
}
