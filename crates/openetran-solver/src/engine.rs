//! The transient simulation engine.
//!
//! One `Simulation` owns the poles, lines, spans, every device arena, and
//! the clock; there is no global state, so "reset" really does produce
//! the run it claims to. The per-step dispatch order is an invariant:
//! zero injections, inject sources and histories, factor dirty poles,
//! solve, re-check the switching devices (looping back into the same step
//! after any Ybus edit), then update histories and instrumentation, and
//! finally advance the clock.

use openetran_core::error::{Error, Result};
use openetran_core::Pole;
use openetran_devices::{
    ArrBez, Arrester, Capacitor, Customer, DcSource, Ground, Inductor, Insulator, Lpm, Meter,
    MeterKind, Monitor, PipeGap, Resistor, SteepFront, Surge, Transformer,
};

use crate::compensation::{solve_pole_nonlinear, NrStats};
use crate::line::Line;
use crate::plot::{MeterInfo, SampleSink};
use crate::span::Span;

/// Aggregate outputs of one transient run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Answers {
    /// Highest insulator severity index.
    pub si: f64,
    /// Highest arrester discharge energy.
    pub energy: f64,
    /// Highest arrester discharge current.
    pub current: f64,
    /// Highest arrester charge.
    pub charge: f64,
    /// Highest pipe-gap predischarge current.
    pub predischarge: f64,
}

pub struct Simulation {
    pub nodes: usize,
    pub conductors: usize,
    pub num_poles: usize,
    pub network: bool,
    /// More than one span definition forces the per-line modal path.
    pub multiple_span_defns: bool,

    pub dt: f64,
    /// Stop time, already padded by half a step so the last step runs.
    pub tmax: f64,
    pub t: f64,
    pub step: usize,

    pub spans: Vec<Span>,
    pub poles: Vec<Pole>,
    pub lines: Vec<Line>,

    pub grounds: Vec<Ground>,
    pub resistors: Vec<Resistor>,
    pub inductors: Vec<Inductor>,
    pub capacitors: Vec<Capacitor>,
    pub transformers: Vec<Transformer>,
    pub customers: Vec<Customer>,
    pub insulators: Vec<Insulator>,
    pub lpms: Vec<Lpm>,
    pub arresters: Vec<Arrester>,
    pub arrbezs: Vec<ArrBez>,
    pub pipegaps: Vec<PipeGap>,
    pub surges: Vec<Surge>,
    pub steepfronts: Vec<SteepFront>,
    pub sources: Vec<DcSource>,
    pub meters: Vec<Meter>,
    pub monitors: Vec<Monitor>,

    /// Per-pole arrbez arena indices, in the pole's port order.
    pub pole_ports: Vec<Vec<usize>>,

    /// Initial dc voltages across the storage branches, for history
    /// reseeding on reset.
    pub inductor_vdc: Vec<f64>,
    pub transformer_vdc: Vec<f64>,
    pub capacitor_vdc: Vec<f64>,

    pub pole_labels: Vec<String>,
    pub phase_labels: Vec<String>,

    pub flash_halt_enabled: bool,
    /// Solve the severity index by bisection rather than estimate.
    pub want_si_calculation: bool,
    pub(crate) flash_halt: bool,

    pub using_second_dt: bool,
    pub first_dt: f64,
    pub second_dt: f64,
    pub dt_switch_time: f64,
    pub dt_switched: bool,

    pub nr_stats: NrStats,
}

/// Disjoint mutable references to two poles of the arena.
fn pair_mut(poles: &mut [Pole], a: usize, b: usize) -> (&mut Pole, &mut Pole) {
    assert!(a != b, "a line must join two distinct poles");
    if a < b {
        let (lo, hi) = poles.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = poles.split_at_mut(a);
        let (l, r) = (&mut hi[0], &mut lo[b]);
        (l, r)
    }
}

impl Simulation {
    /// Run one complete transient, from t = 0 to tmax or an early
    /// flashover halt.
    pub fn run(&mut self, mut sink: Option<&mut dyn SampleSink>) -> Result<Answers> {
        self.t = 0.0;
        self.step = 0;
        self.flash_halt = false;

        if sink.is_some() {
            // plot columns list voltages first, then currents
            self.meters.sort_by_key(|m| !m.kind.is_voltage());
        }
        self.link_monitors();
        if let Some(s) = sink.as_mut() {
            let infos = self.meter_infos();
            s.begin(&infos, self.dt, self.tmax);
        }

        loop {
            self.solve_step()?;
            self.update_after_solve();

            let values: Vec<f64> = self.meters.iter().map(|m| self.meter_value(m)).collect();
            for (m, v) in self.meters.iter_mut().zip(values.iter()) {
                m.record(*v);
            }
            if let Some(s) = sink.as_mut() {
                s.sample(self.t, &values);
            }
            for mon in &mut self.monitors {
                if mon.meter.is_some() {
                    let v = self.poles[mon.pole - 1].branch_voltage(mon.from, mon.to);
                    mon.record(self.step, v);
                }
            }

            if self.using_second_dt && !self.dt_switched && self.t >= self.dt_switch_time {
                self.change_time_step()?;
            }

            self.t += self.dt;
            self.step += 1;
            if !(self.t <= self.tmax && !self.flash_halt) {
                break;
            }
        }

        log::info!(
            "run finished at t = {:.6e} after {} steps, nr_iter = {}, nr_max = {}",
            self.t,
            self.step,
            self.nr_stats.total_iterations,
            self.nr_stats.max_iterations
        );

        let answers = self.answers_cleanup();
        for mon in &mut self.monitors {
            if let Some(mi) = mon.meter {
                mon.peak = self.meters[mi].peak;
            }
            if let Some(li) = mon.ins_lpm {
                mon.si = self.lpms[li].si;
            } else if let Some(ii) = mon.ins_de {
                mon.si = self.insulators[ii].si;
            }
        }
        if let Some(s) = sink.as_mut() {
            s.finish(self.t, self.step);
        }
        Ok(answers)
    }

    /// Solve one step, looping until no switching device edits the Ybus.
    fn solve_step(&mut self) -> Result<()> {
        for a in &mut self.arresters {
            a.transitions = 0;
        }
        for g in &mut self.pipegaps {
            g.transitions = 0;
        }

        loop {
            for pole in &mut self.poles {
                pole.zero_injection();
            }
            for s in &self.surges {
                s.inject(&mut self.poles[s.pole], self.t);
            }
            for s in &self.steepfronts {
                s.inject(&mut self.poles[s.pole], self.t);
            }
            for s in &self.sources {
                s.inject(&mut self.poles[s.pole]);
            }
            for g in &self.grounds {
                g.inject(&mut self.poles[g.pole]);
            }
            if self.multiple_span_defns {
                for line in &self.lines {
                    let (l, r) = pair_mut(&mut self.poles, line.left, line.right);
                    line.inject_iphase(&self.spans[line.span], l, r, self.step);
                }
            } else {
                for line in &self.lines {
                    let (l, r) = pair_mut(&mut self.poles, line.left, line.right);
                    line.inject_imode(l, r, self.step);
                }
                let span = &self.spans[0];
                for pole in &mut self.poles {
                    if pole.solve {
                        for row in 0..self.conductors {
                            let mut acc = 0.0;
                            for col in 0..self.conductors {
                                acc += span.ti[(row, col)] * pole.imode[col];
                            }
                            pole.injection[row + 1] += acc;
                        }
                    }
                }
            }
            for a in &self.arresters {
                a.inject(&mut self.poles[a.pole]);
            }
            for g in &self.pipegaps {
                g.inject(&mut self.poles[g.pole]);
            }
            for l in &self.inductors {
                l.inject(&mut self.poles[l.pole]);
            }
            for x in &self.transformers {
                x.inject(&mut self.poles[x.pole]);
            }
            for c in &self.capacitors {
                c.inject(&mut self.poles[c.pole]);
            }

            for pole in &mut self.poles {
                pole.triangulate()?;
            }
            for (pi, pole) in self.poles.iter_mut().enumerate() {
                pole.solve_linear()?;
                if !pole.ports.is_empty() {
                    solve_pole_nonlinear(
                        pole,
                        &self.pole_ports[pi],
                        &mut self.arrbezs,
                        &mut self.nr_stats,
                    )?;
                }
            }

            let mut changed = false;
            for a in &mut self.arresters {
                if a.check(&mut self.poles[a.pole], self.t, self.dt) {
                    changed = true;
                    if a.transitions > 1 {
                        return Err(Error::TransientStopped(format!(
                            "arrester at pole {} oscillates within one step",
                            a.pole + 1
                        )));
                    }
                }
            }
            for g in &mut self.pipegaps {
                if g.check(&mut self.poles[g.pole]) {
                    changed = true;
                    if g.transitions > 1 {
                        return Err(Error::TransientStopped(format!(
                            "pipegap at pole {} oscillates within one step",
                            g.pole + 1
                        )));
                    }
                }
            }
            if !changed {
                return Ok(());
            }
        }
    }

    /// History and state updates after a valid solution for this step.
    fn update_after_solve(&mut self) {
        for g in &mut self.grounds {
            g.check(&self.poles[g.pole]);
        }
        let mut flashed_now = false;
        for ins in &mut self.insulators {
            if ins.check(&mut self.poles[ins.pole], self.t, self.dt, self.dt_switched) {
                flashed_now = true;
            }
        }
        for lpm in &mut self.lpms {
            if lpm.check(&mut self.poles[lpm.pole], self.t, self.dt, self.step, self.dt_switched) {
                flashed_now = true;
            }
        }
        if flashed_now && self.flash_halt_enabled {
            self.flash_halt = true;
        }

        for l in &mut self.inductors {
            l.update(&self.poles[l.pole]);
        }
        for x in &mut self.transformers {
            x.update(&self.poles[x.pole]);
        }
        for a in &mut self.arresters {
            a.update_history();
        }
        for a in &mut self.arrbezs {
            a.update_history(&self.poles[a.pole], self.t, self.dt);
        }
        for c in &mut self.capacitors {
            c.update(&self.poles[c.pole]);
        }
        for c in &mut self.customers {
            let hg = self.grounds[c.ground].amps;
            c.update(&self.poles[c.pole], hg);
        }

        if self.multiple_span_defns {
            for line in &mut self.lines {
                let span = &self.spans[line.span];
                let (l, r) = pair_mut(&mut self.poles, line.left, line.right);
                line.update_vmode_and_history(span, l, r, self.step);
            }
        } else {
            let span = &self.spans[0];
            for pole in &mut self.poles {
                if pole.solve {
                    for row in 0..self.conductors {
                        let mut acc = 0.0;
                        for col in 0..self.conductors {
                            acc += span.tvt[(row, col)] * pole.voltage[col + 1];
                        }
                        pole.vmode[row] = acc;
                    }
                } else {
                    // travelling waves pass straight through
                    for i in 0..self.conductors {
                        pole.vmode[i] = pole.imode[i] * span.zm[(i, i)] * 0.5;
                    }
                }
            }
            for line in &mut self.lines {
                let span = &self.spans[line.span];
                let (vl, vr) = (&self.poles[line.left].vmode, &self.poles[line.right].vmode);
                line.update_history(span, vl, vr, self.step);
            }
        }
    }

    /// Final aggregation; also unwinds conducting stamps and flashover
    /// shorts so a subsequent reset starts from a clean Ybus.
    fn answers_cleanup(&mut self) -> Answers {
        let mut ans = Answers::default();
        for a in &mut self.arresters {
            a.answers_cleanup(&mut self.poles[a.pole]);
            if a.energy > ans.energy {
                ans.energy = a.energy;
            }
            if a.i_peak.abs() > ans.current.abs() {
                ans.current = a.i_peak;
            }
            if a.charge.abs() > ans.charge.abs() {
                ans.charge = a.charge;
            }
        }
        for g in &mut self.pipegaps {
            g.answers_cleanup(&mut self.poles[g.pole]);
            if g.i_peak.abs() > ans.predischarge.abs() {
                ans.predischarge = g.i_peak;
            }
        }
        for ins in &mut self.insulators {
            let si = ins.answers_cleanup(&mut self.poles[ins.pole]);
            if si.abs() > ans.si.abs() {
                ans.si = si;
            }
        }
        let (tmax, dt) = (self.tmax, self.dt);
        let want = self.want_si_calculation;
        for lpm in &mut self.lpms {
            let si = lpm.answers_cleanup(&mut self.poles[lpm.pole], want, tmax, dt);
            if si > ans.si {
                ans.si = si;
            }
        }
        for a in &mut self.arrbezs {
            if a.energy > ans.energy {
                ans.energy = a.energy;
            }
            if a.i_peak.abs() > ans.current.abs() {
                ans.current = a.i_peak;
            }
            if a.charge.abs() > ans.charge.abs() {
                ans.charge = a.charge;
            }
        }
        ans
    }

    /// Restore initial conditions so the next run is bit-identical to a
    /// fresh build.
    pub fn reset(&mut self) -> Result<()> {
        self.restore_time_step()?;
        for g in &mut self.grounds {
            g.reset();
        }
        for a in &mut self.arresters {
            a.reset();
        }
        let dt = self.dt;
        for a in &mut self.arrbezs {
            a.reset(dt);
        }
        for m in &mut self.meters {
            m.reset();
        }
        for i in &mut self.insulators {
            i.reset();
        }
        let (tmax, dt) = (self.tmax, self.dt);
        for l in &mut self.lpms {
            l.reset(tmax, dt);
        }
        for l in &mut self.inductors {
            l.reset();
        }
        for c in &mut self.customers {
            c.reset();
        }
        for c in &mut self.capacitors {
            c.reset();
        }
        for g in &mut self.pipegaps {
            g.reset();
        }
        for s in &mut self.spans {
            s.reset();
        }
        for line in &mut self.lines {
            line.init_history(&self.spans[line.span]);
        }
        for (i, l) in self.inductors.iter_mut().enumerate() {
            l.init_history(self.inductor_vdc[i])?;
        }
        for (i, x) in self.transformers.iter_mut().enumerate() {
            x.reset();
            x.init_history(self.transformer_vdc[i])?;
        }
        for (i, c) in self.capacitors.iter_mut().enumerate() {
            c.init_history(self.capacitor_vdc[i]);
        }
        for pole in &mut self.poles {
            pole.triangulate()?;
        }
        Ok(())
    }

    /// Switch to the second, longer time step for the slow tail.
    pub fn change_time_step(&mut self) -> Result<()> {
        let ratio_old_new = self.first_dt / self.second_dt;
        self.dt = self.second_dt;
        let dt = self.dt;

        for a in &mut self.arrbezs {
            a.change_dt(ratio_old_new);
        }
        for a in &mut self.arresters {
            a.change_dt(&mut self.poles[a.pole], dt);
        }
        for c in &mut self.capacitors {
            let dy = c.change_dt(ratio_old_new);
            self.poles[c.pole].add_y(c.from, c.to, dy);
        }
        for c in &mut self.customers {
            c.change_dt(1.0 / ratio_old_new);
        }
        for g in &mut self.grounds {
            let dy = g.change_dt(&self.poles[g.pole], dt);
            self.poles[g.pole].add_y(g.from, g.to, dy);
        }
        for l in &mut self.inductors {
            let dy = l.change_dt(&self.poles[l.pole], dt);
            self.poles[l.pole].add_y(l.from, l.to, dy);
        }
        for x in &mut self.transformers {
            let dy = x.change_dt(&self.poles[x.pole], dt);
            self.poles[x.pole].add_y(x.from, x.to, dy);
        }
        for line in &mut self.lines {
            line.collapse(self.step);
        }
        for pole in &mut self.poles {
            pole.triangulate()?;
        }
        self.dt_switched = true;
        Ok(())
    }

    /// Undo the second-dT switch; part of the full reset.
    pub fn restore_time_step(&mut self) -> Result<()> {
        if !self.dt_switched {
            return Ok(());
        }
        self.dt = self.first_dt;
        let ratio_new_old = self.second_dt / self.first_dt;
        let dt = self.dt;

        for a in &mut self.arrbezs {
            a.restore_dt(ratio_new_old);
        }
        for a in &mut self.arresters {
            a.restore_dt(dt);
        }
        for c in &mut self.capacitors {
            let dy = c.restore_dt(ratio_new_old);
            self.poles[c.pole].add_y(c.from, c.to, dy);
        }
        for c in &mut self.customers {
            c.change_dt(1.0 / ratio_new_old);
        }
        for g in &mut self.grounds {
            let dy = g.restore_dt(dt);
            self.poles[g.pole].add_y(g.from, g.to, dy);
        }
        for l in &mut self.inductors {
            let dy = l.restore_dt(dt);
            self.poles[l.pole].add_y(l.from, l.to, dy);
        }
        for x in &mut self.transformers {
            let dy = x.restore_dt(dt);
            self.poles[x.pole].add_y(x.from, x.to, dy);
        }
        for line in &mut self.lines {
            line.restore();
        }
        self.dt_switched = false;
        Ok(())
    }

    /// Current value of one meter.
    pub fn meter_value(&self, m: &Meter) -> f64 {
        match m.kind {
            MeterKind::Voltage => self.poles[m.pole - 1].branch_voltage(m.from, m.to),
            MeterKind::ArresterCurrent => self.arresters[m.target].amps,
            MeterKind::ArrbezCurrent => self.arrbezs[m.target].amps,
            MeterKind::GroundCurrent => self.grounds[m.target].amps,
            MeterKind::HouseGroundCurrent => self.grounds[self.customers[m.target].ground].amps,
            MeterKind::TransformerX2 => self.customers[m.target].ix2,
            MeterKind::PipegapCurrent => self.pipegaps[m.target].amps,
        }
    }

    pub fn meter_infos(&self) -> Vec<MeterInfo> {
        self.meters
            .iter()
            .map(|m| MeterInfo {
                kind: m.kind,
                pole: m.pole,
                from: m.from,
                to: m.to,
                pole_label: self.pole_labels[m.pole].clone(),
                from_label: self.phase_labels[m.from].clone(),
                to_label: self.phase_labels[m.to].clone(),
                text_name: m.text_name(),
            })
            .collect()
    }

    fn link_monitors(&mut self) {
        for mon in &mut self.monitors {
            mon.ins_lpm = self
                .lpms
                .iter()
                .position(|l| l.pole + 1 == mon.pole && matches_pair(l.from, l.to, mon.from, mon.to));
            mon.ins_de = self
                .insulators
                .iter()
                .position(|i| i.pole + 1 == mon.pole && matches_pair(i.from, i.to, mon.from, mon.to));
            mon.meter = self.meters.iter().position(|m| {
                m.kind.is_voltage()
                    && m.pole == mon.pole
                    && matches_pair(m.from, m.to, mon.from, mon.to)
            });
        }
    }
}

fn matches_pair(a_from: usize, a_to: usize, b_from: usize, b_to: usize) -> bool {
    (a_from == b_from && a_to == b_to) || (a_from == b_to && a_to == b_from)
}
