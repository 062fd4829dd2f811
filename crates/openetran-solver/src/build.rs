//! Build a `Simulation` from a parsed deck.

use nalgebra::DVector;
use openetran_core::error::{Error, Result};
use openetran_core::Pole;
use openetran_devices::{
    customer::CustomerGeometry, ArrBez, Arrester, Capacitor, Customer, DcSource, Ground, Inductor,
    Insulator, Lpm, Meter, MeterKind, Monitor, PipeGap, Resistor, SteepFront, Surge, Transformer,
};
use openetran_parser::{Deck, DeviceCard, SpanKind, Wiring};

use crate::compensation::NrStats;
use crate::engine::Simulation;
use crate::line::Line;
use crate::span::Span;

impl Simulation {
    /// Build the full system model from a deck: poles, spans, lines,
    /// terminations, and every device card in input order.
    pub fn build(deck: &Deck) -> Result<Simulation> {
        let ctrl = &deck.control;
        let nodes = ctrl.nodes;
        let num_poles = ctrl.poles;

        // span definitions first; conductors may be fewer than nodes
        let mut spans = Vec::new();
        let mut conductors = nodes;
        for card in &deck.spans {
            let span = match &card.kind {
                SpanKind::Geometry(cards) => {
                    // conductor cards address slots 1..=n in any order
                    let n = cards.len();
                    let mut x = vec![0.0; n];
                    let mut height = vec![0.0; n];
                    let mut radius = vec![0.0; n];
                    let mut voltage = vec![0.0; n];
                    for c in cards {
                        if c.number > n {
                            return Err(Error::BadConductorNumber(c.number as i64));
                        }
                        let i = c.number - 1;
                        x[i] = c.x;
                        height[i] = c.height;
                        radius[i] = c.radius;
                        voltage[i] = c.voltage;
                    }
                    conductors = n;
                    Span::from_geometry(card.id, &x, &height, &radius, &voltage)?
                }
                SpanKind::Cables(cards) => {
                    let list: Vec<(usize, f64, f64, f64)> = cards
                        .iter()
                        .map(|c| (c.number - 1, c.z_surge, c.v_prop, c.vpf))
                        .collect();
                    conductors = nodes;
                    Span::from_cables(card.id, nodes, &list)?
                }
            };
            spans.push(span);
        }
        if spans.is_empty() {
            return Err(Error::MissingConductor);
        }
        let multiple_span_defns = ctrl.network && spans.len() > 1;

        let mut poles: Vec<Pole> = (1..=num_poles).map(|loc| Pole::new(loc, nodes)).collect();
        if poles.is_empty() {
            return Err(Error::BadPoleCount(0));
        }

        let mut sim = Simulation {
            nodes,
            conductors,
            num_poles,
            network: ctrl.network,
            multiple_span_defns,
            dt: ctrl.dt,
            tmax: ctrl.tmax + 0.5 * ctrl.dt,
            t: 0.0,
            step: 0,
            spans,
            poles: Vec::new(),
            lines: Vec::new(),
            grounds: Vec::new(),
            resistors: Vec::new(),
            inductors: Vec::new(),
            capacitors: Vec::new(),
            transformers: Vec::new(),
            customers: Vec::new(),
            insulators: Vec::new(),
            lpms: Vec::new(),
            arresters: Vec::new(),
            arrbezs: Vec::new(),
            pipegaps: Vec::new(),
            surges: Vec::new(),
            steepfronts: Vec::new(),
            sources: Vec::new(),
            meters: Vec::new(),
            monitors: Vec::new(),
            pole_ports: vec![Vec::new(); num_poles],
            inductor_vdc: Vec::new(),
            transformer_vdc: Vec::new(),
            capacitor_vdc: Vec::new(),
            pole_labels: (0..=num_poles).map(|i| i.to_string()).collect(),
            phase_labels: (0..=nodes).map(|i| i.to_string()).collect(),
            flash_halt_enabled: false,
            flash_halt: false,
            want_si_calculation: true,
            using_second_dt: ctrl.dt_switch_time.is_some(),
            first_dt: ctrl.dt,
            second_dt: 0.0,
            dt_switch_time: ctrl.dt_switch_time.unwrap_or(0.0),
            dt_switched: false,
            nr_stats: NrStats::default(),
        };

        // lines: either the uniform pole chain or explicit network cards
        if ctrl.network {
            for card in &deck.lines {
                let span_idx = sim
                    .spans
                    .iter()
                    .position(|s| s.id == card.span_id)
                    .ok_or_else(|| {
                        Error::SubscriptRange(format!("unknown span id {}", card.span_id))
                    })?;
                let span = &sim.spans[span_idx];
                let steps =
                    (0.5 + card.length / span.wave_velocity / sim.dt) as usize;
                let (lp, rp) = (card.from - 1, card.to - 1);
                if lp >= num_poles || rp >= num_poles {
                    return Err(Error::BadPole(card.from.max(card.to) as i64));
                }
                poles[lp].solve = true;
                poles[rp].solve = true;
                poles[lp].add_y_block(&span.yp);
                poles[rp].add_y_block(&span.yp);
                sim.lines
                    .push(Line::new(lp, rp, span_idx, span.conductors, steps));
                if card.term_left {
                    terminate_pole(&mut poles[lp], span, &mut sim.sources, lp);
                }
                if card.term_right {
                    terminate_pole(&mut poles[rp], span, &mut sim.sources, rp);
                }
            }
        } else {
            let span = &sim.spans[0];
            let travel_steps =
                (0.5 + ctrl.span_length / span.wave_velocity / sim.dt) as usize;
            if sim.using_second_dt {
                sim.second_dt = sim.dt * travel_steps.max(1) as f64;
            }
            for left in 0..num_poles.saturating_sub(1) {
                let right = left + 1;
                poles[left].add_y_block(&span.yp);
                poles[right].add_y_block(&span.yp);
                sim.lines
                    .push(Line::new(left, right, 0, span.conductors, travel_steps));
            }
            poles[0].solve = true;
            poles[num_poles - 1].solve = true;
            if ctrl.left_end_z {
                terminate_pole(&mut poles[0], span, &mut sim.sources, 0);
            }
            if ctrl.right_end_z {
                terminate_pole(&mut poles[num_poles - 1], span, &mut sim.sources, num_poles - 1);
            }
        }
        sim.poles = poles;

        for card in &deck.devices {
            sim.add_device_card(card)?;
        }

        for (at, label) in &deck.pole_labels {
            if *at < sim.pole_labels.len() {
                sim.pole_labels[*at] = label.clone();
            }
        }
        for (at, label) in &deck.phase_labels {
            if *at < sim.phase_labels.len() {
                sim.phase_labels[*at] = label.clone();
            }
        }

        // seed storage-element histories and factor every pole
        for line in &mut sim.lines {
            line.init_history(&sim.spans[line.span]);
        }
        for (i, l) in sim.inductors.iter_mut().enumerate() {
            l.init_history(sim.inductor_vdc[i])?;
        }
        for (i, x) in sim.transformers.iter_mut().enumerate() {
            x.init_history(sim.transformer_vdc[i])?;
        }
        for (i, c) in sim.capacitors.iter_mut().enumerate() {
            c.init_history(sim.capacitor_vdc[i]);
        }
        for pole in &mut sim.poles {
            pole.triangulate()?;
        }
        Ok(sim)
    }

    fn pole_index(&self, w: &Wiring) -> Result<usize> {
        let p = w.pole;
        if p < 1 || p > self.num_poles {
            return Err(Error::BadPole(p as i64));
        }
        Ok(p - 1)
    }

    /// The span definition a pole's devices see: the span of the first
    /// line touching it, or the head span.
    fn pole_defn(&self, pole: usize) -> &Span {
        if self.network {
            for line in &self.lines {
                if line.left == pole || line.right == pole {
                    return &self.spans[line.span];
                }
            }
        }
        &self.spans[0]
    }

    fn offset_between(&self, pole: usize, from: usize, to: usize) -> f64 {
        let defn = self.pole_defn(pole);
        let mut vdc = 0.0;
        if from > 0 && from <= defn.conductors {
            vdc += defn.vp_offset[from - 1];
        }
        if to > 0 && to <= defn.conductors {
            vdc -= defn.vp_offset[to - 1];
        }
        vdc
    }

    fn add_device_card(&mut self, card: &DeviceCard) -> Result<()> {
        match card {
            DeviceCard::Ground {
                r60,
                rho,
                e0,
                l,
                monitor,
                at,
            } => {
                for w in at {
                    let p = self.pole_index(w)?;
                    let g = Ground::new(p, w.from, w.to, *r60, *rho, *e0, *l, self.dt);
                    g.stamp(&mut self.poles[p]);
                    self.grounds.push(g);
                    if *monitor {
                        self.meters.push(Meter::ammeter(
                            MeterKind::GroundCurrent,
                            w.pole,
                            w.from,
                            self.grounds.len() - 1,
                        ));
                    }
                }
            }
            DeviceCard::Resistor { r, at } => {
                for w in at {
                    let p = self.pole_index(w)?;
                    let res = Resistor::new(p, w.from, w.to, *r);
                    res.stamp(&mut self.poles[p]);
                    // a dc offset across the resistor needs a sustaining source
                    let vdc = self.offset_between(p, w.from, w.to);
                    if vdc != 0.0 {
                        let mut val = DVector::zeros(self.conductors);
                        let idc = vdc * res.y;
                        if w.from > 0 && w.from <= self.conductors {
                            val[w.from - 1] = idc;
                        }
                        if w.to > 0 && w.to <= self.conductors {
                            val[w.to - 1] = -idc;
                        }
                        self.sources.push(DcSource::new(p, val));
                    }
                    self.resistors.push(res);
                }
            }
            DeviceCard::Inductor { res, ind, at } => {
                for w in at {
                    let p = self.pole_index(w)?;
                    let l = Inductor::new(p, w.from, w.to, *res, *ind, self.dt);
                    l.stamp(&mut self.poles[p]);
                    self.inductor_vdc.push(self.offset_between(p, w.from, w.to));
                    self.inductors.push(l);
                }
            }
            DeviceCard::Capacitor { c, at } => {
                for w in at {
                    let p = self.pole_index(w)?;
                    let cap = Capacitor::new(p, w.from, w.to, *c, self.dt);
                    cap.stamp(&mut self.poles[p]);
                    self.capacitor_vdc.push(self.offset_between(p, w.from, w.to));
                    self.capacitors.push(cap);
                }
            }
            DeviceCard::Transformer { res, ind, at } => {
                for w in at {
                    let p = self.pole_index(w)?;
                    let x = Transformer::new(p, w.from, w.to, *res, *ind, self.dt);
                    x.stamp(&mut self.poles[p]);
                    self.transformer_vdc
                        .push(self.offset_between(p, w.from, w.to));
                    self.transformers.push(x);
                }
            }
            DeviceCard::Customer {
                rhg,
                rho,
                e0,
                lhg,
                n,
                lp,
                ls1,
                ls2,
                lcm,
                ra,
                rn,
                dan,
                daa,
                span,
                at,
            } => {
                let geom = CustomerGeometry {
                    n: *n,
                    lp: *lp,
                    ls1: *ls1,
                    ls2: *ls2,
                    ra: *ra,
                    rn: *rn,
                    dan: *dan,
                    daa: *daa,
                    span: *span,
                };
                let (ki, kv) = geom.coupling();
                for w in at {
                    let p = self.pole_index(w)?;
                    // the house ground hangs from the customer's "to" node
                    let g = Ground::new(p, w.to, 0, *rhg, *rho, *e0, *lcm + *lhg, self.dt);
                    g.stamp(&mut self.poles[p]);
                    self.grounds.push(g);
                    let gi = self.grounds.len() - 1;
                    let c = Customer::new(p, w.from, w.to, gi, ki, kv, self.dt);
                    self.poles[p].solve = true;
                    self.customers.push(c);
                    let ci = self.customers.len() - 1;
                    self.meters.push(Meter::ammeter(
                        MeterKind::HouseGroundCurrent,
                        w.pole,
                        w.from,
                        ci,
                    ));
                    self.meters
                        .push(Meter::ammeter(MeterKind::TransformerX2, w.pole, w.from, ci));
                }
            }
            DeviceCard::Insulator { cfo, vb, beta, de, at } => {
                for w in at {
                    let p = self.pole_index(w)?;
                    self.poles[p].solve = true;
                    self.insulators
                        .push(Insulator::new(p, w.from, w.to, *cfo, *vb, *beta, *de));
                }
            }
            DeviceCard::Lpm { cfo, e0, k, at } => {
                for w in at {
                    let p = self.pole_index(w)?;
                    self.poles[p].solve = true;
                    let mut lpm = Lpm::new(p, w.from, w.to, *cfo, *e0, *k);
                    lpm.reset(self.tmax, self.dt);
                    self.lpms.push(lpm);
                }
            }
            DeviceCard::Arrester {
                v_gap,
                v_knee,
                r_slope,
                l,
                monitor,
                at,
            } => {
                for w in at {
                    let p = self.pole_index(w)?;
                    let a = Arrester::new(p, w.from, w.to, *v_gap, *v_knee, *r_slope, *l, self.dt);
                    self.poles[p].solve = true;
                    self.arresters.push(a);
                    if *monitor {
                        self.meters.push(Meter::ammeter(
                            MeterKind::ArresterCurrent,
                            w.pole,
                            w.from,
                            self.arresters.len() - 1,
                        ));
                    }
                }
            }
            DeviceCard::ArrBez {
                v_gap,
                v10,
                uref_pu,
                l,
                monitor,
                at,
            } => {
                for w in at {
                    let p = self.pole_index(w)?;
                    let mut a =
                        ArrBez::new(p, w.from, w.to, *v_gap, *v10, *uref_pu, *l, self.dt)?;
                    a.port = self.poles[p].add_port(w.from, w.to);
                    self.arrbezs.push(a);
                    let ai = self.arrbezs.len() - 1;
                    self.pole_ports[p].push(ai);
                    if *monitor {
                        self.meters.push(Meter::ammeter(
                            MeterKind::ArrbezCurrent,
                            w.pole,
                            w.from,
                            ai,
                        ));
                    }
                }
            }
            DeviceCard::PipeGap {
                v_knee,
                r_slope,
                monitor,
                at,
            } => {
                for w in at {
                    let p = self.pole_index(w)?;
                    let g = PipeGap::new(p, w.from, w.to, *v_knee, *r_slope);
                    self.poles[p].solve = true;
                    self.pipegaps.push(g);
                    if *monitor {
                        self.meters.push(Meter::ammeter(
                            MeterKind::PipegapCurrent,
                            w.pole,
                            w.from,
                            self.pipegaps.len() - 1,
                        ));
                    }
                }
            }
            DeviceCard::Surge {
                peak,
                front,
                tail,
                tstart,
                at,
            } => {
                for w in at {
                    let p = self.pole_index(w)?;
                    self.poles[p].solve = true;
                    self.surges
                        .push(Surge::new(p, w.from, w.to, *peak, *front, *tail, *tstart));
                }
            }
            DeviceCard::SteepFront {
                peak,
                front,
                tail,
                tstart,
                pu_si,
                at,
            } => {
                for w in at {
                    let p = self.pole_index(w)?;
                    self.poles[p].solve = true;
                    self.steepfronts.push(SteepFront::new(
                        p, w.from, w.to, *peak, *front, *tail, *tstart, *pu_si,
                    ));
                }
            }
            DeviceCard::Meter { mtype, at } => {
                for w in at {
                    self.add_meter_card(*mtype, w)?;
                }
            }
        }
        Ok(())
    }

    fn add_meter_card(&mut self, mtype: i64, w: &Wiring) -> Result<()> {
        let p = self.pole_index(w)?;
        match mtype {
            0 => {
                self.poles[p].solve = true;
                self.meters.push(Meter::voltmeter(w.pole, w.from, w.to));
            }
            1 => {
                if let Some(i) = self
                    .arresters
                    .iter()
                    .position(|a| a.pole == p && a.from == w.from && a.to == w.to)
                {
                    self.meters
                        .push(Meter::ammeter(MeterKind::ArresterCurrent, w.pole, w.from, i));
                } else if let Some(i) = self
                    .arrbezs
                    .iter()
                    .position(|a| a.pole == p && a.from == w.from && a.to == w.to)
                {
                    self.meters
                        .push(Meter::ammeter(MeterKind::ArrbezCurrent, w.pole, w.from, i));
                } else {
                    log::warn!("no arrester at pole {} {}-{} to meter", w.pole, w.from, w.to);
                }
            }
            2 => {
                if let Some(i) = self
                    .grounds
                    .iter()
                    .position(|g| g.pole == p && g.from == w.from && g.to == w.to)
                {
                    self.meters
                        .push(Meter::ammeter(MeterKind::GroundCurrent, w.pole, w.from, i));
                } else {
                    log::warn!("no ground at pole {} {}-{} to meter", w.pole, w.from, w.to);
                }
            }
            3 | 4 => {
                if let Some(i) = self
                    .customers
                    .iter()
                    .position(|c| c.pole == p && c.from == w.from && c.to == w.to)
                {
                    let kind = if mtype == 3 {
                        MeterKind::HouseGroundCurrent
                    } else {
                        MeterKind::TransformerX2
                    };
                    self.meters.push(Meter::ammeter(kind, w.pole, w.from, i));
                } else {
                    log::warn!("no customer at pole {} {}-{} to meter", w.pole, w.from, w.to);
                }
            }
            5 => {
                if let Some(i) = self
                    .pipegaps
                    .iter()
                    .position(|g| g.pole == p && g.from == w.from && g.to == w.to)
                {
                    self.meters
                        .push(Meter::ammeter(MeterKind::PipegapCurrent, w.pole, w.from, i));
                } else {
                    log::warn!("no pipegap at pole {} {}-{} to meter", w.pole, w.from, w.to);
                }
            }
            other => {
                log::warn!("unknown meter type {other}");
            }
        }
        Ok(())
    }

    /// Register an external voltage monitor; call before `run`.
    pub fn add_monitor(&mut self, pole: usize, from: usize, to: usize) {
        let npts = (self.tmax / self.dt) as usize + 2;
        self.monitors.push(Monitor::new(pole, from, to, npts));
    }
}

/// Surge-impedance termination with the dc sources that hold the
/// power-frequency offsets.
fn terminate_pole(pole: &mut Pole, span: &Span, sources: &mut Vec<DcSource>, pole_idx: usize) {
    pole.add_y_block(&span.yp);
    let val = &span.yp * &span.vp_offset;
    sources.push(DcSource::new(pole_idx, val));
}
