//! Deck readers: first line, conductors/spans/lines, and device blocks.

use openetran_core::Error as Setup;

use crate::deck::*;
use crate::error::{Error, Result};
use crate::lexer::Lexer;

struct Reader<'a> {
    lex: Lexer<'a>,
    nodes: usize,
    poles: usize,
    /// Marked node pairs of the current device block.
    pairs_used: Vec<Vec<bool>>,
    /// Marked poles of the current device block.
    poles_used: Vec<bool>,
}

/// Parse a complete input deck.
pub fn parse_deck(src: &str) -> Result<Deck> {
    let mut rd = Reader {
        lex: Lexer::new(src),
        nodes: 0,
        poles: 0,
        pairs_used: Vec::new(),
        poles_used: Vec::new(),
    };
    let mut deck = Deck::default();

    rd.read_control(&mut deck)?;
    if deck.control.network {
        rd.read_spans(&mut deck)?;
        rd.read_lines(&mut deck)?;
        deck.control.poles = rd.poles;
    } else {
        let kind = rd.read_conductor_block()?;
        deck.spans.push(SpanCard { id: 1, kind });
    }
    rd.pairs_used = vec![vec![false; rd.nodes]; rd.nodes];
    rd.poles_used = vec![false; rd.poles];

    while let Some(tok) = rd.lex.first_token() {
        match tok.as_str() {
            "ground" => {
                let r60 = rd.lex.next_f64().unwrap_or(0.0);
                let (r60, monitor) = monitor_flag(r60);
                let rho = rd.lex.next_f64().unwrap_or(0.0);
                let e0 = rd.lex.next_f64().unwrap_or(0.0);
                let l = rd.lex.next_f64().unwrap_or(0.0);
                let length = rd.lex.next_f64().unwrap_or(0.0);
                let at = rd.read_connections()?;
                deck.devices.push(DeviceCard::Ground {
                    r60,
                    rho,
                    e0,
                    l: l * length,
                    monitor,
                    at,
                });
            }
            "resistor" => {
                let r = rd.lex.next_f64().unwrap_or(0.0);
                let at = rd.read_connections()?;
                deck.devices.push(DeviceCard::Resistor { r, at });
            }
            "inductor" => {
                let res = rd.lex.next_f64().unwrap_or(0.0);
                let ind = rd.lex.next_f64().unwrap_or(0.0);
                let at = rd.read_connections()?;
                deck.devices.push(DeviceCard::Inductor { res, ind, at });
            }
            "capacitor" => {
                let c = rd.lex.next_f64().unwrap_or(0.0);
                let at = rd.read_connections()?;
                deck.devices.push(DeviceCard::Capacitor { c, at });
            }
            "transformer" => {
                let res = rd.lex.next_f64().unwrap_or(0.0);
                let ind = rd.lex.next_f64().unwrap_or(0.0);
                let at = rd.read_connections()?;
                deck.devices.push(DeviceCard::Transformer { res, ind, at });
            }
            "customer" => {
                let rhg = rd.lex.next_f64().unwrap_or(0.0);
                let rho = rd.lex.next_f64().unwrap_or(0.0);
                let e0 = rd.lex.next_f64().unwrap_or(0.0);
                let lhg = rd.lex.next_f64().unwrap_or(0.0);
                let dhg = rd.lex.next_f64().unwrap_or(0.0);
                let n = rd.lex.next_f64().unwrap_or(0.0);
                let lp = rd.lex.next_f64().unwrap_or(0.0);
                let ls1 = rd.lex.next_f64().unwrap_or(0.0);
                let ls2 = rd.lex.next_f64().unwrap_or(0.0);
                let lcm = rd.lex.next_f64().unwrap_or(0.0);
                let ra = rd.lex.next_f64().unwrap_or(0.0);
                let rn = rd.lex.next_f64().unwrap_or(0.0);
                let dan = rd.lex.next_f64().unwrap_or(0.0);
                let daa = rd.lex.next_f64().unwrap_or(0.0);
                let span = rd.lex.next_f64().unwrap_or(0.0);
                let at = rd.read_connections()?;
                deck.devices.push(DeviceCard::Customer {
                    rhg,
                    rho,
                    e0,
                    lhg: lhg * dhg,
                    n,
                    lp,
                    ls1,
                    ls2,
                    lcm: lcm * span,
                    ra,
                    rn,
                    dan,
                    daa,
                    span,
                    at,
                });
            }
            "insulator" => {
                let cfo = rd.lex.next_f64().unwrap_or(0.0);
                let vb = rd.lex.next_f64().unwrap_or(0.0);
                let beta = rd.lex.next_f64().unwrap_or(0.0);
                let de = rd.lex.next_f64().unwrap_or(0.0);
                let at = rd.read_connections()?;
                deck.devices.push(DeviceCard::Insulator { cfo, vb, beta, de, at });
            }
            "lpm" => {
                let cfo = rd.lex.next_f64().unwrap_or(0.0);
                let e0 = rd.lex.next_f64().unwrap_or(0.0);
                let k = rd.lex.next_f64().unwrap_or(0.0);
                let at = rd.read_connections()?;
                deck.devices.push(DeviceCard::Lpm { cfo, e0, k, at });
            }
            "arrester" => {
                let v_gap = rd.lex.next_f64().unwrap_or(0.0);
                let (v_gap, monitor) = monitor_flag(v_gap);
                let v_knee = rd.lex.next_f64().unwrap_or(0.0);
                let r_slope = rd.lex.next_f64().unwrap_or(0.0);
                let l = rd.lex.next_f64().unwrap_or(0.0);
                let length = rd.lex.next_f64().unwrap_or(0.0);
                let at = rd.read_connections()?;
                deck.devices.push(DeviceCard::Arrester {
                    v_gap,
                    v_knee,
                    r_slope,
                    l: l * length,
                    monitor,
                    at,
                });
            }
            "arrbez" | "newarr" => {
                let v_gap = rd.lex.next_f64().unwrap_or(0.0);
                let v10 = rd.lex.next_f64().unwrap_or(0.0);
                let uref_pu = rd.lex.next_f64().unwrap_or(0.0);
                let l = rd.lex.next_f64().unwrap_or(0.0);
                let length = rd.lex.next_f64().unwrap_or(0.0);
                let monitor = rd.lex.next_int().unwrap_or(0) != 0;
                let at = rd.read_connections()?;
                deck.devices.push(DeviceCard::ArrBez {
                    v_gap,
                    v10,
                    uref_pu,
                    l: l * length,
                    monitor,
                    at,
                });
            }
            "pipegap" => {
                let v_knee = rd.lex.next_f64().unwrap_or(0.0);
                let (v_knee, monitor) = monitor_flag(v_knee);
                let r_slope = rd.lex.next_f64().unwrap_or(0.0);
                let at = rd.read_connections()?;
                deck.devices.push(DeviceCard::PipeGap {
                    v_knee,
                    r_slope: r_slope.abs(),
                    monitor,
                    at,
                });
            }
            "surge" => {
                let peak = rd.lex.next_f64().unwrap_or(0.0);
                let front = rd.lex.next_f64().unwrap_or(0.0);
                let tail = rd.lex.next_f64().unwrap_or(0.0);
                let tstart = rd.lex.next_f64().unwrap_or(0.0);
                let at = rd.read_connections()?;
                deck.devices.push(DeviceCard::Surge {
                    peak,
                    front,
                    tail,
                    tstart,
                    at,
                });
            }
            "steepfront" => {
                let peak = rd.lex.next_f64().unwrap_or(0.0);
                let front = rd.lex.next_f64().unwrap_or(0.0);
                let tail = rd.lex.next_f64().unwrap_or(0.0);
                let tstart = rd.lex.next_f64().unwrap_or(0.0);
                let pu_si = rd.lex.next_f64().unwrap_or(0.0);
                let at = rd.read_connections()?;
                deck.devices.push(DeviceCard::SteepFront {
                    peak,
                    front,
                    tail,
                    tstart,
                    pu_si,
                    at,
                });
            }
            "meter" => {
                let mtype = rd.lex.next_int().unwrap_or(0);
                let at = rd.read_connections()?;
                deck.devices.push(DeviceCard::Meter { mtype, at });
            }
            "labelpole" => {
                let at = rd.lex.next_int().unwrap_or(0);
                let label = rd.lex.rest_of_line();
                if at >= 0 {
                    deck.pole_labels.push((at as usize, label));
                }
            }
            "labelphase" => {
                let at = rd.lex.next_int().unwrap_or(0);
                let label = rd.lex.rest_of_line();
                if at >= 0 {
                    deck.phase_labels.push((at as usize, label));
                }
            }
            _ => {
                log::debug!("ignoring unknown deck token '{tok}'");
            }
        }
    }

    Ok(deck)
}

/// A negative leading parameter doubles as "add an ammeter" on several cards.
fn monitor_flag(v: f64) -> (f64, bool) {
    if v < 0.0 { (-v, true) } else { (v, false) }
}

impl<'a> Reader<'a> {
    fn read_control(&mut self, deck: &mut Deck) -> Result<()> {
        let Some(tok) = self.lex.first_token() else {
            return Err(Setup::PhaseCountRead.into());
        };
        let ctrl = &mut deck.control;
        match tok.as_str() {
            "time" => {
                ctrl.network = true;
                let nodes = self.lex.next_int().unwrap_or(0);
                ctrl.dt = self.lex.next_f64().unwrap_or(0.0);
                ctrl.tmax = self.lex.next_f64().unwrap_or(0.0);
                ctrl.nodes = check_nodes(nodes)?;
            }
            "2dt" => {
                let nodes = self.lex.next_int().unwrap_or(0);
                let poles = self.lex.next_int().unwrap_or(0);
                ctrl.span_length = self.lex.next_f64().unwrap_or(0.0);
                ctrl.left_end_z = self.lex.next_int().unwrap_or(0) != 0;
                ctrl.right_end_z = self.lex.next_int().unwrap_or(0) != 0;
                ctrl.dt = self.lex.next_f64().unwrap_or(0.0);
                ctrl.tmax = self.lex.next_f64().unwrap_or(0.0);
                ctrl.dt_switch_time = Some(self.lex.next_f64().unwrap_or(0.0));
                ctrl.nodes = check_nodes(nodes)?;
                ctrl.poles = check_poles(poles)?;
            }
            other => {
                let nodes = other.parse().unwrap_or(0);
                let poles = self.lex.next_int().unwrap_or(0);
                ctrl.span_length = self.lex.next_f64().unwrap_or(0.0);
                ctrl.left_end_z = self.lex.next_int().unwrap_or(0) != 0;
                ctrl.right_end_z = self.lex.next_int().unwrap_or(0) != 0;
                ctrl.dt = self.lex.next_f64().unwrap_or(0.0);
                ctrl.tmax = self.lex.next_f64().unwrap_or(0.0);
                ctrl.nodes = check_nodes(nodes)?;
                ctrl.poles = check_poles(poles)?;
            }
        }
        self.nodes = ctrl.nodes;
        self.poles = ctrl.poles;
        Ok(())
    }

    /// `span ID` headers, each followed by a conductor block.
    fn read_spans(&mut self, deck: &mut Deck) -> Result<()> {
        while self.lex.peek_first_token().as_deref() == Some("span") {
            self.lex.first_token();
            let id = self.lex.next_int().unwrap_or(0);
            let kind = self.read_conductor_block()?;
            // a repeated span id extends the existing definition
            match (deck.spans.iter_mut().find(|s| s.id == id), kind) {
                (Some(existing), SpanKind::Geometry(more)) => match &mut existing.kind {
                    SpanKind::Geometry(cards) => cards.extend(more),
                    SpanKind::Cables(_) => return Err(Setup::MixedSpanInput.into()),
                },
                (Some(existing), SpanKind::Cables(more)) => match &mut existing.kind {
                    SpanKind::Cables(cards) => cards.extend(more),
                    SpanKind::Geometry(_) => return Err(Setup::MixedSpanInput.into()),
                },
                (None, kind) => deck.spans.push(SpanCard { id, kind }),
            }
        }
        if deck.spans.is_empty() {
            return Err(Setup::MissingConductor.into());
        }
        Ok(())
    }

    fn read_lines(&mut self, deck: &mut Deck) -> Result<()> {
        while self.lex.peek_first_token().as_deref() == Some("line") {
            self.lex.first_token();
            let from = self.lex.next_int().unwrap_or(0);
            let to = self.lex.next_int().unwrap_or(0);
            let span_id = self.lex.next_int().unwrap_or(0);
            let length = self.lex.next_f64().unwrap_or(0.0);
            let term_left = self.lex.next_int().unwrap_or(0) != 0;
            let term_right = self.lex.next_int().unwrap_or(0) != 0;
            if from < 1 {
                return Err(Setup::BadPole(from).into());
            }
            if to < 1 {
                return Err(Setup::BadPole(to).into());
            }
            self.poles = self.poles.max(from as usize).max(to as usize);
            deck.lines.push(LineCard {
                from: from as usize,
                to: to as usize,
                span_id,
                length,
                term_left,
                term_right,
            });
        }
        if deck.lines.is_empty() {
            return Err(Setup::BadPoleCount(0).into());
        }
        Ok(())
    }

    /// Conductor or cable cards through the closing `end`.
    fn read_conductor_block(&mut self) -> Result<SpanKind> {
        let mut conductors: Vec<ConductorCard> = Vec::new();
        let mut cables: Vec<CableCard> = Vec::new();
        loop {
            let Some(tok) = self.lex.first_token() else {
                break;
            };
            match tok.as_str() {
                "end" => break,
                "conductor" => {
                    if !cables.is_empty() {
                        return Err(Setup::MixedSpanInput.into());
                    }
                    let number = self.check_conductor_number()?;
                    let height = self.lex.next_f64().unwrap_or(0.0);
                    let x = self.lex.next_f64().unwrap_or(0.0);
                    let radius = self.lex.next_f64().unwrap_or(0.0);
                    let voltage = self.lex.next_f64().unwrap_or(0.0);
                    conductors.push(ConductorCard {
                        number,
                        height,
                        x,
                        radius,
                        voltage,
                    });
                }
                "cable" => {
                    if !conductors.is_empty() {
                        return Err(Setup::MixedSpanInput.into());
                    }
                    let number = self.check_conductor_number()?;
                    let z_surge = self.lex.next_f64().unwrap_or(0.0);
                    let v_prop = self.lex.next_f64().unwrap_or(0.0);
                    let vpf = self.lex.next_f64().unwrap_or(0.0);
                    cables.push(CableCard {
                        number,
                        z_surge,
                        v_prop,
                        vpf,
                    });
                }
                "node" => {
                    // a solved node with no conductor above it
                    self.check_conductor_number()?;
                }
                other => {
                    return Err(Error::syntax(
                        self.lex.line_no(),
                        format!("expected conductor, cable, node, or end, found '{other}'"),
                    ));
                }
            }
        }
        if cables.is_empty() {
            if conductors.is_empty() {
                return Err(Setup::MissingConductor.into());
            }
            if conductors.len() > self.nodes {
                return Err(Setup::TooManyConductors(conductors.len()).into());
            }
            Ok(SpanKind::Geometry(conductors))
        } else {
            Ok(SpanKind::Cables(cables))
        }
    }

    fn check_conductor_number(&mut self) -> Result<usize> {
        let i = self.lex.next_int().unwrap_or(0);
        if i < 1 || i as usize > self.nodes {
            return Err(Setup::BadConductorNumber(i).into());
        }
        Ok(i as usize)
    }

    /// The `pairs`/`poles` trailer of a device block, expanded to concrete
    /// (pole, from, to) connections in row-major order.
    fn read_connections(&mut self) -> Result<Vec<Wiring>> {
        self.read_pairs()?;
        self.read_poles()?;
        Ok(self.expand_assignments())
    }

    fn read_pairs(&mut self) -> Result<()> {
        for row in self.pairs_used.iter_mut() {
            row.fill(false);
        }
        match self.lex.first_token().as_deref() {
            Some("pairs") => {}
            other => {
                return Err(Error::syntax(
                    self.lex.line_no(),
                    format!("expected a pairs line, found {other:?}"),
                ));
            }
        }
        let mut first = true;
        loop {
            let Some(j) = self.lex.next_int() else {
                if first {
                    return Err(Setup::UnmatchedPair(0).into());
                }
                break;
            };
            let Some(k) = self.lex.next_int() else {
                return Err(Setup::UnmatchedPair(j).into());
            };
            self.mark_pair(j, k)?;
            first = false;
        }
        Ok(())
    }

    fn mark_pair(&mut self, j: i64, k: i64) -> Result<()> {
        let n = self.nodes as i64;
        if j == 0 && k > 0 && k <= n {
            self.pairs_used[(k - 1) as usize][(k - 1) as usize] = true;
        } else if k == 0 && j > 0 && j <= n {
            self.pairs_used[(j - 1) as usize][(j - 1) as usize] = true;
        } else if j > 0 && k > 0 && j <= n && k <= n {
            self.pairs_used[(j - 1) as usize][(k - 1) as usize] = true;
        } else {
            return Err(Setup::BadPair { j, k }.into());
        }
        Ok(())
    }

    fn read_poles(&mut self) -> Result<()> {
        self.poles_used.fill(false);
        match self.lex.first_token().as_deref() {
            Some("poles") => {}
            other => {
                return Err(Error::syntax(
                    self.lex.line_no(),
                    format!("expected a poles line, found {other:?}"),
                ));
            }
        }
        match self.lex.next_token().as_deref() {
            Some("all") => self.poles_used.fill(true),
            Some("even") => {
                for i in (1..self.poles).step_by(2) {
                    self.poles_used[i] = true;
                }
            }
            Some("odd") => {
                for i in (0..self.poles).step_by(2) {
                    self.poles_used[i] = true;
                }
            }
            Some(tok) => {
                let mut i: i64 = tok.parse().unwrap_or(0);
                loop {
                    if i > 0 && i as usize <= self.poles {
                        self.poles_used[(i - 1) as usize] = true;
                    } else {
                        return Err(Setup::BadPole(i).into());
                    }
                    match self.lex.next_int() {
                        Some(next) => i = next,
                        None => break,
                    }
                }
            }
            None => {
                return Err(Error::syntax(self.lex.line_no(), "empty poles line"));
            }
        }
        Ok(())
    }

    /// Walk (pole, row, column) in ascending order over the marked poles
    /// and pairs; a diagonal mark means node-to-ground.
    fn expand_assignments(&self) -> Vec<Wiring> {
        let mut out = Vec::new();
        for (p, &used) in self.poles_used.iter().enumerate() {
            if !used {
                continue;
            }
            for j in 0..self.nodes {
                for k in 0..self.nodes {
                    if self.pairs_used[j][k] {
                        out.push(Wiring {
                            pole: p + 1,
                            from: j + 1,
                            to: if j == k { 0 } else { k + 1 },
                        });
                    }
                }
            }
        }
        out
    }
}

fn check_nodes(n: i64) -> Result<usize> {
    if n > 0 {
        Ok(n as usize)
    } else {
        Err(Setup::BadPhaseCount(n).into())
    }
}

fn check_poles(p: i64) -> Result<usize> {
    if p > 0 {
        Ok(p as usize)
    } else {
        Err(Setup::BadPoleCount(p).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "\
* single phase, single pole, matched at both ends
1 1 300.0 1 1 5.0e-9 5.0e-5
conductor 1 10.0 0.0 0.00667 0.0
end
surge 10.0e3 1.2e-6 50.0e-6 0.0
pairs 1 0
poles 1
meter 0
pairs 1 0
poles 1
";

    #[test]
    fn plain_deck_parses() {
        let deck = parse_deck(SIMPLE).unwrap();
        assert_eq!(deck.control.nodes, 1);
        assert_eq!(deck.control.poles, 1);
        assert!(deck.control.left_end_z && deck.control.right_end_z);
        assert_eq!(deck.control.dt, 5.0e-9);
        assert!(!deck.control.network);
        assert_eq!(deck.spans.len(), 1);
        assert_eq!(deck.devices.len(), 2);
        match &deck.devices[0] {
            DeviceCard::Surge { peak, at, .. } => {
                assert_eq!(*peak, 10.0e3);
                assert_eq!(at.len(), 1);
                assert_eq!(at[0], Wiring { pole: 1, from: 1, to: 0 });
            }
            other => panic!("expected surge, got {other:?}"),
        }
    }

    #[test]
    fn pairs_expand_in_row_major_order() {
        let src = "\
3 2 30.0 0 0 1.0e-8 1.0e-4
conductor 1 10.0 0.0 0.01 0.0
conductor 2 9.0 -1.0 0.01 0.0
conductor 3 9.0 1.0 0.01 0.0
end
resistor 50.0
pairs 1 0 2 3
poles all
";
        let deck = parse_deck(src).unwrap();
        match &deck.devices[0] {
            DeviceCard::Resistor { at, .. } => {
                assert_eq!(
                    at.as_slice(),
                    &[
                        Wiring { pole: 1, from: 1, to: 0 },
                        Wiring { pole: 1, from: 2, to: 3 },
                        Wiring { pole: 2, from: 1, to: 0 },
                        Wiring { pole: 2, from: 2, to: 3 },
                    ]
                );
            }
            other => panic!("expected resistor, got {other:?}"),
        }
    }

    #[test]
    fn odd_and_even_pole_selection() {
        let src = "\
1 4 30.0 0 0 1.0e-8 1.0e-4
conductor 1 10.0 0.0 0.01 0.0
end
ground 25.0 100.0 400.0e3 1.0e-6 3.0
pairs 1 0
poles odd
";
        let deck = parse_deck(src).unwrap();
        match &deck.devices[0] {
            DeviceCard::Ground { at, l, .. } => {
                let poles: Vec<usize> = at.iter().map(|w| w.pole).collect();
                assert_eq!(poles, vec![1, 3]);
                assert!((l - 3.0e-6).abs() < 1e-18);
            }
            other => panic!("expected ground, got {other:?}"),
        }
    }

    #[test]
    fn network_deck_determines_pole_count() {
        let src = "\
time 1 1.0e-8 1.0e-4
span 1
conductor 1 10.0 0.0 0.01 0.0
end
line 1 2 1 300.0 1 0
line 2 3 1 300.0 0 1
meter 0
pairs 1 0
poles 3
";
        let deck = parse_deck(src).unwrap();
        assert!(deck.control.network);
        assert_eq!(deck.control.poles, 3);
        assert_eq!(deck.lines.len(), 2);
        match &deck.devices[0] {
            DeviceCard::Meter { at, .. } => assert_eq!(at[0].pole, 3),
            other => panic!("expected meter, got {other:?}"),
        }
    }

    #[test]
    fn unmatched_pair_is_reported() {
        let src = "\
2 1 30.0 0 0 1.0e-8 1.0e-4
conductor 1 10.0 0.0 0.01 0.0
conductor 2 9.0 1.0 0.01 0.0
end
resistor 50.0
pairs 1
poles 1
";
        let err = parse_deck(src).unwrap_err();
        assert_eq!(err.code(), 13);
    }

    #[test]
    fn mixed_cable_and_conductor_is_rejected() {
        let src = "\
2 1 30.0 0 0 1.0e-8 1.0e-4
conductor 1 10.0 0.0 0.01 0.0
cable 2 30.0 1.5e8 0.0
end
";
        let err = parse_deck(src).unwrap_err();
        assert_eq!(err.code(), 22);
    }

    #[test]
    fn negative_leading_value_requests_ammeter() {
        let src = "\
1 1 30.0 0 0 1.0e-8 1.0e-4
conductor 1 10.0 0.0 0.01 0.0
end
ground -25.0 100.0 400.0e3 0.0 0.0
pairs 1 0
poles 1
";
        let deck = parse_deck(src).unwrap();
        match &deck.devices[0] {
            DeviceCard::Ground { r60, monitor, .. } => {
                assert_eq!(*r60, 25.0);
                assert!(*monitor);
            }
            other => panic!("expected ground, got {other:?}"),
        }
    }

    #[test]
    fn newarr_reads_like_arrbez() {
        let src = "\
1 1 30.0 0 0 1.0e-8 1.0e-4
conductor 1 10.0 0.0 0.01 0.0
end
newarr 0.0 90.0e3 0.0 1.0e-6 2.0 1
pairs 1 0
poles 1
";
        let deck = parse_deck(src).unwrap();
        match &deck.devices[0] {
            DeviceCard::ArrBez { v10, l, monitor, .. } => {
                assert_eq!(*v10, 90.0e3);
                assert!((l - 2.0e-6).abs() < 1e-18);
                assert!(*monitor);
            }
            other => panic!("expected arrbez, got {other:?}"),
        }
    }
}
