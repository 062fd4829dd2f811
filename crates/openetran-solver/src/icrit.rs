//! Critical-current iteration.
//!
//! For each exposed wire on a range of poles, find the smallest first
//! stroke that flashes an insulator within Tmax. The objective
//! g(Ipk) = SI(Ipk) - 1 gets an additive (Tmax - t_flash) * 1e5 penalty
//! once it flashes, which makes it strictly monotone with a unique sign
//! change, so Brent's method can drive the whole simulator as a black
//! box. Every evaluation is a full reset plus one transient run.

use openetran_core::error::Result;
use openetran_core::ETKONST;

use crate::brent::brent;
use crate::engine::Simulation;

/// Cigre first-stroke parameters.
const Q_MEDIAN_FIRST: f64 = 4.65;
const I_MEDIAN_FIRST: f64 = 31.10;
const T3090_FIRST: f64 = 3.83;

const MIN_STROKE: f64 = 3.0e3;
const MAX_STROKE: f64 = 500.0e3;
const MAX_ITER: usize = 200;
const ITER_TOL: f64 = 1.0;

/// Largest number of wires a stroke can be aimed at.
pub const MAX_WIRES_HIT: usize = 15;

pub struct IcritRequest {
    /// 1-based pole range, inclusive.
    pub first_pole: usize,
    pub last_pole: usize,
    /// Wires exposed to a direct stroke, index 0 = node 1.
    pub wire_struck: Vec<bool>,
}

/// Reset, aim the stroke at (pole, wire), and run one transient.
fn run_loop_case(sim: &mut Simulation, pole: usize, wire: usize, i_pk: f64, ftf: f64, ftt: f64) -> Result<f64> {
    sim.reset()?;
    if !sim.surges.is_empty() {
        sim.surges[0].move_to(pole - 1, wire, 0, i_pk, ftf, ftt, 0.0);
        sim.poles[pole - 1].solve = true;
    } else if !sim.steepfronts.is_empty() {
        let pu_si = sim.steepfronts[0].pu_si;
        sim.steepfronts[0].move_to(pole - 1, wire, 0, i_pk, ftf, ftt, 0.0, pu_si);
        sim.poles[pole - 1].solve = true;
    }
    let answers = sim.run(None)?;
    Ok(answers.si)
}

/// The Brent objective for one (pole, wire) case.
fn icrit_objective(sim: &mut Simulation, pole: usize, wire: usize, i_pk: f64) -> Result<f64> {
    let ftt = Q_MEDIAN_FIRST / I_MEDIAN_FIRST / 1000.0 / ETKONST;
    let ftf = 1.0e-6 * T3090_FIRST;
    let si = run_loop_case(sim, pole, wire, i_pk, ftf, ftt)?;
    let mut ret = si - 1.0;
    if ret >= 0.0 {
        ret += (sim.tmax - sim.t) * 1.0e5;
    }
    Ok(ret)
}

/// Find the average critical current per struck wire over the pole range.
/// Returns one entry per wire slot; unexposed wires report zero.
pub fn find_critical_currents(sim: &mut Simulation, req: &IcritRequest) -> Result<Vec<f64>> {
    let mut icritical = vec![0.0; req.wire_struck.len().min(MAX_WIRES_HIT)];
    let num_poles = (req.last_pole - req.first_pole + 1) as f64;

    for pole in req.first_pole..=req.last_pole {
        // when every insulator sits on one pole, it travels with the stroke;
        // spread insulators stay put
        let mut first_ins_pole = 0;
        let mut at_one_pole = true;
        for ins in &sim.insulators {
            if first_ins_pole == 0 {
                first_ins_pole = ins.pole + 1;
            }
            if first_ins_pole != ins.pole + 1 {
                at_one_pole = false;
            }
        }
        for lpm in &sim.lpms {
            if first_ins_pole == 0 {
                first_ins_pole = lpm.pole + 1;
            }
            if first_ins_pole != lpm.pole + 1 {
                at_one_pole = false;
            }
        }
        if at_one_pole {
            for ins in &mut sim.insulators {
                ins.pole = pole - 1;
            }
            for lpm in &mut sim.lpms {
                lpm.pole = pole - 1;
            }
            sim.poles[pole - 1].solve = true;
        }

        for (wire_idx, &struck) in req.wire_struck.iter().take(MAX_WIRES_HIT).enumerate() {
            if !struck {
                continue;
            }
            let wire = wire_idx + 1;
            if wire > sim.nodes {
                return Err(openetran_core::Error::SubscriptRange(format!(
                    "struck wire {wire} exceeds the {} pole nodes",
                    sim.nodes
                )));
            }
            let g_min = icrit_objective(sim, pole, wire, MIN_STROKE)?;
            let result = if g_min >= 0.0 {
                // even the smallest stroke flashes over
                MIN_STROKE
            } else {
                let g_max = icrit_objective(sim, pole, wire, MAX_STROKE)?;
                if g_max <= 0.0 {
                    // never flashes
                    MAX_STROKE
                } else {
                    brent(
                        |i_pk| icrit_objective(sim, pole, wire, i_pk),
                        MIN_STROKE,
                        MAX_STROKE,
                        ITER_TOL,
                        MAX_ITER,
                    )?
                }
            };
            icritical[wire_idx] += result / num_poles;
            log::info!(
                "pole {pole}, wire {wire}: critical current contribution {:.4e} A",
                result
            );
        }
    }
    Ok(icritical)
}
