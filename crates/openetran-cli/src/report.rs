//! Text report of a single-shot run.

use openetran_devices::lpm::FlashMode;
use openetran_devices::MeterKind;
use openetran_solver::{Answers, Simulation};

pub fn print_run_report(sim: &Simulation, answers: &Answers) {
    for m in &sim.meters {
        match m.kind {
            MeterKind::Voltage => println!(
                "Meter at pole {}, from {} to {}, max V = {:e}",
                m.pole, m.from, m.to, m.peak
            ),
            MeterKind::ArresterCurrent | MeterKind::ArrbezCurrent => {
                println!("Meter at pole {}, arrester max I = {:e}", m.pole, m.peak)
            }
            MeterKind::GroundCurrent => {
                println!("Meter at pole {}, pole ground max I = {:e}", m.pole, m.peak)
            }
            MeterKind::HouseGroundCurrent => {
                println!("Meter at pole {}, house ground max I = {:e}", m.pole, m.peak)
            }
            MeterKind::TransformerX2 => {
                println!("Meter at pole {}, transformer X2 max I = {:e}", m.pole, m.peak)
            }
            MeterKind::PipegapCurrent => {
                println!("Meter at pole {}, pipegap max I = {:e}", m.pole, m.peak)
            }
        }
    }
    for ins in &sim.insulators {
        if ins.flashed {
            println!(
                "Insulator at pole {}, from {} to {} flashed over at {:e} seconds",
                ins.pole + 1,
                ins.from,
                ins.to,
                ins.t_flash
            );
        } else {
            println!(
                "Insulator at pole {}, from {} to {} per-unit SI = {:e}",
                ins.pole + 1,
                ins.from,
                ins.to,
                ins.si
            );
        }
    }
    for lpm in &sim.lpms {
        if lpm.mode == FlashMode::Flashed {
            println!(
                "Insulator at pole {}, from {} to {} flashed over at {:e} seconds",
                lpm.pole + 1,
                lpm.from,
                lpm.to,
                lpm.t_flash
            );
        } else {
            println!(
                "Insulator at pole {}, from {} to {} per-unit SI = {:e}",
                lpm.pole + 1,
                lpm.from,
                lpm.to,
                lpm.si
            );
        }
    }
    for a in &sim.arresters {
        if a.t_start > 0.0 {
            println!(
                "Arrester at pole {}, from {} to {} discharged {:e} Amperes",
                a.pole + 1,
                a.from,
                a.to,
                a.i_peak
            );
            println!("\tTime operated: {:e}\tTime of peak: {:e}", a.t_start, a.t_peak);
            println!("\tCharge: {:e}\n\tEnergy: {:e}", a.charge, a.energy);
        }
    }
    for a in &sim.arrbezs {
        if a.t_start > 0.0 {
            println!(
                "Arrester at pole {}, from {} to {} discharged {:e} Amperes",
                a.pole + 1,
                a.from,
                a.to,
                a.i_peak
            );
            println!("\tTime operated: {:e}\tTime of peak: {:e}", a.t_start, a.t_peak);
            println!("\tCharge: {:e}\n\tEnergy: {:e}", a.charge, a.energy);
        }
    }
    for c in &sim.customers {
        println!("Customer at pole {}, from {} to {}", c.pole + 1, c.from, c.to);
        println!("\tMax Vp  = {:e} volts", c.vp);
        println!("\tMax Ihg = {:e} amps", c.ihg);
        println!("\tMax Ix2 = {:e} amps", c.ix2_peak);
    }
    for g in &sim.pipegaps {
        if g.i_peak != 0.0 {
            println!(
                "Pipegap at pole {}, from {} to {} discharged {:e} Amperes",
                g.pole + 1,
                g.from,
                g.to,
                g.i_peak
            );
        }
    }

    println!();
    println!("Output Values:");
    println!("  SI:      {:e}", answers.si);
    println!("  Energy:  {:e}", answers.energy);
    println!("  Current: {:e}", answers.current);
    println!("  Charge:  {:e}", answers.charge);
    println!("  Pipegap: {:e}", answers.predischarge);
}
