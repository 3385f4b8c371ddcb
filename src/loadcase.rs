use anyhow::{anyhow, Context, Result};
use caseformat::{read_dir, read_zip};
use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;

use crate::circuit::{Branch, Bus, BusType, Circuit, Gen};

/// Reads a case file (zip archive) or case directory (CSV files) and
/// compiles it into a circuit with internal consecutive bus numbering.
///
/// The case format has no converter or ZIP load columns, so loaded
/// branches are plain lines/transformers and loads are constant power.
pub fn load_case(case_path: &PathBuf) -> Result<Circuit> {
    let is_case = match case_path.extension() {
        None => false,
        Some(os_str) => os_str.to_str() == Some("case"),
    };

    let (case, bus, gen, branch, _gencost, _dcline, _readme, _license) = if is_case {
        let file = File::open(case_path)
            .with_context(|| format!("opening case file '{}'", case_path.display()))?;
        read_zip(file)?
    } else {
        read_dir(case_path)?
    };

    let e2i: HashMap<usize, usize> = bus
        .iter()
        .enumerate()
        .map(|(i, b)| (b.bus_i, i))
        .collect();
    let lookup = |i: usize| -> Result<usize> {
        e2i.get(&i)
            .copied()
            .ok_or_else(|| anyhow!("unknown bus number: {}", i))
    };

    let buses: Vec<Bus> = bus
        .iter()
        .enumerate()
        .map(|(i, b)| Bus {
            bus_i: i,
            bus_type: if b.is_ref() {
                BusType::Slack
            } else if b.is_pv() {
                BusType::PV
            } else {
                BusType::PQ
            },
            pd: b.pd,
            qd: b.qd,
            gs: b.gs,
            bs: b.bs,
            vm: b.vm,
            va: b.va,
            base_kv: b.base_kv,
            vmax: b.vmax,
            vmin: b.vmin,
            in_service: b.is_ref() || b.is_pv() || b.is_pq(),
            ..Default::default()
        })
        .collect();

    let mut gens = Vec::with_capacity(gen.len());
    for g in &gen {
        gens.push(Gen {
            gen_bus: lookup(g.gen_bus)?,
            pg: g.pg,
            qg: g.qg,
            qmax: g.qmax,
            qmin: g.qmin,
            vg: g.vg,
            pmax: g.pmax,
            pmin: g.pmin,
            controllable: true,
            in_service: g.is_on(),
        });
    }

    let mut branches = Vec::with_capacity(branch.len());
    for br in &branch {
        branches.push(Branch {
            f_bus: lookup(br.f_bus)?,
            t_bus: lookup(br.t_bus)?,
            br_r: br.br_r,
            br_x: br.br_x,
            br_b: br.br_b,
            rate_a: br.rate_a,
            tap: if br.tap == 0.0 { 1.0 } else { br.tap },
            tap_angle: br.shift.to_radians(),
            in_service: br.is_on(),
            ..Default::default()
        });
    }

    Ok(Circuit {
        name: case.name.clone(),
        base_mva: case.base_mva,
        bus: buses,
        gen: gens,
        branch: branches,
    })
}
