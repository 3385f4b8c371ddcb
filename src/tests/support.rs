use crate::circuit::{Branch, Bus, BusType, Circuit, ControlMode, Gen};

pub(crate) fn bus(i: usize, bus_type: BusType, pd: f64, qd: f64) -> Bus {
    Bus {
        bus_i: i,
        bus_type,
        pd,
        qd,
        ..Default::default()
    }
}

pub(crate) fn line(f: usize, t: usize, r: f64, x: f64, b: f64) -> Branch {
    Branch {
        f_bus: f,
        t_bus: t,
        br_r: r,
        br_x: x,
        br_b: b,
        ..Default::default()
    }
}

pub(crate) fn gen(gen_bus: usize, pg: f64, vg: f64) -> Gen {
    Gen {
        gen_bus,
        pg,
        vg,
        qmax: 300.0,
        qmin: -300.0,
        pmax: 250.0,
        ..Default::default()
    }
}

/// Slack, PV and PQ bus joined in a triangle. Well conditioned and
/// lightly loaded.
pub(crate) fn three_bus() -> Circuit {
    Circuit {
        name: "three_bus".to_string(),
        base_mva: 100.0,
        bus: vec![
            bus(0, BusType::Slack, 0.0, 0.0),
            bus(1, BusType::PV, 0.0, 0.0),
            bus(2, BusType::PQ, 90.0, 30.0),
        ],
        gen: vec![gen(0, 0.0, 1.0), {
            let mut g = gen(1, 50.0, 1.02);
            g.qg = 10.0;
            g
        }],
        branch: vec![
            line(0, 1, 0.01, 0.05, 0.02),
            line(0, 2, 0.02, 0.06, 0.02),
            line(1, 2, 0.02, 0.06, 0.02),
        ],
    }
}

/// `three_bus` plus a second component: two buses joined by one line,
/// with its own slack generator.
pub(crate) fn two_component() -> Circuit {
    let mut c = three_bus();
    c.name = "two_component".to_string();
    c.bus.push(bus(3, BusType::Slack, 0.0, 0.0));
    c.bus.push(bus(4, BusType::PQ, 40.0, 10.0));
    c.gen.push(gen(3, 0.0, 1.0));
    c.branch.push(line(3, 4, 0.01, 0.05, 0.0));
    c
}

/// `three_bus` with the 1-2 line replaced by a voltage controlling
/// transformer holding bus 2.
pub(crate) fn with_regulating_transformer(vset: f64) -> Circuit {
    let mut c = three_bus();
    let br = &mut c.branch[2];
    br.br_b = 0.0;
    br.control_mode = ControlMode::VoltageModule;
    br.ctrl_bus = Some(2);
    br.vset = vset;
    c
}

/// `three_bus` with a converter inserted between bus 0 and bus 2 in
/// place of the plain line, keeping the default zero reactive flow
/// constraint.
pub(crate) fn with_converter() -> Circuit {
    let mut c = three_bus();
    let br = &mut c.branch[1];
    br.br_b = 0.0;
    br.is_converter = true;
    c
}
