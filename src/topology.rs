use crate::circuit::{Circuit, ControlMode};
use crate::report::SolveReport;

/// One connected component of the network, self contained: the sliced
/// circuit owns private copies of every array and keeps the original
/// index lists for merging results back into the full arrays.
#[derive(Debug, Clone)]
pub struct Island {
    pub circuit: Circuit,

    /// Original bus indices, ascending.
    pub bus_idx: Vec<usize>,

    /// Original branch indices, ascending.
    pub branch_idx: Vec<usize>,

    /// Original generator indices, ascending.
    pub gen_idx: Vec<usize>,
}

/// Finds the connected components of the adjacency relation over active
/// buses. Non-recursive traversal; deterministic for equal inputs.
/// Each island is returned sorted ascending.
pub fn find_islands(adjacency: &[Vec<usize>], active: &[bool]) -> Vec<Vec<usize>> {
    let n = adjacency.len();
    let mut visited = vec![false; n];
    let mut islands = Vec::new();

    for node in 0..n {
        if visited[node] || !active[node] {
            continue;
        }

        let mut island = Vec::new();
        let mut stack = vec![node];
        while let Some(v) = stack.pop() {
            if visited[v] {
                continue;
            }
            visited[v] = true;
            island.push(v);

            for &w in &adjacency[v] {
                if !visited[w] && active[w] {
                    stack.push(w);
                }
            }
        }

        island.sort_unstable();
        islands.push(island);
    }

    islands
}

/// Builds the undirected bus adjacency lists over active buses connected
/// by active branches.
pub fn adjacency(circuit: &Circuit) -> Vec<Vec<usize>> {
    let mut adj = vec![Vec::new(); circuit.nb()];
    for br in circuit.branch.iter().filter(|br| br.is_on()) {
        if circuit.bus[br.f_bus].is_on() && circuit.bus[br.t_bus].is_on() {
            adj[br.f_bus].push(br.t_bus);
            adj[br.t_bus].push(br.f_bus);
        }
    }
    adj
}

/// Splits the circuit into one self-contained circuit per connected
/// component, remapping every index array. The remapping preserves
/// bus-to-device relationships exactly.
pub fn split_into_islands(
    circuit: &Circuit,
    ignore_single_node_islands: bool,
    report: &mut SolveReport,
) -> Vec<Island> {
    let adj = adjacency(circuit);
    let active: Vec<bool> = circuit.bus.iter().map(|b| b.is_on()).collect();

    let mut out = Vec::new();
    for bus_idx in find_islands(&adj, &active) {
        if ignore_single_node_islands && bus_idx.len() == 1 {
            log::debug!("ignoring single bus island at bus {}", bus_idx[0]);
            continue;
        }
        out.push(slice_island(circuit, bus_idx, report));
    }
    out
}

fn slice_island(circuit: &Circuit, bus_idx: Vec<usize>, report: &mut SolveReport) -> Island {
    let nb = circuit.nb();

    // old bus index -> new island-local index
    let mut bus_map = vec![usize::MAX; nb];
    for (new, &old) in bus_idx.iter().enumerate() {
        bus_map[old] = new;
    }
    let in_island = |i: usize| bus_map[i] != usize::MAX;

    let mut bus = Vec::with_capacity(bus_idx.len());
    for (new, &old) in bus_idx.iter().enumerate() {
        let mut b = circuit.bus[old].clone();
        b.bus_i = new;
        bus.push(b);
    }

    let mut branch = Vec::new();
    let mut branch_idx = Vec::new();
    for (k, br) in circuit.branch.iter().enumerate() {
        if in_island(br.f_bus) && in_island(br.t_bus) {
            let mut b = br.clone();
            b.f_bus = bus_map[br.f_bus];
            b.t_bus = bus_map[br.t_bus];
            match br.ctrl_bus {
                Some(cb) if in_island(cb) => b.ctrl_bus = Some(bus_map[cb]),
                Some(cb) => {
                    // the regulated bus ended up in another island; a
                    // retargeted setpoint would be meaningless
                    b.ctrl_bus = None;
                    b.control_mode = ControlMode::Fixed;
                    report.add_warning(
                        "controlled bus is outside the island, branch control fixed",
                        format!("branch {} -> bus {}", k, cb),
                        0.0,
                        0.0,
                    );
                }
                None => {}
            }
            branch.push(b);
            branch_idx.push(k);
        }
    }

    let mut gen = Vec::new();
    let mut gen_idx = Vec::new();
    for (i, g) in circuit.gen.iter().enumerate() {
        if in_island(g.gen_bus) {
            let mut g = g.clone();
            g.gen_bus = bus_map[g.gen_bus];
            gen.push(g);
            gen_idx.push(i);
        }
    }

    Island {
        circuit: Circuit {
            name: circuit.name.clone(),
            base_mva: circuit.base_mva,
            bus,
            gen,
            branch,
        },
        bus_idx,
        branch_idx,
        gen_idx,
    }
}
