//! Electrical island detection and extraction.
//!
//! Opening a breaker can split a grid into galvanically separate islands
//! that must be solved independently. Detection is a breadth-first search
//! over the active subgraph; extraction is a pure projection of the parent
//! circuit onto one island's buses. The parent is never mutated, and the
//! `original_*_idx` back-maps always point into the frame the parent was
//! compiled from, so nested slicing composes.

use tracing::debug;
use volta_core::diagnostics::Diagnostics;
use volta_core::{VoltaError, VoltaResult};

use crate::circuit::{assemble_matrices, NumericalCircuit};
use crate::connectivity::Connectivity;
use crate::indices::SimulationIndices;

/// Policy knobs for island splitting.
#[derive(Debug, Clone, Copy, Default)]
pub struct IslandSplitOptions {
    /// Drop islands made of a single bus with no branches at all. Such a
    /// bus usually marks a modeling gap rather than a solvable grid.
    pub discard_isolated_buses: bool,
}

/// Connected components of the active subgraph.
///
/// Components are sorted internally and ordered by their smallest bus
/// index. Inactive buses belong to no island.
pub fn find_islands(
    nbus: usize,
    f: &[usize],
    t: &[usize],
    branch_active: &[bool],
    bus_active: &[bool],
) -> Vec<Vec<usize>> {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); nbus];
    for i in 0..f.len() {
        if branch_active[i] && bus_active[f[i]] && bus_active[t[i]] {
            adjacency[f[i]].push(t[i]);
            adjacency[t[i]].push(f[i]);
        }
    }

    let mut visited = vec![false; nbus];
    let mut islands = Vec::new();
    for start in 0..nbus {
        if visited[start] || !bus_active[start] {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = std::collections::VecDeque::from([start]);
        visited[start] = true;
        while let Some(bus) = queue.pop_front() {
            component.push(bus);
            for &next in &adjacency[bus] {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        component.sort_unstable();
        islands.push(component);
    }
    islands
}

impl NumericalCircuit {
    /// Islands of this circuit's active subgraph.
    pub fn islands(&self) -> Vec<Vec<usize>> {
        find_islands(
            self.nbus,
            &self.f,
            &self.t,
            &self.branch_active,
            &self.bus_active,
        )
    }

    /// Project this circuit onto the given bus subset.
    ///
    /// Branches whose terminals both fall inside the subset are kept with
    /// remapped endpoints; everything else is dropped. Matrices and index
    /// sets are rebuilt for the sliced frame. `self` is untouched.
    pub fn subgrid(&self, bus_idx: &[usize], diag: &mut Diagnostics) -> VoltaResult<Self> {
        if bus_idx.is_empty() {
            return Err(VoltaError::Config("cannot slice an empty bus subset".into()));
        }
        let mut bus_map = vec![usize::MAX; self.nbus];
        for (new, &old) in bus_idx.iter().enumerate() {
            if old >= self.nbus {
                return Err(VoltaError::dimension("bus subset index", self.nbus, old));
            }
            bus_map[old] = new;
        }

        let branch_idx: Vec<usize> = (0..self.nbr)
            .filter(|&i| bus_map[self.f[i]] != usize::MAX && bus_map[self.t[i]] != usize::MAX)
            .collect();

        let f: Vec<usize> = branch_idx.iter().map(|&i| bus_map[self.f[i]]).collect();
        let t: Vec<usize> = branch_idx.iter().map(|&i| bus_map[self.t[i]]).collect();
        let branch_active: Vec<bool> =
            branch_idx.iter().map(|&i| self.branch_active[i]).collect();
        let branch_names: Vec<String> = branch_idx
            .iter()
            .map(|&i| self.branch_names[i].clone())
            .collect();
        let primitives = branch_idx
            .iter()
            .map(|&i| self.primitives[i])
            .collect::<Vec<_>>();

        let yshunt_bus: Vec<_> = bus_idx.iter().map(|&i| self.yshunt_bus[i]).collect();
        let conn = Connectivity::build(&f, &t, &branch_active, &branch_names, bus_idx.len())?;
        let (admittances, series, fast_decoupled) =
            assemble_matrices(&primitives, &conn, &yshunt_bus)?;

        let bus_types: Vec<_> = bus_idx
            .iter()
            .map(|&i| self.indices.bus_types[i])
            .collect();
        let sbus: Vec<_> = bus_idx.iter().map(|&i| self.sbus[i]).collect();
        let p_injection: Vec<f64> = sbus.iter().map(|s| s.re).collect();
        let indices = SimulationIndices::classify(&bus_types, &p_injection, diag);

        debug!(
            nbus = bus_idx.len(),
            nbr = branch_idx.len(),
            "sliced island circuit"
        );

        Ok(Self {
            name: self.name.clone(),
            sbase: self.sbase,
            nbus: bus_idx.len(),
            nbr: branch_idx.len(),
            bus_names: bus_idx
                .iter()
                .map(|&i| self.bus_names[i].clone())
                .collect(),
            bus_active: bus_idx.iter().map(|&i| self.bus_active[i]).collect(),
            bus_base_kv: bus_idx.iter().map(|&i| self.bus_base_kv[i]).collect(),
            v0: bus_idx.iter().map(|&i| self.v0[i]).collect(),
            sbus,
            ibus: bus_idx.iter().map(|&i| self.ibus[i]).collect(),
            yshunt_bus,
            vmin: bus_idx.iter().map(|&i| self.vmin[i]).collect(),
            vmax: bus_idx.iter().map(|&i| self.vmax[i]).collect(),
            qmin_bus: bus_idx.iter().map(|&i| self.qmin_bus[i]).collect(),
            qmax_bus: bus_idx.iter().map(|&i| self.qmax_bus[i]).collect(),
            original_bus_idx: bus_idx
                .iter()
                .map(|&i| self.original_bus_idx[i])
                .collect(),
            branch_names,
            branch_active,
            f,
            t,
            rates: branch_idx.iter().map(|&i| self.rates[i]).collect(),
            technologies: branch_idx
                .iter()
                .map(|&i| self.technologies[i])
                .collect(),
            primitives,
            original_branch_idx: branch_idx
                .iter()
                .map(|&i| self.original_branch_idx[i])
                .collect(),
            conn,
            admittances,
            series,
            fast_decoupled,
            indices,
        })
    }

    /// Split into independently solvable island circuits.
    ///
    /// A connected grid comes back as a single-element vector holding a
    /// clone of `self` with no re-slicing.
    pub fn split_into_islands(
        &self,
        opts: IslandSplitOptions,
        diag: &mut Diagnostics,
    ) -> VoltaResult<Vec<Self>> {
        let mut islands = self.islands();
        if opts.discard_isolated_buses {
            islands.retain(|island| {
                if island.len() > 1 {
                    return true;
                }
                diag.add_warning_for(
                    "topology",
                    "discarding single-bus island",
                    self.bus_names[island[0]].clone(),
                );
                false
            });
        }
        if islands.len() == 1 && islands[0].len() == self.nbus {
            return Ok(vec![self.clone()]);
        }
        debug!(count = islands.len(), "splitting circuit into islands");
        islands
            .iter()
            .map(|bus_idx| self.subgrid(bus_idx, diag))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::CompileOptions;
    use num_complex::Complex64;
    use volta_core::{Bus, Generator, Grid, Line, Load};

    /// Two radial islands: {0,1} with its own slack, {2,3} without one.
    fn split_grid() -> Grid {
        let mut grid = Grid::new("split");
        grid.buses = vec![
            Bus::new("a0", 132.0).as_slack(),
            Bus::new("a1", 132.0),
            Bus::new("b0", 132.0),
            Bus::new("b1", 132.0),
        ];
        grid.lines.push(Line::new("la", 0, 1, 0.01, 0.1, 0.0));
        grid.lines.push(Line::new("lb", 2, 3, 0.01, 0.1, 0.0));
        // The tie line exists but is out of service.
        grid.lines.push(Line {
            active: false,
            ..Line::new("tie", 1, 2, 0.01, 0.1, 0.0)
        });
        grid.generators.push(Generator::new("g0", 0, 10.0));
        grid.generators.push(Generator::new("g2", 2, 20.0));
        grid.loads.push(Load::new("d1", 1, 5.0, 1.0));
        grid.loads.push(Load::new("d3", 3, 8.0, 2.0));
        grid
    }

    fn compile(grid: &Grid) -> NumericalCircuit {
        let mut diag = Diagnostics::default();
        NumericalCircuit::compile(grid, &CompileOptions::default(), &mut diag).unwrap()
    }

    #[test]
    fn finds_components_of_the_active_subgraph() {
        let nc = compile(&split_grid());
        let islands = nc.islands();
        assert_eq!(islands, vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn closing_the_tie_merges_the_islands() {
        let mut grid = split_grid();
        grid.lines[2].active = true;
        let nc = compile(&grid);
        assert_eq!(nc.islands(), vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn inactive_bus_belongs_to_no_island() {
        let mut grid = split_grid();
        grid.buses[3].active = false;
        let nc = compile(&grid);
        assert_eq!(nc.islands(), vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn single_island_circuit_comes_back_whole() {
        let mut grid = split_grid();
        grid.lines[2].active = true;
        let nc = compile(&grid);
        let mut diag = Diagnostics::default();
        let parts = nc.split_into_islands(IslandSplitOptions::default(), &mut diag).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].nbus, nc.nbus);
        assert_eq!(parts[0].original_bus_idx, nc.original_bus_idx);
    }

    #[test]
    fn split_slices_and_back_maps() {
        let nc = compile(&split_grid());
        let mut diag = Diagnostics::default();
        let parts = nc.split_into_islands(IslandSplitOptions::default(), &mut diag).unwrap();
        assert_eq!(parts.len(), 2);

        let a = &parts[0];
        assert_eq!(a.original_bus_idx, vec![0, 1]);
        assert_eq!(a.original_branch_idx, vec![0]);
        assert_eq!(a.indices.vd, vec![0]);
        assert!((a.sbus[1] - Complex64::new(-0.05, -0.01)).norm() < 1e-12);

        // The second island had no slack: its largest PV bus is promoted.
        let b = &parts[1];
        assert_eq!(b.original_bus_idx, vec![2, 3]);
        assert_eq!(b.original_branch_idx, vec![1]);
        assert_eq!(b.indices.vd, vec![0]);
        assert_eq!(diag.warning_count(), 1);

        // The parent is untouched.
        assert_eq!(nc.nbus, 4);
        assert_eq!(nc.nbr, 3);
    }

    #[test]
    fn isolated_buses_can_be_discarded() {
        let mut grid = split_grid();
        // Strand bus 3 entirely.
        grid.lines[1].active = false;
        let nc = compile(&grid);
        assert_eq!(nc.islands(), vec![vec![0, 1], vec![2], vec![3]]);

        let mut diag = Diagnostics::default();
        let parts = nc
            .split_into_islands(
                IslandSplitOptions {
                    discard_isolated_buses: true,
                },
                &mut diag,
            )
            .unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].original_bus_idx, vec![0, 1]);
        // One warning per discarded bus.
        assert_eq!(
            diag.warnings()
                .filter(|w| w.category == "topology")
                .count(),
            2
        );
    }

    #[test]
    fn island_matrices_are_blocks_of_the_parent() {
        let nc = compile(&split_grid());
        let mut diag = Diagnostics::default();
        let parts = nc.split_into_islands(IslandSplitOptions::default(), &mut diag).unwrap();
        for part in &parts {
            for bi in 0..part.nbus {
                for bj in 0..part.nbus {
                    let got = part
                        .admittances
                        .ybus
                        .get(bi, bj)
                        .copied()
                        .unwrap_or_default();
                    let want = nc
                        .admittances
                        .ybus
                        .get(part.original_bus_idx[bi], part.original_bus_idx[bj])
                        .copied()
                        .unwrap_or_default();
                    assert!((got - want).norm() < 1e-12);
                }
            }
        }
    }
}
