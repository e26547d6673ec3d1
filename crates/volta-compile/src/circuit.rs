//! Compilation of a device-level [`Grid`] into the numerical circuit.
//!
//! Compilation walks the devices exactly once, in the canonical branch
//! order, and fills positionally aligned arrays: entry `i` of every branch
//! array describes the same branch, entry `k` of every bus array the same
//! bus. All per-unit conversion happens here; downstream code never sees
//! megawatts again.

use num_complex::Complex64;
use tracing::{debug, instrument};
use volta_core::diagnostics::Diagnostics;
use volta_core::{BusType, Grid, VoltaError, VoltaResult};

use crate::connectivity::Connectivity;
use crate::indices::SimulationIndices;
use crate::matrices::{AdmittanceMatrices, FastDecoupled, SeriesAdmittances};
use crate::primitives::{AdmittanceModel, BranchPrimitives, PrimitiveOptions};

/// Knobs for one compilation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    pub primitives: PrimitiveOptions,
}

/// The solver-ready numerical snapshot of one grid (or one island of it).
///
/// Bus and branch arrays are positional; `original_bus_idx` and
/// `original_branch_idx` map positions back to the frame this circuit was
/// sliced from (the identity for a full compilation).
#[derive(Debug, Clone)]
pub struct NumericalCircuit {
    pub name: String,
    /// Power base (MVA).
    pub sbase: f64,
    pub nbus: usize,
    pub nbr: usize,

    // Bus frame.
    pub bus_names: Vec<String>,
    pub bus_active: Vec<bool>,
    pub bus_base_kv: Vec<f64>,
    /// Initial complex voltage seed per bus.
    pub v0: Vec<Complex64>,
    /// Per-unit complex power injection per bus (generation minus load).
    pub sbus: Vec<Complex64>,
    /// Per-unit complex current injection per bus.
    pub ibus: Vec<Complex64>,
    /// Per-unit shunt-device admittance aggregated per bus.
    pub yshunt_bus: Vec<Complex64>,
    pub vmin: Vec<f64>,
    pub vmax: Vec<f64>,
    /// Aggregated reactive bounds (p.u.) of the controlling devices per bus.
    pub qmin_bus: Vec<f64>,
    pub qmax_bus: Vec<f64>,
    pub original_bus_idx: Vec<usize>,

    // Branch frame, canonical order.
    pub branch_names: Vec<String>,
    /// Effective branch state: the device flag and both terminal buses.
    pub branch_active: Vec<bool>,
    pub f: Vec<usize>,
    pub t: Vec<usize>,
    /// Rating (MVA).
    pub rates: Vec<f64>,
    pub technologies: Vec<&'static str>,
    pub primitives: Vec<BranchPrimitives>,
    pub original_branch_idx: Vec<usize>,

    // Assembled outputs.
    pub conn: Connectivity,
    pub admittances: AdmittanceMatrices,
    pub series: SeriesAdmittances,
    pub fast_decoupled: FastDecoupled,
    pub indices: SimulationIndices,
}

/// Gather the primitive vectors and run every matrix assembler.
pub(crate) fn assemble_matrices(
    primitives: &[BranchPrimitives],
    conn: &Connectivity,
    yshunt_bus: &[Complex64],
) -> VoltaResult<(AdmittanceMatrices, SeriesAdmittances, FastDecoupled)> {
    let yff: Vec<Complex64> = primitives.iter().map(|p| p.full.yff).collect();
    let yft: Vec<Complex64> = primitives.iter().map(|p| p.full.yft).collect();
    let ytf: Vec<Complex64> = primitives.iter().map(|p| p.full.ytf).collect();
    let ytt: Vec<Complex64> = primitives.iter().map(|p| p.full.ytt).collect();
    let admittances = AdmittanceMatrices::assemble(&yff, &yft, &ytf, &ytt, conn, yshunt_bus)?;

    let yffs: Vec<Complex64> = primitives.iter().map(|p| p.series.yff).collect();
    let yfts: Vec<Complex64> = primitives.iter().map(|p| p.series.yft).collect();
    let ytfs: Vec<Complex64> = primitives.iter().map(|p| p.series.ytf).collect();
    let ytts: Vec<Complex64> = primitives.iter().map(|p| p.series.ytt).collect();
    let ysh: Vec<Complex64> = primitives.iter().map(|p| p.series.ysh).collect();
    let series =
        SeriesAdmittances::assemble(&yffs, &yfts, &ytfs, &ytts, &ysh, conn, yshunt_bus)?;

    let x: Vec<f64> = primitives.iter().map(|p| p.fd.x).collect();
    let b_total: Vec<f64> = primitives.iter().map(|p| p.fd.b_total).collect();
    let tap: Vec<f64> = primitives.iter().map(|p| p.fd.tap_module).collect();
    let vtap_f: Vec<f64> = primitives.iter().map(|p| p.fd.vtap_f).collect();
    let vtap_t: Vec<f64> = primitives.iter().map(|p| p.fd.vtap_t).collect();
    let fast_decoupled =
        FastDecoupled::assemble(&x, &b_total, &tap, &vtap_f, &vtap_t, conn)?;

    Ok((admittances, series, fast_decoupled))
}

impl NumericalCircuit {
    /// Compile a device-level grid into a solver-ready snapshot.
    ///
    /// Structural defects (dangling bus references, empty grid) are hard
    /// errors; degraded-but-compilable conditions (no slack, inactive
    /// islands) land in `diag`.
    #[instrument(skip_all, fields(grid = %grid.name))]
    pub fn compile(
        grid: &Grid,
        opts: &CompileOptions,
        diag: &mut Diagnostics,
    ) -> VoltaResult<Self> {
        grid.check_references()?;
        grid.validate_into(diag);
        if grid.buses.is_empty() {
            return Err(VoltaError::Config("cannot compile a grid with no buses".into()));
        }
        if grid.sbase <= 0.0 {
            return Err(VoltaError::Config(format!(
                "invalid power base {} MVA",
                grid.sbase
            )));
        }

        let nbus = grid.bus_count();
        let nbr = grid.branch_count();
        let sbase = grid.sbase;

        // Bus frame.
        let bus_names: Vec<String> = grid.buses.iter().map(|b| b.name.clone()).collect();
        let bus_active: Vec<bool> = grid.buses.iter().map(|b| b.active).collect();
        let bus_base_kv: Vec<f64> = grid.buses.iter().map(|b| b.base_kv.value()).collect();
        let vmin: Vec<f64> = grid.buses.iter().map(|b| b.vmin.value()).collect();
        let vmax: Vec<f64> = grid.buses.iter().map(|b| b.vmax.value()).collect();

        let mut bus_types: Vec<BusType> = grid
            .buses
            .iter()
            .map(|b| if b.is_slack { BusType::Slack } else { BusType::PQ })
            .collect();
        let mut vm_seed: Vec<f64> = grid.buses.iter().map(|b| b.v0.value()).collect();
        let va_seed: Vec<f64> = grid.buses.iter().map(|b| b.angle0.value()).collect();

        let mut sbus = vec![Complex64::new(0.0, 0.0); nbus];
        let mut ibus = vec![Complex64::new(0.0, 0.0); nbus];
        let mut yshunt_bus = vec![Complex64::new(0.0, 0.0); nbus];
        let mut qmin_bus = vec![0.0; nbus];
        let mut qmax_bus = vec![0.0; nbus];

        for load in grid.loads.iter().filter(|d| d.active) {
            sbus[load.bus] -= Complex64::new(load.p.value(), load.q.value()) / sbase;
            ibus[load.bus] -= Complex64::new(load.ir, load.ii) / sbase;
        }
        for shunt in grid.shunts.iter().filter(|d| d.active) {
            yshunt_bus[shunt.bus] += Complex64::new(shunt.g.value(), shunt.b.value()) / sbase;
        }
        for (bus, p, vset, controlled, qmin, qmax) in grid
            .generators
            .iter()
            .filter(|d| d.active)
            .map(|d| {
                (
                    d.bus,
                    d.p.value(),
                    d.vset.value(),
                    d.is_controlled,
                    d.qmin.value(),
                    d.qmax.value(),
                )
            })
            .chain(grid.batteries.iter().filter(|d| d.active).map(|d| {
                (
                    d.bus,
                    d.p.value(),
                    d.vset.value(),
                    d.is_controlled,
                    d.qmin.value(),
                    d.qmax.value(),
                )
            }))
        {
            sbus[bus] += Complex64::new(p, 0.0) / sbase;
            qmin_bus[bus] += qmin / sbase;
            qmax_bus[bus] += qmax / sbase;
            if controlled && bus_active[bus] {
                if bus_types[bus] == BusType::PQ {
                    bus_types[bus] = BusType::PV;
                }
                vm_seed[bus] = vset;
            }
        }

        // An inactive bus is electrically absent: PQ with no injection.
        for (i, active) in bus_active.iter().enumerate() {
            if !active {
                bus_types[i] = BusType::PQ;
                sbus[i] = Complex64::new(0.0, 0.0);
                ibus[i] = Complex64::new(0.0, 0.0);
                yshunt_bus[i] = Complex64::new(0.0, 0.0);
                qmin_bus[i] = 0.0;
                qmax_bus[i] = 0.0;
            }
        }

        let v0: Vec<Complex64> = vm_seed
            .iter()
            .zip(&va_seed)
            .map(|(vm, va)| Complex64::from_polar(*vm, *va))
            .collect();

        // Branch frame.
        let mut branch_names = Vec::with_capacity(nbr);
        let mut branch_active = Vec::with_capacity(nbr);
        let mut f = Vec::with_capacity(nbr);
        let mut t = Vec::with_capacity(nbr);
        let mut rates = Vec::with_capacity(nbr);
        let mut technologies = Vec::with_capacity(nbr);
        let mut primitives = Vec::with_capacity(nbr);

        for br in grid.branch_iter() {
            let (fi, ti) = (br.from_bus(), br.to_bus());
            let active = br.is_active() && bus_active[fi] && bus_active[ti];
            let prim = br.primitives(
                &opts.primitives,
                grid.buses[fi].base_kv,
                grid.buses[ti].base_kv,
            );
            if active {
                if br.rate().value() == 0.0 {
                    diag.add_warning_for(
                        "rating",
                        "zero thermal rating, loading will use the epsilon guard",
                        format!("{} {}", br.technology(), br.name()),
                    );
                }
                if matches!(br, volta_core::BranchRef::Line(_) | volta_core::BranchRef::Transformer2W(_))
                    && prim.fd.x.abs() < 1e-12
                {
                    diag.add_warning_for(
                        "conditioning",
                        "near-zero series reactance, fast-decoupled matrices are regularized",
                        format!("{} {}", br.technology(), br.name()),
                    );
                }
            }
            branch_names.push(br.name().to_string());
            branch_active.push(active);
            f.push(fi);
            t.push(ti);
            rates.push(br.rate().value());
            technologies.push(br.technology());
            primitives.push(prim);
        }

        let conn = Connectivity::build(&f, &t, &branch_active, &branch_names, nbus)?;
        let (admittances, series, fast_decoupled) =
            assemble_matrices(&primitives, &conn, &yshunt_bus)?;

        let p_injection: Vec<f64> = sbus.iter().map(|s| s.re).collect();
        let indices = SimulationIndices::classify(&bus_types, &p_injection, diag);

        debug!(nbus, nbr, "compiled numerical circuit");

        Ok(Self {
            name: grid.name.clone(),
            sbase,
            nbus,
            nbr,
            bus_names,
            bus_active,
            bus_base_kv,
            v0,
            sbus,
            ibus,
            yshunt_bus,
            vmin,
            vmax,
            qmin_bus,
            qmax_bus,
            original_bus_idx: (0..nbus).collect(),
            branch_names,
            branch_active,
            f,
            t,
            rates,
            technologies,
            primitives,
            original_branch_idx: (0..nbr).collect(),
            conn,
            admittances,
            series,
            fast_decoupled,
            indices,
        })
    }

    /// Effective bus types after classification.
    pub fn bus_types(&self) -> &[BusType] {
        &self.indices.bus_types
    }
}
