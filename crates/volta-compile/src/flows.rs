//! Post-processing of a solved voltage vector into branch flows.
//!
//! Solvers produce voltages; everything an operator actually reads (branch
//! power flows, losses, loadings, the slack injection) is derived here.
//! The circuit itself is read-only input: post-processing never feeds back
//! into the compiled arrays.

use num_complex::Complex64;
use serde::Serialize;
use volta_core::{VoltaError, VoltaResult};

use crate::circuit::NumericalCircuit;
use crate::matrices::{row_dot, spmv};

/// Guard against zero branch ratings when computing loadings.
const EPS_RATE: f64 = 1e-9;

/// Derived quantities for one solved state.
#[derive(Debug, Clone, Serialize)]
pub struct BranchFlows {
    /// Bus injections (p.u.) with slack and PV reactive terms filled in
    /// from the solved state.
    pub sbus: Vec<Complex64>,
    /// From-side branch power (MVA).
    pub sf: Vec<Complex64>,
    /// To-side branch power (MVA).
    pub st: Vec<Complex64>,
    /// Series plus shunt losses per branch (MVA), `Sf + St`.
    pub losses: Vec<Complex64>,
    /// Loading fraction: the worse of the two sides over the rating.
    pub loading: Vec<f64>,
    /// From-side branch current (p.u.).
    pub if_pu: Vec<Complex64>,
    /// To-side branch current (p.u.).
    pub it_pu: Vec<Complex64>,
    /// Complex voltage drop across each branch.
    pub vbranch: Vec<Complex64>,
}

/// Derive branch flows and completed injections from a solved voltage.
///
/// The slack rows of `sbus` are replaced by the power balance at those
/// buses; PV rows keep their specified P and take Q from the solved state.
/// Inactive branches have zero incidence rows, so their flows come out
/// exactly zero without special-casing.
pub fn post_process(nc: &NumericalCircuit, v: &[Complex64]) -> VoltaResult<BranchFlows> {
    if v.len() != nc.nbus {
        return Err(VoltaError::dimension("solved voltage vector", nc.nbus, v.len()));
    }

    let mut sbus = nc.sbus.clone();
    for &bus in &nc.indices.vd {
        sbus[bus] = v[bus] * row_dot(&nc.admittances.ybus, bus, v).conj();
    }
    for &bus in &nc.indices.pv {
        let q = (v[bus] * row_dot(&nc.admittances.ybus, bus, v).conj()).im;
        sbus[bus] = Complex64::new(sbus[bus].re, q);
    }

    // Terminal voltages through the incidence matrices: an open branch
    // sees zero on both sides.
    let mut vf = vec![Complex64::new(0.0, 0.0); nc.nbr];
    let mut vt = vec![Complex64::new(0.0, 0.0); nc.nbr];
    for (val, (branch, bus)) in nc.conn.cf.iter() {
        vf[branch] += *val * v[bus];
    }
    for (val, (branch, bus)) in nc.conn.ct.iter() {
        vt[branch] += *val * v[bus];
    }

    let if_pu = spmv(&nc.admittances.yf, v)?;
    let it_pu = spmv(&nc.admittances.yt, v)?;

    let mut sf = Vec::with_capacity(nc.nbr);
    let mut st = Vec::with_capacity(nc.nbr);
    let mut losses = Vec::with_capacity(nc.nbr);
    let mut loading = Vec::with_capacity(nc.nbr);
    let mut vbranch = Vec::with_capacity(nc.nbr);
    for i in 0..nc.nbr {
        let sf_i = vf[i] * if_pu[i].conj() * nc.sbase;
        let st_i = vt[i] * it_pu[i].conj() * nc.sbase;
        sf.push(sf_i);
        st.push(st_i);
        losses.push(sf_i + st_i);
        loading.push(sf_i.norm().max(st_i.norm()) / (nc.rates[i] + EPS_RATE));
        vbranch.push(vf[i] - vt[i]);
    }

    Ok(BranchFlows {
        sbus,
        sf,
        st,
        losses,
        loading,
        if_pu,
        it_pu,
        vbranch,
    })
}
