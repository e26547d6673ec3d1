//! Assembly of the admittance-matrix variants from primitives and
//! connectivity.
//!
//! Three solver families, three variants:
//! - [`AdmittanceMatrices`]: full Ybus/Yf/Yt for Newton-Raphson-class
//!   methods, `Ybus = Cf' Yf + Ct' Yt + diag(Yshunt_bus)`;
//! - [`SeriesAdmittances`]: series-only Yseries plus the aggregated shunt
//!   vector, for HELM and linear-AC methods;
//! - [`FastDecoupled`]: the decoupled susceptance matrices B' and B''.
//!
//! Every assembler is a pure function of its inputs: same primitives and
//! connectivity in, bit-identical matrices out. Shape inconsistencies are
//! fatal dimension errors, caught before any arithmetic.

use num_complex::Complex64;
use sprs::{CsMat, TriMat};
use volta_core::{VoltaError, VoltaResult};

use crate::connectivity::Connectivity;

/// Regularization for fast-decoupled susceptances of zero-reactance
/// branches.
pub const EPS_SUSCEPTANCE: f64 = 1e-20;

/// Widen a real 0/1 incidence matrix to the complex field.
fn complexify(m: &CsMat<f64>) -> CsMat<Complex64> {
    let mut t = TriMat::new(m.shape());
    for (v, (i, j)) in m.iter() {
        t.add_triplet(i, j, Complex64::new(*v, 0.0));
    }
    t.to_csr()
}

fn diag_c(values: &[Complex64]) -> CsMat<Complex64> {
    let n = values.len();
    let mut t = TriMat::new((n, n));
    for (i, v) in values.iter().enumerate() {
        t.add_triplet(i, i, *v);
    }
    t.to_csr()
}

fn diag_r(values: &[f64]) -> CsMat<f64> {
    let n = values.len();
    let mut t = TriMat::new((n, n));
    for (i, v) in values.iter().enumerate() {
        t.add_triplet(i, i, *v);
    }
    t.to_csr()
}

/// Sparse matrix-vector product (CSR row iteration).
pub fn spmv(m: &CsMat<Complex64>, v: &[Complex64]) -> VoltaResult<Vec<Complex64>> {
    if m.cols() != v.len() {
        return Err(VoltaError::dimension(
            "matrix-vector product",
            m.cols(),
            v.len(),
        ));
    }
    let mut out = vec![Complex64::new(0.0, 0.0); m.rows()];
    for (row, vec) in m.outer_iterator().enumerate() {
        let mut acc = Complex64::new(0.0, 0.0);
        for (col, val) in vec.iter() {
            acc += *val * v[col];
        }
        out[row] = acc;
    }
    Ok(out)
}

/// Dot product of one matrix row against a dense vector.
pub fn row_dot(m: &CsMat<Complex64>, row: usize, v: &[Complex64]) -> Complex64 {
    let mut acc = Complex64::new(0.0, 0.0);
    if let Some(r) = m.outer_view(row) {
        for (col, val) in r.iter() {
            acc += *val * v[col];
        }
    }
    acc
}

fn check_branch_len(context: &str, expected: usize, actual: usize) -> VoltaResult<()> {
    if expected != actual {
        return Err(VoltaError::dimension(context, expected, actual));
    }
    Ok(())
}

/// Full admittance matrices for Newton-Raphson-class solvers.
#[derive(Debug, Clone)]
pub struct AdmittanceMatrices {
    /// (nbus x nbus) bus admittance matrix.
    pub ybus: CsMat<Complex64>,
    /// (nbr x nbus) from-side branch admittance matrix.
    pub yf: CsMat<Complex64>,
    /// (nbr x nbus) to-side branch admittance matrix.
    pub yt: CsMat<Complex64>,
    /// Per-bus shunt admittance from shunt devices (the diag term of Ybus).
    pub yshunt_bus: Vec<Complex64>,
}

impl AdmittanceMatrices {
    /// `Yf = diag(yff) Cf + diag(yft) Ct`, `Yt = diag(ytf) Cf + diag(ytt) Ct`,
    /// `Ybus = Cf' Yf + Ct' Yt + diag(yshunt_bus)`.
    pub fn assemble(
        yff: &[Complex64],
        yft: &[Complex64],
        ytf: &[Complex64],
        ytt: &[Complex64],
        conn: &Connectivity,
        yshunt_bus: &[Complex64],
    ) -> VoltaResult<Self> {
        let (nbr, nbus) = conn.shape();
        check_branch_len("yff primitive array", nbr, yff.len())?;
        check_branch_len("yft primitive array", nbr, yft.len())?;
        check_branch_len("ytf primitive array", nbr, ytf.len())?;
        check_branch_len("ytt primitive array", nbr, ytt.len())?;
        check_branch_len("bus shunt admittance array", nbus, yshunt_bus.len())?;

        let cf = complexify(&conn.cf);
        let ct = complexify(&conn.ct);

        let yf = &(&diag_c(yff) * &cf) + &(&diag_c(yft) * &ct);
        let yt = &(&diag_c(ytf) * &cf) + &(&diag_c(ytt) * &ct);

        let cf_t = cf.transpose_view().to_csr();
        let ct_t = ct.transpose_view().to_csr();
        let ybus = &(&(&cf_t * &yf) + &(&ct_t * &yt)) + &diag_c(yshunt_bus);

        Ok(Self {
            ybus,
            yf,
            yt,
            yshunt_bus: yshunt_bus.to_vec(),
        })
    }
}

/// Series/shunt decomposition for HELM and linear-AC solvers.
#[derive(Debug, Clone)]
pub struct SeriesAdmittances {
    /// (nbus x nbus) series-only admittance matrix.
    pub yseries: CsMat<Complex64>,
    /// Per-bus aggregated shunt: both branch half-shunts plus device shunts.
    pub yshunt: Vec<Complex64>,
}

impl SeriesAdmittances {
    pub fn assemble(
        yffs: &[Complex64],
        yfts: &[Complex64],
        ytfs: &[Complex64],
        ytts: &[Complex64],
        ysh: &[Complex64],
        conn: &Connectivity,
        yshunt_bus: &[Complex64],
    ) -> VoltaResult<Self> {
        let (nbr, nbus) = conn.shape();
        check_branch_len("yffs primitive array", nbr, yffs.len())?;
        check_branch_len("yfts primitive array", nbr, yfts.len())?;
        check_branch_len("ytfs primitive array", nbr, ytfs.len())?;
        check_branch_len("ytts primitive array", nbr, ytts.len())?;
        check_branch_len("ysh primitive array", nbr, ysh.len())?;
        check_branch_len("bus shunt admittance array", nbus, yshunt_bus.len())?;

        let cf = complexify(&conn.cf);
        let ct = complexify(&conn.ct);

        let yfs = &(&diag_c(yffs) * &cf) + &(&diag_c(yfts) * &ct);
        let yts = &(&diag_c(ytfs) * &cf) + &(&diag_c(ytts) * &ct);

        let cf_t = cf.transpose_view().to_csr();
        let ct_t = ct.transpose_view().to_csr();
        let yseries = &(&cf_t * &yfs) + &(&ct_t * &yts);

        // Yshunt = Cf' ysh + Ct' ysh + device shunts; the incidence entries
        // already carry the branch active state.
        let mut yshunt = yshunt_bus.to_vec();
        for (v, (branch, bus)) in conn.cf.iter() {
            yshunt[bus] += *v * ysh[branch];
        }
        for (v, (branch, bus)) in conn.ct.iter() {
            yshunt[bus] += *v * ysh[branch];
        }

        Ok(Self { yseries, yshunt })
    }
}

/// Fast-decoupled susceptance matrices (angle and magnitude sub-problems).
#[derive(Debug, Clone)]
pub struct FastDecoupled {
    /// B': angle sub-problem, built from 1/X only.
    pub b1: CsMat<f64>,
    /// B'': magnitude sub-problem, folds total susceptance and tap ratios.
    pub b2: CsMat<f64>,
}

impl FastDecoupled {
    pub fn assemble(
        x: &[f64],
        b_total: &[f64],
        tap_module: &[f64],
        vtap_f: &[f64],
        vtap_t: &[f64],
        conn: &Connectivity,
    ) -> VoltaResult<Self> {
        let (nbr, _) = conn.shape();
        check_branch_len("branch reactance array", nbr, x.len())?;
        check_branch_len("branch susceptance array", nbr, b_total.len())?;
        check_branch_len("tap module array", nbr, tap_module.len())?;
        check_branch_len("virtual tap (from) array", nbr, vtap_f.len())?;
        check_branch_len("virtual tap (to) array", nbr, vtap_t.len())?;

        // Resistive-only branches report an infinite reactance and must not
        // couple their endpoints here.
        let b1: Vec<f64> = x
            .iter()
            .map(|xi| {
                if xi.is_finite() {
                    1.0 / (xi + EPS_SUSCEPTANCE)
                } else {
                    0.0
                }
            })
            .collect();
        let d1 = diag_r(&b1);
        let b1f = &(&d1 * &conn.cf) - &(&d1 * &conn.ct);
        let b1t = &(&d1 * &conn.ct) - &(&d1 * &conn.cf);

        let cf_t = conn.cf.transpose_view().to_csr();
        let ct_t = conn.ct.transpose_view().to_csr();
        let b1_mat = &(&cf_t * &b1f) + &(&ct_t * &b1t);

        let b2: Vec<f64> = b1.iter().zip(b_total).map(|(b1i, bi)| b1i + bi).collect();
        let mut b2_ff = vec![0.0; nbr];
        let mut b2_ft = vec![0.0; nbr];
        let mut b2_tf = vec![0.0; nbr];
        let mut b2_tt = vec![0.0; nbr];
        for i in 0..nbr {
            let m = tap_module[i];
            let vf = vtap_f[i];
            let vt = vtap_t[i];
            b2_ff[i] = -(b2[i] / (m * m) * vf * vf);
            b2_ft[i] = -(b1[i] / (m * vf * vt));
            b2_tf[i] = -(b1[i] / (m * vt * vf));
            b2_tt[i] = -(b2[i] / (vt * vt));
        }

        let b2f = &(&diag_r(&b2_ft) * &conn.ct) - &(&diag_r(&b2_ff) * &conn.cf);
        let b2t = &(&diag_r(&b2_tf) * &conn.cf) - &(&diag_r(&b2_tt) * &conn.ct);
        let b2_mat = &(&cf_t * &b2f) + &(&ct_t * &b2t);

        Ok(Self {
            b1: b1_mat,
            b2: b2_mat,
        })
    }
}
