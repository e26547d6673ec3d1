//! Named diagnostic structures as labeled tables.
//!
//! Debugging a compiled circuit means staring at its arrays. The accessor
//! here maps a closed set of structure names onto [`DataFrame`] tables:
//! sparse matrices in long (row, col, value) form, vectors with one row
//! per bus. Asking for a name outside the set is a programmer error and
//! fails immediately with the supported list in the message.

use std::str::FromStr;

use num_complex::Complex64;
use polars::prelude::*;
use sprs::CsMat;
use volta_core::{VoltaError, VoltaResult};

use crate::circuit::NumericalCircuit;
use crate::matrices::spmv;

/// The closed set of requestable diagnostic structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureType {
    /// Initial complex bus voltages.
    Vbus,
    /// Complex bus power injections.
    Sbus,
    /// Complex bus current injections.
    Ibus,
    /// Bus admittance matrix.
    Ybus,
    /// Real (conductance) part of Ybus.
    G,
    /// Imaginary (susceptance) part of Ybus.
    B,
    /// From-side branch admittance matrix.
    Yf,
    /// To-side branch admittance matrix.
    Yt,
    /// From-side incidence matrix.
    Cf,
    /// To-side incidence matrix.
    Ct,
    /// Aggregated per-bus shunt admittance.
    Yshunt,
    /// Series-only admittance matrix.
    Yseries,
    /// Fast-decoupled angle matrix B'.
    B1,
    /// Fast-decoupled magnitude matrix B''.
    B2,
    /// Bus classification after slack repair.
    Types,
    /// Aggregated lower reactive bound per bus.
    Qmin,
    /// Aggregated upper reactive bound per bus.
    Qmax,
    /// AC power-flow Jacobian evaluated at the seed voltage.
    Jacobian,
}

impl StructureType {
    pub const ALL: [StructureType; 18] = [
        StructureType::Vbus,
        StructureType::Sbus,
        StructureType::Ibus,
        StructureType::Ybus,
        StructureType::G,
        StructureType::B,
        StructureType::Yf,
        StructureType::Yt,
        StructureType::Cf,
        StructureType::Ct,
        StructureType::Yshunt,
        StructureType::Yseries,
        StructureType::B1,
        StructureType::B2,
        StructureType::Types,
        StructureType::Qmin,
        StructureType::Qmax,
        StructureType::Jacobian,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StructureType::Vbus => "Vbus",
            StructureType::Sbus => "Sbus",
            StructureType::Ibus => "Ibus",
            StructureType::Ybus => "Ybus",
            StructureType::G => "G",
            StructureType::B => "B",
            StructureType::Yf => "Yf",
            StructureType::Yt => "Yt",
            StructureType::Cf => "Cf",
            StructureType::Ct => "Ct",
            StructureType::Yshunt => "Yshunt",
            StructureType::Yseries => "Yseries",
            StructureType::B1 => "B'",
            StructureType::B2 => "B''",
            StructureType::Types => "Types",
            StructureType::Qmin => "Qmin",
            StructureType::Qmax => "Qmax",
            StructureType::Jacobian => "Jacobian",
        }
    }

    fn unknown_error(name: &str) -> VoltaError {
        let supported = Self::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        VoltaError::UnknownStructure {
            name: name.to_string(),
            supported,
        }
    }
}

impl FromStr for StructureType {
    type Err = VoltaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| Self::unknown_error(s))
    }
}

impl std::fmt::Display for StructureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn into_volta(err: PolarsError) -> VoltaError {
    VoltaError::Other(err.to_string())
}

fn complex_matrix_table(m: &CsMat<Complex64>) -> VoltaResult<DataFrame> {
    let mut rows = Vec::with_capacity(m.nnz());
    let mut cols = Vec::with_capacity(m.nnz());
    let mut re = Vec::with_capacity(m.nnz());
    let mut im = Vec::with_capacity(m.nnz());
    for (v, (i, j)) in m.iter() {
        rows.push(i as i64);
        cols.push(j as i64);
        re.push(v.re);
        im.push(v.im);
    }
    DataFrame::new(vec![
        Series::new("row", rows),
        Series::new("col", cols),
        Series::new("re", re),
        Series::new("im", im),
    ])
    .map_err(into_volta)
}

fn real_matrix_table(m: &CsMat<f64>) -> VoltaResult<DataFrame> {
    let mut rows = Vec::with_capacity(m.nnz());
    let mut cols = Vec::with_capacity(m.nnz());
    let mut values = Vec::with_capacity(m.nnz());
    for (v, (i, j)) in m.iter() {
        rows.push(i as i64);
        cols.push(j as i64);
        values.push(*v);
    }
    DataFrame::new(vec![
        Series::new("row", rows),
        Series::new("col", cols),
        Series::new("value", values),
    ])
    .map_err(into_volta)
}

fn real_part_table(m: &CsMat<Complex64>, part: fn(&Complex64) -> f64) -> VoltaResult<DataFrame> {
    let mut rows = Vec::with_capacity(m.nnz());
    let mut cols = Vec::with_capacity(m.nnz());
    let mut values = Vec::with_capacity(m.nnz());
    for (v, (i, j)) in m.iter() {
        rows.push(i as i64);
        cols.push(j as i64);
        values.push(part(v));
    }
    DataFrame::new(vec![
        Series::new("row", rows),
        Series::new("col", cols),
        Series::new("value", values),
    ])
    .map_err(into_volta)
}

fn real_vector_table(names: &[String], v: &[f64]) -> VoltaResult<DataFrame> {
    let idx: Vec<i64> = (0..v.len() as i64).collect();
    DataFrame::new(vec![
        Series::new("bus", idx),
        Series::new("name", names.to_vec()),
        Series::new("value", v.to_vec()),
    ])
    .map_err(into_volta)
}

fn complex_vector_table(names: &[String], v: &[Complex64]) -> VoltaResult<DataFrame> {
    let idx: Vec<i64> = (0..v.len() as i64).collect();
    let re: Vec<f64> = v.iter().map(|c| c.re).collect();
    let im: Vec<f64> = v.iter().map(|c| c.im).collect();
    DataFrame::new(vec![
        Series::new("bus", idx),
        Series::new("name", names.to_vec()),
        Series::new("re", re),
        Series::new("im", im),
    ])
    .map_err(into_volta)
}

/// AC power-flow Jacobian in polar form at the given voltage.
///
/// Block layout `[dP/dVa dP/dVm; dQ/dVa dQ/dVm]` over the no-slack rows
/// and PQ magnitude columns, the shape Newton-Raphson factorizes.
pub fn jacobian_at(nc: &NumericalCircuit, v: &[Complex64]) -> VoltaResult<CsMat<f64>> {
    if v.len() != nc.nbus {
        return Err(VoltaError::dimension("jacobian voltage vector", nc.nbus, v.len()));
    }
    let ibus = spmv(&nc.admittances.ybus, v)?;
    let vnorm: Vec<Complex64> = v
        .iter()
        .map(|c| {
            if c.norm() > 0.0 {
                *c / c.norm()
            } else {
                Complex64::new(1.0, 0.0)
            }
        })
        .collect();

    let pvpq = &nc.indices.no_slack;
    let pq = &nc.indices.pq;
    let mut row_of = vec![None; nc.nbus];
    for (r, &bus) in pvpq.iter().enumerate() {
        row_of[bus] = Some(r);
    }
    let mut qcol_of = vec![None; nc.nbus];
    for (c, &bus) in pq.iter().enumerate() {
        qcol_of[bus] = Some(c);
    }
    let npvpq = pvpq.len();
    let npq = pq.len();
    let n = npvpq + npq;

    let mut tri = sprs::TriMat::new((n, n));
    let j = Complex64::new(0.0, 1.0);
    let mut scatter = |i: usize, k: usize, dva: Complex64, dvm: Complex64| {
        if let Some(ri) = row_of[i] {
            if let Some(rk) = row_of[k] {
                tri.add_triplet(ri, rk, dva.re);
                if let Some(qi) = qcol_of[i] {
                    tri.add_triplet(npvpq + qi, rk, dva.im);
                }
            }
            if let Some(qk) = qcol_of[k] {
                tri.add_triplet(ri, npvpq + qk, dvm.re);
                if let Some(qi) = qcol_of[i] {
                    tri.add_triplet(npvpq + qi, npvpq + qk, dvm.im);
                }
            }
        }
    };

    // Off-diagonal sensitivity of S = V (Ybus V)* per Ybus entry.
    for (y, (i, k)) in nc.admittances.ybus.iter() {
        let dva = j * v[i] * (-(y * v[k])).conj();
        let dvm = v[i] * (y * vnorm[k]).conj();
        scatter(i, k, dva, dvm);
    }
    // Diagonal terms from the injected current.
    for i in 0..nc.nbus {
        let dva = j * v[i] * ibus[i].conj();
        let dvm = ibus[i].conj() * vnorm[i];
        scatter(i, i, dva, dvm);
    }

    Ok(tri.to_csr())
}

impl NumericalCircuit {
    /// One labeled table for the requested diagnostic structure.
    pub fn get_structure(&self, kind: StructureType) -> VoltaResult<DataFrame> {
        match kind {
            StructureType::Vbus => complex_vector_table(&self.bus_names, &self.v0),
            StructureType::Sbus => complex_vector_table(&self.bus_names, &self.sbus),
            StructureType::Ibus => complex_vector_table(&self.bus_names, &self.ibus),
            StructureType::Ybus => complex_matrix_table(&self.admittances.ybus),
            StructureType::G => real_part_table(&self.admittances.ybus, |c| c.re),
            StructureType::B => real_part_table(&self.admittances.ybus, |c| c.im),
            StructureType::Yf => complex_matrix_table(&self.admittances.yf),
            StructureType::Yt => complex_matrix_table(&self.admittances.yt),
            StructureType::Cf => real_matrix_table(&self.conn.cf),
            StructureType::Ct => real_matrix_table(&self.conn.ct),
            StructureType::Yshunt => complex_vector_table(&self.bus_names, &self.series.yshunt),
            StructureType::Yseries => complex_matrix_table(&self.series.yseries),
            StructureType::B1 => real_matrix_table(&self.fast_decoupled.b1),
            StructureType::B2 => real_matrix_table(&self.fast_decoupled.b2),
            StructureType::Types => {
                let idx: Vec<i64> = (0..self.nbus as i64).collect();
                let types: Vec<&str> =
                    self.indices.bus_types.iter().map(|t| t.as_str()).collect();
                DataFrame::new(vec![
                    Series::new("bus", idx),
                    Series::new("name", self.bus_names.clone()),
                    Series::new("type", types),
                ])
                .map_err(into_volta)
            }
            StructureType::Qmin => real_vector_table(&self.bus_names, &self.qmin_bus),
            StructureType::Qmax => real_vector_table(&self.bus_names, &self.qmax_bus),
            StructureType::Jacobian => real_matrix_table(&jacobian_at(self, &self.v0)?),
        }
    }

    /// String-keyed variant of [`Self::get_structure`] for interactive use.
    pub fn get_structure_by_name(&self, name: &str) -> VoltaResult<DataFrame> {
        self.get_structure(name.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::CompileOptions;
    use volta_core::diagnostics::Diagnostics;
    use volta_core::{Bus, Generator, Grid, Line, Load};

    fn compiled() -> NumericalCircuit {
        let mut grid = Grid::new("tables");
        grid.buses = vec![Bus::new("s", 132.0).as_slack(), Bus::new("d", 132.0)];
        grid.lines.push(Line::new("l", 0, 1, 0.0, 0.1, 0.0));
        grid.generators.push(Generator::new("g", 0, 0.0));
        grid.loads.push(Load::new("d", 1, 20.0, 5.0));
        let mut diag = Diagnostics::default();
        NumericalCircuit::compile(&grid, &CompileOptions::default(), &mut diag).unwrap()
    }

    #[test]
    fn every_name_round_trips_through_from_str() {
        for kind in StructureType::ALL {
            assert_eq!(kind.as_str().parse::<StructureType>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_name_lists_the_supported_set() {
        let err = "Zbus".parse::<StructureType>().unwrap_err();
        match err {
            VoltaError::UnknownStructure { name, supported } => {
                assert_eq!(name, "Zbus");
                assert!(supported.contains("Ybus"));
                assert!(supported.contains("Jacobian"));
            }
            other => panic!("expected UnknownStructure, got {:?}", other),
        }
    }

    #[test]
    fn every_structure_builds_a_table() {
        let nc = compiled();
        for kind in StructureType::ALL {
            let df = nc.get_structure(kind).unwrap();
            assert!(df.width() >= 3, "{kind} table is too narrow");
        }
    }

    #[test]
    fn ybus_table_is_long_form() {
        let nc = compiled();
        let df = nc.get_structure_by_name("Ybus").unwrap();
        assert_eq!(
            df.get_column_names(),
            ["row", "col", "re", "im"]
        );
        assert_eq!(df.height(), nc.admittances.ybus.nnz());
    }

    #[test]
    fn jacobian_of_a_reactive_line_is_diagonal_b() {
        let nc = compiled();
        let v = vec![Complex64::new(1.0, 0.0); 2];
        let jac = jacobian_at(&nc, &v).unwrap();
        // One PV/PQ row, one PQ column: a 2x2 system with B = 10 on the
        // diagonal and no P-V coupling at flat start.
        assert_eq!(jac.shape(), (2, 2));
        assert!((jac.get(0, 0).copied().unwrap() - 10.0).abs() < 1e-9);
        assert!((jac.get(1, 1).copied().unwrap() - 10.0).abs() < 1e-9);
        assert!(jac.get(0, 1).copied().unwrap_or(0.0).abs() < 1e-9);
        assert!(jac.get(1, 0).copied().unwrap_or(0.0).abs() < 1e-9);
    }
}
