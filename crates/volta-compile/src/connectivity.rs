//! Branch-bus incidence matrices.
//!
//! `Cf` and `Ct` are sparse (branch x bus) matrices with a single `1.0` per
//! row at the from-side / to-side bus column. Inactive branches keep their
//! row (the active flag is folded in as a zero row) so the branch index space
//! never shifts: row *i* is branch *i* in every matrix and array, active or
//! not.

use sprs::{CsMat, TriMat};
use volta_core::{VoltaError, VoltaResult};

/// "From" and "to" incidence matrices over the full branch set.
#[derive(Debug, Clone)]
pub struct Connectivity {
    /// (nbr x nbus), row i has 1.0 at column `f[i]` when branch i is active.
    pub cf: CsMat<f64>,
    /// (nbr x nbus), row i has 1.0 at column `t[i]` when branch i is active.
    pub ct: CsMat<f64>,
}

impl Connectivity {
    /// Build both incidence matrices from positionally aligned branch arrays.
    ///
    /// `names` is used only for error reporting; a bus index outside
    /// `0..nbus` is a fatal structural error.
    pub fn build(
        f: &[usize],
        t: &[usize],
        active: &[bool],
        names: &[String],
        nbus: usize,
    ) -> VoltaResult<Self> {
        let nbr = f.len();
        for (label, len) in [
            ("branch to-bus array", t.len()),
            ("branch active array", active.len()),
            ("branch name array", names.len()),
        ] {
            if len != nbr {
                return Err(VoltaError::dimension(label, nbr, len));
            }
        }

        let mut cf = TriMat::new((nbr, nbus));
        let mut ct = TriMat::new((nbr, nbus));
        for i in 0..nbr {
            for bus in [f[i], t[i]] {
                if bus >= nbus {
                    return Err(VoltaError::UnknownBus {
                        device: format!("branch {}", names[i]),
                        bus,
                        nbus,
                    });
                }
            }
            if active[i] {
                cf.add_triplet(i, f[i], 1.0);
                ct.add_triplet(i, t[i], 1.0);
            }
        }

        Ok(Self {
            cf: cf.to_csr(),
            ct: ct.to_csr(),
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.cf.shape()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("br{}", i)).collect()
    }

    #[test]
    fn one_entry_per_active_row() {
        let conn = Connectivity::build(&[0, 1], &[1, 2], &[true, true], &names(2), 3).unwrap();
        assert_eq!(conn.shape(), (2, 3));
        for row in 0..2 {
            assert_eq!(conn.cf.outer_view(row).unwrap().nnz(), 1);
            assert_eq!(conn.ct.outer_view(row).unwrap().nnz(), 1);
        }
        assert_eq!(conn.cf.get(0, 0), Some(&1.0));
        assert_eq!(conn.ct.get(1, 2), Some(&1.0));
    }

    #[test]
    fn inactive_branch_keeps_zero_row() {
        let conn = Connectivity::build(&[0, 1], &[1, 2], &[true, false], &names(2), 3).unwrap();
        // Shape is preserved, but row 1 carries no entries.
        assert_eq!(conn.shape(), (2, 3));
        assert_eq!(conn.cf.outer_view(1).unwrap().nnz(), 0);
        assert_eq!(conn.ct.outer_view(1).unwrap().nnz(), 0);
    }

    #[test]
    fn out_of_range_bus_is_fatal() {
        let err = Connectivity::build(&[0], &[5], &[true], &names(1), 3).unwrap_err();
        assert!(matches!(err, VoltaError::UnknownBus { bus: 5, nbus: 3, .. }));
    }

    #[test]
    fn misaligned_arrays_are_fatal() {
        let err = Connectivity::build(&[0, 1], &[1], &[true, true], &names(2), 3).unwrap_err();
        assert!(matches!(err, VoltaError::DimensionMismatch { .. }));
    }
}
