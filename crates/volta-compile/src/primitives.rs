//! Per-branch two-port admittance primitives.
//!
//! Every branch technology reduces to the same numerical payload: four
//! complex primitives for the full pi model, a second series-only set with a
//! separated half-shunt (the decomposition used by HELM-style and linear-AC
//! solvers), and the scalar parameters the fast-decoupled matrices need. The
//! [`AdmittanceModel`] trait is the only capability the assembler sees; the
//! concrete technology stays behind the [`BranchRef`] variant.

use num_complex::Complex64;
use volta_core::{BranchRef, Kilovolts, Line, Transformer2W, Vsc};

/// Regularization added to series impedances so a zero-impedance branch
/// yields a huge but finite admittance instead of a division by zero.
pub const EPS_IMPEDANCE: f64 = 1e-20;

/// Full-model primitives: Yff, Yft, Ytf, Ytt.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TwoPort {
    pub yff: Complex64,
    pub yft: Complex64,
    pub ytf: Complex64,
    pub ytt: Complex64,
}

/// Series-only primitives plus the per-branch half-shunt admittance.
///
/// The aggregated shunt matrix collects `ysh` once per branch side, so `ysh`
/// holds *half* the branch's total shunt admittance.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SeriesTwoPort {
    pub yff: Complex64,
    pub yft: Complex64,
    pub ytf: Complex64,
    pub ytt: Complex64,
    pub ysh: Complex64,
}

/// Scalars consumed by the fast-decoupled B'/B'' assembly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FdParams {
    /// Series reactance (resistance is ignored by the approximation).
    /// Resistive-only technologies report `f64::INFINITY` so they carry no
    /// susceptance into either sub-problem.
    pub x: f64,
    /// Total shunt susceptance of the branch.
    pub b_total: f64,
    pub tap_module: f64,
    pub vtap_f: f64,
    pub vtap_t: f64,
}

impl Default for FdParams {
    fn default() -> Self {
        Self {
            x: 0.0,
            b_total: 0.0,
            tap_module: 1.0,
            vtap_f: 1.0,
            vtap_t: 1.0,
        }
    }
}

/// Everything the assembler needs from one branch.
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchPrimitives {
    pub full: TwoPort,
    pub series: SeriesTwoPort,
    pub fd: FdParams,
}

/// Which side of the impedance manufacturing tolerance band to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToleranceBand {
    /// Use the specified resistance as-is.
    #[default]
    Specified,
    /// Scale R by (1 + tolerance/100).
    Upper,
    /// Scale R by (1 - tolerance/100).
    Lower,
}

/// Knobs applied while computing primitives.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveOptions {
    /// Correct resistances to the operating temperature.
    pub apply_temperature: bool,
    pub tolerance: ToleranceBand,
}

impl PrimitiveOptions {
    fn band_factor(&self, tolerance_pct: f64) -> f64 {
        match self.tolerance {
            ToleranceBand::Specified => 1.0,
            ToleranceBand::Upper => 1.0 + tolerance_pct / 100.0,
            ToleranceBand::Lower => 1.0 - tolerance_pct / 100.0,
        }
    }
}

/// Uniform primitive computation over the closed branch-technology set.
pub trait AdmittanceModel {
    /// Compute this branch's primitives. The connected buses' nominal
    /// voltages drive transformer virtual taps; other technologies ignore
    /// them.
    fn primitives(
        &self,
        opts: &PrimitiveOptions,
        bus_f_kv: Kilovolts,
        bus_t_kv: Kilovolts,
    ) -> BranchPrimitives;
}

fn series_admittance(r: f64, x: f64) -> Complex64 {
    Complex64::new(1.0, 0.0) / Complex64::new(r + EPS_IMPEDANCE, x)
}

impl AdmittanceModel for Line {
    fn primitives(
        &self,
        opts: &PrimitiveOptions,
        _bus_f_kv: Kilovolts,
        _bus_t_kv: Kilovolts,
    ) -> BranchPrimitives {
        let r_base = if opts.apply_temperature {
            self.r_corrected()
        } else {
            self.r
        };
        let r = r_base * opts.band_factor(self.tolerance);

        let ys = series_admittance(r, self.x);
        let ysh2 = Complex64::new(0.0, self.b / 2.0);
        let ys2 = ys + ysh2;

        BranchPrimitives {
            full: TwoPort {
                yff: ys2,
                yft: -ys,
                ytf: -ys,
                ytt: ys2,
            },
            series: SeriesTwoPort {
                yff: ys,
                yft: -ys,
                ytf: -ys,
                ytt: ys,
                ysh: ysh2,
            },
            fd: FdParams {
                x: self.x,
                b_total: self.b,
                ..FdParams::default()
            },
        }
    }
}

impl AdmittanceModel for Transformer2W {
    fn primitives(
        &self,
        opts: &PrimitiveOptions,
        bus_f_kv: Kilovolts,
        bus_t_kv: Kilovolts,
    ) -> BranchPrimitives {
        let r_base = if opts.apply_temperature {
            self.r_corrected()
        } else {
            self.r
        };
        let r = r_base * opts.band_factor(self.tolerance);

        let ys = series_admittance(r, self.x);
        let ysh2 = Complex64::new(self.g, self.b) / 2.0;
        let ys2 = ys + ysh2;

        let tap = Complex64::from_polar(self.tap_module, self.tap_angle.value());
        let m2 = self.tap_module * self.tap_module;
        let (vtap_f, vtap_t) = self.virtual_taps(bus_f_kv, bus_t_kv);

        BranchPrimitives {
            full: TwoPort {
                yff: ys2 / (vtap_f * vtap_f * m2),
                yft: -ys / (vtap_f * vtap_t * tap.conj()),
                ytf: -ys / (vtap_t * vtap_f * tap),
                ytt: ys2 / (vtap_t * vtap_t),
            },
            series: SeriesTwoPort {
                yff: ys / (vtap_f * vtap_f * m2),
                yft: -ys / (vtap_f * vtap_t * tap.conj()),
                ytf: -ys / (vtap_t * vtap_f * tap),
                ytt: ys / (vtap_t * vtap_t),
                ysh: ysh2,
            },
            fd: FdParams {
                x: self.x,
                b_total: self.b,
                tap_module: self.tap_module,
                vtap_f,
                vtap_t,
            },
        }
    }
}

impl AdmittanceModel for Vsc {
    fn primitives(
        &self,
        _opts: &PrimitiveOptions,
        _bus_f_kv: Kilovolts,
        _bus_t_kv: Kilovolts,
    ) -> BranchPrimitives {
        let y1 = series_admittance(self.r1, self.x1);
        let m2 = self.m * self.m;
        let shift = Complex64::from_polar(self.m, self.theta.value());
        // Shunt equivalent of the converter: switching losses plus the
        // compensation susceptance, both scaled to the AC side.
        let ysh_total = Complex64::new(self.g0, m2 * self.beq);

        BranchPrimitives {
            full: TwoPort {
                yff: y1,
                yft: -shift * y1,
                ytf: -shift.conj() * y1,
                ytt: Complex64::new(self.g0, 0.0) + m2 * (y1 + Complex64::new(0.0, self.beq)),
            },
            series: SeriesTwoPort {
                yff: y1,
                yft: -shift * y1,
                ytf: -shift.conj() * y1,
                ytt: m2 * y1,
                ysh: ysh_total / 2.0,
            },
            fd: FdParams {
                x: self.x1,
                b_total: self.beq,
                tap_module: self.m,
                ..FdParams::default()
            },
        }
    }
}

/// Resistive-only two-port shared by the DC technologies.
fn dc_primitives(r: f64) -> BranchPrimitives {
    let ys = Complex64::new(1.0 / (r + EPS_IMPEDANCE), 0.0);
    BranchPrimitives {
        full: TwoPort {
            yff: ys,
            yft: -ys,
            ytf: -ys,
            ytt: ys,
        },
        series: SeriesTwoPort {
            yff: ys,
            yft: -ys,
            ytf: -ys,
            ytt: ys,
            ysh: Complex64::new(0.0, 0.0),
        },
        // No reactance at all: the branch is invisible to B'/B''.
        fd: FdParams {
            x: f64::INFINITY,
            ..FdParams::default()
        },
    }
}

impl<'a> AdmittanceModel for BranchRef<'a> {
    fn primitives(
        &self,
        opts: &PrimitiveOptions,
        bus_f_kv: Kilovolts,
        bus_t_kv: Kilovolts,
    ) -> BranchPrimitives {
        match self {
            BranchRef::Line(b) => b.primitives(opts, bus_f_kv, bus_t_kv),
            BranchRef::Transformer2W(b) => b.primitives(opts, bus_f_kv, bus_t_kv),
            BranchRef::Vsc(b) => b.primitives(opts, bus_f_kv, bus_t_kv),
            BranchRef::HvdcLink(b) => dc_primitives(b.r),
            BranchRef::DcLine(b) => dc_primitives(b.r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volta_core::{Celsius, Radians};

    const KV: Kilovolts = Kilovolts(132.0);

    fn close(a: Complex64, b: Complex64) -> bool {
        (a - b).norm() < 1e-9
    }

    #[test]
    fn line_pure_reactance() {
        let line = Line::new("l", 0, 1, 0.0, 0.1, 0.0);
        let p = line.primitives(&PrimitiveOptions::default(), KV, KV);
        assert!(close(p.full.yff, Complex64::new(0.0, -10.0)));
        assert!(close(p.full.yft, Complex64::new(0.0, 10.0)));
        assert_eq!(p.full.yff, p.full.ytt);
        assert_eq!(p.full.yft, p.full.ytf);
        assert_eq!(p.series.ysh, Complex64::new(0.0, 0.0));
        assert_eq!(p.fd.x, 0.1);
    }

    #[test]
    fn line_charging_splits_half_per_side() {
        let line = Line::new("l", 0, 1, 0.01, 0.1, 0.04);
        let p = line.primitives(&PrimitiveOptions::default(), KV, KV);
        assert!(close(p.full.yff - p.series.yff, Complex64::new(0.0, 0.02)));
        assert!(close(p.series.ysh, Complex64::new(0.0, 0.02)));
        assert_eq!(p.fd.b_total, 0.04);
    }

    #[test]
    fn line_temperature_and_tolerance_scale_resistance() {
        let line = Line {
            alpha: 0.004,
            temp_base: Celsius(20.0),
            temp_oper: Celsius(70.0),
            tolerance: 10.0,
            ..Line::new("l", 0, 1, 0.05, 0.1, 0.0)
        };
        let base = line.primitives(&PrimitiveOptions::default(), KV, KV);
        let hot = line.primitives(
            &PrimitiveOptions {
                apply_temperature: true,
                tolerance: ToleranceBand::Specified,
            },
            KV,
            KV,
        );
        let upper = line.primitives(
            &PrimitiveOptions {
                apply_temperature: false,
                tolerance: ToleranceBand::Upper,
            },
            KV,
            KV,
        );
        // 1/(r+jx): a larger r lowers the admittance magnitude.
        assert!(hot.full.yff.norm() < base.full.yff.norm());
        assert!(upper.full.yff.norm() < base.full.yff.norm());
        let expected_r = 0.05 * 1.1;
        let expected = Complex64::new(1.0, 0.0) / Complex64::new(expected_r, 0.1);
        assert!(close(upper.series.yff, expected));
    }

    #[test]
    fn unity_tap_transformer_matches_line() {
        let line = Line::new("l", 0, 1, 0.01, 0.08, 0.0);
        let tx = Transformer2W::new("t", 0, 1, 0.01, 0.08);
        let pl = line.primitives(&PrimitiveOptions::default(), KV, KV);
        let pt = tx.primitives(&PrimitiveOptions::default(), KV, KV);
        assert!(close(pl.full.yff, pt.full.yff));
        assert!(close(pl.full.yft, pt.full.yft));
        assert!(close(pl.full.ytf, pt.full.ytf));
        assert!(close(pl.full.ytt, pt.full.ytt));
    }

    #[test]
    fn transformer_tap_shifts_off_diagonals() {
        let tx = Transformer2W::new("t", 0, 1, 0.0, 0.1)
            .with_tap(1.05, Radians(0.05));
        let p = tx.primitives(&PrimitiveOptions::default(), KV, KV);
        let ys = Complex64::new(1.0, 0.0) / Complex64::new(EPS_IMPEDANCE, 0.1);
        let tap = Complex64::from_polar(1.05, 0.05);
        assert!(close(p.full.yff, ys / (1.05 * 1.05)));
        assert!(close(p.full.yft, -ys / tap.conj()));
        assert!(close(p.full.ytf, -ys / tap));
        assert!(close(p.full.ytt, ys));
        // Phase shift makes the branch non-reciprocal.
        assert!((p.full.yft - p.full.ytf).norm() > 1e-6);
    }

    #[test]
    fn vsc_two_port_formulas() {
        let vsc = Vsc {
            r1: 0.001,
            x1: 0.05,
            m: 0.95,
            theta: Radians(0.1),
            g0: 0.002,
            beq: 0.03,
            ..Vsc::default()
        };
        let p = vsc.primitives(&PrimitiveOptions::default(), KV, KV);
        let y1 = Complex64::new(1.0, 0.0) / Complex64::new(0.001 + EPS_IMPEDANCE, 0.05);
        let m2 = 0.95 * 0.95;
        assert!(close(p.full.yff, y1));
        assert!(close(p.full.yft, -Complex64::from_polar(0.95, 0.1) * y1));
        assert!(close(p.full.ytf, -Complex64::from_polar(0.95, -0.1) * y1));
        assert!(close(
            p.full.ytt,
            Complex64::new(0.002, 0.0) + m2 * (y1 + Complex64::new(0.0, 0.03))
        ));
        assert_eq!(p.fd.tap_module, 0.95);
    }

    #[test]
    fn dc_link_is_purely_resistive() {
        let link = volta_core::HvdcLink {
            r: 0.02,
            ..Default::default()
        };
        let p = BranchRef::HvdcLink(&link).primitives(&PrimitiveOptions::default(), KV, KV);
        assert!((p.full.yff.re - 50.0).abs() < 1e-6);
        assert_eq!(p.full.yff.im, 0.0);
        assert!(close(p.full.yft, -p.full.yff));
        assert_eq!(p.series.ysh, Complex64::new(0.0, 0.0));
        // Infinite reactance keeps DC technologies out of B'/B''.
        assert!(p.fd.x.is_infinite());
        assert_eq!(p.fd.b_total, 0.0);
    }
}
