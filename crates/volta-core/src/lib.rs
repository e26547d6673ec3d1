//! # volta-core: Device-Level Grid Model
//!
//! Typed device model for electrical networks: buses, branch technologies
//! (AC lines, two-winding transformers, voltage-source converters, HVDC
//! links, DC lines) and injection devices (loads, generators, batteries,
//! shunts). The model is the input side of the system; `volta-compile` turns
//! a [`Grid`] into positionally aligned numerical arrays and sparse
//! admittance matrices for power-flow and OPF solvers.
//!
//! ## Design
//!
//! - Branch technologies form a **closed tagged set** ([`BranchRef`]); code
//!   that needs "any branch" matches on the variant instead of duck-typing.
//! - [`Grid::branch_iter`] yields branches in a canonical order (lines,
//!   transformers, VSCs, HVDC links, DC lines) which fixes the global branch
//!   index space used by every downstream array and matrix row.
//! - Physical quantities use the unit newtypes in [`units`]; per-unit
//!   impedances stay raw `f64` because they feed straight into complex
//!   arithmetic.
//! - Degraded conditions are reported through [`diagnostics::Diagnostics`],
//!   threaded explicitly through calls; structural defects are
//!   [`error::VoltaError`] values.

use serde::{Deserialize, Serialize};

pub mod diagnostics;
pub mod error;
pub mod units;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{VoltaError, VoltaResult};
pub use units::{
    Celsius, Degrees, Kilovolts, Megavars, MegavoltAmperes, Megawatts, PerUnit, Radians,
};

/// Bus control-mode classification for power-flow studies.
///
/// Fixes which electrical quantities are specified versus solved at the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusType {
    /// P and Q specified; |V| and angle solved. Default for load buses.
    PQ,
    /// P and |V| specified; Q and angle solved. Voltage-controlled buses.
    PV,
    /// |V| and angle fixed; P and Q absorbed. One per electrical island.
    Slack,
}

impl BusType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusType::PQ => "PQ",
            BusType::PV => "PV",
            BusType::Slack => "Slack",
        }
    }
}

impl std::fmt::Display for BusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A network node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub name: String,
    /// Nominal voltage, used for transformer virtual taps.
    pub base_kv: Kilovolts,
    pub active: bool,
    /// Declared slack bus (angle reference).
    pub is_slack: bool,
    /// Initial voltage magnitude guess.
    pub v0: PerUnit,
    /// Initial voltage angle guess.
    pub angle0: Radians,
    pub vmin: PerUnit,
    pub vmax: PerUnit,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_kv: Kilovolts(0.0),
            active: true,
            is_slack: false,
            v0: PerUnit(1.0),
            angle0: Radians(0.0),
            vmin: PerUnit(0.9),
            vmax: PerUnit(1.1),
        }
    }
}

impl Bus {
    pub fn new(name: impl Into<String>, base_kv: f64) -> Self {
        Self {
            name: name.into(),
            base_kv: Kilovolts(base_kv),
            ..Self::default()
        }
    }

    pub fn as_slack(mut self) -> Self {
        self.is_slack = true;
        self
    }
}

/// AC transmission line (pi model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub name: String,
    pub from: usize,
    pub to: usize,
    pub active: bool,
    /// Series resistance (p.u.)
    pub r: f64,
    /// Series reactance (p.u.)
    pub x: f64,
    /// Total charging susceptance (p.u., split half per side)
    pub b: f64,
    pub rate: MegavoltAmperes,
    /// Resistance temperature coefficient (1/degC)
    pub alpha: f64,
    /// Temperature at which `r` was measured.
    pub temp_base: Celsius,
    /// Operating temperature for the corrected resistance.
    pub temp_oper: Celsius,
    /// Impedance manufacturing tolerance (percent).
    pub tolerance: f64,
}

impl Default for Line {
    fn default() -> Self {
        Self {
            name: String::new(),
            from: 0,
            to: 0,
            active: true,
            r: 0.0,
            x: 0.0,
            b: 0.0,
            rate: MegavoltAmperes(0.0),
            alpha: 0.00330,
            temp_base: Celsius(20.0),
            temp_oper: Celsius(20.0),
            tolerance: 0.0,
        }
    }
}

impl Line {
    pub fn new(name: impl Into<String>, from: usize, to: usize, r: f64, x: f64, b: f64) -> Self {
        Self {
            name: name.into(),
            from,
            to,
            r,
            x,
            b,
            ..Self::default()
        }
    }

    pub fn with_rate(mut self, rate_mva: f64) -> Self {
        self.rate = MegavoltAmperes(rate_mva);
        self
    }

    /// Resistance corrected to the operating temperature
    /// (linear resistivity approximation).
    pub fn r_corrected(&self) -> f64 {
        self.r * (1.0 + self.alpha * (self.temp_oper.value() - self.temp_base.value()))
    }
}

/// Two-winding tap transformer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transformer2W {
    pub name: String,
    pub from: usize,
    pub to: usize,
    pub active: bool,
    pub r: f64,
    pub x: f64,
    /// Magnetizing conductance (iron losses, p.u.)
    pub g: f64,
    /// Magnetizing susceptance (p.u.)
    pub b: f64,
    pub rate: MegavoltAmperes,
    /// Off-nominal tap magnitude.
    pub tap_module: f64,
    /// Tap phase shift.
    pub tap_angle: Radians,
    /// Nominal voltage of the high winding.
    pub hv: Kilovolts,
    /// Nominal voltage of the low winding.
    pub lv: Kilovolts,
    pub alpha: f64,
    pub temp_base: Celsius,
    pub temp_oper: Celsius,
    pub tolerance: f64,
}

impl Default for Transformer2W {
    fn default() -> Self {
        Self {
            name: String::new(),
            from: 0,
            to: 0,
            active: true,
            r: 0.0,
            x: 0.0,
            g: 0.0,
            b: 0.0,
            rate: MegavoltAmperes(0.0),
            tap_module: 1.0,
            tap_angle: Radians(0.0),
            hv: Kilovolts(0.0),
            lv: Kilovolts(0.0),
            alpha: 0.00330,
            temp_base: Celsius(20.0),
            temp_oper: Celsius(20.0),
            tolerance: 0.0,
        }
    }
}

impl Transformer2W {
    pub fn new(name: impl Into<String>, from: usize, to: usize, r: f64, x: f64) -> Self {
        Self {
            name: name.into(),
            from,
            to,
            r,
            x,
            ..Self::default()
        }
    }

    pub fn with_tap(mut self, module: f64, angle: Radians) -> Self {
        self.tap_module = module;
        self.tap_angle = angle;
        self
    }

    pub fn r_corrected(&self) -> f64 {
        self.r * (1.0 + self.alpha * (self.temp_oper.value() - self.temp_base.value()))
    }

    /// Virtual taps compensating the mismatch between winding nominal
    /// voltages and the connected bus bases. Windings are matched to sides
    /// by proximity of the nominal voltages; degenerate bases fall back to 1.
    pub fn virtual_taps(&self, bus_from_kv: Kilovolts, bus_to_kv: Kilovolts) -> (f64, f64) {
        let (wind_f, wind_t) = if (bus_from_kv.value() - self.hv.value()).abs()
            <= (bus_from_kv.value() - self.lv.value()).abs()
        {
            (self.hv.value(), self.lv.value())
        } else {
            (self.lv.value(), self.hv.value())
        };

        let tap_f = if bus_from_kv.value() > 0.0 && wind_f > 0.0 {
            wind_f / bus_from_kv.value()
        } else {
            1.0
        };
        let tap_t = if bus_to_kv.value() > 0.0 && wind_t > 0.0 {
            wind_t / bus_to_kv.value()
        } else {
            1.0
        };
        (tap_f, tap_t)
    }
}

/// Voltage-source converter (AC-DC interface, two-port model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vsc {
    pub name: String,
    pub from: usize,
    pub to: usize,
    pub active: bool,
    /// Series resistance of the converter arm (p.u.)
    pub r1: f64,
    /// Series reactance of the converter arm (p.u.)
    pub x1: f64,
    /// Controllable modulation magnitude.
    pub m: f64,
    /// Controllable firing phase.
    pub theta: Radians,
    /// Equivalent switching-loss conductance (p.u.)
    pub g0: f64,
    /// Equivalent compensation susceptance (p.u.)
    pub beq: f64,
    pub rate: MegavoltAmperes,
}

impl Default for Vsc {
    fn default() -> Self {
        Self {
            name: String::new(),
            from: 0,
            to: 0,
            active: true,
            r1: 0.0001,
            x1: 0.05,
            m: 1.0,
            theta: Radians(0.0),
            g0: 0.0,
            beq: 0.0,
            rate: MegavoltAmperes(0.0),
        }
    }
}

/// Point-to-point HVDC link, modeled as a resistive two-port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HvdcLink {
    pub name: String,
    pub from: usize,
    pub to: usize,
    pub active: bool,
    /// DC resistance (p.u.)
    pub r: f64,
    pub rate: MegavoltAmperes,
}

impl Default for HvdcLink {
    fn default() -> Self {
        Self {
            name: String::new(),
            from: 0,
            to: 0,
            active: true,
            r: 0.001,
            rate: MegavoltAmperes(0.0),
        }
    }
}

/// DC line inside a DC subgrid (resistive only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcLine {
    pub name: String,
    pub from: usize,
    pub to: usize,
    pub active: bool,
    /// DC resistance (p.u.)
    pub r: f64,
    pub rate: MegavoltAmperes,
}

impl Default for DcLine {
    fn default() -> Self {
        Self {
            name: String::new(),
            from: 0,
            to: 0,
            active: true,
            r: 0.001,
            rate: MegavoltAmperes(0.0),
        }
    }
}

/// Borrowed view over any branch technology.
///
/// The closed variant set is what lets the compiler treat "a branch" uniformly
/// (index space, connectivity, primitives) without knowing the concrete
/// technology beyond a match.
#[derive(Debug, Clone, Copy)]
pub enum BranchRef<'a> {
    Line(&'a Line),
    Transformer2W(&'a Transformer2W),
    Vsc(&'a Vsc),
    HvdcLink(&'a HvdcLink),
    DcLine(&'a DcLine),
}

impl<'a> BranchRef<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            BranchRef::Line(b) => &b.name,
            BranchRef::Transformer2W(b) => &b.name,
            BranchRef::Vsc(b) => &b.name,
            BranchRef::HvdcLink(b) => &b.name,
            BranchRef::DcLine(b) => &b.name,
        }
    }

    pub fn from_bus(&self) -> usize {
        match self {
            BranchRef::Line(b) => b.from,
            BranchRef::Transformer2W(b) => b.from,
            BranchRef::Vsc(b) => b.from,
            BranchRef::HvdcLink(b) => b.from,
            BranchRef::DcLine(b) => b.from,
        }
    }

    pub fn to_bus(&self) -> usize {
        match self {
            BranchRef::Line(b) => b.to,
            BranchRef::Transformer2W(b) => b.to,
            BranchRef::Vsc(b) => b.to,
            BranchRef::HvdcLink(b) => b.to,
            BranchRef::DcLine(b) => b.to,
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            BranchRef::Line(b) => b.active,
            BranchRef::Transformer2W(b) => b.active,
            BranchRef::Vsc(b) => b.active,
            BranchRef::HvdcLink(b) => b.active,
            BranchRef::DcLine(b) => b.active,
        }
    }

    pub fn rate(&self) -> MegavoltAmperes {
        match self {
            BranchRef::Line(b) => b.rate,
            BranchRef::Transformer2W(b) => b.rate,
            BranchRef::Vsc(b) => b.rate,
            BranchRef::HvdcLink(b) => b.rate,
            BranchRef::DcLine(b) => b.rate,
        }
    }

    pub fn technology(&self) -> &'static str {
        match self {
            BranchRef::Line(_) => "line",
            BranchRef::Transformer2W(_) => "transformer",
            BranchRef::Vsc(_) => "vsc",
            BranchRef::HvdcLink(_) => "hvdc",
            BranchRef::DcLine(_) => "dc line",
        }
    }
}

/// Constant-power load with optional current-source components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Load {
    pub name: String,
    pub bus: usize,
    pub active: bool,
    pub p: Megawatts,
    pub q: Megavars,
    /// Real current component (MVA at V=1 p.u.)
    pub ir: f64,
    /// Imaginary current component (MVA at V=1 p.u.)
    pub ii: f64,
}

impl Default for Load {
    fn default() -> Self {
        Self {
            name: String::new(),
            bus: 0,
            active: true,
            p: Megawatts(0.0),
            q: Megavars(0.0),
            ir: 0.0,
            ii: 0.0,
        }
    }
}

impl Load {
    pub fn new(name: impl Into<String>, bus: usize, p_mw: f64, q_mvar: f64) -> Self {
        Self {
            name: name.into(),
            bus,
            p: Megawatts(p_mw),
            q: Megavars(q_mvar),
            ..Self::default()
        }
    }
}

/// Dispatchable generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generator {
    pub name: String,
    pub bus: usize,
    pub active: bool,
    pub p: Megawatts,
    /// Voltage setpoint applied when the unit controls its bus.
    pub vset: PerUnit,
    /// Whether the unit regulates bus voltage (PV behavior).
    pub is_controlled: bool,
    pub qmin: Megavars,
    pub qmax: Megavars,
}

impl Default for Generator {
    fn default() -> Self {
        Self {
            name: String::new(),
            bus: 0,
            active: true,
            p: Megawatts(0.0),
            vset: PerUnit(1.0),
            is_controlled: true,
            qmin: Megavars(-9999.0),
            qmax: Megavars(9999.0),
        }
    }
}

impl Generator {
    pub fn new(name: impl Into<String>, bus: usize, p_mw: f64) -> Self {
        Self {
            name: name.into(),
            bus,
            p: Megawatts(p_mw),
            ..Self::default()
        }
    }

    pub fn with_q_limits(mut self, qmin: f64, qmax: f64) -> Self {
        self.qmin = Megavars(qmin);
        self.qmax = Megavars(qmax);
        self
    }

    pub fn uncontrolled(mut self) -> Self {
        self.is_controlled = false;
        self
    }
}

/// Storage unit; participates in dispatch and voltage control like a
/// generator, with charge/discharge sign convention on `p`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battery {
    pub name: String,
    pub bus: usize,
    pub active: bool,
    pub p: Megawatts,
    pub vset: PerUnit,
    pub is_controlled: bool,
    pub qmin: Megavars,
    pub qmax: Megavars,
}

impl Default for Battery {
    fn default() -> Self {
        Self {
            name: String::new(),
            bus: 0,
            active: true,
            p: Megawatts(0.0),
            vset: PerUnit(1.0),
            is_controlled: true,
            qmin: Megavars(-9999.0),
            qmax: Megavars(9999.0),
        }
    }
}

/// Fixed shunt (capacitor bank or reactor).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shunt {
    pub name: String,
    pub bus: usize,
    pub active: bool,
    /// Conductance as MW at V=1 p.u.
    pub g: Megawatts,
    /// Susceptance as Mvar at V=1 p.u. (positive = capacitive).
    pub b: Megavars,
}

impl Default for Shunt {
    fn default() -> Self {
        Self {
            name: String::new(),
            bus: 0,
            active: true,
            g: Megawatts(0.0),
            b: Megavars(0.0),
        }
    }
}

/// The device-level network container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Grid {
    pub name: String,
    /// Power base in MVA for per-unit conversions.
    pub sbase: f64,
    pub buses: Vec<Bus>,
    pub lines: Vec<Line>,
    pub transformers: Vec<Transformer2W>,
    pub vscs: Vec<Vsc>,
    pub hvdc_links: Vec<HvdcLink>,
    pub dc_lines: Vec<DcLine>,
    pub loads: Vec<Load>,
    pub generators: Vec<Generator>,
    pub batteries: Vec<Battery>,
    pub shunts: Vec<Shunt>,
}

impl Grid {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sbase: 100.0,
            ..Self::default()
        }
    }

    pub fn bus_count(&self) -> usize {
        self.buses.len()
    }

    /// Total branch count over every technology.
    pub fn branch_count(&self) -> usize {
        self.lines.len()
            + self.transformers.len()
            + self.vscs.len()
            + self.hvdc_links.len()
            + self.dc_lines.len()
    }

    /// Branches in the canonical order that fixes the global branch index
    /// space: lines, transformers, VSCs, HVDC links, DC lines.
    pub fn branch_iter(&self) -> impl Iterator<Item = BranchRef<'_>> {
        self.lines
            .iter()
            .map(BranchRef::Line)
            .chain(self.transformers.iter().map(BranchRef::Transformer2W))
            .chain(self.vscs.iter().map(BranchRef::Vsc))
            .chain(self.hvdc_links.iter().map(BranchRef::HvdcLink))
            .chain(self.dc_lines.iter().map(BranchRef::DcLine))
    }

    /// Check structural consistency of every device's bus references.
    pub fn check_references(&self) -> VoltaResult<()> {
        let nbus = self.buses.len();
        for br in self.branch_iter() {
            for bus in [br.from_bus(), br.to_bus()] {
                if bus >= nbus {
                    return Err(VoltaError::UnknownBus {
                        device: format!("{} {}", br.technology(), br.name()),
                        bus,
                        nbus,
                    });
                }
            }
        }
        let injections = self
            .loads
            .iter()
            .map(|d| (d.bus, format!("load {}", d.name)))
            .chain(
                self.generators
                    .iter()
                    .map(|d| (d.bus, format!("generator {}", d.name))),
            )
            .chain(
                self.batteries
                    .iter()
                    .map(|d| (d.bus, format!("battery {}", d.name))),
            )
            .chain(
                self.shunts
                    .iter()
                    .map(|d| (d.bus, format!("shunt {}", d.name))),
            );
        for (bus, device) in injections {
            if bus >= nbus {
                return Err(VoltaError::UnknownBus { device, bus, nbus });
            }
        }
        Ok(())
    }

    /// Light sanity checks that accumulate into the given diagnostics.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        if self.buses.is_empty() {
            diag.add_error("structure", "grid has no buses");
            return;
        }
        if self.branch_count() == 0 && self.buses.len() > 1 {
            diag.add_error("structure", "grid has multiple buses but no branches");
        }
        if self.generators.is_empty() && self.batteries.is_empty() {
            diag.add_warning("structure", "grid has no generation devices");
        }
        if self.sbase <= 0.0 {
            diag.add_error("structure", format!("invalid power base {} MVA", self.sbase));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_iter_follows_canonical_order() {
        let mut grid = Grid::new("order");
        grid.buses = vec![Bus::new("b0", 132.0), Bus::new("b1", 132.0)];
        grid.dc_lines.push(DcLine {
            name: "dc".into(),
            from: 0,
            to: 1,
            ..Default::default()
        });
        grid.lines.push(Line::new("l", 0, 1, 0.01, 0.1, 0.0));
        grid.transformers.push(Transformer2W::new("t", 0, 1, 0.01, 0.1));

        let technologies: Vec<&str> = grid.branch_iter().map(|b| b.technology()).collect();
        assert_eq!(technologies, ["line", "transformer", "dc line"]);
        assert_eq!(grid.branch_count(), 3);
    }

    #[test]
    fn temperature_corrected_resistance() {
        let line = Line {
            r: 0.05,
            alpha: 0.004,
            temp_base: Celsius(20.0),
            temp_oper: Celsius(70.0),
            ..Line::new("l", 0, 1, 0.05, 0.1, 0.0)
        };
        assert!((line.r_corrected() - 0.05 * 1.2).abs() < 1e-12);
    }

    #[test]
    fn virtual_taps_match_windings_by_proximity() {
        let tx = Transformer2W {
            hv: Kilovolts(132.0),
            lv: Kilovolts(11.0),
            ..Transformer2W::new("t", 0, 1, 0.01, 0.08)
        };
        // HV winding sits on the 130 kV bus regardless of connection order.
        let (tap_f, tap_t) = tx.virtual_taps(Kilovolts(130.0), Kilovolts(11.0));
        assert!((tap_f - 132.0 / 130.0).abs() < 1e-12);
        assert!((tap_t - 1.0).abs() < 1e-12);

        let (tap_f, tap_t) = tx.virtual_taps(Kilovolts(11.0), Kilovolts(130.0));
        assert!((tap_f - 1.0).abs() < 1e-12);
        assert!((tap_t - 132.0 / 130.0).abs() < 1e-12);
    }

    #[test]
    fn virtual_taps_degenerate_bases_fall_back_to_unity() {
        let tx = Transformer2W::new("t", 0, 1, 0.01, 0.08);
        let (tap_f, tap_t) = tx.virtual_taps(Kilovolts(0.0), Kilovolts(0.0));
        assert_eq!((tap_f, tap_t), (1.0, 1.0));
    }

    #[test]
    fn check_references_rejects_dangling_bus() {
        let mut grid = Grid::new("bad");
        grid.buses = vec![Bus::new("b0", 132.0)];
        grid.lines.push(Line::new("l", 0, 3, 0.01, 0.1, 0.0));
        match grid.check_references() {
            Err(VoltaError::UnknownBus { bus, nbus, .. }) => {
                assert_eq!(bus, 3);
                assert_eq!(nbus, 1);
            }
            other => panic!("expected UnknownBus, got {:?}", other),
        }
    }

    #[test]
    fn validate_flags_empty_grid() {
        let grid = Grid::new("empty");
        let mut diag = Diagnostics::new();
        grid.validate_into(&mut diag);
        assert!(diag.has_errors());
    }
}
