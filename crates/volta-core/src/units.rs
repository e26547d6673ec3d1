//! Unit newtypes for power-system quantities.
//!
//! Device parameters mix per-unit impedances, MW/Mvar/MVA powers, kV voltage
//! bases, angles and temperatures. Wrapping each quantity in a
//! `#[repr(transparent)]` newtype catches unit mix-ups at compile time while
//! costing nothing at runtime. Array-side numerical code (the compiled
//! circuit) deliberately works on raw `f64`/`Complex64`; units live at the
//! device-model boundary.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

macro_rules! unit_type {
    ($(#[$meta:meta])* $name:ident, $suffix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(pub f64);

        impl $name {
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            #[inline]
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }

            #[inline]
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }
        }

        impl Add for $name {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $name {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $name {
            type Output = Self;
            fn neg(self) -> Self {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $name {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $name {
            type Output = Self;
            fn div(self, rhs: f64) -> Self {
                Self(self.0 / rhs)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $suffix)
            }
        }
    };
}

unit_type!(
    /// Dimensionless per-unit quantity (voltages, impedances, admittances).
    PerUnit,
    "p.u."
);
unit_type!(
    /// Nominal voltage base in kilovolts.
    Kilovolts,
    "kV"
);
unit_type!(
    /// Active power in megawatts.
    Megawatts,
    "MW"
);
unit_type!(
    /// Reactive power in megavars.
    Megavars,
    "Mvar"
);
unit_type!(
    /// Apparent power in megavolt-amperes (thermal ratings).
    MegavoltAmperes,
    "MVA"
);
unit_type!(
    /// Angle in radians.
    Radians,
    "rad"
);
unit_type!(
    /// Angle in degrees.
    Degrees,
    "deg"
);
unit_type!(
    /// Conductor temperature in degrees Celsius (resistance correction).
    Celsius,
    "degC"
);

impl Degrees {
    #[inline]
    pub fn to_radians(self) -> Radians {
        Radians(self.0.to_radians())
    }
}

impl Radians {
    #[inline]
    pub fn to_degrees(self) -> Degrees {
        Degrees(self.0.to_degrees())
    }

    #[inline]
    pub fn sin(self) -> f64 {
        self.0.sin()
    }

    #[inline]
    pub fn cos(self) -> f64 {
        self.0.cos()
    }
}
