//! Target coordinate system
//!
//! A coordinate system is written as three signed axes for right, up and
//! forward, e.g. `+X+Y+Z` or `-X+Z+Y`. The reference frame `+X+Y+Z` is treated
//! as right-handed; specs whose axis permutation flips handedness get a
//! reflection on the "right" axis so the combined conversion stays a proper
//! rotation.

use std::fmt;
use std::str::FromStr;

use glam::{Mat3, Mat4, Vec3};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    fn letter(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
        }
    }
}

/// One `[+-][XYZ]` token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedAxis {
    pub negative: bool,
    pub axis: Axis,
}

impl SignedAxis {
    fn parse(sign: char, axis: char) -> Option<Self> {
        let negative = match sign {
            '+' => false,
            '-' => true,
            _ => return None,
        };
        let axis = match axis {
            'X' => Axis::X,
            'Y' => Axis::Y,
            'Z' => Axis::Z,
            _ => return None,
        };
        Some(Self { negative, axis })
    }

    /// Signed unit vector along this axis
    pub fn vector(self) -> Vec3 {
        let mut v = Vec3::ZERO;
        v[self.axis.index()] = if self.negative { -1.0 } else { 1.0 };
        v
    }
}

impl fmt::Display for SignedAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.negative { '-' } else { '+' };
        write!(f, "{}{}", sign, self.axis.letter())
    }
}

/// Validated target coordinate system. Immutable once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateSystem {
    pub right: SignedAxis,
    pub up: SignedAxis,
    pub forward: SignedAxis,
}

impl CoordinateSystem {
    /// Parse a 6-character spec such as `+X+Z-Y`
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let chars: Vec<char> = spec.chars().collect();
        if chars.len() != 6 {
            return Err(ConfigError::InvalidFormat(spec.to_string()));
        }

        let mut axes = [SignedAxis {
            negative: false,
            axis: Axis::X,
        }; 3];
        for (slot, token) in axes.iter_mut().zip(chars.chunks(2)) {
            *slot = SignedAxis::parse(token[0], token[1])
                .ok_or_else(|| ConfigError::InvalidAxis(spec.to_string()))?;
        }

        let [right, up, forward] = axes;
        if right.axis == up.axis || right.axis == forward.axis || up.axis == forward.axis {
            return Err(ConfigError::DuplicateAxis(spec.to_string()));
        }

        Ok(Self { right, up, forward })
    }

    /// Axis permutation taking reference (right, up, forward) = (X, Y, Z) to the
    /// requested signed axes. Determinant is ±1.
    pub fn rotation_matrix(&self) -> Mat3 {
        Mat3::from_cols(self.right.vector(), self.up.vector(), self.forward.vector())
    }

    /// Whether the permutation flips handedness relative to `+X+Y+Z`
    pub fn is_left_handed(&self) -> bool {
        self.rotation_matrix().determinant() < 0.0
    }

    /// Identity, or a -1 reflection along the axis bound to "right" when the
    /// permutation is left-handed
    pub fn scale_matrix(&self) -> Mat3 {
        if !self.is_left_handed() {
            return Mat3::IDENTITY;
        }
        let mut diagonal = Vec3::ONE;
        diagonal[self.right.axis.index()] = -1.0;
        Mat3::from_diagonal(diagonal)
    }

    /// `rotation · scale` as a homogeneous matrix
    pub fn conversion_matrix(&self) -> Mat4 {
        Mat4::from_mat3(self.rotation_matrix()) * Mat4::from_mat3(self.scale_matrix())
    }
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        Self {
            right: SignedAxis {
                negative: false,
                axis: Axis::X,
            },
            up: SignedAxis {
                negative: false,
                axis: Axis::Y,
            },
            forward: SignedAxis {
                negative: false,
                axis: Axis::Z,
            },
        }
    }
}

impl FromStr for CoordinateSystem {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.right, self.up, self.forward)
    }
}
