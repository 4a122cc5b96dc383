//! Identity and capability records for registered participants.
//!
//! A [`ParticipantDescription`] is what the registry persists: who the
//! participant is (`name` + `owner`, unique as a pair), how it behaves
//! under arbitration ([`Responsiveness`]), and the geometric [`Profile`]
//! the arbitration authority uses for overlap tests. All of it derives
//! the journal's serde representation directly; unknown fields and
//! unrecognized enumerators fail deserialization, which is what makes a
//! malformed journal detectable instead of silently lossy.

use serde::{Deserialize, Serialize};

/// How a participant responds to arbitration decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Responsiveness {
    /// Placeholder for an uninitialized or unusable record.
    Invalid,
    /// The participant does not react to decisions; others must plan
    /// around it.
    Unresponsive,
    /// The participant obeys move/wait instructions.
    Responsive,
}

/// Supported convex shape families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    /// No shape.
    None,
    /// Axis-aligned box.
    Box,
    /// Circle.
    Circle,
}

/// One convex shape, referencing its parameters by index into the
/// enclosing profile's [`ShapeContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConvexShape {
    /// The shape family.
    #[serde(rename = "type")]
    pub kind: ShapeKind,

    /// Index of this shape's parameters in the shape context.
    pub index: u8,
}

/// Numeric parameters backing the shapes of a profile.
///
/// Only circles are parameterized for now, so this is their radii.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeContext {
    /// Circle radii, indexed by [`ConvexShape::index`].
    pub circles: Vec<f64>,
}

/// Geometric footprint and vicinity of a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    /// The space the participant physically occupies.
    pub footprint: ConvexShape,

    /// The space the participant wants kept clear around it.
    pub vicinity: ConvexShape,

    /// Parameters for both shapes.
    pub shape_context: ShapeContext,
}

impl Profile {
    /// A circular profile where footprint and vicinity share one radius.
    #[must_use]
    pub fn circle(radius: f64) -> Self {
        let shape = ConvexShape {
            kind: ShapeKind::Circle,
            index: 0,
        };
        Self {
            footprint: shape,
            vicinity: shape,
            shape_context: ShapeContext {
                circles: vec![radius],
            },
        }
    }
}

/// Identity and capabilities of one registered participant.
///
/// The `(name, owner)` pair is the identity key: unique across all
/// currently registered participants at any instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParticipantDescription {
    /// Name of the participant, unique within its owner.
    pub name: String,

    /// The fleet that owns this participant.
    pub owner: String,

    /// Responsiveness class.
    pub responsiveness: Responsiveness,

    /// Geometric profile used for overlap tests.
    pub profile: Profile,
}

impl ParticipantDescription {
    /// Creates a new description.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        responsiveness: Responsiveness,
        profile: Profile,
    ) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            responsiveness,
            profile,
        }
    }
}
