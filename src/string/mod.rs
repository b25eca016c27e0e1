//! Physical description of a string: how its dimensions set its pitch, and
//! how a pluck distributes energy across its harmonics.

pub use self::physics::{InvalidConfiguration, PhysicalProperties};

pub mod excitation;
pub mod physics;

/// The highest number of harmonics a string can carry.
///
/// Per-harmonic state is stored in fixed arrays of this size so that changing
/// the harmonic count never allocates on the audio thread.
pub const MAX_HARMONICS: usize = 16;
