#![forbid(unsafe_code)]

//! Reconstructs an editable multitrack timeline (tracks, clips,
//! volume/pan automation, fades, markers) from a decoded AAF composition
//! graph. The binary container decoder is external: this crate consumes
//! its typed object graph ([`AafFile`]) and produces a value-only
//! [`TimelineDocument`] for a destination editor to materialize.

pub mod assemble;
pub mod automation;
pub mod error;
pub mod essence;
pub mod graph;
pub mod ops;
pub mod sequence;
pub mod timeline;

pub use assemble::{assemble, import_timeline};
pub use automation::collapse_automation;
pub use error::{AaflineError, AaflineResult};
pub use essence::{EssenceCache, EssenceRef, embedded_count};
pub use graph::{
    AafFile, CompositionMob, ContainerIdentity, CurvePoint, EssenceDescriptor, Interpolation,
    MasterMob, MediaKind, Parameter, Rational, Segment, Slot, SourceMob, TransitionEffect,
    WideColour,
};
pub use ops::{PartialItem, parse_operation_group};
pub use sequence::parse_sequence;
pub use timeline::{Colour, EnvelopePoint, FadeShape, Item, Marker, TimelineDocument, Track};
