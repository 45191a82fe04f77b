//! Output value model: the normalized timeline handed to the destination
//! editor backend. Pure data, no back-reference to the container.

/// Piecewise-linear automation point. After collapsing, `time` is
/// track-absolute seconds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnvelopePoint {
    pub time: f64,
    pub value: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FadeShape {
    #[default]
    Linear,
    Power,
}

/// One media item placed on a track. All time fields are seconds;
/// `offset` is relative to the referenced source's own timeline.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Item {
    /// Resolved media path; empty when essence could not be resolved
    /// (the item is still emitted so positions stay contiguous).
    pub source: String,
    pub offset: f64,
    pub position: f64,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playbackrate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fadein: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fadeintype: Option<FadeShape>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fadeout: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fadeouttype: Option<FadeShape>,
    /// Per-item automation, consumed by the collapser and absent from
    /// finished documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_envelope: Option<Vec<EnvelopePoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panning_envelope: Option<Vec<EnvelopePoint>>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Track {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panning: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_envelope: Option<Vec<EnvelopePoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panning_envelope: Option<Vec<EnvelopePoint>>,
    pub items: Vec<Item>,
}

/// 8-bit-per-channel marker colour, attenuated from the container's
/// 16-bit channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Marker {
    pub position: f64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<Colour>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimelineDocument {
    pub tracks: Vec<Track>,
    pub markers: Vec<Marker>,
}
