use std::collections::BTreeMap;
use std::path::PathBuf;

/// Fixed-point time ratio (ticks per second for edit rates, plain
/// fractions for constant parameter values).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rational {
    pub num: i64,
    pub den: i64,
}

impl Rational {
    pub fn new(num: i64, den: i64) -> Self {
        Self { num, den }
    }

    /// Zero denominators collapse to 0.0 instead of dividing by zero;
    /// downstream code treats a zero edit rate as unresolvable anyway.
    pub fn as_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MediaKind {
    Picture,
    Sound,
    LegacySound,
    DescriptiveMetadata,
    Timecode,
    Other,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Interpolation {
    #[default]
    Linear,
    Power,
    Constant,
}

/// One point of a time-varying parameter curve. `time` is normalized to
/// the enclosing operation group's extent (0..=1).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CurvePoint {
    pub time: f64,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Parameter {
    Constant {
        name: String,
        value: Rational,
    },
    Varying {
        name: String,
        interpolation: Interpolation,
        points: Vec<CurvePoint>,
    },
}

impl Parameter {
    pub fn name(&self) -> &str {
        match self {
            Parameter::Constant { name, .. } => name,
            Parameter::Varying { name, .. } => name,
        }
    }
}

/// 16-bit-per-channel colour as stored on comment markers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WideColour {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

/// Crossfade-shape effect embedded in a Transition.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransitionEffect {
    pub parameters: Vec<Parameter>,
}

/// Timeline content of a slot. Closed union: every consumer matches
/// exhaustively and reports unsupported shapes instead of dropping them.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Segment {
    SourceClip {
        length: i64,
        mob_name: String,
        slot_id: u32,
        start: i64,
    },
    Sequence {
        length: i64,
        components: Vec<Segment>,
    },
    OperationGroup {
        length: i64,
        operation: String,
        parameters: Vec<Parameter>,
        /// Input segments; the wrapped segment is `inputs[0]`.
        inputs: Vec<Segment>,
    },
    Transition {
        length: i64,
        effect: Option<TransitionEffect>,
    },
    Filler {
        length: i64,
    },
    NestedScope {
        length: i64,
        slots: Vec<Segment>,
    },
    /// Comment-marker component found inside DescriptiveMetadata
    /// sequences; position is in the owning slot's edit-rate ticks.
    DescriptiveMarker {
        position: i64,
        comment: String,
        colour: Option<WideColour>,
    },
}

impl Segment {
    pub fn length(&self) -> i64 {
        match self {
            Segment::SourceClip { length, .. }
            | Segment::Sequence { length, .. }
            | Segment::OperationGroup { length, .. }
            | Segment::Transition { length, .. }
            | Segment::Filler { length }
            | Segment::NestedScope { length, .. } => *length,
            Segment::DescriptiveMarker { .. } => 0,
        }
    }

    /// Short tag for log messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Segment::SourceClip { .. } => "SourceClip",
            Segment::Sequence { .. } => "Sequence",
            Segment::OperationGroup { .. } => "OperationGroup",
            Segment::Transition { .. } => "Transition",
            Segment::Filler { .. } => "Filler",
            Segment::NestedScope { .. } => "NestedScope",
            Segment::DescriptiveMarker { .. } => "DescriptiveMarker",
        }
    }
}

/// A timed channel within a mob.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Slot {
    pub slot_id: u32,
    pub name: String,
    pub edit_rate: Rational,
    pub media_kind: MediaKind,
    pub segment: Segment,
}

/// Master mob: the clip-level entity whose `(name, slot_id)` pairs key
/// the essence cache.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MasterMob {
    pub name: String,
    pub slots: Vec<Slot>,
}

/// Raw media carrier referenced by a master-mob slot. Embedded essence
/// holds the full sample payload; linked essence only a descriptor.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SourceMob {
    #[serde(default)]
    pub essence: Option<Vec<u8>>,
    #[serde(default)]
    pub descriptor: Option<EssenceDescriptor>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EssenceDescriptor {
    #[serde(default)]
    pub container_format: Option<String>,
    pub quantization_bits: u16,
    pub sample_rate: Rational,
    pub channels: u16,
    #[serde(default)]
    pub locator_url: Option<String>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CompositionMob {
    pub name: String,
    pub slots: Vec<Slot>,
}

/// Identification metadata written by the encoding application.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ContainerIdentity {
    pub company: String,
    pub product: String,
    pub version: String,
    pub date: String,
    pub platform: String,
}

/// Typed read-only view of one decoded container, as handed over by the
/// external binary-decoding layer.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AafFile {
    /// Directory the container was opened from; used for sibling-file
    /// path repair when a locator points at a stale absolute path.
    pub directory: PathBuf,
    #[serde(default)]
    pub identity: Option<ContainerIdentity>,
    pub master_mobs: Vec<MasterMob>,
    /// Source mobs keyed by mob name.
    pub source_mobs: BTreeMap<String, SourceMob>,
    pub compositions: Vec<CompositionMob>,
}

impl AafFile {
    /// Product name of the encoding application, empty if the identity
    /// list is missing. Drives encoder-specific workarounds.
    pub fn encoder(&self) -> &str {
        self.identity.as_ref().map_or("", |id| id.product.as_str())
    }

    pub fn source_mob(&self, name: &str) -> Option<&SourceMob> {
        self.source_mobs.get(name)
    }

    pub fn composition_names(&self) -> Vec<String> {
        self.compositions.iter().map(|c| c.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_zero_denominator_is_zero() {
        assert_eq!(Rational::new(48_000, 0).as_f64(), 0.0);
        assert_eq!(Rational::new(48_000, 1).as_f64(), 48_000.0);
        assert!((Rational::new(1, 2).as_f64() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn segment_length_covers_all_variants() {
        let seq = Segment::Sequence {
            length: 10,
            components: vec![Segment::Filler { length: 10 }],
        };
        assert_eq!(seq.length(), 10);
        let marker = Segment::DescriptiveMarker {
            position: 5,
            comment: "x".to_string(),
            colour: None,
        };
        assert_eq!(marker.length(), 0);
        assert_eq!(marker.kind_name(), "DescriptiveMarker");
    }

    #[test]
    fn json_roundtrip() {
        let file = AafFile {
            directory: PathBuf::from("/media/project"),
            identity: Some(ContainerIdentity {
                company: "Acme".to_string(),
                product: "CutMaster".to_string(),
                version: "1.0".to_string(),
                date: "2024-01-01".to_string(),
                platform: "Linux".to_string(),
            }),
            master_mobs: vec![MasterMob {
                name: "Clip1".to_string(),
                slots: vec![Slot {
                    slot_id: 1,
                    name: "A1".to_string(),
                    edit_rate: Rational::new(48_000, 1),
                    media_kind: MediaKind::Sound,
                    segment: Segment::SourceClip {
                        length: 96_000,
                        mob_name: "Clip1.src".to_string(),
                        slot_id: 1,
                        start: 0,
                    },
                }],
            }],
            source_mobs: BTreeMap::new(),
            compositions: vec![],
        };

        let s = serde_json::to_string_pretty(&file).unwrap();
        let de: AafFile = serde_json::from_str(&s).unwrap();
        assert_eq!(de.encoder(), "CutMaster");
        assert_eq!(de.master_mobs.len(), 1);
        assert_eq!(de.master_mobs[0].slots[0].edit_rate.as_f64(), 48_000.0);
    }

    #[test]
    fn encoder_is_empty_without_identity() {
        let file = AafFile {
            directory: PathBuf::new(),
            identity: None,
            master_mobs: vec![],
            source_mobs: BTreeMap::new(),
            compositions: vec![],
        };
        assert_eq!(file.encoder(), "");
    }
}
