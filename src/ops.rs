//! Recursive descent over nested effect operations. Each level extracts
//! whatever gain/pan/speed parameters it recognizes, then descends into
//! the wrapped segment until the chain terminates at a source clip.

use tracing::{debug, warn};

use crate::{
    essence::EssenceCache,
    graph::{CurvePoint, Parameter, Segment},
    timeline::EnvelopePoint,
};

const GAIN_OPERATIONS: [&str; 2] = ["Mono Audio Gain", "Audio Gain"];
const AMPLITUDE_PARAMETERS: [&str; 3] = ["Amplitude", "Amplitude multiplier", "Level"];
const PAN_OPERATION: &str = "Mono Audio Pan";
const GENERIC_OPERATION: &str = "Audio Effect";

/// Nested effect chains deeper than this are treated as malformed.
const MAX_CHAIN_DEPTH: u32 = 16;

/// Whatever an effect chain could determine about an item. Missing
/// fields are filled by the caller or left absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PartialItem {
    pub volume: Option<f64>,
    pub volume_envelope: Option<Vec<EnvelopePoint>>,
    pub panning_envelope: Option<Vec<EnvelopePoint>>,
    pub playbackrate: Option<f64>,
    pub source: Option<String>,
    pub offset: Option<f64>,
}

impl PartialItem {
    /// Fields set at an outer chain level win over inner levels.
    fn merge_missing(&mut self, inner: PartialItem) {
        self.volume = self.volume.or(inner.volume);
        self.volume_envelope = self.volume_envelope.take().or(inner.volume_envelope);
        self.panning_envelope = self.panning_envelope.take().or(inner.panning_envelope);
        self.playbackrate = self.playbackrate.or(inner.playbackrate);
        self.source = self.source.take().or(inner.source);
        self.offset = self.offset.or(inner.offset);
    }
}

/// Scale a normalized parameter curve to absolute-within-item seconds.
pub(crate) fn scale_curve(points: &[CurvePoint], duration: f64) -> Vec<EnvelopePoint> {
    points
        .iter()
        .map(|p| EnvelopePoint {
            time: p.time * duration,
            value: p.value,
        })
        .collect()
}

pub fn parse_operation_group(
    operation: &str,
    parameters: &[Parameter],
    inputs: &[Segment],
    length: i64,
    edit_rate: f64,
    cache: &EssenceCache,
) -> PartialItem {
    parse_group_inner(operation, parameters, inputs, length, edit_rate, cache, 0)
}

fn parse_group_inner(
    operation: &str,
    parameters: &[Parameter],
    inputs: &[Segment],
    length: i64,
    edit_rate: f64,
    cache: &EssenceCache,
    depth: u32,
) -> PartialItem {
    let mut item = PartialItem::default();
    let duration = if edit_rate > 0.0 {
        length as f64 / edit_rate
    } else {
        warn!(operation, "effect group has a zero edit rate");
        0.0
    };

    if GAIN_OPERATIONS.contains(&operation) {
        for p in parameters {
            if !AMPLITUDE_PARAMETERS.contains(&p.name()) {
                continue;
            }
            match p {
                Parameter::Varying { points, .. } => {
                    item.volume_envelope = Some(scale_curve(points, duration));
                }
                Parameter::Constant { value, .. } => {
                    item.volume = Some(value.as_f64());
                }
            }
        }
    }

    if operation == PAN_OPERATION {
        for p in parameters {
            if let Parameter::Varying { name, points, .. } = p
                && name == "Pan value"
            {
                // Map the source pan range (0..1, left to right) onto the
                // destination's (1..-1).
                let mut env = scale_curve(points, duration);
                for point in &mut env {
                    point.value = point.value * -2.0 + 1.0;
                }
                item.panning_envelope = Some(env);
            }
        }
    }

    if operation == GENERIC_OPERATION {
        for p in parameters {
            match p {
                Parameter::Constant { name, value } if name == "SpeedRatio" => {
                    item.playbackrate = Some(value.as_f64());
                }
                p if p.name().is_empty() => {
                    // Some encoders store per-item volume and pan under a
                    // blank parameter name; which axis it is cannot be
                    // told apart from context, so it is skipped.
                    debug!("skipping blank-named effect parameter");
                }
                _ => {}
            }
        }
    }

    let Some(mut wrapped) = inputs.first() else {
        warn!(operation, "effect group has no input segment");
        return item;
    };

    // Some encoders interpose a single-component Sequence between the
    // group and its real input; unwrap one level.
    if let Segment::Sequence { components, .. } = wrapped {
        if components.len() > 1 {
            debug!(
                components = components.len(),
                "effect input sequence has more than one component, using the first"
            );
        }
        match components.first() {
            Some(component) => wrapped = component,
            None => {
                warn!(operation, "effect input sequence is empty");
                return item;
            }
        }
    }

    match wrapped {
        Segment::OperationGroup {
            length,
            operation: inner_op,
            parameters: inner_params,
            inputs: inner_inputs,
        } => {
            if depth >= MAX_CHAIN_DEPTH {
                warn!(operation, "effect chain exceeds maximum nesting depth");
            } else {
                let inner = parse_group_inner(
                    inner_op,
                    inner_params,
                    inner_inputs,
                    *length,
                    edit_rate,
                    cache,
                    depth + 1,
                );
                item.merge_missing(inner);
            }
        }
        Segment::SourceClip {
            mob_name,
            slot_id,
            start,
            ..
        } => {
            item.source = Some(cache.source_string(mob_name, *slot_id));
            item.offset = Some(ticks_to_seconds(*start, edit_rate));
        }
        other => {
            warn!(
                operation,
                kind = other.kind_name(),
                "unsupported segment at the end of an effect chain"
            );
        }
    }

    item
}

fn ticks_to_seconds(ticks: i64, edit_rate: f64) -> f64 {
    if edit_rate > 0.0 {
        ticks as f64 / edit_rate
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Rational;

    fn rate() -> f64 {
        Rational::new(48_000, 1).as_f64()
    }

    fn clip(mob: &str, slot: u32, start: i64) -> Segment {
        Segment::SourceClip {
            length: 96_000,
            mob_name: mob.to_string(),
            slot_id: slot,
            start,
        }
    }

    fn cache_with(mob: &str, slot: u32, path: &str) -> EssenceCache {
        let mut cache = EssenceCache::new();
        cache.insert(mob, slot, crate::essence::EssenceRef::Local(path.into()));
        cache
    }

    #[test]
    fn constant_gain_becomes_item_volume() {
        let cache = cache_with("Clip1", 1, "/tmp/a.wav");
        let params = vec![Parameter::Constant {
            name: "Amplitude".to_string(),
            value: Rational::new(1, 2),
        }];
        let inputs = vec![clip("Clip1", 1, 48_000)];

        let item = parse_operation_group("Mono Audio Gain", &params, &inputs, 96_000, rate(), &cache);
        assert_eq!(item.volume, Some(0.5));
        assert_eq!(item.source.as_deref(), Some("/tmp/a.wav"));
        assert_eq!(item.offset, Some(1.0));
        assert!(item.volume_envelope.is_none());
    }

    #[test]
    fn varying_gain_scales_points_by_group_duration() {
        let cache = cache_with("Clip1", 1, "/tmp/a.wav");
        let params = vec![Parameter::Varying {
            name: "Level".to_string(),
            interpolation: Default::default(),
            points: vec![
                CurvePoint { time: 0.0, value: 1.0 },
                CurvePoint { time: 0.5, value: 0.25 },
                CurvePoint { time: 1.0, value: 1.0 },
            ],
        }];
        let inputs = vec![clip("Clip1", 1, 0)];

        // 96000 ticks at 48000/s = 2 seconds.
        let item = parse_operation_group("Audio Gain", &params, &inputs, 96_000, rate(), &cache);
        let env = item.volume_envelope.unwrap();
        assert_eq!(env.len(), 3);
        assert!((env[1].time - 1.0).abs() < 1e-9);
        assert!((env[1].value - 0.25).abs() < 1e-9);
        assert!((env[2].time - 2.0).abs() < 1e-9);
    }

    #[test]
    fn pan_curve_is_remapped_to_destination_range() {
        let cache = cache_with("Clip1", 1, "/tmp/a.wav");
        let params = vec![Parameter::Varying {
            name: "Pan value".to_string(),
            interpolation: Default::default(),
            points: vec![
                CurvePoint { time: 0.0, value: 0.0 },
                CurvePoint { time: 1.0, value: 1.0 },
            ],
        }];
        let inputs = vec![clip("Clip1", 1, 0)];

        let item = parse_operation_group(PAN_OPERATION, &params, &inputs, 48_000, rate(), &cache);
        let env = item.panning_envelope.unwrap();
        // 0 (full left) -> 1, 1 (full right) -> -1.
        assert!((env[0].value - 1.0).abs() < 1e-9);
        assert!((env[1].value - -1.0).abs() < 1e-9);
    }

    #[test]
    fn speed_ratio_sets_playback_rate() {
        let cache = cache_with("Clip1", 1, "/tmp/a.wav");
        let params = vec![
            Parameter::Constant {
                name: String::new(),
                value: Rational::new(1, 1),
            },
            Parameter::Constant {
                name: "SpeedRatio".to_string(),
                value: Rational::new(2, 1),
            },
        ];
        let inputs = vec![clip("Clip1", 1, 0)];

        let item = parse_operation_group(GENERIC_OPERATION, &params, &inputs, 48_000, rate(), &cache);
        assert_eq!(item.playbackrate, Some(2.0));
    }

    #[test]
    fn nested_groups_accumulate_with_outer_precedence() {
        let cache = cache_with("Clip1", 1, "/tmp/a.wav");
        let inner = Segment::OperationGroup {
            length: 96_000,
            operation: "Mono Audio Gain".to_string(),
            parameters: vec![Parameter::Constant {
                name: "Amplitude".to_string(),
                value: Rational::new(1, 4),
            }],
            inputs: vec![clip("Clip1", 1, 0)],
        };
        let outer_params = vec![Parameter::Constant {
            name: "Amplitude".to_string(),
            value: Rational::new(1, 2),
        }];
        let inputs = vec![inner];

        let item =
            parse_operation_group("Mono Audio Gain", &outer_params, &inputs, 96_000, rate(), &cache);
        assert_eq!(item.volume, Some(0.5));
        assert_eq!(item.source.as_deref(), Some("/tmp/a.wav"));
    }

    #[test]
    fn single_component_sequence_is_unwrapped() {
        let cache = cache_with("Clip1", 1, "/tmp/a.wav");
        let wrapped = Segment::Sequence {
            length: 96_000,
            components: vec![clip("Clip1", 1, 24_000)],
        };
        let inputs = vec![wrapped];

        let item = parse_operation_group("Audio Effect", &[], &inputs, 96_000, rate(), &cache);
        assert_eq!(item.source.as_deref(), Some("/tmp/a.wav"));
        assert_eq!(item.offset, Some(0.5));
    }

    #[test]
    fn unsupported_terminal_yields_empty_contribution() {
        let cache = EssenceCache::new();
        let inputs = vec![Segment::Filler { length: 48_000 }];

        let item = parse_operation_group("Audio Effect", &[], &inputs, 48_000, rate(), &cache);
        assert_eq!(item, PartialItem::default());
    }
}
