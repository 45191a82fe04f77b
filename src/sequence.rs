//! Linear walk over a track's component sequence. Maintains a running
//! time cursor and a crossfade state machine, producing ordered items
//! with position/duration/offset/fade. Component failures are contained:
//! one bad component never aborts the rest of the sequence.

use tracing::warn;

use crate::{
    error::{AaflineError, AaflineResult},
    essence::EssenceCache,
    graph::{Interpolation, Parameter, Segment, TransitionEffect},
    ops::parse_operation_group,
    timeline::{FadeShape, Item},
};

/// Crossfade bookkeeping between components.
#[derive(Clone, Copy, Debug, PartialEq)]
enum FadeState {
    /// Last boundary was a plain cut.
    Idle,
    /// A transition was seen; the next item gets this fade-in.
    Pending { length: f64, shape: FadeShape },
    /// A filler gap intervened; nothing may fade across it.
    Suppressed,
}

pub fn parse_sequence(components: &[Segment], edit_rate: f64, cache: &EssenceCache) -> Vec<Item> {
    if edit_rate <= 0.0 {
        warn!("sequence has a zero edit rate, skipping");
        return Vec::new();
    }

    let mut items = Vec::new();
    let mut time = 0.0_f64;
    let mut fade = FadeState::Idle;

    for component in components {
        if let Err(e) = parse_component(component, edit_rate, cache, &mut items, &mut time, &mut fade)
        {
            warn!(seconds = time, error = %e, "failed to parse component");
        }
    }

    items
}

fn parse_component(
    component: &Segment,
    edit_rate: f64,
    cache: &EssenceCache,
    items: &mut Vec<Item>,
    time: &mut f64,
    fade: &mut FadeState,
) -> AaflineResult<()> {
    let duration = component.length() as f64 / edit_rate;

    match component {
        Segment::SourceClip {
            mob_name,
            slot_id,
            start,
            ..
        } => {
            let mut item = Item {
                source: cache.source_string(mob_name, *slot_id),
                offset: *start as f64 / edit_rate,
                position: *time,
                duration,
                ..Item::default()
            };
            take_pending_fade(fade, &mut item);
            items.push(item);
            *time += duration;
        }

        Segment::OperationGroup {
            length,
            operation,
            parameters,
            inputs,
        } => {
            let partial =
                parse_operation_group(operation, parameters, inputs, *length, edit_rate, cache);
            let mut item = Item {
                source: partial.source.unwrap_or_else(|| {
                    warn!(seconds = *time, "failed to find item source");
                    String::new()
                }),
                offset: partial.offset.unwrap_or_else(|| {
                    warn!(seconds = *time, "failed to find item offset");
                    0.0
                }),
                position: *time,
                duration,
                volume: partial.volume,
                playbackrate: partial.playbackrate,
                volume_envelope: partial.volume_envelope,
                panning_envelope: partial.panning_envelope,
                ..Item::default()
            };
            take_pending_fade(fade, &mut item);
            items.push(item);
            *time += duration;
        }

        Segment::Transition { effect, .. } => {
            let shape = transition_shape(effect.as_ref());
            if *fade == FadeState::Idle {
                // A transition after a plain cut fades out the item it
                // overlaps.
                let previous = items.last_mut().ok_or_else(|| {
                    AaflineError::parse("transition has no preceding item")
                })?;
                previous.fadeout = Some(duration);
                previous.fadeouttype = Some(shape);
            }
            *fade = FadeState::Pending {
                length: duration,
                shape,
            };
            // The next clip starts under the tail of the previous one.
            *time -= duration;
        }

        Segment::Filler { .. } => {
            *fade = FadeState::Suppressed;
            *time += duration;
        }

        other @ (Segment::Sequence { .. }
        | Segment::NestedScope { .. }
        | Segment::DescriptiveMarker { .. }) => {
            return Err(AaflineError::parse(format!(
                "unsupported component kind {}",
                other.kind_name()
            )));
        }
    }

    Ok(())
}

fn take_pending_fade(fade: &mut FadeState, item: &mut Item) {
    if let FadeState::Pending { length, shape } = *fade {
        item.fadein = Some(length);
        item.fadeintype = Some(shape);
    }
    *fade = FadeState::Idle;
}

/// Linear unless the transition embeds a power-interpolated shape curve.
fn transition_shape(effect: Option<&TransitionEffect>) -> FadeShape {
    match effect.and_then(|e| e.parameters.first()) {
        Some(Parameter::Varying {
            interpolation: Interpolation::Power,
            ..
        }) => FadeShape::Power,
        _ => FadeShape::Linear,
    }
}
