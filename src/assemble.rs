//! Top-level dispatch over a composition's slots by media kind, plus the
//! whole-import convenience flow. Per-slot failures are contained: one
//! bad slot never aborts the composition.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::{
    error::{AaflineError, AaflineResult},
    essence::EssenceCache,
    graph::{AafFile, CompositionMob, MediaKind, Parameter, Segment, Slot},
    ops::scale_curve,
    sequence::parse_sequence,
    timeline::{Colour, Marker, TimelineDocument, Track},
};

/// Encoder whose declared group lengths are unreliable for pan envelope
/// scaling; the wrapped sequence's own length is used instead.
const QUIRKY_LENGTH_ENCODER: &str = "DaVinci Resolve";

pub fn assemble(file: &AafFile, composition: &CompositionMob, cache: &EssenceCache) -> TimelineDocument {
    let mut doc = TimelineDocument::default();

    for slot in &composition.slots {
        let outcome = match slot.media_kind {
            MediaKind::Picture => picture_tracks(slot, cache).map(|tracks| {
                doc.tracks.extend(tracks);
            }),
            MediaKind::Sound | MediaKind::LegacySound => {
                sound_track(file.encoder(), slot, cache).map(|mut track| {
                    crate::automation::collapse_automation(&mut track);
                    doc.tracks.push(track);
                })
            }
            MediaKind::DescriptiveMetadata => markers(slot).map(|markers| {
                doc.markers.extend(markers);
            }),
            MediaKind::Timecode | MediaKind::Other => {
                debug!(slot = %slot.name, "skipping slot of unhandled media kind");
                Ok(())
            }
        };
        if let Err(e) = outcome {
            warn!(slot = %slot.name, error = %e, "failed parsing slot");
        }
    }

    doc
}

/// A Picture slot is either a plain sequence (one named track) or a
/// nested-scope container of sequences (anonymous tracks, one each).
fn picture_tracks(slot: &Slot, cache: &EssenceCache) -> AaflineResult<Vec<Track>> {
    let edit_rate = slot.edit_rate.as_f64();
    let mut tracks = Vec::new();

    match &slot.segment {
        Segment::NestedScope { slots, .. } => {
            for inner in slots {
                let Segment::Sequence { components, .. } = inner else {
                    warn!(
                        slot = %slot.name,
                        kind = inner.kind_name(),
                        "unsupported segment inside nested scope"
                    );
                    continue;
                };
                let items = parse_sequence(components, edit_rate, cache);
                if !items.is_empty() {
                    tracks.push(Track {
                        name: String::new(),
                        items,
                        ..Track::default()
                    });
                }
            }
        }
        Segment::Sequence { components, .. } => {
            let items = parse_sequence(components, edit_rate, cache);
            if !items.is_empty() {
                tracks.push(Track {
                    name: slot.name.clone(),
                    items,
                    ..Track::default()
                });
            }
        }
        other => {
            return Err(AaflineError::parse(format!(
                "unsupported picture slot segment {}",
                other.kind_name()
            )));
        }
    }

    Ok(tracks)
}

/// A Sound slot is either a plain sequence, or an effect group carrying
/// track-level pan whose first input is the real item sequence.
fn sound_track(encoder: &str, slot: &Slot, cache: &EssenceCache) -> AaflineResult<Track> {
    let edit_rate = slot.edit_rate.as_f64();
    let mut track = Track {
        name: slot.name.clone(),
        ..Track::default()
    };

    match &slot.segment {
        Segment::OperationGroup {
            length,
            parameters,
            inputs,
            ..
        } => {
            let wrapped = inputs.first();
            for p in parameters {
                match p {
                    Parameter::Constant { name, value } if name == "Pan value" => {
                        track.panning = Some(value.as_f64() * 2.0 - 1.0);
                    }
                    Parameter::Varying { name, points, .. }
                        if name == "Pan" || name == "Pan Level" =>
                    {
                        // The declared group length is unreliable for at
                        // least one encoder; its wrapped sequence knows
                        // the real extent.
                        let length = if encoder == QUIRKY_LENGTH_ENCODER {
                            wrapped.map_or(*length, Segment::length)
                        } else {
                            *length
                        };
                        let duration = if edit_rate > 0.0 {
                            length as f64 / edit_rate
                        } else {
                            0.0
                        };
                        let mut env = scale_curve(points, duration);
                        for point in &mut env {
                            point.value = point.value * -2.0 + 1.0;
                        }
                        track.panning_envelope = Some(env);
                    }
                    _ => {}
                }
            }

            match wrapped {
                Some(Segment::Sequence { components, .. }) => {
                    track.items = parse_sequence(components, edit_rate, cache);
                }
                Some(other) => {
                    return Err(AaflineError::parse(format!(
                        "sound slot effect wraps unsupported segment {}",
                        other.kind_name()
                    )));
                }
                None => {
                    return Err(AaflineError::parse("sound slot effect has no input"));
                }
            }
        }
        Segment::Sequence { components, .. } => {
            track.items = parse_sequence(components, edit_rate, cache);
        }
        other => {
            return Err(AaflineError::parse(format!(
                "unsupported sound slot segment {}",
                other.kind_name()
            )));
        }
    }

    Ok(track)
}

/// Ordered marker list from a DescriptiveMetadata slot.
fn markers(slot: &Slot) -> AaflineResult<Vec<Marker>> {
    let edit_rate = slot.edit_rate.as_f64();
    if edit_rate <= 0.0 {
        return Err(AaflineError::parse("metadata slot has a zero edit rate"));
    }
    let Segment::Sequence { components, .. } = &slot.segment else {
        return Err(AaflineError::parse(format!(
            "unsupported metadata slot segment {}",
            slot.segment.kind_name()
        )));
    };

    let mut markers = Vec::new();
    for component in components {
        let Segment::DescriptiveMarker {
            position,
            comment,
            colour,
        } = component
        else {
            warn!(
                slot = %slot.name,
                kind = component.kind_name(),
                "unsupported component in metadata slot"
            );
            continue;
        };
        markers.push(Marker {
            position: *position as f64 / edit_rate,
            name: comment.clone(),
            // Wide colour channels attenuate to the destination's 0-255.
            colour: colour.map(|c| Colour {
                r: (c.red / 256) as u8,
                g: (c.green / 256) as u8,
                b: (c.blue / 256) as u8,
            }),
        });
    }
    Ok(markers)
}

/// Full import flow for one container: log identity, run the essence
/// extraction pass, assemble the selected composition.
pub fn import_timeline(
    file: &AafFile,
    target: &Path,
    composition_index: usize,
    progress: Option<&mut dyn FnMut(&str)>,
) -> AaflineResult<TimelineDocument> {
    match &file.identity {
        Some(id) => info!(
            company = %id.company,
            product = %id.product,
            version = %id.version,
            date = %id.date,
            platform = %id.platform,
            "container identity"
        ),
        None => warn!("could not get file identity metadata"),
    }

    let cache = EssenceCache::extract(file, target, progress)?;
    let composition = file.compositions.get(composition_index).ok_or_else(|| {
        AaflineError::parse(format!(
            "composition index {composition_index} out of range ({} available)",
            file.compositions.len()
        ))
    })?;
    Ok(assemble(file, composition, &cache))
}
