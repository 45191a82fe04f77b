//! Collapses per-item automation curves into track-level piecewise-linear
//! envelopes. Track envelopes span the whole track, so items that carry
//! no automation of their own are bracketed with neutral anchor points to
//! keep a neighbour's curve from bleeding over them.

use crate::timeline::{EnvelopePoint, Item, Track};

/// "No change" value per axis: full volume, centre pan.
const NEUTRAL_VOLUME: f64 = 1.0;
const NEUTRAL_PAN: f64 = 0.0;

/// Replaces per-item volume/pan envelopes with track-level ones. A track
/// with no automated item on an axis keeps no envelope on that axis; in
/// particular a track-level envelope set before collapsing (slot-level
/// pan) survives untouched.
pub fn collapse_automation(track: &mut Track) {
    if let Some(env) = collapse_axis(&mut track.items, NEUTRAL_VOLUME, |item| {
        &mut item.volume_envelope
    }) {
        track.volume_envelope = Some(env);
    }
    if let Some(env) = collapse_axis(&mut track.items, NEUTRAL_PAN, |item| {
        &mut item.panning_envelope
    }) {
        track.panning_envelope = Some(env);
    }
}

fn collapse_axis(
    items: &mut [Item],
    neutral: f64,
    mut axis: impl FnMut(&mut Item) -> &mut Option<Vec<EnvelopePoint>>,
) -> Option<Vec<EnvelopePoint>> {
    if !items.iter_mut().any(|item| axis(item).is_some()) {
        return None;
    }

    let mut envelope = Vec::new();
    for item in items.iter_mut() {
        match axis(item).take() {
            Some(points) => {
                // Item-relative times become track-absolute.
                envelope.extend(points.into_iter().map(|p| EnvelopePoint {
                    time: item.position + p.time,
                    value: p.value,
                }));
            }
            None => {
                envelope.push(EnvelopePoint {
                    time: item.position,
                    value: neutral,
                });
                envelope.push(EnvelopePoint {
                    time: item.position + item.duration,
                    value: neutral,
                });
            }
        }
    }

    envelope.sort_by(|a, b| a.time.total_cmp(&b.time));
    Some(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(position: f64, duration: f64) -> Item {
        Item {
            source: "/tmp/a.wav".to_string(),
            position,
            duration,
            ..Item::default()
        }
    }

    #[test]
    fn untouched_track_keeps_no_envelopes() {
        let mut track = Track {
            name: "A1".to_string(),
            items: vec![item(0.0, 2.0), item(2.0, 2.0)],
            ..Track::default()
        };
        collapse_automation(&mut track);
        assert!(track.volume_envelope.is_none());
        assert!(track.panning_envelope.is_none());
    }

    #[test]
    fn middle_item_curve_is_shifted_and_bracketed() {
        let mut middle = item(2.0, 3.0);
        middle.volume_envelope = Some(vec![
            EnvelopePoint { time: 0.0, value: 1.0 },
            EnvelopePoint { time: 1.5, value: 0.25 },
            EnvelopePoint { time: 3.0, value: 1.0 },
        ]);
        let mut track = Track {
            name: "A1".to_string(),
            items: vec![item(0.0, 2.0), middle, item(5.0, 2.0)],
            ..Track::default()
        };
        collapse_automation(&mut track);

        assert!(track.items.iter().all(|i| i.volume_envelope.is_none()));
        let env = track.volume_envelope.unwrap();
        // Item 2's three points plus two neutral anchors for each
        // unautomated neighbour.
        assert_eq!(env.len(), 7);
        assert_eq!(env[0], EnvelopePoint { time: 0.0, value: 1.0 });
        assert_eq!(env[1], EnvelopePoint { time: 2.0, value: 1.0 });
        assert!((env[3].time - 3.5).abs() < 1e-9);
        assert!((env[3].value - 0.25).abs() < 1e-9);
        assert_eq!(env[5], EnvelopePoint { time: 5.0, value: 1.0 });
        assert_eq!(env[6], EnvelopePoint { time: 7.0, value: 1.0 });
    }

    #[test]
    fn pan_anchors_use_centre_pan() {
        let mut first = item(0.0, 1.0);
        first.panning_envelope = Some(vec![EnvelopePoint { time: 0.5, value: -1.0 }]);
        let mut track = Track {
            name: "A1".to_string(),
            items: vec![first, item(1.0, 1.0)],
            ..Track::default()
        };
        collapse_automation(&mut track);

        let env = track.panning_envelope.unwrap();
        assert_eq!(env.len(), 3);
        assert_eq!(env[1], EnvelopePoint { time: 1.0, value: 0.0 });
        assert_eq!(env[2], EnvelopePoint { time: 2.0, value: 0.0 });
    }

    #[test]
    fn preexisting_track_envelope_survives_when_items_have_none() {
        let slot_level = vec![EnvelopePoint { time: 0.0, value: 0.5 }];
        let mut track = Track {
            name: "A1".to_string(),
            panning_envelope: Some(slot_level.clone()),
            items: vec![item(0.0, 2.0)],
            ..Track::default()
        };
        collapse_automation(&mut track);
        assert_eq!(track.panning_envelope, Some(slot_level));
    }

    #[test]
    fn points_are_sorted_after_collection() {
        // A transition overlap can put an earlier item's tail after the
        // next item's head.
        let mut a = item(0.0, 2.0);
        a.volume_envelope = Some(vec![EnvelopePoint { time: 1.9, value: 0.5 }]);
        let mut b = item(1.5, 2.0);
        b.volume_envelope = Some(vec![EnvelopePoint { time: 0.1, value: 0.7 }]);
        let mut track = Track {
            name: "A1".to_string(),
            items: vec![a, b],
            ..Track::default()
        };
        collapse_automation(&mut track);

        let env = track.volume_envelope.unwrap();
        assert!(env.windows(2).all(|w| w[0].time <= w[1].time));
    }
}
