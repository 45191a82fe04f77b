//! Essence resolution: decides embedded-extraction vs. linked-file
//! resolution for every `(mob, slot)` media reference, performs
//! cross-platform path repair on locator URLs, and memoizes the result
//! for the lifetime of one open-container session.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::{
    error::{AaflineError, AaflineResult},
    graph::{AafFile, MediaKind, Segment, Slot, SourceMob},
};

/// Outcome of resolving one media reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EssenceRef {
    Local(PathBuf),
    Unresolved,
}

static UNRESOLVED: EssenceRef = EssenceRef::Unresolved;

impl EssenceRef {
    /// Item-level source string: the path, or empty as the explicit
    /// unresolved placeholder.
    pub fn as_source_string(&self) -> String {
        match self {
            EssenceRef::Local(path) => path.to_string_lossy().into_owned(),
            EssenceRef::Unresolved => String::new(),
        }
    }
}

/// Write-once, read-many table of resolved essence references, built by
/// a single extraction pass before any composition is parsed and
/// discarded with the container session.
#[derive(Debug, Default)]
pub struct EssenceCache {
    files: HashMap<(String, u32), EssenceRef>,
}

impl EssenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mob_name: impl Into<String>, slot_id: u32, entry: EssenceRef) {
        self.files.insert((mob_name.into(), slot_id), entry);
    }

    /// O(1) memoized lookup. Unknown keys are logged and come back
    /// `Unresolved`, never an error.
    pub fn resolve(&self, mob_name: &str, slot_id: u32) -> &EssenceRef {
        match self.files.get(&(mob_name.to_string(), slot_id)) {
            Some(entry) => entry,
            None => {
                warn!(mob = mob_name, slot = slot_id, "cannot find essence for mob slot");
                &UNRESOLVED
            }
        }
    }

    pub fn source_string(&self, mob_name: &str, slot_id: u32) -> String {
        self.resolve(mob_name, slot_id).as_source_string()
    }

    /// Single enumeration pass over every master-mob slot: embedded audio
    /// is materialized under `target`, linked media resolved through its
    /// locator. `progress` is invoked once per extracted file.
    pub fn extract(
        file: &AafFile,
        target: &Path,
        mut progress: Option<&mut dyn FnMut(&str)>,
    ) -> AaflineResult<Self> {
        std::fs::create_dir_all(target).map_err(|e| {
            AaflineError::essence(format!(
                "cannot create essence target '{}': {e}",
                target.display()
            ))
        })?;

        let mut cache = Self::new();
        for mob in &file.master_mobs {
            for slot in &mob.slots {
                let entry = resolve_slot(file, &mob.name, slot, target, &mut progress);
                cache.insert(mob.name.clone(), slot.slot_id, entry);
            }
        }
        Ok(cache)
    }
}

/// Number of embedded audio references in the container, for sizing
/// caller-side progress reporting.
pub fn embedded_count(file: &AafFile) -> usize {
    let mut count = 0;
    for mob in &file.master_mobs {
        for slot in &mob.slots {
            if slot.media_kind == MediaKind::Picture {
                continue;
            }
            let Some(source) = find_source_mob(file, slot) else {
                continue;
            };
            if source.essence.is_some() {
                count += 1;
            }
        }
    }
    count
}

fn resolve_slot(
    file: &AafFile,
    mob_name: &str,
    slot: &Slot,
    target: &Path,
    progress: &mut Option<&mut dyn FnMut(&str)>,
) -> EssenceRef {
    let Some(source) = find_source_mob(file, slot) else {
        warn!(mob = mob_name, slot = slot.slot_id, "cannot find essence for mob slot");
        return EssenceRef::Unresolved;
    };

    // Video cannot be embedded in the container, so Picture slots always
    // resolve through their locator.
    if slot.media_kind == MediaKind::Picture {
        return resolve_linked(source, &file.directory, mob_name);
    }

    match &source.essence {
        Some(payload) => {
            let stem = format!("{}{}", mob_name, slot.name);
            match extract_embedded(source, payload, target, &stem, progress) {
                Ok(path) => EssenceRef::Local(path),
                Err(e) => {
                    warn!(mob = mob_name, slot = slot.slot_id, error = %e, "essence extraction failed");
                    EssenceRef::Unresolved
                }
            }
        }
        None => resolve_linked(source, &file.directory, mob_name),
    }
}

/// The source mob is either referenced directly by the slot's segment or
/// by the first SourceClip inside a wrapping Sequence.
fn find_source_mob<'a>(file: &'a AafFile, slot: &Slot) -> Option<&'a SourceMob> {
    let mob_name = match &slot.segment {
        Segment::SourceClip { mob_name, .. } => Some(mob_name),
        Segment::Sequence { components, .. } => components.iter().find_map(|c| match c {
            Segment::SourceClip { mob_name, .. } => Some(mob_name),
            _ => None,
        }),
        _ => None,
    }?;
    file.source_mob(mob_name)
}

/// Materialize one embedded payload. A still-framed sample container
/// (MXF) gets a synthesized WAV header; anything else is copied verbatim.
fn extract_embedded(
    source: &SourceMob,
    payload: &[u8],
    target: &Path,
    stem: &str,
    progress: &mut Option<&mut dyn FnMut(&str)>,
) -> AaflineResult<PathBuf> {
    let descriptor = source
        .descriptor
        .as_ref()
        .ok_or_else(|| AaflineError::essence("embedded essence has no descriptor"))?;
    let format = descriptor.container_format.as_deref().unwrap_or("");

    let filename = format!("{stem}.{}", extension_for_format(format));
    if let Some(cb) = progress.as_mut() {
        cb(&format!("Extracting {filename}..."));
    }
    info!(file = %filename, "extracting essence");
    let path = target.join(filename);

    if format == "MXF" {
        let rate = descriptor.sample_rate.as_f64().round();
        if rate <= 0.0 {
            return Err(AaflineError::essence("descriptor has invalid sample rate"));
        }
        let spec = hound::WavSpec {
            channels: descriptor.channels.max(1),
            sample_rate: rate as u32,
            bits_per_sample: descriptor.quantization_bits,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec)
            .map_err(|e| AaflineError::essence(format!("cannot create wav: {e}")))?;
        write_pcm_payload(&mut writer, payload, descriptor.quantization_bits)?;
        writer
            .finalize()
            .map_err(|e| AaflineError::essence(format!("cannot finalize wav: {e}")))?;
    } else {
        std::fs::write(&path, payload).map_err(|e| {
            AaflineError::essence(format!("cannot write '{}': {e}", path.display()))
        })?;
    }

    Ok(path)
}

/// Pushes the raw little-endian sample payload through the WAV writer
/// unchanged; only aligned integer depths are representable.
fn write_pcm_payload<W: std::io::Write + std::io::Seek>(
    writer: &mut hound::WavWriter<W>,
    payload: &[u8],
    bits: u16,
) -> AaflineResult<()> {
    let result = match bits {
        8 => payload
            .iter()
            .try_for_each(|b| writer.write_sample(*b as i8)),
        16 => payload
            .chunks_exact(2)
            .try_for_each(|c| writer.write_sample(i16::from_le_bytes([c[0], c[1]]))),
        24 => payload.chunks_exact(3).try_for_each(|c| {
            let sample = i32::from_le_bytes([0, c[0], c[1], c[2]]) >> 8;
            writer.write_sample(sample)
        }),
        32 => payload.chunks_exact(4).try_for_each(|c| {
            writer.write_sample(i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        }),
        other => {
            return Err(AaflineError::essence(format!(
                "unsupported sample depth {other}"
            )));
        }
    };
    result.map_err(|e| AaflineError::essence(format!("cannot write samples: {e}")))
}

fn extension_for_format(format: &str) -> &'static str {
    match format.to_ascii_uppercase().as_str() {
        "AIFF" | "AIFC" => "aif",
        _ => "wav",
    }
}

/// Resolve a linked reference through its locator URL, repairing paths
/// for containers that were relocated together with their media.
fn resolve_linked(source: &SourceMob, container_dir: &Path, mob_name: &str) -> EssenceRef {
    let Some(url) = source
        .descriptor
        .as_ref()
        .and_then(|d| d.locator_url.as_deref())
    else {
        warn!(mob = mob_name, "error retrieving file url");
        return EssenceRef::Unresolved;
    };

    let path = locator_to_native_path(url);
    if !path.is_file()
        && let Some(basename) = path.file_name()
    {
        let local = container_dir.join(basename);
        if local.is_file() {
            return EssenceRef::Local(local);
        }
    }
    EssenceRef::Local(path)
}

/// `file:///C%3a/Users/user/My%20video.mp4` -> `C:/Users/user/My video.mp4`.
/// Drive-letter paths are recognized on any platform so that a container
/// authored on Windows still gets the basename fallback applied.
pub fn locator_to_native_path(url: &str) -> PathBuf {
    let rest = url
        .strip_prefix("file://")
        .or_else(|| url.strip_prefix("FILE://"))
        .unwrap_or(url);
    // Drop a host component if present (`file://localhost/...`).
    let rest = rest.strip_prefix("localhost").unwrap_or(rest);
    locator_path_from_decoded(&percent_decode(rest))
}

fn locator_path_from_decoded(decoded: &str) -> PathBuf {
    let bytes = decoded.as_bytes();
    // `/C:/...` is a Windows drive path behind a URL root slash.
    if bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':' {
        return PathBuf::from(&decoded[1..]);
    }
    PathBuf::from(decoded)
}

fn percent_decode(s: &str) -> String {
    let mut out = Vec::with_capacity(s.len());
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2]))
        {
            out.push(hi * 16 + lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
