//! On-disk parameter cache.
//!
//! Tab-separated text, one line per programme:
//! `programme-id  bitrate  samplerate  want-ac3  station-name  stream-type`.
//! The cache exists so a session can emit its response header before the
//! first PAT/PMT/SDT round trip has completed; whatever the stream itself
//! announces later always wins.

use std::fs;
use std::io;
use std::path::Path;

use mpa::AudioKind;
use tracing::warn;

/// Stream parameters remembered from an earlier session.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedParams {
    /// kbit/s
    pub bitrate: u32,
    /// Hz
    pub samplerate: u32,
    pub station_name: String,
    pub audio_kind: Option<AudioKind>,
}

fn kind_to_str(kind: Option<AudioKind>) -> &'static str {
    match kind {
        Some(k) => k.mime(),
        None => "-",
    }
}

fn kind_from_str(s: &str) -> Option<AudioKind> {
    match s {
        "audio/mpeg" => Some(AudioKind::Mpeg),
        "audio/aac" => Some(AudioKind::AacAdts),
        "audio/aacp" => Some(AudioKind::HeAacLatm),
        "audio/ac3" => Some(AudioKind::Ac3),
        _ => None,
    }
}

/// Look up cached parameters for a programme. Lines whose AC-3 preference
/// does not match are skipped; a cache written for the other preference
/// describes a different elementary stream.
pub fn fetch(path: &Path, programme: &str, want_ac3: bool) -> Option<CachedParams> {
    let content = fs::read_to_string(path).ok()?;
    for line in content.lines() {
        if line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 6 || fields[0] != programme {
            continue;
        }
        let ac3 = fields[3] == "1";
        if ac3 != want_ac3 {
            continue;
        }
        let (Ok(bitrate), Ok(samplerate)) = (fields[1].parse(), fields[2].parse()) else {
            warn!("ignoring malformed cache line for programme {}", programme);
            continue;
        };
        return Some(CachedParams {
            bitrate,
            samplerate,
            station_name: fields[4].to_string(),
            audio_kind: kind_from_str(fields[5]),
        });
    }
    None
}

/// Store parameters for a programme, replacing any previous line with the
/// same programme id and AC-3 preference and keeping everything else.
pub fn store(
    path: &Path,
    programme: &str,
    want_ac3: bool,
    params: &CachedParams,
) -> io::Result<()> {
    let mut lines = vec![
        "# programmno\tbitrate\tstreamrate\tac-3?\tstation_name\tstream_type".to_string(),
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            programme,
            params.bitrate,
            params.samplerate,
            want_ac3 as u8,
            params.station_name,
            kind_to_str(params.audio_kind)
        ),
    ];
    if let Ok(existing) = fs::read_to_string(path) {
        for line in existing.lines() {
            if line.starts_with('#') || line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let same = fields.len() >= 4
                && fields[0] == programme
                && (fields[3] == "1") == want_ac3;
            if !same {
                lines.push(line.to_string());
            }
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, lines.join("\n") + "\n")?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_path(name: &str) -> std::path::PathBuf {
        env::temp_dir().join(format!("tscast-cache-test-{}-{}", std::process::id(), name))
    }

    fn params(name: &str) -> CachedParams {
        CachedParams {
            bitrate: 192,
            samplerate: 48000,
            station_name: name.to_string(),
            audio_kind: Some(AudioKind::Mpeg),
        }
    }

    #[test]
    fn test_store_then_fetch() {
        let path = temp_path("roundtrip");
        store(&path, "radio1", false, &params("TestRadio")).unwrap();
        let got = fetch(&path, "radio1", false).unwrap();
        assert_eq!(got, params("TestRadio"));
        // Wrong AC-3 preference misses.
        assert!(fetch(&path, "radio1", true).is_none());
        // Unknown programme misses.
        assert!(fetch(&path, "radio2", false).is_none());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_store_replaces_matching_line_keeps_others() {
        let path = temp_path("replace");
        store(&path, "radio1", false, &params("Old Name")).unwrap();
        store(&path, "radio2", false, &params("Other")).unwrap();
        store(&path, "radio1", false, &params("New Name")).unwrap();
        assert_eq!(
            fetch(&path, "radio1", false).unwrap().station_name,
            "New Name"
        );
        assert_eq!(fetch(&path, "radio2", false).unwrap().station_name, "Other");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_no_hit() {
        assert!(fetch(Path::new("/nonexistent/tscast.cache"), "x", false).is_none());
    }
}
