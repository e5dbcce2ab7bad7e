//! Object path decomposition and stage classification.

use std::sync::LazyLock;

use regex::Regex;

use crate::marker::{Marker, SEPARATOR, VIDEO_EXTENSIONS, tokens};
use crate::stage::PipelineStage;

static INDEXED_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?P<base>.+)(?P<kind>{}|{})(?P<index>[0-9]{{1,9}})$",
        regex::escape(tokens::SPLIT_PREFIX),
        regex::escape(tokens::SEGMENT_PREFIX),
    ))
    .unwrap()
});

/// Longest extension still treated as one.
const MAX_EXTENSION_LEN: usize = 5;

/// An object path split into `{base_identifier}{marker}.{extension}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPath {
    path: String,
    base_identifier: String,
    marker: Option<Marker>,
    extension: Option<String>,
    stage: PipelineStage,
}

impl ObjectPath {
    /// Decompose and classify `path`. Never fails.
    pub fn parse(path: impl Into<String>) -> Self {
        let path = path.into();
        let (base_identifier, marker, extension, stage) = decompose(&path);
        Self {
            path,
            base_identifier,
            marker,
            extension,
            stage,
        }
    }

    /// The full object path.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// The job key shared by every object of one processing job.
    ///
    /// For unrecognized paths this is the path without its extension.
    pub fn base_identifier(&self) -> &str {
        &self.base_identifier
    }

    pub fn marker(&self) -> Option<Marker> {
        self.marker
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }
}

impl std::fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

/// Classify an object path into exactly one pipeline stage.
pub fn classify(path: &str) -> PipelineStage {
    decompose(path).3
}

fn decompose(path: &str) -> (String, Option<Marker>, Option<String>, PipelineStage) {
    let (dir, file) = match path.rfind('/') {
        Some(pos) => path.split_at(pos + 1),
        None => ("", path),
    };

    if file.is_empty() || file.starts_with('.') {
        return (path.to_string(), None, None, PipelineStage::Unrecognized);
    }

    let (stem, extension) = split_extension(file);
    let base_of = |rest: &str| format!("{dir}{rest}");

    if let Some((rest, marker)) = match_marker(stem) {
        return (
            base_of(rest),
            Some(marker),
            extension.map(str::to_string),
            marker.stage(),
        );
    }

    let stage = match extension {
        _ if stem.starts_with(SEPARATOR) => PipelineStage::Unrecognized,
        None => PipelineStage::ExtractorInitial,
        Some(ext) if is_video_extension(ext) => PipelineStage::ExtractorInitial,
        Some(_) => PipelineStage::Unrecognized,
    };
    (base_of(stem), None, extension.map(str::to_string), stage)
}

fn split_extension(file: &str) -> (&str, Option<&str>) {
    match file.rfind('.') {
        Some(pos) if pos > 0 => {
            let ext = &file[pos + 1..];
            if !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
            {
                (&file[..pos], Some(ext))
            } else {
                (file, None)
            }
        }
        _ => (file, None),
    }
}

fn match_marker(stem: &str) -> Option<(&str, Marker)> {
    for marker in Marker::FIXED {
        let Some(token) = marker.fixed_token() else {
            continue;
        };
        if let Some(rest) = stem.strip_suffix(token)
            && !rest.is_empty()
        {
            return Some((rest, *marker));
        }
    }

    let caps = INDEXED_MARKER_REGEX.captures(stem)?;
    let base = caps.name("base")?;
    let index: u32 = caps.name("index")?.as_str().parse().ok()?;
    let marker = match caps.name("kind")?.as_str() {
        tokens::SPLIT_PREFIX => Marker::Split(index),
        _ => Marker::Segment(index),
    };
    Some((&stem[..base.end()], marker))
}

fn is_video_extension(ext: &str) -> bool {
    VIDEO_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn all_marker_tokens() -> Vec<String> {
        let mut tokens: Vec<String> = Marker::FIXED.iter().map(|m| m.to_string()).collect();
        tokens.push(Marker::Split(3).to_string());
        tokens.push(Marker::Segment(3).to_string());
        tokens
    }

    #[rstest]
    #[case("job123", PipelineStage::ExtractorInitial)]
    #[case("job123.mp4", PipelineStage::ExtractorInitial)]
    #[case("uploads/job123.MOV", PipelineStage::ExtractorInitial)]
    #[case("job123__audio_req", PipelineStage::ExtractorAudio)]
    #[case("job123__video_req", PipelineStage::ExtractorVideo)]
    #[case("job123__audio_done", PipelineStage::ExtractorFinaliseAudio)]
    #[case("job123__video_done", PipelineStage::ExtractorFinaliseVideo)]
    #[case("job123__finalise", PipelineStage::ExtractorFinalise)]
    #[case("job123__split_0", PipelineStage::ExtractorSplitSegment)]
    #[case("job123__split_12", PipelineStage::ExtractorSplitSegment)]
    #[case("job123__render_spec.json", PipelineStage::CombinerInitial)]
    #[case("job123__render_req", PipelineStage::CombinerRender)]
    #[case("job123__render_done", PipelineStage::CombinerFinalise)]
    #[case("job123__audio.wav", PipelineStage::Unrecognized)]
    #[case("job123__video.mp4", PipelineStage::Unrecognized)]
    #[case("job123__extracted.json", PipelineStage::Unrecognized)]
    #[case("job123__segment_3.mp4", PipelineStage::Unrecognized)]
    #[case("job123__render.mp4", PipelineStage::Unrecognized)]
    #[case("job123__rendered.mp4", PipelineStage::Unrecognized)]
    #[case("random/unrelated/file.txt", PipelineStage::Unrecognized)]
    #[case("", PipelineStage::Unrecognized)]
    #[case("folder/", PipelineStage::Unrecognized)]
    #[case(".hidden", PipelineStage::Unrecognized)]
    #[case("__audio_req", PipelineStage::Unrecognized)]
    #[case("dir/__finalise", PipelineStage::Unrecognized)]
    #[case("__split_3", PipelineStage::Unrecognized)]
    #[case("__notes.mp4", PipelineStage::Unrecognized)]
    fn test_classify(#[case] path: &str, #[case] expected: PipelineStage) {
        assert_eq!(classify(path), expected);
    }

    #[rstest]
    #[case("my__audio_req_clip.mp4")]
    #[case("a__video_done_b")]
    #[case("x__finalise__y.mov")]
    #[case("x__split_3b")]
    #[case("render_spec.mp4")]
    #[case("audio_done")]
    fn test_marker_inside_base_identifier_is_not_matched(#[case] path: &str) {
        assert_eq!(classify(path), PipelineStage::ExtractorInitial);
    }

    #[test]
    fn test_base_identifier_keeps_directory() {
        let parsed = ObjectPath::parse("jobs/2024/job123__video_done");
        assert_eq!(parsed.base_identifier(), "jobs/2024/job123");
        assert_eq!(parsed.marker(), Some(Marker::VideoDone));
        assert_eq!(parsed.extension(), None);
    }

    #[test]
    fn test_base_identifier_drops_upload_extension() {
        let parsed = ObjectPath::parse("job123.mp4");
        assert_eq!(parsed.base_identifier(), "job123");
        assert_eq!(parsed.extension(), Some("mp4"));
        assert_eq!(parsed.marker(), None);
    }

    #[test]
    fn test_dotted_base_identifier() {
        let parsed = ObjectPath::parse("v1.2.final__audio_req");
        assert_eq!(parsed.stage(), PipelineStage::ExtractorAudio);
        assert_eq!(parsed.base_identifier(), "v1.2.final");
    }

    #[test]
    fn test_long_extension_is_part_of_stem() {
        // "longextension" exceeds the extension limit, so the name has none
        assert_eq!(classify("job.longextension"), PipelineStage::ExtractorInitial);
        assert_eq!(classify("job.v2"), PipelineStage::Unrecognized);
    }

    #[test]
    fn test_split_index_is_parsed() {
        let parsed = ObjectPath::parse("job__split_42");
        assert_eq!(parsed.marker(), Some(Marker::Split(42)));
        assert_eq!(parsed.base_identifier(), "job");
    }

    #[test]
    fn test_split_index_overflow_falls_through() {
        // ten digits do not fit the indexed marker, so the name is a bare upload
        assert_eq!(classify("job__split_9999999999"), PipelineStage::ExtractorInitial);
    }

    #[test]
    fn test_written_paths_classify_to_their_marker_stage() {
        for marker in Marker::FIXED.iter().copied().chain([Marker::Split(2), Marker::Segment(2)]) {
            let parsed = ObjectPath::parse(marker.path_for("jobs/abc"));
            assert_eq!(parsed.stage(), marker.stage(), "{marker}");
            assert_eq!(parsed.marker(), Some(marker));
            assert_eq!(parsed.base_identifier(), "jobs/abc");
        }
    }

    proptest! {
        #[test]
        fn prop_classify_is_total_and_deterministic(path in ".*") {
            let first = classify(&path);
            prop_assert_eq!(first, classify(&path));
            prop_assert_eq!(first, ObjectPath::parse(path.clone()).stage());
        }

        #[test]
        fn prop_marker_text_inside_name_never_triggers_a_later_stage(
            dir in "([a-z0-9._-]{1,8}/){0,3}",
            head in "[a-zA-Z0-9.-][a-zA-Z0-9._-]{0,11}",
            token in prop::sample::select(all_marker_tokens()),
            tail in "-[a-zA-Z0-9.-]{0,11}",
            ext in prop::option::of(prop::sample::select(VIDEO_EXTENSIONS)),
        ) {
            // no token contains '-', so the token can never end the stem
            let stem = format!("{head}{token}{tail}");
            let path = match ext {
                Some(ext) => format!("{dir}{stem}.{ext}"),
                None => format!("{dir}{stem}"),
            };

            let stage = classify(&path);
            prop_assert!(
                matches!(stage, PipelineStage::ExtractorInitial | PipelineStage::Unrecognized),
                "{} -> {}", path, stage
            );
        }

        #[test]
        fn prop_plain_video_upload_is_initial(
            dir in "([a-z0-9._-]{1,8}/){0,3}",
            stem in "[a-zA-Z0-9-][a-zA-Z0-9._-]{0,23}",
            ext in prop::sample::select(VIDEO_EXTENSIONS),
        ) {
            prop_assume!(match_marker(&stem).is_none());

            let path = format!("{dir}{stem}.{ext}");
            prop_assert_eq!(classify(&path), PipelineStage::ExtractorInitial, "{}", path);
        }
    }
}
