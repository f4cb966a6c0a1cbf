use std::fmt;

/// Container an encoded artifact is wrapped in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerType {
    Webm,
    Mp4,
}

impl ContainerType {
    pub fn mime_type(self) -> &'static str {
        match self {
            ContainerType::Webm => "video/webm",
            ContainerType::Mp4 => "video/mp4",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ContainerType::Webm => "webm",
            ContainerType::Mp4 => "mp4",
        }
    }

    fn from_mime(mime: &str) -> Self {
        if mime.starts_with("video/mp4") {
            ContainerType::Mp4
        } else {
            ContainerType::Webm
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Outcome of codec negotiation for one recording session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NegotiatedCodec {
    /// Priority-list entry that matched, e.g. `"vp9,opus"`.
    pub candidate: String,
    pub mime_type: String,
    pub container: ContainerType,
}

/// Expands a priority-list entry into a MIME type.
///
/// `"vp9,opus"` → `video/webm;codecs=vp9,opus`, `"webm"` → `video/webm`,
/// `"mp4/avc1"` → `video/mp4;codecs=avc1`. Full MIME types pass through.
pub fn candidate_mime(candidate: &str) -> String {
    let candidate = candidate.trim();
    if candidate.starts_with("video/") {
        return candidate.to_string();
    }
    if candidate == "webm" || candidate == "mp4" {
        return format!("video/{candidate}");
    }
    if let Some((container, codecs)) = candidate.split_once('/') {
        return format!("video/{container};codecs={codecs}");
    }
    format!("video/webm;codecs={candidate}")
}

/// Codec names listed in a MIME type's `codecs=` parameter, lowercased.
pub fn mime_codecs(mime: &str) -> Vec<String> {
    mime.split(';')
        .skip(1)
        .filter_map(|param| param.trim().strip_prefix("codecs="))
        .flat_map(|list| list.trim_matches('"').split(','))
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Picks the first entry of `priority` whose MIME type `is_supported` accepts.
pub fn negotiate<S, F>(priority: &[S], is_supported: F) -> Option<NegotiatedCodec>
where
    S: AsRef<str>,
    F: Fn(&str) -> bool,
{
    priority.iter().find_map(|candidate| {
        let mime_type = candidate_mime(candidate.as_ref());
        if !is_supported(&mime_type) {
            return None;
        }
        Some(NegotiatedCodec {
            candidate: candidate.as_ref().to_string(),
            container: ContainerType::from_mime(&mime_type),
            mime_type,
        })
    })
}
