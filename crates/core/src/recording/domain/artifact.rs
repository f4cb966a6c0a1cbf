use super::codec::{ContainerType, NegotiatedCodec};

/// The assembled output of one recording session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    data: Vec<u8>,
    mime_type: String,
    container: ContainerType,
}

impl Artifact {
    /// Concatenates `segments` in order. `None` when nothing was captured.
    pub fn assemble(segments: Vec<Vec<u8>>, codec: &NegotiatedCodec) -> Option<Self> {
        if segments.is_empty() {
            return None;
        }
        Some(Self {
            data: segments.concat(),
            mime_type: codec.mime_type.clone(),
            container: codec.container,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn container(&self) -> ContainerType {
        self.container
    }

    /// `<prefix>-<timestamp_ms>.<extension>`
    pub fn filename(&self, prefix: &str, timestamp_ms: u128) -> String {
        format!("{prefix}-{timestamp_ms}.{}", self.container.extension())
    }
}
