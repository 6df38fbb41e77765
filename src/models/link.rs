/// One extracted subscription link, tagged with the feed it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLink {
    pub uri: String,
    /// Position of the feed in the configured source list.
    pub source_index: usize,
    /// Links from the first configured feed are always ordered ahead of all
    /// others in generated artifacts.
    pub primary: bool,
}

impl RawLink {
    pub fn new(uri: impl Into<String>, source_index: usize) -> Self {
        RawLink {
            uri: uri.into(),
            source_index,
            primary: source_index == 0,
        }
    }
}
