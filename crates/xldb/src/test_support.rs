//! Shared test-only `RecordSource` used by the `#[cfg(test)]` modules
//! scattered across this crate.

use std::vec;

use crate::loader::RecordSource;

pub(crate) struct InMemorySource {
    tag: String,
    lines: Vec<String>,
}

impl InMemorySource {
    pub(crate) fn new<I, S>(tag: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        InMemorySource {
            tag: tag.into(),
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl RecordSource for InMemorySource {
    type Records = vec::IntoIter<std::io::Result<String>>;

    fn snapshot_tag(&mut self) -> anyhow::Result<String> {
        Ok(self.tag.clone())
    }

    fn records(&mut self) -> anyhow::Result<Self::Records> {
        Ok(self
            .lines
            .clone()
            .into_iter()
            .map(Ok)
            .collect::<Vec<_>>()
            .into_iter())
    }
}
