//! Per-topic reassembly of fragmented broker payloads.
//!
//! A broker client may deliver a large publication as several `Data` events
//! that share a topic and carry `(offset, total)`. Fragments of one logical
//! message arrive in order; a fragment that does not continue exactly where
//! the partial buffer ends drops that buffer.

use std::borrow::Cow;
use std::collections::HashMap;

use log::warn;

/// Largest message the reassembler buffers. A fragment announcing more is
/// dropped.
pub const MAX_MESSAGE_LEN: usize = 64 * 1024;

#[derive(Debug, Default)]
pub struct Reassembler {
    partial: HashMap<String, Vec<u8>>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one fragment. Returns the complete payload once `offset + len`
    /// reaches `total`, `None` while more fragments are expected or when the
    /// fragment was discarded.
    pub fn push<'a>(
        &mut self,
        topic: &str,
        data: &'a [u8],
        offset: usize,
        total: usize,
    ) -> Option<Cow<'a, [u8]>> {
        if offset == 0 && data.len() >= total {
            if self.partial.remove(topic).is_some() {
                warn!(target: "mqtt", "{topic}: unfinished message replaced");
            }
            return Some(Cow::Borrowed(data));
        }

        if total > MAX_MESSAGE_LEN {
            warn!(
                target: "mqtt",
                "{topic}: fragment of a {total} byte message exceeds {MAX_MESSAGE_LEN}, dropped"
            );
            self.partial.remove(topic);
            return None;
        }

        if offset == 0 {
            if self.partial.remove(topic).is_some() {
                warn!(target: "mqtt", "{topic}: unfinished message replaced");
            }
            self.partial.insert(topic.to_owned(), data.to_vec());
            return None;
        }

        let continues = self
            .partial
            .get(topic)
            .is_some_and(|buffer| buffer.len() == offset);
        if !continues {
            warn!(
                target: "mqtt",
                "{topic}: fragment at {offset}/{total} does not continue a message, dropped"
            );
            self.partial.remove(topic);
            return None;
        }

        let buffer = self.partial.get_mut(topic)?;
        buffer.extend_from_slice(data);
        if buffer.len() < total {
            return None;
        }
        self.partial.remove(topic).map(Cow::Owned)
    }

    /// Number of topics with an unfinished message.
    pub fn pending(&self) -> usize {
        self.partial.len()
    }

    pub fn clear(&mut self) {
        self.partial.clear();
    }
}
