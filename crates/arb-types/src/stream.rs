use std::collections::BTreeMap;

/// Position to start a new consumer group at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPosition {
    /// Only entries appended after the group is created (`"$"`).
    New,
    /// Every entry currently on the stream (`"0"`).
    Beginning
}

impl StreamPosition {
    pub fn as_wire(self) -> &'static str {
        match self {
            StreamPosition::New => "$",
            StreamPosition::Beginning => "0"
        }
    }
}

/// One entry read from a stream's consumer group.
///
/// `data` is a flat field map, matching the transport's native
/// representation (a Redis stream entry) so the codec layer in `arb-streams`
/// is the only place that knows how to turn it back into domain types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    /// Server-assigned, time-prefixed, monotonic-per-stream id, e.g.
    /// `"1700000000000-0"`.
    pub message_id:    String,
    pub stream_name:   String,
    pub group_name:    Option<String>,
    pub consumer:      Option<String>,
    pub data:          BTreeMap<String, String>,
    /// How many times this message has been delivered (1 on first read).
    pub delivery_count: u32
}

impl StreamMessage {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }
}
