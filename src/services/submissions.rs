//! Submission correlation: turning a stream of independently-arriving photo
//! events (singles and album members, captioned or not) into discrete
//! (subject, photo) submissions.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::schedule::next_day_name;
use crate::telegram::types::Message;

/// How long resolved album captions are kept before the wholesale reset.
pub const CAPTION_TTL: Duration = Duration::from_secs(60 * 60);

/// Album-caption cache: media-group id → the caption most recently seen on
/// any member of that group. The whole map is dropped at most once per TTL;
/// there is no per-entry expiry.
pub struct CaptionCache {
    inner: Mutex<Inner>,
    ttl: Duration,
}

struct Inner {
    captions: HashMap<String, String>,
    last_reset: Instant,
}

impl CaptionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                captions: HashMap::new(),
                last_reset: Instant::now(),
            }),
            ttl,
        }
    }

    /// Resolve the caption for one event, recording the event's own caption
    /// for its album as a side effect. The lookup, the insert and the TTL
    /// reset all happen under a single lock acquisition, so concurrent album
    /// members cannot interleave between the read and the write.
    pub fn resolve(&self, media_group_id: Option<&str>, own_caption: Option<&str>) -> Option<String> {
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if inner.last_reset.elapsed() >= self.ttl {
            inner.captions.clear();
            inner.last_reset = Instant::now();
        }
        match (media_group_id, own_caption) {
            (Some(group), Some(caption)) => {
                inner.captions.insert(group.to_string(), caption.to_string());
                Some(caption.to_string())
            }
            (None, Some(caption)) => Some(caption.to_string()),
            (Some(group), None) => inner.captions.get(group).cloned(),
            (None, None) => None,
        }
    }
}

/// What to do with one inbound chat event.
#[derive(Debug, PartialEq)]
pub enum Correlation {
    /// Not a photo at all: reply with usage instructions.
    NoPhoto,
    /// A photo with no resolvable caption, neither its own nor a cached one
    /// for its album: ask for a caption and drop the event. Album members
    /// processed before their album's caption land here and stay lost.
    NoCaption,
    /// File the photo under `subject` for `day`.
    Submit {
        subject: String,
        day: &'static str,
        /// Whether progress/result replies go out for this event. Cleared
        /// for album members that did not carry their own caption, so a
        /// multi-photo album produces one acknowledgement, not one per
        /// photo.
        acknowledge: bool,
    },
}

/// Decide how one inbound message participates in a submission. Shared
/// album state lives in `cache`.
pub fn correlate(message: &Message, cache: &CaptionCache) -> Correlation {
    if message.photo.as_deref().map_or(true, |p| p.is_empty()) {
        return Correlation::NoPhoto;
    }

    let own_caption = message.caption.as_deref().filter(|c| !c.is_empty());
    let Some(caption) = cache.resolve(message.media_group_id.as_deref(), own_caption) else {
        return Correlation::NoCaption;
    };

    Correlation::Submit {
        subject: title_case(&caption),
        day: next_day_name(),
        acknowledge: message.media_group_id.is_none() || own_caption.is_some(),
    }
}

/// Normalize a caption into a subject label: collapse whitespace and
/// uppercase the first letter of every word.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
