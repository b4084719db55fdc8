use std::fmt;

use crate::hook::AccessHookKind;

/// The coarse object category a subscription event or an info-query hook is about.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Facility {
    Sink,
    Source,
    SinkInput,
    SourceOutput,
    Module,
    Client,
    SampleCache,
    Server,
    Card,
}

impl Facility {
    /// The `get_*_info` hook that re-learns about an object of this facility,
    /// per the synthesis table in the event visibility filter.
    pub fn info_hook(self) -> AccessHookKind {
        match self {
            Facility::Sink => AccessHookKind::GetSinkInfo,
            Facility::Source => AccessHookKind::GetSourceInfo,
            Facility::SinkInput => AccessHookKind::GetSinkInputInfo,
            Facility::SourceOutput => AccessHookKind::GetSourceOutputInfo,
            Facility::Module => AccessHookKind::GetModuleInfo,
            Facility::Client => AccessHookKind::GetClientInfo,
            Facility::SampleCache => AccessHookKind::GetSampleInfo,
            Facility::Server => AccessHookKind::GetServerInfo,
            Facility::Card => AccessHookKind::GetCardInfo,
        }
    }

    #[inline]
    fn tag(self) -> u64 {
        match self {
            Facility::Sink => 0,
            Facility::Source => 1,
            Facility::SinkInput => 2,
            Facility::SourceOutput => 3,
            Facility::Module => 4,
            Facility::Client => 5,
            Facility::SampleCache => 6,
            Facility::Server => 7,
            Facility::Card => 8,
        }
    }

    #[inline]
    fn from_tag(tag: u64) -> Option<Self> {
        Some(match tag {
            0 => Facility::Sink,
            1 => Facility::Source,
            2 => Facility::SinkInput,
            3 => Facility::SourceOutput,
            4 => Facility::Module,
            5 => Facility::Client,
            6 => Facility::SampleCache,
            7 => Facility::Server,
            8 => Facility::Card,
            _ => return None,
        })
    }
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The kind of change a subscription event reports for an object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EventType {
    New,
    Change,
    Remove,
}

/// `(Facility, object_index)` packed into a single `u64` so the seen set can
/// be a `nohash::IntSet<ObjectKey>` instead of a generic hash set walking a
/// tuple — the same trick this codebase uses for other small dense keys
/// (see the status-tray module's `SniId`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ObjectKey(u64);

impl ObjectKey {
    #[inline]
    pub fn new(facility: Facility, object_index: u32) -> Self {
        Self((facility.tag() << 32) | object_index as u64)
    }

    #[inline]
    pub fn facility(self) -> Facility {
        Facility::from_tag(self.0 >> 32).expect("ObjectKey always packed from a valid Facility")
    }

    #[inline]
    pub fn object_index(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }
}

// `#[derive(Hash)]` above hashes the single `u64` field via one `write_u64`
// call, which is exactly what `nohash`'s `NoHashHasher` requires.
impl nohash::IsEnabled for ObjectKey {}

/// Decode a raw subscription mask into its facility/event-type pair. Returns
/// `None` for a mask this build doesn't recognize, which the visibility
/// filter treats as "any other event type ⇒ STOP".
pub fn decode_event_mask(mask: u32) -> Option<(Facility, EventType)> {
    let facility = match mask & 0x0F {
        0 => Facility::Sink,
        1 => Facility::Source,
        2 => Facility::SinkInput,
        3 => Facility::SourceOutput,
        4 => Facility::Module,
        5 => Facility::Client,
        6 => Facility::SampleCache,
        7 => Facility::Server,
        8 => Facility::Card,
        _ => return None,
    };

    let event = match (mask >> 4) & 0x0F {
        0 => EventType::New,
        1 => EventType::Change,
        2 => EventType::Remove,
        _ => return None,
    };

    Some((facility, event))
}
