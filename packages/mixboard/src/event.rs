//! Classification of inbound lines.
//!
//! Every trimmed line is one of: noise the device sends unprompted (banner,
//! keepalive, bare acks), an event notification recognised by its leading
//! token, or the response to the oldest outstanding command.

use crate::query::{extract, parse_flag, parse_id};
use crate::state::Status;

const BANNER: &str = "Welcome to MixBoard";

/// Event notifications the driver understands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    PreviewChanged,
    ProgramChanged,
    VideoInputEvent,
    TransitionStatusChanged,
    KeyerStatusChanged,
    KeyerTransitionLinkChanged,
    ServerEvent,
}

/// Prefix table, matched top to bottom.
const EVENT_TABLE: [(&str, EventKind); 7] = [
    ("PREVIEW_CHANGED", EventKind::PreviewChanged),
    ("PROGRAM_CHANGED", EventKind::ProgramChanged),
    ("VIDEOINPUTEVENT", EventKind::VideoInputEvent),
    ("TRANSITION_STATUS_CHANGED", EventKind::TransitionStatusChanged),
    ("KEYER_STATUS_CHANGED", EventKind::KeyerStatusChanged),
    ("KEYER_TRANSITIONLINK_CHANGED", EventKind::KeyerTransitionLinkChanged),
    ("SERVEREVENT", EventKind::ServerEvent),
];

/// A parsed event. Channel fields hold the raw wire token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event<'a> {
    PreviewChanged {
        channel: &'a str,
        input: u32,
    },
    ProgramChanged {
        channel: &'a str,
        input: u32,
    },
    VideoInput {
        input: Option<u32>,
        change: Option<&'a str>,
        value: Option<&'a str>,
    },
    TransitionStatus {
        channel: &'a str,
        status: &'a str,
    },
    /// `status` is `None` for literals other than PLAY_TO_PREVIEW,
    /// PLAY_TO_PROGRAM and STOP
    KeyerStatus {
        channel: &'a str,
        keyer: u32,
        status: Option<Status>,
    },
    KeyerLink {
        channel: &'a str,
        keyer: u32,
        link: bool,
    },
    Server,
}

impl<'a> Event<'a> {
    /// Parse the fields for `kind`. `None` when a required field is missing.
    pub fn parse(kind: EventKind, line: &'a str) -> Option<Event<'a>> {
        let event = match kind {
            EventKind::PreviewChanged => Event::PreviewChanged {
                channel: extract(line, "CHANNEL")?,
                input: parse_id(extract(line, "VIDEOINPUTID")?)?,
            },
            EventKind::ProgramChanged => Event::ProgramChanged {
                channel: extract(line, "CHANNEL")?,
                input: parse_id(extract(line, "VIDEOINPUTID")?)?,
            },
            EventKind::VideoInputEvent => Event::VideoInput {
                input: extract(line, "VIDEOINPUTID").and_then(parse_id),
                change: extract(line, "TYPE").map(str::trim),
                value: extract(line, "VALUE"),
            },
            EventKind::TransitionStatusChanged => Event::TransitionStatus {
                channel: extract(line, "CHANNEL")?,
                status: extract(line, "STATUS")?.trim(),
            },
            EventKind::KeyerStatusChanged => Event::KeyerStatus {
                channel: extract(line, "CHANNEL")?,
                keyer: parse_id(extract(line, "KEYERID")?)?,
                status: Status::from_play_literal(extract(line, "STATUS")?.trim()),
            },
            EventKind::KeyerTransitionLinkChanged => Event::KeyerLink {
                channel: extract(line, "CHANNEL")?,
                keyer: parse_id(extract(line, "KEYERID")?)?,
                link: parse_flag(extract(line, "LINK")?),
            },
            EventKind::ServerEvent => Event::Server,
        };
        Some(event)
    }

    /// The `CHANNEL` token, for events scoped to a channel
    pub fn channel(&self) -> Option<&'a str> {
        match self {
            Event::PreviewChanged { channel, .. }
            | Event::ProgramChanged { channel, .. }
            | Event::TransitionStatus { channel, .. }
            | Event::KeyerStatus { channel, .. }
            | Event::KeyerLink { channel, .. } => Some(*channel),
            Event::VideoInput { .. } | Event::Server => None,
        }
    }
}

/// What an inbound line turned out to be
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Line<'a> {
    /// Banner, keepalive or bare ack
    Noise,
    Event(Event<'a>),
    /// Recognised event prefix with missing or unreadable fields
    Malformed(EventKind),
    /// Anything else: the response to the oldest pending command
    Response(&'a str),
}

/// Classify one trimmed line.
pub fn classify(line: &str) -> Line<'_> {
    if line.contains(BANNER) || line.starts_with("PING") || line.starts_with("Ok") {
        return Line::Noise;
    }

    match EVENT_TABLE
        .iter()
        .find(|(prefix, _)| line.starts_with(prefix))
    {
        Some(&(_, kind)) => match Event::parse(kind, line) {
            Some(event) => Line::Event(event),
            None => Line::Malformed(kind),
        },
        None => Line::Response(line),
    }
}
