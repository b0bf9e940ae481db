//! Local replica of the device's tally state.
//!
//! Video inputs carry a bitmask (an input can sit on program and preview at
//! once); keyers carry a single exclusive status. Both collections grow on
//! first mutable access and are never shrunk.

use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::warn;

use crate::command::{Channel, TakeMode};

/// Number of keyers on a channel (`BKGD` plus `KEY1`..`KEY4`)
pub const KEYER_COUNT: usize = 5;

/// Button labels for keyers, indexed by keyer id
pub const KEYER_LABELS: [&str; KEYER_COUNT] = ["BKGD", "KEY1", "KEY2", "KEY3", "KEY4"];

/// Highest input id the store will track, whatever the device reports
pub const INPUT_ID_LIMIT: u32 = 1024;

/// Tally status. For video inputs this doubles as a bit in the status mask.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub enum Status {
    #[default]
    Stopped,
    Program,
    Preview,
}

impl Status {
    pub fn bit(self) -> u8 {
        match self {
            Status::Stopped => 0,
            Status::Program => 1,
            Status::Preview => 2,
        }
    }

    /// Map the device's `PLAY_TO_*` literals. Anything else is `None`.
    pub fn from_play_literal(literal: &str) -> Option<Status> {
        match literal {
            "PLAY_TO_PREVIEW" => Some(Status::Preview),
            "PLAY_TO_PROGRAM" => Some(Status::Program),
            "STOP" => Some(Status::Stopped),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoInput {
    pub id: u32,
    pub name: String,
    status: u8,
}

impl VideoInput {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            name: format!("IN {id}"),
            status: Status::Stopped.bit(),
        }
    }

    pub fn status_bits(&self) -> u8 {
        self.status
    }

    /// `Stopped` matches an empty mask; other statuses test their bit.
    pub fn has_status(&self, status: Status) -> bool {
        match status {
            Status::Stopped => self.status == 0,
            other => self.status & other.bit() == other.bit(),
        }
    }

    /// `Stopped` clears every bit; other statuses are OR-ed in.
    pub fn set_status(&mut self, status: Status) {
        match status {
            Status::Stopped => self.status = 0,
            other => self.status |= other.bit(),
        }
    }

    pub fn disable_status(&mut self, status: Status) {
        self.status &= !status.bit();
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Keyer {
    pub status: Status,
    pub link_enabled: bool,
}

/// Everything the driver knows about the mixer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceState {
    inputs: BTreeMap<u32, VideoInput>,
    keyers: [Option<Keyer>; KEYER_COUNT],
    max_video_input: u32,
    take_modes: [TakeMode; Channel::ALL.len()],
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest input id reported by the device
    pub fn max_video_input(&self) -> u32 {
        self.max_video_input
    }

    pub fn set_max_video_input(&mut self, max: u32) {
        if max > INPUT_ID_LIMIT {
            warn!(
                reported = max,
                limit = INPUT_ID_LIMIT,
                "device reports more inputs than tracked, clamping"
            );
        }
        self.max_video_input = max.min(INPUT_ID_LIMIT);
    }

    /// Read an input without creating it. Unknown ids get the default name.
    pub fn video_input(&self, id: u32) -> Cow<'_, VideoInput> {
        match self.inputs.get(&id) {
            Some(input) => Cow::Borrowed(input),
            None => Cow::Owned(VideoInput::new(id)),
        }
    }

    /// Get or create an input. Returns `None` past `INPUT_ID_LIMIT`.
    pub fn video_input_mut(&mut self, id: u32) -> Option<&mut VideoInput> {
        if id > INPUT_ID_LIMIT {
            warn!(id, "ignoring video input id beyond tracking limit");
            return None;
        }
        Some(self.inputs.entry(id).or_insert_with(|| VideoInput::new(id)))
    }

    /// Inputs referenced so far, in id order
    pub fn video_inputs(&self) -> impl Iterator<Item = &VideoInput> {
        self.inputs.values()
    }

    /// Set `status` on `id` and clear that bit on every other input, both
    /// the `0..=max_video_input` range and anything referenced beyond it.
    pub fn set_exclusive(&mut self, id: u32, status: Status) {
        if self.video_input_mut(id).is_none() {
            return;
        }
        self.ensure_range();
        for input in self.inputs.values_mut() {
            if input.id == id {
                input.set_status(status);
            } else {
                input.disable_status(status);
            }
        }
    }

    /// Reconcile with a mix-state snapshot: `preview` holds PREVIEW and
    /// `program` holds PROGRAM. When both name the same input, PROGRAM
    /// replaces PREVIEW.
    pub fn apply_mix_state(&mut self, preview: u32, program: u32) {
        self.ensure_range();
        for input in self.inputs.values_mut() {
            input.set_status(Status::Stopped);
        }
        if let Some(input) = self.video_input_mut(preview) {
            input.set_status(Status::Preview);
        }
        if let Some(input) = self.video_input_mut(program) {
            input.set_status(Status::Stopped);
            input.set_status(Status::Program);
        }
    }

    fn ensure_range(&mut self) {
        for id in 0..=self.max_video_input {
            self.inputs.entry(id).or_insert_with(|| VideoInput::new(id));
        }
    }

    /// Read a keyer. Unset or out-of-range ids read as stopped and unlinked.
    pub fn keyer(&self, id: u32) -> Keyer {
        self.keyers
            .get(id as usize)
            .copied()
            .flatten()
            .unwrap_or_default()
    }

    /// Get or create a keyer. Returns `None` for ids outside `0..KEYER_COUNT`.
    pub fn keyer_mut(&mut self, id: u32) -> Option<&mut Keyer> {
        self.keyers
            .get_mut(id as usize)
            .map(|slot| slot.get_or_insert_with(Keyer::default))
    }

    pub fn take_mode(&self, channel: Channel) -> TakeMode {
        self.take_modes[channel.index()]
    }

    pub fn set_take_mode(&mut self, channel: Channel, mode: TakeMode) {
        self.take_modes[channel.index()] = mode;
    }
}
