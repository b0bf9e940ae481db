//! Protocol session core.
//!
//! `Session` owns the state store, the pending-command queue and the current
//! channel selection. It performs no I/O: inbound chunks are pushed in with
//! [`Session::receive`] along with the port they arrived on, and each port
//! keeps its own partial-line buffer. Framed outbound commands collect in an
//! outbox that the owner drains with [`Session::take_outbox`] and writes to
//! the command channel.

use std::borrow::Cow;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::command::{Channel, Command, KeyerTarget, PlayDirection, TakeMode};
use crate::connection::{ConnectionStatus, Port};
use crate::correlator::{Continuation, Correlator};
use crate::error::MixBoardError;
use crate::event::{Event, Line, classify};
use crate::feedback::{Feedback, FeedbackView};
use crate::framing::{LineBuffer, frame_command};
use crate::payload::{self, InputList, MixState};
use crate::state::{DeviceState, KEYER_COUNT, Keyer, Status, VideoInput};

const EVENT_CAPACITY: usize = 256;

/// Notifications for the layer above the driver
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// State behind a feedback category changed
    Feedback(Feedback),
    /// Input list was reloaded; `(id, name)` for every input the device listed
    InputsRefreshed(Vec<(u32, String)>),
    Connection {
        port: Port,
        status: ConnectionStatus,
    },
}

/// User actions. `channel: None` means the current channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    SelectChannel(Channel),
    SelectTakeMode {
        channel: Option<Channel>,
        mode: TakeMode,
    },
    /// Play a stopped keyer, or stop a playing one
    ToggleKeyer {
        channel: Option<Channel>,
        keyer: u32,
        play_to_preview: bool,
    },
    ToggleKeyerLink {
        channel: Option<Channel>,
        keyer: u32,
    },
    /// Take with `mode`, or with the channel's selected take mode
    Take {
        channel: Option<Channel>,
        mode: Option<TakeMode>,
    },
    Resume {
        channel: Option<Channel>,
        direction: PlayDirection,
    },
    SetPreview {
        channel: Option<Channel>,
        input: u32,
    },
    SetProgram {
        channel: Option<Channel>,
        input: u32,
    },
    Raw(String),
}

/// Point-in-time copy of the session, for readers outside the actor
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub channel: Channel,
    pub state: DeviceState,
    pub pending: usize,
    pub command_connected: bool,
}

impl Snapshot {
    pub fn feedback(&self) -> FeedbackView<'_> {
        FeedbackView::new(&self.state, self.channel)
    }

    pub fn max_video_input(&self) -> u32 {
        self.state.max_video_input()
    }
}

pub struct Session {
    channel: Channel,
    state: DeviceState,
    correlator: Correlator,
    command_ready: bool,
    outbox: Vec<String>,
    command_lines: LineBuffer,
    event_lines: LineBuffer,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Channel::default())
    }
}

impl Session {
    pub fn new(channel: Channel) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            channel,
            state: DeviceState::new(),
            correlator: Correlator::new(),
            command_ready: false,
            outbox: Vec::new(),
            command_lines: LineBuffer::new(),
            event_lines: LineBuffer::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn max_video_input(&self) -> u32 {
        self.state.max_video_input()
    }

    pub fn video_input(&self, id: u32) -> Cow<'_, VideoInput> {
        self.state.video_input(id)
    }

    pub fn keyer(&self, id: u32) -> Keyer {
        self.state.keyer(id)
    }

    pub fn feedback(&self) -> FeedbackView<'_> {
        FeedbackView::new(&self.state, self.channel)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            channel: self.channel,
            state: self.state.clone(),
            pending: self.correlator.len(),
            command_connected: self.command_ready,
        }
    }

    /// Number of commands still waiting for a response
    pub fn pending(&self) -> usize {
        self.correlator.len()
    }

    pub fn is_command_ready(&self) -> bool {
        self.command_ready
    }

    /// Mark whether the command channel can take writes
    pub fn set_command_ready(&mut self, ready: bool) {
        self.command_ready = ready;
    }

    /// Queue `command` for the command channel. The continuation, if any,
    /// receives the next unclaimed response line. Empty commands are a no-op.
    pub fn send_command(
        &mut self,
        command: &str,
        continuation: Option<Continuation>,
    ) -> Result<(), MixBoardError> {
        let Some(frame) = frame_command(command) else {
            return Ok(());
        };
        if !self.command_ready {
            return Err(MixBoardError::NotConnected);
        }

        debug!("Queueing command: {}", command);
        self.outbox.push(frame);
        if let Some(continuation) = continuation {
            self.correlator.push(continuation);
        }
        Ok(())
    }

    /// Framed commands waiting to be written, oldest first
    pub fn take_outbox(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outbox)
    }

    /// Reload input names and the input count
    pub fn refresh_input_list(&mut self) {
        let command = Command::GetVideoInputList.to_string();
        if let Err(e) = self.send_command(&command, Some(Continuation::InputList)) {
            debug!("Skipping input list refresh: {}", e);
        }
    }

    /// Reload program/preview and keyer state for the current channel
    pub fn refresh_mix_state(&mut self) {
        let command = Command::GetMixBoardInfo {
            channel: self.channel,
        }
        .to_string();
        if let Err(e) = self.send_command(&command, Some(Continuation::MixState)) {
            debug!("Skipping mix state refresh: {}", e);
        }
    }

    pub fn select_channel(&mut self, channel: Channel) {
        self.channel = channel;
        self.notify(SessionEvent::Feedback(Feedback::ChannelChanged));
        self.refresh_mix_state();
    }

    /// Drop every pending continuation (connection teardown)
    pub fn abandon_pending(&mut self) -> usize {
        let dropped = self.correlator.abandon();
        if dropped > 0 {
            warn!("Abandoned {} pending command(s)", dropped);
        }
        dropped
    }

    /// Drop any half-received record from `port` (its connection is gone)
    pub fn reset_framing(&mut self, port: Port) {
        self.framer(port).clear();
    }

    fn framer(&mut self, port: Port) -> &mut LineBuffer {
        match port {
            Port::Command => &mut self.command_lines,
            Port::Event => &mut self.event_lines,
        }
    }

    pub(crate) fn notify_connection(&self, port: Port, status: ConnectionStatus) {
        self.notify(SessionEvent::Connection { port, status });
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn perform(&mut self, action: Action) -> Result<(), MixBoardError> {
        match action {
            Action::SelectChannel(channel) => {
                self.select_channel(channel);
                Ok(())
            }
            Action::SelectTakeMode { channel, mode } => {
                let channel = channel.unwrap_or(self.channel);
                self.state.set_take_mode(channel, mode);
                Ok(())
            }
            Action::ToggleKeyer {
                channel,
                keyer,
                play_to_preview,
            } => {
                let channel = channel.unwrap_or(self.channel);
                check_keyer(keyer)?;
                let command = if self.state.keyer(keyer).status == Status::Stopped {
                    let target = if play_to_preview {
                        KeyerTarget::Preview
                    } else {
                        KeyerTarget::Program
                    };
                    Command::PlayKeyer {
                        channel,
                        keyer,
                        target,
                    }
                } else {
                    Command::StopKeyer { channel, keyer }
                };
                self.send_command(&command.to_string(), None)
            }
            Action::ToggleKeyerLink { channel, keyer } => {
                let channel = channel.unwrap_or(self.channel);
                check_keyer(keyer)?;
                let link = !self.state.keyer(keyer).link_enabled;
                let command = Command::SetKeyerLink {
                    channel,
                    keyer,
                    link,
                };
                self.send_command(&command.to_string(), None)?;
                self.send_command(&Command::UpdateGui.to_string(), None)
            }
            Action::Take { channel, mode } => {
                let channel = channel.unwrap_or(self.channel);
                let mode = mode.unwrap_or_else(|| self.state.take_mode(channel));
                self.send_command(&Command::Take { channel, mode }.to_string(), None)
            }
            Action::Resume { channel, direction } => {
                let channel = channel.unwrap_or(self.channel);
                let command = Command::ResumeTransition { channel, direction };
                self.send_command(&command.to_string(), None)
            }
            Action::SetPreview { channel, input } => {
                let channel = channel.unwrap_or(self.channel);
                self.send_command(&Command::SetPreview { channel, input }.to_string(), None)
            }
            Action::SetProgram { channel, input } => {
                let channel = channel.unwrap_or(self.channel);
                self.send_command(&Command::SetProgram { channel, input }.to_string(), None)
            }
            Action::Raw(text) => self.send_command(&Command::Raw(text).to_string(), None),
        }
    }

    /// Process one raw chunk read from `port`. A trailing partial record is
    /// held until the rest arrives on the same connection.
    pub fn receive(&mut self, port: Port, data: &[u8]) {
        for line in self.framer(port).push(data) {
            self.handle_line(&line);
        }
    }

    /// Process one trimmed line.
    pub fn handle_line(&mut self, line: &str) {
        match classify(line) {
            Line::Noise => {}
            Line::Event(event) => self.apply_event(event),
            Line::Malformed(kind) => {
                debug!(?kind, line, "Dropping event with unreadable fields");
            }
            Line::Response(response) => match self.correlator.pop() {
                Some(continuation) => self.complete(continuation, response),
                None => error!("Network unhandled recv: {}", response),
            },
        }
    }

    fn apply_event(&mut self, event: Event<'_>) {
        if event
            .channel()
            .is_some_and(|channel| channel != self.channel.as_str())
        {
            return;
        }

        match event {
            Event::PreviewChanged { input, .. } => {
                self.state.set_exclusive(input, Status::Preview);
                self.notify(SessionEvent::Feedback(Feedback::PreviewVideoInput));
            }
            Event::ProgramChanged { input, .. } => {
                self.state.set_exclusive(input, Status::Program);
                self.notify(SessionEvent::Feedback(Feedback::ProgramVideoInput));
            }
            Event::VideoInput { input, change, .. } => {
                if matches!(change, Some("VIDEOINPUT_CHANGED" | "NAME_CHANGED")) {
                    debug!(?input, ?change, "Video input changed, reloading input list");
                    self.refresh_input_list();
                }
            }
            Event::TransitionStatus { status, .. } => {
                if status == "TRANSITION_FINISHED" {
                    self.refresh_mix_state();
                }
            }
            Event::KeyerStatus { keyer, status, .. } => {
                if let Some(status) = status {
                    match self.state.keyer_mut(keyer) {
                        Some(k) => k.status = status,
                        None => warn!(keyer, "Keyer status for unknown keyer"),
                    }
                }
                self.notify(SessionEvent::Feedback(Feedback::All));
            }
            Event::KeyerLink { keyer, link, .. } => {
                match self.state.keyer_mut(keyer) {
                    Some(k) => k.link_enabled = link,
                    None => warn!(keyer, "Keyer link for unknown keyer"),
                }
                self.notify(SessionEvent::Feedback(Feedback::LinkKeyer));
            }
            Event::Server => {}
        }
    }

    fn complete(&mut self, continuation: Continuation, line: &str) {
        match continuation {
            Continuation::Reply(tx) => {
                if tx.send(line.to_string()).is_err() {
                    debug!("Reply receiver dropped before response arrived");
                }
            }
            Continuation::InputList => match payload::decode::<InputList>(line) {
                Ok(list) => self.apply_input_list(list),
                Err(e) => warn!("Discarding input list response: {}", e),
            },
            Continuation::MixState => match payload::decode::<MixState>(line) {
                Ok(mix) => self.apply_mix_state(mix),
                Err(e) => warn!("Discarding mix state response: {}", e),
            },
        }
    }

    fn apply_input_list(&mut self, list: InputList) {
        self.state.set_max_video_input(list.max_supported_inputs);

        let mut refreshed = Vec::with_capacity(list.inputs.len());
        for entry in list.inputs {
            if let Some(input) = self.state.video_input_mut(entry.id) {
                input.name = entry.name.clone();
                refreshed.push((entry.id, entry.name));
            }
        }

        debug!(
            max = self.state.max_video_input(),
            inputs = refreshed.len(),
            "Input list refreshed"
        );
        self.notify(SessionEvent::InputsRefreshed(refreshed));
        self.notify(SessionEvent::Feedback(Feedback::NameVideoInput));
    }

    fn apply_mix_state(&mut self, mix: MixState) {
        self.state.apply_mix_state(mix.preview, mix.program);

        for entry in mix.keyers {
            let status = Status::from_play_literal(&entry.status).unwrap_or(Status::Stopped);
            match self.state.keyer_mut(entry.id) {
                Some(keyer) => {
                    keyer.status = status;
                    keyer.link_enabled = entry.link;
                }
                None => warn!(keyer = entry.id, "Mix state lists unknown keyer"),
            }
        }

        self.notify(SessionEvent::Feedback(Feedback::All));
    }
}

fn check_keyer(keyer: u32) -> Result<(), MixBoardError> {
    if (keyer as usize) < KEYER_COUNT {
        Ok(())
    } else {
        Err(MixBoardError::InvalidKeyer(keyer))
    }
}
