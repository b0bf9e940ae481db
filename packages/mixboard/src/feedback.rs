//! Read-only queries the button layer evaluates to colour its buttons.

use crate::command::Channel;
use crate::state::{DeviceState, Status};

/// Feedback categories. A `SessionEvent::Feedback` names the category whose
/// underlying state just changed.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Feedback {
    PreviewVideoInput,
    ProgramVideoInput,
    NameVideoInput,
    LinkKeyer,
    ChannelChanged,
    /// Re-evaluate every feedback
    All,
}

impl Feedback {
    pub fn as_str(self) -> &'static str {
        match self {
            Feedback::PreviewVideoInput => "preview_videoinput",
            Feedback::ProgramVideoInput => "program_videoinput",
            Feedback::NameVideoInput => "name_videoinput",
            Feedback::LinkKeyer => "link_keyer",
            Feedback::ChannelChanged => "channel_changed",
            Feedback::All => "all",
        }
    }
}

/// Borrowed view over the state for evaluating feedbacks. Never mutates.
#[derive(Clone, Copy, Debug)]
pub struct FeedbackView<'a> {
    state: &'a DeviceState,
    channel: Channel,
}

impl<'a> FeedbackView<'a> {
    pub fn new(state: &'a DeviceState, channel: Channel) -> Self {
        Self { state, channel }
    }

    pub fn preview_video_input(&self, id: u32) -> bool {
        self.state.video_input(id).has_status(Status::Preview)
    }

    pub fn program_video_input(&self, id: u32) -> bool {
        self.state.video_input(id).has_status(Status::Program)
    }

    pub fn video_input_name(&self, id: u32) -> String {
        let input = self.state.video_input(id);
        if input.name.is_empty() {
            format!("IN {id}")
        } else {
            input.name.clone()
        }
    }

    pub fn keyer_stopped(&self, id: u32) -> bool {
        self.state.keyer(id).status == Status::Stopped
    }

    pub fn keyer_preview(&self, id: u32) -> bool {
        self.state.keyer(id).status == Status::Preview
    }

    pub fn keyer_program(&self, id: u32) -> bool {
        self.state.keyer(id).status == Status::Program
    }

    pub fn keyer_linked(&self, id: u32) -> bool {
        self.state.keyer(id).link_enabled
    }

    pub fn channel_selected(&self, channel: Channel) -> bool {
        self.channel == channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_do_not_create_entries() {
        let state = DeviceState::new();
        let view = FeedbackView::new(&state, Channel::Ch0);
        assert!(!view.program_video_input(3));
        assert!(view.keyer_stopped(2));
        assert_eq!(view.video_input_name(3), "IN 3");
        assert_eq!(state.video_inputs().count(), 0);
    }

    #[test]
    fn reflects_state() {
        let mut state = DeviceState::new();
        state.set_exclusive(1, Status::Preview);
        state.video_input_mut(1).unwrap().name = "CAM1".into();
        if let Some(keyer) = state.keyer_mut(2) {
            keyer.status = Status::Program;
            keyer.link_enabled = true;
        }

        let view = FeedbackView::new(&state, Channel::Ch2);
        assert!(view.preview_video_input(1));
        assert!(!view.program_video_input(1));
        assert_eq!(view.video_input_name(1), "CAM1");
        assert!(view.keyer_program(2));
        assert!(!view.keyer_preview(2));
        assert!(view.keyer_linked(2));
        assert!(view.channel_selected(Channel::Ch2));
        assert!(!view.channel_selected(Channel::Ch0));
    }

    #[test]
    fn empty_name_falls_back() {
        let mut state = DeviceState::new();
        state.video_input_mut(5).unwrap().name.clear();
        let view = FeedbackView::new(&state, Channel::Ch0);
        assert_eq!(view.video_input_name(5), "IN 5");
    }
}
