//! Outbound commands and the wire tokens they carry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MixBoardError;

/// An output bus on the device.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    #[default]
    #[serde(rename = "CH_0")]
    Ch0,
    #[serde(rename = "CH_1")]
    Ch1,
    #[serde(rename = "CH_2")]
    Ch2,
    #[serde(rename = "CH_3")]
    Ch3,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Ch0, Channel::Ch1, Channel::Ch2, Channel::Ch3];

    /// Wire token, e.g. `CH_0`
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Ch0 => "CH_0",
            Channel::Ch1 => "CH_1",
            Channel::Ch2 => "CH_2",
            Channel::Ch3 => "CH_3",
        }
    }

    /// Button label, e.g. `CH-0`
    pub fn label(self) -> &'static str {
        match self {
            Channel::Ch0 => "CH-0",
            Channel::Ch1 => "CH-1",
            Channel::Ch2 => "CH-2",
            Channel::Ch3 => "CH-3",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = MixBoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|ch| s.eq_ignore_ascii_case(ch.as_str()) || s.eq_ignore_ascii_case(ch.label()))
            .ok_or_else(|| MixBoardError::UnknownChannel(s.to_string()))
    }
}

/// Transition used by a take.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TakeMode {
    #[default]
    Cut,
    Fade,
    Tr1,
    Tr2,
    Tr3,
    Tr4,
}

impl TakeMode {
    pub const ALL: [TakeMode; 6] = [
        TakeMode::Cut,
        TakeMode::Fade,
        TakeMode::Tr1,
        TakeMode::Tr2,
        TakeMode::Tr3,
        TakeMode::Tr4,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TakeMode::Cut => "CUT",
            TakeMode::Fade => "FADE",
            TakeMode::Tr1 => "TR1",
            TakeMode::Tr2 => "TR2",
            TakeMode::Tr3 => "TR3",
            TakeMode::Tr4 => "TR4",
        }
    }
}

impl fmt::Display for TakeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TakeMode {
    type Err = MixBoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TakeMode::ALL
            .into_iter()
            .find(|mode| s.eq_ignore_ascii_case(mode.as_str()))
            .ok_or_else(|| MixBoardError::UnknownTakeMode(s.to_string()))
    }
}

/// Direction for resuming a paused transition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlayDirection {
    #[default]
    Forward,
    Backward,
}

impl PlayDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayDirection::Forward => "FORWARD",
            PlayDirection::Backward => "BACKWARD",
        }
    }
}

impl FromStr for PlayDirection {
    type Err = MixBoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("FORWARD") {
            Ok(PlayDirection::Forward)
        } else if s.eq_ignore_ascii_case("BACKWARD") {
            Ok(PlayDirection::Backward)
        } else {
            Err(MixBoardError::UnknownDirection(s.to_string()))
        }
    }
}

/// Where `MBC_PLAYKEYER` sends the keyer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyerTarget {
    Preview,
    Program,
}

impl KeyerTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyerTarget::Preview => "PREVIEW",
            KeyerTarget::Program => "PROGRAM",
        }
    }
}

/// A command for the command channel.
///
/// `Display` renders the wire text without the CRLF terminator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    GetVideoInputList,
    GetMixBoardInfo {
        channel: Channel,
    },
    PlayKeyer {
        channel: Channel,
        keyer: u32,
        target: KeyerTarget,
    },
    StopKeyer {
        channel: Channel,
        keyer: u32,
    },
    SetKeyerLink {
        channel: Channel,
        keyer: u32,
        link: bool,
    },
    UpdateGui,
    Take {
        channel: Channel,
        mode: TakeMode,
    },
    ResumeTransition {
        channel: Channel,
        direction: PlayDirection,
    },
    SetPreview {
        channel: Channel,
        input: u32,
    },
    SetProgram {
        channel: Channel,
        input: u32,
    },
    /// Arbitrary command text, sent verbatim
    Raw(String),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::GetVideoInputList => f.write_str("MBC_GETVIDEOINPUTLIST"),
            Command::GetMixBoardInfo { channel } => write!(f, "MBC_GETMIXBOARDINFO {channel}"),
            Command::PlayKeyer {
                channel,
                keyer,
                target,
            } => write!(
                f,
                "MBC_PLAYKEYER CHANNEL=\"{channel}\",KEYERID=\"{keyer}\",TARGET=\"{}\"",
                target.as_str()
            ),
            Command::StopKeyer { channel, keyer } => {
                write!(f, "MBC_STOPKEYER CHANNEL=\"{channel}\",KEYERID=\"{keyer}\"")
            }
            Command::SetKeyerLink {
                channel,
                keyer,
                link,
            } => write!(
                f,
                "MBC_SETLINKKEYERTOTRANSITION CHANNEL=\"{channel}\",KEYERID=\"{keyer}\",LINK={link}"
            ),
            Command::UpdateGui => f.write_str("UPDATEGUI"),
            Command::Take { channel, mode } => {
                write!(f, "MBC_TAKE CHANNEL=\"{channel}\",TAKE_MODE=\"{mode}\"")
            }
            Command::ResumeTransition { channel, direction } => write!(
                f,
                "MBC_RESUMETRANSITION CHANNEL=\"{channel}\",PLAY_DIRECTION=\"{}\"",
                direction.as_str()
            ),
            Command::SetPreview { channel, input } => write!(
                f,
                "MBC_SETPREVIEWVIDEOINPUTID CHANNEL=\"{channel}\",VIDEOINPUTID=\"{input}\""
            ),
            Command::SetProgram { channel, input } => write!(
                f,
                "MBC_SETPROGRAMVIDEOINPUTID CHANNEL=\"{channel}\",VIDEOINPUTID=\"{input}\""
            ),
            Command::Raw(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyer_commands() {
        let play = Command::PlayKeyer {
            channel: Channel::Ch0,
            keyer: 1,
            target: KeyerTarget::Preview,
        };
        assert_eq!(
            play.to_string(),
            r#"MBC_PLAYKEYER CHANNEL="CH_0",KEYERID="1",TARGET="PREVIEW""#
        );

        let stop = Command::StopKeyer {
            channel: Channel::Ch2,
            keyer: 4,
        };
        assert_eq!(stop.to_string(), r#"MBC_STOPKEYER CHANNEL="CH_2",KEYERID="4""#);

        let link = Command::SetKeyerLink {
            channel: Channel::Ch1,
            keyer: 0,
            link: true,
        };
        assert_eq!(
            link.to_string(),
            r#"MBC_SETLINKKEYERTOTRANSITION CHANNEL="CH_1",KEYERID="0",LINK=true"#
        );
    }

    #[test]
    fn transition_commands() {
        let take = Command::Take {
            channel: Channel::Ch3,
            mode: TakeMode::Tr2,
        };
        assert_eq!(take.to_string(), r#"MBC_TAKE CHANNEL="CH_3",TAKE_MODE="TR2""#);

        let resume = Command::ResumeTransition {
            channel: Channel::Ch0,
            direction: PlayDirection::Backward,
        };
        assert_eq!(
            resume.to_string(),
            r#"MBC_RESUMETRANSITION CHANNEL="CH_0",PLAY_DIRECTION="BACKWARD""#
        );
    }

    #[test]
    fn source_and_query_commands() {
        assert_eq!(
            Command::SetPreview {
                channel: Channel::Ch0,
                input: 3
            }
            .to_string(),
            r#"MBC_SETPREVIEWVIDEOINPUTID CHANNEL="CH_0",VIDEOINPUTID="3""#
        );
        assert_eq!(
            Command::SetProgram {
                channel: Channel::Ch1,
                input: 7
            }
            .to_string(),
            r#"MBC_SETPROGRAMVIDEOINPUTID CHANNEL="CH_1",VIDEOINPUTID="7""#
        );
        assert_eq!(Command::GetVideoInputList.to_string(), "MBC_GETVIDEOINPUTLIST");
        assert_eq!(
            Command::GetMixBoardInfo {
                channel: Channel::Ch2
            }
            .to_string(),
            "MBC_GETMIXBOARDINFO CH_2"
        );
        assert_eq!(Command::Raw("UPDATEGUI".into()).to_string(), "UPDATEGUI");
    }

    #[test]
    fn parse_tokens() {
        assert_eq!("CH_1".parse::<Channel>().unwrap(), Channel::Ch1);
        assert_eq!("ch-3".parse::<Channel>().unwrap(), Channel::Ch3);
        assert!("CH_9".parse::<Channel>().is_err());
        assert_eq!("fade".parse::<TakeMode>().unwrap(), TakeMode::Fade);
        assert!("WIPE".parse::<TakeMode>().is_err());
        assert_eq!(
            "backward".parse::<PlayDirection>().unwrap(),
            PlayDirection::Backward
        );
    }

    #[test]
    fn channel_serde_uses_wire_token() {
        let json = serde_json::to_string(&Channel::Ch2).unwrap();
        assert_eq!(json, "\"CH_2\"");
        let ch: Channel = serde_json::from_str("\"CH_3\"").unwrap();
        assert_eq!(ch, Channel::Ch3);
    }
}
