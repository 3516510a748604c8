// Wire protocol DTOs and conversions for both transport roles.
// Every message is one JSON document (or one plain-text action line) per line.

use crate::domain::{
    Direction, DirectionSet, GameScreen, GameStateSnapshot, InputCommand, NoteSnapshot,
    TelemetryFrame,
};
use serde::{Deserialize, Serialize};

/// Messages the server role broadcasts to connected controllers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "noteData")]
    NoteData(NoteDataDto),
}

/// Note window for one broadcast tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDataDto {
    pub current_time: f64,
    pub current_notes: Vec<NoteDto>,
    pub upcoming_notes: Vec<NoteDto>,
}

impl From<&GameStateSnapshot> for NoteDataDto {
    fn from(snapshot: &GameStateSnapshot) -> Self {
        Self {
            current_time: snapshot.current_time_ms,
            current_notes: snapshot.current_notes.iter().map(NoteDto::from).collect(),
            upcoming_notes: snapshot.upcoming_notes.iter().map(NoteDto::from).collect(),
        }
    }
}

/// Flattened note; `direction` is the lane index 0..=3.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDto {
    pub direction: u8,
    pub strum_time: f64,
    pub is_hold_note: bool,
    pub may_hit: bool,
    pub too_early: bool,
    pub has_missed: bool,
}

impl From<&NoteSnapshot> for NoteDto {
    fn from(note: &NoteSnapshot) -> Self {
        Self {
            direction: note.direction.index() as u8,
            strum_time: note.strum_time_ms,
            is_hold_note: note.is_hold_note,
            may_hit: note.may_hit,
            too_early: note.too_early,
            has_missed: note.has_missed,
        }
    }
}

impl TryFrom<NoteDto> for NoteSnapshot {
    type Error = UnknownDirection;

    fn try_from(note: NoteDto) -> Result<Self, Self::Error> {
        let direction =
            Direction::from_index(i64::from(note.direction)).ok_or(UnknownDirection)?;
        Ok(Self {
            direction,
            strum_time_ms: note.strum_time,
            // The noteData message does not carry sustain lengths.
            length_ms: 0.0,
            is_hold_note: note.is_hold_note,
            may_hit: note.may_hit,
            too_early: note.too_early,
            has_missed: note.has_missed,
        })
    }
}

impl TryFrom<NoteDataDto> for GameStateSnapshot {
    type Error = UnknownDirection;

    fn try_from(data: NoteDataDto) -> Result<Self, Self::Error> {
        let convert = |notes: Vec<NoteDto>| {
            notes
                .into_iter()
                .map(NoteSnapshot::try_from)
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            current_time_ms: data.current_time,
            current_notes: convert(data.current_notes)?,
            upcoming_notes: convert(data.upcoming_notes)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownDirection;

/// Game-state document the client role sends to its controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStateDto {
    pub main_state: ScreenDto,
    pub is_playing: bool,
    pub timestamp: f64,
    pub notes: Vec<ControllerNoteDto>,
}

impl From<&TelemetryFrame> for ControllerStateDto {
    fn from(frame: &TelemetryFrame) -> Self {
        let now = frame.snapshot.current_time_ms;
        Self {
            main_state: frame.screen.into(),
            is_playing: frame.is_playing,
            timestamp: now,
            notes: frame
                .snapshot
                .merged_notes()
                .map(|note| ControllerNoteDto::new(note, now))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerNoteDto {
    pub direction: u8,
    pub strum_time: f64,
    pub conductor_time: f64,
    pub is_hold_note: bool,
    pub length: f64,
    pub may_hit: bool,
    pub too_early: bool,
    pub has_missed: bool,
    pub has_been_hit: bool,
}

impl ControllerNoteDto {
    fn new(note: &NoteSnapshot, conductor_time: f64) -> Self {
        Self {
            direction: note.direction.index() as u8,
            strum_time: note.strum_time_ms,
            conductor_time,
            is_hold_note: note.is_hold_note,
            length: note.length_ms,
            may_hit: note.may_hit,
            too_early: note.too_early,
            has_missed: note.has_missed,
            // Only pending notes are ever extracted.
            has_been_hit: false,
        }
    }
}

/// Screen names as the controller expects them (`"PLAYING"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScreenDto {
    Title,
    MainMenu,
    StoryMenu,
    Freeplay,
    Playing,
    Paused,
    GameOver,
    Unknown,
}

impl From<GameScreen> for ScreenDto {
    fn from(screen: GameScreen) -> Self {
        match screen {
            GameScreen::Title => ScreenDto::Title,
            GameScreen::MainMenu => ScreenDto::MainMenu,
            GameScreen::StoryMenu => ScreenDto::StoryMenu,
            GameScreen::Freeplay => ScreenDto::Freeplay,
            GameScreen::Playing => ScreenDto::Playing,
            GameScreen::Paused => ScreenDto::Paused,
            GameScreen::GameOver => ScreenDto::GameOver,
            GameScreen::Unknown => ScreenDto::Unknown,
        }
    }
}

/// Messages controllers send to the server role.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ClientMessage {
    // `{"type":"input","keyCode":2,"pressed":true}`
    Edge(EdgeCommandDto),
    // `{"keys":["left","right"]}`
    Level(LevelCommandDto),
}

#[derive(Debug, Clone, Deserialize)]
enum EdgeKind {
    #[serde(rename = "input")]
    Input,
}

#[derive(Debug, Clone, Deserialize)]
struct EdgeCommandDto {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    kind: EdgeKind,
    #[serde(rename = "keyCode")]
    key_code: i64,
    pressed: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct LevelCommandDto {
    keys: Vec<String>,
}

/// Result of parsing one inbound line from a controller.
#[derive(Debug)]
pub enum Inbound {
    Command(InputCommand),
    /// Valid JSON that matches neither command shape.
    Unrecognized(&'static str),
    /// Not JSON at all.
    Malformed(serde_json::Error),
}

pub fn parse_client_line(line: &str) -> Inbound {
    match serde_json::from_str::<ClientMessage>(line) {
        Ok(ClientMessage::Edge(edge)) => match Direction::from_index(edge.key_code) {
            Some(direction) => Inbound::Command(InputCommand::Edge {
                direction,
                pressed: edge.pressed,
            }),
            None => Inbound::Unrecognized("keyCode out of range"),
        },
        Ok(ClientMessage::Level(level)) => {
            // Unknown names are ignored; the known ones still apply.
            let known: Vec<Direction> = level
                .keys
                .iter()
                .filter_map(|key| Direction::from_name(key))
                .collect();
            if known.is_empty() && !level.keys.is_empty() {
                return Inbound::Unrecognized("no known keys");
            }
            Inbound::Command(InputCommand::Level {
                held: known.into_iter().collect(),
            })
        }
        Err(parse_err) => {
            if serde_json::from_str::<serde::de::IgnoredAny>(line).is_ok() {
                Inbound::Unrecognized("unknown message shape")
            } else {
                Inbound::Malformed(parse_err)
            }
        }
    }
}

/// Parses a controller action line such as `"left,right"` or `"none"`.
///
/// Returns the level command plus the number of tokens that named no direction.
/// A line made only of unknown tokens yields no command.
pub fn parse_action_line(line: &str) -> (Option<InputCommand>, usize) {
    let mut held = DirectionSet::empty();
    let mut known = 0;
    let mut unknown = 0;
    for token in line.split(',').map(str::trim) {
        if token.is_empty() {
            continue;
        }
        if token.eq_ignore_ascii_case("none") {
            known += 1;
            continue;
        }
        match Direction::from_name(token) {
            Some(direction) => {
                held.insert(direction);
                known += 1;
            }
            None => unknown += 1,
        }
    }
    if known == 0 && unknown > 0 {
        return (None, unknown);
    }
    (Some(InputCommand::Level { held }), unknown)
}

pub fn encode_note_data(snapshot: &GameStateSnapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ServerMessage::NoteData(NoteDataDto::from(snapshot)))
}

pub fn encode_controller_state(frame: &TelemetryFrame) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ControllerStateDto::from(frame))
}
