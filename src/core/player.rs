//! Tour playback state machine.
//!
//! **Architecture**: the player owns the [`Session`] and nothing else writes
//! to it. Input is a [`TourEvent`] (user action or the media primitive's
//! "playback finished" signal); output is the list of [`MediaCommand`]s the
//! renderer must execute.
//!
//! # Transitions
//!
//! ```text
//!  Start ──select(p)──▶ TransitionIn(p) ──finished──▶ AtRest(p)
//!    ▲                                                  │ return
//!    └──────────finished────── TransitionOut(p) ◀───────┘
//!  Start ──demo──▶ DemoForward ──finished──▶ DemoReverse ──finished──▶ Start
//! ```
//!
//! Any (state, event) pair not drawn above is a no-op, except
//! `CloseDescription` in `AtRest`, which hides the text and stays put.
//! "Playback finished" is edge-triggered and may repeat or arrive late, so
//! out-of-context deliveries are ignored rather than treated as errors.

use crate::catalog::{AssetId, Catalog, Direction, UnknownAssetError};
use log::{debug, error, trace};
use serde::Serialize;
use std::sync::Arc;

/// Exactly one is active at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "poi", rename_all = "snake_case")]
pub enum PlaybackState {
    Start,
    TransitionIn(u32),
    AtRest(u32),
    TransitionOut(u32),
    DemoForward,
    DemoReverse,
}

impl PlaybackState {
    /// Clip playing in this state, if any
    pub fn clip(&self) -> Option<(AssetId, Direction)> {
        match *self {
            PlaybackState::Start => None,
            PlaybackState::TransitionIn(p) | PlaybackState::AtRest(p) => {
                Some((AssetId::Poi(p), Direction::Forward))
            }
            PlaybackState::TransitionOut(p) => Some((AssetId::Poi(p), Direction::Reverse)),
            PlaybackState::DemoForward => Some((AssetId::Demo, Direction::Forward)),
            PlaybackState::DemoReverse => Some((AssetId::Demo, Direction::Reverse)),
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(
            self,
            PlaybackState::TransitionIn(_)
                | PlaybackState::TransitionOut(_)
                | PlaybackState::DemoForward
                | PlaybackState::DemoReverse
        )
    }

    /// POI the state belongs to
    pub fn poi(&self) -> Option<u32> {
        match *self {
            PlaybackState::TransitionIn(p)
            | PlaybackState::AtRest(p)
            | PlaybackState::TransitionOut(p) => Some(p),
            _ => None,
        }
    }
}

/// Input to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourEvent {
    SelectPoi(u32),
    RequestReturn,
    RequestDemo,
    CloseDescription,
    /// Media primitive finished the current clip
    PlaybackFinished,
}

/// Side effect for the renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MediaCommand {
    Play { url: String },
    /// Hold the current clip on its final frame
    PinLastFrame,
    ShowPoster,
    HidePoster,
    ShowDescription { poi: u32 },
    HideDescription,
}

/// Everything the renderer needs to draw the tour
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub state: PlaybackState,
    pub selected: Option<u32>,
    pub url: Option<String>,
    /// Resting poster visible (only in `Start`)
    pub show_rest_frame: bool,
    pub show_description: bool,
    pub pinned_to_last_frame: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: PlaybackState::Start,
            selected: None,
            url: None,
            show_rest_frame: true,
            show_description: false,
            pinned_to_last_frame: false,
        }
    }
}

/// Result of the pure transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Enter a new state
    Go(PlaybackState),
    /// Stay, only hide the description
    HideDescription,
}

/// Transition table. `None` = event ignored in this state.
fn transition(state: PlaybackState, event: TourEvent) -> Option<Step> {
    use PlaybackState::*;
    use TourEvent::*;
    match (state, event) {
        (Start, SelectPoi(p)) => Some(Step::Go(TransitionIn(p))),
        (Start, RequestDemo) => Some(Step::Go(DemoForward)),
        (TransitionIn(p), PlaybackFinished) => Some(Step::Go(AtRest(p))),
        (AtRest(p), RequestReturn) => Some(Step::Go(TransitionOut(p))),
        (AtRest(_), CloseDescription) => Some(Step::HideDescription),
        (TransitionOut(_), PlaybackFinished) => Some(Step::Go(Start)),
        (DemoForward, PlaybackFinished) => Some(Step::Go(DemoReverse)),
        (DemoReverse, PlaybackFinished) => Some(Step::Go(Start)),
        _ => None,
    }
}

/// Playback controller for one page session
#[derive(Debug, Clone)]
pub struct TourPlayer {
    catalog: Arc<Catalog>,
    session: Session,
}

impl TourPlayer {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        debug!("Tour player initialized in Start");
        Self {
            catalog,
            session: Session::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> PlaybackState {
        self.session.state
    }

    /// Apply an event. Returns the renderer commands (empty for no-ops).
    pub fn handle(&mut self, event: TourEvent) -> Vec<MediaCommand> {
        let state = self.session.state;
        let Some(step) = transition(state, event) else {
            trace!("Ignoring {:?} in {:?}", event, state);
            return Vec::new();
        };

        match step {
            Step::HideDescription => {
                if !self.session.show_description {
                    return Vec::new();
                }
                self.session.show_description = false;
                vec![MediaCommand::HideDescription]
            }
            Step::Go(next) => match self.enter(next) {
                Ok(commands) => {
                    debug!("{:?} --{:?}--> {:?}", state, event, next);
                    commands
                }
                Err(e) => {
                    // Closed id set: only a caller bug gets here
                    error!("{} ({:?} in {:?} ignored)", e, event, state);
                    debug_assert!(false, "{}", e);
                    Vec::new()
                }
            },
        }
    }

    /// Commit `next` and its entry actions. Nothing changes on error.
    fn enter(&mut self, next: PlaybackState) -> Result<Vec<MediaCommand>, UnknownAssetError> {
        let url = match next.clip() {
            Some((id, direction)) => Some(self.catalog.resolve(id, direction)?.to_string()),
            None => None,
        };

        let mut commands = Vec::new();
        let session = &mut self.session;
        match next {
            PlaybackState::TransitionIn(p) => {
                session.selected = Some(p);
                session.show_rest_frame = false;
                session.pinned_to_last_frame = false;
                commands.push(MediaCommand::HidePoster);
                commands.push(play(&url));
            }
            PlaybackState::AtRest(p) => {
                session.pinned_to_last_frame = true;
                session.show_description = true;
                commands.push(MediaCommand::PinLastFrame);
                commands.push(MediaCommand::ShowDescription { poi: p });
            }
            PlaybackState::TransitionOut(_) => {
                session.pinned_to_last_frame = false;
                if session.show_description {
                    commands.push(MediaCommand::HideDescription);
                }
                session.show_description = false;
                commands.push(play(&url));
            }
            PlaybackState::DemoForward => {
                session.selected = None;
                session.show_rest_frame = false;
                commands.push(MediaCommand::HidePoster);
                commands.push(play(&url));
            }
            PlaybackState::DemoReverse => {
                commands.push(play(&url));
            }
            PlaybackState::Start => {
                session.selected = None;
                session.show_rest_frame = true;
                session.show_description = false;
                session.pinned_to_last_frame = false;
                commands.push(MediaCommand::ShowPoster);
            }
        }
        session.state = next;
        session.url = url;
        Ok(commands)
    }
}

fn play(url: &Option<String>) -> MediaCommand {
    MediaCommand::Play {
        url: url.clone().unwrap_or_default(),
    }
}
