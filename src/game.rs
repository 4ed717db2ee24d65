//! Word game driven by remote events.
//!
//! The game owns the answer list and reacts to the three pushed events:
//! `start` reshuffles and deals the first answer, `next-answer` deals the
//! next one, and `shutdown` asks the process to exit when the server says so.
//! Drawing is delegated to a [`Renderer`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::Value;

use crate::bus::event_types::{EVENT_PUSH_NEXT_ANSWER, EVENT_PUSH_SHUTDOWN, EVENT_PUSH_START};
use crate::bus::{handler_fn, EventDispatcher, HandlerError};
use crate::signal::Signal;

pub const DEFAULT_TITLE: &str = "password";
pub const GAME_OVER: &str = "GAME OVER";

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("failed to read word list {}: {source}", .path.display())]
    Words {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("word list {} has no words", .0.display())]
    EmptyWords(PathBuf),
}

/// Read one word per line, upper-cased. Blank lines are skipped.
pub fn load_words(path: &Path) -> Result<Vec<String>, GameError> {
    let raw = std::fs::read_to_string(path).map_err(|source| GameError::Words {
        path: path.to_path_buf(),
        source,
    })?;
    let words: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_uppercase)
        .collect();
    if words.is_empty() {
        return Err(GameError::EmptyWords(path.to_path_buf()));
    }
    tracing::debug!("loaded {} words from {}", words.len(), path.display());
    Ok(words)
}

/// What the display shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub title: String,
    pub answer: String,
}

pub trait Renderer: Send + Sync {
    fn draw(&self, screen: &Screen);
}

/// Renderer that writes every frame to the log.
#[derive(Debug, Default)]
pub struct LogRenderer;

impl Renderer for LogRenderer {
    fn draw(&self, screen: &Screen) {
        tracing::info!(title = %screen.title.to_uppercase(), "answer: {}", screen.answer);
    }
}

struct GameState {
    answers: Vec<String>,
    answer: String,
    rng: StdRng,
}

pub struct WordGame {
    title: String,
    all_words: Vec<String>,
    state: Mutex<GameState>,
    renderer: Arc<dyn Renderer>,
    terminate: Arc<Signal>,
}

impl WordGame {
    pub fn new(
        title: impl Into<String>,
        all_words: Vec<String>,
        renderer: Arc<dyn Renderer>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            title: title.into(),
            all_words,
            state: Mutex::new(GameState {
                answers: Vec::new(),
                answer: "ANSWER".to_string(),
                rng,
            }),
            renderer,
            terminate: Arc::new(Signal::new()),
        }
    }

    /// Raised when the server asks the client to exit.
    pub fn terminate_signal(&self) -> Arc<Signal> {
        self.terminate.clone()
    }

    pub fn current_answer(&self) -> String {
        self.state.lock().expect("game state mutex poisoned").answer.clone()
    }

    pub fn remaining(&self) -> usize {
        self.state.lock().expect("game state mutex poisoned").answers.len()
    }

    /// Reshuffle every word and deal the first answer.
    pub fn start(&self) {
        let screen = {
            let mut guard = self.state.lock().expect("game state mutex poisoned");
            let state = &mut *guard;
            state.answers = self.all_words.clone();
            state.answers.shuffle(&mut state.rng);
            state.answer = state.answers.pop().unwrap_or_else(|| GAME_OVER.to_string());
            self.screen(&state.answer)
        };
        tracing::info!("game started with {} words", self.all_words.len());
        self.renderer.draw(&screen);
    }

    /// Deal the next answer, or `GAME OVER` once the list is exhausted.
    pub fn next_answer(&self) {
        let screen = {
            let mut state = self.state.lock().expect("game state mutex poisoned");
            state.answer = state.answers.pop().unwrap_or_else(|| GAME_OVER.to_string());
            self.screen(&state.answer)
        };
        self.renderer.draw(&screen);
    }

    /// Handle the shutdown payload `[shutdown_now]`, where `shutdown_now` is
    /// a one-element list holding the server's flag.
    pub fn shutdown(&self, args: &[Value]) -> Result<(), HandlerError> {
        let shutdown_now = args
            .first()
            .and_then(Value::as_array)
            .and_then(|flags| flags.first())
            .and_then(Value::as_bool)
            .ok_or_else(|| HandlerError::new(format!("malformed shutdown payload: {args:?}")))?;

        tracing::info!("exiting: [{shutdown_now}]");
        if shutdown_now {
            self.terminate.set();
        }
        Ok(())
    }

    /// Install the game's handlers for the pushed events.
    pub fn register(self: &Arc<Self>, dispatcher: &mut EventDispatcher) {
        let game = self.clone();
        dispatcher.on(
            EVENT_PUSH_START,
            handler_fn(move |_args| {
                let game = game.clone();
                async move {
                    game.start();
                    Ok(())
                }
            }),
        );

        let game = self.clone();
        dispatcher.on(
            EVENT_PUSH_NEXT_ANSWER,
            handler_fn(move |_args| {
                let game = game.clone();
                async move {
                    game.next_answer();
                    Ok(())
                }
            }),
        );

        let game = self.clone();
        dispatcher.on(
            EVENT_PUSH_SHUTDOWN,
            handler_fn(move |args| {
                let game = game.clone();
                async move { game.shutdown(&args) }
            }),
        );
    }

    fn screen(&self, answer: &str) -> Screen {
        Screen {
            title: self.title.clone(),
            answer: answer.to_string(),
        }
    }
}
