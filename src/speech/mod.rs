//! Spoken output.
//!
//! `Annunciator` turns a ranged detection into a fixed sentence and hands it
//! to a `SpeechSink`. Speech is best effort: sink failures are logged and
//! never reach the pipeline.

mod sinks;

use anyhow::Result;

use crate::direction::Direction;

pub use sinks::{CommandSpeech, LogSpeech};

/// Tag attached to every utterance.
pub const UTTERANCE_TAG: &str = "Object Annotation";

/// How an utterance joins the speech queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueMode {
    /// Append after whatever is already queued.
    Add,
}

/// External text-to-speech collaborator.
pub trait SpeechSink: Send {
    fn speak(&mut self, text: &str, mode: QueueMode, tag: &str) -> Result<()>;
}

impl<S: SpeechSink + ?Sized> SpeechSink for Box<S> {
    fn speak(&mut self, text: &str, mode: QueueMode, tag: &str) -> Result<()> {
        (**self).speak(text, mode, tag)
    }
}

/// Sentence for an object at `meters` in `direction`.
pub fn format_utterance(label: &str, meters: f64, direction: Direction) -> String {
    match direction {
        Direction::Left => format!(
            "The {} is {:.2} meters away, slightly to the left of you.",
            label, meters
        ),
        Direction::Center => format!("The {} is {:.2} meters in front of you.", label, meters),
        Direction::Right => format!(
            "The {} is {:.2} meters away, slightly to the right of you.",
            label, meters
        ),
    }
}

pub struct Annunciator<S> {
    sink: S,
    tag: String,
}

impl<S: SpeechSink> Annunciator<S> {
    pub fn new(sink: S) -> Self {
        Self::with_tag(sink, UTTERANCE_TAG)
    }

    pub fn with_tag(sink: S, tag: impl Into<String>) -> Self {
        Self {
            sink,
            tag: tag.into(),
        }
    }

    /// Formats and queues one utterance. Returns the text that was queued.
    pub fn announce(&mut self, label: &str, meters: f64, direction: Direction) -> String {
        let text = format_utterance(label, meters, direction);
        log::info!("announce: {}", text);
        if let Err(e) = self.sink.speak(&text, QueueMode::Add, &self.tag) {
            log::warn!("speech output failed: {}", e);
        }
        text
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
