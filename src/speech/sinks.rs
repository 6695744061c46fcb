use anyhow::{anyhow, Result};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread::JoinHandle;

use super::{QueueMode, SpeechSink};

/// Writes utterances to the log instead of speaking them.
#[derive(Debug, Default)]
pub struct LogSpeech;

impl SpeechSink for LogSpeech {
    fn speak(&mut self, text: &str, mode: QueueMode, tag: &str) -> Result<()> {
        log::info!("[speech:{}:{:?}] {}", tag, mode, text);
        Ok(())
    }
}

/// Speaks through a local TTS command (`espeak-ng`, `say`, ...).
///
/// Utterances go to a dedicated speaker thread that runs the command once
/// per utterance, with the text as the last argument, one at a time. The
/// caller never waits.
pub struct CommandSpeech {
    program: String,
    queue: Option<mpsc::Sender<String>>,
    speaker: Option<JoinHandle<()>>,
}

impl CommandSpeech {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        let (tx, rx) = mpsc::channel::<String>();
        let thread_program = program.clone();
        let speaker = std::thread::Builder::new()
            .name("speech".to_string())
            .spawn(move || run_speaker(&thread_program, &args, rx))
            .map_err(|e| log::error!("failed to start speech thread: {}", e))
            .ok();
        Self {
            program,
            queue: speaker.as_ref().map(|_| tx),
            speaker,
        }
    }
}

fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || " .,'-".contains(*c))
        .take(512)
        .collect()
}

fn run_speaker(program: &str, args: &[String], rx: mpsc::Receiver<String>) {
    while let Ok(text) = rx.recv() {
        let status = Command::new(program)
            .args(args)
            .arg(sanitize(&text))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) if !status.success() => {
                log::warn!("{} exited with {}", program, status);
            }
            Ok(_) => {}
            Err(e) => log::warn!("failed to run {}: {}", program, e),
        }
    }
}

impl SpeechSink for CommandSpeech {
    fn speak(&mut self, text: &str, _mode: QueueMode, _tag: &str) -> Result<()> {
        let queue = self
            .queue
            .as_ref()
            .ok_or_else(|| anyhow!("speech thread for {} is not running", self.program))?;
        queue
            .send(text.to_string())
            .map_err(|_| anyhow!("speech thread for {} has stopped", self.program))
    }
}

impl Drop for CommandSpeech {
    fn drop(&mut self) {
        self.queue.take();
        if let Some(handle) = self.speaker.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_sentence_text() {
        assert_eq!(
            sanitize("The cup is 0.50 meters in front of you.;rm -rf"),
            "The cup is 0.50 meters in front of you.rm -rf"
        );
    }

    #[test]
    fn missing_program_does_not_block_caller() {
        let mut sink = CommandSpeech::new("sightline-no-such-tts-binary", Vec::new());
        assert!(sink.speak("hello", QueueMode::Add, "t").is_ok());
        drop(sink);
    }
}
