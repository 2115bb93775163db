use async_trait::async_trait;

/// Speech-to-text engine; one utterance per call.
#[async_trait]
pub trait VoiceCapture: Send + Sync {
    /// `None` when nothing was recognized.
    async fn capture(&self) -> Option<String>;
}

/// Asks the user whether a transcript should be saved.
#[async_trait]
pub trait Confirmation: Send + Sync {
    async fn confirm(&self, transcript: &str) -> bool;
}

pub fn confirmation_prompt(transcript: &str) -> String {
    format!("Heard you say \"{transcript}\". Save?")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dictation<T> {
    NothingHeard,
    Declined { transcript: String },
    Saved(T),
}
