use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use client_core::{voice::confirmation_prompt, Confirmation, CredentialPrompt, VoiceCapture};
use tracing::warn;

/// Prints `prompt` and reads one trimmed line from stdin. `None` on EOF or a
/// blank answer.
async fn ask(prompt: String) -> Option<String> {
    let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt} ")?;
        stdout.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    })
    .await;

    match answer {
        Ok(Ok(line)) => {
            let line = line.trim();
            (!line.is_empty()).then(|| line.to_string())
        }
        Ok(Err(e)) => {
            warn!(error = %e, "prompt: failed to read stdin");
            None
        }
        Err(e) => {
            warn!(error = %e, "prompt: reader task failed");
            None
        }
    }
}

pub struct StdinCredentials {
    pub provider: String,
}

#[async_trait]
impl CredentialPrompt for StdinCredentials {
    async fn username(&self) -> Option<String> {
        ask(format!("Sign in to {} as:", self.provider)).await
    }
}

/// Typed stand-in for a speech recognizer.
pub struct TypedDictation;

#[async_trait]
impl VoiceCapture for TypedDictation {
    async fn capture(&self) -> Option<String> {
        ask("Say something:".to_string()).await
    }
}

pub struct StdinConfirmation;

#[async_trait]
impl Confirmation for StdinConfirmation {
    async fn confirm(&self, transcript: &str) -> bool {
        ask(format!("{} [y/N]", confirmation_prompt(transcript)))
            .await
            .is_some_and(|answer| matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}
