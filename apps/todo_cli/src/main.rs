use std::{process::ExitCode, sync::Arc};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, todo_controller, CredentialPrompt, Dictation, Outcome, StaticCredentials,
    SyncController, SyncError, SyncEvent,
};
use shared::domain::{RecordId, TodoItem};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::info;

mod prompts;

use prompts::{StdinConfirmation, StdinCredentials, TypedDictation};

#[derive(Parser, Debug)]
#[command(about = "Keep a todo list in sync with a remote table service")]
struct Args {
    #[arg(long)]
    service_url: Option<String>,
    #[arg(long)]
    table: Option<String>,
    /// Skip the sign-in prompt.
    #[arg(long)]
    username: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show incomplete items (default).
    List,
    Add {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Type a phrase, confirm it, and save it as an item.
    Dictate,
    Complete {
        id: String,
    },
    Delete {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(url) = args.service_url {
        settings.service_url = url;
    }
    if let Some(table) = args.table {
        settings.table_name = table;
    }

    let prompt: Arc<dyn CredentialPrompt> = match args.username {
        Some(username) => Arc::new(StaticCredentials(username)),
        None => Arc::new(StdinCredentials {
            provider: settings.login_provider.clone(),
        }),
    };
    let controller = todo_controller(&settings, prompt)?;
    let mut events = controller.subscribe_events();

    let loaded = controller.authenticate_and_load().await;
    show_notifications(&mut events);
    if loaded.is_err() {
        controller.detach().await;
        return Ok(ExitCode::FAILURE);
    }

    let result = run(&controller, args.command.unwrap_or(Command::List)).await;
    show_notifications(&mut events);
    if let Err(err) = &result {
        // Sync failures were already shown as notifications.
        if err.downcast_ref::<SyncError>().is_none() {
            eprintln!("{err:#}");
        }
    }
    print_items(&controller.items().await);

    controller.detach().await;
    show_notifications(&mut events);
    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run(controller: &SyncController<TodoItem>, command: Command) -> Result<()> {
    match command {
        Command::List => {}
        Command::Add { text } => {
            if let Outcome::Applied(item) = controller.create_from_text(&text.join(" ")).await? {
                println!("added {}", item.id);
            }
        }
        Command::Dictate => {
            match controller
                .dictate(&TypedDictation, &StdinConfirmation)
                .await?
            {
                Dictation::NothingHeard => println!("nothing heard"),
                Dictation::Declined { transcript } => println!("discarded \"{transcript}\""),
                Dictation::Saved(Outcome::Applied(item)) => println!("added {}", item.id),
                Dictation::Saved(_) => {}
            }
        }
        Command::Complete { id } => {
            let id = RecordId::new(id);
            let Some(mut item) = controller
                .items()
                .await
                .into_iter()
                .find(|item| item.id == id)
            else {
                return Err(anyhow!("no incomplete item with id {id}"));
            };
            if let Outcome::Applied(id) = controller.mark_complete(&mut item).await? {
                println!("completed {id}");
            }
        }
        Command::Delete { id } => {
            if let Outcome::Applied(id) = controller.delete(&RecordId::new(id)).await? {
                println!("deleted {id}");
            }
        }
    }
    Ok(())
}

/// Prints queued sync events; errors become user-facing notifications.
fn show_notifications(events: &mut broadcast::Receiver<SyncEvent<TodoItem>>) {
    loop {
        match events.try_recv() {
            Ok(SyncEvent::Error(err)) => eprintln!("{}: {err}", err.title()),
            Ok(SyncEvent::SignedIn { identity }) => info!(%identity, "signed in"),
            Ok(SyncEvent::SignedOut) => info!("signed out"),
            Ok(_) => {}
            Err(TryRecvError::Lagged(skipped)) => {
                eprintln!("({skipped} notifications dropped)");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

fn print_items(items: &[TodoItem]) {
    if items.is_empty() {
        println!("nothing to do");
        return;
    }
    for item in items {
        println!("[ ] {}  {}", item.id, item.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_is_the_default_command() {
        let args = Args::try_parse_from(["todo_cli", "--username", "alice"]).expect("args");
        assert!(args.command.is_none());
        assert_eq!(args.username.as_deref(), Some("alice"));
    }

    #[test]
    fn add_joins_words_and_requires_text() {
        let args = Args::try_parse_from(["todo_cli", "add", "buy", "milk"]).expect("args");
        match args.command {
            Some(Command::Add { text }) => assert_eq!(text.join(" "), "buy milk"),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Args::try_parse_from(["todo_cli", "add"]).is_err());
    }

    #[tokio::test]
    async fn completing_an_unknown_id_fails_without_contacting_the_service() {
        let settings = client_core::ClientSettings {
            service_url: "http://127.0.0.1:9".to_string(),
            ..client_core::ClientSettings::default()
        };
        let controller =
            todo_controller(&settings, Arc::new(StaticCredentials("alice".into()))).expect("controller");

        let err = run(
            &controller,
            Command::Complete {
                id: "ghost".to_string(),
            },
        )
        .await
        .expect_err("unknown id");

        assert!(err.downcast_ref::<SyncError>().is_none());
        assert_eq!(err.to_string(), "no incomplete item with id ghost");
    }

    #[test]
    fn overrides_are_optional_flags() {
        let args = Args::try_parse_from([
            "todo_cli",
            "--service-url",
            "http://127.0.0.1:9",
            "--table",
            "chores",
            "complete",
            "abc",
        ])
        .expect("args");
        assert_eq!(args.service_url.as_deref(), Some("http://127.0.0.1:9"));
        assert_eq!(args.table.as_deref(), Some("chores"));
        assert!(matches!(args.command, Some(Command::Complete { id }) if id == "abc"));
    }
}
