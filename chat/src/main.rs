use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pipeline_chat::{
    cli::{Cli, Command},
    config::Config,
    conversations, inbox, users, BoundMessage, Composer, ConversationId, DisplayKind,
    MessageBinder, SendOutcome, SequenceChange, UserId,
};
use record_api::{RecordStore, SharedStore};
use record_store::LocalStore;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(&cli)?;
    let level = if cfg.logging_enabled { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = cli.command else {
        anyhow::bail!("no command given, see --help");
    };
    if let Some(parent) = cfg.store_path.parent() {
        std::fs::create_dir_all(parent).context("cannot create data directory")?;
    }
    let store: SharedStore = Arc::new(LocalStore::open(&cfg.store_path)?);
    run(&cfg, store, command).await
}

async fn run(cfg: &Config, store: SharedStore, command: Command) -> Result<()> {
    let me = UserId::from(cfg.require_user()?);
    match command {
        Command::Register { username, nickname } => {
            let user = users::register(&*store, &me, &username, &nickname).await?;
            println!("registered {} as @{}", user.id, user.username);
        }
        Command::Nickname { nickname } => {
            users::set_nickname(&*store, &me, &nickname).await?;
        }
        Command::Dm { username } => {
            let other = lookup(&*store, &username).await?;
            let conversation = conversations::open_direct(&*store, &me, &other).await?;
            println!("{}", conversation.id);
        }
        Command::Group { title, members } => {
            let mut ids = Vec::with_capacity(members.len());
            for name in &members {
                ids.push(lookup(&*store, name).await?);
            }
            let conversation = conversations::create_group(&*store, &me, &title, &ids).await?;
            println!("{}", conversation.id);
        }
        Command::Add {
            conversation,
            username,
        } => {
            let user = lookup(&*store, &username).await?;
            conversations::add_participant(&*store, &conversation.as_str().into(), &me, &user)
                .await?;
        }
        Command::Remove {
            conversation,
            username,
        } => {
            let user = lookup(&*store, &username).await?;
            conversations::remove_participant(&*store, &conversation.as_str().into(), &me, &user)
                .await?;
        }
        Command::Send { conversation, text } => {
            let composer = Composer::new(store.clone());
            match composer
                .send(&ConversationId::new(conversation), &me, &text)
                .await?
            {
                SendOutcome::Sent { key } => println!("{key}"),
                SendOutcome::Dropped => eprintln!("nothing to send"),
            }
        }
        Command::History {
            conversation,
            follow,
        } => {
            let mut bound =
                MessageBinder::new(store.clone()).bind(&ConversationId::new(conversation), &me);
            bound.drain();
            for message in bound.messages() {
                print_message(&*store, message).await?;
            }
            if follow {
                while let Some(change) = bound.recv().await {
                    if let SequenceChange::Inserted { index } = change {
                        print_message(&*store, &bound.messages()[index]).await?;
                    }
                }
            }
        }
        Command::Inbox => {
            let mut inbox = inbox::bind(&store, &me);
            inbox.drain();
            for entry in inbox.entries() {
                let title = match conversations::get(&*store, &entry.conversation).await? {
                    Some(c) => match (c.title.clone(), c.other_participant(&me)) {
                        (Some(title), _) => title,
                        (None, Some(other)) => users::display_name(&*store, other).await?,
                        (None, None) => entry.conversation.to_string(),
                    },
                    None => continue,
                };
                let at = format_time(entry.last_message_at);
                println!("{}  {at}  {title}", entry.conversation);
            }
        }
    }
    Ok(())
}

async fn lookup(store: &dyn RecordStore, username: &str) -> Result<UserId> {
    let user = users::find_by_username(store, username)
        .await?
        .with_context(|| format!("unknown user @{username}"))?;
    Ok(user.id)
}

async fn print_message(store: &dyn RecordStore, bound: &BoundMessage) -> Result<()> {
    let at = format_time(bound.message.timestamp);
    match bound.display {
        DisplayKind::Info => println!("{at}  -- {}", bound.message.text),
        DisplayKind::Sent => println!("{at}  me: {}", bound.message.text),
        DisplayKind::Received => {
            let name = users::display_name(store, &bound.message.sender).await?;
            println!("{at}  {name}: {}", bound.message.text);
        }
    }
    Ok(())
}

fn format_time(millis: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| millis.to_string())
}
