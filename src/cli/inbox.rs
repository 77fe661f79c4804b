use std::sync::Arc;

use clap::{Args, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::CliContext;
use xbytechat::inbox::{InboxEvent, InboxState, InboxView, TerminalBell};
use xbytechat::inbox_channel::{HubConfig, UnreadCountChanged};

#[derive(Args, Debug)]
pub struct InboxArgs {
    #[command(subcommand)]
    pub command: InboxCommands,
}

#[derive(Subcommand, Debug)]
pub enum InboxCommands {
    /// Follow incoming messages and unread counts until Ctrl-C
    Listen {
        /// Treat this contact's thread as open: its messages are not counted
        #[arg(long)]
        open: Option<String>,
    },
    /// Send a text message to a contact
    Send { contact: String, text: String },
    /// Print a contact's thread and mark it read
    Read { contact: String },
}

async fn mount(context: &CliContext) -> anyhow::Result<InboxView> {
    let settings = &context.settings;
    let config = HubConfig::new(settings.hub_url.clone())
        .with_token(context.session.token())
        .with_reconnect(settings.reconnect.clone());
    let state = InboxState::new(settings.user_id.clone(), Arc::new(TerminalBell)).shared();
    Ok(InboxView::mount(config, state).await?)
}

fn print_message(message: &xbytechat::inbox_channel::InboxMessage) {
    let when = message
        .timestamp()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    let arrow = if message.is_incoming { "←" } else { "→" };
    println!(
        "{when} {arrow} {}: {}",
        message.contact_id,
        message.message.as_deref().unwrap_or("")
    );
}

pub async fn execute(args: InboxArgs, context: &CliContext) -> anyhow::Result<()> {
    context.require_login()?;
    match args.command {
        InboxCommands::Listen { open } => {
            let api = context.api()?;
            let view = mount(context).await?;
            view.record_gesture();
            if let Some(contact) = open.as_deref() {
                view.load_history(&api, contact).await?;
                view.open_thread(contact);
            }
            let mut events = view.events();
            println!("Listening on {} (Ctrl-C to stop)", context.settings.hub_url);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = events.recv() => match event {
                        Ok(InboxEvent::Message { message, outcome }) => {
                            print_message(&message);
                            if outcome.counted {
                                let unread = view.state().lock().map(|s| s.unread().get(&message.contact_id)).unwrap_or(0);
                                println!("   {} unread from {}", unread, message.contact_id);
                            }
                        }
                        Ok(InboxEvent::UnreadChanged(UnreadCountChanged::Contact(count))) => {
                            println!("   {} unread from {}", count.unread_count, count.contact_id);
                        }
                        Ok(InboxEvent::UnreadChanged(UnreadCountChanged::RefreshAll)) => {
                            if let Err(err) = view.refresh_unread_if_needed(&api).await {
                                warn!(error = %err, "unread refresh failed");
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "inbox listener fell behind");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            view.unmount().await;
            info!("inbox listener stopped");
            Ok(())
        }
        InboxCommands::Send { contact, text } => {
            let view = mount(context).await?;
            let result = view.send(&contact, &text).await;
            view.unmount().await;
            result?;
            println!("✅ Message sent to {contact}.");
            Ok(())
        }
        InboxCommands::Read { contact } => {
            let api = context.api()?;
            let view = mount(context).await?;
            let loaded = view.load_history(&api, &contact).await;
            match loaded {
                Ok(_) => {
                    view.open_thread(&contact);
                    if let Ok(state) = view.state().lock() {
                        for (day, messages) in state.threads().grouped_by_day(&contact) {
                            println!("── {day}");
                            for message in messages {
                                print_message(message);
                            }
                        }
                    }
                }
                Err(err) => {
                    view.unmount().await;
                    return Err(err.into());
                }
            }
            view.unmount().await;
            Ok(())
        }
    }
}
