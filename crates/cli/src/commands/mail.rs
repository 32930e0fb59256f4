// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ctm mail`: best-effort messages between sessions.

use anyhow::Result;
use clap::{Args, Subcommand};
use ctm_storage::{MailboxError, Message};

use super::Ctx;
use crate::color;
use crate::exit_error::{ExitError, VALIDATION};
use crate::output::{format_time_ago, parse_duration, print_json, OutputFormat};

#[derive(Args)]
pub struct MailArgs {
    #[command(subcommand)]
    pub command: MailCommand,
}

#[derive(Subcommand)]
pub enum MailCommand {
    /// Leave a message for another session
    Send {
        to: String,
        body: String,
        /// Sender name shown to the recipient
        #[arg(long, default_value = "cli")]
        from: String,
        /// Discard the message if unread after this long (e.g. 30m, 2h)
        #[arg(long, value_parser = parse_duration)]
        ttl: Option<std::time::Duration>,
    },
    /// Read and remove pending messages
    Recv { me: String },
    /// Show pending messages without removing them
    Peek { me: String },
    /// Delete expired messages from every inbox
    Purge,
}

pub fn mail(ctx: &Ctx, args: MailArgs) -> Result<()> {
    let mailbox = ctx.tm.mailbox();
    match args.command {
        MailCommand::Send { to, body, from, ttl } => {
            let msg = mailbox.send(&from, &to, &body, ttl).map_err(|e| match e {
                MailboxError::InvalidRecipient(_) => {
                    anyhow::Error::from(ExitError::new(VALIDATION, e.to_string()))
                }
                other => other.into(),
            })?;
            match ctx.format {
                OutputFormat::Text => println!("Sent {} to {}", msg.id, msg.to),
                OutputFormat::Json => print_json(&msg)?,
            }
        }
        MailCommand::Recv { me } => {
            let messages = mailbox.recv(&me)?;
            print_messages(ctx, &messages)?;
        }
        MailCommand::Peek { me } => {
            let messages = mailbox.peek(&me)?;
            print_messages(ctx, &messages)?;
        }
        MailCommand::Purge => {
            let purged = mailbox.purge_expired()?;
            match ctx.format {
                OutputFormat::Text => println!("Purged {purged} expired message(s)"),
                OutputFormat::Json => print_json(&serde_json::json!({ "purged": purged }))?,
            }
        }
    }
    Ok(())
}

fn print_messages(ctx: &Ctx, messages: &[Message]) -> Result<()> {
    match ctx.format {
        OutputFormat::Json => print_json(messages)?,
        OutputFormat::Text => {
            if messages.is_empty() {
                println!("No messages");
            }
            let now = ctx.now_ms();
            for msg in messages {
                println!("{}", format_message(msg, now));
            }
        }
    }
    Ok(())
}

pub(crate) fn format_message(msg: &Message, now_ms: u64) -> String {
    format!(
        "{} {} {}",
        color::header(&msg.from),
        color::muted(&format_time_ago(msg.sent_at_ms, now_ms)),
        msg.body
    )
}

#[cfg(test)]
#[path = "mail_tests.rs"]
mod tests;
