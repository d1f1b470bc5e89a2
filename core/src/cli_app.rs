/// Interactive terminal client over the Messenger
use crate::messenger::Messenger;
use crate::types::{DeliveryStatus, Message};
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(messenger: Messenger) -> anyhow::Result<()> {
    let summary_loop = messenger.start();

    println!(
        "{}",
        format!("CoHub messenger — signed in as {}", messenger.viewer_id()).bright_cyan()
    );
    print_usage();

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(raw)) => {
                        if !handle_command(&messenger, raw.trim()).await {
                            break;
                        }
                    }
                    Ok(None) => break, // stdin closed
                    Err(e) => {
                        eprintln!("{} stdin error: {}", "✗".red().bold(), e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    messenger.shutdown().await;
    summary_loop.abort();
    Ok(())
}

/// Returns false when the user asked to quit
async fn handle_command(messenger: &Messenger, input: &str) -> bool {
    let (command, rest) = match input.split_once(' ') {
        Some((c, r)) => (c, r.trim()),
        None => (input, ""),
    };

    match command {
        "" => {}
        "help" => print_usage(),
        "contacts" => match messenger.contacts().await {
            Ok(contacts) => {
                if contacts.is_empty() {
                    println!("{}", "No contacts yet".yellow());
                }
                for c in contacts {
                    let name = c.name.as_deref().unwrap_or("User");
                    println!("  {} {}", c.user_id.cyan(), name);
                }
            }
            Err(e) => eprintln!("{} {}", "✗".red().bold(), e),
        },
        "groups" => match messenger.groups().await {
            Ok(groups) => {
                if groups.is_empty() {
                    println!("{}", "No groups yet".yellow());
                }
                for g in groups {
                    let mode = if g.admin_mode { " [admin-only]".red().to_string() } else { String::new() };
                    println!(
                        "  {} {} ({} members){}",
                        g.id.cyan(),
                        g.name,
                        g.members.len(),
                        mode
                    );
                }
            }
            Err(e) => eprintln!("{} {}", "✗".red().bold(), e),
        },
        "unread" => {
            let unread = messenger.unread_partners().await;
            if unread.is_empty() {
                println!("{}", "All caught up".green());
            }
            for partner in unread {
                println!("  {} {}", "●".red(), partner.to_string().cyan());
            }
        }
        "open" => {
            if rest.is_empty() {
                eprintln!("{}", "Usage: open <user_id>".yellow());
            } else {
                match messenger.open_direct(rest).await {
                    Ok(()) => show_transcript(messenger).await,
                    Err(e) => eprintln!("{} {}", "✗".red().bold(), e),
                }
            }
        }
        "group" => {
            if rest.is_empty() {
                eprintln!("{}", "Usage: group <group_id>".yellow());
            } else {
                match messenger.open_group(rest).await {
                    Ok(()) => show_transcript(messenger).await,
                    Err(e) => eprintln!("{} {}", "✗".red().bold(), e),
                }
            }
        }
        "send" => {
            if rest.is_empty() {
                eprintln!("{}", "Usage: send <message>".yellow());
            } else if let Err(e) = messenger.send_message(rest).await {
                eprintln!("{} {}", "✗".red().bold(), e);
            }
        }
        "image" => {
            if rest.is_empty() {
                eprintln!("{}", "Usage: image <path>".yellow());
            } else {
                match tokio::fs::read(rest).await {
                    Ok(bytes) => {
                        let mime = mime_from_path(rest);
                        if let Err(e) = messenger.send_image(&bytes, mime).await {
                            eprintln!("{} {}", "✗".red().bold(), e);
                        }
                    }
                    Err(e) => eprintln!("{} Cannot read {}: {}", "✗".red().bold(), rest, e),
                }
            }
        }
        "show" => show_transcript(messenger).await,
        "close" => {
            messenger.close_conversation().await;
            println!("{}", "Conversation closed".dimmed());
        }
        "quit" | "exit" => return false,
        other => {
            eprintln!("{} Unknown command: {}", "✗".red().bold(), other.red());
            print_usage();
        }
    }
    true
}

async fn show_transcript(messenger: &Messenger) {
    match messenger.active_transcript().await {
        Some((partner, messages)) => {
            println!("{}", format!("── {} ──", partner).bright_cyan());
            if messages.is_empty() {
                println!("{}", "  (no messages yet)".dimmed());
            }
            for m in &messages {
                print_message(messenger.viewer_id(), m);
            }
        }
        None => println!("{}", "No open conversation".yellow()),
    }
}

fn print_message(viewer_id: &str, m: &Message) {
    let sender = if m.sender == viewer_id {
        "You".green().bold()
    } else {
        m.sender.cyan()
    };
    let marker = match m.delivery {
        DeliveryStatus::Pending => "…".dimmed(),
        DeliveryStatus::Confirmed => "✓".green(),
        DeliveryStatus::Failed => "✗".red().bold(),
    };
    let body = if m.image_url.is_some() {
        format!("{} {}", m.content, "(image)".dimmed())
    } else {
        m.content.clone()
    };
    println!(
        "  {} {} {}: {}",
        m.timestamp.format("%H:%M:%S").to_string().dimmed(),
        marker,
        sender,
        body
    );
}

fn mime_from_path(path: &str) -> &'static str {
    match path.rsplit('.').next().map(|e| e.to_ascii_lowercase()) {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "webp" => "image/webp",
        _ => "image/png",
    }
}

fn print_usage() {
    println!("{}", "Commands:".bright_white().bold());
    println!("  {}              List friends", "contacts".cyan());
    println!("  {}                List groups", "groups".cyan());
    println!("  {}                Show conversations with unread messages", "unread".cyan());
    println!("  {} <user_id>      Open a direct conversation", "open".cyan());
    println!("  {} <group_id>    Open a group conversation", "group".cyan());
    println!("  {} <message>      Send to the open conversation", "send".cyan());
    println!("  {} <path>        Send an image file", "image".cyan());
    println!("  {}                  Print the open transcript", "show".cyan());
    println!("  {}                 Close the open conversation", "close".cyan());
    println!("  {}                  Exit", "quit".cyan());
}
