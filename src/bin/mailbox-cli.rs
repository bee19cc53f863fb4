#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::future_not_send)]

//! CLI for browsing an IMAP mailbox: folder tree, status and paged
//! message listings

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use imap_mailbox::{
    FolderStatus, ImapConfig, ImapTransport, Level, Mailbox, MailboxOptions, MessageEntry,
    MessageRecord, PageSize, SortProgram, SpecialUse,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mailbox-cli")]
#[command(about = "Browse IMAP folders and paged message listings")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show the folder tree
    Folders {
        /// Use LIST instead of LSUB
        #[arg(long)]
        all: bool,

        /// Include the status of every folder
        #[arg(long)]
        status: bool,
    },

    /// Show the status of one folder
    Status {
        /// Folder path, as the server names it
        path: String,
    },

    /// List one page of messages
    List {
        /// Folder path
        #[arg(default_value = "INBOX")]
        path: String,

        /// Page number (1-based, clamped)
        #[arg(long, default_value = "1")]
        page: usize,

        /// Messages per page (0 for no paging)
        #[arg(long)]
        page_size: Option<usize>,

        /// Sort program, e.g. "-DATE FROM"
        #[arg(long, value_parser = parse_sort)]
        sort: Option<SortProgram>,

        /// IMAP search expression
        #[arg(long)]
        search: Option<String>,

        /// unsorted, sorted or threaded
        #[arg(long, value_parser = parse_display)]
        display: Option<Level>,
    },

    /// Show the headers of one message
    Show {
        /// Folder path
        path: String,

        /// Message UID
        uid: u32,
    },
}

fn parse_sort(s: &str) -> Result<SortProgram, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_display(s: &str) -> Result<Level, String> {
    s.parse().map_err(|e| format!("{e}"))
}

#[derive(Serialize)]
struct FolderSummary {
    path: String,
    name: String,
    level: usize,
    subscribed: bool,
    no_select: bool,
    special: bool,
    special_use: Option<SpecialUse>,
    status: Option<FolderStatus>,
}

#[derive(Serialize)]
struct PageOutput<'a> {
    page: usize,
    max_page: usize,
    total: usize,
    display: Level,
    messages: Vec<PageMessage<'a>>,
}

#[derive(Serialize)]
struct PageMessage<'a> {
    uid: u32,
    level: usize,
    parent: Option<u32>,
    record: Option<&'a MessageRecord>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ImapConfig::from_env()?;
    let options = MailboxOptions::from_env()?;

    let transport = ImapTransport::connect(&config).await?;
    let mut mailbox = Mailbox::open(transport, options).await?;

    let outcome = match &args.command {
        Command::Folders { all, status } => cmd_folders(&mut mailbox, &args, *all, *status).await,
        Command::Status { path } => cmd_status(&mut mailbox, &args, path).await,
        Command::List {
            path,
            page,
            page_size,
            sort,
            search,
            display,
        } => {
            cmd_list(
                &mut mailbox,
                &args,
                path,
                *page,
                *page_size,
                sort.clone(),
                search.clone(),
                *display,
            )
            .await
        }
        Command::Show { path, uid } => cmd_show(&mut mailbox, &args, path, *uid).await,
    };

    mailbox.into_transport().logout().await.ok();
    outcome
}

async fn cmd_folders(
    mailbox: &mut Mailbox<ImapTransport>,
    args: &Args,
    all: bool,
    with_status: bool,
) -> anyhow::Result<()> {
    mailbox.refresh_folders(!all).await?;
    if with_status {
        mailbox.refresh_all_status().await?;
    }

    let folders: Vec<FolderSummary> = mailbox
        .all_folders()
        .map(|f| FolderSummary {
            path: f.path().to_string(),
            name: f.display_name(),
            level: f.level(),
            subscribed: f.subscribed,
            no_select: f.no_select,
            special: f.special,
            special_use: f.special_use,
            status: f.cached_status().cloned(),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&folders)?);
        return Ok(());
    }

    for folder in &folders {
        let marker = if folder.no_select { " (no select)" } else { "" };
        let counts = folder.status.as_ref().map_or_else(String::new, |s| {
            format!(
                "  [{} messages, {} unseen]",
                s.messages.unwrap_or(0),
                s.unseen.unwrap_or(0)
            )
        });
        println!(
            "{}{}{marker}{counts}",
            "  ".repeat(folder.level),
            folder.name
        );
    }
    Ok(())
}

async fn cmd_status(
    mailbox: &mut Mailbox<ImapTransport>,
    args: &Args,
    path: &str,
) -> anyhow::Result<()> {
    let status = mailbox.refresh_status(path).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        let show = |v: Option<u32>| v.map_or_else(|| "-".to_string(), |n| n.to_string());
        println!("Folder:      {path}");
        println!("Messages:    {}", show(status.messages));
        println!("Recent:      {}", show(status.recent));
        println!("Unseen:      {}", show(status.unseen));
        println!("UIDNEXT:     {}", show(status.uid_next));
        println!("UIDVALIDITY: {}", show(status.uid_validity));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_list(
    mailbox: &mut Mailbox<ImapTransport>,
    args: &Args,
    path: &str,
    page: usize,
    page_size: Option<usize>,
    sort: Option<SortProgram>,
    search: Option<String>,
    display: Option<Level>,
) -> anyhow::Result<()> {
    mailbox.select(path).await?;

    let list = mailbox.messages()?;
    if let Some(size) = page_size {
        list.set_page_size(PageSize::new(size));
    }
    if let Some(program) = sort {
        list.set_sort_program(program);
    }
    if let Some(expr) = search {
        list.set_search(expr);
    }
    if let Some(mode) = display {
        list.set_display(mode);
    }
    let display = list.display();

    // The count is needed before the page can be clamped.
    let total = mailbox.number_messages().await?;
    let list = mailbox.messages()?;
    let page = list.set_page(page);
    let max_page = list.paginator().max_page();

    let entries = mailbox.page().await?;

    if args.json {
        let output = PageOutput {
            page,
            max_page,
            total,
            display,
            messages: entries
                .iter()
                .map(|e| PageMessage {
                    uid: e.id,
                    level: e.level,
                    parent: e.parent,
                    record: e.record.as_ref(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_page(&entries, display == Level::Threaded);
        println!("\nPage {page} of {max_page}, {total} message(s)");
    }
    Ok(())
}

async fn cmd_show(
    mailbox: &mut Mailbox<ImapTransport>,
    args: &Args,
    path: &str,
    uid: u32,
) -> anyhow::Result<()> {
    mailbox.select(path).await?;
    let record = mailbox.message(uid).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record);
    }
    Ok(())
}

fn print_page(entries: &[&MessageEntry], threaded: bool) {
    if entries.is_empty() {
        println!("No messages found.");
        return;
    }

    println!("{:<8} {:<3} {:<20} {:<30} Subject", "UID", "", "Date", "From");
    println!("{}", "-".repeat(100));

    for entry in entries {
        let Some(record) = &entry.record else {
            println!("{:<8} (not available)", entry.id);
            continue;
        };
        let indent = if threaded {
            "  ".repeat(entry.level)
        } else {
            String::new()
        };
        println!(
            "{:<8} {:<3} {:<20} {:<30} {indent}{}",
            record.uid,
            flag_marks(record),
            record
                .sent_date()
                .map_or_else(String::new, |d| d.format("%Y-%m-%d %H:%M").to_string()),
            truncate(
                &record
                    .envelope
                    .from
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                28
            ),
            truncate(record.envelope.subject.as_deref().unwrap_or_default(), 60),
        );
    }
}

fn flag_marks(record: &MessageRecord) -> String {
    let mut marks = String::new();
    marks.push(if record.is_seen() { ' ' } else { 'N' });
    marks.push(if record.is_answered() { 'A' } else { ' ' });
    marks.push(if record.is_flagged() { '!' } else { ' ' });
    marks
}

fn print_record(record: &MessageRecord) {
    let join = |list: &[imap_mailbox::Address]| {
        list.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let envelope = &record.envelope;

    println!("UID:     {}", record.uid);
    println!("Date:    {}", envelope.date.as_deref().unwrap_or("-"));
    println!("From:    {}", join(&envelope.from));
    println!("To:      {}", join(&envelope.to));
    if !envelope.cc.is_empty() {
        println!("CC:      {}", join(&envelope.cc));
    }
    println!("Subject: {}", envelope.subject.as_deref().unwrap_or(""));
    println!("Msg-ID:  {}", envelope.message_id.as_deref().unwrap_or("-"));
    if let Some(parent) = &envelope.in_reply_to {
        println!("Reply-To-ID: {parent}");
    }
    println!("Size:    {}", record.size);
    println!(
        "Flags:   {}",
        record
            .flags
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
