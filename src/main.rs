//! CLI entry point for `mimetree`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use unicode_width::UnicodeWidthChar;

use mimetree::config::Config;
use mimetree::parser::encoded_word;
use mimetree::parser::mime::MimeEntity;
use mimetree::source::{self, SourceFormat};

#[derive(Parser)]
#[command(
    name = "mimetree",
    version,
    about = "Decode RFC 822 / MIME messages and mailboxes into entity trees"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Container format of FILE (default: by extension, else mbox)
    #[arg(long, global = true, value_enum)]
    format: Option<SourceFormat>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List the messages of a file
    List {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show the headers and text of one message
    Show {
        path: PathBuf,
        /// Message number as printed by `list` (1-based)
        index: usize,
    },
    /// Print the MIME part tree of one message
    Tree {
        path: PathBuf,
        /// Message number as printed by `list` (1-based)
        #[arg(default_value_t = 1)]
        index: usize,
        #[arg(long)]
        json: bool,
    },
    /// Extract all attachments
    Attachments {
        path: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = mimetree::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let format = cli.format;
    match cli.command {
        Commands::List { path, json } => cmd_list(&path, format, &config, json),
        Commands::Show { path, index } => cmd_show(&path, format, &config, index),
        Commands::Tree { path, index, json } => cmd_tree(&path, format, &config, index, json),
        Commands::Attachments { path, output } => {
            let output = output
                .or_else(|| config.export.default_output_dir.clone())
                .ok_or_else(|| anyhow::anyhow!("No output directory: pass --output"))?;
            cmd_attachments(&path, format, &config, &output)
        }
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = mimetree::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mimetree.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mimetree", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Read and decode every message of `path`.
fn load_entities(
    path: &Path,
    format: Option<SourceFormat>,
    config: &Config,
) -> anyhow::Result<Vec<MimeEntity>> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let format = format
        .or(config.source.default_format)
        .unwrap_or_else(|| source::detect(path));
    let messages = source::open_messages(path, format, &config.source)?;

    let pb = progress_bar(messages.len(), "Decoding");
    let options = config.decode.options();
    let entities = messages
        .into_iter()
        .map(|raw| {
            pb.inc(1);
            MimeEntity::parse_with(raw, &options)
        })
        .collect();
    pb.finish_and_clear();
    Ok(entities)
}

/// Pick message `index` (1-based) out of `path`.
fn load_one(
    path: &Path,
    format: Option<SourceFormat>,
    config: &Config,
    index: usize,
) -> anyhow::Result<MimeEntity> {
    let mut entities = load_entities(path, format, config)?;
    let count = entities.len();
    if index == 0 || index > count {
        anyhow::bail!("Message {index} out of range (file has {count} message(s))");
    }
    Ok(entities.swap_remove(index - 1))
}

fn progress_bar(len: usize, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} {label} [{{bar:40.cyan/blue}}] {{pos}}/{{len}}"
        ))
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// List messages as a table or JSON.
fn cmd_list(
    path: &Path,
    format: Option<SourceFormat>,
    config: &Config,
    json: bool,
) -> anyhow::Result<()> {
    let entities = load_entities(path, format, config)?;
    if json {
        print_list_json(&entities)
    } else {
        print_list_table(&entities);
        Ok(())
    }
}

/// Show headers and the text part of one message.
fn cmd_show(
    path: &Path,
    format: Option<SourceFormat>,
    config: &Config,
    index: usize,
) -> anyhow::Result<()> {
    let entity = load_one(path, format, config, index)?;

    println!("{:<9} {}", "From:", display_header(entity.from()));
    println!("{:<9} {}", "To:", display_header(entity.to()));
    if !entity.cc().is_empty() {
        println!("{:<9} {}", "Cc:", display_header(entity.cc()));
    }
    if let Some(date) = entity.date() {
        println!("{:<9} {}", "Date:", date.format("%Y-%m-%d %H:%M:%S %Z"));
    }
    println!("{:<9} {}", "Subject:", display_header(entity.subject()));
    println!();

    match entity.text_part() {
        Some(part) => match part.readable_body() {
            Ok(text) => print!("{text}"),
            Err(e) => {
                tracing::warn!(error = %e, "Could not decode message text");
                println!("[undecodable text part: {e}]");
            }
        },
        None => println!("[no text part]"),
    }

    let attachments: Vec<&MimeEntity> = entity.walk().filter(|p| p.is_attachment()).collect();
    if !attachments.is_empty() {
        println!();
        println!("  {} attachment(s):", attachments.len());
        for part in attachments {
            let name = part.filename().unwrap_or_else(|_| "?".to_string());
            let size = part.raw_contents().map(|b| b.len()).unwrap_or(0);
            println!(
                "    {}  {} ({})",
                name,
                part.content_type(),
                format_size(size, BINARY)
            );
        }
    }
    Ok(())
}

/// Print the part tree of one message.
fn cmd_tree(
    path: &Path,
    format: Option<SourceFormat>,
    config: &Config,
    index: usize,
    json: bool,
) -> anyhow::Result<()> {
    let entity = load_one(path, format, config, index)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entity_json(&entity))?);
        return Ok(());
    }

    for part in entity.walk() {
        let indent = "  ".repeat(part.depth());
        let content_type = if part.content_type().is_empty() {
            "(no content type)".to_string()
        } else {
            part.to_string()
        };
        let mut line = format!("{indent}{content_type}");
        if let Ok(name) = part.filename() {
            if !name.is_empty() {
                line.push_str(&format!("  \"{name}\""));
            }
        }
        if part.parts().is_empty() {
            line.push_str(&format!("  {}", format_size(part.contents().len(), BINARY)));
        }
        println!("{line}");
    }
    Ok(())
}

/// Extract all attachments from a file.
fn cmd_attachments(
    path: &Path,
    format: Option<SourceFormat>,
    config: &Config,
    output: &Path,
) -> anyhow::Result<()> {
    let entities = load_entities(path, format, config)?;
    let with_att = entities
        .iter()
        .filter(|e| e.walk().any(|p| p.is_attachment()))
        .count();

    if with_att == 0 {
        println!("  No messages with attachments found.");
        return Ok(());
    }

    println!("  Extracting attachments from {with_att} message(s)");

    let pb = progress_bar(entities.len(), "Extracting");
    let paths = mimetree::export::attachment::export_bulk_attachments(
        &entities,
        output,
        &|current, _total| {
            pb.set_position(current as u64);
        },
    )?;
    pb.finish_and_clear();

    println!(
        "  Extracted {} attachment(s) to {}",
        paths.len(),
        output.display()
    );
    Ok(())
}

/// Decode encoded-words and unfold a header value for display.
fn display_header(value: &str) -> String {
    let decoded = encoded_word::decode(value).unwrap_or_else(|_| value.to_string());
    decoded.replace("\r\n", "").replace('\n', "")
}

/// Truncate `s` to `width` terminal columns and pad it to exactly that width.
fn fit_width(s: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push_str(&" ".repeat(width - used));
    out
}

/// Print the message list as a human-readable table.
fn print_list_table(entities: &[MimeEntity]) {
    println!();
    println!("  {} message(s)", entities.len());
    println!();

    if entities.is_empty() {
        return;
    }

    println!(
        "  {:<4} {:<17} {:<25} {:<40} {:>5} {:>9}",
        "#", "Date", "From", "Subject", "Parts", "Size"
    );
    println!("  {}", "-".repeat(105));

    for (i, entity) in entities.iter().enumerate() {
        let date = entity
            .date()
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "  {:<4} {:<17} {} {} {:>5} {:>9}",
            i + 1,
            date,
            fit_width(&display_header(entity.from()), 25),
            fit_width(&display_header(entity.subject()), 40),
            entity.walk().count(),
            format_size(entity.raw().raw_text.len(), BINARY)
        );
    }
    println!();
}

/// Print the message list as JSON.
fn print_list_json(entities: &[MimeEntity]) -> anyhow::Result<()> {
    let items: Vec<serde_json::Value> = entities
        .iter()
        .enumerate()
        .map(|(i, e)| {
            serde_json::json!({
                "index": i + 1,
                "uuid": e.raw().uuid,
                "date": e.date().map(|d| d.to_rfc3339()),
                "from": display_header(e.from()),
                "to": display_header(e.to()),
                "subject": display_header(e.subject()),
                "message_id": e.message_id(),
                "content_type": e.content_type(),
                "size": e.raw().raw_text.len(),
                "attachments": e.walk().filter(|p| p.is_attachment()).count(),
            })
        })
        .collect();

    let output = serde_json::json!({
        "message_count": entities.len(),
        "messages": items,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// JSON view of a part and its children.
fn entity_json(entity: &MimeEntity) -> serde_json::Value {
    serde_json::json!({
        "content_type": entity.content_type(),
        "charset": entity.charset(),
        "content_transfer_encoding": entity.content_transfer_encoding(),
        "content_disposition": entity.content_disposition(),
        "filename": entity.filename().ok().filter(|n| !n.is_empty()),
        "headers": entity.headers(),
        "size": entity.contents().len(),
        "parts": entity.parts().iter().map(entity_json).collect::<Vec<_>>(),
    })
}
