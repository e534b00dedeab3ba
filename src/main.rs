//! CLI entry point for `mboxscan`.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mboxscan::config::{self, Config};
use mboxscan::mailbox::{self, Mailbox};
use mboxscan::parser::header::parse_date;
use mboxscan::{Mail, MboxOptions, ParseOverrides, ParsedMessage, Separator};

#[derive(Parser)]
#[command(
    name = "mboxscan",
    version,
    about = "Count, list, filter and split MBOX mailboxes without loading them into memory"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Message separator regex, replacing the standard `From ` line
    #[arg(long, global = true, value_name = "REGEX")]
    separator: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Count the messages in a mailbox
    Count { path: PathBuf },
    /// Print one raw message (zero-based index)
    Show { path: PathBuf, index: usize },
    /// List messages, optionally bounded by date or position
    List {
        path: PathBuf,
        /// Start at the first message dated on or after this date
        #[arg(long, value_name = "DATE", value_parser = parse_since_arg)]
        since: Option<DateTime<Utc>>,
        /// Stop at the first message dated after this date
        #[arg(long, value_name = "DATE", value_parser = parse_until_arg)]
        until: Option<DateTime<Utc>>,
        /// Zero-based index of the first message to list
        #[arg(long, conflicts_with_all = ["since", "until"])]
        start: Option<usize>,
        /// Maximum number of messages to list
        #[arg(long, conflicts_with_all = ["since", "until"])]
        limit: Option<usize>,
        /// Skip message bodies while parsing
        #[arg(long)]
        headers_only: bool,
        #[arg(long)]
        json: bool,
    },
    /// Report whether any message is unread (exit status 0 if so, 1 if not)
    Unread { path: PathBuf },
    /// Write every message to its own .eml file
    Split {
        path: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the effective configuration
    Config,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let mut options = config.scan.to_options()?;
    if let Some(ref pattern) = cli.separator {
        options.separator = Separator::from_pattern(pattern)?;
    }
    let capacity = config.scan.read_buffer_size;

    match cli.command {
        Commands::Count { path } => cmd_count(&path, options, capacity),
        Commands::Show { path, index } => cmd_show(&path, index, options, capacity),
        Commands::List {
            path,
            since,
            until,
            start,
            limit,
            headers_only,
            json,
        } => {
            let query = ListQuery {
                since,
                until,
                start,
                limit,
                headers_only,
            };
            cmd_list(&path, &query, json, options, capacity)
        }
        Commands::Unread { path } => cmd_unread(&path, options, capacity),
        Commands::Split { path, output } => cmd_split(&path, &output, options, capacity),
        Commands::Config => cmd_config(&config),
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

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, config::LOG_FILE_NAME);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// `--since` value: a bare date means the start of that day (UTC).
fn parse_since_arg(s: &str) -> Result<DateTime<Utc>, String> {
    parse_date_arg(s, false)
}

/// `--until` value: a bare date means the end of that day (UTC).
fn parse_until_arg(s: &str) -> Result<DateTime<Utc>, String> {
    parse_date_arg(s, true)
}

fn parse_date_arg(s: &str, end_of_day: bool) -> Result<DateTime<Utc>, String> {
    if let Ok(day) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
        let time = if end_of_day {
            day.and_hms_opt(23, 59, 59)
        } else {
            day.and_hms_opt(0, 0, 0)
        };
        if let Some(t) = time {
            return Ok(t.and_utc());
        }
    }
    parse_date(s).ok_or_else(|| format!("unrecognized date '{s}' (try YYYY-MM-DD or RFC 3339)"))
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Warn when a scan stopped on a read error rather than at end of file.
fn report_read_failure(mbox: &Mailbox<File>) {
    if let Some(e) = mbox.read_failure() {
        eprintln!("  warning: scan stopped early on a read error: {e}");
    }
}

/// Count messages and print a short summary.
fn cmd_count(path: &Path, options: MboxOptions, capacity: usize) -> anyhow::Result<ExitCode> {
    use humansize::{format_size, BINARY};

    let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let pb = spinner("Counting messages");
    let start = Instant::now();

    let count = mailbox::open_with_capacity(path, options, capacity, |mbox| {
        let count = mbox.length()?;
        report_read_failure(mbox);
        Ok::<_, anyhow::Error>(count)
    })?;

    pb.finish_and_clear();
    let elapsed = start.elapsed();

    println!();
    println!("  {:<20} {}", "File", path.display());
    println!("  {:<20} {}", "File size", format_size(file_size, BINARY));
    println!("  {:<20} {}", "Messages", count);
    println!("  {:<20} {:.2?}", "Scan time", elapsed);
    println!();

    Ok(ExitCode::SUCCESS)
}

/// Print one raw message to stdout.
fn cmd_show(
    path: &Path,
    index: usize,
    options: MboxOptions,
    capacity: usize,
) -> anyhow::Result<ExitCode> {
    let block = mailbox::open_with_capacity(path, options, capacity, |mbox| {
        Ok::<_, anyhow::Error>(mbox.index_of(index)?)
    })?;

    let mut out = std::io::stdout().lock();
    out.write_all(block.as_bytes())?;
    out.flush()?;
    Ok(ExitCode::SUCCESS)
}

struct ListQuery {
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    start: Option<usize>,
    limit: Option<usize>,
    headers_only: bool,
}

/// List messages as a table or as JSON.
fn cmd_list(
    path: &Path,
    query: &ListQuery,
    json: bool,
    options: MboxOptions,
    capacity: usize,
) -> anyhow::Result<ExitCode> {
    let overrides = if query.headers_only {
        ParseOverrides::headers_only()
    } else {
        ParseOverrides::NONE
    };

    mailbox::open_with_capacity(path, options, capacity, |mbox| {
        match (query.since, query.until) {
            (Some(after), Some(before)) => {
                print_mails(mbox.between(after, before, &overrides)?, json)?
            }
            (Some(after), None) => print_mails(mbox.since(after, &overrides)?, json)?,
            (None, Some(before)) => print_mails(mbox.until(before, &overrides)?, json)?,
            (None, None) if query.start.is_some() || query.limit.is_some() => {
                let start = query.start.unwrap_or(0);
                let limit = query.limit.unwrap_or(usize::MAX);
                print_mails(mbox.first_n(start, limit, &overrides)?, json)?
            }
            (None, None) => print_mails(mbox.each(&overrides)?, json)?,
        }
        report_read_failure(mbox);
        Ok::<_, anyhow::Error>(())
    })?;

    Ok(ExitCode::SUCCESS)
}

/// Print parsed messages, one line each, or as one JSON document.
fn print_mails(
    mails: impl Iterator<Item = mboxscan::Result<Mail>>,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        let items = mails
            .map(|m| m.map(|m| mail_json(&m)))
            .collect::<mboxscan::Result<Vec<_>>>()?;
        let output = serde_json::json!({
            "message_count": items.len(),
            "messages": items,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "  {:>10} {:<17} {:<25} {:<40}",
        "Offset", "Date", "From", "Subject"
    );
    println!("  {}", "-".repeat(95));

    let mut out = std::io::stdout().lock();
    for mail in mails {
        let mail = mail?;
        let date = mail
            .date()
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let from_trunc: String = mail.from().unwrap_or_default().chars().take(24).collect();
        let subj_trunc: String = mail
            .subject()
            .unwrap_or_default()
            .chars()
            .take(39)
            .collect();
        let marker = if mail.is_unread() { "*" } else { " " };
        writeln!(
            out,
            "{marker} {:>10} {:<17} {:<25} {:<40}",
            mail.offset(),
            date,
            from_trunc,
            subj_trunc
        )?;
    }
    Ok(())
}

fn mail_json(mail: &Mail) -> serde_json::Value {
    serde_json::json!({
        "offset": mail.offset(),
        "length": mail.length(),
        "envelope": mail.envelope(),
        "date": mail.date().map(|d| d.to_rfc3339()),
        "from": mail.from(),
        "subject": mail.subject(),
        "message_id": mail.message_id(),
        "unread": mail.is_unread(),
        "status": mail.status(),
    })
}

/// Report whether the mailbox has unread mail.
fn cmd_unread(path: &Path, options: MboxOptions, capacity: usize) -> anyhow::Result<ExitCode> {
    let unread = mailbox::open_with_capacity(path, options, capacity, |mbox| {
        Ok::<_, anyhow::Error>(mbox.has_unread()?)
    })?;

    if unread {
        println!("yes");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("no");
        Ok(ExitCode::from(1))
    }
}

/// Write every raw message to `output/NNNNNN.eml`.
fn cmd_split(
    path: &Path,
    output: &Path,
    options: MboxOptions,
    capacity: usize,
) -> anyhow::Result<ExitCode> {
    use humansize::{format_size, BINARY};

    std::fs::create_dir_all(output)?;
    let pb = spinner("Splitting");

    let (count, bytes) = mailbox::open_with_capacity(path, options, capacity, |mbox| {
        let mut count = 0usize;
        let mut bytes = 0u64;
        for block in mbox.each_raw_message(&ParseOverrides::NONE)? {
            let file = output.join(format!("{count:06}.eml"));
            std::fs::write(&file, block.as_bytes())?;
            count += 1;
            bytes += block.len() as u64;
            pb.set_message(format!("Splitting: {count} message(s)"));
        }
        report_read_failure(mbox);
        Ok::<_, anyhow::Error>((count, bytes))
    })?;

    pb.finish_and_clear();
    println!(
        "  Wrote {} message(s), {}, to {}",
        count,
        format_size(bytes, BINARY),
        output.display()
    );
    Ok(ExitCode::SUCCESS)
}

/// Print the effective configuration as TOML.
fn cmd_config(config: &Config) -> anyhow::Result<ExitCode> {
    if let Some(path) = config::config_file_path() {
        println!("# {}", path.display());
    }
    print!("{}", toml::to_string_pretty(config)?);
    Ok(ExitCode::SUCCESS)
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<ExitCode> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mboxscan", &mut std::io::stdout());
    Ok(ExitCode::SUCCESS)
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<ExitCode> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::stdout().write_all(&buf)?;
    Ok(ExitCode::SUCCESS)
}
