use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{CommandFactory, Parser as ClapParser};
use tracing_subscriber::{EnvFilter, prelude::*};

use spanwire::{
    EventRecorder, MessageCollector, MessageMode, ParseError, ParseStatus, Parser, ParserConfig,
    format_debug, format_events, format_headers_only, format_json,
};

/// spanwire CLI: incremental HTTP/1.x parser.
///
/// Reads raw HTTP messages from a file, --raw string, or stdin and outputs
/// a structured representation in the chosen format.
///
/// Escape sequences (\r, \n, \t, \\) in the --raw value are interpreted so
/// you can pass a full HTTP message as a single shell argument.
#[derive(ClapParser)]
#[command(name = "spanwire-cli", version, about, long_about = None)]
struct Cli {
    /// Path to a file containing raw HTTP messages.
    /// Reads from stdin when neither FILE nor --raw is given.
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Raw HTTP string (escape sequences \r \n \t \\ are expanded).
    #[arg(long)]
    raw: Option<String>,

    /// Which messages to expect.
    #[arg(short, long, default_value = "both", value_enum)]
    mode: MessageMode,

    /// Output format.
    #[arg(short, long, default_value = "json", value_enum)]
    format: OutputFormat,

    /// Pretty-print JSON output (ignored for other formats).
    #[arg(short, long)]
    pretty: bool,

    /// Feed the input to the parser in pieces of this many bytes
    /// (0 feeds it whole).
    #[arg(long, default_value = "0")]
    split: usize,

    /// JSON file with parser settings; flags below override it.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Accept a bare LF as a line ending.
    #[arg(long)]
    lenient_line_endings: bool,

    /// Accept obsolete header line folding.
    #[arg(long)]
    allow_obs_fold: bool,

    /// Accept Content-Length alongside Transfer-Encoding.
    #[arg(long)]
    lenient_chunked_length: bool,

    /// Accept any HTTP/x.y version.
    #[arg(long)]
    lenient_version: bool,

    /// Keep parsing after a message that closes the connection.
    #[arg(long)]
    lenient_keep_alive: bool,

    /// Maximum size of a header section in bytes (0 disables the limit).
    #[arg(long)]
    max_head_size: Option<usize>,

    /// Maximum number of header fields (0 disables the limit).
    #[arg(long)]
    max_headers: Option<usize>,

    /// Level of logging messages written to stderr.
    #[arg(long, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    log_level: String,

    /// Logging filter directives (overrides --log-level).
    #[arg(long)]
    log_filter: Option<String>,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable debug output
    Debug,
    /// Start line + headers only
    Headers,
    /// Raw callback event trace
    Events,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = set_up_logging(&cli) {
        eprintln!("Error: invalid log filter: {e}");
        process::exit(1);
    }

    // When no input source is provided and stdin is a terminal (not piped),
    // show help instead of blocking.
    if cli.file.is_none() && cli.raw.is_none() && std::io::stdin().is_terminal() {
        Cli::command().print_help().ok();
        println!();
        process::exit(0);
    }

    let config = match build_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading config: {e}");
            process::exit(1);
        }
    };

    let data = match read_input(&cli) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error reading input: {e}");
            process::exit(1);
        }
    };

    if data.is_empty() {
        eprintln!("Error: empty input");
        process::exit(1);
    }

    let output = match render(&cli, config, &data) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Parse error: {e}");
            process::exit(2);
        }
    };

    print!("{output}");
}

fn set_up_logging(cli: &Cli) -> Result<(), tracing_subscriber::filter::ParseError> {
    let filter = match &cli.log_filter {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::try_new(format!(
            "spanwire={level},spanwire_cli={level}",
            level = cli.log_level
        ))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .init();
    Ok(())
}

fn load_config(path: &Path) -> Result<ParserConfig, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn build_config(cli: &Cli) -> Result<ParserConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ParserConfig::default(),
    };
    config.lenient_line_endings |= cli.lenient_line_endings;
    config.allow_obs_fold |= cli.allow_obs_fold;
    config.lenient_chunked_length |= cli.lenient_chunked_length;
    config.lenient_version |= cli.lenient_version;
    config.lenient_keep_alive |= cli.lenient_keep_alive;
    if let Some(n) = cli.max_head_size {
        config.max_head_size = n;
    }
    if let Some(n) = cli.max_headers {
        config.max_headers_count = n;
    }
    tracing::debug!(?config, "parser configuration");
    Ok(config)
}

fn render(cli: &Cli, config: ParserConfig, data: &[u8]) -> Result<String, ParseError> {
    if let OutputFormat::Events = cli.format {
        let mut parser =
            Parser::with_config(cli.mode, config, &EventRecorder::CALLBACKS, EventRecorder::new());
        drive(&mut parser, data, cli.split)?;
        return Ok(format_events(parser.data.events()));
    }

    let mut parser = Parser::with_config(
        cli.mode,
        config,
        &MessageCollector::CALLBACKS,
        MessageCollector::new(),
    );
    drive(&mut parser, data, cli.split)?;
    let messages = parser.into_data().into_messages();
    tracing::info!(count = messages.len(), "parsed messages");

    let output = match cli.format {
        OutputFormat::Json if messages.len() == 1 => format_json(&messages[0], cli.pretty) + "\n",
        OutputFormat::Json => format_json(&messages, cli.pretty) + "\n",
        OutputFormat::Debug => messages.iter().map(format_debug).collect(),
        OutputFormat::Headers => messages
            .iter()
            .map(format_headers_only)
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Events => String::new(),
    };
    Ok(output)
}

/// Feed `data` to the parser in `split`-byte pieces, then signal end of input.
fn drive<T>(parser: &mut Parser<'_, T>, data: &[u8], split: usize) -> Result<(), ParseError> {
    let piece = if split == 0 { data.len().max(1) } else { split };
    let mut offset = 0;

    for chunk in data.chunks(piece) {
        let mut rest = chunk;
        loop {
            match parser.execute(rest)? {
                ParseStatus::Consumed(_) => break,
                ParseStatus::Paused(n) => {
                    parser.resume();
                    rest = &rest[n..];
                }
                ParseStatus::Upgraded(n) => {
                    let remaining = data.len() - (offset + (chunk.len() - rest.len()) + n);
                    tracing::info!(
                        upgrade = ?parser.upgrade(),
                        remaining,
                        "connection upgraded; remaining bytes left unparsed"
                    );
                    return Ok(());
                }
            }
        }
        offset += chunk.len();
    }
    parser.finish()
}

/// Read raw HTTP bytes from --raw, a file, or stdin.
fn read_input(cli: &Cli) -> Result<Vec<u8>, std::io::Error> {
    if let Some(raw) = &cli.raw {
        return Ok(unescape(raw).into_bytes());
    }
    match &cli.file {
        Some(path) => std::fs::read(path),
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Expand C-style escape sequences (`\r`, `\n`, `\t`, `\\`) in a string.
///
/// Any other `\X` sequence is kept as-is (both the backslash and `X`).
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_expands_known_sequences() {
        assert_eq!(unescape(r"GET / HTTP/1.1\r\n\r\n"), "GET / HTTP/1.1\r\n\r\n");
        assert_eq!(unescape(r"a\qb\"), "a\\qb\\");
    }

    #[test]
    fn drive_handles_tiny_pieces() {
        let mut parser = Parser::new(
            MessageMode::Both,
            &MessageCollector::CALLBACKS,
            MessageCollector::new(),
        );
        drive(&mut parser, b"HTTP/1.1 204 No Content\r\n\r\n", 1).unwrap();
        assert_eq!(parser.data.len(), 1);
    }

    #[test]
    fn flags_override_config_defaults() {
        let cli = Cli::parse_from(["spanwire-cli", "--allow-obs-fold", "--max-headers", "4"]);
        let config = build_config(&cli).unwrap();
        assert!(config.allow_obs_fold);
        assert_eq!(config.max_headers_count, 4);
        assert_eq!(config.max_head_size, ParserConfig::default().max_head_size);
    }
}
