mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};

use highlighter::{ClientConfig, ConfigError, HighlightClient, Highlighter};

const SUBCOMMANDS: &[&str] = &["render", "test", "help"];

/// `render` options that consume the following argument.
const VALUE_OPTIONS: &[&str] = &["-c", "--config", "--endpoint", "--theme", "-o", "--output"];

const DEFAULT_CONFIG: &str = "batchlight.toml";

#[derive(Parser)]
#[command(
    name = "batchlight",
    version,
    about = "Render Markdown to HTML with service-highlighted code blocks"
)]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a Markdown file to HTML
    Render(RenderArgs),

    /// Run .test.md fixture files against a scripted service
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Markdown source file
    file: String,

    /// Client configuration (TOML). Defaults to ./batchlight.toml when present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Service base URL, overriding the configuration
    #[arg(long)]
    endpoint: Option<String>,

    /// Theme name, overriding the configuration
    #[arg(long)]
    theme: Option<String>,

    /// Write HTML here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List the fenced code blocks and exit (no request is made)
    #[arg(long)]
    list_blocks: bool,

    /// Print the request body that would be sent and exit
    #[arg(long)]
    request: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: String,

    /// Run only fixtures in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse_from(with_render_shorthand(std::env::args().collect()));

    match cli.command {
        Command::Render(render_args) => do_render(render_args, cli.no_color),
        Command::Test(test_args) => {
            let exit_code =
                test_runner::run_tests(Path::new(&test_args.path), cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

/// `batchlight [options] doc.md` is shorthand for
/// `batchlight render [options] doc.md`.
fn with_render_shorthand(mut args: Vec<String>) -> Vec<String> {
    let mut rest = args.iter().skip(1);
    let mut first_positional = None;
    while let Some(arg) = rest.next() {
        if VALUE_OPTIONS.contains(&arg.as_str()) {
            rest.next();
        } else if !arg.starts_with('-') {
            first_positional = Some(arg.as_str());
            break;
        }
    }

    let needs_render = first_positional.is_some_and(|first| !SUBCOMMANDS.contains(&first));
    if needs_render {
        args.insert(1, "render".to_string());
    }
    args
}

fn do_render(args: RenderArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file, e);
            process::exit(1);
        }
    };

    let mut config = match resolve_config(&args, color_choice) {
        Some(config) => config,
        None => process::exit(1),
    };
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(theme) = &args.theme {
        config.theme = Some(theme.clone());
    }
    let config = config.with_env_overrides();

    let highlighter = Highlighter::new(HighlightClient::new(config));

    if args.list_blocks {
        for block in highlighter.blocks(&source) {
            let language = if block.language.is_empty() {
                "(none)"
            } else {
                block.language.as_str()
            };
            let first_line = block.code.lines().next().unwrap_or("");
            println!("{}  {}  {}", block.id, language, first_line);
        }
        return;
    }

    if args.request {
        let blocks = highlighter.blocks(&source);
        if blocks.is_empty() {
            eprintln!("no fenced code blocks; nothing would be sent");
            return;
        }
        match highlighter.client().request_body(&blocks) {
            Ok(body) => println!("{}", body),
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let html = highlighter.render(&source);

    match &args.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, html) {
                eprintln!("error: cannot write '{}': {}", path.display(), e);
                process::exit(1);
            }
        }
        None => print!("{}", html),
    }
}

/// Load the client configuration for `render`, reporting problems on stderr.
fn resolve_config(args: &RenderArgs, color_choice: ColorChoice) -> Option<ClientConfig> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => Some(PathBuf::from(DEFAULT_CONFIG)).filter(|p| p.is_file()),
    };

    let Some(path) = path else {
        return match &args.endpoint {
            Some(endpoint) => Some(ClientConfig::new(endpoint.clone())),
            None => {
                eprintln!(
                    "error: no configuration found; pass --config, --endpoint, or create {}",
                    DEFAULT_CONFIG
                );
                None
            }
        };
    };

    match ClientConfig::load(&path) {
        Ok(config) => Some(config),
        Err(error) => {
            // Parse spans point into the file; read it again to show them.
            let source = match &error {
                ConfigError::Parse { .. } => std::fs::read_to_string(&path).unwrap_or_default(),
                ConfigError::Io { .. } => String::new(),
            };
            let source_len = source.len();
            let mut files = SimpleFiles::new();
            let file_id = files.add(path.display().to_string(), source);
            let diagnostic = config_diagnostic(&error, file_id, source_len);
            let writer = StandardStream::stderr(color_choice);
            let _ = term::emit_to_write_style(
                &mut writer.lock(),
                &term::Config::default(),
                &files,
                &diagnostic,
            );
            None
        }
    }
}

/// A labelled diagnostic when the error has a span inside the source,
/// otherwise the error text as a note.
fn config_diagnostic(error: &ConfigError, file_id: usize, source_len: usize) -> Diagnostic<usize> {
    let diagnostic = Diagnostic::error().with_message("invalid configuration");
    match error {
        ConfigError::Parse {
            message,
            span: Some(span),
        } if span.end <= source_len => diagnostic.with_labels(vec![
            Label::primary(file_id, span.clone()).with_message(message.clone()),
        ]),
        other => diagnostic.with_notes(vec![other.to_string()]),
    }
}
