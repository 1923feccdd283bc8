use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde_json::Value;
use skin_jsonc::{
    config::Config, decode_document, logging, parse_jsonc, strip_with_report,
    watch::DocumentWatcher, CommentKind, StripOptions,
};
use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::ExitCode,
    thread,
    time::Duration,
};
use tracing::{debug, error, info, warn};

const WATCH_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Strip `//` and `/* */` comments from JSON files.
#[derive(Debug, Parser)]
#[command(name = "skin-jsonc", version)]
struct Cli {
    /// File to read; stdin when omitted or `-`
    input: Option<PathBuf>,

    /// Write the result here instead of stdout
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Replace comments with spaces so line and column numbers are kept
    #[arg(long, short = 'w')]
    preserve_whitespace: bool,

    /// Parse the result as JSON and fail if it is not valid
    #[arg(long)]
    check: bool,

    /// Re-strip INPUT whenever it changes on disk
    #[arg(long, requires = "input")]
    watch: bool,

    /// Config file to use instead of the default lookup
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.log.filter);

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: &Config) -> Result<()> {
    let mut options = config.strip;
    if cli.preserve_whitespace {
        options.preserve_whitespace = true;
    }

    let input = cli.input.as_deref().filter(|p| *p != Path::new("-"));
    let output = cli.output.as_deref();

    if cli.watch {
        let path = input.ok_or_else(|| anyhow!("--watch needs an input file, not stdin"))?;
        if let Some(output) = output {
            if same_file(path, output) {
                return Err(anyhow!("--watch cannot write back to its own input"));
            }
        }
        process(Some(path), output, options, cli.check)?;
        return watch_loop(path, output, options, cli.check, config);
    }

    process(input, output, options, cli.check)
}

fn process(
    input: Option<&Path>,
    output: Option<&Path>,
    options: StripOptions,
    check: bool,
) -> Result<()> {
    let label = input
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<stdin>".to_string());
    let bytes = read_input(input)?;
    let stripped = strip_input(&bytes, &label, options, check)?;
    write_output(output, &stripped)
}

fn strip_input(bytes: &[u8], label: &str, options: StripOptions, check: bool) -> Result<String> {
    let text = decode_document(bytes).with_context(|| format!("Cannot strip {label}"))?;

    let report = strip_with_report(text, options);
    if report.unterminated == Some(CommentKind::Block) {
        warn!(input = %label, "Input ends inside an unterminated block comment");
    }
    debug!(input = %label, comments = report.comments, "Stripped comments");

    if check {
        parse_jsonc::<Value>(text).with_context(|| format!("{label} is not valid JSON"))?;
    }

    Ok(report.text)
}

/// Whether `output` names the same file as `input`, which must exist. An
/// output that does not exist yet is resolved through its parent directory.
fn same_file(input: &Path, output: &Path) -> bool {
    let Ok(input) = fs::canonicalize(input) else {
        return false;
    };
    if let Ok(output) = fs::canonicalize(output) {
        return input == output;
    }
    let Some(name) = output.file_name() else {
        return false;
    };
    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::canonicalize(parent)
        .map(|parent| parent.join(name) == input)
        .unwrap_or(false)
}

fn read_input(input: Option<&Path>) -> Result<Vec<u8>> {
    match input {
        Some(path) => {
            fs::read(path).with_context(|| format!("Failed to read input: {}", path.display()))
        }
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => fs::write(path, text)
            .with_context(|| format!("Failed to write output: {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn watch_loop(
    input: &Path,
    output: Option<&Path>,
    options: StripOptions,
    check: bool,
    config: &Config,
) -> Result<()> {
    let mut watcher =
        DocumentWatcher::new(input, &config.watch.extensions, config.watch.debounce());
    watcher.enable()?;
    info!(path = %watcher.target().display(), "Watching for changes");

    loop {
        if !watcher.poll().is_empty() {
            if !input.exists() {
                // Mid-save rename; the next event brings the file back.
                debug!(path = %input.display(), "Input missing after change");
            } else if let Err(err) = process(Some(input), output, options, check) {
                warn!(path = %input.display(), error = %format!("{err:#}"), "Failed to re-strip");
            } else {
                info!(path = %input.display(), "Re-stripped after change");
            }
        }
        thread::sleep(WATCH_POLL_INTERVAL);
    }
}
