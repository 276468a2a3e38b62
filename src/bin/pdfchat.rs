//! CLI binary for edgequake-pdfchat.
//!
//! A thin shim over the library crate: uploads a PDF (or attaches to a
//! document the service already has), then runs an interactive session
//! where plain lines are questions and `:`-prefixed lines drive the viewer.

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_pdfchat::view::{self, ChatEntry};
use edgequake_pdfchat::{
    Author, ContentLoadState, HttpBackend, Message, MessageStatus, Pagination, PdfFile,
    SessionConfig, SessionController, SessionObserver, SessionPhase, Services, UploadReceipt,
    Uploader,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Terminal observer using indicatif ────────────────────────────────────────

/// Shows a spinner while content loads or an answer is pending, and prints
/// each resolved answer as it lands.
struct CliObserver {
    spinner: ProgressBar,
    quiet: bool,
}

impl CliObserver {
    fn new(quiet: bool) -> Arc<Self> {
        let spinner = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        spinner.set_style(style);
        Arc::new(Self { spinner, quiet })
    }

    fn start(&self, msg: &str) {
        self.spinner.set_message(msg.to_string());
        self.spinner.enable_steady_tick(Duration::from_millis(80));
    }

    fn stop(&self) {
        self.spinner.disable_steady_tick();
        self.spinner.finish_and_clear();
    }

    fn println(&self, line: String) {
        if self.spinner.is_hidden() {
            if !self.quiet {
                eprintln!("{line}");
            }
        } else {
            self.spinner.println(line);
        }
    }
}

impl SessionObserver for CliObserver {
    fn on_phase_change(&self, phase: SessionPhase) {
        if phase == SessionPhase::DocumentReady {
            self.stop();
        }
    }

    fn on_content_state(&self, state: &ContentLoadState) {
        match state {
            ContentLoadState::Loading => self.start(view::LOADING_TEXT),
            ContentLoadState::Ready(bytes) => {
                self.stop();
                self.println(format!(
                    "{} PDF loaded ({:.2} MB)",
                    green("✓"),
                    bytes.len() as f64 / 1024.0 / 1024.0
                ));
            }
            ContentLoadState::Failed(message) => {
                self.stop();
                self.println(format!("{} {}", red("✗"), message));
            }
            ContentLoadState::Idle => {}
        }
    }

    fn on_page_change(&self, pagination: Pagination) {
        self.println(dim(&format!(
            "  viewer: page {} of {}",
            pagination.current(),
            pagination.total()
        )));
    }

    fn on_message_appended(&self, message: &Message) {
        match (message.author, message.status) {
            (_, MessageStatus::Pending) => self.start(edgequake_pdfchat::session::PENDING_TEXT),
            (Author::Assistant, _) => self.println(ChatEntry::from(message).to_string()),
            (Author::User, _) => {}
        }
    }

    fn on_message_resolved(&self, message: &Message) {
        self.stop();
        let entry = ChatEntry::from(message).to_string();
        if message.status == MessageStatus::Errored {
            self.println(red(&entry));
        } else {
            self.println(entry);
        }
    }

    fn on_render_error(&self, error: &str) {
        self.println(format!("{} {}", red("✗"), error));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Upload a PDF and chat about it
  pdfchat paper.pdf

  # Attach to a document the service already has
  pdfchat --document-id 7f3a --filename paper.pdf --pages 12

  # One-shot questions, JSON session snapshot on stdout
  pdfchat paper.pdf --ask "What is this about?" --ask "Who wrote it?" --json

SESSION COMMANDS:
  <question>        Ask about the document (ignored while an answer is pending)
  :page N           Go to page N (clamped to the document)
  :next / :prev     Next / previous page
  :cite N           Follow the N-th citation button of the last answer
  :render [FILE]    Render the current page to PNG (default: page-N.png)
  :reload           Retry loading the document content
  :view             Show the viewer state
  :json             Print the session snapshot as JSON
  :quit             Exit (also Ctrl-D)

ENVIRONMENT VARIABLES:
  PDFCHAT_BASE_URL        Document service root (default http://localhost:5001)
  PDFCHAT_UPLOAD_URL      Upload endpoint override
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory) for rendering
  RUST_LOG                Log filter override (e.g. edgequake_pdfchat=debug)
"#;

/// Chat with a PDF served by a document question-answering service.
#[derive(Parser, Debug)]
#[command(
    name = "pdfchat",
    version,
    about = "Chat with a PDF: upload it, ask questions, follow page citations",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF to upload.
    #[arg(required_unless_present = "document_id", conflicts_with = "document_id")]
    file: Option<PathBuf>,

    /// Attach to an already uploaded document instead of uploading.
    #[arg(long, env = "PDFCHAT_DOCUMENT_ID")]
    document_id: Option<String>,

    /// Filename shown for an attached document.
    #[arg(long, requires = "document_id", default_value = "")]
    filename: String,

    /// Declared page count of an attached document.
    #[arg(long, requires = "document_id", default_value_t = 0)]
    pages: u32,

    /// Document service root URL.
    #[arg(long, env = "PDFCHAT_BASE_URL", default_value = "http://localhost:5001")]
    base_url: String,

    /// Upload endpoint, if hosted apart from the document service.
    #[arg(long, env = "PDFCHAT_UPLOAD_URL")]
    upload_url: Option<String>,

    /// Content download timeout in seconds.
    #[arg(long, env = "PDFCHAT_CONTENT_TIMEOUT", default_value_t = 30)]
    content_timeout: u64,

    /// TCP connect timeout in seconds.
    #[arg(long, env = "PDFCHAT_CONNECT_TIMEOUT", default_value_t = 10)]
    connect_timeout: u64,

    /// Upload timeout in seconds.
    #[arg(long, env = "PDFCHAT_UPLOAD_TIMEOUT", default_value_t = 60)]
    upload_timeout: u64,

    /// Per-question timeout in seconds (default: none).
    #[arg(long, env = "PDFCHAT_QUERY_TIMEOUT")]
    query_timeout: Option<u64>,

    /// Longest edge of rendered page images, in pixels.
    #[arg(long, env = "PDFCHAT_RENDER_PIXELS", default_value_t = 2000)]
    render_pixels: u32,

    /// Skip the assistant greeting.
    #[arg(long, env = "PDFCHAT_NO_GREETING")]
    no_greeting: bool,

    /// Ask these questions in order and exit instead of starting a session.
    #[arg(long = "ask", value_name = "QUESTION")]
    ask: Vec<String>,

    /// With --ask: print the final session snapshot as JSON.
    #[arg(long, requires = "ask")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFCHAT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and answers.
    #[arg(short, long, env = "PDFCHAT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would interleave with the spinner; keep them off
    // unless asked for.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let quiet = cli.quiet || cli.json;
    let observer = CliObserver::new(quiet);
    let config = build_config(&cli, observer.clone())?;

    let receipt = match (&cli.file, &cli.document_id) {
        (Some(path), _) => upload(path, &config, &observer).await?,
        (None, Some(id)) => UploadReceipt {
            document_id: id.clone(),
            filename: cli.filename.clone(),
            page_count: cli.pages,
        },
        (None, None) => bail!("either a PDF file or --document-id is required"),
    };

    let services = Services::http(&config).context("Failed to set up services")?;
    let mut session = SessionController::new(config, services);
    session
        .on_upload_complete(receipt)
        .context("Failed to open document")?;

    if !cli.ask.is_empty() {
        return ask_all(&mut session, &cli.ask, cli.json).await;
    }

    if let Some(document) = session.document() {
        observer.println(bold(&format!("Chat with \"{}\"", document.display_name())));
    }
    observer.println(dim("Type a question, or :help for commands."));
    repl(&mut session, &observer).await
}

/// Map CLI args to `SessionConfig`.
fn build_config(cli: &Cli, observer: Arc<CliObserver>) -> Result<SessionConfig> {
    let mut builder = SessionConfig::builder()
        .base_url(&cli.base_url)
        .content_timeout_secs(cli.content_timeout)
        .connect_timeout_secs(cli.connect_timeout)
        .upload_timeout_secs(cli.upload_timeout)
        .render_max_pixels(cli.render_pixels)
        .greeting(!cli.no_greeting)
        .observer(observer);
    if let Some(url) = &cli.upload_url {
        builder = builder.upload_url(url);
    }
    if let Some(secs) = cli.query_timeout {
        builder = builder.query_timeout_secs(secs);
    }
    builder.build().context("Invalid configuration")
}

async fn upload(
    path: &Path,
    config: &SessionConfig,
    observer: &CliObserver,
) -> Result<UploadReceipt> {
    let file = PdfFile::read(path).await?;
    observer.println(format!(
        "{} Selected: {} ({:.2} MB)",
        cyan("◆"),
        file.filename,
        file.size_mb()
    ));

    let backend = HttpBackend::new(config)?;
    observer.start("Uploading...");
    let result = backend.upload(file).await;
    observer.stop();
    let receipt = result.context("Upload failed")?;
    observer.println(format!(
        "{} Uploaded as {} ({} pages)",
        green("✓"),
        receipt.document_id,
        receipt.page_count
    ));
    Ok(receipt)
}

/// Non-interactive mode: ask each question after the previous answer lands.
async fn ask_all(session: &mut SessionController, questions: &[String], json: bool) -> Result<()> {
    session.settle().await;
    for question in questions {
        if !session.submit(question) {
            bail!("Question rejected: {question:?}");
        }
        session.settle().await;
    }

    if json {
        let snapshot = serde_json::to_string_pretty(&session.snapshot())
            .context("Failed to serialise session")?;
        println!("{snapshot}");
    } else {
        let chat = view::chat(&session.snapshot());
        println!("{chat}");
    }
    Ok(())
}

async fn repl(session: &mut SessionController, observer: &CliObserver) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let busy = session.in_flight() > 0;
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Some(command) = line.strip_prefix(':') {
                    if !run_command(session, observer, command).await? {
                        break;
                    }
                } else if !session.submit(line) {
                    observer.println(dim("(still waiting for the previous answer)"));
                }
            }
            _ = session.process_next(), if busy => {}
        }
    }

    observer.stop();
    Ok(())
}

/// Run one `:command`. Returns `false` to exit.
async fn run_command(
    session: &mut SessionController,
    observer: &CliObserver,
    command: &str,
) -> Result<bool> {
    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default();
    let arg = words.next();

    match name {
        "q" | "quit" | "exit" => return Ok(false),
        "page" | "p" => {
            let Some(n) = arg.and_then(|a| a.parse::<i64>().ok()) else {
                observer.println(red("usage: :page N"));
                return Ok(true);
            };
            session.on_page_change(n);
        }
        "next" | "n" => {
            session.next_page();
        }
        "prev" | "previous" => {
            session.previous_page();
        }
        "cite" | "c" => {
            let n = arg.and_then(|a| a.parse::<usize>().ok()).unwrap_or(1);
            follow_citation(session, observer, n);
        }
        "render" | "r" => {
            let page = session.pagination().current();
            let out = arg
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(format!("page-{page}.png")));
            match session.render_current_page().await {
                Ok(rendered) => {
                    tokio::fs::write(&out, &rendered.png)
                        .await
                        .with_context(|| format!("Failed to write {}", out.display()))?;
                    observer.println(format!(
                        "{} Page {} → {} ({}x{} px)",
                        green("✓"),
                        page,
                        out.display(),
                        rendered.width,
                        rendered.height
                    ));
                }
                Err(e) => observer.println(format!("{} {}", red("✗"), e)),
            }
        }
        "reload" => {
            session.reload();
        }
        "view" | "v" => {
            let v = view::viewer(&session.snapshot(), &session.config().base_url);
            observer.println(v.to_string());
        }
        "json" => {
            let snapshot = serde_json::to_string_pretty(&session.snapshot())
                .context("Failed to serialise session")?;
            println!("{snapshot}");
        }
        "help" | "h" => observer.println(AFTER_HELP.to_string()),
        other => observer.println(red(&format!("unknown command :{other} (try :help)"))),
    }
    Ok(true)
}

/// Follow the `n`-th (1-based) citation button of the latest answer.
fn follow_citation(session: &mut SessionController, observer: &CliObserver, n: usize) {
    let target = session
        .messages()
        .iter()
        .rev()
        .find(|m| m.author == Author::Assistant && m.status == MessageStatus::Final)
        .and_then(|m| {
            let entry = ChatEntry::from(m);
            let button = entry.buttons().nth(n.saturating_sub(1))?.clone();
            Some((m.id, button))
        });

    match target {
        Some((id, button)) => {
            if session
                .activate_citation(id, button.source, button.index)
                .is_none()
            {
                observer.println(red("citation no longer available"));
            }
        }
        None => observer.println(red(&format!("no citation #{n} in the last answer"))),
    }
}
