use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use idstring::{Hash64, SymbolTable};
use srtool_core::Endpoint;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

mod config;
#[cfg(feature = "engine")]
mod render;

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json, Jsonl }

impl OutputFormat {
    fn from_config(s: &str) -> Self {
        match s { "json" => OutputFormat::Json, "jsonl" => OutputFormat::Jsonl, _ => OutputFormat::Text }
    }
}

#[derive(Debug, Parser)]
#[command(name = "srtool", version, about = "Discover, talk to and profile running engine instances")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./srtool.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter used when RUST_LOG is unset (e.g. info, bridge=debug)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "engine")]
#[derive(Debug, Subcommand)]
enum ProfilerCmd {
    /// Stop the engine from sending profiler snapshots
    Pause { target: Option<String> },
    /// Resume sending profiler snapshots
    Resume { target: Option<String> },
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Watch local ports for engine instances appearing and going away
    #[cfg(feature = "discover")]
    Discover {
        /// Ports: comma/range list (default: 14000-14030,14032)
        #[arg(long)]
        ports: Option<String>,
        /// Host to probe
        #[arg(long, default_value = srtool_core::LOCALHOST)]
        host: String,
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Timeout per probe in milliseconds
        #[arg(long, default_value_t = 500)]
        timeout_ms: u64,
        /// Output format: text, json, or jsonl
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print console output of an engine and send stdin lines as commands
    #[cfg(feature = "engine")]
    Console {
        /// host:port or port (default: 127.0.0.1:14030)
        target: Option<String>,
        /// String table used to resolve #ID[...] tags
        #[arg(long, value_name = "FILE")]
        strings: Option<PathBuf>,
        /// Send stdin lines as Lua instead of console commands
        #[arg(long, default_value_t = false)]
        lua: bool,
        /// Reconnect with backoff when the connection drops
        #[arg(long, default_value_t = false)]
        reconnect: bool,
        /// Output format: text, json, or jsonl
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Send one console command or Lua script and exit
    #[cfg(feature = "engine")]
    Send {
        /// host:port or port (default: 127.0.0.1:14030)
        target: Option<String>,
        /// Console command line, e.g. "profiler pause"
        #[arg(long, conflicts_with = "script", required_unless_present = "script")]
        command: Option<String>,
        /// File with Lua source to run
        #[arg(long, value_name = "FILE")]
        script: Option<PathBuf>,
    },
    /// Pause or resume the engine profiler
    #[cfg(feature = "engine")]
    Profiler {
        #[command(subcommand)]
        cmd: ProfilerCmd,
    },
    /// Decode live profiler snapshots and print per-frame summaries
    #[cfg(feature = "engine")]
    Profile {
        /// host:port or port (default: 127.0.0.1:14030)
        target: Option<String>,
        /// Stop after this many frames (default: until interrupted)
        #[arg(long)]
        frames: Option<usize>,
        /// Number of frames kept in history
        #[arg(long, default_value_t = profiler::DEFAULT_CAPACITY)]
        history: usize,
        /// Write the frame history as CSV when done
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Output format: text, json, or jsonl
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Decode a captured profiler snapshot and print its span tree
    #[cfg(feature = "engine")]
    Decode {
        file: PathBuf,
        /// String table used to name spans
        #[arg(long, value_name = "FILE")]
        strings: Option<PathBuf>,
    },
    /// Print the 64-bit and 32-bit id-string hashes of each argument
    Hash {
        #[arg(required = true)]
        text: Vec<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Inspect a string table file
    Strings {
        file: PathBuf,
        /// Look up an 8- or 16-digit hex hash
        #[arg(long)]
        lookup: Vec<String>,
        /// Replace #ID[...] tags in this text
        #[arg(long)]
        substitute: Option<String>,
    },
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn console_endpoint(target: Option<&str>) -> Result<Endpoint> {
    match target {
        Some(t) => t.parse::<Endpoint>().with_context(|| format!("invalid target '{t}'")),
        None => Ok(Endpoint::localhost(srtool_core::CONSOLE_PORT)),
    }
}

fn load_table(path: Option<&Path>) -> Result<Option<SymbolTable>> {
    let Some(path) = path else { return Ok(None) };
    let table = SymbolTable::load(path).with_context(|| format!("reading string table {}", path.display()))?;
    tracing::info!(path = %path.display(), strings = table.len(), "loaded string table");
    Ok(Some(table))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let loaded_cfg = config::load_config(cli.config.as_deref());
    let cfg_strings = loaded_cfg.as_ref().and_then(|c| c.strings_path()).map(Path::to_path_buf);
    match cli.command {
        Commands::Version => {
            println!("srtool {} (core {})", env!("CARGO_PKG_VERSION"), srtool_core::version());
        }
        #[cfg(feature = "discover")]
        Commands::Discover { mut ports, mut host, mut interval_ms, mut timeout_ms, mut format } => {
            if let Some(cfg) = &loaded_cfg { if let Some(d) = &cfg.discover {
                if ports.is_none() { ports = d.ports.clone(); }
                if host == srtool_core::LOCALHOST { if let Some(h) = &d.host { host = h.clone(); } }
                if interval_ms == 1000 { if let Some(v) = d.interval_ms { interval_ms = v; } }
                if timeout_ms == 500 { if let Some(v) = d.timeout_ms { timeout_ms = v; } }
                if format == OutputFormat::Text { if let Some(f) = &d.format { format = OutputFormat::from_config(f); } }
            }}
            let ranges = match ports {
                Some(spec) => presence::parse_port_ranges(&spec)?,
                None => vec![srtool_core::LOCAL_CONSOLE_PORTS, srtool_core::ASSET_SERVER_PORT..=srtool_core::ASSET_SERVER_PORT],
            };
            let options = presence::ScanOptions {
                interval: std::time::Duration::from_millis(interval_ms.max(1)),
                probe_timeout: std::time::Duration::from_millis(timeout_ms),
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(discover::run(host, ranges, options, format))?;
        }
        #[cfg(feature = "engine")]
        Commands::Console { target, strings, lua, mut reconnect, format } => {
            if let Some(c) = loaded_cfg.as_ref().and_then(|c| c.console.as_ref()) {
                if !reconnect { reconnect = c.reconnect.unwrap_or(false); }
            }
            let endpoint = console_endpoint(target.as_deref())?;
            let table = load_table(strings.or(cfg_strings).as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(engine::console(endpoint, table, lua, reconnect, format))?;
        }
        #[cfg(feature = "engine")]
        Commands::Send { target, command, script } => {
            let endpoint = console_endpoint(target.as_deref())?;
            let message = match (command, script) {
                (Some(line), _) => bridge::Outbound::command(&line),
                (None, Some(path)) => bridge::Outbound::script(std::fs::read_to_string(&path)?),
                (None, None) => return Err(anyhow!("provide --command or --script")),
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(engine::send_once(endpoint, message))?;
        }
        #[cfg(feature = "engine")]
        Commands::Profiler { cmd } => {
            let (target, message) = match cmd {
                ProfilerCmd::Pause { target } => (target, profiler::pause_command()),
                ProfilerCmd::Resume { target } => (target, profiler::resume_command()),
            };
            let endpoint = console_endpoint(target.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(engine::send_once(endpoint, message))?;
        }
        #[cfg(feature = "engine")]
        Commands::Profile { target, mut frames, mut history, out, mut format } => {
            if let Some(p) = loaded_cfg.as_ref().and_then(|c| c.profile.as_ref()) {
                if frames.is_none() { frames = p.frames; }
                if history == profiler::DEFAULT_CAPACITY { if let Some(h) = p.history { history = h; } }
                if format == OutputFormat::Text { if let Some(f) = &p.format { format = OutputFormat::from_config(f); } }
            }
            let endpoint = console_endpoint(target.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            let started_at = now_rfc3339();
            let session = rt.block_on(engine::profile(endpoint, frames, history, format))?;
            let ended_at = now_rfc3339();
            tracing::info!(%started_at, %ended_at, frames = session.history().len(), "profile finished");
            if let Some(path) = out {
                render::write_history_csv(std::fs::File::create(&path)?, session.history())?;
                println!("wrote {} frames to {}", session.history().len(), path.display());
            }
        }
        #[cfg(feature = "engine")]
        Commands::Decode { file, strings } => {
            let bytes = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let snapshot = profiler::decode(&bytes).with_context(|| format!("decoding {}", file.display()))?;
            let table = load_table(strings.or(cfg_strings).as_deref())?;
            let index = profiler::StringIndex::default();
            match snapshot.time_range() {
                Some(r) => println!(
                    "{:?} snapshot: {} spans, {:.3} ms ({} .. {})",
                    snapshot.format(),
                    snapshot.len(),
                    r.duration() * 1000.0,
                    r.start,
                    r.end
                ),
                None => println!("{:?} snapshot: no events", snapshot.format()),
            }
            for line in render::tree_lines(&snapshot, |h| render::span_name(h, &index, table.as_ref())) {
                println!("{}", line);
            }
        }
        Commands::Hash { text, format } => {
            for t in text {
                let h = Hash64::of(&t);
                match format {
                    OutputFormat::Text => println!("{}\t{}\t{}", h, h.short_hex(), t),
                    OutputFormat::Json | OutputFormat::Jsonl => {
                        let obj = serde_json::json!({ "text": t, "hash": h.to_string(), "short": h.short_hex() });
                        println!("{}", serde_json::to_string(&obj)?);
                    }
                }
            }
        }
        Commands::Strings { file, lookup, substitute } => {
            let table = SymbolTable::load(&file).with_context(|| format!("reading {}", file.display()))?;
            if lookup.is_empty() && substitute.is_none() {
                println!("{}: {} strings", file.display(), table.len());
            }
            for key in lookup {
                match table.lookup_hex(&key) {
                    Some(s) => println!("{}\t{}", key, s),
                    None => println!("{}\t<not found>", key),
                }
            }
            if let Some(text) = substitute {
                println!("{}", table.substitute(&text));
            }
        }
    }
    Ok(())
}

#[cfg(feature = "discover")]
mod discover {
    use super::{now_rfc3339, OutputFormat};
    use anyhow::Result;
    use presence::{PortEvent, PortStatus, PresenceScanner, ScanOptions};
    use std::ops::RangeInclusive;
    use tokio::sync::mpsc;

    /// Print port transitions until interrupted.
    pub async fn run(host: String, ranges: Vec<RangeInclusive<u16>>, options: ScanOptions, format: OutputFormat) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<PortEvent>();
        let mut scanners = Vec::with_capacity(ranges.len());
        for range in ranges {
            tracing::info!(%host, start = range.start(), end = range.end(), "watching ports");
            let scanner = PresenceScanner::new(host.clone(), range, options);
            let mut sub = scanner.observe();
            let tx = tx.clone();
            tokio::spawn(async move {
                while let Some(ev) = sub.recv().await {
                    if tx.send(ev).is_err() {
                        break;
                    }
                }
            });
            scanners.push(scanner);
        }
        drop(tx);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            tokio::select! {
                _ = &mut ctrl_c => break,
                ev = rx.recv() => match ev {
                    Some(ev) => print_event(&host, ev, format)?,
                    None => break,
                },
            }
        }
        Ok(())
    }

    fn print_event(host: &str, ev: PortEvent, format: OutputFormat) -> Result<()> {
        let endpoint = ev.endpoint(host);
        match format {
            OutputFormat::Text => {
                let status = match ev.status { PortStatus::Opened => "opened", PortStatus::Closed => "closed" };
                println!("{} {}", endpoint, status);
            }
            OutputFormat::Json | OutputFormat::Jsonl => {
                let obj = serde_json::json!({
                    "host": endpoint.host,
                    "port": ev.port,
                    "status": ev.status,
                    "at": now_rfc3339(),
                });
                println!("{}", serde_json::to_string(&obj)?);
            }
        }
        Ok(())
    }
}

#[cfg(feature = "engine")]
mod engine {
    use super::{render, OutputFormat};
    use anyhow::{anyhow, Result};
    use bridge::{Backoff, Connection, ConnectionState, EngineMessage, Frame, Outbound};
    use idstring::SymbolTable;
    use profiler::{ProfilerSession, Update};
    use srtool_core::Endpoint;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::sync::mpsc;

    /// Connect, send one message and close once it is written.
    pub async fn send_once(endpoint: Endpoint, message: Outbound) -> Result<()> {
        let conn = Connection::connect(&endpoint.ws_url(""));
        conn.send(message.to_json())?;
        conn.opened().await?;
        conn.close();
        let mut frames = conn.subscribe();
        while frames.recv().await.is_some() {}
        tracing::info!(%endpoint, "sent");
        Ok(())
    }

    fn print_message(frame: &Frame, table: Option<&SymbolTable>, format: OutputFormat) -> Result<()> {
        let msg = match frame {
            Frame::Message(msg) => msg,
            Frame::Binary(bytes) => {
                tracing::debug!(len = bytes.len(), "ignoring binary frame");
                return Ok(());
            }
        };
        match format {
            OutputFormat::Json | OutputFormat::Jsonl => println!("{}", serde_json::to_string(msg.body())?),
            OutputFormat::Text => match msg.classify() {
                Ok(EngineMessage::Log(line)) => println!("{}", render::log_line(&line, table)),
                Ok(_) => println!("{}", serde_json::to_string(msg.body())?),
                Err(e) => tracing::warn!(error = %e, "bad message"),
            },
        }
        Ok(())
    }

    /// Send one console line. A connection that has just ended only loses the
    /// line; its stream end drives the reconnect.
    fn forward(conn: &Connection, msg: &Outbound) -> bool {
        match conn.send(msg.to_json()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, url = conn.url(), "console line not sent");
                false
            }
        }
    }

    fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        rx
    }

    pub async fn console(endpoint: Endpoint, table: Option<SymbolTable>, lua: bool, reconnect: bool, format: OutputFormat) -> Result<()> {
        let url = endpoint.ws_url("");
        let mut input = stdin_lines();
        let mut input_open = true;
        let mut backoff = Backoff::default();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            let mut conn = Connection::connect(&url);
            let mut opened = false;
            let outcome = loop {
                if !opened && conn.state() == ConnectionState::Open {
                    opened = true;
                    backoff.reset();
                    eprintln!("connected to {}", endpoint);
                }
                tokio::select! {
                    _ = &mut ctrl_c => return Ok(()),
                    line = input.recv(), if input_open => match line {
                        Some(line) if line.trim().is_empty() => {}
                        Some(line) => {
                            let msg = if lua { Outbound::script(line) } else { Outbound::command(line.trim()) };
                            forward(&conn, &msg);
                        }
                        None => input_open = false,
                    },
                    frame = conn.recv() => match frame {
                        Some(Ok(frame)) => print_message(&frame, table.as_ref(), format)?,
                        Some(Err(e)) if e.is_terminal() => break Err(e),
                        Some(Err(e)) => tracing::warn!(error = %e, "dropped frame"),
                        None => break Ok(()),
                    },
                }
            };
            match outcome {
                Ok(()) => eprintln!("connection to {} closed", endpoint),
                Err(e) if !reconnect => return Err(e.into()),
                Err(e) => eprintln!("{}", e),
            }
            if !reconnect {
                return Ok(());
            }
            let delay = backoff.next_delay();
            tracing::info!(attempt = backoff.attempt(), ?delay, "reconnecting");
            tokio::select! {
                _ = &mut ctrl_c => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    pub async fn profile(endpoint: Endpoint, frames: Option<usize>, history: usize, format: OutputFormat) -> Result<ProfilerSession> {
        let mut conn = profiler::connect(&endpoint);
        let mut session = ProfilerSession::new(history);
        let mut received = 0usize;
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        while frames.map_or(true, |n| received < n) {
            let frame = tokio::select! {
                _ = &mut ctrl_c => break,
                frame = conn.recv() => frame,
            };
            let frame = match frame {
                Some(Ok(frame)) => frame,
                Some(Err(e)) if e.is_terminal() => return Err(anyhow!(e)),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "dropped frame");
                    continue;
                }
                None => break,
            };
            match session.handle(&frame) {
                Ok(Update::Frame { index, .. }) => {
                    received += 1;
                    if let Some(entry) = session.history().select(index) {
                        match format {
                            OutputFormat::Text => println!("{}", render::frame_text(received, entry)),
                            OutputFormat::Json | OutputFormat::Jsonl => {
                                println!("{}", serde_json::to_string(&render::frame_json(received, entry))?)
                            }
                        }
                    }
                }
                Ok(Update::Threads) => tracing::info!(threads = session.threads().len(), "thread roster updated"),
                Ok(Update::Strings { merged }) => tracing::info!(merged, "string table updated"),
                Ok(Update::Ignored) => {}
                Err(e) => tracing::warn!(error = %e, "bad profiler frame"),
            }
        }
        conn.close();
        Ok(session)
    }

}
