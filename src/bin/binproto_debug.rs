//! Interactive debugging harness for binproto peers.
//!
//! Usage:
//!   binproto-debug --mode client --raddr HOST:PORT
//!   binproto-debug --mode proxy --raddr HOST:PORT [--laddr HOST:PORT]
//!
//! Client mode connects to `raddr`, prints every unit the peer sends and encodes one command per
//! stdin line (see `binproto::command::USAGE`). Proxy mode accepts a single connection on
//! `laddr`, connects it to `raddr`, forwards both directions and prints what flows each way.
//!
//! Settings can also come from a TOML file (`--config`) and `BINPROTO_*` environment variables;
//! flags win. Log output goes to stderr and honours `RUST_LOG`.

use anyhow::{bail, Context};
use binproto::command::{Command, CommandError, USAGE};
use binproto::config::{DebugConfig, Mode};
use binproto::dump::display_units;
use binproto::Decoder;
use clap::Parser;
use std::io::{self, BufRead, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process;
use std::thread;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "binproto-debug", version, about = "Talk to or eavesdrop on a binproto peer")]
struct Args {
    /// Either 'client' or 'proxy'.
    #[arg(long, value_enum)]
    mode: Option<Mode>,
    /// Address to connect to.
    #[arg(long)]
    raddr: Option<String>,
    /// Address to listen on (proxy mode).
    #[arg(long)]
    laddr: Option<String>,
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DebugConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DebugConfig::default(),
    };
    config.apply_env();
    if let Some(mode) = args.mode {
        config.mode = Some(mode);
    }
    if let Some(raddr) = args.raddr {
        config.raddr = Some(raddr);
    }
    if let Some(laddr) = args.laddr {
        config.laddr = laddr;
    }

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    config.validate_strict()?;
    let (Some(mode), Some(raddr)) = (config.mode, config.raddr.as_deref()) else {
        bail!("mode and raddr are required");
    };
    match mode {
        Mode::Client => client(raddr),
        Mode::Proxy => proxy(&config.laddr, raddr),
    }
}

fn report(e: &CommandError) {
    eprintln!("{e}");
    if e.wants_usage() {
        eprint!("{USAGE}");
    }
}

fn client(raddr: &str) -> anyhow::Result<()> {
    let conn = TcpStream::connect(raddr).with_context(|| format!("could not connect to '{raddr}'"))?;
    info!(%raddr, "connected");

    let incoming = conn.try_clone()?;
    thread::Builder::new()
        .name("incoming".to_string())
        .spawn(move || {
            let decoder = Decoder::new(incoming);
            if let Err(e) = display_units(&decoder, "", &mut io::stdout()) {
                error!(error = %e, "could not read next unit");
                process::exit(1);
            }
            eprintln!("--- Connection closed by remote host");
            process::exit(0);
        })?;

    let mut out = &conn;
    for line in io::stdin().lock().lines() {
        let line = line.context("could not read line")?;
        let cmd = match Command::parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                report(&e);
                continue;
            }
        };
        if let Err(e) = cmd.send(&mut out) {
            if e.is_fatal() {
                return Err(e.into());
            }
            report(&e);
        }
    }
    Ok(())
}

/// Reader that forwards everything it reads to a second connection.
struct Tee<R, W> {
    src: R,
    copy: W,
}

impl<R: Read, W: Write> Read for Tee<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.src.read(buf)?;
        self.copy.write_all(&buf[..n])?;
        Ok(n)
    }
}

fn proxy(laddr: &str, raddr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(laddr).with_context(|| format!("could not listen on '{laddr}'"))?;
    info!(%laddr, "listening");
    let (conn_l, peer) = listener.accept().context("accept failed")?;
    info!(%peer, "accepted");
    let conn_r = TcpStream::connect(raddr).with_context(|| format!("could not connect to '{raddr}'"))?;

    let (exit_tx, exit_rx) = crossbeam_channel::bounded::<bool>(2);
    let directions = [
        (conn_l.try_clone()?, conn_r.try_clone()?, "[l -> r] ", false),
        (conn_r, conn_l, "[r -> l] ", true),
    ];
    for (src, copy, prefix, remote_closed) in directions {
        let exit_tx = exit_tx.clone();
        thread::Builder::new()
            .name(prefix.trim().to_string())
            .spawn(move || {
                let decoder = Decoder::new(Tee { src, copy });
                if let Err(e) = display_units(&decoder, prefix, &mut io::stdout()) {
                    error!(error = %e, direction = prefix.trim(), "could not read next unit");
                    process::exit(1);
                }
                let _ = exit_tx.send(remote_closed);
            })?;
    }

    if exit_rx.recv().unwrap_or(false) {
        eprintln!("--- Connection closed by remote host");
    }
    Ok(())
}
