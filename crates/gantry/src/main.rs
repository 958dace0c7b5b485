#![forbid(unsafe_code)]

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use gantry::{
    bootstrap, BootConfig, BootstrapOptions, ControlSurface, FsTransport, HttpTransport,
    Transport, STATE_DOWNLOAD_FILENAME,
};
use gantry_engine::EngineError;
use gantry_vm::ReferenceVm;
use tokio::io::{AsyncBufReadExt, BufReader};
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "gantry", version, about = "Session front-end for an external machine engine")]
struct Args {
    /// Origin session assets resolve against: an http(s):// base URL or a
    /// local directory.
    ///
    /// Environment variable: `GANTRY_ORIGIN`.
    #[arg(long, env = "GANTRY_ORIGIN", default_value = "./public")]
    origin: String,

    /// Directory saved run-state artifacts are written into.
    ///
    /// Environment variable: `GANTRY_DOWNLOAD_DIR`.
    #[arg(long, env = "GANTRY_DOWNLOAD_DIR", default_value = ".")]
    download_dir: PathBuf,

    /// Skip the engine-asset reachability probe.
    #[arg(long)]
    no_probe: bool,

    /// Override the engine asset location (`GANTRY_ENGINE_URL`).
    #[arg(long)]
    engine_url: Option<String>,

    /// Override the boot run-state location (`GANTRY_STATE_URL`).
    #[arg(long)]
    state_url: Option<String>,

    /// Override the optical image location (`GANTRY_CDROM_URL`).
    #[arg(long)]
    cdrom_url: Option<String>,

    /// Guest memory size in MiB.
    ///
    /// Environment variable: `GANTRY_RAM_MIB`.
    #[arg(long, env = "GANTRY_RAM_MIB")]
    ram_mib: Option<usize>,

    /// Where the engine's serial output is streamed (`stdout` or a file
    /// path). The terminal stand-in for the screen mount.
    #[arg(long, default_value = "stdout")]
    serial_out: String,

    /// Run this many engine steps without interactive controls, then exit.
    #[arg(long)]
    steps: Option<u64>,

    /// Print the resolved boot configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

/// Terminal rendition of the control surface: installed controls become
/// command help lines, alerts go to stderr.
struct TerminalSurface;

impl ControlSurface for TerminalSurface {
    fn install_save_control(&mut self) {
        println!("control: save            (write run-state to the download directory)");
    }

    fn install_restore_control(&mut self) {
        println!("control: restore <path>  (stop, import a state file, resume)");
    }

    fn alert(&mut self, message: &str) {
        eprintln!("!! {message}");
    }
}

fn build_transport(origin: &str) -> anyhow::Result<Box<dyn Transport>> {
    if origin.starts_with("http://") || origin.starts_with("https://") {
        let url = Url::parse(origin).with_context(|| format!("invalid origin {origin}"))?;
        Ok(Box::new(HttpTransport::new(url)))
    } else {
        Ok(Box::new(FsTransport::new(origin)))
    }
}

fn open_serial_sink(dest: &str) -> anyhow::Result<Box<dyn Write>> {
    if dest == "stdout" {
        return Ok(Box::new(std::io::stdout()));
    }
    let file = std::fs::File::create(dest)
        .with_context(|| format!("failed to create serial output file {dest}"))?;
    Ok(Box::new(std::io::BufWriter::new(file)))
}

fn flush_serial(vm: &mut ReferenceVm, out: &mut dyn Write) -> anyhow::Result<()> {
    let bytes = vm.take_output();
    if !bytes.is_empty() {
        out.write_all(&bytes)?;
        out.flush()?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = BootConfig::from_env();
    if let Some(url) = args.engine_url {
        config.engine_url = url;
    }
    if let Some(url) = args.state_url {
        config.state_url = url;
    }
    if let Some(url) = args.cdrom_url {
        config.cdrom_url = url;
    }
    if let Some(mib) = args.ram_mib {
        config.memory_bytes = mib
            .checked_mul(1024 * 1024)
            .with_context(|| format!("--ram-mib {mib} overflows the guest memory size"))?;
    }

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let transport = build_transport(&args.origin)?;
    let mut serial_sink = open_serial_sink(&args.serial_out)?;
    let mut surface = TerminalSurface;
    let options = BootstrapOptions {
        probe_engine_asset: !args.no_probe,
        download_dir: args.download_dir.clone(),
    };

    let factory =
        |config: &BootConfig| Ok::<_, EngineError>(ReferenceVm::new(config.memory_bytes));
    let mut session = bootstrap(factory, &*transport, &mut surface, config, options).await?;

    if let Some(steps) = args.steps {
        let mut remaining = steps;
        while remaining > 0 {
            let slice = remaining.min(10_000);
            session.engine_mut().step(slice);
            flush_serial(session.engine_mut(), serial_sink.as_mut())?;
            remaining -= slice;
        }
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tick = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            _ = tick.tick() => {
                session.engine_mut().step(64);
                flush_serial(session.engine_mut(), serial_sink.as_mut())?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
                match cmd {
                    "save" => {
                        if session.save_state(&mut surface).await.is_ok() {
                            println!(
                                "state saved to {}",
                                args.download_dir.join(STATE_DOWNLOAD_FILENAME).display()
                            );
                        }
                    }
                    "restore" => {
                        let path = rest.trim();
                        if path.is_empty() {
                            eprintln!("usage: restore <path>");
                        } else if session
                            .restore_state_from(&mut surface, PathBuf::from(path))
                            .await
                            .is_ok()
                        {
                            println!("state restored from {path}");
                        }
                    }
                    "quit" | "exit" => break,
                    other => eprintln!("unknown command: {other}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    flush_serial(session.engine_mut(), serial_sink.as_mut())?;
    tracing::info!("session ended");
    Ok(())
}
