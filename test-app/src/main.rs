// rtltcp test application -- CLI tool for exercising an rtl_tcp server
// from the command line.
//
// Usage:
//   rtltcp-test-app --addr 127.0.0.1:1234 info
//   rtltcp-test-app tune --freq 100000000 --rate 2048000 --gain 197
//   rtltcp-test-app tune --freq 433920000 --auto-gain --ppm -3 --agc
//   rtltcp-test-app capture --count 2048000 --freq 100000000 --output fm.cu8
//   rtltcp-test-app set direct-sampling 2
//
// Logging is controlled by RUST_LOG, e.g. RUST_LOG=rtltcp=debug.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use num_complex::Complex64;
use tracing_subscriber::EnvFilter;

use rtltcp::{
    Command as RtlCommand, GainMode, Opcode, RtlTcpBuilder, RtlTcpClient, SdrControl,
    dc_offset, format_freq_mhz, format_gain_db, mean_power_dbfs,
};

/// Samples per read while capturing.
const CAPTURE_BLOCK: usize = 16_384;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// rtltcp test application -- exercises an rtl_tcp server from the command line.
#[derive(Parser)]
#[command(name = "rtltcp-test-app", version, about)]
struct Cli {
    /// Server address as host:port.
    #[arg(long, default_value = "127.0.0.1:1234")]
    addr: String,

    /// Connect and handshake timeout in milliseconds.
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Per-read sample timeout in milliseconds (default: wait forever).
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Refuse servers whose greeting magic is not RTL0.
    #[arg(long)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the dongle description from the server greeting.
    Info,

    /// Apply tuning settings.
    Tune {
        /// Center frequency in Hz.
        #[arg(long)]
        freq: u32,

        /// Sample rate in Hz.
        #[arg(long)]
        rate: Option<u32>,

        /// Manual tuner gain in tenths of a dB.
        #[arg(long, allow_hyphen_values = true, conflicts_with = "auto_gain")]
        gain: Option<i32>,

        /// Let the tuner pick its own gain.
        #[arg(long)]
        auto_gain: bool,

        /// Frequency correction in ppm.
        #[arg(long, allow_hyphen_values = true)]
        ppm: Option<i32>,

        /// Enable the RTL2832U digital AGC.
        #[arg(long)]
        agc: bool,
    },

    /// Read I/Q samples and summarize or save them.
    Capture {
        /// Number of I/Q pairs to read.
        #[arg(long)]
        count: u64,

        /// Center frequency in Hz.
        #[arg(long)]
        freq: Option<u32>,

        /// Sample rate in Hz.
        #[arg(long)]
        rate: Option<u32>,

        /// Write raw interleaved u8 I/Q to this file instead of printing
        /// a power summary.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Send a single command by name, e.g. `set gain-mode 1`.
    Set {
        /// Command name (center-freq, sample-rate, gain-mode, tuner-gain,
        /// freq-correction, if-gain, test-mode, agc-mode, direct-sampling,
        /// offset-tuning, rtl-xtal-freq, tuner-xtal-freq, gain-by-index).
        name: String,

        /// Parameter; negative values are sent as two's complement.
        #[arg(allow_hyphen_values = true, value_parser = parse_param)]
        value: u32,
    },
}

/// Parse a command parameter, accepting anything that fits in 32 bits
/// either signed or unsigned.
fn parse_param(s: &str) -> std::result::Result<u32, String> {
    if let Ok(v) = s.parse::<u32>() {
        return Ok(v);
    }
    s.parse::<i32>()
        .map(|v| v as u32)
        .map_err(|_| format!("'{s}' is not a 32-bit integer"))
}

// ---------------------------------------------------------------------------
// Connection setup
// ---------------------------------------------------------------------------

async fn connect(cli: &Cli) -> Result<RtlTcpClient> {
    let timeout = Duration::from_millis(cli.timeout_ms);
    RtlTcpBuilder::new(&cli.addr)
        .connect_timeout(timeout)
        .handshake_timeout(timeout)
        .read_timeout(cli.read_timeout_ms.map(Duration::from_millis))
        .strict_handshake(cli.strict)
        .build()
        .await
        .with_context(|| format!("failed to connect to rtl_tcp server at {}", cli.addr))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_info(client: &RtlTcpClient) -> Result<()> {
    let info = client.info();
    println!("rtl_tcp server at {}", client.peer());
    println!("  Magic:          {}", rtltcp::Magic(&info.magic));
    println!("  Valid:          {}", info.is_valid());
    println!("  Tuner:          {} (id {})", info.tuner, info.tuner.id());
    println!("  Gain steps:     {}", info.gain_count);
    Ok(())
}

async fn cmd_tune(
    client: &RtlTcpClient,
    freq: u32,
    rate: Option<u32>,
    gain: Option<i32>,
    auto_gain: bool,
    ppm: Option<i32>,
    agc: bool,
) -> Result<()> {
    if let Some(rate) = rate {
        client.set_sample_rate(rate).await.context("set sample rate")?;
        println!("Sample rate:    {rate} Hz");
    }
    if let Some(ppm) = ppm {
        client
            .set_freq_correction(ppm)
            .await
            .context("set frequency correction")?;
        println!("Correction:     {ppm} ppm");
    }
    client.set_center_freq(freq).await.context("set frequency")?;
    println!("Frequency:      {}", format_freq_mhz(freq));

    match (gain, auto_gain) {
        (Some(gain), _) => {
            client
                .set_gain_mode(GainMode::Manual)
                .await?
                .set_gain(gain)
                .await
                .context("set gain")?;
            println!("Gain:           {}", format_gain_db(gain));
        }
        (None, true) => {
            client
                .set_gain_mode(GainMode::Automatic)
                .await
                .context("set gain mode")?;
            println!("Gain:           auto");
        }
        (None, false) => {}
    }

    if agc {
        client.set_agc_mode(true).await.context("enable AGC")?;
        println!("Digital AGC:    on");
    }
    Ok(())
}

async fn cmd_capture(
    client: &mut RtlTcpClient,
    count: u64,
    freq: Option<u32>,
    rate: Option<u32>,
    output: Option<&PathBuf>,
) -> Result<()> {
    if let Some(rate) = rate {
        client.set_sample_rate(rate).await.context("set sample rate")?;
    }
    if let Some(freq) = freq {
        client.set_center_freq(freq).await.context("set frequency")?;
    }

    if count == 0 {
        bail!("nothing to capture: --count must be greater than zero");
    }

    let start = Instant::now();
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            let mut block = vec![0u8; CAPTURE_BLOCK * 2];
            let mut remaining = count;
            while remaining > 0 {
                let pairs = remaining.min(CAPTURE_BLOCK as u64) as usize;
                let buf = &mut block[..pairs * 2];
                client.read_bytes(buf).await.context("sample read failed")?;
                out.write_all(buf)?;
                remaining -= pairs as u64;
            }
            out.flush()?;
            println!("Wrote {count} I/Q pairs to {}", path.display());
        }
        None => {
            let mut block = vec![Complex64::new(0.0, 0.0); CAPTURE_BLOCK];
            let mut remaining = count;
            let mut power_sum = 0.0;
            let mut dc_sum = Complex64::new(0.0, 0.0);
            let mut blocks = 0u32;
            while remaining > 0 {
                let pairs = remaining.min(CAPTURE_BLOCK as u64) as usize;
                let buf = &mut block[..pairs];
                client.read_complex(buf).await.context("sample read failed")?;
                // Average in the linear domain, weighted by block length.
                power_sum += 10f64.powf(mean_power_dbfs(buf) / 10.0) * pairs as f64;
                dc_sum += dc_offset(buf) * pairs as f64;
                blocks += 1;
                remaining -= pairs as u64;
            }
            let n = count as f64;
            let dc = dc_sum / n;
            println!("Captured:       {count} I/Q pairs in {blocks} blocks");
            println!("Mean power:     {:.2} dBFS", 10.0 * (power_sum / n).log10());
            println!("DC offset:      {:+.4} {:+.4}j", dc.re, dc.im);
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    if elapsed > 0.0 {
        println!("Elapsed:        {elapsed:.3} s ({:.0} pairs/s)", count as f64 / elapsed);
    }
    Ok(())
}

async fn cmd_set(client: &RtlTcpClient, name: &str, value: u32) -> Result<()> {
    let Some(opcode) = Opcode::from_name(name) else {
        let names: Vec<&str> = Opcode::ALL.iter().map(|op| op.name()).collect();
        bail!("unknown command '{name}'; expected one of: {}", names.join(", "));
    };

    // Route through the typed method so the gain table bound is enforced.
    if opcode == Opcode::GainByIndex {
        client.set_gain_by_index(value).await?;
    } else {
        client.execute(RtlCommand::new(opcode, value)).await?;
    }
    println!("Sent {}", RtlCommand::new(opcode, value));
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut client = connect(&cli).await?;

    if let Err(e) = client.check_handshake() {
        eprintln!("warning: {e}");
    }

    let result = match &cli.command {
        Command::Info => cmd_info(&client),
        Command::Tune {
            freq,
            rate,
            gain,
            auto_gain,
            ppm,
            agc,
        } => cmd_tune(&client, *freq, *rate, *gain, *auto_gain, *ppm, *agc).await,
        Command::Capture {
            count,
            freq,
            rate,
            output,
        } => cmd_capture(&mut client, *count, *freq, *rate, output.as_ref()).await,
        Command::Set { name, value } => cmd_set(&client, name, *value).await,
    };

    client.close().await.ok();
    result
}
