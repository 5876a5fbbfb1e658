mod debug;
mod elf;
mod gdb;
mod tcp;

use clap::Parser;
use rv32sim_core::trace::{Stats, WriterSink};
use rv32sim_core::{Config, Core, Extensions, StepResult};
use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;
use std::time::Instant;

/// Cycle-counting RV32I instruction set simulator.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// ELF file to load and execute.
    binary: String,

    /// Drop into an interactive debug REPL instead of running to completion.
    #[arg(short, long)]
    debug: bool,

    /// Bind a GDB remote-serial-protocol stub on the given TCP port.
    #[arg(short, long, value_name = "PORT")]
    gdb: Option<u16>,

    /// Cycles charged on every taken branch, jump, and trap/interrupt entry.
    #[arg(short, long, value_name = "N", default_value_t = 2)]
    branch: u32,

    /// Enable static branch prediction (backward taken, forward not-taken).
    #[arg(short, long)]
    predict: bool,

    /// Write a per-instruction trace log to this path.
    #[arg(short, long, value_name = "PATH")]
    log: Option<String>,

    /// Suppress end-of-run statistics.
    #[arg(short, long)]
    quiet: bool,

    /// Physical base address of the memory image.
    #[arg(short = 'm', long, value_name = "N", default_value_t = 0x8000_0000)]
    membase: u32,

    /// Per-bank memory size in kilobytes; the allocated image is 2x this.
    #[arg(short = 'n', long, value_name = "KB", default_value_t = 8192)]
    memsize: u32,

    /// Enable the single-shared-RAM stall model (loads/stores cost one extra cycle).
    #[arg(short, long)]
    single: bool,

    /// Enable the M (multiply/divide) extension.
    #[arg(long)]
    ext_m: bool,

    /// Enable the C (compressed instruction) extension.
    #[arg(long)]
    ext_c: bool,

    /// Enable the B (bit-manipulation) extension.
    #[arg(long)]
    ext_b: bool,

    /// Enable the E (reduced 16-register) extension.
    #[arg(long)]
    ext_e: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let mem_size = args.memsize.saturating_mul(1024).saturating_mul(2);
    let config = Config {
        mem_base: args.membase,
        mem_size,
        branch_penalty: args.branch,
        predict: args.predict,
        single_ram: args.single,
        extensions: Extensions {
            m: args.ext_m,
            c: args.ext_c,
            b: args.ext_b,
            e: args.ext_e,
        },
        ..Config::default()
    };

    let mut core = Core::new(config);

    let bytes = match std::fs::read(&args.binary) {
        Ok(bytes) => bytes,
        Err(error) => {
            eprintln!("rv32sim: cannot read {}: {error}", args.binary);
            return ExitCode::FAILURE;
        }
    };
    let entry = match elf::load_elf(&mut core, config.mem_base, mem_size, &bytes) {
        Ok(entry) => entry,
        Err(error) => {
            eprintln!("rv32sim: {error}");
            return ExitCode::FAILURE;
        }
    };
    core.set_pc(entry);

    if let Some(path) = &args.log {
        let file = match File::create(path) {
            Ok(file) => file,
            Err(error) => {
                eprintln!("rv32sim: cannot create {path}: {error}");
                return ExitCode::FAILURE;
            }
        };
        core.set_sink(Box::new(WriterSink::new(BufWriter::new(file))));
    }

    if let Some(port) = args.gdb {
        let target = gdb::SimTarget::new(core);
        if let Err(error) = gdb::run_server(port, target) {
            eprintln!("rv32sim: gdb session failed: {error}");
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    }

    if args.debug {
        debug::run(&mut core);
        return ExitCode::SUCCESS;
    }

    let started = Instant::now();
    let status = loop {
        match core.step() {
            StepResult::Continue => {}
            StepResult::Exited(status) => break status,
        }
    };
    let wall_clock_seconds = started.elapsed().as_secs_f64();

    if !args.quiet {
        let stats = Stats {
            instructions: core.instret(),
            cycles: core.cycle(),
            wall_clock_seconds,
        };
        println!("{stats}");
    }

    ExitCode::from((status & 0xFF) as u8)
}
