//! The optional GDB remote-serial-protocol bridge: a synchronous `gdbstub` target wrapping a
//! [`Core`](rv32sim_core::Core) directly, since the simulator is itself single-threaded.

mod base_ops;
mod breakpoints;
mod event_loop;
mod resume;

pub use event_loop::SimEventLoop;

use gdbstub::arch::Arch;
use gdbstub::stub::{DisconnectReason, GdbStub, GdbStubError};
use gdbstub::target::ext::base::BaseOps;
use gdbstub::target::ext::breakpoints::BreakpointsOps;
use gdbstub::target::Target;
use gdbstub_arch::riscv::reg::{id::RiscvRegId, RiscvCoreRegs};
use gdbstub_arch::riscv::Riscv32;
use rv32sim_core::Core;

use crate::tcp::TcpStream;

/// The architecture description handed to `gdbstub`: RV32 general registers and pc, with no
/// target-description XML (the register set is the default one `gdbstub_arch` already knows).
pub struct OurRiscv32;

impl Arch for OurRiscv32 {
    type Usize = u32;
    type Registers = RiscvCoreRegs<u32>;
    type BreakpointKind = <Riscv32 as Arch>::BreakpointKind;
    type RegId = RiscvRegId<u32>;

    fn target_description_xml() -> Option<&'static str> {
        None
    }
}

#[derive(Debug)]
pub enum GdbTargetError {
    MemoryAccess,
}

impl std::fmt::Display for GdbTargetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "memory access error")
    }
}

impl std::error::Error for GdbTargetError {}

/// Whether the next `wait_for_stop_reason` should execute a single instruction or run freely
/// until a breakpoint, trap-free guest exit, or gdb interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionMode {
    Step,
    Continue,
}

/// Owns the simulated core for the duration of a debug session.
pub struct SimTarget {
    pub(crate) core: Core,
    pub(crate) execution_mode: ExecutionMode,
}

impl SimTarget {
    pub fn new(core: Core) -> Self {
        Self {
            core,
            execution_mode: ExecutionMode::Step,
        }
    }
}

impl Target for SimTarget {
    type Arch = OurRiscv32;
    type Error = GdbTargetError;

    fn base_ops(&mut self) -> BaseOps<'_, Self::Arch, Self::Error> {
        BaseOps::SingleThread(self)
    }

    fn support_breakpoints(&mut self) -> Option<BreakpointsOps<'_, Self>> {
        Some(self)
    }
}

pub type GdbError = GdbStubError<GdbTargetError, std::io::Error>;

/// Accepts one TCP connection on `port` and runs the gdb remote-serial-protocol session to
/// completion, blocking the calling thread.
pub fn run_server(port: u16, mut target: SimTarget) -> std::io::Result<()> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", port))?;
    log::info!("waiting for a GDB connection on 127.0.0.1:{port}...");
    let (stream, addr) = listener.accept()?;
    log::info!("debugger connected from {addr}");

    let connection = TcpStream::new(stream)?;
    let stub = GdbStub::new(connection);

    match stub.run_blocking::<SimEventLoop>(&mut target) {
        Ok(DisconnectReason::Disconnect) => log::warn!("client disconnected"),
        Ok(DisconnectReason::TargetExited(code)) => {
            log::warn!("target exited with code {code}")
        }
        Ok(DisconnectReason::TargetTerminated(signal)) => {
            log::warn!("target terminated with signal {signal}")
        }
        Ok(DisconnectReason::Kill) => log::warn!("GDB sent a kill command"),
        Err(error) => log::warn!("gdb session ended with an error: {error:?}"),
    }

    Ok(())
}
