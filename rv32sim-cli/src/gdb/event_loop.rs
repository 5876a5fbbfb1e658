use gdbstub::common::Signal;
use gdbstub::conn::{Connection, ConnectionExt};
use gdbstub::stub::run_blocking::{self, BlockingEventLoop};
use gdbstub::stub::SingleThreadStopReason;
use gdbstub::target::Target;
use rv32sim_core::StepResult;

use super::{ExecutionMode, SimTarget};
use crate::tcp::TcpStream;

/// Drives the simulator between gdb commands: steps the core until a breakpoint is hit, the
/// guest exits, a single step completes (in step mode), or incoming gdb traffic arrives.
pub struct SimEventLoop;

impl BlockingEventLoop for SimEventLoop {
    type Target = SimTarget;
    type Connection = TcpStream;
    type StopReason = SingleThreadStopReason<u32>;

    fn wait_for_stop_reason(
        target: &mut SimTarget,
        conn: &mut TcpStream,
    ) -> Result<
        run_blocking::Event<Self::StopReason>,
        run_blocking::WaitForStopReasonError<
            <Self::Target as Target>::Error,
            <Self::Connection as Connection>::Error,
        >,
    > {
        loop {
            if conn
                .peek()
                .map_err(run_blocking::WaitForStopReasonError::Connection)?
                .is_some()
            {
                let byte = conn
                    .read()
                    .map_err(run_blocking::WaitForStopReasonError::Connection)?;
                return Ok(run_blocking::Event::IncomingData(byte));
            }

            if let StepResult::Exited(status) = target.core.step() {
                return Ok(run_blocking::Event::TargetStopped(
                    SingleThreadStopReason::Exited(status as u8),
                ));
            }

            if target.core.has_breakpoint(target.core.pc()) {
                return Ok(run_blocking::Event::TargetStopped(
                    SingleThreadStopReason::SwBreak(()),
                ));
            }

            if target.execution_mode == ExecutionMode::Step {
                return Ok(run_blocking::Event::TargetStopped(
                    SingleThreadStopReason::DoneStep,
                ));
            }
        }
    }

    fn on_interrupt(
        _target: &mut SimTarget,
    ) -> Result<Option<Self::StopReason>, <Self::Target as Target>::Error> {
        Ok(Some(SingleThreadStopReason::Signal(Signal::SIGINT)))
    }
}
