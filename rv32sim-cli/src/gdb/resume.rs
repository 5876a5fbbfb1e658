use gdbstub::common::Signal;
use gdbstub::target::ext::base::singlethread::{SingleThreadResume, SingleThreadSingleStepOps};

use super::{ExecutionMode, SimTarget};

impl SingleThreadResume for SimTarget {
    fn resume(&mut self, _signal: Option<Signal>) -> Result<(), Self::Error> {
        self.execution_mode = ExecutionMode::Continue;
        Ok(())
    }

    fn support_single_step(&mut self) -> Option<SingleThreadSingleStepOps<'_, Self>> {
        Some(self)
    }
}

impl gdbstub::target::ext::base::singlethread::SingleThreadSingleStep for SimTarget {
    fn step(&mut self, _signal: Option<Signal>) -> Result<(), Self::Error> {
        self.execution_mode = ExecutionMode::Step;
        Ok(())
    }
}
