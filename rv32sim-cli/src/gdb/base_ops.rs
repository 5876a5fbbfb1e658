use gdbstub::target::ext::base::single_register_access::{
    SingleRegisterAccess, SingleRegisterAccessOps,
};
use gdbstub::target::ext::base::singlethread::{SingleThreadBase, SingleThreadResumeOps};
use gdbstub::target::{TargetError, TargetResult};
use gdbstub_arch::riscv::reg::id::RiscvRegId;
use gdbstub_arch::riscv::reg::RiscvCoreRegs;
use rv32sim_core::registers::Specifier;
use std::io::Write;

use super::SimTarget;

/// Machine mode's 2-bit encoding, per the privileged spec. This simulator implements no other
/// privilege level.
const PRIV_MACHINE: u8 = 0b11;

impl SingleThreadBase for SimTarget {
    fn read_registers(&mut self, regs: &mut RiscvCoreRegs<u32>) -> TargetResult<(), Self> {
        for r in Specifier::iter_all() {
            regs.x[usize::from(r)] = self.core.read_register(r);
        }
        regs.pc = self.core.pc();
        Ok(())
    }

    fn write_registers(&mut self, regs: &RiscvCoreRegs<u32>) -> TargetResult<(), Self> {
        for r in Specifier::iter_all() {
            self.core.write_register(r, regs.x[usize::from(r)]);
        }
        self.core.set_pc(regs.pc);
        Ok(())
    }

    fn support_single_register_access(&mut self) -> Option<SingleRegisterAccessOps<'_, (), Self>> {
        Some(self)
    }

    fn read_addrs(&mut self, start_addr: u32, data: &mut [u8]) -> TargetResult<usize, Self> {
        match self.core.read_memory_debug(start_addr, data) {
            Ok(()) => Ok(data.len()),
            Err(_) => Err(TargetError::NonFatal),
        }
    }

    fn write_addrs(&mut self, start_addr: u32, data: &[u8]) -> TargetResult<(), Self> {
        self.core
            .write_memory_debug(start_addr, data)
            .map_err(|_| TargetError::NonFatal)
    }

    fn support_resume(&mut self) -> Option<SingleThreadResumeOps<'_, Self>> {
        Some(self)
    }
}

impl SingleRegisterAccess<()> for SimTarget {
    fn read_register(
        &mut self,
        _tid: (),
        reg_id: RiscvRegId<u32>,
        mut buf: &mut [u8],
    ) -> TargetResult<usize, Self> {
        match reg_id {
            RiscvRegId::Gpr(i) => {
                let specifier = Specifier::new(i).ok_or(TargetError::NonFatal)?;
                let value = self.core.read_register(specifier);
                Ok(buf.write(&value.to_le_bytes())?)
            }
            RiscvRegId::Pc => Ok(buf.write(&self.core.pc().to_le_bytes())?),
            RiscvRegId::Csr(number) => match self.core.read_csr_debug(number) {
                Some(value) => Ok(buf.write(&value.to_le_bytes())?),
                None => Err(TargetError::NonFatal),
            },
            RiscvRegId::Priv => match buf.first_mut() {
                Some(byte) => {
                    *byte = PRIV_MACHINE;
                    Ok(1)
                }
                None => Ok(0),
            },
            _ => Err(TargetError::NonFatal),
        }
    }

    fn write_register(
        &mut self,
        _tid: (),
        reg_id: RiscvRegId<u32>,
        val: &[u8],
    ) -> TargetResult<(), Self> {
        let mut buf = [0u8; 4];
        let len = val.len().min(4);
        buf[..len].copy_from_slice(&val[..len]);
        let value = u32::from_le_bytes(buf);

        match reg_id {
            RiscvRegId::Gpr(i) => {
                let specifier = Specifier::new(i).ok_or(TargetError::NonFatal)?;
                self.core.write_register(specifier, value);
                Ok(())
            }
            RiscvRegId::Pc => {
                self.core.set_pc(value);
                Ok(())
            }
            RiscvRegId::Csr(number) => {
                if self.core.write_csr_debug(number, value) {
                    Ok(())
                } else {
                    Err(TargetError::NonFatal)
                }
            }
            _ => Err(TargetError::NonFatal),
        }
    }
}
