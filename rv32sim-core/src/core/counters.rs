//! The `mcycle`/`mcycleh`/`minstret`/`minstreth` counter pair.
//!
//! > The RDCYCLE pseudoinstruction reads the low XLEN bits of the cycle CSR which holds a count
//! > of the number of clock cycles executed by the processor core on which the hart is running
//! > from an arbitrary start time in the past. RDCYCLEH is an RV32I instruction that reads bits
//! > 63–32 of the same cycle counter.
//!
//! > The RDINSTRET pseudoinstruction reads the low XLEN bits of the instret CSR, which counts
//! > the number of instructions retired by this hart from some arbitrary start point in the past.
//!
//! Both counters are read-only from the guest (see `csr::is_read_only`), so there is no write
//! path and no increment-suppression to model here, unlike `mtime` in `mmio.rs`.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    mcycle: u32,
    mcycleh: u32,
    minstret: u32,
    minstreth: u32,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_cycle(&mut self) {
        self.mcycle = self.mcycle.wrapping_add(1);
        if self.mcycle == 0 {
            self.mcycleh = self.mcycleh.wrapping_add(1);
        }
    }

    pub fn increment_instret(&mut self) {
        self.minstret = self.minstret.wrapping_add(1);
        if self.minstret == 0 {
            self.minstreth = self.minstreth.wrapping_add(1);
        }
    }

    pub fn read_mcycle(&self) -> u32 {
        self.mcycle
    }

    pub fn read_mcycleh(&self) -> u32 {
        self.mcycleh
    }

    pub fn read_minstret(&self) -> u32 {
        self.minstret
    }

    pub fn read_minstreth(&self) -> u32 {
        self.minstreth
    }

    /// Combined 64-bit cycle count, for statistics reporting.
    pub fn cycle64(&self) -> u64 {
        (u64::from(self.mcycleh) << 32) | u64::from(self.mcycle)
    }

    /// Combined 64-bit instructions-retired count, for statistics reporting.
    pub fn instret64(&self) -> u64 {
        (u64::from(self.minstreth) << 32) | u64::from(self.minstret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_wraps_into_high_word() {
        let mut counters = Counters::new();
        counters.mcycle = u32::MAX;
        counters.increment_cycle();
        assert_eq!(0, counters.read_mcycle());
        assert_eq!(1, counters.read_mcycleh());
    }

    #[test]
    fn test_instret_increments_each_call() {
        let mut counters = Counters::new();
        counters.increment_instret();
        assert_eq!(1, counters.read_minstret());
        counters.increment_instret();
        assert_eq!(2, counters.read_minstret());
    }
}
