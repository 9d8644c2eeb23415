//! Machine-mode hart model.
//!
//! Only the state the interrupt path depends on is modelled: the trap
//! CSRs, a program counter walking the firmware's busy loop, trap entry,
//! `mret` and interrupt arbitration. [`HartFaults`] turns individual
//! pieces of that behaviour wrong on purpose, so benches can prove that
//! the firmware notices.
//!
//! # References
//! - RISC-V Privileged Architecture, machine-level CSRs and trap entry

use corebench_hw::specs::{cause, csr};
use tracing::{debug, warn};

use crate::firmware::platform::Csr;

/// Start of the main-line busy loop in IMEM
pub const MAIN_LOOP_BASE: u32 = 0x0000_0200;

/// Length of the busy loop in bytes
const MAIN_LOOP_LEN: u32 = 0x20;

/// Instruction size in bytes
const INSN_SIZE: u32 = 4;

/// `mcause` of an illegal-instruction exception
pub const ILLEGAL_INSTRUCTION: u32 = 2;

/// Deliberate deviations from correct trap behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HartFaults {
    /// Trap entry leaves `mstatus.MIE` set
    pub keep_mie_on_trap: bool,
    /// Added to the `mepc` reported on trap entry
    pub mepc_skew: u32,
    /// Timer wins arbitration over external
    pub invert_priority: bool,
    /// Raise an illegal-instruction exception once this many
    /// instructions have retired
    pub illegal_trap_at: Option<u64>,
    /// Interrupts are taken with `mstatus.MIE` clear
    pub ignore_global_enable: bool,
    /// Timer interrupts are taken with `mie.MTIE` clear
    pub ignore_timer_enable: bool,
    /// External interrupts are taken with `mie.MEIE` clear
    pub ignore_external_enable: bool,
}

impl HartFaults {
    pub fn is_healthy(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug)]
pub struct Hart {
    mstatus: u32,
    mie: u32,
    mtvec: u32,
    mepc: u32,
    mcause: u32,
    pc: u32,
    retired: u64,
    faults: HartFaults,
}

impl Hart {
    pub fn new(faults: HartFaults) -> Self {
        if !faults.is_healthy() {
            debug!(?faults, "hart faults injected");
        }
        Self {
            mstatus: 0,
            mie: 0,
            mtvec: 0,
            mepc: 0,
            mcause: 0,
            pc: MAIN_LOOP_BASE,
            retired: 0,
            faults,
        }
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn retired(&self) -> u64 {
        self.retired
    }

    /// `mip` is not stored here; the caller supplies the live pending bits.
    pub fn read_csr(&self, csr: Csr, mip: u32) -> u32 {
        match csr {
            Csr::Mstatus => self.mstatus,
            Csr::Mie => self.mie,
            Csr::Mtvec => self.mtvec,
            Csr::Mepc => self.mepc,
            Csr::Mcause => self.mcause,
            Csr::Mip => mip,
        }
    }

    pub fn write_csr(&mut self, csr: Csr, value: u32) {
        match csr {
            Csr::Mstatus => self.mstatus = value & (csr::MSTATUS_MIE | csr::MSTATUS_MPIE),
            Csr::Mie => self.mie = value & (csr::MTI | csr::MEI),
            Csr::Mtvec => self.mtvec = value,
            Csr::Mepc => self.mepc = value,
            Csr::Mcause => self.mcause = value,
            Csr::Mip => warn!("Write to read-only mip ignored: {:#X}", value),
        }
    }

    /// Local enables as the arbiter applies them
    fn effective_mie(&self) -> u32 {
        let mut mie = self.mie;
        if self.faults.ignore_timer_enable {
            mie |= csr::MTI;
        }
        if self.faults.ignore_external_enable {
            mie |= csr::MEI;
        }
        mie
    }

    /// Any locally enabled interrupt pending; wakes `wfi` regardless of
    /// the global enable.
    pub fn wake_pending(&self, mip: u32) -> bool {
        mip & self.effective_mie() != 0
    }

    /// Interrupt to take at the next boundary, highest priority first
    pub fn select(&self, mip: u32) -> Option<u32> {
        let enabled = self.mstatus & csr::MSTATUS_MIE != 0 || self.faults.ignore_global_enable;
        if self.mtvec == 0 || !enabled {
            return None;
        }
        let ready = mip & self.effective_mie();
        let order = if self.faults.invert_priority {
            [(csr::MTI, cause::MACHINE_TIMER), (csr::MEI, cause::MACHINE_EXTERNAL)]
        } else {
            [(csr::MEI, cause::MACHINE_EXTERNAL), (csr::MTI, cause::MACHINE_TIMER)]
        };
        order
            .into_iter()
            .find(|(bit, _)| ready & bit != 0)
            .map(|(_, mcause)| mcause)
    }

    /// Synchronous exception due now, if the fault plan has one
    pub fn take_exception(&mut self) -> Option<u32> {
        match self.faults.illegal_trap_at {
            Some(at) if self.retired >= at => {
                self.faults.illegal_trap_at = None;
                Some(ILLEGAL_INSTRUCTION)
            }
            _ => None,
        }
    }

    /// Enters a trap and returns the pc to resume at.
    ///
    /// The caller holds the resume pc across the handler, so a nested
    /// entry overwriting `mepc` does not lose the outer return point.
    pub fn enter_trap(&mut self, mcause: u32) -> u32 {
        let resume = self.pc;
        self.mepc = self.pc.wrapping_add(self.faults.mepc_skew);
        self.mcause = mcause;

        let mie = self.mstatus & csr::MSTATUS_MIE != 0;
        self.mstatus &= !csr::MSTATUS_MPIE;
        if mie {
            self.mstatus |= csr::MSTATUS_MPIE;
        }
        if !self.faults.keep_mie_on_trap {
            self.mstatus &= !csr::MSTATUS_MIE;
        }
        self.pc = self.mtvec & !0b11;
        resume
    }

    pub fn mret(&mut self, resume: u32) {
        let mpie = self.mstatus & csr::MSTATUS_MPIE != 0;
        self.mstatus &= !csr::MSTATUS_MIE;
        if mpie {
            self.mstatus |= csr::MSTATUS_MIE;
        }
        self.mstatus |= csr::MSTATUS_MPIE;
        self.pc = resume;
    }

    /// Retires one instruction: the main line walks its busy loop, a
    /// handler runs straight on from the vector.
    pub fn retire(&mut self) {
        self.retired += 1;
        self.pc = if (MAIN_LOOP_BASE..MAIN_LOOP_BASE + MAIN_LOOP_LEN).contains(&self.pc) {
            MAIN_LOOP_BASE + (self.pc - MAIN_LOOP_BASE + INSN_SIZE) % MAIN_LOOP_LEN
        } else {
            self.pc.wrapping_add(INSN_SIZE)
        };
    }
}
