//! The diagnostics block shared by firmware, bench and host loader.

use std::fmt;

use corebench_hw::memory_map::result as layout;
use corebench_hw::specs::status;

use super::Failure;
use super::shared::SharedState;

/// Status word for a finished run
pub fn status_word(outcome: &Result<(), Failure>) -> u32 {
    match outcome {
        Ok(()) => status::OK_FLAG,
        Err(Failure(code)) => status::ERR_FLAG | u32::from(*code),
    }
}

/// Decoded diagnostics block.
///
/// Packed counters are 16 bits wide on the wire and saturate there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultBlock {
    pub status: u32,
    pub irq_count: u32,
    pub bad_mcause: u16,
    pub nested_irq: u16,
    pub bad_mie_in_handler: u16,
    pub bad_mepc_align: u16,
    pub bad_mepc_range: u16,
    pub delta_samples: u16,
    pub last_mcause: u32,
    pub last_mepc: u32,
    pub delta_min: u32,
    pub delta_max: u32,
    pub external_irqs: u32,
    pub tick_total: u32,
    pub button_total: u32,
    pub last_gpio_status: u16,
    pub last_source: u16,
    pub first_cause: u32,
    pub ignored_edges: u32,
}

fn narrow(value: u32) -> u16 {
    value.min(u32::from(u16::MAX)) as u16
}

fn pack(lo: u16, hi: u16) -> u32 {
    u32::from(lo) | (u32::from(hi) << 16)
}

fn unpack(word: u32) -> (u16, u16) {
    (word as u16, (word >> 16) as u16)
}

impl ResultBlock {
    pub fn capture(status: u32, shared: &SharedState) -> Self {
        let diag = &shared.diag;
        Self {
            status,
            irq_count: diag.irq_count,
            bad_mcause: narrow(diag.bad_mcause),
            nested_irq: narrow(diag.nested_irq),
            bad_mie_in_handler: narrow(diag.bad_mie_in_handler),
            bad_mepc_align: narrow(diag.bad_mepc_align),
            bad_mepc_range: narrow(diag.bad_mepc_range),
            delta_samples: narrow(diag.delta_samples),
            last_mcause: diag.last_mcause,
            last_mepc: diag.last_mepc,
            delta_min: diag.delta_min,
            delta_max: diag.delta_max,
            external_irqs: diag.external_irqs,
            tick_total: diag.tick_total,
            button_total: diag.button_total,
            last_gpio_status: narrow(diag.last_gpio_status),
            last_source: narrow(diag.last_source),
            first_cause: shared.first_cause.captured().unwrap_or(0),
            ignored_edges: diag.ignored_edges,
        }
    }

    pub fn to_words(&self) -> [u32; layout::WORDS] {
        let mut words = [0u32; layout::WORDS];
        words[layout::STATUS] = self.status;
        words[layout::IRQ_COUNT] = self.irq_count;
        words[layout::CAUSE_NESTED] = pack(self.bad_mcause, self.nested_irq);
        words[layout::MIE_ALIGN] = pack(self.bad_mie_in_handler, self.bad_mepc_align);
        words[layout::RANGE_SAMPLES] = pack(self.bad_mepc_range, self.delta_samples);
        words[layout::LAST_MCAUSE] = self.last_mcause;
        words[layout::LAST_MEPC] = self.last_mepc;
        words[layout::DELTA_MIN] = self.delta_min;
        words[layout::DELTA_MAX] = self.delta_max;
        words[layout::EXT_COUNT] = self.external_irqs;
        words[layout::TICK_TOTAL] = self.tick_total;
        words[layout::BUTTON_TOTAL] = self.button_total;
        words[layout::LAST_GPIO] = pack(self.last_gpio_status, self.last_source);
        words[layout::FIRST_CAUSE] = self.first_cause;
        words[layout::IGNORED_EDGES] = self.ignored_edges;
        words
    }

    /// `None` when fewer than a block's worth of words are given
    pub fn from_words(words: &[u32]) -> Option<Self> {
        let words: &[u32; layout::WORDS] = words.get(..layout::WORDS)?.try_into().ok()?;
        let (bad_mcause, nested_irq) = unpack(words[layout::CAUSE_NESTED]);
        let (bad_mie_in_handler, bad_mepc_align) = unpack(words[layout::MIE_ALIGN]);
        let (bad_mepc_range, delta_samples) = unpack(words[layout::RANGE_SAMPLES]);
        let (last_gpio_status, last_source) = unpack(words[layout::LAST_GPIO]);
        Some(Self {
            status: words[layout::STATUS],
            irq_count: words[layout::IRQ_COUNT],
            bad_mcause,
            nested_irq,
            bad_mie_in_handler,
            bad_mepc_align,
            bad_mepc_range,
            delta_samples,
            last_mcause: words[layout::LAST_MCAUSE],
            last_mepc: words[layout::LAST_MEPC],
            delta_min: words[layout::DELTA_MIN],
            delta_max: words[layout::DELTA_MAX],
            external_irqs: words[layout::EXT_COUNT],
            tick_total: words[layout::TICK_TOTAL],
            button_total: words[layout::BUTTON_TOTAL],
            last_gpio_status,
            last_source,
            first_cause: words[layout::FIRST_CAUSE],
            ignored_edges: words[layout::IGNORED_EDGES],
        })
    }

    pub fn passed(&self) -> bool {
        self.status == status::OK_FLAG
    }

    /// Failure code, if the status word carries one
    pub fn failure_code(&self) -> Option<u16> {
        (self.status & 0xFFFF_0000 == status::ERR_FLAG).then_some(self.status as u16)
    }
}

impl fmt::Display for ResultBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.passed(), self.failure_code()) {
            (true, _) => writeln!(f, "status        PASS (0x{:08x})", self.status)?,
            (false, Some(code)) => writeln!(f, "status        FAIL 0x{code:04x}")?,
            (false, None) => writeln!(f, "status        unknown (0x{:08x})", self.status)?,
        }
        writeln!(f, "irq_count     {}", self.irq_count)?;
        writeln!(f, "ext_count     {}", self.external_irqs)?;
        writeln!(f, "bad_mcause    {}", self.bad_mcause)?;
        writeln!(f, "nested_irq    {}", self.nested_irq)?;
        writeln!(f, "bad_mie       {}", self.bad_mie_in_handler)?;
        writeln!(f, "bad_align     {}", self.bad_mepc_align)?;
        writeln!(f, "bad_range     {}", self.bad_mepc_range)?;
        writeln!(f, "last_mcause   0x{:08x}", self.last_mcause)?;
        writeln!(f, "last_mepc     0x{:08x}", self.last_mepc)?;
        if self.delta_samples == 0 {
            writeln!(f, "delta         no samples")?;
        } else {
            writeln!(
                f,
                "delta         min {} max {} ({} samples)",
                self.delta_min, self.delta_max, self.delta_samples
            )?;
        }
        writeln!(f, "ticks         {}", self.tick_total)?;
        writeln!(f, "buttons       {}", self.button_total)?;
        writeln!(f, "ignored_edges {}", self.ignored_edges)?;
        writeln!(
            f,
            "last_gpio     0x{:04x} (pin {})",
            self.last_gpio_status, self.last_source
        )?;
        write!(f, "first_cause   0x{:08x}", self.first_cause)
    }
}
