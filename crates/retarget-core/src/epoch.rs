//! Historical retargeting eras.
//!
//! The network changed its difficulty rule several times. Each change is an
//! [`Epoch`] row keyed by the height of the *last* block (the block the next
//! target is computed after). A row governs from its activation height until
//! the next row takes over. Rows are never removed: replaying history must
//! reach every one of them.

use crate::compact::decode_compact;

/// Activation heights, as heights of the last block before the new target.
pub mod heights {
    /// Classic retargets look back a full day of windows.
    pub const DAILY_LOOKBACK: u32 = 99_989;
    /// Exponential moving average replaces windowed retargets.
    pub const EMA: u32 = 101_632;
    /// Classic timespans are divided by 3 instead of 24.
    pub const TRIPLE_DIVISOR: u32 = 101_909;
    /// Stall relief drops from 10x to 2x.
    pub const EMA_HALVING_STALL: u32 = 103_791;
    /// Difficulty floor and negative-duration replacement.
    pub const EMA_FLOOR: u32 = 104_291;
    /// Slower alpha, per-block duration clamps and symmetric bounds.
    pub const EMA_DAMPED: u32 = 110_323;
    /// Single block whose target is pinned.
    pub const PINNED: u32 = 137_161;
    /// Stall relief is withdrawn.
    pub const NO_STALL_RELIEF: u32 = 175_000;
    /// Back to windowed retargets over 2160 blocks.
    pub const BASIC: u32 = 181_201;
    /// First temporary ceiling stops applying.
    pub const TRANSITION_CEILING_EXPIRY: u32 = 183_000;
    /// Window shrinks to 540 blocks with 1.25x bounds.
    pub const BASIC_SHORT: u32 = 192_238;
    /// Second temporary ceiling stops applying.
    pub const FLOOR_CEILING_EXPIRY: u32 = 220_000;
}

/// Lowest difficulty the EMA rules accept after [`heights::EMA_FLOOR`]
/// (about 5254).
pub const FLOOR_BITS: u32 = 0x1b0c_7898;

/// Target handed out at [`heights::PINNED`] regardless of chain data.
pub const PINNED_BITS: u32 = 0x1b03_4c51;

/// Lowest difficulty right after the switch back from EMA (about 17.4k).
pub const TRANSITION_BITS: u32 = 0x1b03_bf8b;

/// How far back a classic retarget looks for its first block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    /// `interval - 1` blocks back.
    IntervalLessOne,
    /// `n * interval` blocks back.
    Intervals(u32),
}

/// Classic windowed retarget every adjustment interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowedRules {
    pub lookback: Lookback,
}

/// Exponential-moving-average retarget on every block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaRules {
    /// Number of block durations fed to the average.
    pub window: u32,
    /// Smoothing factor; weight of the newest duration.
    pub alpha: f32,
    /// Clamp each duration into `[spacing / 2, 1.5 * spacing]`.
    pub clamp_durations: bool,
    /// Replace negative durations with one nominal spacing.
    pub replace_negative_durations: bool,
    /// Averaged timespan never exceeds `spacing * max_ratio`.
    pub max_ratio: i64,
    /// Target multiplier when the candidate is more than ten spacings late.
    pub stall_multiplier: Option<u32>,
    /// Easiest target allowed besides the pow limit.
    pub floor_bits: Option<u32>,
}

/// Bound ratio `num / den` limiting one retarget step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratio {
    pub num: i64,
    pub den: i64,
}

impl Ratio {
    /// Smallest timespan a retarget accepts.
    pub fn lower(&self, timespan: i64) -> i64 {
        timespan * self.den / self.num
    }

    /// Largest timespan a retarget accepts.
    pub fn upper(&self, timespan: i64) -> i64 {
        timespan * self.num / self.den
    }
}

/// Temporary cap on the target, inert from `expires_at` on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ceiling {
    pub bits: u32,
    pub expires_at: u32,
}

impl Ceiling {
    /// Whether the cap still binds after a block at `height`.
    pub fn applies(&self, height: u32) -> bool {
        height < self.expires_at
    }

    /// Expanded cap.
    pub fn target(&self) -> primitive_types::U256 {
        decode_compact(self.bits).target
    }
}

/// Windowed retarget with its own interval and bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicRules {
    /// Retarget every `interval` blocks.
    pub interval: u32,
    /// Blocks of timing measured per retarget.
    pub lookback: u32,
    pub max_ratio: Ratio,
    pub ceilings: &'static [Ceiling],
}

/// Retarget algorithm and its parameters for one era.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Algorithm {
    Windowed(WindowedRules),
    Ema(EmaRules),
    /// Hand out a fixed compact target.
    Fixed(u32),
    Basic(BasicRules),
}

/// One row of the schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Epoch {
    pub name: &'static str,
    /// First last-block height the row governs.
    pub from: u32,
    pub algorithm: Algorithm,
}

/// Ordered rule eras plus the classic timespan divisors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSchedule {
    epochs: &'static [Epoch],
    timespan_divisors: &'static [(u32, i64)],
}

impl EpochSchedule {
    /// Build a schedule. Both tables must be sorted by height.
    pub const fn new(epochs: &'static [Epoch], timespan_divisors: &'static [(u32, i64)]) -> Self {
        EpochSchedule {
            epochs,
            timespan_divisors,
        }
    }

    /// The schedule the network actually ran.
    pub fn historical() -> &'static EpochSchedule {
        &HISTORICAL
    }

    /// All rows, oldest first.
    pub fn epochs(&self) -> &'static [Epoch] {
        self.epochs
    }

    /// Row governing the target after a block at `height`.
    ///
    /// Heights below the first row fall under the first row. Only an empty
    /// schedule yields `None`.
    pub fn epoch_at(&self, height: u32) -> Option<&'static Epoch> {
        let next = self.epochs.partition_point(|epoch| epoch.from <= height);
        self.epochs.get(next.saturating_sub(1))
    }

    /// Divisor applied to classic timespans measured up to `height`.
    pub fn timespan_divisor(&self, height: u32) -> i64 {
        let next = self
            .timespan_divisors
            .partition_point(|(from, _)| *from <= height);
        match next.checked_sub(1) {
            Some(index) => self.timespan_divisors[index].1,
            None => 1,
        }
    }
}

const EMA_LAUNCH: EmaRules = EmaRules {
    window: 2160,
    alpha: 0.09,
    clamp_durations: false,
    replace_negative_durations: false,
    max_ratio: 4,
    stall_multiplier: Some(10),
    floor_bits: None,
};

const EMA_HALVING_STALL: EmaRules = EmaRules {
    stall_multiplier: Some(2),
    ..EMA_LAUNCH
};

const EMA_FLOOR: EmaRules = EmaRules {
    replace_negative_durations: true,
    floor_bits: Some(FLOOR_BITS),
    ..EMA_HALVING_STALL
};

const EMA_DAMPED: EmaRules = EmaRules {
    alpha: 0.06,
    clamp_durations: true,
    max_ratio: 2,
    ..EMA_FLOOR
};

const EMA_NO_STALL_RELIEF: EmaRules = EmaRules {
    stall_multiplier: None,
    ..EMA_DAMPED
};

/// Caps in force while the network settled after leaving EMA. Both have
/// expired; they stay so that replay reproduces the blocks they shaped.
const TRANSITION_CEILINGS: &[Ceiling] = &[
    Ceiling {
        bits: TRANSITION_BITS,
        expires_at: heights::TRANSITION_CEILING_EXPIRY,
    },
    Ceiling {
        bits: FLOOR_BITS,
        expires_at: heights::FLOOR_CEILING_EXPIRY,
    },
];

const HISTORICAL_EPOCHS: &[Epoch] = &[
    Epoch {
        name: "classic",
        from: 0,
        algorithm: Algorithm::Windowed(WindowedRules {
            lookback: Lookback::IntervalLessOne,
        }),
    },
    Epoch {
        name: "daily-lookback",
        from: heights::DAILY_LOOKBACK,
        algorithm: Algorithm::Windowed(WindowedRules {
            lookback: Lookback::Intervals(24),
        }),
    },
    Epoch {
        name: "ema",
        from: heights::EMA,
        algorithm: Algorithm::Ema(EMA_LAUNCH),
    },
    Epoch {
        name: "ema-halving-stall",
        from: heights::EMA_HALVING_STALL,
        algorithm: Algorithm::Ema(EMA_HALVING_STALL),
    },
    Epoch {
        name: "ema-floor",
        from: heights::EMA_FLOOR,
        algorithm: Algorithm::Ema(EMA_FLOOR),
    },
    Epoch {
        name: "ema-damped",
        from: heights::EMA_DAMPED,
        algorithm: Algorithm::Ema(EMA_DAMPED),
    },
    // 32-bit nodes disagreed on this block's average; the agreed target is
    // pinned.
    Epoch {
        name: "pinned",
        from: heights::PINNED,
        algorithm: Algorithm::Fixed(PINNED_BITS),
    },
    Epoch {
        name: "ema-damped-resumed",
        from: heights::PINNED + 1,
        algorithm: Algorithm::Ema(EMA_DAMPED),
    },
    Epoch {
        name: "ema-no-stall-relief",
        from: heights::NO_STALL_RELIEF,
        algorithm: Algorithm::Ema(EMA_NO_STALL_RELIEF),
    },
    Epoch {
        name: "basic",
        from: heights::BASIC,
        algorithm: Algorithm::Basic(BasicRules {
            interval: 2160,
            lookback: 2160,
            max_ratio: Ratio { num: 4, den: 1 },
            ceilings: TRANSITION_CEILINGS,
        }),
    },
    Epoch {
        name: "basic-short",
        from: heights::BASIC_SHORT,
        algorithm: Algorithm::Basic(BasicRules {
            interval: 540,
            lookback: 540,
            max_ratio: Ratio { num: 5, den: 4 },
            ceilings: TRANSITION_CEILINGS,
        }),
    },
];

const HISTORICAL_TIMESPAN_DIVISORS: &[(u32, i64)] = &[
    (0, 1),
    (heights::DAILY_LOOKBACK, 24),
    (heights::TRIPLE_DIVISOR, 3),
];

static HISTORICAL: EpochSchedule =
    EpochSchedule::new(HISTORICAL_EPOCHS, HISTORICAL_TIMESPAN_DIVISORS);
