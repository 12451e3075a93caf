//! Next-target computation.
//!
//! [`Retargeter::next_work_required`] looks up the era governing the last
//! block in the [`EpochSchedule`] and runs that era's algorithm. All target
//! arithmetic multiplies before dividing in 512 bits, so nothing wraps and
//! truncation happens exactly once per step.

use alloc::vec;

use log::{debug, trace, warn};
use primitive_types::{U256, U512};

use crate::chain::{BlockId, ChainBlock, ChainView};
use crate::compact::{bits_to_target, encode_compact};
use crate::epoch::{Algorithm, BasicRules, EmaRules, EpochSchedule, Lookback, WindowedRules};
use crate::error::RetargetError;
use crate::params::ConsensusParams;

/// Difficulty retargeting engine for one parameter set.
///
/// Holds no mutable state: every call is a pure function of the chain view,
/// the candidate time and the parameters.
#[derive(Debug, Clone, Copy)]
pub struct Retargeter<'a> {
    params: &'a ConsensusParams,
    schedule: &'a EpochSchedule,
}

impl<'a> Retargeter<'a> {
    /// Engine following the historical epoch schedule.
    pub fn new(params: &'a ConsensusParams) -> Self {
        Self::with_schedule(params, EpochSchedule::historical())
    }

    /// Engine following a custom epoch schedule.
    pub fn with_schedule(params: &'a ConsensusParams, schedule: &'a EpochSchedule) -> Self {
        Retargeter { params, schedule }
    }

    pub fn params(&self) -> &'a ConsensusParams {
        self.params
    }

    pub fn schedule(&self) -> &'a EpochSchedule {
        self.schedule
    }

    /// Compact target the block after `last` must meet.
    ///
    /// # Arguments
    /// * `chain` - Read-only ancestry containing `last`
    /// * `last` - Current tip, or `None` when the candidate is genesis
    /// * `candidate_time` - Timestamp of the candidate block
    pub fn next_work_required<C: ChainView + ?Sized>(
        &self,
        chain: &C,
        last: Option<BlockId>,
        candidate_time: i64,
    ) -> Result<u32, RetargetError> {
        let Some(last_id) = last else {
            debug!("genesis candidate, using pow limit");
            return Ok(self.params.pow_limit_bits());
        };
        let last = lookup(chain, last_id)?;

        let epoch = self
            .schedule
            .epoch_at(last.height)
            .ok_or(RetargetError::NoEpoch(last.height))?;
        trace!("height {} governed by epoch '{}'", last.height, epoch.name);

        match &epoch.algorithm {
            Algorithm::Windowed(rules) => self.windowed(chain, last_id, last, candidate_time, rules),
            Algorithm::Ema(rules) => self.ema(chain, last, candidate_time, rules),
            Algorithm::Fixed(bits) => {
                debug!("height {} pinned to {:08x}", last.height, bits);
                Ok(*bits)
            }
            Algorithm::Basic(rules) => self.basic(chain, last_id, last, rules),
        }
    }

    /// Classic retarget from the timespan between `first_block_time` and
    /// `last`, bounded to a factor of four either way.
    ///
    /// Returns `last.bits` untouched when retargeting is disabled.
    pub fn calculate_next_work(&self, last: &ChainBlock, first_block_time: i64) -> u32 {
        if self.params.no_retargeting {
            return last.bits;
        }

        let timespan = self.params.target_timespan;
        let measured = (last.time - first_block_time) / self.schedule.timespan_divisor(last.height);
        let actual = measured.max(timespan / 4).min(timespan * 4);

        let target = scale(bits_to_target(last.bits), actual, timespan).min(self.params.pow_limit);
        let bits = encode_compact(target);
        debug!(
            "classic retarget after height {}: timespan {}s (measured {}s), {:08x} -> {:08x}",
            last.height, actual, measured, last.bits, bits
        );
        bits
    }

    fn windowed<'c, C: ChainView + ?Sized>(
        &self,
        chain: &'c C,
        last_id: BlockId,
        last: &'c ChainBlock,
        candidate_time: i64,
        rules: &WindowedRules,
    ) -> Result<u32, RetargetError> {
        let interval = self.params.difficulty_adjustment_interval().max(1);
        let height = i64::from(last.height);

        if (height + 1) % interval != 0 {
            if !self.params.allow_min_difficulty_blocks {
                return Ok(last.bits);
            }

            let pow_limit_bits = self.params.pow_limit_bits();
            if candidate_time > last.time + self.params.target_spacing * 2 {
                warn!(
                    "no block for {}s after height {}, allowing a min-difficulty block",
                    candidate_time - last.time,
                    last.height
                );
                return Ok(pow_limit_bits);
            }

            // Skip back over min-difficulty blocks to the last real target.
            let mut block = last;
            while let Some(prev) = block.prev {
                if i64::from(block.height) % interval == 0 || block.bits != pow_limit_bits {
                    break;
                }
                block = lookup(chain, prev)?;
            }
            return Ok(block.bits);
        }

        let span = match rules.lookback {
            Lookback::IntervalLessOne => interval - 1,
            Lookback::Intervals(count) => interval * i64::from(count),
        };
        let first = ancestor_at(chain, last_id, last, height - span)?;

        Ok(self.calculate_next_work(last, first.time))
    }

    fn ema<'c, C: ChainView + ?Sized>(
        &self,
        chain: &'c C,
        last: &'c ChainBlock,
        candidate_time: i64,
        rules: &EmaRules,
    ) -> Result<u32, RetargetError> {
        let spacing = self.params.target_spacing;
        let floor = rules.floor_bits.map(bits_to_target);
        let old = bits_to_target(last.bits);

        if let Some(multiplier) = rules.stall_multiplier {
            if candidate_time > last.time + spacing * 10 {
                let mut target = scale(old, i64::from(multiplier), 1);
                if let Some(floor) = floor {
                    target = target.min(floor);
                }
                target = target.min(self.params.pow_limit);

                let bits = encode_compact(target);
                warn!(
                    "no block for {}s after height {}, relaxing target x{}: {:08x} -> {:08x}",
                    candidate_time - last.time,
                    last.height,
                    multiplier,
                    last.bits,
                    bits
                );
                return Ok(bits);
            }
        }

        // Oldest duration first.
        let mut durations = vec![0i64; rules.window as usize];
        let mut block = last;
        for slot in durations.iter_mut().rev() {
            let parent_id = block.prev.ok_or(RetargetError::MissingAncestor {
                from: last.height,
                height: i64::from(block.height) - 1,
            })?;
            let parent = lookup(chain, parent_id)?;
            *slot = limit_duration(block.time - parent.time, spacing, rules);
            block = parent;
        }

        let average = smoothed_duration(&durations, rules.alpha, spacing);
        let actual = average.max(spacing / 2).min(spacing * rules.max_ratio);

        let mut target = scale(old, actual, spacing);
        if let Some(floor) = floor {
            target = target.min(floor);
        }
        target = target.min(self.params.pow_limit);

        let bits = encode_compact(target);
        debug!(
            "ema retarget after height {}: average {}s (bounded {}s), {:08x} -> {:08x}",
            last.height, average, actual, last.bits, bits
        );
        Ok(bits)
    }

    fn basic<'c, C: ChainView + ?Sized>(
        &self,
        chain: &'c C,
        last_id: BlockId,
        last: &'c ChainBlock,
        rules: &BasicRules,
    ) -> Result<u32, RetargetError> {
        let interval = i64::from(rules.interval.max(1));
        let lookback = i64::from(rules.lookback);
        let height = i64::from(last.height);

        if (height + 1) % interval != 0 || height < lookback {
            return Ok(last.bits);
        }

        let first = ancestor_at(chain, last_id, last, height - lookback)?;
        let timespan = self.params.target_spacing * interval;
        // A lookback shorter than one interval counts as one window.
        let windows = (lookback / interval).max(1);
        let measured = (last.time - first.time) / windows;
        let actual = measured
            .max(rules.max_ratio.lower(timespan))
            .min(rules.max_ratio.upper(timespan));

        let mut target = scale(bits_to_target(last.bits), actual, timespan);
        for ceiling in rules.ceilings.iter().filter(|c| c.applies(last.height)) {
            target = target.min(ceiling.target());
        }
        target = target.min(self.params.pow_limit);

        let bits = encode_compact(target);
        debug!(
            "basic retarget after height {}: timespan {}s (measured {}s), {:08x} -> {:08x}",
            last.height, actual, measured, last.bits, bits
        );
        Ok(bits)
    }
}

/// Apply the era's per-duration limits.
fn limit_duration(duration: i64, spacing: i64, rules: &EmaRules) -> i64 {
    let mut duration = duration;

    if rules.clamp_durations {
        // Blunt future timestamps and slow the rise of difficulty.
        let upper = spacing * 3 / 2;
        if duration > upper {
            duration = upper;
        }
        if duration >= 0 && duration < spacing / 2 {
            duration = spacing / 2;
        }
    }

    if duration < 0 && rules.replace_negative_durations {
        duration = spacing;
    }

    duration
}

/// Exponential moving average of `durations`, seeded at `spacing`.
///
/// The accumulator must stay `f32`: wider arithmetic changes the truncated
/// timespan for some histories.
fn smoothed_duration(durations: &[i64], alpha: f32, spacing: i64) -> i64 {
    let mut accumulator = spacing as f32;
    for duration in durations {
        accumulator = alpha * *duration as f32 + (1.0 - alpha) * accumulator;
    }
    accumulator as i64
}

/// `target * numerator / denominator`, multiplied in 512 bits.
///
/// Both factors are positive after timespan clamping. A quotient too wide
/// for 256 bits saturates; callers clamp it to the pow limit anyway.
fn scale(target: U256, numerator: i64, denominator: i64) -> U256 {
    let numerator = U256::from(numerator.max(0) as u64);
    let denominator = U512::from(denominator.max(1) as u64);
    let quotient = target.full_mul(numerator) / denominator;
    U256::try_from(quotient).unwrap_or(U256::MAX)
}

fn lookup<C: ChainView + ?Sized>(chain: &C, id: BlockId) -> Result<&ChainBlock, RetargetError> {
    chain.block(id).ok_or(RetargetError::UnknownBlock(id))
}

fn ancestor_at<'c, C: ChainView + ?Sized>(
    chain: &'c C,
    from_id: BlockId,
    from: &ChainBlock,
    height: i64,
) -> Result<&'c ChainBlock, RetargetError> {
    u32::try_from(height)
        .ok()
        .and_then(|height| chain.ancestor(from_id, height))
        .and_then(|id| chain.block(id))
        .ok_or(RetargetError::MissingAncestor {
            from: from.height,
            height,
        })
}
