//! Next-target computation across the historical epochs, over synthetic
//! chains.

use retarget_core::epoch::{FLOOR_BITS, PINNED_BITS, TRANSITION_BITS};
use retarget_core::{
    BlockId, ChainBlock, ChainIndex, ChainView, ConsensusParams, Network, RetargetError,
    Retargeter,
};

const START_TIME: i64 = 1_300_000_000;
const HARD_BITS: u32 = 0x1b01_2345;
const POW_LIMIT_BITS: u32 = 0x1d00_ffff;

/// Chain from genesis to `last`, all blocks carrying `bits`, with the gap
/// before each block given by `spacing(height)`.
fn chain_with(last: u32, bits: u32, spacing: impl Fn(u32) -> i64) -> ChainIndex {
    let mut chain = ChainIndex::with_capacity(last as usize + 1);
    let mut time = START_TIME;
    for height in 0..=last {
        if height > 0 {
            time += spacing(height);
        }
        chain.push(time, bits);
    }
    chain
}

fn uniform(last: u32, bits: u32) -> ChainIndex {
    chain_with(last, bits, |_| 120)
}

fn next(params: &ConsensusParams, chain: &ChainIndex, candidate_delay: i64) -> u32 {
    let tip = chain.tip().unwrap();
    let time = chain.block(tip).unwrap().time + candidate_delay;
    Retargeter::new(params)
        .next_work_required(chain, Some(tip), time)
        .unwrap()
}

/// Copy of `chain` with the block at `height` moved `delta` seconds.
fn shift_block(chain: &ChainIndex, height: u32, delta: i64) -> ChainIndex {
    chain
        .iter()
        .map(|block| {
            let time = if block.height == height { block.time + delta } else { block.time };
            (time, block.bits)
        })
        .collect()
}

/// Only the most recent blocks of a chain; the oldest kept block has no
/// parent link.
struct Pruned {
    start: u32,
    blocks: Vec<ChainBlock>,
}

impl Pruned {
    fn new(chain: &ChainIndex, keep: u32) -> Self {
        let start = chain.len() as u32 - keep;
        let blocks = chain
            .iter()
            .skip(start as usize)
            .map(|block| ChainBlock {
                prev: if block.height == start { None } else { block.prev },
                ..*block
            })
            .collect();
        Pruned { start, blocks }
    }
}

impl ChainView for Pruned {
    fn block(&self, id: BlockId) -> Option<&ChainBlock> {
        let index = id.0.checked_sub(self.start as usize)?;
        self.blocks.get(index)
    }
}

#[test]
fn genesis_candidate_gets_pow_limit() {
    for network in [Network::Mainnet, Network::Testnet, Network::Regtest] {
        let params = network.params();
        let chain = ChainIndex::new();
        assert_eq!(
            Retargeter::new(&params).next_work_required(&chain, None, START_TIME),
            Ok(params.pow_limit_bits())
        );
    }
}

mod classic {
    use super::*;

    #[test]
    fn keeps_bits_between_retargets() {
        let params = Network::Mainnet.params();
        let chain = uniform(40, HARD_BITS);

        assert_eq!(next(&params, &chain, 120), HARD_BITS);
        // Mainnet never relaxes, however late the candidate.
        assert_eq!(next(&params, &chain, 100_000), HARD_BITS);
    }

    #[test]
    fn retargets_over_interval_less_one() {
        let params = Network::Mainnet.params();
        // First block is 29 spacings back, so a punctual chain reads fast.
        let chain = uniform(59, HARD_BITS);
        assert_eq!(next(&params, &chain, 120), 0x1b01_198f);
    }

    #[test]
    fn clamps_before_retargeting() {
        let params = Network::Mainnet.params();
        let first_time = uniform(30, HARD_BITS).iter().last().unwrap().time;

        let slow = |timespan: i64| {
            let mut chain = uniform(58, HARD_BITS);
            chain.push(first_time + timespan, HARD_BITS);
            next(&params, &chain, 120)
        };

        assert_eq!(slow(3600 * 4), 0x1b04_8d14);
        assert_eq!(slow(3600 * 100), slow(3600 * 4));
    }

    #[test]
    fn daily_lookback_divides_by_24() {
        let params = Network::Mainnet.params();
        let chain = uniform(100_019, HARD_BITS);
        assert_eq!(next(&params, &chain, 120), HARD_BITS);
    }

    #[test]
    fn no_retargeting_keeps_bits() {
        let params = Network::Regtest.params();
        let chain = chain_with(59, 0x207f_ffff, |_| 7);
        assert_eq!(next(&params, &chain, 1), 0x207f_ffff);
    }

    #[test]
    fn min_difficulty_after_stall() {
        let params = Network::Testnet.params();
        let chain = uniform(40, HARD_BITS);

        assert_eq!(next(&params, &chain, 240), HARD_BITS);
        assert_eq!(next(&params, &chain, 241), POW_LIMIT_BITS);
    }

    #[test]
    fn min_difficulty_walk_finds_last_real_target() {
        let params = Network::Testnet.params();
        let chain: ChainIndex = (0..=40)
            .map(|height| {
                let bits = if height > 35 { POW_LIMIT_BITS } else { HARD_BITS };
                (START_TIME + height as i64 * 120, bits)
            })
            .collect();

        assert_eq!(next(&params, &chain, 120), HARD_BITS);
    }

    #[test]
    fn min_difficulty_walk_stops_at_interval_boundary() {
        let params = Network::Testnet.params();
        let chain: ChainIndex = (0..=40)
            .map(|height| {
                let bits = if height >= 30 { POW_LIMIT_BITS } else { HARD_BITS };
                (START_TIME + height as i64 * 120, bits)
            })
            .collect();

        assert_eq!(next(&params, &chain, 120), POW_LIMIT_BITS);
    }
}

mod ema {
    use super::*;

    #[test]
    fn punctual_chain_keeps_target() {
        let params = Network::Mainnet.params();
        for last in [101_632, 101_700, 104_300, 110_400] {
            let chain = uniform(last, HARD_BITS);
            assert_eq!(next(&params, &chain, 120), HARD_BITS, "height {}", last);
        }
    }

    #[test]
    fn slow_blocks_average_in_single_precision() {
        let params = Network::Mainnet.params();
        let last = 120_000;
        let chain = chain_with(last, HARD_BITS, |h| if h > last - 2160 { 180 } else { 120 });

        // 179s, not 180s: the f32 average settles just below.
        assert_eq!(next(&params, &chain, 120), 0x1b01_b27a);
    }

    #[test]
    fn damped_epoch_caps_each_duration() {
        let params = Network::Mainnet.params();
        let last = 120_000;
        let slow = chain_with(last, HARD_BITS, |h| if h > last - 2160 { 180 } else { 120 });
        let far_future = chain_with(last, HARD_BITS, |h| if h > last - 2160 { 500 } else { 120 });

        assert_eq!(next(&params, &far_future, 120), next(&params, &slow, 120));
    }

    #[test]
    fn launch_epoch_bounds_average_at_four_spacings() {
        let params = Network::Mainnet.params();
        let last = 101_700;
        let chain = chain_with(last, HARD_BITS, |h| if h > last - 2160 { 1000 } else { 120 });

        // Candidate within ten spacings so the stall rule stays out of it.
        assert_eq!(next(&params, &chain, 120), 0x1b04_8d14);
    }

    #[test]
    fn launch_epoch_bounds_average_at_half_spacing() {
        let params = Network::Mainnet.params();
        let last = 101_700;
        let chain = chain_with(last, HARD_BITS, |h| if h > last - 2160 { 0 } else { 120 });

        // The average decays to zero and is lifted to 60s.
        assert_eq!(next(&params, &chain, 120), 0x1b00_91a2);
    }

    #[test]
    fn negative_durations_kept_before_floor_epoch() {
        let params = Network::Mainnet.params();
        let last = 101_700;
        let chain = shift_block(&uniform(last, HARD_BITS), last - 9, -300);

        assert_eq!(next(&params, &chain, 120), 0x1b01_25b2);
    }

    #[test]
    fn negative_durations_replaced_from_floor_epoch() {
        let params = Network::Mainnet.params();
        let last = 105_000;
        let chain = shift_block(&uniform(last, HARD_BITS), last - 9, -300);

        assert_eq!(next(&params, &chain, 120), 0x1b01_4065);
    }

    #[test]
    fn floor_caps_target() {
        let params = Network::Mainnet.params();
        let chain = uniform(105_000, 0x1c00_ffff);
        assert_eq!(next(&params, &chain, 120), FLOOR_BITS);

        // No floor at launch.
        let chain = uniform(101_700, 0x1c00_ffff);
        assert_eq!(next(&params, &chain, 120), 0x1c00_ffff);
    }

    #[test]
    fn stall_relief_multipliers() {
        let params = Network::Mainnet.params();

        let chain = uniform(101_700, HARD_BITS);
        assert_eq!(next(&params, &chain, 1200), HARD_BITS);
        assert_eq!(next(&params, &chain, 1201), 0x1b0b_60b2);

        let chain = uniform(103_800, HARD_BITS);
        assert_eq!(next(&params, &chain, 1201), 0x1b02_468a);

        let chain = uniform(104_300, FLOOR_BITS);
        assert_eq!(next(&params, &chain, 1201), FLOOR_BITS);
    }

    #[test]
    fn stall_relief_withdrawn() {
        let params = Network::Mainnet.params();
        let chain = uniform(175_000, HARD_BITS);
        assert_eq!(next(&params, &chain, 100_000), HARD_BITS);
    }

    #[test]
    fn pinned_height_ignores_chain_data() {
        let params = Network::Mainnet.params();
        let punctual = uniform(137_161, HARD_BITS);
        let erratic = chain_with(137_161, 0x1c00_ffff, |h| (h % 7) as i64 * 97 - 200);

        for chain in [&punctual, &erratic] {
            assert_eq!(next(&params, chain, 120), PINNED_BITS);
            assert_eq!(next(&params, chain, 100_000), PINNED_BITS);
        }

        let after = uniform(137_162, HARD_BITS);
        assert_eq!(next(&params, &after, 120), HARD_BITS);
    }

    #[test]
    fn missing_history_is_reported() {
        let params = Network::Mainnet.params();
        let chain = uniform(101_700, HARD_BITS);
        let pruned = Pruned::new(&chain, 1_000);
        let tip = chain.tip().unwrap();
        let time = chain.block(tip).unwrap().time + 120;

        assert_eq!(
            Retargeter::new(&params).next_work_required(&pruned, Some(tip), time),
            Err(RetargetError::MissingAncestor {
                from: 101_700,
                height: 100_700,
            })
        );
    }
}

mod basic {
    use super::*;

    #[test]
    fn keeps_bits_between_retargets() {
        let params = Network::Mainnet.params();
        let chain = chain_with(181_300, HARD_BITS, |h| if h > 181_000 { 600 } else { 120 });
        assert_eq!(next(&params, &chain, 100_000), HARD_BITS);
    }

    #[test]
    fn transition_ceiling_applies_first() {
        let params = Network::Mainnet.params();
        let chain = uniform(181_439, FLOOR_BITS);
        assert_eq!(next(&params, &chain, 120), TRANSITION_BITS);
    }

    #[test]
    fn floor_ceiling_outlives_transition_ceiling() {
        let params = Network::Mainnet.params();
        assert_eq!(next(&params, &uniform(183_599, FLOOR_BITS), 120), FLOOR_BITS);
        assert_eq!(next(&params, &uniform(183_599, 0x1c00_ffff), 120), FLOOR_BITS);
    }

    #[test]
    fn short_window_bounds_at_one_and_a_quarter() {
        let params = Network::Mainnet.params();
        let last = 192_239;
        let slow = chain_with(last, HARD_BITS, |h| if h > last - 540 { 240 } else { 120 });
        assert_eq!(next(&params, &slow, 120), 0x1b01_6c16);

        let crawl = chain_with(last, HARD_BITS, |h| if h > last - 540 { 2400 } else { 120 });
        assert_eq!(next(&params, &crawl, 120), 0x1b01_6c16);
    }

    #[test]
    fn ceilings_inert_after_expiry() {
        let params = Network::Mainnet.params();
        let last = 220_319;

        let slow = chain_with(last, FLOOR_BITS, |h| if h > last - 540 { 240 } else { 120 });
        assert_eq!(next(&params, &slow, 120), 0x1b0f_96be);

        let fast = chain_with(last, FLOOR_BITS, |h| if h > last - 540 { 60 } else { 120 });
        assert_eq!(next(&params, &fast, 120), 0x1b09_fa13);
    }

    #[test]
    fn punctual_chain_keeps_target() {
        let params = Network::Mainnet.params();
        let chain = uniform(220_319, HARD_BITS);
        assert_eq!(next(&params, &chain, 120), HARD_BITS);
    }
}

#[test]
fn works_through_trait_object() {
    let params = Network::Mainnet.params();
    let chain = uniform(59, HARD_BITS);
    let view: &dyn ChainView = &chain;
    let tip = chain.tip();

    let engine = Retargeter::new(&params);
    assert_eq!(
        engine.next_work_required(view, tip, START_TIME + 60 * 120),
        engine.next_work_required(&chain, tip, START_TIME + 60 * 120)
    );
}
