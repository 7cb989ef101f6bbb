//! Issuance schedule: a packed list of `(mps per block, block span)` steps
//! decoded into contiguous `[start, end)` ranges and read through a cursor
//! that only moves forward.

use crate::MPS;
use crate::error::ScheduleError;
use alloy_primitives::Bytes;

/// Bytes per packed step: `mps: u24 | block_delta: u40`, big endian.
pub const STEP_SIZE: usize = 8;

const MPS_BITS: u32 = 24;
const BLOCK_DELTA_BITS: u32 = 40;
const BLOCK_DELTA_MASK: u64 = (1 << BLOCK_DELTA_BITS) - 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AuctionStep {
    /// Share of total supply issued per block, in mps.
    pub mps: u32,
    /// First block of the step (inclusive).
    pub start_block: u64,
    /// First block after the step (exclusive).
    pub end_block: u64,
}

impl AuctionStep {
    #[inline]
    pub fn contains(&self, block: u64) -> bool {
        self.start_block <= block && block < self.end_block
    }
}

/// Packs `(mps, block_delta)` pairs into the on-wire step format.
///
/// `mps` is truncated to 24 bits and `block_delta` to 40 bits.
pub fn encode_steps(steps: &[(u32, u64)]) -> Bytes {
    let mut data = Vec::with_capacity(steps.len() * STEP_SIZE);
    for &(mps, block_delta) in steps {
        let word = ((u64::from(mps) & ((1 << MPS_BITS) - 1)) << BLOCK_DELTA_BITS)
            | (block_delta & BLOCK_DELTA_MASK);
        data.extend_from_slice(&word.to_be_bytes());
    }
    Bytes::from(data)
}

/// Unpacks the step format into `(mps, block_delta)` pairs.
pub fn decode_steps(data: &[u8]) -> Result<Vec<(u32, u64)>, ScheduleError> {
    if data.is_empty() {
        return Err(ScheduleError::Empty);
    }
    if data.len() % STEP_SIZE != 0 {
        return Err(ScheduleError::InvalidDataLength(data.len()));
    }

    Ok(data
        .chunks_exact(STEP_SIZE)
        .map(|chunk| {
            let mut word = [0u8; STEP_SIZE];
            word.copy_from_slice(chunk);
            let word = u64::from_be_bytes(word);
            ((word >> BLOCK_DELTA_BITS) as u32, word & BLOCK_DELTA_MASK)
        })
        .collect())
}

#[derive(Clone, Debug)]
pub struct IssuanceSchedule {
    steps: Vec<AuctionStep>,
    cursor: usize,
}

impl IssuanceSchedule {
    /// Decodes and validates packed step data for an auction running over
    /// `[start_block, end_block)`.
    ///
    /// Rejects zero-length steps, rates that do not sum to exactly `MPS`,
    /// and schedules whose last step does not end at `end_block`.
    pub fn new(data: &[u8], start_block: u64, end_block: u64) -> Result<Self, ScheduleError> {
        let raw = decode_steps(data)?;

        let mut steps = Vec::with_capacity(raw.len());
        let mut block = start_block;
        let mut issued: u128 = 0;

        for (index, (mps, block_delta)) in raw.into_iter().enumerate() {
            if block_delta == 0 {
                return Err(ScheduleError::ZeroLengthStep(index));
            }
            let step_end = block.saturating_add(block_delta);
            issued += u128::from(mps) * u128::from(block_delta);
            steps.push(AuctionStep {
                mps,
                start_block: block,
                end_block: step_end,
            });
            block = step_end;
        }

        if issued != u128::from(MPS) {
            return Err(ScheduleError::InvalidMpsSum {
                got: issued,
                expected: MPS,
            });
        }
        if block != end_block {
            return Err(ScheduleError::EndBlockMismatch {
                got: block,
                expected: end_block,
            });
        }

        Ok(Self { steps, cursor: 0 })
    }

    pub fn steps(&self) -> &[AuctionStep] {
        &self.steps
    }

    /// The step under the cursor.
    #[inline]
    pub fn current(&self) -> &AuctionStep {
        &self.steps[self.cursor]
    }

    #[inline]
    pub fn is_last(&self) -> bool {
        self.cursor + 1 == self.steps.len()
    }

    /// Moves the cursor to the next step.
    pub fn advance(&mut self) -> Result<&AuctionStep, ScheduleError> {
        if self.is_last() {
            return Err(ScheduleError::AuctionIsOver);
        }
        self.cursor += 1;
        Ok(self.current())
    }

    /// Returns the step whose range contains `block`, advancing the cursor.
    pub fn active_step(&mut self, block: u64) -> Result<&AuctionStep, ScheduleError> {
        let cursor_start = self.current().start_block;
        if block < cursor_start {
            return Err(ScheduleError::CursorMovedBackward {
                requested: block,
                cursor: cursor_start,
            });
        }
        while block >= self.current().end_block {
            self.advance()?;
        }
        Ok(self.current())
    }

    /// Issuance rate at `block` without moving the cursor; zero outside the
    /// schedule or behind the cursor.
    pub fn rate_at(&self, block: u64) -> u32 {
        self.steps[self.cursor..]
            .iter()
            .find(|step| step.contains(block))
            .map_or(0, |step| step.mps)
    }

    /// Total mps issued over `[from, to)`, walking the cursor forward
    /// through every step the range touches.
    pub fn mps_between(&mut self, from: u64, to: u64) -> Result<u32, ScheduleError> {
        let cursor_start = self.current().start_block;
        if to < from || from < cursor_start {
            return Err(ScheduleError::CursorMovedBackward {
                requested: from.min(to),
                cursor: cursor_start,
            });
        }

        let mut issued: u64 = 0;
        let mut block = from;
        loop {
            let step = *self.current();
            let until = to.min(step.end_block);
            if until > block {
                issued = issued.saturating_add((until - block).saturating_mul(u64::from(step.mps)));
                block = until;
            }
            if to < step.end_block || self.is_last() {
                break;
            }
            self.cursor += 1;
        }

        u32::try_from(issued).map_err(|_| ScheduleError::InvalidMpsSum {
            got: u128::from(issued),
            expected: MPS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(
        steps: &[(u32, u64)],
        start: u64,
        end: u64,
    ) -> Result<IssuanceSchedule, ScheduleError> {
        IssuanceSchedule::new(&encode_steps(steps), start, end)
    }

    #[test]
    fn packed_step_layout() {
        let data = encode_steps(&[(1_000_000, 10)]);
        assert_eq!(data.len(), STEP_SIZE);
        // 1_000_000 = 0x0F4240, 10 = 0x000000000A
        assert_eq!(
            data.as_ref(),
            &[0x0F, 0x42, 0x40, 0x00, 0x00, 0x00, 0x00, 0x0A]
        );
        assert_eq!(decode_steps(&data).unwrap(), vec![(1_000_000, 10)]);
    }

    #[test]
    fn decode_rejects_bad_lengths() {
        assert_eq!(decode_steps(&[]), Err(ScheduleError::Empty));
        assert_eq!(
            decode_steps(&[0u8; 9]),
            Err(ScheduleError::InvalidDataLength(9))
        );
    }

    #[test]
    fn builds_contiguous_steps() {
        let schedule = schedule(&[(0, 5), (500_000, 10), (1_000_000, 5)], 100, 120).unwrap();
        let steps = schedule.steps();
        assert_eq!(steps.len(), 3);
        assert_eq!((steps[0].start_block, steps[0].end_block), (100, 105));
        assert_eq!((steps[1].start_block, steps[1].end_block), (105, 115));
        assert_eq!((steps[2].start_block, steps[2].end_block), (115, 120));
    }

    #[test]
    fn rejects_under_and_over_issuance() {
        assert_eq!(
            schedule(&[(999_999, 10)], 0, 10).unwrap_err(),
            ScheduleError::InvalidMpsSum {
                got: 9_999_990,
                expected: MPS
            }
        );
        assert_eq!(
            schedule(&[(1_000_001, 10)], 0, 10).unwrap_err(),
            ScheduleError::InvalidMpsSum {
                got: 10_000_010,
                expected: MPS
            }
        );
    }

    #[test]
    fn rejects_end_block_mismatch() {
        assert_eq!(
            schedule(&[(1_000_000, 10)], 0, 11).unwrap_err(),
            ScheduleError::EndBlockMismatch {
                got: 10,
                expected: 11
            }
        );
    }

    #[test]
    fn rejects_zero_length_step() {
        assert_eq!(
            schedule(&[(1_000_000, 10), (5, 0)], 0, 10).unwrap_err(),
            ScheduleError::ZeroLengthStep(1)
        );
    }

    #[test]
    fn active_step_moves_forward_only() {
        let mut schedule = schedule(&[(500_000, 10), (1_000_000, 5)], 0, 15).unwrap();

        assert_eq!(schedule.active_step(3).unwrap().mps, 500_000);
        assert_eq!(schedule.active_step(10).unwrap().mps, 1_000_000);
        assert_eq!(
            schedule.active_step(9).unwrap_err(),
            ScheduleError::CursorMovedBackward {
                requested: 9,
                cursor: 10
            }
        );
        assert_eq!(
            schedule.active_step(15).unwrap_err(),
            ScheduleError::AuctionIsOver
        );
    }

    #[test]
    fn advance_fails_past_last_step() {
        let mut schedule = schedule(&[(500_000, 10), (1_000_000, 5)], 0, 15).unwrap();
        assert_eq!(schedule.advance().unwrap().start_block, 10);
        assert_eq!(schedule.advance().unwrap_err(), ScheduleError::AuctionIsOver);
    }

    #[test]
    fn mps_between_spans_steps() {
        let mut schedule = schedule(&[(0, 5), (500_000, 10), (1_000_000, 5)], 100, 120).unwrap();

        assert_eq!(schedule.mps_between(100, 105).unwrap(), 0);
        assert_eq!(schedule.mps_between(105, 108).unwrap(), 1_500_000);
        // 7 blocks at 0.05 + 2 blocks at 0.1
        assert_eq!(schedule.mps_between(108, 117).unwrap(), 5_500_000);
        assert_eq!(schedule.mps_between(117, 120).unwrap(), 3_000_000);
        assert_eq!(schedule.current().start_block, 115);
        assert_eq!(schedule.rate_at(119), 1_000_000);
        assert_eq!(schedule.rate_at(120), 0);
    }

    #[test]
    fn mps_between_rejects_backward_range() {
        let mut schedule = schedule(&[(500_000, 10), (1_000_000, 5)], 0, 15).unwrap();
        schedule.mps_between(0, 12).unwrap();
        assert!(matches!(
            schedule.mps_between(5, 13),
            Err(ScheduleError::CursorMovedBackward { .. })
        ));
    }
}
