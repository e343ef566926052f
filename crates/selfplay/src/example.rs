//! Training examples and TD(lambda) value targets.

use arbor_core::BoardEncoding;
use serde::{Deserialize, Serialize};

/// One searched position from a self-play game.
///
/// Serialized with fields in the order `board, policy, value,
/// current_player`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub board: BoardEncoding,

    /// Temperature-scaled visit distribution over the game's full action
    /// space, in action order.
    pub policy: Vec<f32>,

    /// Value target for `current_player`. Zero until the game is back-filled.
    pub value: f32,

    /// +1 for the first player, -1 for the second.
    pub current_player: i32,
}

impl TrainingExample {
    /// An example whose value is not known yet.
    pub fn pending(board: BoardEncoding, policy: Vec<f32>, current_player: i32) -> Self {
        Self {
            board,
            policy,
            value: 0.0,
            current_player,
        }
    }
}

/// Fill in value targets for one finished game.
///
/// `examples` are in move order and `outcome` is the result for the player
/// who made the last move (1 win, -1 loss, 0 draw). Walking backward, each
/// example's own outcome alternates sign. The last example gets its outcome
/// directly; every earlier one blends the negated value of the next example
/// with its outcome discounted by distance from the end:
///
/// ```text
/// v[i] = (1 - lambda) * -v[i + 1] + lambda * outcome[i] * discount^(d - 1)
/// ```
///
/// where `d` is 1 for the last example. Targets stay within [-1, 1] for
/// lambda and discount in [0, 1].
pub fn backfill_td_lambda(examples: &mut [TrainingExample], outcome: f32, lambda: f32, discount: f32) {
    let len = examples.len();
    let mut sign = 1.0;
    let mut next_value: Option<f32> = None;

    for (i, example) in examples.iter_mut().enumerate().rev() {
        let depth_from_end = (len - i) as i32;
        let own_outcome = sign * outcome;
        let value = match next_value {
            None => own_outcome,
            Some(next) => {
                (1.0 - lambda) * -next + lambda * own_outcome * discount.powi(depth_from_end - 1)
            }
        };
        example.value = value;
        next_value = Some(value);
        sign = -sign;
    }
}
