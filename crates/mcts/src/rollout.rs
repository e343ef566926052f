//! Playouts and depth-weighted reward shaping.

use crate::search::SearchError;
use arbor_core::{ArborError, GameState, Player};
use rand::Rng;

/// Shape a terminal reward by how deep into the playout it was reached.
///
/// With `d = clamp(depth / max_depth, 0, 1)`:
/// - win (`base > 0`): `0.8 * e^(-1.6 d) + 0.2`, from 1.0 down toward 0.36
/// - draw (`base == 0`): `0.0`
/// - loss (`base < 0`): `-1 + 0.8 d`, from -1.0 up toward -0.2
pub fn shape_reward(base: f32, depth: usize, max_depth: usize) -> f32 {
    let d = (depth as f32 / max_depth.max(1) as f32).clamp(0.0, 1.0);
    if base > 0.0 {
        0.8 * (-1.6 * d).exp() + 0.2
    } else if base < 0.0 {
        -1.0 + 0.8 * d
    } else {
        0.0
    }
}

/// Play uniformly random moves to the end and return the shaped reward for
/// `perspective`.
pub fn random_rollout<S, R>(state: &S, perspective: Player, rng: &mut R) -> Result<f32, SearchError>
where
    S: GameState,
    R: Rng + ?Sized,
{
    heuristic_rollout(state, perspective, 0, rng)
}

/// Playout that, for the first `lookahead` plies, takes an immediate win,
/// else blocks an immediate opponent win, else moves at random; the rest
/// of the game is random. Returns the shaped reward for `perspective`.
pub fn heuristic_rollout<S, R>(
    state: &S,
    perspective: Player,
    lookahead: usize,
    rng: &mut R,
) -> Result<f32, SearchError>
where
    S: GameState,
    R: Rng + ?Sized,
{
    let max_depth = state.max_remaining_plies().max(1);
    let mut current = state.clone();
    let mut depth = 0;

    while !current.is_terminal() {
        let action = if depth < lookahead {
            match winning_action(&current).or_else(|| blocking_action(&current)) {
                Some(action) => action,
                None => random_action(&current, rng)?,
            }
        } else {
            random_action(&current, rng)?
        };
        current = current.apply(action);
        depth += 1;
    }

    let base = current.reward(perspective)?;
    Ok(shape_reward(base, depth, max_depth))
}

fn random_action<S, R>(state: &S, rng: &mut R) -> Result<S::Action, SearchError>
where
    S: GameState,
    R: Rng + ?Sized,
{
    let legal = state.legal_actions();
    if legal.is_empty() {
        return Err(ArborError::NoLegalActions.into());
    }
    Ok(legal[rng.gen_range(0..legal.len())])
}

/// First legal action that ends the game in a win for the player to move.
pub fn winning_action<S: GameState>(state: &S) -> Option<S::Action> {
    let mover = state.current_player();
    state.legal_actions().into_iter().find(|action| {
        let next = state.apply(*action);
        next.is_terminal() && matches!(next.reward(mover), Ok(r) if r > 0.0)
    })
}

/// If some reply would let the opponent win immediately, the first action
/// that leaves them no immediate win. `None` when there is no threat to
/// answer or no action answers it.
pub fn blocking_action<S: GameState>(state: &S) -> Option<S::Action> {
    let mut threatened = false;
    let mut safe = None;
    for action in state.legal_actions() {
        let next = state.apply(action);
        if !next.is_terminal() && winning_action(&next).is_some() {
            threatened = true;
        } else if safe.is_none() {
            safe = Some(action);
        }
    }
    if threatened {
        safe
    } else {
        None
    }
}
