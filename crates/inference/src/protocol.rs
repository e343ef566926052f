//! JSON bodies exchanged with the inference service.
//!
//! `POST /predict` takes a position shaped like a training example with no
//! policy yet and answers with the network heads:
//!
//! ```text
//! -> {"board":[[1,0,0],[0,-1,0],[0,0,0]],"policy":null,"value":0.0,"current_player":1}
//! <- {"policy":[0.0,0.2,...],"value":0.35}
//! ```
//!
//! `POST /train` takes a JSON array of training examples and `POST
//! /load-model` has no body. Any status other than 200 is a failure.

use arbor_core::{BoardEncoding, GameState};
use serde::{Deserialize, Serialize};

/// Position to evaluate.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PredictRequest {
    pub board: BoardEncoding,
    /// Always `None` on a request; kept so the body has the example shape.
    pub policy: Option<Vec<f32>>,
    pub value: f32,
    /// +1 when the first player is to move, -1 otherwise.
    pub current_player: i32,
}

impl PredictRequest {
    pub fn for_state<S: GameState>(state: &S) -> Self {
        Self {
            board: state.encode_board(),
            policy: None,
            value: 0.0,
            current_player: state.current_player().sign(),
        }
    }
}

/// Network output for one position.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PredictReply {
    /// One prior per entry of the game's action space.
    pub policy: Vec<f32>,
    /// Value for the player to move.
    pub value: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_mcts::games::TicTacToeState;

    #[test]
    fn test_request_for_state() {
        let state = TicTacToeState::from_moves(&[0, 4, 8]).unwrap();
        let request = PredictRequest::for_state(&state);

        assert_eq!(request.current_player, -1);
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"board":[[1,0,0],[0,-1,0],[0,0,1]],"policy":null,"value":0.0,"current_player":-1}"#
        );
    }

    #[test]
    fn test_reply_parsing() {
        let reply: PredictReply =
            serde_json::from_str(r#"{"policy":[0.5,0.5],"value":-0.25}"#).unwrap();
        assert_eq!(
            reply,
            PredictReply {
                policy: vec![0.5, 0.5],
                value: -0.25
            }
        );

        assert!(serde_json::from_str::<PredictReply>(r#"{"policy":[1.0]}"#).is_err());
        assert!(serde_json::from_str::<PredictReply>(r#"{"error":"busy"}"#).is_err());
    }
}
