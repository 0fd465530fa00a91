//! Response schemas of the game server
//!
//! Payloads are parsed into these types at the client boundary so the rest of
//! the crate never sees untyped JSON.

use serde::Deserialize;

/// Answer of `GET /getScores`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    /// Cumulative score of the current session
    pub total_score: f64,
    /// Turns elapsed in the current session
    pub nb_turn: u32,
}

/// Raw status of `GET /movePlayer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum MoveStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "BAD_MOVEMENT")]
    BadMovement,
    #[serde(rename = "GAME_OVER")]
    GameOver,
}

/// Envelope of `GET /movePlayer`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MoveResponse {
    pub resp: MoveStatus,
}

/// Result of a move once the follow-up score request has been made
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveOutcome {
    /// The server refused the move; the session goes on
    Invalid,
    /// The move ended the session
    GameOver,
    /// The move was applied; scores read right after it
    Moved(Scores),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scores() {
        let scores: Scores = serde_json::from_str(r#"{"totalScore": 12.5, "nbTurn": 7}"#).unwrap();
        assert_eq!(
            scores,
            Scores {
                total_score: 12.5,
                nb_turn: 7
            }
        );
    }

    #[test]
    fn test_parse_scores_rejects_missing_field() {
        let parsed: Result<Scores, _> = serde_json::from_str(r#"{"totalScore": 3}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_parse_move_statuses() {
        let cases = [
            (r#"{"resp":"OK"}"#, MoveStatus::Ok),
            (r#"{"resp":"BAD_MOVEMENT"}"#, MoveStatus::BadMovement),
            (r#"{"resp":"GAME_OVER"}"#, MoveStatus::GameOver),
        ];
        for (json, expected) in cases {
            let response: MoveResponse = serde_json::from_str(json).unwrap();
            assert_eq!(response.resp, expected);
        }
    }

    #[test]
    fn test_parse_unknown_move_status_fails() {
        let parsed: Result<MoveResponse, _> = serde_json::from_str(r#"{"resp":"TELEPORTED"}"#);
        assert!(parsed.is_err());
    }
}
