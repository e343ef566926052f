//! Blocking HTTP client for the inference service.

use crate::protocol::{PredictReply, PredictRequest};
use arbor_core::{GameState, Value};
use arbor_mcts::{Evaluation, Evaluator, EvaluatorError};
use serde::Serialize;
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Where and how patiently to reach the inference service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteConfig {
    /// Service root, e.g. `http://localhost:5000`.
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Applies to each read and write on the connection.
    pub io_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            connect_timeout: Duration::from_secs(2),
            io_timeout: Duration::from_secs(30),
        }
    }
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

/// Evaluator backed by a remote policy/value service.
///
/// The underlying agent is shareable, so one evaluator can serve any
/// number of self-play workers. Failed calls are not retried.
#[derive(Debug, Clone)]
pub struct RemoteEvaluator {
    config: RemoteConfig,
    agent: ureq::Agent,
}

impl RemoteEvaluator {
    pub fn new(config: RemoteConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout_read(config.io_timeout)
            .timeout_write(config.io_timeout)
            .build();
        Self { config, agent }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// `POST /predict` for one position.
    pub fn predict(&self, request: &PredictRequest) -> Result<PredictReply, EvaluatorError> {
        let url = self.url("/predict");
        let start = Instant::now();
        let body = read_reply(&url, self.agent.post(&url).send_json(request))?;
        trace!(
            %url,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "inference round trip"
        );
        serde_json::from_str(&body)
            .map_err(|e| EvaluatorError::Malformed(format!("unparsable reply: {e}")))
    }

    /// `POST /train` with a batch of training examples. Returns the
    /// service's response text.
    pub fn train<T: Serialize>(&self, examples: &[T]) -> Result<String, EvaluatorError> {
        let url = self.url("/train");
        let body = read_reply(&url, self.agent.post(&url).send_json(examples))?;
        debug!(%url, examples = examples.len(), "training batch accepted");
        Ok(body)
    }

    /// `POST /load-model`: make the service reload its latest weights.
    pub fn load_model(&self) -> Result<String, EvaluatorError> {
        let url = self.url("/load-model");
        let body = read_reply(&url, self.agent.post(&url).call())?;
        debug!(%url, "model reloaded");
        Ok(body)
    }
}

/// Body of a 200 response; anything else is an error.
fn read_reply(
    url: &str,
    sent: Result<ureq::Response, ureq::Error>,
) -> Result<String, EvaluatorError> {
    match sent {
        Ok(response) if response.status() == 200 => Ok(response.into_string()?),
        Ok(response) => Err(rejected(url, response.status(), response)),
        Err(ureq::Error::Status(code, response)) => Err(rejected(url, code, response)),
        Err(ureq::Error::Transport(transport)) => {
            Err(io::Error::new(io::ErrorKind::Other, transport.to_string()).into())
        }
    }
}

fn rejected(url: &str, code: u16, response: ureq::Response) -> EvaluatorError {
    let body = response.into_string().unwrap_or_default();
    warn!(%url, code, %body, "inference request rejected");
    EvaluatorError::Rejected(format!("{url} returned status {code}: {body}"))
}

impl<S: GameState> Evaluator<S> for RemoteEvaluator {
    fn evaluate(&self, state: &S) -> Result<Evaluation, EvaluatorError> {
        if state.is_terminal() {
            return Err(EvaluatorError::InvalidState(
                "terminal states are not sent for inference".to_string(),
            ));
        }

        let PredictReply { policy, value } = self.predict(&PredictRequest::for_state(state))?;
        check_reply(&policy, value, state.all_actions().len())?;
        Ok(Evaluation { policy, value })
    }
}

fn check_reply(policy: &[f32], value: f32, num_actions: usize) -> Result<(), EvaluatorError> {
    if policy.len() != num_actions {
        return Err(EvaluatorError::Malformed(format!(
            "policy has {} entries, expected {}",
            policy.len(),
            num_actions
        )));
    }
    if let Some(p) = policy.iter().find(|p| !p.is_finite()) {
        return Err(EvaluatorError::Malformed(format!("non-finite prior {p}")));
    }
    Value::new(value).map_err(|e| EvaluatorError::Malformed(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_mcts::games::TicTacToeState;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// What the fake service saw: request line and body.
    struct Seen {
        request_line: String,
        body: String,
    }

    /// Accept one HTTP request and answer with `status` and `body`, or
    /// hang up without answering when `status` is `None`.
    fn serve_once(
        status: Option<&'static str>,
        body: &'static str,
    ) -> (RemoteEvaluator, JoinHandle<Seen>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut content_length = 0;
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).unwrap();
                let header = header.trim_end();
                if header.is_empty() {
                    break;
                }
                if let Some((name, value)) = header.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut request_body = vec![0; content_length];
            reader.read_exact(&mut request_body).unwrap();

            if let Some(status) = status {
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).unwrap();
            }
            Seen {
                request_line: request_line.trim_end().to_string(),
                body: String::from_utf8(request_body).unwrap(),
            }
        });
        (RemoteEvaluator::new(RemoteConfig::new(base_url)), handle)
    }

    const UNIFORM_OK: &str =
        r#"{"policy":[0.125,0.125,0.125,0.125,0.0,0.125,0.125,0.125,0.125],"value":0.5}"#;

    #[test]
    fn test_evaluate_round_trip() {
        let (evaluator, server) = serve_once(Some("200 OK"), UNIFORM_OK);
        let state = TicTacToeState::from_moves(&[4]).unwrap();

        let eval = evaluator.evaluate(&state).unwrap();
        assert_eq!(eval.policy.len(), 9);
        assert_eq!(eval.policy[4], 0.0);
        assert_eq!(eval.value, 0.5);

        let seen = server.join().unwrap();
        assert_eq!(seen.request_line, "POST /predict HTTP/1.1");
        let request: PredictRequest = serde_json::from_str(&seen.body).unwrap();
        assert_eq!(request, PredictRequest::for_state(&state));
        assert_eq!(request.current_player, -1);
    }

    #[test]
    fn test_error_status_is_rejected() {
        let (evaluator, server) =
            serve_once(Some("500 Internal Server Error"), r#"{"error":"no model"}"#);
        let err = evaluator.evaluate(&TicTacToeState::new()).unwrap_err();
        assert!(matches!(err, EvaluatorError::Rejected(ref m) if m.contains("500")));
        server.join().unwrap();
    }

    #[test]
    fn test_non_200_success_is_rejected() {
        let (evaluator, server) = serve_once(Some("202 Accepted"), UNIFORM_OK);
        let err = evaluator.evaluate(&TicTacToeState::new()).unwrap_err();
        assert!(matches!(err, EvaluatorError::Rejected(_)));
        server.join().unwrap();
    }

    #[test]
    fn test_wrong_policy_length_is_malformed() {
        let (evaluator, server) = serve_once(Some("200 OK"), r#"{"policy":[1.0],"value":0.0}"#);
        let err = evaluator.evaluate(&TicTacToeState::new()).unwrap_err();
        assert!(matches!(err, EvaluatorError::Malformed(_)));
        server.join().unwrap();
    }

    #[test]
    fn test_out_of_range_value_is_malformed() {
        let (evaluator, server) = serve_once(
            Some("200 OK"),
            r#"{"policy":[0.1,0.1,0.1,0.1,0.2,0.1,0.1,0.1,0.1],"value":1.5}"#,
        );
        let err = evaluator.evaluate(&TicTacToeState::new()).unwrap_err();
        assert!(matches!(err, EvaluatorError::Malformed(_)));
        server.join().unwrap();
    }

    #[test]
    fn test_garbage_body_is_malformed() {
        let (evaluator, server) = serve_once(Some("200 OK"), "not json");
        let err = evaluator.evaluate(&TicTacToeState::new()).unwrap_err();
        assert!(matches!(err, EvaluatorError::Malformed(_)));
        server.join().unwrap();
    }

    #[test]
    fn test_closed_connection_is_io_error() {
        let (evaluator, server) = serve_once(None, "");
        let err = evaluator.evaluate(&TicTacToeState::new()).unwrap_err();
        assert!(matches!(err, EvaluatorError::Io(_)));
        server.join().unwrap();
    }

    #[test]
    fn test_unreachable_service_is_io_error() {
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let evaluator = RemoteEvaluator::new(RemoteConfig::new(format!("http://{address}")));
        let err = evaluator.evaluate(&TicTacToeState::new()).unwrap_err();
        assert!(matches!(err, EvaluatorError::Io(_)));
    }

    #[test]
    fn test_terminal_state_is_not_sent() {
        let evaluator = RemoteEvaluator::new(RemoteConfig::new("http://127.0.0.1:1"));
        let state = TicTacToeState::from_moves(&[0, 3, 1, 4, 2]).unwrap();
        let err = evaluator.evaluate(&state).unwrap_err();
        assert!(matches!(err, EvaluatorError::InvalidState(_)));
    }

    #[test]
    fn test_train_posts_examples() {
        let (evaluator, server) = serve_once(Some("200 OK"), r#"{"loss":0.42}"#);
        let batch = vec![PredictRequest::for_state(&TicTacToeState::new())];

        let reply = evaluator.train(&batch).unwrap();
        assert_eq!(reply, r#"{"loss":0.42}"#);

        let seen = server.join().unwrap();
        assert_eq!(seen.request_line, "POST /train HTTP/1.1");
        let sent: Vec<PredictRequest> = serde_json::from_str(&seen.body).unwrap();
        assert_eq!(sent, batch);
    }

    #[test]
    fn test_load_model_posts_without_body() {
        let (evaluator, server) = serve_once(Some("200 OK"), "loaded");
        assert_eq!(evaluator.load_model().unwrap(), "loaded");

        let seen = server.join().unwrap();
        assert_eq!(seen.request_line, "POST /load-model HTTP/1.1");
        assert!(seen.body.is_empty());
    }

    #[test]
    fn test_load_model_failure_is_rejected() {
        let (evaluator, server) = serve_once(Some("404 Not Found"), "");
        assert!(matches!(
            evaluator.load_model(),
            Err(EvaluatorError::Rejected(_))
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let evaluator = RemoteEvaluator::new(RemoteConfig::new("http://localhost:5000/"));
        assert_eq!(evaluator.url("/predict"), "http://localhost:5000/predict");
    }

    #[test]
    fn test_check_reply_rejects_non_finite() {
        assert!(check_reply(&[f32::NAN], 0.0, 1).is_err());
        assert!(check_reply(&[1.0], f32::NAN, 1).is_err());
        assert!(check_reply(&[1.0], -1.0, 1).is_ok());
    }
}
