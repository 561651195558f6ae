use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use conflux_core::config::SolverConfig;
use conflux_core::error::CoreError;

/// One `f <src> <dst> <flow>` record from the solver's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowRecord {
    pub src: u64,
    pub dst: u64,
    pub flow: u64,
}

/// Anything that can turn a serialized problem into a flow assignment.
/// The production implementation pipes to an external process; tests slot
/// in an in-process solver.
#[async_trait]
pub trait SolverBackend: Send {
    /// Submit one problem or delta batch and collect the resulting flow
    /// records, in reply order.
    async fn submit(&mut self, problem: &str) -> Result<Vec<FlowRecord>, CoreError>;

    /// Whether the next submission must be a full snapshot rather than a
    /// delta (first round, or any round after a solver death).
    fn needs_full_snapshot(&self) -> bool;

    /// Kill and respawn the solver. The next submission must be full.
    async fn restart(&mut self) -> Result<(), CoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SolverState {
    Spawning,
    Ready,
    AwaitingReply,
    Dead,
}

/// Owns a long-running external min-cost flow solver child process with
/// piped stdin/stdout. One problem in, one `c EOI`-terminated reply out.
pub struct SolverProcess {
    path: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    state: SolverState,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
    needs_full: bool,
}

impl SolverProcess {
    /// Launch the solver. The child is killed when this struct drops.
    pub fn spawn(config: &SolverConfig) -> Result<Self, CoreError> {
        let mut process = Self {
            path: config.solver_path.clone(),
            args: config.solver_args.clone(),
            timeout: Duration::from_millis(config.solver_timeout_ms),
            state: SolverState::Spawning,
            child: None,
            stdin: None,
            stdout: None,
            needs_full: true,
        };
        process.respawn()?;
        Ok(process)
    }

    fn respawn(&mut self) -> Result<(), CoreError> {
        self.state = SolverState::Spawning;
        let mut child = Command::new(&self.path)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CoreError::SolverTransport(format!("failed to spawn {:?}: {}", self.path, e))
            })?;
        self.stdin = child.stdin.take();
        self.stdout = child.stdout.take().map(BufReader::new);
        self.child = Some(child);
        self.state = SolverState::Ready;
        self.needs_full = true;
        info!("Solver {:?} spawned", self.path);
        Ok(())
    }

    async fn kill(&mut self) {
        self.stdin = None;
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        self.state = SolverState::Dead;
        self.needs_full = true;
    }

    fn mark_dead(&mut self) {
        self.stdin = None;
        self.stdout = None;
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
        self.child = None;
        self.state = SolverState::Dead;
        self.needs_full = true;
    }

    /// Write the problem, then read records until the terminator. Partial
    /// output on failure is discarded by the caller via restart.
    async fn exchange(&mut self, problem: &str) -> Result<Vec<FlowRecord>, CoreError> {
        let stdin = self.stdin.as_mut().ok_or(CoreError::SolverDead)?;
        stdin.write_all(problem.as_bytes()).await?;
        stdin.flush().await?;

        let stdout = self.stdout.as_mut().ok_or(CoreError::SolverDead)?;
        let mut records = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            let n = stdout.read_line(&mut line).await?;
            if n == 0 {
                return Err(CoreError::SolverTransport(
                    "solver closed its output before EOI".to_string(),
                ));
            }
            let trimmed = line.trim_end();
            if trimmed == "c EOI" {
                break;
            }
            if trimmed.is_empty() || trimmed.starts_with('c') {
                continue;
            }
            match parse_flow_line(trimmed) {
                Ok(record) => {
                    if record.flow > 0 {
                        records.push(record);
                    }
                }
                Err(CoreError::MalformedRecord(r)) => {
                    // A garbled flow line loses one record, not the round.
                    warn!("Skipping malformed flow record {:?}", r);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl SolverBackend for SolverProcess {
    async fn submit(&mut self, problem: &str) -> Result<Vec<FlowRecord>, CoreError> {
        if self.child.is_none() || self.state == SolverState::Dead {
            self.respawn()?;
        }
        self.state = SolverState::AwaitingReply;
        match tokio::time::timeout(self.timeout, self.exchange(problem)).await {
            Ok(Ok(records)) => {
                self.state = SolverState::Ready;
                self.needs_full = false;
                debug!("Solver returned {} flow records", records.len());
                Ok(records)
            }
            Ok(Err(e)) => {
                warn!("Solver transport failure: {}", e);
                self.mark_dead();
                Err(e)
            }
            Err(_) => {
                warn!("Solver exceeded {:?}, killing it", self.timeout);
                self.mark_dead();
                Err(CoreError::Timeout(self.timeout))
            }
        }
    }

    fn needs_full_snapshot(&self) -> bool {
        self.needs_full
    }

    async fn restart(&mut self) -> Result<(), CoreError> {
        self.kill().await;
        self.respawn()
    }
}

/// Parse one solver reply record. Only `f` records are valid here;
/// anything else means the solver and dispatcher disagree on the protocol.
fn parse_flow_line(line: &str) -> Result<FlowRecord, CoreError> {
    let Some(rest) = line.strip_prefix("f ") else {
        return Err(CoreError::SolverTransport(format!(
            "unexpected solver record: {:?}",
            line
        )));
    };
    let mut fields = rest.split_whitespace();
    let parse = |field: Option<&str>| {
        field
            .and_then(|f| f.parse::<u64>().ok())
            .ok_or_else(|| CoreError::MalformedRecord(line.to_string()))
    };
    let src = parse(fields.next())?;
    let dst = parse(fields.next())?;
    let flow = parse(fields.next())?;
    if fields.next().is_some() {
        return Err(CoreError::MalformedRecord(line.to_string()));
    }
    Ok(FlowRecord { src, dst, flow })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn write_stub_solver(script_body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("conflux-solver-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stub-solver.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script_body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn config_for(path: PathBuf, timeout_ms: u64) -> SolverConfig {
        SolverConfig {
            solver_path: path,
            solver_args: Vec::new(),
            solver_timeout_ms: timeout_ms,
        }
    }

    #[test]
    fn parses_flow_lines() {
        let record = parse_flow_line("f 3 1 2").unwrap();
        assert_eq!(record, FlowRecord { src: 3, dst: 1, flow: 2 });

        assert!(matches!(
            parse_flow_line("f 3 one 2"),
            Err(CoreError::MalformedRecord(_))
        ));
        assert!(matches!(
            parse_flow_line("s 3 1"),
            Err(CoreError::SolverTransport(_))
        ));
    }

    #[tokio::test]
    async fn round_trips_against_interactive_stub() {
        // Replies with a canned assignment each time a batch terminator
        // arrives, like a long-running incremental solver would.
        let path = write_stub_solver(
            r#"while read line; do
  if [ "$line" = "c EOI" ]; then
    echo "c solution below"
    echo "f 3 2 1"
    echo "f 2 1 1"
    echo "f 4 2 0"
    echo "c EOI"
  fi
done"#,
        );
        let mut solver = SolverProcess::spawn(&config_for(path, 5_000)).unwrap();
        assert!(solver.needs_full_snapshot());

        let records = solver.submit("p min 2 1\na 2 1 0 1 0\nc EOI\n").await.unwrap();
        // Zero-flow records are dropped at the parse boundary.
        assert_eq!(
            records,
            vec![
                FlowRecord { src: 3, dst: 2, flow: 1 },
                FlowRecord { src: 2, dst: 1, flow: 1 },
            ]
        );
        assert!(!solver.needs_full_snapshot());

        // The process stays up across rounds.
        let again = solver.submit("a 5 1 0 1 0\nc EOI\n").await.unwrap();
        assert_eq!(again.len(), 2);
    }

    #[tokio::test]
    async fn timeout_kills_and_requires_full_snapshot() {
        let path = write_stub_solver("sleep 30");
        let mut solver = SolverProcess::spawn(&config_for(path, 200)).unwrap();

        let result = solver.submit("c EOI\n").await;
        assert!(matches!(result, Err(CoreError::Timeout(_))));
        assert!(solver.needs_full_snapshot());
    }

    #[tokio::test]
    async fn crash_is_recovered_by_respawn() {
        // Answers exactly one round, then exits.
        let path = write_stub_solver(
            r#"while read line; do
  if [ "$line" = "c EOI" ]; then
    echo "f 3 1 1"
    echo "c EOI"
    exit 0
  fi
done"#,
        );
        let mut solver = SolverProcess::spawn(&config_for(path, 5_000)).unwrap();

        let first = solver.submit("c EOI\n").await.unwrap();
        assert_eq!(first.len(), 1);

        // The child exited after replying; this round fails over.
        let second = solver.submit("c EOI\n").await;
        assert!(second.is_err());
        assert!(solver.needs_full_snapshot());

        // Next submission respawns transparently and succeeds.
        let third = solver.submit("c EOI\n").await.unwrap();
        assert_eq!(third.len(), 1);
    }

    #[tokio::test]
    async fn explicit_restart_respawns() {
        let path = write_stub_solver(
            r#"while read line; do
  if [ "$line" = "c EOI" ]; then
    echo "c EOI"
  fi
done"#,
        );
        let mut solver = SolverProcess::spawn(&config_for(path, 5_000)).unwrap();
        solver.submit("c EOI\n").await.unwrap();
        assert!(!solver.needs_full_snapshot());

        solver.restart().await.unwrap();
        assert!(solver.needs_full_snapshot());
        solver.submit("c EOI\n").await.unwrap();
    }
}
