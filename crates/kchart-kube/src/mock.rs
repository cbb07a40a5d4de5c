//! Scripted command runner for testing
//!
//! Records every command line and answers from a table of scripted
//! responses, so cluster, registry and tunnel logic can be exercised
//! without kubectl, helm or aws installed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::{KubeError, Result};
use crate::runner::{BackgroundProcess, CommandRunner, ExternalCommand};

#[derive(Debug, Clone)]
enum Response {
    Stdout(String),
    Failure { status: i32, stderr: String },
}

#[derive(Debug, Default)]
struct MockState {
    /// (command-line prefix, response); longest matching prefix wins
    responses: Vec<(String, Response)>,
    calls: Vec<String>,
    executables: HashSet<String>,
    spawn_failure: Option<String>,
    exit_immediately: bool,
    spawned: usize,
    terminations: usize,
}

/// In-memory command runner for tests
#[derive(Clone, Default)]
pub struct MockRunner {
    state: Arc<RwLock<MockState>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with `stdout`
    pub fn respond(self, prefix: &str, stdout: &str) -> Self {
        self.state.write().unwrap().responses.push((
            prefix.to_string(),
            Response::Stdout(stdout.to_string()),
        ));
        self
    }

    /// Fail commands starting with `prefix`
    pub fn fail(self, prefix: &str, status: i32, stderr: &str) -> Self {
        self.state.write().unwrap().responses.push((
            prefix.to_string(),
            Response::Failure {
                status,
                stderr: stderr.to_string(),
            },
        ));
        self
    }

    /// Pretend `program` is installed
    pub fn with_executable(self, program: &str) -> Self {
        self.state
            .write()
            .unwrap()
            .executables
            .insert(program.to_string());
        self
    }

    /// Make every spawn fail with the given message
    pub fn fail_spawn(self, message: &str) -> Self {
        self.state.write().unwrap().spawn_failure = Some(message.to_string());
        self
    }

    /// Spawned processes exit right away
    pub fn exit_immediately(self) -> Self {
        self.state.write().unwrap().exit_immediately = true;
        self
    }

    /// Every command line seen so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.state.read().unwrap().calls.clone()
    }

    /// Command lines starting with `prefix`
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// Number of processes started with `spawn`
    pub fn spawned(&self) -> usize {
        self.state.read().unwrap().spawned
    }

    /// Number of terminate calls received by spawned processes
    pub fn terminations(&self) -> usize {
        self.state.read().unwrap().terminations
    }

    fn answer(&self, line: &str) -> Result<String> {
        let state = self.state.read().unwrap();
        let response = state
            .responses
            .iter()
            .filter(|(prefix, _)| line.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, response)| response.clone());

        match response {
            Some(Response::Stdout(stdout)) => Ok(stdout),
            Some(Response::Failure { status, stderr }) => Err(KubeError::CommandFailed {
                command: line.to_string(),
                status: Some(status),
                stderr,
            }),
            None => Ok(String::new()),
        }
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, command: &ExternalCommand) -> Result<String> {
        let line = command.command_line();
        self.state.write().unwrap().calls.push(line.clone());
        self.answer(&line)
    }

    fn pipe(
        &self,
        producer: &ExternalCommand,
        consumer: &ExternalCommand,
        output: Option<&Path>,
    ) -> Result<()> {
        let line = match output {
            Some(path) => format!(
                "{} | {} > {}",
                producer.command_line(),
                consumer.command_line(),
                path.display()
            ),
            None => format!("{} | {}", producer.command_line(), consumer.command_line()),
        };
        self.state.write().unwrap().calls.push(line.clone());
        // The consumer opens its output before anything can fail
        if let Some(path) = output {
            let _ = std::fs::write(path, b"");
        }
        self.answer(&line).map(|_| ())
    }

    fn spawn(&self, command: &ExternalCommand) -> Result<Box<dyn BackgroundProcess>> {
        let line = command.command_line();
        let mut state = self.state.write().unwrap();
        state.calls.push(line.clone());

        if let Some(message) = &state.spawn_failure {
            return Err(KubeError::Io(std::io::Error::other(message.clone())));
        }

        state.spawned += 1;
        Ok(Box::new(MockProcess {
            id: state.spawned as u32,
            running: !state.exit_immediately,
            state: Arc::clone(&self.state),
        }))
    }

    fn find_executable(&self, program: &str) -> Option<PathBuf> {
        let state = self.state.read().unwrap();
        state
            .executables
            .contains(program)
            .then(|| PathBuf::from("/usr/bin").join(program))
    }
}

struct MockProcess {
    id: u32,
    running: bool,
    state: Arc<RwLock<MockState>>,
}

impl BackgroundProcess for MockProcess {
    fn id(&self) -> u32 {
        self.id
    }

    fn is_running(&mut self) -> Result<bool> {
        Ok(self.running)
    }

    fn stderr(&mut self) -> String {
        if self.running {
            String::new()
        } else {
            "error: unable to forward port".to_string()
        }
    }

    fn terminate(&mut self) -> Result<()> {
        self.state.write().unwrap().terminations += 1;
        self.running = false;
        Ok(())
    }
}
