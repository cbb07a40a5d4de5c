//! External process execution
//!
//! Every tool kchart drives (kubectl, helm, aws, pg_dump, ...) goes through a
//! [`CommandRunner`]. The system implementation captures stdout and stderr,
//! turns a non-zero exit into [`KubeError::CommandFailed`] carrying stderr
//! verbatim, and strips the trailing newline from stdout so it can be
//! embedded in the next command.

use console::style;
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::error::{KubeError, Result};

/// A command line to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment variables
    pub envs: Vec<(String, String)>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Shell-like rendering for logs and the debug echo
    ///
    /// Environment values are not shown; they may carry credentials.
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + self.envs.len() + 1);
        for (key, _) in &self.envs {
            parts.push(format!("{}=***", key));
        }
        parts.push(quote(&self.program));
        parts.extend(self.args.iter().map(|a| quote(a)));
        parts.join(" ")
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.envs(self.envs.iter().map(|(k, v)| (k, v)));
        command
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,@%+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// A process left running in the background
pub trait BackgroundProcess {
    /// OS process id
    fn id(&self) -> u32;

    /// Whether the process is still alive
    fn is_running(&mut self) -> Result<bool>;

    /// Collected stderr, once the process has exited
    fn stderr(&mut self) -> String;

    /// Ask the process to stop (SIGTERM on unix) and reap it
    fn terminate(&mut self) -> Result<()>;
}

/// Execution primitive shared by every component
pub trait CommandRunner {
    /// Run to completion and return stdout without its trailing newline
    fn run(&self, command: &ExternalCommand) -> Result<String>;

    /// Pipe `producer` stdout into `consumer` stdin
    ///
    /// When `output` is given, the consumer's stdout is written to that file.
    fn pipe(
        &self,
        producer: &ExternalCommand,
        consumer: &ExternalCommand,
        output: Option<&Path>,
    ) -> Result<()>;

    /// Start a command without waiting for it
    fn spawn(&self, command: &ExternalCommand) -> Result<Box<dyn BackgroundProcess>>;

    /// Locate an executable on PATH
    fn find_executable(&self, program: &str) -> Option<PathBuf>;
}

/// Runs commands as real OS processes
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    /// Echo every command line before it runs
    debug: bool,
}

impl SystemRunner {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    fn announce(&self, line: &str) {
        tracing::debug!(command = %line, "running external command");
        if self.debug {
            println!("{} {}", style("$").dim(), style(line).dim());
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ExternalCommand) -> Result<String> {
        let line = command.command_line();
        self.announce(&line);

        let output = command
            .to_command()
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(&command.program, e))?;

        if !output.status.success() {
            return Err(KubeError::CommandFailed {
                command: line,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.trim_end_matches(['\n', '\r']).to_string())
    }

    fn pipe(
        &self,
        producer: &ExternalCommand,
        consumer: &ExternalCommand,
        output: Option<&Path>,
    ) -> Result<()> {
        let line = format!("{} | {}", producer.command_line(), consumer.command_line());
        match output {
            Some(path) => self.announce(&format!("{} > {}", line, path.display())),
            None => self.announce(&line),
        }

        let result = output
            .map(File::create)
            .transpose()
            .map_err(KubeError::from)
            .and_then(|file| run_pipeline(producer, consumer, file));

        if result.is_err() {
            if let Some(path) = output {
                remove_partial_output(path);
            }
        }
        result
    }

    fn spawn(&self, command: &ExternalCommand) -> Result<Box<dyn BackgroundProcess>> {
        let line = command.command_line();
        self.announce(&line);

        let (stderr, stderr_stdio) = StderrSpool::new()?;
        let child = command
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr_stdio)
            .spawn()
            .map_err(|e| spawn_error(&command.program, e))?;

        Ok(Box::new(ChildProcess { child, stderr }))
    }

    fn find_executable(&self, program: &str) -> Option<PathBuf> {
        find_on_path(program, std::env::var_os("PATH")?)
    }
}

/// `producer | consumer [> output]`, both processes reaped before returning
fn run_pipeline(
    producer: &ExternalCommand,
    consumer: &ExternalCommand,
    output: Option<File>,
) -> Result<()> {
    let (mut producer_stderr, producer_stderr_stdio) = StderrSpool::new()?;
    let (mut consumer_stderr, consumer_stderr_stdio) = StderrSpool::new()?;

    let mut upstream = producer
        .to_command()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(producer_stderr_stdio)
        .spawn()
        .map_err(|e| spawn_error(&producer.program, e))?;

    let Some(upstream_out) = upstream.stdout.take() else {
        stop(&mut upstream);
        return Err(KubeError::Io(std::io::Error::other("producer stdout unavailable")));
    };

    // The command is dropped right after spawning so the consumer holds the
    // only read end of the pipe.
    let spawned = {
        let mut command = consumer.to_command();
        command
            .stdin(Stdio::from(upstream_out))
            .stderr(consumer_stderr_stdio)
            .stdout(output.map_or_else(Stdio::null, Stdio::from));
        command.spawn()
    };
    let mut downstream = match spawned {
        Ok(child) => child,
        Err(e) => {
            stop(&mut upstream);
            return Err(spawn_error(&consumer.program, e));
        }
    };

    let consumer_status = match downstream.wait() {
        Ok(status) => status,
        Err(e) => {
            stop(&mut upstream);
            stop(&mut downstream);
            return Err(e.into());
        }
    };
    let producer_status = upstream.wait()?;

    if !producer_status.success() {
        return Err(KubeError::CommandFailed {
            command: producer.command_line(),
            status: producer_status.code(),
            stderr: producer_stderr.contents(),
        });
    }
    if !consumer_status.success() {
        return Err(KubeError::CommandFailed {
            command: consumer.command_line(),
            status: consumer_status.code(),
            stderr: consumer_stderr.contents(),
        });
    }
    Ok(())
}

fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn remove_partial_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "cannot remove partial output: {}", e),
    }
}

/// Child stderr spooled to an anonymous temp file
///
/// Read only once the child has exited; the child never waits on a reader.
struct StderrSpool {
    file: File,
}

impl StderrSpool {
    fn new() -> Result<(Self, Stdio)> {
        let file = tempfile::tempfile()?;
        let stdio = Stdio::from(file.try_clone()?);
        Ok((Self { file }, stdio))
    }

    fn contents(&mut self) -> String {
        let mut buffer = Vec::new();
        if self.file.seek(SeekFrom::Start(0)).is_ok() {
            let _ = self.file.read_to_end(&mut buffer);
        }
        String::from_utf8_lossy(&buffer).trim_end().to_string()
    }
}

fn spawn_error(program: &str, error: std::io::Error) -> KubeError {
    if error.kind() == std::io::ErrorKind::NotFound {
        KubeError::MissingExecutable {
            program: program.to_string(),
        }
    } else {
        KubeError::Io(error)
    }
}

/// Search a PATH-style list of directories for an executable
pub fn find_on_path(program: &str, path: impl AsRef<std::ffi::OsStr>) -> Option<PathBuf> {
    std::env::split_paths(path.as_ref())
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

/// A spawned OS process
struct ChildProcess {
    child: Child,
    stderr: StderrSpool,
}

impl BackgroundProcess for ChildProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn is_running(&mut self) -> Result<bool> {
        Ok(self.child.try_wait()?.is_none())
    }

    fn stderr(&mut self) -> String {
        self.stderr.contents()
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> Result<()> {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        signal::kill(Pid::from_raw(self.child.id() as i32), Signal::SIGTERM)
            .map_err(|e| KubeError::Io(std::io::Error::from(e)))?;
        self.child.wait()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}
