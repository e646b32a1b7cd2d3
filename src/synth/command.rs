//! Synthesis through an external command-line TTS tool.
//!
//! The default setup runs `gtts-cli --lang {lang} --output {output} -` and
//! feeds the chunk on stdin. The child is polled rather than waited on so a
//! cancellation can kill it mid-request.

use super::synthesizer::{SynthesisRequest, Synthesizer};
use crate::config::SynthesisConfig;
use crate::control::CancelToken;
use crate::defaults::RESULT_POLL_INTERVAL;
use crate::error::{ChunkvoxError, Result};
use crate::persist::remove_file_best_effort;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const LANG_PLACEHOLDER: &str = "{lang}";
const OUTPUT_PLACEHOLDER: &str = "{output}";
const TEXT_PLACEHOLDER: &str = "{text}";

#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    command: String,
    args: Vec<String>,
    slow_flag: String,
    poll_interval: Duration,
}

impl CommandSynthesizer {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            slow_flag: String::new(),
            poll_interval: RESULT_POLL_INTERVAL,
        }
    }

    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone()).with_slow_flag(&config.slow_flag)
    }

    pub fn with_slow_flag(mut self, flag: &str) -> Self {
        self.slow_flag = flag.to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Whether the chunk text is passed as an argument instead of on stdin.
    fn text_in_args(&self) -> bool {
        self.args.iter().any(|a| a.contains(TEXT_PLACEHOLDER))
    }

    /// Expand the argument template for one request.
    pub fn build_args(&self, request: &SynthesisRequest<'_>, destination: &Path) -> Vec<String> {
        let output = destination.display().to_string();
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| {
                a.replace(LANG_PLACEHOLDER, request.language)
                    .replace(OUTPUT_PLACEHOLDER, &output)
                    .replace(TEXT_PLACEHOLDER, request.text)
            })
            .collect();
        if request.speed.is_slow() && !self.slow_flag.is_empty() {
            args.push(self.slow_flag.clone());
        }
        args
    }

    fn spawn(&self, args: &[String]) -> Result<Child> {
        let stdin = if self.text_in_args() {
            Stdio::null()
        } else {
            Stdio::piped()
        };
        Command::new(&self.command)
            .args(args)
            .stdin(stdin)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ChunkvoxError::SynthesisToolNotFound {
                        tool: self.command.clone(),
                    }
                } else {
                    ChunkvoxError::SynthesisFailed {
                        message: format!("Failed to execute {}: {}", self.command, e),
                    }
                }
            })
    }

    /// Poll until the child exits or `cancel` fires.
    fn wait(&self, child: &mut Child, cancel: &CancelToken) -> Result<Option<ExitStatus>> {
        loop {
            if cancel.is_cancelled() {
                if let Err(e) = child.kill() {
                    debug!(error = %e, "kill after cancel");
                }
                let _ = child.wait();
                return Ok(None);
            }
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }
            cancel.wait_timeout(self.poll_interval);
        }
    }
}

impl Synthesizer for CommandSynthesizer {
    fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
        destination: &Path,
        cancel: &CancelToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(ChunkvoxError::SynthesisCancelled);
        }

        let args = self.build_args(request, destination);
        debug!(command = %self.command, chunk = request.index + 1, "spawning synthesis");
        let mut child = self.spawn(&args)?;

        // Drain stderr on a side thread so a chatty tool cannot fill the pipe
        // and stall before exiting.
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        if let Some(mut stdin) = child.stdin.take()
            && let Err(e) = stdin.write_all(request.text.as_bytes())
        {
            warn!(error = %e, "could not write chunk text to synthesis command");
        }

        // On cancel the reader is left detached: a grandchild of the killed
        // tool may still hold the pipe open.
        let Some(status) = self.wait(&mut child, cancel)? else {
            remove_file_best_effort(destination);
            return Err(ChunkvoxError::SynthesisCancelled);
        };
        let stderr = stderr_reader
            .and_then(|h| h.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(ChunkvoxError::SynthesisFailed {
                message: format!(
                    "{} failed with status {:?}: {}",
                    self.command,
                    status.code(),
                    stderr.trim()
                ),
            });
        }

        if !destination.is_file() {
            return Err(ChunkvoxError::SynthesisFailed {
                message: format!("{} produced no file at {}", self.command, destination.display()),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.command
    }
}
