use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::ProcessError;
use super::runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner};

type ArgsPredicate = Box<dyn Fn(&[String]) -> bool + Send + Sync>;

/// Scripted stand-in for dcm2niix and dcmdump
///
/// Responses are registered per program and tried in registration order;
/// every command is recorded whether or not a response matched.
#[derive(Clone, Default)]
pub struct MockProcessRunner {
    scripted: Arc<Mutex<Vec<Scripted>>>,
    calls: Arc<Mutex<Vec<ProcessCommand>>>,
}

struct Scripted {
    program: String,
    when: Option<ArgsPredicate>,
    reply: Reply,
    limit: Option<usize>,
    used: usize,
}

enum Reply {
    Output(ProcessOutput),
    NotFound,
}

/// Builder for one scripted response, added by [`MockResponseBuilder::register`]
pub struct MockResponseBuilder {
    runner: MockProcessRunner,
    program: String,
    when: Option<ArgsPredicate>,
    output: ProcessOutput,
    missing: bool,
    limit: Option<usize>,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start scripting the response to `program`; successful and silent
    /// unless told otherwise
    pub fn expect(&self, program: &str) -> MockResponseBuilder {
        MockResponseBuilder {
            runner: self.clone(),
            program: program.to_string(),
            when: None,
            output: ProcessOutput {
                status: ExitStatus::Success,
                stdout: String::new(),
                stderr: String::new(),
                duration: Duration::from_millis(5),
            },
            missing: false,
            limit: None,
        }
    }

    pub fn calls(&self) -> Vec<ProcessCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, program: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|command| command.program == program)
            .count()
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        self.calls.lock().unwrap().push(command.clone());

        let mut scripted = self.scripted.lock().unwrap();
        let entry = scripted.iter_mut().find(|entry| {
            entry.program == command.program
                && entry.when.as_ref().map_or(true, |when| when(&command.args))
        });

        let Some(entry) = entry else {
            return Err(ProcessError::MockExpectationNotMet(format!(
                "unexpected command: {}",
                command.display_line()
            )));
        };

        entry.used += 1;
        if let Some(limit) = entry.limit {
            if entry.used > limit {
                return Err(ProcessError::MockExpectationNotMet(format!(
                    "{} run {} times, expected at most {}",
                    command.program, entry.used, limit
                )));
            }
        }

        match &entry.reply {
            Reply::Output(output) => Ok(output.clone()),
            Reply::NotFound => Err(ProcessError::CommandNotFound(command.program)),
        }
    }
}

impl MockResponseBuilder {
    /// Only answer commands whose arguments satisfy `predicate`
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.when = Some(Box::new(predicate));
        self
    }

    pub fn stdout(mut self, stdout: &str) -> Self {
        self.output.stdout = stdout.to_string();
        self
    }

    pub fn stderr(mut self, stderr: &str) -> Self {
        self.output.stderr = stderr.to_string();
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.output.status = match code {
            0 => ExitStatus::Success,
            code => ExitStatus::Error(code),
        };
        self
    }

    /// Behave as if the program is not installed
    pub fn not_found(mut self) -> Self {
        self.missing = true;
        self
    }

    pub fn times(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn register(self) {
        let reply = if self.missing {
            Reply::NotFound
        } else {
            Reply::Output(self.output)
        };
        self.runner.scripted.lock().unwrap().push(Scripted {
            program: self.program,
            when: self.when,
            reply,
            limit: self.limit,
            used: 0,
        });
    }
}
