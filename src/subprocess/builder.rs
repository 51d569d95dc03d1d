use std::path::Path;
use std::time::Duration;

use super::error::ProcessError;
use super::runner::ProcessCommand;

/// Assembles a [`ProcessCommand`] argument by argument
pub struct ProcessCommandBuilder {
    command: ProcessCommand,
}

impl ProcessCommandBuilder {
    pub fn new(program: &str) -> Self {
        Self {
            command: ProcessCommand {
                program: program.to_string(),
                args: Vec::new(),
                timeout: None,
            },
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.command.args.push(arg.to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.command
            .args
            .extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Split a free-form option string the way a POSIX shell would and
    /// append the pieces
    pub fn options(self, options: &str) -> Result<Self, ProcessError> {
        let words = shell_words::split(options)
            .map_err(|e| ProcessError::InvalidArguments(format!("{}: {}", options, e)))?;
        Ok(self.args(words))
    }

    /// A path is always a single argument, spaces and all
    pub fn path_arg(self, path: &Path) -> Self {
        let arg = path.to_string_lossy().into_owned();
        self.arg(&arg)
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command.timeout = timeout;
        self
    }

    pub fn build(self) -> ProcessCommand {
        self.command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_are_shell_split() {
        let command = ProcessCommandBuilder::new("dcm2niix")
            .options("-b y -f 'a b'")
            .unwrap()
            .path_arg(Path::new("/raw/sub 01"))
            .build();
        assert_eq!(command.args, vec!["-b", "y", "-f", "a b", "/raw/sub 01"]);
        assert_eq!(command.timeout, None);
    }

    #[test]
    fn test_unbalanced_quote_is_invalid() {
        let result = ProcessCommandBuilder::new("dcm2niix").options("-b \"y");
        assert!(matches!(result, Err(ProcessError::InvalidArguments(_))));
    }
}
