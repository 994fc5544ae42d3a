//! Command execution abstraction for testability
//!
//! Drivers and mailers never spawn processes directly; they hand a
//! [`ToolInvocation`] to a [`CommandExecutor`], which tests replace with the
//! recording [`mock::MockExecutor`].

use super::command::{ToolError, ToolInvocation};
use std::process::Output;

/// Abstraction for command execution, enabling mocking in tests
pub trait CommandExecutor: Send + Sync {
    /// Run a tool to completion, failing on a non-zero exit status
    fn run(&self, invocation: &ToolInvocation) -> Result<Output, ToolError>;

    /// Run a tool and return stdout as string
    fn run_stdout(&self, invocation: &ToolInvocation) -> Result<String, ToolError> {
        let output = self.run(invocation)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Whether the program is available on this host
    fn command_exists(&self, program: &str) -> bool;
}

/// Default implementation using real subprocess calls
#[derive(Debug, Clone, Default)]
pub struct RealExecutor;

impl RealExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealExecutor {
    fn run(&self, invocation: &ToolInvocation) -> Result<Output, ToolError> {
        super::command::run_tool(invocation)
    }

    fn command_exists(&self, program: &str) -> bool {
        super::command::program_exists(program)
    }
}

/// A mock executor for testing that records calls and returns configured responses
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use crate::utils::command::StdinSource;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

    /// Recorded command invocation
    #[derive(Clone, Debug)]
    pub struct CommandCall {
        pub program: String,
        pub args: Vec<String>,
        pub envs: Vec<(String, String)>,
        pub stdin: Option<StdinSource>,
        pub working_dir: Option<String>,
    }

    impl CommandCall {
        /// Whether any argument equals `arg`
        pub fn has_arg(&self, arg: &str) -> bool {
            self.args.iter().any(|a| a == arg)
        }

        /// Value of the first `--flag=value` argument
        pub fn flag_value(&self, flag: &str) -> Option<&str> {
            let prefix = format!("{}=", flag);
            self.args
                .iter()
                .find_map(|a| a.strip_prefix(prefix.as_str()))
        }
    }

    /// Response configuration for mock
    #[derive(Clone, Debug)]
    pub enum MockResponse {
        Success { stdout: String, stderr: String },
        Failure { output: String, exit_code: i32 },
    }

    impl MockResponse {
        pub fn stdout(stdout: impl Into<String>) -> Self {
            MockResponse::Success {
                stdout: stdout.into(),
                stderr: String::new(),
            }
        }

        pub fn failure(output: impl Into<String>) -> Self {
            MockResponse::Failure {
                output: output.into(),
                exit_code: 1,
            }
        }
    }

    impl Default for MockResponse {
        fn default() -> Self {
            MockResponse::Success {
                stdout: String::new(),
                stderr: String::new(),
            }
        }
    }

    /// Side effect run before a response is returned, e.g. writing a dump file
    pub type Effect = Arc<dyn Fn(&ToolInvocation) + Send + Sync>;

    /// Mock executor for testing
    #[derive(Clone, Default)]
    pub struct MockExecutor {
        /// Recorded command invocations
        pub calls: Arc<Mutex<Vec<CommandCall>>>,
        /// Pre-configured responses: program name -> response
        responses: Arc<Mutex<HashMap<String, MockResponse>>>,
        /// Default response when no specific response is configured
        default_response: Arc<Mutex<MockResponse>>,
        /// Programs reported as not installed
        missing: Arc<Mutex<HashSet<String>>>,
        effects: Arc<Mutex<HashMap<String, Effect>>>,
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure a response for a specific program
        pub fn expect(self, program: &str, response: MockResponse) -> Self {
            lock(&self.responses).insert(program.to_string(), response);
            self
        }

        /// Set the default response for unconfigured programs
        pub fn with_default_response(self, response: MockResponse) -> Self {
            *lock(&self.default_response) = response;
            self
        }

        /// Report a program as absent from `command_exists`
        pub fn without_program(self, program: &str) -> Self {
            lock(&self.missing).insert(program.to_string());
            self
        }

        /// Run `effect` every time `program` is invoked
        pub fn on_call<F>(self, program: &str, effect: F) -> Self
        where
            F: Fn(&ToolInvocation) + Send + Sync + 'static,
        {
            lock(&self.effects).insert(program.to_string(), Arc::new(effect));
            self
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<CommandCall> {
            lock(&self.calls).clone()
        }

        /// Recorded calls to a specific program, in order
        pub fn calls_to(&self, program: &str) -> Vec<CommandCall> {
            lock(&self.calls)
                .iter()
                .filter(|c| c.program == program)
                .cloned()
                .collect()
        }

        /// Check if a program was called
        pub fn was_called(&self, program: &str) -> bool {
            lock(&self.calls).iter().any(|c| c.program == program)
        }

        /// Get number of calls to a specific program
        pub fn call_count(&self, program: &str) -> usize {
            lock(&self.calls)
                .iter()
                .filter(|c| c.program == program)
                .count()
        }

        fn record_call(&self, invocation: &ToolInvocation) {
            lock(&self.calls).push(CommandCall {
                program: invocation.program.clone(),
                args: invocation.args.clone(),
                envs: invocation.envs.clone(),
                stdin: invocation.stdin.clone(),
                working_dir: invocation
                    .working_dir
                    .as_ref()
                    .map(|p| p.display().to_string()),
            });
        }

        fn get_response(&self, program: &str) -> MockResponse {
            lock(&self.responses)
                .get(program)
                .cloned()
                .unwrap_or_else(|| lock(&self.default_response).clone())
        }

        fn execute_response(&self, program: &str, response: MockResponse) -> Result<Output, ToolError> {
            match response {
                MockResponse::Success { stdout, stderr } => Ok(Output {
                    status: std::process::ExitStatus::default(),
                    stdout: stdout.into_bytes(),
                    stderr: stderr.into_bytes(),
                }),
                MockResponse::Failure { output, exit_code } => Err(ToolError::Failed {
                    program: program.to_string(),
                    code: Some(exit_code),
                    output,
                }),
            }
        }
    }

    impl CommandExecutor for MockExecutor {
        fn run(&self, invocation: &ToolInvocation) -> Result<Output, ToolError> {
            self.record_call(invocation);
            let effect = lock(&self.effects).get(&invocation.program).cloned();
            if let Some(effect) = effect {
                effect(invocation);
            }
            let response = self.get_response(&invocation.program);
            self.execute_response(&invocation.program, response)
        }

        fn command_exists(&self, program: &str) -> bool {
            !lock(&self.missing).contains(program)
        }
    }
}
