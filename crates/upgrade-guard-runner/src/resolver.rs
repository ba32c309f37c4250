// crates/upgrade-guard-runner/src/resolver.rs
// ============================================================================
// Module: Command Resolver
// Description: DependencyResolver backed by a package manager dry run.
// Purpose: Validate top-ranked candidates without installing anything.
// Dependencies: upgrade-guard-core, upgrade-guard-config
// ============================================================================

//! ## Overview
//! [`CommandResolver`] runs the configured command with `name==version`
//! appended. A zero exit status is a successful resolution, a non-zero exit
//! is a failed verdict carrying the tail of stderr, and a command that cannot
//! be started or does not finish in time is a resolver error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::ErrorKind;
use std::io::Read;
use std::process::Command;
use std::process::Stdio;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use upgrade_guard_config::ResolverConfig;
use upgrade_guard_core::DependencyResolver;
use upgrade_guard_core::ResolverError;
use upgrade_guard_core::ResolverRequest;
use upgrade_guard_core::ResolverVerdict;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Interval between exit-status polls.
const POLL_INTERVAL: Duration = Duration::from_millis(25);
/// Maximum characters of stderr kept in a failed verdict.
const MAX_DETAIL_CHARS: usize = 2_000;

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Dry-run resolver that shells out to a package manager.
#[derive(Debug, Clone)]
pub struct CommandResolver {
    /// Program followed by its leading arguments.
    command: Vec<String>,
    /// Per-invocation timeout.
    timeout: Duration,
}

impl CommandResolver {
    /// Creates a resolver from the configured command.
    #[must_use]
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Returns the argument vector for a request.
    #[must_use]
    pub fn arguments(&self, request: &ResolverRequest) -> Vec<String> {
        let mut args: Vec<String> = self.command.iter().skip(1).cloned().collect();
        args.push(format!("{}=={}", request.package, request.to_version));
        args
    }
}

impl DependencyResolver for CommandResolver {
    fn dry_run(&self, request: &ResolverRequest) -> Result<ResolverVerdict, ResolverError> {
        let Some(program) = self.command.first() else {
            return Err(ResolverError::Unavailable("resolver command is empty".to_string()));
        };
        let mut child = Command::new(program)
            .args(self.arguments(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => ResolverError::Unavailable(format!("{program} not found")),
                _ => ResolverError::Failed(format!("{program} could not start: {err}")),
            })?;
        let drain = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buffer = String::new();
                let _ = pipe.read_to_string(&mut buffer);
                buffer
            })
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ResolverError::Failed(format!(
                        "{program} timed out after {} ms",
                        self.timeout.as_millis()
                    )));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(err) => return Err(ResolverError::Failed(err.to_string())),
            }
        };

        let stderr = drain.and_then(|handle| handle.join().ok()).unwrap_or_default();
        if status.success() {
            return Ok(ResolverVerdict::ok());
        }
        Ok(ResolverVerdict::failed(failure_detail(&stderr, status.code())))
    }
}

/// Builds the failed-verdict detail from captured stderr.
fn failure_detail(stderr: &str, code: Option<i32>) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return code.map_or_else(
            || "resolver terminated by signal".to_string(),
            |code| format!("resolver exited with status {code}"),
        );
    }
    let skip = trimmed.chars().count().saturating_sub(MAX_DETAIL_CHARS);
    trimmed.chars().skip(skip).collect()
}
