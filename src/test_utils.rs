//! Test utilities for common test setup.
//!
//! This module provides shared test helpers used across multiple test modules.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::install::spawn::{Invocation, ProcessOutput, SpawnError, Spawner};

/// Command label reported for elevation probes (they carry no install command).
pub const PROBE: &str = "<elevation probe>";

/// Canned answer for one invocation.
pub enum Reply {
    /// Exit 0 with this stdout.
    Ok(String),
    /// Exit 1 with this stderr.
    Fail(String),
    /// Program not on `PATH`.
    Missing,
}

type Rule = Box<dyn Fn(&str, usize) -> Reply + Send + Sync>;
type Hook = Box<dyn Fn(&str) + Send + Sync>;

/// What: Fake `Spawner` that records invocations and answers from a rule.
///
/// Details:
/// - The rule receives the install command (or [`PROBE`]) and the zero-based
///   call index.
/// - An optional hook runs before the reply, e.g. to cancel a batch mid-run.
pub struct ScriptedSpawner {
    calls: Mutex<Vec<Invocation>>,
    rule: Rule,
    hook: Option<Hook>,
}

impl ScriptedSpawner {
    /// Build from an arbitrary rule.
    pub fn new(rule: impl Fn(&str, usize) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            rule: Box::new(rule),
            hook: None,
        })
    }

    /// Build from a rule plus a hook run on every invocation.
    pub fn with_hook(
        rule: impl Fn(&str, usize) -> Reply + Send + Sync + 'static,
        hook: impl Fn(&str) + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            rule: Box::new(rule),
            hook: Some(Box::new(hook)),
        })
    }

    /// Every invocation succeeds with stdout `ok`.
    pub fn always_ok() -> Arc<Self> {
        Self::new(|_, _| Reply::Ok("ok".to_string()))
    }

    /// Invocations whose command matches `pred` fail with `stderr`.
    pub fn failing_when(
        pred: impl Fn(&str) -> bool + Send + Sync + 'static,
        stderr: &str,
    ) -> Arc<Self> {
        let stderr = stderr.to_string();
        Self::new(move |cmd, _| {
            if pred(cmd) {
                Reply::Fail(stderr.clone())
            } else {
                Reply::Ok("ok".to_string())
            }
        })
    }

    /// The first `n` invocations fail with `stderr`, the rest succeed.
    pub fn fail_first(n: usize, stderr: &str) -> Arc<Self> {
        let stderr = stderr.to_string();
        Self::new(move |_, idx| {
            if idx < n {
                Reply::Fail(stderr.clone())
            } else {
                Reply::Ok("ok".to_string())
            }
        })
    }

    /// Every program is reported missing.
    pub fn missing_program() -> Arc<Self> {
        Self::new(|_, _| Reply::Missing)
    }

    /// Snapshot of recorded invocations.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().expect("calls mutex").clone()
    }

    /// Install commands of recorded invocations, probes excluded.
    pub fn commands(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .filter_map(command_of)
            .map(str::to_string)
            .collect()
    }

    /// Number of recorded elevation probes.
    pub fn probe_count(&self) -> usize {
        self.invocations()
            .iter()
            .filter(|inv| command_of(inv).is_none())
            .count()
    }
}

/// Install command carried by an invocation; `None` for probes.
pub fn command_of(inv: &Invocation) -> Option<&str> {
    let is_install =
        inv.program == "bash" || inv.program == "cmd" || inv.args.iter().any(|a| a == "bash");
    if is_install {
        inv.args.last().map(String::as_str)
    } else {
        None
    }
}

#[async_trait]
impl Spawner for ScriptedSpawner {
    async fn run(&self, invocation: Invocation) -> Result<ProcessOutput, SpawnError> {
        let label = command_of(&invocation).unwrap_or(PROBE).to_string();
        let idx = {
            let mut calls = self.calls.lock().expect("calls mutex");
            calls.push(invocation.clone());
            calls.len() - 1
        };
        if let Some(hook) = &self.hook {
            hook(&label);
        }
        match (self.rule)(&label, idx) {
            Reply::Ok(stdout) => Ok(ProcessOutput {
                code: Some(0),
                stdout,
                stderr: String::new(),
            }),
            Reply::Fail(stderr) => Ok(ProcessOutput {
                code: Some(1),
                stdout: String::new(),
                stderr,
            }),
            Reply::Missing => Err(SpawnError::NotFound {
                program: invocation.program,
            }),
        }
    }
}
