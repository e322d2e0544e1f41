//! Subcommand definitions.

use std::sync::Arc;

use clap::{Args, Subcommand, ValueEnum};
use dockrule_core::{ENV_WAIT_TICK_MS, ENV_WAIT_TIMEOUT_SECS, WaitSettings};
use dockrule_runtime::logs::{StderrOutput, StdoutOutput, TracingOutput};
use dockrule_runtime::{CaptureOptions, PortMap, StartCondition};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run PROGRAM, stream its output and wait for every condition
    Run(RunArgs),
}

/// Where the program's output is echoed.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogOutput {
    /// Program stdout to our stdout, program stderr to our stderr
    #[default]
    Terminal,
    /// One `tracing` event per line, tagged with the stream
    Tracing,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Seconds each condition may take
    #[arg(long, value_name = "SECS", env = ENV_WAIT_TIMEOUT_SECS)]
    pub timeout: Option<u64>,

    /// Milliseconds between two checks of a condition
    #[arg(long = "tick-ms", value_name = "MS", env = ENV_WAIT_TICK_MS)]
    pub tick_ms: Option<u64>,

    /// Wait for TEXT anywhere in the output (repeatable)
    #[arg(long = "wait-log", value_name = "TEXT")]
    pub wait_log: Vec<String>,

    /// Wait for TEXT after the previous --wait-sequence message (repeatable)
    #[arg(long = "wait-sequence", value_name = "TEXT")]
    pub wait_sequence: Vec<String>,

    /// Wait until PORT accepts TCP connections (repeatable)
    #[arg(long = "wait-tcp", value_name = "PORT")]
    pub wait_tcp: Vec<u16>,

    /// Wait until http://127.0.0.1:PORT/ answers (repeatable)
    #[arg(long = "wait-http", value_name = "PORT")]
    pub wait_http: Vec<u16>,

    /// HTTP method for --wait-http
    #[arg(long = "http-method", value_name = "METHOD", requires = "wait_http")]
    pub http_method: Option<String>,

    /// Accepted status for --wait-http, e.g. 200 or 200..399
    #[arg(long = "http-status", value_name = "PATTERN", requires = "wait_http")]
    pub http_status: Option<String>,

    /// Reach PORT on another local port
    #[arg(long = "port", value_name = "PORT:LOCAL", value_parser = parse_port_mapping)]
    pub ports: Vec<(u16, u16)>,

    /// Do not echo the program's output
    #[arg(short, long)]
    pub quiet: bool,

    /// Where to echo the program's output
    #[arg(long = "log-output", value_enum, default_value_t = LogOutput::Terminal)]
    pub log_output: LogOutput,

    /// Stop the program and exit as soon as it is ready
    #[arg(long = "exit-when-ready")]
    pub exit_when_ready: bool,

    /// Program to run, followed by its arguments
    #[arg(required = true, last = true, value_name = "PROGRAM")]
    pub command: Vec<String>,
}

fn parse_port_mapping(value: &str) -> Result<(u16, u16), String> {
    let (internal, external) = value
        .split_once(':')
        .ok_or_else(|| format!("expected PORT:LOCAL, got '{value}'"))?;
    let parse = |p: &str| {
        p.trim()
            .parse::<u16>()
            .map_err(|e| format!("invalid port '{p}': {e}"))
    };
    Ok((parse(internal)?, parse(external)?))
}

impl RunArgs {
    /// `settings` with the timeout and tick flags applied.
    pub fn apply_to(&self, settings: WaitSettings) -> WaitSettings {
        let mut settings = settings;
        if let Some(secs) = self.timeout {
            settings.timeout_secs = secs;
        }
        if let Some(ms) = self.tick_ms {
            settings.tick_ms = ms;
        }
        settings
    }

    /// Waited ports map to themselves unless remapped with `--port`.
    pub fn port_map(&self) -> PortMap {
        let waited: Vec<u16> = self
            .wait_tcp
            .iter()
            .chain(&self.wait_http)
            .copied()
            .collect();
        self.ports
            .iter()
            .fold(PortMap::identity(&waited), |map, (internal, external)| {
                map.with(*internal, *external)
            })
    }

    /// Capture options for `settings` and the output flags.
    pub fn capture_options(&self, settings: &WaitSettings) -> CaptureOptions {
        let options = CaptureOptions::from_settings(settings);
        if self.quiet {
            return options.quiet();
        }
        match self.log_output {
            LogOutput::Terminal => options
                .with_stdout(Arc::new(StdoutOutput))
                .with_stderr(Arc::new(StderrOutput)),
            LogOutput::Tracing => options
                .with_stdout(Arc::new(TracingOutput::new("stdout")))
                .with_stderr(Arc::new(TracingOutput::new("stderr"))),
        }
    }

    /// Conditions in evaluation order: log, sequence, tcp, http.
    pub fn conditions(&self) -> Vec<StartCondition> {
        let mut conditions: Vec<StartCondition> = self
            .wait_log
            .iter()
            .map(|text| StartCondition::log_message(text.as_str()))
            .collect();
        if !self.wait_sequence.is_empty() {
            conditions.push(StartCondition::log_message_sequence(
                self.wait_sequence.clone(),
            ));
        }
        if !self.wait_tcp.is_empty() {
            conditions.push(StartCondition::tcp_port(&self.wait_tcp));
        }
        for port in &self.wait_http {
            conditions.push(StartCondition::http_ping_with(
                *port,
                self.http_method.as_deref(),
                self.http_status.as_deref(),
            ));
        }
        conditions
    }
}
