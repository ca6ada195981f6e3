//! Host command parsing

use agent_api::{Duration, ExecStage, Signal};
use service_engine::ServiceConfig;
use service_types::{DependencyKind, ServiceFlags, ServiceKind};

/// One parsed script command
#[derive(Debug, Clone)]
pub enum HostCommand {
    /// Register a service from its inline description
    Register(ServiceConfig),
    Start(String),
    Stop(String),
    Restart(String),
    Release(String),
    Wake(String),
    PinStart(String),
    PinStop(String),
    Unpin(String),
    Unload(String),
    /// Inject an exec success for the service's pending launch
    ExecOk(String),
    /// Inject an exec failure (stage, errno)
    ExecFail(String, ExecStage, i32),
    /// Inject a normal process exit with the given code
    Exit(String, i32),
    /// Inject a signal-termination
    Killed(String, Signal),
    /// Inject a readiness notification line
    Ready(String),
    /// Inject readiness-fd EOF
    ReadyEof(String),
    /// Report the forked daemon's pid (bgprocess)
    DaemonPid(String, i32),
    /// Advance the simulated clock by milliseconds
    Advance(u64),
    /// Print the state of every service
    List,
}

/// Parses script lines into commands
pub struct HostCommandParser;

impl HostCommandParser {
    pub fn parse(line: &str) -> Result<HostCommand, String> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or_else(|| "empty command".to_string())?;
        let rest: Vec<&str> = words.collect();

        match verb {
            "register" => Self::parse_register(&rest),
            "start" => Ok(HostCommand::Start(Self::name_arg(verb, &rest)?)),
            "stop" => Ok(HostCommand::Stop(Self::name_arg(verb, &rest)?)),
            "restart" => Ok(HostCommand::Restart(Self::name_arg(verb, &rest)?)),
            "release" => Ok(HostCommand::Release(Self::name_arg(verb, &rest)?)),
            "wake" => Ok(HostCommand::Wake(Self::name_arg(verb, &rest)?)),
            "pin-start" => Ok(HostCommand::PinStart(Self::name_arg(verb, &rest)?)),
            "pin-stop" => Ok(HostCommand::PinStop(Self::name_arg(verb, &rest)?)),
            "unpin" => Ok(HostCommand::Unpin(Self::name_arg(verb, &rest)?)),
            "unload" => Ok(HostCommand::Unload(Self::name_arg(verb, &rest)?)),
            "exec-ok" => Ok(HostCommand::ExecOk(Self::name_arg(verb, &rest)?)),
            "exec-fail" => {
                if rest.len() != 3 {
                    return Err("usage: exec-fail <name> <fork|setup|exec> <errno>".to_string());
                }
                let stage = match rest[1] {
                    "fork" => ExecStage::Fork,
                    "setup" => ExecStage::Setup,
                    "exec" => ExecStage::Exec,
                    other => return Err(format!("unknown exec stage: {}", other)),
                };
                let errno = rest[2]
                    .parse()
                    .map_err(|_| format!("invalid errno: {}", rest[2]))?;
                Ok(HostCommand::ExecFail(rest[0].to_string(), stage, errno))
            }
            "exit" => {
                if rest.len() != 2 {
                    return Err("usage: exit <name> <code>".to_string());
                }
                let code = rest[1]
                    .parse()
                    .map_err(|_| format!("invalid exit code: {}", rest[1]))?;
                Ok(HostCommand::Exit(rest[0].to_string(), code))
            }
            "killed" => {
                if rest.len() != 2 {
                    return Err("usage: killed <name> <signal>".to_string());
                }
                Ok(HostCommand::Killed(
                    rest[0].to_string(),
                    Self::parse_signal(rest[1])?,
                ))
            }
            "ready" => Ok(HostCommand::Ready(Self::name_arg(verb, &rest)?)),
            "ready-eof" => Ok(HostCommand::ReadyEof(Self::name_arg(verb, &rest)?)),
            "daemon-pid" => {
                if rest.len() != 2 {
                    return Err("usage: daemon-pid <name> <pid>".to_string());
                }
                let pid = rest[1]
                    .parse()
                    .map_err(|_| format!("invalid pid: {}", rest[1]))?;
                Ok(HostCommand::DaemonPid(rest[0].to_string(), pid))
            }
            "advance" => {
                if rest.len() != 1 {
                    return Err("usage: advance <millis>".to_string());
                }
                let millis = rest[0]
                    .parse()
                    .map_err(|_| format!("invalid duration: {}", rest[0]))?;
                Ok(HostCommand::Advance(millis))
            }
            "list" => Ok(HostCommand::List),
            other => Err(format!("unknown command: {}", other)),
        }
    }

    fn name_arg(verb: &str, rest: &[&str]) -> Result<String, String> {
        if rest.len() != 1 {
            return Err(format!("usage: {} <name>", verb));
        }
        Ok(rest[0].to_string())
    }

    fn parse_signal(word: &str) -> Result<Signal, String> {
        match word {
            "int" | "SIGINT" => Ok(Signal::Interrupt),
            "term" | "SIGTERM" => Ok(Signal::Terminate),
            "kill" | "SIGKILL" => Ok(Signal::Kill),
            "hup" | "SIGHUP" => Ok(Signal::Hangup),
            other => Err(format!("unknown signal: {}", other)),
        }
    }

    /// `register <name> <kind> [option=value]... [dep=<kind>:<name>]...`
    fn parse_register(rest: &[&str]) -> Result<HostCommand, String> {
        if rest.len() < 2 {
            return Err("usage: register <name> <kind> [option=value]...".to_string());
        }
        let name = rest[0];
        let kind = match rest[1] {
            "internal" => ServiceKind::Internal,
            "process" => ServiceKind::Process,
            "scripted" => ServiceKind::Scripted,
            "bgprocess" => ServiceKind::BgProcess,
            other => return Err(format!("unknown service kind: {}", other)),
        };

        let mut config = ServiceConfig::new(name, kind);
        let mut flags = ServiceFlags::default();
        if kind.has_process() {
            // default command so scripts don't have to spell one out
            config.command = vec![format!("{}-start", name)];
        }

        for option in &rest[2..] {
            let (key, value) = option
                .split_once('=')
                .ok_or_else(|| format!("expected key=value, got: {}", option))?;
            match key {
                "command" => config.command = value.split(',').map(str::to_string).collect(),
                "stop-command" => {
                    config.stop_command = Some(value.split(',').map(str::to_string).collect())
                }
                "auto-restart" => flags.auto_restart = Self::parse_bool(value)?,
                "smooth-recovery" => flags.smooth_recovery = Self::parse_bool(value)?,
                "starts-on-console" => flags.starts_on_console = Self::parse_bool(value)?,
                "runs-on-console" => flags.runs_on_console = Self::parse_bool(value)?,
                "start-interruptible" => flags.start_interruptible = Self::parse_bool(value)?,
                "skippable" => flags.skippable = Self::parse_bool(value)?,
                "notify-ready" => config.notify_ready = Self::parse_bool(value)?,
                "restart-delay-ms" => {
                    config.restart_delay = Duration::from_millis(Self::parse_u64(key, value)?)
                }
                "start-timeout-ms" => {
                    config.start_timeout =
                        Some(Duration::from_millis(Self::parse_u64(key, value)?))
                }
                "stop-timeout-ms" => {
                    config.stop_timeout = Some(Duration::from_millis(Self::parse_u64(key, value)?))
                }
                "chain-to" => config.chain_to = Some(value.to_string()),
                "dep" => {
                    let (dep_kind, dep_name) = value
                        .split_once(':')
                        .ok_or_else(|| format!("expected dep=<kind>:<name>, got: {}", value))?;
                    let dep_kind = match dep_kind {
                        "regular" => DependencyKind::Regular,
                        "milestone" => DependencyKind::Milestone,
                        "waits-for" => DependencyKind::WaitsFor,
                        "soft" => DependencyKind::Soft,
                        other => return Err(format!("unknown dependency kind: {}", other)),
                    };
                    config.dependencies.push((dep_name.to_string(), dep_kind));
                }
                other => return Err(format!("unknown register option: {}", other)),
            }
        }
        config.flags = flags;
        Ok(HostCommand::Register(config))
    }

    fn parse_bool(value: &str) -> Result<bool, String> {
        match value {
            "true" | "yes" => Ok(true),
            "false" | "no" => Ok(false),
            other => Err(format!("expected true/false, got: {}", other)),
        }
    }

    fn parse_u64(key: &str, value: &str) -> Result<u64, String> {
        value
            .parse()
            .map_err(|_| format!("invalid value for {}: {}", key, value))
    }
}
