//! The host runtime: a command loop over the engine

use crate::commands::{HostCommand, HostCommandParser};
use crate::input_script::InputScript;
use agent_api::{Duration, ExitStatus, Pid};
use service_engine::ServiceSet;
use service_types::ServiceId;
use sim_agent::{SimClock, SimProcessAgent};
use thiserror::Error;

/// Host runtime error types
#[derive(Debug, Error)]
pub enum HostRuntimeError {
    #[error("script error at line {line}: {message}")]
    Script { line: usize, message: String },
}

/// Host runtime configuration
#[derive(Debug, Clone, Default)]
pub struct HostRuntimeConfig {
    /// Command script text
    pub script: Option<String>,
    /// Maximum commands to execute (0 = unlimited)
    pub max_steps: usize,
    /// Stop once no service is required any more
    pub exit_on_idle: bool,
}

/// Drives a simulated service set from a command script
pub struct HostRuntime {
    config: HostRuntimeConfig,
    set: ServiceSet<SimProcessAgent, SimClock>,
    steps: usize,
}

impl HostRuntime {
    pub fn new(config: HostRuntimeConfig) -> Self {
        Self {
            config,
            set: ServiceSet::new(SimProcessAgent::new(), SimClock::new()),
            steps: 0,
        }
    }

    /// The underlying service set, for embedding and tests
    pub fn set(&self) -> &ServiceSet<SimProcessAgent, SimClock> {
        &self.set
    }

    pub fn set_mut(&mut self) -> &mut ServiceSet<SimProcessAgent, SimClock> {
        &mut self.set
    }

    /// Runs the configured script to completion
    pub fn run(&mut self) -> Result<(), HostRuntimeError> {
        let text = self.config.script.clone().unwrap_or_default();
        let mut script = InputScript::from_text(&text);
        let mut line_number = 0;

        while let Some(line) = script.next_line() {
            line_number += 1;
            if self.config.max_steps > 0 && self.steps >= self.config.max_steps {
                break;
            }
            let line = line.to_string();
            let command = HostCommandParser::parse(&line).map_err(|message| {
                HostRuntimeError::Script {
                    line: line_number,
                    message,
                }
            })?;
            self.execute(command).map_err(|message| HostRuntimeError::Script {
                line: line_number,
                message,
            })?;
            self.steps += 1;
            self.flush_output();

            if self.config.exit_on_idle && self.set.count_active_services() == 0 {
                println!("idle: no services required");
                break;
            }
        }
        Ok(())
    }

    /// Executes one command against the set
    pub fn execute(&mut self, command: HostCommand) -> Result<(), String> {
        match command {
            HostCommand::Register(config) => {
                let name = config.name.clone();
                let id = self.set.add_service(config).map_err(|e| e.to_string())?;
                println!("registered {} as {}", name, id);
            }
            HostCommand::Start(name) => {
                let id = self.lookup(&name)?;
                self.set.start_service(id);
            }
            HostCommand::Stop(name) => {
                let id = self.lookup(&name)?;
                self.set.stop_service(id);
            }
            HostCommand::Restart(name) => {
                let id = self.lookup(&name)?;
                if !self.set.restart_service(id) {
                    println!("{} is not started; restart ignored", name);
                }
            }
            HostCommand::Release(name) => {
                let id = self.lookup(&name)?;
                self.set.release_service(id);
            }
            HostCommand::Wake(name) => {
                let id = self.lookup(&name)?;
                self.set.wake_service(id).map_err(|e| e.to_string())?;
            }
            HostCommand::PinStart(name) => {
                let id = self.lookup(&name)?;
                self.set.pin_start(id).map_err(|e| e.to_string())?;
            }
            HostCommand::PinStop(name) => {
                let id = self.lookup(&name)?;
                self.set.pin_stop(id).map_err(|e| e.to_string())?;
            }
            HostCommand::Unpin(name) => {
                let id = self.lookup(&name)?;
                self.set.unpin_service(id);
            }
            HostCommand::Unload(name) => {
                let id = self.lookup(&name)?;
                self.set.unload_service(id).map_err(|e| e.to_string())?;
            }
            HostCommand::ExecOk(name) => {
                let id = self.lookup(&name)?;
                self.set.exec_succeeded(id);
                self.set.process_queues();
            }
            HostCommand::ExecFail(name, stage, errno) => {
                let id = self.lookup(&name)?;
                self.set.exec_failed(id, stage, errno);
                self.set.process_queues();
            }
            HostCommand::Exit(name, code) => {
                let id = self.lookup(&name)?;
                self.set.handle_exit(id, ExitStatus::Exited(code));
                self.set.process_queues();
            }
            HostCommand::Killed(name, signal) => {
                let id = self.lookup(&name)?;
                self.set.handle_exit(id, ExitStatus::Signalled(signal));
                self.set.process_queues();
            }
            HostCommand::Ready(name) => {
                let id = self.lookup(&name)?;
                self.set.ready_notification(id);
                self.set.process_queues();
            }
            HostCommand::ReadyEof(name) => {
                let id = self.lookup(&name)?;
                self.set.notify_closed(id);
                self.set.process_queues();
            }
            HostCommand::DaemonPid(name, pid) => {
                let id = self.lookup(&name)?;
                self.set.daemon_pid_reported(id, Pid::from_raw(pid));
                self.set.process_queues();
            }
            HostCommand::Advance(millis) => {
                let expired = self
                    .set
                    .clock_mut()
                    .advance(Duration::from_millis(millis));
                for handle in expired {
                    self.set.handle_timer_expiry(handle);
                }
                self.set.process_queues();
            }
            HostCommand::List => {
                for summary in self.set.list() {
                    let pid = summary
                        .pid
                        .map(|pid| pid.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<20} {:<9} (wants {:<7}) required-by={} {} reason={}",
                        summary.name,
                        summary.state.to_string(),
                        summary.desired_state.to_string(),
                        summary.required_by,
                        pid,
                        summary.stop_reason,
                    );
                }
            }
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<ServiceId, String> {
        self.set
            .find_service(name)
            .ok_or_else(|| format!("no service named {}", name))
    }

    fn flush_output(&mut self) {
        for entry in self.set.drain_journal() {
            println!("{}", entry);
        }
        for (id, event) in self.set.drain_events() {
            let name = self
                .set
                .service(id)
                .map(|record| record.name().to_string())
                .unwrap_or_else(|| id.to_string());
            println!("event: {} {}", name, event);
        }
    }
}
