//! # Warden Host Daemon
//!
//! Entry point for the script-driven supervision runtime.

use std::env;
use std::fs;
use std::process;
use wardend::{HostRuntime, HostRuntimeConfig};

fn main() {
    let args: Vec<String> = env::args().collect();

    let config = parse_args(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        print_usage(&args[0]);
        process::exit(1);
    });

    let mut runtime = HostRuntime::new(config);
    if let Err(e) = runtime.run() {
        eprintln!("Runtime error: {}", e);
        process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<HostRuntimeConfig, String> {
    let mut config = HostRuntimeConfig::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--script" | "-s" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --script".to_string());
                }
                let script_path = &args[i];
                let script_text = fs::read_to_string(script_path)
                    .map_err(|e| format!("Failed to read script file: {}", e))?;
                config.script = Some(script_text);
            }
            "--max-steps" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --max-steps".to_string());
                }
                config.max_steps = args[i]
                    .parse()
                    .map_err(|_| format!("Invalid max-steps value: {}", args[i]))?;
            }
            "--exit-on-idle" => {
                config.exit_on_idle = true;
            }
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other => {
                return Err(format!("Unknown option: {}", other));
            }
        }
        i += 1;
    }

    Ok(config)
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -s, --script <FILE>      Command script file");
    eprintln!("  --max-steps <N>          Maximum commands to execute (0 = unlimited)");
    eprintln!("  --exit-on-idle           Exit once no service is required");
    eprintln!("  -h, --help               Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} --script demos/webstack.warden", program);
    eprintln!("  {} --script boot.warden --exit-on-idle", program);
}
