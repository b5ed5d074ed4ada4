use std::{env, env::VarError};

/// There's no real CLI for the relay, so just do quick 'n dirty. Returns true if help was printed.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    const DISPLAY_ENVS: [&str; 18] = [
        "RUST_LOG",
        "RELAY_HOST",
        "RELAY_PORT",
        "RELAY_STORAGE_BACKEND",
        "RELAY_DATABASE_URL",
        "RELAY_DB_MAX_CONNECTIONS",
        "RELAY_DEFAULT_PROCESSOR_URL",
        "RELAY_FALLBACK_PROCESSOR_URL",
        "RELAY_PAYMENT_TIMEOUT_MS",
        "RELAY_HEALTH_TIMEOUT_MS",
        "RELAY_HEALTH_CHECKS",
        "RELAY_HEALTH_CHECK_INTERVAL_MS",
        "RELAY_HEALTH_TTL_MS",
        "RELAY_RECOVERY_POLL_MS",
        "RELAY_LATENCY_THRESHOLD_MS",
        "RELAY_WORKERS",
        "RELAY_MAX_ATTEMPTS",
        "RELAY_QUEUE_BACKOFF_MS",
    ];

    println!("Current environment values:");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
