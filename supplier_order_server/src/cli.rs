use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
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
    // Only variables that can never hold a secret
    const DISPLAY_ENVS: [&str; 13] = [
        "RUST_LOG",
        "SOG_HOST",
        "SOG_PORT",
        "SOG_DATABASE_URL",
        "SOG_USE_X_FORWARDED_FOR",
        "SOG_SWEEP_INTERVAL_SECONDS",
        "SOG_CUTOFF_WARNING_MINUTES",
        "SOG_PRICE_TOLERANCE_BPS",
        "SOG_PRICE_FRESHNESS_MINUTES",
        "SOG_MAX_2FA_ATTEMPTS",
        "SOG_CHALLENGE_TTL_SECONDS",
        "SOG_ADAPTER_TIMEOUT_SECONDS",
        "SOG_PLACEMENT_MAX_ATTEMPTS",
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
