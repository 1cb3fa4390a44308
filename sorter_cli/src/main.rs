mod cli;
mod error_fmt;
mod logging;
mod run;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use sorter_core::SorterError;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::run::RunArgs;

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        let code = exit_code_for_error(&e);
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(code);
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = sorter_config::load_file(&cli.config)
        .map_err(|e| SorterError::Config(format!("{e:#}")))
        .wrap_err("load config")?;

    logging::init_tracing(cli.log_level.as_deref(), cli.json, &cfg.logging)?;
    tracing::info!(config = %cli.config.display(), "config loaded");

    match cli.cmd {
        Commands::SelfCheck => run::self_check(&cfg, cli.json),
        Commands::Run {
            port,
            auto_classify,
            max_iterations,
            zero_on_start,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                .wrap_err("install signal handler")?;

            let args = RunArgs {
                port: port.as_deref(),
                auto_classify: auto_classify.map(Into::into),
                max_iterations,
                zero_on_start,
                json: cli.json,
            };
            run::run_sorter(&cfg, &args, shutdown)
        }
    }
}
