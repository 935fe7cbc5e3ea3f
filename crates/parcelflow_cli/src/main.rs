//! CLI entry point.
//!
//! # Responsibility
//! - Verify `parcelflow_core` linkage with deterministic output.
//! - Given a database path, print the board column totals for it.
//!
//! Usage: `parcelflow_cli [DB_PATH] [CONFIG_JSON_PATH]`
//!
//! `PARCELFLOW_LOG_DIR` (absolute path) enables file logging.

use log::error;
use parcelflow_core::{
    default_log_level, init_logging, open_db, KanbanAggregator, PackageFilter,
    SqliteWorkflowStore, WorkflowConfig,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("parcelflow_core ping={}", parcelflow_core::ping());
    println!("parcelflow_core version={}", parcelflow_core::core_version());

    if let Ok(log_dir) = std::env::var("PARCELFLOW_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let mut args = std::env::args().skip(1);
    let Some(db_path) = args.next() else {
        return ExitCode::SUCCESS;
    };

    match print_board(&db_path, args.next().as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_board module=cli status=error error={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn print_board(db_path: &str, config_path: Option<&str>) -> Result<(), String> {
    let config = match config_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|err| format!("cannot read config `{path}`: {err}"))?;
            WorkflowConfig::from_json_str(&raw).map_err(|err| err.to_string())?
        }
        None => WorkflowConfig::default(),
    };

    let conn = open_db(db_path).map_err(|err| err.to_string())?;
    let store = SqliteWorkflowStore::new(conn, config.durability);
    let board = KanbanAggregator::new(&store, config.kanban.clone())
        .board(&PackageFilter::default())
        .map_err(|err| err.to_string())?;

    for column in &board.columns {
        println!(
            "column status={} label=\"{}\" count={}",
            column.status.as_str(),
            column.label,
            column.count
        );
    }
    println!("board total_count={}", board.total_count);
    Ok(())
}
