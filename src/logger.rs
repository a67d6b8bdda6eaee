use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use ftail::Ftail;
use log::{LevelFilter, info};

const LOGS_DIR: &str = ".logs";
const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// `<home>/.logs/<pkg>/<pkg>.log`
pub fn log_file_path(home: &Path) -> PathBuf {
    home.join(LOGS_DIR)
        .join(PKG_NAME)
        .join(format!("{}.log", PKG_NAME))
}

/// Warnings and errors go to the console, everything from `Info` up goes to the log file.
pub fn init_logger() -> Result<PathBuf> {
    let home = env::home_dir().ok_or_else(|| anyhow!("Could not determine $HOME"))?;
    let log_file = log_file_path(&home);

    if let Some(dir) = log_file.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Could not create logs dir at {}", dir.display()))?;
    }

    Ftail::new()
        .console(LevelFilter::Warn)
        .single_file(&log_file, true, LevelFilter::Info)
        .init()
        .map_err(|e| anyhow!("Could not initialize logger: {}", e))?;

    info!("Logging to {}", log_file.display());
    Ok(log_file)
}
