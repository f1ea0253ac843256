use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};
use tokio::process::Command;

/// Recovery hook for a rasterizer that may be wedged after a failure.
pub trait BackendSupervisor: Send + Sync {
    /// Fire-and-forget; must not block the caller.
    fn restart(&self);
}

/// Restarts the rasterizer by running a configured shell-free command line.
pub struct CommandSupervisor {
    command: Option<(String, Vec<String>)>,
    restarting: Arc<AtomicBool>,
}

impl CommandSupervisor {
    pub fn new(command_line: Option<&str>) -> Self {
        let command = command_line.and_then(|line| {
            let mut parts = line.split_whitespace().map(str::to_string);
            let program = parts.next()?;
            Some((program, parts.collect()))
        });
        Self {
            command,
            restarting: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.command.is_some()
    }
}

impl BackendSupervisor for CommandSupervisor {
    fn restart(&self) {
        let Some((program, args)) = self.command.clone() else {
            warn!("Rasterizer failed but no restart command is configured");
            return;
        };

        if self.restarting.swap(true, Ordering::SeqCst) {
            info!("Rasterizer restart already in progress");
            return;
        }

        info!("Restarting rasterizer: {} {}", program, args.join(" "));
        let restarting = Arc::clone(&self.restarting);
        tokio::spawn(async move {
            match Command::new(&program).args(&args).status().await {
                Ok(status) if status.success() => info!("Rasterizer restarted"),
                Ok(status) => warn!("Rasterizer restart exited with {}", status),
                Err(e) => error!("Failed to run rasterizer restart command: {}", e),
            }
            restarting.store(false, Ordering::SeqCst);
        });
    }
}
