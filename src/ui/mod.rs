//! Terminal rendering of launcher progress and results.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::engine::state::LaunchState;
use crate::progress::{ProgressReporter, ProgressState};
use crate::resolver::{AvailableVersion, VersionOrigin};

const BAR_LENGTH: u64 = 1000;

/// Progress bar that follows a [`ProgressReporter`] until finished.
pub struct ProgressView {
    bar: ProgressBar,
    task: JoinHandle<()>,
}

impl ProgressView {
    pub fn attach(progress: &ProgressReporter) -> Self {
        let bar = ProgressBar::with_draw_target(Some(BAR_LENGTH), ProgressDrawTarget::hidden());
        let task = tokio::spawn(follow(progress.subscribe(), bar.clone()));
        Self { bar, task }
    }

    pub fn finish(self) {
        self.task.abort();
        self.bar.finish_and_clear();
    }
}

async fn follow(mut rx: watch::Receiver<ProgressState>, bar: ProgressBar) {
    let mut shown = false;
    loop {
        let state = rx.borrow_and_update().clone();
        render(&bar, &state, &mut shown);
        if rx.changed().await.is_err() {
            break;
        }
    }
}

fn render(bar: &ProgressBar, state: &ProgressState, shown: &mut bool) {
    if !state.active {
        if *shown {
            bar.set_draw_target(ProgressDrawTarget::hidden());
            bar.disable_steady_tick();
            *shown = false;
        }
        return;
    }
    if !*shown {
        bar.reset();
        bar.set_draw_target(ProgressDrawTarget::stderr());
        *shown = true;
    }

    bar.set_message(state.action_text.clone());
    match state.fraction {
        Some(fraction) => {
            bar.disable_steady_tick();
            bar.set_style(bar_style());
            bar.set_position((fraction * BAR_LENGTH as f32) as u64);
        }
        None => {
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(120));
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {percent:>3}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Print launch states as they arrive, until the sender side is dropped.
pub fn spawn_state_printer(mut rx: mpsc::UnboundedReceiver<LaunchState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(state) = rx.recv().await {
            if let Some(line) = state_line(&state) {
                println!("{line}");
            }
        }
    })
}

fn state_line(state: &LaunchState) -> Option<String> {
    match state {
        LaunchState::Preparing { version } => Some(format!("Preparing {version}...")),
        LaunchState::Playing { version } => Some(format!("Playing {version}")),
        LaunchState::Exited { code } => Some(format!("Game closed (exit code {code})")),
        // Failures are reported once by the caller.
        LaunchState::Failed { .. } => None,
    }
}

pub fn version_line(version: &AvailableVersion) -> String {
    let origin = match version.origin {
        VersionOrigin::Remote => "remote",
        VersionOrigin::Local => "local",
    };
    let installed = if version.installed { "installed" } else { "" };
    format!("{:<24} {:<7} {}", version.name, origin, installed)
        .trim_end()
        .to_owned()
}
