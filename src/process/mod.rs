use std::ffi::OsString;
use std::path::{self, Path};
use std::process::{Command, ExitStatus, Stdio};
use std::{env as std_env, fs};

use log::{debug, info, warn};
use sysinfo::System;

use crate::engine::models::{Profile, Server};
use crate::error::LauncherError;

const JAVA_OPTIONS_VAR: &str = "JDK_JAVA_OPTIONS";

/// How a game session that started and finished normally ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameExit {
    pub code: i32,
}

/// Starts the game client and waits for it to finish.
#[derive(Clone, Debug)]
pub struct ProcessSupervisor {
    tune_jvm: bool,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self { tune_jvm: true }
    }
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave `JDK_JAVA_OPTIONS` untouched.
    #[cfg(test)]
    pub fn without_jvm_tuning(mut self) -> Self {
        self.tune_jvm = false;
        self
    }

    /// Launch `artifact` with `runtime` for `profile` against `server` and wait for it.
    ///
    /// The wait runs on the blocking pool. A zero exit yields [`GameExit`]; anything
    /// else is [`LauncherError::AbnormalExit`].
    pub async fn run(
        &self,
        profile: &Profile,
        server: &Server,
        runtime: &Path,
        artifact: &Path,
    ) -> Result<GameExit, LauncherError> {
        let argv = build_command_line(profile, server, runtime, artifact)?;
        let work_dir = profile.dir.clone();
        let java_options = self
            .tune_jvm
            .then(|| tuned_java_options(profile.jvm_args.as_deref().unwrap_or_default()))
            .flatten();

        info!(
            "launch: starting {} for {} on {}:{}",
            artifact.display(),
            profile.username,
            server.host,
            server.port
        );
        debug!("launch: argv={:?} cwd={}", argv, work_dir.display());

        let status = tokio::task::spawn_blocking(move || {
            fs::create_dir_all(&work_dir).map_err(|e| {
                LauncherError::Launch(format!(
                    "failed to create profile dir {}: {e}",
                    work_dir.display()
                ))
            })?;

            let (program, args) = argv
                .split_first()
                .ok_or_else(|| LauncherError::Launch("empty command line".into()))?;
            let mut cmd = Command::new(program);
            cmd.args(args)
                .current_dir(&work_dir)
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
            if let Some(opts) = java_options {
                debug!("launch: {JAVA_OPTIONS_VAR}={opts}");
                cmd.env(JAVA_OPTIONS_VAR, opts);
            }

            let mut child = cmd
                .spawn()
                .map_err(|e| LauncherError::Launch(format!("failed to start game process: {e}")))?;
            info!("launch: process {} started", child.id());
            child
                .wait()
                .map_err(|e| LauncherError::Interrupted(format!("waiting for the game failed: {e}")))
        })
        .await
        .map_err(|e| LauncherError::Interrupted(format!("game supervisor task failed: {e}")))??;

        classify_exit(status)
    }
}

/// `runtime [jvm args...] -jar artifact host port username`, with absolute paths.
pub fn build_command_line(
    profile: &Profile,
    server: &Server,
    runtime: &Path,
    artifact: &Path,
) -> Result<Vec<OsString>, LauncherError> {
    let absolute = |p: &Path| {
        path::absolute(p)
            .map_err(|e| LauncherError::Launch(format!("invalid path {}: {e}", p.display())))
    };

    let mut argv: Vec<OsString> = vec![absolute(runtime)?.into_os_string()];
    if let Some(extra) = profile.jvm_args.as_deref() {
        argv.extend(extra.split_whitespace().map(OsString::from));
    }
    argv.push("-jar".into());
    argv.push(absolute(artifact)?.into_os_string());
    argv.push(server.host.clone().into());
    argv.push(server.port.to_string().into());
    argv.push(profile.username.clone().into());
    Ok(argv)
}

fn classify_exit(status: ExitStatus) -> Result<GameExit, LauncherError> {
    let code = exit_code(status);
    if code == 0 {
        info!("launch: game exited normally");
        Ok(GameExit { code })
    } else {
        warn!("launch: game exited with code {code}");
        Err(LauncherError::AbnormalExit { code })
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn tuned_java_options(profile_args: &str) -> Option<String> {
    let Some(computed) = compute_java_options() else {
        debug!("launch: skipping {JAVA_OPTIONS_VAR}; unable to determine system resources");
        return None;
    };
    let merged = merge_java_options(std_env::var(JAVA_OPTIONS_VAR).ok(), profile_args, &computed);
    (!merged.is_empty()).then_some(merged)
}

fn compute_java_options() -> Option<String> {
    // Derive JVM tuning flags from available system resources.
    let mut system = System::new();
    system.refresh_memory();

    let total_bytes = system.total_memory();
    let available_bytes = system.available_memory();
    if total_bytes == 0 || available_bytes == 0 {
        return None;
    }

    let max_ram_percent =
        ((available_bytes as f64 / total_bytes as f64) * 100.0 - 10.0).clamp(40.0, 80.0);
    let initial_ram_percent = (max_ram_percent * 0.6).clamp(25.0, 60.0);
    let cpu_count = std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1);

    Some(format!(
        "-XX:+UseStringDeduplication -XX:ActiveProcessorCount={} \
         -XX:MaxRAMPercentage={:.1} -XX:InitialRAMPercentage={:.1}",
        cpu_count, max_ram_percent, initial_ram_percent
    ))
}

/// Append computed flags to `existing`, dropping any the user already set there or in `profile_args`.
fn merge_java_options(existing: Option<String>, profile_args: &str, computed: &str) -> String {
    let mut merged = existing.unwrap_or_default().trim().to_string();
    let user_set = |needle: &str| merged.contains(needle) || profile_args.contains(needle);
    let skip_max = user_set("MaxRAMPercentage") || profile_args.contains("-Xmx");
    let skip_initial = user_set("InitialRAMPercentage") || profile_args.contains("-Xms");
    let skip_cpu = user_set("ActiveProcessorCount");
    let skip_dedupe = user_set("UseStringDeduplication");

    for token in computed.split_whitespace() {
        let include = match token {
            opt if opt.contains("MaxRAMPercentage") => !skip_max,
            opt if opt.contains("InitialRAMPercentage") => !skip_initial,
            opt if opt.contains("ActiveProcessorCount") => !skip_cpu,
            opt if opt.contains("UseStringDeduplication") => !skip_dedupe,
            _ => true,
        };
        if include {
            if !merged.is_empty() {
                merged.push(' ');
            }
            merged.push_str(token);
        }
    }

    merged
}
