//! Runs embedded `PostgreSQL` lifecycle steps for the integration test
//! harness when the tests themselves run as root.
//!
//! Usage:
//!
//! ```text
//! pg_worker <setup|start|stop> <payload-path>
//! ```
//!
//! The payload is the JSON form of
//! `pg_embedded_setup_unpriv::worker::WorkerPayload`: cluster settings plus
//! the environment overrides the cluster needs. `PostgreSQL` refuses to run
//! as root, so a root invocation re-executes itself as `nobody` (through
//! `runuser`, falling back to `su`) and drops privileges before touching the
//! data directory.

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    unix::main()
}

#[cfg(not(unix))]
fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    Err("pg_worker only runs on Unix hosts".into())
}

#[cfg(unix)]
mod unix {
    use camino::{Utf8Path, Utf8PathBuf};
    use nix::unistd::{Uid, User, initgroups, setgid, setuid};
    use pg_embedded_setup_unpriv::ambient_dir_and_path;
    use pg_embedded_setup_unpriv::worker::{PlainSecret, WorkerPayload};
    use postgresql_embedded::{PostgreSQL, Status};
    use std::ffi::CString;
    use std::io::{self, Read};
    use std::process::{Command, ExitStatus};
    use std::{env, mem};
    use thiserror::Error;

    type BoxError = Box<dyn std::error::Error + Send + Sync>;

    /// Marks the demoted child so it does not re-execute again.
    const DEMOTED_ENV: &str = "PG_WORKER_REEXEC";
    const SAFE_PATH: &str = "/usr/sbin:/usr/bin:/sbin:/bin";
    const UNPRIVILEGED_USER: &str = "nobody";

    #[derive(Debug, Error)]
    enum WorkerError {
        #[error("invalid arguments: {0}")]
        Usage(String),
        #[error("failed to read worker payload: {0}")]
        PayloadRead(#[source] BoxError),
        #[error("failed to parse worker payload: {0}")]
        PayloadParse(#[source] serde_json::Error),
        #[error("invalid cluster settings: {0}")]
        Settings(String),
        #[error("failed to build runtime: {0}")]
        Runtime(#[source] io::Error),
        #[error("failed to drop privileges: {0}")]
        Demotion(String),
        #[error("cluster {step} failed: {message}")]
        Cluster { step: &'static str, message: String },
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Step {
        Setup,
        Start,
        Stop,
    }

    impl Step {
        fn parse(arg: &str) -> Result<Self, WorkerError> {
            match arg {
                "setup" => Ok(Self::Setup),
                "start" => Ok(Self::Start),
                "stop" => Ok(Self::Stop),
                other => Err(WorkerError::Usage(format!(
                    "unknown pg_worker operation '{other}'; expected setup, start or stop"
                ))),
            }
        }

        const fn name(self) -> &'static str {
            match self {
                Self::Setup => "setup",
                Self::Start => "start",
                Self::Stop => "stop",
            }
        }
    }

    pub(super) fn main() -> Result<(), BoxError> {
        let args = utf8_args()?;
        if Uid::effective().is_root() && env::var_os(DEMOTED_ENV).is_none() {
            let status = reexec_unprivileged(&args)?;
            std::process::exit(status.code().unwrap_or(1));
        }
        let (step, payload_path) = parse_args(&args)?;
        run(step, &payload_path).map_err(Into::into)
    }

    fn utf8_args() -> Result<Vec<Utf8PathBuf>, WorkerError> {
        env::args_os()
            .skip(1)
            .map(|arg| {
                arg.into_string()
                    .map(Utf8PathBuf::from)
                    .map_err(|_| WorkerError::Usage("argument is not valid UTF-8".into()))
            })
            .collect()
    }

    fn parse_args(args: &[Utf8PathBuf]) -> Result<(Step, Utf8PathBuf), WorkerError> {
        match args {
            [] => Err(WorkerError::Usage("missing operation argument".into())),
            [step] => {
                Step::parse(step.as_str())?;
                Err(WorkerError::Usage("missing config path argument".into()))
            }
            [step, path] => Ok((Step::parse(step.as_str())?, path.clone())),
            [_, _, extra, ..] => Err(WorkerError::Usage(format!(
                "unexpected extra argument: {extra}"
            ))),
        }
    }

    fn run(step: Step, payload_path: &Utf8Path) -> Result<(), WorkerError> {
        let payload = load_payload(payload_path)?;
        demote(UNPRIVILEGED_USER)?;
        let settings = payload
            .settings
            .into_settings()
            .map_err(|err| WorkerError::Settings(err.to_string()))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(WorkerError::Runtime)?;
        apply_environment(&payload.environment);

        let mut postgres = PostgreSQL::new(settings);
        runtime.block_on(async {
            match step {
                Step::Setup => {
                    postgres.setup().await.map_err(|err| cluster_error(step, &err))?;
                    ensure_started(&mut postgres, step).await
                }
                Step::Start => ensure_started(&mut postgres, step).await,
                Step::Stop => postgres.stop().await.map_err(|err| cluster_error(step, &err)),
            }
        })?;

        if step != Step::Stop {
            // Dropping the handle would stop the server this process started.
            mem::forget(postgres);
        }
        Ok(())
    }

    async fn ensure_started(postgres: &mut PostgreSQL, step: Step) -> Result<(), WorkerError> {
        if matches!(postgres.status(), Status::Started) {
            return Ok(());
        }
        postgres
            .start()
            .await
            .map_err(|err| cluster_error(step, &err))
    }

    fn cluster_error(step: Step, err: &impl std::fmt::Display) -> WorkerError {
        WorkerError::Cluster {
            step: step.name(),
            message: err.to_string(),
        }
    }

    fn load_payload(path: &Utf8Path) -> Result<WorkerPayload, WorkerError> {
        let bytes = read_payload(path).map_err(WorkerError::PayloadRead)?;
        serde_json::from_slice(&bytes).map_err(WorkerError::PayloadParse)
    }

    fn read_payload(path: &Utf8Path) -> Result<Vec<u8>, BoxError> {
        let (dir, relative) = ambient_dir_and_path(path)?;
        let mut bytes = Vec::new();
        dir.open(relative.as_std_path())?.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    fn reexec_unprivileged(args: &[Utf8PathBuf]) -> Result<ExitStatus, WorkerError> {
        let exe = env::current_exe()
            .map_err(WorkerError::Runtime)?
            .into_os_string()
            .into_string()
            .map(Utf8PathBuf::from)
            .map_err(|_| WorkerError::Usage("executable path is not valid UTF-8".into()))?;

        let runuser = Command::new("runuser")
            .args(["-u", UNPRIVILEGED_USER, "--"])
            .arg(exe.as_std_path())
            .args(args.iter().map(|arg| arg.as_std_path()))
            .env(DEMOTED_ENV, "1")
            .env("PATH", SAFE_PATH)
            .status();
        match runuser {
            Ok(status) => Ok(status),
            Err(err) if err.kind() == io::ErrorKind::NotFound => reexec_via_su(&exe, args),
            Err(err) => Err(WorkerError::Demotion(err.to_string())),
        }
    }

    fn reexec_via_su(exe: &Utf8Path, args: &[Utf8PathBuf]) -> Result<ExitStatus, WorkerError> {
        let command = std::iter::once(exe.as_str())
            .chain(args.iter().map(|arg| arg.as_str()))
            .map(shell_quote)
            .fold(format!("{DEMOTED_ENV}=1 exec"), |mut line, word| {
                line.push(' ');
                line.push_str(&word);
                line
            });

        Command::new("/bin/su")
            .args(["-s", "/bin/sh", UNPRIVILEGED_USER, "-c"])
            .arg(command)
            .env("PATH", SAFE_PATH)
            .status()
            .map_err(|err| WorkerError::Demotion(err.to_string()))
    }

    /// Quotes `word` for `/bin/sh`, closing and reopening the quotes around
    /// each embedded single quote.
    fn shell_quote(word: &str) -> String {
        format!("'{}'", word.replace('\'', r"'\''"))
    }

    fn demote(username: &str) -> Result<(), WorkerError> {
        if !Uid::effective().is_root() {
            return Ok(());
        }
        let demotion = |err: nix::Error| WorkerError::Demotion(err.to_string());
        let user = User::from_name(username)
            .map_err(demotion)?
            .ok_or_else(|| WorkerError::Demotion(format!("user '{username}' not found")))?;
        let name = CString::new(user.name.clone())
            .map_err(|err| WorkerError::Demotion(format!("invalid user name: {err}")))?;
        initgroups(&name, user.gid).map_err(demotion)?;
        setgid(user.gid).map_err(demotion)?;
        setuid(user.uid).map_err(demotion)?;

        // SAFETY: no other threads exist yet; the runtime is built afterwards.
        unsafe {
            env::set_var("HOME", &user.dir);
            env::set_var("USER", &user.name);
            env::set_var("LOGNAME", &user.name);
        }
        Ok(())
    }

    fn apply_environment(environment: &[(String, Option<PlainSecret>)]) {
        for (key, value) in environment {
            // SAFETY: the current-thread runtime has not spawned workers, so
            // nothing else reads the environment concurrently.
            unsafe {
                match value {
                    Some(secret) => env::set_var(key, secret.expose()),
                    None => env::remove_var(key),
                }
            }
        }
    }

}
