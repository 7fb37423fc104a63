use crate::{
    env::{Action, BatchEnv, Env, EnvironmentDescription, StepResult},
    error::ProtocolError,
    frame::Frame,
    ipc::{IpcError, Request, Response, receive_packet, send_packet},
    phase::{Op, PhaseTracker},
};
use anyhow::{Context, Result, anyhow, bail};
use interprocess::local_socket::{
    GenericNamespaced, ListenerNonblockingMode, ListenerOptions, Stream, ToNsName,
    traits::{Listener as _, Stream as _},
};
use std::{
    ffi::OsString,
    io::{BufReader, ErrorKind},
    process::{Child, Command},
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

static SOCKET_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// How to launch the simulator process.
#[derive(Debug, Clone)]
pub struct SubprocEnvConfig {
    pub program: OsString,
    /// Passed before the `--socket-name <name>` pair the handle appends.
    pub args: Vec<OsString>,
    pub connect_timeout: Duration,
}

impl SubprocEnvConfig {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            connect_timeout: Duration::from_secs(30),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// A single environment hosted by a simulator process, reached over a local
/// socket. `*_start` writes the request, `*_wait` reads the answer, so the
/// simulator computes while the caller does other work.
pub struct SubprocEnv {
    child: Child,
    conn: BufReader<Stream>,
    description: EnvironmentDescription,
    phase: PhaseTracker,
}

impl SubprocEnv {
    pub fn spawn(config: &SubprocEnvConfig) -> Result<Self> {
        let socket_name = format!(
            "reel-{}-{}.sock",
            std::process::id(),
            SOCKET_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let name = socket_name.as_str().to_ns_name::<GenericNamespaced>()?;
        let listener = ListenerOptions::new()
            .name(name)
            .nonblocking(ListenerNonblockingMode::Accept)
            .create_sync()
            .context("failed to create simulator socket")?;

        let mut child = Command::new(&config.program)
            .args(&config.args)
            .arg("--socket-name")
            .arg(&socket_name)
            .spawn()
            .with_context(|| format!("failed to start simulator {:?}", config.program))?;
        tracing::debug!(pid = child.id(), socket = %socket_name, "simulator spawned");

        let connected = Self::accept(&listener, &mut child, config.connect_timeout)
            .and_then(|stream| {
                let mut conn = BufReader::new(stream);
                send_packet(conn.get_mut(), &Request::Describe)?;
                match receive_packet(&mut conn)? {
                    Response::Description(description) => Ok((conn, description)),
                    Response::Failed { message } => Err(IpcError::Remote(message).into()),
                    _ => Err(IpcError::Unexpected {
                        expected: "description",
                    }
                    .into()),
                }
            });
        match connected {
            Ok((conn, description)) => Ok(Self {
                child,
                conn,
                description,
                phase: PhaseTracker::new(),
            }),
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(err)
            }
        }
    }

    fn accept(
        listener: &interprocess::local_socket::Listener,
        child: &mut Child,
        timeout: Duration,
    ) -> Result<Stream> {
        let started = Instant::now();
        loop {
            match listener.accept() {
                Ok(stream) => return Ok(stream),
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if let Some(status) = child.try_wait()? {
                        bail!("simulator exited with {status} before connecting");
                    }
                    if started.elapsed() > timeout {
                        bail!("simulator did not connect within {timeout:?}");
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(err) => return Err(err).context("failed to accept simulator connection"),
            }
        }
    }

    fn request(&mut self, request: Request) -> Result<()> {
        send_packet(self.conn.get_mut(), &request)?;
        Ok(())
    }

    fn response(&mut self) -> Result<Response> {
        match receive_packet(&mut self.conn)? {
            Response::Failed { message } => Err(IpcError::Remote(message).into()),
            response => Ok(response),
        }
    }
}

impl BatchEnv for SubprocEnv {
    fn num_envs(&self) -> usize {
        1
    }

    fn env_description(&self) -> EnvironmentDescription {
        self.description.clone()
    }

    fn reset_start(&mut self) -> Result<()> {
        self.phase.begin(Op::Reset)?;
        self.request(Request::Reset)
    }

    fn reset_wait(&mut self) -> Result<Vec<Frame>> {
        self.phase.finish(Op::Reset)?;
        match self.response()? {
            Response::Observation(frame) => Ok(vec![frame]),
            _ => Err(IpcError::Unexpected {
                expected: "observation",
            }
            .into()),
        }
    }

    fn step_start(&mut self, actions: &[Action]) -> Result<()> {
        let [action] = actions else {
            return Err(ProtocolError::BatchSize {
                expected: 1,
                actual: actions.len(),
            }
            .into());
        };
        self.phase.begin(Op::Step)?;
        self.request(Request::Step { action: *action })
    }

    fn step_wait(&mut self) -> Result<StepResult> {
        self.phase.finish(Op::Step)?;
        match self.response()? {
            Response::Transition(transition) => Ok(StepResult::from_transitions(vec![transition])),
            _ => Err(IpcError::Unexpected {
                expected: "transition",
            }
            .into()),
        }
    }

    fn close(mut self) -> Result<()> {
        if self.phase.pending().is_some() {
            // the in-flight answer is stale, the simulator only needs to be heard out
            let _ = receive_packet::<_, Response>(&mut self.conn);
        }
        let closed = self.request(Request::Close).and_then(|_| match self.response()? {
            Response::Closed => Ok(()),
            _ => Err(IpcError::Unexpected { expected: "closed" }.into()),
        });
        let status = self.child.wait().context("failed to wait for simulator")?;
        tracing::debug!(%status, "simulator exited");
        closed?;
        if !status.success() {
            bail!("simulator exited with {status}");
        }
        Ok(())
    }
}

impl Drop for SubprocEnv {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Serves `env` to the [`SubprocEnv`] listening on `socket_name` until it
/// sends [`Request::Close`].
pub fn serve_env<E: Env>(mut env: E, socket_name: &str) -> Result<()> {
    let name = socket_name.to_ns_name::<GenericNamespaced>()?;
    let conn = Stream::connect(name).context("failed to connect to recorder")?;
    let mut conn = BufReader::new(conn);
    loop {
        let request: Request = match receive_packet(&mut conn) {
            Ok(request) => request,
            Err(err) => {
                let _ = env.close();
                return Err(anyhow!(err).context("recorder connection lost"));
            }
        };
        let response = match request {
            Request::Describe => Response::Description(env.env_description()),
            Request::Reset => env.reset().map_or_else(failed, Response::Observation),
            Request::Step { action } => env.step(action).map_or_else(failed, Response::Transition),
            Request::Close => {
                let response = env.close().map_or_else(failed, |_| Response::Closed);
                send_packet(conn.get_mut(), &response)?;
                return Ok(());
            }
        };
        send_packet(conn.get_mut(), &response)?;
    }
}

fn failed(err: anyhow::Error) -> Response {
    Response::Failed {
        message: format!("{err:#}"),
    }
}
