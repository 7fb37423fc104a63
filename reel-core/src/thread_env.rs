use crate::{
    env::{
        Action, BatchEnv, Env, EnvBuilderTrait, EnvironmentDescription, StepResult, Transition,
    },
    error::ProtocolError,
    frame::Frame,
    phase::{Op, PhaseTracker},
};
use anyhow::{Context, Result, anyhow, bail};
use crossbeam::channel::{Receiver, Sender};
use std::{sync::Arc, thread::JoinHandle};

enum WorkerCommand {
    Reset,
    Step(Action),
    Close,
}

enum WorkerResult {
    Ready(Result<EnvironmentDescription>),
    Reset(Result<Frame>),
    Step(Result<Transition>),
    Closed(Result<()>),
}

struct EnvWorker<E: Env> {
    tx: Sender<WorkerResult>,
    rx: Receiver<WorkerCommand>,
    env: E,
}

impl<E: Env> EnvWorker<E> {
    fn work(mut self) {
        loop {
            // a dropped handle disconnects the channel, treat it as a close
            let command = self.rx.recv().unwrap_or(WorkerCommand::Close);
            let result = match command {
                WorkerCommand::Reset => WorkerResult::Reset(self.env.reset()),
                WorkerCommand::Step(action) => WorkerResult::Step(self.env.step(action)),
                WorkerCommand::Close => {
                    let closed = self.env.close();
                    let _ = self.tx.send(WorkerResult::Closed(closed));
                    return;
                }
            };
            if self.tx.send(result).is_err() {
                let _ = self.env.close();
                return;
            }
        }
    }
}

struct WorkerHandle {
    tx: Sender<WorkerCommand>,
    rx: Receiver<WorkerResult>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    fn spawn<EB: EnvBuilderTrait>(id: usize, builder: Arc<EB>) -> Result<Self> {
        let (command_tx, command_rx) = crossbeam::channel::unbounded::<WorkerCommand>();
        let (result_tx, result_rx) = crossbeam::channel::unbounded::<WorkerResult>();
        let thread = std::thread::Builder::new()
            .name(format!("reel-env-{id}"))
            .spawn(move || {
                let env = match builder.build_env() {
                    Ok(env) => env,
                    Err(err) => {
                        let _ = result_tx.send(WorkerResult::Ready(Err(err)));
                        return;
                    }
                };
                let description = env.env_description();
                if result_tx.send(WorkerResult::Ready(Ok(description))).is_err() {
                    return;
                }
                EnvWorker {
                    tx: result_tx,
                    rx: command_rx,
                    env,
                }
                .work();
            })
            .context("failed to spawn environment thread")?;
        Ok(Self {
            tx: command_tx,
            rx: result_rx,
            thread: Some(thread),
        })
    }

    fn send(&self, command: WorkerCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| anyhow!("environment thread is gone"))
    }

    fn recv(&self) -> Result<WorkerResult> {
        self.rx
            .recv()
            .map_err(|_| anyhow!("environment thread exited unexpectedly"))
    }

    fn shutdown(mut self, drain_pending: bool) -> Result<()> {
        if drain_pending {
            self.recv()?;
        }
        self.send(WorkerCommand::Close)?;
        let closed = match self.recv()? {
            WorkerResult::Closed(closed) => closed,
            _ => Err(anyhow!("environment thread answered close out of order")),
        };
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| anyhow!("environment thread panicked"))?;
        }
        closed
    }
}

/// Environments hosted on worker threads, one thread per environment.
///
/// `*_start` hands commands to the workers and returns immediately, `*_wait`
/// collects their answers in environment order.
pub struct ThreadEnv {
    workers: Vec<WorkerHandle>,
    description: EnvironmentDescription,
    phase: PhaseTracker,
}

impl ThreadEnv {
    pub fn new<EB: EnvBuilderTrait>(builder: Arc<EB>, n_envs: usize) -> Result<Self> {
        let builders = (0..n_envs).map(|_| builder.clone()).collect();
        Self::from_builders(builders)
    }

    pub fn single<EB: EnvBuilderTrait>(builder: EB) -> Result<Self> {
        Self::from_builders(vec![Arc::new(builder)])
    }

    pub fn from_builders<EB: EnvBuilderTrait>(builders: Vec<Arc<EB>>) -> Result<Self> {
        if builders.is_empty() {
            bail!("a thread env needs at least one environment");
        }
        let mut workers = Vec::with_capacity(builders.len());
        for (id, builder) in builders.into_iter().enumerate() {
            workers.push(WorkerHandle::spawn(id, builder)?);
        }

        let mut description = None;
        let mut failure = None;
        let mut ready = Vec::with_capacity(workers.len());
        for (id, worker) in workers.into_iter().enumerate() {
            match worker.recv() {
                Ok(WorkerResult::Ready(Ok(desc))) => {
                    match &description {
                        None => description = Some(desc),
                        Some(first) if *first != desc => {
                            failure.get_or_insert(anyhow!(
                                "environment {id} declares different spaces than environment 0"
                            ));
                        }
                        Some(_) => {}
                    }
                    ready.push(worker);
                }
                Ok(WorkerResult::Ready(Err(err))) => {
                    failure.get_or_insert(err.context(format!("failed to build environment {id}")));
                }
                Ok(_) => {
                    failure.get_or_insert(anyhow!("environment {id} did not report readiness"));
                }
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }

        match (failure, description) {
            (None, Some(description)) => {
                tracing::debug!(n_envs = ready.len(), "thread env ready");
                Ok(Self {
                    workers: ready,
                    description,
                    phase: PhaseTracker::new(),
                })
            }
            (failure, _) => {
                for worker in ready {
                    if let Err(err) = worker.shutdown(false) {
                        tracing::warn!("failed to close environment after build failure: {err:#}");
                    }
                }
                Err(failure.unwrap_or_else(|| anyhow!("no environment was built")))
            }
        }
    }

    fn broadcast(&self, mut command: impl FnMut(usize) -> WorkerCommand) -> Result<()> {
        for (idx, worker) in self.workers.iter().enumerate() {
            worker.send(command(idx))?;
        }
        Ok(())
    }
}

impl BatchEnv for ThreadEnv {
    fn num_envs(&self) -> usize {
        self.workers.len()
    }

    fn env_description(&self) -> EnvironmentDescription {
        self.description.clone()
    }

    fn reset_start(&mut self) -> Result<()> {
        self.phase.begin(Op::Reset)?;
        self.broadcast(|_| WorkerCommand::Reset)
    }

    fn reset_wait(&mut self) -> Result<Vec<Frame>> {
        self.phase.finish(Op::Reset)?;
        // every worker answers before the first error is reported
        let frames: Vec<Result<Frame>> = self
            .workers
            .iter()
            .enumerate()
            .map(|(idx, worker)| match worker.recv()? {
                WorkerResult::Reset(frame) => {
                    frame.with_context(|| format!("environment {idx} failed to reset"))
                }
                _ => bail!("environment {idx} answered reset out of order"),
            })
            .collect();
        frames.into_iter().collect()
    }

    fn step_start(&mut self, actions: &[Action]) -> Result<()> {
        if actions.len() != self.workers.len() {
            return Err(ProtocolError::BatchSize {
                expected: self.workers.len(),
                actual: actions.len(),
            }
            .into());
        }
        self.phase.begin(Op::Step)?;
        self.broadcast(|idx| WorkerCommand::Step(actions[idx]))
    }

    fn step_wait(&mut self) -> Result<StepResult> {
        self.phase.finish(Op::Step)?;
        let transitions: Vec<Result<Transition>> = self
            .workers
            .iter()
            .enumerate()
            .map(|(idx, worker)| match worker.recv()? {
                WorkerResult::Step(transition) => {
                    transition.with_context(|| format!("environment {idx} failed to step"))
                }
                _ => bail!("environment {idx} answered step out of order"),
            })
            .collect();
        let transitions = transitions.into_iter().collect::<Result<Vec<_>>>()?;
        Ok(StepResult::from_transitions(transitions))
    }

    fn close(self) -> Result<()> {
        let drain_pending = self.phase.pending().is_some();
        let mut first_err = None;
        for worker in self.workers {
            if let Err(err) = worker.shutdown(drain_pending) {
                first_err.get_or_insert(err);
            }
        }
        tracing::debug!("thread env closed");
        first_err.map_or(Ok(()), Err)
    }
}
