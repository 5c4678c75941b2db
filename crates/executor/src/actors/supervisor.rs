use std::{collections::HashMap, time::Duration};
use tracing::{error, info, warn};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};

use crate::actors::{Actor, ActorType, ControlMessage};

type ActorFactory = Box<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

/// Keeps registered actors alive: an actor whose heartbeat goes stale or
/// whose task ends is rebuilt from its factory.
pub struct Supervisor {
    actor_factories: HashMap<ActorType, ActorFactory>,
    pulses: HashMap<ActorType, Instant>,
    handles: HashMap<ActorType, JoinHandle<()>>,
    check_every: Duration,
    stale_after: Duration,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            actor_factories: HashMap::new(),
            pulses: HashMap::new(),
            handles: HashMap::new(),
            check_every: Duration::from_secs(1),
            stale_after: Duration::from_secs(3),
        }
    }

    pub fn with_timing(mut self, check_every: Duration, stale_after: Duration) -> Self {
        self.check_every = check_every;
        self.stale_after = stale_after;
        self
    }

    pub fn register_actor(&mut self, actor_type: ActorType, factory: ActorFactory) {
        self.actor_factories.insert(actor_type, factory);
    }

    pub async fn start(&mut self) {
        let mut check_interval = time::interval(self.check_every);

        let (supervisor_tx, mut supervisor_rx) = mpsc::channel::<ControlMessage>(512);

        let actors: Vec<ActorType> = self.actor_factories.keys().copied().collect();
        actors.into_iter().for_each(|actor| {
            self.spawn_actor(actor, supervisor_tx.clone());
        });

        loop {
            tokio::select! {
                Some(msg) = supervisor_rx.recv() => {
                    match msg {
                        ControlMessage::Heartbeat(actor_type) => {
                            if self.handles.contains_key(&actor_type) {
                                self.pulses.insert(actor_type, Instant::now());
                            }
                        }
                        ControlMessage::Shutdown(actor_type) => {
                            warn!("{:?} is shutting down gracefully.", actor_type);
                            self.pulses.remove(&actor_type);
                            if let Some(handle) = self.handles.remove(&actor_type) {
                                handle.abort();
                            }
                        },
                        ControlMessage::Error(actor_type, error_msg) => {
                            error!("Actor {:?} reported error: {}", actor_type, error_msg);
                        },
                    }
                }

                _ = check_interval.tick() => {
                    let dead_timeout = Instant::now() - self.stale_after;

                    let mut dead_actors = Vec::new();

                    for (key, &value) in self.pulses.iter() {
                        let finished = self
                            .handles
                            .get(key)
                            .is_none_or(|handle| handle.is_finished());
                        if finished {
                            warn!("{:?} has stopped!", key);
                            dead_actors.push(*key);
                        } else if value < dead_timeout {
                            warn!("{:?} is unresponsive!", key);
                            dead_actors.push(*key);
                        }
                    }

                    dead_actors.into_iter().for_each(|actor| {
                        if let Some(handle) = self.handles.remove(&actor) {
                            handle.abort();
                        }
                        self.spawn_actor(actor, supervisor_tx.clone());
                    });
                }
            }
        }
    }

    fn spawn_actor(&mut self, actor_type: ActorType, tx: mpsc::Sender<ControlMessage>) {
        let Some(factory) = self.actor_factories.get(&actor_type) else {
            error!("No factory registered for {:?}", actor_type);
            return;
        };
        let mut new_actor = factory();
        info!("Spawning {:?}", actor_type);
        let new_actor_handle = tokio::spawn(async move {
            if let Err(e) = new_actor.run(tx).await {
                error!("Actor {:?} crashed: {}", &actor_type, e);
            }
        });
        self.handles.insert(actor_type, new_actor_handle);
        self.pulses.insert(actor_type, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Crashing;

    #[async_trait]
    impl Actor for Crashing {
        fn name(&self) -> ActorType {
            ActorType::MonitorActor
        }

        async fn run(&mut self, _tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    struct Silent;

    #[async_trait]
    impl Actor for Silent {
        fn name(&self) -> ActorType {
            ActorType::MonitorActor
        }

        async fn run(&mut self, _tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
            // never beats
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn counting<A, F>(spawned: Arc<AtomicUsize>, build: F) -> ActorFactory
    where
        A: Actor + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        Box::new(move || {
            spawned.fetch_add(1, Ordering::SeqCst);
            Box::new(build())
        })
    }

    #[tokio::test]
    async fn crashed_actor_is_respawned() {
        let spawned = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::new()
            .with_timing(Duration::from_millis(20), Duration::from_secs(60));
        supervisor.register_actor(ActorType::MonitorActor, counting(spawned.clone(), || Crashing));

        let _ = time::timeout(Duration::from_millis(300), supervisor.start()).await;
        assert!(spawned.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn silent_actor_is_replaced() {
        let spawned = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::new()
            .with_timing(Duration::from_millis(20), Duration::from_millis(60));
        supervisor.register_actor(ActorType::MonitorActor, counting(spawned.clone(), || Silent));

        let _ = time::timeout(Duration::from_millis(400), supervisor.start()).await;
        assert!(spawned.load(Ordering::SeqCst) >= 2);
    }
}
