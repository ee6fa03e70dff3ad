//! Observer runtime.
//!
//! An [`Observer`] owns one device's [`VoteStore`], [`RevealCoordinator`] and
//! [`ClockOffset`]. Backend changes reach it as messages from watch
//! subscriptions; it never reads shared state from inside a callback. The
//! presentation layer sends [`ObserverCommand`]s in and reads a [`View`]
//! snapshot plus one-shot [`ObserverEvent`]s out.

use std::sync::Arc;
use std::time::Duration;

use clipvote_store::{Clock, SharedState, StoreError, VoterLockStore};
use clipvote_types::{CandidateId, DeviceId, Round, RoundTally, Timestamp, VoteTally, VotingParams};
use clipvote_voting::{
    resolve, ClockOffset, RevealCoordinator, RevealState, Tick, VoteOutcome, VoteStore,
    VotingError,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Input from the presentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObserverCommand {
    Vote(CandidateId),
    Reveal,
    NewRound,
    Shutdown,
}

/// One-shot notifications for the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObserverEvent {
    Voted(CandidateId),
    AlreadyVoted,
    Rejected(VotingError),
    RevealArmed { deadline: Timestamp },
    RoundAdvanced(Round),
    ShowWinner(CandidateId),
    NoWinner,
}

/// Presentation snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct View {
    pub round: Round,
    pub tally: VoteTally,
    /// Vote controls enabled.
    pub can_vote: bool,
    /// Whole seconds left on a running countdown.
    pub countdown_secs: Option<u64>,
    /// Current unique leader of the tally.
    pub winner: Option<CandidateId>,
    /// Set once the countdown reached zero this round.
    pub revealed: bool,
}

/// The presentation side of an observer.
pub struct ObserverChannels {
    pub commands: mpsc::UnboundedSender<ObserverCommand>,
    pub view: watch::Receiver<View>,
    pub events: mpsc::UnboundedReceiver<ObserverEvent>,
}

pub struct Observer {
    shared: Arc<dyn SharedState>,
    clock: Arc<dyn Clock>,
    votes: VoteStore,
    reveal: RevealCoordinator,
    offset: ClockOffset,
    latest: RoundTally,
    tick_interval: Duration,
    commands: mpsc::UnboundedReceiver<ObserverCommand>,
    events: mpsc::UnboundedSender<ObserverEvent>,
    view: watch::Sender<View>,
}

impl Observer {
    pub fn new(
        shared: Arc<dyn SharedState>,
        locks: Arc<dyn VoterLockStore>,
        clock: Arc<dyn Clock>,
        device: DeviceId,
        params: VotingParams,
    ) -> (Self, ObserverChannels) {
        let latest = shared.round_tally();
        let reveal = RevealCoordinator::new(shared.clone(), &params);
        let offset = ClockOffset::new(&params);
        let tick_interval = Duration::from_millis(params.tick_interval_ms.max(1));
        let votes = VoteStore::new(shared.clone(), locks, device, params);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(View {
            round: latest.round,
            tally: latest.tally.clone(),
            can_vote: false,
            countdown_secs: None,
            winner: None,
            revealed: false,
        });

        let mut observer = Self {
            shared,
            clock,
            votes,
            reveal,
            offset,
            latest,
            tick_interval,
            commands: cmd_rx,
            events: event_tx,
            view: view_tx,
        };
        let deadline = observer.shared.deadline();
        observer.on_deadline(deadline);
        observer.publish_view();

        let channels = ObserverChannels {
            commands: cmd_tx,
            view: view_rx,
            events: event_rx,
        };
        (observer, channels)
    }

    pub fn device(&self) -> &DeviceId {
        self.votes.device()
    }

    pub fn reveal_state(&self) -> &RevealState {
        self.reveal.state()
    }

    pub fn clock_offset(&self) -> &ClockOffset {
        &self.offset
    }

    /// Local clock corrected by the current skew estimate.
    pub fn now(&self) -> Timestamp {
        self.offset.adjust(self.clock.now())
    }

    pub fn on_tally(&mut self, tally: RoundTally) {
        if tally.round != self.latest.round {
            // A tally for a newer round implies the round advanced.
            if tally.round > self.latest.round {
                self.on_round(tally.round);
            } else {
                debug!(stale = %tally.round, current = %self.latest.round, "ignoring stale tally");
                return;
            }
        }
        self.latest = tally;
        self.publish_view();
    }

    pub fn on_round(&mut self, round: Round) {
        if round == self.latest.round {
            return;
        }
        self.reveal.observe_round(round);
        // The new round's deadline may have been pushed before the round.
        if self.shared.round() == round {
            let deadline = self.shared.deadline();
            self.reveal.observe_deadline(deadline);
        }
        let candidates: Vec<CandidateId> = self.latest.tally.candidates().collect();
        self.latest = RoundTally::zeroed(round, &candidates);
        self.publish_view();
    }

    pub fn on_deadline(&mut self, deadline: Option<Timestamp>) {
        self.reveal.observe_deadline(deadline);
        self.publish_view();
    }

    pub fn on_clock_offset(&mut self, sample_ms: i64) {
        self.offset.record_sample(sample_ms);
    }

    /// A command this device sent was refused by the backend after the fact.
    pub fn on_refusal(&mut self, error: StoreError) {
        info!("backend refused a command: {error}");
        self.emit(ObserverEvent::Rejected(error.into()));
    }

    /// Advance the countdown; emits the winner once when it reaches zero.
    pub fn on_tick(&mut self) {
        let now = self.now();
        if let Tick::Reveal { winner } = self.reveal.tick(now, &self.latest.tally) {
            self.emit(match winner {
                Some(w) => ObserverEvent::ShowWinner(w),
                None => ObserverEvent::NoWinner,
            });
        }
        self.publish_view();
    }

    /// Apply one command. Returns `false` on [`ObserverCommand::Shutdown`].
    pub fn handle_command(&mut self, command: ObserverCommand) -> bool {
        let event = match command {
            ObserverCommand::Vote(candidate) => {
                match self.votes.cast_vote(candidate, self.latest.round) {
                    Ok(VoteOutcome::Counted) => ObserverEvent::Voted(candidate),
                    Ok(VoteOutcome::AlreadyVoted) => ObserverEvent::AlreadyVoted,
                    Err(e) => ObserverEvent::Rejected(e),
                }
            }
            ObserverCommand::Reveal => {
                let now = self.now();
                match self.reveal.reveal(&self.latest.tally, now) {
                    Ok(deadline) => ObserverEvent::RevealArmed { deadline },
                    Err(e) => ObserverEvent::Rejected(e),
                }
            }
            ObserverCommand::NewRound => match self.votes.reset_round(self.latest.round) {
                Ok(round) => {
                    self.on_round(round);
                    ObserverEvent::RoundAdvanced(round)
                }
                Err(e) => ObserverEvent::Rejected(e),
            },
            ObserverCommand::Shutdown => return false,
        };
        if let ObserverEvent::Rejected(e) = &event {
            info!(?command, "command rejected: {e}");
        }
        self.emit(event);
        self.publish_view();
        true
    }

    /// Run until shutdown, the command channel closing or a subscription
    /// ending.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut tally_rx = self.shared.subscribe_tally();
        let mut round_rx = self.shared.subscribe_round();
        let mut deadline_rx = self.shared.subscribe_deadline();
        let mut offset_rx = self.shared.subscribe_clock_offset();
        let mut refusals_rx = self.shared.subscribe_refusals();
        match offset_rx.as_mut() {
            Some(rx) => {
                if let Some(sample) = *rx.borrow_and_update() {
                    self.on_clock_offset(sample);
                }
            }
            None => self.offset.mark_unavailable(),
        }

        // Catch up on anything that changed since construction.
        let round = *round_rx.borrow_and_update();
        self.on_round(round);
        let tally = tally_rx.borrow_and_update().clone();
        self.on_tally(tally);
        let deadline = *deadline_rx.borrow_and_update();
        self.on_deadline(deadline);

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(device = %self.device(), round = %self.latest.round, "observer started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("observer shutting down");
                    break;
                }
                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle_command(command) {
                        info!("observer stopped by command");
                        break;
                    }
                }
                changed = round_rx.changed() => {
                    if changed.is_err() { break; }
                    let round = *round_rx.borrow_and_update();
                    self.on_round(round);
                }
                changed = tally_rx.changed() => {
                    if changed.is_err() { break; }
                    let tally = tally_rx.borrow_and_update().clone();
                    self.on_tally(tally);
                }
                changed = deadline_rx.changed() => {
                    if changed.is_err() { break; }
                    let deadline = *deadline_rx.borrow_and_update();
                    self.on_deadline(deadline);
                }
                sample = next_offset(&mut offset_rx) => {
                    match sample {
                        Some(sample) => self.on_clock_offset(sample),
                        None => {
                            offset_rx = None;
                            self.offset.mark_unavailable();
                        }
                    }
                }
                refusal = next_refusal(&mut refusals_rx) => {
                    match refusal {
                        Some(error) => self.on_refusal(error),
                        None => refusals_rx = None,
                    }
                }
                _ = ticker.tick() => self.on_tick(),
            }
        }
    }

    fn emit(&self, event: ObserverEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }

    fn publish_view(&mut self) {
        let can_vote = match self.votes.is_eligible() {
            Ok(eligible) => eligible && self.shared.round() == self.latest.round,
            Err(e) => {
                warn!("failed to read voter lock: {e}");
                false
            }
        };
        let now = self.now();
        let (countdown_secs, revealed) = match self.reveal.remaining_secs(now) {
            Some(secs) => (Some(secs), false),
            None => (
                None,
                matches!(self.reveal.state(), RevealState::Revealed { .. }),
            ),
        };
        let view = View {
            round: self.latest.round,
            tally: self.latest.tally.clone(),
            can_vote,
            countdown_secs,
            winner: resolve(&self.latest.tally),
            revealed,
        };
        self.view.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}

/// Next skew sample; pending forever when there is no feed. `None` means the
/// feed closed.
async fn next_offset(rx: &mut Option<watch::Receiver<Option<i64>>>) -> Option<i64> {
    let Some(rx) = rx.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        rx.changed().await.ok()?;
        if let Some(sample) = *rx.borrow_and_update() {
            return Some(sample);
        }
    }
}

/// Next refusal; pending forever when there is no feed. `None` means the
/// feed closed.
async fn next_refusal(rx: &mut Option<broadcast::Receiver<StoreError>>) -> Option<StoreError> {
    let Some(rx) = rx.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(error) => return Some(error),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "refusal feed lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
