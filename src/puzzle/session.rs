//! Puzzle session state machine
//!
//! `Idle -> Loading -> Ready | Error`. Generation runs on the blocking pool
//! and publishes through a watch channel, so readers only ever see whole
//! snapshots. Every `init_puzzle` call bumps an epoch; a job publishes only
//! if its epoch is still current, which makes the latest call win.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::config::PuzzleConfig;
use crate::core::error::{QuestError, Result};
use crate::puzzle::generator::{GeneratedPuzzle, PuzzleGenerator, PuzzleRequest};
use crate::puzzle::grid::{apply_move, MoveEvent};
use crate::puzzle::image_source::ImageSource;
use crate::puzzle::layout::GridLayout;
use crate::puzzle::piece::{is_solved_order, PuzzlePiece};
use crate::puzzle::spill::PieceFiles;

/// Published state of a puzzle session
#[derive(Debug, Clone, Default)]
pub enum PuzzleState {
    #[default]
    Idle,
    Loading,
    Ready {
        pieces: Vec<PuzzlePiece>,
        layout: GridLayout,
    },
    Error {
        message: String,
    },
}

impl PuzzleState {
    pub fn is_ready(&self) -> bool {
        matches!(self, PuzzleState::Ready { .. })
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, PuzzleState::Loading)
    }

    /// Solved predicate; false outside `Ready`
    pub fn is_solved(&self) -> bool {
        match self {
            PuzzleState::Ready { pieces, layout } => is_solved_order(pieces, layout.columns),
            _ => false,
        }
    }
}

/// Bookkeeping guarded by one lock: it serializes epoch bumps with publishes
#[derive(Debug, Default)]
struct Pending {
    request: Option<PuzzleRequest>,
    files: Option<PieceFiles>,
}

struct SessionShared {
    images: Arc<dyn ImageSource>,
    config: PuzzleConfig,
    state_tx: watch::Sender<PuzzleState>,
    solved_tx: watch::Sender<bool>,
    epoch: AtomicU64,
    pending: Mutex<Pending>,
    seeds: Mutex<ChaCha8Rng>,
}

impl SessionShared {
    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_solved(&self, solved: bool) {
        self.solved_tx.send_if_modified(|current| {
            let changed = *current != solved;
            *current = solved;
            changed
        });
    }

    fn run_job(&self, job: Job) {
        let outcome = self.images.load_image(&job.request.image_ref).and_then(|image| {
            PuzzleGenerator::new(&self.config)
                .with_seed(job.seed)
                .generate_tagged(&image, &job.request, job.epoch)
        });
        self.publish(job, outcome);
    }

    fn publish(&self, job: Job, outcome: Result<GeneratedPuzzle>) {
        let mut pending = self.pending();
        if self.epoch.load(Ordering::Acquire) != job.epoch {
            tracing::debug!("Discarding superseded puzzle generation {}", job.epoch);
            return;
        }

        match outcome {
            Ok(generated) => {
                tracing::info!(
                    "Puzzle ready: {}x{} for '{}'",
                    generated.layout.columns,
                    generated.layout.rows,
                    job.request.image_ref
                );
                // Replacing the slot releases the previous board's files
                pending.files = generated.files;
                let state = PuzzleState::Ready {
                    pieces: generated.pieces,
                    layout: generated.layout,
                };
                let solved = state.is_solved();
                self.state_tx.send_replace(state);
                self.publish_solved(solved);
            }
            Err(QuestError::DegenerateLayout {
                cell_width,
                cell_height,
            }) => {
                tracing::warn!(
                    "Degenerate layout ({}x{}) for '{}', keeping previous state",
                    cell_width,
                    cell_height,
                    job.request.image_ref
                );
                let restored = match job.previous_state {
                    PuzzleState::Loading => PuzzleState::Idle,
                    other => other,
                };
                pending.request = job.previous_request;
                let solved = restored.is_solved();
                self.state_tx.send_replace(restored);
                self.publish_solved(solved);
            }
            Err(e) => {
                tracing::warn!("Puzzle generation failed for '{}': {}", job.request.image_ref, e);
                pending.files = None;
                self.state_tx.send_replace(PuzzleState::Error {
                    message: e.to_string(),
                });
                self.publish_solved(false);
            }
        }
    }
}

/// One generation run and what to restore if it cannot produce a layout
struct Job {
    request: PuzzleRequest,
    epoch: u64,
    seed: u64,
    previous_state: PuzzleState,
    previous_request: Option<PuzzleRequest>,
}

/// A single puzzle board and its lifecycle
pub struct PuzzleSession {
    shared: Arc<SessionShared>,
}

impl PuzzleSession {
    pub fn new(images: Arc<dyn ImageSource>, config: PuzzleConfig) -> Self {
        let seeds = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let (state_tx, _) = watch::channel(PuzzleState::Idle);
        let (solved_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(SessionShared {
                images,
                config,
                state_tx,
                solved_tx,
                epoch: AtomicU64::new(0),
                pending: Mutex::new(Pending::default()),
                seeds: Mutex::new(seeds),
            }),
        }
    }

    /// Start generating a board on the blocking pool
    ///
    /// Returns None when the request matches the current or in-flight
    /// board (no reshuffle), or when no runtime is available and the work
    /// ran inline instead.
    pub fn init_puzzle(&self, request: PuzzleRequest) -> Option<JoinHandle<()>> {
        let job = self.begin(request)?;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let shared = Arc::clone(&self.shared);
                Some(runtime.spawn_blocking(move || shared.run_job(job)))
            }
            Err(_) => {
                tracing::debug!("No async runtime, generating puzzle inline");
                self.shared.run_job(job);
                None
            }
        }
    }

    /// Generate on the calling thread; returns once the state is published
    pub fn init_puzzle_blocking(&self, request: PuzzleRequest) {
        if let Some(job) = self.begin(request) {
            self.shared.run_job(job);
        }
    }

    /// Enter `Loading` and claim a new epoch, unless nothing would change
    fn begin(&self, request: PuzzleRequest) -> Option<Job> {
        let mut pending = self.shared.pending();
        let unchanged = pending.request.as_ref() == Some(&request);
        let settled = {
            let state = self.shared.state_tx.borrow();
            state.is_ready() || state.is_loading()
        };
        if unchanged && settled {
            tracing::debug!("Puzzle parameters unchanged, skipping regeneration");
            return None;
        }

        let epoch = self.shared.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let seed = self
            .shared
            .seeds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen::<u64>();
        let previous_request = pending.request.replace(request.clone());
        let previous_state = self.shared.state_tx.send_replace(PuzzleState::Loading);
        self.shared.publish_solved(false);
        tracing::debug!("Puzzle generation {} started for '{}'", epoch, request.image_ref);

        Some(Job {
            request,
            epoch,
            seed,
            previous_state,
            previous_request,
        })
    }

    /// Replace the piece order. Only valid in `Ready`.
    ///
    /// The new order must be a permutation of the current pieces. Returns
    /// the solved predicate for the new order.
    pub fn update_piece_order(&self, new_order: Vec<PuzzlePiece>) -> Result<bool> {
        self.modify_pieces(|pieces| {
            if new_order.len() != pieces.len() {
                return Err(QuestError::InvalidOrder(format!(
                    "expected {} pieces, got {}",
                    pieces.len(),
                    new_order.len()
                )));
            }
            if !same_pieces(pieces, &new_order) {
                return Err(QuestError::InvalidOrder(
                    "new order is not a permutation of the board".into(),
                ));
            }
            *pieces = new_order;
            Ok(())
        })
    }

    /// Apply a drag move (pairwise swap) to the current order
    pub fn move_piece(&self, event: MoveEvent) -> Result<bool> {
        self.modify_pieces(|pieces| apply_move(pieces, event))
    }

    fn modify_pieces<F>(&self, change: F) -> Result<bool>
    where
        F: FnOnce(&mut Vec<PuzzlePiece>) -> Result<()>,
    {
        let mut outcome = Err(QuestError::NotReady);
        self.shared.state_tx.send_if_modified(|state| match state {
            PuzzleState::Ready { pieces, layout } => match change(pieces) {
                Ok(()) => {
                    outcome = Ok(is_solved_order(pieces, layout.columns));
                    true
                }
                Err(e) => {
                    outcome = Err(e);
                    false
                }
            },
            _ => false,
        });

        let solved = outcome?;
        if solved {
            tracing::info!("Puzzle solved");
        }
        self.shared.publish_solved(solved);
        Ok(solved)
    }

    /// Solved predicate for the current state
    pub fn is_solved(&self) -> bool {
        self.shared.state_tx.borrow().is_solved()
    }

    /// Back to `Idle`, releasing pieces and any files; cancels in-flight work
    pub fn clear(&self) {
        let mut pending = self.shared.pending();
        self.shared.epoch.fetch_add(1, Ordering::AcqRel);
        pending.request = None;
        pending.files = None;
        self.shared.state_tx.send_replace(PuzzleState::Idle);
        self.shared.publish_solved(false);
    }

    /// Snapshot of the current state
    pub fn state(&self) -> PuzzleState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PuzzleState> {
        self.shared.state_tx.subscribe()
    }

    pub fn subscribe_solved(&self) -> watch::Receiver<bool> {
        self.shared.solved_tx.subscribe()
    }

    /// Current layout, if `Ready`
    pub fn layout(&self) -> Option<GridLayout> {
        match &*self.shared.state_tx.borrow() {
            PuzzleState::Ready { layout, .. } => Some(*layout),
            _ => None,
        }
    }
}

fn same_pieces(current: &[PuzzlePiece], proposed: &[PuzzlePiece]) -> bool {
    let mut a: Vec<_> = current.iter().map(|p| p.correct_position).collect();
    let mut b: Vec<_> = proposed.iter().map(|p| p.correct_position).collect();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}
