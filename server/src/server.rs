use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use four_row_core::board::Piece;
use four_row_core::game::{GameState, Outcome, Phase};
use four_row_core::protocol::{encode_line, ClientMessage, Scores, ServerMessage};

use crate::client::Connection;

/// The whole mutable server state behind its single coarse lock. Every
/// transition holds the lock for its full read-modify-write, dependent
/// sends included, so the two participants never observe a half-applied
/// transition.
pub type SharedState = Arc<Mutex<ServerState>>;

/// What the dispatcher tells a worker to do with its connection once a
/// message has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Keep,
    Close,
}

/// One connected player: the transport write half, the assigned piece,
/// the rematch flag, and the registry key of the opponent. The opponent
/// reference is cleared when that side goes away, never left dangling.
struct ClientSession {
    symbol: Piece,
    write: OwnedWriteHalf,
    rematch_requested: bool,
    opponent: Option<Uuid>,
}

impl ClientSession {
    async fn send(&mut self, message: &ServerMessage) -> anyhow::Result<()> {
        let frame = encode_line(message)?;
        self.write.write_all(&frame).await?;
        Ok(())
    }
}

/// The at-most-one active pairing: both participant keys and the game
/// they share. Exists from the second registration until either side
/// leaves.
struct SessionPair {
    first: Uuid,
    second: Uuid,
    game: GameState,
}

impl SessionPair {
    fn contains(&self, id: Uuid) -> bool {
        self.first == id || self.second == id
    }
}

/// Outcome of one inbound move, computed while the game is borrowed; the
/// sends happen afterwards.
enum MoveEffect {
    Ignore,
    Reject,
    Win { winner: Piece, board: String },
    Draw { board: String },
    NextTurn { board: String, turn: Piece },
}

/// Registry of 0-2 players, the optional pairing, and the bookkeeping
/// that outlives a single game: cumulative scores and the identity that
/// starts the next one. Handlers receive this aggregate by reference;
/// there is no global state.
pub struct ServerState {
    clients: HashMap<Uuid, ClientSession>,
    order: Vec<Uuid>,
    session: Option<SessionPair>,
    scores: Scores,
    starting: Piece,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            order: Vec::new(),
            session: None,
            scores: Scores::default(),
            starting: Piece::X,
        }
    }

    async fn send_to(&mut self, id: Uuid, message: &ServerMessage) {
        if let Some(client) = self.clients.get_mut(&id) {
            if let Err(err) = client.send(message).await {
                // Nothing to roll back: the worker for this connection sees
                // the broken transport on its next read and tears it down.
                log::warn!("failed to send to player {}: {err}", client.symbol);
            }
        }
    }

    async fn broadcast(&mut self, message: &ServerMessage) {
        let targets = self.order.clone();
        for id in targets {
            self.send_to(id, message).await;
        }
    }

    /// Admission control for a fresh connection. The third participant is
    /// refused and closed before registration; anyone else is registered,
    /// assigned an identity, and, as the second registrant, paired up.
    /// Returns the read half for the caller to hand to the worker.
    pub async fn admit(&mut self, stream: TcpStream) -> Option<(Uuid, OwnedReadHalf)> {
        let (read, mut write) = stream.into_split();

        if self.clients.len() >= 2 {
            let rejection = ServerMessage::Error {
                error_code: "SERVER_FULL".into(),
                message: "Server is full.".into(),
            };
            if let Ok(frame) = encode_line(&rejection) {
                let _ = write.write_all(&frame).await;
            }
            let _ = write.shutdown().await;
            return None;
        }

        let id = Uuid::new_v4();
        let symbol = if self.clients.is_empty() {
            Piece::X
        } else {
            Piece::O
        };
        self.clients.insert(
            id,
            ClientSession {
                symbol,
                write,
                rematch_requested: false,
                opponent: None,
            },
        );
        self.order.push(id);
        log::info!("registered player {symbol} ({}/2)", self.clients.len());

        self.send_to(
            id,
            &ServerMessage::Welcome {
                symbol,
                message: format!("Welcome! You are Player {symbol}."),
            },
        )
        .await;

        if self.clients.len() < 2 {
            self.send_to(
                id,
                &ServerMessage::Info {
                    message: "Waiting for an opponent...".into(),
                },
            )
            .await;
        } else {
            self.activate_pair().await;
        }

        Some((id, read))
    }

    /// Cross-link the two registrants and start their first game.
    async fn activate_pair(&mut self) {
        let (first, second) = (self.order[0], self.order[1]);
        let first_symbol = self.clients[&first].symbol;
        if let Some(client) = self.clients.get_mut(&second) {
            client.opponent = Some(first);
            // Arrival order already hands out distinct pieces; if the two
            // ever collide anyway, force the later registrant onto the
            // complement.
            if client.symbol == first_symbol {
                client.symbol = first_symbol.other();
            }
        }
        if let Some(client) = self.clients.get_mut(&first) {
            client.opponent = Some(second);
        }

        let game = GameState::new(self.starting);
        let board = game.board.render();
        let turn = game.turn;
        self.session = Some(SessionPair {
            first,
            second,
            game,
        });
        log::info!("both players connected, player {turn} starts");

        let scores = self.scores;
        self.broadcast(&ServerMessage::GameStart {
            board,
            turn,
            message: format!("Game starting! Player {turn}'s turn."),
            scores,
        })
        .await;
    }

    /// Interpret one inbound message against the current phase. Runs
    /// under the state lock for the whole transition, sends included.
    pub async fn handle_message(&mut self, id: Uuid, message: ClientMessage) -> Disposition {
        match message {
            ClientMessage::MakeMove { column } => {
                self.handle_move(id, column).await;
                Disposition::Keep
            }
            ClientMessage::RequestRematch => {
                self.handle_rematch(id).await;
                Disposition::Keep
            }
            ClientMessage::QuitSession => {
                self.handle_quit(id).await;
                Disposition::Close
            }
        }
    }

    async fn handle_move(&mut self, id: Uuid, column: i64) {
        let effect = {
            let Some(sender) = self.clients.get(&id) else {
                return;
            };
            let mover = sender.symbol;
            match self.session.as_mut() {
                // No active pairing: nothing to move in.
                None => MoveEffect::Ignore,
                // Out-of-turn and wrong-phase attempts get no reply.
                Some(pair) if !pair.game.in_progress() || pair.game.turn != mover => {
                    MoveEffect::Ignore
                }
                Some(pair) => {
                    let col = usize::try_from(column)
                        .ok()
                        .filter(|col| pair.game.board.is_valid_move(*col));
                    match col {
                        None => MoveEffect::Reject,
                        Some(col) => {
                            pair.game.board.apply_move(col, mover);
                            log::debug!("player {mover} played column {col}");
                            if let Some(winner) = pair.game.board.check_winner() {
                                pair.game.phase = Phase::Over(Outcome::Win(winner));
                                MoveEffect::Win {
                                    winner,
                                    board: pair.game.board.render(),
                                }
                            } else if pair.game.board.is_full() {
                                pair.game.phase = Phase::Over(Outcome::Draw);
                                MoveEffect::Draw {
                                    board: pair.game.board.render(),
                                }
                            } else {
                                pair.game.turn = mover.other();
                                MoveEffect::NextTurn {
                                    board: pair.game.board.render(),
                                    turn: pair.game.turn,
                                }
                            }
                        }
                    }
                }
            }
        };

        match effect {
            MoveEffect::Ignore => {}
            MoveEffect::Reject => {
                self.send_to(
                    id,
                    &ServerMessage::Error {
                        error_code: "INVALID_MOVE".into(),
                        message: "Invalid move.".into(),
                    },
                )
                .await;
            }
            MoveEffect::Win { winner, board } => {
                self.scores.award(winner);
                log::info!("game over, player {winner} wins");
                let scores = self.scores;
                self.broadcast(&ServerMessage::GameOver {
                    winner: Some(winner),
                    draw: None,
                    message: format!("Player {winner} wins!"),
                    board,
                })
                .await;
                self.broadcast(&ServerMessage::ScoreUpdate { scores }).await;
                self.clear_rematch_flags();
            }
            MoveEffect::Draw { board } => {
                log::info!("game over in a draw");
                let scores = self.scores;
                self.broadcast(&ServerMessage::GameOver {
                    winner: None,
                    draw: Some(true),
                    message: "It's a draw!".into(),
                    board,
                })
                .await;
                self.broadcast(&ServerMessage::ScoreUpdate { scores }).await;
                self.clear_rematch_flags();
            }
            MoveEffect::NextTurn { board, turn } => {
                self.broadcast(&ServerMessage::BoardUpdate { board, turn })
                    .await;
                if let Some(holder) = self.turn_holder() {
                    self.send_to(
                        holder,
                        &ServerMessage::YourTurn {
                            message: format!("Player {turn}'s turn."),
                        },
                    )
                    .await;
                }
            }
        }
    }

    async fn handle_rematch(&mut self, id: Uuid) {
        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };
        let requester = client.symbol;
        let repeat = client.rematch_requested;
        client.rematch_requested = true;
        let opponent = client.opponent;
        log::info!("player {requester} requested a rematch");

        let Some(opponent) = opponent else {
            self.send_to(
                id,
                &ServerMessage::Info {
                    message: "Cannot rematch, opponent has left.".into(),
                },
            )
            .await;
            return;
        };

        let opponent_agreed = self
            .clients
            .get(&opponent)
            .is_some_and(|client| client.rematch_requested);

        if opponent_agreed {
            self.start_rematch().await;
        } else {
            self.send_to(
                id,
                &ServerMessage::RematchInfo {
                    message: "Rematch requested. Waiting for opponent...".into(),
                },
            )
            .await;
            // Tell the opponent once; a repeated request only re-acks the
            // sender.
            if !repeat {
                self.send_to(
                    opponent,
                    &ServerMessage::RematchInfo {
                        message: format!("Player {requester} wants a rematch! Click 'Play Again'."),
                    },
                )
                .await;
            }
        }
    }

    /// Both players agreed: alternate the starter, rebuild the game, and
    /// carry the scores over.
    async fn start_rematch(&mut self) {
        let starting = self.starting.other();
        let Some(pair) = self.session.as_mut() else {
            return;
        };
        self.starting = starting;
        pair.game = GameState::new(starting);
        let board = pair.game.board.render();
        let turn = pair.game.turn;
        self.clear_rematch_flags();
        log::info!("rematch accepted, player {turn} starts");

        let scores = self.scores;
        self.broadcast(&ServerMessage::NewGame {
            board,
            turn,
            message: format!("Rematch! Player {turn} starts."),
            scores,
        })
        .await;
    }

    /// The player is leaving deliberately: tell the opponent, then let the
    /// worker close the connection and run the disconnect path.
    async fn handle_quit(&mut self, id: Uuid) {
        let Some(client) = self.clients.get(&id) else {
            return;
        };
        let symbol = client.symbol;
        let opponent = client.opponent;
        log::info!("player {symbol} quit the session");
        if let Some(opponent) = opponent {
            self.send_to(
                opponent,
                &ServerMessage::OpponentLeftSession {
                    message: format!("Player {symbol} has left the session."),
                },
            )
            .await;
        }
    }

    /// Cleanup for a terminated connection. Runs exactly once per
    /// connection in practice, and calling it again for a session that is
    /// already gone has no effect.
    pub async fn handle_disconnection(&mut self, id: Uuid) {
        let Some(gone) = self.clients.remove(&id) else {
            return;
        };
        self.order.retain(|other| *other != id);
        let symbol = gone.symbol;
        log::info!("player {symbol} disconnected, {} remaining", self.clients.len());

        let mut write = gone.write;
        let _ = write.shutdown().await;

        if let Some(opponent) = gone.opponent {
            if let Some(client) = self.clients.get_mut(&opponent) {
                client.opponent = None;
            }
        }

        // A pairing cannot survive one side leaving. Dissolving it ends
        // the current game and forecloses any rematch; the survivor is
        // back to waiting for a fresh opponent.
        let was_paired = self
            .session
            .as_ref()
            .is_some_and(|pair| pair.contains(id));
        if was_paired {
            self.session = None;
            if let Some(opponent) = gone.opponent {
                if self.clients.contains_key(&opponent) {
                    self.send_to(
                        opponent,
                        &ServerMessage::OpponentDisconnected {
                            message: format!("Player {symbol} has disconnected. Session over."),
                        },
                    )
                    .await;
                }
            }
        }

        if self.clients.is_empty() {
            // Back to zero participants: the next pair starts clean.
            self.scores = Scores::default();
            self.starting = Piece::X;
            log::info!("all players gone, session state reset");
        }
    }

    /// Final notice before the process goes down.
    pub async fn announce_shutdown(&mut self) {
        self.broadcast(&ServerMessage::Info {
            message: "Server is shutting down.".into(),
        })
        .await;
    }

    fn clear_rematch_flags(&mut self) {
        for client in self.clients.values_mut() {
            client.rematch_requested = false;
        }
    }

    /// Registry key of the player holding the turn, if a game is running.
    fn turn_holder(&self) -> Option<Uuid> {
        let pair = self.session.as_ref()?;
        if !pair.game.in_progress() {
            return None;
        }
        let turn = pair.game.turn;
        self.clients
            .iter()
            .find_map(|(id, client)| (client.symbol == turn).then_some(*id))
    }
}

/// Handle for a running server: flips the worker liveness flag, notifies
/// connected players, and aborts the accept loop.
pub struct ServerHandle {
    state: SharedState,
    running: Arc<AtomicBool>,
    accept_task: JoinHandle<()>,
}

impl ServerHandle {
    pub async fn shutdown(self) {
        // Announce while holding the lock, then flip the flag: workers
        // waking on their read timeout cannot tear a session down before
        // the farewell went out.
        self.state.lock().await.announce_shutdown().await;
        self.running.store(false, Ordering::SeqCst);
        self.accept_task.abort();
    }
}

/// Bind `0.0.0.0:port` (port 0 lets the OS pick) and spawn the accept
/// loop. Returns the handle and the actual bound address.
pub async fn start(port: u16) -> anyhow::Result<(ServerHandle, SocketAddr)> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    let addr = listener.local_addr()?;
    let state: SharedState = Arc::new(Mutex::new(ServerState::new()));
    let running = Arc::new(AtomicBool::new(true));

    let accept_state = state.clone();
    let accept_running = running.clone();
    let accept_task = tokio::spawn(async move {
        if let Err(err) = run(listener, accept_state, accept_running).await {
            log::error!("accept loop failed: {err:#}");
        }
    });

    Ok((
        ServerHandle {
            state,
            running,
            accept_task,
        },
        addr,
    ))
}

/// Accept loop. Admission happens under the lock; an admitted connection
/// gets its own worker task, a rejected one is already closed by the time
/// `admit` returns.
pub async fn run(
    listener: TcpListener,
    state: SharedState,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        log::info!("connection from {peer}");
        let admitted = state.lock().await.admit(stream).await;
        match admitted {
            Some((id, read)) => {
                let connection = Connection::new(id, read, state.clone(), running.clone());
                tokio::spawn(connection.run());
            }
            None => log::info!("rejected {peer}: server is full"),
        }
    }
}
