//! Automated players.
//!
//! A [`Bot`] owns a logged-in [`NetworkClient`] and repeatedly picks a tile
//! with its [`BotKind`] policy, then waits a random delay no shorter than
//! the server cooldown before the next pick.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use place_core::{Board, PlaceColor, Tile};

use crate::client::NetworkClient;
use crate::error::SubmitError;
use crate::model::ClientModel;

/// Upper bound on the wait between two bot moves.
pub const BOT_MAX_DELAY: Duration = Duration::from_secs(5);

/// How a bot chooses its next tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotKind {
    /// Any cell, any color.
    Random,

    /// Any cell not already `color`, painted `color`.
    Color { color: PlaceColor },

    /// Like `Color`, restricted to a rectangle (inclusive bounds, clipped to the board).
    Region {
        rows: RangeInclusive<i32>,
        cols: RangeInclusive<i32>,
        color: PlaceColor,
    },

    /// A cell currently `target`, repainted some other color.
    Grief { target: PlaceColor },
}

impl BotKind {
    /// Short name used in logs and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Color { .. } => "color",
            Self::Region { .. } => "region",
            Self::Grief { .. } => "grief",
        }
    }

    /// Picks the next tile to paint, or `None` if the policy has nothing left to do.
    ///
    /// The returned tile carries no owner; the server attributes it.
    pub fn choose<R: Rng + ?Sized>(&self, board: &Board, rng: &mut R) -> Option<Tile> {
        let dim = i32::try_from(board.dim()).ok()?;

        match self {
            Self::Random => {
                let row = rng.gen_range(0..dim);
                let col = rng.gen_range(0..dim);
                let color = *PlaceColor::ALL.choose(rng)?;
                Some(Tile::new(row, col, color, ""))
            }
            Self::Color { color } => {
                let cell = pick_cell(board, rng, |t| t.color() != *color)?;
                Some(Tile::new(cell.row(), cell.col(), *color, ""))
            }
            Self::Region { rows, cols, color } => {
                let cell = pick_cell(board, rng, |t| {
                    rows.contains(&t.row()) && cols.contains(&t.col()) && t.color() != *color
                })?;
                Some(Tile::new(cell.row(), cell.col(), *color, ""))
            }
            Self::Grief { target } => {
                let cell = pick_cell(board, rng, |t| t.color() == *target)?;
                let others: Vec<PlaceColor> = PlaceColor::ALL
                    .iter()
                    .copied()
                    .filter(|c| c != target)
                    .collect();
                let color = *others.choose(rng)?;
                Some(Tile::new(cell.row(), cell.col(), color, ""))
            }
        }
    }
}

/// Picks a uniformly random tile matching `wanted`.
fn pick_cell<'a, R, F>(board: &'a Board, rng: &mut R, wanted: F) -> Option<&'a Tile>
where
    R: Rng + ?Sized,
    F: Fn(&Tile) -> bool,
{
    let candidates: Vec<&Tile> = board.tiles().iter().filter(|t| wanted(t)).collect();
    candidates.choose(rng).copied()
}

/// Timing for a bot's moves.
#[derive(Debug, Clone, Copy)]
pub struct BotTiming {
    /// Shortest wait; should match the server cooldown
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl BotTiming {
    /// Waits between `cooldown` and [`BOT_MAX_DELAY`].
    pub fn for_cooldown(cooldown: Duration) -> Self {
        Self {
            min_delay: cooldown,
            max_delay: BOT_MAX_DELAY.max(cooldown),
        }
    }

    fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        rng.gen_range(self.min_delay..=self.max_delay)
    }
}

/// A logged-in client driven by a [`BotKind`] policy.
pub struct Bot {
    kind: BotKind,
    client: NetworkClient,
    model: Arc<ClientModel>,
    timing: BotTiming,
    rng: StdRng,
}

impl Bot {
    /// Wraps a logged-in client.
    pub fn new(kind: BotKind, client: NetworkClient, model: Arc<ClientModel>, timing: BotTiming) -> Self {
        Self {
            kind,
            client,
            model,
            timing,
            rng: StdRng::from_entropy(),
        }
    }

    /// Uses a fixed seed so tile choices are reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Plays until cancelled or disconnected.
    ///
    /// The model must already be fed by the client's listener.
    pub async fn run(mut self, cancel: CancellationToken) {
        let username = self.client.username().unwrap_or("?").to_string();
        info!(username = %username, kind = self.kind.name(), "Bot started");

        loop {
            let delay = self.timing.next_delay(&mut self.rng);
            tokio::select! {
                _ = sleep(delay) => {}
                _ = cancel.cancelled() => break,
            }

            let board = self.model.snapshot().await;
            let Some(tile) = self.kind.choose(&board, &mut self.rng) else {
                debug!(username = %username, "Nothing left to paint");
                continue;
            };

            debug!(username = %username, tile = %tile, "Bot choosing tile");
            match self
                .client
                .submit(tile.row(), tile.col(), tile.color())
                .await
            {
                Ok(()) => {}
                Err(SubmitError::Cooldown) => {
                    debug!(username = %username, "Bot still cooling down");
                }
                Err(SubmitError::Disconnected) => {
                    warn!(username = %username, "Bot lost its connection");
                    break;
                }
                Err(e) => {
                    warn!(username = %username, error = %e, "Bot move refused");
                }
            }
        }

        self.client.shutdown().await;
        info!(username = %username, "Bot stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn painted(dim: u32, color: PlaceColor) -> Board {
        let mut board = Board::new(dim).unwrap();
        for row in 0..dim as i32 {
            for col in 0..dim as i32 {
                board.apply_at(&Tile::new(row, col, color, ""), 1).unwrap();
            }
        }
        board
    }

    #[test]
    fn test_random_stays_on_board() {
        let board = Board::new(5).unwrap();
        let mut rng = rng();
        for _ in 0..200 {
            let tile = BotKind::Random.choose(&board, &mut rng).unwrap();
            assert!(board.is_valid(&tile));
        }
    }

    #[test]
    fn test_color_skips_cells_already_that_color() {
        let mut board = painted(3, PlaceColor::Red);
        board
            .apply_at(&Tile::new(2, 1, PlaceColor::White, ""), 1)
            .unwrap();

        let kind = BotKind::Color {
            color: PlaceColor::Red,
        };
        let tile = kind.choose(&board, &mut rng()).unwrap();
        assert_eq!((tile.row(), tile.col()), (2, 1));
        assert_eq!(tile.color(), PlaceColor::Red);

        let done = painted(3, PlaceColor::Red);
        assert!(kind.choose(&done, &mut rng()).is_none());
    }

    #[test]
    fn test_region_stays_inside_rectangle() {
        let board = Board::new(10).unwrap();
        let kind = BotKind::Region {
            rows: 2..=4,
            cols: 6..=7,
            color: PlaceColor::Navy,
        };
        let mut rng = rng();
        for _ in 0..100 {
            let tile = kind.choose(&board, &mut rng).unwrap();
            assert!((2..=4).contains(&tile.row()));
            assert!((6..=7).contains(&tile.col()));
        }
    }

    #[test]
    fn test_region_outside_board_has_nothing_to_do() {
        let board = Board::new(4).unwrap();
        let kind = BotKind::Region {
            rows: 40..=60,
            cols: 40..=60,
            color: PlaceColor::Red,
        };
        assert!(kind.choose(&board, &mut rng()).is_none());
    }

    #[test]
    fn test_grief_repaints_target_cells_only() {
        let mut board = painted(3, PlaceColor::Black);
        board
            .apply_at(&Tile::new(0, 2, PlaceColor::White, ""), 1)
            .unwrap();

        let kind = BotKind::Grief {
            target: PlaceColor::White,
        };
        let mut rng = rng();
        for _ in 0..50 {
            let tile = kind.choose(&board, &mut rng).unwrap();
            assert_eq!((tile.row(), tile.col()), (0, 2));
            assert_ne!(tile.color(), PlaceColor::White);
        }
    }

    #[test]
    fn test_delay_within_bounds() {
        let timing = BotTiming::for_cooldown(Duration::from_millis(1000));
        let mut rng = rng();
        for _ in 0..100 {
            let delay = timing.next_delay(&mut rng);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= BOT_MAX_DELAY);
        }
    }

    #[test]
    fn test_long_cooldown_raises_max_delay() {
        let timing = BotTiming::for_cooldown(Duration::from_secs(9));
        assert_eq!(timing.next_delay(&mut rng()), Duration::from_secs(9));
    }
}
