//! Draw scheduler: computes the next draw time per game timetable and
//! creates the draw record. Invoked right after a successful settlement
//! so there is always an open round to bet on.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use shared::{
    GameType, THREE_DIGIT_DRAW_DAYS, THREE_DIGIT_DRAW_TIME, TWO_DIGIT_DRAW_TIMES,
};

use crate::domain::Draw;
use crate::store::{NewDraw, Store, StoreError};

pub struct DrawScheduler {
    store: Arc<dyn Store>,
}

impl DrawScheduler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create the next draw for a game with its default stake bounds and
    /// multiplier
    pub async fn schedule_next(&self, game_type: GameType) -> Result<Draw, StoreError> {
        let draw_time = next_draw_time(game_type, Utc::now());

        let mut tx = self.store.begin().await?;
        let draw = tx
            .insert_draw(NewDraw {
                game_type,
                draw_time,
                min_bet: game_type.default_min_bet(),
                max_bet: game_type.default_max_bet(),
                multiplier: game_type.default_multiplier(),
            })
            .await?;
        tx.commit().await?;

        tracing::info!(
            draw_id = draw.draw_id,
            game_type = %game_type,
            draw_time = %draw.draw_time,
            "Next draw scheduled"
        );
        Ok(draw)
    }
}

/// Strictly-future draw time for a game, per its fixed UTC timetable
pub fn next_draw_time(game_type: GameType, now: DateTime<Utc>) -> DateTime<Utc> {
    match game_type {
        GameType::TwoDigit => {
            for (hour, minute) in TWO_DIGIT_DRAW_TIMES {
                let candidate = at(now.date_naive(), hour, minute);
                if candidate > now {
                    return candidate;
                }
            }
            let (hour, minute) = TWO_DIGIT_DRAW_TIMES[0];
            at(now.date_naive() + Duration::days(1), hour, minute)
        }
        GameType::ThreeDigit => {
            let (hour, minute) = THREE_DIGIT_DRAW_TIME;
            // scan the next seven days for a draw weekday with a
            // still-future slot
            for offset in 0..=7 {
                let date = now.date_naive() + Duration::days(offset);
                if !THREE_DIGIT_DRAW_DAYS.contains(&date.weekday()) {
                    continue;
                }
                let candidate = at(date, hour, minute);
                if candidate > now {
                    return candidate;
                }
            }
            // unreachable: two draw days per week always yield a slot
            // within the scanned window
            at(now.date_naive() + Duration::days(7), hour, minute)
        }
    }
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    date.and_hms_opt(hour, minute, 0)
        .expect("timetable times are valid")
        .and_utc()
}
