//! Deterministic bot entries seeded from the date, so the first players of
//! the day never see an empty board. Regenerating for the same date always
//! produces the same bots.

use crate::db::RankedStore;
use crate::error::AppError;
use crate::models::leaderboard::StoredEntry;
use crate::services::daily_theme::{string_to_seed, Mulberry32};
use crate::services::leaderboard::{leaderboard_key, submission_key};
use crate::validation::{CORRECT_GLYPH, MISTAKE_GLYPH};
use chrono::{Duration, NaiveDate, NaiveTime};

const BOT_COUNT_BASE: i64 = 10;
const BOT_COUNT_VARIANCE: i64 = 3;
const POISSON_MEAN: f64 = 6.0;
const MAX_BOT_CORRECT: i64 = 20;

const ADJECTIVES: &[&str] = &[
    "Brave", "Swift", "Clever", "Mighty", "Silent", "Golden", "Silver", "Cosmic", "Thunder",
    "Shadow", "Crystal", "Blazing", "Frozen", "Ancient", "Noble", "Wild", "Gentle", "Fierce",
    "Lucky", "Mystic", "Radiant", "Stormy", "Crimson", "Azure", "Emerald", "Obsidian", "Iron",
    "Steel", "Copper", "Bronze", "Platinum", "Diamond", "Ruby", "Sapphire", "Jade",
];

const ANIMALS: &[&str] = &[
    "Penguin", "Tiger", "Fox", "Eagle", "Wolf", "Bear", "Hawk", "Lion", "Panther", "Falcon",
    "Owl", "Shark", "Dragon", "Phoenix", "Raven", "Cobra", "Viper", "Jaguar", "Leopard", "Lynx",
    "Otter", "Badger", "Wolverine", "Mongoose", "Heron", "Crane", "Osprey", "Condor", "Albatross",
];

// Inverse transform sampling.
fn sample_poisson(lambda: f64, rng: &mut Mulberry32) -> i64 {
    let l = (-lambda).exp();
    let mut k: i64 = 0;
    let mut p = 1.0;
    loop {
        k += 1;
        p *= rng.next();
        if p <= l {
            break;
        }
    }
    k - 1
}

fn bot_name(rng: &mut Mulberry32) -> String {
    let adjective = ADJECTIVES[(rng.next() * ADJECTIVES.len() as f64) as usize];
    let animal = ANIMALS[(rng.next() * ANIMALS.len() as f64) as usize];
    format!("{} {}", adjective, animal)
}

fn bot_device_id(date: &str, index: i64) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut rng = Mulberry32::new(string_to_seed(&format!("bot-{}-{}", date, index)));
    (0..32)
        .map(|_| HEX[(rng.next() * 16.0) as usize] as char)
        .collect()
}

/// Interleave glyphs so the grid reads like a real session while the counts
/// stay exactly consistent with the entry's fields.
fn bot_emoji_grid(correct_count: i64, mistake_count: i64, rng: &mut Mulberry32) -> String {
    let total = correct_count + mistake_count;
    let mut grid = String::new();
    let mut mistakes_remaining = mistake_count;
    let mut correct_remaining = correct_count;

    for _ in 0..total {
        if mistakes_remaining == 0 {
            grid.push(CORRECT_GLYPH);
            correct_remaining -= 1;
        } else if correct_remaining == 0 {
            grid.push(MISTAKE_GLYPH);
            mistakes_remaining -= 1;
        } else {
            let mistake_prob =
                mistakes_remaining as f64 / (correct_remaining + mistakes_remaining) as f64;
            if rng.next() < mistake_prob {
                grid.push(MISTAKE_GLYPH);
                mistakes_remaining -= 1;
            } else {
                grid.push(CORRECT_GLYPH);
                correct_remaining -= 1;
            }
        }
    }

    grid
}

pub(crate) fn bots_for_date(date: &str) -> Vec<StoredEntry> {
    let mut base = Mulberry32::new(string_to_seed(&format!("bots-{}", date)));
    let variance =
        (base.next() * (BOT_COUNT_VARIANCE * 2 + 1) as f64) as i64 - BOT_COUNT_VARIANCE;
    let bot_count = BOT_COUNT_BASE + variance;

    let day_start_ms = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
        .unwrap_or(0);

    let mut bots = Vec::with_capacity(bot_count as usize);
    for i in 0..bot_count {
        // Per-bot generator, so a bot regenerates identically on its own.
        let mut rng = Mulberry32::new(string_to_seed(&format!("bot-{}-{}", date, i)));

        let correct_count = sample_poisson(POISSON_MEAN, &mut rng).clamp(0, MAX_BOT_CORRECT);

        // Weighted 5/10/20/30/35 toward higher mistake counts.
        let mistake_roll = rng.next();
        let mistake_count = if mistake_roll < 0.05 {
            1
        } else if mistake_roll < 0.15 {
            2
        } else if mistake_roll < 0.35 {
            3
        } else if mistake_roll < 0.65 {
            4
        } else {
            5
        };

        let display_name = bot_name(&mut rng);
        let device_id = bot_device_id(date, i);

        // Spread through the first six hours of the day.
        let timestamp = day_start_ms + (rng.next() * 6.0 * 60.0 * 60.0 * 1000.0) as i64;

        let emoji_grid = bot_emoji_grid(correct_count, mistake_count, &mut rng);

        bots.push(StoredEntry {
            display_name,
            correct_count,
            total_attempts: correct_count + mistake_count,
            emoji_grid,
            device_id,
            timestamp,
        });
    }

    bots
}

fn lock_key(date: &str) -> String {
    format!("bots-initialized:{}", date)
}

/// Populate the day's board with bots, once. The set-if-absent on the lock
/// key decides the single writer; the lock is released on a mid-population
/// failure so a later request can retry. Returns whether bots were created.
pub fn ensure_bots(store: &dyn RankedStore, date: &str) -> Result<bool, AppError> {
    let lock = lock_key(date);
    if store.exists(&lock)? {
        return Ok(false);
    }
    if !store.set_nx(&lock, "done", Duration::days(8))? {
        return Ok(false);
    }

    let populate = || -> Result<(), AppError> {
        let board = leaderboard_key(date);
        for bot in bots_for_date(date) {
            let member = serde_json::to_string(&bot)?;
            store.zadd(&board, &member, bot.score())?;
            // Reserve the bot's device so a colliding submission is refused.
            store.set_nx(
                &submission_key(date, &bot.device_id),
                "bot",
                Duration::hours(25),
            )?;
        }
        store.expire(&board, Duration::days(7))?;
        Ok(())
    };

    if let Err(e) = populate() {
        store.del(&lock)?;
        return Err(e);
    }

    log::debug!("seeded bot entries for {}", date);
    Ok(true)
}
