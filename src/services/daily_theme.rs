use crate::models::daily_theme::{DailyTheme, ALL_CATEGORIES};

/// Hash a date string into a generator seed. The algorithm is frozen: every
/// client derives today's theme locally with the exact same arithmetic, so
/// any change here desynchronizes theme validation across the whole system.
/// Per character: `hash = (hash << 5) - hash + c`, truncated to a 32-bit
/// two's-complement integer at every step; the seed is the absolute value.
pub fn string_to_seed(s: &str) -> u32 {
    let mut hash: i32 = 0;
    for c in s.chars() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(c as i32);
    }
    hash.unsigned_abs()
}

/// mulberry32, bit-compatible with the reference generator: 32-bit state,
/// 32-bit-truncating multiplies, unsigned shifts, output in [0, 1).
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: u32) -> Self {
        Mulberry32 { state: seed }
    }

    pub fn next(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        f64::from(t ^ (t >> 14)) / 4_294_967_296.0
    }
}

/// Derive the theme for a date string (normally `YYYY-MM-DD`). One draw,
/// scaled to eight slots: slots 6 and 7 mean "Everything" (twice the weight
/// of any single category), slots 0-5 index the category order.
pub fn theme_for_date(date: &str) -> DailyTheme {
    let mut rng = Mulberry32::new(string_to_seed(date));
    let roll = (rng.next() * 8.0).floor() as usize;
    if roll >= 6 {
        DailyTheme::All
    } else {
        DailyTheme::Single(*ALL_CATEGORIES.get(roll).unwrap_or(&ALL_CATEGORIES[0]))
    }
}
