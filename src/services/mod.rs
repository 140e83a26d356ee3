pub mod bots;
pub mod daily_theme;
pub mod leaderboard;
