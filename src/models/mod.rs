pub mod daily_theme;
pub mod leaderboard;
