/// Trivia categories, in the fixed order shared with every client. The
/// ordinal position is load-bearing: the daily roll indexes into this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Conflict,
    Disasters,
    Exploration,
    Cultural,
    Infrastructure,
    Diplomatic,
}

pub const ALL_CATEGORIES: [Category; 6] = [
    Category::Conflict,
    Category::Disasters,
    Category::Exploration,
    Category::Cultural,
    Category::Infrastructure,
    Category::Diplomatic,
];

impl Category {
    pub fn display_name(self) -> &'static str {
        match self {
            Category::Conflict => "Conflict",
            Category::Disasters => "Disasters",
            Category::Exploration => "Exploration",
            Category::Cultural => "Cultural",
            Category::Infrastructure => "Infrastructure",
            Category::Diplomatic => "Diplomatic",
        }
    }
}

/// The day's trivia restriction: one category, or everything at once.
/// Derived on demand from the date, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyTheme {
    All,
    Single(Category),
}

impl DailyTheme {
    pub fn display_name(self) -> &'static str {
        match self {
            DailyTheme::All => "Everything",
            DailyTheme::Single(category) => category.display_name(),
        }
    }
}
