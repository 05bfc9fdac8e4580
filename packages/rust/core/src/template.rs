//! The fixed report template shared by the prompt and the extractor.
//!
//! The prompt instructs the model to answer with these headers and the
//! extractor locates fields by them, so both sides read from here.

/// The eight mandatory numbered sections of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    CompanyOverview,
    FinancialHealth,
    ProspectAnalysis,
    WinThemes,
    RecommendedSolutions,
    KeyPersonnel,
    EngagementStrategy,
    GoToMarket,
}

impl Section {
    pub const ALL: [Section; 8] = [
        Section::CompanyOverview,
        Section::FinancialHealth,
        Section::ProspectAnalysis,
        Section::WinThemes,
        Section::RecommendedSolutions,
        Section::KeyPersonnel,
        Section::EngagementStrategy,
        Section::GoToMarket,
    ];

    pub fn number(self) -> u8 {
        match self {
            Section::CompanyOverview => 1,
            Section::FinancialHealth => 2,
            Section::ProspectAnalysis => 3,
            Section::WinThemes => 4,
            Section::RecommendedSolutions => 5,
            Section::KeyPersonnel => 6,
            Section::EngagementStrategy => 7,
            Section::GoToMarket => 8,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Section::CompanyOverview => "COMPANY OVERVIEW",
            Section::FinancialHealth => "FINANCIAL HEALTH",
            Section::ProspectAnalysis => "PROSPECT ANALYSIS",
            Section::WinThemes => "WIN THEMES",
            Section::RecommendedSolutions => "RECOMMENDED SOLUTIONS",
            Section::KeyPersonnel => "KEY PERSONNEL",
            Section::EngagementStrategy => "ENGAGEMENT STRATEGY",
            Section::GoToMarket => "GO-TO-MARKET ACTION PLAN",
        }
    }

    /// Markdown header line, e.g. `## 3. PROSPECT ANALYSIS`.
    pub fn header(self) -> String {
        format!("## {}. {}", self.number(), self.title())
    }
}

/// Time horizons of the go-to-market action plan (`###` subsections of section 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Horizon {
    Immediate,
    ShortTerm,
    MidTerm,
    LongTerm,
}

impl Horizon {
    pub const ALL: [Horizon; 4] = [
        Horizon::Immediate,
        Horizon::ShortTerm,
        Horizon::MidTerm,
        Horizon::LongTerm,
    ];

    /// Label the extractor keys on.
    pub fn label(self) -> &'static str {
        match self {
            Horizon::Immediate => "Immediate Actions",
            Horizon::ShortTerm => "Short-term Actions",
            Horizon::MidTerm => "Mid-term Actions",
            Horizon::LongTerm => "Long-term Actions",
        }
    }

    pub fn window(self) -> &'static str {
        match self {
            Horizon::Immediate => "Week 1-2",
            Horizon::ShortTerm => "Month 1",
            Horizon::MidTerm => "Months 2-3",
            Horizon::LongTerm => "Months 4-6",
        }
    }

    pub fn header(self) -> String {
        format!("### {} ({})", self.label(), self.window())
    }
}
