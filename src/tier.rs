/// Ordered attendance bands: >=90, >=75, >=60, below. Every threshold is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Excellent,
    Good,
    Average,
    Poor,
}

impl Tier {
    pub const EXCELLENT_MIN: f64 = 90.0;
    pub const GOOD_MIN: f64 = 75.0;
    pub const AVERAGE_MIN: f64 = 60.0;

    pub fn from_percentage(value: f64) -> Self {
        if value >= Self::EXCELLENT_MIN {
            Self::Excellent
        } else if value >= Self::GOOD_MIN {
            Self::Good
        } else if value >= Self::AVERAGE_MIN {
            Self::Average
        } else {
            Self::Poor
        }
    }

    /// Three-colour marker used in transcript lines; average and poor share red.
    pub fn status_marker(self) -> &'static str {
        match self {
            Self::Excellent => "🟢",
            Self::Good => "🟡",
            Self::Average | Self::Poor => "🔴",
        }
    }

    pub fn chart_label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Average => "Average",
            Self::Poor => "Poor",
        }
    }

    pub fn performance_label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent 🌟",
            Self::Good => "Good 👍",
            Self::Average => "Average 📊",
            Self::Poor => "Needs Improvement 📈",
        }
    }

    pub fn color_hex(self) -> &'static str {
        match self {
            Self::Excellent => "#198754",
            Self::Good => "#17a2b8",
            Self::Average => "#ffc107",
            Self::Poor => "#dc3545",
        }
    }
}

/// Forecast confidence marker: >=80 green, >=60 yellow, otherwise red.
pub fn confidence_marker(confidence: f64) -> &'static str {
    if confidence >= 80.0 {
        "🟢"
    } else if confidence >= 60.0 {
        "🟡"
    } else {
        "🔴"
    }
}

/// Daily trend marker used in summaries: >=80 rising, >=60 flat, otherwise falling.
pub fn trend_marker(percentage: f64) -> &'static str {
    if percentage >= 80.0 {
        "📈"
    } else if percentage >= 60.0 {
        "📊"
    } else {
        "📉"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_inclusive() {
        assert_eq!(Tier::from_percentage(90.0), Tier::Excellent);
        assert_eq!(Tier::from_percentage(89.99), Tier::Good);
        assert_eq!(Tier::from_percentage(75.0), Tier::Good);
        assert_eq!(Tier::from_percentage(60.0), Tier::Average);
        assert_eq!(Tier::from_percentage(59.9), Tier::Poor);
    }

    #[test]
    fn average_and_poor_share_the_red_marker() {
        assert_eq!(Tier::Average.status_marker(), Tier::Poor.status_marker());
        assert_ne!(Tier::Good.status_marker(), Tier::Excellent.status_marker());
    }

    #[test]
    fn confidence_marker_bands() {
        assert_eq!(confidence_marker(80.0), "🟢");
        assert_eq!(confidence_marker(79.0), "🟡");
        assert_eq!(confidence_marker(60.0), "🟡");
        assert_eq!(confidence_marker(59.0), "🔴");
    }
}
