//! Audience tiers and the per-tier container used throughout the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three audience-targeted summary levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryTier {
    /// Children aged 8–12.
    Child,
    /// High-school students aged 16–18.
    HighSchool,
    /// University and college level.
    University,
}

impl SummaryTier {
    /// Order in which tiers are generated: each one is derived from the one before.
    pub const GENERATION_ORDER: [SummaryTier; 3] = [
        SummaryTier::University,
        SummaryTier::HighSchool,
        SummaryTier::Child,
    ];

    /// Order in which tiers appear in the rendered post.
    pub const POST_ORDER: [SummaryTier; 3] = [
        SummaryTier::Child,
        SummaryTier::HighSchool,
        SummaryTier::University,
    ];

    /// Stable identifier used in asset file names and model prompts.
    pub fn as_str(self) -> &'static str {
        match self {
            SummaryTier::Child => "child",
            SummaryTier::HighSchool => "high_school",
            SummaryTier::University => "university",
        }
    }

    /// The tier this one is derived from, if any.
    pub fn source_tier(self) -> Option<SummaryTier> {
        match self {
            SummaryTier::University => None,
            SummaryTier::HighSchool => Some(SummaryTier::University),
            SummaryTier::Child => Some(SummaryTier::HighSchool),
        }
    }

    /// Section heading in the rendered post.
    pub fn heading(self) -> &'static str {
        match self {
            SummaryTier::Child => "For Barn",
            SummaryTier::HighSchool => "For Videregåendeelever",
            SummaryTier::University => "For Universitets- og Høyskolenivå",
        }
    }

    /// Alt text for the tier's figure in the rendered post.
    pub fn figure_alt(self) -> &'static str {
        match self {
            SummaryTier::Child => "Figure for barn",
            SummaryTier::HighSchool => "Figure for videregående",
            SummaryTier::University => "Figure for universitets- og høyskolenivå",
        }
    }
}

impl fmt::Display for SummaryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SummaryTier::Child => "child",
            SummaryTier::HighSchool => "high school",
            SummaryTier::University => "university",
        })
    }
}

/// One value per audience tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tiered<T> {
    pub child: T,
    pub high_school: T,
    pub university: T,
}

impl<T> Tiered<T> {
    pub fn get(&self, tier: SummaryTier) -> &T {
        match tier {
            SummaryTier::Child => &self.child,
            SummaryTier::HighSchool => &self.high_school,
            SummaryTier::University => &self.university,
        }
    }

    pub fn get_mut(&mut self, tier: SummaryTier) -> &mut T {
        match tier {
            SummaryTier::Child => &mut self.child,
            SummaryTier::HighSchool => &mut self.high_school,
            SummaryTier::University => &mut self.university,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_tier_derives_from_the_previous_in_generation_order() {
        let order = SummaryTier::GENERATION_ORDER;
        assert_eq!(order[0].source_tier(), None);
        assert_eq!(order[1].source_tier(), Some(order[0]));
        assert_eq!(order[2].source_tier(), Some(order[1]));
    }

    #[test]
    fn tiered_get_mut_targets_the_right_field() {
        let mut t: Tiered<u8> = Tiered::default();
        *t.get_mut(SummaryTier::HighSchool) = 7;
        assert_eq!(t.high_school, 7);
        assert_eq!(*t.get(SummaryTier::Child), 0);
    }

    #[test]
    fn serialises_tier_as_snake_case() {
        let json = serde_json::to_string(&SummaryTier::HighSchool).unwrap();
        assert_eq!(json, "\"high_school\"");
    }
}
