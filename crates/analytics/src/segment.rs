//! Segment classification.

use engine_core::Segment;

use crate::settings::SegmentRules;

/// Classifies a customer. Rules are evaluated in precedence order and the
/// first match wins.
pub fn classify(
    total_events: u64,
    recency_score: u8,
    days_since_last: Option<i64>,
    rules: &SegmentRules,
) -> Segment {
    if total_events == 0 {
        return Segment::New;
    }
    if total_events >= rules.vip_min_events && recency_score >= rules.engaged_min_recency_score {
        return Segment::Vip;
    }
    if total_events >= rules.loyal_min_events && recency_score >= rules.engaged_min_recency_score {
        return Segment::Loyal;
    }
    if let Some(days) = days_since_last {
        if days > rules.lost_after_days && recency_score <= rules.lost_max_recency_score {
            return Segment::Lost;
        }
        if days > rules.at_risk_after_days && recency_score <= rules.at_risk_max_recency_score {
            return Segment::AtRisk;
        }
    }
    if total_events >= rules.regular_min_events {
        return Segment::Regular;
    }
    Segment::Occasional
}
