use super::domain::{Finding, Severity};

pub const MAX_SCORE: u8 = 100;

pub const fn severity_weight(severity: Severity) -> u32 {
    match severity {
        Severity::High => 10,
        Severity::Medium => 4,
        Severity::Low => 1,
    }
}

pub fn penalty(findings: &[Finding]) -> u32 {
    findings
        .iter()
        .map(|finding| severity_weight(finding.severity))
        .sum()
}

/// Run score: 100 minus the weighted penalty averaged over audited units, truncated.
///
/// An audit that covered no units scores 100.
pub fn score(findings: &[Finding], units_audited: usize) -> u8 {
    if units_audited == 0 {
        return MAX_SCORE;
    }
    let average = f64::from(penalty(findings)) / units_audited as f64;
    (f64::from(MAX_SCORE) - average).clamp(0.0, f64::from(MAX_SCORE)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::domain::ContentUnitId;

    fn finding(category: &str, severity: Severity) -> Finding {
        Finding::new(
            &ContentUnitId("page".to_string()),
            "title",
            category,
            severity,
            "issue",
        )
    }

    #[test]
    fn no_units_scores_full_marks() {
        assert_eq!(score(&[], 0), 100);
        assert_eq!(score(&[finding("x", Severity::High)], 0), 100);
    }

    #[test]
    fn penalty_is_averaged_per_unit() {
        let findings = vec![
            finding("a", Severity::High),
            finding("b", Severity::Medium),
            finding("c", Severity::Low),
        ];
        assert_eq!(penalty(&findings), 15);
        assert_eq!(score(&findings, 1), 85);
        // 15 / 2 = 7.5 -> 92.5 truncates to 92
        assert_eq!(score(&findings, 2), 92);
    }

    #[test]
    fn score_is_clamped_at_zero() {
        let findings: Vec<Finding> = (0..20)
            .map(|n| finding(&format!("c{n}"), Severity::High))
            .collect();
        assert_eq!(score(&findings, 1), 0);
    }

    #[test]
    fn score_never_increases_with_more_penalty() {
        let mut findings = Vec::new();
        let mut previous = score(&findings, 3);
        for severity in [Severity::Low, Severity::Medium, Severity::High, Severity::Low] {
            findings.push(finding("x", severity));
            let next = score(&findings, 3);
            assert!(next <= previous);
            previous = next;
        }
    }
}
