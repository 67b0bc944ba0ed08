use crate::models::{format_amount, QuotaRecords, Target};
use crate::notifications::models::{BadgeColor, BadgeState};

pub const ALL_SUFFICIENT_TOOLTIP: &str = "All targets have sufficient balance";

/// Summarizes which targets are low on balance.
///
/// Lines follow the order of `targets`. Targets without a record are not counted.
pub fn recompute(targets: &[Target], records: &QuotaRecords) -> BadgeState {
    let low_lines: Vec<String> = targets
        .iter()
        .filter_map(|target| {
            let record = records.get(&target.id)?;
            (record.balance <= target.threshold)
                .then(|| format!("{}: {}", target.name, format_amount(record.balance)))
        })
        .collect();

    let count = low_lines.len();
    if count == 0 {
        return BadgeState {
            count,
            color: BadgeColor::Neutral,
            text: String::new(),
            tooltip_lines: vec![ALL_SUFFICIENT_TOOLTIP.to_string()],
        };
    }

    let noun = if count == 1 { "target" } else { "targets" };
    let mut tooltip_lines = Vec::with_capacity(count + 1);
    tooltip_lines.push(format!("{count} {noun} low on balance:"));
    tooltip_lines.extend(low_lines);

    BadgeState {
        count,
        color: BadgeColor::Alert,
        text: count.to_string(),
        tooltip_lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuotaRecord;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn target(id: &str, threshold: i64) -> Target {
        Target {
            id: id.into(),
            name: format!("name-{id}"),
            endpoint: "https://api.example.com".into(),
            credential: "k".into(),
            identity: None,
            threshold: Decimal::from(threshold),
            interval_minutes: 10,
        }
    }

    fn records(entries: &[(&str, Decimal)]) -> QuotaRecords {
        entries
            .iter()
            .map(|(id, balance)| {
                (
                    id.to_string(),
                    QuotaRecord {
                        balance: *balance,
                        observed_at: Utc::now(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_no_targets_is_neutral() {
        let badge = recompute(&[], &QuotaRecords::new());
        assert_eq!(badge.count, 0);
        assert_eq!(badge.color, BadgeColor::Neutral);
        assert_eq!(badge.text, "");
        assert_eq!(badge.tooltip_lines, vec![ALL_SUFFICIENT_TOOLTIP.to_string()]);
    }

    #[test]
    fn test_counts_only_low_targets_with_records() {
        let targets = vec![target("a", 10), target("b", 10), target("c", 10), target("d", 10)];
        let recs = records(&[
            ("a", Decimal::from(10)),
            ("b", Decimal::new(1001, 2)),
            ("d", Decimal::new(25, 1)),
        ]);
        let badge = recompute(&targets, &recs);
        assert_eq!(badge.count, 2);
        assert_eq!(badge.color, BadgeColor::Alert);
        assert_eq!(badge.text, "2");
        assert_eq!(
            badge.tooltip_lines,
            vec![
                "2 targets low on balance:".to_string(),
                "name-a: 10.00".to_string(),
                "name-d: 2.50".to_string(),
            ]
        );
    }

    #[test]
    fn test_lines_follow_target_order() {
        let targets = vec![target("z", 50), target("a", 50)];
        let recs = records(&[("a", Decimal::ONE), ("z", Decimal::from(2))]);
        let badge = recompute(&targets, &recs);
        assert_eq!(badge.tooltip_lines[1], "name-z: 2.00");
        assert_eq!(badge.tooltip_lines[2], "name-a: 1.00");
        assert_eq!(badge.tooltip(), "2 targets low on balance:\nname-z: 2.00\nname-a: 1.00");
    }

    #[test]
    fn test_all_sufficient_is_neutral() {
        let targets = vec![target("a", 5)];
        let badge = recompute(&targets, &records(&[("a", Decimal::from(100))]));
        assert_eq!(badge.count, 0);
        assert_eq!(badge.color, BadgeColor::Neutral);
        assert_eq!(badge.text, "");
    }
}
