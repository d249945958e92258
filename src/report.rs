use crate::billing::CostBreakdown;
use bigdecimal::{BigDecimal, ToPrimitive};
use std::fmt::Write;

const RULE_WIDTH: usize = 36;
const BAR_WIDTH: usize = 30;

/// How the two parties and the currency are shown.
#[derive(Debug, Clone)]
pub struct Labels {
    pub owner: String,
    pub other: String,
    pub currency: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            owner: "Device owner".to_string(),
            other: "Other party".to_string(),
            currency: "£".to_string(),
        }
    }
}

impl Labels {
    fn money(&self, amount: &BigDecimal) -> String {
        format!("{}{:.2}", self.currency, amount)
    }
}

pub fn render(breakdown: &CostBreakdown, labels: &Labels) -> String {
    let mut out = String::new();
    summary(&mut out, breakdown, labels);
    out.push('\n');
    table(&mut out, breakdown, labels);
    out.push('\n');
    chart(&mut out, breakdown, labels);
    out
}

fn summary(out: &mut String, breakdown: &CostBreakdown, labels: &Labels) {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let line = |out: &mut String, label: &str, amount: &BigDecimal| {
        let _ = writeln!(out, "{:<24}{:>12}", label, labels.money(amount));
    };

    let _ = writeln!(out, "{heavy}\nBILL BREAKDOWN\n{heavy}");
    line(out, "Total bill", &breakdown.bill_total);
    line(out, "  Standing charge", &breakdown.standing_charge_total);
    line(out, "  Energy", &breakdown.energy_cost_total);
    let _ = writeln!(out, "{light}");
    line(out, "Device cost", &breakdown.device_cost);
    line(out, "Shared cost", &breakdown.shared_cost);
    let _ = writeln!(out, "{heavy}");
    line(out, &format!("Paid by {}", labels.owner), &breakdown.party_a_pay);
    line(out, &format!("Paid by {}", labels.other), &breakdown.party_b_pay);
    let _ = writeln!(out, "{heavy}");
}

fn table(out: &mut String, breakdown: &CostBreakdown, labels: &Labels) {
    let zero = BigDecimal::from(0);
    let half_shared = &breakdown.party_b_pay;
    let rows = [
        (
            labels.owner.as_str(),
            half_shared,
            &breakdown.device_cost,
            &breakdown.party_a_pay,
        ),
        (labels.other.as_str(), half_shared, &zero, &breakdown.party_b_pay),
    ];
    let name_width = rows
        .iter()
        .map(|(name, ..)| name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Party".len());

    let _ = writeln!(
        out,
        "| {:<name_width$} | {:>12} | {:>12} | {:>12} |",
        "Party", "Shared half", "Device", "Total"
    );
    let _ = writeln!(
        out,
        "|{}|{}|{}|{}|",
        "-".repeat(name_width + 2),
        "-".repeat(14),
        "-".repeat(14),
        "-".repeat(14)
    );
    for (name, shared, device, total) in rows {
        let _ = writeln!(
            out,
            "| {:<name_width$} | {:>12} | {:>12} | {:>12} |",
            name,
            labels.money(shared),
            labels.money(device),
            labels.money(total)
        );
    }
}

fn chart(out: &mut String, breakdown: &CostBreakdown, labels: &Labels) {
    let a = breakdown.party_a_pay.to_f64().unwrap_or(0.0);
    let b = breakdown.party_b_pay.to_f64().unwrap_or(0.0);
    let [a_len, b_len] = bar_lengths([a, b], BAR_WIDTH);
    let name_width = labels
        .owner
        .chars()
        .count()
        .max(labels.other.chars().count());
    for (name, len, amount) in [
        (&labels.owner, a_len, &breakdown.party_a_pay),
        (&labels.other, b_len, &breakdown.party_b_pay),
    ] {
        let _ = writeln!(
            out,
            "{:<name_width$} | {} {}",
            name,
            "█".repeat(len),
            labels.money(amount)
        );
    }
}

/// Scales values so the largest fills `width`; negative values get no bar.
fn bar_lengths<const N: usize>(values: [f64; N], width: usize) -> [usize; N] {
    let max = values.iter().copied().fold(0.0_f64, f64::max);
    values.map(|v| {
        if max <= 0.0 || v <= 0.0 {
            0
        } else {
            (v / max * width as f64).round() as usize
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{BillingInputs, compute};
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[fixture]
    fn breakdown() -> CostBreakdown {
        compute(
            &BillingInputs::new(dec("0.28"), dec("0.45"), 30, dec("250"), dec("50")).unwrap(),
        )
    }

    #[rstest]
    fn summary_shows_every_amount(breakdown: CostBreakdown) {
        let labels = Labels {
            owner: "You".to_string(),
            other: "Housemate".to_string(),
            currency: "£".to_string(),
        };
        let text = render(&breakdown, &labels);
        for expected in [
            "Total bill", "£83.50", "£13.50", "£70.00", "£14.00", "£69.50", "Paid by You",
            "£48.75", "Paid by Housemate", "£34.75",
        ] {
            assert!(text.contains(expected), "missing {expected:?} in:\n{text}");
        }
    }

    #[rstest]
    fn table_rows_add_up(breakdown: CostBreakdown) {
        let mut out = String::new();
        table(&mut out, &breakdown, &Labels::default());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[2],
            "| Device owner |       £34.75 |       £14.00 |       £48.75 |"
        );
        assert_eq!(
            lines[3],
            "| Other party  |       £34.75 |        £0.00 |       £34.75 |"
        );
    }

    #[rstest]
    fn chart_scales_to_the_larger_payment(breakdown: CostBreakdown) {
        let mut out = String::new();
        chart(&mut out, &breakdown, &Labels::default());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0].matches('█').count(), BAR_WIDTH);
        assert_eq!(lines[1].matches('█').count(), 21);
    }

    #[rstest]
    #[case([10.0, 5.0], [30, 15])]
    #[case([0.0, 0.0], [0, 0])]
    #[case([-3.0, 6.0], [0, 30])]
    fn bar_lengths_are_proportional(#[case] values: [f64; 2], #[case] expected: [usize; 2]) {
        assert_eq!(bar_lengths(values, 30), expected);
    }
}
