//! Age-band families used by the patient reports.
//!
//! The three families carry intentionally different boundaries: the
//! registration report uses five-year adolescent bands, the revenue report
//! uses broad clinical bands, and the returning-patient report uses coarse
//! categories. Each family is one rule table that drives both the pure Rust
//! classifier and the generated SQL CASE expression, so the two can never
//! disagree.

/// One classification rule, evaluated in order.
#[derive(Debug, Clone, Copy)]
pub enum BandRule {
    /// `age < limit`
    Below(i64, &'static str),
    /// `min <= age <= max`
    Between(i64, i64, &'static str),
    /// `age > limit`
    Above(i64, &'static str),
}

impl BandRule {
    fn label(&self) -> &'static str {
        match self {
            BandRule::Below(_, label) => label,
            BandRule::Between(_, _, label) => label,
            BandRule::Above(_, label) => label,
        }
    }

    fn matches(&self, age: i64) -> bool {
        match self {
            BandRule::Below(limit, _) => age < *limit,
            BandRule::Between(min, max, _) => age >= *min && age <= *max,
            BandRule::Above(limit, _) => age > *limit,
        }
    }

    fn sql_condition(&self, age_expr: &str) -> String {
        match self {
            BandRule::Below(limit, _) => format!("{age_expr} < {limit}"),
            BandRule::Between(min, max, _) => {
                format!("{age_expr} BETWEEN {min} AND {max}")
            }
            BandRule::Above(limit, _) => format!("{age_expr} > {limit}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BandFamily {
    rules: &'static [BandRule],
    fallback: &'static str,
}

impl BandFamily {
    /// Band label for an age in whole years at the reference date.
    pub fn label_for(&self, age: i64) -> &'static str {
        self.rules
            .iter()
            .find(|rule| rule.matches(age))
            .map(BandRule::label)
            .unwrap_or(self.fallback)
    }

    /// SQL CASE expression equivalent to [`label_for`] over `age_expr`.
    pub fn case_expr(&self, age_expr: &str) -> String {
        let mut sql = String::from("CASE");
        for rule in self.rules {
            sql.push_str(&format!(
                " WHEN {} THEN '{}'",
                rule.sql_condition(age_expr),
                rule.label()
            ));
        }
        sql.push_str(&format!(" ELSE '{}' END", self.fallback));
        sql
    }

    /// Display order of the bands; the fallback label sorts last.
    pub fn ordered_labels(&self) -> Vec<&'static str> {
        let mut labels: Vec<&'static str> = self.rules.iter().map(BandRule::label).collect();
        labels.push(self.fallback);
        labels
    }

    /// Rank of a label within the fixed display order; labels outside the
    /// family group after every known band.
    pub fn rank(&self, label: &str) -> usize {
        self.ordered_labels()
            .iter()
            .position(|known| *known == label)
            .unwrap_or(self.rules.len() + 1)
    }
}

/// Five-year bands for the adolescent-focused registration report.
pub static ADOLESCENT: BandFamily = BandFamily {
    rules: &[
        BandRule::Below(5, "Under 5"),
        BandRule::Between(5, 9, "5-9"),
        BandRule::Between(10, 14, "10-14"),
        BandRule::Between(15, 19, "15-19"),
        BandRule::Between(20, 24, "20-24"),
    ],
    fallback: "Other",
};

/// Broad clinical bands for the revenue-by-age report. Age exactly 5 is not
/// covered by any rule and classifies as Unknown; that gap is part of the
/// report's established semantics and is kept as-is.
pub static CLINICAL: BandFamily = BandFamily {
    rules: &[
        BandRule::Below(5, "Under 5"),
        BandRule::Between(6, 17, "6-17"),
        BandRule::Between(18, 35, "18-35"),
        BandRule::Between(36, 50, "36-50"),
        BandRule::Above(50, "Above 50"),
    ],
    fallback: "Unknown",
};

/// Coarse categories for the returning-patient distribution.
pub static RETURNING: BandFamily = BandFamily {
    rules: &[
        BandRule::Below(5, "under_five"),
        BandRule::Between(5, 12, "under_thirteen"),
    ],
    fallback: "adult",
};
