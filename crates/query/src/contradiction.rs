//! Static check for numeric conditions that no row could satisfy together.
//!
//! Only conditions that every result row must meet are considered: those
//! after the last OR of the chain, joined by AND. `between` counts as a
//! `>=` and `<=` pair.

use crate::condition::{Condition, Logic, Operator};
use crate::evaluate::split_range;
use sheetquery_sheet::parse_number;
use std::fmt;

/// An unsatisfiable set of conditions on one column
#[derive(Debug, Clone, PartialEq)]
pub struct Contradiction {
    /// Column as written in the conditions (`sheet.column` when qualified)
    pub column: String,
    pub reason: String,
}

impl fmt::Display for Contradiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "contradictory conditions on column '{}': {}",
            self.column, self.reason
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Bound {
    value: f64,
    inclusive: bool,
}

#[derive(Debug, Default)]
struct ColumnConstraints {
    lower: Option<Bound>,
    upper: Option<Bound>,
    equals: Vec<f64>,
    not_equals: Vec<f64>,
    count: usize,
}

impl ColumnConstraints {
    fn raise_lower(&mut self, value: f64, inclusive: bool) {
        self.lower = Some(match self.lower {
            Some(b) if b.value > value || (b.value == value && !b.inclusive) => b,
            _ => Bound { value, inclusive },
        });
    }

    fn lower_upper(&mut self, value: f64, inclusive: bool) {
        self.upper = Some(match self.upper {
            Some(b) if b.value < value || (b.value == value && !b.inclusive) => b,
            _ => Bound { value, inclusive },
        });
    }

    fn add(&mut self, operator: Operator, column: &str, value: &str) -> bool {
        let number = || parse_number(value);
        match operator {
            Operator::Greater => number().map(|v| self.raise_lower(v, false)).is_some(),
            Operator::GreaterOrEqual => number().map(|v| self.raise_lower(v, true)).is_some(),
            Operator::Less => number().map(|v| self.lower_upper(v, false)).is_some(),
            Operator::LessOrEqual => number().map(|v| self.lower_upper(v, true)).is_some(),
            Operator::Equals => number().map(|v| self.equals.push(v)).is_some(),
            Operator::NotEquals => number().map(|v| self.not_equals.push(v)).is_some(),
            Operator::Between => match split_range(column, value) {
                Ok((min, max)) => match (parse_number(min), parse_number(max)) {
                    (Some(lo), Some(hi)) => {
                        self.raise_lower(lo, true);
                        self.lower_upper(hi, true);
                        true
                    }
                    _ => false,
                },
                Err(_) => false,
            },
            _ => false,
        }
    }

    fn admits(&self, v: f64) -> bool {
        let above = self
            .lower
            .map_or(true, |b| v > b.value || (b.inclusive && v == b.value));
        let below = self
            .upper
            .map_or(true, |b| v < b.value || (b.inclusive && v == b.value));
        above && below
    }

    fn check(&self) -> Option<String> {
        if let (Some(lo), Some(hi)) = (self.lower, self.upper) {
            if lo.value > hi.value || (lo.value == hi.value && !(lo.inclusive && hi.inclusive)) {
                return Some(format!(
                    "lower bound {} {} exceeds upper bound {} {}",
                    if lo.inclusive { ">=" } else { ">" },
                    lo.value,
                    if hi.inclusive { "<=" } else { "<" },
                    hi.value
                ));
            }
            if lo.value == hi.value && self.not_equals.contains(&lo.value) {
                return Some(format!(
                    "the only value allowed by the bounds, {}, is excluded",
                    lo.value
                ));
            }
        }

        if let Some((first, rest)) = self.equals.split_first() {
            if let Some(other) = rest.iter().find(|v| **v != *first) {
                return Some(format!("it cannot equal both {first} and {other}"));
            }
            if !self.admits(*first) {
                return Some(format!("equals {first} lies outside the allowed range"));
            }
            if self.not_equals.contains(first) {
                return Some(format!("it cannot both equal and not equal {first}"));
            }
        }

        None
    }
}

/// Conditions every result row must satisfy, in order
fn necessary_conditions<'a>(conditions: &[&'a Condition]) -> Vec<&'a Condition> {
    let start = conditions
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, c)| c.logic_or_default() == Logic::Or)
        .map(|(i, _)| i + 1)
        .last()
        .unwrap_or(0);

    conditions
        .iter()
        .enumerate()
        .skip(start)
        .filter(|(i, c)| *i == 0 || c.logic_or_default() == Logic::And)
        .map(|(_, c)| *c)
        .collect()
}

/// Necessary conditions sharing one column and sheet qualifier
struct Group<'a> {
    sheet: Option<&'a str>,
    column: &'a str,
    display: String,
    conditions: Vec<&'a Condition>,
}

fn constrain<'a>(conditions: impl IntoIterator<Item = &'a Condition>) -> Option<String> {
    let mut constraints = ColumnConstraints::default();
    for condition in conditions {
        if constraints.add(condition.operator, &condition.column, &condition.value) {
            constraints.count += 1;
        }
    }
    if constraints.count < 2 {
        return None;
    }
    constraints.check()
}

/// Unqualified conditions on `column`
fn shared_conditions<'g, 'a>(groups: &'g [Group<'a>], column: &str) -> &'g [&'a Condition] {
    groups
        .iter()
        .find(|g| g.sheet.is_none() && g.column == column)
        .map(|g| g.conditions.as_slice())
        .unwrap_or_default()
}

/// Find contradictions among active conditions, grouped by column and
/// sheet qualifier. Unqualified conditions also bind every qualified group
/// on the same column. Runs without looking at any rows.
pub fn find_contradictions(conditions: &[&Condition]) -> Vec<Contradiction> {
    let mut groups: Vec<Group<'_>> = Vec::new();
    for condition in necessary_conditions(conditions) {
        let sheet = condition.applies_to.as_deref();
        let column = condition.column.as_str();
        match groups
            .iter_mut()
            .find(|g| g.sheet == sheet && g.column == column)
        {
            Some(group) => group.conditions.push(condition),
            None => groups.push(Group {
                sheet,
                column,
                display: condition.qualified_column(),
                conditions: vec![condition],
            }),
        }
    }

    groups
        .iter()
        .filter_map(|group| {
            let shared: &[&Condition] = if group.sheet.is_some() {
                shared_conditions(&groups, group.column)
            } else {
                &[]
            };
            // reported once, under the unqualified column
            if !shared.is_empty() && constrain(shared.iter().copied()).is_some() {
                return None;
            }
            constrain(shared.iter().chain(&group.conditions).copied()).map(|reason| {
                Contradiction {
                    column: group.display.clone(),
                    reason,
                }
            })
        })
        .collect()
}
