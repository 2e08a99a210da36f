//! Left join of expense rows with legislator profiles.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::camara::{ExpenseRecord, LegislatorProfile, LEGISLATOR_ID_COLUMN};

/// Column names of the joined profile fields.
pub const PROFILE_COLUMNS: [&str; 3] = ["nome", "partido", "estado"];

/// Suffix appended to a profile column whose name is already used by an
/// expense field.
const ALIAS_SUFFIX: &str = "_deputado";

/// Output names of the profile columns, fixed for a whole dataset.
///
/// A profile column whose name is used by any expense field of the dataset
/// is renamed `<column>_deputado`, then `<column>_deputado_2`, `_3`, ...
/// until the name is free. Every row uses the same names, so a CSV column
/// never mixes expense and profile values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileColumns {
    names: [String; 3],
}

impl Default for ProfileColumns {
    fn default() -> Self {
        Self {
            names: PROFILE_COLUMNS.map(String::from),
        }
    }
}

impl ProfileColumns {
    /// Names that collide with no expense field of `records`.
    #[must_use]
    pub fn for_records<'a>(records: impl IntoIterator<Item = &'a EnrichedExpenseRecord>) -> Self {
        let taken: HashSet<&str> = records
            .into_iter()
            .flat_map(|record| record.expense.fields.keys().map(String::as_str))
            .collect();

        let names = PROFILE_COLUMNS.map(|column| {
            if !taken.contains(column) {
                return column.to_string();
            }
            let mut candidate = format!("{column}{ALIAS_SUFFIX}");
            let mut n = 2;
            while taken.contains(candidate.as_str()) {
                candidate = format!("{column}{ALIAS_SUFFIX}_{n}");
                n += 1;
            }
            candidate
        });

        Self { names }
    }

    /// `nome`, `partido` and `estado`, aliased where needed.
    #[must_use]
    pub const fn names(&self) -> &[String; 3] {
        &self.names
    }
}

/// An expense row together with the profile of its legislator, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedExpenseRecord {
    pub expense: ExpenseRecord,
    pub profile: Option<LegislatorProfile>,
}

impl EnrichedExpenseRecord {
    /// Flattened `(column, value)` pairs in export order: the API fields,
    /// then `idDeputado`, then the profile columns named by `profile_columns`.
    ///
    /// Profile columns are null when there is no profile.
    #[must_use]
    pub fn columns(&self, profile_columns: &ProfileColumns) -> Vec<(String, Value)> {
        let mut columns: Vec<(String, Value)> = self
            .expense
            .fields
            .iter()
            .filter(|(name, _)| name.as_str() != LEGISLATOR_ID_COLUMN)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        columns.push((
            LEGISLATOR_ID_COLUMN.to_string(),
            Value::from(self.expense.legislator_id),
        ));

        let profile_values = self.profile.as_ref().map_or(
            [Value::Null, Value::Null, Value::Null],
            |profile| {
                [
                    Value::from(profile.name.as_str()),
                    Value::from(profile.party.as_str()),
                    Value::from(profile.state.as_str()),
                ]
            },
        );

        for (name, value) in profile_columns.names().iter().zip(profile_values) {
            columns.push((name.clone(), value));
        }

        columns
    }
}

/// Left join `expenses` with `profiles` on `legislator_id == profile.id`.
///
/// Every expense appears in the output, in input order; unmatched ones carry
/// no profile. Profiles sharing an id are not deduplicated and each yields its
/// own row.
#[must_use]
pub fn join(
    expenses: Vec<ExpenseRecord>,
    profiles: &[LegislatorProfile],
) -> Vec<EnrichedExpenseRecord> {
    let mut by_id: HashMap<i64, Vec<&LegislatorProfile>> = HashMap::new();
    for profile in profiles {
        by_id.entry(profile.id).or_default().push(profile);
    }

    let mut enriched = Vec::with_capacity(expenses.len());
    for expense in expenses {
        match by_id.get(&expense.legislator_id) {
            Some(matches) => {
                for profile in matches {
                    enriched.push(EnrichedExpenseRecord {
                        expense: expense.clone(),
                        profile: Some((*profile).clone()),
                    });
                }
            }
            None => enriched.push(EnrichedExpenseRecord {
                expense,
                profile: None,
            }),
        }
    }
    enriched
}
