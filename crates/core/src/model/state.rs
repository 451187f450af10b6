use std::collections::{BTreeMap, BTreeSet, HashSet};

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::bank::QuestionBank;
use crate::model::ids::QuestionId;
use crate::shuffle::{fisher_yates, is_index_permutation, shuffled_indices};

/// All mutable progress for one quiz attempt.
///
/// Persisted as one flat JSON object. Every field may be missing or `null` in
/// older blobs and falls back to its default when read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    #[serde(
        rename = "currentQuestionIndex",
        deserialize_with = "null_as_default"
    )]
    pub(crate) current_index: usize,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) answers: BTreeMap<QuestionId, String>,
    #[serde(with = "confirmed_flags")]
    pub(crate) confirmed_answers: BTreeSet<QuestionId>,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) show_results: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) review_mode: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) is_randomized: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) order: Vec<QuestionId>,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) option_order: BTreeMap<QuestionId, Vec<usize>>,
}

impl SessionState {
    /// Fresh state in bank order, randomization off.
    #[must_use]
    pub fn canonical(bank: &QuestionBank) -> Self {
        Self {
            order: bank.ids(),
            ..Self::default()
        }
    }

    /// Fresh state with a shuffled question order and per-question option order.
    pub fn randomized<R>(bank: &QuestionBank, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let (order, option_order) = shuffled_layout(bank, rng);
        Self {
            order,
            option_order,
            is_randomized: true,
            ..Self::default()
        }
    }

    /// Parse a persisted blob without checking it against a bank.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the blob is not a JSON object of the expected shape.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Serialize to the flat persisted form.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Bring a restored state back in line with `bank`.
    ///
    /// Drops entries for unknown questions, replaces an `order` that is not a
    /// permutation of the bank, drops malformed option orders and clamps the
    /// current index. Returns true if anything had to change.
    pub fn reconcile<R>(&mut self, bank: &QuestionBank, rng: &mut R) -> bool
    where
        R: Rng + ?Sized,
    {
        let before = self.clone();

        self.answers.retain(|id, _| bank.contains(*id));
        self.confirmed_answers.retain(|id| bank.contains(*id));

        if !is_permutation_of_bank(&self.order, bank) {
            if self.is_randomized {
                let mut order = bank.ids();
                fisher_yates(&mut order, rng);
                self.order = order;
            } else {
                self.order = bank.ids();
            }
        }

        if self.is_randomized {
            self.option_order.retain(|id, perm| {
                bank.get(*id)
                    .is_some_and(|q| is_index_permutation(perm, q.options().len()))
            });
        } else {
            self.option_order.clear();
        }

        self.current_index = self.current_index.min(self.order.len().saturating_sub(1));

        *self != before
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<QuestionId, String> {
        &self.answers
    }

    #[must_use]
    pub fn confirmed_answers(&self) -> &BTreeSet<QuestionId> {
        &self.confirmed_answers
    }

    #[must_use]
    pub fn show_results(&self) -> bool {
        self.show_results
    }

    #[must_use]
    pub fn review_mode(&self) -> bool {
        self.review_mode
    }

    #[must_use]
    pub fn is_randomized(&self) -> bool {
        self.is_randomized
    }

    #[must_use]
    pub fn order(&self) -> &[QuestionId] {
        &self.order
    }

    #[must_use]
    pub fn option_order(&self) -> &BTreeMap<QuestionId, Vec<usize>> {
        &self.option_order
    }
}

/// A shuffled question order plus an independent option shuffle per question.
pub(crate) fn shuffled_layout<R>(
    bank: &QuestionBank,
    rng: &mut R,
) -> (Vec<QuestionId>, BTreeMap<QuestionId, Vec<usize>>)
where
    R: Rng + ?Sized,
{
    let mut order = bank.ids();
    fisher_yates(&mut order, rng);
    let option_order = bank
        .questions()
        .iter()
        .map(|q| (q.id(), shuffled_indices(q.options().len(), rng)))
        .collect();
    (order, option_order)
}

pub(crate) fn is_permutation_of_bank(order: &[QuestionId], bank: &QuestionBank) -> bool {
    if order.len() != bank.len() {
        return false;
    }
    let mut seen = HashSet::with_capacity(order.len());
    order
        .iter()
        .all(|id| bank.contains(*id) && seen.insert(*id))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Confirmations are stored as `{"<id>": true}` rather than a list.
mod confirmed_flags {
    use std::collections::{BTreeMap, BTreeSet};

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::model::ids::QuestionId;

    pub fn serialize<S>(set: &BTreeSet<QuestionId>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let flags: BTreeMap<QuestionId, bool> = set.iter().map(|id| (*id, true)).collect();
        flags.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeSet<QuestionId>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let flags = Option::<BTreeMap<QuestionId, bool>>::deserialize(deserializer)?;
        Ok(flags
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(id, confirmed)| confirmed.then_some(id))
            .collect())
    }
}
