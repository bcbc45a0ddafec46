use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// A classification label such as `"poor"`. Compared and hashed by value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// The closed, ordered set of labels one category can produce.
///
/// Model output index `i` maps to the `i`-th label. Labels can additionally be
/// graded: *intact* labels are not damage, *critical* labels need attention.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vocabulary {
    labels: Vec<Label>,
    intact: Vec<Label>,
    critical: Vec<Label>,
}

impl Vocabulary {
    /// Build a vocabulary. Rejects empty lists, blank and duplicate labels.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<Label> = Vec::new();
        for name in labels {
            let name = name.into();
            if name.trim().is_empty() {
                return Err(anyhow!("vocabulary labels must not be blank"));
            }
            let label = Label::new(name);
            if out.contains(&label) {
                return Err(anyhow!("duplicate vocabulary label '{}'", label));
            }
            out.push(label);
        }
        if out.is_empty() {
            return Err(anyhow!("vocabulary must contain at least one label"));
        }
        Ok(Self {
            labels: out,
            intact: Vec::new(),
            critical: Vec::new(),
        })
    }

    /// Grade labels as intact or critical. Both sets must be drawn from the
    /// vocabulary and must not overlap.
    pub fn with_grades<I, C, S, T>(mut self, intact: I, critical: C) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        C: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        let intact = self.graded(intact.into_iter().map(Into::into), "intact")?;
        let critical = self.graded(critical.into_iter().map(Into::into), "critical")?;
        if let Some(both) = intact.iter().find(|label| critical.contains(label)) {
            return Err(anyhow!("label '{}' cannot be both intact and critical", both));
        }
        self.intact = intact;
        self.critical = critical;
        Ok(self)
    }

    fn graded(&self, names: impl Iterator<Item = String>, grade: &str) -> Result<Vec<Label>> {
        let mut out: Vec<Label> = Vec::new();
        for name in names {
            let label = Label::new(name);
            if !self.contains(&label) {
                return Err(anyhow!("{} label '{}' is not in the vocabulary", grade, label));
            }
            if !out.contains(&label) {
                out.push(label);
            }
        }
        Ok(out)
    }

    /// True for labels that do not count as damage.
    pub fn is_intact(&self, label: &Label) -> bool {
        self.intact.contains(label)
    }

    pub fn is_critical(&self, label: &Label) -> bool {
        self.critical.contains(label)
    }

    pub fn label_for_index(&self, index: usize) -> Option<&Label> {
        self.labels.get(index)
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.labels.contains(label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_preserves_order() {
        let vocab = Vocabulary::new(["good", "poor", "satisfactory", "very poor"]).unwrap();
        assert_eq!(vocab.len(), 4);
        assert_eq!(vocab.label_for_index(3), Some(&Label::from("very poor")));
        assert_eq!(vocab.label_for_index(4), None);
        assert!(vocab.contains(&Label::from("poor")));
    }

    #[test]
    fn vocabulary_rejects_bad_input() {
        assert!(Vocabulary::new(Vec::<String>::new()).is_err());
        assert!(Vocabulary::new(["good", "good"]).is_err());
        assert!(Vocabulary::new(["good", "  "]).is_err());
    }

    #[test]
    fn grades_must_come_from_vocabulary() {
        let vocab = Vocabulary::new(["good", "poor", "very poor"]).unwrap();
        let graded = vocab.clone().with_grades(["good"], ["very poor"]).unwrap();
        assert!(graded.is_intact(&Label::from("good")));
        assert!(!graded.is_intact(&Label::from("poor")));
        assert!(graded.is_critical(&Label::from("very poor")));
        assert!(!vocab.is_critical(&Label::from("very poor")));

        assert!(vocab.clone().with_grades(["fine"], Vec::<String>::new()).is_err());
        assert!(vocab.with_grades(["good"], ["good"]).is_err());
    }
}
