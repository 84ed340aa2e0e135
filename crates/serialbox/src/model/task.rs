use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum TaskStatus {
    #[default]
    Running,
    Finished,
    Error,
}

/// A unit of downstream work: the parameters of one allocation handed to a
/// response rule executor.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Task {
    /// Random v4 UUID.
    pub name: String,
    pub rule: String,
    pub status: TaskStatus,
    pub parameters: BTreeMap<String, String>,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
}

impl Task {
    /// Creates a running task with a fresh name.
    pub fn new(rule: impl Into<String>, parameters: BTreeMap<String, String>) -> Self {
        let now = Utc::now();
        Self {
            name: uuid::Uuid::new_v4().to_string(),
            rule: rule.into(),
            status: TaskStatus::Running,
            parameters,
            created_date: now,
            modified_date: now,
        }
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub(crate) fn finish(&mut self, status: TaskStatus) {
        self.status = status;
        self.modified_date = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_get_unique_names() {
        let a = Task::new("expand", BTreeMap::new());
        let b = Task::new("expand", BTreeMap::new());
        assert_ne!(a.name, b.name);
        assert_eq!(a.status, TaskStatus::Running);
        assert!(uuid::Uuid::parse_str(&a.name).is_ok());
    }
}
