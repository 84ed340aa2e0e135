use chrono::{DateTime, Utc};

/// The region flavor a [`Response`] was served from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ResponseType {
    #[default]
    Sequential,
    Random,
    List,
}

impl ResponseType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Random => "random",
            Self::List => "list",
        }
    }
}

/// How the numbers of a [`Response`] are meant to be rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Encoding {
    #[cfg_attr(feature = "serde", serde(rename = "base-36"))]
    Base36,
    #[cfg_attr(feature = "serde", serde(rename = "hex"))]
    Hex,
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "decimal"))]
    Decimal,
}

impl Encoding {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Base36 => "base-36",
            Self::Hex => "hex",
            Self::Decimal => "decimal",
        }
    }
}

/// The record of one allocation outcome.
///
/// `pool` and `region` are machine-name snapshots rather than live
/// references, so the history survives later edits of either. A response is
/// immutable once stored, except for the task completion update that fills
/// in [`Response::task_name`] and [`Response::response`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Response {
    /// Assigned by the store on insert.
    #[cfg_attr(feature = "serde", serde(default))]
    pub id: Option<u64>,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: ResponseType,
    pub encoding: Encoding,
    pub pool: String,
    pub region: String,
    pub size_granted: u64,
    pub fulfilled: bool,
    pub remote_host: Option<String>,
    pub task_name: Option<String>,
    /// The serialized payload: the rendered number list, or the output of a
    /// downstream response rule.
    pub response: Option<String>,
    /// First and last number of the granted block, or a single number for a
    /// block of one.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "numbers", default, skip_serializing_if = "Option::is_none")
    )]
    pub number_list: Option<Vec<u64>>,
    pub created_date: DateTime<Utc>,
}

impl Response {
    /// A provisional response: the whole `size` granted and fulfilled.
    pub fn draft(
        kind: ResponseType,
        pool: impl Into<String>,
        region: impl Into<String>,
        size: u64,
        remote_host: Option<String>,
    ) -> Self {
        Self {
            id: None,
            kind,
            encoding: Encoding::default(),
            pool: pool.into(),
            region: region.into(),
            size_granted: size,
            fulfilled: true,
            remote_host,
            task_name: None,
            response: None,
            number_list: None,
            created_date: Utc::now(),
        }
    }

    /// Attaches the issued numbers and renders them into
    /// [`Response::response`].
    pub fn set_number_list(&mut self, numbers: Vec<u64>) {
        self.response = Some(render_numbers(&numbers));
        self.number_list = Some(numbers);
    }

    /// The issued numbers, empty if none were attached.
    pub fn numbers(&self) -> &[u64] {
        self.number_list.as_deref().unwrap_or_default()
    }

    /// Every number of the granted block, in issue order.
    ///
    /// A sequential response only carries the bounds of its block, so the
    /// block is expanded from them. Other flavors carry every number.
    pub fn expand(&self) -> Vec<u64> {
        self.expanded().collect()
    }

    /// Lazy form of [`Response::expand`].
    pub fn expanded(&self) -> impl Iterator<Item = u64> + '_ {
        let (block, listed) = match (self.kind, self.numbers()) {
            (ResponseType::Sequential, &[first, last]) => (Some(first..=last), &[][..]),
            (_, numbers) => (None, numbers),
        };
        block.into_iter().flatten().chain(listed.iter().copied())
    }
}

/// Renders a number list as `[1, 100]`.
pub fn render_numbers(numbers: &[u64]) -> String {
    let body = numbers
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{body}]")
}
