use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(EntityId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Employees,
    Customers,
    Notes,
}

impl Resource {
    pub fn path(self) -> &'static str {
        match self {
            Resource::Employees => "employees",
            Resource::Customers => "customers",
            Resource::Notes => "notes",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// One server entity. Only `id` is interpreted by the core; everything else is
/// carried through untouched in server order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: EntityId,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Record {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.attribute(key).and_then(Value::as_str)
    }

    /// Case-insensitive substring match over string attributes. An empty term
    /// matches everything.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim();
        if term.is_empty() {
            return true;
        }
        let needle = term.to_lowercase();
        self.attributes
            .values()
            .filter_map(Value::as_str)
            .any(|value| value.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_pages: u32,
    pub total_elements: u64,
}

impl<T> Page<T> {
    /// Cuts one page out of an already complete, ordered list.
    pub fn paginate(all: Vec<T>, page: u32, size: u32) -> Self {
        let size = size.max(1) as usize;
        let total_elements = all.len();
        let total_pages = total_elements.div_ceil(size);
        let items = all
            .into_iter()
            .skip(page as usize * size)
            .take(size)
            .collect();
        Self {
            items,
            total_pages: total_pages as u32,
            total_elements: total_elements as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    pub search: String,
}

impl PageRequest {
    pub fn new(page: u32, size: u32, search: impl Into<String>) -> Self {
        Self {
            page,
            size,
            search: search.into(),
        }
    }
}
