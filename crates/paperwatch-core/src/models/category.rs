use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::paper::Paper;

/// The six topical sections of the listing, in display order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Foundational,
    Theory,
    SchrodingerBridge,
    DiscreteData,
    Accelerating,
    #[default]
    Applications,
}

impl Category {
    pub const COUNT: usize = 6;

    pub const ALL: [Category; Self::COUNT] = [
        Category::Foundational,
        Category::Theory,
        Category::SchrodingerBridge,
        Category::DiscreteData,
        Category::Accelerating,
        Category::Applications,
    ];

    /// Heading text used in the rendered listing.
    pub fn label(self) -> &'static str {
        match self {
            Self::Foundational => "Foundational",
            Self::Theory => "Theory",
            Self::SchrodingerBridge => "Schrödinger Bridge",
            Self::DiscreteData => "Discrete Data",
            Self::Accelerating => "Accelerating",
            Self::Applications => "Applications",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Foundational => {
                "Core flow matching methodology, frameworks, and general techniques"
            }
            Self::Theory => {
                "Theoretical analysis, convergence proofs, mathematical foundations, optimal transport theory"
            }
            Self::SchrodingerBridge => {
                "Schrödinger bridge methods, entropy-regularized optimal transport"
            }
            Self::DiscreteData => {
                "Flow matching for discrete data, text, graphs, categorical variables"
            }
            Self::Accelerating => {
                "Faster sampling, distillation, few-step generation, efficiency improvements"
            }
            Self::Applications => {
                "Domain applications: images, video, audio, 3D, molecules, proteins, biology, etc."
            }
        }
    }

    /// Markdown heading anchor (`Schrödinger Bridge` → `schrodinger-bridge`).
    pub fn anchor(self) -> String {
        self.label().to_lowercase().replace(' ', "-").replace('ö', "o")
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(c) = Self::from_label(s) {
            return Ok(c);
        }
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "foundational" => Ok(Self::Foundational),
            "theory" => Ok(Self::Theory),
            "schrodinger_bridge" | "schrödinger_bridge" => Ok(Self::SchrodingerBridge),
            "discrete_data" => Ok(Self::DiscreteData),
            "accelerating" => Ok(Self::Accelerating),
            "applications" => Ok(Self::Applications),
            _ => Err(CoreError::UnknownCategory(s.to_string())),
        }
    }
}

/// Fixed-size mapping from [`Category`] to the papers filed under it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryBuckets {
    buckets: [Vec<Paper>; Category::COUNT],
}

impl CategoryBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files `paper` under `category`, stamping the label onto the paper.
    pub fn push(&mut self, category: Category, paper: Paper) {
        self.buckets[category.index()].push(paper.with_category(category));
    }

    pub fn get(&self, category: Category) -> &[Paper] {
        &self.buckets[category.index()]
    }

    /// Non-empty categories in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[Paper])> {
        Category::ALL
            .into_iter()
            .map(|c| (c, self.get(c)))
            .filter(|(_, papers)| !papers.is_empty())
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts(&self) -> Vec<(Category, usize)> {
        self.iter().map(|(c, papers)| (c, papers.len())).collect()
    }
}
