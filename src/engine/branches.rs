use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::branch::{Branch, GeoPoint, NewBranch};

/// Maps a free-text address onto one of the known branches.
///
/// `branches` is given in creation order. Implementations must not fail: an
/// address that matches nothing still gets a branch when any exist.
pub trait AddressResolver: Send + Sync {
    fn resolve(&self, address: &str, branches: &[Branch]) -> Option<Uuid>;
}

/// Case-insensitive substring matching, branch names before area keywords,
/// first match wins.
#[derive(Debug, Default)]
pub struct KeywordResolver;

impl AddressResolver for KeywordResolver {
    fn resolve(&self, address: &str, branches: &[Branch]) -> Option<Uuid> {
        let address = address.to_lowercase();

        let by_name = branches
            .iter()
            .find(|branch| contains_keyword(&address, &branch.branch_name));

        let by_area = || {
            branches.iter().find(|branch| {
                branch
                    .assigned_areas
                    .iter()
                    .any(|area| contains_keyword(&address, area))
            })
        };

        by_name
            .or_else(by_area)
            .or_else(|| branches.first())
            .map(|branch| branch.id)
    }
}

fn contains_keyword(address: &str, keyword: &str) -> bool {
    let keyword = keyword.trim();
    !keyword.is_empty() && address.contains(&keyword.to_lowercase())
}

pub struct BranchDirectory {
    branches: RwLock<Vec<Branch>>,
    resolver: Box<dyn AddressResolver>,
}

impl BranchDirectory {
    pub fn new(resolver: Box<dyn AddressResolver>) -> Self {
        Self {
            branches: RwLock::new(Vec::new()),
            resolver,
        }
    }

    pub fn add(&self, new_branch: NewBranch) -> Result<Branch, AppError> {
        let branch_name = new_branch.branch_name.trim().to_string();
        if branch_name.is_empty() {
            return Err(AppError::Validation("branchName cannot be empty".to_string()));
        }

        let branch = Branch {
            id: Uuid::new_v4(),
            branch_name,
            coordinates: new_branch.coordinates,
            assigned_areas: new_branch
                .assigned_areas
                .into_iter()
                .map(|area| area.trim().to_string())
                .filter(|area| !area.is_empty())
                .collect(),
            created_at: Utc::now(),
        };

        self.branches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(branch.clone());

        info!(branch_id = %branch.id, branch = %branch.branch_name, "branch added");
        Ok(branch)
    }

    pub fn list(&self) -> Vec<Branch> {
        self.branches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, id: Uuid) -> Option<Branch> {
        self.branches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|branch| branch.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.branches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn resolve(&self, address: &str) -> Option<Uuid> {
        let branches = self.branches.read().unwrap_or_else(PoisonError::into_inner);
        self.resolver.resolve(address, &branches)
    }

    /// Adds the default branch network when the directory is empty.
    pub fn seed_defaults(&self) -> Result<usize, AppError> {
        if !self.is_empty() {
            info!(branches = self.len(), "branches already exist, skipping seed");
            return Ok(0);
        }

        let defaults = default_branches();
        let count = defaults.len();
        for branch in defaults {
            self.add(branch)?;
        }

        info!(branches = count, "seeded default branches");
        Ok(count)
    }
}

impl Default for BranchDirectory {
    fn default() -> Self {
        Self::new(Box::new(KeywordResolver))
    }
}

pub fn default_branches() -> Vec<NewBranch> {
    let branch = |name: &str, lat: f64, lng: f64, areas: &[&str]| NewBranch {
        branch_name: name.to_string(),
        coordinates: GeoPoint { lat, lng },
        assigned_areas: areas.iter().map(|area| area.to_string()).collect(),
    };

    vec![
        branch("Main Office", 6.9271, 79.8612, &["Colombo 1", "Colombo 2", "Fort", "Pettah"]),
        branch("Kandy Branch", 7.2906, 80.6337, &["Kandy", "Peradeniya", "Katugastota"]),
        branch("Galle Branch", 6.0535, 80.2210, &["Galle", "Hikkaduwa", "Unawatuna"]),
    ]
}
