//! Employee record types shared by the mock table and the warehouse backend.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One employee row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub employee_id: String,
    pub name: String,
    pub country: String,
    pub department: String,
    /// ISO-8601 date (YYYY-MM-DD).
    pub join_date: String,
    pub tenure_months: u32,
    /// Remaining days per leave type.
    pub leave_balance: BTreeMap<String, u32>,
}

/// Predicate for list queries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeFilter {
    pub country: Option<String>,
    pub department: Option<String>,
}

impl EmployeeFilter {
    pub fn by_country(country: impl Into<String>) -> Self {
        Self {
            country: Some(country.into()),
            department: None,
        }
    }

    pub fn matches(&self, record: &EmployeeRecord) -> bool {
        let country_ok = self.country.as_deref().map_or(true, |c| c == record.country);
        let department_ok = self
            .department
            .as_deref()
            .map_or(true, |d| d == record.department);
        country_ok && department_ok
    }

    pub fn is_empty(&self) -> bool {
        self.country.is_none() && self.department.is_none()
    }
}
