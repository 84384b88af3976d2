//! Static employee dataset used in mock mode and as the degraded fallback.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use crate::warehouse::types::{EmployeeFilter, EmployeeRecord};

fn table() -> &'static HashMap<&'static str, EmployeeRecord> {
    static TABLE: OnceLock<HashMap<&'static str, EmployeeRecord>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let rows = [
            (
                "EMP001",
                "John Doe",
                "US",
                "Engineering",
                "2023-01-15",
                14,
                &[("PTO", 15), ("Sick Leave", 10), ("Parental Leave", 0)][..],
            ),
            (
                "EMP002",
                "Jane Smith",
                "India",
                "Marketing",
                "2022-06-01",
                20,
                &[
                    ("Privilege Leave", 12),
                    ("Casual Leave", 8),
                    ("Sick Leave", 12),
                    ("Optional Holidays", 3),
                ][..],
            ),
            (
                "EMP003",
                "Alice Johnson",
                "UK",
                "Sales",
                "2024-01-01",
                2,
                &[("Annual Leave", 25), ("Sick Leave", 10)][..],
            ),
        ];

        rows.into_iter()
            .map(|(id, name, country, department, join_date, tenure_months, balance)| {
                let record = EmployeeRecord {
                    employee_id: id.to_string(),
                    name: name.to_string(),
                    country: country.to_string(),
                    department: department.to_string(),
                    join_date: join_date.to_string(),
                    tenure_months,
                    leave_balance: balance
                        .iter()
                        .map(|(leave, days)| (leave.to_string(), *days))
                        .collect::<BTreeMap<_, _>>(),
                };
                (id, record)
            })
            .collect()
    })
}

/// Look up one employee. Returns an owned copy so callers cannot touch the table.
pub fn find(employee_id: &str) -> Option<EmployeeRecord> {
    tracing::debug!(employee_id = %employee_id, "Fetching employee from mock data");
    table().get(employee_id).cloned()
}

/// All employees matching `filter`, ordered by id.
pub fn query(filter: &EmployeeFilter) -> Vec<EmployeeRecord> {
    let mut rows: Vec<EmployeeRecord> = table()
        .values()
        .filter(|record| filter.matches(record))
        .cloned()
        .collect();
    rows.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
    rows
}
