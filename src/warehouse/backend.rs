//! Real warehouse access over the HTTP SQL API.
//!
//! # Protocol
//! ```text
//! POST   {endpoint}/api/v2/sessions     credentials        → { "token": "..." }
//! POST   {endpoint}/api/v2/statements   bearer + statement → { resultSetMetaData, data }
//! DELETE {endpoint}/api/v2/sessions     bearer             → session closed
//! ```
//!
//! Every cell in `data` arrives as a string or null. `LEAVE_BALANCE` is a
//! VARIANT column and arrives as a JSON object encoded in a string.
//! Statements always carry positional bindings; values are never spliced
//! into SQL text.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::Arc;
use url::Url;

use crate::config::ConnectionParams;
use crate::warehouse::error::{WarehouseError, WarehouseResult};
use crate::warehouse::types::{EmployeeFilter, EmployeeRecord};

const EMPLOYEE_COLUMNS: &str =
    "employee_id, name, country, department, join_date, tenure_months, leave_balance";

/// Opens sessions against a warehouse.
#[async_trait]
pub trait WarehouseConnector: Debug + Send + Sync {
    async fn connect(&self) -> WarehouseResult<Arc<dyn WarehouseConnection>>;
}

/// An open warehouse session.
#[async_trait]
pub trait WarehouseConnection: Debug + Send + Sync {
    async fn fetch_employee(&self, employee_id: &str) -> WarehouseResult<Option<EmployeeRecord>>;

    async fn query_employees(&self, filter: &EmployeeFilter) -> WarehouseResult<Vec<EmployeeRecord>>;

    /// Trivial round trip used by health checks.
    async fn ping(&self) -> WarehouseResult<()>;

    async fn close(&self) -> WarehouseResult<()>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    account: &'a str,
    user: &'a str,
    password: &'a str,
    database: &'a str,
    schema: &'a str,
    warehouse: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Serialize)]
struct Binding {
    #[serde(rename = "type")]
    kind: &'static str,
    value: String,
}

#[derive(Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    bindings: BTreeMap<String, Binding>,
    database: &'a str,
    schema: &'a str,
    warehouse: &'a str,
    timeout: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    result_set_meta_data: ResultSetMetaData,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    row_type: Vec<ColumnType>,
}

#[derive(Debug, Deserialize)]
struct ColumnType {
    name: String,
}

/// Connector for the HTTP SQL API.
#[derive(Clone)]
pub struct SqlApiConnector {
    params: Arc<ConnectionParams>,
    http: reqwest::Client,
}

impl SqlApiConnector {
    pub fn new(params: ConnectionParams) -> WarehouseResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(params.request_timeout)
            .build()
            .map_err(|e| WarehouseError::Connect(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            params: Arc::new(params),
            http,
        })
    }

    fn url(&self, path: &str) -> WarehouseResult<Url> {
        self.params
            .endpoint
            .join(path)
            .map_err(|e| WarehouseError::Connect(format!("invalid endpoint path '{}': {}", path, e)))
    }
}

impl Debug for SqlApiConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlApiConnector")
            .field("endpoint", &self.params.endpoint.as_str())
            .field("account", &self.params.account)
            .finish()
    }
}

#[async_trait]
impl WarehouseConnector for SqlApiConnector {
    async fn connect(&self) -> WarehouseResult<Arc<dyn WarehouseConnection>> {
        let p = &self.params;
        tracing::info!(endpoint = %p.endpoint, account = %p.account, "Opening warehouse session");

        let response = self
            .http
            .post(self.url("api/v2/sessions")?)
            .json(&LoginRequest {
                account: &p.account,
                user: &p.user,
                password: &p.password,
                database: &p.database,
                schema: &p.schema,
                warehouse: &p.warehouse,
            })
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| WarehouseError::Decode(format!("login response: {}", e)))?;

        Ok(Arc::new(SqlApiConnection {
            connector: self.clone(),
            token: login.token,
        }))
    }
}

/// Session on the HTTP SQL API.
pub struct SqlApiConnection {
    connector: SqlApiConnector,
    token: String,
}

impl Debug for SqlApiConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlApiConnection")
            .field("connector", &self.connector)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl SqlApiConnection {
    async fn execute(&self, statement: &str, values: &[&str]) -> WarehouseResult<Vec<Row>> {
        let p = &self.connector.params;
        let bindings = values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                (
                    (i + 1).to_string(),
                    Binding {
                        kind: "TEXT",
                        value: value.to_string(),
                    },
                )
            })
            .collect();

        let response = self
            .connector
            .http
            .post(self.connector.url("api/v2/statements")?)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .json(&StatementRequest {
                statement,
                bindings,
                database: &p.database,
                schema: &p.schema,
                warehouse: &p.warehouse,
                timeout: p.request_timeout.as_secs(),
            })
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let body: StatementResponse = response
            .json()
            .await
            .map_err(|e| WarehouseError::Decode(format!("statement response: {}", e)))?;

        let columns: HashMap<String, usize> = body
            .result_set_meta_data
            .row_type
            .iter()
            .enumerate()
            .map(|(i, col)| (col.name.to_ascii_uppercase(), i))
            .collect();
        let columns = Arc::new(columns);

        Ok(body
            .data
            .into_iter()
            .map(|cells| Row {
                columns: columns.clone(),
                cells,
            })
            .collect())
    }
}

#[async_trait]
impl WarehouseConnection for SqlApiConnection {
    async fn fetch_employee(&self, employee_id: &str) -> WarehouseResult<Option<EmployeeRecord>> {
        tracing::debug!(employee_id = %employee_id, "Querying employee from warehouse");
        let statement = format!(
            "SELECT {} FROM employees WHERE employee_id = ? LIMIT 1",
            EMPLOYEE_COLUMNS
        );
        let rows = self.execute(&statement, &[employee_id]).await?;

        match rows.first() {
            Some(row) => Ok(Some(row.to_employee()?)),
            None => {
                tracing::debug!(employee_id = %employee_id, "Employee not found in warehouse");
                Ok(None)
            }
        }
    }

    async fn query_employees(&self, filter: &EmployeeFilter) -> WarehouseResult<Vec<EmployeeRecord>> {
        let mut predicates = Vec::new();
        let mut values = Vec::new();
        if let Some(country) = filter.country.as_deref() {
            predicates.push("country = ?");
            values.push(country);
        }
        if let Some(department) = filter.department.as_deref() {
            predicates.push("department = ?");
            values.push(department);
        }

        let mut statement = format!("SELECT {} FROM employees", EMPLOYEE_COLUMNS);
        if !predicates.is_empty() {
            statement.push_str(" WHERE ");
            statement.push_str(&predicates.join(" AND "));
        }
        statement.push_str(" ORDER BY employee_id");

        let rows = self.execute(&statement, &values).await?;
        rows.iter().map(Row::to_employee).collect()
    }

    async fn ping(&self) -> WarehouseResult<()> {
        self.execute("SELECT 1", &[]).await.map(|_| ())
    }

    async fn close(&self) -> WarehouseResult<()> {
        let response = self
            .connector
            .http
            .delete(self.connector.url("api/v2/sessions")?)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;
        ensure_success(response).await?;
        tracing::info!("Warehouse session closed");
        Ok(())
    }
}

async fn ensure_success(response: reqwest::Response) -> WarehouseResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(WarehouseError::Status {
        status: status.as_u16(),
        body,
    })
}

/// One result row with by-name column access.
struct Row {
    columns: Arc<HashMap<String, usize>>,
    cells: Vec<Option<String>>,
}

impl Row {
    fn get(&self, column: &str) -> Option<&str> {
        let idx = *self.columns.get(column)?;
        self.cells.get(idx)?.as_deref()
    }

    fn required(&self, column: &str) -> WarehouseResult<String> {
        self.get(column)
            .map(str::to_string)
            .ok_or_else(|| WarehouseError::Decode(format!("missing column {}", column)))
    }

    fn to_employee(&self) -> WarehouseResult<EmployeeRecord> {
        let tenure = self.required("TENURE_MONTHS")?;
        let tenure_months = tenure
            .trim()
            .parse::<u32>()
            .map_err(|e| WarehouseError::Decode(format!("TENURE_MONTHS '{}': {}", tenure, e)))?;

        let leave_balance = match self.get("LEAVE_BALANCE") {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str::<BTreeMap<String, u32>>(raw)
                .map_err(|e| WarehouseError::Decode(format!("LEAVE_BALANCE: {}", e)))?,
            _ => BTreeMap::new(),
        };

        Ok(EmployeeRecord {
            employee_id: self.required("EMPLOYEE_ID")?,
            name: self.required("NAME")?,
            country: self.required("COUNTRY")?,
            department: self.required("DEPARTMENT")?,
            join_date: self.required("JOIN_DATE")?,
            tenure_months,
            leave_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[Option<&str>]) -> Row {
        let names = [
            "EMPLOYEE_ID",
            "NAME",
            "COUNTRY",
            "DEPARTMENT",
            "JOIN_DATE",
            "TENURE_MONTHS",
            "LEAVE_BALANCE",
        ];
        Row {
            columns: Arc::new(names.iter().enumerate().map(|(i, n)| (n.to_string(), i)).collect()),
            cells: cells.iter().map(|c| c.map(str::to_string)).collect(),
        }
    }

    #[test]
    fn test_row_decodes_variant_balance() {
        let r = row(&[
            Some("EMP010"),
            Some("Sam Lee"),
            Some("US"),
            Some("Finance"),
            Some("2021-03-01"),
            Some("36"),
            Some(r#"{"PTO": 7, "Sick Leave": 4}"#),
        ]);
        let emp = r.to_employee().unwrap();
        assert_eq!(emp.employee_id, "EMP010");
        assert_eq!(emp.tenure_months, 36);
        assert_eq!(emp.leave_balance["PTO"], 7);
    }

    #[test]
    fn test_null_balance_is_empty() {
        let r = row(&[
            Some("EMP011"),
            Some("Kim"),
            Some("UK"),
            Some("Ops"),
            Some("2020-01-01"),
            Some("50"),
            None,
        ]);
        assert!(r.to_employee().unwrap().leave_balance.is_empty());
    }

    #[test]
    fn test_bad_tenure_is_decode_error() {
        let r = row(&[
            Some("EMP012"),
            Some("Lee"),
            Some("UK"),
            Some("Ops"),
            Some("2020-01-01"),
            Some("many"),
            None,
        ]);
        assert!(matches!(r.to_employee(), Err(WarehouseError::Decode(_))));
    }

    #[test]
    fn test_statement_response_shape() {
        let body = r#"{
            "resultSetMetaData": {"rowType": [{"name": "employee_id"}, {"name": "NAME"}]},
            "data": [["EMP001", null]]
        }"#;
        let parsed: StatementResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.result_set_meta_data.row_type.len(), 2);
        assert_eq!(parsed.data[0][1], None);
    }
}
