//! Warehouses: the registered places items can be stocked in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ValueObject};

use crate::spec::normalize_optional;

const MAX_CODE_LEN: usize = 32;

/// Unique warehouse code, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WarehouseCode(String);

impl WarehouseCode {
    pub fn parse(raw: impl AsRef<str>) -> DomainResult<Self> {
        let code = raw.as_ref().trim();
        if code.is_empty() {
            return Err(DomainError::invalid_spec("warehouse code cannot be empty"));
        }
        if code.len() > MAX_CODE_LEN {
            return Err(DomainError::invalid_spec(format!(
                "warehouse code cannot exceed {MAX_CODE_LEN} characters"
            )));
        }
        if code.chars().any(char::is_whitespace) {
            return Err(DomainError::invalid_spec("warehouse code cannot contain whitespace"));
        }
        Ok(Self(code.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for WarehouseCode {}

impl TryFrom<String> for WarehouseCode {
    type Error = DomainError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

impl From<WarehouseCode> for String {
    fn from(code: WarehouseCode) -> Self {
        code.0
    }
}

impl core::fmt::Display for WarehouseCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who to call about a warehouse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseContact {
    pub person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl WarehouseContact {
    fn normalized(self) -> Self {
        Self {
            person: self.person.and_then(normalize_optional),
            email: self.email.and_then(normalize_optional),
            phone: self.phone.and_then(normalize_optional),
        }
    }
}

/// Validated definition of a new warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WarehouseSpecRecord")]
pub struct WarehouseSpec {
    code: WarehouseCode,
    name: String,
    address: String,
    contact: WarehouseContact,
    /// Cubic meters; `None` when unknown.
    total_capacity: Option<u64>,
}

#[derive(Deserialize)]
struct WarehouseSpecRecord {
    code: WarehouseCode,
    name: String,
    address: String,
    #[serde(default)]
    contact: WarehouseContact,
    total_capacity: Option<u64>,
}

impl TryFrom<WarehouseSpecRecord> for WarehouseSpec {
    type Error = DomainError;

    fn try_from(raw: WarehouseSpecRecord) -> Result<Self, Self::Error> {
        let mut spec = Self::new(raw.code.as_str(), raw.name, raw.address)?
            .with_contact(raw.contact);
        if let Some(capacity) = raw.total_capacity {
            spec = spec.with_total_capacity(capacity)?;
        }
        Ok(spec)
    }
}

impl WarehouseSpec {
    pub fn new(
        code: impl AsRef<str>,
        name: impl AsRef<str>,
        address: impl AsRef<str>,
    ) -> DomainResult<Self> {
        Ok(Self {
            code: WarehouseCode::parse(code)?,
            name: required("warehouse name", name.as_ref())?,
            address: required("warehouse address", address.as_ref())?,
            contact: WarehouseContact::default(),
            total_capacity: None,
        })
    }

    pub fn with_contact(mut self, contact: WarehouseContact) -> Self {
        self.contact = contact.normalized();
        self
    }

    pub fn with_total_capacity(mut self, capacity: u64) -> DomainResult<Self> {
        if capacity == 0 {
            return Err(DomainError::invalid_spec("warehouse capacity must be positive"));
        }
        self.total_capacity = Some(capacity);
        Ok(self)
    }

    pub fn code(&self) -> &WarehouseCode {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn contact(&self) -> &WarehouseContact {
        &self.contact
    }

    pub fn total_capacity(&self) -> Option<u64> {
        self.total_capacity
    }
}

/// A registered warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    code: WarehouseCode,
    name: String,
    address: String,
    contact: WarehouseContact,
    total_capacity: Option<u64>,
    used_capacity: u64,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Warehouse {
    pub fn register(spec: WarehouseSpec, at: DateTime<Utc>) -> Self {
        Self {
            code: spec.code,
            name: spec.name,
            address: spec.address,
            contact: spec.contact,
            total_capacity: spec.total_capacity,
            used_capacity: 0,
            active: true,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn code(&self) -> &WarehouseCode {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn contact(&self) -> &WarehouseContact {
        &self.contact
    }

    pub fn total_capacity(&self) -> Option<u64> {
        self.total_capacity
    }

    pub fn used_capacity(&self) -> u64 {
        self.used_capacity
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Remaining capacity, when the total is known.
    pub fn free_capacity(&self) -> Option<u64> {
        self.total_capacity
            .map(|total| total.saturating_sub(self.used_capacity))
    }

    /// Used share of the total capacity, 0-100.
    pub fn utilization_percent(&self) -> Option<f64> {
        self.total_capacity
            .map(|total| self.used_capacity as f64 / total as f64 * 100.0)
    }

    /// Stop accepting new items. Fails if already inactive.
    pub fn deactivate(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if !self.active {
            return Err(DomainError::unknown_warehouse(format!(
                "{} is inactive",
                self.code
            )));
        }
        self.active = false;
        self.touch(at);
        Ok(())
    }

    /// Record how much of the warehouse is occupied.
    pub fn record_usage(&mut self, used: u64, at: DateTime<Utc>) -> DomainResult<()> {
        if let Some(total) = self.total_capacity {
            if used > total {
                return Err(DomainError::invalid_quantity(format!(
                    "used capacity {used} exceeds total {total} of {}",
                    self.code
                )));
            }
        }
        self.used_capacity = used;
        self.touch(at);
        Ok(())
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.updated_at {
            self.updated_at = at;
        }
    }
}

fn required(field: &str, value: &str) -> DomainResult<String> {
    normalize_optional(value.to_string())
        .ok_or_else(|| DomainError::invalid_spec(format!("{field} cannot be empty")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn main_site() -> WarehouseSpec {
        WarehouseSpec::new("wh-main", "Main", "1 Dock Road")
            .unwrap()
            .with_total_capacity(1_000)
            .unwrap()
    }

    #[test]
    fn codes_are_trimmed_and_upper_cased() {
        assert_eq!(WarehouseCode::parse(" wh1 ").unwrap().as_str(), "WH1");
        assert!(WarehouseCode::parse("").is_err());
        assert!(WarehouseCode::parse("WH 1").is_err());
    }

    #[test]
    fn spec_requires_name_address_and_positive_capacity() {
        assert!(WarehouseSpec::new("WH1", " ", "addr").is_err());
        assert!(WarehouseSpec::new("WH1", "Main", "").is_err());
        let err = WarehouseSpec::new("WH1", "Main", "addr")
            .unwrap()
            .with_total_capacity(0)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidSpec(_)));
    }

    #[test]
    fn spec_from_json_is_validated() {
        let spec: WarehouseSpec = serde_json::from_str(
            r#"{"code":"wh2","name":"North","address":"2 Pier","total_capacity":50}"#,
        )
        .unwrap();
        assert_eq!(spec.code().as_str(), "WH2");
        assert_eq!(spec.contact(), &WarehouseContact::default());

        assert!(
            serde_json::from_str::<WarehouseSpec>(r#"{"code":"","name":"N","address":"A"}"#)
                .is_err()
        );
        assert!(
            serde_json::from_str::<WarehouseSpec>(
                r#"{"code":"W","name":"N","address":"A","total_capacity":0}"#
            )
            .is_err()
        );
    }

    #[test]
    fn usage_is_bounded_by_total_capacity() {
        let now = Utc::now();
        let mut warehouse = Warehouse::register(main_site(), now);
        assert_eq!(warehouse.free_capacity(), Some(1_000));

        warehouse.record_usage(250, now).unwrap();
        assert_eq!(warehouse.free_capacity(), Some(750));
        assert_eq!(warehouse.utilization_percent(), Some(25.0));

        let err = warehouse.record_usage(1_001, now).unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity(_)));
        assert_eq!(warehouse.used_capacity(), 250);
    }

    #[test]
    fn deactivating_twice_fails() {
        let now = Utc::now();
        let mut warehouse = Warehouse::register(main_site(), now);
        warehouse.deactivate(now).unwrap();
        assert!(!warehouse.is_active());
        assert!(matches!(
            warehouse.deactivate(now),
            Err(DomainError::UnknownWarehouse(_))
        ));
    }
}
